use crate::error::{CommitGridError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BOUNDS: [u32; 3] = [2, 5, 10];
pub const DEFAULT_PALETTE: [&str; 5] = ["#ebedf0", "#9be9a8", "#40c463", "#30a14e", "#216e39"];

/// Maps commit counts onto discrete intensity tiers.
///
/// Tier 0 is reserved for idle days. Each bound is the inclusive upper
/// limit of the next tier, and anything above the last bound lands in
/// the top tier, so there are `bounds.len() + 2` tiers in total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierScale {
    #[serde(default = "default_bounds")]
    pub bounds: Vec<u32>,
    #[serde(default = "default_palette")]
    pub palette: Vec<String>,
}

fn default_bounds() -> Vec<u32> {
    DEFAULT_BOUNDS.to_vec()
}

fn default_palette() -> Vec<String> {
    DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect()
}

impl Default for TierScale {
    fn default() -> Self {
        Self {
            bounds: default_bounds(),
            palette: default_palette(),
        }
    }
}

impl TierScale {
    pub fn tier_count(&self) -> usize {
        self.bounds.len() + 2
    }

    pub fn tier(&self, count: u32) -> usize {
        if count == 0 {
            return 0;
        }
        1 + self.bounds.iter().take_while(|&&bound| count > bound).count()
    }

    pub fn color(&self, count: u32) -> &str {
        &self.palette[self.tier(count)]
    }

    pub fn validate(&self) -> Result<()> {
        if self.bounds.first() == Some(&0) {
            return Err(CommitGridError::Config("render.bounds must start above zero".to_string()));
        }
        if self.bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CommitGridError::Config(
                "render.bounds must be strictly increasing".to_string(),
            ));
        }
        if self.palette.len() != self.tier_count() {
            return Err(CommitGridError::Config(format!(
                "render.palette needs {} colours for {} bounds, got {}",
                self.tier_count(),
                self.bounds.len(),
                self.palette.len()
            )));
        }
        if let Some(bad) = self.palette.iter().find(|c| !is_safe_color(c)) {
            return Err(CommitGridError::Config(format!("render.palette entry '{bad}' is not a colour")));
        }
        Ok(())
    }
}

fn is_safe_color(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '#' | '(' | ')' | ',' | '.' | '%' | ' '))
}
