pub mod summary;
pub mod svg;
pub mod terminal;
pub mod tier;

pub use summary::render_summary;
pub use svg::{render_svg, Block};
pub use terminal::print_heatmap;
pub use tier::TierScale;

use crate::aggregate::combine;
use crate::error::{CommitGridError, Result};
use crate::model::{CalendarGrid, Contributor};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// All contributors summed into one calendar.
    #[default]
    Combined,
    /// One captioned calendar per contributor.
    Stacked,
}

/// Renders the heatmap image for `grids`, which must line up with `contributors`.
pub fn render_heatmap(
    title: &str,
    contributors: &[Contributor],
    grids: &[CalendarGrid],
    layout: Layout,
    scale: &TierScale,
) -> Result<String> {
    if contributors.len() != grids.len()
        || contributors.iter().zip(grids).any(|(c, g)| c.id != g.contributor_id)
    {
        return Err(CommitGridError::Render(
            "Grids do not match the configured contributors".to_string(),
        ));
    }
    for grid in grids {
        grid.validate()?;
    }

    match layout {
        Layout::Combined => {
            let combined = combine("combined", grids);
            render_svg(title, &[Block { label: None, grid: &combined }], scale)
        }
        Layout::Stacked => {
            let blocks: Vec<Block<'_>> = contributors
                .iter()
                .zip(grids)
                .map(|(c, g)| Block {
                    label: Some(format!("{} ({}) · {} commits", c.name, c.role, g.total())),
                    grid: g,
                })
                .collect();
            render_svg(title, &blocks, scale)
        }
    }
}
