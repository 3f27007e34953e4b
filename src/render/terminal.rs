use super::TierScale;
use crate::model::{CalendarGrid, Contributor};
use crate::stats::streak_stats;
use chrono::Datelike;
use console::style;

const ROW_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const GREENS: [u8; 4] = [22, 28, 34, 46];

/// Prints a coloured week-by-weekday calendar per contributor to stdout.
pub fn print_heatmap(contributors: &[Contributor], grids: &[CalendarGrid], scale: &TierScale) {
    for (contributor, grid) in contributors.iter().zip(grids) {
        let stats = streak_stats(grid);
        println!(
            "{} {}",
            style(&contributor.name).bold(),
            style(format!("({})", contributor.role)).dim()
        );
        println!("{}", "─".repeat(50));

        for (row, line) in calendar_rows(grid, scale).into_iter().enumerate() {
            print!("{} ", style(ROW_NAMES[row]).dim());
            for tier in line {
                match tier {
                    None => print!(" "),
                    Some(0) => print!("{}", style("·").dim()),
                    Some(t) => {
                        let shade = GREENS[(t - 1).min(GREENS.len() - 1)];
                        print!("{}", style("■").color256(shade));
                    }
                }
            }
            println!();
        }

        println!(
            "commits: {}, active days: {}, current streak: {}, max streak: {}\n",
            style(stats.total_commits).cyan(),
            style(stats.active_days).cyan(),
            style(stats.current_streak).green(),
            style(stats.max_streak).yellow()
        );
    }

    println!("{}", style("Legend").bold());
    println!("  {} idle  {} more commits", style("·").dim(), style("■").color256(GREENS[3]));
}

/// Seven rows (Sunday first) of per-week tiers; `None` pads the partial
/// first and last weeks.
fn calendar_rows(grid: &CalendarGrid, scale: &TierScale) -> Vec<Vec<Option<usize>>> {
    let Some(first) = grid.days.first() else {
        return vec![Vec::new(); 7];
    };
    let offset = first.date.weekday().num_days_from_sunday() as usize;
    let weeks = (offset + grid.days.len()).div_ceil(7);

    let mut rows = vec![vec![None; weeks]; 7];
    for (index, day) in grid.days.iter().enumerate() {
        let slot = offset + index;
        rows[slot % 7][slot / 7] = Some(scale.tier(day.count));
    }
    rows
}
