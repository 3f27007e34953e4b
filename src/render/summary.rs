use crate::model::{CalendarGrid, Contributor, CountBreakdown, DateRange, StreakStats};
use crate::stats::streak_stats;
use chrono::{DateTime, Utc};

/// Markdown report that sits next to the heatmap.
#[allow(clippy::too_many_arguments)]
pub fn render_summary(
    title: &str,
    contributors: &[Contributor],
    grids: &[CalendarGrid],
    combined: &StreakStats,
    breakdown: &CountBreakdown,
    range: &DateRange,
    generated_at: DateTime<Utc>,
    image_link: &str,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", escape_markdown(title)));
    out.push_str(&format!(
        "> Last updated: {}\n\n",
        generated_at.format("%Y-%m-%d %H:%M UTC")
    ));
    out.push_str(&format!(
        "**{} commits between {} and {}**\n\n",
        combined.total_commits, range.start, range.end
    ));
    out.push_str(&format!("- Official count (login calendars): {}\n", breakdown.official_count));
    out.push_str(&format!("- Additional from email scan: {}\n\n", breakdown.manual_count));
    out.push_str(&format!("![Contributions]({image_link})\n\n"));

    out.push_str("## Contributors\n\n");
    out.push_str("| Contributor | Role | Commits | Active days | Current streak | Max streak | Busiest day |\n");
    out.push_str("|---|---|---:|---:|---:|---:|---|\n");
    for (contributor, grid) in contributors.iter().zip(grids) {
        let stats = streak_stats(grid);
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            escape_markdown(&contributor.name),
            contributor.role,
            stats.total_commits,
            stats.active_days,
            stats.current_streak,
            stats.max_streak,
            busiest(&stats),
        ));
    }

    out.push_str("\n## Streaks\n\n");
    out.push_str(&format!("- **Current streak**: {} days\n", combined.current_streak));
    out.push_str(&format!("- **Max streak**: {} days\n", combined.max_streak));
    out.push_str(&format!("- **Active days**: {} of {}\n", combined.active_days, range.len()));
    out
}

fn busiest(stats: &StreakStats) -> String {
    match stats.busiest_day {
        Some(day) => format!("{} ({})", day.date, day.count),
        None => "-".to_string(),
    }
}

fn escape_markdown(raw: &str) -> String {
    raw.replace('|', "\\|").replace('\n', " ")
}
