use crate::model::{CalendarGrid, DayCount, StreakStats};

pub fn streak_stats(grid: &CalendarGrid) -> StreakStats {
    StreakStats {
        total_commits: grid.total(),
        active_days: grid.active_days(),
        current_streak: current_streak(&grid.days),
        max_streak: max_streak(&grid.days),
        busiest_day: busiest_day(&grid.days),
    }
}

/// Consecutive active days ending at the last day of the grid. An idle
/// final day is skipped, since the day may simply not be over yet.
pub fn current_streak(days: &[DayCount]) -> usize {
    let mut iter = days.iter().rev().peekable();
    if iter.peek().is_some_and(|d| d.count == 0) {
        iter.next();
    }
    iter.take_while(|d| d.count > 0).count()
}

pub fn max_streak(days: &[DayCount]) -> usize {
    let mut best = 0;
    let mut run = 0;
    for day in days {
        if day.count > 0 {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best
}

/// Highest-count day; the earliest wins ties.
pub fn busiest_day(days: &[DayCount]) -> Option<DayCount> {
    days.iter()
        .filter(|d| d.count > 0)
        .fold(None, |best: Option<DayCount>, d| match best {
            Some(b) if b.count >= d.count => Some(b),
            _ => Some(*d),
        })
}
