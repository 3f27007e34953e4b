use crate::model::{CalendarGrid, Contributor, ContributionRecord, DateRange, DayCount};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::warn;

/// Builds one dense grid per contributor, in configuration order.
///
/// The full date index is laid out first and sparse records are summed
/// into it, so the result does not depend on record order.
pub fn aggregate(
    contributors: &[Contributor],
    records: &[ContributionRecord],
    range: &DateRange,
) -> Vec<CalendarGrid> {
    let mut index: BTreeMap<&str, BTreeMap<NaiveDate, u32>> = contributors
        .iter()
        .map(|c| (c.id.as_str(), range.days().map(|d| (d, 0u32)).collect()))
        .collect();

    for record in records {
        let Some(days) = index.get_mut(record.contributor_id.as_str()) else {
            warn!(contributor = %record.contributor_id, "record for unknown contributor ignored");
            continue;
        };
        if let Some(count) = days.get_mut(&record.date) {
            *count = count.saturating_add(record.commit_count);
        }
    }

    contributors
        .iter()
        .map(|c| {
            let days = index.remove(c.id.as_str()).unwrap_or_default();
            CalendarGrid {
                contributor_id: c.id.clone(),
                days: days.into_iter().map(|(date, count)| DayCount { date, count }).collect(),
            }
        })
        .collect()
}

/// Sums several grids over the same range into one.
pub fn combine(id: &str, grids: &[CalendarGrid]) -> CalendarGrid {
    let mut totals: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for grid in grids {
        for day in &grid.days {
            let slot = totals.entry(day.date).or_insert(0);
            *slot = slot.saturating_add(day.count);
        }
    }
    CalendarGrid {
        contributor_id: id.to_string(),
        days: totals.into_iter().map(|(date, count)| DayCount { date, count }).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use pretty_assertions::assert_eq;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn contributor(id: &str) -> Contributor {
        Contributor {
            id: id.to_string(),
            name: id.to_string(),
            role: Role::Human,
            logins: vec![id.to_string()],
            emails: Vec::new(),
        }
    }

    #[test]
    fn grid_is_dense_over_range() {
        let range = DateRange::new(date("2024-02-25"), date("2024-03-05")).unwrap();
        let grids = aggregate(&[contributor("a")], &[], &range);
        let grid = &grids[0];

        assert_eq!(grid.days.len(), range.len());
        assert_eq!(grid.days.len(), 10);
        assert!(grid.validate().is_ok());
        assert_eq!(grid.days[0].date, range.start);
        assert_eq!(grid.days.last().unwrap().date, range.end);
    }

    #[test]
    fn duplicate_records_are_summed() {
        let range = DateRange::new(date("2024-01-01"), date("2024-01-01")).unwrap();
        let records = vec![
            ContributionRecord::new("A", date("2024-01-01"), 3),
            ContributionRecord::new("A", date("2024-01-01"), 2),
        ];
        let grids = aggregate(&[contributor("A")], &records, &range);
        assert_eq!(
            grids,
            vec![CalendarGrid {
                contributor_id: "A".to_string(),
                days: vec![DayCount { date: date("2024-01-01"), count: 5 }],
            }]
        );
    }

    #[test]
    fn zero_activity_week_is_all_zero() {
        let range = DateRange::new(date("2024-01-01"), date("2024-01-07")).unwrap();
        let grids = aggregate(&[contributor("idle")], &[], &range);
        assert_eq!(grids[0].days.len(), 7);
        assert!(grids[0].days.iter().all(|d| d.count == 0));
    }

    #[test]
    fn order_of_records_does_not_matter() {
        let range = DateRange::new(date("2024-01-01"), date("2024-01-10")).unwrap();
        let contributors = [contributor("a"), contributor("b")];
        let records = vec![
            ContributionRecord::new("a", date("2024-01-03"), 1),
            ContributionRecord::new("b", date("2024-01-03"), 4),
            ContributionRecord::new("a", date("2024-01-09"), 2),
            ContributionRecord::new("a", date("2024-01-03"), 6),
            ContributionRecord::new("b", date("2024-01-10"), 1),
        ];
        let baseline = aggregate(&contributors, &records, &range);

        let mut reversed = records.clone();
        reversed.reverse();
        assert_eq!(aggregate(&contributors, &reversed, &range), baseline);

        let mut rotated = records.clone();
        rotated.rotate_left(2);
        assert_eq!(aggregate(&contributors, &rotated, &range), baseline);
    }

    #[test]
    fn ignores_records_outside_range_and_unknown_contributors() {
        let range = DateRange::new(date("2024-01-01"), date("2024-01-02")).unwrap();
        let records = vec![
            ContributionRecord::new("a", date("2023-12-31"), 9),
            ContributionRecord::new("ghost", date("2024-01-01"), 9),
            ContributionRecord::new("a", date("2024-01-02"), 1),
        ];
        let grids = aggregate(&[contributor("a")], &records, &range);
        assert_eq!(grids.len(), 1);
        assert_eq!(grids[0].total(), 1);
    }

    #[test]
    fn combine_sums_per_day() {
        let range = DateRange::new(date("2024-01-01"), date("2024-01-03")).unwrap();
        let records = vec![
            ContributionRecord::new("a", date("2024-01-02"), 2),
            ContributionRecord::new("b", date("2024-01-02"), 3),
        ];
        let grids = aggregate(&[contributor("a"), contributor("b")], &records, &range);
        let combined = combine("all", &grids);
        assert_eq!(combined.days.len(), 3);
        assert_eq!(combined.days[1].count, 5);
        assert_eq!(combined.total(), 5);
    }
}
