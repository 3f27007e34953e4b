use super::TierScale;
use crate::error::{CommitGridError, Result};
use crate::model::{CalendarGrid, DateRange};
use chrono::{Datelike, Duration, NaiveDate};

const CELL: u32 = 10;
const GAP: u32 = 2;
const STEP: u32 = CELL + GAP;
const LEFT: u32 = 40;
const RIGHT: u32 = 10;
const MIN_WIDTH: u32 = 300;
const FONT: &str = "-apple-system, BlinkMacSystemFont, Segoe UI, Helvetica, Arial, sans-serif";
const MUTED: &str = "#767676";
const INK: &str = "#24292f";
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
/// Row labels, Sunday being row 0.
const WEEKDAY_LABELS: [(u32, &str); 3] = [(1, "Mon"), (3, "Wed"), (5, "Fri")];

/// One calendar drawn in the image, optionally captioned.
pub struct Block<'a> {
    pub label: Option<String>,
    pub grid: &'a CalendarGrid,
}

/// Column/row placement of a date range on a Sunday-first week grid.
struct WeekLayout {
    range: DateRange,
    offset: u32,
    weeks: u32,
}

impl WeekLayout {
    fn new(range: DateRange) -> Self {
        let offset = range.start.weekday().num_days_from_sunday();
        let weeks = (offset as usize + range.len()).div_ceil(7) as u32;
        Self { range, offset, weeks }
    }

    fn position(&self, index: usize) -> (u32, u32) {
        let slot = self.offset + index as u32;
        (slot / 7, slot % 7)
    }

    fn dates_in_column(&self, col: u32) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..7).filter_map(move |row| {
            let slot = col * 7 + row;
            let index = slot.checked_sub(self.offset)? as usize;
            (index < self.range.len()).then(|| self.range.start + Duration::days(index as i64))
        })
    }

    /// Columns that receive a month caption, GitHub style: a column is
    /// captioned when it holds the first of a month, and the leading partial
    /// month is captioned only when there is room before the next caption.
    fn month_captions(&self) -> Vec<(u32, u32)> {
        let mut captions: Vec<(u32, u32)> = (0..self.weeks)
            .filter_map(|col| {
                self.dates_in_column(col)
                    .find(|d| d.day() == 1)
                    .map(|d| (col, d.month0()))
            })
            .collect();

        let first_caption_col = captions.first().map(|(col, _)| *col).unwrap_or(self.weeks);
        if self.range.start.day() != 1 && first_caption_col >= 3 {
            captions.insert(0, (0, self.range.start.month0()));
        }
        captions
    }
}

pub fn render_svg(title: &str, blocks: &[Block<'_>], scale: &TierScale) -> Result<String> {
    let first = blocks
        .first()
        .ok_or_else(|| CommitGridError::Render("Nothing to render".to_string()))?;
    for block in blocks {
        block.grid.validate()?;
    }
    scale
        .validate()
        .map_err(|e| CommitGridError::Render(format!("Unusable tier scale: {e}")))?;
    let range = first
        .grid
        .range()
        .ok_or_else(|| CommitGridError::Render("Empty grid".to_string()))?;
    if let Some(other) = blocks.iter().find(|b| b.grid.range() != Some(range)) {
        return Err(CommitGridError::Render(format!(
            "Grid for '{}' does not cover {range}",
            other.grid.contributor_id
        )));
    }

    let layout = WeekLayout::new(range);
    let width = (LEFT + layout.weeks * STEP + RIGHT).max(MIN_WIDTH);

    let mut body = String::new();
    let mut y = 35;
    for block in blocks {
        if let Some(label) = &block.label {
            body.push_str(&text(LEFT, y + 10, 11, "font-weight=\"600\"", INK, label));
            y += 18;
        }
        y = draw_calendar(&mut body, &layout, block.grid, scale, y);
    }
    draw_legend(&mut body, scale, y);
    let height = y + CELL + 10;

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\" xmlns=\"http://www.w3.org/2000/svg\">\n"
    ));
    svg.push_str(&text(10, 20, 14, "font-weight=\"600\"", INK, title));
    svg.push_str(&body);
    svg.push_str("</svg>\n");
    Ok(svg)
}

/// Draws month captions, weekday captions and cells starting at `top`;
/// returns the y coordinate below the calendar.
fn draw_calendar(out: &mut String, layout: &WeekLayout, grid: &CalendarGrid, scale: &TierScale, top: u32) -> u32 {
    for (col, month) in layout.month_captions() {
        out.push_str(&text(LEFT + col * STEP, top + 9, 9, "", MUTED, MONTHS[month as usize]));
    }
    let cells_top = top + 14;

    for (row, label) in WEEKDAY_LABELS {
        out.push_str(&text(5, cells_top + row * STEP + 9, 9, "", MUTED, label));
    }

    for (index, day) in grid.days.iter().enumerate() {
        let (col, row) = layout.position(index);
        let noun = if day.count == 1 { "commit" } else { "commits" };
        out.push_str(&format!(
            "<rect x=\"{}\" y=\"{}\" width=\"{CELL}\" height=\"{CELL}\" fill=\"{}\" rx=\"2\"><title>{}: {} {noun}</title></rect>\n",
            LEFT + col * STEP,
            cells_top + row * STEP,
            scale.color(day.count),
            day.date,
            day.count,
        ));
    }

    cells_top + 7 * STEP + 10
}

fn draw_legend(out: &mut String, scale: &TierScale, y: u32) {
    out.push_str(&text(LEFT, y + 9, 10, "", MUTED, "Less"));
    let swatches_left = LEFT + 30;
    for (i, color) in scale.palette.iter().enumerate() {
        out.push_str(&format!(
            "<rect x=\"{}\" y=\"{y}\" width=\"{CELL}\" height=\"{CELL}\" fill=\"{color}\" rx=\"2\"/>\n",
            swatches_left + i as u32 * STEP
        ));
    }
    let more_x = swatches_left + scale.palette.len() as u32 * STEP + 4;
    out.push_str(&text(more_x, y + 9, 10, "", MUTED, "More"));
}

fn text(x: u32, y: u32, size: u32, extra: &str, fill: &str, content: &str) -> String {
    let extra = if extra.is_empty() { String::new() } else { format!(" {extra}") };
    format!(
        "<text x=\"{x}\" y=\"{y}\" font-family=\"{FONT}\" font-size=\"{size}\"{extra} fill=\"{fill}\">{}</text>\n",
        escape_xml(content)
    )
}

pub fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DayCount;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn grid(start: &str, counts: &[u32]) -> CalendarGrid {
        CalendarGrid {
            contributor_id: "a".to_string(),
            days: date(start)
                .iter_days()
                .zip(counts)
                .map(|(date, &count)| DayCount { date, count })
                .collect(),
        }
    }

    #[test]
    fn week_layout_starts_on_sunday() {
        // 2024-01-03 is a Wednesday.
        let range = DateRange::new(date("2024-01-03"), date("2024-01-09")).unwrap();
        let layout = WeekLayout::new(range);
        assert_eq!(layout.offset, 3);
        assert_eq!(layout.weeks, 2);
        assert_eq!(layout.position(0), (0, 3));
        assert_eq!(layout.position(4), (1, 0));
    }

    #[test]
    fn month_captions_mark_first_of_month() {
        let range = DateRange::new(date("2024-01-10"), date("2024-03-31")).unwrap();
        let captions = WeekLayout::new(range).month_captions();
        let months: Vec<_> = captions.iter().map(|(_, m)| MONTHS[*m as usize]).collect();
        assert_eq!(months, vec!["Jan", "Feb", "Mar"]);
        assert_eq!(captions[0].0, 0);
    }

    #[test]
    fn leading_partial_month_is_dropped_when_crowded() {
        let range = DateRange::new(date("2024-01-25"), date("2024-03-31")).unwrap();
        let captions = WeekLayout::new(range).month_captions();
        assert_eq!(MONTHS[captions[0].1 as usize], "Feb");
    }

    #[test]
    fn renders_one_cell_per_day_with_tooltips() {
        let g = grid("2024-01-01", &[0, 1, 3, 7, 11, 0, 0]);
        let svg = render_svg("Team", &[Block { label: None, grid: &g }], &TierScale::default()).unwrap();
        assert_eq!(svg.matches("<title>").count(), 7);
        assert!(svg.contains("<title>2024-01-02: 1 commit</title>"));
        assert!(svg.contains("<title>2024-01-05: 11 commits</title>"));
        assert!(svg.contains("fill=\"#216e39\""));
        assert!(svg.starts_with("<svg "));
        assert!(svg.ends_with("</svg>\n"));
    }

    #[test]
    fn escapes_text() {
        let g = grid("2024-01-01", &[0]);
        let blocks = [Block {
            label: Some("R&D <bots>".to_string()),
            grid: &g,
        }];
        let svg = render_svg("\"Quotes\"", &blocks, &TierScale::default()).unwrap();
        assert!(svg.contains("R&amp;D &lt;bots&gt;"));
        assert!(svg.contains("&quot;Quotes&quot;"));
    }

    #[test]
    fn short_palette_is_a_render_error() {
        let g = grid("2024-01-01", &[0, 40]);
        let scale = TierScale {
            bounds: vec![2, 5, 10],
            palette: vec!["#ebedf0".to_string(), "#9be9a8".to_string()],
        };
        let err = render_svg("x", &[Block { label: None, grid: &g }], &scale).unwrap_err();
        assert!(matches!(err, CommitGridError::Render(_)));
    }

    #[test]
    fn rejects_non_monotonic_grid() {
        let mut g = grid("2024-01-01", &[1, 2, 3]);
        g.days.swap(0, 2);
        let err = render_svg("x", &[Block { label: None, grid: &g }], &TierScale::default()).unwrap_err();
        assert!(matches!(err, CommitGridError::Render(_)));
    }

    #[test]
    fn rejects_mismatched_ranges() {
        let a = grid("2024-01-01", &[1, 2, 3]);
        let b = grid("2024-01-02", &[1, 2, 3]);
        let blocks = [Block { label: None, grid: &a }, Block { label: None, grid: &b }];
        assert!(render_svg("x", &blocks, &TierScale::default()).is_err());
    }

    #[test]
    fn rejects_empty_input() {
        assert!(render_svg("x", &[], &TierScale::default()).is_err());
    }
}
