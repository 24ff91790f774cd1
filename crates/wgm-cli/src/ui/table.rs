//! Table rendering for `wgm search`.

use comfy_table::presets::UTF8_HORIZONTAL_ONLY;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use wgm_core::search::{PackageStatus, SearchRow};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn search_table(rows: &[SearchRow]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_HORIZONTAL_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Package", "Status", "Version", "Timestamp"]);

    for row in rows {
        let mut status = row.status.to_string();
        if row.pinned {
            status.push_str(" (pinned)");
        }
        let color = match row.status {
            PackageStatus::Downloaded => Color::Green,
            PackageStatus::Recorded => Color::Yellow,
            PackageStatus::NotDownloaded => Color::DarkGrey,
        };
        table.add_row(vec![
            Cell::new(row.id.to_string()).fg(Color::Cyan),
            Cell::new(status).fg(color),
            Cell::new(row.version.as_deref().unwrap_or("-")),
            Cell::new(
                row.timestamp
                    .map_or_else(|| "-".to_string(), |ts| ts.format(TIMESTAMP_FORMAT).to_string()),
            ),
        ]);
    }
    table
}
