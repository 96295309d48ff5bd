use crate::display::{ZoneRow, zone_row};
use crate::state::container::Snapshot;
use crate::template::MessageRenderer;
use crate::time_zone::{ZoneFormatter, zone_label};

pub const EMPTY_ZONES_PLACEHOLDER: &str = "Add time zones and they will be displayed here.";

pub fn render_screen(
    snapshot: &Snapshot,
    formatter: &dyn ZoneFormatter,
    renderer: &dyn MessageRenderer,
) -> String {
    let mut lines = Vec::new();
    let state = &snapshot.state;
    let custom = state.custom_date_time.as_deref();

    lines.push(section_header("Your Time"));
    let user_label = if state.user_label.is_empty() {
        zone_label(&snapshot.viewer_zone)
    } else {
        state.user_label.clone()
    };
    push_unit(
        &mut lines,
        None,
        zone_row(
            &user_label,
            &snapshot.viewer_zone,
            custom,
            snapshot.now_ms,
            &snapshot.viewer_zone,
            formatter,
        ),
    );
    lines.push(match custom {
        Some(value) => format!("  Custom datetime: {value}"),
        None => "  Custom datetime: off".to_string(),
    });

    lines.push(String::new());
    lines.push(section_header("Time Zones"));
    if state.time_zones.is_empty() {
        lines.push(format!("  {EMPTY_ZONES_PLACEHOLDER}"));
    }
    for (index, entry) in state.time_zones.iter().enumerate() {
        push_unit(
            &mut lines,
            Some(index),
            zone_row(
                &entry.label,
                &entry.time_zone,
                custom,
                snapshot.now_ms,
                &snapshot.viewer_zone,
                formatter,
            ),
        );
    }

    lines.push(String::new());
    lines.push(section_header("Message"));
    match snapshot.render_message(renderer) {
        Ok(message) => lines.push(format!("  {message}")),
        Err(err) => lines.push(format!("  error: {err}")),
    }

    let mut screen = lines.join("\n");
    screen.push('\n');
    screen
}

fn section_header(title: &str) -> String {
    format!("== {title} ==")
}

fn push_unit<E: std::fmt::Display>(
    lines: &mut Vec<String>,
    index: Option<usize>,
    row: Result<ZoneRow, E>,
) {
    let prefix = index.map(|i| format!("[{i}] ")).unwrap_or_default();
    match row {
        Ok(row) => {
            lines.push(format!(
                "  {prefix}{} {} ({})",
                row.time_of_day_marker(),
                row.label,
                row.time_zone
            ));
            lines.push(format!(
                "      {}  {}  {}",
                row.time, row.utc_offset, row.zone_name
            ));
            lines.push(format!("      {}", row.full_date));
        }
        Err(err) => lines.push(format!("  {prefix}error: {err}")),
    }
}
