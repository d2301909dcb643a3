use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::providers::jenkins::types::{NodeResult, NodeState};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn header_cells(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

pub fn result_cell(result: Option<NodeResult>) -> Cell {
    match result {
        Some(NodeResult::Success) => Cell::new("SUCCESS").fg(TableColor::Green),
        Some(NodeResult::Failure) => Cell::new("FAILURE").fg(TableColor::Red),
        Some(NodeResult::Unstable) => Cell::new("UNSTABLE").fg(TableColor::Yellow),
        Some(NodeResult::Aborted) => Cell::new("ABORTED").fg(TableColor::DarkGrey),
        Some(NodeResult::NotBuilt) => Cell::new("NOT_BUILT").fg(TableColor::DarkGrey),
        Some(NodeResult::Unknown) => Cell::new("UNKNOWN").fg(TableColor::Yellow),
        None => Cell::new("-").fg(TableColor::DarkGrey),
    }
}

pub fn state_cell(state: Option<NodeState>) -> Cell {
    match state {
        Some(NodeState::Finished) => Cell::new("finished"),
        Some(NodeState::Running) => Cell::new("running").fg(TableColor::Cyan),
        Some(NodeState::Queued) => Cell::new("queued").fg(TableColor::DarkGrey),
        Some(NodeState::Paused) => Cell::new("paused").fg(TableColor::Yellow),
        Some(NodeState::Skipped) => Cell::new("skipped").fg(TableColor::DarkGrey),
        Some(NodeState::NotBuilt) => Cell::new("not built").fg(TableColor::DarkGrey),
        Some(NodeState::Unknown) => Cell::new("unknown"),
        None => Cell::new("-").fg(TableColor::DarkGrey),
    }
}

pub fn duration_cell(millis: Option<u64>) -> Cell {
    match millis {
        Some(millis) => Cell::new(format_duration(millis)),
        None => Cell::new("-").fg(TableColor::DarkGrey),
    }
}

fn format_duration(millis: u64) -> String {
    let seconds = millis / 1000;
    if seconds < 60 {
        format!("{seconds}s")
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
