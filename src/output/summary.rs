use crate::providers::jenkins::types::NodeResult;
use crate::report::{BuildListing, BuildStatus, FailureReport};

use super::styling::{bright, bright_green, bright_red, cyan, dim};
use super::tables::{create_table, duration_cell, header_cells, result_cell, state_cell};

/// Prints a human-readable failure report to stdout.
///
/// One table row per failed step, followed by each step's console text when
/// it was collected.
pub fn print_failure_report(report: &FailureReport) {
    let scope = if report.recursive {
        "including sub-builds"
    } else {
        "this build only"
    };
    println!(
        "{} {} {}",
        bright(format!("{} #{}", report.pipeline_path, report.build_number)),
        dim(format!("({scope})")),
        cyan(&report.url),
    );

    if report.failures.is_empty() {
        println!("{}", bright_green("No failed steps."));
        return;
    }
    println!(
        "{}",
        bright_red(format!("{} failed step(s)", report.total_failures))
    );

    let mut table = create_table();
    table.set_header(header_cells(&["Build", "Step", "Result", "Link"]));
    for failure in &report.failures {
        table.add_row(vec![
            comfy_table::Cell::new(format!(
                "{} #{}",
                failure.pipeline_path, failure.build_number
            )),
            comfy_table::Cell::new(&failure.display_name),
            result_cell(Some(failure.result)),
            comfy_table::Cell::new(&failure.url),
        ]);
    }
    println!("{table}");

    for failure in &report.failures {
        if let Some(console) = &failure.console_output {
            println!();
            println!(
                "{} {}",
                bright(format!(
                    "── console: {} #{} / {}",
                    failure.pipeline_path, failure.build_number, failure.display_name
                )),
                dim(&failure.node_id),
            );
            println!("{console}");
        }
    }
}

/// Prints a step table for one build.
pub fn print_build_status(status: &BuildStatus) {
    println!(
        "{} {}",
        bright(format!("{} #{}", status.pipeline_path, status.build_number)),
        cyan(&status.url),
    );

    if let Some(result) = status.worst_result() {
        if result == NodeResult::Success {
            println!("{}", bright_green(result.as_str()));
        } else {
            println!("{}", bright_red(result.as_str()));
        }
    }

    let mut table = create_table();
    table.set_header(header_cells(&["Step", "Result", "State", "Duration"]));
    for step in &status.steps {
        table.add_row(vec![
            comfy_table::Cell::new(&step.display_name),
            result_cell(step.result),
            state_cell(step.state),
            duration_cell(step.duration_in_millis),
        ]);
    }
    println!("{table}");
}

/// Prints a run listing for one pipeline.
pub fn print_build_listing(listing: &BuildListing) {
    println!("{}", bright(&listing.pipeline_path));

    let mut table = create_table();
    table.set_header(header_cells(&["Build", "Result", "State", "Duration", "Started"]));
    for build in &listing.builds {
        let number = build
            .build_number
            .map_or_else(|| "-".to_string(), |n| format!("#{n}"));
        table.add_row(vec![
            comfy_table::Cell::new(number),
            result_cell(build.result),
            state_cell(build.state),
            duration_cell(build.duration_in_millis),
            comfy_table::Cell::new(build.start_time.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");
}
