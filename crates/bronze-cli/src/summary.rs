//! Run summary tables.

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ColumnConstraint, ContentArrangement, Table, Width,
};

use bronze_core::{DatasetOutcome, RunReport};
use bronze_model::LoadConfig;
use bronze_validate::ValidationStatus;

pub fn print_summary(report: &RunReport) {
    println!("Run: {} ({})", report.run_id, report.status);
    println!("{}", summary_table(report));
    if let Some(issues) = issue_table(report) {
        println!();
        println!("Remediation events:");
        println!("{issues}");
    }
    if !report.summary_paths.is_empty() {
        println!();
        println!("Validation summaries:");
        for path in &report.summary_paths {
            println!("- {}", path.display());
        }
    }
    let errors: Vec<&DatasetOutcome> = report
        .datasets
        .iter()
        .filter(|outcome| outcome.error.is_some())
        .collect();
    if !errors.is_empty() {
        eprintln!("Errors:");
        for outcome in errors {
            eprintln!(
                "- {}: {}",
                outcome.dataset,
                outcome.error.as_deref().unwrap_or_default()
            );
        }
    }
}

/// One row per dataset plus a totals row.
pub fn summary_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Dataset"),
        header_cell("Table"),
        header_cell("Status"),
        header_cell("Rows"),
        header_cell("Inserted"),
        header_cell("Updated"),
        header_cell("Events"),
        header_cell("Error"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 3..=6 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    align_column(&mut table, 2, CellAlignment::Center);

    let mut totals = [0usize; 4];
    for outcome in &report.datasets {
        totals[0] += outcome.rows;
        totals[1] += outcome.inserted;
        totals[2] += outcome.updated;
        totals[3] += outcome.events;
        table.add_row(vec![
            Cell::new(&outcome.dataset)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            outcome
                .table
                .as_deref()
                .map_or_else(|| dim_cell("-"), Cell::new),
            status_cell(outcome.status),
            Cell::new(outcome.rows),
            count_cell(outcome.inserted, Color::Green),
            count_cell(outcome.updated, Color::Yellow),
            count_cell(outcome.events, Color::Magenta),
            outcome
                .error_kind
                .map_or_else(|| dim_cell("-"), |kind| Cell::new(kind).fg(Color::Red)),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL").fg(Color::Cyan).add_attribute(Attribute::Bold),
        Cell::new(format!("{} dataset(s)", report.datasets.len()))
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        failed_total_cell(report.failed_count()),
        Cell::new(totals[0]).add_attribute(Attribute::Bold),
        Cell::new(totals[1]).add_attribute(Attribute::Bold),
        Cell::new(totals[2]).add_attribute(Attribute::Bold),
        Cell::new(totals[3]).add_attribute(Attribute::Bold),
        dim_cell("-"),
    ]);
    table
}

/// Remediation events of the run, or `None` when there were none.
pub fn issue_table(report: &RunReport) -> Option<Table> {
    let mut events: Vec<_> = report
        .summaries
        .iter()
        .flat_map(|summary| summary.issues.iter())
        .collect();
    if events.is_empty() {
        return None;
    }
    events.sort_by(|a, b| {
        a.dataset
            .cmp(&b.dataset)
            .then_with(|| a.issue_type.cmp(&b.issue_type))
    });
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Dataset"),
        header_cell("Issue"),
        header_cell("Rows"),
        header_cell("Message"),
    ]);
    apply_issue_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    for event in events {
        table.add_row(vec![
            Cell::new(&event.dataset),
            Cell::new(event.issue_type.as_str()).fg(Color::Yellow),
            Cell::new(event.counts.rows_affected),
            Cell::new(&event.message),
        ]);
    }
    Some(table)
}

/// Configured datasets in load order.
pub fn dataset_table(config: &LoadConfig) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Dataset"),
        header_cell("Table"),
        header_cell("Unique key"),
        header_cell("Dedupe"),
        header_cell("Identity"),
        header_cell("Checks"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 5, CellAlignment::Right);
    for dataset in &config.datasets {
        let unique = if dataset.unique_columns.is_empty() {
            "-".to_string()
        } else {
            dataset.unique_columns.join(", ")
        };
        let dedupe = dataset
            .dedupe_subset()
            .map_or_else(|| "-".to_string(), |columns| columns.join(", "));
        let policy = dataset
            .identity_policy
            .map_or_else(|| "-".to_string(), |policy| format!("{policy:?}"));
        table.add_row(vec![
            Cell::new(&dataset.name).add_attribute(Attribute::Bold),
            Cell::new(config.table_ref(&dataset.name)),
            Cell::new(unique),
            Cell::new(dedupe),
            Cell::new(policy),
            Cell::new(dataset.checks.len()),
        ]);
    }
    table
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(140);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(140);
    if table.column_count() >= 8 {
        table.set_constraints(vec![
            ColumnConstraint::LowerBoundary(Width::Fixed(22)),
            ColumnConstraint::UpperBoundary(Width::Percentage(30)),
            ColumnConstraint::LowerBoundary(Width::Fixed(8)),
            ColumnConstraint::LowerBoundary(Width::Fixed(6)),
            ColumnConstraint::LowerBoundary(Width::Fixed(8)),
            ColumnConstraint::LowerBoundary(Width::Fixed(7)),
            ColumnConstraint::LowerBoundary(Width::Fixed(6)),
            ColumnConstraint::LowerBoundary(Width::Fixed(19)),
        ]);
    }
}

fn apply_issue_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(160);
    if table.column_count() >= 4 {
        table.set_constraints(vec![
            ColumnConstraint::LowerBoundary(Width::Fixed(22)),
            ColumnConstraint::LowerBoundary(Width::Fixed(30)),
            ColumnConstraint::LowerBoundary(Width::Fixed(5)),
            ColumnConstraint::UpperBoundary(Width::Percentage(60)),
        ]);
    }
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn status_cell(status: ValidationStatus) -> Cell {
    match status {
        ValidationStatus::Passed => Cell::new("passed").fg(Color::Green),
        ValidationStatus::Failed => Cell::new("FAILED")
            .fg(Color::Red)
            .add_attribute(Attribute::Bold),
    }
}

fn failed_total_cell(failed: usize) -> Cell {
    if failed == 0 {
        dim_cell("0 failed")
    } else {
        Cell::new(format!("{failed} failed"))
            .fg(Color::Red)
            .add_attribute(Attribute::Bold)
    }
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color)
    } else {
        dim_cell(count)
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label).fg(Color::Cyan).add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
