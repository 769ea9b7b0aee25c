use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use siteforge::optimizer::GenerationStats;
use siteforge::scorer::CoverageReport;
use siteforge::tuning::{StudySummary, TrialState};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn align_right(table: &mut Table, columns: std::ops::Range<usize>) {
    for i in columns {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }
}

pub fn print_coverage_summary(
    title: &str,
    fitness: f64,
    report: &CoverageReport,
    service_level: u64,
    active_sites: usize,
) {
    let mut table = new_table();
    table.set_header(vec![
        Cell::new(title).add_attribute(Attribute::Bold),
        Cell::new("Value"),
    ]);
    table.add_row(vec![
        Cell::new("Fitness"),
        Cell::new(format!("{:.1}", fitness)).fg(Color::Cyan),
    ]);
    table.add_row(vec![Cell::new("Active sites"), Cell::new(active_sites)]);
    table.add_row(vec![Cell::new("Coverage cells"), Cell::new(report.cells.len())]);
    table.add_row(vec![
        Cell::new("Population covered"),
        Cell::new(report.total_population()),
    ]);
    table.add_row(vec![
        Cell::new(format!("Cells >= {}", service_level)),
        Cell::new(report.cells_over_target(service_level)).fg(Color::Red),
    ]);
    if report.dropped_cells > 0 || report.failed_queries > 0 {
        table.add_row(vec![
            Cell::new("Dropped / failed cells"),
            Cell::new(format!("{} / {}", report.dropped_cells, report.failed_queries)),
        ]);
    }
    align_right(&mut table, 1..2);
    println!("\n{}", table);
}

pub fn print_cell_table(report: &CoverageReport, service_level: u64, limit: usize) {
    let mut cells: Vec<_> = report.cells.iter().collect();
    cells.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut table = new_table();
    table.set_header(vec!["Site", "Population", "Score"]);
    for c in cells.into_iter().take(limit) {
        let pop = Cell::new(c.population);
        let pop = if c.population > service_level {
            pop.fg(Color::Red)
        } else {
            pop.fg(Color::Green)
        };
        table.add_row(vec![
            Cell::new(c.site),
            pop,
            Cell::new(format!("{:.0}", c.score)),
        ]);
    }
    align_right(&mut table, 0..3);
    println!("{}", table);
}

/// Prints at most `max_rows` evenly spaced generations, always including
/// the last one.
pub fn print_generation_log(history: &[GenerationStats], max_rows: usize) {
    if history.is_empty() {
        return;
    }
    let stride = history.len().div_ceil(max_rows.max(1)).max(1);

    let mut table = new_table();
    table.set_header(vec!["Gen", "Min", "Mean", "Std", "Max", "Feasible"]);
    for (i, s) in history.iter().enumerate() {
        if i % stride != 0 && i != history.len() - 1 {
            continue;
        }
        table.add_row(vec![
            Cell::new(s.generation),
            Cell::new(format!("{:.1}", s.min)).fg(Color::Cyan),
            Cell::new(format!("{:.1}", s.mean)),
            Cell::new(format!("{:.1}", s.std)),
            Cell::new(format!("{:.1}", s.max)),
            Cell::new(s.feasible),
        ]);
    }
    align_right(&mut table, 0..6);
    println!("\n{}", table);
}

pub fn print_trial_leaderboard(summary: &StudySummary, top: usize) {
    let mut ranked: Vec<_> = summary
        .trials
        .iter()
        .filter(|t| t.state == TrialState::Complete)
        .collect();
    ranked.sort_by(|a, b| {
        a.value
            .unwrap_or(f64::INFINITY)
            .total_cmp(&b.value.unwrap_or(f64::INFINITY))
    });

    let mut table = new_table();
    table.set_header(vec![
        Cell::new("#").add_attribute(Attribute::Bold),
        Cell::new("Value").fg(Color::Cyan),
        Cell::new("Params"),
    ]);
    for t in ranked.into_iter().take(top) {
        let params = t
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        table.add_row(vec![
            Cell::new(t.number),
            Cell::new(format!("{:.1}", t.value.unwrap_or(f64::NAN))).fg(Color::Cyan),
            Cell::new(params),
        ]);
    }
    align_right(&mut table, 0..2);

    println!("\nStudy '{}'", summary.study);
    println!("{}", table);
    println!(
        "complete {} | pruned {} | failed {}",
        summary.count(TrialState::Complete),
        summary.count(TrialState::Pruned),
        summary.count(TrialState::Failed)
    );
    if let Some(best) = &summary.best {
        println!(
            "Best trial #{} value {:.1}",
            best.number,
            best.value.unwrap_or(f64::NAN)
        );
    }
}
