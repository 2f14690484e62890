use crate::cmd::benchmark::BenchmarkRow;
use crate::cmd::simulate::Snapshot;
use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use spux_core::timing::Timing;
use spux_core::{Ensemble, Routing, Traffic};
use std::collections::{BTreeSet, HashSet};

fn new_table(header: Vec<Cell>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    table
}

fn right_align(table: &mut Table, from: usize, to: usize) {
    for i in from..=to {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }
}

fn slot(value: Option<usize>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub fn ensembles(title: &str, ensembles: &[Ensemble]) {
    let mut table = new_table(vec![
        Cell::new(title).add_attribute(Attribute::Bold),
        Cell::new("Size"),
        Cell::new("Particles"),
    ]);
    right_align(&mut table, 1, 1);

    for (worker, ensemble) in ensembles.iter().enumerate() {
        let listed: Vec<String> = ensemble.iter().map(ToString::to_string).collect();
        table.add_row(vec![
            Cell::new(format!("worker {}", worker)),
            Cell::new(ensemble.len()),
            Cell::new(listed.join(" ")),
        ]);
    }
    println!("\n{}", table);
}

pub fn routings(routings: &[Vec<Routing>]) {
    let mut table = new_table(vec![
        Cell::new("Index").add_attribute(Attribute::Bold),
        Cell::new("Source"),
        Cell::new("Dest"),
        Cell::new("Reindex"),
        Cell::new("Kind"),
    ]);
    right_align(&mut table, 0, 3);

    // Moves appear in two tables; list each tuple once.
    let mut unique: Vec<Routing> = routings
        .iter()
        .flatten()
        .copied()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    unique.sort_by_key(|r| (r.reindex, r.index, r.source));

    for routing in unique {
        let kind = match (routing.source, routing.destination) {
            (None, _) => Cell::new("init").fg(Color::Green),
            (_, None) => Cell::new("kill").fg(Color::Red),
            _ if routing.is_move() => Cell::new("move").fg(Color::Yellow),
            _ => Cell::new("stay"),
        };
        table.add_row(vec![
            Cell::new(routing.index),
            Cell::new(slot(routing.source)),
            Cell::new(slot(routing.destination)),
            Cell::new(slot(routing.reindex)),
            kind,
        ]);
    }
    println!("\n{}", table);
}

pub fn traffic(rows: &[(usize, Traffic)]) {
    let mut table = new_table(vec![
        Cell::new("Round").add_attribute(Attribute::Bold),
        Cell::new("Init"),
        Cell::new("Move").fg(Color::Yellow),
        Cell::new("Cost"),
        Cell::new("Copy"),
        Cell::new("Kill"),
    ]);
    right_align(&mut table, 0, 5);

    for (round, t) in rows {
        table.add_row(vec![
            Cell::new(round),
            Cell::new(format!("{:.3}", t.init)),
            Cell::new(format!("{:.3}", t.moves)).fg(Color::Yellow),
            Cell::new(format!("{:.3}", t.cost)),
            Cell::new(format!("{:.3}", t.copy)),
            Cell::new(format!("{:.3}", t.kill)),
        ]);
    }
    println!("\n{}", table);
}

pub fn snapshots(snapshots: &[Snapshot]) {
    let mut table = new_table(vec![
        Cell::new("Snapshot").add_attribute(Attribute::Bold),
        Cell::new("Observation"),
        Cell::new("Log-lik").fg(Color::Cyan),
        Cell::new("Redraw"),
    ]);
    right_align(&mut table, 0, 3);

    for (i, s) in snapshots.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i),
            Cell::new(format!("{:.3}", s.observation)),
            Cell::new(format!("{:.3}", s.log_likelihood)).fg(Color::Cyan),
            Cell::new(format!("{:.2}", s.redraw_rate)),
        ]);
    }
    println!("\n{}", table);
}

pub fn timing(manager: &Timing, workers: &Timing) {
    let mut table = new_table(vec![
        Cell::new("Phase").add_attribute(Attribute::Bold),
        Cell::new("Manager (s)"),
        Cell::new("Calls"),
        Cell::new("Workers (s)"),
        Cell::new("Calls"),
    ]);
    right_align(&mut table, 1, 4);

    let phases: BTreeSet<&String> = manager
        .runtimes
        .keys()
        .chain(workers.runtimes.keys())
        .collect();
    for phase in phases {
        table.add_row(vec![
            Cell::new(phase),
            Cell::new(format!("{:.4}", manager.runtime(phase))),
            Cell::new(manager.calls(phase)),
            Cell::new(format!("{:.4}", workers.runtime(phase))),
            Cell::new(workers.calls(phase)),
        ]);
    }
    println!("\n{}", table);
}

pub fn benchmark(rows: &[BenchmarkRow]) {
    let mut table = new_table(vec![
        Cell::new("Workers").add_attribute(Attribute::Bold),
        Cell::new("Rounds"),
        Cell::new("Routing (ms)").fg(Color::Cyan),
        Cell::new("Move"),
        Cell::new("Cost"),
        Cell::new("Copy"),
    ]);
    right_align(&mut table, 0, 5);

    for row in rows {
        table.add_row(vec![
            Cell::new(row.workers),
            Cell::new(row.rounds),
            Cell::new(format!("{:.4}", row.routing_ms)).fg(Color::Cyan),
            Cell::new(format!("{:.3}", row.traffic.moves)),
            Cell::new(format!("{:.3}", row.traffic.cost)),
            Cell::new(format!("{:.3}", row.traffic.copy)),
        ]);
    }
    println!("\n{}", table);
}
