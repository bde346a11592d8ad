use anyhow::{Context, Result};
use junit_report::{Duration, ReportBuilder, TestCaseBuilder, TestSuiteBuilder};
use log::{error, info};
use prettytable::{Cell, Row, Table};
use std::fs::File;
use std::path::Path;

use crate::phase::{RunOutcome, Status};
use crate::utils::fmt_time;

/// Summary table of a finished run: one row per coverage counter plus the overall verdict.
pub fn summary_table(name: &str, outcome: &RunOutcome, wall_secs: f64) -> Table {
    let mut table = Table::new();
    table.set_titles(Row::new(vec![
        Cell::new("checker"),
        Cell::new("nonZeroReadRspCounter"),
        Cell::new("target"),
        Cell::new("transactions"),
    ]));
    for c in &outcome.counters {
        table.add_row(Row::new(vec![
            Cell::new(&c.name),
            Cell::new(&c.non_zero_read_rsp_counter.to_string()),
            Cell::new(&c.target.to_string()),
            Cell::new(&c.total_transactions.to_string()),
        ]));
    }
    let speed = if wall_secs > 0.0 {
        (outcome.sim_time as f64 / wall_secs) as u64
    } else {
        0
    };
    table.add_row(Row::new(vec![
        Cell::new(name),
        Cell::new(&format!("{:?}", outcome.status)),
        Cell::new(&format!("t={}", fmt_time(outcome.sim_time))),
        Cell::new(&format!("{:.3}s, {}/s", wall_secs, fmt_time(speed))),
    ]));
    table
}

pub fn log_outcome(name: &str, outcome: &RunOutcome, wall_secs: f64) {
    info!("\n{}", summary_table(name, outcome, wall_secs));
    match (&outcome.status, &outcome.first_error) {
        (Status::Pass, _) => info!("{} passed", name),
        (_, Some(e)) => error!("{} {:?}: {}", name, outcome.status, e),
        (_, None) => error!("{} {:?}", name, outcome.status),
    }
}

fn failure_message(outcome: &RunOutcome) -> String {
    match &outcome.first_error {
        Some(e) => format!("{} ({} failure(s))", e, outcome.failures),
        None => format!("{:?}", outcome.status),
    }
}

/// Writes a single-testcase JUnit report for the run.
pub fn write_junit(name: &str, outcome: &RunOutcome, wall_secs: f64, path: &Path) -> Result<()> {
    let duration = Duration::seconds_f64(wall_secs);
    let tc = match outcome.status {
        Status::Pass => TestCaseBuilder::success(name, duration),
        status => TestCaseBuilder::failure(
            name,
            duration,
            &format!("{:?}", status),
            &failure_message(outcome),
        ),
    }
    .build();

    let test_suite = TestSuiteBuilder::new(name).add_testcase(tc).build();
    let report = ReportBuilder::new().add_testsuite(test_suite).build();
    let file = File::create(path)
        .with_context(|| format!("Failed to create junit report {}", path.display()))?;
    report
        .write_xml(file)
        .with_context(|| format!("Failed to write junit report {}", path.display()))?;
    Ok(())
}
