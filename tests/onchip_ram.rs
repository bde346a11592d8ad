use axi4shared_tb::prelude::*;
use axi4shared_tb::report::{log_outcome, summary_table};

fn reference() -> RunConfig {
    let _ = env_logger::builder().is_test(true).try_init();
    RunConfig::default()
}

#[test]
fn reference_run_passes_with_full_coverage() {
    let outcome = run_axi4shared(&reference()).unwrap();
    assert_eq!(outcome.status, Status::Pass, "{:?}", outcome.first_error);
    assert_eq!(outcome.terminal, ManagerState::Completed);
    assert_eq!(outcome.failures, 0);
    let counters = &outcome.counters[0];
    assert!(counters.non_zero_read_rsp_counter >= 2000);
    assert!(counters.total_transactions >= counters.non_zero_read_rsp_counter);
    let met_at = outcome.coverage_met_at.unwrap();
    assert!(met_at <= 200_000);
    assert!(outcome.sim_time >= met_at);
}

#[test]
fn same_seed_gives_the_same_run() {
    let mut cfg = reference();
    cfg.seed = 42;
    cfg.checker.non_zero_read_rsp_counter_target = 200;
    let a = run_axi4shared(&cfg).unwrap();
    let b = run_axi4shared(&cfg).unwrap();
    assert_eq!(a, b);
    assert!(a.passed());

    cfg.seed = 43;
    let c = run_axi4shared(&cfg).unwrap();
    assert!(c.passed());
    assert_ne!(
        (a.sim_time, a.coverage_met_at, a.counters),
        (c.sim_time, c.coverage_met_at, c.counters)
    );
}

#[test]
fn short_deadline_times_out_with_insufficient_coverage() {
    let mut cfg = reference();
    cfg.phase.wait_tasks_end_time = 2_000;
    let outcome = run_axi4shared(&cfg).unwrap();
    assert_eq!(outcome.status, Status::TimedOutInsufficientCoverage);
    assert_eq!(outcome.terminal, ManagerState::TimedOut);
    assert_eq!(outcome.sim_time, 2_000);
    assert_eq!(outcome.coverage_met_at, None);
    match outcome.first_error {
        Some(TbError::InsufficientCoverage { reached, target, .. }) => {
            assert!(reached < target);
            assert_eq!(target, 2000);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn unreachable_target_never_passes() {
    let mut cfg = reference();
    cfg.phase.wait_tasks_end_time = 20_000;
    cfg.checker.non_zero_read_rsp_counter_target = 1_000_000;
    let outcome = run_axi4shared(&cfg).unwrap();
    assert!(!outcome.passed());
    assert_eq!(outcome.status, Status::TimedOutInsufficientCoverage);
    assert!(outcome.counters[0].non_zero_read_rsp_counter > 0);
}

#[test]
fn corrupted_read_data_fails_the_run() {
    let mut cfg = reference();
    cfg.ram.corrupt_every_nth_read = Some(5);
    let outcome = run_axi4shared(&cfg).unwrap();
    assert_eq!(outcome.status, Status::Fail);
    assert!(outcome.failures >= 1);
    match outcome.first_error {
        Some(TbError::DataMismatch {
            expected, observed, ..
        }) => assert_eq!(expected ^ observed, 1),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn fail_fast_stops_at_the_first_mismatch() {
    let mut cfg = reference();
    cfg.ram.corrupt_every_nth_read = Some(5);
    cfg.phase.fail_fast = true;
    let outcome = run_axi4shared(&cfg).unwrap();
    assert_eq!(outcome.status, Status::Fail);
    assert_eq!(outcome.terminal, ManagerState::Completed);
    assert!(outcome.sim_time < 200_000);
}

#[test]
fn narrow_bus_and_wide_ids_still_pass() {
    let mut cfg = reference();
    cfg.checker.data_width = 8;
    cfg.checker.id_width = 4;
    cfg.checker.address_width = 8;
    cfg.checker.non_zero_read_rsp_counter_target = 300;
    let outcome = run_axi4shared(&cfg).unwrap();
    assert_eq!(outcome.status, Status::Pass, "{:?}", outcome.first_error);
}

#[test]
fn invalid_config_is_rejected_before_running() {
    let mut cfg = reference();
    cfg.ram.min_latency = 5;
    cfg.ram.max_latency = 2;
    assert!(matches!(
        run_axi4shared(&cfg),
        Err(TbError::InvalidConfig(_))
    ));
}

#[test]
fn summary_of_a_finished_run_renders() {
    let mut cfg = reference();
    cfg.checker.non_zero_read_rsp_counter_target = 50;
    let outcome = run_axi4shared(&cfg).unwrap();
    assert!(outcome.passed());
    let text = summary_table(&cfg.name, &outcome, 0.1).to_string();
    assert!(text.contains(&cfg.name));
    assert!(text.contains("Pass"));
    assert!(text.contains(&outcome.counters[0].non_zero_read_rsp_counter.to_string()));
    log_outcome(&cfg.name, &outcome, 0.1);
}
