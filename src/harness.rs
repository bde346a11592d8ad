use log::info;

use crate::axi::Axi4Shared;
use crate::checker::Axi4SharedChecker;
use crate::clock::ClockDriver;
use crate::config::RunConfig;
use crate::error::TbResult;
use crate::model::OnChipRam;
use crate::phase::{PhaseManager, RunOutcome};
use crate::signal::Signal;
use crate::sim::Simulator;
use crate::utils::{fmt_time, speed_printer};

// keeps the device and checker random streams apart for the same seed
const RAM_SEED_SALT: u64 = 0x5eed_0a11_ce00_0001;

/// Runs one checker against the on-chip RAM model under a fresh simulator.
pub fn run_axi4shared(cfg: &RunConfig) -> TbResult<RunOutcome> {
    cfg.validate()?;
    info!(
        "{}: seed={} deadline={} target={}",
        cfg.name,
        cfg.seed,
        fmt_time(cfg.phase.wait_tasks_end_time),
        cfg.checker.non_zero_read_rsp_counter_target
    );

    let sim = Simulator::new();
    sim.add_signal("clk", 1, 0)?;
    sim.add_signal("reset", 1, 0)?;
    Axi4Shared::declare(&sim, &cfg.bus_prefix, &cfg.checker)?;

    let port = sim.port();
    let clk = Signal::lookup(&port, "clk")?;
    let reset = Signal::lookup(&port, "reset")?;
    let axi = Axi4Shared::lookup(&port, &cfg.bus_prefix)?;

    let mut manager = PhaseManager::new(&sim, cfg.phase.clone());

    let clock = ClockDriver::new(clk.clone(), Some(reset.clone()), &cfg.clock);
    manager.add_daemon("clock", clock.run(port.clone()));

    let ram = OnChipRam::new(
        axi.clone(),
        clk.clone(),
        reset.clone(),
        cfg.ram.clone(),
        cfg.seed ^ RAM_SEED_SALT,
    );
    manager.add_daemon("onchip_ram", ram.run());

    if cfg.speed_print_cycles > 0 {
        manager.add_daemon(
            "speed",
            speed_printer(port.clone(), clk.clone(), cfg.speed_print_cycles),
        );
    }

    Axi4SharedChecker::new(
        &cfg.name,
        &manager,
        axi,
        clk,
        reset,
        cfg.checker.clone(),
        cfg.seed,
    )
    .attach(&mut manager);

    sim.block_on(manager.run())
}
