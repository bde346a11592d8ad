use log::{debug, error, info};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;

use crate::axi::Axi4Shared;
use crate::config::CheckerConfig;
use crate::coverage::Coverage;
use crate::error::{TaskResult, TbError, TbResult};
use crate::ledger::{Kind, Response, TransactionLedger};
use crate::memory::{bytes_to_word, ReferenceMemory};
use crate::phase::{Phase, PhaseManager, PhaseSignal, Reporter};
use crate::signal::{width_mask, Signal};

/// Everything the checker mutates while running. Owned by the checker task alone.
pub struct CheckerState {
    pub ledger: TransactionLedger,
    pub memory: ReferenceMemory,
    rng: StdRng,
    cycle: u64,
    // id of the request currently presented on the command channel
    pending_cmd: Option<u32>,
}

impl CheckerState {
    pub fn new(cfg: &CheckerConfig, seed: u64) -> Self {
        CheckerState {
            ledger: TransactionLedger::new(cfg.id_width),
            memory: ReferenceMemory::new(cfg.address_width),
            rng: StdRng::seed_from_u64(seed),
            cycle: 0,
            pending_cmd: None,
        }
    }
}

/// Drives random reads and writes into an Axi4Shared slave and checks every read response
/// against a reference memory.
pub struct Axi4SharedChecker {
    name: String,
    cfg: CheckerConfig,
    state: CheckerState,
    axi: Axi4Shared,
    clk: Signal,
    reset: Signal,
    coverage: Arc<Coverage>,
    phase: PhaseSignal,
    reporter: Reporter,
}

impl Axi4SharedChecker {
    pub fn new(
        name: &str,
        manager: &PhaseManager,
        axi: Axi4Shared,
        clk: Signal,
        reset: Signal,
        cfg: CheckerConfig,
        seed: u64,
    ) -> Self {
        Axi4SharedChecker {
            name: name.to_string(),
            state: CheckerState::new(&cfg, seed),
            coverage: Arc::new(Coverage::new(name, cfg.non_zero_read_rsp_counter_target)),
            cfg,
            axi,
            clk,
            reset,
            phase: manager.phase(),
            reporter: manager.reporter(name),
        }
    }

    pub fn coverage(&self) -> Arc<Coverage> {
        self.coverage.clone()
    }

    /// Registers the checker and its coverage goal with the manager.
    pub fn attach(self, manager: &mut PhaseManager) {
        manager.track_coverage(self.coverage());
        let name = self.name.clone();
        manager.add_task(&name, self.run());
    }

    pub async fn run(mut self) -> TaskResult {
        self.idle_bus()?;
        loop {
            self.clk.rising_edge().await;
            self.state.cycle += 1;
            if self.reset.bit() {
                self.idle_bus()?;
                continue;
            }

            self.step()?;

            if self.phase.get() != Phase::Sim
                && self.state.pending_cmd.is_none()
                && self.state.ledger.is_empty()
            {
                info!(
                    "{:>10} {}: drained after {} transactions",
                    self.stamp(),
                    self.name,
                    self.coverage.total_transactions()
                );
                self.idle_bus()?;
                return Ok(());
            }
        }
    }

    fn step(&mut self) -> TbResult<()> {
        self.on_cmd_edge()?;
        // allocation goes first: an id completing on this edge is still busy
        if self.state.pending_cmd.is_none() && self.phase.get() == Phase::Sim {
            self.issue()?;
        }
        self.on_rsp_edge()
    }

    fn idle_bus(&mut self) -> TbResult<()> {
        self.state.pending_cmd = None;
        self.axi.cmd_valid.set(0)?;
        self.axi.rsp_ready.set(0)
    }

    fn on_cmd_edge(&mut self) -> TbResult<()> {
        let Some(id) = self.state.pending_cmd else {
            return Ok(());
        };
        if self.axi.cmd_fire() {
            self.state.ledger.accept(id, self.state.cycle)?;
            self.state.pending_cmd = None;
            self.axi.cmd_valid.set(0)?;
        }
        Ok(())
    }

    fn issue(&mut self) -> TbResult<()> {
        if !self.state.rng.gen_bool(self.cfg.cmd_probability) {
            return Ok(());
        }
        let free = self.state.ledger.free_ids();
        if free.is_empty() {
            return Ok(());
        }
        let id = free[self.state.rng.gen_range(0..free.len())];
        let kind = if self.state.rng.gen_bool(0.5) {
            Kind::Write
        } else {
            Kind::Read
        };
        let size_log2 = self
            .state
            .rng
            .gen_range(0..=self.cfg.data_bytes().trailing_zeros());
        let size = 1usize << size_log2;
        let Some(address) = self.pick_address(size) else {
            debug!("{:>10} {}: no free address for {} bytes", self.stamp(), self.name, size);
            return Ok(());
        };
        let data: Vec<u8> = match kind {
            Kind::Write => (0..size).map(|_| self.state.rng.gen::<u8>()).collect(),
            Kind::Read => Vec::new(),
        };

        let t = self.state.ledger.allocate(
            id,
            kind,
            address,
            size,
            data,
            self.state.cycle,
        )?;
        self.axi.cmd_id.set(t.id as u64)?;
        self.axi.cmd_write.set_bit(t.kind.is_write())?;
        self.axi.cmd_addr.set(t.address)?;
        self.axi.cmd_size.set(size_log2 as u64)?;
        self.axi.cmd_data.set(bytes_to_word(&t.data))?;
        self.axi.cmd_valid.set(1)?;
        self.state.pending_cmd = Some(id);
        debug!(
            "{:>10} {}: issue {:?} id={} addr={:#x} size={}",
            self.stamp(),
            self.name,
            t.kind,
            t.id,
            t.address,
            t.size
        );
        Ok(())
    }

    fn pick_address(&mut self, size: usize) -> Option<u64> {
        let slots = self.state.memory.size() / size as u64;
        for _ in 0..self.cfg.address_retries.max(1) {
            let address = self.state.rng.gen_range(0..slots) * size as u64;
            if !self.state.ledger.overlaps(address, size) {
                return Some(address);
            }
        }
        None
    }

    fn on_rsp_edge(&mut self) -> TbResult<()> {
        if self.axi.rsp_fire() {
            let response = Response {
                id: self.axi.rsp_id.u64() as u32,
                kind: Kind::from_write_bit(self.axi.rsp_write.bit()),
                data: self.axi.rsp_data.u64(),
            };
            self.check_response(&response)?;
        }
        let ready = self.state.rng.gen_bool(self.cfg.rsp_ready_probability);
        self.axi.rsp_ready.set_bit(ready)
    }

    fn check_response(&mut self, response: &Response) -> TbResult<()> {
        let t = self.state.ledger.complete(response.id, response)?;
        self.coverage.record_transaction();
        match t.kind {
            Kind::Write => self.state.memory.write(t.address, &t.data),
            Kind::Read => {
                let expected = self.state.memory.read_word(t.address, t.size)?;
                let observed = response.data & width_mask(8 * t.size as u32);
                if observed != 0 {
                    self.coverage.record_non_zero_read();
                }
                if observed != expected {
                    let mismatch = TbError::DataMismatch {
                        id: t.id,
                        address: t.address,
                        expected,
                        observed,
                    };
                    error!("{:>10} {}: {}", self.stamp(), self.name, mismatch);
                    self.reporter.report(mismatch);
                }
                Ok(())
            }
        }
    }

    fn stamp(&self) -> u64 {
        self.clk.sim_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhaseConfig;
    use crate::phase::Status;
    use crate::sim::Simulator;

    struct Bench {
        sim: Simulator,
        manager: PhaseManager,
        axi: Axi4Shared,
        clk: Signal,
        reset: Signal,
    }

    fn bench(cfg: &CheckerConfig) -> Bench {
        let sim = Simulator::new();
        sim.add_signal("clk", 1, 0).unwrap();
        sim.add_signal("reset", 1, 0).unwrap();
        Axi4Shared::declare(&sim, "io_axi", cfg).unwrap();
        let port = sim.port();
        let manager = PhaseManager::new(
            &sim,
            PhaseConfig {
                wait_tasks_end_time: 1000,
                poll_interval: 10,
                fail_fast: false,
            },
        );
        Bench {
            axi: Axi4Shared::lookup(&port, "io_axi").unwrap(),
            clk: Signal::lookup(&port, "clk").unwrap(),
            reset: Signal::lookup(&port, "reset").unwrap(),
            sim,
            manager,
        }
    }

    #[test]
    fn read_of_written_byte_returns_written_byte() {
        let cfg = CheckerConfig {
            non_zero_read_rsp_counter_target: 1,
            ..CheckerConfig::default()
        };
        let mut b = bench(&cfg);
        let mut checker = Axi4SharedChecker::new(
            "checker",
            &b.manager,
            b.axi.clone(),
            b.clk.clone(),
            b.reset.clone(),
            cfg,
            0,
        );
        checker.state.memory.write(0x100, &[0xAB]).unwrap();
        checker
            .state
            .ledger
            .allocate(1, Kind::Read, 0x100, 1, vec![], 0)
            .unwrap();
        checker.state.ledger.accept(1, 0).unwrap();
        checker
            .check_response(&Response {
                id: 1,
                kind: Kind::Read,
                data: 0xAB,
            })
            .unwrap();
        assert!(checker.coverage.is_satisfied());
        assert!(checker.state.ledger.is_empty());

        // unknown id is a protocol violation
        assert_eq!(
            checker.check_response(&Response {
                id: 3,
                kind: Kind::Read,
                data: 0
            }),
            Err(TbError::UnknownId(3))
        );

        // mismatches are reported, not returned
        checker
            .state
            .ledger
            .allocate(2, Kind::Read, 0x100, 1, vec![], 1)
            .unwrap();
        checker.state.ledger.accept(2, 1).unwrap();
        checker
            .check_response(&Response {
                id: 2,
                kind: Kind::Read,
                data: 0xAC,
            })
            .unwrap();
        let port = b.sim.port();
        b.manager.add_task("noop", async move {
            port.wait_time(1).await;
            Ok(())
        });
        let outcome = b.sim.block_on(b.manager.run()).unwrap();
        assert_eq!(outcome.status, Status::Fail);
        assert_eq!(
            outcome.first_error,
            Some(TbError::DataMismatch {
                id: 2,
                address: 0x100,
                expected: 0xAB,
                observed: 0xAC
            })
        );
    }

    #[test]
    fn write_completion_updates_reference_memory() {
        let cfg = CheckerConfig::default();
        let b = bench(&cfg);
        let mut checker =
            Axi4SharedChecker::new("checker", &b.manager, b.axi, b.clk, b.reset, cfg, 0);
        checker
            .state
            .ledger
            .allocate(0, Kind::Write, 0x40, 4, vec![1, 2, 3, 4], 0)
            .unwrap();
        checker.state.ledger.accept(0, 2).unwrap();
        checker
            .check_response(&Response {
                id: 0,
                kind: Kind::Write,
                data: 0,
            })
            .unwrap();
        assert_eq!(checker.state.memory.read_word(0x40, 4).unwrap(), 0x0403_0201);
        assert_eq!(checker.coverage.total_transactions(), 1);
        assert_eq!(checker.coverage.non_zero_read_rsp(), 0);
    }

    #[test]
    fn issued_requests_are_aligned_and_never_overlap() {
        let cfg = CheckerConfig {
            cmd_probability: 1.0,
            address_width: 4,
            ..CheckerConfig::default()
        };
        let b = bench(&cfg);
        let mut checker =
            Axi4SharedChecker::new("checker", &b.manager, b.axi, b.clk, b.reset, cfg, 3);
        for _ in 0..4 {
            checker.issue().unwrap();
            checker.state.pending_cmd = None;
        }
        let ids: Vec<u32> = (0..4).filter(|&id| checker.state.ledger.is_busy(id)).collect();
        let mut ranges: Vec<(u64, u64)> = ids
            .iter()
            .filter_map(|&id| checker.state.ledger.get(id))
            .map(|t| {
                assert_eq!(t.address % t.size as u64, 0);
                (t.address, t.address + t.size as u64)
            })
            .collect();
        ranges.sort();
        for pair in ranges.windows(2) {
            assert!(pair[0].1 <= pair[1].0);
        }
        assert!(!ids.is_empty());
    }

    #[test]
    fn completing_id_is_not_reissued_on_the_same_edge() {
        let cfg = CheckerConfig {
            id_width: 1,
            cmd_probability: 1.0,
            ..CheckerConfig::default()
        };
        let b = bench(&cfg);
        let axi = b.axi.clone();
        let mut checker =
            Axi4SharedChecker::new("checker", &b.manager, b.axi, b.clk, b.reset, cfg, 0);
        checker.phase.set(Phase::Sim);
        for (id, address) in [(0, 0x0), (1, 0x10)] {
            checker
                .state
                .ledger
                .allocate(id, Kind::Read, address, 1, vec![], 0)
                .unwrap();
            checker.state.ledger.accept(id, 0).unwrap();
        }

        // response for id 0 is taken on this edge while both ids are outstanding
        axi.rsp_valid.set(1).unwrap();
        axi.rsp_ready.set(1).unwrap();
        axi.rsp_id.set(0).unwrap();
        axi.rsp_write.set(0).unwrap();
        axi.rsp_data.set(0).unwrap();
        let port = b.sim.port();
        b.sim
            .block_on(async move { port.wait_time(1).await })
            .unwrap();
        checker.step().unwrap();
        assert_eq!(checker.state.pending_cmd, None);
        assert_eq!(checker.state.ledger.free_ids(), vec![0]);
        assert!(checker.state.ledger.is_busy(1));

        // id 0 is free again from the next edge on
        axi.rsp_valid.set(0).unwrap();
        let port = b.sim.port();
        b.sim
            .block_on(async move { port.wait_time(1).await })
            .unwrap();
        checker.step().unwrap();
        assert_eq!(checker.state.pending_cmd, Some(0));
        assert!(checker.state.ledger.is_busy(0));
    }
}
