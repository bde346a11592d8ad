use log::{info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::axi::Axi4Shared;
use crate::config::RamConfig;
use crate::error::{TaskResult, TbResult};
use crate::memory::{bytes_to_word, word_to_bytes, ReferenceMemory};
use crate::signal::Signal;

struct PendingRsp {
    id: u64,
    write: bool,
    data: u64,
    ready_at: u64,
}

/// Behavioral on-chip RAM behind an Axi4Shared slave port. Accepts commands with random
/// back-pressure and answers after a random latency, picking freely among the responses
/// that are due, so different ids come back out of order.
pub struct OnChipRam {
    cfg: RamConfig,
    axi: Axi4Shared,
    clk: Signal,
    reset: Signal,
    mem: ReferenceMemory,
    rng: StdRng,
    pending: Vec<PendingRsp>,
    // response currently presented on the response channel
    current: Option<PendingRsp>,
    reads_served: u64,
    cycle: u64,
}

impl OnChipRam {
    pub fn new(axi: Axi4Shared, clk: Signal, reset: Signal, cfg: RamConfig, seed: u64) -> Self {
        OnChipRam {
            mem: ReferenceMemory::new(axi.address_width()),
            cfg,
            axi,
            clk,
            reset,
            rng: StdRng::seed_from_u64(seed),
            pending: Vec::new(),
            current: None,
            reads_served: 0,
            cycle: 0,
        }
    }

    pub async fn run(mut self) -> TaskResult {
        if let Some(n) = self.cfg.corrupt_every_nth_read {
            warn!(
                "{:>10} ram: corrupting every {} read response",
                self.clk.sim_time(),
                n
            );
        }
        let mut in_reset = true;
        loop {
            self.clk.rising_edge().await;
            self.cycle += 1;
            if self.reset.bit() {
                self.pending.clear();
                self.current = None;
                self.axi.cmd_ready.set(0)?;
                self.axi.rsp_valid.set(0)?;
                in_reset = true;
                continue;
            }
            if in_reset {
                info!(
                    "{:>10} ram: out of reset at cycle {}",
                    self.clk.sim_time(),
                    self.cycle
                );
                in_reset = false;
            }

            if self.axi.rsp_fire() {
                self.current = None;
            }
            if self.axi.cmd_fire() {
                self.accept()?;
            }
            self.present_response()?;

            let ready = self.buffered() < self.cfg.capacity
                && self.rng.gen_bool(self.cfg.cmd_ready_probability);
            self.axi.cmd_ready.set_bit(ready)?;
        }
    }

    /// Requests taken but not yet answered, including the one on the response channel.
    fn buffered(&self) -> usize {
        self.pending.len() + usize::from(self.current.is_some())
    }

    fn accept(&mut self) -> TbResult<()> {
        let id = self.axi.cmd_id.u64();
        let write = self.axi.cmd_write.bit();
        let address = self.axi.cmd_addr.u64();
        let size = 1usize << self.axi.cmd_size.u64();
        let data = if write {
            self.mem
                .write(address, &word_to_bytes(self.axi.cmd_data.u64(), size))?;
            0
        } else {
            self.read(address, size)?
        };
        let latency = self
            .rng
            .gen_range(self.cfg.min_latency..=self.cfg.max_latency);
        self.pending.push(PendingRsp {
            id,
            write,
            data,
            ready_at: self.cycle + latency,
        });
        Ok(())
    }

    fn read(&mut self, address: u64, size: usize) -> TbResult<u64> {
        let mut data = bytes_to_word(&self.mem.read(address, size)?);
        self.reads_served += 1;
        if let Some(n) = self.cfg.corrupt_every_nth_read {
            if n > 0 && self.reads_served % n == 0 {
                data ^= 1;
            }
        }
        Ok(data)
    }

    fn present_response(&mut self) -> TbResult<()> {
        // a presented response stays on the bus until it is taken
        if self.current.is_none() {
            let due: Vec<usize> = (0..self.pending.len())
                .filter(|&i| self.pending[i].ready_at <= self.cycle)
                .collect();
            if !due.is_empty() {
                let pick = due[self.rng.gen_range(0..due.len())];
                let rsp = self.pending.swap_remove(pick);
                self.axi.rsp_id.set(rsp.id)?;
                self.axi.rsp_write.set_bit(rsp.write)?;
                self.axi.rsp_data.set(rsp.data)?;
                self.current = Some(rsp);
            }
        }
        self.axi.rsp_valid.set_bit(self.current.is_some())
    }
}
