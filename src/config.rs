use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{TbError, TbResult};

/// Stimulus and checking parameters of one Axi4Shared checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    pub id_width: u32,
    pub address_width: u32,
    /// bus data width in bits
    pub data_width: u32,
    pub non_zero_read_rsp_counter_target: u64,
    /// chance to issue a request on an edge with a free channel
    pub cmd_probability: f64,
    /// chance to accept a response in a given cycle
    pub rsp_ready_probability: f64,
    /// attempts to find an address not touched by an outstanding transaction
    pub address_retries: u32,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        CheckerConfig {
            id_width: 2,
            address_width: 12,
            data_width: 32,
            non_zero_read_rsp_counter_target: 2000,
            cmd_probability: 0.5,
            rsp_ready_probability: 0.8,
            address_retries: 8,
        }
    }
}

impl CheckerConfig {
    pub fn data_bytes(&self) -> usize {
        (self.data_width / 8) as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub half_period: u64,
    /// reset is held for this long from t=0
    pub reset_time: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        ClockConfig {
            half_period: 2,
            reset_time: 20,
        }
    }
}

/// Behavior of the on-chip RAM device model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RamConfig {
    pub cmd_ready_probability: f64,
    pub min_latency: u64,
    pub max_latency: u64,
    /// requests the device buffers before it stops accepting
    pub capacity: usize,
    /// flip bit 0 of every n-th read response
    pub corrupt_every_nth_read: Option<u64>,
}

impl Default for RamConfig {
    fn default() -> Self {
        RamConfig {
            cmd_ready_probability: 0.8,
            min_latency: 1,
            max_latency: 4,
            capacity: 8,
            corrupt_every_nth_read: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    /// global deadline in simulation time units, counted from the start of the run
    pub wait_tasks_end_time: u64,
    pub poll_interval: u64,
    /// stop at the first reported failure instead of checking until the end
    pub fail_fast: bool,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        PhaseConfig {
            wait_tasks_end_time: 200_000,
            poll_interval: 1000,
            fail_fast: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub name: String,
    pub seed: u64,
    pub bus_prefix: String,
    /// clock cycles between two simulation speed log lines, 0 disables the printer
    pub speed_print_cycles: u64,
    pub clock: ClockConfig,
    pub checker: CheckerConfig,
    pub ram: RamConfig,
    pub phase: PhaseConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            name: "axi4shared_onchip_ram".to_string(),
            seed: 0,
            bus_prefix: "io_axi".to_string(),
            speed_print_cycles: 0,
            clock: ClockConfig::default(),
            checker: CheckerConfig::default(),
            ram: RamConfig::default(),
            phase: PhaseConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let cfg: RunConfig = serde_yaml::from_str(yaml).context("Failed to parse run config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&yaml).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn validate(&self) -> TbResult<()> {
        let c = &self.checker;
        if !(1..=16).contains(&c.id_width) {
            return invalid(format!("id_width must be 1..=16, got {}", c.id_width));
        }
        if ![8, 16, 32, 64].contains(&c.data_width) {
            return invalid(format!(
                "data_width must be 8, 16, 32 or 64, got {}",
                c.data_width
            ));
        }
        let min_address_width = c.data_bytes().trailing_zeros();
        if c.address_width < min_address_width || c.address_width > 32 {
            return invalid(format!(
                "address_width must be {}..=32, got {}",
                min_address_width, c.address_width
            ));
        }
        for (name, p) in [
            ("cmd_probability", c.cmd_probability),
            ("rsp_ready_probability", c.rsp_ready_probability),
            ("cmd_ready_probability", self.ram.cmd_ready_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return invalid(format!("{} must be within 0..=1, got {}", name, p));
            }
        }
        if self.ram.min_latency > self.ram.max_latency {
            return invalid("ram min_latency exceeds max_latency".to_string());
        }
        if self.ram.capacity == 0 {
            return invalid("ram capacity must be at least 1".to_string());
        }
        if self.clock.half_period == 0 || self.phase.poll_interval == 0 {
            return invalid("half_period and poll_interval must be non-zero".to_string());
        }
        Ok(())
    }
}

fn invalid(msg: String) -> TbResult<()> {
    Err(TbError::InvalidConfig(msg))
}
