use log::{info, warn};

use crate::config::ClockConfig;
use crate::error::TaskResult;
use crate::signal::{Port, Signal};

/// Two-phase clock with an initial, active high reset pulse. The clock already toggles
/// while reset is held, so synchronous logic sees the reset on clock edges.
#[derive(Clone, Debug)]
pub struct ClockDriver {
    clk: Signal,
    reset: Option<Signal>,
    half_period: u64,
    reset_time: u64,
}

impl ClockDriver {
    pub fn new(clk: Signal, reset: Option<Signal>, cfg: &ClockConfig) -> Self {
        ClockDriver {
            clk,
            reset,
            half_period: cfg.half_period,
            reset_time: cfg.reset_time,
        }
    }

    pub fn period(&self) -> u64 {
        2 * self.half_period
    }

    pub async fn run(self, port: Port) -> TaskResult {
        if self.half_period == 0 {
            warn!("clock half period of 0 would stall time, using 1");
        }
        let half_period = self.half_period.max(1);
        if let Some(reset) = &self.reset {
            reset.set(1)?;
        }
        let mut elapsed = 0;
        let mut in_reset = self.reset.is_some();
        loop {
            if in_reset && elapsed >= self.reset_time {
                if let Some(reset) = &self.reset {
                    reset.set(0)?;
                    info!("{:>10} reset released", port.sim_time());
                }
                in_reset = false;
            }
            self.clk.set(0)?;
            port.wait_time(half_period).await;
            self.clk.set(1)?;
            port.wait_time(half_period).await;
            elapsed += 2 * half_period;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Simulator;

    #[test]
    fn reset_is_released_after_reset_time() {
        let sim = Simulator::new();
        sim.add_signal("clk", 1, 0).unwrap();
        sim.add_signal("reset", 1, 0).unwrap();
        let port = sim.port();
        let clk = Signal::lookup(&port, "clk").unwrap();
        let reset = Signal::lookup(&port, "reset").unwrap();
        let cfg = ClockConfig {
            half_period: 5,
            reset_time: 20,
        };
        let driver = ClockDriver::new(clk.clone(), Some(reset.clone()), &cfg);
        assert_eq!(driver.period(), 10);
        sim.spawn(driver.run(port.clone()), "clock");

        let samples = sim
            .block_on(async move {
                let mut samples = Vec::new();
                for _ in 0..4 {
                    clk.rising_edge().await;
                    samples.push((port.sim_time(), reset.bit()));
                }
                samples
            })
            .unwrap();
        assert_eq!(
            samples,
            vec![(5, true), (15, true), (25, false), (35, false)]
        );
    }

    #[test]
    fn reset_falls_while_the_clock_is_low() {
        let sim = Simulator::new();
        sim.add_signal("clk", 1, 0).unwrap();
        sim.add_signal("reset", 1, 0).unwrap();
        let port = sim.port();
        let clk = Signal::lookup(&port, "clk").unwrap();
        let reset = Signal::lookup(&port, "reset").unwrap();
        let driver = ClockDriver::new(clk.clone(), Some(reset.clone()), &ClockConfig::default());
        sim.spawn(driver.run(port.clone()), "clock");

        let (time, clk_high) = sim
            .block_on(async move {
                reset.falling_edge().await;
                (port.sim_time(), clk.bit())
            })
            .unwrap();
        assert_eq!(time, 20);
        assert!(!clk_high);
    }
}
