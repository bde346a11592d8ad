use log::info;
use num_format::{Locale, ToFormattedString};
use std::time::Instant;

use crate::error::TaskResult;
use crate::signal::{Port, Signal};

pub async fn clock_cycles(clk: &Signal, n_cycles: u64) {
    for _ in 0..n_cycles {
        clk.rising_edge().await;
    }
}

/// Simulation time with thousands separators, e.g. `1,234,567`.
pub fn fmt_time(time: u64) -> String {
    time.to_formatted_string(&Locale::en)
}

/// Logs simulated cycles per wall clock second every `every` cycles.
pub async fn speed_printer(port: Port, clk: Signal, every: u64) -> TaskResult {
    let every = every.max(1);
    let mut last = Instant::now();
    let mut cycles: u64 = 0;
    loop {
        clock_cycles(&clk, every).await;
        cycles += every;
        let secs = last.elapsed().as_secs_f64();
        last = Instant::now();
        let speed = if secs > 0.0 { (every as f64 / secs) as u64 } else { 0 };
        info!(
            "{} cycles simulated, t={}, {} cycles/s",
            fmt_time(cycles),
            fmt_time(port.sim_time()),
            fmt_time(speed)
        );
    }
}
