use futures::future::{BoxFuture, FutureExt};
use intmap::IntMap;
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, Weak};

use crate::error::{TbError, TbResult};
use crate::executor::{Executor, JoinHandle};
use crate::signal::{width_mask, Port, SignalId, SignalPort};
use crate::tb_obj::{lock, TbObj};
use crate::trigger::{EdgeKind, TrigKind, TrigShared, Trigger};

struct SignalState {
    name: String,
    width: u32,
    value: u64,
}

/// Signal store and time wheel of the simulation.
pub(crate) struct Kernel {
    time: u64,
    signals: Vec<SignalState>,
    names: HashMap<String, SignalId>,
    // drives of the current delta in first-drive order, last value wins
    pending: Vec<(SignalId, u64)>,
    // key is absolute time
    timers: BTreeMap<u64, Vec<Weak<TrigShared>>>,
    // key is signal id
    edges: IntMap<Vec<(EdgeKind, Weak<TrigShared>)>>,
    read_only: Vec<Weak<TrigShared>>,
}

impl Kernel {
    fn new() -> Self {
        Kernel {
            time: 0,
            signals: Vec::new(),
            names: HashMap::new(),
            pending: Vec::new(),
            timers: BTreeMap::new(),
            edges: IntMap::new(),
            read_only: Vec::new(),
        }
    }

    pub(crate) fn register(&mut self, kind: TrigKind, shared: Weak<TrigShared>) {
        match kind {
            TrigKind::Timer(delay) => {
                let abs_time = self.time + delay;
                self.timers.entry(abs_time).or_default().push(shared);
            }
            TrigKind::Edge(id, edge_kind) => {
                if let Some(waiters) = self.edges.get_mut(id.key()) {
                    waiters.push((edge_kind, shared));
                } else {
                    self.edges.insert(id.key(), vec![(edge_kind, shared)]);
                }
            }
            TrigKind::ReadOnly => self.read_only.push(shared),
        }
    }

    fn drive(&mut self, id: SignalId, value: u64) {
        if let Some(slot) = self.pending.iter_mut().find(|(pid, _)| *pid == id) {
            slot.1 = value;
        } else {
            self.pending.push((id, value));
        }
    }

    /// Commits the drives of the finished delta and collects the edge waiters to fire.
    fn commit(&mut self) -> Vec<Arc<TrigShared>> {
        let mut fired = Vec::new();
        for (id, value) in std::mem::take(&mut self.pending) {
            let Some(signal) = self.signals.get_mut(id.0) else {
                continue;
            };
            let old = signal.value;
            if old == value {
                continue;
            }
            signal.value = value;
            let seen = EdgeKind::of_change(old, value);
            let Some(waiters) = self.edges.remove(id.key()) else {
                continue;
            };
            let mut resched = Vec::new();
            for (kind, weak) in waiters {
                let Some(shared) = weak.upgrade() else {
                    continue;
                };
                if kind.matches(seen) {
                    fired.push(shared);
                } else {
                    resched.push((kind, weak));
                }
            }
            if !resched.is_empty() {
                self.edges.insert(id.key(), resched);
            }
        }
        fired
    }

    fn take_read_only(&mut self) -> Vec<Arc<TrigShared>> {
        std::mem::take(&mut self.read_only)
            .into_iter()
            .filter_map(|weak| weak.upgrade())
            .collect()
    }

    /// Moves time to the earliest timer that still has a live waiter.
    fn advance(&mut self) -> Option<Vec<Arc<TrigShared>>> {
        while let Some((time, waiters)) = self.timers.pop_first() {
            let live: Vec<_> = waiters.into_iter().filter_map(|w| w.upgrade()).collect();
            if !live.is_empty() {
                self.time = time;
                return Some(live);
            }
        }
        None
    }
}

/// Discrete-event simulation of a set of named signals plus the executor running the
/// testbench tasks against them.
#[derive(Clone)]
pub struct Simulator {
    kernel: Arc<Mutex<Kernel>>,
    executor: Executor,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        Simulator {
            kernel: Arc::new(Mutex::new(Kernel::new())),
            executor: Executor::new(),
        }
    }

    pub fn add_signal(&self, name: &str, width: u32, init: u64) -> TbResult<SignalId> {
        if width == 0 || width > 64 {
            return Err(TbError::InvalidConfig(format!(
                "signal '{}' has unsupported width {}",
                name, width
            )));
        }
        check_fits(name, width, init)?;
        let mut kernel = lock(&self.kernel);
        if kernel.names.contains_key(name) {
            return Err(TbError::InvalidConfig(format!(
                "signal '{}' declared twice",
                name
            )));
        }
        let id = SignalId(kernel.signals.len());
        kernel.signals.push(SignalState {
            name: name.to_string(),
            width,
            value: init,
        });
        kernel.names.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn port(&self) -> Port {
        Arc::new(self.clone())
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn spawn(
        &self,
        future: impl Future<Output = crate::TaskResult> + Send + 'static,
        name: &str,
    ) -> JoinHandle {
        self.executor.spawn(future, name)
    }

    pub fn time(&self) -> u64 {
        lock(&self.kernel).time
    }

    /// Runs the simulation until `future` resolves. Fails with `Stalled` if no pending
    /// event can ever wake it.
    pub fn block_on<T: Send + 'static>(
        &self,
        future: impl Future<Output = T> + Send + 'static,
    ) -> TbResult<T> {
        let slot = TbObj::new(None);
        let out = slot.clone();
        let _root = self.executor.spawn(
            async move {
                let result = future.await;
                out.with_mut(|o| *o = Some(result));
                Ok(())
            },
            "root",
        );

        loop {
            // delta cycles of the current time step
            loop {
                self.executor.run_once();
                if let Some(result) = slot.with_mut(Option::take) {
                    return Ok(result);
                }
                let fired = lock(&self.kernel).commit();
                if !fired.is_empty() {
                    fire_all(fired);
                    continue;
                }
                let read_only = lock(&self.kernel).take_read_only();
                if !read_only.is_empty() {
                    fire_all(read_only);
                    continue;
                }
                break;
            }

            let next = lock(&self.kernel).advance();
            match next {
                Some(fired) => fire_all(fired),
                None => {
                    let time = self.time();
                    debug!("no events left at t={}", time);
                    return Err(TbError::Stalled(time));
                }
            }
        }
    }

    fn trigger(&self, kind: TrigKind) -> BoxFuture<'static, ()> {
        Trigger::new(kind, self.kernel.clone()).boxed()
    }
}

fn fire_all(fired: Vec<Arc<TrigShared>>) {
    for shared in fired {
        shared.fire();
    }
}

fn check_fits(name: &str, width: u32, value: u64) -> TbResult<()> {
    if value & !width_mask(width) != 0 {
        return Err(TbError::ValueOutOfRange {
            name: name.to_string(),
            width,
            value,
        });
    }
    Ok(())
}

impl SignalPort for Simulator {
    fn lookup(&self, name: &str) -> TbResult<SignalId> {
        lock(&self.kernel)
            .names
            .get(name)
            .copied()
            .ok_or_else(|| TbError::UnknownSignal(name.to_string()))
    }

    fn name(&self, id: SignalId) -> String {
        lock(&self.kernel)
            .signals
            .get(id.0)
            .map(|s| s.name.clone())
            .unwrap_or_default()
    }

    fn width(&self, id: SignalId) -> u32 {
        lock(&self.kernel).signals.get(id.0).map_or(0, |s| s.width)
    }

    fn read_bits(&self, id: SignalId) -> u64 {
        lock(&self.kernel).signals.get(id.0).map_or(0, |s| s.value)
    }

    fn drive_bits(&self, id: SignalId, value: u64) -> TbResult<()> {
        let mut kernel = lock(&self.kernel);
        let Some(signal) = kernel.signals.get(id.0) else {
            return Err(TbError::UnknownSignal(format!("#{}", id.0)));
        };
        check_fits(&signal.name, signal.width, value)?;
        kernel.drive(id, value);
        Ok(())
    }

    fn wait_edge(&self, id: SignalId, kind: EdgeKind) -> BoxFuture<'static, ()> {
        self.trigger(TrigKind::Edge(id, kind))
    }

    fn wait_time(&self, steps: u64) -> BoxFuture<'static, ()> {
        self.trigger(TrigKind::Timer(steps))
    }

    fn wait_read_only(&self) -> BoxFuture<'static, ()> {
        self.trigger(TrigKind::ReadOnly)
    }

    fn sim_time(&self) -> u64 {
        self.time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;

    #[test]
    fn drives_are_visible_after_the_delta() {
        let sim = Simulator::new();
        let port = sim.port();
        sim.add_signal("a", 8, 0).unwrap();
        let a = Signal::lookup(&port, "a").unwrap();
        let seen = sim
            .block_on(async move {
                a.set(5).unwrap();
                let before = a.u64();
                port.wait_time(1).await;
                (before, a.u64())
            })
            .unwrap();
        assert_eq!(seen, (0, 5));
        assert_eq!(sim.time(), 1);
    }

    #[test]
    fn rising_edge_ignores_falling_changes() {
        let sim = Simulator::new();
        let port = sim.port();
        sim.add_signal("clk", 1, 0).unwrap();
        let clk = Signal::lookup(&port, "clk").unwrap();
        let driver = clk.clone();
        let driver_port = port.clone();
        sim.spawn(
            async move {
                for _ in 0..3 {
                    driver.set(1)?;
                    driver_port.wait_time(5).await;
                    driver.set(0)?;
                    driver_port.wait_time(5).await;
                }
                Ok(())
            },
            "clk",
        );
        let times = sim
            .block_on(async move {
                let mut times = Vec::new();
                for _ in 0..3 {
                    clk.rising_edge().await;
                    times.push(port.sim_time());
                }
                times
            })
            .unwrap();
        assert_eq!(times, vec![0, 10, 20]);
    }

    #[test]
    fn out_of_range_drive_is_rejected() {
        let sim = Simulator::new();
        let id = sim.add_signal("narrow", 4, 0).unwrap();
        assert!(matches!(
            sim.drive_bits(id, 0x10),
            Err(TbError::ValueOutOfRange { width: 4, .. })
        ));
        assert_eq!(
            sim.lookup("missing"),
            Err(TbError::UnknownSignal("missing".to_string()))
        );
    }

    #[test]
    fn waiting_on_nothing_stalls() {
        let sim = Simulator::new();
        let id = sim.add_signal("never", 1, 0).unwrap();
        let port = sim.port();
        let result = sim.block_on(async move { port.wait_edge(id, EdgeKind::Any).await });
        assert_eq!(result, Err(TbError::Stalled(0)));
    }

    #[test]
    fn read_only_runs_after_all_deltas() {
        let sim = Simulator::new();
        let port = sim.port();
        sim.add_signal("x", 4, 0).unwrap();
        let x = Signal::lookup(&port, "x").unwrap();
        let writer = x.clone();
        sim.spawn(
            async move {
                writer.set(1)?;
                writer.edge().await;
                writer.set(2)?;
                Ok(())
            },
            "writer",
        );
        let value = sim
            .block_on(async move {
                port.wait_read_only().await;
                x.u64()
            })
            .unwrap();
        assert_eq!(value, 2);
    }

    #[test]
    fn signals_report_the_simulation_time() {
        let sim = Simulator::new();
        let port = sim.port();
        sim.add_signal("clk", 1, 0).unwrap();
        let clk = Signal::lookup(&port, "clk").unwrap();
        assert_eq!(clk.sim_time(), 0);
        let stamped = sim
            .block_on(async move {
                port.wait_time(7).await;
                clk.sim_time()
            })
            .unwrap();
        assert_eq!(stamped, 7);
        assert_eq!(stamped, sim.time());
    }
}
