use futures::future::{select, BoxFuture, Either, FutureExt};
use futures::StreamExt;
use futures_channel::mpsc;
use log::{error, info, warn};
use std::future::Future;
use std::sync::Arc;

use crate::config::PhaseConfig;
use crate::coverage::{Coverage, CoverageSnapshot};
use crate::error::{TaskResult, TbError};
use crate::executor::{CancelToken, Executor};
use crate::signal::Port;
use crate::sim::Simulator;
use crate::tb_obj::TbObj;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Sim,
    WaitTasksEnd,
    CheckScoreboards,
    Done,
}

/// Current phase as seen by the tasks of a run.
#[derive(Clone, Debug)]
pub struct PhaseSignal(TbObj<Phase>);

impl PhaseSignal {
    fn new() -> Self {
        PhaseSignal(TbObj::new(Phase::Init))
    }
    pub fn get(&self) -> Phase {
        *self.0.get()
    }
    pub(crate) fn set(&self, phase: Phase) {
        self.0.with_mut(|p| *p = phase);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Idle,
    Running,
    Completed,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pass,
    Fail,
    TimedOutInsufficientCoverage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub status: Status,
    pub terminal: ManagerState,
    pub first_error: Option<TbError>,
    pub failures: usize,
    pub counters: Vec<CoverageSnapshot>,
    pub coverage_met_at: Option<u64>,
    pub sim_time: u64,
}

impl RunOutcome {
    pub fn passed(&self) -> bool {
        self.status == Status::Pass
    }
}

enum PhaseEvent {
    Finished {
        task: String,
        daemon: bool,
        result: TaskResult,
    },
    Failure {
        task: String,
        error: TbError,
    },
}

/// Lets a task report a failure without ending itself. Reporting a fatal error still stops
/// the run.
#[derive(Clone)]
pub struct Reporter {
    task: String,
    tx: mpsc::UnboundedSender<PhaseEvent>,
}

impl Reporter {
    pub fn report(&self, error: TbError) {
        let _ = self.tx.unbounded_send(PhaseEvent::Failure {
            task: self.task.clone(),
            error,
        });
    }
}

struct Registered {
    name: String,
    daemon: bool,
    future: BoxFuture<'static, TaskResult>,
}

/// Runs a set of tasks against a global deadline and decides the outcome of the run.
pub struct PhaseManager {
    cfg: PhaseConfig,
    port: Port,
    executor: Executor,
    state: ManagerState,
    phase: PhaseSignal,
    registered: Vec<Registered>,
    coverage: Vec<Arc<Coverage>>,
    tx: mpsc::UnboundedSender<PhaseEvent>,
    rx: mpsc::UnboundedReceiver<PhaseEvent>,
}

impl PhaseManager {
    pub fn new(sim: &Simulator, cfg: PhaseConfig) -> Self {
        let (tx, rx) = mpsc::unbounded();
        PhaseManager {
            cfg,
            port: sim.port(),
            executor: sim.executor().clone(),
            state: ManagerState::Idle,
            phase: PhaseSignal::new(),
            registered: Vec::new(),
            coverage: Vec::new(),
            tx,
            rx,
        }
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    pub fn phase(&self) -> PhaseSignal {
        self.phase.clone()
    }

    pub fn reporter(&self, task: &str) -> Reporter {
        Reporter {
            task: task.to_string(),
            tx: self.tx.clone(),
        }
    }

    /// Registers a task the run waits for.
    pub fn add_task(
        &mut self,
        name: &str,
        future: impl Future<Output = TaskResult> + Send + 'static,
    ) {
        self.register(name, false, future.boxed());
    }

    /// Registers a background task that is cancelled when the run ends.
    pub fn add_daemon(
        &mut self,
        name: &str,
        future: impl Future<Output = TaskResult> + Send + 'static,
    ) {
        self.register(name, true, future.boxed());
    }

    fn register(&mut self, name: &str, daemon: bool, future: BoxFuture<'static, TaskResult>) {
        self.registered.push(Registered {
            name: name.to_string(),
            daemon,
            future,
        });
    }

    pub fn track_coverage(&mut self, coverage: Arc<Coverage>) {
        self.coverage.push(coverage);
    }

    fn coverage_met(&self) -> bool {
        self.coverage.iter().all(|c| c.is_satisfied())
    }

    fn switch_phase(&self, phase: Phase) {
        info!("{:>10} phase {:?}", self.port.sim_time(), phase);
        self.phase.set(phase);
    }

    fn spawn(&self, registered: Registered) -> CancelToken {
        let tx = self.tx.clone();
        let Registered {
            name,
            daemon,
            future,
        } = registered;
        let task = name.clone();
        let handle = self.executor.spawn(
            async move {
                let result = future.await;
                let _ = tx.unbounded_send(PhaseEvent::Finished {
                    task,
                    daemon,
                    result,
                });
                Ok(())
            },
            &name,
        );
        handle.cancel_token()
    }

    pub async fn run(mut self) -> RunOutcome {
        let start = self.port.sim_time();
        let deadline = start + self.cfg.wait_tasks_end_time;
        if self.cfg.poll_interval == 0 {
            warn!("poll interval of 0 would stall time, using 1");
        }
        let poll_interval = self.cfg.poll_interval.max(1);
        self.state = ManagerState::Running;
        self.switch_phase(Phase::Init);

        let registered = std::mem::take(&mut self.registered);
        let mut remaining = registered.iter().filter(|r| !r.daemon).count();
        let tokens: Vec<CancelToken> = registered.into_iter().map(|r| self.spawn(r)).collect();
        self.switch_phase(Phase::Sim);

        let mut failures = Failures::default();
        let mut coverage_met_at = None;
        let mut abort = false;
        let terminal = loop {
            let now = self.port.sim_time();
            if coverage_met_at.is_none() && self.coverage_met() {
                coverage_met_at = Some(now);
                self.switch_phase(Phase::WaitTasksEnd);
            }
            if abort || remaining == 0 {
                break ManagerState::Completed;
            }
            if now >= deadline {
                warn!("{:>10} deadline reached", now);
                break ManagerState::TimedOut;
            }

            let tick = self.port.wait_time(poll_interval.min(deadline - now));
            let event = match select(self.rx.next(), tick).await {
                Either::Left((Some(event), _)) => event,
                Either::Left((None, _)) => break ManagerState::Completed,
                Either::Right(_) => continue,
            };
            match event {
                PhaseEvent::Finished {
                    task,
                    daemon,
                    result,
                } => {
                    if !daemon {
                        remaining -= 1;
                    }
                    match result {
                        Ok(()) => info!("{:>10} task '{}' finished", self.port.sim_time(), task),
                        Err(TbError::Cancelled) => {}
                        Err(e) => {
                            failures.record(self.port.sim_time(), &task, e);
                            abort = true;
                        }
                    }
                }
                PhaseEvent::Failure { task, error } => {
                    abort |= self.cfg.fail_fast || error.is_fatal();
                    failures.record(self.port.sim_time(), &task, error);
                }
            }
        };

        self.state = terminal;
        for token in tokens {
            token.cancel();
        }
        // failures reported right before teardown still count
        while let Ok(event) = self.rx.try_recv() {
            if let PhaseEvent::Failure { task, error } = event {
                failures.record(self.port.sim_time(), &task, error);
            }
        }
        self.switch_phase(Phase::CheckScoreboards);

        let mut first_error = failures.first.clone();
        let status = if first_error.is_some() {
            Status::Fail
        } else if coverage_met_at.is_some() {
            Status::Pass
        } else {
            first_error = self.coverage.iter().find_map(|c| c.shortfall());
            match terminal {
                ManagerState::TimedOut => Status::TimedOutInsufficientCoverage,
                _ => Status::Fail,
            }
        };
        self.switch_phase(Phase::Done);

        let outcome = RunOutcome {
            status,
            terminal,
            first_error,
            failures: failures.count,
            counters: self.coverage.iter().map(|c| c.snapshot()).collect(),
            coverage_met_at,
            sim_time: self.port.sim_time() - start,
        };
        info!(
            "{:>10} run {:?} after {:?}, {} failure(s)",
            self.port.sim_time(),
            outcome.status,
            outcome.terminal,
            outcome.failures
        );
        outcome
    }
}

#[derive(Default)]
struct Failures {
    first: Option<TbError>,
    count: usize,
}

impl Failures {
    fn record(&mut self, time: u64, task: &str, error: TbError) {
        error!("{:>10} task '{}' failed: {}", time, task, error);
        self.count += 1;
        if self.first.is_none() {
            self.first = Some(error);
        }
    }
}
