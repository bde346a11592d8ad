pub use crate::axi::Axi4Shared;
pub use crate::checker::Axi4SharedChecker;
pub use crate::clock::ClockDriver;
pub use crate::config::{CheckerConfig, ClockConfig, PhaseConfig, RamConfig, RunConfig};
pub use crate::coverage::{Coverage, CoverageSnapshot};
pub use crate::executor::{CancelToken, JoinHandle};
pub use crate::ledger::{Kind, Response, Transaction, TransactionLedger};
pub use crate::memory::ReferenceMemory;
pub use crate::model::OnChipRam;
pub use crate::phase::{ManagerState, Phase, PhaseManager, PhaseSignal, Reporter, RunOutcome, Status};
pub use crate::signal::{EdgeKind, Port, Signal, SignalId, SignalPort};
pub use crate::sim::Simulator;
pub use crate::utils::clock_cycles;
pub use crate::{run_axi4shared, TaskResult, TbError, TbResult};
pub use futures::future::FutureExt;
