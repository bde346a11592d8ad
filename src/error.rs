use thiserror::Error;

use crate::ledger::Kind;

pub type TbResult<T> = Result<T, TbError>;

/// Result type of every task running on the executor.
pub type TaskResult = TbResult<()>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TbError {
    #[error("address {address:#x} is not aligned to a {size} byte transfer")]
    Alignment { address: u64, size: usize },

    #[error("access of {size} bytes at {address:#x} exceeds memory of {limit} bytes")]
    AddressOutOfRange { address: u64, size: usize, limit: u64 },

    #[error("transaction id {0} already has an outstanding transaction")]
    IdInUse(u32),

    #[error("transaction id {id} is outside of the {count} available ids")]
    IdOutOfRange { id: u32, count: u32 },

    #[error("response for id {0} without outstanding transaction")]
    UnknownId(u32),

    #[error("response for id {0} before its request was accepted")]
    PrematureResponse(u32),

    #[error("response for id {id} is a {observed:?}, outstanding transaction is a {expected:?}")]
    KindMismatch { id: u32, expected: Kind, observed: Kind },

    #[error("read data mismatch: id={id} address={address:#x} expected={expected:#x} observed={observed:#x}")]
    DataMismatch {
        id: u32,
        address: u64,
        expected: u64,
        observed: u64,
    },

    #[error("coverage not reached: {counter}={reached}, target {target}")]
    InsufficientCoverage {
        counter: &'static str,
        reached: u64,
        target: u64,
    },

    #[error("no signal named '{0}'")]
    UnknownSignal(String),

    #[error("value {value:#x} does not fit into {width} bit signal '{name}'")]
    ValueOutOfRange { name: String, width: u32, value: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("task cancelled")]
    Cancelled,

    #[error("simulation stalled at t={0} with nothing left to wake the root task")]
    Stalled(u64),
}

impl TbError {
    /// Data mismatches are recorded and checking continues; everything else ends the task.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TbError::DataMismatch { .. })
    }
}
