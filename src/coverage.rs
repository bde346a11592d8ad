use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::TbError;

/// Monotonic coverage counters of one checker, shared with the phase manager.
#[derive(Debug)]
pub struct Coverage {
    name: String,
    target: u64,
    non_zero_read_rsp: AtomicU64,
    total_transactions: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageSnapshot {
    pub name: String,
    pub non_zero_read_rsp_counter: u64,
    pub total_transactions: u64,
    pub target: u64,
}

impl Coverage {
    pub fn new(name: &str, non_zero_read_rsp_target: u64) -> Self {
        Coverage {
            name: name.to_string(),
            target: non_zero_read_rsp_target,
            non_zero_read_rsp: AtomicU64::new(0),
            total_transactions: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn record_transaction(&self) {
        self.total_transactions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_non_zero_read(&self) {
        self.non_zero_read_rsp.fetch_add(1, Ordering::Relaxed);
    }

    pub fn non_zero_read_rsp(&self) -> u64 {
        self.non_zero_read_rsp.load(Ordering::Relaxed)
    }

    pub fn total_transactions(&self) -> u64 {
        self.total_transactions.load(Ordering::Relaxed)
    }

    pub fn is_satisfied(&self) -> bool {
        self.non_zero_read_rsp() >= self.target
    }

    pub fn shortfall(&self) -> Option<TbError> {
        if self.is_satisfied() {
            return None;
        }
        Some(TbError::InsufficientCoverage {
            counter: "nonZeroReadRspCounter",
            reached: self.non_zero_read_rsp(),
            target: self.target,
        })
    }

    pub fn snapshot(&self) -> CoverageSnapshot {
        CoverageSnapshot {
            name: self.name.clone(),
            non_zero_read_rsp_counter: self.non_zero_read_rsp(),
            total_transactions: self.total_transactions(),
            target: self.target,
        }
    }
}
