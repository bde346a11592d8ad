use intmap::IntMap;

use crate::error::{TbError, TbResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Read,
    Write,
}

impl Kind {
    pub fn is_write(self) -> bool {
        self == Kind::Write
    }
    pub fn from_write_bit(write: bool) -> Self {
        if write {
            Kind::Write
        } else {
            Kind::Read
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: u32,
    pub kind: Kind,
    pub address: u64,
    /// transfer size in bytes
    pub size: usize,
    /// write data, empty for reads
    pub data: Vec<u8>,
    pub issued_at: u64,
    pub accepted_at: Option<u64>,
}

impl Transaction {
    fn touches(&self, address: u64, size: usize) -> bool {
        address < self.address + self.size as u64 && self.address < address + size as u64
    }
}

/// A response as sampled from the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub id: u32,
    pub kind: Kind,
    pub data: u64,
}

/// Outstanding transactions, at most one per id. Ids complete in any order relative to
/// each other.
pub struct TransactionLedger {
    id_count: u32,
    outstanding: IntMap<Transaction>,
}

impl TransactionLedger {
    pub fn new(id_width: u32) -> Self {
        TransactionLedger {
            id_count: 1 << id_width,
            outstanding: IntMap::new(),
        }
    }

    pub fn id_count(&self) -> u32 {
        self.id_count
    }

    pub fn allocate(
        &mut self,
        id: u32,
        kind: Kind,
        address: u64,
        size: usize,
        data: Vec<u8>,
        issued_at: u64,
    ) -> TbResult<Transaction> {
        if id >= self.id_count {
            return Err(TbError::IdOutOfRange {
                id,
                count: self.id_count,
            });
        }
        if self.is_busy(id) {
            return Err(TbError::IdInUse(id));
        }
        let transaction = Transaction {
            id,
            kind,
            address,
            size,
            data,
            issued_at,
            accepted_at: None,
        };
        self.outstanding.insert(id as u64, transaction.clone());
        Ok(transaction)
    }

    /// Records that the device took the request of `id`.
    pub fn accept(&mut self, id: u32, cycle: u64) -> TbResult<()> {
        let transaction = self
            .outstanding
            .get_mut(id as u64)
            .ok_or(TbError::UnknownId(id))?;
        transaction.accepted_at = Some(cycle);
        Ok(())
    }

    pub fn complete(&mut self, id: u32, response: &Response) -> TbResult<Transaction> {
        let transaction = self
            .outstanding
            .get(id as u64)
            .ok_or(TbError::UnknownId(id))?;
        if transaction.accepted_at.is_none() {
            return Err(TbError::PrematureResponse(id));
        }
        if transaction.kind != response.kind {
            return Err(TbError::KindMismatch {
                id,
                expected: transaction.kind,
                observed: response.kind,
            });
        }
        self.outstanding
            .remove(id as u64)
            .ok_or(TbError::UnknownId(id))
    }

    pub fn is_busy(&self, id: u32) -> bool {
        self.outstanding.contains_key(id as u64)
    }

    pub fn free_ids(&self) -> Vec<u32> {
        (0..self.id_count).filter(|&id| !self.is_busy(id)).collect()
    }

    /// True if an outstanding transaction touches any byte of the range.
    pub fn overlaps(&self, address: u64, size: usize) -> bool {
        self.outstanding.values().any(|t| t.touches(address, size))
    }

    pub fn get(&self, id: u32) -> Option<&Transaction> {
        self.outstanding.get(id as u64)
    }

    pub fn len(&self) -> usize {
        self.outstanding.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outstanding.is_empty()
    }
}
