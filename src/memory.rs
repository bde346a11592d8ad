use crate::error::{TbError, TbResult};

/// Byte addressable mirror of the device memory. Only ever updated with completed writes.
#[derive(Debug, Clone)]
pub struct ReferenceMemory {
    bytes: Vec<u8>,
}

impl ReferenceMemory {
    pub fn new(address_width: u32) -> Self {
        ReferenceMemory {
            bytes: vec![0; 1 << address_width],
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn write(&mut self, address: u64, data: &[u8]) -> TbResult<()> {
        let range = self.range(address, data.len())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    pub fn read(&self, address: u64, size: usize) -> TbResult<Vec<u8>> {
        let range = self.range(address, size)?;
        Ok(self.bytes[range].to_vec())
    }

    /// Reads `size` bytes as a little endian bus word.
    pub fn read_word(&self, address: u64, size: usize) -> TbResult<u64> {
        Ok(bytes_to_word(&self.read(address, size)?))
    }

    fn range(&self, address: u64, size: usize) -> TbResult<std::ops::Range<usize>> {
        if !size.is_power_of_two() || address % size as u64 != 0 {
            return Err(TbError::Alignment { address, size });
        }
        let limit = self.size();
        match address.checked_add(size as u64) {
            Some(end) if end <= limit => Ok(address as usize..end as usize),
            _ => Err(TbError::AddressOutOfRange {
                address,
                size,
                limit,
            }),
        }
    }
}

pub fn bytes_to_word(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0, |acc, &b| (acc << 8) | b as u64)
}

pub fn word_to_bytes(word: u64, size: usize) -> Vec<u8> {
    word.to_le_bytes()[..size.min(8)].to_vec()
}
