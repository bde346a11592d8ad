use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

use crate::error::TbResult;
pub use crate::trigger::EdgeKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SignalId(pub(crate) usize);

impl SignalId {
    #[inline]
    pub(crate) fn key(self) -> u64 {
        self.0 as u64
    }
}

/// Everything the testbench may do with the simulated device. Values are read as they were
/// committed at the last delta; drives take effect when the current delta settles.
pub trait SignalPort: Send + Sync {
    fn lookup(&self, name: &str) -> TbResult<SignalId>;
    fn name(&self, id: SignalId) -> String;
    fn width(&self, id: SignalId) -> u32;
    fn read_bits(&self, id: SignalId) -> u64;
    fn read_bit(&self, id: SignalId) -> bool {
        self.read_bits(id) & 1 == 1
    }
    fn drive_bits(&self, id: SignalId, value: u64) -> TbResult<()>;
    fn wait_edge(&self, id: SignalId, kind: EdgeKind) -> BoxFuture<'static, ()>;
    fn wait_time(&self, steps: u64) -> BoxFuture<'static, ()>;
    /// Resumes once all value changes of the current time step have settled.
    fn wait_read_only(&self) -> BoxFuture<'static, ()>;
    fn sim_time(&self) -> u64;
}

pub type Port = Arc<dyn SignalPort>;

/// Resolved handle to one named signal. Cheap to clone; resolve once, outside of loops.
#[derive(Clone)]
pub struct Signal {
    id: SignalId,
    width: u32,
    port: Port,
}

impl Signal {
    pub fn lookup(port: &Port, name: &str) -> TbResult<Self> {
        let id = port.lookup(name)?;
        Ok(Signal {
            id,
            width: port.width(id),
            port: port.clone(),
        })
    }

    pub fn id(&self) -> SignalId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn name(&self) -> String {
        self.port.name(self.id)
    }

    pub fn u64(&self) -> u64 {
        self.port.read_bits(self.id)
    }

    pub fn bit(&self) -> bool {
        self.port.read_bit(self.id)
    }

    pub fn set(&self, val: u64) -> TbResult<()> {
        self.port.drive_bits(self.id, val)
    }

    pub fn set_bit(&self, val: bool) -> TbResult<()> {
        self.port.drive_bits(self.id, val as u64)
    }

    // convenience functions to get edge triggers for this signal
    pub fn rising_edge(&self) -> BoxFuture<'static, ()> {
        self.port.wait_edge(self.id, EdgeKind::Rising)
    }
    pub fn falling_edge(&self) -> BoxFuture<'static, ()> {
        self.port.wait_edge(self.id, EdgeKind::Falling)
    }
    pub fn edge(&self) -> BoxFuture<'static, ()> {
        self.port.wait_edge(self.id, EdgeKind::Any)
    }

    /// Current simulation time of the simulator owning this signal.
    pub fn sim_time(&self) -> u64 {
        self.port.sim_time()
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name())
            .field("width", &self.width)
            .finish()
    }
}

pub(crate) fn width_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}
