use crate::config::CheckerConfig;
use crate::error::TbResult;
use crate::signal::{Port, Signal};
use crate::sim::Simulator;

/// Signals of one Axi4Shared interface. The command channel carries address and write data
/// of both reads and writes; responses of both kinds come back on the response channel.
#[derive(Clone, Debug)]
pub struct Axi4Shared {
    pub cmd_valid: Signal,
    pub cmd_ready: Signal,
    pub cmd_id: Signal,
    pub cmd_write: Signal,
    pub cmd_addr: Signal,
    /// log2 of the transfer size in bytes
    pub cmd_size: Signal,
    pub cmd_data: Signal,
    pub rsp_valid: Signal,
    pub rsp_ready: Signal,
    pub rsp_id: Signal,
    pub rsp_write: Signal,
    pub rsp_data: Signal,
}

const SIZE_WIDTH: u32 = 3;

impl Axi4Shared {
    /// Creates the interface signals named `<prefix>_<channel>_<field>` in the simulation.
    pub fn declare(sim: &Simulator, prefix: &str, cfg: &CheckerConfig) -> TbResult<()> {
        let fields = [
            ("cmd_valid", 1),
            ("cmd_ready", 1),
            ("cmd_id", cfg.id_width),
            ("cmd_write", 1),
            ("cmd_addr", cfg.address_width),
            ("cmd_size", SIZE_WIDTH),
            ("cmd_data", cfg.data_width),
            ("rsp_valid", 1),
            ("rsp_ready", 1),
            ("rsp_id", cfg.id_width),
            ("rsp_write", 1),
            ("rsp_data", cfg.data_width),
        ];
        for (field, width) in fields {
            sim.add_signal(&format!("{}_{}", prefix, field), width, 0)?;
        }
        Ok(())
    }

    pub fn lookup(port: &Port, prefix: &str) -> TbResult<Self> {
        let c = |field: &str| Signal::lookup(port, &format!("{}_{}", prefix, field));
        Ok(Axi4Shared {
            cmd_valid: c("cmd_valid")?,
            cmd_ready: c("cmd_ready")?,
            cmd_id: c("cmd_id")?,
            cmd_write: c("cmd_write")?,
            cmd_addr: c("cmd_addr")?,
            cmd_size: c("cmd_size")?,
            cmd_data: c("cmd_data")?,
            rsp_valid: c("rsp_valid")?,
            rsp_ready: c("rsp_ready")?,
            rsp_id: c("rsp_id")?,
            rsp_write: c("rsp_write")?,
            rsp_data: c("rsp_data")?,
        })
    }

    /// Address bits of the interface, which bounds the memory behind it.
    pub fn address_width(&self) -> u32 {
        self.cmd_addr.width()
    }

    pub fn cmd_fire(&self) -> bool {
        self.cmd_valid.bit() && self.cmd_ready.bit()
    }

    pub fn rsp_fire(&self) -> bool {
        self.rsp_valid.bit() && self.rsp_ready.bit()
    }
}
