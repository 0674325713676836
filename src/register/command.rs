//! ### Commands (write-only, 2-byte frame)
//!
//! Commands share the address framing with registers but carry no payload.
//! Channel-select commands (0x0000..0x000F) choose which logical channel the
//! banked CH_CONFIG0..3 registers and the single-channel start commands refer to.
#![doc(alias = "CMD")]
use crate::channel::Channel;

/// Control-plane opcodes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Select a logical channel (CMD_CH0..CMD_CH15).
    Channel(Channel),
    /// Abort any running conversion.
    Abort,
    End,
    ClearAlarm,
    ClearData,
    /// Soft reset. All registers return to their power-on state.
    Reset,
    ClearReg,
    Reload,
    /// Single channel, single conversion on the selected channel.
    SingleShot,
    /// Single channel, continuous conversion on the selected channel.
    SingleContinuous,
    MultiMulti,
    /// All enabled channels, continuous conversion.
    MultiContinuous,
    /// All enabled channels, one conversion each.
    MultiSingle,
    /// Read every enabled channel result in one transaction.
    BurstData,
    CalcCrcConfig,
    CalcCrcCoef,
    CalcCrcFac,
}

impl Command {
    pub fn opcode(self) -> u16 {
        match self {
            Command::Channel(ch) => ch.index() as u16,
            Command::Abort => 0x0010,
            Command::End => 0x0011,
            Command::ClearAlarm => 0x0012,
            Command::ClearData => 0x0013,
            Command::Reset => 0x0014,
            Command::ClearReg => 0x0015,
            Command::Reload => 0x0016,
            Command::SingleShot => 0x2000,
            Command::SingleContinuous => 0x2001,
            Command::MultiMulti => 0x2002,
            Command::MultiContinuous => 0x2003,
            Command::MultiSingle => 0x2004,
            Command::BurstData => 0x2005,
            Command::CalcCrcConfig => 0x2006,
            Command::CalcCrcCoef => 0x2007,
            Command::CalcCrcFac => 0x2008,
        }
    }
}
