use crate::register::Register16;

/// Decoded SYS_STATUS0 (0x31) register
///
/// - **Length:** 2 bytes
/// - **Access:** Read-only
///
/// Only the CHIP_READY flag is interpreted by the driver; the raw word is kept for callers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SysStatus0(u16);

impl SysStatus0 {
    pub const REGISTER: Register16 = Register16::SysStatus0;

    const CHIP_READY: u16 = 1 << 13;

    pub fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Has the device finished its power-up / reset sequence?
    ///
    /// [`false`] means commands sent now may be ignored.
    pub fn chip_ready(&self) -> bool {
        self.0 & Self::CHIP_READY != 0
    }

    pub fn raw(&self) -> u16 {
        self.0
    }
}

impl From<u16> for SysStatus0 {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}
