//! Register catalog of the NAFE13388.
//!
//! The device exposes two disjoint register spaces, 16-bit and 24-bit wide, plus
//! a set of fire-and-forget commands that travel through the same SPI framing.
//! Higher layers address registers only through [`Register16`], [`Register24`]
//! and [`Command`]; the numeric addresses live in this module and nowhere else.
//!
//! Registers that exist once per logical channel or per coefficient slot are
//! variants carrying a validated [`Channel`] or [`CoeffSlot`], so an address can
//! never be computed past the end of its bank.

pub mod command;
pub mod sys_status;

pub use command::Command;

use core::fmt::Debug;

use crate::channel::{Channel, CoeffSlot};

/// A register that can be read and written through the [`Bus`](crate::bus::Bus).
///
/// The width is part of the type: a [`Register16`] always moves 2 payload bytes
/// and a [`Register24`] always moves 3.
pub trait Register: Copy + Debug {
    type Value: Copy + Debug;

    /// Number of payload bytes following the 2-byte address frame.
    const WIDTH: usize;

    fn addr(self) -> u16;
    fn decode(b: &[u8]) -> Self::Value;
    fn encode(value: Self::Value, out: &mut [u8]);
}

/// 16-bit registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum Register16 {
    /// Per-channel configuration word 0, banked by the last channel-select command.
    ChConfig0 = 0x20,
    ChConfig1 = 0x21,
    ChConfig2 = 0x22,
    ChConfig3 = 0x23,
    /// Enable bitmask, one bit per logical channel.
    ChConfig4 = 0x24,
    CrcConfRegs = 0x25,
    CrcCoefRegs = 0x26,
    CrcTrimRegs = 0x27,
    GpiData = 0x29,
    GpioConfig0 = 0x2A,
    GpioConfig1 = 0x2B,
    GpioConfig2 = 0x2C,
    GpiEdgePos = 0x2D,
    GpiEdgeNeg = 0x2E,
    GpoData = 0x2F,
    SysConfig0 = 0x30,
    SysStatus0 = 0x31,
    GlobalAlarmEnable = 0x32,
    GlobalAlarmInterrupt = 0x33,
    /// Die temperature, signed, 1/64 °C per LSB.
    DieTemp = 0x34,
    ChStatus0 = 0x35,
    ChStatus1 = 0x36,
    ThrsTemp = 0x37,
    Pn2 = 0x7C,
    Pn1 = 0x7D,
    Pn0 = 0x7E,
    CrcTrimInt = 0x7F,
}

impl Register16 {
    /// Configuration words written by a channel configuration, in CH_CONFIG0..3 order.
    pub const CHANNEL_CONFIG: [Register16; 4] = [
        Register16::ChConfig0,
        Register16::ChConfig1,
        Register16::ChConfig2,
        Register16::ChConfig3,
    ];
}

impl Register for Register16 {
    type Value = u16;
    const WIDTH: usize = 2;

    fn addr(self) -> u16 {
        self as u16
    }

    fn decode(b: &[u8]) -> Self::Value {
        u16::from_be_bytes([b[0], b[1]])
    }

    fn encode(value: Self::Value, out: &mut [u8]) {
        out[..2].copy_from_slice(&value.to_be_bytes());
    }
}

/// 24-bit registers. Values are two's complement and sign-extended to `i32` on read.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register24 {
    /// Conversion result of a logical channel (CH_DATA0..15).
    ChData(Channel),
    /// Alarm upper threshold of a logical channel (CH_CONFIG5_0..15).
    ChConfig5(Channel),
    /// Alarm lower threshold of a logical channel (CH_CONFIG6_0..15).
    ChConfig6(Channel),
    /// Gain trim (GAIN_COEFF0..15).
    GainCoeff(CoeffSlot),
    /// Offset trim (OFFSET_COEFF0..15).
    OffsetCoeff(CoeffSlot),
    Serial1,
    Serial0,
}

impl Register24 {
    const CH_DATA0: u16 = 0x40;
    const CH_CONFIG5_0: u16 = 0x50;
    const CH_CONFIG6_0: u16 = 0x60;
    const GAIN_COEFF0: u16 = 0x80;
    const OFFSET_COEFF0: u16 = 0x90;
    const SERIAL1: u16 = 0xAE;
    const SERIAL0: u16 = 0xAF;
}

impl Register for Register24 {
    type Value = i32;
    const WIDTH: usize = 3;

    fn addr(self) -> u16 {
        match self {
            Register24::ChData(ch) => Self::CH_DATA0 + ch.index() as u16,
            Register24::ChConfig5(ch) => Self::CH_CONFIG5_0 + ch.index() as u16,
            Register24::ChConfig6(ch) => Self::CH_CONFIG6_0 + ch.index() as u16,
            Register24::GainCoeff(slot) => Self::GAIN_COEFF0 + slot.index() as u16,
            Register24::OffsetCoeff(slot) => Self::OFFSET_COEFF0 + slot.index() as u16,
            Register24::Serial1 => Self::SERIAL1,
            Register24::Serial0 => Self::SERIAL0,
        }
    }

    fn decode(b: &[u8]) -> Self::Value {
        sign_extend_24(b)
    }

    fn encode(value: Self::Value, out: &mut [u8]) {
        out[..3].copy_from_slice(&value.to_be_bytes()[1..]);
    }
}

/// Decodes 3 big-endian bytes as a two's complement 24-bit value.
pub(crate) fn sign_extend_24(b: &[u8]) -> i32 {
    i32::from_be_bytes([b[0], b[1], b[2], 0]) >> 8
}
