//! Errors that can occur when using the NAFE13388 device.
//!
//! This module provides an error type that encapsulates all possible errors that can occur during communication with the NAFE13388.
//! It is generic over the underlying SPI transport error type.

use core::fmt;

use embedded_hal::digital::ErrorKind;

/// This represents all possible errors that can occur when using the NAFE13388 device.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Nafe13388Error<BusError> {
    /// An error has occurred in the SPI driver
    Bus(BusError),

    /// The device never raised CHIP_READY after a reset.
    ///
    /// This is terminal: the device is absent, unpowered or wired incorrectly.
    /// The driver does not retry on its own.
    NotReady {
        /// Number of status polls performed before giving up
        attempts: u8,
    },

    /// Driving the nRESET pin failed, or a hardware reset was requested without a reset pin.
    Pin(ErrorKind),

    /// Logical channel index outside 0..=15.
    InvalidChannel(u8),

    /// PGA gain index outside 0..=7.
    InvalidPgaGain(u8),

    /// Gain/offset coefficient slot outside 0..=15.
    InvalidCoeffSlot(u8),

    /// A caller supplied buffer does not fit the fixed frame size of the operation.
    BufferLength {
        /// Largest length the operation accepts
        max: usize,
        /// Length that was passed in
        actual: usize,
    },

    /// Calibration inputs that would divide by zero (equal reference points,
    /// or a reference reading equal to the ground reading).
    DegenerateReference,

    /// A computed calibration trim does not fit the signed 24-bit trim registers.
    ///
    /// Nothing was written; the stored trims are unchanged.
    TrimOutOfRange {
        /// Computed gain trim
        gain: i64,
        /// Computed offset trim
        offset: i64,
    },
}

impl<E: fmt::Debug> fmt::Display for Nafe13388Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "SPI communication error: {e:?}"),
            Self::NotReady { attempts } => {
                write!(f, "device not ready after {attempts} status polls")
            }
            Self::Pin(kind) => write!(f, "reset pin error: {kind:?}"),
            Self::InvalidChannel(ch) => {
                write!(f, "invalid logical channel {ch}, expected 0..=15")
            }
            Self::InvalidPgaGain(index) => {
                write!(f, "invalid PGA gain index {index}, expected 0..=7")
            }
            Self::InvalidCoeffSlot(slot) => {
                write!(f, "invalid coefficient slot {slot}, expected 0..=15")
            }
            Self::BufferLength { max, actual } => {
                write!(f, "buffer length {actual} exceeds frame capacity {max}")
            }
            Self::DegenerateReference => write!(f, "calibration reference points are degenerate"),
            Self::TrimOutOfRange { gain, offset } => {
                write!(f, "calibration trim gain {gain} offset {offset} exceeds 24 bits")
            }
        }
    }
}
