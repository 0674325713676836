//! Driver for the NXP NAFE13388 16-channel delta-sigma analog front end.
//!
//! Built on the blocking `embedded-hal` 1.0 traits. Every operation is a
//! sequence of synchronous SPI transactions; waits for settling and reset go
//! through the supplied [`DelayNs`](embedded_hal::delay::DelayNs).
//!
//! - [`bus`]: SPI framing and the [`Bus`](bus::Bus) trait every layer talks to
//! - [`register`]: typed register map and commands
//! - [`Nafe13388`]: reset/boot, channel configuration and acquisition
//! - [`calibration`]: two-point and self-calibration of the gain/offset trims
#![cfg_attr(not(test), no_std)]

pub mod bus;
pub mod calibration;
pub mod channel;
pub mod config;
pub mod error;
mod nafe13388;
pub mod register;

#[cfg(test)]
mod testing;

pub use bus::SpiAddress;
pub use calibration::{RefSide, ReferencePair, ReferencePoint, SelfCalibration, Trim, TrimError};
pub use channel::{Channel, CoeffSlot, PgaGain};
pub use config::{ChannelConfig, ResetPolicy};
pub use error::Nafe13388Error;
pub use nafe13388::{Nafe13388, Nafe13388Result, Nafe13388Spi, NoPin, NoPinError, READY_POLL_ATTEMPTS};
