use core::time::Duration;

use crate::channel::PgaGain;

/// Full-scale span of the internal reference path, in volts.
const INTERNAL_REFERENCE_SPAN: f64 = 4.0;

/// Full-scale span of the high-voltage input path at unity gain, in volts.
const HV_INPUT_SPAN: f64 = 10.0;

const CODES: f64 = (1u32 << 24) as f64;

/// The four CH_CONFIG0..3 words describing one logical channel.
///
/// The words are written to the device verbatim. Field accessors decode the
/// parts the driver itself needs (input path and PGA gain) to derive the
/// raw-to-microvolt coefficient.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    pub cc0: u16,
    pub cc1: u16,
    pub cc2: u16,
    pub cc3: u16,
}

impl ChannelConfig {
    /// HV_SEL: input taken from the high-voltage analog inputs instead of the low-voltage mux.
    const HV_SEL: u16 = 1 << 4;
    const GAIN_SHIFT: u16 = 5;
    const GAIN_MASK: u16 = 0x7 << Self::GAIN_SHIFT;
    const HV_AIP_SHIFT: u16 = 12;
    const HV_AIN_SHIFT: u16 = 8;

    pub const fn new(cc0: u16, cc1: u16, cc2: u16, cc3: u16) -> Self {
        Self { cc0, cc1, cc2, cc3 }
    }

    pub fn words(&self) -> [u16; 4] {
        [self.cc0, self.cc1, self.cc2, self.cc3]
    }

    pub fn high_voltage_input(&self) -> bool {
        self.cc0 & Self::HV_SEL != 0
    }

    pub fn pga_gain(&self) -> PgaGain {
        PgaGain::from_bits(self.cc0 >> Self::GAIN_SHIFT)
    }

    /// Replaces the CH_GAIN field of CH_CONFIG0.
    pub fn gain(mut self, gain: PgaGain) -> Self {
        self.cc0 = (self.cc0 & !Self::GAIN_MASK) | ((gain.index() as u16) << Self::GAIN_SHIFT);

        self
    }

    /// Sets or clears HV_SEL.
    pub fn high_voltage(mut self, enable: bool) -> Self {
        if enable {
            self.cc0 |= Self::HV_SEL;
        } else {
            self.cc0 &= !Self::HV_SEL;
        }

        self
    }

    /// Routes a mux source to the positive (HV_AIP) input.
    pub fn positive_input(mut self, source: u16) -> Self {
        self.cc0 = (self.cc0 & !(0xF << Self::HV_AIP_SHIFT)) | ((source & 0xF) << Self::HV_AIP_SHIFT);

        self
    }

    /// Routes a mux source to the negative (HV_AIN) input.
    pub fn negative_input(mut self, source: u16) -> Self {
        self.cc0 = (self.cc0 & !(0xF << Self::HV_AIN_SHIFT)) | ((source & 0xF) << Self::HV_AIN_SHIFT);

        self
    }

    /// Microvolts per ADC code for a channel with this configuration.
    ///
    /// High-voltage inputs scale with the PGA gain; the low-voltage path is fixed to the 4 V internal reference.
    pub fn coefficient_uv(&self) -> f64 {
        if self.high_voltage_input() {
            (HV_INPUT_SPAN / CODES) / self.pga_gain().factor() * 1e6
        } else {
            (INTERNAL_REFERENCE_SPAN / CODES) * 1e6
        }
    }
}

/// How the device is brought out of reset by [`Nafe13388::begin`](crate::Nafe13388::begin).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetPolicy {
    /// Pulse the nRESET pin low.
    Hardware,
    /// Issue the RESET command over SPI.
    Soft,
}

/// Settle time for reads in self-calibration. The low-bandwidth filter used for
/// the reference measurements needs this long to produce a settled result.
pub const CALIBRATION_SETTLE: Duration = Duration::from_millis(1100);
