//! Gain/offset trim calibration.
//!
//! Two routines rewrite the GAIN_COEFFn / OFFSET_COEFFn trim registers:
//! - [`Nafe13388::gain_offset_coeff`] fits a line through two externally known
//!   reference points.
//! - [`Nafe13388::recalibrate`] measures one of the internal reference voltages
//!   against ground at a given PGA setting.
//!
//! Both mutate device-wide calibration state and the shared enable mask. Do not
//! run them while another user of the same device is acquiring.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use heapless::Vec;
use log::{debug, warn};

use crate::bus::Bus;
use crate::channel::{Channel, CoeffSlot, PgaGain};
use crate::config::{ChannelConfig, CALIBRATION_SETTLE};
use crate::error::Nafe13388Error;
use crate::nafe13388::{Nafe13388, Nafe13388Result};
use crate::register::{Register16, Register24};

/// Input span at unity gain, in volts.
const PGA1X_VOLTAGE: f64 = 5.0;
const ADC_RESOLUTION: i32 = 24;
/// Gain of the lowest PGA setting, which defines the widest input span.
const BASE_PGA_GAIN: f64 = 0.2;

/// Largest positive code of the signed 24-bit ADC core.
const FULLSCALE_CODE: f64 = (1u32 << (ADC_RESOLUTION - 1)) as f64;

/// Highest PGA gain index measured against REFH; higher gains use REFL.
const REFH_MAX_GAIN_INDEX: u8 = 4;

const REFH_VOLTAGE: f64 = 2.30;
const REFL_VOLTAGE: f64 = 0.20;

/// HV_AIP / HV_AIN mux codes of the internal references.
const REFH_MUX: u16 = 0x5;
const REFL_MUX: u16 = 0x6;

/// CH_CONFIG1 for calibration channels: low data rate, coefficient set in bits 15:12.
const CAL_CC1: u16 = 0x00A4;
/// CH_CONFIG2 for calibration channels: long channel delay, normal settling.
const CAL_CC2: u16 = 0xBC00;

/// Range of the signed 24-bit GAIN_COEFFn / OFFSET_COEFFn registers.
const TRIM_MIN: i64 = -0x80_0000;
const TRIM_MAX: i64 = 0x7F_FFFF;

/// A measured ADC code at a known input voltage.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReferencePoint {
    pub data: i32,
    pub voltage: f64,
}

/// Two reference points and the trim slots to calibrate from and into.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReferencePair {
    pub low: ReferencePoint,
    pub high: ReferencePoint,
    /// Slot whose current trim values were in effect when the points were measured.
    pub source_slot: u8,
    /// Slot receiving the corrected trim values.
    pub target_slot: u8,
}

/// A gain/offset trim pair as stored in GAIN_COEFFn / OFFSET_COEFFn.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Trim {
    pub gain: i32,
    pub offset: i32,
}

impl Trim {
    /// Accepts computed trim values only if both fit the 24-bit trim registers.
    pub fn checked(gain: i64, offset: i64) -> Result<Self, TrimError> {
        let fits = |v: i64| (TRIM_MIN..=TRIM_MAX).contains(&v);
        if !fits(gain) || !fits(offset) {
            return Err(TrimError::OutOfRange { gain, offset });
        }

        Ok(Trim {
            gain: gain as i32,
            offset: offset as i32,
        })
    }
}

/// Reasons computed trim values cannot be written.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrimError {
    /// The inputs would divide by zero.
    Degenerate,
    /// A computed value does not fit a signed 24-bit trim register.
    OutOfRange { gain: i64, offset: i64 },
}

impl<E> From<TrimError> for Nafe13388Error<E> {
    fn from(error: TrimError) -> Self {
        match error {
            TrimError::Degenerate => Nafe13388Error::DegenerateReference,
            TrimError::OutOfRange { gain, offset } => Nafe13388Error::TrimOutOfRange { gain, offset },
        }
    }
}

/// Which input of the calibration channel carries the reference voltage.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RefSide {
    Positive,
    Negative,
}

/// Internal reference used to self-calibrate a PGA setting.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReferenceSource {
    /// 2.30 V, for PGA gain index 0..=4.
    RefH,
    /// 0.20 V, for PGA gain index 5..=7.
    RefL,
}

impl ReferenceSource {
    pub fn for_gain(gain: PgaGain) -> Self {
        if gain.index() <= REFH_MAX_GAIN_INDEX {
            ReferenceSource::RefH
        } else {
            ReferenceSource::RefL
        }
    }

    pub fn voltage(self) -> f64 {
        match self {
            ReferenceSource::RefH => REFH_VOLTAGE,
            ReferenceSource::RefL => REFL_VOLTAGE,
        }
    }

    fn mux(self) -> u16 {
        match self {
            ReferenceSource::RefH => REFH_MUX,
            ReferenceSource::RefL => REFL_MUX,
        }
    }
}

/// Outcome of one [`Nafe13388::recalibrate`] run.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SelfCalibration {
    pub gain: PgaGain,
    pub data_ref: i32,
    pub data_gnd: i32,
    pub gain_ratio: f64,
    /// Values written to the trim registers.
    pub trim: Trim,
}

/// Input span in volts at a PGA setting.
pub fn fullscale_voltage(gain: PgaGain) -> f64 {
    PGA1X_VOLTAGE / gain.factor()
}

/// Trim values for the line through two reference points.
///
/// The measured slope (codes per volt) is compared to the ideal slope of the
/// widest input range, `2^23 / (5 V / 0.2)`. The gain trim is scaled by
/// `ideal / measured` and the offset trim becomes
/// `(slope * low.voltage - low.data) / ratio - current.offset`.
///
/// Fails with [`TrimError::Degenerate`] if the points share a voltage or a
/// code, and with [`TrimError::OutOfRange`] if a result does not fit 24 bits.
pub fn two_point_trim(low: ReferencePoint, high: ReferencePoint, current: Trim) -> Result<Trim, TrimError> {
    let dv = high.voltage - low.voltage;
    let dd = high.data as f64 - low.data as f64;
    if dv == 0.0 || dd == 0.0 {
        return Err(TrimError::Degenerate);
    }

    let slope = dd / dv;
    let ideal_slope = FULLSCALE_CODE / (PGA1X_VOLTAGE / BASE_PGA_GAIN);
    let ratio = ideal_slope / slope;
    let offset = (slope * low.voltage - low.data as f64) / ratio - current.offset as f64;

    Trim::checked(
        libm::round(current.gain as f64 * ratio) as i64,
        libm::round(offset) as i64,
    )
}

/// Gain correction from a reference measurement: `2^23 * (v_ref / fullscale) / (data_ref - data_gnd)`.
///
/// Returns [`None`] if the two readings are equal.
pub fn self_calibration_ratio(reference_voltage: f64, fullscale_voltage: f64, data_ref: i32, data_gnd: i32) -> Option<f64> {
    let span = data_ref as i64 - data_gnd as i64;
    if span == 0 {
        return None;
    }

    Some(FULLSCALE_CODE * (reference_voltage / fullscale_voltage) / span as f64)
}

/// CH_CONFIG words measuring ground and the reference at a PGA setting.
pub(crate) fn calibration_configs(gain: PgaGain, side: RefSide) -> (ChannelConfig, ChannelConfig) {
    let source = ReferenceSource::for_gain(gain);
    let cc1 = ((gain.index() as u16) << 12) | CAL_CC1;

    let gnd = ChannelConfig::new(0, cc1, CAL_CC2, 0x0000).high_voltage(true).gain(gain);
    let reference = match side {
        RefSide::Positive => gnd.positive_input(source.mux()),
        RefSide::Negative => gnd.negative_input(source.mux()),
    };

    (gnd, reference)
}

impl<B, D, RST> Nafe13388<B, D, RST>
where
    B: Bus,
    D: DelayNs,
    RST: OutputPin,
{
    fn coeff_slot(index: u8) -> Nafe13388Result<CoeffSlot, B::Error> {
        CoeffSlot::new(index).ok_or(Nafe13388Error::InvalidCoeffSlot(index))
    }

    /// Reads the gain/offset trim pair of a coefficient slot.
    pub fn coefficients(&mut self, slot: u8) -> Nafe13388Result<Trim, B::Error> {
        let slot = Self::coeff_slot(slot)?;

        Ok(Trim {
            gain: self.bus.read(Register24::GainCoeff(slot))?,
            offset: self.bus.read(Register24::OffsetCoeff(slot))?,
        })
    }

    fn write_coefficients(&mut self, slot: CoeffSlot, trim: Trim) -> Nafe13388Result<(), B::Error> {
        self.bus.write(Register24::GainCoeff(slot), trim.gain)?;
        self.bus.write(Register24::OffsetCoeff(slot), trim.offset)
    }

    /// Two-point calibration against external references.
    ///
    /// Reads the trims of `pair.source_slot`, corrects them with
    /// [`two_point_trim`] and writes the result to `pair.target_slot`.
    pub fn gain_offset_coeff(&mut self, pair: &ReferencePair) -> Nafe13388Result<Trim, B::Error> {
        let source = Self::coeff_slot(pair.source_slot)?;
        let target = Self::coeff_slot(pair.target_slot)?;

        let current = self.coefficients(source.index())?;
        let trim = two_point_trim(pair.low, pair.high, current)?;
        self.write_coefficients(target, trim)?;

        debug!(
            "two-point calibration slot {} -> {}: {:?} -> {:?}",
            source.index(),
            target.index(),
            current,
            trim
        );
        Ok(trim)
    }

    /// Self-calibrates one PGA setting against an internal reference.
    ///
    /// Configures `ch_ref` to measure REFH (gain index 0..=4) or REFL (5..=7)
    /// and `ch_gnd` to measure ground, reads both after a 1.1 s settle, scales
    /// the gain trim of the PGA's coefficient slot and adds the ground reading
    /// to its offset trim.
    ///
    /// Both scratch channels are disabled afterwards, whether or not the run
    /// succeeded. The trims are only written if both new values fit the 24-bit
    /// registers, otherwise [`Nafe13388Error::TrimOutOfRange`] is returned.
    pub fn recalibrate(
        &mut self,
        pga_gain_index: u8,
        side: RefSide,
        ch_gnd: u8,
        ch_ref: u8,
    ) -> Nafe13388Result<SelfCalibration, B::Error> {
        let gain = PgaGain::from_index(pga_gain_index).ok_or(Nafe13388Error::<B::Error>::InvalidPgaGain(pga_gain_index))?;
        let gnd_ch = Self::channel(ch_gnd)?;
        let ref_ch = Self::channel(ch_ref)?;
        if gnd_ch == ref_ch {
            return Err(Nafe13388Error::InvalidChannel(ch_ref));
        }

        let outcome = self.measure_and_trim(gain, side, gnd_ch, ref_ch);
        let released = self.release_scratch(gnd_ch, ref_ch);

        let calibration = outcome?;
        released?;

        Ok(calibration)
    }

    fn measure_and_trim(
        &mut self,
        gain: PgaGain,
        side: RefSide,
        gnd_ch: Channel,
        ref_ch: Channel,
    ) -> Nafe13388Result<SelfCalibration, B::Error> {
        let source = ReferenceSource::for_gain(gain);
        let (gnd_cfg, ref_cfg) = calibration_configs(gain, side);

        self.configure(ref_ch.index(), ref_cfg)?;
        self.configure(gnd_ch.index(), gnd_cfg)?;

        let data_ref = self.read_raw(ref_ch.index(), Some(CALIBRATION_SETTLE))?;
        let data_gnd = self.read_raw(gnd_ch.index(), Some(CALIBRATION_SETTLE))?;

        let gain_ratio = self_calibration_ratio(source.voltage(), fullscale_voltage(gain), data_ref, data_gnd)
            .ok_or(TrimError::Degenerate)?;

        let slot = CoeffSlot::from(gain);
        let current = self.coefficients(slot.index())?;
        let trim = Trim::checked(
            libm::round(current.gain as f64 * gain_ratio) as i64,
            current.offset as i64 + data_gnd as i64,
        );
        let trim = match trim {
            Ok(trim) => trim,
            Err(error) => {
                warn!("recalibration of {:?} rejected: {:?}", gain, error);
                return Err(error.into());
            }
        };
        self.write_coefficients(slot, trim)?;

        debug!(
            "recalibrated {:?} with {:?}: ref {} gnd {} ratio {} -> {:?}",
            gain, source, data_ref, data_gnd, gain_ratio, trim
        );
        Ok(SelfCalibration { gain, data_ref, data_gnd, gain_ratio, trim })
    }

    /// Runs [`recalibrate`](Self::recalibrate) for every PGA setting, lowest gain first.
    pub fn recalibrate_all(
        &mut self,
        side: RefSide,
        ch_gnd: u8,
        ch_ref: u8,
    ) -> Nafe13388Result<Vec<SelfCalibration, 8>, B::Error> {
        let mut results = Vec::new();
        for gain in PgaGain::ALL {
            let result = self.recalibrate(gain.index(), side, ch_gnd, ch_ref)?;
            // Capacity equals PgaGain::ALL.len()
            let _ = results.push(result);
        }

        Ok(results)
    }

    fn release_scratch(&mut self, a: Channel, b: Channel) -> Nafe13388Result<(), B::Error> {
        self.modify(Register16::ChConfig4, !(a.mask() | b.mask()), 0)?;

        Ok(())
    }
}
