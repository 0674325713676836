use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error as _, ErrorKind, ErrorType, OutputPin};
use embedded_hal::spi::SpiDevice;
use heapless::Vec;
use log::{debug, warn};

use crate::bus::{Bus, Spi, SpiAddress, MAX_BURST_WORDS};
use crate::channel::{Channel, CHANNEL_COUNT};
use crate::config::{ChannelConfig, ResetPolicy};
use crate::error::Nafe13388Error;
use crate::register::sys_status::SysStatus0;
use crate::register::{Command, Register16, Register24};

/// Type alias for a NAFE13388 communicating over SPI
pub type Nafe13388Spi<T, D, RST = NoPin> = Nafe13388<Spi<T>, D, RST>;

/// Type alias used to simplify return types throughout the driver
pub type Nafe13388Result<T, BusError> = Result<T, Nafe13388Error<BusError>>;

/// Number of CHIP_READY polls after a reset before the device is declared absent.
pub const READY_POLL_ATTEMPTS: u8 = 10;

const READY_POLL_INTERVAL_MS: u32 = 3;
const RESET_PULSE_MS: u32 = 1;
const BOOT_SETTLE_MS: u32 = 1;

/// SYS_CONFIG0 value enabling conversions.
const SYS_CONFIG0_BOOT: u16 = 0x0010;

/// Main NAFE13388 driver struct
///
/// One instance owns one physical device: its bus, its delay source, its reset
/// pin and the per-channel scaling state. Nothing is shared between instances.
/// The driver is not internally synchronized; wrap the whole handle in a lock
/// if several tasks need it.
pub struct Nafe13388<B, D, RST = NoPin> {
    pub(crate) bus: B,
    pub(crate) delay: D,
    reset_pin: RST,
    pub(crate) coeff_uv: [f64; CHANNEL_COUNT],
    pub(crate) enabled_mask: u16,
    pub(crate) enabled_channels: u8,
}

/// Placeholder for boards where nRESET is not wired to the MCU.
///
/// Requesting a [`ResetPolicy::Hardware`] reset with this pin fails with
/// [`Nafe13388Error::Pin`].
#[derive(Copy, Clone, Debug, Default)]
pub struct NoPin;

#[derive(Debug)]
pub struct NoPinError;

impl embedded_hal::digital::Error for NoPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl ErrorType for NoPin {
    type Error = NoPinError;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Err(NoPinError)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Err(NoPinError)
    }
}

impl<T, D, RST> Nafe13388Spi<T, D, RST>
where
    T: SpiDevice,
    D: DelayNs,
    RST: OutputPin,
{
    /// Constructs a new driver communicating over SPI and brings the device up.
    ///
    /// This function will:
    /// - Reset the device according to `reset` and wait for CHIP_READY.
    /// - Boot it (abort, clear GPIO registers, enable conversions).
    ///
    /// The SPI device must already be set to mode 1.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use embedded_hal::delay::DelayNs;
    /// # use embedded_hal::spi::SpiDevice;
    /// use nafe13388::{ChannelConfig, Nafe13388, Nafe13388Result, NoPin, ResetPolicy, SpiAddress};
    /// # fn demo<S: SpiDevice, D: DelayNs>(spi: S, delay: D) -> Nafe13388Result<(), S::Error> {
    /// let mut afe = Nafe13388::new_spi(spi, SpiAddress::Low, delay, NoPin, ResetPolicy::Soft)?;
    ///
    /// afe.configure(0, ChannelConfig::new(0x1070, 0x0084, 0x2900, 0x0000))?;
    /// let uv = afe.read_microvolt(0, Some(core::time::Duration::from_millis(10)))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new_spi(
        spi: T,
        address: SpiAddress,
        delay: D,
        reset_pin: RST,
        reset: ResetPolicy,
    ) -> Nafe13388Result<Self, T::Error> {
        Self::new(Spi::new(spi, address), delay, reset_pin, reset)
    }
}

impl<B, D, RST> Nafe13388<B, D, RST>
where
    B: Bus,
    D: DelayNs,
    RST: OutputPin,
{
    pub(crate) fn new(bus: B, delay: D, reset_pin: RST, reset: ResetPolicy) -> Nafe13388Result<Self, B::Error> {
        let mut device = Nafe13388 {
            bus,
            delay,
            reset_pin,
            coeff_uv: [0.0; CHANNEL_COUNT],
            enabled_mask: 0,
            enabled_channels: 0,
        };

        device.begin(reset)?;

        Ok(device)
    }

    /// Gives back the bus, delay and reset pin.
    pub fn release(self) -> (B, D, RST) {
        (self.bus, self.delay, self.reset_pin)
    }

    /// Resets then boots the device. The constructor already does this once.
    pub fn begin(&mut self, reset: ResetPolicy) -> Nafe13388Result<(), B::Error> {
        self.reset(reset)?;
        self.boot()
    }

    /// Resets the device and waits until it reports CHIP_READY.
    ///
    /// Returns [`Nafe13388Error::NotReady`] if the flag is not seen within
    /// [`READY_POLL_ATTEMPTS`] polls, 3 ms apart.
    ///
    /// **Note:** All channel configuration is lost; the driver's enabled-channel mirror is cleared accordingly.
    pub fn reset(&mut self, reset: ResetPolicy) -> Nafe13388Result<(), B::Error> {
        match reset {
            ResetPolicy::Hardware => {
                debug!("hardware reset");
                self.reset_pin.set_low().map_err(|e| Nafe13388Error::<B::Error>::Pin(e.kind()))?;
                self.delay.delay_ms(RESET_PULSE_MS);
                self.reset_pin.set_high().map_err(|e| Nafe13388Error::<B::Error>::Pin(e.kind()))?;
            }
            ResetPolicy::Soft => {
                debug!("soft reset");
                self.bus.command(Command::Reset)?;
            }
        }

        self.enabled_mask = 0;
        self.enabled_channels = 0;

        self.wait_ready(READY_POLL_ATTEMPTS)
    }

    fn wait_ready(&mut self, attempts: u8) -> Nafe13388Result<(), B::Error> {
        for attempt in 1..=attempts {
            self.delay.delay_ms(READY_POLL_INTERVAL_MS);
            if self.status()?.chip_ready() {
                debug!("chip ready after {} polls", attempt);
                return Ok(());
            }
        }

        warn!("chip not ready after {} polls", attempts);
        Err(Nafe13388Error::NotReady { attempts })
    }

    /// Sets the system-level registers needed before any conversion.
    pub fn boot(&mut self) -> Nafe13388Result<(), B::Error> {
        self.bus.command(Command::Abort)?;

        for reg in [
            Register16::GpioConfig0,
            Register16::GpioConfig1,
            Register16::GpioConfig2,
            Register16::GpoData,
            Register16::GpiData,
        ] {
            self.bus.write(reg, 0x0000)?;
        }
        self.delay.delay_ms(BOOT_SETTLE_MS);

        self.bus.write(Register16::SysConfig0, SYS_CONFIG0_BOOT)?;
        self.delay.delay_ms(BOOT_SETTLE_MS);

        debug!("boot complete");
        Ok(())
    }

    /// Returns the SYS_STATUS0 (0x31) register.
    pub fn status(&mut self) -> Nafe13388Result<SysStatus0, B::Error> {
        Ok(SysStatus0::from(self.bus.read(SysStatus0::REGISTER)?))
    }

    /// Part number from PN2 and PN1.
    pub fn part_number(&mut self) -> Nafe13388Result<u32, B::Error> {
        let high = self.bus.read(Register16::Pn2)? as u32;
        let low = self.bus.read(Register16::Pn1)? as u32;

        Ok(high << 16 | low)
    }

    /// Silicon revision, the low nibble of PN0.
    pub fn revision_number(&mut self) -> Nafe13388Result<u8, B::Error> {
        Ok((self.bus.read(Register16::Pn0)? & 0xF) as u8)
    }

    /// 48-bit serial number from SERIAL1 and SERIAL0.
    pub fn serial_number(&mut self) -> Nafe13388Result<u64, B::Error> {
        let high = self.bus.read(Register24::Serial1)? as u32 & 0xFF_FFFF;
        let low = self.bus.read(Register24::Serial0)? as u32 & 0xFF_FFFF;

        Ok((high as u64) << 24 | low as u64)
    }

    /// Die temperature in °C.
    pub fn temperature(&mut self) -> Nafe13388Result<f32, B::Error> {
        let raw = self.bus.read(Register16::DieTemp)? as i16;

        Ok(raw as f32 / 64.0)
    }

    /// Read-modify-write of a 16-bit register: `(old & mask) | value`. Returns the value written.
    ///
    /// Writing CH_CONFIG4 also refreshes the enabled-channel mirror.
    pub fn modify(&mut self, reg: Register16, mask: u16, value: u16) -> Nafe13388Result<u16, B::Error> {
        let bits = (self.bus.read(reg)? & mask) | value;
        self.bus.write(reg, bits)?;

        if reg == Register16::ChConfig4 {
            self.mirror_enabled(bits);
        }

        Ok(bits)
    }

    /// Configures a logical channel and enables it.
    ///
    /// Writes CH_CONFIG0..3 for `ch`, sets its bit in the CH_CONFIG4 enable mask
    /// without touching the other channels, and caches the raw-to-microvolt
    /// coefficient used by [`read_microvolt`](Self::read_microvolt).
    pub fn configure(&mut self, ch: u8, config: ChannelConfig) -> Nafe13388Result<(), B::Error> {
        let ch = Self::channel(ch)?;

        self.bus.command(Command::Channel(ch))?;
        for (reg, word) in Register16::CHANNEL_CONFIG.into_iter().zip(config.words()) {
            self.bus.write(reg, word)?;
        }

        self.modify(Register16::ChConfig4, !ch.mask(), ch.mask())?;

        self.coeff_uv[ch.index() as usize] = config.coefficient_uv();

        debug!(
            "ch{} configured {:04x?}, {} enabled, {} uV/code",
            ch.index(),
            config.words(),
            self.enabled_channels,
            self.coeff_uv[ch.index() as usize]
        );
        Ok(())
    }

    /// Clears a channel's bit in the CH_CONFIG4 enable mask.
    pub fn disable(&mut self, ch: u8) -> Nafe13388Result<(), B::Error> {
        let ch = Self::channel(ch)?;
        self.modify(Register16::ChConfig4, !ch.mask(), 0)?;

        Ok(())
    }

    fn mirror_enabled(&mut self, bits: u16) {
        self.enabled_mask = bits;
        self.enabled_channels = bits.count_ones() as u8;
    }

    /// Number of enabled logical channels as of the last configuration change.
    pub fn enabled_channels(&self) -> u8 {
        self.enabled_channels
    }

    /// CH_CONFIG4 enable mask as of the last configuration change.
    pub fn enabled_mask(&self) -> u16 {
        self.enabled_mask
    }

    /// Cached microvolts-per-code coefficient of a channel. Zero until the channel is configured.
    pub fn coefficient_uv(&self, ch: u8) -> Nafe13388Result<f64, B::Error> {
        Ok(self.coeff_uv[Self::channel(ch)?.index() as usize])
    }

    /// Starts a single conversion on one channel.
    pub fn start(&mut self, ch: u8) -> Nafe13388Result<(), B::Error> {
        let ch = Self::channel(ch)?;
        self.bus.command(Command::Channel(ch))?;
        self.bus.command(Command::SingleShot)
    }

    /// Starts continuous conversion on one channel.
    pub fn start_continuous(&mut self, ch: u8) -> Nafe13388Result<(), B::Error> {
        let ch = Self::channel(ch)?;
        self.bus.command(Command::Channel(ch))?;
        self.bus.command(Command::SingleContinuous)
    }

    /// Starts one conversion on every enabled channel.
    pub fn start_all(&mut self) -> Nafe13388Result<(), B::Error> {
        self.bus.command(Command::MultiSingle)
    }

    /// Starts continuous conversion on every enabled channel.
    pub fn start_all_continuous(&mut self) -> Nafe13388Result<(), B::Error> {
        self.bus.command(Command::MultiContinuous)
    }

    /// Stops any running conversion.
    pub fn abort(&mut self) -> Nafe13388Result<(), B::Error> {
        self.bus.command(Command::Abort)
    }

    /// Reads a channel's raw 24-bit result, sign-extended.
    ///
    /// With `Some(delay)` a single conversion is started first and the result is
    /// read `delay` later. With [`None`] the data register is read as-is, which
    /// assumes a conversion already completed (earlier [`start`](Self::start) or
    /// continuous mode). The delay is the only synchronization: no status is polled.
    pub fn read_raw(&mut self, ch: u8, delay: Option<Duration>) -> Nafe13388Result<i32, B::Error> {
        let ch = Self::channel(ch)?;

        if let Some(delay) = delay {
            self.start(ch.index())?;
            self.wait(delay);
        }

        self.bus.read(Register24::ChData(ch))
    }

    /// Same as [`read_raw`](Self::read_raw), scaled to microvolts with the channel's cached coefficient.
    pub fn read_microvolt(&mut self, ch: u8, delay: Option<Duration>) -> Nafe13388Result<f64, B::Error> {
        let raw = self.read_raw(ch, delay)?;

        Ok(raw as f64 * self.coeff_uv[ch as usize])
    }

    /// Reads every enabled channel in one burst transaction, in ascending channel order.
    ///
    /// With `Some(delay)` a multi-channel conversion is started first.
    pub fn read_all_raw(&mut self, delay: Option<Duration>) -> Nafe13388Result<Vec<i32, MAX_BURST_WORDS>, B::Error> {
        if let Some(delay) = delay {
            self.start_all()?;
            self.wait(delay);
        }

        let mut buf = [0i32; MAX_BURST_WORDS];
        let len = self.enabled_channels as usize;
        self.bus.burst(&mut buf[..len])?;

        Ok(buf[..len].iter().copied().collect())
    }

    /// Same as [`read_all_raw`](Self::read_all_raw), scaled to microvolts per channel.
    pub fn read_all_microvolt(&mut self, delay: Option<Duration>) -> Nafe13388Result<Vec<f64, MAX_BURST_WORDS>, B::Error> {
        let raw = self.read_all_raw(delay)?;
        let mask = self.enabled_mask;

        Ok(Channel::all()
            .filter(|ch| mask & ch.mask() != 0)
            .zip(raw)
            .map(|(ch, value)| value as f64 * self.coeff_uv[ch.index() as usize])
            .collect())
    }

    pub(crate) fn channel(index: u8) -> Nafe13388Result<Channel, B::Error> {
        Channel::new(index).ok_or(Nafe13388Error::InvalidChannel(index))
    }

    pub(crate) fn wait(&mut self, delay: Duration) {
        let us = u32::try_from(delay.as_micros()).unwrap_or(u32::MAX);
        self.delay.delay_us(us);
    }
}
