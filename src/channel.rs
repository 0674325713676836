//! Validated indices used to address per-channel and per-slot registers.

/// Number of logical channels.
pub const CHANNEL_COUNT: usize = 16;

/// A logical channel index, guaranteed to be in 0..=15.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel(u8);

impl Channel {
    /// Returns [`None`] if `index` is not a logical channel.
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < CHANNEL_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    pub const fn index(self) -> u8 {
        self.0
    }

    /// The channel's bit in the CH_CONFIG4 enable mask.
    pub const fn mask(self) -> u16 {
        1 << self.0
    }

    /// All logical channels in ascending order.
    pub fn all() -> impl Iterator<Item = Channel> {
        (0..CHANNEL_COUNT as u8).map(Channel)
    }
}

impl TryFrom<u8> for Channel {
    type Error = u8;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Channel::new(index).ok_or(index)
    }
}

/// A gain/offset coefficient slot (GAIN_COEFFn / OFFSET_COEFFn), in 0..=15.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CoeffSlot(u8);

impl CoeffSlot {
    pub const fn new(index: u8) -> Option<Self> {
        if index < 16 {
            Some(Self(index))
        } else {
            None
        }
    }

    pub const fn index(self) -> u8 {
        self.0
    }
}

impl From<PgaGain> for CoeffSlot {
    /// The factory coefficient slot associated with a PGA setting.
    fn from(gain: PgaGain) -> Self {
        CoeffSlot(gain.index())
    }
}

/// Programmable gain amplifier setting, the 3-bit CH_GAIN field of CH_CONFIG0.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PgaGain {
    X0_2 = 0,
    X0_4 = 1,
    X0_8 = 2,
    X1 = 3,
    X2 = 4,
    X4 = 5,
    X8 = 6,
    X16 = 7,
}

impl PgaGain {
    pub const ALL: [PgaGain; 8] = [
        PgaGain::X0_2,
        PgaGain::X0_4,
        PgaGain::X0_8,
        PgaGain::X1,
        PgaGain::X2,
        PgaGain::X4,
        PgaGain::X8,
        PgaGain::X16,
    ];

    const FACTORS: [f64; 8] = [0.2, 0.4, 0.8, 1.0, 2.0, 4.0, 8.0, 16.0];

    /// Decodes a 3-bit gain index; only the low 3 bits are considered.
    pub const fn from_bits(bits: u16) -> Self {
        Self::ALL[(bits & 0x7) as usize]
    }

    pub const fn from_index(index: u8) -> Option<Self> {
        if index < 8 {
            Some(Self::ALL[index as usize])
        } else {
            None
        }
    }

    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Amplifier gain as a plain factor.
    pub const fn factor(self) -> f64 {
        Self::FACTORS[self as usize]
    }
}
