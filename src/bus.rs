//! SPI framing for the NAFE13388.
//!
//! Every transaction starts with a 2-byte big-endian address word:
//! `(address << 1) | read_bit`, with the device-address bit OR'd into the top
//! bit of the first byte. Writes append the payload big-endian, reads clock out
//! the payload right after the address word, and commands are the bare word.

use embedded_hal::spi::SpiDevice;
use log::trace;

use crate::error::Nafe13388Error;
use crate::register::{Command, Register};

/// Length of the address word that starts every frame.
pub const HEADER_LEN: usize = 2;

/// Largest payload of a single register access.
pub const MAX_REG_BYTES: usize = 3;

/// Largest burst reply: one 24-bit result for each of the 16 logical channels.
pub const MAX_BURST_WORDS: usize = 16;

const BURST_FRAME_LEN: usize = HEADER_LEN + MAX_BURST_WORDS * 3;

/// State of the device-address bit, selecting one of two devices sharing a chip select.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiAddress {
    #[default]
    Low,
    High,
}

pub mod frame {
    //! Pure encoding of the address word, shared by the SPI bus and its tests.
    use super::SpiAddress;

    pub const READ_BIT: u16 = 0x4000;
    const DEVICE_BIT: u8 = 0x80;

    /// Encodes the 2-byte address word.
    pub fn header(addr: u16, read: bool, device: SpiAddress) -> [u8; 2] {
        let mut word = addr << 1;
        if read {
            word |= READ_BIT;
        }

        let mut bytes = word.to_be_bytes();
        if device == SpiAddress::High {
            bytes[0] |= DEVICE_BIT;
        }

        bytes
    }

    /// Decoded address word.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Header {
        /// Raw 15-bit word after removing the device bit, shifted back to an address or opcode.
        pub addr: u16,
        pub read: bool,
        pub device: SpiAddress,
    }

    /// Decodes an address word as a register access: bit 14 is the read flag.
    pub fn parse_register(bytes: [u8; 2]) -> Header {
        let (word, device) = strip_device(bytes);
        Header {
            addr: (word & !READ_BIT) >> 1,
            read: word & READ_BIT != 0,
            device,
        }
    }

    /// Decodes an address word as a command: the whole 15-bit word is the opcode.
    pub fn parse_command(bytes: [u8; 2]) -> Header {
        let (word, device) = strip_device(bytes);
        Header {
            addr: word >> 1,
            read: false,
            device,
        }
    }

    fn strip_device(bytes: [u8; 2]) -> (u16, SpiAddress) {
        let device = if bytes[0] & DEVICE_BIT != 0 {
            SpiAddress::High
        } else {
            SpiAddress::Low
        };

        (u16::from_be_bytes([bytes[0] & !DEVICE_BIT, bytes[1]]), device)
    }
}

/// Register-level access to the device.
///
/// This is the only path to hardware state. Everything above it (channel
/// configuration, acquisition, calibration) talks to a `Bus`, so a fake `Bus`
/// is enough to exercise the whole driver.
pub trait Bus {
    type Error;

    fn command(&mut self, cmd: Command) -> Result<(), Nafe13388Error<Self::Error>>;

    fn read<R: Register>(&mut self, reg: R) -> Result<R::Value, Nafe13388Error<Self::Error>>;

    fn write<R: Register>(&mut self, reg: R, value: R::Value) -> Result<(), Nafe13388Error<Self::Error>>;

    /// Issues BURST_DATA and decodes `out.len()` consecutive 24-bit results.
    ///
    /// `out` may hold at most [`MAX_BURST_WORDS`] values.
    fn burst(&mut self, out: &mut [i32]) -> Result<(), Nafe13388Error<Self::Error>>;
}

pub struct Spi<SpiType> {
    spi: SpiType,
    address: SpiAddress,
}

impl<SpiType> Spi<SpiType>
where
    SpiType: SpiDevice,
{
    pub(crate) fn new(spi: SpiType, address: SpiAddress) -> Self {
        Self { spi, address }
    }

    pub fn release(self) -> SpiType {
        self.spi
    }

    fn transfer(&mut self, frame: &mut [u8]) -> Result<(), Nafe13388Error<SpiType::Error>> {
        trace!("spi tx {:02x?}", frame);
        self.spi.transfer_in_place(frame).map_err(Nafe13388Error::Bus)?;
        trace!("spi rx {:02x?}", frame);

        Ok(())
    }
}

impl<SpiType> Bus for Spi<SpiType>
where
    SpiType: SpiDevice,
{
    type Error = SpiType::Error;

    fn command(&mut self, cmd: Command) -> Result<(), Nafe13388Error<Self::Error>> {
        let mut buf = frame::header(cmd.opcode(), false, self.address);
        self.transfer(&mut buf)
    }

    fn read<R: Register>(&mut self, reg: R) -> Result<R::Value, Nafe13388Error<Self::Error>> {
        let len = HEADER_LEN + R::WIDTH;
        let mut buf = [0u8; HEADER_LEN + MAX_REG_BYTES];
        buf[..HEADER_LEN].copy_from_slice(&frame::header(reg.addr(), true, self.address));

        self.transfer(&mut buf[..len])?;

        Ok(R::decode(&buf[HEADER_LEN..len]))
    }

    fn write<R: Register>(&mut self, reg: R, value: R::Value) -> Result<(), Nafe13388Error<Self::Error>> {
        let len = HEADER_LEN + R::WIDTH;
        let mut buf = [0u8; HEADER_LEN + MAX_REG_BYTES];
        buf[..HEADER_LEN].copy_from_slice(&frame::header(reg.addr(), false, self.address));
        R::encode(value, &mut buf[HEADER_LEN..len]);

        self.transfer(&mut buf[..len])
    }

    fn burst(&mut self, out: &mut [i32]) -> Result<(), Nafe13388Error<Self::Error>> {
        if out.len() > MAX_BURST_WORDS {
            return Err(Nafe13388Error::BufferLength {
                max: MAX_BURST_WORDS,
                actual: out.len(),
            });
        }

        let len = HEADER_LEN + out.len() * 3;
        let mut buf = [0u8; BURST_FRAME_LEN];
        buf[..HEADER_LEN].copy_from_slice(&frame::header(Command::BurstData.opcode(), true, self.address));

        self.transfer(&mut buf[..len])?;

        for (value, bytes) in out.iter_mut().zip(buf[HEADER_LEN..len].chunks_exact(3)) {
            *value = crate::register::sign_extend_24(bytes);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::register::{Register16, Register24};
    use crate::testing::RecordingSpi;

    #[test]
    fn header_round_trip() {
        for addr in 0x00..=0xFF {
            for read in [false, true] {
                for device in [SpiAddress::Low, SpiAddress::High] {
                    let bytes = frame::header(addr, read, device);
                    let header = frame::parse_register(bytes);
                    assert_eq!(frame::Header { addr, read, device }, header);
                    assert_eq!(bytes, frame::header(header.addr, header.read, header.device));
                }
            }
        }
    }

    #[test]
    fn command_round_trip() {
        let channels = Channel::all().map(Command::Channel);
        let others = [
            Command::Abort,
            Command::End,
            Command::ClearAlarm,
            Command::ClearData,
            Command::Reset,
            Command::ClearReg,
            Command::Reload,
            Command::SingleShot,
            Command::SingleContinuous,
            Command::MultiMulti,
            Command::MultiContinuous,
            Command::MultiSingle,
            Command::BurstData,
            Command::CalcCrcConfig,
            Command::CalcCrcCoef,
            Command::CalcCrcFac,
        ];

        for cmd in channels.chain(others) {
            for device in [SpiAddress::Low, SpiAddress::High] {
                let header = frame::parse_command(frame::header(cmd.opcode(), false, device));
                assert_eq!(cmd.opcode(), header.addr);
                assert_eq!(device, header.device);
            }
        }
    }

    #[test]
    fn write_frames_decode_to_register_and_value() {
        let mut regs = std::vec::Vec::new();
        for ch in Channel::all() {
            regs.push(Register24::ChData(ch));
            regs.push(Register24::ChConfig5(ch));
            regs.push(Register24::ChConfig6(ch));
        }
        for slot in (0..16).filter_map(crate::channel::CoeffSlot::new) {
            regs.push(Register24::GainCoeff(slot));
            regs.push(Register24::OffsetCoeff(slot));
        }
        regs.push(Register24::Serial1);
        regs.push(Register24::Serial0);
        let value_of = |i: usize| if i % 2 == 0 { 0x7F_FFFF - i as i32 } else { -0x80_0000 + i as i32 };
        let words = [0x0000, 0x0010, 0x8001, 0xFFFF];

        for device in [SpiAddress::Low, SpiAddress::High] {
            let mut bus = Spi::new(RecordingSpi::new(), device);
            for (i, reg) in regs.iter().enumerate() {
                bus.write(*reg, value_of(i)).unwrap();
            }
            for value in words {
                bus.write(Register16::ChConfig4, value).unwrap();
            }

            let frames = bus.release().frames;
            assert_eq!(regs.len() + words.len(), frames.len());
            for (i, (reg, frame)) in regs.iter().zip(&frames).enumerate() {
                let header = frame::parse_register([frame[0], frame[1]]);
                assert_eq!(frame::Header { addr: reg.addr(), read: false, device }, header);
                assert_eq!(value_of(i), Register24::decode(&frame[HEADER_LEN..]));
            }
            for (value, frame) in words.into_iter().zip(&frames[regs.len()..]) {
                let header = frame::parse_register([frame[0], frame[1]]);
                assert_eq!(frame::Header { addr: 0x24, read: false, device }, header);
                assert_eq!(value, Register16::decode(&frame[HEADER_LEN..]));
            }
        }
    }

    #[test]
    fn write16_frame() {
        let mut bus = Spi::new(RecordingSpi::new(), SpiAddress::Low);
        bus.write(Register16::SysConfig0, 0x0010).unwrap();

        assert_eq!(&[0x00, 0x60, 0x00, 0x10][..], bus.release().frames[0].as_slice());
    }

    #[test]
    fn write24_frame_with_device_bit() {
        let mut bus = Spi::new(RecordingSpi::new(), SpiAddress::High);
        let slot = crate::channel::CoeffSlot::new(2).unwrap();
        bus.write(Register24::GainCoeff(slot), 0x12_3456).unwrap();

        assert_eq!(&[0x81, 0x04, 0x12, 0x34, 0x56][..], bus.release().frames[0].as_slice());
    }

    #[test]
    fn read16_frame_and_payload() {
        let mut spi = RecordingSpi::new();
        spi.reply(&[0x00, 0x00, 0x20, 0x01]);
        let mut bus = Spi::new(spi, SpiAddress::Low);

        assert_eq!(0x2001, bus.read(Register16::SysStatus0).unwrap());
        assert_eq!(&[0x40, 0x62, 0x00, 0x00][..], bus.release().frames[0].as_slice());
    }

    #[test]
    fn read24_sign_extends() {
        let mut spi = RecordingSpi::new();
        spi.reply(&[0x00, 0x00, 0x80, 0x00, 0x00]);
        let mut bus = Spi::new(spi, SpiAddress::Low);

        let ch = Channel::new(3).unwrap();
        assert_eq!(-0x80_0000, bus.read(Register24::ChData(ch)).unwrap());
        assert_eq!(&[0x40, 0x86, 0, 0, 0][..], bus.release().frames[0].as_slice());
    }

    #[test]
    fn command_frame() {
        let mut bus = Spi::new(RecordingSpi::new(), SpiAddress::Low);
        bus.command(Command::Channel(Channel::new(5).unwrap())).unwrap();
        bus.command(Command::SingleShot).unwrap();

        let spi = bus.release();
        assert_eq!(&[0x00, 0x0A][..], spi.frames[0].as_slice());
        assert_eq!(&[0x40, 0x00][..], spi.frames[1].as_slice());
    }

    #[test]
    fn burst_decodes_consecutive_values() {
        let mut spi = RecordingSpi::new();
        spi.reply(&[0x00, 0x00, 0x00, 0x00, 0x01, 0xFF, 0xFF, 0xFF, 0x7F, 0xFF, 0xFF]);
        let mut bus = Spi::new(spi, SpiAddress::Low);

        let mut out = [0i32; 3];
        bus.burst(&mut out).unwrap();

        assert_eq!([1, -1, 0x7F_FFFF], out);
        let spi = bus.release();
        assert_eq!(11, spi.frames[0].len());
        assert_eq!(&[0x40, 0x0A][..], &spi.frames[0][..2]);
    }

    #[test]
    fn burst_rejects_oversized_buffer() {
        let mut bus = Spi::new(RecordingSpi::new(), SpiAddress::Low);
        let mut out = [0i32; 17];

        assert_eq!(
            Err(Nafe13388Error::BufferLength { max: 16, actual: 17 }),
            bus.burst(&mut out)
        );
        assert!(bus.release().frames.is_empty());
    }
}
