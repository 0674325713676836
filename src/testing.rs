//! Test doubles: a register-file [`FakeBus`], a byte-level [`RecordingSpi`],
//! a [`FakeDelay`] that records every wait, and a [`FakePin`].
use std::vec::Vec;

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::spi::{ErrorType, Operation, SpiDevice};
use heapless::LinearMap;

use crate::bus::{Bus, MAX_BURST_WORDS, MAX_REG_BYTES};
use crate::channel::Channel;
use crate::error::Nafe13388Error;
use crate::register::{Command, Register, Register16, Register24};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Key of a simulated register: (bank, address, width). Only CH_CONFIG0..3 are banked.
type RegKey = (u8, u16, usize);

const UNBANKED: u8 = 0xFF;

/// One bus transaction as seen by [`FakeBus`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Transaction {
    Command(Command),
    Read { addr: u16, width: usize },
    Write { addr: u16, bank: Option<u8>, raw: u32 },
    Burst { len: usize },
}

pub struct FakeBus {
    regs: LinearMap<RegKey, [u8; MAX_REG_BYTES], 128>,
    selected: Option<Channel>,
    ready_after: Option<u32>,
    status_reads: u32,
    failing_read: Option<u16>,
    pub log: Vec<Transaction>,
}

impl FakeBus {
    /// A device that reports CHIP_READY on the first status poll.
    pub fn new() -> Self {
        Self {
            regs: LinearMap::new(),
            selected: None,
            ready_after: Some(1),
            status_reads: 0,
            failing_read: None,
            log: Vec::new(),
        }
    }

    /// CHIP_READY is reported from the `k`-th status poll on, or never for [`None`].
    pub fn with_ready_after(mut self, k: Option<u32>) -> Self {
        self.ready_after = k;

        self
    }

    /// Every read of register `addr` fails with a bus error.
    pub fn with_failing_read(mut self, addr: u16) -> Self {
        self.failing_read = Some(addr);

        self
    }

    pub fn status_reads(&self) -> u32 {
        self.status_reads
    }

    pub fn set16(&mut self, reg: Register16, value: u16) {
        let key = self.key(reg.addr(), Register16::WIDTH);
        self.store::<Register16>(key, value);
    }

    pub fn set24(&mut self, reg: Register24, value: i32) {
        self.store::<Register24>((UNBANKED, reg.addr(), Register24::WIDTH), value);
    }

    pub fn get16(&self, reg: Register16) -> u16 {
        self.load::<Register16>(self.key(reg.addr(), Register16::WIDTH))
    }

    pub fn get24(&self, reg: Register24) -> i32 {
        self.load::<Register24>((UNBANKED, reg.addr(), Register24::WIDTH))
    }

    /// CH_CONFIG0..3 as last written while `ch` was selected.
    pub fn channel_config(&self, ch: Channel) -> [u16; 4] {
        Register16::CHANNEL_CONFIG.map(|reg| self.load::<Register16>((ch.index(), reg.addr(), Register16::WIDTH)))
    }

    pub fn commands(&self) -> Vec<Command> {
        self.log
            .iter()
            .filter_map(|t| match t {
                Transaction::Command(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    fn key(&self, addr: u16, width: usize) -> RegKey {
        let banked = width == Register16::WIDTH
            && Register16::CHANNEL_CONFIG.iter().any(|r| r.addr() == addr);
        match (banked, self.selected) {
            (true, Some(ch)) => (ch.index(), addr, width),
            _ => (UNBANKED, addr, width),
        }
    }

    fn store<R: Register>(&mut self, key: RegKey, value: R::Value) {
        let mut bytes = [0u8; MAX_REG_BYTES];
        R::encode(value, &mut bytes[..R::WIDTH]);
        self.regs.insert(key, bytes).unwrap();
    }

    fn load<R: Register>(&self, key: RegKey) -> R::Value {
        let bytes = self.regs.get(&key).copied().unwrap_or([0u8; MAX_REG_BYTES]);
        R::decode(&bytes[..R::WIDTH])
    }
}

impl Bus for FakeBus {
    type Error = ();

    fn command(&mut self, cmd: Command) -> Result<(), Nafe13388Error<Self::Error>> {
        if let Command::Channel(ch) = cmd {
            self.selected = Some(ch);
        }
        self.log.push(Transaction::Command(cmd));

        Ok(())
    }

    fn read<R: Register>(&mut self, reg: R) -> Result<R::Value, Nafe13388Error<Self::Error>> {
        self.log.push(Transaction::Read { addr: reg.addr(), width: R::WIDTH });

        if self.failing_read == Some(reg.addr()) {
            return Err(Nafe13388Error::Bus(()));
        }

        if reg.addr() == Register16::SysStatus0.addr() && R::WIDTH == Register16::WIDTH {
            self.status_reads += 1;
            let ready = self.ready_after.is_some_and(|k| self.status_reads >= k);
            let mut bytes = [0u8; MAX_REG_BYTES];
            Register16::encode(if ready { 0x2000 } else { 0x0000 }, &mut bytes);
            return Ok(R::decode(&bytes[..R::WIDTH]));
        }

        Ok(self.load::<R>(self.key(reg.addr(), R::WIDTH)))
    }

    fn write<R: Register>(&mut self, reg: R, value: R::Value) -> Result<(), Nafe13388Error<Self::Error>> {
        let key = self.key(reg.addr(), R::WIDTH);
        self.store::<R>(key, value);

        let mut bytes = [0u8; 4];
        R::encode(value, &mut bytes[4 - R::WIDTH..]);
        self.log.push(Transaction::Write {
            addr: reg.addr(),
            bank: (key.0 != UNBANKED).then_some(key.0),
            raw: u32::from_be_bytes(bytes),
        });

        Ok(())
    }

    fn burst(&mut self, out: &mut [i32]) -> Result<(), Nafe13388Error<Self::Error>> {
        if out.len() > MAX_BURST_WORDS {
            return Err(Nafe13388Error::BufferLength { max: MAX_BURST_WORDS, actual: out.len() });
        }
        self.log.push(Transaction::Burst { len: out.len() });

        let mask = self.get16(Register16::ChConfig4);
        let enabled = Channel::all().filter(|ch| mask & ch.mask() != 0);
        for (value, ch) in out.iter_mut().zip(enabled) {
            *value = self.get24(Register24::ChData(ch));
        }

        Ok(())
    }
}

/// Records every SPI frame and answers with queued replies.
pub struct RecordingSpi {
    pub frames: Vec<Vec<u8>>,
    replies: Vec<Vec<u8>>,
}

impl RecordingSpi {
    pub fn new() -> Self {
        Self { frames: Vec::new(), replies: Vec::new() }
    }

    /// Queues the bytes clocked in during the next transfer.
    pub fn reply(&mut self, bytes: &[u8]) {
        self.replies.push(bytes.to_vec());
    }
}

impl ErrorType for RecordingSpi {
    type Error = Infallible;
}

impl SpiDevice for RecordingSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        for op in operations {
            match op {
                Operation::TransferInPlace(buf) => {
                    self.frames.push(buf.to_vec());
                    if !self.replies.is_empty() {
                        let reply = self.replies.remove(0);
                        let n = reply.len().min(buf.len());
                        buf[..n].copy_from_slice(&reply[..n]);
                    }
                }
                Operation::Write(buf) => self.frames.push(buf.to_vec()),
                _ => {}
            }
        }

        Ok(())
    }
}

/// Records requested waits in nanoseconds instead of sleeping.
#[derive(Default)]
pub struct FakeDelay {
    pub waits_ns: Vec<u64>,
}

impl FakeDelay {
    pub fn total_us(&self) -> u64 {
        self.waits_ns.iter().sum::<u64>() / 1_000
    }
}

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.waits_ns.push(ns as u64);
    }

    fn delay_us(&mut self, us: u32) {
        self.waits_ns.push(us as u64 * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.waits_ns.push(ms as u64 * 1_000_000);
    }
}

/// Output pin that remembers every level it was driven to.
#[derive(Default)]
pub struct FakePin {
    pub levels: Vec<bool>,
}

impl PinErrorType for FakePin {
    type Error = Infallible;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.push(true);
        Ok(())
    }
}
