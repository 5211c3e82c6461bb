//! Polled I2C master driver for the STM32 "I2C v2" peripheral.
//!
//! Every transfer is a complete START..STOP transaction:
//!
//! 1. program the slave address (SADD)
//! 2. program the direction (RD_WRN)
//! 3. program the byte count (NBYTES)
//! 4. set START
//! 5. per byte, wait for TXIS (write) or RXNE (read) and move the byte
//! 6. wait for TC
//! 7. set STOP
//!
//! [`I2cBus::transmit`] and [`I2cBus::receive`] are exactly that. The
//! `embedded-hal` [`I2c`] impl merges same-direction operations into one
//! transfer and chains direction changes with a repeated START.
//!
//! There is no error recovery. Under [`Wait::Forever`] a slave that stops
//! responding hangs the caller.

use crate::wait::{TimedOut, Wait};
use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, Operation, SevenBitAddress};
use log::{trace, warn};

/// Registers of the I2C peripheral touched by this driver.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum I2cReg {
    Cr1,
    Cr2,
    Timingr,
    Isr,
    Rxdr,
    Txdr,
}

/// Raw access to an I2C peripheral register block.
///
/// Board support implements this over its PAC; the driver only ever does
/// whole-register reads and writes.
pub trait I2cRegisters {
    fn read(&self, reg: I2cReg) -> u32;
    fn write(&mut self, reg: I2cReg, value: u32);

    fn modify<F>(&mut self, reg: I2cReg, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read(reg);
        self.write(reg, f(value));
    }
}

pub mod bits {
    pub const CR1_PE: u32 = 1 << 0;
    pub const CR1_ANFOFF: u32 = 1 << 12;

    pub const CR2_SADD_MASK: u32 = 0x3FF;
    pub const CR2_RD_WRN: u32 = 1 << 10;
    pub const CR2_START: u32 = 1 << 13;
    pub const CR2_STOP: u32 = 1 << 14;
    pub const CR2_NBYTES_POS: u32 = 16;
    pub const CR2_NBYTES_MASK: u32 = 0xFF << CR2_NBYTES_POS;

    pub const ISR_TXIS: u32 = 1 << 1;
    pub const ISR_RXNE: u32 = 1 << 2;
    pub const ISR_TC: u32 = 1 << 6;
}

use bits::*;

/// Largest transfer NBYTES can describe.
pub const MAX_TRANSFER: usize = 255;

/// TIMINGR fields.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BusTiming {
    pub presc: u8,
    pub scll: u8,
    pub sclh: u8,
    pub sdadel: u8,
    pub scldel: u8,
}

impl BusTiming {
    /// 100 kHz standard mode.
    pub const STANDARD_MODE: BusTiming = BusTiming {
        presc: 0x1,
        scll: 0xC7,
        sclh: 0xC3,
        sdadel: 0x2,
        scldel: 0x4,
    };

    pub const fn timingr(self) -> u32 {
        ((self.presc as u32 & 0xF) << 28)
            | ((self.scldel as u32 & 0xF) << 20)
            | ((self.sdadel as u32 & 0xF) << 16)
            | ((self.sclh as u32) << 8)
            | self.scll as u32
    }
}

impl Default for BusTiming {
    fn default() -> Self {
        Self::STANDARD_MODE
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BusError {
    /// A status flag was not raised within the configured spin budget.
    Timeout,
    /// More than [`MAX_TRANSFER`] bytes in one transfer.
    Length,
}

impl From<TimedOut> for BusError {
    fn from(_: TimedOut) -> Self {
        BusError::Timeout
    }
}

impl i2c::Error for BusError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Direction {
    Write,
    Read,
}

pub struct I2cBus<R> {
    regs: R,
    wait: Wait,
}

impl<R: I2cRegisters> I2cBus<R> {
    /// Driver that blocks indefinitely on every handshake.
    pub fn new(regs: R) -> Self {
        Self::with_wait(regs, Wait::Forever)
    }

    pub fn with_wait(regs: R, wait: Wait) -> Self {
        Self { regs, wait }
    }

    /// Program bus timing and enable the peripheral. The peripheral clock and
    /// pins must already be configured.
    pub fn init(&mut self, timing: BusTiming) {
        self.regs.modify(I2cReg::Cr1, |v| v & !CR1_PE);
        self.regs.modify(I2cReg::Cr1, |v| v & !CR1_ANFOFF);
        self.regs.write(I2cReg::Timingr, timing.timingr());
        self.regs.modify(I2cReg::Cr1, |v| v | CR1_PE);
    }

    /// Write `bytes` to the slave in one transaction.
    pub fn transmit(&mut self, address: SevenBitAddress, bytes: &[u8]) -> Result<(), BusError> {
        trace!("i2c write {:#04x} {:02x?}", address, bytes);
        self.setup(address, Direction::Write, bytes.len())?;
        self.send(bytes)?;
        self.finish()
    }

    /// Fill `buffer` from the slave in one transaction.
    pub fn receive(&mut self, address: SevenBitAddress, buffer: &mut [u8]) -> Result<(), BusError> {
        self.setup(address, Direction::Read, buffer.len())?;
        self.fill(buffer)?;
        self.finish()?;
        trace!("i2c read {:#04x} {:02x?}", address, buffer);
        Ok(())
    }

    pub fn free(self) -> R {
        self.regs
    }

    fn setup(
        &mut self,
        address: SevenBitAddress,
        direction: Direction,
        len: usize,
    ) -> Result<(), BusError> {
        if len > MAX_TRANSFER {
            return Err(BusError::Length);
        }

        self.regs.modify(I2cReg::Cr2, |v| {
            (v & !CR2_SADD_MASK) | (((address as u32) << 1) & CR2_SADD_MASK)
        });
        self.regs.modify(I2cReg::Cr2, |v| match direction {
            Direction::Write => v & !CR2_RD_WRN,
            Direction::Read => v | CR2_RD_WRN,
        });
        self.regs.modify(I2cReg::Cr2, |v| {
            (v & !CR2_NBYTES_MASK) | (((len as u32) << CR2_NBYTES_POS) & CR2_NBYTES_MASK)
        });
        self.regs.modify(I2cReg::Cr2, |v| v | CR2_START);
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        for &byte in bytes {
            self.wait_flag(ISR_TXIS)?;
            self.regs.write(I2cReg::Txdr, byte as u32);
        }
        Ok(())
    }

    fn fill(&mut self, buffer: &mut [u8]) -> Result<(), BusError> {
        for byte in buffer.iter_mut() {
            self.wait_flag(ISR_RXNE)?;
            *byte = self.regs.read(I2cReg::Rxdr) as u8;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), BusError> {
        self.wait_flag(ISR_TC)?;
        self.stop();
        Ok(())
    }

    fn stop(&mut self) {
        self.regs.modify(I2cReg::Cr2, |v| v | CR2_STOP);
    }

    fn wait_flag(&self, flag: u32) -> Result<(), BusError> {
        let regs = &self.regs;
        self.wait
            .until(|| regs.read(I2cReg::Isr) & flag != 0)
            .map_err(|e| {
                warn!("i2c flag {:#x} never set", flag);
                e.into()
            })
    }
}

impl<R> ErrorType for I2cBus<R> {
    type Error = BusError;
}

fn direction_of(op: &Operation<'_>) -> Direction {
    match op {
        Operation::Write(_) => Direction::Write,
        Operation::Read(_) => Direction::Read,
    }
}

fn op_len(op: &Operation<'_>) -> usize {
    match op {
        Operation::Write(bytes) => bytes.len(),
        Operation::Read(buffer) => buffer.len(),
    }
}

/// End index (exclusive) of the run of same-direction operations starting at `start`.
fn run_end(operations: &[Operation<'_>], start: usize) -> usize {
    let direction = direction_of(&operations[start]);
    operations[start..]
        .iter()
        .position(|op| direction_of(op) != direction)
        .map_or(operations.len(), |offset| start + offset)
}

/// Adjacent operations of the same direction share one NBYTES transfer. A
/// change of direction issues a repeated START once TC is set, and STOP
/// follows only the last operation.
impl<R: I2cRegisters> I2c<SevenBitAddress> for I2cBus<R> {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if operations.is_empty() {
            return Ok(());
        }

        // reject oversized runs before anything reaches the bus
        let mut start = 0;
        while start < operations.len() {
            let end = run_end(operations, start);
            let len: usize = operations[start..end].iter().map(op_len).sum();
            if len > MAX_TRANSFER {
                return Err(BusError::Length);
            }
            start = end;
        }

        let mut start = 0;
        while start < operations.len() {
            let end = run_end(operations, start);
            let direction = direction_of(&operations[start]);
            let len: usize = operations[start..end].iter().map(op_len).sum();
            trace!("i2c {:?} {:#04x} run of {} bytes", direction, address, len);
            self.setup(address, direction, len)?;
            for op in operations[start..end].iter_mut() {
                match op {
                    Operation::Write(bytes) => self.send(bytes)?,
                    Operation::Read(buffer) => self.fill(buffer)?,
                }
            }
            self.wait_flag(ISR_TC)?;
            start = end;
        }

        self.stop();
        Ok(())
    }
}
