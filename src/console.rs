//! Blocking text console on the STM32 "USART v2" peripheral.
//!
//! Frames are 8N1 at a fixed baud rate. Nothing is buffered beyond the
//! transmit shift register: every byte waits for TXE before it is written to
//! TDR. A message block is bracketed by [`Console::start`] and
//! [`Console::stop`].

use crate::decimal::{format_u16, format_u32, format_u8};
use crate::wait::{TimedOut, Wait};
use log::{debug, warn};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UsartReg {
    Cr1,
    Cr2,
    Brr,
    Isr,
    Tdr,
}

/// Raw access to a USART register block.
pub trait UsartRegisters {
    fn read(&self, reg: UsartReg) -> u32;
    fn write(&mut self, reg: UsartReg, value: u32);

    fn modify<F>(&mut self, reg: UsartReg, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read(reg);
        self.write(reg, f(value));
    }
}

pub mod bits {
    pub const CR1_UE: u32 = 1 << 0;
    pub const CR1_RE: u32 = 1 << 2;
    pub const CR1_TE: u32 = 1 << 3;
    pub const CR1_M: u32 = 1 << 12;
    pub const CR1_OVER8: u32 = 1 << 15;

    pub const CR2_STOP: u32 = 0b11 << 12;

    pub const ISR_TC: u32 = 1 << 6;
    pub const ISR_TXE: u32 = 1 << 7;
}

use bits::*;

pub struct ConsoleConfig {
    /// USART kernel clock in Hz
    pub clock_hz: u32,
    pub baud_rate: u32,
}

impl ConsoleConfig {
    /// BRR value for oversampling by 16.
    ///
    /// # Panics
    ///
    /// Panics if `baud_rate` is zero.
    pub const fn divider(&self) -> u32 {
        self.clock_hz / self.baud_rate
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            clock_hz: 8_000_000,
            baud_rate: 115_200,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConsoleError {
    /// TXE or TC was not raised within the configured spin budget.
    Timeout,
}

impl From<TimedOut> for ConsoleError {
    fn from(_: TimedOut) -> Self {
        ConsoleError::Timeout
    }
}

pub struct Console<U> {
    usart: U,
    wait: Wait,
}

impl<U: UsartRegisters> Console<U> {
    pub fn new(usart: U) -> Self {
        Self::with_wait(usart, Wait::Forever)
    }

    pub fn with_wait(usart: U, wait: Wait) -> Self {
        Self { usart, wait }
    }

    /// Frame format and baud rate. The peripheral stays disabled.
    ///
    /// # Panics
    ///
    /// Panics if `config.baud_rate` is zero.
    pub fn init(&mut self, config: &ConsoleConfig) {
        self.usart.modify(UsartReg::Cr1, |v| v & !CR1_M);
        self.usart.modify(UsartReg::Cr1, |v| v & !CR1_OVER8);
        self.usart.write(UsartReg::Brr, config.divider());
        self.usart.modify(UsartReg::Cr2, |v| v & !CR2_STOP);
    }

    /// Enable the USART with transmitter and receiver. Must precede any write.
    pub fn start(&mut self) {
        debug!("console start");
        self.usart.modify(UsartReg::Cr1, |v| v | CR1_UE);
        self.usart.modify(UsartReg::Cr1, |v| v | CR1_TE | CR1_RE);
    }

    /// Wait until the last byte has left the shift register, then disable.
    pub fn stop(&mut self) -> Result<(), ConsoleError> {
        self.wait_flag(ISR_TXE)?;
        self.wait_flag(ISR_TC)?;
        self.usart.modify(UsartReg::Cr1, |v| v & !CR1_UE);
        debug!("console stop");
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ConsoleError> {
        for &byte in bytes {
            self.wait_flag(ISR_TXE)?;
            self.usart.write(UsartReg::Tdr, byte as u32);
        }
        Ok(())
    }

    pub fn write_text(&mut self, text: &str) -> Result<(), ConsoleError> {
        self.write_bytes(text.as_bytes())
    }

    pub fn write_u8(&mut self, num: u8) -> Result<(), ConsoleError> {
        let mut buf = [0; 3];
        self.write_bytes(format_u8(num, &mut buf))
    }

    pub fn write_u16(&mut self, num: u16) -> Result<(), ConsoleError> {
        let mut buf = [0; 5];
        self.write_bytes(format_u16(num, &mut buf))
    }

    pub fn write_u32(&mut self, num: u32) -> Result<(), ConsoleError> {
        let mut buf = [0; 10];
        self.write_bytes(format_u32(num, &mut buf))
    }

    pub fn write_i32(&mut self, num: i32) -> Result<(), ConsoleError> {
        if num < 0 {
            self.write_bytes(b"-")?;
        }
        self.write_u32(num.unsigned_abs())
    }

    pub fn free(self) -> U {
        self.usart
    }

    fn wait_flag(&self, flag: u32) -> Result<(), ConsoleError> {
        let usart = &self.usart;
        self.wait
            .until(|| usart.read(UsartReg::Isr) & flag != 0)
            .map_err(|e| {
                warn!("usart flag {:#x} never set", flag);
                e.into()
            })
    }
}

impl<U: UsartRegisters> core::fmt::Write for Console<U> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.write_text(s).map_err(|_| core::fmt::Error)
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeUsart;
    use super::*;
    use core::fmt::Write;

    fn console() -> Console<FakeUsart> {
        let mut console = Console::new(FakeUsart::default());
        console.init(&ConsoleConfig::default());
        console
    }

    #[test]
    fn init_sets_8n1_and_divider() {
        let mut usart = FakeUsart {
            cr1: CR1_M | CR1_OVER8,
            cr2: CR2_STOP,
            ..Default::default()
        };
        usart.cr1 |= 1 << 10;
        let mut console = Console::new(usart);
        console.init(&ConsoleConfig::default());
        let usart = console.free();
        assert_eq!(usart.brr, 69);
        assert_eq!(usart.cr1, 1 << 10);
        assert_eq!(usart.cr2, 0);
    }

    #[test]
    fn start_enables_transmitter_and_receiver() {
        let mut console = console();
        console.start();
        console.write_text("ok").unwrap();
        let usart = console.free();
        let enabled = CR1_UE | CR1_TE | CR1_RE;
        assert!(usart.cr1_at_send.iter().all(|cr1| cr1 & enabled == enabled));
    }

    #[test]
    fn stop_disables_peripheral() {
        let mut console = console();
        console.start();
        console.stop().unwrap();
        assert_eq!(console.free().cr1 & CR1_UE, 0);
    }

    #[test]
    fn numbers_render_without_leading_zeros() {
        let mut console = console();
        console.start();
        console.write_u8(0).unwrap();
        console.write_text(" ").unwrap();
        console.write_u8(9).unwrap();
        console.write_text(" ").unwrap();
        console.write_u16(100).unwrap();
        console.write_text(" ").unwrap();
        console.write_u16(65535).unwrap();
        console.write_text(" ").unwrap();
        console.write_i32(-953_675).unwrap();
        console.write_text(" ").unwrap();
        console.write_i32(i32::MIN).unwrap();
        console.stop().unwrap();
        assert_eq!(
            console.free().text(),
            "0 9 100 65535 -953675 -2147483648"
        );
    }

    #[test]
    fn fmt_write_goes_through_console() {
        let mut console = console();
        console.start();
        write!(console, "Vbus={}\r\n", 42).unwrap();
        assert_eq!(console.free().text(), "Vbus=42\r\n");
    }

    #[test]
    fn bounded_wait_reports_timeout() {
        let usart = FakeUsart {
            stuck: true,
            ..Default::default()
        };
        let mut console = Console::with_wait(usart, Wait::Spins(5));
        console.start();
        assert_eq!(console.write_text("x"), Err(ConsoleError::Timeout));
        assert_eq!(console.stop(), Err(ConsoleError::Timeout));
        assert!(console.free().sent.is_empty());
    }

    #[test]
    fn stop_waits_for_transmission_complete() {
        let usart = FakeUsart {
            shifting: true,
            ..Default::default()
        };
        let mut console = Console::with_wait(usart, Wait::Spins(5));
        console.start();
        console.write_text("x").unwrap();
        assert_eq!(console.stop(), Err(ConsoleError::Timeout));

        let usart = console.free();
        assert_eq!(usart.text(), "x");
        assert_ne!(usart.cr1 & CR1_UE, 0);
    }

    #[test]
    #[should_panic]
    fn zero_baud_rate_panics() {
        let config = ConsoleConfig {
            clock_hz: 8_000_000,
            baud_rate: 0,
        };
        console().init(&config);
    }
}
