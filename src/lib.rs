//!
//! A platform-agnostic driver for the INA228 power monitor, together with the polled I2C master
//! and USART console drivers a bare-metal STM32 board needs to read it and print the results.
//!
//! Everything is blocking. The bus and console drivers spin on peripheral status flags and,
//! by default, never time out: a peripheral that stops responding hangs the caller. Use
//! [`Wait::Spins`] to bound the waits instead.
//!
//! The sensor driver is written against `embedded-hal`'s I2C trait, so it runs on [`I2cBus`]
//! as well as on any other HAL.
//!

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod bus;
pub mod console;
pub mod decimal;
pub mod driver;
pub mod monitor;
pub mod register;
pub mod wait;

pub use bus::{BusError, BusTiming, I2cBus, I2cReg, I2cRegisters};
pub use console::{Console, ConsoleConfig, ConsoleError, UsartReg, UsartRegisters};
pub use driver::*;
pub use register::Register;
pub use wait::Wait;
