//! Report loop: read the sensor and print the values as text lines.

use crate::console::{Console, ConsoleError, UsartRegisters};
use crate::driver::{Ina228Driver, Ina228Error};
use core::convert::Infallible;
use embedded_hal::i2c::I2c;

pub const LINE_END: &str = "\r\n";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MonitorError<E> {
    Sensor(Ina228Error<E>),
    Console(ConsoleError),
}

impl<E> From<Ina228Error<E>> for MonitorError<E> {
    fn from(e: Ina228Error<E>) -> Self {
        MonitorError::Sensor(e)
    }
}

impl<E> From<ConsoleError> for MonitorError<E> {
    fn from(e: ConsoleError) -> Self {
        MonitorError::Console(e)
    }
}

/// Print the banner and the manufacturer ID as one console block.
pub fn report_identity<I2C, U>(
    sensor: &mut Ina228Driver<I2C>,
    console: &mut Console<U>,
) -> Result<(), MonitorError<I2C::Error>>
where
    I2C: I2c,
    U: UsartRegisters,
{
    let id = sensor.manufacturer_id()?;

    console.start();
    console.write_text("INA228 Test:")?;
    console.write_text(LINE_END)?;
    console.write_text("Manufacturer ID (should 'TI'): ")?;
    console.write_bytes(id.as_bytes())?;
    console.write_text(LINE_END)?;
    console.stop()?;
    Ok(())
}

/// Print one current and one bus voltage line. The console must be started.
pub fn report_measurements<I2C, U>(
    sensor: &mut Ina228Driver<I2C>,
    console: &mut Console<U>,
) -> Result<(), MonitorError<I2C::Error>>
where
    I2C: I2c,
    U: UsartRegisters,
{
    let current = sensor.current()?;
    let vbus = sensor.voltage()?;

    console.write_text("Current = ")?;
    console.write_i32(current)?;
    console.write_text(LINE_END)?;
    console.write_text("Bus Voltage = ")?;
    console.write_u32(vbus)?;
    console.write_text(LINE_END)?;
    Ok(())
}

/// Start the console and report measurements until something fails.
pub fn poll_forever<I2C, U>(
    sensor: &mut Ina228Driver<I2C>,
    console: &mut Console<U>,
) -> Result<Infallible, MonitorError<I2C::Error>>
where
    I2C: I2c,
    U: UsartRegisters,
{
    console.start();
    loop {
        report_measurements(sensor, console)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::fake::FakeI2cCell;
    use crate::bus::{BusError, I2cBus};
    use crate::console::fake::FakeUsart;
    use crate::register::Register;
    use crate::wait::Wait;

    #[test]
    fn identity_block() {
        let bus = I2cBus::new(FakeI2cCell::new(b"TI"));
        let mut sensor = Ina228Driver::new(bus, None).unwrap();
        let mut console = Console::new(FakeUsart::default());

        report_identity(&mut sensor, &mut console).unwrap();
        assert_eq!(
            console.free().text(),
            "INA228 Test:\r\nManufacturer ID (should 'TI'): TI\r\n"
        );
    }

    #[test]
    fn measurement_lines() {
        let mut rx = Vec::new();
        rx.extend_from_slice(Register::Current.descriptor().encode(-500_000).as_slice());
        rx.extend_from_slice(Register::VBus.descriptor().encode(0x1F40).as_slice());
        let bus = I2cBus::new(FakeI2cCell::new(&rx));
        let mut sensor = Ina228Driver::new(bus, None).unwrap();
        let mut console = Console::new(FakeUsart::default());

        console.start();
        report_measurements(&mut sensor, &mut console).unwrap();
        assert_eq!(
            console.free().text(),
            "Current = -953675\r\nBus Voltage = 8000\r\n"
        );
    }

    #[test]
    fn poll_forever_returns_on_bus_timeout() {
        let bus = I2cBus::with_wait(FakeI2cCell::stuck(), Wait::Spins(3));
        let mut sensor = Ina228Driver::new(bus, None).unwrap();
        let mut console = Console::new(FakeUsart::default());

        let err = poll_forever(&mut sensor, &mut console).unwrap_err();
        assert_eq!(err, MonitorError::Sensor(Ina228Error::I2c(BusError::Timeout)));
    }
}
