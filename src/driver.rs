use crate::register::{decode_legacy_accumulator, Register, MAX_REGISTER_LEN};
use embedded_hal::i2c::I2c;
use log::{debug, warn};

/// Slave address with A1 = A0 = GND.
pub const DEFAULT_ADDRESS: u8 = 0x40;

/// Manufacturer ID the chip reports ("TI").
pub const TI_MANUFACTURER_ID: [u8; 2] = *b"TI";

const CONFIG_RST: u16 = 1 << 15;
const CONFIG_ADCRANGE_POS: u16 = 4;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AdcRange {
    /// ±163.84 mV full scale across the shunt.
    Range163mV = 0,
    /// ±40.96 mV full scale across the shunt.
    Range40mV = 1,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OperatingMode {
    Shutdown = 0x0,
    ContinuousBus = 0x9,
    ContinuousShunt = 0xA,
    ContinuousBusShunt = 0xB,
    ContinuousTemperature = 0xC,
    ContinuousAll = 0xF,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConversionTime {
    Us50 = 0,
    Us84 = 1,
    Us150 = 2,
    Us280 = 3,
    Us540 = 4,
    Us1052 = 5,
    Us2074 = 6,
    Us4120 = 7,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Averaging {
    Avg1 = 0,
    Avg4 = 1,
    Avg16 = 2,
    Avg64 = 3,
    Avg128 = 4,
    Avg256 = 5,
    Avg512 = 6,
    Avg1024 = 7,
}

/// Which registers [`Ina228Driver::energy`] and [`Ina228Driver::charge`] read.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum AccumulatorSource {
    /// Read the CURRENT register (0x07) and return `(byte2 << 8) | byte1`.
    /// This is what the original firmware does for both accumulators.
    #[default]
    CurrentRegister,
    /// Read the 40-bit ENERGY (0x09) and CHARGE (0x0A) registers.
    Dedicated,
}

pub struct Ina228InitConfig {
    /// Shunt full-scale range
    pub adc_range: AdcRange,
    pub mode: OperatingMode,
    /// Bus voltage conversion time
    pub bus_conversion: ConversionTime,
    /// Shunt voltage conversion time
    pub shunt_conversion: ConversionTime,
    /// Temperature conversion time
    pub temperature_conversion: ConversionTime,
    pub averaging: Averaging,
    /// SHUNT_CAL register value. Written once during initialization.
    pub shunt_cal: u16,
    pub accumulators: AccumulatorSource,
}

impl Ina228InitConfig {
    pub const fn config_register(&self) -> u16 {
        (self.adc_range as u16) << CONFIG_ADCRANGE_POS
    }

    pub const fn adc_config_register(&self) -> u16 {
        ((self.mode as u16) << 12)
            | ((self.bus_conversion as u16) << 9)
            | ((self.shunt_conversion as u16) << 6)
            | ((self.temperature_conversion as u16) << 3)
            | self.averaging as u16
    }
}

impl Default for Ina228InitConfig {
    /// ±40.96 mV range, continuous bus and shunt conversions at 2074 µs,
    /// 64x averaging, SHUNT_CAL = 1500 (1 A full scale).
    fn default() -> Self {
        Self {
            adc_range: AdcRange::Range40mV,
            mode: OperatingMode::ContinuousBusShunt,
            bus_conversion: ConversionTime::Us2074,
            shunt_conversion: ConversionTime::Us2074,
            temperature_conversion: ConversionTime::Us50,
            averaging: Averaging::Avg64,
            shunt_cal: 1500,
            accumulators: AccumulatorSource::CurrentRegister,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Ina228Error<I2C> {
    /// The device did not identify as a TI part.
    Connect,
    I2c(I2C),
}

/// Two raw bytes of the MANUFACTURER_ID register, as read.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ManufacturerId(pub [u8; 2]);

impl ManufacturerId {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The ID as text, if both bytes are valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.0).ok()
    }
}

pub struct Ina228Driver<I2C> {
    i2c: I2C,
    address: u8,
    accumulators: AccumulatorSource,
}

impl<I2C> Ina228Driver<I2C>
where
    I2C: I2c,
{
    ///
    ///
    /// # Arguments
    ///
    /// * `i2c`: The bus the INA228 sits on, already enabled.
    /// * `init_config`: If given, the device is reset and configured before this returns.
    ///   Otherwise it is left untouched and [`Ina228Driver::initialize`] can be called later.
    ///
    /// returns: Result<Ina228Driver<I2C>, Ina228Error<<I2C as ErrorType>::Error>>
    pub fn new(
        i2c: I2C,
        init_config: Option<Ina228InitConfig>,
    ) -> Result<Self, Ina228Error<I2C::Error>> {
        Self::new_with_address(i2c, DEFAULT_ADDRESS, init_config)
    }

    pub fn new_with_address(
        i2c: I2C,
        address: u8,
        init_config: Option<Ina228InitConfig>,
    ) -> Result<Self, Ina228Error<I2C::Error>> {
        let mut driver = Self {
            i2c,
            address,
            accumulators: AccumulatorSource::default(),
        };

        if let Some(config) = init_config {
            driver.initialize(&config)?;
        }

        Ok(driver)
    }

    /// Reset, select the ADC range, start conversions and write the shunt
    /// calibration, in that order. Call once.
    pub fn initialize(&mut self, config: &Ina228InitConfig) -> Result<(), Ina228Error<I2C::Error>> {
        debug!("INA228 @ {:#04x}: reset", self.address);
        self.write_register(Register::Config, CONFIG_RST)?;
        self.write_register(Register::Config, config.config_register())?;
        self.write_register(Register::AdcConfig, config.adc_config_register())?;
        self.write_register(Register::ShuntCal, config.shunt_cal)?;
        debug!(
            "INA228 configured: adc_config={:#06x} shunt_cal={}",
            config.adc_config_register(),
            config.shunt_cal
        );
        self.accumulators = config.accumulators;
        Ok(())
    }

    /// Check that a TI device answers at the configured address.
    pub fn verify(&mut self) -> Result<(), Ina228Error<I2C::Error>> {
        let id = self.manufacturer_id()?;
        if id.0 != TI_MANUFACTURER_ID {
            warn!("INA228: unexpected manufacturer id {:02x?}", id.0);
            return Err(Ina228Error::Connect);
        }
        Ok(())
    }

    pub fn manufacturer_id(&mut self) -> Result<ManufacturerId, Ina228Error<I2C::Error>> {
        let mut bytes = [0u8; 2];
        self.read_bytes(Register::ManufacturerId, &mut bytes)?;
        Ok(ManufacturerId(bytes))
    }

    /// 12-bit device ID field.
    pub fn device_id(&mut self) -> Result<u16, Ina228Error<I2C::Error>> {
        Ok(self.read_register(Register::DeviceId)? as u16)
    }

    /// Current in microamps.
    pub fn current(&mut self) -> Result<i32, Ina228Error<I2C::Error>> {
        let desc = Register::Current.descriptor();
        let mut bytes = [0u8; MAX_REGISTER_LEN];
        let bytes = &mut bytes[..desc.byte_len()];
        self.read_bytes(Register::Current, bytes)?;
        Ok(desc.decode_scaled(bytes) as i32)
    }

    /// Raw 20-bit bus voltage field.
    pub fn voltage(&mut self) -> Result<u32, Ina228Error<I2C::Error>> {
        Ok(self.read_register(Register::VBus)? as u32)
    }

    /// Raw signed 20-bit shunt voltage field.
    pub fn shunt_voltage(&mut self) -> Result<i32, Ina228Error<I2C::Error>> {
        Ok(self.read_register(Register::VShunt)? as i32)
    }

    /// Raw 12-bit die temperature field.
    pub fn temperature(&mut self) -> Result<u16, Ina228Error<I2C::Error>> {
        Ok(self.read_register(Register::DieTemp)? as u16)
    }

    /// Raw 20-bit power field.
    pub fn power(&mut self) -> Result<u32, Ina228Error<I2C::Error>> {
        Ok(self.read_register(Register::Power)? as u32)
    }

    /// Energy accumulator, raw. See [`AccumulatorSource`] for which register is read.
    pub fn energy(&mut self) -> Result<u64, Ina228Error<I2C::Error>> {
        match self.accumulators {
            AccumulatorSource::CurrentRegister => Ok(self.legacy_accumulator()? as u64),
            AccumulatorSource::Dedicated => Ok(self.read_register(Register::Energy)? as u64),
        }
    }

    /// Charge accumulator, raw. See [`AccumulatorSource`] for which register is read.
    pub fn charge(&mut self) -> Result<i64, Ina228Error<I2C::Error>> {
        match self.accumulators {
            AccumulatorSource::CurrentRegister => Ok(self.legacy_accumulator()? as i64),
            AccumulatorSource::Dedicated => self.read_register(Register::Charge),
        }
    }

    pub fn accumulator_source(&self) -> AccumulatorSource {
        self.accumulators
    }

    /// Read a register and decode its field in native units, without scaling.
    pub fn read_register(&mut self, register: Register) -> Result<i64, Ina228Error<I2C::Error>> {
        let desc = register.descriptor();
        let mut bytes = [0u8; MAX_REGISTER_LEN];
        let bytes = &mut bytes[..desc.byte_len()];
        self.read_bytes(register, bytes)?;
        Ok(desc.decode(bytes))
    }

    /// Write a 16-bit register: pointer byte followed by the value, MSB first.
    pub fn write_register(
        &mut self,
        register: Register,
        data: u16,
    ) -> Result<(), Ina228Error<I2C::Error>> {
        let [hi, lo] = data.to_be_bytes();
        self.i2c
            .write(self.address, &[register as u8, hi, lo])
            .map_err(Ina228Error::I2c)
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn legacy_accumulator(&mut self) -> Result<u16, Ina228Error<I2C::Error>> {
        let mut bytes = [0u8; 3];
        self.read_bytes(Register::Current, &mut bytes)?;
        Ok(decode_legacy_accumulator(&bytes))
    }

    /// Point the device at `register`, then read `buffer.len()` bytes in a
    /// second transaction.
    fn read_bytes(
        &mut self,
        register: Register,
        buffer: &mut [u8],
    ) -> Result<(), Ina228Error<I2C::Error>> {
        self.i2c
            .write(self.address, &[register as u8])
            .map_err(Ina228Error::I2c)?;
        self.i2c
            .read(self.address, buffer)
            .map_err(Ina228Error::I2c)
    }
}

#[cfg(feature = "std")]
impl<I2C> std::fmt::Display for Ina228Error<I2C>
where
    I2C: std::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ina228Error::I2c(i2c) => write!(f, "I2C Error: {i2c:?}"),
            Ina228Error::Connect => write!(f, "Unable to connect to INA228"),
        }
    }
}

#[cfg(feature = "std")]
impl<I2C> std::error::Error for Ina228Error<I2C>
where
    I2C: std::fmt::Debug,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
