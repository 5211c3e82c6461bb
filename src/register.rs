//! INA228 register map and the codec that turns raw register bytes into values.
//!
//! All registers are transferred MSB first. The measurement registers carry a
//! left-aligned field whose low bits are padding, so the byte layout differs
//! per register; [`Register::descriptor`] is the single place that knows it.

/// Register pointer values of the INA228.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Register {
    Config = 0x00,
    AdcConfig = 0x01,
    ShuntCal = 0x02,
    ShuntTempco = 0x03,
    VShunt = 0x04,
    VBus = 0x05,
    DieTemp = 0x06,
    Current = 0x07,
    Power = 0x08,
    Energy = 0x09,
    Charge = 0x0A,
    DiagAlrt = 0x0B,
    Sovl = 0x0C,
    Suvl = 0x0D,
    Bovl = 0x0E,
    Buvl = 0x0F,
    TempLimit = 0x10,
    PwrLimit = 0x11,
    ManufacturerId = 0x3E,
    DeviceId = 0x3F,
}

/// How the significant field of a register is packed into its bytes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Layout {
    /// Two bytes, plain big-endian.
    Word16,
    /// Two bytes: upper nibble of byte 0 is bits 3:0, byte 1 is bits 11:4.
    Packed12,
    /// Three bytes: byte 0 is bits 19:12, byte 1 is bits 11:4, upper nibble of
    /// byte 2 is bits 3:0. The lower nibble of byte 2 is discarded.
    Packed20,
    /// Five bytes, plain big-endian.
    Wide40,
}

/// Longest register in bytes.
pub const MAX_REGISTER_LEN: usize = 5;

impl Layout {
    /// Number of bytes moved on the bus for this layout.
    pub const fn byte_len(self) -> usize {
        match self {
            Layout::Word16 | Layout::Packed12 => 2,
            Layout::Packed20 => 3,
            Layout::Wide40 => 5,
        }
    }

    /// Width of the significant field in bits.
    pub const fn bits(self) -> u32 {
        match self {
            Layout::Word16 => 16,
            Layout::Packed12 => 12,
            Layout::Packed20 => 20,
            Layout::Wide40 => 40,
        }
    }

    /// Extract the unsigned field.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than [`Layout::byte_len`].
    pub fn decode(self, bytes: &[u8]) -> u64 {
        match self {
            Layout::Word16 => u16::from_be_bytes([bytes[0], bytes[1]]) as u64,
            Layout::Packed12 => ((bytes[0] >> 4) as u64) | ((bytes[1] as u64) << 4),
            Layout::Packed20 => {
                ((bytes[0] as u64) << 12) | ((bytes[1] as u64) << 4) | ((bytes[2] >> 4) as u64)
            }
            Layout::Wide40 => bytes[..5]
                .iter()
                .fold(0u64, |acc, &b| (acc << 8) | b as u64),
        }
    }

    /// Pack the low [`Layout::bits`] of `field` into register bytes.
    pub fn encode(self, field: u64) -> RegisterBytes {
        let mut out = RegisterBytes {
            buf: [0; MAX_REGISTER_LEN],
            len: self.byte_len(),
        };
        match self {
            Layout::Word16 => {
                out.buf[..2].copy_from_slice(&(field as u16).to_be_bytes());
            }
            Layout::Packed12 => {
                out.buf[0] = ((field & 0xF) << 4) as u8;
                out.buf[1] = (field >> 4) as u8;
            }
            Layout::Packed20 => {
                out.buf[0] = (field >> 12) as u8;
                out.buf[1] = (field >> 4) as u8;
                out.buf[2] = ((field & 0xF) << 4) as u8;
            }
            Layout::Wide40 => {
                out.buf.copy_from_slice(&field.to_be_bytes()[3..]);
            }
        }
        out
    }
}

/// Bytes of one register, as sent or received on the bus.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RegisterBytes {
    buf: [u8; MAX_REGISTER_LEN],
    len: usize,
}

impl RegisterBytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

/// Fixed-point conversion from a register's native units to caller units:
/// `value * multiplier >> shift`, with an arithmetic (flooring) shift.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Scale {
    pub multiplier: i64,
    pub shift: u32,
}

impl Scale {
    pub const IDENTITY: Scale = Scale {
        multiplier: 1,
        shift: 0,
    };

    /// Current LSB at the calibration chosen at init: 1 A full scale over
    /// 2^19 codes, reported in microamps.
    pub const MICROAMPS: Scale = Scale {
        multiplier: 1_000_000,
        shift: 19,
    };

    pub const fn apply(self, value: i64) -> i64 {
        (value * self.multiplier) >> self.shift
    }
}

/// Static description of one register.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RegisterDescriptor {
    pub address: u8,
    pub layout: Layout,
    pub signed: bool,
    pub scale: Scale,
}

impl RegisterDescriptor {
    const fn new(register: Register, layout: Layout, signed: bool, scale: Scale) -> Self {
        Self {
            address: register as u8,
            layout,
            signed,
            scale,
        }
    }

    pub const fn byte_len(&self) -> usize {
        self.layout.byte_len()
    }

    /// Decode into the register's native units, sign-extending signed fields.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than the register.
    pub fn decode(&self, bytes: &[u8]) -> i64 {
        let raw = self.layout.decode(bytes);
        if self.signed {
            sign_extend(raw, self.layout.bits())
        } else {
            raw as i64
        }
    }

    /// Decode and apply the register's scale.
    pub fn decode_scaled(&self, bytes: &[u8]) -> i64 {
        self.scale.apply(self.decode(bytes))
    }

    /// Encode a native-unit value. Negative values are stored two's complement.
    pub fn encode(&self, value: i64) -> RegisterBytes {
        let mask = (1u64 << self.layout.bits()) - 1;
        self.layout.encode(value as u64 & mask)
    }
}

/// Two's-complement sign extension of a `bits` wide field.
///
/// For 20-bit fields this is the same as OR-ing `0xFFF0_0000` into the value
/// when bit 19 is set.
pub const fn sign_extend(raw: u64, bits: u32) -> i64 {
    let unused = 64 - bits;
    ((raw << unused) as i64) >> unused
}

/// Energy/charge value as the original firmware produced it from a 3-byte
/// read: `(byte2 << 8) | byte1`.
pub const fn decode_legacy_accumulator(bytes: &[u8; 3]) -> u16 {
    ((bytes[2] as u16) << 8) | bytes[1] as u16
}

impl Register {
    pub const fn descriptor(self) -> RegisterDescriptor {
        use Layout::*;

        match self {
            Register::VShunt => RegisterDescriptor::new(self, Packed20, true, Scale::IDENTITY),
            Register::VBus => RegisterDescriptor::new(self, Packed20, false, Scale::IDENTITY),
            Register::DieTemp => RegisterDescriptor::new(self, Packed12, false, Scale::IDENTITY),
            Register::Current => RegisterDescriptor::new(self, Packed20, true, Scale::MICROAMPS),
            Register::Power => RegisterDescriptor::new(self, Packed20, false, Scale::IDENTITY),
            Register::Energy => RegisterDescriptor::new(self, Wide40, false, Scale::IDENTITY),
            Register::Charge => RegisterDescriptor::new(self, Wide40, true, Scale::IDENTITY),
            Register::DeviceId => RegisterDescriptor::new(self, Packed12, false, Scale::IDENTITY),
            Register::Config
            | Register::AdcConfig
            | Register::ShuntCal
            | Register::ShuntTempco
            | Register::DiagAlrt
            | Register::Sovl
            | Register::Suvl
            | Register::Bovl
            | Register::Buvl
            | Register::TempLimit
            | Register::PwrLimit
            | Register::ManufacturerId => {
                RegisterDescriptor::new(self, Word16, false, Scale::IDENTITY)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Register; 20] = [
        Register::Config,
        Register::AdcConfig,
        Register::ShuntCal,
        Register::ShuntTempco,
        Register::VShunt,
        Register::VBus,
        Register::DieTemp,
        Register::Current,
        Register::Power,
        Register::Energy,
        Register::Charge,
        Register::DiagAlrt,
        Register::Sovl,
        Register::Suvl,
        Register::Bovl,
        Register::Buvl,
        Register::TempLimit,
        Register::PwrLimit,
        Register::ManufacturerId,
        Register::DeviceId,
    ];

    #[test]
    fn addresses_fit_six_bits() {
        for reg in ALL {
            let desc = reg.descriptor();
            assert_eq!(desc.address, reg as u8);
            assert!(desc.address < 0x40);
        }
    }

    #[test]
    fn extremes_survive_encode_decode() {
        for reg in ALL {
            let desc = reg.descriptor();
            let bits = desc.layout.bits();
            let (min, max) = if desc.signed {
                (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
            } else {
                (0, (1i64 << bits) - 1)
            };
            for value in [min, max, 0, 1, max / 3] {
                let bytes = desc.encode(value);
                assert_eq!(bytes.as_slice().len(), desc.byte_len());
                assert_eq!(desc.decode(bytes.as_slice()), value, "{reg:?} {value}");
            }
        }
    }

    #[test]
    fn packed20_discards_low_nibble() {
        let desc = Register::VBus.descriptor();
        assert_eq!(desc.decode(&[0x12, 0x34, 0x5F]), 0x12345);
        assert_eq!(desc.decode(&[0x12, 0x34, 0x50]), 0x12345);
    }

    #[test]
    fn sign_extension_of_20_bit_field() {
        assert_eq!(sign_extend(0xFFFFF, 20), -1);
        assert_eq!(sign_extend(0x00001, 20), 1);
        assert_eq!(sign_extend(0x80000, 20), -524_288);
        assert_eq!(sign_extend(0x7FFFF, 20), 524_287);

        let current = Register::Current.descriptor();
        assert_eq!(current.decode(&[0xFF, 0xFF, 0xF0]), -1);
        assert_eq!(current.decode(&[0x00, 0x00, 0x10]), 1);
    }

    #[test]
    fn current_scale_in_microamps() {
        let scale = Scale::MICROAMPS;
        assert_eq!(scale.apply(0), 0);
        // 500000 * 10^6 / 2^19 = 953674.316...
        assert_eq!(scale.apply(500_000), 953_674);
        assert_eq!(scale.apply(-500_000), -953_675);
        assert_eq!(scale.apply(1_000_000), 1_907_348);
    }

    #[test]
    fn current_register_decodes_scaled() {
        let current = Register::Current.descriptor();
        let bytes = current.encode(-500_000);
        assert_eq!(current.decode_scaled(bytes.as_slice()), -953_675);
    }

    #[test]
    fn device_id_nibble_layout() {
        let desc = Register::DeviceId.descriptor();
        assert_eq!(desc.decode(&[0xA0, 0x02]), 0x02A);
        assert_eq!(desc.decode(&[0xAF, 0x02]), 0x02A);
    }

    #[test]
    fn word16_is_big_endian() {
        let desc = Register::ShuntCal.descriptor();
        assert_eq!(desc.encode(1500).as_slice(), &[0x05, 0xDC]);
        assert_eq!(desc.decode(&[0x54, 0x49]), 0x5449);
    }

    #[test]
    fn wide40_signed_charge() {
        let desc = Register::Charge.descriptor();
        assert_eq!(desc.decode(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFE]), -2);
        assert_eq!(desc.decode(&[0x00, 0x00, 0x01, 0x00, 0x00]), 0x10000);
    }

    #[test]
    fn legacy_accumulator_uses_tail_bytes() {
        assert_eq!(decode_legacy_accumulator(&[0xAA, 0x34, 0x12]), 0x1234);
    }
}
