use crate::bus::{read_exact, RegisterBus};
use crate::error::DeviceError;
use crate::SensorVariant;

/// Trade-off between noise, conversion time and power draw.
///
/// Every variant translates the mode into its own oversampling register code, see
/// [`SensorVariant::oversampling`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccuracyMode {
    /// x1 sample
    UltraLow,
    /// x2 samples
    Low,
    /// x4 samples
    Standard,
    /// x8 samples
    High,
    /// x16 samples
    UltraHigh,
}

/// True for the values an erased or unconnected EEPROM reads back as.
fn is_erased(word: u16) -> bool {
    word == 0x0000 || word == 0xFFFF
}

fn first_erased(fields: &[(&'static str, u16)]) -> Option<&'static str> {
    fields
        .iter()
        .find(|(_, word)| is_erased(*word))
        .map(|(name, _)| *name)
}

/// Factory calibration of the BMP180, 11 big-endian words at 0xAA..=0xBF.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Bmp180Calibration {
    pub ac1: i16,
    pub ac2: i16,
    pub ac3: i16,
    pub ac4: u16,
    pub ac5: u16,
    pub ac6: u16,
    pub b1: i16,
    pub b2: i16,
    pub mb: i16,
    pub mc: i16,
    pub md: i16,
}

impl Bmp180Calibration {
    pub const START: u8 = 0xAA;
    pub const LEN: usize = 22;

    pub fn from_bytes(buf: &[u8; Self::LEN]) -> Self {
        let word = |i: usize| u16::from_be_bytes([buf[2 * i], buf[2 * i + 1]]);
        Self {
            ac1: word(0) as i16,
            ac2: word(1) as i16,
            ac3: word(2) as i16,
            ac4: word(3),
            ac5: word(4),
            ac6: word(5),
            b1: word(6) as i16,
            b2: word(7) as i16,
            mb: word(8) as i16,
            mc: word(9) as i16,
            md: word(10) as i16,
        }
    }

    /// The datasheet allows none of the words to read 0x0000 or 0xFFFF.
    pub fn erased_field(&self) -> Option<&'static str> {
        first_erased(&[
            ("AC1", self.ac1 as u16),
            ("AC2", self.ac2 as u16),
            ("AC3", self.ac3 as u16),
            ("AC4", self.ac4),
            ("AC5", self.ac5),
            ("AC6", self.ac6),
            ("B1", self.b1 as u16),
            ("B2", self.b2 as u16),
            ("MB", self.mb as u16),
            ("MC", self.mc as u16),
            ("MD", self.md as u16),
        ])
    }
}

/// Factory calibration of the BMP280, 12 little-endian words at 0x88..=0x9F.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Bmp280Calibration {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,
    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,
}

impl Bmp280Calibration {
    pub const START: u8 = 0x88;
    pub const LEN: usize = 24;

    pub fn from_bytes(buf: &[u8; Self::LEN]) -> Self {
        let word = |i: usize| u16::from_le_bytes([buf[2 * i], buf[2 * i + 1]]);
        Self {
            dig_t1: word(0),
            dig_t2: word(1) as i16,
            dig_t3: word(2) as i16,
            dig_p1: word(3),
            dig_p2: word(4) as i16,
            dig_p3: word(5) as i16,
            dig_p4: word(6) as i16,
            dig_p5: word(7) as i16,
            dig_p6: word(8) as i16,
            dig_p7: word(9) as i16,
            dig_p8: word(10) as i16,
            dig_p9: word(11) as i16,
        }
    }

    pub fn erased_field(&self) -> Option<&'static str> {
        first_erased(&[
            ("T1", self.dig_t1),
            ("T2", self.dig_t2 as u16),
            ("T3", self.dig_t3 as u16),
            ("P1", self.dig_p1),
            ("P2", self.dig_p2 as u16),
            ("P3", self.dig_p3 as u16),
            ("P4", self.dig_p4 as u16),
            ("P5", self.dig_p5 as u16),
            ("P6", self.dig_p6 as u16),
            ("P7", self.dig_p7 as u16),
            ("P8", self.dig_p8 as u16),
            ("P9", self.dig_p9 as u16),
        ])
    }
}

/// Factory calibration of the BME680, packed into 21 bytes at 0x31..=0x45.
///
/// Words are little-endian; the 8-bit fields sit between them without padding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Bme680Calibration {
    pub par_t1: u16,
    pub par_t2: u16,
    pub par_t3: i8,
    pub par_p1: i16,
    pub par_p2: i16,
    pub par_p3: i8,
    pub par_p4: i8,
    pub par_p5: u16,
    pub par_p6: u16,
    pub par_p7: i8,
    pub par_p8: i8,
    pub par_p9: i16,
    pub par_p10: i8,
    pub par_p11: i8,
}

impl Bme680Calibration {
    pub const START: u8 = 0x31;
    pub const LEN: usize = 21;

    pub fn from_bytes(b: &[u8; Self::LEN]) -> Self {
        Self {
            par_t1: u16::from_le_bytes([b[0], b[1]]),
            par_t2: u16::from_le_bytes([b[2], b[3]]),
            par_t3: b[4] as i8,
            par_p1: i16::from_le_bytes([b[5], b[6]]),
            par_p2: i16::from_le_bytes([b[7], b[8]]),
            par_p3: b[9] as i8,
            par_p4: b[10] as i8,
            par_p5: u16::from_le_bytes([b[11], b[12]]),
            par_p6: u16::from_le_bytes([b[13], b[14]]),
            par_p7: b[15] as i8,
            par_p8: b[16] as i8,
            par_p9: i16::from_le_bytes([b[17], b[18]]),
            par_p10: b[19] as i8,
            par_p11: b[20] as i8,
        }
    }

    /// Byte-wide fields are sign-extended first, so -1 counts as erased. P4 is not checked.
    pub fn erased_field(&self) -> Option<&'static str> {
        let byte = |v: i8| i16::from(v) as u16;
        first_erased(&[
            ("PAR_T1", self.par_t1),
            ("PAR_T2", self.par_t2),
            ("PAR_T3", byte(self.par_t3)),
            ("PAR_P1", self.par_p1 as u16),
            ("PAR_P2", self.par_p2 as u16),
            ("PAR_P3", byte(self.par_p3)),
            ("PAR_P5", self.par_p5),
            ("PAR_P6", self.par_p6),
            ("PAR_P7", byte(self.par_p7)),
            ("PAR_P8", byte(self.par_p8)),
            ("PAR_P9", self.par_p9 as u16),
            ("PAR_P10", byte(self.par_p10)),
            ("PAR_P11", byte(self.par_p11)),
        ])
    }

    /// Reads the coefficient block. Compensation for this chip starts from a fresh copy on
    /// every measurement, so the driver calls this once per accessor.
    pub fn load<B: RegisterBus>(bus: &mut B) -> Result<Self, DeviceError<B::Error>> {
        let mut buf = [0u8; Self::LEN];
        read_exact(bus, Self::START, &mut buf)?;
        Ok(Self::from_bytes(&buf))
    }
}

/// Calibration coefficients of one chip, shaped by its variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Calibration {
    Bmp180(Bmp180Calibration),
    Bmp280(Bmp280Calibration),
    Bme680(Bme680Calibration),
}

impl Calibration {
    /// Reads the variant's coefficient block in one transfer.
    pub fn load<B: RegisterBus>(
        variant: SensorVariant,
        bus: &mut B,
    ) -> Result<Self, DeviceError<B::Error>> {
        let calibration = match variant {
            SensorVariant::Bmp180 => {
                let mut buf = [0u8; Bmp180Calibration::LEN];
                read_exact(bus, Bmp180Calibration::START, &mut buf)?;
                Calibration::Bmp180(Bmp180Calibration::from_bytes(&buf))
            }
            SensorVariant::Bmp280 => {
                let mut buf = [0u8; Bmp280Calibration::LEN];
                read_exact(bus, Bmp280Calibration::START, &mut buf)?;
                Calibration::Bmp280(Bmp280Calibration::from_bytes(&buf))
            }
            SensorVariant::Bme680 => Calibration::Bme680(Bme680Calibration::load(bus)?),
        };
        Ok(calibration)
    }

    /// Rejects coefficient sets that would feed an erased word into the formulas.
    pub fn validate<E>(&self) -> Result<(), DeviceError<E>> {
        let erased = match self {
            Calibration::Bmp180(c) => c.erased_field(),
            Calibration::Bmp280(c) => c.erased_field(),
            Calibration::Bme680(c) => c.erased_field(),
        };
        match erased {
            Some(field) => Err(DeviceError::InvalidCalibration { field }),
            None => Ok(()),
        }
    }

    pub fn variant(&self) -> SensorVariant {
        match self {
            Calibration::Bmp180(_) => SensorVariant::Bmp180,
            Calibration::Bmp280(_) => SensorVariant::Bmp280,
            Calibration::Bme680(_) => SensorVariant::Bme680,
        }
    }
}
