use core::fmt;

use crate::calibration::AccuracyMode;

/// Supported chips. They share the register-addressed protocol but differ in register map,
/// calibration layout and compensation arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorVariant {
    Bmp180,
    Bmp280,
    Bme680,
}

/// Fixed register addresses and status bits of one variant.
#[derive(Debug, PartialEq, Eq)]
pub struct RegisterMap {
    /// Chip-identity register.
    pub id: u8,
    /// Expected content of the identity register.
    pub signature: u8,
    pub status: u8,
    /// Status bits that are set while a conversion runs. The chip is ready once all of
    /// them read back clear.
    pub busy_mask: u8,
    pub temperature_data: u8,
    pub pressure_data: u8,
}

const BMP180_REGISTERS: RegisterMap = RegisterMap {
    id: 0xD0,
    signature: 0x55,
    // SCO lives in the control register itself.
    status: 0xF4,
    busy_mask: 0x20,
    temperature_data: 0xF6,
    pressure_data: 0xF6,
};

const BMP280_REGISTERS: RegisterMap = RegisterMap {
    id: 0xD0,
    signature: 0x58,
    status: 0xF3,
    busy_mask: 0x08,
    temperature_data: 0xFA,
    pressure_data: 0xF7,
};

const BME680_REGISTERS: RegisterMap = RegisterMap {
    id: 0x00,
    signature: 0x25,
    status: 0x03,
    // Pressure and temperature are tracked separately; command completion is ignored.
    busy_mask: 0x60,
    temperature_data: 0x22,
    pressure_data: 0x04,
};

impl SensorVariant {
    pub const fn registers(self) -> &'static RegisterMap {
        match self {
            SensorVariant::Bmp180 => &BMP180_REGISTERS,
            SensorVariant::Bmp280 => &BMP280_REGISTERS,
            SensorVariant::Bme680 => &BME680_REGISTERS,
        }
    }

    pub const fn signature(self) -> u8 {
        self.registers().signature
    }

    /// Oversampling register code for `mode`.
    pub fn oversampling(self, mode: AccuracyMode) -> u8 {
        use AccuracyMode::*;
        match self {
            // oss 0..=3; "standard" is the datasheet's standard mode.
            SensorVariant::Bmp180 => match mode {
                UltraLow => 0,
                Low | Standard => 1,
                High => 2,
                UltraHigh => 3,
            },
            // osrs 0 means skipped, 1..=5 is x1..x16.
            SensorVariant::Bmp280 => match mode {
                UltraLow => 1,
                Low => 2,
                Standard => 3,
                High => 4,
                UltraHigh => 5,
            },
            SensorVariant::Bme680 => match mode {
                UltraLow => 0,
                Low => 1,
                Standard => 2,
                High => 3,
                UltraHigh => 4,
            },
        }
    }

    pub fn is_busy(self, status: u8) -> bool {
        status & self.registers().busy_mask != 0
    }

    /// None of the supported chips measures humidity.
    pub const fn supports_humidity(self) -> bool {
        match self {
            SensorVariant::Bmp180 | SensorVariant::Bmp280 | SensorVariant::Bme680 => false,
        }
    }
}

impl fmt::Display for SensorVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorVariant::Bmp180 => "BMP180",
            SensorVariant::Bmp280 => "BMP280",
            SensorVariant::Bme680 => "BME680",
        };
        f.write_str(name)
    }
}
