/// Register writes that configure and start a conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// BMP180: start a temperature conversion.
    Bmp180Temperature,
    /// BMP180: start a pressure conversion with oversampling setting `oss` (0..=3).
    Bmp180Pressure(u8),
    /// BMP280: one forced-mode measurement. An oversampling code of 0 skips that channel.
    Bmp280Forced { osrs_t: u8, osrs_p: u8 },
    /// BME680: IIR filter coefficient code, 0 bypasses the filter.
    Bme680Filter(u8),
    /// BME680: temperature and pressure oversampling codes.
    Bme680Oversampling { osr_t: u8, osr_p: u8 },
    /// BME680: enable pressure and temperature, then start one forced measurement.
    Bme680Forced,
}

const BMP180_CTRL_MEAS: u8 = 0xF4;
const BMP280_CTRL_MEAS: u8 = 0xF4;
const BME680_PWR_CTRL: u8 = 0x1B;
const BME680_OSR: u8 = 0x74;
const BME680_CONFIG: u8 = 0x75;

const BMP280_MODE_FORCED: u8 = 0b01;
const BME680_MODE_FORCED: u8 = 1;
const BME680_PRESS_TEMP_EN: u8 = 0b11;

impl Command {
    pub fn register(&self) -> u8 {
        match self {
            Command::Bmp180Temperature | Command::Bmp180Pressure(_) => BMP180_CTRL_MEAS,
            Command::Bmp280Forced { .. } => BMP280_CTRL_MEAS,
            Command::Bme680Filter(_) => BME680_CONFIG,
            Command::Bme680Oversampling { .. } => BME680_OSR,
            Command::Bme680Forced => BME680_PWR_CTRL,
        }
    }

    pub fn value(&self) -> u8 {
        match *self {
            Command::Bmp180Temperature => 0x2E,
            Command::Bmp180Pressure(oss) => 0x34 | ((oss & 0x03) << 6),
            Command::Bmp280Forced { osrs_t, osrs_p } => {
                ((osrs_t & 0x07) << 5) | ((osrs_p & 0x07) << 2) | BMP280_MODE_FORCED
            }
            Command::Bme680Filter(coef) => (coef & 0x07) << 1,
            Command::Bme680Oversampling { osr_t, osr_p } => ((osr_t & 0x07) << 3) | (osr_p & 0x07),
            Command::Bme680Forced => (BME680_MODE_FORCED << 4) | BME680_PRESS_TEMP_EN,
        }
    }
}
