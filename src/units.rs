//! Conversions on already compensated pressure values.
use libm::{powf, truncf};

/// Standard atmosphere at sea level, in Pa.
pub const SEA_LEVEL_PA: f32 = 101_325.0;

const PA_PER_MMHG: f32 = 133.322;

/// Compensated pressure in the variant's native unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pressure {
    /// 0.1 Pa steps (BMP180, BMP280).
    DeciPascals(i32),
    /// 0.01 Pa steps (BME680).
    CentiPascals(u32),
}

impl Pressure {
    pub fn as_pascals(&self) -> f32 {
        match *self {
            Pressure::DeciPascals(dpa) => dpa as f32 / 10.0,
            Pressure::CentiPascals(cpa) => cpa as f32 / 100.0,
        }
    }
}

/// Drops everything past the second decimal.
fn truncate_2(value: f32) -> f32 {
    truncf(value * 100.0) / 100.0
}

/// Millimeters of mercury, truncated to two decimals.
pub fn pascals_to_mmhg(pascals: f32) -> f32 {
    truncate_2(pascals / PA_PER_MMHG)
}

/// Altitude in meters above sea level by the international barometric formula, truncated to
/// two decimals.
pub fn altitude_from_pascals(pascals: f32) -> f32 {
    truncate_2(44_330.0 * (1.0 - powf(pascals / SEA_LEVEL_PA, 1.0 / 5.255)))
}
