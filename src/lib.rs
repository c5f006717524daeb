#![cfg_attr(not(test), no_std)]
//! Driver for the Bosch BMP180, BMP280 and BME680 barometric sensors.
//!
//! One [`Bmp`] type serves all three chips. The variant is picked at construction, checked
//! against the chip-identity register, and decides the register map, the calibration layout and
//! the compensation formulas used from then on.
//!
//! ```no_run
//! # use bosch_bmp::DeviceError;
//! # use embedded_hal::{delay::DelayNs, i2c::I2c};
//! # fn demo<I: I2c, D: DelayNs>(i2c: I, delay: D) -> Result<(), DeviceError<I::Error>> {
//! use bosch_bmp::{AccuracyMode, Bmp, I2cBus, SensorVariant, PRIMARY_ADDRESS};
//!
//! let bus = I2cBus::new(i2c, PRIMARY_ADDRESS);
//! let mut sensor = Bmp::new(SensorVariant::Bmp280, bus, delay)?;
//! let centi_celsius = sensor.read_temperature_centi_celsius(AccuracyMode::Standard)?;
//! let pressure = sensor.read_pressure(AccuracyMode::UltraHigh)?;
//! # let _ = (centi_celsius, pressure);
//! # Ok(())
//! # }
//! ```
#[macro_use]
mod fmt;

mod bus;
mod calibration;
mod command;
pub mod compensation;
mod conversion;
mod error;
#[cfg(test)]
mod testing;
pub mod units;
mod variant;

use embedded_hal::delay::DelayNs;

pub use bus::{I2cBus, RegisterBus, PRIMARY_ADDRESS, SECONDARY_ADDRESS};
pub use calibration::{
    AccuracyMode, Bme680Calibration, Bmp180Calibration, Bmp280Calibration, Calibration,
};
pub use conversion::Config;
pub use error::DeviceError;
pub use units::Pressure;
pub use variant::{RegisterMap, SensorVariant};

use compensation::{LogTrace, NoTrace, Trace};
use conversion::Conversion;

/// A BMP-family sensor behind a [`RegisterBus`].
pub struct Bmp<B, D> {
    bus: B,
    delay: D,
    variant: SensorVariant,
    calibration: Calibration,
    config: Config,
    debug: bool,
}

impl<B, D> Bmp<B, D>
where
    B: RegisterBus,
    D: DelayNs,
{
    /// Binds the driver to a chip with the default poll budget.
    ///
    /// Fails with [`DeviceError::SignatureMismatch`] when the chip is not a `variant`, and with
    /// [`DeviceError::InvalidCalibration`] when its coefficient memory reads back erased.
    pub fn new(variant: SensorVariant, bus: B, delay: D) -> Result<Self, DeviceError<B::Error>> {
        Self::with_config(variant, bus, delay, Config::default())
    }

    pub fn with_config(
        variant: SensorVariant,
        mut bus: B,
        delay: D,
        config: Config,
    ) -> Result<Self, DeviceError<B::Error>> {
        let found = bus
            .read_byte(variant.registers().id)
            .map_err(DeviceError::Io)?;
        if found != variant.signature() {
            warn!("expected {} signature, found 0x{:02X}", variant, found);
            return Err(DeviceError::SignatureMismatch {
                expected: variant.signature(),
                found,
            });
        }

        let calibration = Calibration::load(variant, &mut bus)?;
        calibration.validate::<B::Error>()?;
        debug!("{} calibrated", variant);

        Ok(Self {
            bus,
            delay,
            variant,
            calibration,
            config,
            debug: false,
        })
    }

    fn conversion(&mut self) -> Conversion<'_, B, D> {
        Conversion::new(self.variant, &mut self.bus, &mut self.delay, &self.config)
    }

    /// Coefficients for the next compensation. The BME680 gets a fresh copy every time.
    fn compensation_coefficients(&mut self) -> Result<Calibration, DeviceError<B::Error>> {
        if let Calibration::Bme680(_) = self.calibration {
            let fresh = Calibration::Bme680(Bme680Calibration::load(&mut self.bus)?);
            fresh.validate::<B::Error>()?;
            self.calibration = fresh;
        }
        Ok(self.calibration)
    }

    fn with_trace<R>(&self, f: impl FnOnce(&mut dyn Trace) -> R) -> R {
        if self.debug {
            f(&mut LogTrace)
        } else {
            f(&mut NoTrace)
        }
    }

    /// Temperature in 0.01 °C.
    ///
    /// On the BME680 the freshly read coefficients are validated again, so this can also fail
    /// with [`DeviceError::InvalidCalibration`]. A raw sample the formula cannot divide through
    /// gives [`DeviceError::InvalidSample`].
    pub fn read_temperature_centi_celsius(
        &mut self,
        mode: AccuracyMode,
    ) -> Result<i32, DeviceError<B::Error>> {
        let ut = self.conversion().temperature(mode)?;
        let calibration = self.compensation_coefficients()?;
        let t = self.with_trace(|trace| match calibration {
            Calibration::Bmp180(c) => compensation::bmp180::temperature(ut, &c, trace).map(|r| r.0),
            Calibration::Bmp280(c) => Some(compensation::bmp280::temperature(ut, &c, trace).0),
            Calibration::Bme680(c) => Some(compensation::bme680::temperature(ut, &c, trace).0),
        });
        let t = t.ok_or(DeviceError::InvalidSample)?;
        debug!("{}: {} cC", self.variant, t);
        Ok(t)
    }

    pub fn read_temperature_celsius(
        &mut self,
        mode: AccuracyMode,
    ) -> Result<f32, DeviceError<B::Error>> {
        Ok(self.read_temperature_centi_celsius(mode)? as f32 / 100.0)
    }

    /// Pressure in the chip's native unit. Every call runs a fresh temperature measurement
    /// alongside the pressure one.
    ///
    /// Fails like [`Bmp::read_temperature_centi_celsius`], including the BME680 calibration
    /// re-check.
    pub fn read_pressure(&mut self, mode: AccuracyMode) -> Result<Pressure, DeviceError<B::Error>> {
        let oss = self.variant.oversampling(mode);
        let raw = self.conversion().sample(mode)?;
        let calibration = self.compensation_coefficients()?;
        let pressure = self.with_trace(|trace| match calibration {
            Calibration::Bmp180(c) => {
                compensation::bmp180::pressure(raw.temperature, raw.pressure, oss, &c, trace)
                    .map(Pressure::DeciPascals)
            }
            Calibration::Bmp280(c) => Some(Pressure::DeciPascals(compensation::bmp280::pressure(
                raw.temperature,
                raw.pressure,
                &c,
                trace,
            ))),
            Calibration::Bme680(c) => Some(Pressure::CentiPascals(compensation::bme680::pressure(
                raw.temperature,
                raw.pressure,
                &c,
                trace,
            ))),
        });
        let pressure = pressure.ok_or(DeviceError::InvalidSample)?;
        debug!("{}: {}", self.variant, pressure);
        Ok(pressure)
    }

    pub fn read_pressure_pa(&mut self, mode: AccuracyMode) -> Result<f32, DeviceError<B::Error>> {
        Ok(self.read_pressure(mode)?.as_pascals())
    }

    pub fn read_pressure_mmhg(&mut self, mode: AccuracyMode) -> Result<f32, DeviceError<B::Error>> {
        Ok(units::pascals_to_mmhg(self.read_pressure_pa(mode)?))
    }

    /// Altitude in meters, assuming standard pressure at sea level.
    pub fn read_altitude(&mut self, mode: AccuracyMode) -> Result<f32, DeviceError<B::Error>> {
        Ok(units::altitude_from_pascals(self.read_pressure_pa(mode)?))
    }

    pub fn supports_humidity(&self) -> bool {
        self.variant.supports_humidity()
    }

    /// Relative humidity, or `None` on chips without a humidity channel. `None` is returned
    /// without touching the bus.
    pub fn read_humidity(
        &mut self,
        _mode: AccuracyMode,
    ) -> Result<Option<u32>, DeviceError<B::Error>> {
        if !self.supports_humidity() {
            debug!("{} has no humidity channel", self.variant);
        }
        Ok(None)
    }

    /// Logs the intermediate values of every compensation at trace level.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn variant(&self) -> SensorVariant {
        self.variant
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gives the bus and the delay back.
    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::fixtures;
    use crate::testing::{CountingDelay, FakeBus};
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    fn bind(variant: SensorVariant, bus: &mut FakeBus) -> Bmp<&mut FakeBus, CountingDelay> {
        Bmp::new(variant, bus, CountingDelay::default()).unwrap()
    }

    #[test]
    fn bmp180_end_to_end() {
        let mut bus = FakeBus::bmp180();
        let mut sensor = bind(SensorVariant::Bmp180, &mut bus);
        assert_eq!(
            sensor.read_temperature_centi_celsius(AccuracyMode::UltraLow),
            Ok(1500)
        );
        assert_eq!(
            sensor.read_pressure(AccuracyMode::UltraLow),
            Ok(Pressure::DeciPascals(699640))
        );
        assert_eq!(sensor.read_temperature_celsius(AccuracyMode::Standard), Ok(15.0));
    }

    #[test]
    fn bmp280_end_to_end() {
        let mut bus = FakeBus::bmp280();
        let mut sensor = bind(SensorVariant::Bmp280, &mut bus);
        assert_eq!(
            sensor.read_temperature_centi_celsius(AccuracyMode::Standard),
            Ok(2508)
        );
        assert_eq!(
            sensor.read_pressure(AccuracyMode::UltraHigh),
            Ok(Pressure::DeciPascals(1006532))
        );
        let mmhg = sensor.read_pressure_mmhg(AccuracyMode::Standard).unwrap();
        assert!((mmhg - 754.96).abs() < 0.05);
        let altitude = sensor.read_altitude(AccuracyMode::Standard).unwrap();
        assert!((altitude - 56.08).abs() < 0.1);
    }

    #[test]
    fn bmp280_cold_reading() {
        let mut bus = FakeBus::bmp280();
        bus.load(0xF7, &[0x65, 0x5A, 0xC0, 0x65, 0x5F, 0xF0]);
        let mut sensor = bind(SensorVariant::Bmp280, &mut bus);
        assert_eq!(
            sensor.read_temperature_centi_celsius(AccuracyMode::Low),
            Ok(-783)
        );
        assert_eq!(
            sensor.read_pressure(AccuracyMode::Low),
            Ok(Pressure::DeciPascals(956383))
        );
    }

    #[test]
    fn bme680_end_to_end() {
        let mut bus = FakeBus::bme680();
        let mut sensor = bind(SensorVariant::Bme680, &mut bus);
        assert_eq!(
            sensor.read_temperature_centi_celsius(AccuracyMode::Standard),
            Ok(2113)
        );
        assert_eq!(
            sensor.read_pressure(AccuracyMode::Standard),
            Ok(Pressure::CentiPascals(10473598))
        );
    }

    #[test]
    fn bme680_derived_units_are_physical() {
        let mut bus = FakeBus::bme680();
        let mut sensor = bind(SensorVariant::Bme680, &mut bus);
        let pa = sensor.read_pressure_pa(AccuracyMode::Standard).unwrap();
        assert!((pa - 104_735.98).abs() < 0.05);
        let mmhg = sensor.read_pressure_mmhg(AccuracyMode::Standard).unwrap();
        assert!((mmhg - 785.58).abs() < 0.05);
        // A little above standard sea-level pressure.
        let altitude = sensor.read_altitude(AccuracyMode::Standard).unwrap();
        assert!((altitude + 280.18).abs() < 0.5);
    }

    #[test]
    fn bme680_calibration_erased_after_construction() {
        let mut bus = FakeBus::bme680();
        let mut sensor = bind(SensorVariant::Bme680, &mut bus);
        sensor.bus.load(Bme680Calibration::START, &[0x00, 0x00]);
        assert_eq!(
            sensor.read_temperature_centi_celsius(AccuracyMode::Standard),
            Err(DeviceError::InvalidCalibration { field: "PAR_T1" })
        );
        assert_eq!(
            sensor.read_pressure(AccuracyMode::Standard),
            Err(DeviceError::InvalidCalibration { field: "PAR_T1" })
        );
    }

    #[test]
    fn bmp180_sample_hitting_a_zero_divisor_is_an_error() {
        let mut bus = FakeBus::bmp180();
        bus.bmp180_ut = 20285u16.to_be_bytes();
        let mut sensor = bind(SensorVariant::Bmp180, &mut bus);
        assert_eq!(
            sensor.read_temperature_centi_celsius(AccuracyMode::Standard),
            Err(DeviceError::InvalidSample)
        );
        assert_eq!(
            sensor.read_pressure(AccuracyMode::UltraLow),
            Err(DeviceError::InvalidSample)
        );

        sensor.bus.bmp180_ut = [0x6C, 0xFA];
        assert_eq!(
            sensor.read_temperature_centi_celsius(AccuracyMode::Standard),
            Ok(1500)
        );
    }

    #[test]
    fn bme680_rereads_calibration_per_measurement() {
        let mut bus = FakeBus::bme680();
        let mut sensor = bind(SensorVariant::Bme680, &mut bus);
        sensor.read_temperature_centi_celsius(AccuracyMode::Low).unwrap();
        sensor.read_pressure(AccuracyMode::Low).unwrap();
        drop(sensor);
        assert_eq!(bus.reads_of(Bme680Calibration::START), 3);
    }

    #[test]
    fn bmp280_reads_calibration_once() {
        let mut bus = FakeBus::bmp280();
        let mut sensor = bind(SensorVariant::Bmp280, &mut bus);
        sensor.read_temperature_centi_celsius(AccuracyMode::Low).unwrap();
        sensor.read_pressure(AccuracyMode::Low).unwrap();
        assert_eq!(sensor.calibration(), &Calibration::Bmp280(fixtures::BMP280));
        drop(sensor);
        assert_eq!(bus.reads_of(Bmp280Calibration::START), 1);
    }

    #[test]
    fn wrong_chip_fails_before_calibration() {
        let mut bus = FakeBus::bmp180();
        let result = Bmp::new(SensorVariant::Bmp280, &mut bus, CountingDelay::default());
        assert!(matches!(
            result,
            Err(DeviceError::SignatureMismatch {
                expected: 0x58,
                found: 0x55
            })
        ));
        assert_eq!(bus.total_reads(), 1);
    }

    #[test]
    fn bme680_identity_lives_at_zero() {
        let mut bus = FakeBus::bme680();
        let result = Bmp::new(SensorVariant::Bmp180, &mut bus, CountingDelay::default());
        assert!(matches!(
            result,
            Err(DeviceError::SignatureMismatch {
                expected: 0x55,
                found: 0x00
            })
        ));
    }

    #[test]
    fn erased_calibration_is_rejected() {
        let mut bus = FakeBus::bmp180();
        bus.load(Bmp180Calibration::START, &[0x00, 0x00]);
        let result = Bmp::new(SensorVariant::Bmp180, &mut bus, CountingDelay::default());
        assert!(matches!(
            result,
            Err(DeviceError::InvalidCalibration { field: "AC1" })
        ));

        let mut bus = FakeBus::bmp280();
        bus.load(Bmp280Calibration::START, &[0xFF; Bmp280Calibration::LEN]);
        let result = Bmp::new(SensorVariant::Bmp280, &mut bus, CountingDelay::default());
        assert!(matches!(
            result,
            Err(DeviceError::InvalidCalibration { field: "T1" })
        ));
    }

    #[test]
    fn repeated_reads_agree() {
        let mut bus = FakeBus::bme680();
        let mut sensor = bind(SensorVariant::Bme680, &mut bus);
        let first = sensor.read_pressure(AccuracyMode::High).unwrap();
        let second = sensor.read_pressure(AccuracyMode::High).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn timeout_is_retryable() {
        let mut bus = FakeBus::bmp280();
        bus.stuck_busy = true;
        let mut sensor = bind(SensorVariant::Bmp280, &mut bus);
        let err = sensor
            .read_temperature_centi_celsius(AccuracyMode::Standard)
            .unwrap_err();
        assert_eq!(err, DeviceError::ConversionTimeout { polls: 20 });
        assert!(err.is_retryable());

        sensor.bus.stuck_busy = false;
        assert_eq!(
            sensor.read_temperature_centi_celsius(AccuracyMode::Standard),
            Ok(2508)
        );
        let (bus, delay) = sensor.release();
        assert_eq!(bus.reads_of(0xF3), 21);
        assert_eq!(delay.calls, 20);
    }

    #[test]
    fn custom_poll_budget() {
        let mut bus = FakeBus::bme680();
        bus.stuck_busy = true;
        let config = Config::default().with_max_polls(3).with_poll_interval_us(250);
        let mut sensor =
            Bmp::with_config(SensorVariant::Bme680, &mut bus, CountingDelay::default(), config)
                .unwrap();
        assert_eq!(sensor.config().max_polls, 3);
        assert_eq!(
            sensor.read_pressure(AccuracyMode::Standard),
            Err(DeviceError::ConversionTimeout { polls: 3 })
        );
        let (_, delay) = sensor.release();
        assert_eq!(delay.total_us, 750);
    }

    #[test]
    fn humidity_is_unsupported_and_silent() {
        let mut bus = FakeBus::bmp280();
        let mut sensor = bind(SensorVariant::Bmp280, &mut bus);
        assert!(!sensor.supports_humidity());
        let before = sensor.bus.total_reads();
        assert_eq!(sensor.read_humidity(AccuracyMode::Standard), Ok(None));
        assert_eq!(sensor.bus.total_reads(), before);
        assert!(sensor.bus.writes.is_empty());
    }

    #[test]
    fn debug_does_not_change_results() {
        let mut bus = FakeBus::bmp180();
        let mut sensor = bind(SensorVariant::Bmp180, &mut bus);
        let quiet = sensor.read_pressure(AccuracyMode::UltraLow).unwrap();
        sensor.set_debug(true);
        let traced = sensor.read_pressure(AccuracyMode::UltraLow).unwrap();
        assert_eq!(quiet, traced);
        assert_eq!(sensor.variant(), SensorVariant::Bmp180);
    }

    #[test]
    fn bmp280_over_i2c() {
        let address = PRIMARY_ADDRESS;
        let i2c = I2cMock::new(&[
            I2cTransaction::write_read(address, vec![0xD0], vec![0x58]),
            I2cTransaction::write_read(address, vec![0x88], fixtures::BMP280_BYTES.to_vec()),
            I2cTransaction::write(address, vec![0xF4, 0x61]),
            I2cTransaction::write_read(address, vec![0xF3], vec![0x08]),
            I2cTransaction::write_read(address, vec![0xF3], vec![0x00]),
            I2cTransaction::write_read(address, vec![0xFA], vec![0x7E, 0xED, 0x00]),
        ]);
        let bus = I2cBus::new(i2c, address);
        let mut sensor = Bmp::new(SensorVariant::Bmp280, bus, CountingDelay::default()).unwrap();
        assert_eq!(
            sensor.read_temperature_centi_celsius(AccuracyMode::Standard),
            Ok(2508)
        );
        let (bus, delay) = sensor.release();
        assert_eq!(delay.calls, 1);
        bus.release().done();
    }
}
