//! One measurement cycle: trigger, poll the busy bits, read the raw counts.
//!
//! Each call runs the whole cycle and keeps nothing between calls:
//!
//! ```text
//! Idle -> Triggered -> Polling -> Ready -> Idle
//!                         |
//!                         +-> TimedOut
//! ```
use embedded_hal::delay::DelayNs;

use crate::bus::{read_exact, RegisterBus};
use crate::calibration::AccuracyMode;
use crate::command::Command;
use crate::error::DeviceError;
use crate::SensorVariant;

/// Poll budget of the conversion loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Status reads before giving up with [`DeviceError::ConversionTimeout`].
    pub max_polls: u16,
    /// Pause after every status read that still reports busy.
    pub poll_interval_us: u32,
}

impl Default for Config {
    /// 20 polls, 5 ms apart. The slowest conversion (BMP280, x16 pressure) takes about 45 ms.
    fn default() -> Self {
        Self {
            max_polls: 20,
            poll_interval_us: 5_000,
        }
    }
}

impl Config {
    pub const fn with_max_polls(mut self, max_polls: u16) -> Self {
        self.max_polls = max_polls;
        self
    }

    pub const fn with_poll_interval_us(mut self, poll_interval_us: u32) -> Self {
        self.poll_interval_us = poll_interval_us;
        self
    }
}

/// Raw ADC counts of one temperature and pressure measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    pub temperature: i32,
    pub pressure: i32,
}

/// 20-bit value in MSB, LSB, XLSB[7:4] order.
fn u20_be([msb, lsb, xlsb]: [u8; 3]) -> i32 {
    (i32::from(msb) << 12) | (i32::from(lsb) << 4) | (i32::from(xlsb) >> 4)
}

/// 24-bit value in XLSB, LSB, MSB order.
fn u24_le([xlsb, lsb, msb]: [u8; 3]) -> i32 {
    (i32::from(msb) << 16) | (i32::from(lsb) << 8) | i32::from(xlsb)
}

/// Borrows the bus for one measurement cycle.
pub(crate) struct Conversion<'a, B, D> {
    variant: SensorVariant,
    bus: &'a mut B,
    delay: &'a mut D,
    config: &'a Config,
}

impl<'a, B, D> Conversion<'a, B, D>
where
    B: RegisterBus,
    D: DelayNs,
{
    pub fn new(
        variant: SensorVariant,
        bus: &'a mut B,
        delay: &'a mut D,
        config: &'a Config,
    ) -> Self {
        Self {
            variant,
            bus,
            delay,
            config,
        }
    }

    /// Idle -> Triggered.
    fn trigger(&mut self, commands: &[Command]) -> Result<(), DeviceError<B::Error>> {
        for command in commands {
            trace!("write 0x{:02X} <- 0x{:02X}", command.register(), command.value());
            self.bus
                .write_byte(command.register(), command.value())
                .map_err(DeviceError::Io)?;
        }
        Ok(())
    }

    /// Triggered -> Polling -> Ready, or TimedOut once the budget is spent.
    fn wait_ready(&mut self) -> Result<(), DeviceError<B::Error>> {
        let status_reg = self.variant.registers().status;
        for poll in 1..=self.config.max_polls {
            let status = self.bus.read_byte(status_reg).map_err(DeviceError::Io)?;
            if !self.variant.is_busy(status) {
                trace!("ready after {} polls", poll);
                return Ok(());
            }
            self.delay.delay_us(self.config.poll_interval_us);
        }
        warn!("conversion still busy after {} polls", self.config.max_polls);
        Err(DeviceError::ConversionTimeout {
            polls: self.config.max_polls,
        })
    }

    fn read<const N: usize>(&mut self, addr: u8) -> Result<[u8; N], DeviceError<B::Error>> {
        let mut buf = [0u8; N];
        read_exact(&mut *self.bus, addr, &mut buf)?;
        Ok(buf)
    }

    fn convert(&mut self, commands: &[Command]) -> Result<(), DeviceError<B::Error>> {
        self.trigger(commands)?;
        self.wait_ready()
    }

    fn bmp180_temperature(&mut self) -> Result<i32, DeviceError<B::Error>> {
        self.convert(&[Command::Bmp180Temperature])?;
        let [msb, lsb] = self.read::<2>(self.variant.registers().temperature_data)?;
        Ok(i32::from(u16::from_be_bytes([msb, lsb])))
    }

    /// Raw temperature only.
    pub fn temperature(&mut self, mode: AccuracyMode) -> Result<i32, DeviceError<B::Error>> {
        let registers = self.variant.registers();
        let osr = self.variant.oversampling(mode);
        let ut = match self.variant {
            // Temperature has no oversampling on this chip.
            SensorVariant::Bmp180 => self.bmp180_temperature()?,
            SensorVariant::Bmp280 => {
                self.convert(&[Command::Bmp280Forced {
                    osrs_t: osr,
                    osrs_p: 0,
                }])?;
                u20_be(self.read::<3>(registers.temperature_data)?)
            }
            SensorVariant::Bme680 => {
                self.convert(&[
                    Command::Bme680Filter(0),
                    Command::Bme680Oversampling { osr_t: osr, osr_p: 0 },
                    Command::Bme680Forced,
                ])?;
                u24_le(self.read::<3>(registers.temperature_data)?)
            }
        };
        debug!("{}: ut={}", self.variant, ut);
        Ok(ut)
    }

    /// Raw temperature and pressure, pressure oversampled according to `mode`.
    ///
    /// The BMP180 needs two conversions; the other chips sample both channels at once, with
    /// temperature at standard oversampling.
    pub fn sample(&mut self, mode: AccuracyMode) -> Result<RawSample, DeviceError<B::Error>> {
        let registers = self.variant.registers();
        let osr_p = self.variant.oversampling(mode);
        let osr_t = self.variant.oversampling(AccuracyMode::Standard);
        let sample = match self.variant {
            SensorVariant::Bmp180 => {
                let temperature = self.bmp180_temperature()?;
                self.convert(&[Command::Bmp180Pressure(osr_p)])?;
                let [msb, lsb, xlsb] = self.read::<3>(registers.pressure_data)?;
                let pressure = ((i32::from(msb) << 16) | (i32::from(lsb) << 8) | i32::from(xlsb))
                    >> (8 - osr_p);
                RawSample {
                    temperature,
                    pressure,
                }
            }
            SensorVariant::Bmp280 => {
                self.convert(&[Command::Bmp280Forced {
                    osrs_t: osr_t,
                    osrs_p: osr_p,
                }])?;
                // Pressure and temperature registers are adjacent; burst-read both.
                let [p0, p1, p2, t0, t1, t2] = self.read::<6>(registers.pressure_data)?;
                RawSample {
                    temperature: u20_be([t0, t1, t2]),
                    pressure: u20_be([p0, p1, p2]),
                }
            }
            SensorVariant::Bme680 => {
                self.convert(&[
                    Command::Bme680Filter(0),
                    Command::Bme680Oversampling { osr_t, osr_p },
                    Command::Bme680Forced,
                ])?;
                let temperature = u24_le(self.read::<3>(registers.temperature_data)?);
                let pressure = u24_le(self.read::<3>(registers.pressure_data)?);
                RawSample {
                    temperature,
                    pressure,
                }
            }
        };
        debug!("{}: ut={} up={}", self.variant, sample.temperature, sample.pressure);
        Ok(sample)
    }
}
