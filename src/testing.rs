//! Test doubles for the transport and delay.
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::bus::RegisterBus;
use crate::calibration::{fixtures, Bme680Calibration, Bmp180Calibration, Bmp280Calibration};
use crate::SensorVariant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FakeError;

/// A 256-byte register file that behaves like an idle chip.
///
/// Status reads report the variant's busy bits for the next `busy_polls` reads, or forever
/// with `stuck_busy`. BMP180 conversions share one data window, so a write to its control
/// register loads the matching sample.
pub(crate) struct FakeBus {
    pub regs: [u8; 256],
    pub writes: Vec<(u8, u8)>,
    reads: Vec<u8>,
    variant: SensorVariant,
    pub busy_polls: u16,
    pub stuck_busy: bool,
    pub short_read_at: Option<u8>,
    pub fail_reads: bool,
    pub fail_writes: bool,
    pub bmp180_ut: [u8; 2],
    pub bmp180_up: [u8; 3],
}

impl FakeBus {
    pub fn new(variant: SensorVariant) -> Self {
        let mut bus = Self {
            regs: [0; 256],
            writes: Vec::new(),
            reads: Vec::new(),
            variant,
            busy_polls: 0,
            stuck_busy: false,
            short_read_at: None,
            fail_reads: false,
            fail_writes: false,
            bmp180_ut: [0; 2],
            bmp180_up: [0; 3],
        };
        bus.regs[variant.registers().id as usize] = variant.signature();
        bus
    }

    /// BMP180 with the datasheet calibration, UT = 27898 and UP = 23843 at oss 0.
    pub fn bmp180() -> Self {
        let mut bus = Self::new(SensorVariant::Bmp180);
        bus.load(Bmp180Calibration::START, &fixtures::BMP180_BYTES);
        bus.bmp180_ut = [0x6C, 0xFA];
        bus.bmp180_up = [0x5D, 0x23, 0x00];
        bus
    }

    /// BMP280 with the datasheet calibration, adc_T = 519888 and adc_P = 415148.
    pub fn bmp280() -> Self {
        let mut bus = Self::new(SensorVariant::Bmp280);
        bus.load(Bmp280Calibration::START, &fixtures::BMP280_BYTES);
        bus.load(0xF7, &[0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00]);
        bus
    }

    /// BME680 with raw temperature 8300000 and raw pressure 6500000.
    pub fn bme680() -> Self {
        let mut bus = Self::new(SensorVariant::Bme680);
        bus.load(Bme680Calibration::START, &fixtures::BME680_BYTES);
        bus.load(0x22, &[0xE0, 0xA5, 0x7E]);
        bus.load(0x04, &[0xA0, 0x2E, 0x63]);
        bus
    }

    pub fn load(&mut self, addr: u8, bytes: &[u8]) {
        let start = addr as usize;
        self.regs[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn variant(&self) -> SensorVariant {
        self.variant
    }

    /// Number of transfers that started at `addr`.
    pub fn reads_of(&self, addr: u8) -> usize {
        self.reads.iter().filter(|&&a| a == addr).count()
    }

    pub fn total_reads(&self) -> usize {
        self.reads.len()
    }
}

impl RegisterBus for FakeBus {
    type Error = FakeError;

    fn read_bytes(&mut self, addr: u8, buf: &mut [u8]) -> Result<usize, FakeError> {
        if self.fail_reads {
            return Err(FakeError);
        }
        self.reads.push(addr);

        let registers = self.variant.registers();
        if addr == registers.status && buf.len() == 1 {
            let busy = self.stuck_busy || self.busy_polls > 0;
            self.busy_polls = self.busy_polls.saturating_sub(1);
            let idle = self.regs[addr as usize] & !registers.busy_mask;
            buf[0] = if busy { idle | registers.busy_mask } else { idle };
            return Ok(1);
        }

        let len = if self.short_read_at == Some(addr) {
            buf.len() - 1
        } else {
            buf.len()
        };
        for (i, byte) in buf.iter_mut().take(len).enumerate() {
            *byte = self.regs[(addr as usize + i) & 0xFF];
        }
        Ok(len)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), FakeError> {
        if self.fail_writes {
            return Err(FakeError);
        }
        if let [addr, value] = *bytes {
            self.writes.push((addr, value));
            self.regs[addr as usize] = value;
            if self.variant == SensorVariant::Bmp180 && addr == 0xF4 {
                if value == 0x2E {
                    let ut = self.bmp180_ut;
                    self.load(0xF6, &ut);
                } else if value & 0x3F == 0x34 {
                    let up = self.bmp180_up;
                    self.load(0xF6, &up);
                }
            }
        }
        Ok(())
    }
}

/// Counts requested delays instead of sleeping.
#[derive(Default)]
pub(crate) struct CountingDelay {
    pub calls: u32,
    pub total_us: u64,
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.total_us += u64::from(ns / 1_000);
    }

    fn delay_us(&mut self, us: u32) {
        self.calls += 1;
        self.total_us += u64::from(us);
    }
}
