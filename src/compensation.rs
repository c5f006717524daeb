//! Fixed-point compensation formulas, one module per chip.
//!
//! Every function is a pure function of the raw ADC counts and the calibration coefficients.
//! The integer operations follow the vendor reference code step for step: truncating
//! divisions and arithmetic shifts sit exactly where the reference puts them, so results match
//! the datasheet examples bit for bit. Pressure functions always recompute the temperature
//! path to get its linearized value.
//!
//! Intermediate values are handed to a [`Trace`] sink. [`NoTrace`] discards them.

/// Receives named intermediate values of a compensation run.
pub trait Trace {
    fn record(&mut self, label: &'static str, value: i64);
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTrace;

impl Trace for NoTrace {
    #[inline]
    fn record(&mut self, _label: &'static str, _value: i64) {}
}

/// Forwards every intermediate value to the `trace` log level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogTrace;

impl Trace for LogTrace {
    fn record(&mut self, label: &'static str, value: i64) {
        trace!("{}={}", label, value);
    }
}

pub mod bmp180 {
    use super::Trace;
    use crate::calibration::Bmp180Calibration;

    /// Returns the temperature in 0.01 °C and `B5`, the value the pressure formula builds on.
    ///
    /// `None` when `ut` cancels `MD` and the formula would divide by zero.
    pub fn temperature<T: Trace + ?Sized>(
        ut: i32,
        c: &Bmp180Calibration,
        trace: &mut T,
    ) -> Option<(i32, i32)> {
        let x1 = ((ut - i32::from(c.ac6)) * i32::from(c.ac5)) >> 15;
        let Some(x2) = (i32::from(c.mc) << 11).checked_div(x1 + i32::from(c.md)) else {
            warn!("bmp180: temperature divisor is zero for ut={}", ut);
            return None;
        };
        let b5 = x1 + x2;
        // The chip resolves 0.1 °C.
        let t = ((b5 + 8) >> 4) * 10;
        trace.record("ut", i64::from(ut));
        trace.record("x1", i64::from(x1));
        trace.record("x2", i64::from(x2));
        trace.record("b5", i64::from(b5));
        Some((t, b5))
    }

    /// Returns the pressure in 0.1 Pa. `oss` is the oversampling setting `up` was sampled with.
    ///
    /// `None` when either divisor of the formula comes out zero.
    pub fn pressure<T: Trace + ?Sized>(
        ut: i32,
        up: i32,
        oss: u8,
        c: &Bmp180Calibration,
        trace: &mut T,
    ) -> Option<i32> {
        let (_, b5) = temperature(ut, c, &mut *trace)?;

        let b6 = b5 - 4000;
        let x1 = (i32::from(c.b2) * ((b6 * b6) >> 12)) >> 11;
        let x2 = (i32::from(c.ac2) * b6) >> 11;
        let x3 = x1 + x2;
        let b3 = (((i32::from(c.ac1) * 4 + x3) << oss) + 2) / 4;

        let x1 = (i32::from(c.ac3) * b6) >> 13;
        let x2 = (i32::from(c.b1) * ((b6 * b6) >> 12)) >> 16;
        let x3 = ((x1 + x2) + 2) >> 2;
        let b4 = (u32::from(c.ac4) * ((x3 + 32768) as u32)) >> 15;
        if b4 == 0 {
            warn!("bmp180: pressure divisor is zero");
            return None;
        }
        // A negative difference wraps, as in the unsigned reference arithmetic.
        let b7 = ((up - b3) as u32).wrapping_mul(50000u32 >> oss);

        let p = if b7 < 0x8000_0000 {
            (b7 * 2) / b4
        } else {
            (b7 / b4) * 2
        };
        let p = p as i32;

        let x1 = (p >> 8) * (p >> 8);
        let x1 = (x1 * 3038) >> 16;
        let x2 = (-7357 * p) >> 16;
        let p = p + ((x1 + x2 + 3791) >> 4);

        trace.record("up", i64::from(up));
        trace.record("b6", i64::from(b6));
        trace.record("b3", i64::from(b3));
        trace.record("b4", i64::from(b4));
        trace.record("b7", i64::from(b7));
        trace.record("p", i64::from(p));
        Some(p * 10)
    }
}

pub mod bmp280 {
    use super::Trace;
    use crate::calibration::Bmp280Calibration;

    /// Returns the temperature in 0.01 °C and `t_fine`.
    pub fn temperature<T: Trace + ?Sized>(
        adc_t: i32,
        c: &Bmp280Calibration,
        trace: &mut T,
    ) -> (i32, i32) {
        let t1 = i32::from(c.dig_t1);
        let var1 = (((adc_t >> 3) - (t1 << 1)) * i32::from(c.dig_t2)) >> 11;
        let var2 =
            (((((adc_t >> 4) - t1) * ((adc_t >> 4) - t1)) >> 12) * i32::from(c.dig_t3)) >> 14;
        let t_fine = var1 + var2;
        let t = (t_fine * 5 + 128) >> 8;
        trace.record("adc_t", i64::from(adc_t));
        trace.record("var1", i64::from(var1));
        trace.record("var2", i64::from(var2));
        trace.record("t_fine", i64::from(t_fine));
        (t, t_fine)
    }

    /// Returns the pressure in 0.1 Pa, using the 64-bit reference formula.
    ///
    /// The reference returns 0 rather than dividing by zero; that guard is kept.
    pub fn pressure<T: Trace + ?Sized>(
        adc_t: i32,
        adc_p: i32,
        c: &Bmp280Calibration,
        trace: &mut T,
    ) -> i32 {
        let (_, t_fine) = temperature(adc_t, c, &mut *trace);

        let mut var1 = i64::from(t_fine) - 128000;
        let mut var2 = var1 * var1 * i64::from(c.dig_p6);
        var2 += (var1 * i64::from(c.dig_p5)) << 17;
        var2 += i64::from(c.dig_p4) << 35;
        var1 = ((var1 * var1 * i64::from(c.dig_p3)) >> 8) + ((var1 * i64::from(c.dig_p2)) << 12);
        var1 = (((1i64 << 47) + var1) * i64::from(c.dig_p1)) >> 33;
        if var1 == 0 {
            warn!("bmp280: pressure divisor is zero");
            return 0;
        }

        let mut p: i64 = 1048576 - i64::from(adc_p);
        p = (((p << 31) - var2) * 3125) / var1;
        var1 = (i64::from(c.dig_p9) * (p >> 13) * (p >> 13)) >> 25;
        var2 = (i64::from(c.dig_p8) * p) >> 19;
        // Q24.8 Pa
        p = ((p + var1 + var2) >> 8) + (i64::from(c.dig_p7) << 4);

        trace.record("adc_p", i64::from(adc_p));
        trace.record("q24_8", p);
        (p * 10 / 256) as i32
    }
}

pub mod bme680 {
    use super::Trace;
    use crate::calibration::Bme680Calibration;

    /// Returns the temperature in 0.01 °C and the linearized `t_lin`.
    pub fn temperature<T: Trace + ?Sized>(
        ut: i32,
        c: &Bme680Calibration,
        trace: &mut T,
    ) -> (i32, i64) {
        let partial_data1 = i64::from(ut) - 256 * i64::from(c.par_t1);
        let partial_data2 = i64::from(c.par_t2) * partial_data1;
        let partial_data3 = partial_data1 * partial_data1;
        let partial_data4 = partial_data3 * i64::from(c.par_t3);
        let partial_data5 = partial_data2 * 262144 + partial_data4;
        let t_lin = partial_data5 / 4294967296;
        let t = (t_lin * 25 / 16384) as i32;
        trace.record("ut", i64::from(ut));
        trace.record("partial_data1", partial_data1);
        trace.record("partial_data5", partial_data5);
        trace.record("t_lin", t_lin);
        (t, t_lin)
    }

    /// Returns the pressure in 0.01 Pa.
    pub fn pressure<T: Trace + ?Sized>(
        ut: i32,
        up: i32,
        c: &Bme680Calibration,
        trace: &mut T,
    ) -> u32 {
        let (_, t_lin) = temperature(ut, c, &mut *trace);
        let up = i64::from(up);

        let partial_data1 = t_lin * t_lin;
        let partial_data2 = partial_data1 / 64;
        let partial_data3 = (partial_data2 * t_lin) / 256;
        let partial_data4 = (i64::from(c.par_p8) * partial_data3) / 32;
        let partial_data5 = (i64::from(c.par_p7) * partial_data1) * 16;
        let partial_data6 = (i64::from(c.par_p6) * t_lin) * 4194304;
        let offset = i64::from(c.par_p5) * 140737488355328
            + partial_data4
            + partial_data5
            + partial_data6;
        trace.record("offset", offset);

        let partial_data2 = (i64::from(c.par_p4) * partial_data3) / 32;
        let partial_data4 = (i64::from(c.par_p3) * partial_data1) * 4;
        let partial_data5 = (i64::from(c.par_p2) - 16384) * t_lin * 2097152;
        let sensitivity = (i64::from(c.par_p1) - 16384) * 70368744177664
            + partial_data2
            + partial_data4
            + partial_data5;
        trace.record("sensitivity", sensitivity);

        let partial_data1 = (sensitivity / 16777216) * up;
        let partial_data2 = i64::from(c.par_p10) * t_lin;
        let partial_data3 = partial_data2 + 65536 * i64::from(c.par_p9);
        let partial_data4 = (partial_data3 * up) / 8192;
        let partial_data5 = (partial_data4 * up) / 512;
        let partial_data6 = up * up;
        let partial_data2 = (i64::from(c.par_p11) * partial_data6) / 65536;
        let partial_data3 = (partial_data2 * up) / 128;
        let partial_data4 = offset / 4 + partial_data1 + partial_data5 + partial_data3;
        trace.record("partial_data4", partial_data4);

        ((partial_data4 as u64 * 25) / 1099511627776) as u32
    }
}
