use embedded_hal::i2c::I2c;

use crate::error::DeviceError;

/// Default I2C address with SDO pulled high (and the only address of the BMP180).
pub const PRIMARY_ADDRESS: u8 = 0x77;
/// Alternate I2C address with SDO tied to ground.
pub const SECONDARY_ADDRESS: u8 = 0x76;

/// Byte-level access to the chip's register file.
///
/// The driver owns its bus for its whole lifetime; sharing one bus between several drivers is
/// up to the implementor (for example through `embedded-hal-bus`).
pub trait RegisterBus {
    type Error;

    /// Reads consecutive registers starting at `addr` into `buf` and returns how many bytes
    /// were actually transferred.
    fn read_bytes(&mut self, addr: u8, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Writes raw bytes to the chip. The first byte is the register address.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    fn read_byte(&mut self, addr: u8) -> Result<u8, Self::Error> {
        let mut buf = [0u8; 1];
        self.read_bytes(addr, &mut buf)?;
        Ok(buf[0])
    }

    fn write_byte(&mut self, addr: u8, value: u8) -> Result<(), Self::Error> {
        self.write_bytes(&[addr, value])
    }
}

impl<T: RegisterBus + ?Sized> RegisterBus for &mut T {
    type Error = T::Error;

    #[inline]
    fn read_bytes(&mut self, addr: u8, buf: &mut [u8]) -> Result<usize, Self::Error> {
        T::read_bytes(self, addr, buf)
    }

    #[inline]
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        T::write_bytes(self, bytes)
    }
}

/// [`RegisterBus`] over an `embedded-hal` I2C controller.
pub struct I2cBus<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> I2cBus<I2C>
where
    I2C: I2c,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Gives the I2C controller back.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C> RegisterBus for I2cBus<I2C>
where
    I2C: I2c,
{
    type Error = I2C::Error;

    fn read_bytes(&mut self, addr: u8, buf: &mut [u8]) -> Result<usize, Self::Error> {
        // A write_read either fills the whole buffer or fails.
        self.i2c.write_read(self.address, &[addr], buf)?;
        Ok(buf.len())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.i2c.write(self.address, bytes)
    }
}

/// Fills `buf` from consecutive registers, treating a partial transfer as an error.
pub(crate) fn read_exact<B: RegisterBus>(
    bus: &mut B,
    addr: u8,
    buf: &mut [u8],
) -> Result<(), DeviceError<B::Error>> {
    let read = bus.read_bytes(addr, buf).map_err(DeviceError::Io)?;
    if read < buf.len() {
        return Err(DeviceError::ShortRead {
            expected: buf.len(),
            read,
        });
    }
    Ok(())
}
