use core::fmt;

/// Errors raised while talking to the sensor.
///
/// `E` is the error type of the underlying [`RegisterBus`](crate::bus::RegisterBus).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceError<E> {
    /// The transport failed a read or write.
    Io(E),
    /// The transport returned fewer bytes than requested.
    ShortRead { expected: usize, read: usize },
    /// The chip-identity register does not belong to the requested variant.
    SignatureMismatch { expected: u8, found: u8 },
    /// A calibration coefficient holds an erased value (0x0000 or 0xFFFF).
    InvalidCalibration { field: &'static str },
    /// The busy flag did not clear within the poll budget.
    ConversionTimeout { polls: u16 },
    /// The raw sample drives the compensation formula into a division by zero.
    InvalidSample,
}

impl<E> DeviceError<E> {
    /// Only a timed out conversion is worth retrying; everything else points at wiring,
    /// a wrong variant or a dead chip.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeviceError::ConversionTimeout { .. })
    }
}

impl<E: fmt::Debug> fmt::Display for DeviceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Io(e) => write!(f, "bus error: {:?}", e),
            DeviceError::ShortRead { expected, read } => {
                write!(f, "short read: expected {} bytes, got {}", expected, read)
            }
            DeviceError::SignatureMismatch { expected, found } => write!(
                f,
                "sensor id should be 0x{:02X}, but 0x{:02X} received",
                expected, found
            ),
            DeviceError::InvalidCalibration { field } => {
                write!(f, "calibration coefficient {} is invalid", field)
            }
            DeviceError::ConversionTimeout { polls } => {
                write!(f, "conversion still busy after {} polls", polls)
            }
            DeviceError::InvalidSample => f.write_str("raw sample cannot be compensated"),
        }
    }
}
