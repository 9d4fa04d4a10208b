//! # Byte stream transport
//!
//! The client only requires a transport which is able to write bytes and to read a single line within a
//! maximum wait time. Any UART implementing [embedded_io] traits may be used by wrapping it with
//! [SerialTransport].
use core::fmt::Debug;
use embedded_io::{Read, ReadReady, Write};
use fugit::TimerDurationU32;
use fugit_timer::Timer;

/// Line oriented byte stream to the ESP-AT module
pub trait Transport<const TIMER_HZ: u32> {
    /// Upstream I/O error
    type Error: Debug;

    /// Writes all given bytes
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Reads bytes into the given buffer until either a line feed has been received (which is included in
    /// the buffer), the buffer is full or the timeout expired. Returns the number of bytes read.
    ///
    /// A zero return value signals that nothing has been received in time.
    fn read_line(&mut self, buffer: &mut [u8], timeout: TimerDurationU32<TIMER_HZ>) -> Result<usize, Self::Error>;

    /// Returns the number of bytes which may be read without blocking.
    fn bytes_available(&mut self) -> Result<usize, Self::Error>;

    /// Drops all pending input
    fn discard_available(&mut self) -> Result<(), Self::Error>;
}

/// Errors of [SerialTransport]
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialError<E> {
    /// UART read or write failed
    Serial(E),

    /// Upstream timer error
    TimerError,
}

/// [Transport] on top of a blocking UART and a timer used for measuring the line timeout
///
/// Bytes are read one by one, but only if the UART signals that data is ready. So reading never blocks
/// longer then the given timeout.
pub struct SerialTransport<S, T: Timer<TIMER_HZ>, const TIMER_HZ: u32> {
    serial: S,
    timer: T,
}

impl<S, T: Timer<TIMER_HZ>, const TIMER_HZ: u32> SerialTransport<S, T, TIMER_HZ>
where
    S: Read + ReadReady + Write,
{
    pub fn new(serial: S, timer: T) -> Self {
        Self { serial, timer }
    }

    /// Returns the inner UART and timer
    pub fn release(self) -> (S, T) {
        (self.serial, self.timer)
    }

    /// Reads a single byte if available
    fn read_byte(&mut self) -> Result<Option<u8>, SerialError<S::Error>> {
        if !self.serial.read_ready().map_err(SerialError::Serial)? {
            return Ok(None);
        }

        let mut byte = [0x0];
        match self.serial.read(&mut byte).map_err(SerialError::Serial)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Returns true once the started timer expired
    fn is_expired(&mut self) -> Result<bool, SerialError<S::Error>> {
        match self.timer.wait() {
            Ok(_) => Ok(true),
            Err(nb::Error::WouldBlock) => Ok(false),
            Err(nb::Error::Other(_)) => Err(SerialError::TimerError),
        }
    }
}

impl<S, T: Timer<TIMER_HZ>, const TIMER_HZ: u32> Transport<TIMER_HZ> for SerialTransport<S, T, TIMER_HZ>
where
    S: Read + ReadReady + Write,
{
    type Error = SerialError<S::Error>;

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.serial.write_all(data).map_err(SerialError::Serial)?;
        self.serial.flush().map_err(SerialError::Serial)
    }

    fn read_line(&mut self, buffer: &mut [u8], timeout: TimerDurationU32<TIMER_HZ>) -> Result<usize, Self::Error> {
        let mut length = 0;
        self.timer.start(timeout).map_err(|_| SerialError::TimerError)?;

        while length < buffer.len() {
            match self.read_byte()? {
                Some(byte) => {
                    buffer[length] = byte;
                    length += 1;

                    if byte == b'\n' {
                        break;
                    }
                }
                None => {
                    if self.is_expired()? {
                        break;
                    }
                }
            }
        }

        let _ = self.timer.cancel();
        Ok(length)
    }

    /// The UART only signals readiness, so at most one byte is reported.
    fn bytes_available(&mut self) -> Result<usize, Self::Error> {
        Ok(usize::from(self.serial.read_ready().map_err(SerialError::Serial)?))
    }

    fn discard_available(&mut self) -> Result<(), Self::Error> {
        let mut scratch = [0x0; 32];

        while self.serial.read_ready().map_err(SerialError::Serial)? {
            if self.serial.read(&mut scratch).map_err(SerialError::Serial)? == 0 {
                break;
            }
        }

        Ok(())
    }
}
