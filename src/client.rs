//! # Command/response engine
//!
//! Sends formatted commands and awaits the responses line by line. Just one command may be outstanding at
//! the same time, which is ensured by the exclusive borrow of all methods.
use crate::commands::Command;
use crate::fmt::printable;
use crate::responses::{classify, Expectation, MatchOutcome, Span, Verdict};
use crate::transport::Transport;
use fugit::{TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer;
use heapless::{String, Vec};

/// Max. length of a formatted command
const COMMAND_SIZE: usize = 160;

/// Non-success outcome of a single command
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Module responded with the command specific failure
    Failure,

    /// Module is busy. Caller may retry after a while.
    Busy,

    /// Module responded with ERROR
    DeviceError,

    /// Expected response was not received in time
    Timeout,

    /// Expected response exceeded the line buffer
    Truncated,

    /// Formatted command exceeds the command buffer
    CommandTooLong,

    /// Upstream transport error
    TransportError,

    /// Upstream timer error
    TimerError,
}

impl MatchOutcome {
    /// Maps all non-success outcomes to the matching error
    pub fn into_result(self) -> Result<Option<Span>, CommandError> {
        match self {
            MatchOutcome::Success(field) => Ok(field),
            MatchOutcome::Failure => Err(CommandError::Failure),
            MatchOutcome::Busy => Err(CommandError::Busy),
            MatchOutcome::DeviceError => Err(CommandError::DeviceError),
            MatchOutcome::Timeout => Err(CommandError::Timeout),
            MatchOutcome::Truncated => Err(CommandError::Truncated),
        }
    }
}

/// Owns the transport and the line buffer
///
/// LINE_SIZE: Max. line length in bytes including the line terminator. Longer lines get truncated.
pub struct AtClient<T: Transport<TIMER_HZ>, C: Timer<TIMER_HZ>, const TIMER_HZ: u32, const LINE_SIZE: usize> {
    /// Byte stream to the module
    pub(crate) transport: T,

    /// Timer used for deadlines and delays
    pub(crate) timer: C,

    /// Last read line including the line terminator
    line: Vec<u8, LINE_SIZE>,

    /// True if the last line was truncated, so the next read returns its remainder
    continuation: bool,
}

impl<T: Transport<TIMER_HZ>, C: Timer<TIMER_HZ>, const TIMER_HZ: u32, const LINE_SIZE: usize>
    AtClient<T, C, TIMER_HZ, LINE_SIZE>
{
    pub fn new(transport: T, timer: C) -> Self {
        Self {
            transport,
            timer,
            line: Vec::new(),
            continuation: false,
        }
    }

    /// Formats and writes the given command
    pub fn send_command(&mut self, command: &Command) -> Result<(), CommandError> {
        let formatted: String<COMMAND_SIZE> = command.format().map_err(|_| CommandError::CommandTooLong)?;
        debug!("Sending command {}", printable(formatted.as_bytes()));

        self.write(formatted.as_bytes())
    }

    /// Sends the command and awaits the expected response
    pub fn execute(
        &mut self,
        command: &Command,
        expectation: &Expectation,
        timeout: TimerDurationU32<TIMER_HZ>,
    ) -> Result<Option<Span>, CommandError> {
        self.send_command(command)?;
        self.await_response(expectation, timeout)?.into_result()
    }

    /// Writes raw data
    pub fn write(&mut self, data: &[u8]) -> Result<(), CommandError> {
        self.transport.write(data).map_err(|_| {
            error!("Transport write failed");
            CommandError::TransportError
        })
    }

    /// Reads line by line until the expected response, a failure or the timeout is reached.
    ///
    /// Lines not matching any outcome are skipped. This includes success lines not containing the
    /// expected field, if delimiters are given.
    pub fn await_response(
        &mut self,
        expectation: &Expectation,
        timeout: TimerDurationU32<TIMER_HZ>,
    ) -> Result<MatchOutcome, CommandError> {
        trace!("Awaiting {}", expectation.success);
        let start = self.timer.now();

        loop {
            let elapsed = self.elapsed(start)?;

            if elapsed >= timeout {
                debug!("Timeout while awaiting {}", expectation.success);
                return Ok(MatchOutcome::Timeout);
            }

            if self.read(LINE_SIZE, timeout - elapsed)? == 0 {
                continue;
            }

            let truncated = self.is_truncated();
            if self.continuation {
                trace!("Skipping remainder of truncated line");
                self.continuation = truncated;
                continue;
            }
            self.continuation = truncated;

            let content = self.line.strip_suffix(b"\n").unwrap_or(&self.line);
            match classify(content, expectation, truncated) {
                Verdict::Outcome(outcome) => {
                    match outcome {
                        MatchOutcome::Busy => warn!("Device busy"),
                        MatchOutcome::DeviceError => warn!("Device error"),
                        MatchOutcome::Truncated => warn!("Truncated response: {}", printable(content)),
                        _ => trace!("Matched: {}", printable(content)),
                    }

                    return Ok(outcome);
                }
                Verdict::Noise => trace!("Skipping: {}", printable(content)),
            }
        }
    }

    /// Reads up to `limit` bytes (limited by line size), stopping after a line feed. Returns the number of
    /// bytes read, which are accessible by [line()](Self::line).
    pub fn read_chunk(&mut self, limit: usize, timeout: TimerDurationU32<TIMER_HZ>) -> Result<usize, CommandError> {
        self.continuation = false;
        self.read(limit, timeout)
    }

    /// The remainder of the last truncated line is data, which is returned by the next read instead of
    /// being skipped.
    pub fn resume_truncated_line(&mut self) {
        self.continuation = false;
    }

    /// Last read line including the line terminator
    pub fn line(&self) -> &[u8] {
        &self.line
    }

    /// Field of the last read line
    pub fn field(&self, span: Span) -> &[u8] {
        &self.line[span.start..span.end]
    }

    /// Field of the last read line as string. None if the field is not valid UTF-8.
    pub fn field_str(&self, span: Span) -> Option<&str> {
        core::str::from_utf8(self.field(span)).ok()
    }

    /// Drops all pending input
    pub fn flush(&mut self) -> Result<(), CommandError> {
        self.continuation = false;
        self.transport.discard_available().map_err(|_| {
            error!("Transport flush failed");
            CommandError::TransportError
        })
    }

    /// Number of pending input bytes
    pub fn bytes_available(&mut self) -> Result<usize, CommandError> {
        self.transport.bytes_available().map_err(|_| CommandError::TransportError)
    }

    /// Current timer instant, used as start for [elapsed()](Self::elapsed)
    pub fn now(&mut self) -> TimerInstantU32<TIMER_HZ> {
        self.timer.now()
    }

    /// Duration passed since the given instant
    pub fn elapsed(&mut self, start: TimerInstantU32<TIMER_HZ>) -> Result<TimerDurationU32<TIMER_HZ>, CommandError> {
        self.timer
            .now()
            .checked_duration_since(start)
            .ok_or(CommandError::TimerError)
    }

    /// Blocks for the given duration
    pub fn delay(&mut self, duration: TimerDurationU32<TIMER_HZ>) -> Result<(), CommandError> {
        self.timer.start(duration).map_err(|_| CommandError::TimerError)?;
        nb::block!(self.timer.wait()).map_err(|_| CommandError::TimerError)
    }

    /// Reads a single line into the line buffer
    fn read(&mut self, limit: usize, timeout: TimerDurationU32<TIMER_HZ>) -> Result<usize, CommandError> {
        self.line.clear();
        // Resizing within capacity never fails
        let _ = self.line.resize(limit.min(LINE_SIZE), 0x0);

        let length = self.transport.read_line(&mut self.line, timeout).map_err(|_| {
            error!("Transport read failed");
            CommandError::TransportError
        })?;

        self.line.truncate(length);
        Ok(self.line.len())
    }

    /// True if the line buffer got filled without receiving a line feed
    fn is_truncated(&self) -> bool {
        self.line.is_full() && self.line.last() != Some(&b'\n')
    }
}
