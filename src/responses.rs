/// Generic success of a command
pub const OK: &str = "OK";
/// Module is busy processing the previous command
pub const BUSY: &str = "busy";
/// Generic command error
pub const ERROR: &str = "ERROR";
/// Module is ready after (re)start
pub const READY: &str = "ready";
/// Explicit failure of the access point connect command
pub const FAIL: &str = "FAIL";
/// Joined an access point
pub const WIFI_CONNECTED: &str = "WIFI CONNECTED";
/// Disconnected from the access point
pub const WIFI_DISCONNECT: &str = "WIFI DISCONNECT";
/// TCP connection established
pub const CONNECTED: &str = "CONNECT";
/// TCP connection was already established
pub const ALREADY_CONNECTED: &str = "ALREADY CONNECT";
/// TCP connection closed
pub const CLOSED: &str = "CLOSED";
/// Module waits for the payload of the transmission command
pub const SEND_READY: &str = ">";
/// Payload was sent
pub const SEND_OK: &str = "SEND OK";
/// Payload transmission failed
pub const SEND_FAIL: &str = "SEND FAIL";
/// Received socket data
pub const DATA_ARRIVAL: &str = "+IPD";
/// Access point entry of the list command
pub const ACCESS_POINT_ENTRY: &str = "+CWLAP:";
/// Local IPv4 address line
pub const LOCAL_IP: &str = "+CIFSR:STAIP,";
/// Local MAC address line
pub const LOCAL_MAC: &str = "+CIFSR:STAMAC,";
/// Firmware version line
pub const VERSION: &str = "AT version";
/// Current connection mode
pub const MULTIPLE_CONNECTIONS: &str = "+CIPMUX:";

/// Expected response of a command
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Expectation<'a> {
    /// Line prefix signaling success
    pub success: &'a str,

    /// Line prefix signaling a command specific failure
    pub failure: Option<&'a str>,

    /// Delimiters of the field to extract from the success line
    pub delimiters: Option<(u8, u8)>,
}

impl<'a> Expectation<'a> {
    pub const fn new(success: &'a str) -> Self {
        Self {
            success,
            failure: None,
            delimiters: None,
        }
    }

    /// Lines starting with the given prefix result in [MatchOutcome::Failure]
    pub const fn or_failure(mut self, failure: &'a str) -> Self {
        self.failure = Some(failure);
        self
    }

    /// The success line just matches if it contains a field of min. two characters between the given delimiters
    pub const fn with_field(mut self, open: u8, close: u8) -> Self {
        self.delimiters = Some((open, close));
        self
    }
}

/// Position of an extracted field within the line buffer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Result of awaiting a response. Exactly one outcome per call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MatchOutcome {
    /// Success line received, containing the extracted field if delimiters were given
    Success(Option<Span>),
    /// Command specific failure line received
    Failure,
    /// Module is busy
    Busy,
    /// Generic error line received
    DeviceError,
    /// No matching line received in time
    Timeout,
    /// Success line received, but the line exceeded the line buffer
    Truncated,
}

impl MatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Classification of a single line
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// Final answer
    Outcome(MatchOutcome),
    /// Unrelated line, keep on waiting
    Noise,
}

/// Classifies a single line (without line feed) against the expected response
pub(crate) fn classify(line: &[u8], expectation: &Expectation, truncated: bool) -> Verdict {
    if line.starts_with(expectation.success.as_bytes()) {
        if truncated {
            return Verdict::Outcome(MatchOutcome::Truncated);
        }

        return match expectation.delimiters {
            None => Verdict::Outcome(MatchOutcome::Success(None)),
            Some((open, close)) => match find_field(line, open, close) {
                Some(span) => Verdict::Outcome(MatchOutcome::Success(Some(span))),
                None => Verdict::Noise,
            },
        };
    }

    if let Some(failure) = expectation.failure {
        if line.starts_with(failure.as_bytes()) {
            return Verdict::Outcome(MatchOutcome::Failure);
        }
    }

    if line.starts_with(BUSY.as_bytes()) {
        return Verdict::Outcome(MatchOutcome::Busy);
    }

    if line.starts_with(ERROR.as_bytes()) {
        return Verdict::Outcome(MatchOutcome::DeviceError);
    }

    Verdict::Noise
}

/// Locates the field between the first open delimiter and the next close delimiter.
/// Fields shorter then two characters are not accepted.
pub(crate) fn find_field(line: &[u8], open: u8, close: u8) -> Option<Span> {
    let start = line.iter().position(|byte| *byte == open)? + 1;
    let length = line[start..].iter().position(|byte| *byte == close)?;

    if length < 2 {
        return None;
    }

    Some(Span {
        start,
        end: start + length,
    })
}
