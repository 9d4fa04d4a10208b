//! # HTTP response framing
//!
//! Data received on the open TCP connection is announced by the module with a `+IPD,<length>:` header
//! followed by the payload. For HTTP responses the payload starts with the status line, so the status code
//! is extracted from the header line. The payload is accumulated until the announced length is received,
//! the body deadline expired or the max. number of reads was reached.
//!
//! ## Example
//!
//! ````
//! # use esp_at_session::example::{ExampleTimer, ExampleTransport};
//! # use esp_at_session::wifi::{Adapter, WifiAdapter};
//! #
//! let mut adapter: Adapter<_, _, 1_000_000, 256, 256> =
//!     Adapter::new(ExampleTransport::default(), ExampleTimer::default());
//! adapter.join("test_wifi", "secret").unwrap();
//! adapter.open_tcp("10.0.0.1", 80).unwrap();
//!
//! let response = adapter.request(b"GET / HTTP/1.1").unwrap();
//! assert_eq!(Some(200), response.status);
//! assert_eq!(Some(4), response.content_length);
//! assert!(response.body.ends_with(b"nice"));
//! ````
use crate::client::CommandError;
use crate::config::MAX_BODY_READS;
use crate::responses::{Expectation, MatchOutcome, DATA_ARRIVAL};
use crate::stack::Error;
use crate::transport::Transport;
use crate::wifi::Adapter;
use fugit_timer::Timer;
use heapless::Vec;

/// Header line declaring the body length
const CONTENT_LENGTH: &[u8] = b"Content-Length:";

/// Payload received on the TCP connection
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse<const BODY_SIZE: usize> {
    /// Status code of the status line. None if no data was received or no status was found.
    pub status: Option<u16>,

    /// Payload length announced by the `+IPD` header
    pub announced_length: usize,

    /// Number of payload bytes received so far, including the ones not fitting in the body buffer
    pub received_length: usize,

    /// Value of the `Content-Length` header if received
    pub content_length: Option<usize>,

    /// Received payload, starting with the status line
    pub body: Vec<u8, BODY_SIZE>,

    /// True if the payload exceeded the body buffer
    pub truncated: bool,
}

impl<const BODY_SIZE: usize> HttpResponse<BODY_SIZE> {
    pub(crate) fn new(announced_length: usize, status: Option<u16>) -> Self {
        Self {
            status,
            announced_length,
            received_length: 0,
            content_length: None,
            body: Vec::new(),
            truncated: false,
        }
    }

    /// Empty response, returned if no data arrived in time
    pub fn no_data() -> Self {
        Self::new(0, None)
    }

    /// True if any data was announced
    pub fn has_data(&self) -> bool {
        self.announced_length > 0
    }

    /// Number of announced bytes not received yet
    pub fn remaining(&self) -> usize {
        self.announced_length.saturating_sub(self.received_length)
    }

    /// Appends a received chunk, which is scanned for the content length header
    pub(crate) fn append(&mut self, chunk: &[u8]) {
        self.received_length += chunk.len();

        if let Some(length) = parse_content_length(chunk) {
            self.content_length = Some(length);
        }

        let space = BODY_SIZE - self.body.len();
        if chunk.len() > space {
            self.truncated = true;
        }

        // Never exceeds the capacity
        let _ = self.body.extend_from_slice(&chunk[..chunk.len().min(space)]);
    }
}

/// Parsed `+IPD,<length>:<payload>` header line
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct DataHeader {
    /// Announced payload length
    pub length: usize,

    /// Status code found in the status line
    pub status: Option<u16>,

    /// Offset of the first payload byte within the line
    pub payload_start: usize,
}

impl DataHeader {
    /// Number of payload bytes contained in the given header line
    pub fn consumed(&self, line: &[u8]) -> usize {
        line.len().saturating_sub(self.payload_start)
    }
}

/// Parses the header line. The announced length is the number following the last comma before the colon,
/// so headers of multiple connection mode (`+IPD,<id>,<length>:`) are accepted too.
pub(crate) fn parse_header(line: &[u8]) -> Option<DataHeader> {
    let rest = line.strip_prefix(DATA_ARRIVAL.as_bytes())?;
    let colon = rest.iter().position(|byte| *byte == b':')?;

    let prefix = &rest[..colon];
    let digits = match prefix.iter().rposition(|byte| *byte == b',') {
        Some(comma) => &prefix[comma + 1..],
        None => prefix,
    };
    let length = core::str::from_utf8(digits).ok()?.trim().parse().ok()?;

    let payload_start = DATA_ARRIVAL.len() + colon + 1;
    Some(DataHeader {
        length,
        status: parse_status(&line[payload_start..]),
        payload_start,
    })
}

/// Status code is the last numeric token of the status line
fn parse_status(payload: &[u8]) -> Option<u16> {
    let end = payload
        .iter()
        .position(|byte| *byte == b'\r' || *byte == b'\n')
        .unwrap_or(payload.len());
    let status_line = core::str::from_utf8(&payload[..end]).ok()?;

    status_line
        .split(' ')
        .filter_map(|token| token.parse::<u16>().ok())
        .last()
}

/// Parses a `Content-Length: <n>` line
fn parse_content_length(chunk: &[u8]) -> Option<usize> {
    let value = chunk.strip_prefix(CONTENT_LENGTH)?;
    core::str::from_utf8(value).ok()?.trim().parse().ok()
}

/// Maps errors of the underlying reads
fn receive_error(error: CommandError) -> Error {
    match error {
        CommandError::TransportError => Error::TransportError,
        CommandError::TimerError => Error::TimerError,
        other => Error::ReceiveFailed(other),
    }
}

impl<T: Transport<TIMER_HZ>, C: Timer<TIMER_HZ>, const TIMER_HZ: u32, const LINE_SIZE: usize, const BODY_SIZE: usize>
    Adapter<T, C, TIMER_HZ, LINE_SIZE, BODY_SIZE>
{
    /// Receives data on the open TCP connection.
    ///
    /// If no data arrives within the data arrival timeout, an empty response is returned. The payload is read
    /// for at most `max_wait_ms` after the header arrived.
    pub fn receive(&mut self, max_wait_ms: u32) -> Result<HttpResponse<BODY_SIZE>, Error> {
        let arrival_timeout = self.timeout(self.timeouts.data_arrival);
        let expectation = Expectation::new(DATA_ARRIVAL);

        match self.client.await_response(&expectation, arrival_timeout).map_err(receive_error)? {
            MatchOutcome::Timeout => {
                debug!("No data received");
                return Ok(HttpResponse::no_data());
            }
            // Remainder of the header line is payload
            MatchOutcome::Truncated => self.client.resume_truncated_line(),
            outcome => {
                outcome.into_result().map_err(Error::ReceiveFailed)?;
            }
        }

        let line = self.client.line();
        let header = parse_header(line).ok_or(Error::ReceiveFailed(CommandError::Failure))?;
        let mut response = HttpResponse::new(header.length, header.status);
        response.append(&line[header.payload_start..]);
        debug!(
            "Received data header, length = {}, consumed = {}",
            header.length,
            header.consumed(line)
        );

        let deadline = self.timeout(max_wait_ms);
        let start = self.client.now();
        let mut reads = 0;

        while response.remaining() > 0 {
            if reads >= MAX_BODY_READS {
                warn!("Max. body reads reached, {} bytes missing", response.remaining());
                break;
            }

            let elapsed = self.client.elapsed(start).map_err(receive_error)?;
            if elapsed >= deadline {
                warn!("Body deadline expired, {} bytes missing", response.remaining());
                break;
            }

            reads += 1;
            let limit = response.remaining().min(LINE_SIZE);
            if self.client.read_chunk(limit, deadline - elapsed).map_err(receive_error)? > 0 {
                response.append(self.client.line());
            }
        }

        if response.truncated {
            warn!("Body exceeded buffer, {} bytes dropped", response.received_length - response.body.len());
        }

        Ok(response)
    }

    /// Sends the request and receives the response.
    ///
    /// The connection gets closed if receiving failed, the status differs from 200 or the response was not
    /// received completely.
    pub fn request(&mut self, data: &[u8]) -> Result<HttpResponse<BODY_SIZE>, Error> {
        self.send(data)?;

        let result = self.receive(self.timeouts.body).and_then(|response| {
            if response.status != Some(200) {
                return Err(Error::UnexpectedStatus(response.status));
            }

            match response.remaining() {
                0 => Ok(response),
                missing => Err(Error::IncompleteResponse(missing)),
            }
        });

        if result.is_err() {
            warn!("Request failed, closing TCP connection");
            self.teardown();
        }

        result
    }
}
