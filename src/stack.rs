//! # TCP client session
//!
//! A single TCP connection is supported at the same time. The connection requires an associated access
//! point, s. [WifiAdapter](crate::wifi::WifiAdapter).
//!
//! ## Example
//!
//! ````
//! # use core::str::FromStr;
//! # use core::net::SocketAddr;
//! # use esp_at_session::example::{ExampleTimer, ExampleTransport};
//! # use esp_at_session::stack::ConnectionState;
//! # use esp_at_session::wifi::{Adapter, WifiAdapter};
//! #
//! let mut adapter: Adapter<_, _, 1_000_000, 256, 256> =
//!     Adapter::new(ExampleTransport::default(), ExampleTimer::default());
//! adapter.join("test_wifi", "secret").unwrap();
//!
//! // Creating a TCP connection
//! adapter.connect_addr(SocketAddr::from_str("10.0.0.1:80").unwrap()).unwrap();
//! assert_eq!(ConnectionState::TcpOpen, adapter.state());
//!
//! // Sending some data
//! adapter.send(b"GET / HTTP/1.1").unwrap();
//!
//! // Closing the connection
//! adapter.close_tcp().unwrap();
//! assert_eq!(ConnectionState::Associated, adapter.state());
//! ````
use crate::client::CommandError;
use crate::commands::{
    connect_parameter, number_parameter, Command, CLOSE, CONNECT, LINE_TERMINATOR, TRANSMISSION_PREPARE,
};
use crate::responses::{
    Expectation, MatchOutcome, ALREADY_CONNECTED, CLOSED, CONNECTED, ERROR, OK, SEND_FAIL, SEND_OK, SEND_READY,
};
use crate::transport::Transport;
use crate::wifi::Adapter;
use core::fmt::Write;
use core::net::{Ipv4Addr, SocketAddr};
use fugit_timer::Timer;
use heapless::String;

/// Blank line sequence terminating every payload
pub(crate) const PAYLOAD_TERMINATOR: &str = "\r\n\r\n";

/// Connection state of the module
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    /// Not connected to any access point
    #[default]
    Disconnected,
    /// Joining an access point
    Associating,
    /// Connected to an access point, no TCP connection open
    Associated,
    /// TCP connection is being established
    TcpOpening,
    /// TCP connection is fully open
    TcpOpen,
    /// TCP connection is being closed
    TcpClosing,
}

/// Tracked state of the module. Initially fully disconnected.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Session {
    /// Current connection state
    pub state: ConnectionState,

    /// IPv4 address assigned when joining
    pub ipv4: Option<Ipv4Addr>,
}

impl Session {
    /// True if connected to an access point, regardless of the TCP state
    pub fn is_associated(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Associated
                | ConnectionState::TcpOpening
                | ConnectionState::TcpOpen
                | ConnectionState::TcpClosing
        )
    }

    pub fn is_tcp_open(&self) -> bool {
        self.state == ConnectionState::TcpOpen
    }

    /// Falls back to fully disconnected
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Network related errors
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Opening a TCP connection requires an associated access point
    NotAssociated,

    /// Unable to send data if no TCP connection is open
    SocketUnconnected,

    /// TCP connect command failed
    ConnectError(CommandError),

    /// Preparing the transmission failed (CIPSEND command)
    TransmissionStartFailed(CommandError),

    /// Transmission of data failed
    SendFailed(CommandError),

    /// TCP close command failed
    CloseError(CommandError),

    /// Receiving data failed
    ReceiveFailed(CommandError),

    /// Response status differs from 200. Connection got closed.
    UnexpectedStatus(Option<u16>),

    /// Response was not received completely, contains the number of missing bytes. Connection got closed.
    IncompleteResponse(usize),

    /// Upstream timer error
    TimerError,

    /// Upstream transport error
    TransportError,
}

impl<T: Transport<TIMER_HZ>, C: Timer<TIMER_HZ>, const TIMER_HZ: u32, const LINE_SIZE: usize, const BODY_SIZE: usize>
    Adapter<T, C, TIMER_HZ, LINE_SIZE, BODY_SIZE>
{
    /// Opens a TCP connection to the given host (name or IP) and port.
    ///
    /// An already established connection is accepted as success, once the trailing ERROR of that reply was
    /// consumed. On failure the connection gets closed.
    pub fn open_tcp(&mut self, host: &str, port: u16) -> Result<(), Error> {
        if !self.session.is_associated() {
            return Err(Error::NotAssociated);
        }

        self.client.flush().map_err(Error::ConnectError)?;
        self.session.state = ConnectionState::TcpOpening;

        match self.establish(host, port) {
            Ok(_) => {
                debug!("TCP connection to {}:{} open", host, port);
                self.session.state = ConnectionState::TcpOpen;
                Ok(())
            }
            Err(error) => {
                warn!("Opening TCP connection failed, closing");
                let _ = self.close_tcp();
                Err(Error::ConnectError(error))
            }
        }
    }

    /// Opens a TCP connection to the given IPv4/IPv6 address
    pub fn connect_addr(&mut self, remote: SocketAddr) -> Result<(), Error> {
        let mut host: String<39> = String::new();
        write!(host, "{}", remote.ip()).map_err(|_| Error::ConnectError(CommandError::CommandTooLong))?;

        self.open_tcp(&host, remote.port())
    }

    /// Sends the given data followed by a blank line. Requires an open TCP connection.
    ///
    /// On failure the connection gets closed.
    pub fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        if !self.session.is_tcp_open() {
            return Err(Error::SocketUnconnected);
        }

        let result = self.transmit(data);
        if result.is_err() {
            warn!("Transmission failed, closing TCP connection");
            self.teardown();
        }

        result
    }

    /// Closes the TCP connection. Closing an already closed connection succeeds.
    pub fn close_tcp(&mut self) -> Result<(), Error> {
        let associated = self.session.is_associated();
        self.session.state = ConnectionState::TcpClosing;

        let result = self.shutdown();
        self.session.state = if associated {
            ConnectionState::Associated
        } else {
            ConnectionState::Disconnected
        };

        result.map_err(Error::CloseError)
    }

    /// Returns the module to command mode and closes the connection
    pub(crate) fn teardown(&mut self) {
        let _ = self.client.write(LINE_TERMINATOR.as_bytes());
        let _ = self.client.write(LINE_TERMINATOR.as_bytes());
        let _ = self.ping();
        let _ = self.close_tcp();
    }

    /// Sends the connect command and awaits the confirmation
    fn establish(&mut self, host: &str, port: u16) -> Result<(), CommandError> {
        let parameter = connect_parameter(host, port).map_err(|_| CommandError::CommandTooLong)?;
        let timeout = self.timeout(self.timeouts.connect);
        let expectation = Expectation::new(CONNECTED).or_failure(ALREADY_CONNECTED);

        self.client.send_command(&Command::set(CONNECT, &parameter))?;
        let confirm_timeout = self.timeout(self.timeouts.connect_confirm);
        match self.client.await_response(&expectation, timeout)? {
            MatchOutcome::Success(_) => {
                self.client.await_response(&Expectation::new(OK), confirm_timeout)?.into_result()?;
            }
            // Connection was already established, the module still terminates the reply with ERROR
            MatchOutcome::Failure => {
                debug!("TCP connection already open");
                match self.client.await_response(&Expectation::new(ERROR), confirm_timeout)? {
                    MatchOutcome::Success(_) | MatchOutcome::Timeout => {}
                    outcome => {
                        outcome.into_result()?;
                    }
                }
            }
            outcome => {
                outcome.into_result()?;
            }
        }

        Ok(())
    }

    /// Prepares the transmission, writes the data and awaits the confirmation
    fn transmit(&mut self, data: &[u8]) -> Result<(), Error> {
        let length = data.len() + PAYLOAD_TERMINATOR.len();
        let parameter =
            number_parameter(length).map_err(|_| Error::TransmissionStartFailed(CommandError::CommandTooLong))?;

        let prompt_timeout = self.timeout(self.timeouts.send_prompt);
        self.client
            .execute(
                &Command::set(TRANSMISSION_PREPARE, &parameter),
                &Expectation::new(SEND_READY),
                prompt_timeout,
            )
            .map_err(Error::TransmissionStartFailed)?;

        self.client.write(data).map_err(Error::SendFailed)?;
        self.client.write(PAYLOAD_TERMINATOR.as_bytes()).map_err(Error::SendFailed)?;

        let send_timeout = self.timeout(self.timeouts.send);
        self.client
            .await_response(&Expectation::new(SEND_OK).or_failure(SEND_FAIL), send_timeout)
            .and_then(MatchOutcome::into_result)
            .map_err(Error::SendFailed)?;

        trace!("Sent {} bytes", length);
        Ok(())
    }

    /// Sends the close command and awaits the confirmation
    fn shutdown(&mut self) -> Result<(), CommandError> {
        let timeout = self.timeout(self.timeouts.close);
        let expectation = Expectation::new(CLOSED).or_failure(ERROR);

        self.client.send_command(&Command::execute(CLOSE))?;
        match self.client.await_response(&expectation, timeout)? {
            MatchOutcome::Success(_) => {
                self.client.await_response(&Expectation::new(OK), timeout)?.into_result()?;
            }
            // No connection open
            MatchOutcome::Failure => trace!("TCP connection already closed"),
            outcome => {
                outcome.into_result()?;
            }
        }

        Ok(())
    }
}
