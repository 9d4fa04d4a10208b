//! # WIFI access point client
//!
//! Joining and leaving a network, obtaining address information and general module handling
//! (restart, modes, firmware version) is supported.
//!
//! Joining waits until the access point assigned an IPv4 address. If no address is assigned in time,
//! the module gets disconnected again.
//!
//! ## Example
//!
//! ````
//! # use esp_at_session::example::{ExampleTimer, ExampleTransport};
//! # use esp_at_session::wifi::{Adapter, WifiAdapter};
//! #
//! let mut adapter: Adapter<_, _, 1_000_000, 256, 256> =
//!     Adapter::new(ExampleTransport::default(), ExampleTimer::default());
//!
//! // Joining the WIFI access point
//! let state = adapter.join("test_wifi", "secret").unwrap();
//! assert!(state.connected);
//! assert!(state.ip_assigned);
//!
//! let address = adapter.get_address().unwrap();
//! assert_eq!("10:fe:ed:05:ba:50", address.mac.unwrap().as_str());
//! assert_eq!("10.0.0.181", address.ipv4.unwrap().to_string());
//! ````
use crate::client::{AtClient, CommandError};
use crate::commands::{
    access_point_parameter, number_parameter, Command, ACCESS_POINT_CONNECT, ACCESS_POINT_DISCONNECT,
    ACCESS_POINT_LIST, ECHO_DISABLE, ECHO_ENABLE, LOCAL_ADDRESS, MULTIPLE_CONNECTIONS, RESTART, TEST, VERSION,
    WIFI_MODE,
};
use crate::config::{Timeouts, MAX_ACCESS_POINTS};
use crate::responses::{
    Expectation, MatchOutcome, ACCESS_POINT_ENTRY, FAIL, LOCAL_IP, LOCAL_MAC, MULTIPLE_CONNECTIONS as MODE_PREFIX,
    OK, READY, VERSION as VERSION_PREFIX, WIFI_CONNECTED, WIFI_DISCONNECT,
};
use crate::stack::{ConnectionState, Session};
use crate::transport::Transport;
use core::fmt::Debug;
use core::str::FromStr;
use core::net::Ipv4Addr;
use fugit::TimerDurationU32;
use fugit_timer::Timer;
use heapless::{String, Vec};

/// Max. SSID length in bytes
const MAX_SSID_LENGTH: usize = 32;

/// Max. password length in bytes
const MAX_PASSWORD_LENGTH: usize = 63;

/// Wifi network adapter trait
pub trait WifiAdapter {
    /// Error when joining a WIFI network
    type JoinError: Debug;

    /// Error when receiving local address information
    type AddressError: Debug;

    /// Connects to an WIFI access point and returns the connection state
    fn join(&mut self, ssid: &str, key: &str) -> Result<JoinState, Self::JoinError>;

    /// Returns the current WIFI connection status
    fn get_join_status(&mut self) -> JoinState;

    /// Returns local address information
    fn get_address(&mut self) -> Result<LocalAddress, Self::AddressError>;
}

/// Central client for network communication
///
/// LINE_SIZE: Max. length of a received line in bytes. Longer lines are truncated. Should cover the longest
/// expected response line, e.g. access point list entries.
///
/// BODY_SIZE: Max. number of payload bytes kept when receiving data, s. [HttpResponse](crate::http::HttpResponse).
pub struct Adapter<
    T: Transport<TIMER_HZ>,
    C: Timer<TIMER_HZ>,
    const TIMER_HZ: u32,
    const LINE_SIZE: usize,
    const BODY_SIZE: usize,
> {
    /// Command/response engine
    pub(crate) client: AtClient<T, C, TIMER_HZ, LINE_SIZE>,

    /// Tracked connection state
    pub(crate) session: Session,

    /// Command timeouts
    pub(crate) timeouts: Timeouts,
}

/// Possible errors when joining an access point
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JoinError {
    /// Given SSD is longer then the max. size of 32 chars
    InvalidSSDLength,

    /// Given password is longer then the max. size of 63 chars
    InvalidPasswordLength,

    /// Disconnecting from the current access point failed
    LeaveFailed(CommandError),

    /// Access point connect command failed
    ConnectError(CommandError),

    /// No IPv4 address was assigned in time
    AddressError(CommandError),
}

/// Errors when receiving local address information
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressErrors {
    /// CIFSR command failed
    CommandError(CommandError),

    /// Error while parsing addresses
    AddressParseError,
}

impl From<CommandError> for AddressErrors {
    fn from(error: CommandError) -> Self {
        Self::CommandError(error)
    }
}

/// Current WIFI connection state
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JoinState {
    /// True if connected to an WIFI access point
    pub connected: bool,

    /// True if an IP was assigned
    pub ip_assigned: bool,
}

/// Local IP and MAC addresses
#[derive(Default, Clone, Debug, PartialEq)]
pub struct LocalAddress {
    /// Local IPv4 address if assigned
    pub ipv4: Option<Ipv4Addr>,

    /// Local MAC address
    pub mac: Option<String<17>>,
}

/// WIFI operating mode
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WifiMode {
    Station = 1,
    SoftAp = 2,
    SoftApStation = 3,
}

/// Single or multiple parallel TCP connections
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionMode {
    Single = 0,
    Multiple = 1,
}

impl<T: Transport<TIMER_HZ>, C: Timer<TIMER_HZ>, const TIMER_HZ: u32, const LINE_SIZE: usize, const BODY_SIZE: usize>
    WifiAdapter for Adapter<T, C, TIMER_HZ, LINE_SIZE, BODY_SIZE>
{
    type JoinError = JoinError;
    type AddressError = AddressErrors;

    /// Connects to an WIFI access point and waits until an IPv4 address got assigned.
    ///
    /// Any current connection is closed first. On failure the module is disconnected again.
    fn join(&mut self, ssid: &str, key: &str) -> Result<JoinState, JoinError> {
        if ssid.len() > MAX_SSID_LENGTH {
            return Err(JoinError::InvalidSSDLength);
        }

        if key.len() > MAX_PASSWORD_LENGTH {
            return Err(JoinError::InvalidPasswordLength);
        }

        self.leave().map_err(JoinError::LeaveFailed)?;
        self.session.state = ConnectionState::Associating;

        match self.associate(ssid, key) {
            Ok(ipv4) => {
                debug!("Joined access point {}", ssid);
                self.session.state = ConnectionState::Associated;
                self.session.ipv4 = Some(ipv4);
                Ok(self.get_join_status())
            }
            Err(error) => {
                warn!("Joining access point failed, disconnecting");
                let _ = self.leave();
                self.session.reset();
                Err(error)
            }
        }
    }

    /// Returns the tracked WIFI connection status
    fn get_join_status(&mut self) -> JoinState {
        JoinState {
            connected: self.session.is_associated(),
            ip_assigned: self.session.ipv4.is_some(),
        }
    }

    /// Returns local address information. The IPv4 address is mandatory, the MAC address optional.
    fn get_address(&mut self) -> Result<LocalAddress, AddressErrors> {
        let timeout = self.timeout(self.timeouts.address);
        let ip_expectation = Expectation::new(LOCAL_IP).with_field(b'"', b'"');

        let span = self
            .client
            .execute(&Command::execute(LOCAL_ADDRESS), &ip_expectation, timeout)?
            .ok_or(AddressErrors::AddressParseError)?;
        let ipv4 = self
            .client
            .field_str(span)
            .and_then(|text| Ipv4Addr::from_str(text).ok())
            .ok_or(AddressErrors::AddressParseError)?;

        let mac_expectation = Expectation::new(LOCAL_MAC).with_field(b'"', b'"');
        let mac = match self.client.await_response(&mac_expectation, timeout)? {
            MatchOutcome::Success(Some(span)) => self.client.field_str(span).and_then(|text| String::try_from(text).ok()),
            _ => None,
        };

        if mac.is_some() {
            self.client.await_response(&Expectation::new(OK), timeout)?;
        }

        Ok(LocalAddress {
            ipv4: Some(ipv4),
            mac,
        })
    }
}

impl<T: Transport<TIMER_HZ>, C: Timer<TIMER_HZ>, const TIMER_HZ: u32, const LINE_SIZE: usize, const BODY_SIZE: usize>
    Adapter<T, C, TIMER_HZ, LINE_SIZE, BODY_SIZE>
{
    pub fn new(transport: T, timer: C) -> Self {
        Self {
            client: AtClient::new(transport, timer),
            session: Session::default(),
            timeouts: Timeouts::default(),
        }
    }

    /// Disconnects from the access point. Succeeds also if not connected.
    pub fn leave(&mut self) -> Result<(), CommandError> {
        let timeout = self.timeout(self.timeouts.leave);
        self.client
            .execute(&Command::execute(ACCESS_POINT_DISCONNECT), &Expectation::new(OK), timeout)?;
        self.session.reset();

        let notice_timeout = self.timeout(self.timeouts.leave_notice);
        if let Ok(outcome) = self.client.await_response(&Expectation::new(WIFI_DISCONNECT), notice_timeout) {
            trace!("Disconnect notice: {}", outcome.is_success());
        }

        Ok(())
    }

    /// Lists the SSIDs of the available access points, max. 8 entries. SSIDs exceeding 32 chars are skipped.
    pub fn list_access_points(&mut self) -> Result<Vec<String<MAX_SSID_LENGTH>, MAX_ACCESS_POINTS>, CommandError> {
        self.client.send_command(&Command::execute(ACCESS_POINT_LIST))?;

        let expectation = Expectation::new(ACCESS_POINT_ENTRY).with_field(b'"', b'"');
        let mut timeout = self.timeout(self.timeouts.list_first);
        let mut networks = Vec::new();

        while !networks.is_full() {
            match self.client.await_response(&expectation, timeout)? {
                MatchOutcome::Success(Some(span)) => {
                    if let Some(ssid) = self.client.field_str(span).and_then(|text| String::try_from(text).ok()) {
                        let _ = networks.push(ssid);
                    }
                }
                MatchOutcome::Success(None) | MatchOutcome::Truncated => {}
                MatchOutcome::Timeout => break,
                outcome => {
                    outcome.into_result()?;
                }
            }

            timeout = self.timeout(self.timeouts.list_next);
        }

        self.client.flush()?;
        Ok(networks)
    }

    /// Returns the AT firmware version, e.g. `1.2.0.0`
    pub fn version(&mut self) -> Result<String<32>, CommandError> {
        let timeout = self.timeout(self.timeouts.version);
        let expectation = Expectation::new(VERSION_PREFIX).with_field(b':', b'(');

        let span = self
            .client
            .execute(&Command::execute(VERSION), &expectation, timeout)?
            .ok_or(CommandError::Failure)?;
        let version = self
            .client
            .field_str(span)
            .ok_or(CommandError::Failure)
            .and_then(|text| String::try_from(text).map_err(|_| CommandError::Truncated))?;

        // SDK version and compile time lines follow
        self.client.await_response(&Expectation::new(OK), timeout)?;
        Ok(version)
    }

    /// Tests if the module responds
    pub fn ping(&mut self) -> Result<(), CommandError> {
        let timeout = self.timeout(self.timeouts.ping);
        self.client.execute(&Command::execute(TEST), &Expectation::new(OK), timeout)?;
        Ok(())
    }

    /// Enables or disables the echo of commands
    pub fn set_echo(&mut self, enabled: bool) -> Result<(), CommandError> {
        let token = if enabled { ECHO_ENABLE } else { ECHO_DISABLE };
        let timeout = self.timeout(self.timeouts.configuration);
        self.client.execute(&Command::execute(token), &Expectation::new(OK), timeout)?;
        Ok(())
    }

    /// Restarts the module and waits until it's ready again
    pub fn restart(&mut self) -> Result<(), CommandError> {
        self.client.flush()?;
        self.session.reset();

        let timeout = self.timeout(self.timeouts.restart);
        self.client.execute(&Command::execute(RESTART), &Expectation::new(READY), timeout)?;
        Ok(())
    }

    /// Resets the module by the reset line. The given function drives the line (true = high).
    pub fn hard_reset<F: FnMut(bool)>(&mut self, mut set_reset_line: F) -> Result<(), CommandError> {
        let duration = self.timeout(self.timeouts.hard_reset);
        self.session.reset();

        set_reset_line(false);
        self.client.delay(duration)?;
        set_reset_line(true);
        self.client.delay(duration)?;

        self.client.flush()
    }

    /// Sets the WIFI mode. Not stored in flash.
    pub fn set_wifi_mode(&mut self, mode: WifiMode) -> Result<(), CommandError> {
        let parameter = number_parameter(mode as usize).map_err(|_| CommandError::CommandTooLong)?;
        let timeout = self.timeout(self.timeouts.configuration);

        self.client
            .execute(&Command::set(WIFI_MODE, &parameter), &Expectation::new(OK), timeout)?;
        Ok(())
    }

    /// Sets the connection mode. The command is just sent if the current mode differs.
    pub fn set_connection_mode(&mut self, mode: ConnectionMode) -> Result<(), CommandError> {
        let timeout = self.timeout(self.timeouts.connection_mode);

        self.client.execute(
            &Command::query(MULTIPLE_CONNECTIONS),
            &Expectation::new(MODE_PREFIX),
            timeout,
        )?;
        let current = self.client.line().get(MODE_PREFIX.len()).copied();
        self.client.await_response(&Expectation::new(OK), timeout)?.into_result()?;

        if current == Some(b'0' + mode as u8) {
            trace!("Connection mode already set");
            return Ok(());
        }

        let parameter = number_parameter(mode as usize).map_err(|_| CommandError::CommandTooLong)?;
        self.client
            .execute(&Command::set(MULTIPLE_CONNECTIONS, &parameter), &Expectation::new(OK), timeout)?;
        Ok(())
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.session.state
    }

    /// Replaces all command timeouts
    pub fn set_timeouts(&mut self, timeouts: Timeouts) {
        self.timeouts = timeouts;
    }

    /// Current command timeouts
    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Sets the timeout for the confirmation of sent TCP data in ms
    pub fn set_send_timeout_ms(&mut self, timeout: u32) {
        self.timeouts.send = timeout;
    }

    /// Converts a timeout in ms to timer ticks
    pub(crate) fn timeout(&self, milliseconds: u32) -> TimerDurationU32<TIMER_HZ> {
        TimerDurationU32::millis(milliseconds)
    }

    /// Sends the access point connect command and waits for the IPv4 address
    fn associate(&mut self, ssid: &str, key: &str) -> Result<Ipv4Addr, JoinError> {
        let parameter =
            access_point_parameter(ssid, key).map_err(|_| JoinError::ConnectError(CommandError::CommandTooLong))?;
        let command = Command::set(ACCESS_POINT_CONNECT, &parameter);

        let attach_timeout = self.timeout(self.timeouts.join_attach);
        let expectation = Expectation::new(WIFI_CONNECTED).or_failure(FAIL);
        self.client
            .execute(&command, &expectation, attach_timeout)
            .map_err(JoinError::ConnectError)?;

        let confirm_timeout = self.timeout(self.timeouts.join_confirm);
        self.client
            .await_response(&Expectation::new(OK), confirm_timeout)
            .and_then(MatchOutcome::into_result)
            .map_err(JoinError::ConnectError)?;

        self.client.flush().map_err(JoinError::ConnectError)?;
        self.await_ipv4()
    }

    /// Polls the local address until an IPv4 address is assigned
    fn await_ipv4(&mut self) -> Result<Ipv4Addr, JoinError> {
        let budget = self.timeout(self.timeouts.join_ip);
        let interval = self.timeout(self.timeouts.join_ip_poll);
        let start = self.client.now();

        loop {
            match self.get_address() {
                Ok(LocalAddress { ipv4: Some(ipv4), .. }) if !ipv4.is_unspecified() => return Ok(ipv4),
                Err(AddressErrors::CommandError(error @ (CommandError::TransportError | CommandError::TimerError))) => {
                    return Err(JoinError::AddressError(error));
                }
                _ => trace!("No IPv4 address assigned yet"),
            }

            if self.client.elapsed(start).map_err(JoinError::AddressError)? >= budget {
                warn!("No IPv4 address assigned in time");
                return Err(JoinError::AddressError(CommandError::Timeout));
            }

            self.client.delay(interval).map_err(JoinError::AddressError)?;
        }
    }
}
