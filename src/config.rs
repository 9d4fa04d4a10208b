//! Timeouts of the individual commands
//!
//! The defaults are matched to the response times of ESP8266 modules running the official AT firmware.

/// Command timeouts in milliseconds
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timeouts {
    /// AT test command
    pub ping: u32,

    /// `ready` after soft restart
    pub restart: u32,

    /// Low and high phase of the hard reset
    pub hard_reset: u32,

    /// Simple configuration commands, e.g. echo or wifi mode
    pub configuration: u32,

    /// Query and set of the connection mode
    pub connection_mode: u32,

    /// Firmware version
    pub version: u32,

    /// `WIFI CONNECTED` after the access point connect command
    pub join_attach: u32,

    /// `OK` following `WIFI CONNECTED`
    pub join_confirm: u32,

    /// Total time waiting for an IPv4 address after joining
    pub join_ip: u32,

    /// Pause between two address queries while waiting for an IPv4 address
    pub join_ip_poll: u32,

    /// `OK` of the access point disconnect command
    pub leave: u32,

    /// Optional `WIFI DISCONNECT` following the disconnect confirmation
    pub leave_notice: u32,

    /// First entry of the access point list
    pub list_first: u32,

    /// Every further entry of the access point list
    pub list_next: u32,

    /// Local address lines
    pub address: u32,

    /// `CONNECT` after the TCP connect command
    pub connect: u32,

    /// `OK` following `CONNECT`
    pub connect_confirm: u32,

    /// `CLOSED` and `OK` of the close command
    pub close: u32,

    /// `>` prompt of the transmission command
    pub send_prompt: u32,

    /// `SEND OK` after writing the payload
    pub send: u32,

    /// `+IPD` header of received data
    pub data_arrival: u32,

    /// Total time for receiving the announced data after the `+IPD` header
    pub body: u32,
}

/// Max. number of access points returned by the list command
pub const MAX_ACCESS_POINTS: usize = 8;

/// Max. number of read calls for receiving the announced data
pub const MAX_BODY_READS: usize = 64;

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            ping: 3_000,
            restart: 3_000,
            hard_reset: 1_000,
            configuration: 1_000,
            connection_mode: 3_000,
            version: 3_000,
            join_attach: 4_000,
            join_confirm: 3_000,
            join_ip: 5_000,
            join_ip_poll: 500,
            leave: 3_000,
            leave_notice: 1_000,
            list_first: 5_000,
            list_next: 500,
            address: 1_000,
            connect: 3_000,
            connect_confirm: 1_000,
            close: 1_000,
            send_prompt: 1_000,
            send: 5_000,
            data_arrival: 1_000,
            body: 5_000,
        }
    }
}
