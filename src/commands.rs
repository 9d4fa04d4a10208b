use heapless::String;

/// Line terminator of every command and response
pub const LINE_TERMINATOR: &str = "\r\n";

/// Command prefix
const PREFIX: &str = "AT";

/// Tests the AT startup
pub const TEST: &str = "";
/// Restarts the module
pub const RESTART: &str = "+RST";
/// Firmware version information
pub const VERSION: &str = "+GMR";
/// Disables the command echo
pub const ECHO_DISABLE: &str = "E0";
/// Enables the command echo
pub const ECHO_ENABLE: &str = "E1";
/// Wifi mode, not stored in flash
pub const WIFI_MODE: &str = "+CWMODE_CUR";
/// Connects to an access point, not stored in flash
pub const ACCESS_POINT_CONNECT: &str = "+CWJAP_CUR";
/// Lists available access points
pub const ACCESS_POINT_LIST: &str = "+CWLAP";
/// Disconnects from the access point
pub const ACCESS_POINT_DISCONNECT: &str = "+CWQAP";
/// Obtains the local IP and MAC address
pub const LOCAL_ADDRESS: &str = "+CIFSR";
/// Single/multiple connection mode
pub const MULTIPLE_CONNECTIONS: &str = "+CIPMUX";
/// Establishes a TCP connection
pub const CONNECT: &str = "+CIPSTART";
/// Prepares the data transmission
pub const TRANSMISSION_PREPARE: &str = "+CIPSEND";
/// Closes the TCP connection
pub const CLOSE: &str = "+CIPCLOSE";

/// Connection type used when opening a connection
pub const CONNECTION_TYPE_TCP: &str = "TCP";

/// How the command is accessed
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccessKind {
    /// Queries the current value, e.g. `AT+CIPMUX?`
    Query,
    /// Sets parameters, e.g. `AT+CWMODE_CUR=1`
    Set,
    /// Executes the command, e.g. `AT+CWQAP`
    Execute,
}

/// Command buffer was too small for the formatted command
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CapacityError;

/// Single AT command
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Command<'a> {
    /// Command token following the "AT" prefix, e.g. `+CWJAP_CUR`
    pub token: &'a str,

    /// Access kind
    pub kind: AccessKind,

    /// Parameter text of set commands. Must not contain the line terminator.
    pub parameter: Option<&'a str>,
}

impl<'a> Command<'a> {
    pub const fn execute(token: &'a str) -> Self {
        Self {
            token,
            kind: AccessKind::Execute,
            parameter: None,
        }
    }

    pub const fn query(token: &'a str) -> Self {
        Self {
            token,
            kind: AccessKind::Query,
            parameter: None,
        }
    }

    pub const fn set(token: &'a str, parameter: &'a str) -> Self {
        Self {
            token,
            kind: AccessKind::Set,
            parameter: Some(parameter),
        }
    }

    /// Formats the command to its wire representation including the line terminator.
    ///
    /// A set command without parameter is formatted like an execute command.
    pub fn format<const LEN: usize>(&self) -> Result<String<LEN>, CapacityError> {
        let mut buffer = String::new();
        self.write(&mut buffer)?;
        Ok(buffer)
    }

    /// Appends the wire representation to the given buffer
    pub fn write<const LEN: usize>(&self, buffer: &mut String<LEN>) -> Result<(), CapacityError> {
        buffer.push_str(PREFIX).map_err(|_| CapacityError)?;
        buffer.push_str(self.token).map_err(|_| CapacityError)?;

        match (self.kind, self.parameter) {
            (AccessKind::Query, _) => buffer.push('?').map_err(|_| CapacityError)?,
            (AccessKind::Set, Some(parameter)) => {
                buffer.push('=').map_err(|_| CapacityError)?;
                buffer.push_str(parameter).map_err(|_| CapacityError)?;
            }
            (AccessKind::Set, None) | (AccessKind::Execute, _) => {}
        }

        buffer.push_str(LINE_TERMINATOR).map_err(|_| CapacityError)
    }

    /// Parses a formatted command line. The line terminator is optional.
    ///
    /// Commands without `=` or trailing `?` are parsed as [AccessKind::Execute].
    pub fn parse(line: &'a str) -> Option<Self> {
        let line = line.strip_suffix(LINE_TERMINATOR).unwrap_or(line);
        let body = line.strip_prefix(PREFIX)?;

        if let Some((token, parameter)) = body.split_once('=') {
            return Some(Self::set(token, parameter));
        }

        if let Some(token) = body.strip_suffix('?') {
            return Some(Self::query(token));
        }

        Some(Self::execute(body))
    }
}

/// Parameter text of a command
pub(crate) type Parameter = String<128>;

/// Appends the given text in quotes
pub(crate) fn push_quoted(buffer: &mut Parameter, text: &str) -> Result<(), CapacityError> {
    buffer.push('"').map_err(|_| CapacityError)?;
    buffer.push_str(text).map_err(|_| CapacityError)?;
    buffer.push('"').map_err(|_| CapacityError)
}

/// Appends the decimal representation of the given number
pub(crate) fn push_number(buffer: &mut Parameter, number: usize) -> Result<(), CapacityError> {
    use numtoa::NumToA;

    let mut digits = [0x0; 20];
    buffer
        .push_str(number.numtoa_str(10, &mut digits))
        .map_err(|_| CapacityError)
}

/// Parameter of the access point connect command: `"<ssid>"[,"<password>"]`
pub(crate) fn access_point_parameter(ssid: &str, password: &str) -> Result<Parameter, CapacityError> {
    let mut parameter = Parameter::new();
    push_quoted(&mut parameter, ssid)?;

    if !password.is_empty() {
        parameter.push(',').map_err(|_| CapacityError)?;
        push_quoted(&mut parameter, password)?;
    }

    Ok(parameter)
}

/// Parameter of the connect command: `"TCP","<host>",<port>`
pub(crate) fn connect_parameter(host: &str, port: u16) -> Result<Parameter, CapacityError> {
    let mut parameter = Parameter::new();
    push_quoted(&mut parameter, CONNECTION_TYPE_TCP)?;
    parameter.push(',').map_err(|_| CapacityError)?;
    push_quoted(&mut parameter, host)?;
    parameter.push(',').map_err(|_| CapacityError)?;
    push_number(&mut parameter, port as usize)?;
    Ok(parameter)
}

/// Parameter consisting of a single number, e.g. the byte count of the transmission command
pub(crate) fn number_parameter(number: usize) -> Result<Parameter, CapacityError> {
    let mut parameter = Parameter::new();
    push_number(&mut parameter, number)?;
    Ok(parameter)
}
