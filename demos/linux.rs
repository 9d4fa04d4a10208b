//! Example that runs on Linux using a serial-USB-adapter.
use std::{
    env, io,
    io::{Read, Write},
    time::{Duration, Instant},
};

use esp_at_session::{
    transport::Transport,
    wifi::{Adapter, ConnectionMode, WifiAdapter, WifiMode},
};
use fugit::TimerDurationU32;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

// Max. length of a received line. Access point list entries are the longest lines.
const LINE_SIZE: usize = 256;
// Max. number of received payload bytes kept
const BODY_SIZE: usize = 2048;

// Timer frequency in Hz
const TIMER_HZ: u32 = 1000;

fn main() {
    env_logger::init();

    // Parse args
    let args: Vec<String> = env::args().collect();
    if args.len() != 5 {
        println!("Usage: {} <path-to-serial> <baudrate> <ssid> <psk>", args[0]);
        println!("Example: {} /dev/ttyUSB0 115200 mywifi hellopasswd123", args[0]);
        println!("\nNote: To run the example with debug logging, run it like this:");
        println!("\n  RUST_LOG=trace cargo run --example linux --features log -- /dev/ttyUSB0 115200 mywifi hellopasswd123");
        std::process::exit(1);
    }
    let dev = &args[1];
    let baud_rate: u32 = args[2].parse().unwrap();
    let ssid = &args[3];
    let psk = &args[4];

    println!("Starting (dev={}, baud={:?})...", dev, baud_rate);

    // Open serial port
    let port = serialport::new(dev, baud_rate)
        .data_bits(DataBits::Eight)
        .flow_control(FlowControl::None)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(Duration::from_millis(10))
        .open()
        .expect("Could not open serial port");

    let mut adapter: Adapter<_, _, TIMER_HZ, LINE_SIZE, BODY_SIZE> =
        Adapter::new(SerialPortTransport::new(port), timer::SysTimer::new());

    adapter.ping().expect("Module is not responding");
    adapter.set_echo(false).expect("Failed to disable echo");
    adapter.set_wifi_mode(WifiMode::Station).expect("Failed to set station mode");
    adapter
        .set_connection_mode(ConnectionMode::Single)
        .expect("Failed to set single connection mode");
    println!("AT firmware version: {}", adapter.version().expect("Failed to read version"));

    // Scan for access points
    let networks = adapter.list_access_points().expect("Failed to list access points");
    println!("Found {} access points:", networks.len());
    for network in &networks {
        println!("  {}", network);
    }

    // Join WIFI access point
    println!("Join WiFi \"{}\"...", ssid);
    let state = adapter.join(ssid, psk).unwrap();
    assert!(state.connected);

    let address = adapter.get_address().expect("Failed to read local address");
    println!("Local address: {:?}, MAC: {:?}", address.ipv4, address.mac);

    // Create TCP connection
    let remote_host = "ifconfig.net";
    println!("Connecting to {}...", remote_host);
    adapter
        .open_tcp(remote_host, 80)
        .unwrap_or_else(|_| panic!("Failed to connect to {}", remote_host));
    println!("Connected!");

    // Send HTTP request and read response
    println!("Sending HTTP request...");
    let response = adapter
        .request(b"GET / HTTP/1.1\r\nAccept: text/plain\r\nHost: ifconfig.net")
        .expect("HTTP request failed");
    println!(
        "Read {} of {} bytes (Content-Length: {:?})",
        response.received_length, response.announced_length, response.content_length
    );

    let response = std::str::from_utf8(&response.body).expect("HTTP response is not valid UTF8");
    let body = response.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or_else(|| {
        println!("Response:\n---\n{}\n---", response);
        panic!("Could not parse HTTP response");
    });
    println!("Your public IP, as returned by {}: {}", remote_host, body.trim());

    adapter.close_tcp().expect("Failed to close connection");
    adapter.leave().expect("Failed to leave WiFi");
}

/// Line oriented transport on top of a serial port
struct SerialPortTransport {
    port: Box<dyn SerialPort>,
}

impl SerialPortTransport {
    fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Transport<TIMER_HZ> for SerialPortTransport {
    type Error = io::Error;

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.port.write_all(data)?;
        self.port.flush()
    }

    fn read_line(&mut self, buffer: &mut [u8], timeout: TimerDurationU32<TIMER_HZ>) -> Result<usize, Self::Error> {
        let deadline = Instant::now() + Duration::from_millis(timeout.to_millis().into());
        let mut length = 0;

        while length < buffer.len() && Instant::now() < deadline {
            let mut byte = [0x0];
            match self.port.read(&mut byte) {
                Ok(0) => {}
                Ok(_) => {
                    buffer[length] = byte[0];
                    length += 1;

                    if byte[0] == b'\n' {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }
        }

        Ok(length)
    }

    fn bytes_available(&mut self) -> Result<usize, Self::Error> {
        Ok(self.port.bytes_to_read()?.try_into().unwrap_or(usize::MAX))
    }

    fn discard_available(&mut self) -> Result<(), Self::Error> {
        Ok(self.port.clear(ClearBuffer::Input)?)
    }
}

mod timer {
    use std::time::Instant as StdInstant;

    use fugit::Instant;
    use fugit_timer::Timer;

    /// A timer with millisecond precision.
    pub struct SysTimer {
        epoch: StdInstant,
        deadline: Option<StdInstant>,
    }

    impl SysTimer {
        pub fn new() -> SysTimer {
            SysTimer {
                epoch: StdInstant::now(),
                deadline: None,
            }
        }
    }

    impl Timer<1000> for SysTimer {
        type Error = &'static str;

        /// Milliseconds since creation
        fn now(&mut self) -> fugit::TimerInstantU32<1000> {
            let milliseconds = (StdInstant::now() - self.epoch).as_millis();
            let ticks: u32 = milliseconds.try_into().expect("u32 timer overflow");
            Instant::<u32, 1, 1000>::from_ticks(ticks)
        }

        fn start(&mut self, duration: fugit::TimerDurationU32<1000>) -> Result<(), Self::Error> {
            self.deadline = Some(StdInstant::now() + std::time::Duration::from_millis(duration.ticks().into()));
            Ok(())
        }

        fn cancel(&mut self) -> Result<(), Self::Error> {
            match self.deadline.take() {
                Some(_) => Ok(()),
                None => Err("cannot cancel stopped timer"),
            }
        }

        /// Must return `nb::Error::WouldBlock` as long as the started duration is not over
        fn wait(&mut self) -> nb::Result<(), Self::Error> {
            match self.deadline {
                None => Err(nb::Error::Other("timer not started")),
                Some(deadline) if StdInstant::now() >= deadline => {
                    self.deadline = None;
                    Ok(())
                }
                Some(_) => Err(nb::Error::WouldBlock),
            }
        }
    }
}
