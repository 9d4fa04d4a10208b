//! Mocks for doc examples
use crate::transport::Transport;
use fugit::{TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer;
use heapless::Deque;

/// Transport mock replying to the commands used by the doc examples
#[derive(Default)]
pub struct ExampleTransport {
    /// Pending reply lines
    replies: Deque<&'static [u8], 16>,
}

impl ExampleTransport {
    fn reply(&mut self, lines: &[&'static [u8]]) {
        for line in lines.iter().copied() {
            let _ = self.replies.push_back(line);
        }
    }
}

impl Transport<1_000_000> for ExampleTransport {
    type Error = u32;

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        match data {
            b"AT\r\n" | b"AT+CWQAP\r\n" => self.reply(&[b"OK\r\n"]),
            b"AT+CWJAP_CUR=\"test_wifi\",\"secret\"\r\n" => {
                self.reply(&[b"WIFI CONNECTED\r\n", b"WIFI GOT IP\r\n", b"\r\n", b"OK\r\n"])
            }
            b"AT+CIFSR\r\n" => self.reply(&[
                b"+CIFSR:STAIP,\"10.0.0.181\"\r\n",
                b"+CIFSR:STAMAC,\"10:fe:ed:05:ba:50\"\r\n",
                b"\r\n",
                b"OK\r\n",
            ]),
            b"AT+CIPSTART=\"TCP\",\"10.0.0.1\",80\r\n" => self.reply(&[b"CONNECT\r\n", b"\r\n", b"OK\r\n"]),
            b"AT+CIPSEND=18\r\n" => self.reply(&[b"\r\n", b"OK\r\n", b"> "]),
            b"\r\n\r\n" => self.reply(&[
                b"\r\n",
                b"Recv 18 bytes\r\n",
                b"\r\n",
                b"SEND OK\r\n",
                b"\r\n",
                b"+IPD,42:HTTP/1.1 200 OK\r\n",
                b"Content-Length: 4\r\n",
                b"\r\n",
                b"nice",
            ]),
            b"AT+CIPCLOSE\r\n" => self.reply(&[b"CLOSED\r\n", b"\r\n", b"OK\r\n"]),
            _ => {}
        }

        Ok(())
    }

    fn read_line(&mut self, buffer: &mut [u8], _timeout: TimerDurationU32<1_000_000>) -> Result<usize, Self::Error> {
        let Some(line) = self.replies.pop_front() else {
            return Ok(0);
        };

        let length = line.len().min(buffer.len());
        buffer[..length].copy_from_slice(&line[..length]);

        if length < line.len() {
            let _ = self.replies.push_front(&line[length..]);
        }

        Ok(length)
    }

    fn bytes_available(&mut self) -> Result<usize, Self::Error> {
        Ok(self.replies.iter().map(|line| line.len()).sum())
    }

    fn discard_available(&mut self) -> Result<(), Self::Error> {
        self.replies.clear();
        Ok(())
    }
}

/// Timer mock. Every call of `now()` advances the time by one millisecond, waiting returns immediately.
#[derive(Default)]
pub struct ExampleTimer {
    ticks: u32,
    end: Option<u32>,
}

impl Timer<1_000_000> for ExampleTimer {
    type Error = u32;

    fn now(&mut self) -> TimerInstantU32<1_000_000> {
        self.ticks = self.ticks.wrapping_add(1_000);
        TimerInstantU32::from_ticks(self.ticks)
    }

    fn start(&mut self, duration: TimerDurationU32<1_000_000>) -> Result<(), Self::Error> {
        self.end = Some(self.ticks.wrapping_add(duration.ticks()));
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), Self::Error> {
        self.end = None;
        Ok(())
    }

    fn wait(&mut self) -> nb::Result<(), Self::Error> {
        if let Some(end) = self.end.take() {
            self.ticks = end;
        }

        Ok(())
    }
}
