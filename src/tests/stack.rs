use crate::client::CommandError;
use crate::stack::{ConnectionState, Error};
use crate::tests::mock::{new_adapter, MockAdapter, MockedCommand};
use crate::wifi::WifiAdapter;
use alloc::string::ToString;
use core::str::FromStr;
use core::net::SocketAddr;

const CONNECT: &[u8] = b"AT+CIPSTART=\"TCP\",\"10.0.0.1\",80\r\n";
const CLOSE: &[u8] = b"AT+CIPCLOSE\r\n";

/// Returns an adapter joined to an access point
fn associated_adapter() -> MockAdapter {
    let mut adapter = new_adapter();
    adapter
        .client
        .transport
        .add_response(MockedCommand::new(b"AT+CWQAP\r\n", b"OK\r\nWIFI DISCONNECT\r\n"));
    adapter.client.transport.add_response(MockedCommand::new(
        b"AT+CWJAP_CUR=\"test_wifi\",\"secret\"\r\n",
        b"WIFI CONNECTED\r\nWIFI GOT IP\r\nOK\r\n",
    ));
    adapter.client.transport.add_response(MockedCommand::new(
        b"AT+CIFSR\r\n",
        b"+CIFSR:STAIP,\"10.0.0.181\"\r\n+CIFSR:STAMAC,\"10:fe:ed:05:ba:50\"\r\nOK\r\n",
    ));

    adapter.join("test_wifi", "secret").unwrap();
    adapter
}

/// Returns an adapter with an open TCP connection
fn connected_adapter() -> MockAdapter {
    let mut adapter = associated_adapter();
    adapter
        .client
        .transport
        .add_response(MockedCommand::new(CONNECT, b"CONNECT\r\n\r\nOK\r\n"));

    adapter.open_tcp("10.0.0.1", 80).unwrap();
    adapter
}

#[test]
fn test_open_tcp() {
    let mut adapter = connected_adapter();
    assert_eq!(ConnectionState::TcpOpen, adapter.state());
    assert!(adapter.get_join_status().connected);

    let commands = adapter.client.transport.get_commands_as_strings();
    assert_eq!("AT+CIPSTART=\"TCP\",\"10.0.0.1\",80\r\n".to_string(), *commands.last().unwrap());
}

#[test]
fn test_open_tcp_already_connected() {
    let mut adapter = associated_adapter();
    adapter
        .client
        .transport
        .add_response(MockedCommand::new(CONNECT, b"ALREADY CONNECTED\r\n\r\nERROR\r\n"));

    adapter.open_tcp("10.0.0.1", 80).unwrap();
    assert_eq!(ConnectionState::TcpOpen, adapter.state());
    assert_eq!(Ok(0), adapter.client.bytes_available());
}

#[test]
fn test_open_tcp_already_connected_error_arriving_late() {
    let mut adapter = associated_adapter();
    adapter.client.transport.add_response(MockedCommand::with_late(
        CONNECT,
        b"ALREADY CONNECTED\r\n",
        b"\r\nERROR\r\n",
    ));

    adapter.open_tcp("10.0.0.1", 80).unwrap();
    assert_eq!(ConnectionState::TcpOpen, adapter.state());

    adapter
        .client
        .transport
        .add_response(MockedCommand::new(b"AT+CIPSEND=9\r\n", b"OK\r\n> "));
    adapter.client.transport.add_response(MockedCommand::new(b"hello", b""));
    adapter
        .client
        .transport
        .add_response(MockedCommand::new(b"\r\n\r\n", b"SEND OK\r\n"));

    adapter.send(b"hello").unwrap();
    assert_eq!(ConnectionState::TcpOpen, adapter.state());
    assert_eq!(0, adapter.client.transport.remaining_responses());
}

#[test]
fn test_open_tcp_already_connected_without_error() {
    let mut adapter = associated_adapter();
    adapter
        .client
        .transport
        .add_response(MockedCommand::new(CONNECT, b"ALREADY CONNECTED\r\n"));

    adapter.open_tcp("10.0.0.1", 80).unwrap();
    assert_eq!(ConnectionState::TcpOpen, adapter.state());
}

#[test]
fn test_open_tcp_flushes_stale_data() {
    let mut adapter = associated_adapter();
    adapter.client.transport.add_pending(b"OK\r\nCLOSED\r\n");
    adapter
        .client
        .transport
        .add_response(MockedCommand::new(CONNECT, b"CONNECT\r\nOK\r\n"));

    adapter.open_tcp("10.0.0.1", 80).unwrap();
    assert_eq!(ConnectionState::TcpOpen, adapter.state());
}

#[test]
fn test_open_tcp_not_associated() {
    let mut adapter = new_adapter();

    assert_eq!(Err(Error::NotAssociated), adapter.open_tcp("10.0.0.1", 80));
    assert!(adapter.client.transport.get_commands_as_strings().is_empty());
}

#[test]
fn test_open_tcp_error() {
    let mut adapter = associated_adapter();
    adapter
        .client
        .transport
        .add_response(MockedCommand::new(CONNECT, b"DNS Fail\r\n\r\nERROR\r\n"));
    adapter.client.transport.add_response(MockedCommand::new(CLOSE, b"ERROR\r\n"));

    let error = adapter.open_tcp("10.0.0.1", 80).unwrap_err();
    assert_eq!(Error::ConnectError(CommandError::DeviceError), error);
    assert_eq!(ConnectionState::Associated, adapter.state());

    let commands = adapter.client.transport.get_commands_as_strings();
    assert_eq!("AT+CIPCLOSE\r\n".to_string(), *commands.last().unwrap());
}

#[test]
fn test_open_tcp_missing_confirmation() {
    let mut adapter = associated_adapter();
    adapter.client.transport.add_response(MockedCommand::new(CONNECT, b"CONNECT\r\n"));
    adapter
        .client
        .transport
        .add_response(MockedCommand::new(CLOSE, b"CLOSED\r\nOK\r\n"));

    let error = adapter.open_tcp("10.0.0.1", 80).unwrap_err();
    assert_eq!(Error::ConnectError(CommandError::Timeout), error);
    assert_eq!(ConnectionState::Associated, adapter.state());
}

#[test]
fn test_connect_addr() {
    let mut adapter = associated_adapter();
    adapter.client.transport.add_response(MockedCommand::new(
        b"AT+CIPSTART=\"TCP\",\"192.168.1.20\",8080\r\n",
        b"CONNECT\r\nOK\r\n",
    ));

    adapter
        .connect_addr(SocketAddr::from_str("192.168.1.20:8080").unwrap())
        .unwrap();
    assert_eq!(ConnectionState::TcpOpen, adapter.state());
}

#[test]
fn test_send() {
    let mut adapter = connected_adapter();
    adapter
        .client
        .transport
        .add_response(MockedCommand::new(b"AT+CIPSEND=9\r\n", b"\r\nOK\r\n> "));
    adapter.client.transport.add_response(MockedCommand::new(b"hello", b""));
    adapter
        .client
        .transport
        .add_response(MockedCommand::new(b"\r\n\r\n", b"\r\nRecv 9 bytes\r\n\r\nSEND OK\r\n"));

    adapter.send(b"hello").unwrap();
    assert_eq!(ConnectionState::TcpOpen, adapter.state());
    assert_eq!(0, adapter.client.transport.remaining_responses());
}

#[test]
fn test_send_not_connected() {
    let mut adapter = associated_adapter();

    assert_eq!(Err(Error::SocketUnconnected), adapter.send(b"hello"));
}

#[test]
fn test_send_without_prompt() {
    let mut adapter = connected_adapter();
    adapter
        .client
        .transport
        .add_response(MockedCommand::new(b"AT+CIPSEND=9\r\n", b"link is not valid\r\n\r\nERROR\r\n"));
    adapter.client.transport.add_response(MockedCommand::new(b"AT\r\n", b"OK\r\n"));
    adapter
        .client
        .transport
        .add_response(MockedCommand::new(CLOSE, b"CLOSED\r\nOK\r\n"));

    let error = adapter.send(b"hello").unwrap_err();
    assert_eq!(Error::TransmissionStartFailed(CommandError::DeviceError), error);
    assert_eq!(ConnectionState::Associated, adapter.state());

    let commands = adapter.client.transport.get_commands_as_strings();
    assert_eq!("\r\n".to_string(), commands[commands.len() - 4]);
    assert_eq!("\r\n".to_string(), commands[commands.len() - 3]);
    assert_eq!("AT\r\n".to_string(), commands[commands.len() - 2]);
    assert_eq!("AT+CIPCLOSE\r\n".to_string(), commands[commands.len() - 1]);
}

#[test]
fn test_send_prompt_timeout() {
    let mut adapter = connected_adapter();
    adapter
        .client
        .transport
        .add_response(MockedCommand::new(b"AT+CIPSEND=9\r\n", b"\r\nOK\r\n"));
    adapter.client.transport.add_response(MockedCommand::new(b"AT\r\n", b"OK\r\n"));
    adapter
        .client
        .transport
        .add_response(MockedCommand::new(CLOSE, b"CLOSED\r\nOK\r\n"));

    let error = adapter.send(b"hello").unwrap_err();
    assert_eq!(Error::TransmissionStartFailed(CommandError::Timeout), error);
    assert_eq!(ConnectionState::Associated, adapter.state());

    let commands = adapter.client.transport.get_commands_as_strings();
    assert!(!commands.contains(&"hello".to_string()));
    assert_eq!("AT+CIPCLOSE\r\n".to_string(), *commands.last().unwrap());
}

#[test]
fn test_send_fail() {
    let mut adapter = connected_adapter();
    adapter
        .client
        .transport
        .add_response(MockedCommand::new(b"AT+CIPSEND=9\r\n", b"OK\r\n> "));
    adapter.client.transport.add_response(MockedCommand::new(b"hello", b""));
    adapter
        .client
        .transport
        .add_response(MockedCommand::new(b"\r\n\r\n", b"SEND FAIL\r\n"));
    adapter.client.transport.add_response(MockedCommand::new(b"AT\r\n", b"OK\r\n"));
    adapter.client.transport.add_response(MockedCommand::new(CLOSE, b"ERROR\r\n"));

    let error = adapter.send(b"hello").unwrap_err();
    assert_eq!(Error::SendFailed(CommandError::Failure), error);
    assert_eq!(ConnectionState::Associated, adapter.state());
}

#[test]
fn test_close_tcp() {
    let mut adapter = connected_adapter();
    adapter
        .client
        .transport
        .add_response(MockedCommand::new(CLOSE, b"CLOSED\r\n\r\nOK\r\n"));

    adapter.close_tcp().unwrap();
    assert_eq!(ConnectionState::Associated, adapter.state());
}

#[test]
fn test_close_tcp_already_closed() {
    let mut adapter = connected_adapter();
    adapter.client.transport.add_response(MockedCommand::new(CLOSE, b"ERROR\r\n"));

    adapter.close_tcp().unwrap();
    assert_eq!(ConnectionState::Associated, adapter.state());
}

#[test]
fn test_close_tcp_timeout() {
    let mut adapter = connected_adapter();

    let error = adapter.close_tcp().unwrap_err();
    assert_eq!(Error::CloseError(CommandError::Timeout), error);
    assert_eq!(ConnectionState::Associated, adapter.state());
}

#[test]
fn test_close_tcp_disconnected() {
    let mut adapter = new_adapter();
    adapter.client.transport.add_response(MockedCommand::new(CLOSE, b"ERROR\r\n"));

    adapter.close_tcp().unwrap();
    assert_eq!(ConnectionState::Disconnected, adapter.state());
}
