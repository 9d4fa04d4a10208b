use crate::client::CommandError;
use crate::tests::mock::{new_adapter, MockedCommand};
use crate::wifi::{AddressErrors, WifiAdapter};
use alloc::string::ToString;

#[test]
fn test_all_addresses() {
    let mut adapter = new_adapter();
    adapter.client.transport.add_response(MockedCommand::new(
        b"AT+CIFSR\r\n",
        b"+CIFSR:STAIP,\"10.0.0.181\"\r\n+CIFSR:STAMAC,\"10:fe:ed:05:ba:50\"\r\n\r\nOK\r\n",
    ));

    let address = adapter.get_address().unwrap();
    assert_eq!("10:fe:ed:05:ba:50", address.mac.unwrap().as_str());
    assert_eq!("10.0.0.181", address.ipv4.unwrap().to_string());
    assert_eq!(Ok(0), adapter.client.bytes_available());
}

#[test]
fn test_echo_enabled() {
    let mut adapter = new_adapter();
    adapter.client.transport.add_response(MockedCommand::new(
        b"AT+CIFSR\r\n",
        b"AT+CIFSR\r\r\n+CIFSR:STAIP,\"10.0.0.181\"\r\n+CIFSR:STAMAC,\"10:fe:ed:05:ba:50\"\r\n\r\nOK\r\n",
    ));

    let address = adapter.get_address().unwrap();
    assert_eq!("10.0.0.181", address.ipv4.unwrap().to_string());
}

#[test]
fn test_missing_mac() {
    let mut adapter = new_adapter();
    adapter.client.transport.add_response(MockedCommand::new(
        b"AT+CIFSR\r\n",
        b"+CIFSR:STAIP,\"10.0.0.181\"\r\n\r\nOK\r\n",
    ));

    let address = adapter.get_address().unwrap();
    assert!(address.mac.is_none());
    assert_eq!("10.0.0.181", address.ipv4.unwrap().to_string());
}

#[test]
fn test_mac_too_long() {
    let mut adapter = new_adapter();
    adapter.client.transport.add_response(MockedCommand::new(
        b"AT+CIFSR\r\n",
        b"+CIFSR:STAIP,\"10.0.0.181\"\r\n+CIFSR:STAMAC,\"10:fe:ed:05:ba:50:ff\"\r\n\r\nOK\r\n",
    ));

    let address = adapter.get_address().unwrap();
    assert!(address.mac.is_none());
}

#[test]
fn test_ipv4_missing() {
    let mut adapter = new_adapter();
    adapter.client.transport.add_response(MockedCommand::new(
        b"AT+CIFSR\r\n",
        b"+CIFSR:STAMAC,\"10:fe:ed:05:ba:50\"\r\n\r\nOK\r\n",
    ));

    let error = adapter.get_address().unwrap_err();
    assert_eq!(AddressErrors::CommandError(CommandError::Timeout), error);
}

#[test]
fn test_invalid_ipv4() {
    let mut adapter = new_adapter();
    adapter.client.transport.add_response(MockedCommand::new(
        b"AT+CIFSR\r\n",
        b"+CIFSR:STAIP,\"10.0.0\"\r\n+CIFSR:STAMAC,\"10:fe:ed:05:ba:50\"\r\n\r\nOK\r\n",
    ));

    let error = adapter.get_address().unwrap_err();
    assert_eq!(AddressErrors::AddressParseError, error);
}

#[test]
fn test_command_error() {
    let mut adapter = new_adapter();
    adapter
        .client
        .transport
        .add_response(MockedCommand::new(b"AT+CIFSR\r\n", b"ERROR\r\n"));

    let error = adapter.get_address().unwrap_err();
    assert_eq!(AddressErrors::CommandError(CommandError::DeviceError), error);
}
