#![allow(dead_code)]

pub use cms2000_bridge::prelude::*;

use cms2000_bridge::cms2000::packet;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Factory;
impl Factory {
    pub fn cms2000(port: u16) -> config::Cms2000 {
        config::Cms2000 {
            host: "127.0.0.1".to_string(),
            port,
            read_timeout: Some(5),
            max_unrecognised_frames: Some(4),
            use_tcp_nodelay: Some(true),
            poll_interval: None,
        }
    }

    pub const SERIAL: &'static [u8; 10] = b"CMS2000-42";

    pub const PAYLOAD: [u8; 22] = [
        0x00, 0xC8, 0x03, 0xE8, 0x00, 0x96, 0x00, 0x32, 0x09, 0x60, 0x13, 0x88, 0x00, 0x0A, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x27, 0x10,
    ];

    fn with_checksum(mut frame: Vec<u8>) -> Vec<u8> {
        let sum = packet::checksum(&frame);
        frame.extend_from_slice(&sum);
        frame
    }

    pub fn identify() -> Vec<u8> {
        let mut r = vec![0xAA, 0xAA, 0x00, 0x00, 0x01, 0x00, 0x00, 0x80, 0x0A];
        r.extend_from_slice(Self::SERIAL);
        Self::with_checksum(r)
    }

    pub fn ack1() -> Vec<u8> {
        Self::with_checksum(vec![0xAA, 0xAA, 0x00, 0x01, 0x01, 0x00, 0x00, 0x81, 0x00])
    }

    pub fn ack2() -> Vec<u8> {
        Self::with_checksum(vec![0xAA, 0xAA, 0x00, 0x01, 0x01, 0x00, 0x01, 0x80, 0x00])
    }

    pub fn data(payload: &[u8]) -> Vec<u8> {
        let mut r = vec![0xAA, 0xAA, 0x00, 0x01, 0x01, 0x00, 0x01, 0x82, payload.len() as u8];
        r.extend_from_slice(payload);
        Self::with_checksum(r)
    }

    pub fn identify_reply() -> Vec<u8> {
        let mut r = vec![0xAA, 0xAA, 0x01, 0x00, 0x00, 0x00, 0x00, 0x01, 0x0B];
        r.extend_from_slice(Self::SERIAL);
        r.push(0x01);
        Self::with_checksum(r)
    }
}

/// A scripted stand-in for the inverter monitor.
pub struct FakeDevice {
    listener: TcpListener,
}

impl FakeDevice {
    pub async fn bind() -> Result<Self> {
        Ok(Self {
            listener: TcpListener::bind("127.0.0.1:0").await?,
        })
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().unwrap().port()
    }

    pub async fn accept(&self) -> Result<TcpStream> {
        let (socket, _) = self.listener.accept().await?;
        Ok(socket)
    }
}

pub async fn expect(socket: &mut TcpStream, expected: &[u8]) -> Result<()> {
    let mut buf = vec![0u8; expected.len()];
    socket.read_exact(&mut buf).await?;
    assert_eq!(buf, expected, "device received unexpected bytes");
    Ok(())
}

pub async fn send(socket: &mut TcpStream, frame: &[u8]) -> Result<()> {
    socket.write_all(frame).await?;
    socket.flush().await?;
    Ok(())
}

/// Runs the whole handshake from the device side, then waits for the client
/// to hang up.
pub async fn serve_reading(socket: &mut TcpStream, payload: &[u8]) -> Result<()> {
    expect(socket, &packet::RESET_A).await?;
    expect(socket, &packet::RESET_B).await?;

    send(socket, &Factory::identify()).await?;
    expect(socket, &Factory::identify_reply()).await?;

    send(socket, &Factory::ack1()).await?;
    expect(socket, &packet::ACK_1).await?;

    send(socket, &Factory::ack2()).await?;
    expect(socket, &packet::ACK_2).await?;

    send(socket, &Factory::data(payload)).await?;

    let mut rest = Vec::new();
    socket.read_to_end(&mut rest).await?;
    assert!(rest.is_empty(), "client sent {:02x?} after the data frame", rest);

    Ok(())
}
