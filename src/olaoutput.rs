use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use rosc::{encoder, OscMessage, OscPacket, OscType};
use serde::Deserialize;

use crate::error::SinkError;
use crate::sink::LightSink;

pub const UNIVERSE_SIZE: usize = 512;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OlaConfig {
    pub address: SocketAddr,
    pub universe: u16,
    /// Zero-based DMX channel the first light starts at.
    pub start_channel: usize,
    pub send_timeout_ms: u64,
}

impl Default for OlaConfig {
    fn default() -> Self {
        OlaConfig {
            address: SocketAddr::from(([127u8, 0, 0, 1], 7770)),
            universe: 0,
            start_channel: 0,
            send_timeout_ms: 100,
        }
    }
}

/// Sends frames to olad's OSC plugin, one blob per DMX universe.
pub struct OlaOutput {
    sock: UdpSocket,
    target_addr: SocketAddr,
    osc_addr: String,
    start_channel: usize,
    buffer: Vec<u8>,
}

impl OlaOutput {
    pub fn new(config: &OlaConfig) -> Result<Self, SinkError> {
        let our_addr = if config.address.is_ipv4() {
            SocketAddr::from(([0u8; 4], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let sock = UdpSocket::bind(our_addr)?;
        sock.set_write_timeout(Some(Duration::from_millis(config.send_timeout_ms.max(1))))?;

        Ok(OlaOutput {
            sock,
            target_addr: config.address,
            osc_addr: format!("/dmx/universe/{}", config.universe),
            start_channel: config.start_channel,
            buffer: vec![0; UNIVERSE_SIZE],
        })
    }

    fn encode(&mut self, frame: &[u8]) -> Result<Vec<u8>, SinkError> {
        let end = self.start_channel + frame.len();
        if end > self.buffer.len() {
            return Err(SinkError::FrameTooLarge {
                len: frame.len(),
                capacity: self.buffer.len() - self.start_channel.min(self.buffer.len()),
            });
        }
        self.buffer[self.start_channel..end].copy_from_slice(frame);

        encoder::encode(&OscPacket::Message(OscMessage {
            addr: self.osc_addr.clone(),
            args: vec![OscType::Blob(self.buffer.clone())],
        }))
        .map_err(|err| SinkError::Encode(format!("{:?}", err)))
    }
}

impl LightSink for OlaOutput {
    fn send(&mut self, frame: &[u8]) -> Result<(), SinkError> {
        let msg_buf = self.encode(frame)?;
        self.sock.send_to(&msg_buf, self.target_addr)?;
        Ok(())
    }

    fn blackout(&mut self, _channels: usize) -> Result<(), SinkError> {
        self.buffer.fill(0);
        self.send(&[])
    }
}
