use std::net::SocketAddr;

use color_eyre::eyre::{Context, OptionExt, Result};
use tokio::net::UdpSocket;

use crate::osc::message::OscMessage;
use crate::ports::chatbox::ChatboxSink;

/// Sends chatbox text to VRChat (or anything else speaking OSC) over UDP.
pub struct OscChatboxSink {
    socket: UdpSocket,
    address: String,
}

impl OscChatboxSink {
    /// Binds an ephemeral local port and connects it to `host:port`.
    pub async fn bind(host: &str, port: u16, address: impl Into<String>) -> Result<Self> {
        let target = tokio::net::lookup_host((host, port))
            .await
            .wrap_err_with(|| format!("Failed to resolve OSC host {}:{}", host, port))?
            .next()
            .ok_or_eyre("OSC host resolved to no addresses")?;

        let local: SocketAddr = if target.is_ipv4() {
            "0.0.0.0:0".parse()?
        } else {
            "[::]:0".parse()?
        };
        let socket = UdpSocket::bind(local)
            .await
            .wrap_err("Failed to bind UDP socket")?;
        socket
            .connect(target)
            .await
            .wrap_err_with(|| format!("Failed to connect UDP socket to {}", target))?;

        Ok(Self {
            socket,
            address: address.into(),
        })
    }

    #[cfg(test)]
    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait::async_trait]
impl ChatboxSink for OscChatboxSink {
    async fn notify(&self, text: &str) -> Result<()> {
        log::info!("&bSending to VRChat: &r{}", text);
        // `true` sends immediately instead of opening the keyboard
        let message = OscMessage::new(self.address.clone(), vec![text.into(), true.into()]);
        let bytes = message.encode()?;
        self.socket
            .send(&bytes)
            .await
            .wrap_err("Failed to send OSC message")?;
        Ok(())
    }
}
