//! ICMP transports: the session's shared socket and a scripted in-memory peer

use super::packet;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Mutex;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

/// Which kind of socket carries the echo traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Unprivileged ICMP datagram socket; the kernel owns the identifier
    Datagram,
    /// Raw socket; sees every ICMP packet on the host
    Raw,
    /// In-memory peer
    Scripted,
}

impl TransportKind {
    /// Raw sockets receive other processes' replies too
    pub fn filters_identifier(&self) -> bool {
        matches!(self, TransportKind::Raw)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::Datagram => "datagram",
            TransportKind::Raw => "raw",
            TransportKind::Scripted => "scripted",
        };
        f.write_str(name)
    }
}

/// Shared send/receive channel for ICMP echo traffic
#[async_trait]
pub trait IcmpTransport: Send + Sync {
    fn kind(&self) -> TransportKind;

    async fn send_to(&self, packet: &[u8], address: Ipv4Addr) -> io::Result<()>;

    /// Receive one packet, possibly prefixed with an IPv4 header
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr)>;
}

/// ICMP socket opened once per session
pub struct SocketTransport {
    socket: UdpSocket,
    kind: TransportKind,
}

impl SocketTransport {
    /// Prefer the unprivileged datagram socket, fall back to a raw socket
    pub fn open() -> Result<Self> {
        match Self::open_with(TransportKind::Datagram) {
            Ok(transport) => Ok(transport),
            Err(datagram_error) => Self::open_with(TransportKind::Raw).map_err(|raw_error| {
                AppError::socket_setup(format!(
                    "cannot open an ICMP socket (datagram: {}; raw: {})",
                    datagram_error, raw_error
                ))
            }),
        }
    }

    fn open_with(kind: TransportKind) -> io::Result<Self> {
        let socket_type = match kind {
            TransportKind::Raw => Type::RAW,
            _ => Type::DGRAM,
        };

        let socket = Socket::new(Domain::IPV4, socket_type, Some(Protocol::ICMPV4))?;
        socket.set_nonblocking(true)?;
        socket.bind(&SockAddr::from(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)))?;

        let std_socket: std::net::UdpSocket = socket.into();
        let socket = UdpSocket::from_std(std_socket)?;

        Ok(Self { socket, kind })
    }
}

#[async_trait]
impl IcmpTransport for SocketTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    async fn send_to(&self, packet: &[u8], address: Ipv4Addr) -> io::Result<()> {
        let sent = self
            .socket
            .send_to(packet, SocketAddr::new(IpAddr::V4(address), 0))
            .await?;
        if sent != packet.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write: {} of {} bytes", sent, packet.len()),
            ));
        }
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr)> {
        let (len, source) = self.socket.recv_from(buf).await?;
        Ok((len, source.ip()))
    }
}

/// How the scripted peer answers one sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedReply {
    /// Valid reply after the given delay
    Echo(Duration),
    /// Never answers
    Silent,
    /// Reply with a broken checksum after the delay
    Corrupt(Duration),
    /// Two identical replies after the delay
    Duplicate(Duration),
    /// Reply arrives from a different address
    Spoofed(Ipv4Addr, Duration),
    /// The send itself fails
    FailSend,
}

/// In-memory peer answering echo requests according to a script
pub struct ScriptedTransport {
    script: Mutex<HashMap<u16, ScriptedReply>>,
    default_reply: ScriptedReply,
    inbound_tx: mpsc::UnboundedSender<(Vec<u8>, IpAddr)>,
    inbound_rx: AsyncMutex<mpsc::UnboundedReceiver<(Vec<u8>, IpAddr)>>,
    sent: Mutex<Vec<(u16, Ipv4Addr)>>,
}

impl ScriptedTransport {
    /// Every unscripted sequence gets `default_reply`
    pub fn new(default_reply: ScriptedReply) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            script: Mutex::new(HashMap::new()),
            default_reply,
            inbound_tx,
            inbound_rx: AsyncMutex::new(inbound_rx),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn with_reply(self, sequence: u16, reply: ScriptedReply) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.insert(sequence, reply);
        }
        self
    }

    /// (sequence, destination) of every request sent so far
    pub fn sent(&self) -> Vec<(u16, Ipv4Addr)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Inject an arbitrary inbound packet
    pub fn inject(&self, packet: Vec<u8>, source: IpAddr) {
        let _ = self.inbound_tx.send((packet, source));
    }

    fn deliver_after(&self, delay: Duration, packet: Vec<u8>, source: IpAddr, copies: usize) {
        let tx = self.inbound_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            for _ in 0..copies {
                let _ = tx.send((packet.clone(), source));
            }
        });
    }
}

#[async_trait]
impl IcmpTransport for ScriptedTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Scripted
    }

    async fn send_to(&self, request: &[u8], address: Ipv4Addr) -> io::Result<()> {
        let echo = packet::parse(request)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

        let reply = self
            .script
            .lock()
            .ok()
            .and_then(|script| script.get(&echo.sequence).copied())
            .unwrap_or(self.default_reply);

        if reply == ScriptedReply::FailSend {
            return Err(io::Error::new(io::ErrorKind::Other, "scripted send failure"));
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push((echo.sequence, address));
        }

        let source = IpAddr::V4(address);
        match reply {
            ScriptedReply::Echo(delay) => self.deliver_after(delay, packet::reply_for(request), source, 1),
            ScriptedReply::Duplicate(delay) => {
                self.deliver_after(delay, packet::reply_for(request), source, 2)
            }
            ScriptedReply::Corrupt(delay) => {
                let mut corrupted = packet::reply_for(request);
                if let Some(last) = corrupted.last_mut() {
                    *last ^= 0xff;
                }
                self.deliver_after(delay, corrupted, source, 1)
            }
            ScriptedReply::Spoofed(from, delay) => {
                self.deliver_after(delay, packet::reply_for(request), IpAddr::V4(from), 1)
            }
            ScriptedReply::Silent | ScriptedReply::FailSend => {}
        }

        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr)> {
        let mut inbound = self.inbound_rx.lock().await;
        let (packet, source) = inbound
            .recv()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "scripted peer closed"))?;

        let len = packet.len().min(buf.len());
        buf[..len].copy_from_slice(&packet[..len]);
        Ok((len, source))
    }
}
