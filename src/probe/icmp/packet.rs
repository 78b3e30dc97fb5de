//! ICMPv4 echo message framing

use crate::defaults;
use thiserror::Error;

pub const ECHO_REPLY: u8 = 0;
pub const ECHO_REQUEST: u8 = 8;
pub const HEADER_LEN: usize = 8;

/// Parsed ICMP message carrying an echo header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoPacket {
    pub icmp_type: u8,
    pub code: u8,
    pub identifier: u16,
    pub sequence: u16,
    pub payload: Vec<u8>,
}

impl EchoPacket {
    pub fn is_reply(&self) -> bool {
        self.icmp_type == ECHO_REPLY && self.code == 0
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("packet of {0} bytes is shorter than an ICMP header")]
    Truncated(usize),

    /// Header fields are still readable so the owner can be faulted
    #[error("checksum mismatch on sequence {sequence}")]
    BadChecksum { identifier: u16, sequence: u16 },
}

/// Echo payload: the fill byte repeated `size` times
pub fn payload(size: usize) -> Vec<u8> {
    vec![defaults::PAYLOAD_FILL_BYTE; size]
}

/// Internet checksum (RFC 1071) over `data`
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }
    if let [last] = chunks.remainder() {
        sum += (*last as u32) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// Build an echo request with a valid checksum
pub fn encode_request(identifier: u16, sequence: u16, payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(HEADER_LEN + payload.len());
    packet.push(ECHO_REQUEST);
    packet.push(0);
    packet.extend_from_slice(&[0, 0]);
    packet.extend_from_slice(&identifier.to_be_bytes());
    packet.extend_from_slice(&sequence.to_be_bytes());
    packet.extend_from_slice(payload);

    let sum = checksum(&packet);
    packet[2..4].copy_from_slice(&sum.to_be_bytes());
    packet
}

/// Skip a leading IPv4 header, as delivered by raw sockets and some
/// platforms' datagram ICMP sockets
pub fn strip_ipv4_header(buf: &[u8]) -> &[u8] {
    match buf.first() {
        Some(first) if first >> 4 == 4 => {
            let header_len = ((first & 0x0f) as usize) * 4;
            buf.get(header_len..).unwrap_or(&[])
        }
        _ => buf,
    }
}

/// Parse an ICMP message (without IP header)
pub fn parse(buf: &[u8]) -> Result<EchoPacket, PacketError> {
    if buf.len() < HEADER_LEN {
        return Err(PacketError::Truncated(buf.len()));
    }

    let identifier = u16::from_be_bytes([buf[4], buf[5]]);
    let sequence = u16::from_be_bytes([buf[6], buf[7]]);

    if checksum(buf) != 0 {
        return Err(PacketError::BadChecksum { identifier, sequence });
    }

    Ok(EchoPacket {
        icmp_type: buf[0],
        code: buf[1],
        identifier,
        sequence,
        payload: buf[HEADER_LEN..].to_vec(),
    })
}

/// Turn an encoded request into the reply a peer would send back
pub fn reply_for(request: &[u8]) -> Vec<u8> {
    let mut reply = request.to_vec();
    if reply.len() >= HEADER_LEN {
        reply[0] = ECHO_REPLY;
        reply[2..4].copy_from_slice(&[0, 0]);
        let sum = checksum(&reply);
        reply[2..4].copy_from_slice(&sum.to_be_bytes());
    }
    reply
}
