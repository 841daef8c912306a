//! Server-to-server frames.
//!
//! Every S2S frame carries the sending server's advertised address as a
//! 16-byte sockaddr_in image right after the tag: family (host order),
//! port (network order), four IPv4 octets, eight bytes of zero padding.
//! Receivers attribute the frame to the wire-level source address; the
//! payload address is only surfaced in log lines.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use bytes::{BufMut, BytesMut};

use crate::{
    CHANNEL_MAX, Error, Tag, USERNAME_MAX, read_field, read_u64,
    text::{ChannelName, SayText, Username},
};

const ADDRESS_LEN: usize = 16;
const AF_INET: u16 = 2;

fn put_origin(bytes: &mut BytesMut, origin: SocketAddr) {
    let (ip, port) = match origin {
        SocketAddr::V4(addr) => (*addr.ip(), addr.port()),
        // The wire image has no room for IPv6; configuration restricts
        // peers and the bind address to IPv4.
        SocketAddr::V6(addr) => (Ipv4Addr::UNSPECIFIED, addr.port()),
    };

    bytes.put_u16_ne(AF_INET);
    bytes.put_u16(port);
    bytes.extend_from_slice(&ip.octets());
    bytes.extend_from_slice(&[0u8; 8]);
}

fn read_origin(bytes: &[u8], offset: usize) -> Result<SocketAddr, Error> {
    let block = bytes
        .get(offset..offset + ADDRESS_LEN)
        .ok_or(Error::Truncated)?;

    let family = u16::from_ne_bytes(block[..2].try_into().map_err(|_| Error::Truncated)?);
    if family != AF_INET {
        return Err(Error::InvalidAddressFamily);
    }

    let port = u16::from_be_bytes(block[2..4].try_into().map_err(|_| Error::Truncated)?);
    let ip = Ipv4Addr::new(block[4], block[5], block[6], block[7]);

    Ok(SocketAddr::new(IpAddr::V4(ip), port))
}

/// `S2S_JOIN`: the sender subscribes to a channel's traffic.
#[derive(Debug, Clone, Copy)]
pub struct S2sJoin {
    pub origin: SocketAddr,
    pub channel: ChannelName,
}

impl S2sJoin {
    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.clear();
        bytes.put_u32_ne(Tag::S2sJoin.into());
        put_origin(bytes, self.origin);
        bytes.extend_from_slice(self.channel.as_bytes());
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            origin: read_origin(bytes, 4)?,
            channel: read_field(bytes, 4 + ADDRESS_LEN)?,
        })
    }
}

/// `S2S_LEAVE`: the sender prunes itself from one channel branch.
#[derive(Debug, Clone, Copy)]
pub struct S2sLeave {
    pub origin: SocketAddr,
    pub channel: ChannelName,
}

impl S2sLeave {
    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.clear();
        bytes.put_u32_ne(Tag::S2sLeave.into());
        put_origin(bytes, self.origin);
        bytes.extend_from_slice(self.channel.as_bytes());
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            origin: read_origin(bytes, 4)?,
            channel: read_field(bytes, 4 + ADDRESS_LEN)?,
        })
    }
}

/// `S2S_SAY`: a chat line in flight between servers. The id is minted at
/// the origin server and forwarded unchanged for loop suppression.
#[derive(Debug, Clone, Copy)]
pub struct S2sSay {
    pub origin: SocketAddr,
    pub id: u64,
    pub username: Username,
    pub channel: ChannelName,
    pub text: SayText,
}

impl S2sSay {
    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.clear();
        bytes.put_u32_ne(Tag::S2sSay.into());
        put_origin(bytes, self.origin);
        bytes.put_u64_ne(self.id);
        bytes.extend_from_slice(self.username.as_bytes());
        bytes.extend_from_slice(self.channel.as_bytes());
        bytes.extend_from_slice(self.text.as_bytes());
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let body = 4 + ADDRESS_LEN + 8;

        Ok(Self {
            origin: read_origin(bytes, 4)?,
            id: read_u64(bytes, 4 + ADDRESS_LEN)?,
            username: read_field(bytes, body)?,
            channel: read_field(bytes, body + USERNAME_MAX)?,
            text: read_field(bytes, body + USERNAME_MAX + CHANNEL_MAX)?,
        })
    }
}
