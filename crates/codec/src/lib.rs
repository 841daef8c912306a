//! DuckChat wire format.
//!
//! Every datagram starts with a 32-bit request tag; the rest of the frame
//! is a fixed layout of null-padded string fields and integers. Integers
//! are host byte order on the wire (the protocol is defined for a
//! homogeneous deployment); the only exception is the port inside the
//! origin address block, which keeps its sockaddr_in network order.
//!
//! Client traffic and server-to-server traffic share the single socket
//! and are distinguished only by the tag.

pub mod client;
pub mod s2s;
pub mod text;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Bound of a user name field, terminator included.
pub const USERNAME_MAX: usize = 32;

/// Bound of a channel name field, terminator included.
pub const CHANNEL_MAX: usize = 32;

/// Bound of a say text field, terminator included.
pub const SAY_MAX: usize = 64;

#[derive(Debug)]
pub enum Error {
    Truncated,
    UnknownTag(u32),
    InvalidAddressFamily,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Request tags, client and server-to-server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum Tag {
    Login = 0,
    Logout = 1,
    Join = 2,
    Leave = 3,
    Say = 4,
    List = 5,
    Who = 6,
    KeepAlive = 7,
    S2sJoin = 8,
    S2sLeave = 9,
    S2sSay = 10,
}

/// Tags of server-to-client frames. A separate number space from [`Tag`];
/// the two never travel in the same direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum TextTag {
    Say = 0,
    List = 1,
    Who = 2,
    Error = 3,
}

/// A decoded inbound datagram.
#[derive(Debug)]
pub enum Packet {
    Login(client::Login),
    Logout,
    Join(client::Join),
    Leave(client::Leave),
    Say(client::Say),
    List,
    Who(client::Who),
    KeepAlive,
    S2sJoin(s2s::S2sJoin),
    S2sLeave(s2s::S2sLeave),
    S2sSay(s2s::S2sSay),
}

impl Packet {
    /// Decode one datagram by its leading tag. Truncated frames and
    /// unknown tags are errors; trailing bytes beyond a frame's fixed
    /// size are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let tag = read_u32(bytes, 0)?;

        Ok(match Tag::try_from(tag).map_err(|_| Error::UnknownTag(tag))? {
            Tag::Login => Self::Login(client::Login::decode(bytes)?),
            Tag::Logout => Self::Logout,
            Tag::Join => Self::Join(client::Join::decode(bytes)?),
            Tag::Leave => Self::Leave(client::Leave::decode(bytes)?),
            Tag::Say => Self::Say(client::Say::decode(bytes)?),
            Tag::List => Self::List,
            Tag::Who => Self::Who(client::Who::decode(bytes)?),
            Tag::KeepAlive => Self::KeepAlive,
            Tag::S2sJoin => Self::S2sJoin(s2s::S2sJoin::decode(bytes)?),
            Tag::S2sLeave => Self::S2sLeave(s2s::S2sLeave::decode(bytes)?),
            Tag::S2sSay => Self::S2sSay(s2s::S2sSay::decode(bytes)?),
        })
    }
}

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, Error> {
    Ok(u32::from_ne_bytes(
        bytes
            .get(offset..offset + 4)
            .ok_or(Error::Truncated)?
            .try_into()
            .map_err(|_| Error::Truncated)?,
    ))
}

pub(crate) fn read_u64(bytes: &[u8], offset: usize) -> Result<u64, Error> {
    Ok(u64::from_ne_bytes(
        bytes
            .get(offset..offset + 8)
            .ok_or(Error::Truncated)?
            .try_into()
            .map_err(|_| Error::Truncated)?,
    ))
}

pub(crate) fn read_field<const N: usize>(
    bytes: &[u8],
    offset: usize,
) -> Result<text::Text<N>, Error> {
    let field: [u8; N] = bytes
        .get(offset..offset + N)
        .ok_or(Error::Truncated)?
        .try_into()
        .map_err(|_| Error::Truncated)?;

    Ok(text::Text::from_wire(field))
}
