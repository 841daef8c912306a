//! Client-facing frames: the request surface and the text responses.
//!
//! Requests are decoded by the server and encoded by clients; text frames
//! go the other way. Both directions are implemented so that test
//! harnesses can drive a server end to end.

use bytes::{BufMut, BytesMut};

use crate::{
    CHANNEL_MAX, Error, Tag, TextTag, USERNAME_MAX, read_field, read_u32,
    text::{ChannelName, SayText, Username},
};

/// `REQ_LOGIN`: username.
#[derive(Debug, Clone, Copy)]
pub struct Login {
    pub username: Username,
}

impl Login {
    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.clear();
        bytes.put_u32_ne(Tag::Login.into());
        bytes.extend_from_slice(self.username.as_bytes());
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            username: read_field(bytes, 4)?,
        })
    }
}

/// `REQ_JOIN`: channel.
#[derive(Debug, Clone, Copy)]
pub struct Join {
    pub channel: ChannelName,
}

impl Join {
    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.clear();
        bytes.put_u32_ne(Tag::Join.into());
        bytes.extend_from_slice(self.channel.as_bytes());
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            channel: read_field(bytes, 4)?,
        })
    }
}

/// `REQ_LEAVE`: channel.
#[derive(Debug, Clone, Copy)]
pub struct Leave {
    pub channel: ChannelName,
}

impl Leave {
    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.clear();
        bytes.put_u32_ne(Tag::Leave.into());
        bytes.extend_from_slice(self.channel.as_bytes());
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            channel: read_field(bytes, 4)?,
        })
    }
}

/// `REQ_SAY`: channel, text.
#[derive(Debug, Clone, Copy)]
pub struct Say {
    pub channel: ChannelName,
    pub text: SayText,
}

impl Say {
    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.clear();
        bytes.put_u32_ne(Tag::Say.into());
        bytes.extend_from_slice(self.channel.as_bytes());
        bytes.extend_from_slice(self.text.as_bytes());
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            channel: read_field(bytes, 4)?,
            text: read_field(bytes, 4 + CHANNEL_MAX)?,
        })
    }
}

/// `REQ_WHO`: channel.
#[derive(Debug, Clone, Copy)]
pub struct Who {
    pub channel: ChannelName,
}

impl Who {
    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.clear();
        bytes.put_u32_ne(Tag::Who.into());
        bytes.extend_from_slice(self.channel.as_bytes());
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            channel: read_field(bytes, 4)?,
        })
    }
}

/// Encode one of the body-less requests (`REQ_LOGOUT`, `REQ_LIST`,
/// `REQ_KEEP_ALIVE`).
pub fn encode_bare(tag: Tag, bytes: &mut BytesMut) {
    bytes.clear();
    bytes.put_u32_ne(tag.into());
}

/// `TXT_SAY`: a chat line delivered to a channel member.
#[derive(Debug, Clone, Copy)]
pub struct TextSay {
    pub channel: ChannelName,
    pub username: Username,
    pub text: SayText,
}

impl TextSay {
    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.clear();
        bytes.put_u32_ne(TextTag::Say.into());
        bytes.extend_from_slice(self.channel.as_bytes());
        bytes.extend_from_slice(self.username.as_bytes());
        bytes.extend_from_slice(self.text.as_bytes());
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let tag = read_u32(bytes, 0)?;
        if tag != u32::from(TextTag::Say) {
            return Err(Error::UnknownTag(tag));
        }

        Ok(Self {
            channel: read_field(bytes, 4)?,
            username: read_field(bytes, 4 + CHANNEL_MAX)?,
            text: read_field(bytes, 4 + CHANNEL_MAX + USERNAME_MAX)?,
        })
    }
}

/// `TXT_LIST`: the channels the server currently holds.
#[derive(Debug, Clone, Default)]
pub struct TextList {
    pub channels: Vec<ChannelName>,
}

impl TextList {
    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.clear();
        bytes.put_u32_ne(TextTag::List.into());
        bytes.put_u32_ne(self.channels.len() as u32);
        for channel in &self.channels {
            bytes.extend_from_slice(channel.as_bytes());
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let tag = read_u32(bytes, 0)?;
        if tag != u32::from(TextTag::List) {
            return Err(Error::UnknownTag(tag));
        }

        let count = read_u32(bytes, 4)? as usize;
        let mut channels = Vec::with_capacity(count.min(256));
        for index in 0..count {
            channels.push(read_field(bytes, 8 + index * CHANNEL_MAX)?);
        }

        Ok(Self { channels })
    }
}

/// `TXT_WHO`: the members of one channel.
#[derive(Debug, Clone)]
pub struct TextWho {
    pub channel: ChannelName,
    pub users: Vec<Username>,
}

impl TextWho {
    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.clear();
        bytes.put_u32_ne(TextTag::Who.into());
        bytes.put_u32_ne(self.users.len() as u32);
        bytes.extend_from_slice(self.channel.as_bytes());
        for user in &self.users {
            bytes.extend_from_slice(user.as_bytes());
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let tag = read_u32(bytes, 0)?;
        if tag != u32::from(TextTag::Who) {
            return Err(Error::UnknownTag(tag));
        }

        let count = read_u32(bytes, 4)? as usize;
        let channel = read_field(bytes, 8)?;
        let mut users = Vec::with_capacity(count.min(256));
        for index in 0..count {
            users.push(read_field(bytes, 8 + CHANNEL_MAX + index * USERNAME_MAX)?);
        }

        Ok(Self { channel, users })
    }
}

/// `TXT_ERROR`: a bounded human-readable message. Also carries the
/// join/leave acknowledgements.
#[derive(Debug, Clone, Copy)]
pub struct TextError {
    pub text: SayText,
}

impl TextError {
    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.clear();
        bytes.put_u32_ne(TextTag::Error.into());
        bytes.extend_from_slice(self.text.as_bytes());
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let tag = read_u32(bytes, 0)?;
        if tag != u32::from(TextTag::Error) {
            return Err(Error::UnknownTag(tag));
        }

        Ok(Self {
            text: read_field(bytes, 4)?,
        })
    }
}
