use std::net::SocketAddr;

use anyhow::Result;
use bytes::BytesMut;
use duckchat_codec::{
    CHANNEL_MAX, Error, Packet, Tag,
    client::{Join, Login, Say, TextError, TextList, TextSay, TextWho, encode_bare},
    s2s::{S2sJoin, S2sSay},
    text::{ChannelName, SayText, Username},
};

#[test]
fn say_request_round_trip() -> Result<()> {
    let mut bytes = BytesMut::with_capacity(128);

    Say {
        channel: ChannelName::new("Common"),
        text: SayText::new("hello world"),
    }
    .encode(&mut bytes);

    assert_eq!(bytes.len(), 4 + CHANNEL_MAX + 64);

    match Packet::decode(&bytes)? {
        Packet::Say(say) => {
            assert_eq!(say.channel.as_str(), "Common");
            assert_eq!(say.text.as_str(), "hello world");
        }
        other => panic!("expected a say request, got {:?}", other),
    }

    Ok(())
}

#[test]
fn bare_requests_decode() -> Result<()> {
    let mut bytes = BytesMut::new();

    encode_bare(Tag::Logout, &mut bytes);
    assert!(matches!(Packet::decode(&bytes)?, Packet::Logout));

    encode_bare(Tag::List, &mut bytes);
    assert!(matches!(Packet::decode(&bytes)?, Packet::List));

    encode_bare(Tag::KeepAlive, &mut bytes);
    assert!(matches!(Packet::decode(&bytes)?, Packet::KeepAlive));

    Ok(())
}

#[test]
fn s2s_join_round_trip() -> Result<()> {
    let origin: SocketAddr = "10.0.0.7:9001".parse()?;
    let mut bytes = BytesMut::new();

    S2sJoin {
        origin,
        channel: ChannelName::new("ducks"),
    }
    .encode(&mut bytes);

    assert_eq!(bytes.len(), 4 + 16 + CHANNEL_MAX);

    match Packet::decode(&bytes)? {
        Packet::S2sJoin(join) => {
            assert_eq!(join.origin, origin);
            assert_eq!(join.channel.as_str(), "ducks");
        }
        other => panic!("expected an s2s join, got {:?}", other),
    }

    Ok(())
}

#[test]
fn s2s_say_round_trip() -> Result<()> {
    let origin: SocketAddr = "192.168.1.2:4000".parse()?;
    let mut bytes = BytesMut::new();

    S2sSay {
        origin,
        id: u64::MAX - 3,
        username: Username::new("duck"),
        channel: ChannelName::new("pond"),
        text: SayText::new("quack"),
    }
    .encode(&mut bytes);

    assert_eq!(bytes.len(), 156);

    match Packet::decode(&bytes)? {
        Packet::S2sSay(say) => {
            assert_eq!(say.origin, origin);
            assert_eq!(say.id, u64::MAX - 3);
            assert_eq!(say.username.as_str(), "duck");
            assert_eq!(say.channel.as_str(), "pond");
            assert_eq!(say.text.as_str(), "quack");
        }
        other => panic!("expected an s2s say, got {:?}", other),
    }

    Ok(())
}

#[test]
fn truncated_frames_are_rejected() {
    let mut bytes = BytesMut::new();
    Login {
        username: Username::new("duck"),
    }
    .encode(&mut bytes);

    assert!(matches!(
        Packet::decode(&bytes[..bytes.len() - 1]),
        Err(Error::Truncated)
    ));
    assert!(matches!(Packet::decode(&bytes[..3]), Err(Error::Truncated)));
    assert!(matches!(Packet::decode(&[]), Err(Error::Truncated)));
}

#[test]
fn unknown_tags_are_rejected() {
    let bytes = 99u32.to_ne_bytes();
    assert!(matches!(
        Packet::decode(&bytes),
        Err(Error::UnknownTag(99))
    ));
}

#[test]
fn trailing_bytes_are_ignored() -> Result<()> {
    let mut bytes = BytesMut::new();
    Join {
        channel: ChannelName::new("pond"),
    }
    .encode(&mut bytes);
    bytes.extend_from_slice(b"extra");

    assert!(matches!(Packet::decode(&bytes)?, Packet::Join(_)));

    Ok(())
}

#[test]
fn text_say_round_trip() -> Result<()> {
    let mut bytes = BytesMut::new();

    TextSay {
        channel: ChannelName::new("pond"),
        username: Username::new("duck"),
        text: SayText::new("quack"),
    }
    .encode(&mut bytes);

    let decoded = TextSay::decode(&bytes)?;
    assert_eq!(decoded.channel.as_str(), "pond");
    assert_eq!(decoded.username.as_str(), "duck");
    assert_eq!(decoded.text.as_str(), "quack");

    Ok(())
}

#[test]
fn text_list_round_trip() -> Result<()> {
    let mut bytes = BytesMut::new();

    TextList {
        channels: vec![ChannelName::new("Common"), ChannelName::new("pond")],
    }
    .encode(&mut bytes);

    assert_eq!(bytes.len(), 8 + 2 * CHANNEL_MAX);

    let decoded = TextList::decode(&bytes)?;
    assert_eq!(decoded.channels.len(), 2);
    assert_eq!(decoded.channels[0].as_str(), "Common");
    assert_eq!(decoded.channels[1].as_str(), "pond");

    Ok(())
}

#[test]
fn text_who_round_trip() -> Result<()> {
    let mut bytes = BytesMut::new();

    TextWho {
        channel: ChannelName::new("pond"),
        users: vec![Username::new("duck"), Username::new("goose")],
    }
    .encode(&mut bytes);

    assert_eq!(bytes.len(), 40 + 2 * 32);

    let decoded = TextWho::decode(&bytes)?;
    assert_eq!(decoded.channel.as_str(), "pond");
    assert_eq!(decoded.users.len(), 2);
    assert_eq!(decoded.users[1].as_str(), "goose");

    Ok(())
}

#[test]
fn text_error_round_trip() -> Result<()> {
    let mut bytes = BytesMut::new();

    TextError {
        text: SayText::new("Channel does not exist."),
    }
    .encode(&mut bytes);

    assert_eq!(bytes.len(), 68);
    assert_eq!(
        TextError::decode(&bytes)?.text.as_str(),
        "Channel does not exist."
    );

    Ok(())
}

#[test]
fn channel_names_are_canonicalised_on_decode() -> Result<()> {
    let mut bytes = BytesMut::new();
    Join {
        channel: ChannelName::new("pond"),
    }
    .encode(&mut bytes);

    // Inject a newline into the encoded channel field; decode must scrub it.
    bytes[4 + 2] = b'\n';

    match Packet::decode(&bytes)? {
        Packet::Join(join) => assert_eq!(join.channel.as_str(), "po"),
        other => panic!("expected a join request, got {:?}", other),
    }

    Ok(())
}
