//! Structural classification of raw webhook events.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::kind::{EventKind, PostbackVariant};
use super::payload::{
    AccountLinkContent, BeaconContent, EventMeta, EventPayload, FileContent, LocationContent,
    MediaContent, Members, PostbackContent, StickerContent, TextContent,
};
use crate::error::{EventError, EventResult};

/// Result of classifying and decoding one raw event.
#[derive(Debug, Clone)]
pub struct ParsedEvent {
    /// Dispatch kind.
    pub kind: EventKind,
    /// Refined tag for postback payloads.
    pub variant: Option<PostbackVariant>,
    /// Shared fields.
    pub meta: EventMeta,
    /// Kind-specific fields.
    pub payload: EventPayload,
    /// The payload as received.
    pub raw: Value,
}

fn discriminator<'a>(value: &'a Value, field: &str) -> EventResult<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| EventError::malformed(format!("missing string field `{field}`")))
}

fn postback_variant(postback: &Value) -> PostbackVariant {
    let Some(params) = postback.get("params").and_then(Value::as_object) else {
        return PostbackVariant::Plain;
    };

    let mut variant = PostbackVariant::Plain;
    if ["date", "time", "datetime"]
        .iter()
        .any(|field| params.contains_key(*field))
    {
        variant = PostbackVariant::Datetime;
    }
    if params.contains_key("newRichMenuAliasId") {
        variant = PostbackVariant::RichMenuSwitch;
    }
    variant
}

/// Determines the dispatch kind of a raw event without decoding its body.
///
/// Message events are classified by `message.type`; postbacks are refined into
/// a [`PostbackVariant`], and rich menu switches get their own kind.
pub fn classify(raw: &Value) -> EventResult<(EventKind, Option<PostbackVariant>)> {
    let kind = match discriminator(raw, "type")? {
        "message" => {
            let message = raw
                .get("message")
                .ok_or_else(|| EventError::malformed("message event without `message`"))?;
            match discriminator(message, "type")? {
                "text" => EventKind::Text,
                "sticker" => EventKind::Sticker,
                "image" => EventKind::Image,
                "video" => EventKind::Video,
                "audio" => EventKind::Audio,
                "file" => EventKind::File,
                "location" => EventKind::Location,
                other => {
                    return Err(EventError::UnknownEventKind {
                        kind: format!("message.{other}"),
                    });
                }
            }
        }
        "postback" => {
            let postback = raw
                .get("postback")
                .ok_or_else(|| EventError::malformed("postback event without `postback`"))?;
            let variant = postback_variant(postback);
            let kind = match variant {
                PostbackVariant::RichMenuSwitch => EventKind::RichMenuSwitch,
                _ => EventKind::Postback,
            };
            return Ok((kind, Some(variant)));
        }
        "follow" => EventKind::Follow,
        "unfollow" => EventKind::Unfollow,
        "join" => EventKind::Join,
        "leave" => EventKind::Leave,
        "memberJoined" => EventKind::MemberJoined,
        "memberLeft" => EventKind::MemberLeft,
        "unsend" => EventKind::Unsend,
        "beacon" => EventKind::Beacon,
        "accountLink" => EventKind::AccountLink,
        "videoPlayComplete" => EventKind::VideoPlayComplete,
        other => {
            return Err(EventError::UnknownEventKind {
                kind: other.to_string(),
            });
        }
    };
    Ok((kind, None))
}

fn field<T: DeserializeOwned>(raw: &Value, name: &str) -> EventResult<T> {
    let value = raw
        .get(name)
        .cloned()
        .ok_or_else(|| EventError::malformed(format!("missing field `{name}`")))?;
    serde_json::from_value(value)
        .map_err(|err| EventError::malformed(format!("invalid field `{name}`: {err}")))
}

fn nested_str(raw: &Value, outer: &str, inner: &str) -> EventResult<String> {
    raw.get(outer)
        .and_then(|v| v.get(inner))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| EventError::malformed(format!("missing field `{outer}.{inner}`")))
}

/// Classifies `raw` and decodes its shared and kind-specific fields.
pub fn parse(raw: Value) -> EventResult<ParsedEvent> {
    let (kind, variant) = classify(&raw)?;
    let meta: EventMeta = serde_json::from_value(raw.clone())?;

    let payload = match kind {
        EventKind::Text => EventPayload::Text(field::<TextContent>(&raw, "message")?),
        EventKind::Sticker => EventPayload::Sticker(field::<StickerContent>(&raw, "message")?),
        EventKind::Image => EventPayload::Image(field::<MediaContent>(&raw, "message")?),
        EventKind::Video => EventPayload::Video(field::<MediaContent>(&raw, "message")?),
        EventKind::Audio => EventPayload::Audio(field::<MediaContent>(&raw, "message")?),
        EventKind::File => EventPayload::File(field::<FileContent>(&raw, "message")?),
        EventKind::Location => EventPayload::Location(field::<LocationContent>(&raw, "message")?),
        EventKind::Postback | EventKind::RichMenuSwitch => {
            EventPayload::Postback(field::<PostbackContent>(&raw, "postback")?)
        }
        EventKind::Follow => EventPayload::Follow {
            is_unblocked: raw
                .get("follow")
                .and_then(|f| f.get("isUnblocked"))
                .and_then(Value::as_bool)
                .unwrap_or(false),
        },
        EventKind::Unfollow => EventPayload::Unfollow,
        EventKind::Join => EventPayload::Join,
        EventKind::Leave => EventPayload::Leave,
        EventKind::MemberJoined => EventPayload::MemberJoined(field::<Members>(&raw, "joined")?),
        EventKind::MemberLeft => EventPayload::MemberLeft(field::<Members>(&raw, "left")?),
        EventKind::Unsend => EventPayload::Unsend {
            message_id: nested_str(&raw, "unsend", "messageId")?,
        },
        EventKind::Beacon => EventPayload::Beacon(field::<BeaconContent>(&raw, "beacon")?),
        EventKind::AccountLink => {
            EventPayload::AccountLink(field::<AccountLinkContent>(&raw, "link")?)
        }
        EventKind::VideoPlayComplete => EventPayload::VideoPlayComplete {
            tracking_id: nested_str(&raw, "videoPlayComplete", "trackingId")?,
        },
        EventKind::Ready => {
            return Err(EventError::UnknownEventKind {
                kind: "ready".to_string(),
            });
        }
    };

    Ok(ParsedEvent {
        kind,
        variant,
        meta,
        payload,
        raw,
    })
}
