//! Outbound message builders.
//!
//! A reply carries one to five messages. Anything implementing
//! [`IntoMessages`] can be passed to a reply: strings become text messages,
//! JSON values are sent as-is.

use serde::{Serialize, Serializer};
use serde_json::{Value, json};

/// Maximum number of messages in one reply call.
pub const MAX_REPLY_MESSAGES: usize = 5;

/// One outbound message object.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Plain text.
    Text {
        /// Message text.
        text: String,
        /// Quote token of the message being quoted.
        quote_token: Option<String>,
    },
    /// Sticker.
    Sticker {
        /// Package ID.
        package_id: String,
        /// Sticker ID.
        sticker_id: String,
    },
    /// Image by URL.
    Image {
        /// HTTPS URL of the full image.
        original_content_url: String,
        /// HTTPS URL of the preview.
        preview_image_url: String,
    },
    /// Video by URL.
    Video {
        /// HTTPS URL of the video.
        original_content_url: String,
        /// HTTPS URL of the preview image.
        preview_image_url: String,
        /// Tracking ID reported back in video-play-complete events.
        tracking_id: Option<String>,
    },
    /// Audio by URL.
    Audio {
        /// HTTPS URL of the audio file.
        original_content_url: String,
        /// Length in milliseconds.
        duration: u64,
    },
    /// Location.
    Location {
        /// Title.
        title: String,
        /// Address.
        address: String,
        /// Latitude.
        latitude: f64,
        /// Longitude.
        longitude: f64,
    },
    /// Template message (buttons, confirm, carousel, …).
    Template {
        /// Text shown where templates cannot be displayed.
        alt_text: String,
        /// Template object.
        template: Value,
    },
    /// A message object passed through unchanged.
    Raw(Value),
}

impl Message {
    /// Text message.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            quote_token: None,
        }
    }

    /// Text message quoting another message.
    pub fn quote(text: impl Into<String>, quote_token: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            quote_token: Some(quote_token.into()),
        }
    }

    /// Sticker message.
    pub fn sticker(package_id: impl Into<String>, sticker_id: impl Into<String>) -> Self {
        Self::Sticker {
            package_id: package_id.into(),
            sticker_id: sticker_id.into(),
        }
    }

    /// Image message; `preview` defaults to the image itself.
    pub fn image(url: impl Into<String>, preview: Option<String>) -> Self {
        let url = url.into();
        Self::Image {
            preview_image_url: preview.unwrap_or_else(|| url.clone()),
            original_content_url: url,
        }
    }

    /// Video message.
    pub fn video(url: impl Into<String>, preview: impl Into<String>) -> Self {
        Self::Video {
            original_content_url: url.into(),
            preview_image_url: preview.into(),
            tracking_id: None,
        }
    }

    /// Audio message.
    pub fn audio(url: impl Into<String>, duration_ms: u64) -> Self {
        Self::Audio {
            original_content_url: url.into(),
            duration: duration_ms,
        }
    }

    /// Location message.
    pub fn location(
        title: impl Into<String>,
        address: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self::Location {
            title: title.into(),
            address: address.into(),
            latitude,
            longitude,
        }
    }

    /// Template message.
    pub fn template(alt_text: impl Into<String>, template: Value) -> Self {
        Self::Template {
            alt_text: alt_text.into(),
            template,
        }
    }

    /// Sets the tracking ID of a video message. No-op for other messages.
    pub fn with_tracking_id(mut self, id: impl Into<String>) -> Self {
        if let Self::Video { tracking_id, .. } = &mut self {
            *tracking_id = Some(id.into());
        }
        self
    }

    /// Returns the text of a text message.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Builds the JSON message object.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Text { text, quote_token } => {
                let mut value = json!({ "type": "text", "text": text });
                if let Some(token) = quote_token {
                    value["quoteToken"] = json!(token);
                }
                value
            }
            Self::Sticker {
                package_id,
                sticker_id,
            } => json!({ "type": "sticker", "packageId": package_id, "stickerId": sticker_id }),
            Self::Image {
                original_content_url,
                preview_image_url,
            } => json!({
                "type": "image",
                "originalContentUrl": original_content_url,
                "previewImageUrl": preview_image_url,
            }),
            Self::Video {
                original_content_url,
                preview_image_url,
                tracking_id,
            } => {
                let mut value = json!({
                    "type": "video",
                    "originalContentUrl": original_content_url,
                    "previewImageUrl": preview_image_url,
                });
                if let Some(id) = tracking_id {
                    value["trackingId"] = json!(id);
                }
                value
            }
            Self::Audio {
                original_content_url,
                duration,
            } => json!({
                "type": "audio",
                "originalContentUrl": original_content_url,
                "duration": duration,
            }),
            Self::Location {
                title,
                address,
                latitude,
                longitude,
            } => json!({
                "type": "location",
                "title": title,
                "address": address,
                "latitude": latitude,
                "longitude": longitude,
            }),
            Self::Template { alt_text, template } => {
                json!({ "type": "template", "altText": alt_text, "template": template })
            }
            Self::Raw(value) => value.clone(),
        }
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl From<Value> for Message {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Self::text(text),
            other => Self::Raw(other),
        }
    }
}

// ─── IntoMessages ───────────────────────────────────────────────────────────

/// Conversion into the message list of one reply.
pub trait IntoMessages {
    /// Converts `self` into messages, in send order.
    fn into_messages(self) -> Vec<Message>;
}

impl IntoMessages for Message {
    fn into_messages(self) -> Vec<Message> {
        vec![self]
    }
}

impl IntoMessages for &str {
    fn into_messages(self) -> Vec<Message> {
        vec![Message::from(self)]
    }
}

impl IntoMessages for String {
    fn into_messages(self) -> Vec<Message> {
        vec![Message::from(self)]
    }
}

impl IntoMessages for &String {
    fn into_messages(self) -> Vec<Message> {
        vec![Message::text(self.as_str())]
    }
}

impl IntoMessages for Value {
    fn into_messages(self) -> Vec<Message> {
        match self {
            Value::Array(items) => items.into_iter().map(Message::from).collect(),
            other => vec![Message::from(other)],
        }
    }
}

impl<T: Into<Message>> IntoMessages for Vec<T> {
    fn into_messages(self) -> Vec<Message> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<Message>, const N: usize> IntoMessages for [T; N] {
    fn into_messages(self) -> Vec<Message> {
        self.into_iter().map(Into::into).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_produce_platform_json() {
        assert_eq!(
            Message::text("hi").to_value(),
            json!({ "type": "text", "text": "hi" })
        );
        assert_eq!(
            Message::sticker("446", "1988").to_value(),
            json!({ "type": "sticker", "packageId": "446", "stickerId": "1988" })
        );
        let image = Message::image("https://example.com/a.png", None).to_value();
        assert_eq!(image["previewImageUrl"], "https://example.com/a.png");
        let video = Message::video("https://v", "https://p")
            .with_tracking_id("track-1")
            .to_value();
        assert_eq!(video["trackingId"], "track-1");
    }

    #[test]
    fn conversions() {
        assert_eq!("a".into_messages(), vec![Message::text("a")]);
        assert_eq!(
            vec!["a", "b"].into_messages(),
            vec![Message::text("a"), Message::text("b")]
        );
        let raw = json!([{ "type": "sticker", "packageId": "1", "stickerId": "2" }, "x"]);
        let messages = raw.into_messages();
        assert!(matches!(messages[0], Message::Raw(_)));
        assert_eq!(messages[1].as_text(), Some("x"));
    }

    #[test]
    fn serializes_through_to_value() {
        let out = serde_json::to_value(Message::quote("q", "tok")).unwrap();
        assert_eq!(out, json!({ "type": "text", "text": "q", "quoteToken": "tok" }));
    }
}
