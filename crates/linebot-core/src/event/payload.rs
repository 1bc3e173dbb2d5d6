//! Typed webhook payloads.
//!
//! Field names follow the platform's camelCase JSON. Only the fields the SDK
//! reads are modelled; everything else stays reachable via the raw payload.

use serde::{Deserialize, Serialize};

/// Where an event came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Source {
    /// One-on-one chat.
    #[serde(rename_all = "camelCase")]
    User {
        /// Sender's user ID.
        user_id: String,
    },
    /// Group chat.
    #[serde(rename_all = "camelCase")]
    Group {
        /// Group ID.
        group_id: String,
        /// Sender's user ID, absent when the user has not consented.
        #[serde(default)]
        user_id: Option<String>,
    },
    /// Multi-person chat.
    #[serde(rename_all = "camelCase")]
    Room {
        /// Room ID.
        room_id: String,
        /// Sender's user ID, absent when the user has not consented.
        #[serde(default)]
        user_id: Option<String>,
    },
}

impl Source {
    /// The user ID of the sender, if known.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::User { user_id } => Some(user_id),
            Self::Group { user_id, .. } | Self::Room { user_id, .. } => user_id.as_deref(),
        }
    }

    /// The group ID for group sources.
    pub fn group_id(&self) -> Option<&str> {
        match self {
            Self::Group { group_id, .. } => Some(group_id),
            _ => None,
        }
    }

    /// The room ID for room sources.
    pub fn room_id(&self) -> Option<&str> {
        match self {
            Self::Room { room_id, .. } => Some(room_id),
            _ => None,
        }
    }
}

/// Fields shared by every webhook event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
    /// Reply token; absent for kinds that cannot be replied to.
    #[serde(default)]
    pub reply_token: Option<String>,
    /// Webhook event ID.
    #[serde(default)]
    pub webhook_event_id: String,
    /// Milliseconds since the epoch when the platform produced the event.
    pub timestamp: i64,
    /// Channel state: `active` or `standby`.
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Delivery context.
    #[serde(default)]
    pub delivery_context: DeliveryContext,
    /// Event source.
    #[serde(default)]
    pub source: Option<Source>,
}

fn default_mode() -> String {
    "active".to_string()
}

/// Delivery context of a webhook event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryContext {
    /// Whether this is a redelivered event.
    #[serde(default)]
    pub is_redelivery: bool,
}

/// Text message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    /// Message ID.
    pub id: String,
    /// Message text.
    pub text: String,
    /// Token for quoting this message.
    #[serde(default)]
    pub quote_token: Option<String>,
}

/// Sticker message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickerContent {
    /// Message ID.
    pub id: String,
    /// Package ID.
    pub package_id: String,
    /// Sticker ID.
    pub sticker_id: String,
    /// Resource type (`STATIC`, `ANIMATION`, …).
    #[serde(default)]
    pub sticker_resource_type: Option<String>,
}

/// Where the binary content of a media message lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentProvider {
    /// `line` or `external`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Original content URL for external providers.
    #[serde(default)]
    pub original_content_url: Option<String>,
    /// Preview image URL for external providers.
    #[serde(default)]
    pub preview_image_url: Option<String>,
}

/// Image, video or audio message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaContent {
    /// Message ID; used to download the content.
    pub id: String,
    /// Content provider.
    #[serde(default)]
    pub content_provider: Option<ContentProvider>,
    /// Length in milliseconds for video and audio.
    #[serde(default)]
    pub duration: Option<u64>,
}

/// File message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    /// Message ID.
    pub id: String,
    /// File name.
    pub file_name: String,
    /// File size in bytes.
    pub file_size: u64,
}

/// Location message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationContent {
    /// Message ID.
    pub id: String,
    /// Title.
    #[serde(default)]
    pub title: Option<String>,
    /// Address.
    #[serde(default)]
    pub address: Option<String>,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
}

/// Optional parameters of a postback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostbackParams {
    /// Date picked with a `date` picker.
    #[serde(default)]
    pub date: Option<String>,
    /// Time picked with a `time` picker.
    #[serde(default)]
    pub time: Option<String>,
    /// Date and time picked with a `datetime` picker.
    #[serde(default)]
    pub datetime: Option<String>,
    /// Alias of the rich menu switched to.
    #[serde(default)]
    pub new_rich_menu_alias_id: Option<String>,
    /// Result of the rich menu switch.
    #[serde(default)]
    pub status: Option<String>,
}

impl PostbackParams {
    /// The picked value of a datetime picker, whichever mode it used.
    pub fn picked(&self) -> Option<&str> {
        self.datetime
            .as_deref()
            .or(self.date.as_deref())
            .or(self.time.as_deref())
    }
}

/// Postback content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostbackContent {
    /// Opaque data string, usually an action token.
    pub data: String,
    /// Picker or rich menu parameters.
    #[serde(default)]
    pub params: Option<PostbackParams>,
}

/// Member list of member-joined/left events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Members {
    /// Users that joined or left.
    pub members: Vec<Source>,
}

impl Members {
    /// User IDs of the members.
    pub fn user_ids(&self) -> Vec<&str> {
        self.members.iter().filter_map(Source::user_id).collect()
    }
}

/// Beacon content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeaconContent {
    /// Hardware ID of the beacon.
    pub hwid: String,
    /// `enter`, `banner` or `stay`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Device message.
    #[serde(default)]
    pub dm: Option<String>,
}

/// Account link content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLinkContent {
    /// `ok` or `failed`.
    pub result: String,
    /// Nonce generated when linking started.
    pub nonce: String,
}

/// Kind-specific fields of an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// Text message.
    Text(TextContent),
    /// Sticker message.
    Sticker(StickerContent),
    /// Image message.
    Image(MediaContent),
    /// Video message.
    Video(MediaContent),
    /// Audio message.
    Audio(MediaContent),
    /// File message.
    File(FileContent),
    /// Location message.
    Location(LocationContent),
    /// Postback or rich menu switch.
    Postback(PostbackContent),
    /// Follow; `is_unblocked` distinguishes an unblock from a new friend.
    Follow {
        /// Whether the follow was an unblock.
        is_unblocked: bool,
    },
    /// Unfollow.
    Unfollow,
    /// Join.
    Join,
    /// Leave.
    Leave,
    /// Members joined.
    MemberJoined(Members),
    /// Members left.
    MemberLeft(Members),
    /// Unsend of the given message ID.
    Unsend {
        /// ID of the unsent message.
        message_id: String,
    },
    /// Beacon.
    Beacon(BeaconContent),
    /// Account link.
    AccountLink(AccountLinkContent),
    /// Video play complete for the given tracking ID.
    VideoPlayComplete {
        /// Tracking ID set on the video message.
        tracking_id: String,
    },
}
