//! Event kind classification.

use std::fmt;
use std::str::FromStr;

/// The closed set of event kinds handlers can subscribe to.
///
/// A kind is always derived from the payload structure; users only name kinds
/// when registering handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Text message.
    Text,
    /// Postback from a button, quick reply or datetime picker.
    Postback,
    /// Sticker message.
    Sticker,
    /// Image message.
    Image,
    /// Video message.
    Video,
    /// Audio message.
    Audio,
    /// File message.
    File,
    /// Location message.
    Location,
    /// The user added the bot as a friend or unblocked it.
    Follow,
    /// The user blocked the bot.
    Unfollow,
    /// The bot joined a group or room.
    Join,
    /// The bot was removed from a group or room.
    Leave,
    /// Users joined a group the bot is in.
    MemberJoined,
    /// Users left a group the bot is in.
    MemberLeft,
    /// The user unsent a message.
    Unsend,
    /// The user entered the range of a beacon.
    Beacon,
    /// Account link result.
    AccountLink,
    /// Postback produced by a rich menu switch action.
    RichMenuSwitch,
    /// The user finished watching a tracked video.
    VideoPlayComplete,
    /// Fired once per client when serving starts; carries no event object.
    Ready,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 20] = [
        EventKind::Text,
        EventKind::Postback,
        EventKind::Sticker,
        EventKind::Image,
        EventKind::Video,
        EventKind::Audio,
        EventKind::File,
        EventKind::Location,
        EventKind::Follow,
        EventKind::Unfollow,
        EventKind::Join,
        EventKind::Leave,
        EventKind::MemberJoined,
        EventKind::MemberLeft,
        EventKind::Unsend,
        EventKind::Beacon,
        EventKind::AccountLink,
        EventKind::RichMenuSwitch,
        EventKind::VideoPlayComplete,
        EventKind::Ready,
    ];

    /// Returns the snake_case name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Postback => "postback",
            Self::Sticker => "sticker",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::File => "file",
            Self::Location => "location",
            Self::Follow => "follow",
            Self::Unfollow => "unfollow",
            Self::Join => "join",
            Self::Leave => "leave",
            Self::MemberJoined => "member_joined",
            Self::MemberLeft => "member_left",
            Self::Unsend => "unsend",
            Self::Beacon => "beacon",
            Self::AccountLink => "account_link",
            Self::RichMenuSwitch => "rich_menu_switch",
            Self::VideoPlayComplete => "video_play_complete",
            Self::Ready => "ready",
        }
    }

    /// Whether events of this kind are message events.
    pub fn is_message(&self) -> bool {
        matches!(
            self,
            Self::Text
                | Self::Sticker
                | Self::Image
                | Self::Video
                | Self::Audio
                | Self::File
                | Self::Location
        )
    }

    /// Whether events of this kind come from a postback payload.
    pub fn is_postback(&self) -> bool {
        matches!(self, Self::Postback | Self::RichMenuSwitch)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or(())
    }
}

/// Refined tag of a postback event.
///
/// Assigned in a fixed priority order: plain postback, then datetime picker
/// result, then rich menu switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostbackVariant {
    /// A postback carrying only `data`.
    Plain,
    /// A datetime picker result (`params.date`, `params.time` or `params.datetime`).
    Datetime,
    /// A rich menu switch result (`params.newRichMenuAliasId`).
    RichMenuSwitch,
}

impl PostbackVariant {
    /// Returns the snake_case name of the variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "postback",
            Self::Datetime => "datetime",
            Self::RichMenuSwitch => "rich_menu_switch",
        }
    }
}
