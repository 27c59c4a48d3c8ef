//! Commands exchanged between controllers and the playback session

use radiocatalog::MediaItem;
use std::collections::BTreeSet;

/// Custom commands a controller sends to the session
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerCommand {
    /// `ms > 0` arms the sleep timer, anything else disarms it
    StartTimer { ms: i64 },
    /// Plays a station; the URI is looked up again on the session side
    StartStream { item: MediaItem },
    /// Plays an arbitrary URI
    SetMediaUri { uri: String },
}

impl ControllerCommand {
    pub fn code(&self) -> SessionCommandCode {
        match self {
            ControllerCommand::StartTimer { .. } => SessionCommandCode::StartTimer,
            ControllerCommand::StartStream { .. } => SessionCommandCode::StartStream,
            ControllerCommand::SetMediaUri { .. } => SessionCommandCode::SetMediaUri,
        }
    }
}

/// Custom commands the session broadcasts to its controllers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    TimerUpdated { remaining_ms: i64 },
    TrackUpdated { title: String },
    StreamError,
    MediaItemUpdated { item: MediaItem },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionResult {
    Success,
    /// Refused; the message is meant for the user
    Rejected(String),
    Error(String),
}

impl SessionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SessionResult::Success)
    }
}

/// Standard transport requests
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Play,
    Pause,
    Stop,
    Prepare,
    SetVolume(f32),
    SetMediaItem(MediaItem),
    SetMediaItems {
        items: Vec<MediaItem>,
        start_index: usize,
        position_ms: u64,
    },
    /// Voice search: the session replaces the playlist with the results
    SetMediaItemsFromSearch { query: String },
    ClearMediaItems,
}

impl PlayerCommand {
    pub fn code(&self) -> PlayerCommandCode {
        match self {
            PlayerCommand::Play => PlayerCommandCode::Play,
            PlayerCommand::Pause => PlayerCommandCode::Pause,
            PlayerCommand::Stop => PlayerCommandCode::Stop,
            PlayerCommand::Prepare => PlayerCommandCode::Prepare,
            PlayerCommand::SetVolume(_) => PlayerCommandCode::SetVolume,
            PlayerCommand::SetMediaItem(_)
            | PlayerCommand::SetMediaItems { .. }
            | PlayerCommand::SetMediaItemsFromSearch { .. } => PlayerCommandCode::SetMediaItems,
            PlayerCommand::ClearMediaItems => PlayerCommandCode::ClearMediaItems,
        }
    }

    /// Copy without playable URIs, as sent over the controller boundary
    pub(crate) fn stripped(self) -> Self {
        match self {
            PlayerCommand::SetMediaItem(item) => PlayerCommand::SetMediaItem(item.without_uri()),
            PlayerCommand::SetMediaItems {
                items,
                start_index,
                position_ms,
            } => PlayerCommand::SetMediaItems {
                items: items.iter().map(MediaItem::without_uri).collect(),
                start_index,
                position_ms,
            },
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionCommandCode {
    StartStream,
    StartTimer,
    SetMediaUri,
}

impl SessionCommandCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionCommandCode::StartStream => "start_stream",
            SessionCommandCode::StartTimer => "start_timer",
            SessionCommandCode::SetMediaUri => "set_media_uri",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlayerCommandCode {
    Play,
    Pause,
    Stop,
    Prepare,
    SetVolume,
    SetMediaItems,
    ClearMediaItems,
}

impl PlayerCommandCode {
    pub const ALL: [PlayerCommandCode; 7] = [
        PlayerCommandCode::Play,
        PlayerCommandCode::Pause,
        PlayerCommandCode::Stop,
        PlayerCommandCode::Prepare,
        PlayerCommandCode::SetVolume,
        PlayerCommandCode::SetMediaItems,
        PlayerCommandCode::ClearMediaItems,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerCommandCode::Play => "play",
            PlayerCommandCode::Pause => "pause",
            PlayerCommandCode::Stop => "stop",
            PlayerCommandCode::Prepare => "prepare",
            PlayerCommandCode::SetVolume => "set_volume",
            PlayerCommandCode::SetMediaItems => "set_media_items",
            PlayerCommandCode::ClearMediaItems => "clear_media_items",
        }
    }
}

/// Commands granted to a controller at connection time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableCommands {
    pub session: BTreeSet<SessionCommandCode>,
    pub player: BTreeSet<PlayerCommandCode>,
}

impl AvailableCommands {
    /// The fixed grant every controller receives
    pub fn granted() -> Self {
        Self {
            session: [
                SessionCommandCode::StartStream,
                SessionCommandCode::StartTimer,
                SessionCommandCode::SetMediaUri,
            ]
            .into_iter()
            .collect(),
            player: PlayerCommandCode::ALL.into_iter().collect(),
        }
    }

    pub fn allows_session(&self, code: SessionCommandCode) -> bool {
        self.session.contains(&code)
    }

    pub fn allows_player(&self, code: PlayerCommandCode) -> bool {
        self.player.contains(&code)
    }
}
