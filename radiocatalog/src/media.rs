//! Renderable media items derived from streams
//!
//! A [`MediaItem`] is what the playback engines and the browse tree deal
//! with. It is built 1:1 from a [`Stream`]: the station name goes into
//! `artist`/`subtitle`, the live track (if any) into `title`.

use crate::models::Stream;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MediaKind {
    #[default]
    Station,
    Folder,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Display title; for stations the live track, overridden while casting
    pub title: Option<String>,
    pub artist: Option<String>,
    pub subtitle: Option<String>,
    pub artwork_uri: Option<String>,
    pub is_playable: bool,
    pub is_browsable: bool,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaItem {
    pub media_id: String,
    /// Playable source; stripped when the item crosses the controller boundary
    pub uri: Option<String>,
    pub metadata: MediaMetadata,
}

impl MediaItem {
    /// The empty item (no id, no source)
    pub const EMPTY: MediaItem = MediaItem {
        media_id: String::new(),
        uri: None,
        metadata: MediaMetadata {
            title: None,
            artist: None,
            subtitle: None,
            artwork_uri: None,
            is_playable: false,
            is_browsable: false,
            kind: MediaKind::Station,
        },
    };

    pub fn from_stream(stream: &Stream) -> Self {
        Self {
            media_id: stream.id.clone(),
            uri: Some(stream.url.clone()),
            metadata: MediaMetadata {
                title: stream.track.clone(),
                artist: Some(stream.title.clone()),
                subtitle: Some(stream.title.clone()),
                artwork_uri: (!stream.image_url.is_empty()).then(|| stream.image_url.clone()),
                is_playable: true,
                is_browsable: false,
                kind: MediaKind::Station,
            },
        }
    }

    /// A folder node of the browse tree
    pub fn browsable(id: impl Into<String>, title: Option<String>) -> Self {
        Self {
            media_id: id.into(),
            uri: None,
            metadata: MediaMetadata {
                title,
                is_playable: false,
                is_browsable: true,
                kind: MediaKind::Folder,
                ..Default::default()
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.media_id.is_empty()
    }

    /// Station name, falling back to the display title
    pub fn station_name(&self) -> Option<&str> {
        self.metadata
            .artist
            .as_deref()
            .or(self.metadata.title.as_deref())
    }

    /// Same item with the display title replaced
    pub fn with_title(&self, title: Option<String>) -> Self {
        let mut item = self.clone();
        item.metadata.title = title;
        item
    }

    /// Same item without its playable source
    pub fn without_uri(&self) -> Self {
        let mut item = self.clone();
        item.uri = None;
        item
    }
}

impl From<&Stream> for MediaItem {
    fn from(stream: &Stream) -> Self {
        MediaItem::from_stream(stream)
    }
}
