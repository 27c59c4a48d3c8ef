//! Data models for the stream catalog
//!
//! [`Stream`] is the unit everything else is built from. Snapshots are plain
//! `Vec<Stream>` values: every mutation produces a new vector, nothing is
//! updated in place.

use crate::failure::Failure;
use serde::{Deserialize, Deserializer, Serialize};
use std::hash::{Hash, Hasher};

/// One station (or ambient sound) of the catalog
///
/// Equality and hashing deliberately ignore [`Stream::artwork`]: the decoded
/// picture is transient and must not defeat de-duplication of snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stream {
    pub id: String,
    pub url: String,
    pub title: String,
    /// Live "now playing" text, when the source provides one
    pub track: Option<String>,
    pub image_url: String,
    #[serde(skip)]
    pub artwork: Option<Vec<u8>>,
    pub is_active: bool,
    pub is_favorite: bool,
}

impl Stream {
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title: title.into(),
            image_url: image_url.into(),
            ..Default::default()
        }
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    pub fn with_favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = is_favorite;
        self
    }

    pub fn with_track(mut self, track: Option<String>) -> Self {
        self.track = track;
        self
    }
}

impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.is_active == other.is_active
            && self.url == other.url
            && self.title == other.title
            && self.track == other.track
            && self.image_url == other.image_url
            && self.is_favorite == other.is_favorite
    }
}

impl Eq for Stream {}

impl Hash for Stream {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.is_active.hash(state);
        self.url.hash(state);
        self.title.hash(state);
        self.track.hash(state);
        self.image_url.hash(state);
        self.is_favorite.hash(state);
    }
}

/// State of the catalog as seen by observers
#[derive(Debug, Clone, PartialEq)]
pub enum Streams {
    Loading,
    Success(Vec<Stream>),
    Error(Failure),
}

impl Streams {
    pub fn is_loading(&self) -> bool {
        matches!(self, Streams::Loading)
    }

    /// The stream list when this is a success snapshot
    pub fn as_success(&self) -> Option<&[Stream]> {
        match self {
            Streams::Success(streams) => Some(streams),
            _ => None,
        }
    }
}

/// Projection of [`Streams`] onto the one active stream
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveStream {
    /// The catalog is not resolved yet (loading or failed)
    Unknown,
    /// Catalog resolved, nothing active
    Empty,
    Filled(Stream),
}

impl ActiveStream {
    pub fn from_streams(streams: &Streams) -> Self {
        match streams {
            Streams::Success(list) => list
                .iter()
                .find(|s| s.is_active)
                .cloned()
                .map(ActiveStream::Filled)
                .unwrap_or(ActiveStream::Empty),
            Streams::Loading | Streams::Error(_) => ActiveStream::Unknown,
        }
    }

    pub fn stream(&self) -> Option<&Stream> {
        match self {
            ActiveStream::Filled(stream) => Some(stream),
            _ => None,
        }
    }
}

/// Wire format of one catalog entry
///
/// Parsing is lenient: unknown fields are ignored, ids may be numbers and
/// a missing image is an empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub image: String,
}

impl StreamResponse {
    /// Domain stream with both flags cleared
    pub fn into_stream(self) -> Stream {
        Stream::new(self.id, self.url, self.name, self.image)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(i) => i.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}
