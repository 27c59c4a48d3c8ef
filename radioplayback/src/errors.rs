use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("Engine {0} failed: {1}")]
    Engine(String, String),
    #[error("Nothing is playing")]
    NotPlaying,
    #[error("Playback session is closed")]
    SessionClosed,
    #[error("Controller is not bound to a session")]
    NotBound,
    #[error("Unknown media item: {0}")]
    UnknownMediaItem(String),
    #[error("Command '{0}' is not available to this controller")]
    CommandNotAvailable(String),
    #[error("Equalizer error: {0}")]
    Equalizer(String),
    #[error("Catalog error: {0}")]
    Catalog(#[from] radiocatalog::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

impl PlaybackError {
    pub fn engine(engine: &str, message: impl Into<String>) -> Self {
        PlaybackError::Engine(engine.to_string(), message.into())
    }

    pub fn unknown_media_item(id: &str) -> Self {
        PlaybackError::UnknownMediaItem(id.to_string())
    }

    pub fn command_not_available(command: &str) -> Self {
        PlaybackError::CommandNotAvailable(command.to_string())
    }

    pub fn equalizer(message: impl Into<String>) -> Self {
        PlaybackError::Equalizer(message.into())
    }
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
