//! Playback layer for the nederadio streaming core
//!
//! - **Engines**: capability traits ([`PlaybackEngine`]) implemented by the
//!   host for the local decoder and the cast receiver
//! - **Composite player**: [`CompositePlayer`] routes every call to the
//!   active engine and replays the playlist on handover
//! - **Session**: [`PlaybackService`] owns the player in a single task and
//!   serves controllers, media browsers and the sleep timer
//! - **Controllers**: [`Controller`] and the [`StreamManager`] façade used
//!   by UI code
//!
//! # Example
//!
//! ```ignore
//! let (player, events) = CompositePlayer::new(local, cast, Capability::Local, "Casting");
//! let (session, task) = PlaybackService::start(SessionConfig::default(), player, events, deps);
//!
//! let manager = StreamManager::from_config(session.clone(), repository, settings, &config);
//! manager.initialize(Vec::new());
//! manager.stream_picked("3").await?;
//! ```

pub mod capabilities;
pub mod commands;
pub mod composite;
pub mod config_ext;
pub mod controller;
pub mod equalizer;
pub mod errors;
pub mod events;
pub mod manager;
pub mod model;
pub mod session;
pub mod sleep_timer;

#[cfg(test)]
mod test_support;

pub use capabilities::{
    EngineEventSink, PlaybackEngine, PlaybackStatus, PlaylistControl, TransportControl,
    VolumeControl,
};
pub use commands::{
    AvailableCommands, ControllerCommand, PlayerCommand, PlayerCommandCode, SessionCommand,
    SessionCommandCode, SessionResult,
};
pub use composite::{CompositePlayer, EngineEvents, ShadowState};
pub use config_ext::PlaybackConfigExt;
pub use controller::Controller;
pub use equalizer::{
    AudioEqualizer, EqualizerBand, EqualizerManager, EqualizerPresets, EqualizerState,
};
pub use errors::{PlaybackError, Result};
pub use events::EventBus;
pub use manager::{ManagerDeps, ManagerMessages, PlayerControls, StreamManager};
pub use model::{
    Capability, PlaybackState, PlayerEvent, PlayerEvents, PlayerSnapshot, StreamingError,
    TransitionReason,
};
pub use session::{PlaybackService, SessionConfig, SessionDeps, SessionHandle};
pub use sleep_timer::{format_sleep_timer, sleep_timer_option_ms, SleepTimer, SleepTimerState};
