//! Extension pour intégrer la lecture dans radioconfig
//!
//! Keys read from `playback.*` and the playback-related `messages.*`.

use crate::sleep_timer::DEFAULT_FADE_CUTOFF_SECS;
use anyhow::Result;
use radioconfig::Config;

pub const DEFAULT_CASTING_LABEL: &str = "Casting to device";
pub const DEFAULT_SLEEP_TIMER_NOT_ALLOWED: &str = "Start a stream before setting a sleep timer";
pub const DEFAULT_STREAM_ERROR: &str = "This stream can not be played right now";

pub trait PlaybackConfigExt {
    /// Titre affiché à la place du titre en cours pendant le cast
    fn get_casting_label(&self) -> Result<String>;

    /// Seconds before the end of the sleep timer where the fade starts
    fn get_fade_cutoff_secs(&self) -> Result<u64>;

    fn get_sleep_timer_not_allowed_message(&self) -> String;

    fn get_stream_error_message(&self) -> String;
}

impl PlaybackConfigExt for Config {
    fn get_casting_label(&self) -> Result<String> {
        Ok(self.get_string_or(&["playback", "casting_label"], DEFAULT_CASTING_LABEL))
    }

    fn get_fade_cutoff_secs(&self) -> Result<u64> {
        Ok(self
            .get_u64_or(&["playback", "fade_cutoff_secs"], DEFAULT_FADE_CUTOFF_SECS)
            .max(1))
    }

    fn get_sleep_timer_not_allowed_message(&self) -> String {
        self.get_string_or(
            &["messages", "sleep_timer_not_allowed"],
            DEFAULT_SLEEP_TIMER_NOT_ALLOWED,
        )
    }

    fn get_stream_error_message(&self) -> String {
        self.get_string_or(&["messages", "stream_error"], DEFAULT_STREAM_ERROR)
    }
}
