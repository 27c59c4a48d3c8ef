//! Extension pour intégrer le catalogue dans radioconfig
//!
//! This module provides the `CatalogConfigExt` trait which adds the catalog
//! and persisted-settings keys to `radioconfig::Config`.
//!
//! # Keys
//!
//! - `app.variant`: `radio` (HTTP catalog) or `ambient` (static catalog)
//! - `catalog.*`: endpoint, timeout, user agent, connectivity probe, static list
//! - `library.*`: browse tab labels
//! - `messages.*`: user-facing failure messages
//! - `settings.*`: last played id, favorites, equalizer
//!
//! # Example
//!
//! ```no_run
//! use radioconfig::get_config;
//! use radiocatalog::CatalogConfigExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = get_config();
//! let catalog = config.create_stream_catalog()?;
//! println!("Catalog source: {}", catalog.name());
//! # Ok(())
//! # }
//! ```

use crate::client::{
    HttpStreamCatalog, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};
use crate::failure::Failure;
use crate::models::StreamResponse;
use crate::source::{StaticStreamCatalog, StreamCatalog};
use anyhow::{anyhow, Result};
use radioconfig::Config;
use serde_yaml::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_FAVORITES_TAB: &str = "Favorites";
pub const DEFAULT_STATIONS_TAB: &str = "Stations";

const LAST_PLAYED_ID: &[&str] = &["settings", "last_played_id"];
const LAST_PLAYED_INDEX: &[&str] = &["settings", "last_played_index"];
const FAVORITES: &[&str] = &["settings", "favorites"];
const EQUALIZER_ENABLED: &[&str] = &["settings", "equalizer", "enabled"];
const EQUALIZER_PRESET: &[&str] = &["settings", "equalizer", "preset"];

/// Which of the two app flavours this process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppVariant {
    /// Internet radio, catalog fetched over HTTP
    #[default]
    Radio,
    /// Ambient sounds, catalog held in configuration
    Ambient,
}

impl AppVariant {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "radio" => Some(AppVariant::Radio),
            "ambient" => Some(AppVariant::Ambient),
            _ => None,
        }
    }
}

/// Extension trait for catalog and settings configuration
pub trait CatalogConfigExt {
    // ========================================================================
    // Catalog
    // ========================================================================

    fn get_app_variant(&self) -> Result<AppVariant>;
    fn get_catalog_base_url(&self) -> Result<String>;
    fn get_catalog_timeout(&self) -> Result<Duration>;
    fn get_catalog_user_agent(&self) -> Result<String>;

    /// `host:port` probed to decide whether the network is up
    fn get_connectivity_probe(&self) -> Result<String>;

    /// Static stream list used by the ambient variant
    fn get_static_streams(&self) -> Result<Vec<StreamResponse>>;

    /// Builds the catalog source matching [`CatalogConfigExt::get_app_variant`]
    fn create_stream_catalog(&self) -> Result<Arc<dyn StreamCatalog>>;

    // ========================================================================
    // Labels and messages
    // ========================================================================

    fn get_favorites_tab_label(&self) -> Result<String>;
    fn get_stations_tab_label(&self) -> Result<String>;

    /// User-displayable message for a catalog failure
    fn get_failure_message(&self, failure: Failure) -> String;

    // ========================================================================
    // Persisted settings
    // ========================================================================

    /// Last played id; an empty value reads as `None`
    fn get_last_played_id(&self) -> Result<Option<String>>;
    fn set_last_played_id(&self, id: &str) -> Result<()>;

    /// Legacy numeric "last played" position, read only
    fn get_legacy_last_played_index(&self) -> Result<Option<usize>>;

    fn get_favorite_ids(&self) -> Result<Vec<String>>;
    fn set_favorite_ids(&self, ids: &[String]) -> Result<()>;

    fn get_equalizer_enabled(&self) -> Result<bool>;
    fn set_equalizer_enabled(&self, enabled: bool) -> Result<()>;
    fn get_equalizer_preset(&self) -> Result<i16>;
    fn set_equalizer_preset(&self, preset: i16) -> Result<()>;
}

impl CatalogConfigExt for Config {
    fn get_app_variant(&self) -> Result<AppVariant> {
        let raw = self.get_string_or(&["app", "variant"], "radio");
        match AppVariant::parse(&raw) {
            Some(variant) => Ok(variant),
            None => {
                warn!(variant = %raw, "Unknown app variant, using radio");
                Ok(AppVariant::Radio)
            }
        }
    }

    fn get_catalog_base_url(&self) -> Result<String> {
        Ok(self.get_string_or(&["catalog", "base_url"], DEFAULT_BASE_URL))
    }

    fn get_catalog_timeout(&self) -> Result<Duration> {
        let secs = self.get_u64_or(&["catalog", "timeout_secs"], DEFAULT_REQUEST_TIMEOUT_SECS);
        Ok(Duration::from_secs(secs))
    }

    fn get_catalog_user_agent(&self) -> Result<String> {
        Ok(self.get_string_or(&["catalog", "user_agent"], DEFAULT_USER_AGENT))
    }

    fn get_connectivity_probe(&self) -> Result<String> {
        match self.get_value(&["catalog", "connectivity_probe"]) {
            Ok(Value::String(s)) if !s.is_empty() => Ok(s),
            _ => {
                // Par défaut on sonde l'hôte du catalogue
                let base = url::Url::parse(&self.get_catalog_base_url()?)?;
                let host = base
                    .host_str()
                    .ok_or_else(|| anyhow!("catalog base url has no host"))?;
                let port = base.port_or_known_default().unwrap_or(80);
                Ok(format!("{}:{}", host, port))
            }
        }
    }

    fn get_static_streams(&self) -> Result<Vec<StreamResponse>> {
        match self.get_value(&["catalog", "streams"]) {
            Ok(Value::Sequence(_)) => self.get_typed(&["catalog", "streams"]),
            _ => Ok(Vec::new()),
        }
    }

    fn create_stream_catalog(&self) -> Result<Arc<dyn StreamCatalog>> {
        Ok(match self.get_app_variant()? {
            AppVariant::Radio => Arc::new(
                HttpStreamCatalog::builder()
                    .base_url(self.get_catalog_base_url()?)
                    .timeout(self.get_catalog_timeout()?)
                    .user_agent(self.get_catalog_user_agent()?)
                    .build()?,
            ),
            AppVariant::Ambient => Arc::new(StaticStreamCatalog::new(self.get_static_streams()?)),
        })
    }

    fn get_favorites_tab_label(&self) -> Result<String> {
        Ok(self.get_string_or(&["library", "favorites_tab"], DEFAULT_FAVORITES_TAB))
    }

    fn get_stations_tab_label(&self) -> Result<String> {
        Ok(self.get_string_or(&["library", "stations_tab"], DEFAULT_STATIONS_TAB))
    }

    fn get_failure_message(&self, failure: Failure) -> String {
        self.get_string_or(&["messages", failure.message_key()], failure.default_message())
    }

    fn get_last_played_id(&self) -> Result<Option<String>> {
        let id = self.get_string_or(LAST_PLAYED_ID, "");
        Ok((!id.trim().is_empty()).then_some(id))
    }

    fn set_last_played_id(&self, id: &str) -> Result<()> {
        self.set_value(LAST_PLAYED_ID, Value::String(id.to_string()))
    }

    fn get_legacy_last_played_index(&self) -> Result<Option<usize>> {
        match self.get_value(LAST_PLAYED_INDEX) {
            Ok(Value::Number(n)) => Ok(n.as_u64().map(|i| i as usize)),
            _ => Ok(None),
        }
    }

    fn get_favorite_ids(&self) -> Result<Vec<String>> {
        Ok(self.get_string_list(FAVORITES))
    }

    fn set_favorite_ids(&self, ids: &[String]) -> Result<()> {
        self.set_string_list(FAVORITES, ids.iter().cloned())
    }

    fn get_equalizer_enabled(&self) -> Result<bool> {
        Ok(self.get_bool_or(EQUALIZER_ENABLED, false))
    }

    fn set_equalizer_enabled(&self, enabled: bool) -> Result<()> {
        self.set_value(EQUALIZER_ENABLED, Value::Bool(enabled))
    }

    fn get_equalizer_preset(&self) -> Result<i16> {
        let preset = self.get_i64_or(EQUALIZER_PRESET, 0);
        Ok(i16::try_from(preset).unwrap_or(0))
    }

    fn set_equalizer_preset(&self, preset: i16) -> Result<()> {
        self.set_i64(EQUALIZER_PRESET, preset as i64)
    }
}
