//! Stream catalog for the nederadio streaming core
//!
//! This crate owns everything that happens before a stream reaches a player:
//!
//! - **Catalog sources**: the remote JSON catalog ([`HttpStreamCatalog`]) or a
//!   static list ([`StaticStreamCatalog`]) for the ambient-sound variant
//! - **Reconciliation**: [`StreamRepository`] merges the active stream, the
//!   live track and the favorite set into immutable snapshots, skipping
//!   emissions when nothing changed
//! - **Settings**: favorites, last played stream and equalizer choice
//!   ([`SettingsRepository`])
//! - **Browse tree**: [`StreamLibrary`] / [`Tree`] for media browsers, with
//!   search
//! - **Use cases**: the small operations the playback layer builds on
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use radioconfig::get_config;
//! use radiocatalog::{
//!     CatalogConfigExt, ConfigSettingsRepository, StreamLibrary, StreamRepository, TcpProbe,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = get_config();
//!     let settings = Arc::new(ConfigSettingsRepository::new(config.clone())?);
//!     let network = Arc::new(TcpProbe::new(config.get_connectivity_probe()?));
//!     let repository = StreamRepository::new(config.create_stream_catalog()?, network, settings);
//!
//!     repository.force_update().await;
//!     let library = StreamLibrary::from_config(&repository, &config)?;
//!     if let Some(tree) = library.tree() {
//!         for item in tree.all_playable_items() {
//!             println!("{}", item.station_name().unwrap_or_default());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config_ext;
pub mod error;
pub mod failure;
pub mod library;
pub mod media;
pub mod models;
pub mod network;
pub mod repository;
pub mod settings;
pub mod source;
pub mod usecases;

pub use client::{ClientBuilder, HttpStreamCatalog};
pub use config_ext::{AppVariant, CatalogConfigExt};
pub use error::{Error, Result};
pub use failure::Failure;
pub use library::{
    MediaNode, StreamLibrary, TabLabels, Tree, FAVORITES_ID, RECENT_ID, ROOT_ID, STATIONS_ID,
};
pub use media::{MediaItem, MediaKind, MediaMetadata};
pub use models::{ActiveStream, Stream, StreamResponse, Streams};
pub use network::{ManualNetwork, NetworkManager, TcpProbe};
pub use repository::StreamRepository;
pub use settings::{ConfigSettingsRepository, EqualizerSettings, SettingsRepository};
pub use source::{StaticStreamCatalog, StreamCatalog};
pub use usecases::{
    AddToFavorites, GetActiveStream, GetAllStreams, GetEqualizerSettings, GetFavorites,
    GetLastPlayedId, GetSuccessfulStreams, RemoveFromFavorites, SetActiveStream,
    SetEqualizerSettings, SetLastPlayedId, SetStreamTrack, UpdateStreams,
};
