//! Controller side of a playback session
//!
//! A [`Controller`] is what UI code and the stream manager hold. Its
//! requests go through the session task; its view of the player is the
//! latest [`PlayerSnapshot`] published by that task.

use crate::commands::{AvailableCommands, ControllerCommand, PlayerCommand, SessionResult};
use crate::errors::{PlaybackError, Result};
use crate::model::PlayerSnapshot;
use crate::session::SessionRequest;
use radiocatalog::MediaItem;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

#[derive(Clone)]
pub struct Controller {
    id: u64,
    requests: mpsc::Sender<SessionRequest>,
    snapshot: watch::Receiver<PlayerSnapshot>,
    available: AvailableCommands,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller").field("id", &self.id).finish()
    }
}

impl Controller {
    pub(crate) fn new(
        id: u64,
        requests: mpsc::Sender<SessionRequest>,
        snapshot: watch::Receiver<PlayerSnapshot>,
        available: AvailableCommands,
    ) -> Self {
        Self {
            id,
            requests,
            snapshot,
            available,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn available_commands(&self) -> &AvailableCommands {
        &self.available
    }

    pub async fn send_custom_command(&self, command: ControllerCommand) -> Result<SessionResult> {
        if !self.available.allows_session(command.code()) {
            return Err(PlaybackError::command_not_available(command.code().as_str()));
        }
        // Les URIs ne traversent pas la frontière du contrôleur
        let command = match command {
            ControllerCommand::StartStream { item } => ControllerCommand::StartStream {
                item: item.without_uri(),
            },
            other => other,
        };

        let (reply, rx) = oneshot::channel();
        self.requests
            .send(SessionRequest::Custom {
                controller_id: self.id,
                command,
                reply,
            })
            .await
            .map_err(|_| PlaybackError::SessionClosed)?;
        rx.await.map_err(|_| PlaybackError::SessionClosed)
    }

    async fn player_command(&self, command: PlayerCommand) -> Result<()> {
        let code = command.code();
        if !self.available.allows_player(code) {
            return Err(PlaybackError::command_not_available(code.as_str()));
        }
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(SessionRequest::Player {
                controller_id: self.id,
                command: command.stripped(),
                reply,
            })
            .await
            .map_err(|_| PlaybackError::SessionClosed)?;
        rx.await.map_err(|_| PlaybackError::SessionClosed)?
    }

    pub async fn play(&self) -> Result<()> {
        self.player_command(PlayerCommand::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.player_command(PlayerCommand::Pause).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.player_command(PlayerCommand::Stop).await
    }

    pub async fn prepare(&self) -> Result<()> {
        self.player_command(PlayerCommand::Prepare).await
    }

    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        self.player_command(PlayerCommand::SetVolume(volume)).await
    }

    pub async fn set_media_item(&self, item: MediaItem) -> Result<()> {
        self.player_command(PlayerCommand::SetMediaItem(item)).await
    }

    pub async fn set_media_items(
        &self,
        items: Vec<MediaItem>,
        start_index: usize,
        position_ms: u64,
    ) -> Result<()> {
        self.player_command(PlayerCommand::SetMediaItems {
            items,
            start_index,
            position_ms,
        })
        .await
    }

    pub async fn play_from_search(&self, query: &str) -> Result<()> {
        self.player_command(PlayerCommand::SetMediaItemsFromSearch {
            query: query.to_string(),
        })
        .await
    }

    pub async fn clear_media_items(&self) -> Result<()> {
        self.player_command(PlayerCommand::ClearMediaItems).await
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Follows every snapshot published by the session
    pub fn changes(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshot.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.snapshot.borrow().is_playing
    }

    pub fn current_media_id(&self) -> Option<String> {
        self.snapshot.borrow().current_media_id().map(str::to_string)
    }

    pub fn media_item_count(&self) -> usize {
        self.snapshot.borrow().media_item_count
    }

    pub fn content_position_ms(&self) -> u64 {
        self.snapshot.borrow().content_position_ms
    }

    /// Leaves the session; the session stops sending commands to us
    pub async fn disconnect(self) {
        debug!(controller_id = self.id, "Disconnecting controller");
        let _ = self
            .requests
            .send(SessionRequest::Disconnect {
                controller_id: self.id,
            })
            .await;
    }
}
