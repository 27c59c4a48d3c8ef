//! Playback session
//!
//! The session task owns the [`CompositePlayer`] and the sleep timer. Every
//! mutation reaches it as a message, so a single task ever calls
//! `switch_to` or `set_*` on the player:
//!
//! ```text
//! Controller ──SessionRequest──▶ ┌──────────────┐ ──SessionCommand──▶ controllers
//! SessionHandle ────────────────▶│ session task │ ──PlayerSnapshot──▶ watch
//! engines ──(Capability, batch)─▶└──────────────┘
//! ```
//!
//! Browse requests (root, children, item, search) do not touch the player
//! and are answered by [`SessionHandle`] directly from the library.

use crate::commands::{
    AvailableCommands, ControllerCommand, PlayerCommand, SessionCommand, SessionResult,
};
use crate::composite::{CompositePlayer, EngineEvents};
use crate::capabilities::PlaybackEngine;
use crate::config_ext::{
    PlaybackConfigExt, DEFAULT_CASTING_LABEL, DEFAULT_SLEEP_TIMER_NOT_ALLOWED,
};
use crate::controller::Controller;
use crate::equalizer::EqualizerManager;
use crate::errors::{PlaybackError, Result};
use crate::model::{Capability, PlayerEvent, PlayerEvents, PlayerSnapshot};
use crate::sleep_timer::{
    SleepTimer, TimerTick, DEFAULT_FADE_CUTOFF_SECS, MAX_VOLUME, SLEEP_TIMER_INTERVAL,
};
use radiocatalog::{
    GetLastPlayedId, MediaItem, MediaMetadata, SetActiveStream, StreamLibrary, Tree, RECENT_ID,
};
use radioconfig::Config;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

const REQUEST_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub casting_label: String,
    pub fade_cutoff_secs: u64,
    pub timer_not_allowed_message: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            casting_label: DEFAULT_CASTING_LABEL.to_string(),
            fade_cutoff_secs: DEFAULT_FADE_CUTOFF_SECS,
            timer_not_allowed_message: DEFAULT_SLEEP_TIMER_NOT_ALLOWED.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            casting_label: config.get_casting_label()?,
            fade_cutoff_secs: config.get_fade_cutoff_secs()?,
            timer_not_allowed_message: config.get_sleep_timer_not_allowed_message(),
        })
    }
}

/// Collaborators of the session task
#[derive(Clone)]
pub struct SessionDeps {
    pub library: StreamLibrary,
    pub set_active_stream: SetActiveStream,
    pub last_played: GetLastPlayedId,
    pub equalizer: Option<Arc<EqualizerManager>>,
}

pub(crate) enum SessionRequest {
    Connect {
        reply: oneshot::Sender<Connection>,
    },
    Disconnect {
        controller_id: u64,
    },
    Custom {
        controller_id: u64,
        command: ControllerCommand,
        reply: oneshot::Sender<SessionResult>,
    },
    Player {
        controller_id: u64,
        command: PlayerCommand,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Items already carrying their URIs (resumption, recent root)
    Load {
        items: Vec<MediaItem>,
        start_index: usize,
        play: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    CastAvailability {
        available: bool,
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

pub(crate) struct Connection {
    pub(crate) id: u64,
    pub(crate) available: AvailableCommands,
    pub(crate) commands: mpsc::UnboundedReceiver<SessionCommand>,
}

pub struct PlaybackService;

impl PlaybackService {
    /// Spawns the session task
    ///
    /// `engine_events` is the receiver returned with `player` by
    /// [`CompositePlayer::new`].
    pub fn start<L, C>(
        config: SessionConfig,
        player: CompositePlayer<L, C>,
        engine_events: EngineEvents,
        deps: SessionDeps,
    ) -> (SessionHandle, JoinHandle<()>)
    where
        L: PlaybackEngine,
        C: PlaybackEngine,
    {
        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(PlayerSnapshot::default());

        let handle = SessionHandle {
            requests: requests_tx,
            snapshot: snapshot_rx,
            library: deps.library.clone(),
            last_played: deps.last_played.clone(),
        };

        let session = PlaybackSession {
            timer: SleepTimer::new(config.fade_cutoff_secs),
            config,
            player,
            engine_events,
            engine_events_open: true,
            requests: requests_rx,
            controllers: HashMap::new(),
            next_controller_id: 1,
            snapshot: snapshot_tx,
            ticker: None,
            tasks: JoinSet::new(),
            deps,
        };
        let task = tokio::spawn(session.run());
        info!("Playback session started");
        (handle, task)
    }
}

/// Entry point to a running session
#[derive(Clone)]
pub struct SessionHandle {
    requests: mpsc::Sender<SessionRequest>,
    snapshot: watch::Receiver<PlayerSnapshot>,
    library: StreamLibrary,
    last_played: GetLastPlayedId,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionRequest,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(build(tx))
            .await
            .map_err(|_| PlaybackError::SessionClosed)?;
        rx.await.map_err(|_| PlaybackError::SessionClosed)
    }

    /// Connects a new controller
    ///
    /// The receiver yields the custom commands the session broadcasts; it
    /// ends when the session shuts down.
    pub async fn connect(&self) -> Result<(Controller, mpsc::UnboundedReceiver<SessionCommand>)> {
        let connection = self
            .request(|reply| SessionRequest::Connect { reply })
            .await?;
        let controller = Controller::new(
            connection.id,
            self.requests.clone(),
            self.snapshot.clone(),
            connection.available,
        );
        Ok((controller, connection.commands))
    }

    pub fn snapshot(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshot.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }

    /// A cast session appeared (`true`) or went away (`false`)
    ///
    /// Returns once the session has switched engines.
    pub async fn set_cast_available(&self, available: bool) -> Result<()> {
        self.request(|reply| SessionRequest::CastAvailability { available, reply })
            .await
    }

    /// Root of the browse tree
    ///
    /// For a "recent" request the last played station is loaded and
    /// prepared so that playback can resume right away.
    pub async fn library_root(&self, recent: bool) -> Result<MediaItem> {
        let tree = self.library.await_tree().await?;
        if !recent {
            return Ok(tree.root().clone());
        }
        match self.last_played_item(&tree).await? {
            Some(item) => self.load(vec![item], 0, false).await?,
            None => debug!("Nothing played yet, recent root is empty"),
        }
        Ok(tree.recent_root())
    }

    pub async fn children(&self, parent_id: &str) -> Result<Vec<MediaItem>> {
        let tree = self.library.await_tree().await?;
        if parent_id == RECENT_ID {
            return Ok(self.last_played_item(&tree).await?.into_iter().collect());
        }
        Ok(tree.children(parent_id)?)
    }

    pub async fn item(&self, media_id: &str) -> Result<MediaItem> {
        Ok(self.library.await_tree().await?.item(media_id)?)
    }

    /// Number of results for `query`
    pub async fn search(&self, query: &str) -> Result<usize> {
        Ok(self.library.await_tree().await?.search(Some(query)).len())
    }

    /// One page of results, pages start at 0
    pub async fn search_results(
        &self,
        query: &str,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<MediaItem>> {
        Ok(self
            .library
            .await_tree()
            .await?
            .search_page(Some(query), page, page_size))
    }

    /// Restores every station with the last played one selected
    pub async fn resume_playback(&self, play: bool) -> Result<()> {
        let tree = self.library.await_tree().await?;
        let items = tree.all_playable_items();
        let start_index = match self.last_played.execute().await? {
            Some(id) => items.iter().position(|i| i.media_id == id).unwrap_or(0),
            None => 0,
        };
        self.load(items, start_index, play).await
    }

    /// Stops the timer, releases the player and drops every controller
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| SessionRequest::Shutdown { reply })
            .await
    }

    async fn load(&self, items: Vec<MediaItem>, start_index: usize, play: bool) -> Result<()> {
        self.request(|reply| SessionRequest::Load {
            items,
            start_index,
            play,
            reply,
        })
        .await?
    }

    async fn last_played_item(&self, tree: &Tree) -> Result<Option<MediaItem>> {
        Ok(self
            .last_played
            .execute()
            .await?
            .and_then(|id| tree.last_played(&id).ok()))
    }
}

enum Wake {
    Request(Option<SessionRequest>),
    Engine(Option<(Capability, PlayerEvents)>),
    Tick,
    TaskDone,
}

struct PlaybackSession<L, C> {
    config: SessionConfig,
    player: CompositePlayer<L, C>,
    engine_events: EngineEvents,
    engine_events_open: bool,
    requests: mpsc::Receiver<SessionRequest>,
    controllers: HashMap<u64, mpsc::UnboundedSender<SessionCommand>>,
    next_controller_id: u64,
    snapshot: watch::Sender<PlayerSnapshot>,
    timer: SleepTimer,
    ticker: Option<Interval>,
    tasks: JoinSet<()>,
    deps: SessionDeps,
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

impl<L: PlaybackEngine, C: PlaybackEngine> PlaybackSession<L, C> {
    async fn run(mut self) {
        loop {
            // Les événements moteur passent avant les requêtes déjà en attente
            let wake = tokio::select! {
                biased;
                events = self.engine_events.recv(), if self.engine_events_open => Wake::Engine(events),
                request = self.requests.recv() => Wake::Request(request),
                _ = next_tick(&mut self.ticker) => Wake::Tick,
                _ = self.tasks.join_next(), if !self.tasks.is_empty() => Wake::TaskDone,
            };

            match wake {
                Wake::Request(Some(request)) => {
                    if !self.on_request(request) {
                        break;
                    }
                }
                Wake::Request(None) => {
                    debug!("Every session handle dropped");
                    self.teardown();
                    break;
                }
                Wake::Engine(Some((capability, batch))) => self.on_engine_events(capability, batch),
                Wake::Engine(None) => self.engine_events_open = false,
                Wake::Tick => self.on_timer_tick(),
                Wake::TaskDone => {}
            }
            self.publish_snapshot();
        }
        info!("Playback session stopped");
    }

    /// Returns `false` once the session is shut down
    fn on_request(&mut self, request: SessionRequest) -> bool {
        match request {
            SessionRequest::Connect { reply } => self.on_connect(reply),
            SessionRequest::Disconnect { controller_id } => {
                if self.controllers.remove(&controller_id).is_some() {
                    info!(controller_id, "Controller disconnected");
                }
            }
            SessionRequest::Custom {
                controller_id,
                command,
                reply,
            } => {
                debug!(controller_id, command = command.code().as_str(), "Custom command");
                let result = self.on_custom_command(command);
                self.publish_snapshot();
                let _ = reply.send(result);
            }
            SessionRequest::Player {
                controller_id,
                command,
                reply,
            } => {
                debug!(controller_id, command = command.code().as_str(), "Player command");
                let result = self.on_player_command(command);
                if let Err(e) = &result {
                    warn!(controller_id, "Player command failed: {}", e);
                }
                self.publish_snapshot();
                let _ = reply.send(result);
            }
            SessionRequest::Load {
                items,
                start_index,
                play,
                reply,
            } => {
                let result = self.load(items, start_index, 0, play);
                self.publish_snapshot();
                let _ = reply.send(result);
            }
            SessionRequest::CastAvailability { available, reply } => {
                self.on_cast_availability(available);
                self.publish_snapshot();
                let _ = reply.send(());
            }
            SessionRequest::Shutdown { reply } => {
                self.teardown();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn on_connect(&mut self, reply: oneshot::Sender<Connection>) {
        let id = self.next_controller_id;
        self.next_controller_id += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Connection {
            id,
            available: AvailableCommands::granted(),
            commands: rx,
        };
        if reply.send(connection).is_err() {
            return;
        }
        info!(controller_id = id, "Controller connected");

        // Poster le titre courant au nouveau contrôleur
        if self.player.capability() == Capability::Local {
            if let Some(title) = self.player.media_metadata().title {
                let _ = tx.send(SessionCommand::TrackUpdated { title });
            }
        }
        self.controllers.insert(id, tx);
    }

    fn broadcast(&mut self, command: SessionCommand) {
        self.controllers
            .retain(|_, tx| tx.send(command.clone()).is_ok());
    }

    fn on_custom_command(&mut self, command: ControllerCommand) -> SessionResult {
        match command {
            ControllerCommand::StartTimer { ms } if ms > 0 => {
                if !self.player.is_playing() {
                    info!(ms, "Sleep timer refused, nothing is playing");
                    return SessionResult::Rejected(self.config.timer_not_allowed_message.clone());
                }
                self.start_sleep_timer(ms);
                SessionResult::Success
            }
            ControllerCommand::StartTimer { .. } => {
                self.stop_sleep_timer();
                SessionResult::Success
            }
            ControllerCommand::StartStream { item } => {
                match self.hydrate(&item).and_then(|item| self.play_item(item)) {
                    Ok(()) => SessionResult::Success,
                    Err(e) => SessionResult::Error(e.to_string()),
                }
            }
            ControllerCommand::SetMediaUri { uri } => {
                let item = MediaItem {
                    media_id: uri.clone(),
                    uri: Some(uri),
                    metadata: MediaMetadata {
                        is_playable: true,
                        ..Default::default()
                    },
                };
                match self.play_item(item) {
                    Ok(()) => SessionResult::Success,
                    Err(e) => SessionResult::Error(e.to_string()),
                }
            }
        }
    }

    fn play_item(&mut self, item: MediaItem) -> Result<()> {
        info!(media_id = %item.media_id, "Starting stream");
        self.player.set_media_item(item)?;
        self.player.prepare()?;
        self.player.play()
    }

    fn on_player_command(&mut self, command: PlayerCommand) -> Result<()> {
        match command {
            PlayerCommand::Play => self.player.play(),
            PlayerCommand::Pause => self.player.pause(),
            PlayerCommand::Stop => self.player.stop(),
            PlayerCommand::Prepare => self.player.prepare(),
            PlayerCommand::SetVolume(volume) => self.player.set_volume(volume),
            PlayerCommand::SetMediaItem(item) => self.set_requested_items(vec![item], 0, 0),
            PlayerCommand::SetMediaItems {
                items,
                start_index,
                position_ms,
            } => self.set_requested_items(items, start_index, position_ms),
            PlayerCommand::SetMediaItemsFromSearch { query } => {
                let items = self.tree()?.search(Some(&query));
                info!(%query, results = items.len(), "Playing search results");
                self.load(items, 0, 0, false)
            }
            PlayerCommand::ClearMediaItems => self.player.clear_media_items(),
        }
    }

    fn tree(&self) -> Result<Tree> {
        self.deps
            .library
            .tree()
            .ok_or(PlaybackError::Catalog(radiocatalog::Error::NotLoaded))
    }

    /// Looks the playable URI of a stripped item up in the tree
    fn hydrate(&self, item: &MediaItem) -> Result<MediaItem> {
        match self.deps.library.tree().map(|tree| tree.item(&item.media_id)) {
            Some(Ok(found)) => Ok(found),
            _ if item.uri.is_some() => Ok(item.clone()),
            _ => Err(PlaybackError::unknown_media_item(&item.media_id)),
        }
    }

    /// Items coming from a controller have lost their URIs
    ///
    /// A single item selects that station inside the full list; several
    /// items are mapped one by one, unknown ids being skipped.
    fn set_requested_items(
        &mut self,
        items: Vec<MediaItem>,
        start_index: usize,
        position_ms: u64,
    ) -> Result<()> {
        let tree = self.tree()?;

        if let [single] = items.as_slice() {
            let all = tree.all_playable_items();
            let index = all
                .iter()
                .position(|i| i.media_id == single.media_id)
                .ok_or_else(|| PlaybackError::unknown_media_item(&single.media_id))?;
            return self.load(all, index, position_ms, false);
        }

        let requested = items.len();
        let hydrated: Vec<MediaItem> = items
            .iter()
            .filter_map(|item| match tree.item(&item.media_id) {
                Ok(found) => Some(found),
                Err(_) => {
                    warn!(media_id = %item.media_id, "Skipping unknown media item");
                    None
                }
            })
            .collect();
        if hydrated.len() != requested {
            debug!(requested, kept = hydrated.len(), "Playlist partially hydrated");
        }
        let start_index = start_index.min(hydrated.len().saturating_sub(1));
        self.load(hydrated, start_index, position_ms, false)
    }

    fn load(
        &mut self,
        items: Vec<MediaItem>,
        start_index: usize,
        position_ms: u64,
        play: bool,
    ) -> Result<()> {
        self.player.set_media_items(items, start_index, position_ms)?;
        self.player.prepare()?;
        if play {
            self.player.play()?;
        }
        Ok(())
    }

    fn on_cast_availability(&mut self, available: bool) {
        let target = if available {
            Capability::Cast
        } else {
            Capability::Local
        };
        if let Err(e) = self.player.switch_to(target) {
            warn!(capability = target.as_str(), "Capability switch failed: {}", e);
            self.broadcast(SessionCommand::StreamError);
        }
        if let Some(equalizer) = &self.deps.equalizer {
            equalizer.on_casting_status_changed(available);
        }
    }

    fn on_engine_events(&mut self, capability: Capability, batch: PlayerEvents) {
        let Some(batch) = self.player.handle_engine_events(capability, batch) else {
            return;
        };

        for event in batch.iter() {
            match event {
                PlayerEvent::MediaItemTransition {
                    item: Some(item), ..
                } if !item.is_empty() => {
                    self.broadcast(SessionCommand::MediaItemUpdated { item: item.clone() });
                    self.remember_active(item.media_id.clone());
                }
                PlayerEvent::MediaMetadataChanged(metadata) if capability == Capability::Local => {
                    if let Some(title) = &metadata.title {
                        self.broadcast(SessionCommand::TrackUpdated {
                            title: title.clone(),
                        });
                    }
                }
                PlayerEvent::PlayerError(_) => self.broadcast(SessionCommand::StreamError),
                _ => {}
            }
        }

        if batch.stopped_without_transition() && !self.player.is_playing() && self.timer.is_running() {
            info!("Playback stopped, cancelling sleep timer");
            self.stop_sleep_timer();
        }
    }

    fn remember_active(&mut self, media_id: String) {
        let set_active = self.deps.set_active_stream.clone();
        self.tasks.spawn(async move {
            if let Err(e) = set_active.execute(&media_id).await {
                warn!(%media_id, "Could not store active stream: {}", e);
            }
        });
    }

    fn start_sleep_timer(&mut self, ms: i64) {
        // Un minuteur relancé pendant le fondu repart à plein volume
        if self.timer.is_running() {
            if let Err(e) = self.player.set_volume(MAX_VOLUME) {
                warn!("Could not reset volume: {}", e);
            }
        }
        let Some(tick) = self.timer.start(ms) else {
            return;
        };
        info!(ms, "Sleep timer started");
        let mut ticker = interval_at(Instant::now() + SLEEP_TIMER_INTERVAL, SLEEP_TIMER_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        self.apply_tick(tick);
    }

    fn stop_sleep_timer(&mut self) {
        self.timer.cancel();
        self.ticker = None;
        self.broadcast(SessionCommand::TimerUpdated { remaining_ms: 0 });
        if let Err(e) = self.player.set_volume(MAX_VOLUME) {
            warn!("Could not reset volume: {}", e);
        }
    }

    fn on_timer_tick(&mut self) {
        if let Some(tick) = self.timer.tick() {
            self.apply_tick(tick);
        }
        if !self.timer.is_running() {
            self.ticker = None;
        }
    }

    fn apply_tick(&mut self, tick: TimerTick) {
        self.broadcast(SessionCommand::TimerUpdated {
            remaining_ms: tick.remaining_ms,
        });
        if tick.finished {
            info!("Sleep timer finished, pausing");
            if let Err(e) = self.player.pause() {
                warn!("Could not pause: {}", e);
            }
        }
        if let Some(volume) = tick.volume {
            if let Err(e) = self.player.set_volume(volume) {
                warn!(volume, "Could not set volume: {}", e);
            }
        }
    }

    fn publish_snapshot(&self) {
        let current_item = self.player.current_media_item();
        let snapshot = PlayerSnapshot {
            capability: self.player.capability(),
            is_playing: self.player.is_playing(),
            playback_state: self.player.playback_state(),
            title: current_item
                .as_ref()
                .and_then(|item| item.metadata.title.clone()),
            current_item,
            current_index: self.player.current_media_item_index(),
            media_item_count: self.player.media_item_count(),
            content_position_ms: self.player.content_position_ms(),
            volume: self.player.volume(),
            sleep_timer_ms: self.timer.remaining_ms(),
        };
        self.snapshot.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    fn teardown(&mut self) {
        if self.timer.is_running() {
            self.stop_sleep_timer();
        }
        self.timer.cancel();
        self.ticker = None;
        self.player.release();
        self.controllers.clear();
        self.tasks.abort_all();
        self.snapshot.send_replace(PlayerSnapshot::default());
        info!("Playback session torn down");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::test_support::{FakeEngine, FakeEngineHandle};
    use radiocatalog::{
        ConfigSettingsRepository, ManualNetwork, SettingsRepository, StaticStreamCatalog,
        StreamRepository, StreamResponse, TabLabels, STATIONS_ID,
    };
    use std::time::Duration;

    pub(crate) struct Fixture {
        pub(crate) _dir: tempfile::TempDir,
        pub(crate) settings: Arc<ConfigSettingsRepository>,
        pub(crate) repository: Arc<StreamRepository>,
        pub(crate) handle: SessionHandle,
        pub(crate) task: JoinHandle<()>,
        pub(crate) local: FakeEngineHandle,
        pub(crate) cast: FakeEngineHandle,
    }

    fn entries() -> Vec<StreamResponse> {
        ["1", "2", "3"]
            .iter()
            .map(|id| StreamResponse {
                id: id.to_string(),
                name: format!("Station {}", id),
                url: format!("u{}", id),
                image: String::new(),
            })
            .collect()
    }

    pub(crate) async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(Config::load_config(dir.path().to_str().unwrap()).unwrap());
        let settings = Arc::new(ConfigSettingsRepository::new(config).unwrap());
        let repository = StreamRepository::new(
            Arc::new(StaticStreamCatalog::new(entries())),
            Arc::new(ManualNetwork::new(true)),
            settings.clone(),
        );
        repository.force_update().await;

        let (local, local_handle) = FakeEngine::new("local");
        let (cast, cast_handle) = FakeEngine::new("cast");
        let (player, events) = CompositePlayer::new(local, cast, Capability::Local, "Casting");
        let deps = SessionDeps {
            library: StreamLibrary::new(&repository, TabLabels::default()),
            set_active_stream: SetActiveStream::new(settings.clone(), repository.clone()),
            last_played: GetLastPlayedId::new(settings.clone()),
            equalizer: None,
        };
        let (handle, task) = PlaybackService::start(SessionConfig::default(), player, events, deps);

        Fixture {
            _dir: dir,
            settings,
            repository,
            handle,
            task,
            local: local_handle,
            cast: cast_handle,
        }
    }

    /// Next command accepted by `keep`
    pub(crate) async fn next_command(
        rx: &mut mpsc::UnboundedReceiver<SessionCommand>,
        mut keep: impl FnMut(&SessionCommand) -> bool,
    ) -> SessionCommand {
        loop {
            let command = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("no session command")
                .expect("session closed");
            if keep(&command) {
                return command;
            }
        }
    }

    fn is_timer(command: &SessionCommand) -> bool {
        matches!(command, SessionCommand::TimerUpdated { .. })
    }

    async fn start_stream(controller: &Controller, id: &str) {
        let item = MediaItem {
            media_id: id.to_string(),
            ..Default::default()
        };
        let result = controller
            .send_custom_command(ControllerCommand::StartStream { item })
            .await
            .unwrap();
        assert_eq!(result, SessionResult::Success);
    }

    #[tokio::test]
    async fn test_start_stream_rehydrates_uri() {
        let fx = fixture().await;
        let (controller, _commands) = fx.handle.connect().await.unwrap();
        fx.local.take_calls();

        start_stream(&controller, "2").await;
        assert_eq!(
            fx.local.take_calls(),
            vec!["stop", "set_item:2:", "prepare", "play"]
        );
        assert_eq!(fx.local.items()[0].uri.as_deref(), Some("u2"));
        assert!(fx.local.is_playing());
    }

    #[tokio::test]
    async fn test_start_stream_unknown_item() {
        let fx = fixture().await;
        let (controller, _commands) = fx.handle.connect().await.unwrap();
        let item = MediaItem {
            media_id: "nope".to_string(),
            ..Default::default()
        };
        let result = controller
            .send_custom_command(ControllerCommand::StartStream { item })
            .await
            .unwrap();
        assert!(matches!(result, SessionResult::Error(_)));
    }

    #[tokio::test]
    async fn test_timer_rejected_when_not_playing() {
        let fx = fixture().await;
        let (controller, mut commands) = fx.handle.connect().await.unwrap();

        let result = controller
            .send_custom_command(ControllerCommand::StartTimer { ms: 60_000 })
            .await
            .unwrap();
        assert_eq!(
            result,
            SessionResult::Rejected(DEFAULT_SLEEP_TIMER_NOT_ALLOWED.to_string())
        );
        assert!(commands.try_recv().is_err());
        assert_eq!(controller.snapshot().sleep_timer_ms, None);
    }

    #[tokio::test]
    async fn test_disarm_while_stopped_resets_volume() {
        let fx = fixture().await;
        let (controller, mut commands) = fx.handle.connect().await.unwrap();

        let result = controller
            .send_custom_command(ControllerCommand::StartTimer { ms: 0 })
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(
            next_command(&mut commands, is_timer).await,
            SessionCommand::TimerUpdated { remaining_ms: 0 }
        );
        assert_eq!(fx.local.volume(), MAX_VOLUME);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_counts_down_fades_and_pauses() {
        let fx = fixture().await;
        let (controller, mut commands) = fx.handle.connect().await.unwrap();
        start_stream(&controller, "1").await;

        controller
            .send_custom_command(ControllerCommand::StartTimer { ms: 3_000 })
            .await
            .unwrap();

        assert_eq!(
            next_command(&mut commands, is_timer).await,
            SessionCommand::TimerUpdated { remaining_ms: 3_000 }
        );
        assert_eq!(fx.local.volume(), 0.1);

        assert_eq!(
            next_command(&mut commands, is_timer).await,
            SessionCommand::TimerUpdated { remaining_ms: 2_000 }
        );
        assert_eq!(
            next_command(&mut commands, is_timer).await,
            SessionCommand::TimerUpdated { remaining_ms: 1_000 }
        );
        assert_eq!(
            next_command(&mut commands, is_timer).await,
            SessionCommand::TimerUpdated { remaining_ms: 0 }
        );

        // The pause issued by the timer does not produce a second reset
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!fx.local.is_playing());
        assert_eq!(fx.local.volume(), MAX_VOLUME);
        while let Ok(command) = commands.try_recv() {
            assert!(!is_timer(&command), "unexpected {:?}", command);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_during_fade_restores_volume() {
        let fx = fixture().await;
        let (controller, _commands) = fx.handle.connect().await.unwrap();
        start_stream(&controller, "1").await;

        controller
            .send_custom_command(ControllerCommand::StartTimer { ms: 10_000 })
            .await
            .unwrap();
        assert!(fx.local.volume() < MAX_VOLUME);

        let result = controller
            .send_custom_command(ControllerCommand::StartTimer { ms: 600_000 })
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(fx.local.volume(), MAX_VOLUME);
        assert_eq!(controller.snapshot().sleep_timer_ms, Some(600_000));

        // Les ticks suivants restent hors du fondu
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        controller.prepare().await.unwrap();
        assert_eq!(fx.local.volume(), MAX_VOLUME);
    }

    #[tokio::test]
    async fn test_external_stop_cancels_timer() {
        let fx = fixture().await;
        let (controller, mut commands) = fx.handle.connect().await.unwrap();
        start_stream(&controller, "1").await;
        controller
            .send_custom_command(ControllerCommand::StartTimer { ms: 600_000 })
            .await
            .unwrap();
        assert_eq!(
            next_command(&mut commands, is_timer).await,
            SessionCommand::TimerUpdated {
                remaining_ms: 600_000
            }
        );

        fx.local.stop_externally();
        assert_eq!(
            next_command(&mut commands, is_timer).await,
            SessionCommand::TimerUpdated { remaining_ms: 0 }
        );
    }

    #[tokio::test]
    async fn test_track_updated_only_from_local() {
        let fx = fixture().await;
        let (controller, mut commands) = fx.handle.connect().await.unwrap();
        start_stream(&controller, "1").await;

        fx.local.emit_title("Song A");
        assert_eq!(
            next_command(&mut commands, |c| matches!(c, SessionCommand::TrackUpdated { .. }))
                .await,
            SessionCommand::TrackUpdated {
                title: "Song A".to_string()
            }
        );

        fx.handle.set_cast_available(true).await.unwrap();
        fx.cast.emit_title("Casting");
        fx.local.emit_title("Song B");
        // Barrier: a round trip through the session after both emissions
        controller.prepare().await.unwrap();
        while let Ok(command) = commands.try_recv() {
            assert!(
                !matches!(command, SessionCommand::TrackUpdated { .. }),
                "unexpected {:?}",
                command
            );
        }
    }

    #[tokio::test]
    async fn test_transition_sets_active_stream() {
        let fx = fixture().await;
        let (controller, mut commands) = fx.handle.connect().await.unwrap();
        start_stream(&controller, "3").await;

        match next_command(&mut commands, |c| {
            matches!(c, SessionCommand::MediaItemUpdated { .. })
        })
        .await
        {
            SessionCommand::MediaItemUpdated { item } => assert_eq!(item.media_id, "3"),
            other => panic!("unexpected {:?}", other),
        }

        let mut active = fx.repository.streams();
        tokio::time::timeout(
            Duration::from_secs(5),
            active.wait_for(|s| {
                s.as_success()
                    .map(|list| list.iter().any(|st| st.id == "3" && st.is_active))
                    .unwrap_or(false)
            }),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(
            GetLastPlayedId::new(fx.settings.clone())
                .execute()
                .await
                .unwrap()
                .as_deref(),
            Some("3")
        );
    }

    #[tokio::test]
    async fn test_player_error_becomes_stream_error() {
        let fx = fixture().await;
        let (_controller, mut commands) = fx.handle.connect().await.unwrap();
        fx.local
            .emit(PlayerEvents::single(PlayerEvent::PlayerError("403".into())));
        assert_eq!(
            next_command(&mut commands, |c| matches!(c, SessionCommand::StreamError)).await,
            SessionCommand::StreamError
        );
    }

    #[tokio::test]
    async fn test_set_media_items_are_rehydrated() {
        let fx = fixture().await;
        let (controller, _commands) = fx.handle.connect().await.unwrap();

        // Un seul item: toute la liste, positionnée sur l'item choisi
        controller
            .set_media_item(MediaItem::from_stream(&radiocatalog::Stream::new(
                "2", "ignored", "Station 2", "",
            )))
            .await
            .unwrap();
        let items = fx.local.items();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i.uri.is_some()));
        assert_eq!(controller.snapshot().current_media_id(), Some("2"));

        // Plusieurs items: chacun retrouvé, les inconnus ignorés
        let requested = ["3", "nope", "1"]
            .iter()
            .map(|id| MediaItem {
                media_id: id.to_string(),
                ..Default::default()
            })
            .collect();
        controller.set_media_items(requested, 0, 0).await.unwrap();
        let ids: Vec<String> = fx.local.items().into_iter().map(|i| i.media_id).collect();
        assert_eq!(ids, vec!["3", "1"]);
        assert_eq!(fx.local.items()[1].uri.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn test_search_playlist() {
        let fx = fixture().await;
        let (controller, _commands) = fx.handle.connect().await.unwrap();
        controller.play_from_search("station 3").await.unwrap();
        let ids: Vec<String> = fx.local.items().into_iter().map(|i| i.media_id).collect();
        assert_eq!(ids, vec!["3"]);
    }

    #[tokio::test]
    async fn test_resumption_uses_last_played() {
        let fx = fixture().await;
        fx.settings.set_last_played_id("2").await.unwrap();

        fx.handle.resume_playback(false).await.unwrap();
        assert_eq!(fx.local.items().len(), 3);
        assert!(fx.local.calls().contains(&"set_items:3@1".to_string()));
        assert!(fx.local.calls().contains(&"prepare".to_string()));
        assert!(!fx.local.is_playing());
    }

    #[tokio::test]
    async fn test_browse() {
        let fx = fixture().await;
        let root = fx.handle.library_root(false).await.unwrap();
        let tabs = fx.handle.children(&root.media_id).await.unwrap();
        assert_eq!(tabs.len(), 1);
        assert_eq!(fx.handle.children(STATIONS_ID).await.unwrap().len(), 3);
        assert_eq!(fx.handle.item("1").await.unwrap().uri.as_deref(), Some("u1"));
        assert_eq!(fx.handle.search("station").await.unwrap(), 3);
        assert_eq!(
            fx.handle.search_results("station", 1, 2).await.unwrap().len(),
            1
        );
        assert!(fx.handle.children(RECENT_ID).await.unwrap().is_empty());

        fx.settings.set_last_played_id("3").await.unwrap();
        let recent = fx.handle.library_root(true).await.unwrap();
        assert_eq!(recent.media_id, RECENT_ID);
        assert_eq!(fx.local.items()[0].media_id, "3");
        let children = fx.handle.children(RECENT_ID).await.unwrap();
        assert_eq!(children[0].media_id, "3");
    }

    #[tokio::test]
    async fn test_cast_availability_switches_engine() {
        let fx = fixture().await;
        let (controller, _commands) = fx.handle.connect().await.unwrap();
        start_stream(&controller, "1").await;
        fx.cast.take_calls();

        fx.handle.set_cast_available(true).await.unwrap();
        assert_eq!(controller.snapshot().capability, Capability::Cast);
        assert!(fx.cast.calls().contains(&"set_item:1:Casting".to_string()));
        assert!(fx.cast.is_playing());
    }

    #[tokio::test]
    async fn test_post_connect_posts_title() {
        let fx = fixture().await;
        let (controller, _first) = fx.handle.connect().await.unwrap();
        start_stream(&controller, "1").await;
        fx.local.emit_title("Live");
        controller.prepare().await.unwrap();

        let (_second, mut commands) = fx.handle.connect().await.unwrap();
        assert_eq!(
            commands.try_recv().unwrap(),
            SessionCommand::TrackUpdated {
                title: "Live".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_shutdown_releases_everything() {
        let fx = fixture().await;
        let (controller, mut commands) = fx.handle.connect().await.unwrap();

        fx.handle.shutdown().await.unwrap();
        fx.task.await.unwrap();

        assert!(fx.local.calls().contains(&"release".to_string()));
        assert!(fx.cast.calls().contains(&"release".to_string()));
        assert!(!fx.local.is_attached());
        assert!(commands.recv().await.is_none());
        assert!(matches!(
            controller.play().await,
            Err(PlaybackError::SessionClosed)
        ));
        assert!(fx.handle.is_closed());
    }
}
