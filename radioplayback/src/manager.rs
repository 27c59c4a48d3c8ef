//! Stream manager
//!
//! Controller-side façade used by the UI layer. Once bound to a session it
//! keeps the controller's playlist in step with the repository and turns
//! the session's custom commands into simple observable state:
//!
//! - [`StreamManager::active_stream`]: the active stream
//! - [`StreamManager::sleep_timer`]: remaining sleep time
//! - [`StreamManager::errors`]: one-shot user-facing errors
//!
//! Commands issued before the bind completes fail with
//! [`PlaybackError::NotBound`]; they are not queued.

use crate::commands::{ControllerCommand, SessionCommand, SessionResult};
use crate::config_ext::{
    PlaybackConfigExt, DEFAULT_SLEEP_TIMER_NOT_ALLOWED, DEFAULT_STREAM_ERROR,
};
use crate::controller::Controller;
use crate::errors::{PlaybackError, Result};
use crate::model::StreamingError;
use crate::session::SessionHandle;
use async_trait::async_trait;
use futures::future::join_all;
use radiocatalog::{
    ActiveStream, GetActiveStream, GetAllStreams, MediaItem, SetActiveStream, SetStreamTrack,
    SettingsRepository, Stream, StreamRepository,
};
use radioconfig::Config;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const ERROR_CHANNEL_CAPACITY: usize = 16;

/// UI surface driven by the bound controller
#[async_trait]
pub trait PlayerControls: Send + Sync {
    async fn attach(&self, controller: Controller);
}

/// Use cases the manager builds on
#[derive(Clone)]
pub struct ManagerDeps {
    pub get_all_streams: GetAllStreams,
    pub get_active_stream: GetActiveStream,
    pub set_active_stream: SetActiveStream,
    pub set_stream_track: SetStreamTrack,
}

impl ManagerDeps {
    pub fn new(repository: Arc<StreamRepository>, settings: Arc<dyn SettingsRepository>) -> Self {
        Self {
            get_all_streams: GetAllStreams::new(repository.clone()),
            get_active_stream: GetActiveStream::new(repository.clone()),
            set_active_stream: SetActiveStream::new(settings, repository.clone()),
            set_stream_track: SetStreamTrack::new(repository),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManagerMessages {
    pub sleep_timer_not_allowed: String,
    pub stream_error: String,
}

impl Default for ManagerMessages {
    fn default() -> Self {
        Self {
            sleep_timer_not_allowed: DEFAULT_SLEEP_TIMER_NOT_ALLOWED.to_string(),
            stream_error: DEFAULT_STREAM_ERROR.to_string(),
        }
    }
}

impl ManagerMessages {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sleep_timer_not_allowed: config.get_sleep_timer_not_allowed_message(),
            stream_error: config.get_stream_error_message(),
        }
    }
}

struct Inner {
    session: SessionHandle,
    deps: ManagerDeps,
    messages: ManagerMessages,
    controller: watch::Sender<Option<Controller>>,
    now_playing: watch::Sender<Option<MediaItem>>,
    sleep_timer: watch::Sender<Option<i64>>,
    errors: broadcast::Sender<StreamingError>,
    /// The next playlist replacement comes from a user pick and must play
    picked: AtomicBool,
}

pub struct StreamManager {
    inner: Arc<Inner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl StreamManager {
    pub fn new(session: SessionHandle, deps: ManagerDeps, messages: ManagerMessages) -> Self {
        let (controller, _) = watch::channel(None);
        let (now_playing, _) = watch::channel(None);
        let (sleep_timer, _) = watch::channel(None);
        let (errors, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                session,
                deps,
                messages,
                controller,
                now_playing,
                sleep_timer,
                errors,
                picked: AtomicBool::new(false),
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(
        session: SessionHandle,
        repository: Arc<StreamRepository>,
        settings: Arc<dyn SettingsRepository>,
        config: &Config,
    ) -> Self {
        Self::new(
            session,
            ManagerDeps::new(repository, settings),
            ManagerMessages::from_config(config),
        )
    }

    /// Binds a controller in the background
    ///
    /// Once bound, `controls` are attached, the sleep timer state is reset
    /// and the playlist starts following the repository.
    pub fn initialize(&self, controls: Vec<Arc<dyn PlayerControls>>) {
        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            let (controller, commands) = match inner.session.connect().await {
                Ok(bound) => bound,
                Err(e) => {
                    warn!("Could not bind to the playback session: {}", e);
                    return;
                }
            };
            info!(controller_id = controller.id(), "Stream manager bound");
            inner.controller.send_replace(Some(controller.clone()));

            join_all(controls.iter().map(|c| c.attach(controller.clone()))).await;
            inner.sleep_timer.send_replace(None);

            tokio::join!(inner.listen(commands), inner.reconcile(controller));
            debug!("Stream manager loops ended");
        });
        self.track(task);
    }

    fn track(&self, task: JoinHandle<()>) {
        match self.tasks.lock() {
            Ok(mut tasks) => {
                tasks.retain(|t| !t.is_finished());
                tasks.push(task);
            }
            Err(_) => task.abort(),
        }
    }

    /// Waits for the bind started by [`StreamManager::initialize`]
    pub async fn bound(&self) -> Result<Controller> {
        let mut rx = self.inner.controller.subscribe();
        let controller = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| PlaybackError::NotBound)?;
        controller.clone().ok_or(PlaybackError::NotBound)
    }

    pub fn controller(&self) -> Option<Controller> {
        self.inner.controller.borrow().clone()
    }

    /// The user picked a stream; playback follows the repository update
    pub async fn stream_picked(&self, id: &str) -> Result<()> {
        let current = self.inner.deps.get_active_stream.current();
        if current.stream().is_some_and(|stream| stream.id == id) {
            debug!(id, "Stream already active");
            return Ok(());
        }
        self.inner.picked.store(true, Ordering::SeqCst);
        if let Err(e) = self.inner.deps.set_active_stream.execute(id).await {
            self.inner.picked.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        Ok(())
    }

    /// Arms (`ms > 0`) or disarms the sleep timer
    pub async fn sleep_timer_set(&self, ms: i64) -> Result<()> {
        let controller = self.controller().ok_or(PlaybackError::NotBound)?;
        if ms > 0 && !controller.is_playing() {
            self.inner.reject_timer();
            return Err(PlaybackError::NotPlaying);
        }
        match controller
            .send_custom_command(ControllerCommand::StartTimer { ms })
            .await?
        {
            SessionResult::Success => Ok(()),
            SessionResult::Rejected(message) => {
                self.inner.emit_error(StreamingError::filled(message));
                Err(PlaybackError::NotPlaying)
            }
            SessionResult::Error(message) => {
                self.inner.emit_error(StreamingError::filled(message.clone()));
                Err(PlaybackError::engine("session", message))
            }
        }
    }

    pub fn active_stream(&self) -> watch::Receiver<ActiveStream> {
        self.inner.deps.get_active_stream.execute()
    }

    pub fn sleep_timer(&self) -> watch::Receiver<Option<i64>> {
        self.inner.sleep_timer.subscribe()
    }

    pub fn errors(&self) -> broadcast::Receiver<StreamingError> {
        self.inner.errors.subscribe()
    }

    /// Last item reported by the session
    pub fn now_playing(&self) -> watch::Receiver<Option<MediaItem>> {
        self.inner.now_playing.subscribe()
    }

    pub fn is_playing(&self) -> bool {
        self.controller()
            .map(|c| c.is_playing())
            .unwrap_or(false)
    }

    /// Stops every manager task and leaves the session
    pub async fn release(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
        if let Some(controller) = self.inner.controller.send_replace(None) {
            controller.disconnect().await;
        }
        self.inner.sleep_timer.send_replace(None);
        info!("Stream manager released");
    }
}

impl Drop for StreamManager {
    fn drop(&mut self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

impl Inner {
    /// Filled, then Empty unless the error must stay on screen
    fn emit_error(&self, error: StreamingError) {
        let persistent = error.is_persistent();
        let _ = self.errors.send(error);
        if !persistent {
            let _ = self.errors.send(StreamingError::Empty);
        }
    }

    fn reject_timer(&self) {
        info!("Sleep timer refused, nothing is playing");
        self.emit_error(StreamingError::filled(
            self.messages.sleep_timer_not_allowed.clone(),
        ));
    }

    async fn listen(&self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        while let Some(command) = commands.recv().await {
            match command {
                SessionCommand::TimerUpdated { remaining_ms } => {
                    self.sleep_timer
                        .send_replace((remaining_ms > 0).then_some(remaining_ms));
                }
                SessionCommand::TrackUpdated { title } => {
                    self.deps.set_stream_track.execute(Some(title));
                }
                SessionCommand::MediaItemUpdated { item } => {
                    self.now_playing.send_replace(Some(item));
                }
                SessionCommand::StreamError => {
                    warn!("Stream error reported by the session");
                    self.emit_error(StreamingError::filled(self.messages.stream_error.clone()));
                }
            }
        }
        debug!("Session command stream closed");
    }

    async fn reconcile(&self, controller: Controller) {
        let mut streams = self.deps.get_all_streams.execute();
        let mut last: Option<Vec<Stream>> = None;
        loop {
            let current = streams
                .borrow_and_update()
                .as_success()
                .map(<[Stream]>::to_vec);
            if let Some(list) = current {
                if last.as_ref() != Some(&list) {
                    self.apply(&controller, &list).await;
                    last = Some(list);
                }
            }
            if streams.changed().await.is_err() {
                break;
            }
        }
    }

    /// Replaces the whole playlist when the active stream moved
    async fn apply(&self, controller: &Controller, streams: &[Stream]) {
        let Some(active_index) = streams.iter().position(|s| s.is_active) else {
            return;
        };
        let active_id = streams[active_index].id.as_str();
        let current_id = controller.current_media_id().or_else(|| {
            self.now_playing
                .borrow()
                .as_ref()
                .map(|item| item.media_id.clone())
        });
        if current_id.as_deref() == Some(active_id) {
            return;
        }

        let items: Vec<MediaItem> = streams.iter().map(MediaItem::from_stream).collect();
        let position_ms = controller.content_position_ms();
        debug!(active_id, count = items.len(), "Replacing playlist");

        if let Err(e) = controller
            .set_media_items(items, active_index, position_ms)
            .await
        {
            warn!("Could not replace playlist: {}", e);
            return;
        }
        if let Err(e) = controller.prepare().await {
            warn!("Could not prepare playlist: {}", e);
        }
        if self.picked.swap(false, Ordering::SeqCst) {
            if let Err(e) = controller.play().await {
                warn!("Could not start playback: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::{fixture, Fixture};
    use std::time::Duration;

    async fn manager(fx: &Fixture) -> StreamManager {
        let manager = StreamManager::new(
            fx.handle.clone(),
            ManagerDeps::new(fx.repository.clone(), fx.settings.clone()),
            ManagerMessages::default(),
        );
        manager.initialize(Vec::new());
        tokio::time::timeout(Duration::from_secs(5), manager.bound())
            .await
            .unwrap()
            .unwrap();
        manager
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    async fn next_error(rx: &mut broadcast::Receiver<StreamingError>) -> StreamingError {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    struct RecordingControls {
        attached: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl PlayerControls for RecordingControls {
        async fn attach(&self, controller: Controller) {
            self.attached.lock().unwrap().push(controller.id());
        }
    }

    #[tokio::test]
    async fn test_initialize_attaches_controls() {
        let fx = fixture().await;
        let manager = StreamManager::new(
            fx.handle.clone(),
            ManagerDeps::new(fx.repository.clone(), fx.settings.clone()),
            ManagerMessages::default(),
        );
        let controls = Arc::new(RecordingControls {
            attached: Mutex::new(Vec::new()),
        });
        manager.initialize(vec![controls.clone()]);
        let controller = manager.bound().await.unwrap();

        wait_until(|| controls.attached.lock().unwrap().len() == 1).await;
        assert_eq!(controls.attached.lock().unwrap()[0], controller.id());
        assert_eq!(*manager.sleep_timer().borrow(), None);
    }

    #[tokio::test]
    async fn test_pick_replaces_playlist_and_plays() {
        let fx = fixture().await;
        let manager = manager(&fx).await;
        let controller = manager.bound().await.unwrap();

        manager.stream_picked("2").await.unwrap();
        wait_until(|| controller.is_playing()).await;
        assert_eq!(controller.current_media_id().as_deref(), Some("2"));
        assert_eq!(controller.media_item_count(), 3);
        assert!(fx.local.calls().contains(&"set_items:3@1".to_string()));

        let mut active = manager.active_stream();
        let active = active.wait_for(|a| matches!(a, ActiveStream::Filled(_))).await.unwrap();
        assert!(matches!(&*active, ActiveStream::Filled(s) if s.id == "2"));
    }

    #[tokio::test]
    async fn test_same_active_item_is_not_replaced() {
        let fx = fixture().await;
        let manager = manager(&fx).await;
        let controller = manager.bound().await.unwrap();
        manager.stream_picked("1").await.unwrap();
        wait_until(|| controller.is_playing()).await;

        let replacements = || {
            fx.local
                .calls()
                .iter()
                .filter(|c| c.starts_with("set_items"))
                .count()
        };
        let before = replacements();

        // Un nouveau titre modifie la liste sans changer le flux actif
        fx.local.emit_title("Song");
        let mut streams = fx.repository.streams();
        tokio::time::timeout(
            Duration::from_secs(5),
            streams.wait_for(|s| {
                s.as_success()
                    .map(|l| l.iter().any(|st| st.track.as_deref() == Some("Song")))
                    .unwrap_or(false)
            }),
        )
        .await
        .unwrap()
        .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(replacements(), before);
    }

    #[tokio::test]
    async fn test_repicking_active_stream_does_not_arm_autoplay() {
        let fx = fixture().await;
        let manager = manager(&fx).await;
        let controller = manager.bound().await.unwrap();
        manager.stream_picked("1").await.unwrap();
        wait_until(|| controller.is_playing()).await;
        controller.pause().await.unwrap();

        manager.stream_picked("1").await.unwrap();
        assert!(!manager.inner.picked.load(Ordering::SeqCst));

        // Changement venu d'ailleurs: la liste suit, la lecture non
        fx.repository.update_active("2");
        wait_until(|| controller.current_media_id().as_deref() == Some("2")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!controller.is_playing());
    }

    #[tokio::test]
    async fn test_sleep_timer_rejected_when_not_playing() {
        let fx = fixture().await;
        let manager = manager(&fx).await;
        let mut errors = manager.errors();

        assert!(matches!(
            manager.sleep_timer_set(60_000).await,
            Err(PlaybackError::NotPlaying)
        ));
        match next_error(&mut errors).await {
            StreamingError::Filled { message, .. } => {
                assert_eq!(message, DEFAULT_SLEEP_TIMER_NOT_ALLOWED)
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(next_error(&mut errors).await, StreamingError::Empty);
        assert_eq!(*manager.sleep_timer().borrow(), None);
    }

    #[tokio::test]
    async fn test_sleep_timer_flow() {
        let fx = fixture().await;
        let manager = manager(&fx).await;
        let controller = manager.bound().await.unwrap();
        manager.stream_picked("1").await.unwrap();
        wait_until(|| controller.is_playing()).await;

        let mut timer = manager.sleep_timer();
        manager.sleep_timer_set(600_000).await.unwrap();
        let value = tokio::time::timeout(Duration::from_secs(5), timer.wait_for(Option::is_some))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert_eq!(value, Some(600_000));

        manager.sleep_timer_set(0).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), timer.wait_for(Option::is_none))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_stream_error_is_one_shot() {
        let fx = fixture().await;
        let manager = manager(&fx).await;
        let mut errors = manager.errors();

        fx.local.emit(crate::model::PlayerEvents::single(
            crate::model::PlayerEvent::PlayerError("boom".into()),
        ));
        let first = next_error(&mut errors).await;
        assert_eq!(first.message(), Some(DEFAULT_STREAM_ERROR));
        assert_eq!(next_error(&mut errors).await, StreamingError::Empty);

        fx.local.emit(crate::model::PlayerEvents::single(
            crate::model::PlayerEvent::PlayerError("boom".into()),
        ));
        let second = next_error(&mut errors).await;
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_commands_before_bind_fail() {
        let fx = fixture().await;
        let manager = StreamManager::new(
            fx.handle.clone(),
            ManagerDeps::new(fx.repository.clone(), fx.settings.clone()),
            ManagerMessages::default(),
        );
        assert!(matches!(
            manager.sleep_timer_set(0).await,
            Err(PlaybackError::NotBound)
        ));
        assert!(!manager.is_playing());

        let mut bound = tokio_test::task::spawn(manager.bound());
        tokio_test::assert_pending!(bound.poll());
        manager.initialize(Vec::new());
        let controller = tokio::time::timeout(Duration::from_secs(5), bound)
            .await
            .unwrap()
            .unwrap();
        assert!(!controller.is_playing());
    }

    #[tokio::test]
    async fn test_release_disconnects() {
        let fx = fixture().await;
        let manager = manager(&fx).await;
        manager.release().await;
        assert!(manager.controller().is_none());
        assert!(matches!(
            manager.sleep_timer_set(0).await,
            Err(PlaybackError::NotBound)
        ));
    }
}
