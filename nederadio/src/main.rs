mod engine;
mod logs;

use async_trait::async_trait;
use engine::{SimulatedEngine, SimulatedEqualizer};
use radiocatalog::{
    CatalogConfigExt, ConfigSettingsRepository, GetEqualizerSettings, GetLastPlayedId,
    SetActiveStream, SetEqualizerSettings, StreamLibrary, StreamRepository, Streams, TcpProbe,
};
use radioconfig::get_config;
use radioplayback::{
    format_sleep_timer, Capability, CompositePlayer, Controller, EqualizerManager,
    PlaybackService, PlayerControls, SessionConfig, SessionDeps, StreamManager,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};

const PLAYBACK_WAIT: Duration = Duration::from_secs(10);

/// Traces what a UI would render
struct ConsoleControls;

#[async_trait]
impl PlayerControls for ConsoleControls {
    async fn attach(&self, controller: Controller) {
        let mut changes = controller.changes();
        tokio::spawn(async move {
            let mut last: Option<(Option<String>, Option<String>, bool)> = None;
            while changes.changed().await.is_ok() {
                let snapshot = changes.borrow_and_update().clone();
                let view = (
                    snapshot.current_media_id().map(str::to_string),
                    snapshot.title.clone(),
                    snapshot.is_playing,
                );
                if last.as_ref() != Some(&view) {
                    info!(
                        capability = snapshot.capability.as_str(),
                        media_id = ?view.0,
                        title = ?view.1,
                        playing = view.2,
                        "▶️ Now playing"
                    );
                    last = Some(view);
                }
            }
        });
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_config();
    let log_state = logs::init_logging(&config);

    // ========== Catalogue ==========
    info!("📻 Loading stream catalog...");
    let settings = Arc::new(ConfigSettingsRepository::new(config.clone())?);
    let network = Arc::new(TcpProbe::new(config.get_connectivity_probe()?));
    let repository = StreamRepository::new(config.create_stream_catalog()?, network, settings.clone());
    repository.force_update().await;

    let library = StreamLibrary::from_config(&repository, &config)?;
    let catalog_ready = library.tree().is_some();
    match library.tree() {
        Some(tree) => {
            let items = tree.all_playable_items();
            info!("✅ {} stream(s) available", items.len());
            for item in items {
                info!(
                    "  - {} ({})",
                    item.station_name().unwrap_or_default(),
                    item.media_id
                );
            }
        }
        None => match repository.current() {
            Streams::Error(failure) => warn!("⚠️ {}", config.get_failure_message(failure)),
            _ => warn!("⚠️ Catalog not available yet"),
        },
    }

    // ========== Lecture ==========
    let equalizer = Arc::new(EqualizerManager::new(
        GetEqualizerSettings::new(settings.clone()),
        SetEqualizerSettings::new(settings.clone()),
    ));
    if let Err(e) = equalizer.initialize(Box::new(SimulatedEqualizer::default())).await {
        warn!("⚠️ Equalizer unavailable: {}", e);
    }

    let session_config = SessionConfig::from_config(&config)?;
    let (player, events) = CompositePlayer::new(
        SimulatedEngine::new("local"),
        SimulatedEngine::new("cast"),
        Capability::Local,
        session_config.casting_label.clone(),
    );
    let deps = SessionDeps {
        library,
        set_active_stream: SetActiveStream::new(settings.clone(), repository.clone()),
        last_played: GetLastPlayedId::new(settings.clone()),
        equalizer: Some(equalizer.clone()),
    };
    let (session, session_task) = PlaybackService::start(session_config, player, events, deps);

    let manager = StreamManager::from_config(session.clone(), repository.clone(), settings, &config);
    manager.initialize(vec![Arc::new(ConsoleControls)]);
    manager.bound().await?;

    let mut errors = manager.errors();
    let error_task = tokio::spawn(async move {
        while let Ok(error) = errors.recv().await {
            if let Some(message) = error.message() {
                warn!("⚠️ {}", message);
            }
        }
    });
    let mut timer = manager.sleep_timer();
    let timer_task = tokio::spawn(async move {
        while timer.changed().await.is_ok() {
            let remaining = *timer.borrow_and_update();
            info!("⏲️ Sleep timer: {}", format_sleep_timer(remaining));
        }
    });

    // nederadio [stream_id] [sleep_minutes]
    let mut args = std::env::args().skip(1);
    match args.next() {
        Some(id) => manager.stream_picked(&id).await?,
        None if catalog_ready => {
            if let Err(e) = session.resume_playback(false).await {
                info!("Nothing to resume: {}", e);
            }
        }
        None => {}
    }
    if let Some(minutes) = args.next().and_then(|m| m.parse::<i64>().ok()) {
        // Le minuteur est refusé tant que rien ne joue
        let mut changes = manager.bound().await?.changes();
        let _ = tokio::time::timeout(PLAYBACK_WAIT, changes.wait_for(|s| s.is_playing)).await;
        if let Err(e) = manager.sleep_timer_set(minutes * 60_000).await {
            warn!("⚠️ Sleep timer not set: {}", e);
        }
    }

    info!("✅ nederadio is ready!");
    info!("Press Ctrl+C to stop...");
    tokio::signal::ctrl_c().await?;

    // ========== Arrêt ==========
    info!("🛑 Shutting down...");
    manager.release().await;
    if let Err(e) = session.shutdown().await {
        warn!("Session already closed: {}", e);
    }
    let _ = session_task.await;
    error_task.abort();
    timer_task.abort();
    equalizer.release();
    repository.shutdown();

    let problems = log_state.dump_at_least(Level::WARN);
    if !problems.is_empty() {
        eprintln!("{} warning(s) during this run:", problems.len());
        for entry in problems {
            eprintln!("  [{}] {}: {}", entry.level, entry.target, entry.message);
        }
    }
    Ok(())
}
