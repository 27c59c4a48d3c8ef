//! Equalizer
//!
//! [`EqualizerManager`] applies the persisted equalizer choice to the local
//! audio engine and publishes its state. The equalizer only exists for the
//! local engine: while casting the state is
//! [`EqualizerState::NotAvailableWhileCasting`].

use crate::errors::{PlaybackError, Result};
use radiocatalog::{EqualizerSettings, GetEqualizerSettings, SetEqualizerSettings};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};

/// Égaliseur audio du moteur local
pub trait AudioEqualizer: Send {
    fn band_count(&self) -> u16;
    /// Niveau minimal et maximal d'une bande (millibels)
    fn band_level_range(&self) -> (i16, i16);
    fn band_level(&self, band: u16) -> i16;
    /// Fréquence centrale d'une bande (milliHertz)
    fn center_frequency(&self, band: u16) -> u32;
    fn preset_names(&self) -> Vec<String>;
    fn current_preset(&self) -> i16;
    fn use_preset(&mut self, preset: i16) -> Result<()>;
    fn is_enabled(&self) -> bool;
    fn set_enabled(&mut self, enabled: bool) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualizerBand {
    pub level: i16,
    pub frequency: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualizerPresets {
    pub current: i16,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EqualizerState {
    #[default]
    Loading,
    NotAvailableWhileCasting,
    Filled {
        enabled: bool,
        min: i16,
        max: i16,
        presets: EqualizerPresets,
        bands: Vec<EqualizerBand>,
    },
}

impl EqualizerState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, EqualizerState::Filled { enabled: true, .. })
    }

    pub fn can_be_enabled(&self) -> bool {
        matches!(self, EqualizerState::Filled { .. })
    }

    fn from_equalizer(eq: &dyn AudioEqualizer) -> Self {
        let (min, max) = eq.band_level_range();
        EqualizerState::Filled {
            enabled: eq.is_enabled(),
            min,
            max,
            presets: EqualizerPresets {
                current: eq.current_preset(),
                names: eq.preset_names(),
            },
            bands: (0..eq.band_count())
                .map(|band| EqualizerBand {
                    level: eq.band_level(band),
                    frequency: eq.center_frequency(band),
                })
                .collect(),
        }
    }
}

pub struct EqualizerManager {
    equalizer: Mutex<Option<Box<dyn AudioEqualizer>>>,
    state: watch::Sender<EqualizerState>,
    casting: AtomicBool,
    get_settings: GetEqualizerSettings,
    set_settings: SetEqualizerSettings,
}

impl EqualizerManager {
    pub fn new(get_settings: GetEqualizerSettings, set_settings: SetEqualizerSettings) -> Self {
        let (state, _) = watch::channel(EqualizerState::Loading);
        Self {
            equalizer: Mutex::new(None),
            state,
            casting: AtomicBool::new(false),
            get_settings,
            set_settings,
        }
    }

    pub fn state(&self) -> watch::Receiver<EqualizerState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> EqualizerState {
        self.state.borrow().clone()
    }

    /// Applies the persisted settings to `equalizer` and takes ownership of it
    pub async fn initialize(&self, mut equalizer: Box<dyn AudioEqualizer>) -> Result<()> {
        let settings = self.get_settings.execute().await?;
        equalizer.set_enabled(settings.enabled)?;
        equalizer.use_preset(settings.preset)?;
        info!(
            enabled = settings.enabled,
            preset = settings.preset,
            "Equalizer initialized"
        );

        let mut slot = self.lock()?;
        *slot = Some(equalizer);
        self.publish(slot.as_deref());
        Ok(())
    }

    pub fn on_casting_status_changed(&self, casting: bool) {
        self.casting.store(casting, Ordering::SeqCst);
        debug!(casting, "Equalizer casting status");
        match self.lock() {
            Ok(slot) => self.publish(slot.as_deref()),
            Err(_) => {
                self.state.send_replace(if casting {
                    EqualizerState::NotAvailableWhileCasting
                } else {
                    EqualizerState::Loading
                });
            }
        }
    }

    pub async fn on_enabled(&self, enabled: bool) -> Result<()> {
        let preset = self.with_equalizer(|eq| Ok(eq.current_preset()))?;
        self.set_settings
            .execute(EqualizerSettings { enabled, preset })
            .await?;
        self.with_equalizer(|eq| eq.set_enabled(enabled))?;
        self.republish()
    }

    pub async fn on_preset_changed(&self, preset: i16) -> Result<()> {
        let enabled = self.with_equalizer(|eq| Ok(eq.is_enabled()))?;
        self.set_settings
            .execute(EqualizerSettings { enabled, preset })
            .await?;
        self.with_equalizer(|eq| eq.use_preset(preset))?;
        self.republish()
    }

    /// Drops the engine equalizer
    pub fn release(&self) {
        if let Ok(mut slot) = self.lock() {
            slot.take();
        }
        self.state.send_replace(EqualizerState::Loading);
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<Box<dyn AudioEqualizer>>>> {
        self.equalizer
            .lock()
            .map_err(|_| PlaybackError::equalizer("equalizer lock poisoned"))
    }

    fn with_equalizer<T>(
        &self,
        f: impl FnOnce(&mut dyn AudioEqualizer) -> Result<T>,
    ) -> Result<T> {
        let mut slot = self.lock()?;
        match slot.as_deref_mut() {
            Some(eq) => f(eq),
            None => Err(PlaybackError::equalizer("equalizer not initialized")),
        }
    }

    fn republish(&self) -> Result<()> {
        let slot = self.lock()?;
        self.publish(slot.as_deref());
        Ok(())
    }

    fn publish(&self, equalizer: Option<&dyn AudioEqualizer>) {
        let state = if self.casting.load(Ordering::SeqCst) {
            EqualizerState::NotAvailableWhileCasting
        } else {
            match equalizer {
                Some(eq) => EqualizerState::from_equalizer(eq),
                None => EqualizerState::Loading,
            }
        };
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use radiocatalog::ConfigSettingsRepository;
    use radioconfig::Config;
    use std::sync::Arc;

    /// Five bands, three presets
    pub(crate) struct FakeEqualizer {
        enabled: bool,
        preset: i16,
    }

    impl FakeEqualizer {
        pub(crate) fn new() -> Self {
            Self {
                enabled: false,
                preset: 0,
            }
        }
    }

    impl AudioEqualizer for FakeEqualizer {
        fn band_count(&self) -> u16 {
            5
        }

        fn band_level_range(&self) -> (i16, i16) {
            (-1500, 1500)
        }

        fn band_level(&self, band: u16) -> i16 {
            self.preset * 100 + band as i16
        }

        fn center_frequency(&self, band: u16) -> u32 {
            60_000 * 4u32.pow(band as u32)
        }

        fn preset_names(&self) -> Vec<String> {
            vec!["Normal".into(), "Rock".into(), "Jazz".into()]
        }

        fn current_preset(&self) -> i16 {
            self.preset
        }

        fn use_preset(&mut self, preset: i16) -> Result<()> {
            if !(0..3).contains(&preset) {
                return Err(PlaybackError::equalizer(format!("no preset {}", preset)));
            }
            self.preset = preset;
            Ok(())
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        fn set_enabled(&mut self, enabled: bool) -> Result<()> {
            self.enabled = enabled;
            Ok(())
        }
    }

    fn manager() -> (tempfile::TempDir, Arc<ConfigSettingsRepository>, EqualizerManager) {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(Config::load_config(dir.path().to_str().unwrap()).unwrap());
        let settings = Arc::new(ConfigSettingsRepository::new(config).unwrap());
        let manager = EqualizerManager::new(
            GetEqualizerSettings::new(settings.clone()),
            SetEqualizerSettings::new(settings.clone()),
        );
        (dir, settings, manager)
    }

    #[tokio::test]
    async fn test_initialize_applies_persisted_settings() {
        let (_dir, settings, manager) = manager();
        SetEqualizerSettings::new(settings)
            .execute(EqualizerSettings {
                enabled: true,
                preset: 2,
            })
            .await
            .unwrap();

        assert_eq!(manager.current(), EqualizerState::Loading);
        manager
            .initialize(Box::new(FakeEqualizer::new()))
            .await
            .unwrap();

        match manager.current() {
            EqualizerState::Filled {
                enabled,
                min,
                max,
                presets,
                bands,
            } => {
                assert!(enabled);
                assert_eq!((min, max), (-1500, 1500));
                assert_eq!(presets.current, 2);
                assert_eq!(presets.names.len(), 3);
                assert_eq!(bands.len(), 5);
                assert_eq!(bands[1].frequency, 240_000);
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_casting_transitions() {
        let (_dir, _settings, manager) = manager();
        manager
            .initialize(Box::new(FakeEqualizer::new()))
            .await
            .unwrap();
        let mut state = manager.state();
        state.borrow_and_update();

        manager.on_casting_status_changed(true);
        assert!(state.has_changed().unwrap());
        assert_eq!(
            *state.borrow_and_update(),
            EqualizerState::NotAvailableWhileCasting
        );
        assert!(!manager.current().can_be_enabled());

        manager.on_casting_status_changed(false);
        assert!(manager.current().can_be_enabled());
    }

    #[tokio::test]
    async fn test_enable_and_preset_are_persisted() {
        let (_dir, settings, manager) = manager();
        manager
            .initialize(Box::new(FakeEqualizer::new()))
            .await
            .unwrap();

        manager.on_enabled(true).await.unwrap();
        manager.on_preset_changed(1).await.unwrap();
        assert!(manager.current().is_enabled());

        let stored = GetEqualizerSettings::new(settings).execute().await.unwrap();
        assert_eq!(
            stored,
            EqualizerSettings {
                enabled: true,
                preset: 1
            }
        );
    }

    #[tokio::test]
    async fn test_changes_before_initialize_fail() {
        let (_dir, _settings, manager) = manager();
        assert!(matches!(
            manager.on_enabled(true).await,
            Err(PlaybackError::Equalizer(_))
        ));
    }
}
