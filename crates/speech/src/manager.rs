//! Speech manager: registry, queue, and fallback
//!
//! Owns the set of registered backends, tracks which one is active, and
//! serializes all speak requests into one FIFO queue drained by a single
//! task. A failing cloud dispatch falls back to the baseline backend for
//! that one item and the queue keeps moving; queued errors never surface
//! to callers.
//!
//! # Architecture
//!
//! ```text
//! speak() ──▶ queue ──▶ drain task ──▶ active backend ──▶ audio sink
//!                          │                 │
//!                          │ on failure      │ characters
//!                          ▼                 ▼
//!                    baseline backend   cost tracker ──▶ cost observer
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use pricing::{AzureTier, CostTracker};

use crate::config::{AzureConfig, GoogleConfig, SystemConfig};
use crate::error::SpeechError;
use crate::ports::{AudioSink, CostObserver, SpeechBackend};
use crate::providers::{AzureBackend, EspeakBackend, GoogleBackend};
use crate::types::{BackendId, SpeakOptions, SpeakOutcome, VoiceInfo, SPEED_MAX, SPEED_MIN};

/// Credentials for registering or updating a cloud backend
#[derive(Debug, Clone)]
pub enum ProviderCredentials {
    /// Google Cloud Text-to-Speech configuration
    GoogleCloud(GoogleConfig),
    /// Azure Cognitive Services Speech configuration
    Azure(AzureConfig),
}

/// A speak request waiting in the queue. Immutable once enqueued.
struct QueuedSpeak {
    text: String,
    options: SpeakOptions,
    done: oneshot::Sender<()>,
}

struct ManagerState {
    backends: HashMap<BackendId, Arc<dyn SpeechBackend>>,
    active: BackendId,
    // Remembered voice per backend; survives switching away and back
    voices: HashMap<BackendId, String>,
    current_voice: Option<String>,
    azure_tier: AzureTier,
    queue: VecDeque<QueuedSpeak>,
    // Single-flight gate: at most one drain loop runs at a time
    draining: bool,
    // Bumped by stop(); a drain loop that observes a bump retires
    epoch: u64,
}

struct Shared {
    state: Mutex<ManagerState>,
    tracker: Mutex<CostTracker>,
    observer: Mutex<Option<Arc<dyn CostObserver>>>,
}

/// Manager holding the registered speech backends.
///
/// Constructed with the baseline backend only; cloud backends join through
/// explicit [`Self::register_provider`] calls. The baseline is always
/// registered and the active backend defaults to it.
pub struct SpeechManager {
    shared: Arc<Shared>,
    sink: Arc<dyn AudioSink>,
}

impl std::fmt::Debug for SpeechManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("SpeechManager")
            .field("active", &state.active)
            .field("registered", &state.backends.len())
            .field("queued", &state.queue.len())
            .field("draining", &state.draining)
            .finish_non_exhaustive()
    }
}

impl SpeechManager {
    /// Create a manager with only the baseline backend registered
    #[must_use]
    pub fn new(system_config: SystemConfig, sink: Arc<dyn AudioSink>) -> Self {
        let baseline: Arc<dyn SpeechBackend> =
            Arc::new(EspeakBackend::new(system_config, Arc::clone(&sink)));

        let mut backends: HashMap<BackendId, Arc<dyn SpeechBackend>> = HashMap::new();
        backends.insert(BackendId::System, baseline);

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ManagerState {
                    backends,
                    active: BackendId::System,
                    voices: HashMap::new(),
                    current_voice: None,
                    azure_tier: AzureTier::default(),
                    queue: VecDeque::new(),
                    draining: false,
                    epoch: 0,
                }),
                tracker: Mutex::new(CostTracker::new()),
                observer: Mutex::new(None),
            }),
            sink,
        }
    }

    /// Install the observer notified after every metered synthesis
    pub fn set_cost_observer(&self, observer: Arc<dyn CostObserver>) {
        *self.shared.observer.lock() = Some(observer);
    }

    /// Restore usage ledgers persisted by the application
    pub fn restore_usage(&self, tracker: CostTracker) {
        *self.shared.tracker.lock() = tracker;
    }

    /// Snapshot of the current usage ledgers, for persistence
    #[must_use]
    pub fn usage_snapshot(&self) -> CostTracker {
        self.shared.tracker.lock().clone()
    }

    /// Register a cloud backend, or replace its credentials.
    ///
    /// Idempotent upsert: an existing instance is replaced wholesale,
    /// which also drops its cached voice inventory.
    ///
    /// # Errors
    ///
    /// Returns `MissingCredentials`/`Validation` when the configuration
    /// cannot produce a working instance, or `InvalidCredentials` when
    /// the credentials do not belong to `id`.
    pub fn register_provider(
        &self,
        id: BackendId,
        credentials: ProviderCredentials,
    ) -> Result<(), SpeechError> {
        let backend: Arc<dyn SpeechBackend> = match (id, credentials) {
            (BackendId::GoogleCloud, ProviderCredentials::GoogleCloud(config)) => {
                Arc::new(GoogleBackend::new(config, Arc::clone(&self.sink))?)
            }
            (BackendId::Azure, ProviderCredentials::Azure(config)) => {
                let tier = config.tier;
                let backend = Arc::new(AzureBackend::new(config, Arc::clone(&self.sink))?);
                self.shared.state.lock().azure_tier = tier;
                backend
            }
            (BackendId::System, _) => {
                return Err(SpeechError::InvalidCredentials {
                    backend: BackendId::System,
                    reason: "baseline backend takes no credentials".to_string(),
                });
            }
            (id, _) => {
                return Err(SpeechError::InvalidCredentials {
                    backend: id,
                    reason: "credentials belong to a different backend".to_string(),
                });
            }
        };

        self.shared.state.lock().backends.insert(id, backend);
        info!(backend = %id, "provider registered");
        Ok(())
    }

    /// Switch the active backend.
    ///
    /// On success the backend's remembered voice becomes the current
    /// voice, or the current voice is cleared if none was remembered, since
    /// voice ids are not portable across backends.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` when `id` is not registered or not
    /// properly configured; the active backend is left unchanged.
    pub async fn set_active_provider(&self, id: BackendId) -> Result<(), SpeechError> {
        let backend = self
            .shared
            .state
            .lock()
            .backends
            .get(&id)
            .cloned()
            .ok_or_else(|| SpeechError::NotConfigured {
                backend: id,
                reason: "not registered".to_string(),
            })?;

        if !backend.is_configured().await {
            return Err(SpeechError::NotConfigured {
                backend: id,
                reason: "not properly configured".to_string(),
            });
        }

        let mut state = self.shared.state.lock();
        state.active = id;
        state.current_voice = state.voices.get(&id).cloned();
        info!(backend = %id, "active provider switched");
        Ok(())
    }

    /// Currently active backend
    #[must_use]
    pub fn active_provider(&self) -> BackendId {
        self.shared.state.lock().active
    }

    /// All registered backends
    #[must_use]
    pub fn available_providers(&self) -> Vec<BackendId> {
        let mut ids: Vec<BackendId> = self.shared.state.lock().backends.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Whether `id` is registered and has its minimum credentials
    pub async fn is_provider_configured(&self, id: BackendId) -> bool {
        let backend = self.shared.state.lock().backends.get(&id).cloned();
        match backend {
            Some(backend) => backend.is_configured().await,
            None => false,
        }
    }

    /// List voices of the active backend
    ///
    /// # Errors
    ///
    /// Returns the active backend's voice-listing error.
    pub async fn list_voices(&self) -> Result<Vec<VoiceInfo>, SpeechError> {
        let id = self.active_provider();
        self.list_voices_for(id).await
    }

    /// List voices of a specific backend
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` for an unregistered backend, or the
    /// backend's own credentials/listing error.
    pub async fn list_voices_for(&self, id: BackendId) -> Result<Vec<VoiceInfo>, SpeechError> {
        let backend = self
            .shared
            .state
            .lock()
            .backends
            .get(&id)
            .cloned()
            .ok_or_else(|| SpeechError::NotConfigured {
                backend: id,
                reason: "not registered".to_string(),
            })?;
        backend.list_voices().await
    }

    /// Set the voice for the active backend.
    ///
    /// Updates both the per-backend memory and the transient current
    /// voice, so the selection survives switching away and back.
    pub fn set_voice(&self, voice_id: impl Into<String>) {
        let voice = voice_id.into();
        let mut state = self.shared.state.lock();
        let active = state.active;
        state.voices.insert(active, voice.clone());
        state.current_voice = Some(voice);
    }

    /// Set the remembered voice for a specific backend
    pub fn set_voice_for(&self, id: BackendId, voice_id: impl Into<String>) {
        let voice = voice_id.into();
        let mut state = self.shared.state.lock();
        state.voices.insert(id, voice.clone());
        if state.active == id {
            state.current_voice = Some(voice);
        }
    }

    /// Current voice, if one is selected
    #[must_use]
    pub fn voice(&self) -> Option<String> {
        self.shared.state.lock().current_voice.clone()
    }

    /// Remembered voice for a specific backend
    #[must_use]
    pub fn voice_for(&self, id: BackendId) -> Option<String> {
        self.shared.state.lock().voices.get(&id).cloned()
    }

    /// Exercise a backend's credentials
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` for an unregistered backend, or the
    /// backend's specific validation error.
    pub async fn validate_provider(&self, id: BackendId) -> Result<(), SpeechError> {
        let backend = self
            .shared
            .state
            .lock()
            .backends
            .get(&id)
            .cloned()
            .ok_or_else(|| SpeechError::NotConfigured {
                backend: id,
                reason: "not registered".to_string(),
            })?;
        backend.validate().await
    }

    /// Remove a backend (credential revocation).
    ///
    /// If the removed backend was active, the active backend reverts to
    /// the baseline immediately; queued items addressed to it redirect to
    /// the baseline when drained.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when asked to remove the baseline.
    pub fn remove_provider(&self, id: BackendId) -> Result<(), SpeechError> {
        if id == BackendId::System {
            return Err(SpeechError::Validation {
                backend: BackendId::System,
                reason: "baseline backend cannot be removed".to_string(),
            });
        }

        let mut state = self.shared.state.lock();
        if state.backends.remove(&id).is_some() {
            info!(backend = %id, "provider removed");
            if state.active == id {
                state.active = BackendId::System;
                state.current_voice = state.voices.get(&BackendId::System).cloned();
            }
        }
        Ok(())
    }

    /// Enqueue a speak request and wait for its dispatch to settle.
    ///
    /// Requests are spoken strictly in enqueue order, one at a time.
    /// Dispatch errors are logged and trigger the baseline fallback; they
    /// never surface here. The call resolves once this request's dispatch
    /// has settled, or immediately with `Ok` if a [`Self::stop`] cancels
    /// it while still queued.
    ///
    /// # Errors
    ///
    /// Returns `Synthesis` only for an invalid request (empty text, speed
    /// outside the supported range), detected at enqueue time.
    #[instrument(skip_all)]
    pub async fn speak(
        &self,
        text: impl Into<String>,
        options: SpeakOptions,
    ) -> Result<(), SpeechError> {
        let text = text.into();
        let active = self.active_provider();

        if text.trim().is_empty() {
            return Err(SpeechError::Synthesis {
                backend: active,
                reason: "text must not be empty".to_string(),
            });
        }
        if let Some(speed) = options.speed {
            if !(SPEED_MIN..=SPEED_MAX).contains(&speed) {
                return Err(SpeechError::Synthesis {
                    backend: active,
                    reason: format!("speed {speed} outside [{SPEED_MIN}, {SPEED_MAX}]"),
                });
            }
        }

        let (done, done_rx) = oneshot::channel();
        let spawn_at_epoch = {
            let mut state = self.shared.state.lock();
            state.queue.push_back(QueuedSpeak {
                text,
                options,
                done,
            });
            if state.draining {
                None
            } else {
                state.draining = true;
                Some(state.epoch)
            }
        };

        if let Some(epoch) = spawn_at_epoch {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(drain(shared, epoch));
        }

        // A dropped sender means the request was cancelled by stop();
        // both outcomes resolve the caller.
        let _ = done_rx.await;
        Ok(())
    }

    /// Hard cancel: stop the active backend, drop everything still
    /// queued, and return the manager to idle. Pending [`Self::speak`]
    /// calls resolve.
    pub async fn stop(&self) {
        let backend = {
            let mut state = self.shared.state.lock();
            // Retire any in-flight drain loop before clearing its queue
            state.epoch += 1;
            state.queue.clear();
            state.draining = false;
            state.backends.get(&state.active).cloned()
        };

        if let Some(backend) = backend {
            backend.stop().await;
        }
        debug!("stopped; queue cleared");
    }
}

/// Drain the queue one item at a time until it is empty or the epoch
/// moves on (a `stop()` happened).
async fn drain(shared: Arc<Shared>, my_epoch: u64) {
    loop {
        let (item, id, backend, baseline) = {
            let mut state = shared.state.lock();
            if state.epoch != my_epoch {
                // Retired by stop(); a newer loop owns the flag now
                return;
            }
            let Some(item) = state.queue.pop_front() else {
                state.draining = false;
                return;
            };

            // The active entry can disappear mid-queue (provider removal);
            // absence means baseline
            if !state.backends.contains_key(&state.active) {
                warn!(backend = %state.active, "active backend missing; reverting to baseline");
                state.active = BackendId::System;
                state.current_voice = state.voices.get(&BackendId::System).cloned();
            }
            let id = state.active;
            let Some(backend) = state.backends.get(&id).cloned() else {
                // Unreachable while the baseline invariant holds; skip the
                // item rather than wedge the queue
                drop(state);
                let _ = item.done.send(());
                continue;
            };
            let baseline = state.backends.get(&BackendId::System).cloned();
            (item, id, backend, baseline)
        };

        // Fill in the remembered voice unless the request chose its own
        let mut options = item.options.clone();
        if options.voice.is_none() {
            options.voice = shared.state.lock().voices.get(&id).cloned();
        }

        debug!(backend = %id, "dispatching queued speak");
        match backend.speak(&item.text, &options).await {
            Ok(outcome) => record_cost(&shared, id, &options, outcome),
            Err(error) => {
                warn!(backend = %id, %error, "dispatch failed");
                if id != BackendId::System {
                    if let Some(baseline) = baseline {
                        // One identical attempt against the baseline; its
                        // failure is swallowed too
                        match baseline.speak(&item.text, &item.options).await {
                            Ok(_) => debug!("baseline fallback spoke the item"),
                            Err(fallback_error) => {
                                warn!(%fallback_error, "baseline fallback failed");
                            }
                        }
                    }
                }
            }
        }

        let _ = item.done.send(());
    }
}

/// Feed a metered synthesis through the cost tracker and notify the
/// observer
fn record_cost(shared: &Shared, id: BackendId, options: &SpeakOptions, outcome: SpeakOutcome) {
    let Some(characters) = outcome.characters else {
        return;
    };
    let voice = options.voice.clone().unwrap_or_default();

    let breakdown = match id {
        BackendId::GoogleCloud => shared.tracker.lock().record_google(&voice, characters),
        BackendId::Azure => {
            let tier = shared.state.lock().azure_tier;
            shared.tracker.lock().record_azure(tier, &voice, characters)
        }
        BackendId::System => return,
    };

    debug!(
        backend = %id,
        classification = %breakdown.classification,
        characters,
        cost_microdollars = breakdown.cost_microdollars,
        "synthesis cost recorded"
    );

    let observer = shared.observer.lock().clone();
    if let Some(observer) = observer {
        observer.cost_incurred(id, &breakdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullSink;
    use pricing::CostBreakdown;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Scripted backend for driving the manager
    struct ScriptedBackend {
        id: BackendId,
        configured: bool,
        fail: AtomicBool,
        delay: Duration,
        billed: bool,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(id: BackendId) -> Self {
            Self {
                id,
                configured: true,
                fail: AtomicBool::new(false),
                delay: Duration::from_millis(0),
                billed: id != BackendId::System,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn unconfigured(mut self) -> Self {
            self.configured = false;
            self
        }

        fn failing(self) -> Self {
            self.fail.store(true, Ordering::SeqCst);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait::async_trait]
    impl SpeechBackend for ScriptedBackend {
        fn id(&self) -> BackendId {
            self.id
        }

        async fn is_configured(&self) -> bool {
            self.configured
        }

        async fn list_voices(&self) -> Result<Vec<VoiceInfo>, SpeechError> {
            Ok(Vec::new())
        }

        async fn speak(
            &self,
            text: &str,
            options: &SpeakOptions,
        ) -> Result<SpeakOutcome, SpeechError> {
            options.callbacks.notify_start();
            self.calls.lock().push(text.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let result = if self.fail.load(Ordering::SeqCst) {
                Err(SpeechError::Synthesis {
                    backend: self.id,
                    reason: "scripted failure".to_string(),
                })
            } else if self.billed {
                #[allow(clippy::cast_possible_truncation)]
                Ok(SpeakOutcome::billed(text.chars().count() as u64))
            } else {
                Ok(SpeakOutcome::unmetered())
            };
            options.callbacks.notify_stop();
            result
        }

        async fn stop(&self) {}

        async fn validate(&self) -> Result<(), SpeechError> {
            Ok(())
        }
    }

    /// Manager whose baseline is a scripted mock
    fn scripted_manager(baseline: Arc<ScriptedBackend>) -> SpeechManager {
        let manager = SpeechManager::new(SystemConfig::default(), Arc::new(NullSink));
        manager
            .shared
            .state
            .lock()
            .backends
            .insert(BackendId::System, baseline);
        manager
    }

    fn insert_backend(manager: &SpeechManager, backend: Arc<ScriptedBackend>) {
        manager
            .shared
            .state
            .lock()
            .backends
            .insert(backend.id, backend);
    }

    struct CapturingObserver {
        events: Mutex<Vec<(BackendId, CostBreakdown)>>,
    }

    impl CostObserver for CapturingObserver {
        fn cost_incurred(&self, backend: BackendId, breakdown: &CostBreakdown) {
            self.events.lock().push((backend, breakdown.clone()));
        }
    }

    #[tokio::test]
    async fn four_speaks_dispatch_in_fifo_order_exactly_once() {
        let baseline =
            Arc::new(ScriptedBackend::new(BackendId::System).with_delay(Duration::from_millis(10)));
        let manager = scripted_manager(Arc::clone(&baseline));

        let (a, b, c, d) = tokio::join!(
            manager.speak("one", SpeakOptions::new()),
            manager.speak("two", SpeakOptions::new()),
            manager.speak("three", SpeakOptions::new()),
            manager.speak("four", SpeakOptions::new()),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok() && d.is_ok());

        assert_eq!(baseline.calls(), vec!["one", "two", "three", "four"]);

        // The drain loop notices the empty queue on its next pass
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!manager.shared.state.lock().draining);
    }

    #[tokio::test]
    async fn enqueue_during_drain_appends_instead_of_restarting() {
        let baseline =
            Arc::new(ScriptedBackend::new(BackendId::System).with_delay(Duration::from_millis(40)));
        let manager = Arc::new(scripted_manager(Arc::clone(&baseline)));

        let first = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.speak("first", SpeakOptions::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(manager.shared.state.lock().draining);

        manager.speak("second", SpeakOptions::new()).await.unwrap();
        first.await.unwrap().unwrap();

        assert_eq!(baseline.calls(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn failing_cloud_backend_falls_back_to_baseline_once() {
        let baseline = Arc::new(ScriptedBackend::new(BackendId::System));
        let cloud = Arc::new(ScriptedBackend::new(BackendId::GoogleCloud).failing());
        let manager = scripted_manager(Arc::clone(&baseline));
        insert_backend(&manager, Arc::clone(&cloud));
        manager.set_active_provider(BackendId::GoogleCloud).await.unwrap();

        manager.speak("hello", SpeakOptions::new()).await.unwrap();
        manager.speak("world", SpeakOptions::new()).await.unwrap();

        // Each failed item went to the baseline exactly once, and the
        // failure did not stall the queue
        assert_eq!(cloud.calls(), vec!["hello", "world"]);
        assert_eq!(baseline.calls(), vec!["hello", "world"]);
    }

    #[tokio::test]
    async fn baseline_failure_during_fallback_is_swallowed() {
        let baseline = Arc::new(ScriptedBackend::new(BackendId::System).failing());
        let cloud = Arc::new(ScriptedBackend::new(BackendId::GoogleCloud).failing());
        let manager = scripted_manager(Arc::clone(&baseline));
        insert_backend(&manager, Arc::clone(&cloud));
        manager.set_active_provider(BackendId::GoogleCloud).await.unwrap();

        let result = manager.speak("doomed", SpeakOptions::new()).await;
        assert!(result.is_ok(), "queued errors never surface to the caller");
    }

    #[tokio::test]
    async fn failing_baseline_does_not_fall_back_to_itself() {
        let baseline = Arc::new(ScriptedBackend::new(BackendId::System).failing());
        let manager = scripted_manager(Arc::clone(&baseline));

        manager.speak("once", SpeakOptions::new()).await.unwrap();
        assert_eq!(baseline.calls(), vec!["once"]);
    }

    #[tokio::test]
    async fn set_active_to_unregistered_leaves_active_unchanged() {
        let manager = scripted_manager(Arc::new(ScriptedBackend::new(BackendId::System)));

        let result = manager.set_active_provider(BackendId::Azure).await;

        assert!(matches!(
            result,
            Err(SpeechError::NotConfigured {
                backend: BackendId::Azure,
                ..
            })
        ));
        assert_eq!(manager.active_provider(), BackendId::System);
    }

    #[tokio::test]
    async fn set_active_to_unconfigured_backend_fails() {
        let manager = scripted_manager(Arc::new(ScriptedBackend::new(BackendId::System)));
        insert_backend(
            &manager,
            Arc::new(ScriptedBackend::new(BackendId::GoogleCloud).unconfigured()),
        );

        let result = manager.set_active_provider(BackendId::GoogleCloud).await;

        assert!(matches!(result, Err(SpeechError::NotConfigured { .. })));
        assert_eq!(manager.active_provider(), BackendId::System);
    }

    #[tokio::test]
    async fn voice_is_restored_when_switching_back() {
        let manager = scripted_manager(Arc::new(ScriptedBackend::new(BackendId::System)));
        insert_backend(&manager, Arc::new(ScriptedBackend::new(BackendId::GoogleCloud)));
        insert_backend(&manager, Arc::new(ScriptedBackend::new(BackendId::Azure)));

        manager.set_active_provider(BackendId::GoogleCloud).await.unwrap();
        manager.set_voice("en-US-Wavenet-A");

        manager.set_active_provider(BackendId::Azure).await.unwrap();
        assert_eq!(manager.voice(), None, "no voice leaks across backends");
        manager.set_voice("en-US-JennyNeural");

        manager.set_active_provider(BackendId::GoogleCloud).await.unwrap();
        assert_eq!(manager.voice(), Some("en-US-Wavenet-A".to_string()));
        assert_eq!(
            manager.voice_for(BackendId::Azure),
            Some("en-US-JennyNeural".to_string())
        );
    }

    #[tokio::test]
    async fn set_voice_for_inactive_backend_keeps_current_voice() {
        let manager = scripted_manager(Arc::new(ScriptedBackend::new(BackendId::System)));
        insert_backend(&manager, Arc::new(ScriptedBackend::new(BackendId::Azure)));

        manager.set_voice_for(BackendId::Azure, "en-US-JennyNeural");

        assert_eq!(manager.voice(), None);
        assert_eq!(
            manager.voice_for(BackendId::Azure),
            Some("en-US-JennyNeural".to_string())
        );
    }

    #[tokio::test]
    async fn stop_clears_pending_queue() {
        let baseline =
            Arc::new(ScriptedBackend::new(BackendId::System).with_delay(Duration::from_millis(60)));
        let manager = Arc::new(scripted_manager(Arc::clone(&baseline)));

        let mut handles = Vec::new();
        for text in ["one", "two", "three"] {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager.speak(text, SpeakOptions::new()).await
            }));
            // Deterministic enqueue order
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        manager.stop().await;
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Only the in-flight item was dispatched; the rest were dropped
        assert_eq!(baseline.calls(), vec!["one"]);
        assert!(!manager.shared.state.lock().draining);

        // The manager keeps working after a stop
        manager.speak("again", SpeakOptions::new()).await.unwrap();
        assert_eq!(baseline.calls(), vec!["one", "again"]);
    }

    #[tokio::test]
    async fn removing_active_provider_reverts_to_baseline() {
        let manager = scripted_manager(Arc::new(ScriptedBackend::new(BackendId::System)));
        insert_backend(&manager, Arc::new(ScriptedBackend::new(BackendId::GoogleCloud)));
        manager.set_active_provider(BackendId::GoogleCloud).await.unwrap();

        manager.remove_provider(BackendId::GoogleCloud).unwrap();

        assert_eq!(manager.active_provider(), BackendId::System);
        assert_eq!(
            manager.available_providers(),
            vec![BackendId::System]
        );
    }

    #[tokio::test]
    async fn baseline_cannot_be_removed() {
        let manager = scripted_manager(Arc::new(ScriptedBackend::new(BackendId::System)));
        let result = manager.remove_provider(BackendId::System);
        assert!(matches!(result, Err(SpeechError::Validation { .. })));
    }

    #[tokio::test]
    async fn items_queued_for_a_removed_backend_redirect_to_baseline() {
        let baseline =
            Arc::new(ScriptedBackend::new(BackendId::System).with_delay(Duration::from_millis(30)));
        let cloud = Arc::new(
            ScriptedBackend::new(BackendId::GoogleCloud).with_delay(Duration::from_millis(30)),
        );
        let manager = Arc::new(scripted_manager(Arc::clone(&baseline)));
        insert_backend(&manager, Arc::clone(&cloud));
        manager.set_active_provider(BackendId::GoogleCloud).await.unwrap();

        let first = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.speak("first", SpeakOptions::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.speak("second", SpeakOptions::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;

        manager.remove_provider(BackendId::GoogleCloud).unwrap();
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(cloud.calls(), vec!["first"]);
        assert_eq!(baseline.calls(), vec!["second"]);
    }

    #[tokio::test]
    async fn speak_rejects_empty_text() {
        let manager = scripted_manager(Arc::new(ScriptedBackend::new(BackendId::System)));
        let result = manager.speak("   ", SpeakOptions::new()).await;
        assert!(matches!(result, Err(SpeechError::Synthesis { .. })));
    }

    #[tokio::test]
    async fn speak_rejects_out_of_range_speed() {
        let manager = scripted_manager(Arc::new(ScriptedBackend::new(BackendId::System)));
        let result = manager
            .speak("hello", SpeakOptions::new().with_speed(3.0))
            .await;
        assert!(matches!(result, Err(SpeechError::Synthesis { .. })));
    }

    #[tokio::test]
    async fn register_rejects_mismatched_credentials() {
        let manager = scripted_manager(Arc::new(ScriptedBackend::new(BackendId::System)));
        let result = manager.register_provider(
            BackendId::Azure,
            ProviderCredentials::GoogleCloud(GoogleConfig::default()),
        );
        assert!(matches!(result, Err(SpeechError::InvalidCredentials { .. })));
    }

    #[tokio::test]
    async fn register_rejects_baseline_credentials() {
        let manager = scripted_manager(Arc::new(ScriptedBackend::new(BackendId::System)));
        let result = manager.register_provider(
            BackendId::System,
            ProviderCredentials::GoogleCloud(GoogleConfig::default()),
        );
        assert!(matches!(result, Err(SpeechError::InvalidCredentials { .. })));
    }

    #[tokio::test]
    async fn metered_dispatch_feeds_tracker_and_observer() {
        let manager = scripted_manager(Arc::new(ScriptedBackend::new(BackendId::System)));
        insert_backend(&manager, Arc::new(ScriptedBackend::new(BackendId::GoogleCloud)));
        let observer = Arc::new(CapturingObserver {
            events: Mutex::new(Vec::new()),
        });
        manager.set_cost_observer(observer.clone() as Arc<dyn CostObserver>);

        manager.set_active_provider(BackendId::GoogleCloud).await.unwrap();
        manager.set_voice("en-US-Wavenet-A");
        manager.speak("hello world", SpeakOptions::new()).await.unwrap();

        let events = observer.events.lock().clone();
        assert_eq!(events.len(), 1);
        let (backend, breakdown) = &events[0];
        assert_eq!(*backend, BackendId::GoogleCloud);
        assert_eq!(breakdown.classification, "wavenet");
        assert_eq!(breakdown.characters_used, 11);

        let snapshot = manager.usage_snapshot();
        assert_eq!(
            snapshot
                .google_ledger()
                .map(|l| l.usage_for(pricing::GoogleVoiceClass::Wavenet)),
            Some(11)
        );
    }

    #[tokio::test]
    async fn unmetered_dispatch_records_nothing() {
        let baseline = Arc::new(ScriptedBackend::new(BackendId::System));
        let manager = scripted_manager(baseline);

        manager.speak("local words", SpeakOptions::new()).await.unwrap();

        assert!(manager.usage_snapshot().google_ledger().is_none());
        assert!(manager.usage_snapshot().azure_ledger().is_none());
    }
}
