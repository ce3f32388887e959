//! Monitor lifecycle: Starting → Seeding → Running → Stopping → Stopped
//!
//! Running owns three tasks under one child cancellation token:
//! - indicator loop: snapshots every ready window and evaluates them concurrently
//! - reevaluation loop: re-screens volumes, seeds newcomers, drops low-volume symbols and
//!   resubscribes once when the eligible set changed
//! - status loop: periodic one-line summary

use crate::application::alerts::AlertDispatcher;
use crate::application::market_data::{CandleStore, VolumeCache};
use crate::application::monitoring::subscription_controller::SubscriptionController;
use crate::application::monitoring::volume_gate::VolumeGate;
use crate::domain::config::{MonitorConfig, RsiAlertConfig, VolumeFilterConfig};
use crate::domain::errors::{MonitorError, is_fatal_provider_error, is_unknown_symbol_error};
use crate::domain::market::{CandleUpdate, SymbolStatus, UpsertOutcome, normalize_symbol};
use crate::domain::ports::{CandleCallback, MarketDataService, Notifier};
use futures::future::join_all;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Starting,
    Seeding,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MonitorState::Starting => "Starting",
            MonitorState::Seeding => "Seeding",
            MonitorState::Running => "Running",
            MonitorState::Stopping => "Stopping",
            MonitorState::Stopped => "Stopped",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of loading history for a batch of symbols
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedReport {
    pub seeded: Vec<String>,
    pub invalid: Vec<String>,
    /// Not loaded this time, retried on the next reevaluation
    pub skipped: Vec<String>,
}

/// What one reevaluation cycle changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReevaluationReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub skipped: Vec<String>,
    pub resubscribed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeedMode {
    /// Missing history marks the symbol invalid for the session
    Initial,
    /// Missing history is treated as transient
    Reevaluation,
}

/// Shared handles cloned into every background task
#[derive(Clone)]
struct MonitorContext {
    market: Arc<dyn MarketDataService>,
    store: Arc<CandleStore>,
    gate: Arc<VolumeGate>,
    dispatcher: Arc<AlertDispatcher>,
    subscriptions: Arc<SubscriptionController>,
    candidates: Arc<Vec<String>>,
    config: MonitorConfig,
    min_history: usize,
    on_update: CandleCallback,
}

pub struct MonitorOrchestrator {
    ctx: MonitorContext,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<MonitorState>,
}

impl MonitorOrchestrator {
    pub fn new(
        market: Arc<dyn MarketDataService>,
        notifier: Arc<dyn Notifier>,
        candidates: Vec<String>,
        alert_config: RsiAlertConfig,
        volume_config: VolumeFilterConfig,
        mut config: MonitorConfig,
    ) -> Self {
        let min_history = alert_config.min_history();
        if config.window_capacity < min_history {
            warn!(
                "MonitorOrchestrator: Window capacity {} cannot hold RSI({}) history, raising to {}",
                config.window_capacity, alert_config.period, min_history
            );
            config.window_capacity = min_history;
        }

        let mut seen = HashSet::new();
        let candidates: Vec<String> = candidates
            .iter()
            .map(|s| normalize_symbol(s))
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();

        let store = Arc::new(CandleStore::new(config.window_capacity));
        let volumes = Arc::new(VolumeCache::new());
        let gate = Arc::new(VolumeGate::new(market.clone(), volume_config, volumes.clone()));
        let dispatcher = Arc::new(AlertDispatcher::new(
            notifier.clone(),
            volumes,
            alert_config,
        ));
        let subscriptions = Arc::new(SubscriptionController::new(
            market.clone(),
            config.timeframe,
            config.resubscribe_delay,
        ));
        let on_update = stream_callback(store.clone());
        let (state, _) = watch::channel(MonitorState::Starting);

        Self {
            ctx: MonitorContext {
                market,
                store,
                gate,
                dispatcher,
                subscriptions,
                candidates: Arc::new(candidates),
                config,
                min_history,
                on_update,
            },
            notifier,
            state,
        }
    }

    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    /// Receiver that observes every lifecycle transition
    pub fn watch_state(&self) -> watch::Receiver<MonitorState> {
        self.state.subscribe()
    }

    pub fn store(&self) -> Arc<CandleStore> {
        self.ctx.store.clone()
    }

    pub fn volume_gate(&self) -> Arc<VolumeGate> {
        self.ctx.gate.clone()
    }

    pub fn dispatcher(&self) -> Arc<AlertDispatcher> {
        self.ctx.dispatcher.clone()
    }

    pub fn subscriptions(&self) -> Arc<SubscriptionController> {
        self.ctx.subscriptions.clone()
    }

    pub fn candidates(&self) -> &[String] {
        &self.ctx.candidates
    }

    /// Runs one volume reevaluation cycle outside the periodic schedule
    pub async fn reevaluate_now(&self) -> Result<ReevaluationReport, MonitorError> {
        self.ctx.reevaluate(&CancellationToken::new()).await
    }

    /// Drives the full lifecycle until `cancel` fires or a fatal condition occurs.
    ///
    /// Cancellation once Running is a normal stop and returns `Ok`. The subscription is torn
    /// down before this returns.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), MonitorError> {
        let outcome = self.run_phases(&cancel).await;
        self.set_state(MonitorState::Stopped);

        match &outcome {
            Ok(()) => info!("MonitorOrchestrator: Stopped"),
            Err(MonitorError::Cancelled { phase }) => {
                info!("MonitorOrchestrator: Cancelled during {}", phase)
            }
            Err(e) => error!("MonitorOrchestrator: Halted: {}", e),
        }
        outcome
    }

    fn set_state(&self, state: MonitorState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            info!("MonitorOrchestrator: {} -> {}", previous, state);
        }
    }

    async fn run_phases(&self, cancel: &CancellationToken) -> Result<(), MonitorError> {
        self.set_state(MonitorState::Starting);
        if !sleep_or_cancel(self.ctx.config.startup_delay, cancel).await {
            return Err(MonitorError::Cancelled {
                phase: MonitorState::Starting.to_string(),
            });
        }
        match self.notifier.test_connection().await {
            Ok(()) => info!("MonitorOrchestrator: Notifier reachable"),
            Err(e) => warn!(
                "MonitorOrchestrator: Notifier unreachable, continuing without confirmation: {:#}",
                e
            ),
        }

        self.set_state(MonitorState::Seeding);
        self.ctx.initial_seed(cancel).await?;

        self.set_state(MonitorState::Running);
        let eligible = self.ctx.store.eligible_symbols();
        if let Err(e) = self
            .ctx
            .subscriptions
            .resubscribe(eligible, self.ctx.on_update.clone())
            .await
        {
            error!(
                "MonitorOrchestrator: Initial subscription failed, retrying on next reevaluation: {:#}",
                e
            );
        }

        let child = cancel.child_token();
        let fatal: Arc<Mutex<Option<MonitorError>>> = Arc::new(Mutex::new(None));
        let tasks = vec![
            tokio::spawn(self.ctx.clone().indicator_loop(child.clone())),
            tokio::spawn(self.ctx.clone().status_loop(child.clone())),
            tokio::spawn(
                self.ctx
                    .clone()
                    .reevaluation_loop(child.clone(), fatal.clone()),
            ),
        ];

        child.cancelled().await;

        self.set_state(MonitorState::Stopping);
        for joined in join_all(tasks).await {
            if let Err(e) = joined {
                error!("MonitorOrchestrator: Background task failed: {}", e);
            }
        }
        self.ctx.subscriptions.shutdown().await;

        let fatal = fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl MonitorContext {
    async fn initial_seed(&self, cancel: &CancellationToken) -> Result<SeedReport, MonitorError> {
        info!(
            "MonitorOrchestrator: Screening {} candidate symbols",
            self.candidates.len()
        );
        let screening = self.gate.screen(&self.candidates, cancel).await;
        if let Some(reason) = screening.fatal {
            return Err(MonitorError::ProviderAuthentication { reason });
        }
        if screening.interrupted || cancel.is_cancelled() {
            return Err(MonitorError::Cancelled {
                phase: MonitorState::Seeding.to_string(),
            });
        }

        for (symbol, _) in &screening.low_volume {
            self.store.remove(symbol);
        }

        let report = self
            .seed(&screening.eligible, SeedMode::Initial, cancel)
            .await?;
        if cancel.is_cancelled() {
            return Err(MonitorError::Cancelled {
                phase: MonitorState::Seeding.to_string(),
            });
        }

        info!(
            "MonitorOrchestrator: Seeding complete: {} eligible, {} invalid, {} skipped, {} low volume",
            report.seeded.len(),
            report.invalid.len(),
            report.skipped.len() + screening.failed.len(),
            screening.low_volume.len()
        );
        if !report.invalid.is_empty() {
            warn!(
                "MonitorOrchestrator: Invalid symbols: {}",
                report.invalid.join(", ")
            );
        }

        if self.store.eligible_count() == 0 {
            return Err(MonitorError::NoEligibleSymbols {
                invalid: report.invalid.len(),
                low_volume: screening.low_volume.len(),
            });
        }
        Ok(report)
    }

    /// Loads history for `symbols` one at a time, `seed_delay` apart
    async fn seed(
        &self,
        symbols: &[String],
        mode: SeedMode,
        cancel: &CancellationToken,
    ) -> Result<SeedReport, MonitorError> {
        let limit = self.config.seed_limit();
        let mut report = SeedReport::default();

        for (i, symbol) in symbols.iter().enumerate() {
            if i > 0 && !sleep_or_cancel(self.config.seed_delay, cancel).await {
                break;
            }
            if cancel.is_cancelled() {
                break;
            }

            let result = self
                .market
                .get_historical_candles(symbol, self.config.timeframe, limit)
                .await;

            let permanent = match result {
                Ok(candles) if !candles.is_empty() => {
                    let count = candles.len();
                    if self.store.replace(symbol, candles) {
                        debug!(
                            "MonitorOrchestrator: Seeded {} with {} candles",
                            symbol, count
                        );
                        report.seeded.push(symbol.clone());
                    } else {
                        report.invalid.push(symbol.clone());
                    }
                    continue;
                }
                Ok(_) => {
                    debug!("MonitorOrchestrator: No history returned for {}", symbol);
                    true
                }
                Err(e) if is_fatal_provider_error(&e) => {
                    return Err(MonitorError::ProviderAuthentication {
                        reason: format!("{:#}", e),
                    });
                }
                Err(e) if is_unknown_symbol_error(&e) => {
                    debug!("MonitorOrchestrator: {}", e);
                    true
                }
                Err(e) => {
                    warn!(
                        "MonitorOrchestrator: Failed to load history for {}, retrying next cycle: {:#}",
                        symbol, e
                    );
                    false
                }
            };

            if permanent && mode == SeedMode::Initial {
                self.store.mark_invalid(symbol);
                report.invalid.push(symbol.clone());
            } else {
                report.skipped.push(symbol.clone());
            }
        }

        Ok(report)
    }

    async fn reevaluate(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ReevaluationReport, MonitorError> {
        let mut report = ReevaluationReport::default();

        let candidates: Vec<String> = self
            .candidates
            .iter()
            .filter(|s| self.store.status(s) != Some(SymbolStatus::Invalid))
            .cloned()
            .collect();

        let screening = self.gate.screen(&candidates, cancel).await;
        if let Some(reason) = screening.fatal {
            return Err(MonitorError::ProviderAuthentication { reason });
        }
        if screening.interrupted {
            return Ok(report);
        }

        let current: HashSet<String> = self.store.eligible_symbols().into_iter().collect();
        let newcomers: Vec<String> = screening
            .eligible
            .iter()
            .filter(|s| !current.contains(*s))
            .cloned()
            .collect();

        let seeded = self
            .seed(&newcomers, SeedMode::Reevaluation, cancel)
            .await?;
        report.added = seeded.seeded;
        report.skipped = seeded.skipped;
        if cancel.is_cancelled() {
            debug!("MonitorOrchestrator: Reevaluation cancelled, subscription left as is");
            return Ok(report);
        }

        for (symbol, _) in &screening.low_volume {
            if self.store.remove(symbol) {
                report.removed.push(symbol.clone());
            }
        }

        let eligible = self.store.eligible_symbols();
        let changed = !report.added.is_empty() || !report.removed.is_empty();
        let orphaned = !eligible.is_empty() && !self.subscriptions.has_active().await;

        if !changed && !orphaned {
            debug!("MonitorOrchestrator: Eligible set unchanged");
            return Ok(report);
        }

        if changed {
            info!(
                "MonitorOrchestrator: Eligible set changed (+{} -{}), resubscribing to {} symbols",
                report.added.len(),
                report.removed.len(),
                eligible.len()
            );
        } else {
            warn!(
                "MonitorOrchestrator: No live subscription for {} eligible symbols, resubscribing",
                eligible.len()
            );
        }

        match self
            .subscriptions
            .resubscribe(eligible, self.on_update.clone())
            .await
        {
            Ok(()) => report.resubscribed = true,
            Err(e) => error!("MonitorOrchestrator: Resubscription failed: {:#}", e),
        }
        Ok(report)
    }

    async fn indicator_loop(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(non_zero(self.config.check_interval));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let ready = self.store.ready_snapshots(self.min_history);
            let sent = join_all(
                ready
                    .iter()
                    .map(|(symbol, window)| self.dispatcher.evaluate(symbol, window)),
            )
            .await
            .into_iter()
            .filter(|dispatched| *dispatched)
            .count();

            if sent > 0 {
                debug!("MonitorOrchestrator: {} alerts dispatched this cycle", sent);
            }
        }
        debug!("MonitorOrchestrator: Indicator loop stopped");
    }

    async fn reevaluation_loop(
        self,
        cancel: CancellationToken,
        fatal: Arc<Mutex<Option<MonitorError>>>,
    ) {
        let period = non_zero(self.gate.config().check_interval);
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "MonitorOrchestrator: Volume reevaluation every {:?} (filter {})",
            period,
            if self.gate.is_enabled() { "enabled" } else { "disabled" }
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.reevaluate(&cancel).await {
                Ok(report) => debug!("MonitorOrchestrator: Reevaluation done: {:?}", report),
                Err(e) => {
                    error!("MonitorOrchestrator: Reevaluation hit a fatal error: {}", e);
                    *fatal.lock().unwrap_or_else(PoisonError::into_inner) = Some(e);
                    cancel.cancel();
                    break;
                }
            }
        }
        debug!("MonitorOrchestrator: Reevaluation loop stopped");
    }

    async fn status_loop(self, cancel: CancellationToken) {
        let period = non_zero(self.config.status_interval);
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let live = self.subscriptions.has_active().await;
            info!(
                "MonitorOrchestrator: Monitoring {} symbols, {} with at least {} candles, stream {}",
                self.store.eligible_count(),
                self.store.ready_count(self.min_history),
                self.min_history,
                if live { "live" } else { "down" }
            );
        }
    }
}

/// Hands streamed klines straight to the store
fn stream_callback(store: Arc<CandleStore>) -> CandleCallback {
    Arc::new(move |update: CandleUpdate| {
        if let Some(UpsertOutcome::Rejected) = store.upsert(&update.symbol, update.candle) {
            debug!(
                "MonitorOrchestrator: Dropped out-of-order kline for {}",
                update.symbol
            );
        }
    })
}

/// Returns false when cancelled before `duration` elapsed
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

fn non_zero(period: Duration) -> Duration {
    period.max(Duration::from_millis(1))
}
