use rsiwatch::application::monitoring::{MonitorOrchestrator, MonitorState};
use rsiwatch::domain::config::{MonitorConfig, RsiAlertConfig, VolumeFilterConfig};
use rsiwatch::domain::errors::MonitorError;
use rsiwatch::domain::market::SymbolStatus;
use rsiwatch::infrastructure::mock::{
    MockFailure, MockMarketDataService, RecordingNotifier, rising_series,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn monitor_config() -> MonitorConfig {
    MonitorConfig {
        seed_delay: Duration::ZERO,
        resubscribe_delay: Duration::ZERO,
        startup_delay: Duration::ZERO,
        check_interval: Duration::from_millis(10),
        ..MonitorConfig::default()
    }
}

fn build(
    market: &Arc<MockMarketDataService>,
    notifier: &Arc<RecordingNotifier>,
    candidates: &[&str],
) -> Arc<MonitorOrchestrator> {
    Arc::new(MonitorOrchestrator::new(
        market.clone(),
        notifier.clone(),
        candidates.iter().map(|s| s.to_string()).collect(),
        RsiAlertConfig::default(),
        VolumeFilterConfig {
            request_delay: Duration::ZERO,
            ..VolumeFilterConfig::default()
        },
        monitor_config(),
    ))
}

#[tokio::test]
async fn test_no_eligible_symbols_halts_seeding() {
    let market = Arc::new(MockMarketDataService::new());
    market.set_volume("LOWUSDT", Decimal::from(5_000_000));
    market.set_volume("GONEUSDT", Decimal::from(30_000_000));
    // GONEUSDT has no history at all

    let notifier = Arc::new(RecordingNotifier::new());
    let orchestrator = build(&market, &notifier, &["LOWUSDT", "GONEUSDT"]);

    let result = orchestrator.run(CancellationToken::new()).await;
    assert!(matches!(
        result,
        Err(MonitorError::NoEligibleSymbols {
            invalid: 1,
            low_volume: 1
        })
    ));
    assert_eq!(orchestrator.state(), MonitorState::Stopped);
    assert!(market.subscribe_calls().is_empty());

    let store = orchestrator.store();
    assert_eq!(store.status("GONEUSDT"), Some(SymbolStatus::Invalid));
    assert_eq!(store.status("LOWUSDT"), Some(SymbolStatus::LowVolume));
}

#[tokio::test]
async fn test_unauthorized_volume_is_fatal() {
    let market = Arc::new(MockMarketDataService::new());
    market.fail_volume("BTCUSDT", MockFailure::Unauthorized);
    market.set_history("BTCUSDT", rising_series("BTCUSDT", 20, 100));

    let notifier = Arc::new(RecordingNotifier::new());
    let orchestrator = build(&market, &notifier, &["BTCUSDT"]);

    let result = orchestrator.run(CancellationToken::new()).await;
    assert!(matches!(
        result,
        Err(MonitorError::ProviderAuthentication { .. })
    ));
    assert!(market.history_requests().is_empty());
}

#[tokio::test]
async fn test_cancel_before_running_reports_phase() {
    let market = Arc::new(MockMarketDataService::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let orchestrator = Arc::new(MonitorOrchestrator::new(
        market.clone(),
        notifier,
        vec!["BTCUSDT".to_string()],
        RsiAlertConfig::default(),
        VolumeFilterConfig::default(),
        MonitorConfig {
            startup_delay: Duration::from_secs(3600),
            ..monitor_config()
        },
    ));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = orchestrator.run(cancel).await;

    match result {
        Err(MonitorError::Cancelled { phase }) => assert_eq!(phase, "Starting"),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(market.volume_requests().is_empty());
}

#[tokio::test]
async fn test_graceful_shutdown_tears_down_subscription() {
    let market = Arc::new(MockMarketDataService::new());
    market.set_volume("BTCUSDT", Decimal::from(30_000_000));
    market.set_history("BTCUSDT", rising_series("BTCUSDT", 10, 100));

    let notifier = Arc::new(RecordingNotifier::new());
    // Unreachable notifier only produces a warning at startup
    notifier.set_unreachable(true);
    let orchestrator = build(&market, &notifier, &["BTCUSDT"]);

    let cancel = CancellationToken::new();
    let mut states = orchestrator.watch_state();
    let runner = {
        let orchestrator = orchestrator.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { orchestrator.run(cancel).await })
    };

    tokio::time::timeout(
        Duration::from_secs(5),
        states.wait_for(|s| *s == MonitorState::Running),
    )
    .await
    .expect("monitor should reach Running")
    .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while market.active_symbols().is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("subscription should open");
    assert_eq!(market.active_symbols(), Some(vec!["BTCUSDT".to_string()]));

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("monitor should stop")
        .unwrap();

    assert!(result.is_ok());
    assert_eq!(orchestrator.state(), MonitorState::Stopped);
    assert!(market.active_symbols().is_none());
    assert_eq!(market.unsubscribe_count(), 1);
    // Too little history for RSI(14): nothing was sent
    assert!(notifier.messages().is_empty());
}
