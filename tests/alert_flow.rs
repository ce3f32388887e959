use rsiwatch::application::alerts::{AlertDispatcher, AlertOutcome};
use rsiwatch::application::market_data::VolumeCache;
use rsiwatch::application::monitoring::{MonitorOrchestrator, MonitorState};
use rsiwatch::domain::config::{MonitorConfig, RsiAlertConfig, VolumeFilterConfig};
use rsiwatch::infrastructure::mock::{
    MockMarketDataService, RecordingNotifier, candle_series, rising_series,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn wait_for_messages(notifier: &RecordingNotifier, count: usize) -> Vec<String> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let messages = notifier.messages();
            if messages.len() >= count {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("alert should be delivered")
}

#[tokio::test]
async fn test_streamed_rally_triggers_single_overbought_alert() {
    let market = Arc::new(MockMarketDataService::new());
    market.set_volume("BTCUSDT", Decimal::from(30_000_000));
    // Choppy history: equal gains and losses, RSI 50
    let choppy: Vec<Decimal> = (0..15).map(|i| Decimal::from(100 + i % 2)).collect();
    market.set_history("BTCUSDT", candle_series("BTCUSDT", &choppy));

    let notifier = Arc::new(RecordingNotifier::new());
    let orchestrator = Arc::new(MonitorOrchestrator::new(
        market.clone(),
        notifier.clone(),
        vec!["BTCUSDT".to_string()],
        RsiAlertConfig::default(),
        VolumeFilterConfig {
            request_delay: Duration::ZERO,
            ..VolumeFilterConfig::default()
        },
        MonitorConfig {
            seed_delay: Duration::ZERO,
            resubscribe_delay: Duration::ZERO,
            startup_delay: Duration::ZERO,
            check_interval: Duration::from_millis(10),
            ..MonitorConfig::default()
        },
    ));

    let cancel = CancellationToken::new();
    let mut states = orchestrator.watch_state();
    let runner = {
        let orchestrator = orchestrator.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { orchestrator.run(cancel).await })
    };
    states
        .wait_for(|s| *s == MonitorState::Running)
        .await
        .unwrap();
    while market.active_symbols().is_none() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // Let a few indicator cycles pass inside the band
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(notifier.messages().is_empty());

    // Rally: fifteen rising closes follow the choppy history
    for candle in rising_series("BTCUSDT", 30, 101).into_iter().skip(15) {
        assert!(market.push_update(candle));
    }

    let messages = wait_for_messages(&notifier, 1).await;
    assert!(messages[0].contains("Overbought"));
    assert!(messages[0].contains("BTCUSDT"));
    assert!(messages[0].contains("30,000,000"));

    // Further cycles stay inside the cooldown
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(notifier.messages().len(), 1);
    assert!(orchestrator.dispatcher().last_alert("BTCUSDT").is_some());

    cancel.cancel();
    assert!(runner.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_cooldown_is_idempotent_under_repeated_evaluation() {
    let notifier = Arc::new(RecordingNotifier::new());
    let dispatcher = AlertDispatcher::new(
        notifier.clone(),
        Arc::new(VolumeCache::new()),
        RsiAlertConfig::default(),
    );

    let closes: Vec<Decimal> = (0..15).map(|i| Decimal::from(200 - i)).collect();
    let window = candle_series("ETHUSDT", &closes);
    let start = chrono::Utc::now();

    let first = dispatcher.evaluate_at("ETHUSDT", &window, start).await;
    assert!(first.dispatched());

    for seconds in [1, 60, 299] {
        let outcome = dispatcher
            .evaluate_at("ETHUSDT", &window, start + chrono::Duration::seconds(seconds))
            .await;
        assert!(matches!(outcome, AlertOutcome::CoolingDown { .. }));
    }

    let later = dispatcher
        .evaluate_at("ETHUSDT", &window, start + chrono::Duration::seconds(301))
        .await;
    assert!(later.dispatched());

    let messages = notifier.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m.contains("Oversold")));
}
