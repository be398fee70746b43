//! Feed client integration tests
//!
//! Run the feed state machine against a scripted connector: reconnect
//! backoff, resubscription, manual reconnect/disconnect, and the full
//! frame-to-position pipeline through the runtime.

use std::sync::Arc;
use std::time::Duration;

use approx::assert_relative_eq;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use pump_brain::adapters::log_sink::MemoryLogSink;
use pump_brain::adapters::pump_fun::{
    FeedClient, FeedConfig, FeedConfigBuilder, FeedError, FeedEvent,
};
use pump_brain::application::{BotRuntime, RuntimeConfig, RuntimeError, RuntimeHandle};
use pump_brain::domain::{
    ConnectionStatus, MarketState, MarketStateConfig, SharedMarketState, Token,
};
use pump_brain::ports::mocks::{RecordingExecutor, ScriptedConnector, SessionRemote};
use pump_brain::ports::{ManualClock, CATEGORY_FEED};
use pump_brain::strategy::{MirrorConfig, StrategyConfig, StrategyEngine};

// ============================================================================
// Test Fixtures
// ============================================================================

const TARGET_WALLET: &str = "11111111111111111111111111111111";

struct Feed {
    client: FeedClient,
    events: mpsc::Receiver<FeedEvent>,
    connector: ScriptedConnector,
    state: SharedMarketState,
    log: Arc<MemoryLogSink>,
}

fn start_feed(config: FeedConfig) -> Feed {
    let connector = ScriptedConnector::new();
    let state = MarketState::shared(MarketStateConfig::default());
    let log = Arc::new(MemoryLogSink::default());
    let (client, events) = FeedClient::new(
        config,
        Arc::new(connector.clone()),
        Arc::clone(&state),
        Arc::new(ManualClock::new(1_700_000_000_000)),
        log.clone(),
    );
    tokio::spawn({
        let client = client.clone();
        async move { client.run().await }
    });
    Feed {
        client,
        events,
        connector,
        state,
        log,
    }
}

async fn wait_for(client: &FeedClient, status: ConnectionStatus) {
    let mut rx = client.status_receiver();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == status))
        .await
        .expect("status not reached in time")
        .unwrap();
}

async fn next_frame(remote: &mut SessionRemote) -> String {
    tokio::time::timeout(Duration::from_secs(5), remote.outbound.recv())
        .await
        .expect("no frame in time")
        .expect("session closed")
}

// ============================================================================
// Reconnect
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_backoff_sequence_then_give_up() {
    let feed = start_feed(
        FeedConfigBuilder::new()
            .reconnect_backoff(500, 30_000)
            .max_reconnect_attempts(4)
            .build(),
    );

    feed.client.connect().unwrap();
    wait_for(&feed.client, ConnectionStatus::Offline).await;

    let retries: Vec<String> = feed
        .log
        .category(CATEGORY_FEED)
        .into_iter()
        .filter(|m| m.contains("Retrying"))
        .collect();
    assert_eq!(
        retries,
        vec![
            "CONNECTION LOST. Retrying in 500ms...",
            "CONNECTION LOST. Retrying in 750ms...",
            "CONNECTION LOST. Retrying in 1125ms...",
            "CONNECTION LOST. Retrying in 1688ms...",
        ]
    );
    assert!(feed.log.contains("Gave up after 4 attempts"));
    assert_eq!(feed.connector.dial_count(), 5);

    // parked until a manual reconnect
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(feed.connector.dial_count(), 5);
    assert_eq!(feed.state.read().await.telemetry().status, ConnectionStatus::Offline);
}

#[tokio::test(start_paused = true)]
async fn test_remote_drop_resubscribes_on_new_session() {
    let feed = start_feed(FeedConfig::default());
    let mut first = feed.connector.accept();
    let mut second = feed.connector.accept();

    feed.client.connect().unwrap();
    assert_eq!(next_frame(&mut first).await, r#"{"method":"subscribeNewToken"}"#);

    feed.client.subscribe_token_trades(vec!["mintA".into()]).unwrap();
    assert_eq!(
        next_frame(&mut first).await,
        r#"{"method":"subscribeTokenTrade","keys":["mintA"]}"#
    );

    drop(first);

    assert_eq!(next_frame(&mut second).await, r#"{"method":"subscribeNewToken"}"#);
    assert_eq!(
        next_frame(&mut second).await,
        r#"{"method":"subscribeTokenTrade","keys":["mintA"]}"#
    );
    assert_eq!(feed.connector.dial_count(), 2);
    assert!(feed.log.contains("Retrying in 500ms"));
}

#[tokio::test]
async fn test_force_reconnect_skips_pending_timer() {
    let feed = start_feed(FeedConfigBuilder::new().reconnect_backoff(60_000, 60_000).build());
    feed.connector.refuse("connection refused");
    let _remote = feed.connector.accept();

    feed.client.connect().unwrap();
    wait_for(&feed.client, ConnectionStatus::Error).await;
    assert!(feed.log.contains("Retrying in 60000ms"));

    feed.client.force_reconnect().unwrap();
    wait_for(&feed.client, ConnectionStatus::Online).await;
    assert_eq!(feed.connector.dial_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_reconnect() {
    let feed = start_feed(FeedConfig::default());
    feed.connector.refuse("connection refused");

    feed.client.connect().unwrap();
    wait_for(&feed.client, ConnectionStatus::Error).await;

    feed.client.disconnect().unwrap();
    wait_for(&feed.client, ConnectionStatus::Offline).await;
    let _remote = feed.connector.accept();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(feed.connector.dial_count(), 1);
    assert_eq!(feed.client.status(), ConnectionStatus::Offline);
}

#[tokio::test]
async fn test_server_errors_and_garbage_keep_session() {
    let mut feed = start_feed(FeedConfig::default());
    let mut remote = feed.connector.accept();

    feed.client.connect().unwrap();
    next_frame(&mut remote).await;

    for frame in [
        "not json",
        r#"{"errors":"rate limited"}"#,
        r#"{"message":"Successfully subscribed to token creation events."}"#,
        r#"{"txType":"create","mint":"mintA","symbol":"PEPE","marketCapSol":30}"#,
    ] {
        remote.inbound.send(frame.to_string()).unwrap();
    }

    let event = tokio::time::timeout(Duration::from_secs(5), feed.events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.mint(), "mintA");
    assert_eq!(feed.client.status(), ConnectionStatus::Online);
    assert_eq!(feed.state.read().await.telemetry().packets_received, 4);
    assert_eq!(feed.connector.dial_count(), 1);
}

// ============================================================================
// Pipeline
// ============================================================================

struct Pipeline {
    feed: FeedClient,
    handle: RuntimeHandle,
    state: SharedMarketState,
    connector: ScriptedConnector,
    log: Arc<MemoryLogSink>,
    feed_task: JoinHandle<Result<(), FeedError>>,
    runtime_task: JoinHandle<Result<(), RuntimeError>>,
}

/// Feed client and runtime wired together, both running, not yet connected
fn start_pipeline(
    bots: Vec<StrategyConfig>,
    market: MarketStateConfig,
    follow_new_token_trades: bool,
) -> Pipeline {
    let connector = ScriptedConnector::new();
    let state = MarketState::shared(market);
    let clock = ManualClock::new(1_700_000_000_000);
    let log = Arc::new(MemoryLogSink::default());
    let (feed, events) = FeedClient::new(
        FeedConfig::default(),
        Arc::new(connector.clone()),
        Arc::clone(&state),
        Arc::new(clock.clone()),
        log.clone(),
    );
    let engine = StrategyEngine::new(bots, 500).unwrap();
    let (runtime, handle) = BotRuntime::new(
        RuntimeConfig {
            flush_interval_ms: 0,
            follow_new_token_trades,
            ..RuntimeConfig::default()
        },
        Arc::clone(&state),
        engine,
        feed.clone(),
        Arc::new(RecordingExecutor::new()),
        Arc::new(clock),
        log.clone(),
    );

    let feed_task = tokio::spawn({
        let feed = feed.clone();
        async move { feed.run().await }
    });
    let runtime_task = tokio::spawn(runtime.run(events));
    Pipeline {
        feed,
        handle,
        state,
        connector,
        log,
        feed_task,
        runtime_task,
    }
}

impl Pipeline {
    async fn stop(self) {
        self.handle.shutdown().unwrap();
        self.runtime_task.await.unwrap().unwrap();
        self.feed.shutdown().unwrap();
        self.feed_task.await.unwrap().unwrap();
    }
}

fn create_frame(mint: &str, symbol: &str) -> String {
    format!(
        r#"{{"txType":"create","mint":"{}","symbol":"{}","name":"{}","marketCapSol":30}}"#,
        mint, symbol, symbol
    )
}

#[tokio::test]
async fn test_frames_flow_into_mirror_position() {
    let mirror = StrategyConfig::Mirror(MirrorConfig {
        enabled: true,
        target_wallet: TARGET_WALLET.to_string(),
        copy_percent: 50.0,
    });
    let p = start_pipeline(
        vec![mirror],
        MarketStateConfig {
            starting_balance: 10.0,
            ..MarketStateConfig::default()
        },
        false,
    );
    let mut remote = p.connector.accept();
    p.feed.connect().unwrap();

    assert_eq!(next_frame(&mut remote).await, r#"{"method":"subscribeNewToken"}"#);
    assert_eq!(
        next_frame(&mut remote).await,
        format!(r#"{{"method":"subscribeAccountTrade","keys":["{}"]}}"#, TARGET_WALLET)
    );

    remote.inbound.send(create_frame("mintA", "PEPE")).unwrap();
    remote
        .inbound
        .send(format!(
            r#"{{"txType":"buy","mint":"mintA","traderPublicKey":"{}","solAmount":2.0,"marketCapSol":31}}"#,
            TARGET_WALLET
        ))
        .unwrap();

    // the runtime follows the trades of anything it holds
    assert_eq!(
        next_frame(&mut remote).await,
        r#"{"method":"subscribeTokenTrade","keys":["mintA"]}"#
    );

    let summary = p.handle.summary().await;
    assert_eq!(summary.status, ConnectionStatus::Online);
    assert_eq!(summary.open_positions, 1);
    assert_relative_eq!(summary.balance_sol, 9.0, epsilon = 1e-9);
    {
        let state = p.state.read().await;
        let position = &state.positions()[0];
        assert_eq!(position.source, "MIRROR");
        assert_relative_eq!(position.sol_spent, 1.0);
    }
    assert!(p.log.contains("BUY $PEPE for 1 SOL"));

    p.stop().await;
}

#[tokio::test]
async fn test_closed_position_not_resubscribed_after_reconnect() {
    let p = start_pipeline(vec![], MarketStateConfig::default(), false);
    let mut token = Token::new("mintA", "PEPE", "Pepe");
    token.market_cap_sol = 30.0;
    p.state.write().await.add_token(token);
    let mut first = p.connector.accept();
    let mut second = p.connector.accept();

    p.feed.connect().unwrap();
    assert_eq!(next_frame(&mut first).await, r#"{"method":"subscribeNewToken"}"#);

    let id = p.handle.manual_buy("mintA", 1.0).await.unwrap();
    assert_eq!(
        next_frame(&mut first).await,
        r#"{"method":"subscribeTokenTrade","keys":["mintA"]}"#
    );
    p.handle.close_position(id, 100.0).await.unwrap();
    assert_eq!(
        next_frame(&mut first).await,
        r#"{"method":"unsubscribeTokenTrade","keys":["mintA"]}"#
    );

    p.feed.force_reconnect().unwrap();
    p.feed.subscribe_token_trades(vec!["mintZ".into()]).unwrap();
    assert_eq!(next_frame(&mut second).await, r#"{"method":"subscribeNewToken"}"#);
    assert_eq!(
        next_frame(&mut second).await,
        r#"{"method":"subscribeTokenTrade","keys":["mintZ"]}"#
    );

    p.stop().await;
}

#[tokio::test]
async fn test_evicted_followed_token_released_once_sold() {
    let p = start_pipeline(
        vec![],
        MarketStateConfig {
            token_cap: 1,
            ..MarketStateConfig::default()
        },
        true,
    );
    let mut first = p.connector.accept();
    let mut second = p.connector.accept();

    p.feed.connect().unwrap();
    assert_eq!(next_frame(&mut first).await, r#"{"method":"subscribeNewToken"}"#);

    first.inbound.send(create_frame("mintA", "AAA")).unwrap();
    assert_eq!(
        next_frame(&mut first).await,
        r#"{"method":"subscribeTokenTrade","keys":["mintA"]}"#
    );
    let id = p.handle.manual_buy("mintA", 1.0).await.unwrap();

    // mintA is pushed out of the list while still held
    first.inbound.send(create_frame("mintB", "BBB")).unwrap();
    assert_eq!(
        next_frame(&mut first).await,
        r#"{"method":"subscribeTokenTrade","keys":["mintB"]}"#
    );

    p.handle.close_position(id, 100.0).await.unwrap();
    assert_eq!(
        next_frame(&mut first).await,
        r#"{"method":"unsubscribeTokenTrade","keys":["mintA"]}"#
    );

    p.feed.force_reconnect().unwrap();
    assert_eq!(next_frame(&mut second).await, r#"{"method":"subscribeNewToken"}"#);
    assert_eq!(
        next_frame(&mut second).await,
        r#"{"method":"subscribeTokenTrade","keys":["mintB"]}"#
    );

    p.stop().await;
}
