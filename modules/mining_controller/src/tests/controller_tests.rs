// modules/mining_controller/src/tests/controller_tests.rs
use super::fake_daemon::{refused_error, timeout_error, FakeDaemon, GenerateStep};
use crate::{
    ControllerSettings, GenerateDialect, MiningController, StopReason, BLOCK_ID_PREVIEW_LEN, FINAL_READ_TIMEOUT,
};
use fleet_rpc_connector::RpcErrorKind;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn regtest() -> ControllerSettings {
    ControllerSettings {
        dialect: GenerateDialect::CountOnly,
        ..ControllerSettings::default()
    }
}

fn controller(daemon: FakeDaemon, settings: ControllerSettings) -> (Arc<FakeDaemon>, MiningController<Arc<FakeDaemon>>) {
    let daemon = Arc::new(daemon);
    (Arc::clone(&daemon), MiningController::new(daemon, settings))
}

#[tokio::test]
async fn test_zero_blocks_is_a_normal_outcome() {
    let (_, ctl) = controller(FakeDaemon::new(100, 1.0).with_script([GenerateStep::Empty]), regtest());

    let outcome = ctl.mine_once(1, true).await.expect("zero blocks must not be an error");
    assert_eq!(outcome.blocks_produced(), 0);
    assert!(outcome.is_empty());
    assert_eq!(outcome.height_delta(), Some(0));
    assert_eq!(outcome.first_block_preview(), None);
}

#[tokio::test]
async fn test_height_delta_tracks_produced_blocks() {
    for k in [1usize, 2, 5] {
        let (_, ctl) = controller(FakeDaemon::new(40, 0.0).with_script([GenerateStep::Blocks(k)]), regtest());
        let outcome = ctl.mine_once(k as u64, true).await.unwrap();
        assert_eq!(outcome.blocks_produced(), k as u64);
        assert_eq!(outcome.height_delta(), Some(k as i64));
        assert_eq!(outcome.balance_delta(), Some(10_000.0 * k as f64));
        assert_eq!(outcome.requested, k as u64);
    }
}

#[tokio::test]
async fn test_first_block_preview_is_truncated() {
    let (_, ctl) = controller(FakeDaemon::new(0, 0.0), regtest());
    let outcome = ctl.mine_once(1, false).await.unwrap();
    let preview = outcome.first_block_preview().unwrap();
    assert_eq!(preview.len(), BLOCK_ID_PREVIEW_LEN);
    assert!(outcome.blocks[0].starts_with(preview));
}

#[tokio::test]
async fn test_stats_disabled_only_generates() {
    let (daemon, ctl) = controller(FakeDaemon::new(0, 0.0), regtest());
    let outcome = ctl.mine_once(3, false).await.unwrap();
    assert_eq!(daemon.methods(), vec!["generate"]);
    assert!(outcome.before.is_none());
    assert_eq!(outcome.height_delta(), None);
}

#[tokio::test]
async fn test_snapshot_failures_are_best_effort() {
    let daemon = FakeDaemon::new(7, 0.0).failing("getbalance", refused_error());
    let (_, ctl) = controller(daemon, regtest());

    let outcome = ctl.mine_once(1, true).await.expect("stats reads are informational");
    assert_eq!(outcome.blocks_produced(), 1);
    assert_eq!(outcome.height_delta(), Some(1));
    assert_eq!(outcome.balance_delta(), None);
}

#[tokio::test]
async fn test_generation_failure_propagates() {
    let (_, ctl) = controller(
        FakeDaemon::new(0, 0.0).with_script([GenerateStep::Fail(timeout_error())]),
        regtest(),
    );
    let err = ctl.mine_once(1, true).await.unwrap_err();
    assert_eq!(err.kind(), RpcErrorKind::Timeout);
}

#[tokio::test]
async fn test_dialects_shape_generate_params() {
    let (daemon, ctl) = controller(FakeDaemon::new(0, 0.0), regtest());
    ctl.mine_once(2, false).await.unwrap();
    assert_eq!(daemon.generate_requests()[0].params, vec![json!(2)]);

    let mainnet = ControllerSettings {
        max_tries: 1234,
        ..ControllerSettings::default()
    };
    let (daemon, ctl) = controller(FakeDaemon::new(0, 0.0), mainnet);
    ctl.mine_once(1, true).await.unwrap();
    assert_eq!(daemon.generate_requests()[0].params, vec![json!(1), json!(1234)]);
    // The two-argument dialect also looks at mining conditions first.
    assert!(daemon.methods().contains(&"getmininginfo".to_string()));
}

#[tokio::test]
async fn test_auto_mine_stops_at_max_blocks() {
    let (daemon, ctl) = controller(FakeDaemon::new(10, 0.0), regtest());
    let cancel = CancellationToken::new();

    let summary = ctl.auto_mine(Duration::ZERO, Some(3), &cancel).await;
    assert_eq!(summary.reason, StopReason::MaxBlocksReached);
    assert_eq!(summary.stats.blocks_mined, 3);
    assert_eq!(summary.stats.attempts, 3);
    assert_eq!(daemon.generate_requests().len(), 3);
    assert_eq!(summary.stats.start.height, Some(10));
    assert_eq!(summary.finish.height, Some(13));
}

#[tokio::test]
async fn test_auto_mine_never_exceeds_limit_with_empty_attempts() {
    let daemon = FakeDaemon::new(0, 0.0).with_script([
        GenerateStep::Empty,
        GenerateStep::Blocks(1),
        GenerateStep::Empty,
        GenerateStep::Blocks(1),
    ]);
    let (daemon, ctl) = controller(daemon, regtest());

    let summary = ctl.auto_mine(Duration::ZERO, Some(2), &CancellationToken::new()).await;
    assert_eq!(summary.stats.blocks_mined, 2);
    assert_eq!(summary.stats.attempts, 4);
    assert_eq!(summary.stats.failed_attempts, 0);
    assert_eq!(daemon.height(), 2);
}

#[tokio::test]
async fn test_auto_mine_survives_timeout() {
    let daemon = FakeDaemon::new(0, 0.0).with_script([
        GenerateStep::Fail(timeout_error()),
        GenerateStep::Fail(refused_error()),
        GenerateStep::Blocks(1),
    ]);
    let (_, ctl) = controller(daemon, regtest());

    let summary = ctl.auto_mine(Duration::ZERO, Some(1), &CancellationToken::new()).await;
    assert_eq!(summary.reason, StopReason::MaxBlocksReached);
    assert_eq!(summary.stats.attempts, 3);
    assert_eq!(summary.stats.failed_attempts, 2);
    assert_eq!(summary.stats.blocks_mined, 1);
}

#[tokio::test]
async fn test_auto_mine_zero_limit_does_nothing() {
    let (daemon, ctl) = controller(FakeDaemon::new(0, 0.0), regtest());
    let summary = ctl.auto_mine(Duration::from_secs(60), Some(0), &CancellationToken::new()).await;
    assert_eq!(summary.reason, StopReason::MaxBlocksReached);
    assert_eq!(summary.stats.attempts, 0);
    assert!(daemon.generate_requests().is_empty());
}

#[tokio::test]
async fn test_cancel_during_sleep_is_prompt() {
    let (_, ctl) = controller(FakeDaemon::new(0, 0.0), regtest());
    let cancel = CancellationToken::new();
    let started = Instant::now();

    let canceller = {
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel.cancel();
        }
    };
    let (summary, _) = tokio::time::timeout(
        Duration::from_secs(5),
        async { tokio::join!(ctl.auto_mine(Duration::from_secs(60), None, &cancel), canceller) },
    )
    .await
    .expect("cancellation must not wait for the full interval");

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(summary.reason, StopReason::Cancelled);
    assert_eq!(summary.stats.attempts, 1);
    assert_eq!(summary.stats.blocks_mined, 1);
    assert_eq!(summary.finish.height, Some(1));
}

#[tokio::test]
async fn test_cancel_during_hanging_rpc() {
    let (_, ctl) = controller(FakeDaemon::new(5, 0.0).with_fallback(GenerateStep::Hang), regtest());
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        }
    };
    let (summary, _) = tokio::time::timeout(
        Duration::from_secs(5),
        async { tokio::join!(ctl.auto_mine(Duration::ZERO, None, &cancel), canceller) },
    )
    .await
    .expect("in-flight call must be abandoned on cancel");

    assert_eq!(summary.reason, StopReason::Cancelled);
    assert_eq!(summary.stats.attempts, 1);
    assert_eq!(summary.stats.blocks_mined, 0);
    assert_eq!(summary.stats.failed_attempts, 0);
}

#[tokio::test]
async fn test_final_read_failure_keeps_cancelled_reason() {
    let daemon = FakeDaemon::new(0, 0.0)
        .with_fallback(GenerateStep::Hang)
        .failing("getblockcount", refused_error())
        .failing("getbalance", refused_error());
    let (_, ctl) = controller(daemon, regtest());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = ctl.auto_mine(Duration::from_secs(1), None, &cancel).await;
    assert_eq!(summary.reason, StopReason::Cancelled);
    assert_eq!(summary.finish.height, None);
    assert_eq!(summary.finish.balance, None);
}

#[tokio::test(start_paused = true)]
async fn test_final_read_is_bounded_after_cancel() {
    let daemon = FakeDaemon::new(0, 0.0).hanging("getblockcount");
    let (daemon, ctl) = controller(daemon, regtest());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let started = tokio::time::Instant::now();
    let summary = tokio::time::timeout(
        Duration::from_secs(60),
        ctl.auto_mine(Duration::from_secs(1), None, &cancel),
    )
    .await
    .expect("a hanging daemon must not hold the session open after cancel");

    assert_eq!(summary.reason, StopReason::Cancelled);
    assert_eq!(summary.stats.attempts, 0);
    assert_eq!(summary.finish.height, None);
    assert_eq!(summary.finish.balance, None);
    assert!(started.elapsed() >= FINAL_READ_TIMEOUT);
    assert!(started.elapsed() < Duration::from_secs(60));
    assert!(daemon.generate_requests().is_empty());
}

#[tokio::test]
async fn test_status_reads_everything() {
    let (daemon, ctl) = controller(FakeDaemon::new(321, 42.5).with_difficulty(2.0), regtest());
    let status = ctl.status().await.unwrap();
    assert_eq!(status.height, 321);
    assert_eq!(status.balance, 42.5);
    assert_eq!(status.difficulty, 2.0);
    assert_eq!(status.chain, "regtest");
    assert_eq!(status.connections, Some(3));
    assert_eq!(daemon.methods(), vec!["getblockchaininfo", "getnetworkinfo", "getbalance"]);
}

#[tokio::test]
async fn test_status_fails_as_a_whole() {
    let daemon = FakeDaemon::new(1, 1.0).failing("getnetworkinfo", refused_error());
    let (_, ctl) = controller(daemon, regtest());
    let err = ctl.status().await.unwrap_err();
    assert_eq!(err.kind(), RpcErrorKind::ConnectionFailure);
}

#[tokio::test]
async fn test_check_connection() {
    let (_, ctl) = controller(FakeDaemon::new(9, 0.0), regtest());
    let info = ctl.check_connection().await.unwrap();
    assert_eq!(info.blocks, 9);

    let (_, broken) = controller(
        FakeDaemon::new(9, 0.0).failing("getblockchaininfo", refused_error()),
        regtest(),
    );
    assert!(broken.check_connection().await.is_err());
}

#[tokio::test]
async fn test_outcome_rendering() {
    let (_, ctl) = controller(FakeDaemon::new(0, 0.0), regtest());
    let line = ctl.mine_once(2, true).await.unwrap().to_string();
    assert!(line.starts_with("Mined 2 of 2 block(s)"), "{line}");
    assert!(line.contains("first block 0000000000000000..."), "{line}");
    assert!(line.contains("+20000.00000000 FC"), "{line}");

    let (_, ctl) = controller(FakeDaemon::new(0, 0.0).with_script([GenerateStep::Empty]), regtest());
    let line = ctl.mine_once(1, false).await.unwrap().to_string();
    assert!(line.starts_with("Mined 0 of 1 block(s)"), "{line}");
    assert!(!line.contains("first block"));
}
