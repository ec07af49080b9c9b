use std::time::{Duration, Instant};

use fleet_rpc_connector::{BlockchainInfo, DaemonRpc, RpcError, RpcErrorKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::verifier::{VerificationReport, Verifier};

/// Default search budget handed to `generate` on networks that accept one.
pub const DEFAULT_MAX_TRIES: u64 = 5_000_000;
/// Above this difficulty mining through the daemon is expected to be slow.
pub const DEFAULT_HIGH_DIFFICULTY: f64 = 1000.0;
/// Length of the block identifier prefix shown in reports.
pub const BLOCK_ID_PREVIEW_LEN: usize = 16;
/// Upper bound for the closing height/balance read of an auto-mining session.
/// Runs after a stop was requested, so it must not wait out a full RPC timeout.
pub const FINAL_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Parameter shape the daemon's `generate` call accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateDialect {
    /// `generate [count]`
    CountOnly,
    /// `generate [count, maxtries]`
    CountWithMaxTries,
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub dialect: GenerateDialect,
    pub max_tries: u64,
    pub high_difficulty_threshold: f64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        ControllerSettings {
            dialect: GenerateDialect::CountWithMaxTries,
            max_tries: DEFAULT_MAX_TRIES,
            high_difficulty_threshold: DEFAULT_HIGH_DIFFICULTY,
        }
    }
}

impl ControllerSettings {
    /// `maxtries` argument for a real mining attempt, if the dialect takes one.
    pub fn search_budget(&self) -> Option<u64> {
        match self.dialect {
            GenerateDialect::CountOnly => None,
            GenerateDialect::CountWithMaxTries => Some(self.max_tries),
        }
    }
}

/// Best-effort view of the chain tip and wallet. Missing values mean the read failed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChainSnapshot {
    pub height: Option<u64>,
    pub balance: Option<f64>,
}

/// Result of a single generation attempt.
#[derive(Debug, Clone)]
pub struct MiningOutcome {
    pub requested: u64,
    pub blocks: Vec<String>,
    pub elapsed: Duration,
    pub before: Option<ChainSnapshot>,
    pub after: Option<ChainSnapshot>,
}

impl MiningOutcome {
    pub fn blocks_produced(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// No block found inside the search budget. A normal outcome, not a failure.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn height_delta(&self) -> Option<i64> {
        let before = self.before?.height?;
        let after = self.after?.height?;
        Some(after as i64 - before as i64)
    }

    pub fn balance_delta(&self) -> Option<f64> {
        let before = self.before?.balance?;
        let after = self.after?.balance?;
        Some(after - before)
    }

    pub fn first_block_preview(&self) -> Option<&str> {
        self.blocks.first().map(|id| truncate_id(id))
    }
}

fn truncate_id(id: &str) -> &str {
    match id.char_indices().nth(BLOCK_ID_PREVIEW_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxBlocksReached,
    Cancelled,
}

/// Running counters of one `auto_mine` session.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub start: ChainSnapshot,
    pub attempts: u64,
    pub failed_attempts: u64,
    pub blocks_mined: u64,
    pub mining_time: Duration,
}

impl SessionStats {
    fn new(start: ChainSnapshot) -> Self {
        SessionStats {
            start,
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: &MiningOutcome) {
        self.blocks_mined += outcome.blocks_produced();
        self.mining_time += outcome.elapsed;
    }

    fn limit_reached(&self, max_blocks: Option<u64>) -> bool {
        max_blocks.is_some_and(|limit| self.blocks_mined >= limit)
    }
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub reason: StopReason,
    pub max_blocks: Option<u64>,
    pub stats: SessionStats,
    pub finish: ChainSnapshot,
    pub wall_time: Duration,
}

#[derive(Debug, Clone)]
pub struct NodeStatus {
    pub chain: String,
    pub height: u64,
    pub difficulty: f64,
    pub balance: f64,
    pub subversion: Option<String>,
    pub connections: Option<u64>,
}

/// Drives block generation on a remote daemon.
pub struct MiningController<R> {
    rpc: R,
    settings: ControllerSettings,
}

impl<R: DaemonRpc> MiningController<R> {
    pub fn new(rpc: R, settings: ControllerSettings) -> Self {
        MiningController { rpc, settings }
    }

    /// Startup probe. Callers treat a failure here as fatal.
    pub async fn check_connection(&self) -> Result<BlockchainInfo, RpcError> {
        self.rpc.get_blockchain_info().await
    }

    async fn snapshot(&self) -> ChainSnapshot {
        let height = match self.rpc.get_block_count().await {
            Ok(h) => Some(h),
            Err(e) => {
                warn!("Could not read block height: {}", e);
                None
            }
        };
        let balance = match self.rpc.get_balance().await {
            Ok(b) => Some(b),
            Err(e) => {
                warn!("Could not read wallet balance: {}", e);
                None
            }
        };
        ChainSnapshot { height, balance }
    }

    async fn log_mining_conditions(&self) {
        match self.rpc.get_mining_info().await {
            Ok(mi) => {
                info!("Current difficulty: {:.2}", mi.difficulty);
                if mi.networkhashps > 0.0 {
                    info!("Network hashrate: {:.0} H/s", mi.networkhashps);
                } else {
                    info!(
                        "Network hashrate: 0 H/s (chain has {} blocks, too few to estimate)",
                        mi.blocks
                    );
                }
            }
            Err(e) => debug!("getmininginfo unavailable: {}", e),
        }
    }

    /// One generation attempt of `count` blocks.
    ///
    /// With `stats_enabled` the height and balance are read before and after the
    /// attempt; those reads are informational and never fail the attempt. A
    /// failure of the generation call itself is returned unchanged.
    pub async fn mine_once(&self, count: u64, stats_enabled: bool) -> Result<MiningOutcome, RpcError> {
        let before = if stats_enabled {
            info!("Mining {} block(s)...", count);
            let snap = self.snapshot().await;
            if self.settings.dialect == GenerateDialect::CountWithMaxTries {
                self.log_mining_conditions().await;
            }
            Some(snap)
        } else {
            None
        };

        let started = Instant::now();
        let blocks = match self.rpc.generate(count, self.settings.search_budget()).await {
            Ok(blocks) => blocks,
            Err(e) => {
                if stats_enabled {
                    warn!("Mining failed after {:.2?}: {}", started.elapsed(), e);
                }
                return Err(e);
            }
        };
        let elapsed = started.elapsed();

        let after = if stats_enabled {
            Some(self.snapshot().await)
        } else {
            None
        };

        let outcome = MiningOutcome {
            requested: count,
            blocks,
            elapsed,
            before,
            after,
        };
        if stats_enabled {
            self.report_outcome(&outcome);
        }
        Ok(outcome)
    }

    fn report_outcome(&self, outcome: &MiningOutcome) {
        let secs = outcome.elapsed.as_secs_f64();
        if outcome.is_empty() {
            info!("Mined 0 block(s) in {:.2} seconds", secs);
            if let Some(h) = outcome.before.and_then(|s| s.height) {
                info!("Block height unchanged: {}", h);
            }
            // Bad luck and a too-small search budget look the same from here.
            info!("No valid block was found within the search budget; retry, wait longer or raise max_tries");
            return;
        }

        info!("Mined {} block(s) in {:.2} seconds", outcome.blocks_produced(), secs);
        if let (Some(b), Some(a)) = (
            outcome.before.and_then(|s| s.height),
            outcome.after.and_then(|s| s.height),
        ) {
            info!("Block height: {} -> {}", b, a);
        }
        if let (Some(b), Some(a)) = (
            outcome.before.and_then(|s| s.balance),
            outcome.after.and_then(|s| s.balance),
        ) {
            info!("Balance: {:.8} -> {:.8} (reward {:.8})", b, a, a - b);
        }
        if let Some(preview) = outcome.first_block_preview() {
            info!("First block: {}...", preview);
        }
    }

    /// Mines one block at a time until `max_blocks` is reached or `cancel` fires.
    ///
    /// Attempt failures are logged and the loop goes on. Both the in-flight RPC
    /// call and the pause between attempts are abandoned as soon as the token
    /// is cancelled.
    pub async fn auto_mine(
        &self,
        interval: Duration,
        max_blocks: Option<u64>,
        cancel: &CancellationToken,
    ) -> SessionSummary {
        let started = Instant::now();
        match max_blocks {
            Some(limit) => info!("Auto-mining up to {} block(s), interval {:?}", limit, interval),
            None => info!("Auto-mining until interrupted, interval {:?}", interval),
        }

        let start = tokio::select! {
            biased;
            _ = cancel.cancelled() => ChainSnapshot::default(),
            snap = self.snapshot() => snap,
        };
        let mut stats = SessionStats::new(start);

        let reason = loop {
            if stats.limit_reached(max_blocks) {
                info!("Reached maximum blocks ({})", stats.blocks_mined);
                break StopReason::MaxBlocksReached;
            }
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            stats.attempts += 1;
            let attempt = stats.attempts;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Attempt {} interrupted", attempt);
                    break StopReason::Cancelled;
                }
                res = self.mine_once(1, true) => res,
            };

            match result {
                Ok(outcome) => {
                    stats.record(&outcome);
                    if outcome.is_empty() {
                        info!(
                            "Progress: {} block(s) mined this session in {} attempt(s) (0 this time)",
                            stats.blocks_mined, stats.attempts
                        );
                    } else {
                        info!(
                            "Progress: {} block(s) mined this session in {} attempt(s)",
                            stats.blocks_mined, stats.attempts
                        );
                    }
                }
                Err(e) => {
                    stats.failed_attempts += 1;
                    match e.kind() {
                        RpcErrorKind::Timeout => {
                            warn!("Attempt {} timed out: {}. Continuing...", attempt, e)
                        }
                        RpcErrorKind::ConnectionFailure => {
                            warn!("Attempt {} could not reach the daemon: {}. Continuing...", attempt, e)
                        }
                        RpcErrorKind::Rpc => {
                            warn!("Attempt {} rejected by the daemon: {}. Continuing...", attempt, e)
                        }
                    }
                }
            }

            if stats.limit_reached(max_blocks) || interval.is_zero() {
                continue;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break StopReason::Cancelled,
                _ = tokio::time::sleep(interval) => {}
            }
        };

        if reason == StopReason::Cancelled {
            info!("Stop requested after {} attempt(s)", stats.attempts);
        }
        let finish = match tokio::time::timeout(FINAL_READ_TIMEOUT, self.snapshot()).await {
            Ok(snap) => snap,
            Err(_) => {
                warn!("Final chain read did not finish within {:?}; skipping it", FINAL_READ_TIMEOUT);
                ChainSnapshot::default()
            }
        };

        SessionSummary {
            reason,
            max_blocks,
            stats,
            finish,
            wall_time: started.elapsed(),
        }
    }

    /// All-or-nothing status read.
    pub async fn status(&self) -> Result<NodeStatus, RpcError> {
        let chain = self.rpc.get_blockchain_info().await?;
        let network = self.rpc.get_network_info().await?;
        let balance = self.rpc.get_balance().await?;
        Ok(NodeStatus {
            chain: chain.chain,
            height: chain.blocks,
            difficulty: chain.difficulty,
            balance,
            subversion: network.subversion,
            connections: network.connections,
        })
    }

    pub fn verifier(&self) -> Verifier<'_, R> {
        Verifier::new(&self.rpc, &self.settings)
    }

    pub async fn verify(&self) -> VerificationReport {
        self.verifier().run().await
    }
}
