//! Human-readable rendering of controller results for the CLI.

use std::fmt;

use crate::controller::{MiningOutcome, NodeStatus, SessionSummary, StopReason};
use crate::verifier::{CheckStatus, VerificationReport};

pub const COIN_TICKER: &str = "FC";

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckStatus::Passed => "[ OK ]",
            CheckStatus::Warning => "[WARN]",
            CheckStatus::Failed => "[FAIL]",
        })
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mining setup verification")?;
        for check in &self.checks {
            writeln!(f, "  {} {:<12} {}", check.status, check.name, check.detail)?;
        }
        let failed = self.failures().count();
        if failed == 0 {
            write!(f, "All checks passed. Mining should work.")
        } else {
            write!(f, "Found {} issue(s).", failed)
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mining status")?;
        writeln!(f, "  Block height: {}", self.height)?;
        writeln!(f, "  Difficulty:   {:.2}", self.difficulty)?;
        writeln!(f, "  Balance:      {:.8} {}", self.balance, COIN_TICKER)?;
        write!(f, "  Network:      {}", self.chain)?;
        if let Some(sub) = &self.subversion {
            write!(f, "\n  Node:         {}", sub)?;
        }
        if let Some(peers) = self.connections {
            write!(f, "\n  Peers:        {}", peers)?;
        }
        Ok(())
    }
}

impl fmt::Display for MiningOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Mined {} of {} block(s) in {:.2}s",
            self.blocks_produced(),
            self.requested,
            self.elapsed.as_secs_f64()
        )?;
        if let Some(preview) = self.first_block_preview() {
            write!(f, ", first block {}...", preview)?;
        }
        if let Some(delta) = self.balance_delta() {
            write!(f, ", balance {:+.8} {}", delta, COIN_TICKER)?;
        }
        Ok(())
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::MaxBlocksReached => "maximum blocks reached",
            StopReason::Cancelled => "stopped by user",
        })
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        writeln!(f, "Auto-mining finished: {}", self.reason)?;
        writeln!(
            f,
            "  Attempts:     {} ({} failed)",
            s.attempts, s.failed_attempts
        )?;
        match self.max_blocks {
            Some(limit) => writeln!(f, "  Blocks mined: {} of {}", s.blocks_mined, limit)?,
            None => writeln!(f, "  Blocks mined: {}", s.blocks_mined)?,
        }
        writeln!(
            f,
            "  Mining time:  {:.1}s of {:.1}s",
            s.mining_time.as_secs_f64(),
            self.wall_time.as_secs_f64()
        )?;
        match self.finish.height {
            Some(h) => writeln!(f, "  Block height: {}", h)?,
            None => writeln!(f, "  Block height: unavailable")?,
        }
        match self.finish.balance {
            Some(b) => write!(f, "  Balance:      {:.8} {}", b, COIN_TICKER)?,
            None => write!(f, "  Balance:      unavailable")?,
        }
        if self.reason == StopReason::Cancelled {
            write!(f, "\n  Note: coinbase rewards need 30 confirmations to mature")?;
        }
        Ok(())
    }
}
