//! Read-only preflight checks run before committing to a mining session.

use fleet_rpc_connector::{CallClass, DaemonRpc, RpcRequest, METHOD_GENERATE};
use serde_json::Value;
use tracing::debug;

use crate::controller::{ControllerSettings, GenerateDialect};

pub const CHECK_BLOCKCHAIN: &str = "blockchain";
pub const CHECK_WALLET: &str = "wallet";
pub const CHECK_MINING_INFO: &str = "mining-info";
pub const CHECK_GENERATE: &str = "generate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Passed,
    /// Worth pointing out, does not fail the report.
    Warning,
    Failed,
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

impl CheckResult {
    fn passed(name: &'static str, detail: impl Into<String>) -> Self {
        CheckResult { name, status: CheckStatus::Passed, detail: detail.into() }
    }

    fn warning(name: &'static str, detail: impl Into<String>) -> Self {
        CheckResult { name, status: CheckStatus::Warning, detail: detail.into() }
    }

    fn failed(name: &'static str, detail: impl Into<String>) -> Self {
        CheckResult { name, status: CheckStatus::Failed, detail: detail.into() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    pub checks: Vec<CheckResult>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.status != CheckStatus::Failed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| c.status == CheckStatus::Failed)
    }

    pub fn get(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }
}

pub struct Verifier<'a, R> {
    rpc: &'a R,
    settings: &'a ControllerSettings,
}

impl<'a, R: DaemonRpc> Verifier<'a, R> {
    pub fn new(rpc: &'a R, settings: &'a ControllerSettings) -> Self {
        Verifier { rpc, settings }
    }

    /// Runs every check in order. A failing check never prevents the next one.
    pub async fn run(&self) -> VerificationReport {
        let checks = vec![
            self.check_blockchain().await,
            self.check_wallet().await,
            self.check_mining_info().await,
            self.check_generate().await,
        ];
        for c in &checks {
            debug!("Preflight {}: {:?} ({})", c.name, c.status, c.detail);
        }
        VerificationReport { checks }
    }

    async fn check_blockchain(&self) -> CheckResult {
        match self.rpc.get_blockchain_info().await {
            Ok(info) => CheckResult::passed(
                CHECK_BLOCKCHAIN,
                format!("connected to network '{}', height {}", info.chain, info.blocks),
            ),
            Err(e) => CheckResult::failed(CHECK_BLOCKCHAIN, format!("blockchain connection failed: {e}")),
        }
    }

    async fn check_wallet(&self) -> CheckResult {
        match self.rpc.get_balance().await {
            Ok(balance) => CheckResult::passed(CHECK_WALLET, format!("wallet accessible, balance {balance:.8}")),
            Err(e) => CheckResult::failed(CHECK_WALLET, format!("wallet access failed: {e}")),
        }
    }

    async fn check_mining_info(&self) -> CheckResult {
        match self.rpc.get_mining_info().await {
            Ok(mi) => {
                let detail = format!(
                    "difficulty {:.2}, network hashrate {:.0} H/s",
                    mi.difficulty, mi.networkhashps
                );
                if mi.difficulty > self.settings.high_difficulty_threshold {
                    CheckResult::warning(CHECK_MINING_INFO, format!("{detail}; high difficulty, mining will be slow"))
                } else {
                    CheckResult::passed(CHECK_MINING_INFO, detail)
                }
            }
            Err(e) => CheckResult::failed(CHECK_MINING_INFO, format!("mining info unavailable: {e}")),
        }
    }

    /// Zero-block generation with the smallest possible budget; must come back as `[]`.
    async fn check_generate(&self) -> CheckResult {
        let mut request = RpcRequest::new(METHOD_GENERATE).param(0);
        if self.settings.dialect == GenerateDialect::CountWithMaxTries {
            request = request.param(1);
        }
        match self.rpc.call(request, CallClass::Generation).await {
            Ok(Value::Array(items)) if items.is_empty() => {
                CheckResult::passed(CHECK_GENERATE, "generate RPC call works")
            }
            Ok(Value::Array(items)) => CheckResult::failed(
                CHECK_GENERATE,
                format!("generate returned {} item(s) for a zero-block request", items.len()),
            ),
            Ok(other) => CheckResult::failed(
                CHECK_GENERATE,
                format!("generate returned unexpected format: {}", json_type(&other)),
            ),
            Err(e) => CheckResult::failed(CHECK_GENERATE, format!("generate RPC test failed: {e}")),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
