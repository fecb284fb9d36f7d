//! Scenario files and their replay.
//!
//! A scenario is a JSON document listing pool operations in order. Amounts
//! are human-readable decimal strings (`"1000.5"` is 1000.5 tokens) and
//! depositors are labels, hashed into ids unless given as `0x` hex.
//!
//! ```json
//! {
//!   "collaterals": ["wETH"],
//!   "steps": [
//!     { "op": "mint", "depositor": "alice", "amount": "1000" },
//!     { "op": "provide", "depositor": "alice", "amount": "1000" },
//!     { "op": "offset", "debt": "500", "gains": { "wETH": "10" } }
//!   ]
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::core::collateral::CollateralId;
use crate::core::config::PoolConfig;
use crate::core::ledger::InMemoryLedger;
use crate::error::{Error, Result};
use crate::stability_pool::pool::{OffsetOutcome, PoolStatistics, StabilityPool};
use crate::stability_pool::rewards::{
    Clock, CommunityIssuance, IssuanceState, ManualClock, TickOutcome,
};
use crate::storage::backend::StorageBackend;
use crate::storage::state::PoolStateStore;
use crate::utils::crypto::DepositorId;
use crate::utils::math::{safe_add, Decimal18};

// ═══════════════════════════════════════════════════════════════════════════════
// SCENARIO MODEL
// ═══════════════════════════════════════════════════════════════════════════════

/// Token amount written as a decimal string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Units(pub Decimal18);

impl Serialize for Units {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Units {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Decimal18::parse_units(&s)
            .map(Units)
            .map_err(serde::de::Error::custom)
    }
}

/// Reward issuance set up before the first step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceSetup {
    /// Supply cap
    pub funds: Units,
    /// Amount emitted per week
    pub weekly: Units,
}

/// One pool operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Step {
    /// Credit debt tokens to a depositor
    Mint {
        /// Depositor label
        depositor: String,
        /// Tokens to credit
        amount: Units,
    },
    /// Deposit into the pool
    Provide {
        /// Depositor label
        depositor: String,
        /// Tokens to deposit
        amount: Units,
    },
    /// Withdraw from the pool
    Withdraw {
        /// Depositor label
        depositor: String,
        /// Requested amount, capped at the deposit
        amount: Units,
    },
    /// Pay out pending gains
    Claim {
        /// Depositor label
        depositor: String,
    },
    /// Absorb a liquidation
    Offset {
        /// Debt cancelled
        debt: Units,
        /// Seized collateral by type
        #[serde(default)]
        gains: BTreeMap<String, Units>,
    },
    /// Push an emission into G
    Tick {
        /// Amount emitted
        amount: Units,
    },
    /// Move the issuance clock forward
    AdvanceTime {
        /// Seconds to advance
        seconds: u64,
    },
}

impl Step {
    /// Operation name as written in scenario files
    pub fn name(&self) -> &'static str {
        match self {
            Step::Mint { .. } => "mint",
            Step::Provide { .. } => "provide",
            Step::Withdraw { .. } => "withdraw",
            Step::Claim { .. } => "claim",
            Step::Offset { .. } => "offset",
            Step::Tick { .. } => "tick",
            Step::AdvanceTime { .. } => "advance-time",
        }
    }
}

/// A replayable list of steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Free-form name
    #[serde(default)]
    pub name: Option<String>,
    /// Collateral types registered in addition to the configured ones
    #[serde(default)]
    pub collaterals: Vec<String>,
    /// Optional reward issuance
    #[serde(default)]
    pub issuance: Option<IssuanceSetup>,
    /// Steps, in order
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Parse from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// Resolve a depositor label into an id
pub fn resolve_depositor(label: &str) -> Result<DepositorId> {
    if label.starts_with("0x") {
        DepositorId::from_hex(label)
    } else {
        Ok(DepositorId::from_label(label))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPORTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of one replayed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// Position in the scenario
    pub index: usize,
    /// Operation name
    pub op: String,
    /// Short description of what happened
    pub detail: String,
    /// Error message, if the step was rejected
    pub error: Option<String>,
    /// Numeric error code, if the step was rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
}

impl StepReport {
    /// Whether the step succeeded
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// One depositor's position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositorView {
    /// Label used in the scenario, or the hex id
    pub label: String,
    /// Depositor id
    pub id: DepositorId,
    /// Compounded deposit
    pub deposit: Decimal18,
    /// Pending collateral gains
    pub gains: BTreeMap<CollateralId, Decimal18>,
    /// Pending reward
    pub reward: Decimal18,
    /// Rewards already paid
    pub rewards_paid: Decimal18,
}

/// Pool state after a replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationSummary {
    /// Pool statistics
    pub statistics: PoolStatistics,
    /// Every depositor with a record
    pub depositors: Vec<DepositorView>,
    /// Accumulator fingerprint
    pub state_hash: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIMULATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Pool type driven by the simulator
pub type SimPool = StabilityPool<InMemoryLedger, CommunityIssuance<ManualClock>>;

const LEDGER_KEY: &str = "ledger";
const ISSUANCE_KEY: &str = "issuance";
const CLOCK_KEY: &str = "clock";
const LABELS_KEY: &str = "labels";

/// A pool with an in-memory ledger and a manual clock
#[derive(Debug)]
pub struct Simulation {
    pool: SimPool,
    clock: ManualClock,
    labels: BTreeMap<DepositorId, String>,
}

impl Simulation {
    /// Start time of a fresh simulation clock
    pub const GENESIS_TIME: u64 = 1_700_000_000;

    /// Fresh pool for `config`
    pub fn new(config: &PoolConfig) -> Result<Self> {
        config.validate()?;
        let clock = ManualClock::new(Self::GENESIS_TIME);
        let issuance = CommunityIssuance::with_clock(clock.clone());
        let mut pool = StabilityPool::new(config.params.clone(), InMemoryLedger::new(), issuance)?;
        for id in &config.collaterals {
            pool.register_collateral(CollateralId::new(id.as_str())?)?;
        }
        Ok(Self {
            pool,
            clock,
            labels: BTreeMap::new(),
        })
    }

    /// Resume a simulation saved with `save`
    pub fn load<B: StorageBackend>(store: &PoolStateStore<B>) -> Result<Option<Self>> {
        let state = match store.load()? {
            Some(state) => state,
            None => return Ok(None),
        };
        let ledger: InMemoryLedger = store.load_aux(LEDGER_KEY)?.unwrap_or_default();
        let issuance: IssuanceState = store.load_aux(ISSUANCE_KEY)?.unwrap_or_default();
        let now: u64 = store.load_aux(CLOCK_KEY)?.unwrap_or(Self::GENESIS_TIME);
        let labels = store.load_aux(LABELS_KEY)?.unwrap_or_default();

        let clock = ManualClock::new(now);
        let rewards = CommunityIssuance::from_state(issuance, clock.clone());
        Ok(Some(Self {
            pool: StabilityPool::from_state(state, ledger, rewards)?,
            clock,
            labels,
        }))
    }

    /// Persist pool state and collaborators
    pub fn save<B: StorageBackend>(&self, store: &PoolStateStore<B>) -> Result<()> {
        store.save(self.pool.state())?;
        store.save_aux(LEDGER_KEY, self.pool.ledger())?;
        store.save_aux(ISSUANCE_KEY, self.pool.rewards().state())?;
        store.save_aux(CLOCK_KEY, &self.clock.now())?;
        store.save_aux(LABELS_KEY, &self.labels)
    }

    /// Underlying pool
    pub fn pool(&self) -> &SimPool {
        &self.pool
    }

    /// Register scenario collaterals and issuance; already-known collaterals are kept
    pub fn prepare(&mut self, scenario: &Scenario) -> Result<()> {
        for id in &scenario.collaterals {
            let id = CollateralId::new(id.as_str())?;
            if !self.pool.collaterals().contains(&id) {
                self.pool.register_collateral(id)?;
            }
        }
        if let Some(setup) = &scenario.issuance {
            let issuance = self.pool.rewards_mut();
            issuance.add_funds(setup.funds.0)?;
            issuance.set_weekly_distribution(setup.weekly.0);
        }
        Ok(())
    }

    /// Replay every step, calling `on_step` after each.
    ///
    /// Rejected operations are reported and the replay continues; a fatal
    /// accounting error stops it.
    pub fn run<F>(&mut self, scenario: &Scenario, mut on_step: F) -> Result<Vec<StepReport>>
    where
        F: FnMut(&StepReport),
    {
        self.prepare(scenario)?;

        let mut reports = Vec::with_capacity(scenario.steps.len());
        for (index, step) in scenario.steps.iter().enumerate() {
            let report = match self.apply(step) {
                Ok(detail) => StepReport {
                    index,
                    op: step.name().to_string(),
                    detail,
                    error: None,
                    code: None,
                },
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(index, op = step.name(), error = %err, "step rejected");
                    StepReport {
                        index,
                        op: step.name().to_string(),
                        detail: String::new(),
                        error: Some(err.to_string()),
                        code: Some(err.code()),
                    }
                }
            };
            on_step(&report);
            reports.push(report);
        }
        Ok(reports)
    }

    /// Apply a single step
    pub fn apply(&mut self, step: &Step) -> Result<String> {
        debug!(op = step.name(), "applying step");
        match step {
            Step::Mint { depositor, amount } => {
                let id = self.depositor(depositor)?;
                self.pool.ledger_mut().mint(&id, amount.0)?;
                Ok(format!("{} minted {}", depositor, amount.0))
            }
            Step::Provide { depositor, amount } => {
                let id = self.depositor(depositor)?;
                let receipt = self.pool.provide(&id, amount.0)?;
                Ok(format!("{} deposit now {}", depositor, receipt.new_deposit))
            }
            Step::Withdraw { depositor, amount } => {
                let id = self.depositor(depositor)?;
                let receipt = self.pool.withdraw(&id, amount.0)?;
                Ok(format!(
                    "{} withdrew {}, deposit now {}",
                    depositor, receipt.withdrawn, receipt.new_deposit
                ))
            }
            Step::Claim { depositor } => {
                let id = self.depositor(depositor)?;
                let receipt = self.pool.claim_gains(&id)?;
                let collateral: Decimal18 = receipt
                    .collateral_paid
                    .values()
                    .try_fold(Decimal18::ZERO, |acc, v| safe_add(acc, *v))?;
                Ok(format!(
                    "{} claimed {} collateral, {} reward",
                    depositor, collateral, receipt.reward_paid
                ))
            }
            Step::Offset { debt, gains } => {
                let gains = gains
                    .iter()
                    .map(|(id, amount)| Ok((CollateralId::new(id.as_str())?, amount.0)))
                    .collect::<Result<Vec<_>>>()?;
                match self.pool.offset(debt.0, &gains)? {
                    OffsetOutcome::Skipped => Ok(format!("offset of {} skipped", debt.0)),
                    OffsetOutcome::Absorbed(report) => Ok(format!(
                        "absorbed {}, P = {}, epoch {}, scale {}",
                        report.debt, report.p, report.epoch, report.scale
                    )),
                }
            }
            Step::Tick { amount } => match self.pool.tick(amount.0)? {
                TickOutcome::Idle => Ok("nothing emitted".to_string()),
                TickOutcome::Distributed { emitted, .. } => Ok(format!("distributed {}", emitted)),
                TickOutcome::Discarded { emitted } => Ok(format!("discarded {}", emitted)),
            },
            Step::AdvanceTime { seconds } => {
                self.clock.advance(*seconds);
                Ok(format!("clock advanced {}s", seconds))
            }
        }
    }

    fn depositor(&mut self, label: &str) -> Result<DepositorId> {
        let id = resolve_depositor(label)?;
        self.labels.entry(id).or_insert_with(|| label.to_string());
        Ok(id)
    }

    /// Current pool state, per depositor
    pub fn summary(&self) -> Result<SimulationSummary> {
        let mut depositors = Vec::new();
        for id in self.pool.depositors() {
            depositors.push(DepositorView {
                label: self.labels.get(id).cloned().unwrap_or_else(|| id.to_string()),
                id: *id,
                deposit: self.pool.get_compounded_deposit(id)?,
                gains: self.pool.get_depositor_gains(id)?,
                reward: self.pool.get_depositor_reward_gain(id)?,
                rewards_paid: self.pool.rewards().balance_of(id),
            });
        }
        Ok(SimulationSummary {
            statistics: self.pool.statistics(),
            depositors,
            state_hash: self.pool.state_hash()?.to_hex(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backend::InMemoryStore;

    const SCENARIO: &str = r#"{
        "name": "half offset",
        "collaterals": ["wETH"],
        "steps": [
            { "op": "mint", "depositor": "alice", "amount": "1000" },
            { "op": "provide", "depositor": "alice", "amount": "1000" },
            { "op": "offset", "debt": "500", "gains": { "wETH": "10" } },
            { "op": "withdraw", "depositor": "bob", "amount": "1" },
            { "op": "tick", "amount": "5" },
            { "op": "advance-time", "seconds": 60 }
        ]
    }"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::from_json(SCENARIO).unwrap();
        assert_eq!(scenario.steps.len(), 6);
        assert_eq!(scenario.steps[5], Step::AdvanceTime { seconds: 60 });
        assert!(Scenario::from_json(r#"{"steps": [{"op": "explode"}]}"#).is_err());
    }

    #[test]
    fn test_run_scenario() {
        let scenario = Scenario::from_json(SCENARIO).unwrap();
        let mut sim = Simulation::new(&PoolConfig::default()).unwrap();

        let mut seen = 0;
        let reports = sim.run(&scenario, |_| seen += 1).unwrap();
        assert_eq!(seen, 6);
        // bob never deposited
        assert!(!reports[3].is_ok());
        assert_eq!(reports[3].code, Some(1002));
        assert!(reports.iter().enumerate().all(|(i, r)| i == 3 || r.is_ok()));

        let summary = sim.summary().unwrap();
        let alice = &summary.depositors[0];
        assert_eq!(alice.label, "alice");
        assert_eq!(alice.deposit, Decimal18::from_integer(500));
        assert_eq!(alice.gains[&CollateralId::new("wETH").unwrap()], Decimal18::from_integer(10));
        assert_eq!(alice.reward, Decimal18::from_integer(5));
    }

    #[test]
    fn test_issuance_scenario() {
        let scenario = Scenario::from_json(
            r#"{
                "issuance": { "funds": "1000000", "weekly": "604800" },
                "steps": [
                    { "op": "mint", "depositor": "alice", "amount": "10" },
                    { "op": "provide", "depositor": "alice", "amount": "10" },
                    { "op": "advance-time", "seconds": 30 },
                    { "op": "claim", "depositor": "alice" }
                ]
            }"#,
        )
        .unwrap();
        let mut sim = Simulation::new(&PoolConfig::default()).unwrap();
        sim.run(&scenario, |_| {}).unwrap();

        let summary = sim.summary().unwrap();
        assert_eq!(summary.depositors[0].rewards_paid, Decimal18::from_integer(30));
    }

    #[test]
    fn test_save_and_resume() {
        let scenario = Scenario::from_json(SCENARIO).unwrap();
        let mut sim = Simulation::new(&PoolConfig::default()).unwrap();
        sim.run(&scenario, |_| {}).unwrap();

        let store = PoolStateStore::new(InMemoryStore::new());
        sim.save(&store).unwrap();

        let resumed = Simulation::load(&store).unwrap().unwrap();
        assert_eq!(resumed.summary().unwrap(), sim.summary().unwrap());
    }

    #[test]
    fn test_resolve_depositor() {
        let id = DepositorId::from_label("alice");
        assert_eq!(resolve_depositor("alice").unwrap(), id);
        assert_eq!(resolve_depositor(&id.to_string()).unwrap(), id);
        assert!(resolve_depositor("0xzz").is_err());
    }
}
