//! Scripted in-memory chain, signer and builder for engine tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dotexec_chain::{
    AccountData, BackoffConfig, BuildError, CallBuilder, CallRequest, ChainConnection, ChainError,
    ChainEvent, ChainFut, ChainProperties, ConnectionPool, DispatchOutcome, ForkHandle,
    PreparedCall, RuntimeSurface, SignFut, SignedPayload, Signer, SignerRejection, TxStatus,
    TxSubscription,
};
use dotexec_types::{
    AccountId, AssetRef, BlockHash, ChainClass, GenesisHash, RuntimeVersion, TransferIntent,
    TransferVariant, TxHash,
};
use serde_json::json;

use crate::context::EngineContext;

pub const STARTING_BALANCE: u128 = 100_000_000_000;

#[derive(Debug, Default)]
pub struct MockCounters {
    pub surface_reads: AtomicUsize,
    pub forks_opened: AtomicUsize,
    pub forks_released: AtomicUsize,
    pub dry_runs: AtomicUsize,
    pub fee_queries: AtomicUsize,
    pub submissions: AtomicUsize,
    pub unsubscribes: AtomicUsize,
}

struct MockState {
    ready: bool,
    spec_version: u32,
    fee: Result<u128, ChainError>,
    fee_delay: Option<Duration>,
    spend: u128,
    fork_failure: Option<ChainError>,
    dry_runs: VecDeque<Result<DispatchOutcome, ChainError>>,
    stall_dry_run: bool,
    submit_errors: VecDeque<ChainError>,
    scripts: VecDeque<Vec<TxStatus>>,
}

/// A chain whose every answer is scripted.
///
/// Unscripted dry runs succeed with a balances transfer event, and unscripted
/// submissions go `ready -> in_block -> finalized`. A status script that runs
/// out leaves the subscription pending forever.
#[derive(Clone)]
pub struct MockChain {
    class: ChainClass,
    genesis: GenesisHash,
    surface: RuntimeSurface,
    state: Arc<Mutex<MockState>>,
    counters: Arc<MockCounters>,
}

impl MockChain {
    pub fn asset_hub() -> Self {
        Self::new(ChainClass::AssetHub, GenesisHash::new("0x68d56f15"), asset_hub_surface())
    }

    pub fn relay() -> Self {
        Self::new(ChainClass::Relay, GenesisHash::new("0x91b171bb"), relay_surface())
    }

    pub fn new(class: ChainClass, genesis: GenesisHash, surface: RuntimeSurface) -> Self {
        let spec_version = surface.runtime.as_ref().map_or(1, |r| r.spec_version);
        Self {
            class,
            genesis,
            surface,
            state: Arc::new(Mutex::new(MockState {
                ready: true,
                spec_version,
                fee: Ok(15_000_000),
                fee_delay: None,
                spend: 1_000_000_000,
                fork_failure: None,
                dry_runs: VecDeque::new(),
                stall_dry_run: false,
                submit_errors: VecDeque::new(),
                scripts: VecDeque::new(),
            })),
            counters: Arc::new(MockCounters::default()),
        }
    }

    pub fn counters(&self) -> &MockCounters {
        &self.counters
    }

    pub fn set_ready(&self, ready: bool) {
        self.lock().ready = ready;
    }

    pub fn upgrade_runtime(&self, spec_version: u32) {
        self.lock().spec_version = spec_version;
    }

    pub fn set_fee(&self, fee: Result<u128, ChainError>) {
        self.lock().fee = fee;
    }

    pub fn set_fee_delay(&self, delay: Duration) {
        self.lock().fee_delay = Some(delay);
    }

    /// Amount the sender's balance drops by after a successful dry run.
    pub fn set_spend(&self, spend: u128) {
        self.lock().spend = spend;
    }

    pub fn push_dry_run(&self, outcome: Result<DispatchOutcome, ChainError>) {
        self.lock().dry_runs.push_back(outcome);
    }

    /// Every following dry run never completes.
    pub fn stall_dry_run(&self) {
        self.lock().stall_dry_run = true;
    }

    pub fn fail_next_fork(&self, err: ChainError) {
        self.lock().fork_failure = Some(err);
    }

    pub fn fail_next_submit(&self, err: ChainError) {
        self.lock().submit_errors.push_back(err);
    }

    /// Statuses for the next submission, in order.
    pub fn push_script(&self, statuses: Vec<TxStatus>) {
        self.lock().scripts.push_back(statuses);
    }

    fn runtime(&self, spec_version: u32) -> RuntimeVersion {
        RuntimeVersion {
            spec_name: self
                .surface
                .runtime
                .as_ref()
                .map_or_else(|| "mock".to_string(), |r| r.spec_name.clone()),
            spec_version,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChainConnection for MockChain {
    fn chain_class(&self) -> ChainClass {
        self.class
    }

    fn genesis_hash(&self) -> &GenesisHash {
        &self.genesis
    }

    fn is_ready(&self) -> bool {
        self.lock().ready
    }

    fn runtime_version(&self) -> ChainFut<'_, RuntimeVersion> {
        let version = self.runtime(self.lock().spec_version);
        Box::pin(async move { Ok(version) })
    }

    fn runtime_surface(&self) -> ChainFut<'_, RuntimeSurface> {
        self.counters.surface_reads.fetch_add(1, Ordering::SeqCst);
        let mut surface = self.surface.clone();
        surface.runtime = Some(self.runtime(self.lock().spec_version));
        Box::pin(async move { Ok(surface) })
    }

    fn fork_at_best(&self) -> ChainFut<'_, Box<dyn ForkHandle>> {
        if let Some(err) = self.lock().fork_failure.take() {
            return Box::pin(async move { Err(err) });
        }
        self.counters.forks_opened.fetch_add(1, Ordering::SeqCst);
        let fork: Box<dyn ForkHandle> = Box::new(MockFork {
            block_hash: BlockHash::new(format!("0x{}-best", self.class)),
            state: Arc::clone(&self.state),
            counters: Arc::clone(&self.counters),
            spent: 0,
        });
        Box::pin(async move { Ok(fork) })
    }

    fn estimate_fee<'a>(
        &'a self,
        _call: &'a PreparedCall,
        _sender: &'a AccountId,
    ) -> ChainFut<'a, u128> {
        self.counters.fee_queries.fetch_add(1, Ordering::SeqCst);
        let (fee, delay) = {
            let state = self.lock();
            (state.fee.clone(), state.fee_delay)
        };
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            fee
        })
    }

    fn submit_and_watch(&self, _signed: SignedPayload) -> ChainFut<'_, Box<dyn TxSubscription>> {
        let n = self.counters.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        let (error, script) = {
            let mut state = self.lock();
            match state.submit_errors.pop_front() {
                Some(err) => (Some(err), None),
                None => (None, state.scripts.pop_front()),
            }
        };
        if let Some(err) = error {
            return Box::pin(async move { Err(err) });
        }
        let statuses = script.unwrap_or_else(|| finalized_script(self.class, n));
        let subscription: Box<dyn TxSubscription> = Box::new(MockSubscription {
            tx_hash: TxHash::new(format!("0x{}-tx{n}", self.class)),
            statuses: statuses.into(),
            counters: Arc::clone(&self.counters),
        });
        Box::pin(async move { Ok(subscription) })
    }
}

fn finalized_script(class: ChainClass, n: usize) -> Vec<TxStatus> {
    let block_hash = BlockHash::new(format!("0x{class}-block{n}"));
    vec![
        TxStatus::Ready,
        TxStatus::Broadcast,
        TxStatus::InBlock {
            block_hash: block_hash.clone(),
            outcome: transfer_success(),
        },
        TxStatus::Finalized { block_hash },
    ]
}

pub fn transfer_success() -> DispatchOutcome {
    DispatchOutcome::Success {
        events: vec![ChainEvent::new("balances", "Transfer")],
    }
}

struct MockFork {
    block_hash: BlockHash,
    state: Arc<Mutex<MockState>>,
    counters: Arc<MockCounters>,
    spent: u128,
}

impl ForkHandle for MockFork {
    fn block_hash(&self) -> &BlockHash {
        &self.block_hash
    }

    fn account<'a>(&'a self, _who: &'a AccountId) -> ChainFut<'a, AccountData> {
        let data = AccountData {
            free: STARTING_BALANCE.saturating_sub(self.spent),
            reserved: 0,
            frozen: 0,
        };
        Box::pin(async move { Ok(data) })
    }

    fn dry_run<'a>(
        &'a mut self,
        _call: &'a PreparedCall,
        _sender: &'a AccountId,
    ) -> ChainFut<'a, DispatchOutcome> {
        self.counters.dry_runs.fetch_add(1, Ordering::SeqCst);
        let (stalled, scripted, spend) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            (state.stall_dry_run, state.dry_runs.pop_front(), state.spend)
        };
        if stalled {
            return Box::pin(future::pending());
        }
        let outcome = scripted.unwrap_or_else(|| Ok(transfer_success()));
        if matches!(outcome, Ok(ref o) if o.is_success()) {
            self.spent = spend;
        }
        Box::pin(async move { outcome })
    }

    fn release(self: Box<Self>) -> ChainFut<'static, ()> {
        let counters = Arc::clone(&self.counters);
        Box::pin(async move {
            counters.forks_released.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

struct MockSubscription {
    tx_hash: TxHash,
    statuses: VecDeque<TxStatus>,
    counters: Arc<MockCounters>,
}

impl TxSubscription for MockSubscription {
    fn tx_hash(&self) -> &TxHash {
        &self.tx_hash
    }

    fn next_status(&mut self) -> ChainFut<'_, Option<TxStatus>> {
        match self.statuses.pop_front() {
            Some(status) => Box::pin(async move { Ok(Some(status)) }),
            None => Box::pin(future::pending()),
        }
    }

    fn unsubscribe(self: Box<Self>) -> ChainFut<'static, ()> {
        let counters = Arc::clone(&self.counters);
        Box::pin(async move {
            counters.unsubscribes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

// ============================================================================
// Surfaces
// ============================================================================

fn pallets(entries: &[(&str, &[&str])]) -> BTreeMap<String, BTreeSet<String>> {
    entries
        .iter()
        .map(|(pallet, calls)| {
            (
                (*pallet).to_string(),
                calls.iter().map(|c| (*c).to_string()).collect(),
            )
        })
        .collect()
}

pub fn asset_hub_surface() -> RuntimeSurface {
    RuntimeSurface {
        chain_name: "Polkadot Asset Hub".into(),
        runtime: Some(RuntimeVersion {
            spec_name: "statemint".into(),
            spec_version: 1_003_000,
        }),
        pallets: pallets(&[
            (
                "Balances",
                &["transfer_allow_death", "transfer_keep_alive", "transfer_all"],
            ),
            ("Utility", &["batch", "batch_all", "force_batch"]),
            ("Assets", &["transfer", "transfer_keep_alive"]),
            ("ForeignAssets", &["transfer", "transfer_keep_alive"]),
            ("PoolAssets", &["transfer"]),
        ]),
        constants: [("Balances.ExistentialDeposit".to_string(), 100_000_000)].into(),
        properties: ChainProperties {
            token_symbol: Some("DOT".into()),
            token_decimals: Some(10),
            ss58_format: Some(0),
        },
    }
}

pub fn relay_surface() -> RuntimeSurface {
    RuntimeSurface {
        chain_name: "Polkadot".into(),
        runtime: Some(RuntimeVersion {
            spec_name: "polkadot".into(),
            spec_version: 1_003_000,
        }),
        pallets: pallets(&[
            (
                "Balances",
                &["transfer_allow_death", "transfer_keep_alive", "transfer_all"],
            ),
            ("Utility", &["batch", "batch_all", "force_batch"]),
            ("Paras", &[]),
            ("XcmPallet", &["limited_teleport_assets"]),
        ]),
        constants: [("Balances.ExistentialDeposit".to_string(), 10_000_000_000)].into(),
        properties: ChainProperties {
            token_symbol: Some("DOT".into()),
            token_decimals: Some(10),
            ss58_format: Some(0),
        },
    }
}

pub fn native_call() -> PreparedCall {
    PreparedCall {
        chain: ChainClass::AssetHub,
        pallet: "Balances".into(),
        call: "transfer_keep_alive".into(),
        args: json!({ "dest": "5Bob", "value": 1_000_000_000u64 }),
        variant: Some(TransferVariant::KeepAlive),
        encoded: vec![0x0a, 0x03],
    }
}

pub fn native_intent(chain: ChainClass) -> TransferIntent {
    TransferIntent {
        sender: AccountId::new("5Alice"),
        recipient: AccountId::new("5Bob"),
        amount: 1_000_000_000,
        asset: AssetRef::Native,
        keep_alive: false,
        chain,
    }
}

// ============================================================================
// Signer and builder
// ============================================================================

#[derive(Debug, Clone)]
enum SignerMode {
    Approve,
    Reject(String),
    Stall,
}

#[derive(Debug)]
pub struct MockSigner {
    mode: SignerMode,
    requests: AtomicUsize,
}

impl MockSigner {
    pub fn approving() -> Self {
        Self::with_mode(SignerMode::Approve)
    }

    pub fn rejecting(reason: &str) -> Self {
        Self::with_mode(SignerMode::Reject(reason.to_string()))
    }

    /// The prompt never gets an answer.
    pub fn stalled() -> Self {
        Self::with_mode(SignerMode::Stall)
    }

    fn with_mode(mode: SignerMode) -> Self {
        Self {
            mode,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Signer for MockSigner {
    fn sign<'a>(&'a self, call: &'a PreparedCall, signer: &'a AccountId) -> SignFut<'a> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            SignerMode::Approve => Box::pin(async move {
                Ok(SignedPayload {
                    call: call.clone(),
                    signer: signer.clone(),
                    extrinsic: call.encoded.clone(),
                })
            }),
            SignerMode::Reject(reason) => {
                let rejection = SignerRejection::new(reason.clone());
                Box::pin(async move { Err(rejection) })
            }
            SignerMode::Stall => Box::pin(future::pending()),
        }
    }
}

/// Builds balances or assets transfers and remembers every call it built.
#[derive(Debug, Default)]
pub struct MockBuilder {
    built: Mutex<Vec<PreparedCall>>,
}

impl MockBuilder {
    pub fn built(&self) -> Vec<PreparedCall> {
        self.built
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CallBuilder for MockBuilder {
    fn build(&self, request: CallRequest<'_>) -> Result<PreparedCall, BuildError> {
        let intent = request.intent;
        if intent.recipient.as_str().is_empty() {
            return Err(BuildError::InvalidRecipient(String::new()));
        }
        let (pallet, call, variant) = match &intent.asset {
            AssetRef::Native => (
                "Balances",
                request.variant.call_name(),
                Some(request.variant),
            ),
            AssetRef::Local { .. } => ("Assets", "transfer", None),
            AssetRef::Foreign { .. } => ("ForeignAssets", "transfer", None),
        };
        let prepared = PreparedCall {
            chain: request.capabilities.class,
            pallet: pallet.to_string(),
            call: call.to_string(),
            args: json!({
                "dest": intent.recipient.as_str(),
                "value": intent.amount.to_string(),
                "overrides": request.overrides,
            }),
            variant,
            encoded: intent.amount.to_le_bytes().to_vec(),
        };
        self.built
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prepared.clone());
        Ok(prepared)
    }
}

/// Context over the given chains with zero backoff.
pub fn build_context(
    chains: &[&MockChain],
    signer: Arc<MockSigner>,
    builder: Arc<MockBuilder>,
) -> EngineContext {
    let pool = Arc::new(ConnectionPool::new());
    for chain in chains {
        pool.insert(Arc::new((*chain).clone()));
    }
    EngineContext::new(pool, signer, builder).with_backoff(BackoffConfig::immediate())
}

pub fn engine_context(
    chains: &[&MockChain],
    signer: Arc<MockSigner>,
    builder: Arc<MockBuilder>,
) -> Arc<EngineContext> {
    Arc::new(build_context(chains, signer, builder))
}
