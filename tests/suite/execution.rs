//! Whole-session execution against scripted chains

use std::sync::atomic::Ordering;

use dotexec_chain::{ChainError, DispatchOutcome, TxStatus};
use dotexec_engine::{ExecutionEvent, ExecutionSession};
use dotexec_types::{
    AccountId, BlockHash, ChainClass, ErrorCategory, ExecutionStatus, MAX_ATTEMPTS,
    RetryDirective,
};
use tokio::sync::mpsc;

use crate::common::{FakeChain, FakeSigner, context, intent};

const ONE_WND: u128 = 1_000_000_000_000;

fn drain(rx: &mut mpsc::UnboundedReceiver<ExecutionEvent>) -> Vec<ExecutionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn statuses(events: &[ExecutionEvent]) -> Vec<ExecutionStatus> {
    events
        .iter()
        .filter_map(|event| match event {
            ExecutionEvent::StatusChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect()
}

fn assert_released(chain: &FakeChain) {
    let ledger = &chain.ledger;
    assert_eq!(
        ledger.forks_opened.load(Ordering::SeqCst),
        ledger.forks_released.load(Ordering::SeqCst),
        "every fork is released"
    );
    assert_eq!(
        ledger.submissions.load(Ordering::SeqCst),
        ledger.unsubscribes.load(Ordering::SeqCst),
        "every subscription is closed"
    );
}

#[tokio::test]
async fn transfer_finalizes_on_the_first_chain() {
    let hub = FakeChain::asset_hub();
    let session = ExecutionSession::new(context(&[&hub], FakeSigner::approving()));
    let mut events = session.subscribe();

    let id = session.submit(intent(ChainClass::AssetHub, ONE_WND));
    let snapshot = session.wait(id).await.unwrap();

    assert_eq!(snapshot.status, ExecutionStatus::Finalized);
    assert_eq!(snapshot.attempt, 1);
    assert_eq!(snapshot.error_message, None);
    let result = snapshot.result.unwrap();
    assert_eq!(result.tx_hash.as_str(), "0xasset-hub-tx1");
    assert_eq!(result.block_hash, BlockHash::new("0xasset-hub-block1"));
    assert_eq!(snapshot.metadata["chain_name"], "Westend Asset Hub");
    assert_eq!(snapshot.metadata["estimated_fee"], "0.016 WND");

    assert_eq!(
        statuses(&drain(&mut events)),
        vec![
            ExecutionStatus::Signing,
            ExecutionStatus::Broadcasting,
            ExecutionStatus::InBlock,
            ExecutionStatus::Finalized,
        ]
    );
    assert_released(&hub);
}

#[tokio::test]
async fn configuration_failure_retries_on_the_alternate_chain() {
    let hub = FakeChain::asset_hub();
    let relay = FakeChain::relay();
    hub.fail_dry_run(Ok(DispatchOutcome::Module {
        section: "assets".into(),
        name: "UnknownAsset".into(),
        docs: vec!["The given asset ID is unknown.".into()],
    }));
    let session = ExecutionSession::new(context(&[&hub, &relay], FakeSigner::approving()));
    let mut events = session.subscribe();

    let id = session.submit(intent(ChainClass::AssetHub, ONE_WND));
    let snapshot = session.wait(id).await.unwrap();

    assert_eq!(snapshot.status, ExecutionStatus::Finalized);
    assert_eq!(snapshot.attempt, 2);
    assert_eq!(snapshot.chain, ChainClass::Relay);
    assert_eq!(snapshot.result.unwrap().tx_hash.as_str(), "0xrelay-tx1");
    assert_eq!(hub.ledger.submissions.load(Ordering::SeqCst), 0);

    let retries: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            ExecutionEvent::RetryScheduled {
                attempt,
                category,
                strategy,
                ..
            } => Some((attempt, category, strategy.directive)),
            _ => None,
        })
        .collect();
    assert_eq!(
        retries,
        vec![(
            2,
            ErrorCategory::ConfigurationError,
            Some(RetryDirective::SwitchChain {
                to: ChainClass::Relay
            })
        )]
    );
    assert_released(&hub);
    assert_released(&relay);
}

#[tokio::test]
async fn signer_rejection_fails_without_submitting() {
    let hub = FakeChain::asset_hub();
    let session = ExecutionSession::new(context(&[&hub], FakeSigner::rejecting("Cancelled")));

    let id = session.submit(intent(ChainClass::AssetHub, ONE_WND));
    let snapshot = session.wait(id).await.unwrap();

    assert_eq!(snapshot.status, ExecutionStatus::Failed);
    assert_eq!(snapshot.attempt, 1);
    assert_eq!(
        snapshot.error_message.as_deref(),
        Some("Transaction was rejected in the signer")
    );
    assert_eq!(hub.ledger.submissions.load(Ordering::SeqCst), 0);
    assert_released(&hub);
}

#[tokio::test]
async fn insufficient_balance_stops_after_one_simulation() {
    let hub = FakeChain::asset_hub();
    let relay = FakeChain::relay();
    hub.fail_dry_run(Ok(DispatchOutcome::Module {
        section: "balances".into(),
        name: "InsufficientBalance".into(),
        docs: vec!["Balance too low to send value.".into()],
    }));
    let session = ExecutionSession::new(context(&[&hub, &relay], FakeSigner::approving()));

    let id = session.submit(intent(ChainClass::AssetHub, ONE_WND));
    let snapshot = session.wait(id).await.unwrap();

    assert_eq!(snapshot.status, ExecutionStatus::Failed);
    assert_eq!(
        snapshot.error_message.as_deref(),
        Some("Insufficient balance for this transaction including fees")
    );
    assert!(
        snapshot
            .error_details
            .unwrap()
            .starts_with("balances.InsufficientBalance")
    );
    assert_eq!(hub.ledger.forks_opened.load(Ordering::SeqCst), 1);
    assert_eq!(relay.ledger.forks_opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn finality_without_inclusion_still_passes_through_in_block() {
    let relay = FakeChain::relay();
    relay.script_submission(vec![
        TxStatus::Broadcast,
        TxStatus::Finalized {
            block_hash: BlockHash::new("0xfinal"),
        },
    ]);
    let session = ExecutionSession::new(context(&[&relay], FakeSigner::approving()));
    let id = session.submit(intent(ChainClass::Relay, ONE_WND));
    let mut item_events = session.subscribe_item(id).unwrap();

    let snapshot = session.wait(id).await.unwrap();
    assert_eq!(snapshot.status, ExecutionStatus::Finalized);

    let seen = statuses(&drain(&mut item_events));
    let in_block = seen.iter().position(|s| *s == ExecutionStatus::InBlock);
    let finalized = seen.iter().position(|s| *s == ExecutionStatus::Finalized);
    assert!(in_block.is_some());
    assert!(in_block < finalized);
}

#[tokio::test]
async fn network_failures_stop_at_the_attempt_limit() {
    let relay = FakeChain::relay();
    for _ in 0..MAX_ATTEMPTS {
        relay.fail_dry_run(Err(ChainError::Disconnected("websocket closed".into())));
    }
    let session = ExecutionSession::new(context(&[&relay], FakeSigner::approving()));

    let id = session.submit(intent(ChainClass::Relay, ONE_WND));
    let snapshot = session.wait(id).await.unwrap();

    assert_eq!(snapshot.status, ExecutionStatus::Failed);
    assert_eq!(snapshot.attempt, MAX_ATTEMPTS);
    assert_eq!(snapshot.chain, ChainClass::Relay);
    assert_eq!(
        relay.ledger.forks_opened.load(Ordering::SeqCst),
        MAX_ATTEMPTS as usize
    );
    assert_eq!(relay.ledger.submissions.load(Ordering::SeqCst), 0);
    assert_released(&relay);
}

#[tokio::test]
async fn failed_inclusion_is_retried_on_the_alternate_chain() {
    let hub = FakeChain::asset_hub();
    let relay = FakeChain::relay();
    hub.script_submission(vec![
        TxStatus::Ready,
        TxStatus::InBlock {
            block_hash: BlockHash::new("0xhub"),
            outcome: DispatchOutcome::Token("FundsUnavailable".into()),
        },
    ]);
    let session = ExecutionSession::new(context(&[&hub, &relay], FakeSigner::approving()));

    let id = session.submit(intent(ChainClass::AssetHub, ONE_WND));
    let snapshot = session.wait(id).await.unwrap();

    assert_eq!(snapshot.status, ExecutionStatus::Finalized);
    assert_eq!(snapshot.chain, ChainClass::Relay);
    assert_eq!(snapshot.error_message, None);
    assert_eq!(snapshot.error_details, None);
    assert_released(&hub);
}

#[tokio::test]
async fn bad_recipient_is_a_user_error() {
    let hub = FakeChain::asset_hub();
    let session = ExecutionSession::new(context(&[&hub], FakeSigner::approving()));

    let mut transfer = intent(ChainClass::AssetHub, ONE_WND);
    transfer.recipient = AccountId::new("0xnot-ss58");
    let id = session.submit(transfer);
    let snapshot = session.wait(id).await.unwrap();

    assert_eq!(snapshot.status, ExecutionStatus::Failed);
    assert_eq!(
        snapshot.error_message.as_deref(),
        Some("The recipient address is not valid")
    );
    assert_eq!(hub.ledger.forks_opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn items_in_one_session_do_not_affect_each_other() {
    let hub = FakeChain::asset_hub();
    let relay = FakeChain::relay();
    hub.fail_dry_run(Ok(DispatchOutcome::Invalid("Payment".into())));
    let session = ExecutionSession::new(context(&[&hub, &relay], FakeSigner::approving()));

    let failing = session.submit(intent(ChainClass::AssetHub, ONE_WND));
    let passing = session.submit(intent(ChainClass::Relay, 2 * ONE_WND));

    assert_eq!(
        session.wait(failing).await.unwrap().status,
        ExecutionStatus::Failed
    );
    assert_eq!(
        session.wait(passing).await.unwrap().status,
        ExecutionStatus::Finalized
    );

    let summary = session.status_summary();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.count(ExecutionStatus::Failed), 1);
    assert_eq!(summary.count(ExecutionStatus::Finalized), 1);
    assert_eq!(summary.active(), 0);
}

#[tokio::test]
async fn cancelled_item_keeps_a_clean_snapshot() {
    let relay = FakeChain::relay();
    relay.script_submission(vec![TxStatus::Ready]);
    let session = ExecutionSession::new(context(&[&relay], FakeSigner::approving()));

    let id = session.submit(intent(ChainClass::Relay, ONE_WND));
    let mut item_events = session.subscribe_item(id).unwrap();
    while let Some(event) = item_events.recv().await {
        if matches!(
            event,
            ExecutionEvent::StatusChanged {
                to: ExecutionStatus::Broadcasting,
                ..
            }
        ) {
            break;
        }
    }
    assert!(session.cancel(id));

    let snapshot = session.wait(id).await.unwrap();
    assert_eq!(snapshot.status, ExecutionStatus::Cancelled);
    assert!(snapshot.cancelled);
    assert_eq!(snapshot.error_message, None);
    assert_eq!(snapshot.result, None);
    assert_released(&relay);
}
