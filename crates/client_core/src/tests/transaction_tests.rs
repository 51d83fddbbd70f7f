use std::time::Duration;

use super::*;
use crate::test_support::{handle_for, receipt_for, recording_cache, Inclusion, ScriptedGateway};
use shared::{
    protocol::{CallArg, EntryPoint},
    Address, U256,
};

fn borrow_request() -> TransactionRequest {
    TransactionRequest::new(
        Address::repeat_byte(0x10),
        EntryPoint::Borrow,
        vec![CallArg::Uint(U256::from(5u64))],
    )
}

#[test]
fn only_submit_is_valid_from_idle() {
    let (_, cache) = recording_cache();
    let mut controller = TransactionController::new("borrow", cache);

    for event in [
        TransactionEvent::WalletAccepted(handle_for(1)),
        TransactionEvent::WalletRejected(TxFailure::UserRejected("denied".into())),
        TransactionEvent::Included(receipt_for(handle_for(1))),
        TransactionEvent::InclusionFailed(TxFailure::NetworkError("rpc down".into())),
    ] {
        let err = controller.apply(event).expect_err("idle ignores events");
        assert!(matches!(
            err,
            ControllerError::InvalidTransition { state: "idle", .. }
        ));
    }
    assert!(controller.state().is_idle());

    controller.submit(borrow_request()).expect("submit");
    assert_eq!(controller.state(), &TransactionState::Submitting);
    assert_eq!(controller.request(), Some(&borrow_request()));
}

#[test]
fn second_submit_before_terminal_state_is_already_in_flight() {
    let (_, cache) = recording_cache();
    let mut controller = TransactionController::new("borrow", cache);
    controller.submit(borrow_request()).expect("first submit");

    let err = controller.submit(borrow_request()).expect_err("second submit");
    assert_eq!(
        err,
        ControllerError::AlreadyInFlight {
            label: "borrow".into(),
            state: "submitting",
        }
    );

    controller
        .apply(TransactionEvent::WalletAccepted(handle_for(1)))
        .expect("accepted");
    assert!(matches!(
        controller.submit(borrow_request()),
        Err(ControllerError::AlreadyInFlight { state: "confirming", .. })
    ));
}

#[test]
fn confirmation_invalidates_reads_exactly_once() {
    let (recorder, cache) = recording_cache();
    let mut controller = TransactionController::new("borrow", cache);
    controller.submit(borrow_request()).expect("submit");
    controller
        .apply(TransactionEvent::WalletAccepted(handle_for(1)))
        .expect("accepted");
    assert_eq!(recorder.count(), 0);

    controller
        .apply(TransactionEvent::Included(receipt_for(handle_for(1))))
        .expect("included");
    assert!(controller.state().is_confirmed());
    assert_eq!(recorder.count(), 1);

    // Re-observing or replaying the event never re-fires the signal.
    let _ = controller.state();
    assert!(controller
        .apply(TransactionEvent::Included(receipt_for(handle_for(1))))
        .is_err());
    assert_eq!(recorder.count(), 1);
}

#[test]
fn failures_never_invalidate_and_keep_the_reason() {
    let (recorder, cache) = recording_cache();

    let mut rejected = TransactionController::new("repay", cache.clone());
    rejected.submit(borrow_request()).expect("submit");
    rejected
        .apply(TransactionEvent::WalletRejected(TxFailure::UserRejected(
            "User denied transaction signature.".into(),
        )))
        .expect("rejected");
    assert_eq!(
        rejected.state(),
        &TransactionState::Failed(TxFailure::UserRejected(
            "User denied transaction signature.".into()
        ))
    );

    let mut reverted = TransactionController::new("liquidate", cache);
    reverted.submit(borrow_request()).expect("submit");
    reverted
        .apply(TransactionEvent::WalletAccepted(handle_for(2)))
        .expect("accepted");
    reverted
        .apply(TransactionEvent::InclusionFailed(TxFailure::SimulationReverted(
            "PositionHealthy()".into(),
        )))
        .expect("reverted");

    assert!(reverted.state().is_terminal());
    assert_eq!(recorder.count(), 0);
}

#[test]
fn receipt_for_another_transaction_is_rejected() {
    let (recorder, cache) = recording_cache();
    let mut controller = TransactionController::new("deposit", cache);
    controller.submit(borrow_request()).expect("submit");
    controller
        .apply(TransactionEvent::WalletAccepted(handle_for(2)))
        .expect("accepted");

    let err = controller
        .apply(TransactionEvent::Included(receipt_for(handle_for(1))))
        .expect_err("stale receipt");
    assert!(matches!(err, ControllerError::ForeignReceipt { .. }));
    assert_eq!(controller.state(), &TransactionState::Confirming(handle_for(2)));
    assert_eq!(recorder.count(), 0);
}

#[tokio::test]
async fn execute_settles_a_mismatched_receipt_as_failed() {
    let (recorder, cache) = recording_cache();
    let gateway =
        ScriptedGateway::new().then_inclusion(Inclusion::ReceiptFor(handle_for(9)));
    let mut controller = TransactionController::new("deposit", cache);

    let err = controller
        .execute(&gateway, borrow_request(), None)
        .await
        .expect_err("mismatched receipt");

    let TransactionError::Failed(TxFailure::NetworkError(message)) = &err else {
        panic!("unexpected error: {err:?}");
    };
    assert!(message.contains("does not belong to pending transaction"));
    assert_eq!(
        controller.state(),
        &TransactionState::Failed(TxFailure::NetworkError(message.clone()))
    );
    assert!(!controller.state().is_in_flight());
    assert_eq!(recorder.count(), 0);

    controller.reset().expect("failed controller can reset");
    assert!(controller.state().is_idle());
}

#[test]
fn reset_only_from_settled_states() {
    let (recorder, cache) = recording_cache();
    let mut controller = TransactionController::new("borrow", cache);
    controller.submit(borrow_request()).expect("submit");
    assert!(controller.reset().is_err());

    controller
        .apply(TransactionEvent::WalletAccepted(handle_for(1)))
        .expect("accepted");
    controller
        .apply(TransactionEvent::Included(receipt_for(handle_for(1))))
        .expect("included");
    controller.reset().expect("reset after confirmation");
    assert!(controller.state().is_idle());
    assert!(controller.request().is_none());

    controller.submit(borrow_request()).expect("new attempt");
    controller
        .apply(TransactionEvent::WalletAccepted(handle_for(3)))
        .expect("accepted");
    controller
        .apply(TransactionEvent::Included(receipt_for(handle_for(3))))
        .expect("included");
    assert_eq!(recorder.count(), 2);
}

#[tokio::test]
async fn execute_drives_write_to_confirmation() {
    let (recorder, cache) = recording_cache();
    let gateway = ScriptedGateway::new();
    let mut controller = TransactionController::new("borrow", cache);

    let receipt = controller
        .execute(&gateway, borrow_request(), None)
        .await
        .expect("confirmed");

    assert_eq!(receipt, receipt_for(handle_for(1)));
    assert_eq!(controller.state(), &TransactionState::Confirmed(receipt));
    assert_eq!(gateway.submitted().await, vec![borrow_request()]);
    assert_eq!(recorder.count(), 1);
}

#[tokio::test]
async fn execute_surfaces_wallet_rejection_verbatim() {
    let (recorder, cache) = recording_cache();
    let gateway = ScriptedGateway::new()
        .reject_next_write(TxFailure::UserRejected("User rejected the request.".into()));
    let mut controller = TransactionController::new("borrow", cache);

    let err = controller
        .execute(&gateway, borrow_request(), None)
        .await
        .expect_err("rejected");

    assert_eq!(
        err,
        TransactionError::Failed(TxFailure::UserRejected("User rejected the request.".into()))
    );
    assert!(gateway.submitted().await.is_empty());
    assert_eq!(recorder.count(), 0);
}

#[tokio::test]
async fn execute_times_out_while_confirming() {
    let (recorder, cache) = recording_cache();
    let gateway = ScriptedGateway::new().then_inclusion(Inclusion::Hang);
    let mut controller = TransactionController::new("borrow", cache);

    let err = controller
        .execute(&gateway, borrow_request(), Some(Duration::from_millis(20)))
        .await
        .expect_err("timeout");

    assert_eq!(err, TransactionError::Failed(TxFailure::Timeout { waited_ms: 20 }));
    assert_eq!(
        controller.state(),
        &TransactionState::Failed(TxFailure::Timeout { waited_ms: 20 })
    );
    assert_eq!(recorder.count(), 0);
}

#[tokio::test]
async fn execute_refuses_a_controller_already_used() {
    let (_, cache) = recording_cache();
    let gateway = ScriptedGateway::new();
    let mut controller = TransactionController::new("borrow", cache);
    controller
        .execute(&gateway, borrow_request(), None)
        .await
        .expect("first run");

    let err = controller
        .execute(&gateway, borrow_request(), None)
        .await
        .expect_err("single use");
    assert!(matches!(
        err,
        TransactionError::Controller(ControllerError::AlreadyInFlight { state: "confirmed", .. })
    ));
    assert_eq!(gateway.submitted().await.len(), 1);
}
