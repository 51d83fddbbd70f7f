use super::*;
use shared::{
    error::TxFailure,
    protocol::{Receipt, TxHandle},
    B256,
};

#[test]
fn idle_renders_nothing() {
    assert_eq!(status_line(&TransactionState::Idle), None);
    assert_eq!(TxStatusLine(&TransactionState::Idle).to_string(), "");
}

#[test]
fn in_flight_states_render_progress() {
    assert_eq!(
        status_line(&TransactionState::Submitting).as_deref(),
        Some("SUBMITTING TX...")
    );

    let handle = TxHandle(B256::repeat_byte(0xab));
    assert_eq!(
        status_line(&TransactionState::Confirming(handle)).as_deref(),
        Some("CONFIRMING... 0xabababab...ababab")
    );
}

#[test]
fn terminal_states_render_outcome() {
    let receipt = Receipt {
        tx_hash: B256::repeat_byte(1),
        block_number: 7,
    };
    assert_eq!(
        status_line(&TransactionState::Confirmed(receipt)).as_deref(),
        Some("CONFIRMED")
    );
    assert_eq!(
        status_line(&TransactionState::Failed(TxFailure::SimulationReverted(
            "InsufficientCollateral()".into()
        )))
        .as_deref(),
        Some("ERROR: InsufficientCollateral()")
    );
    assert_eq!(
        status_line(&TransactionState::Failed(TxFailure::Timeout { waited_ms: 1500 }))
            .as_deref(),
        Some("ERROR: timed out after 1500ms waiting for inclusion")
    );
}

#[test]
fn short_hash_leaves_short_input_alone() {
    assert_eq!(short_hash("0x1234"), "0x1234");
}
