use std::fmt;

use crate::transaction::TransactionState;

/// One-line progress banner for a transaction. `Idle` renders as an empty line.
pub struct TxStatusLine<'a>(pub &'a TransactionState);

impl fmt::Display for TxStatusLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            TransactionState::Idle => Ok(()),
            TransactionState::Submitting => f.write_str("SUBMITTING TX..."),
            TransactionState::Confirming(handle) => {
                write!(f, "CONFIRMING... {}", short_hash(&handle.to_string()))
            }
            TransactionState::Confirmed(_) => f.write_str("CONFIRMED"),
            TransactionState::Failed(failure) => write!(f, "ERROR: {}", failure.message()),
        }
    }
}

pub fn status_line(state: &TransactionState) -> Option<String> {
    (!state.is_idle()).then(|| TxStatusLine(state).to_string())
}

fn short_hash(hash: &str) -> String {
    if hash.len() <= 16 || !hash.is_ascii() {
        return hash.to_string();
    }
    format!("{}...{}", &hash[..10], &hash[hash.len() - 6..])
}

#[cfg(test)]
#[path = "tests/status_tests.rs"]
mod tests;
