use std::collections::HashSet;

use amie_core::Transaction;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: usize,
    pub duplicates: usize,
}

/// Appends `incoming` to `existing`, dropping any incoming transaction whose
/// date, amount and raw description already appear in `existing`.
///
/// Repeats inside `incoming` itself are kept: two identical card swipes on the
/// same day are two real transactions.
pub fn merge_transactions(
    existing: Vec<Transaction>,
    incoming: Vec<Transaction>,
) -> (Vec<Transaction>, MergeOutcome) {
    let total = incoming.len();
    let fresh: Vec<Transaction> = {
        let seen: HashSet<_> = existing.iter().map(Transaction::content_key).collect();
        incoming
            .into_iter()
            .filter(|tx| !seen.contains(&tx.content_key()))
            .collect()
    };

    let outcome = MergeOutcome {
        added: fresh.len(),
        duplicates: total - fresh.len(),
    };
    let mut merged = existing;
    merged.extend(fresh);
    (merged, outcome)
}
