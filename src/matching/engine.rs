//! Weighted multi-criterion matching of transactions to ledger movements

use bigdecimal::BigDecimal;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::matching::text;
use crate::traits::MovementStore;
use crate::types::*;

/// Days searched on each side of the transaction date
const DATE_WINDOW_DAYS: i64 = 7;

/// Minimum weighted total, in tenths of a point, for a candidate to qualify
const MIN_WEIGHTED_TENTHS: u32 = 500;

/// One scored candidate movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub movement_id: String,
    pub date_score: u32,
    pub amount_score: u32,
    pub description_score: u32,
    /// Weighted total in tenths of a point (date*3 + amount*4 + description*3)
    pub weighted_tenths: u32,
    pub reasons: Vec<String>,
}

impl MatchCandidate {
    /// Weighted total rounded to a 0-100 score
    pub fn score(&self) -> u8 {
        ((self.weighted_tenths + 5) / 10) as u8
    }
}

/// Matching engine proposing at most one ledger movement per transaction
pub struct MatchingEngine<M: MovementStore> {
    store: M,
}

impl<M: MovementStore> MatchingEngine<M> {
    /// Create a new matching engine over the given movement store
    pub fn new(store: M) -> Self {
        Self { store }
    }

    /// Propose the best-matching unreconciled movement for a transaction
    ///
    /// Candidates are fetched within seven days of the transaction date on
    /// either side, scored on date, amount and description under a
    /// direction-compatibility gate, and kept only when the weighted total
    /// reaches 50. Ties resolve to the lowest movement id.
    pub async fn suggest(
        &self,
        transaction: &RawTransaction,
        account_id: &str,
    ) -> ReconcileResult<Option<MatchSuggestion>> {
        let from = transaction.date - Duration::days(DATE_WINDOW_DAYS);
        let to = transaction.date + Duration::days(DATE_WINDOW_DAYS);
        let candidates = self.store.find_unreconciled(account_id, from, to).await?;

        let mut best: Option<MatchCandidate> = None;
        for movement in &candidates {
            let candidate = score_candidate(transaction, movement);
            debug!(
                movement_id = %candidate.movement_id,
                score = candidate.score(),
                "evaluated match candidate"
            );
            if candidate.weighted_tenths < MIN_WEIGHTED_TENTHS {
                continue;
            }
            let replace = match &best {
                None => true,
                Some(current) => {
                    candidate.weighted_tenths > current.weighted_tenths
                        || (candidate.weighted_tenths == current.weighted_tenths
                            && candidate.movement_id < current.movement_id)
                }
            };
            if replace {
                best = Some(candidate);
            }
        }

        Ok(best.map(|c| MatchSuggestion {
            score: c.score(),
            movement_id: c.movement_id,
            reasons: c.reasons,
        }))
    }
}

/// Score a single movement against a transaction
pub fn score_candidate(transaction: &RawTransaction, movement: &LedgerMovement) -> MatchCandidate {
    if !direction_compatible(transaction.direction, &movement.direction_label) {
        return MatchCandidate {
            movement_id: movement.id.clone(),
            date_score: 0,
            amount_score: 0,
            description_score: 0,
            weighted_tenths: 0,
            reasons: vec!["incompatible transaction type".to_string()],
        };
    }

    let (date_score, date_reason) = score_date(transaction.date, movement.date);
    let (amount_score, amount_reason) = score_amount(&transaction.amount, &movement.amount);
    let (description_score, description_reason) =
        score_description(&transaction.description, &movement.description);

    let weighted_tenths = date_score * 3 + amount_score * 4 + description_score * 3;

    MatchCandidate {
        movement_id: movement.id.clone(),
        date_score,
        amount_score,
        description_score,
        weighted_tenths,
        reasons: vec![date_reason, amount_reason, description_reason],
    }
}

/// Whether a free-text movement category is compatible with a direction
///
/// Accepts the legacy labels "Débito"/"Saída" for debits and
/// "Crédito"/"Entrada" for credits, case- and accent-insensitively.
pub fn direction_compatible(direction: Direction, label: &str) -> bool {
    let normalized = text::normalize(label);
    match direction {
        Direction::Debit => normalized == "debito" || normalized == "saida",
        Direction::Credit => normalized == "credito" || normalized == "entrada",
    }
}

fn score_date(transaction_date: NaiveDate, movement_date: NaiveDate) -> (u32, String) {
    let days = (movement_date - transaction_date).num_days().abs();
    let score = match days {
        0 => 100,
        1 => 90,
        2 => 80,
        3 => 70,
        4 | 5 => 50,
        _ => 30,
    };
    let reason = match days {
        0 => "exact date".to_string(),
        1 => "1 day apart".to_string(),
        n => format!("{} days apart", n),
    };
    (score, reason)
}

fn score_amount(transaction_amount: &BigDecimal, movement_amount: &BigDecimal) -> (u32, String) {
    if transaction_amount == movement_amount {
        return (100, "exact value".to_string());
    }

    let diff = (transaction_amount - movement_amount).abs();
    // Relative-difference buckets via exact cross-multiplication:
    // diff / amount <= p  <=>  diff * (1/p) <= amount
    if &diff * BigDecimal::from(10_000) <= *transaction_amount {
        (95, "value within 0.01%".to_string())
    } else if &diff * BigDecimal::from(100) <= *transaction_amount {
        (85, "value within 1%".to_string())
    } else if &diff * BigDecimal::from(20) <= *transaction_amount {
        (60, "value within 5%".to_string())
    } else if &diff * BigDecimal::from(10) <= *transaction_amount {
        (30, "value within 10%".to_string())
    } else {
        (0, "value differs by more than 10%".to_string())
    }
}

fn score_description(transaction_description: &str, movement_description: &str) -> (u32, String) {
    let a = text::normalize(transaction_description);
    let b = text::normalize(movement_description);
    let score = text::similarity(&a, &b);
    let reason = match score {
        100 => "identical description".to_string(),
        80 => "one description contains the other".to_string(),
        n => format!("description {}% similar", n),
    };
    (score, reason)
}
