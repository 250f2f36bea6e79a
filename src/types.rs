//! Core types and data structures for the reconciliation system

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Direction of a bank transaction relative to the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Money leaving the account
    Debit,
    /// Money entering the account
    Credit,
}

impl Direction {
    /// Lowercase label used in audit payloads and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Debit => "debit",
            Direction::Credit => "credit",
        }
    }
}

/// File format of an imported bank statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceFormat {
    Ofx,
    Csv,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Ofx => "OFX",
            SourceFormat::Csv => "CSV",
        }
    }
}

/// Lifecycle state of an imported statement item
///
/// Transitions: `Pending -> Suggested -> Reconciled` (terminal),
/// `Suggested -> Pending` on rejection, and `Pending | Suggested -> Ignored`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    /// Imported without an automatic match
    Pending,
    /// A candidate ledger movement was proposed
    Suggested,
    /// Linked to a ledger movement; the movement carries `reconciled = true`
    Reconciled,
    /// Excluded from the workflow without being deleted
    Ignored,
}

/// One normalized transaction produced by a statement parser
///
/// `amount` is always a non-negative magnitude; the sign semantics live in
/// `direction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub document_ref: Option<String>,
    pub amount: BigDecimal,
    pub direction: Direction,
}

/// A bank movement already recorded in the system's own books
///
/// Owned by the ledger side of the system; this core reads candidates and
/// flips the reconciliation flag. `direction_label` is free text carrying the
/// legacy category names ("Crédito"/"Débito"/"Entrada"/"Saída").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerMovement {
    pub id: String,
    pub account_id: String,
    pub date: NaiveDate,
    pub description: String,
    pub amount: BigDecimal,
    pub direction_label: String,
    pub reconciled: bool,
    pub reconciled_at: Option<NaiveDateTime>,
    pub reconciled_by: Option<String>,
    pub deleted_at: Option<NaiveDateTime>,
}

/// One transaction imported from a bank statement file, pending reconciliation
///
/// Created once per import and never re-created; only `status`,
/// `suggested_movement_id`, `match_score` and `reconciled_movement_id` mutate
/// afterwards. `match_score` is present exactly when the status is
/// `Suggested` or `Reconciled`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementItem {
    pub id: String,
    pub account_id: String,
    pub company_id: Option<String>,
    pub transaction_date: NaiveDate,
    pub description: String,
    pub document_ref: Option<String>,
    pub amount: BigDecimal,
    pub direction: Direction,
    pub status: ItemStatus,
    pub suggested_movement_id: Option<String>,
    pub reconciled_movement_id: Option<String>,
    pub match_score: Option<u8>,
    pub source_format: SourceFormat,
    pub source_file_name: String,
    pub imported_by: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

/// Best-match proposal returned by the matching engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSuggestion {
    /// Id of the proposed ledger movement
    pub movement_id: String,
    /// Rounded weighted confidence, 0-100
    pub score: u8,
    /// Human-readable component explanations
    pub reasons: Vec<String>,
}

/// Identity of the user performing an operation
///
/// Supplied by the authentication surface, which is outside this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub email: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }
}

/// Severity attached to an audit event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditSeverity {
    Info,
    Warning,
    Error,
}

/// Structured event handed to the audit collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: NaiveDateTime,
    pub event_type: String,
    pub severity: AuditSeverity,
    pub actor_id: String,
    pub actor_email: String,
    pub resource: String,
    pub action: String,
    pub success: bool,
    pub details: serde_json::Value,
}

/// Outcome of importing one statement file
///
/// Items are returned in parse order. `with_suggestion + without_suggestion`
/// always equals `total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total: usize,
    pub with_suggestion: usize,
    pub without_suggestion: usize,
    pub items: Vec<StatementItem>,
}

/// Errors that can occur in the reconciliation core
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Statement item not found: {0}")]
    ItemNotFound(String),
    #[error("Ledger movement not found: {0}")]
    MovementNotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Audit error: {0}")]
    Audit(String),
}

/// Result type for reconciliation operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;
