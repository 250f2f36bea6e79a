//! Traits for storage abstraction and external collaborators

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::types::*;

/// Read/write access to the ledger movement store
///
/// This trait lets the reconciliation core work with any backend
/// (PostgreSQL, MySQL, in-memory, etc.). Implementations own row filtering
/// concerns such as multi-tenancy; this core only expresses the queries it
/// needs. An adapter that stores encrypted monetary values receives its codec
/// as a constructor parameter; the core never touches it.
#[async_trait]
pub trait MovementStore: Send + Sync {
    /// List movements for an account that are not reconciled, not
    /// soft-deleted, and dated within `[from, to]` inclusive
    async fn find_unreconciled(
        &self,
        account_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ReconcileResult<Vec<LedgerMovement>>;

    /// Get a movement by id
    async fn get_movement(&self, movement_id: &str) -> ReconcileResult<Option<LedgerMovement>>;

    /// Flag a movement as reconciled, recording when and by whom
    async fn mark_reconciled(
        &mut self,
        movement_id: &str,
        at: NaiveDateTime,
        by: &str,
    ) -> ReconcileResult<()>;
}

/// Persistence for imported statement items
#[async_trait]
pub trait StatementItemStore: Send + Sync {
    /// Persist a whole import batch as one unit of work
    ///
    /// Either every item is written or none is; partial batches must never
    /// become visible.
    async fn create_batch(&mut self, items: &[StatementItem]) -> ReconcileResult<()>;

    /// Get a statement item by id
    async fn get_item(&self, item_id: &str) -> ReconcileResult<Option<StatementItem>>;

    /// Update the mutable fields of an existing item
    async fn update_item(&mut self, item: &StatementItem) -> ReconcileResult<()>;

    /// Persist a reconciled item and flag its movement in one unit of work
    ///
    /// Atomicity is the adapter's contract, as with [`create_batch`]: either
    /// the item is written and the movement is flagged reconciled (recording
    /// `at` and `by`), or neither change becomes visible.
    ///
    /// [`create_batch`]: StatementItemStore::create_batch
    async fn commit_acceptance(
        &mut self,
        item: &StatementItem,
        movement_id: &str,
        at: NaiveDateTime,
        by: &str,
    ) -> ReconcileResult<()>;
}

/// Audit collaborator receiving one event per domain operation
///
/// The call is part of the domain flow: a failure here propagates and fails
/// the operation, so success is never reported without its audit trail.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> ReconcileResult<()>;
}
