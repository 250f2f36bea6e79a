//! In-memory storage implementations for testing and development

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

/// In-memory ledger movement store
#[derive(Debug, Clone, Default)]
pub struct MemoryMovementStore {
    movements: Arc<RwLock<HashMap<String, LedgerMovement>>>,
}

impl MemoryMovementStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a movement (test helper)
    pub fn insert(&mut self, movement: LedgerMovement) {
        self.movements
            .write()
            .unwrap()
            .insert(movement.id.clone(), movement);
    }

    /// Get a movement by id (test helper)
    pub fn get(&self, movement_id: &str) -> Option<LedgerMovement> {
        self.movements.read().unwrap().get(movement_id).cloned()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        self.movements.write().unwrap().clear();
    }
}

#[async_trait]
impl MovementStore for MemoryMovementStore {
    async fn find_unreconciled(
        &self,
        account_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ReconcileResult<Vec<LedgerMovement>> {
        let movements = self.movements.read().unwrap();
        Ok(movements
            .values()
            .filter(|m| {
                m.account_id == account_id
                    && !m.reconciled
                    && m.deleted_at.is_none()
                    && m.date >= from
                    && m.date <= to
            })
            .cloned()
            .collect())
    }

    async fn get_movement(&self, movement_id: &str) -> ReconcileResult<Option<LedgerMovement>> {
        Ok(self.movements.read().unwrap().get(movement_id).cloned())
    }

    async fn mark_reconciled(
        &mut self,
        movement_id: &str,
        at: NaiveDateTime,
        by: &str,
    ) -> ReconcileResult<()> {
        let mut movements = self.movements.write().unwrap();
        match movements.get_mut(movement_id) {
            Some(movement) => {
                movement.reconciled = true;
                movement.reconciled_at = Some(at);
                movement.reconciled_by = Some(by.to_string());
                Ok(())
            }
            None => Err(ReconcileError::MovementNotFound(movement_id.to_string())),
        }
    }
}

/// In-memory statement item store
///
/// The batch write holds the lock for the whole insert, so a batch is never
/// observable half-written. Sharing a backing map with a
/// [`MemoryMovementStore`] (via [`linked`](Self::linked)) stands in for the
/// shared database connection a real adapter would commit acceptances over.
#[derive(Debug, Clone, Default)]
pub struct MemoryStatementItemStore {
    items: Arc<RwLock<HashMap<String, StatementItem>>>,
    movements: Arc<RwLock<HashMap<String, LedgerMovement>>>,
}

impl MemoryStatementItemStore {
    /// Create a new empty store
    ///
    /// The store is not linked to any movement store, so
    /// [`commit_acceptance`](StatementItemStore::commit_acceptance) will not
    /// find any movement. Use [`linked`](Self::linked) for workflows that
    /// accept suggestions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store sharing its movement data with `movements`
    pub fn linked(movements: &MemoryMovementStore) -> Self {
        Self {
            items: Arc::default(),
            movements: movements.movements.clone(),
        }
    }

    /// Number of stored items (test helper)
    pub fn len(&self) -> usize {
        self.items.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        self.items.write().unwrap().clear();
    }
}

#[async_trait]
impl StatementItemStore for MemoryStatementItemStore {
    async fn create_batch(&mut self, items: &[StatementItem]) -> ReconcileResult<()> {
        let mut store = self.items.write().unwrap();
        for item in items {
            store.insert(item.id.clone(), item.clone());
        }
        Ok(())
    }

    async fn get_item(&self, item_id: &str) -> ReconcileResult<Option<StatementItem>> {
        Ok(self.items.read().unwrap().get(item_id).cloned())
    }

    async fn update_item(&mut self, item: &StatementItem) -> ReconcileResult<()> {
        let mut items = self.items.write().unwrap();
        if items.contains_key(&item.id) {
            items.insert(item.id.clone(), item.clone());
            Ok(())
        } else {
            Err(ReconcileError::ItemNotFound(item.id.clone()))
        }
    }

    async fn commit_acceptance(
        &mut self,
        item: &StatementItem,
        movement_id: &str,
        at: NaiveDateTime,
        by: &str,
    ) -> ReconcileResult<()> {
        let mut movements = self.movements.write().unwrap();
        let mut items = self.items.write().unwrap();
        // Both lookups happen before either map is touched, so a failed
        // acceptance leaves item and movement exactly as they were.
        if !items.contains_key(&item.id) {
            return Err(ReconcileError::ItemNotFound(item.id.clone()));
        }
        let movement = movements
            .get_mut(movement_id)
            .ok_or_else(|| ReconcileError::MovementNotFound(movement_id.to_string()))?;
        movement.reconciled = true;
        movement.reconciled_at = Some(at);
        movement.reconciled_by = Some(by.to_string());
        items.insert(item.id.clone(), item.clone());
        Ok(())
    }
}

/// In-memory audit sink recording events for inspection
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    events: Arc<RwLock<Vec<AuditEvent>>>,
}

impl MemoryAuditSink {
    /// Create a new empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: AuditEvent) -> ReconcileResult<()> {
        self.events.write().unwrap().push(event);
        Ok(())
    }
}
