//! Reconciliation orchestrator and the statement item state machine
//!
//! Coordinates parsing, matching and persistence for statement imports and
//! drives the accept/reject/ignore workflow that keeps the ledger's
//! reconciliation flag consistent with item state.

use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::matching::MatchingEngine;
use crate::parser::parser_for;
use crate::traits::*;
use crate::types::*;

/// Orchestrator for statement imports and the reconciliation workflow
///
/// Operations are synchronous and request-scoped: every failure surfaces
/// immediately to the caller and nothing is retried. Import failures abort
/// before any persistence, so a partial batch is never written.
pub struct Reconciler<M, S, A>
where
    M: MovementStore,
    S: StatementItemStore,
    A: AuditSink,
{
    engine: MatchingEngine<M>,
    items: S,
    audit: A,
}

impl<M, S, A> Reconciler<M, S, A>
where
    M: MovementStore,
    S: StatementItemStore,
    A: AuditSink,
{
    /// Create a new reconciler over the given stores and audit collaborator
    ///
    /// `items` must write to the same backend as `movements`: accepting a
    /// suggestion persists the item and the movement flag in one unit of
    /// work through [`StatementItemStore::commit_acceptance`].
    pub fn new(movements: M, items: S, audit: A) -> Self {
        Self {
            engine: MatchingEngine::new(movements),
            items,
            audit,
        }
    }

    /// Import a statement file: parse, match each transaction, persist the
    /// batch and emit one summarizing audit event
    ///
    /// Items are created `Suggested` (with the proposed movement and score)
    /// when the matching engine finds a qualifying candidate, `Pending`
    /// otherwise, in the same order as the parsed transactions. A movement is
    /// not reserved once suggested: two transactions in the same batch may
    /// end up suggesting the same movement.
    pub async fn import_batch(
        &mut self,
        account_id: &str,
        company_id: Option<&str>,
        format: SourceFormat,
        file_bytes: &[u8],
        file_name: &str,
        actor: &Actor,
    ) -> ReconcileResult<ImportSummary> {
        let parser = parser_for(format);
        let transactions = parser.parse(file_bytes)?;
        if transactions.is_empty() {
            return Err(ReconcileError::Validation(
                "statement file contains no transactions".to_string(),
            ));
        }

        let now = Utc::now().naive_utc();
        let mut items = Vec::with_capacity(transactions.len());
        let mut with_suggestion = 0usize;

        for transaction in &transactions {
            let suggestion = self.engine.suggest(transaction, account_id).await?;
            let (status, suggested_movement_id, match_score) = match suggestion {
                Some(s) => {
                    with_suggestion += 1;
                    (ItemStatus::Suggested, Some(s.movement_id), Some(s.score))
                }
                None => (ItemStatus::Pending, None, None),
            };

            items.push(StatementItem {
                id: Uuid::new_v4().to_string(),
                account_id: account_id.to_string(),
                company_id: company_id.map(|c| c.to_string()),
                transaction_date: transaction.date,
                description: transaction.description.clone(),
                document_ref: transaction.document_ref.clone(),
                amount: transaction.amount.clone(),
                direction: transaction.direction,
                status,
                suggested_movement_id,
                reconciled_movement_id: None,
                match_score,
                source_format: format,
                source_file_name: file_name.to_string(),
                imported_by: actor.id.clone(),
                created_at: now,
                updated_at: now,
                deleted_at: None,
            });
        }

        self.items.create_batch(&items).await?;

        let total = items.len();
        let without_suggestion = total - with_suggestion;
        info!(
            account_id,
            file_name, total, with_suggestion, without_suggestion, "statement batch imported"
        );

        self.audit
            .record(AuditEvent {
                timestamp: now,
                event_type: "statement_import".to_string(),
                severity: AuditSeverity::Info,
                actor_id: actor.id.clone(),
                actor_email: actor.email.clone(),
                resource: format!("bank_account:{}", account_id),
                action: "import_batch".to_string(),
                success: true,
                details: json!({
                    "file_name": file_name,
                    "format": format.as_str(),
                    "total": total,
                    "with_suggestion": with_suggestion,
                    "without_suggestion": without_suggestion,
                }),
            })
            .await?;

        Ok(ImportSummary {
            total,
            with_suggestion,
            without_suggestion,
            items,
        })
    }

    /// Accept the suggested match: reconcile the movement and the item
    ///
    /// Both writes go through one store commit, so a failure leaves the item
    /// and its movement unchanged.
    pub async fn accept_suggestion(
        &mut self,
        item_id: &str,
        actor: &Actor,
    ) -> ReconcileResult<StatementItem> {
        let mut item = self.get_item_required(item_id).await?;

        let movement_id = item.suggested_movement_id.clone().ok_or_else(|| {
            ReconcileError::InvalidState("item has no reconciliation suggestion".to_string())
        })?;
        if item.status == ItemStatus::Reconciled {
            return Err(ReconcileError::InvalidState(
                "item already reconciled".to_string(),
            ));
        }

        let now = Utc::now().naive_utc();
        item.status = ItemStatus::Reconciled;
        item.reconciled_movement_id = Some(movement_id.clone());
        item.updated_at = now;
        self.items
            .commit_acceptance(&item, &movement_id, now, &actor.id)
            .await?;

        self.record_workflow_event(&item, actor, "accept_suggestion", json!({
            "movement_id": movement_id,
            "match_score": item.match_score,
        }))
        .await?;

        Ok(item)
    }

    /// Discard the suggested match and return the item to `Pending`
    pub async fn reject_suggestion(
        &mut self,
        item_id: &str,
        actor: &Actor,
    ) -> ReconcileResult<StatementItem> {
        let mut item = self.get_item_required(item_id).await?;

        let rejected_movement_id = item.suggested_movement_id.take();
        item.match_score = None;
        item.status = ItemStatus::Pending;
        item.updated_at = Utc::now().naive_utc();
        self.items.update_item(&item).await?;

        self.record_workflow_event(&item, actor, "reject_suggestion", json!({
            "rejected_movement_id": rejected_movement_id,
        }))
        .await?;

        Ok(item)
    }

    /// Exclude the item from the workflow without deleting it
    pub async fn ignore_item(
        &mut self,
        item_id: &str,
        actor: &Actor,
    ) -> ReconcileResult<StatementItem> {
        let mut item = self.get_item_required(item_id).await?;

        item.status = ItemStatus::Ignored;
        item.updated_at = Utc::now().naive_utc();
        self.items.update_item(&item).await?;

        self.record_workflow_event(&item, actor, "ignore_item", json!({}))
            .await?;

        Ok(item)
    }

    async fn get_item_required(&self, item_id: &str) -> ReconcileResult<StatementItem> {
        self.items
            .get_item(item_id)
            .await?
            .ok_or_else(|| ReconcileError::ItemNotFound(item_id.to_string()))
    }

    async fn record_workflow_event(
        &self,
        item: &StatementItem,
        actor: &Actor,
        action: &str,
        details: serde_json::Value,
    ) -> ReconcileResult<()> {
        self.audit
            .record(AuditEvent {
                timestamp: item.updated_at,
                event_type: "statement_reconciliation".to_string(),
                severity: AuditSeverity::Info,
                actor_id: actor.id.clone(),
                actor_email: actor.email.clone(),
                resource: format!("statement_item:{}", item.id),
                action: action.to_string(),
                success: true,
                details,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::{
        MemoryAuditSink, MemoryMovementStore, MemoryStatementItemStore,
    };
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use std::str::FromStr;

    type TestReconciler = Reconciler<MemoryMovementStore, MemoryStatementItemStore, MemoryAuditSink>;

    fn reconciler() -> (TestReconciler, MemoryMovementStore, MemoryStatementItemStore, MemoryAuditSink)
    {
        let movements = MemoryMovementStore::new();
        let items = MemoryStatementItemStore::linked(&movements);
        let audit = MemoryAuditSink::new();
        let reconciler = Reconciler::new(movements.clone(), items.clone(), audit.clone());
        (reconciler, movements, items, audit)
    }

    fn actor() -> Actor {
        Actor::new("user-1", "ops@example.com")
    }

    fn movement(id: &str, date: NaiveDate, amount: &str, description: &str, label: &str) -> LedgerMovement {
        LedgerMovement {
            id: id.to_string(),
            account_id: "acc1".to_string(),
            date,
            description: description.to_string(),
            amount: BigDecimal::from_str(amount).unwrap(),
            direction_label: label.to_string(),
            reconciled: false,
            reconciled_at: None,
            reconciled_by: None,
            deleted_at: None,
        }
    }

    const CSV: &str = "Data;Histórico;Valor\n\
                       15/01/2025;PAGAMENTO FORNECEDOR;-1.500,00\n\
                       16/01/2025;TARIFA BANCARIA;-35,90\n";

    #[tokio::test]
    async fn test_import_creates_suggested_and_pending_items() {
        let (mut reconciler, mut movements, _, audit) = reconciler();
        movements.insert(movement(
            "m1",
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            "1500.00",
            "PAGAMENTO FORNECEDOR",
            "Débito",
        ));

        let summary = reconciler
            .import_batch("acc1", None, SourceFormat::Csv, CSV.as_bytes(), "jan.csv", &actor())
            .await
            .unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.with_suggestion, 1);
        assert_eq!(summary.without_suggestion, 1);

        assert_eq!(summary.items[0].status, ItemStatus::Suggested);
        assert_eq!(summary.items[0].suggested_movement_id.as_deref(), Some("m1"));
        assert_eq!(summary.items[0].match_score, Some(100));
        assert_eq!(summary.items[1].status, ItemStatus::Pending);
        assert_eq!(summary.items[1].match_score, None);

        let events = audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "import_batch");
        assert_eq!(events[0].details["total"], 2);
    }

    #[tokio::test]
    async fn test_import_with_missing_columns_persists_nothing() {
        let (mut reconciler, _, items, audit) = reconciler();

        let result = reconciler
            .import_batch(
                "acc1",
                None,
                SourceFormat::Csv,
                b"Data;Historico\n15/01/2025;X\n",
                "bad.csv",
                &actor(),
            )
            .await;

        assert!(matches!(result, Err(ReconcileError::Validation(_))));
        assert_eq!(items.len(), 0);
        assert!(audit.events().is_empty());
    }

    #[tokio::test]
    async fn test_import_header_only_file_fails_with_no_transactions() {
        let (mut reconciler, _, items, _) = reconciler();

        let result = reconciler
            .import_batch(
                "acc1",
                None,
                SourceFormat::Csv,
                b"Data;Historico;Valor\n",
                "empty.csv",
                &actor(),
            )
            .await;

        match result {
            Err(ReconcileError::Validation(message)) => {
                assert_eq!(message, "statement file contains no transactions")
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(items.len(), 0);
    }

    #[tokio::test]
    async fn test_accept_reconciles_item_and_movement() {
        let (mut reconciler, mut movements, _, audit) = reconciler();
        movements.insert(movement(
            "m1",
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            "1500.00",
            "PAGAMENTO FORNECEDOR",
            "Débito",
        ));

        let summary = reconciler
            .import_batch("acc1", None, SourceFormat::Csv, CSV.as_bytes(), "jan.csv", &actor())
            .await
            .unwrap();
        let item_id = summary.items[0].id.clone();

        let item = reconciler.accept_suggestion(&item_id, &actor()).await.unwrap();
        assert_eq!(item.status, ItemStatus::Reconciled);
        assert_eq!(item.reconciled_movement_id.as_deref(), Some("m1"));

        let reconciled = movements.get("m1").unwrap();
        assert!(reconciled.reconciled);
        assert_eq!(reconciled.reconciled_by.as_deref(), Some("user-1"));
        assert!(reconciled.reconciled_at.is_some());

        let events = audit.events();
        assert_eq!(events.last().unwrap().action, "accept_suggestion");
    }

    #[tokio::test]
    async fn test_accept_without_suggestion_fails() {
        let (mut reconciler, _, _, _) = reconciler();

        let summary = reconciler
            .import_batch("acc1", None, SourceFormat::Csv, CSV.as_bytes(), "jan.csv", &actor())
            .await
            .unwrap();
        let pending_id = summary.items[0].id.clone();

        match reconciler.accept_suggestion(&pending_id, &actor()).await {
            Err(ReconcileError::InvalidState(message)) => {
                assert_eq!(message, "item has no reconciliation suggestion")
            }
            other => panic!("expected invalid state error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_double_accept_fails_as_already_reconciled() {
        let (mut reconciler, mut movements, _, _) = reconciler();
        movements.insert(movement(
            "m1",
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            "1500.00",
            "PAGAMENTO FORNECEDOR",
            "Débito",
        ));

        let summary = reconciler
            .import_batch("acc1", None, SourceFormat::Csv, CSV.as_bytes(), "jan.csv", &actor())
            .await
            .unwrap();
        let item_id = summary.items[0].id.clone();

        reconciler.accept_suggestion(&item_id, &actor()).await.unwrap();
        match reconciler.accept_suggestion(&item_id, &actor()).await {
            Err(ReconcileError::InvalidState(message)) => {
                assert_eq!(message, "item already reconciled")
            }
            other => panic!("expected invalid state error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reject_returns_item_to_pending() {
        let (mut reconciler, mut movements, _, _) = reconciler();
        movements.insert(movement(
            "m1",
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            "1500.00",
            "PAGAMENTO FORNECEDOR",
            "Débito",
        ));

        let summary = reconciler
            .import_batch("acc1", None, SourceFormat::Csv, CSV.as_bytes(), "jan.csv", &actor())
            .await
            .unwrap();
        let item_id = summary.items[0].id.clone();

        let item = reconciler.reject_suggestion(&item_id, &actor()).await.unwrap();
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.suggested_movement_id, None);
        assert_eq!(item.match_score, None);

        // The movement is untouched and can be suggested again later.
        assert!(!movements.get("m1").unwrap().reconciled);
    }

    #[tokio::test]
    async fn test_ignore_is_unconditional() {
        let (mut reconciler, _, _, _) = reconciler();

        let summary = reconciler
            .import_batch("acc1", None, SourceFormat::Csv, CSV.as_bytes(), "jan.csv", &actor())
            .await
            .unwrap();
        let item_id = summary.items[1].id.clone();

        let item = reconciler.ignore_item(&item_id, &actor()).await.unwrap();
        assert_eq!(item.status, ItemStatus::Ignored);
    }

    #[tokio::test]
    async fn test_unknown_item_id_is_not_found() {
        let (mut reconciler, _, _, _) = reconciler();
        let result = reconciler.accept_suggestion("missing", &actor()).await;
        assert!(matches!(result, Err(ReconcileError::ItemNotFound(_))));
    }

    /// Item store whose acceptance commit always fails, standing in for a
    /// backend that loses the transaction mid-operation.
    #[derive(Clone)]
    struct BrokenCommitStore {
        inner: MemoryStatementItemStore,
    }

    #[async_trait::async_trait]
    impl StatementItemStore for BrokenCommitStore {
        async fn create_batch(&mut self, items: &[StatementItem]) -> ReconcileResult<()> {
            self.inner.create_batch(items).await
        }

        async fn get_item(&self, item_id: &str) -> ReconcileResult<Option<StatementItem>> {
            self.inner.get_item(item_id).await
        }

        async fn update_item(&mut self, item: &StatementItem) -> ReconcileResult<()> {
            self.inner.update_item(item).await
        }

        async fn commit_acceptance(
            &mut self,
            _item: &StatementItem,
            _movement_id: &str,
            _at: chrono::NaiveDateTime,
            _by: &str,
        ) -> ReconcileResult<()> {
            Err(ReconcileError::Storage("connection lost".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_accept_leaves_item_and_movement_unchanged() {
        let mut movements = MemoryMovementStore::new();
        movements.insert(movement(
            "m1",
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            "1500.00",
            "PAGAMENTO FORNECEDOR",
            "Débito",
        ));
        let items = BrokenCommitStore {
            inner: MemoryStatementItemStore::linked(&movements),
        };
        let mut reconciler =
            Reconciler::new(movements.clone(), items.clone(), MemoryAuditSink::new());

        let summary = reconciler
            .import_batch("acc1", None, SourceFormat::Csv, CSV.as_bytes(), "jan.csv", &actor())
            .await
            .unwrap();
        let item_id = summary.items[0].id.clone();
        assert_eq!(summary.items[0].status, ItemStatus::Suggested);

        let result = reconciler.accept_suggestion(&item_id, &actor()).await;
        assert!(matches!(result, Err(ReconcileError::Storage(_))));

        // Neither side of the acceptance was persisted.
        assert!(!movements.get("m1").unwrap().reconciled);
        let item = items.inner.get_item(&item_id).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Suggested);
        assert_eq!(item.suggested_movement_id.as_deref(), Some("m1"));
        assert_eq!(item.reconciled_movement_id, None);
    }
}
