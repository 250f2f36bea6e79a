//! # Reconciliation Core
//!
//! Bank statement reconciliation for a financial back office: ingesting
//! heterogeneous statement files, matching imported transactions against
//! ledger movements, and driving each item through an accept/reject/ignore
//! workflow.
//!
//! ## Features
//!
//! - **Statement parsing**: OFX (SGML/XML hybrid) and CSV with delimiter,
//!   header and numeric-convention detection for real-world bank exports
//! - **Automatic matching**: weighted date/amount/description scoring under a
//!   direction-compatibility gate, at most one suggestion per transaction
//! - **Reconciliation workflow**: pending → suggested → reconciled/ignored,
//!   keeping the ledger's reconciliation flag consistent
//! - **Storage abstraction**: database-agnostic design with trait-based
//!   stores and an audit collaborator
//!
//! ## Quick Start
//!
//! ```rust
//! use reconciliation_core::{
//!     Actor, Reconciler, SourceFormat,
//!     utils::{MemoryAuditSink, MemoryMovementStore, MemoryStatementItemStore},
//! };
//!
//! # async fn example() -> reconciliation_core::ReconcileResult<()> {
//! let movements = MemoryMovementStore::new();
//! let items = MemoryStatementItemStore::linked(&movements);
//! let audit = MemoryAuditSink::new();
//! let mut reconciler = Reconciler::new(movements, items, audit);
//!
//! let csv = b"Data;Historico;Valor\n15/01/2025;PAGAMENTO FORNECEDOR;-1.500,00\n";
//! let actor = Actor::new("user-1", "ops@example.com");
//! let summary = reconciler
//!     .import_batch("acc1", None, SourceFormat::Csv, csv, "jan.csv", &actor)
//!     .await?;
//! assert_eq!(summary.total, 1);
//! # Ok(())
//! # }
//! ```

pub mod matching;
pub mod parser;
pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use matching::{MatchCandidate, MatchingEngine};
pub use parser::{CsvParser, OfxParser, StatementParser};
pub use reconciliation::Reconciler;
pub use traits::*;
pub use types::*;
