//! Bank statement parsers turning raw file bytes into normalized transactions

pub mod csv;
pub mod ofx;

use crate::types::{RawTransaction, ReconcileResult, SourceFormat};

pub use self::csv::CsvParser;
pub use self::ofx::OfxParser;

/// A parser for one statement file format
///
/// Parsing is eager: files are capped at 5MB by the upload surface, so the
/// whole sequence is materialized at once. Rows with unusable data are
/// recovered (skipped with a warning); structural problems fail the whole
/// parse.
pub trait StatementParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> ReconcileResult<Vec<RawTransaction>>;
}

/// Select the parser for a statement format
pub fn parser_for(format: SourceFormat) -> Box<dyn StatementParser> {
    match format {
        SourceFormat::Ofx => Box::new(OfxParser::new()),
        SourceFormat::Csv => Box::new(CsvParser::new()),
    }
}

/// Decode statement bytes as text, dropping a leading byte-order mark
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
}
