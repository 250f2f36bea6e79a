//! CSV bank statement parser
//!
//! Bank CSV exports are wildly inconsistent: delimiter, header naming,
//! date layout and numeric convention all vary per bank. The parser detects
//! the delimiter, maps headers by synonym, and tries the date/amount formats
//! seen in real Brazilian and American exports. Rows that still fail are
//! skipped with a warning; only structural problems fail the whole parse.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::str::FromStr;
use tracing::warn;

use crate::matching::text::fold_diacritics;
use crate::parser::{decode_text, StatementParser};
use crate::types::{Direction, RawTransaction, ReconcileError, ReconcileResult};

/// Date layouts tried in order for each row
const DATE_FORMATS: [&str; 4] = ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y", "%Y%m%d"];

/// Resolved positions of the semantic columns
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnMap {
    date: usize,
    description: usize,
    amount: usize,
    kind: Option<usize>,
    document: Option<usize>,
}

/// Parser for CSV statement files
pub struct CsvParser;

impl CsvParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser for CsvParser {
    fn parse(&self, bytes: &[u8]) -> ReconcileResult<Vec<RawTransaction>> {
        let text = decode_text(bytes);

        // Common mis-save from rich-text editors: an RTF document with a
        // .csv extension.
        if text.trim_start().starts_with("{\\rtf") {
            return Err(ReconcileError::Validation(
                "file is an RTF document, not a CSV; re-export the statement as plain CSV"
                    .to_string(),
            ));
        }

        let delimiter = detect_delimiter(&text);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| ReconcileError::Parse(format!("unreadable CSV header: {}", e)))?
            .clone();
        let columns = map_columns(&headers)?;

        let mut transactions = Vec::new();
        let mut rows_seen = 0usize;

        for (index, record) in reader.records().enumerate() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    warn!(row = index + 1, error = %e, "skipping malformed CSV row");
                    rows_seen += 1;
                    continue;
                }
            };
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            rows_seen += 1;

            match parse_row(&columns, &record) {
                Some(transaction) => transactions.push(transaction),
                None => warn!(row = index + 1, "skipping CSV row without a usable date or amount"),
            }
        }

        if rows_seen > 0 && transactions.is_empty() {
            return Err(ReconcileError::Parse(
                "no valid transactions found".to_string(),
            ));
        }

        Ok(transactions)
    }
}

/// Pick the most frequent of `,` `;` and tab in the first line, defaulting to `,`
fn detect_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or("");
    let mut delimiter = b',';
    let mut best = 0;
    for candidate in [b',', b';', b'\t'] {
        let count = first_line.matches(candidate as char).count();
        if count > best {
            best = count;
            delimiter = candidate;
        }
    }
    delimiter
}

/// Map header names to semantic columns via case/accent-insensitive synonyms
fn map_columns(headers: &csv::StringRecord) -> ReconcileResult<ColumnMap> {
    let normalized: Vec<String> = headers
        .iter()
        .map(|h| fold_diacritics(&h.to_lowercase()))
        .collect();

    let find = |matcher: &dyn Fn(&str) -> bool| normalized.iter().position(|h| matcher(h));

    let date = find(&|h| h.contains("data") || h.contains("date") || h.contains("dt"));
    let description = find(&|h| {
        h.contains("descri") || h.contains("historico") || h.contains("memo") || h.contains("name")
    });
    let amount = find(&|h| h.contains("valor") || h.contains("amount") || h.contains("vl") || h == "value");
    let kind = find(&|h| h.contains("tipo") || h.contains("type") || h.contains("natureza") || h == "d/c");
    let document = find(&|h| {
        h.contains("documento") || h.contains("doc") || h.contains("numero") || h.contains("ref")
    });

    match (date, description, amount) {
        (Some(date), Some(description), Some(amount)) => Ok(ColumnMap {
            date,
            description,
            amount,
            kind,
            document,
        }),
        _ => {
            let mut missing = Vec::new();
            if date.is_none() {
                missing.push("date");
            }
            if description.is_none() {
                missing.push("description");
            }
            if amount.is_none() {
                missing.push("amount");
            }
            Err(ReconcileError::Validation(format!(
                "required columns not found: {}",
                missing.join(", ")
            )))
        }
    }
}

fn parse_row(columns: &ColumnMap, record: &csv::StringRecord) -> Option<RawTransaction> {
    let date = record.get(columns.date).and_then(parse_date)?;
    let signed_amount = record.get(columns.amount).and_then(parse_amount)?;
    if signed_amount == BigDecimal::from(0) {
        return None;
    }

    let direction = columns
        .kind
        .and_then(|i| record.get(i))
        .and_then(classify_direction)
        .unwrap_or(if signed_amount < BigDecimal::from(0) {
            Direction::Debit
        } else {
            Direction::Credit
        });

    let description = record
        .get(columns.description)
        .unwrap_or("")
        .trim()
        .to_string();

    let document_ref = columns
        .document
        .and_then(|i| record.get(i))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string());

    Some(RawTransaction {
        date,
        description,
        document_ref,
        amount: signed_amount.abs(),
        direction,
    })
}

/// Try each supported date layout in order
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// Parse a monetary value in Brazilian (`1.234,56`) or American (`1,234.56`)
/// convention
///
/// Currency symbols and other non-numeric characters are stripped first; the
/// convention is decided by whichever of the last comma and last dot comes
/// later in the string.
pub fn parse_amount(value: &str) -> Option<BigDecimal> {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');
    let plain = match (last_comma, last_dot) {
        // Comma after dot: Brazilian decimal comma with dot thousands
        (Some(comma), Some(dot)) if comma > dot => {
            cleaned.replace('.', "").replace(',', ".")
        }
        // Comma alone: decimal comma
        (Some(_), None) => cleaned.replace(',', "."),
        // Dot is the decimal separator; commas are thousands
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, _) => cleaned,
    };

    BigDecimal::from_str(&plain).ok()
}

/// Classify a type-column value into a direction by localized keywords
fn classify_direction(value: &str) -> Option<Direction> {
    let v = fold_diacritics(&value.to_lowercase());
    let v = v.trim();
    if v.is_empty() {
        return None;
    }
    if v == "d" || v.contains("deb") || v.contains("sai") {
        Some(Direction::Debit)
    } else if v == "c" || v.contains("cred") || v.contains("entrada") {
        Some(Direction::Credit)
    } else {
        None
    }
}
