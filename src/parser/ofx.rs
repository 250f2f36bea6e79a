//! OFX bank statement parser
//!
//! OFX files are an SGML/XML hybrid: tags are often unclosed and banks
//! deviate from the standard freely, so extraction is regex-driven rather
//! than a full document parse. Only the pragmatic subset needed for
//! real-world exports is handled.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use regex::Regex;
use std::str::FromStr;
use tracing::warn;

use crate::parser::{decode_text, StatementParser};
use crate::types::{Direction, RawTransaction, ReconcileError, ReconcileResult};

/// Description used when a transaction carries neither MEMO nor NAME
pub const FALLBACK_DESCRIPTION: &str = "Sem descrição";

/// Parser for OFX statement files
pub struct OfxParser;

/// Regexes for the per-transaction fields, compiled once per parse call
struct FieldRegexes {
    dtposted: Regex,
    trnamt: Regex,
    memo: Regex,
    name: Regex,
    checknum: Regex,
    refnum: Regex,
    fitid: Regex,
}

impl FieldRegexes {
    fn compile() -> ReconcileResult<Self> {
        Ok(Self {
            dtposted: tag_regex("DTPOSTED")?,
            trnamt: tag_regex("TRNAMT")?,
            memo: tag_regex("MEMO")?,
            name: tag_regex("NAME")?,
            checknum: tag_regex("CHECKNUM")?,
            refnum: tag_regex("REFNUM")?,
            fitid: tag_regex("FITID")?,
        })
    }
}

/// A tag value runs to the next '<' or end of line; SGML-style OFX rarely
/// closes value tags
fn tag_regex(tag: &str) -> ReconcileResult<Regex> {
    Regex::new(&format!(r"(?i)<{}>\s*([^<\r\n]+)", tag))
        .map_err(|e| ReconcileError::Parse(format!("invalid OFX field pattern: {}", e)))
}

fn field<'t>(re: &Regex, chunk: &'t str) -> Option<&'t str> {
    re.captures(chunk)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|v| !v.is_empty())
}

impl OfxParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_transaction(
        &self,
        fields: &FieldRegexes,
        index: usize,
        chunk: &str,
    ) -> Option<RawTransaction> {
        let date = match field(&fields.dtposted, chunk).and_then(parse_ofx_date) {
            Some(d) => d,
            None => {
                warn!(transaction = index, "skipping OFX transaction without a usable date");
                return None;
            }
        };

        let amount = match field(&fields.trnamt, chunk).and_then(parse_ofx_amount) {
            Some(a) => a,
            None => {
                warn!(transaction = index, "skipping OFX transaction without a usable amount");
                return None;
            }
        };

        let direction = if amount < BigDecimal::from(0) {
            Direction::Debit
        } else {
            Direction::Credit
        };

        let description = field(&fields.memo, chunk)
            .or_else(|| field(&fields.name, chunk))
            .unwrap_or(FALLBACK_DESCRIPTION)
            .to_string();

        let document_ref = field(&fields.checknum, chunk)
            .or_else(|| field(&fields.refnum, chunk))
            .or_else(|| field(&fields.fitid, chunk))
            .map(|v| v.to_string());

        Some(RawTransaction {
            date,
            description,
            document_ref,
            amount: amount.abs(),
            direction,
        })
    }
}

impl Default for OfxParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser for OfxParser {
    fn parse(&self, bytes: &[u8]) -> ReconcileResult<Vec<RawTransaction>> {
        let text = decode_text(bytes);

        let banktranlist = Regex::new(r"(?i)<BANKTRANLIST>")
            .map_err(|e| ReconcileError::Parse(format!("invalid OFX pattern: {}", e)))?;
        if !banktranlist.is_match(&text) {
            return Err(ReconcileError::Parse(
                "OFX file does not contain a bank transaction list (BANKTRANLIST)".to_string(),
            ));
        }

        let stmttrn = Regex::new(r"(?i)<STMTTRN>")
            .map_err(|e| ReconcileError::Parse(format!("invalid OFX pattern: {}", e)))?;
        let fields = FieldRegexes::compile()?;

        let mut transactions = Vec::new();
        // Everything before the first <STMTTRN> is header material.
        for (index, chunk) in stmttrn.split(&text).skip(1).enumerate() {
            let chunk = truncate_at_close(chunk);
            if let Some(transaction) = self.parse_transaction(&fields, index, chunk) {
                transactions.push(transaction);
            }
        }

        Ok(transactions)
    }
}

/// Cut a transaction chunk at its closing tag when the bank emits one
fn truncate_at_close(chunk: &str) -> &str {
    match chunk.to_ascii_lowercase().find("</stmttrn>") {
        Some(pos) => &chunk[..pos],
        None => chunk,
    }
}

/// Parse an OFX posted date: 8-14 digits, `YYYYMMDD[HHMMSS...]`
///
/// Only the first 8 digits are used; trailing time and timezone markers are
/// discarded.
fn parse_ofx_date(value: &str) -> Option<NaiveDate> {
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() < 8 {
        return None;
    }
    NaiveDate::parse_from_str(&digits[..8], "%Y%m%d").ok()
}

/// Parse a signed OFX amount, tolerating a comma decimal separator
fn parse_ofx_amount(value: &str) -> Option<BigDecimal> {
    let cleaned = if value.contains(',') && !value.contains('.') {
        value.replace(',', ".")
    } else {
        value.to_string()
    };
    BigDecimal::from_str(cleaned.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"OFXHEADER:100
DATA:OFXSGML

<OFX>
<BANKMSGSRSV1>
<STMTTRNRS>
<STMTRS>
<BANKTRANLIST>
<DTSTART>20250101
<DTEND>20250131
<STMTTRN>
<TRNTYPE>DEBIT
<DTPOSTED>20250115120000[-3:BRT]
<TRNAMT>-1500.00
<FITID>2025011501
<CHECKNUM>000123
<MEMO>PAGAMENTO FORNECEDOR
</STMTTRN>
<STMTTRN>
<TRNTYPE>CREDIT
<DTPOSTED>20250116
<TRNAMT>250.75
<FITID>2025011601
<NAME>DEPOSITO CLIENTE
</STMTTRN>
</BANKTRANLIST>
<LEDGERBAL>
<BALAMT>999.99
<DTASOF>20250131
</LEDGERBAL>
</STMTRS>
</STMTTRNRS>
</BANKMSGSRSV1>
</OFX>
"#;

    #[test]
    fn test_parse_basic_statement() {
        let txns = OfxParser::new().parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(txns.len(), 2);

        assert_eq!(txns[0].date, NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
        assert_eq!(txns[0].amount, BigDecimal::from_str("1500.00").unwrap());
        assert_eq!(txns[0].direction, Direction::Debit);
        assert_eq!(txns[0].description, "PAGAMENTO FORNECEDOR");
        assert_eq!(txns[0].document_ref.as_deref(), Some("000123"));

        assert_eq!(txns[1].direction, Direction::Credit);
        assert_eq!(txns[1].description, "DEPOSITO CLIENTE");
        // No CHECKNUM or REFNUM: falls back to the file id
        assert_eq!(txns[1].document_ref.as_deref(), Some("2025011601"));
    }

    #[test]
    fn test_missing_banktranlist_is_fatal() {
        let result = OfxParser::new().parse(b"<OFX><SIGNONMSGSRSV1></SIGNONMSGSRSV1></OFX>");
        assert!(matches!(result, Err(ReconcileError::Parse(_))));
    }

    #[test]
    fn test_rows_without_date_or_amount_are_skipped() {
        let ofx = r#"<OFX>
<BANKTRANLIST>
<STMTTRN>
<DTPOSTED>bogus
<TRNAMT>-10.00
</STMTTRN>
<STMTTRN>
<DTPOSTED>20250110
<TRNAMT>not-a-number
</STMTTRN>
<STMTTRN>
<DTPOSTED>20250111
<TRNAMT>-10.00
<MEMO>OK
</STMTTRN>
</BANKTRANLIST>
</OFX>"#;
        let txns = OfxParser::new().parse(ofx.as_bytes()).unwrap();
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].description, "OK");
    }

    #[test]
    fn test_description_falls_back_to_placeholder() {
        let ofx = r#"<OFX>
<BANKTRANLIST>
<STMTTRN>
<DTPOSTED>20250111
<TRNAMT>33.10
<FITID>abc
</STMTTRN>
</BANKTRANLIST>
</OFX>"#;
        let txns = OfxParser::new().parse(ofx.as_bytes()).unwrap();
        assert_eq!(txns[0].description, FALLBACK_DESCRIPTION);
        assert_eq!(txns[0].document_ref.as_deref(), Some("abc"));
    }

    #[test]
    fn test_comma_decimal_amount() {
        let ofx = r#"<OFX>
<BANKTRANLIST>
<STMTTRN>
<DTPOSTED>20250111
<TRNAMT>-123,45
</STMTTRN>
</BANKTRANLIST>
</OFX>"#;
        let txns = OfxParser::new().parse(ofx.as_bytes()).unwrap();
        assert_eq!(txns[0].amount, BigDecimal::from_str("123.45").unwrap());
        assert_eq!(txns[0].direction, Direction::Debit);
    }

    #[test]
    fn test_zero_amount_is_credit() {
        let ofx = r#"<OFX>
<BANKTRANLIST>
<STMTTRN>
<DTPOSTED>20250111
<TRNAMT>0.00
</STMTTRN>
</BANKTRANLIST>
</OFX>"#;
        let txns = OfxParser::new().parse(ofx.as_bytes()).unwrap();
        assert_eq!(txns[0].direction, Direction::Credit);
    }
}
