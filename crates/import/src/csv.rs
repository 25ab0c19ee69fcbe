use std::collections::HashMap;
use std::str::FromStr;

use amie_core::{Money, Transaction, TransactionType};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DETAILS: &str = "Details";
const POSTING_DATE: &str = "Posting Date";
const DESCRIPTION: &str = "Description";
const AMOUNT: &str = "Amount";
const TYPE: &str = "Type";
const BALANCE: &str = "Balance";
const CHECK_NUMBER: &str = "Check or Slip #";

const REQUIRED_COLUMNS: [&str; 6] = [DETAILS, POSTING_DATE, DESCRIPTION, AMOUNT, TYPE, BALANCE];

/// The statement as a whole cannot be read; nothing is imported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("CSV file is empty or has no data rows")]
    Empty,
    #[error("Invalid statement format, missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("Unterminated quoted field on line {line}")]
    UnterminatedQuote { line: usize },
}

/// A single data row could not be read; the row is skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowError {
    #[error("Unterminated quoted field")]
    UnterminatedQuote,
    #[error("Malformed CSV record: {0}")]
    Csv(String),
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("Invalid amount: '{0}'")]
    InvalidAmount(String),
    #[error("Invalid date: '{0}'")]
    InvalidDate(String),
}

/// A data row that was skipped, kept so the import can report it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRow {
    /// 1-based line number in the source text; the header is line 1.
    pub line: usize,
    pub content: String,
    pub error: RowError,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedStatement {
    pub transactions: Vec<Transaction>,
    pub rejected: Vec<RejectedRow>,
}

/// Column name to position, resolved once from the header row.
struct ColumnMap {
    exact: HashMap<String, usize>,
    header: Vec<String>,
}

impl ColumnMap {
    fn from_header(header: Vec<String>) -> Result<Self, FormatError> {
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| {
                let needle = name.to_lowercase();
                !header.iter().any(|col| col.to_lowercase().contains(&needle))
            })
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(FormatError::MissingColumns(missing));
        }

        let exact = header
            .iter()
            .enumerate()
            .map(|(idx, col)| (col.trim().to_string(), idx))
            .collect();
        Ok(ColumnMap { exact, header })
    }

    fn index(&self, name: &str) -> Option<usize> {
        if let Some(&idx) = self.exact.get(name) {
            return Some(idx);
        }
        let needle = name.to_lowercase();
        self.header
            .iter()
            .position(|col| col.to_lowercase().contains(&needle))
    }
}

/// Parses a bank statement export. Malformed rows are skipped and reported in
/// [`ParsedStatement::rejected`]; only an unreadable file is an error.
pub fn parse_statement(text: &str) -> Result<ParsedStatement, FormatError> {
    parse_statement_at(text, Utc::now())
}

pub fn parse_statement_at(
    text: &str,
    imported_at: DateTime<Utc>,
) -> Result<ParsedStatement, FormatError> {
    let text = text.trim_start_matches('\u{feff}').trim();
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < 2 {
        return Err(FormatError::Empty);
    }

    let header = tokenize(lines[0]).map_err(|e| match e {
        RowError::UnterminatedQuote => FormatError::UnterminatedQuote { line: 1 },
        _ => FormatError::MissingColumns(REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect()),
    })?;
    let columns = ColumnMap::from_header(header)?;

    let mut parsed = ParsedStatement::default();
    for (idx, line) in lines.iter().enumerate().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_row(line, &columns, imported_at) {
            Ok(tx) => parsed.transactions.push(tx),
            Err(error) => {
                tracing::warn!(line = idx + 1, %error, "Skipping malformed statement row");
                parsed.rejected.push(RejectedRow {
                    line: idx + 1,
                    content: line.to_string(),
                    error,
                });
            }
        }
    }

    tracing::debug!(
        parsed = parsed.transactions.len(),
        rejected = parsed.rejected.len(),
        "Parsed statement"
    );
    Ok(parsed)
}

/// Parses a statement and returns only the well-formed transactions.
pub fn parse(text: &str) -> Result<Vec<Transaction>, FormatError> {
    parse_statement(text).map(|parsed| parsed.transactions)
}

/// Whitespace collapsed, `#` and `*` removed.
pub fn clean_description(description: &str) -> String {
    let collapsed = description.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.replace(['#', '*'], "").trim().to_string()
}

fn tokenize(line: &str) -> Result<Vec<String>, RowError> {
    if line.matches('"').count() % 2 != 0 {
        return Err(RowError::UnterminatedQuote);
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());
    match reader.records().next() {
        Some(Ok(record)) => Ok(record.iter().map(str::to_string).collect()),
        Some(Err(e)) => Err(RowError::Csv(e.to_string())),
        None => Ok(Vec::new()),
    }
}

struct Row<'a> {
    values: &'a [String],
    columns: &'a ColumnMap,
}

impl<'a> Row<'a> {
    fn field(&self, name: &str) -> Option<&'a str> {
        self.columns
            .index(name)
            .and_then(|idx| self.values.get(idx))
            .map(String::as_str)
    }

    fn required(&self, name: &str) -> Result<&'a str, RowError> {
        self.field(name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RowError::MissingField(name.to_string()))
    }
}

fn parse_row(
    line: &str,
    columns: &ColumnMap,
    imported_at: DateTime<Utc>,
) -> Result<Transaction, RowError> {
    let values = tokenize(line)?;
    let row = Row {
        values: &values,
        columns,
    };

    let details = row.field(DETAILS).unwrap_or_default();
    let date = parse_date(row.required(POSTING_DATE)?)?;
    let description = row
        .field(DESCRIPTION)
        .ok_or_else(|| RowError::MissingField(DESCRIPTION.to_string()))?;
    let signed_amount = parse_amount(row.required(AMOUNT)?)?;
    let balance = row
        .field(BALANCE)
        .filter(|v| !v.is_empty())
        .and_then(|v| parse_amount(v).ok())
        .map(Money::from_decimal);
    let check_number = row
        .field(CHECK_NUMBER)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let mut tx = Transaction::new(
        date,
        clean_description(description),
        description.to_string(),
        Money::from_decimal(signed_amount),
        direction(details, signed_amount),
        imported_at,
    );
    tx.balance = balance;
    tx.check_number = check_number;
    Ok(tx)
}

/// The Details column is authoritative; the sign only breaks the tie.
fn direction(details: &str, signed_amount: Decimal) -> TransactionType {
    let details = details.to_uppercase();
    if details.contains("CREDIT") {
        TransactionType::Credit
    } else if details.contains("DEBIT") {
        TransactionType::Debit
    } else if signed_amount > Decimal::ZERO {
        TransactionType::Credit
    } else {
        TransactionType::Debit
    }
}

fn parse_amount(s: &str) -> Result<Decimal, RowError> {
    let s = s.trim();
    let (negative, inner) = if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
        (true, &s[1..s.len() - 1])
    } else {
        (false, s)
    };
    let cleaned: String = inner
        .chars()
        .filter(|c| *c != ',' && *c != '$' && !c.is_whitespace())
        .collect();
    let value = Decimal::from_str(&cleaned).map_err(|_| RowError::InvalidAmount(s.to_string()))?;
    Ok(if negative { -value } else { value })
}

/// `M/D/YYYY`, padding optional.
fn parse_date(s: &str) -> Result<NaiveDate, RowError> {
    let invalid = || RowError::InvalidDate(s.to_string());
    let parts: Vec<&str> = s.trim().split('/').collect();
    let [month, day, year] = parts.as_slice() else {
        return Err(invalid());
    };
    if year.len() != 4 {
        return Err(invalid());
    }
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}
