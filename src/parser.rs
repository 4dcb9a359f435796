// 🏗️ Record Parser - one feed line → one TransactionRecord
//
// Grammar (fixed, no quoting or escaping):
//   <sequence:int>,<month:int>/<day:int>,<amount:decimal>
//   0,7/15,+60.5
//
// Pure: the same line and context always produce the same record.

use chrono::{DateTime, Month, Utc};

use crate::entities::{AccountId, TransactionRecord};
use crate::error::{ParseError, ParseFailure};

/// Number of fields every feed line must carry
pub const FIELD_COUNT: usize = 4;

// ============================================================================
// CONTEXT
// ============================================================================

/// Immutable per-run values stamped onto every parsed record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordContext {
    pub account_id: AccountId,
    pub processing_timestamp: DateTime<Utc>,
}

impl RecordContext {
    pub fn new(account_id: AccountId, processing_timestamp: DateTime<Utc>) -> Self {
        RecordContext {
            account_id,
            processing_timestamp,
        }
    }
}

// ============================================================================
// PARSING
// ============================================================================

/// Parse one feed line into an unsaved record (`id == None`)
pub fn parse_record(line: &str, ctx: &RecordContext) -> Result<TransactionRecord, ParseError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut scanner = Scanner::new(line);

    let sequence: i64 = scanner.int("sequence", Some(','), "month")?;
    let month: i64 = scanner.int("month", Some('/'), "day")?;
    let day: i64 = scanner.int("day", Some(','), "amount")?;
    let amount = scanner.amount()?;

    let month = u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .ok_or_else(|| scanner.fail(ParseFailure::MonthOutOfRange(month)))?;

    let day = u8::try_from(day)
        .ok()
        .filter(|d| (1..=31).contains(d))
        .ok_or_else(|| scanner.fail(ParseFailure::DayOutOfRange(day)))?;

    Ok(TransactionRecord {
        id: None,
        account_id: ctx.account_id,
        processing_timestamp: ctx.processing_timestamp,
        sequence,
        month,
        day,
        amount,
    })
}

/// Left-to-right field scanner that remembers how far it got
struct Scanner<'a> {
    line: &'a str,
    rest: Option<&'a str>,
    fields: usize,
}

impl<'a> Scanner<'a> {
    fn new(line: &'a str) -> Self {
        Scanner {
            line,
            rest: Some(line),
            fields: 0,
        }
    }

    fn fail(&self, reason: ParseFailure) -> ParseError {
        ParseError {
            line: self.line.to_string(),
            fields: self.fields,
            reason,
        }
    }

    /// Take the next token up to `delimiter` (or the end of the line)
    fn token(&mut self, name: &'static str, delimiter: Option<char>) -> Result<&'a str, ParseError> {
        let rest = self
            .rest
            .ok_or_else(|| self.fail(ParseFailure::MissingField(name)))?;

        let (token, remainder) = match delimiter.and_then(|d| rest.split_once(d)) {
            Some((token, remainder)) => (token, Some(remainder)),
            None => (rest, None),
        };

        if token.is_empty() {
            return Err(self.fail(ParseFailure::MissingField(name)));
        }

        self.rest = remainder;
        Ok(token)
    }

    /// Integer field that must be followed by `delimiter`
    fn int(
        &mut self,
        name: &'static str,
        delimiter: Option<char>,
        next: &'static str,
    ) -> Result<i64, ParseError> {
        let had_delimiter = self
            .rest
            .zip(delimiter)
            .map(|(rest, d)| rest.contains(d))
            .unwrap_or(false);

        let token = self.token(name, delimiter)?;
        let value = token.parse::<i64>().map_err(|_| {
            self.fail(ParseFailure::InvalidNumber {
                field: name,
                token: token.to_string(),
            })
        })?;
        self.fields += 1;

        if !had_delimiter {
            return Err(self.fail(ParseFailure::MissingField(next)));
        }
        Ok(value)
    }

    /// Last field: a finite decimal with an optional sign
    fn amount(&mut self) -> Result<f32, ParseError> {
        let rest = self
            .rest
            .ok_or_else(|| self.fail(ParseFailure::MissingField("amount")))?;

        let (token, trailing) = match rest.split_once(',') {
            Some((token, trailing)) => (token, Some(trailing)),
            None => (rest, None),
        };
        if token.is_empty() {
            return Err(self.fail(ParseFailure::MissingField("amount")));
        }

        let amount = token.parse::<f32>().map_err(|_| {
            self.fail(ParseFailure::InvalidNumber {
                field: "amount",
                token: token.to_string(),
            })
        })?;
        if !amount.is_finite() {
            return Err(self.fail(ParseFailure::NonFiniteAmount(token.to_string())));
        }
        self.fields += 1;
        self.rest = None;

        if let Some(trailing) = trailing {
            return Err(self.fail(ParseFailure::TrailingInput(format!(",{}", trailing))));
        }
        Ok(amount)
    }
}
