// 📊 Statistics Accumulator - running aggregate over one feed run
//
// AccountStats is a Copy value. Every accepted record produces a new value:
//   stats' = stats.accumulate(amount, month)
// so a whole run is a left fold over its records.
//
// Arithmetic is single precision (f32) end to end.

use std::fmt;

use chrono::Month;
use serde::{Deserialize, Serialize};

use crate::entities::TransactionRecord;

// ============================================================================
// MONTH HISTOGRAM
// ============================================================================

/// Transaction count per calendar month, keyed by `chrono::Month`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MonthHistogram([u32; 12]);

fn slot(month: Month) -> usize {
    month.number_from_month() as usize - 1
}

impl MonthHistogram {
    pub fn count(&self, month: Month) -> u32 {
        self.0[slot(month)]
    }

    #[must_use]
    pub fn increment(self, month: Month) -> MonthHistogram {
        let mut counts = self.0;
        counts[slot(month)] += 1;
        MonthHistogram(counts)
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    /// January..December with their counts
    pub fn iter(&self) -> impl Iterator<Item = (Month, u32)> + '_ {
        (1..=12u8)
            .filter_map(|n| Month::try_from(n).ok())
            .map(move |month| (month, self.count(month)))
    }

    pub fn as_array(&self) -> [u32; 12] {
        self.0
    }
}

// ============================================================================
// BUCKETS
// ============================================================================

/// Sign-based classification of an amount
///
/// "Debit" holds amounts >= 0 and "Credit" holds amounts < 0. The labels are
/// the reverse of the usual banking convention; the sign rule is what counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Debit,
    Credit,
}

impl Bucket {
    pub fn classify(amount: f32) -> Bucket {
        if amount < 0.0 {
            Bucket::Credit
        } else {
            Bucket::Debit
        }
    }
}

/// Count and incremental mean of the amounts routed to one bucket
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RunningAverage {
    pub count: u32,
    pub average: f32,
}

impl RunningAverage {
    /// avg' = (avg * n + amount) / (n + 1)
    #[must_use]
    pub fn push(self, amount: f32) -> RunningAverage {
        let n = self.count as f32;
        let count = self.count + 1;
        RunningAverage {
            count,
            average: (self.average * n + amount) / count as f32,
        }
    }
}

// ============================================================================
// ACCOUNT STATS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountStats {
    /// Account balance when the run started
    pub starting_balance: f32,

    /// starting_balance plus every amount seen so far
    pub balance: f32,

    /// Sum of the amounts seen in this run only
    pub file_balance: f32,

    pub transaction_count: u32,
    pub transactions_per_month: MonthHistogram,
    pub debit: RunningAverage,
    pub credit: RunningAverage,
}

impl AccountStats {
    pub fn new(starting_balance: f32) -> Self {
        AccountStats {
            starting_balance,
            balance: starting_balance,
            file_balance: 0.0,
            transaction_count: 0,
            transactions_per_month: MonthHistogram::default(),
            debit: RunningAverage::default(),
            credit: RunningAverage::default(),
        }
    }

    /// Fold one amount into the aggregate
    #[must_use]
    pub fn accumulate(self, amount: f32, month: Month) -> AccountStats {
        let (debit, credit) = match Bucket::classify(amount) {
            Bucket::Debit => (self.debit.push(amount), self.credit),
            Bucket::Credit => (self.debit, self.credit.push(amount)),
        };

        AccountStats {
            starting_balance: self.starting_balance,
            balance: self.balance + amount,
            file_balance: self.file_balance + amount,
            transaction_count: self.transaction_count + 1,
            transactions_per_month: self.transactions_per_month.increment(month),
            debit,
            credit,
        }
    }

    #[must_use]
    pub fn apply(self, record: &TransactionRecord) -> AccountStats {
        self.accumulate(record.amount, record.month)
    }

    /// Left fold of `accumulate` over `(amount, month)` pairs
    pub fn fold<I>(starting_balance: f32, entries: I) -> AccountStats
    where
        I: IntoIterator<Item = (f32, Month)>,
    {
        entries
            .into_iter()
            .fold(AccountStats::new(starting_balance), |stats, (amount, month)| {
                stats.accumulate(amount, month)
            })
    }

    pub fn debit_count(&self) -> u32 {
        self.debit.count
    }

    pub fn debit_avg(&self) -> f32 {
        self.debit.average
    }

    pub fn credit_count(&self) -> u32 {
        self.credit.count
    }

    pub fn credit_avg(&self) -> f32 {
        self.credit.average
    }
}

impl fmt::Display for AccountStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "balance={:.2} file_balance={:.2} count={} debit={}@{:.2} credit={}@{:.2}",
            self.balance,
            self.file_balance,
            self.transaction_count,
            self.debit.count,
            self.debit.average,
            self.credit.count,
            self.credit.average,
        )
    }
}
