// 🔄 Ingestion Pipeline - one pass over one account's feed
//
//   Start       resolve account, stats = AccountStats::new(balance), fix timestamp
//   PerLine     read → parse → insert → fold → progress event
//   EndOfStream update balance → notify
//
// Halts on the first error. Records inserted before a failure stay inserted.

use std::io;

use chrono::Utc;
use log::{debug, info};

use crate::cancel::CancelToken;
use crate::error::{IngestError, Stage};
use crate::notify::Notifier;
use crate::parser::{parse_record, RecordContext};
use crate::resolver::AccountResolver;
use crate::retry::RetryPolicy;
use crate::stats::AccountStats;
use crate::store::{AccountStore, TransactionStore};

pub struct IngestionPipeline<'a> {
    accounts: &'a dyn AccountStore,
    transactions: &'a dyn TransactionStore,
    notifier: &'a dyn Notifier,
    retry: RetryPolicy,
    cancel: CancelToken,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(
        accounts: &'a dyn AccountStore,
        transactions: &'a dyn TransactionStore,
        notifier: &'a dyn Notifier,
    ) -> Self {
        IngestionPipeline {
            accounts,
            transactions,
            notifier,
            retry: RetryPolicy::default(),
            cancel: CancelToken::new(),
        }
    }

    /// Builder pattern: replace the retry policy for store calls
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builder pattern: honor an external cancel token / deadline
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Ingest `lines` (header already removed) into `account_number`
    ///
    /// Returns the final stats after the balance is stored and every notifier
    /// was called.
    pub fn run<I>(&self, account_number: &str, lines: I) -> Result<AccountStats, IngestError>
    where
        I: IntoIterator<Item = io::Result<String>>,
    {
        let account =
            AccountResolver::new(self.accounts, self.retry, &self.cancel).resolve(account_number)?;

        let ctx = RecordContext::new(account.id, Utc::now());
        let mut stats = AccountStats::new(account.balance);
        let mut lines = lines.into_iter();
        let mut record_no = 0usize;

        info!(
            "Processing feed for account {} from balance {:.2}",
            account.masked_number(),
            account.balance
        );

        loop {
            self.cancel.check(Stage::ReadLine)?;

            let line = match lines.next() {
                None => break,
                Some(Ok(line)) => line,
                Some(Err(source)) => {
                    return Err(IngestError::StreamRead {
                        record: record_no + 1,
                        source,
                    })
                }
            };
            record_no += 1;

            let record = parse_record(&line, &ctx).map_err(|source| IngestError::Parse {
                record: record_no,
                source,
            })?;

            let stored = self
                .retry
                .run(Stage::InsertTransaction, &self.cancel, || {
                    self.transactions.insert(record.clone())
                })
                .map_err(|err| {
                    err.into_ingest(|source| IngestError::Persistence {
                        stage: Stage::InsertTransaction,
                        record: Some(record_no),
                        source,
                    })
                })?;

            stats = stats.apply(&stored);
            debug!("record {} stored as {:?}: {}", record_no, stored.id, stats);
        }

        let account = account.with_balance(stats.balance);
        self.retry
            .run(Stage::UpdateBalance, &self.cancel, || self.accounts.update(&account))
            .map_err(|err| {
                err.into_ingest(|source| IngestError::Persistence {
                    stage: Stage::UpdateBalance,
                    record: None,
                    source,
                })
            })?;

        info!(
            "Stored {} transactions, account {} balance now {:.2}",
            stats.transaction_count,
            account.masked_number(),
            account.balance
        );

        self.cancel.check(Stage::Notify)?;
        self.notifier.notify(&stats)?;

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::entities::{Account, TransactionRecord};
    use crate::error::{NotificationError, ParseFailure, StoreError};
    use std::cell::{Cell, RefCell};
    use std::time::Duration;

    const FIXTURE: &str = "0,7/15,+60.5\n1,7/28,-10.3\n2,8/2,-20.46\n3,8/13,+10\n";

    fn lines(feed: &str) -> Vec<io::Result<String>> {
        feed.lines().map(|l| Ok(l.to_string())).collect()
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() <= 1e-4 * expected.abs().max(1.0),
            "expected {} to be close to {}",
            actual,
            expected
        );
    }

    /// Records every notification; optionally fails
    #[derive(Default)]
    struct RecordingNotifier {
        seen: RefCell<Vec<AccountStats>>,
        fail: bool,
    }

    impl Notifier for RecordingNotifier {
        fn name(&self) -> &str {
            "recording"
        }

        fn notify(&self, stats: &AccountStats) -> Result<(), NotificationError> {
            self.seen.borrow_mut().push(*stats);
            if self.fail {
                return Err(NotificationError::Rejected {
                    notifier: "recording".to_string(),
                    reason: "mailbox full".to_string(),
                });
            }
            Ok(())
        }
    }

    /// Transaction store that fails the n-th insert (1-based) with the given error kind
    struct FlakyTransactions<'a> {
        inner: &'a SqliteStore,
        calls: Cell<usize>,
        fail_on: Vec<usize>,
        transient: bool,
    }

    impl TransactionStore for FlakyTransactions<'_> {
        fn insert(&self, record: TransactionRecord) -> Result<TransactionRecord, StoreError> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if self.fail_on.contains(&call) {
                if self.transient {
                    return Err(StoreError::Transient("database is locked".to_string()));
                }
                return Err(StoreError::Duplicate("UNIQUE constraint failed".to_string()));
            }
            self.inner.insert(record)
        }
    }

    /// Account store whose update always fails
    struct ReadOnlyAccounts<'a> {
        inner: &'a SqliteStore,
    }

    impl AccountStore for ReadOnlyAccounts<'_> {
        fn find_by_number(&self, account_number: &str) -> Result<Account, StoreError> {
            self.inner.find_by_number(account_number)
        }

        fn create(&self, account_number: &str, balance: f32) -> Result<Account, StoreError> {
            self.inner.create(account_number, balance)
        }

        fn update(&self, _account: &Account) -> Result<Account, StoreError> {
            Err(StoreError::Corrupt("read-only replica".to_string()))
        }
    }

    /// Account store that records every balance it is asked to persist
    struct CountingAccounts<'a> {
        inner: &'a SqliteStore,
        updates: RefCell<Vec<f32>>,
    }

    impl<'a> CountingAccounts<'a> {
        fn new(inner: &'a SqliteStore) -> Self {
            CountingAccounts {
                inner,
                updates: RefCell::new(Vec::new()),
            }
        }
    }

    impl AccountStore for CountingAccounts<'_> {
        fn find_by_number(&self, account_number: &str) -> Result<Account, StoreError> {
            self.inner.find_by_number(account_number)
        }

        fn create(&self, account_number: &str, balance: f32) -> Result<Account, StoreError> {
            self.inner.create(account_number, balance)
        }

        fn update(&self, account: &Account) -> Result<Account, StoreError> {
            self.updates.borrow_mut().push(account.balance);
            self.inner.update(account)
        }
    }

    fn store_with_account(balance: f32) -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create("123456", balance).unwrap();
        store
    }

    #[test]
    fn test_fixture_feed() {
        let store = store_with_account(10.0);
        let accounts = CountingAccounts::new(&store);
        let notifier = RecordingNotifier::default();
        let pipeline =
            IngestionPipeline::new(&accounts, &store, &notifier).with_retry(fast_retry());

        let stats = pipeline.run("123456", lines(FIXTURE)).unwrap();

        assert_close(stats.balance, 49.74);
        assert_close(stats.file_balance, 39.74);
        assert_eq!(stats.transaction_count, 4);
        assert_eq!(
            stats.transactions_per_month.as_array(),
            [0, 0, 0, 0, 0, 0, 2, 2, 0, 0, 0, 0]
        );
        assert_eq!(stats.debit_count(), 2);
        assert_eq!(stats.debit_avg(), 35.25);
        assert_eq!(stats.credit_count(), 2);
        assert_close(stats.credit_avg(), -15.38);

        // Balance persisted once and every record stored with the shared timestamp
        assert_eq!(*accounts.updates.borrow(), vec![stats.balance]);
        let account = store.find_by_number("123456").unwrap();
        assert_eq!(account.balance, stats.balance);

        let stored = store.transactions_for_account(account.id).unwrap();
        assert_eq!(stored.len(), 4);
        assert!(stored
            .iter()
            .all(|t| t.processing_timestamp == stored[0].processing_timestamp));
        assert_eq!(
            stored.iter().map(|t| t.sequence).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );

        assert_eq!(*notifier.seen.borrow(), vec![stats]);

        println!("✅ Fixture feed PASSED: {}", stats);
    }

    #[test]
    fn test_empty_feed_still_updates_and_notifies() {
        let store = store_with_account(10.0);
        let accounts = CountingAccounts::new(&store);
        let notifier = RecordingNotifier::default();
        let pipeline = IngestionPipeline::new(&accounts, &store, &notifier);

        let stats = pipeline.run("123456", Vec::new()).unwrap();

        assert_eq!(stats, AccountStats::new(10.0));
        assert_eq!(*accounts.updates.borrow(), vec![10.0]);
        assert_eq!(store.find_by_number("123456").unwrap().balance, 10.0);
        assert_eq!(store.count_transactions().unwrap(), 0);
        assert_eq!(notifier.seen.borrow().len(), 1);
    }

    #[test]
    fn test_malformed_line_halts_ingestion() {
        let store = store_with_account(10.0);
        let accounts = CountingAccounts::new(&store);
        let notifier = RecordingNotifier::default();
        let pipeline = IngestionPipeline::new(&accounts, &store, &notifier);

        let err = pipeline
            .run("123456", lines("0,7/15,+60.5\n5,7/15\n1,7/28,-10.3\n"))
            .unwrap_err();

        match err {
            IngestError::Parse { record, source } => {
                assert_eq!(record, 2);
                assert_eq!(source.line, "5,7/15");
                assert_eq!(source.fields, 3);
                assert_eq!(source.reason, ParseFailure::MissingField("amount"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }

        // Only the record before the bad line was stored; balance and
        // notification never happened
        assert_eq!(store.count_transactions().unwrap(), 1);
        assert!(accounts.updates.borrow().is_empty());
        assert_eq!(store.find_by_number("123456").unwrap().balance, 10.0);
        assert!(notifier.seen.borrow().is_empty());
    }

    #[test]
    fn test_unknown_account_is_created_before_first_record() {
        let store = SqliteStore::open_in_memory().unwrap();
        let notifier = RecordingNotifier::default();
        let pipeline = IngestionPipeline::new(&store, &store, &notifier);

        let stats = pipeline.run("654321", lines("0,1/2,+5\n")).unwrap();

        assert_eq!(stats.starting_balance, 0.0);
        assert_eq!(stats.balance, 5.0);

        let account = store.find_by_number("654321").unwrap();
        assert_eq!(account.balance, 5.0);
        assert_eq!(store.transactions_for_account(account.id).unwrap().len(), 1);
    }

    #[test]
    fn test_stream_read_error_is_not_a_parse_error() {
        let store = store_with_account(0.0);
        let notifier = RecordingNotifier::default();
        let pipeline = IngestionPipeline::new(&store, &store, &notifier);

        let feed = vec![
            Ok("0,7/15,+60.5".to_string()),
            Err(io::Error::new(io::ErrorKind::InvalidData, "stream did not contain valid UTF-8")),
        ];
        let err = pipeline.run("123456", feed).unwrap_err();

        assert!(matches!(err, IngestError::StreamRead { record: 2, .. }));
        assert_eq!(store.count_transactions().unwrap(), 1);
        assert_eq!(store.find_by_number("123456").unwrap().balance, 0.0);
        assert!(notifier.seen.borrow().is_empty());
    }

    #[test]
    fn test_insert_failure_stops_without_rollback() {
        let store = store_with_account(10.0);
        let flaky = FlakyTransactions {
            inner: &store,
            calls: Cell::new(0),
            fail_on: vec![3],
            transient: false,
        };
        let notifier = RecordingNotifier::default();
        let pipeline = IngestionPipeline::new(&store, &flaky, &notifier).with_retry(fast_retry());

        let err = pipeline.run("123456", lines(FIXTURE)).unwrap_err();

        assert!(matches!(
            err,
            IngestError::Persistence {
                stage: Stage::InsertTransaction,
                record: Some(3),
                source: StoreError::Duplicate(_),
            }
        ));
        // Duplicate is permanent: one attempt, no retry
        assert_eq!(flaky.calls.get(), 3);
        assert_eq!(store.count_transactions().unwrap(), 2);
        assert_eq!(store.find_by_number("123456").unwrap().balance, 10.0);
        assert!(notifier.seen.borrow().is_empty());
    }

    #[test]
    fn test_transient_insert_failures_are_retried() {
        let store = store_with_account(10.0);
        let flaky = FlakyTransactions {
            inner: &store,
            calls: Cell::new(0),
            fail_on: vec![2, 3],
            transient: true,
        };
        let notifier = RecordingNotifier::default();
        let pipeline = IngestionPipeline::new(&store, &flaky, &notifier).with_retry(fast_retry());

        let stats = pipeline.run("123456", lines(FIXTURE)).unwrap();

        assert_eq!(stats.transaction_count, 4);
        assert_eq!(flaky.calls.get(), 6);
        assert_eq!(store.count_transactions().unwrap(), 4);
    }

    #[test]
    fn test_balance_update_failure() {
        let store = store_with_account(10.0);
        let accounts = ReadOnlyAccounts { inner: &store };
        let notifier = RecordingNotifier::default();
        let pipeline = IngestionPipeline::new(&accounts, &store, &notifier);

        let err = pipeline.run("123456", lines(FIXTURE)).unwrap_err();

        assert!(matches!(
            err,
            IngestError::Persistence {
                stage: Stage::UpdateBalance,
                record: None,
                ..
            }
        ));
        assert!(notifier.seen.borrow().is_empty());
    }

    #[test]
    fn test_notification_failure_keeps_final_balance() {
        let store = store_with_account(10.0);
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };
        let pipeline = IngestionPipeline::new(&store, &store, &notifier);

        let err = pipeline.run("123456", lines(FIXTURE)).unwrap_err();

        assert!(matches!(err, IngestError::Notification(_)));
        assert_close(store.find_by_number("123456").unwrap().balance, 49.74);
        assert_eq!(store.count_transactions().unwrap(), 4);
        assert_eq!(notifier.seen.borrow().len(), 1);
    }

    #[test]
    fn test_cancelled_run_stops_at_next_read() {
        let store = store_with_account(10.0);
        let notifier = RecordingNotifier::default();
        let cancel = CancelToken::new();
        let pipeline =
            IngestionPipeline::new(&store, &store, &notifier).with_cancel_token(cancel.clone());

        // Trip the token while the second line is being read
        let handle = cancel.clone();
        let feed = lines(FIXTURE).into_iter().enumerate().map(move |(i, line)| {
            if i == 1 {
                handle.cancel();
            }
            line
        });

        let err = pipeline.run("123456", feed).unwrap_err();

        assert!(matches!(
            err,
            IngestError::Cancelled {
                stage: Stage::InsertTransaction
            }
        ));
        assert_eq!(store.count_transactions().unwrap(), 1);
        assert!(notifier.seen.borrow().is_empty());
    }

    #[test]
    fn test_expired_deadline_stops_before_lookup() {
        let store = store_with_account(10.0);
        let notifier = RecordingNotifier::default();
        let pipeline = IngestionPipeline::new(&store, &store, &notifier)
            .with_cancel_token(CancelToken::with_timeout(Duration::ZERO));

        let err = pipeline.run("123456", lines(FIXTURE)).unwrap_err();

        assert!(matches!(
            err,
            IngestError::Cancelled {
                stage: Stage::AccountLookup
            }
        ));
        assert_eq!(store.count_transactions().unwrap(), 0);
    }
}
