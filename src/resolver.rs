// 🔎 Account Resolver - find the feed's account or open a new one
//
// Only a genuine "not found" provisions a zero-balance account. Any other
// lookup failure is returned so a broken store never produces a shadow
// account.

use log::info;

use crate::cancel::CancelToken;
use crate::entities::Account;
use crate::error::{IngestError, Stage, StoreError};
use crate::retry::{AttemptError, RetryPolicy};
use crate::store::AccountStore;

pub struct AccountResolver<'a> {
    store: &'a dyn AccountStore,
    retry: RetryPolicy,
    cancel: &'a CancelToken,
}

impl<'a> AccountResolver<'a> {
    pub fn new(store: &'a dyn AccountStore, retry: RetryPolicy, cancel: &'a CancelToken) -> Self {
        AccountResolver {
            store,
            retry,
            cancel,
        }
    }

    pub fn resolve(&self, account_number: &str) -> Result<Account, IngestError> {
        let lookup = self.retry.run(Stage::AccountLookup, self.cancel, || {
            self.store.find_by_number(account_number)
        });

        match lookup {
            Ok(account) => {
                info!(
                    "Found account {} (id {}), balance {:.2}",
                    account.masked_number(),
                    account.id,
                    account.balance
                );
                Ok(account)
            }
            Err(AttemptError::Store(StoreError::NotFound)) => self.provision(account_number),
            Err(err) => Err(err.into_ingest(|source| IngestError::AccountLookup {
                account_number: account_number.to_string(),
                source,
            })),
        }
    }

    fn provision(&self, account_number: &str) -> Result<Account, IngestError> {
        let account = self
            .retry
            .run(Stage::AccountProvisioning, self.cancel, || {
                self.store.create(account_number, 0.0)
            })
            .map_err(|err| {
                err.into_ingest(|source| IngestError::AccountProvisioning {
                    account_number: account_number.to_string(),
                    source,
                })
            })?;

        info!(
            "Created account {} (id {}) with zero balance",
            account.masked_number(),
            account.id
        );
        Ok(account)
    }
}
