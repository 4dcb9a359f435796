// Entity Models
//
// Account: stable storage identity, looked up by account number
// TransactionRecord: insert-only, references one account

pub mod account;
pub mod transaction;

pub use account::{Account, AccountId};
pub use transaction::{TransactionId, TransactionRecord};
