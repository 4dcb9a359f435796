// 💳 Account Entity - the single account a feed run belongs to
//
// Identity: storage-assigned id (never changes)
// Lookup key: account_number (caller supplied, unique)
// Value: balance (rewritten once, at the end of every run)

/// Storage-assigned account identity (SQLite rowid)
pub type AccountId = i64;

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// Assigned by the account store on creation
    pub id: AccountId,

    /// External lookup key, unique per store
    pub account_number: String,

    /// Sum of every committed transaction amount since creation
    pub balance: f32,
}

impl Account {
    pub fn new(id: AccountId, account_number: impl Into<String>, balance: f32) -> Self {
        Account {
            id,
            account_number: account_number.into(),
            balance,
        }
    }

    /// Copy of this account carrying a new balance
    pub fn with_balance(&self, balance: f32) -> Account {
        Account {
            balance,
            ..self.clone()
        }
    }

    /// Mask account number (show only last 4 digits)
    ///
    /// Example: "1234567890" → "*7890"
    pub fn masked_number(&self) -> String {
        let number = &self.account_number;
        if number.chars().count() <= 4 {
            return number.clone();
        }
        let last4: String = number.chars().skip(number.chars().count() - 4).collect();
        format!("*{}", last4)
    }
}
