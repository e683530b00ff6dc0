use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{format_count, format_monetary, Amount, DebtDirection, DecimalSeparator, Person, PersonId};

pub type TransactionId = Uuid;

/// One signed debt event tied to a person. Positive amounts mean the
/// counter-party owes the user (the user lent), negative that the user
/// owes. `amount` is minor units when `is_monetary`, an item count
/// otherwise; the two interpretations never mix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub person_id: PersonId,
    pub amount: Amount,
    pub is_monetary: bool,
    pub description: String,
    /// When the debt event occurred in the real world. User-settable,
    /// used for display ordering only.
    pub timestamp: DateTime<Utc>,
    /// When the record entered the store.
    pub recorded_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        person_id: PersonId,
        amount: Amount,
        is_monetary: bool,
        description: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        assert!(amount != 0, "transaction amount must be nonzero");
        Self {
            id: Uuid::new_v4(),
            person_id,
            amount,
            is_monetary,
            description: description.into(),
            timestamp,
            recorded_at: Utc::now(),
        }
    }

    pub fn direction(&self) -> DebtDirection {
        DebtDirection::from_total(i64::from(self.amount))
    }

    /// Unsigned amount for display next to a gave/received label.
    pub fn formatted_amount(&self, sep: DecimalSeparator) -> String {
        let abs = i64::from(self.amount).abs();
        if self.is_monetary {
            format_monetary(abs, sep)
        } else {
            format_count(abs)
        }
    }
}

/// Input for creating a transaction through the service. The store assigns
/// the id; a missing timestamp defaults to the time of recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub person_id: PersonId,
    pub amount: Amount,
    pub is_monetary: bool,
    pub description: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A transaction joined with the person it references, as returned by the
/// history queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionWithPerson {
    pub transaction: Transaction,
    pub person: Person,
}
