use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{format_count, format_monetary, DecimalSeparator};

pub type PersonId = Uuid;

/// A counter-party the user owes or is owed by. Persons are created once
/// and never updated; their name is unique case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Person {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Which way a balance points, from the user's perspective.
/// Positive amounts mean the user lent, negative that the user owes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtDirection {
    UserOwes,
    Settled,
    UserLent,
}

impl DebtDirection {
    pub fn from_total(total: i64) -> Self {
        match total.signum() {
            -1 => DebtDirection::UserOwes,
            0 => DebtDirection::Settled,
            _ => DebtDirection::UserLent,
        }
    }
}

/// Per-person aggregate: the monetary sum (minor units) and the item-count
/// sum over all of that person's transactions. The two totals use
/// different units and are never added together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonBalance {
    pub person: Person,
    pub money: i64,
    pub items: i64,
}

impl PersonBalance {
    pub fn money_direction(&self) -> DebtDirection {
        DebtDirection::from_total(self.money)
    }

    pub fn item_direction(&self) -> DebtDirection {
        DebtDirection::from_total(self.items)
    }

    /// Unsigned monetary total for display next to an owes/lent label.
    pub fn formatted_money(&self, sep: DecimalSeparator) -> String {
        format_monetary(self.money.abs(), sep)
    }

    /// Unsigned item total for display next to an owes/lent label.
    pub fn formatted_items(&self) -> String {
        format_count(self.items.abs())
    }

    pub fn has_money(&self) -> bool {
        self.money != 0
    }

    pub fn has_items(&self) -> bool {
        self.items != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debt_direction_from_total() {
        assert_eq!(DebtDirection::from_total(-300), DebtDirection::UserOwes);
        assert_eq!(DebtDirection::from_total(0), DebtDirection::Settled);
        assert_eq!(DebtDirection::from_total(42), DebtDirection::UserLent);
    }

    #[test]
    fn test_balance_display_is_unsigned() {
        let balance = PersonBalance {
            person: Person::new("Alice"),
            money: -1234,
            items: -3,
        };
        assert_eq!(balance.formatted_money(DecimalSeparator::Point), "12.34");
        assert_eq!(balance.formatted_items(), "3");
        assert_eq!(balance.money_direction(), DebtDirection::UserOwes);
    }

    #[test]
    fn test_balance_type_flags() {
        let balance = PersonBalance {
            person: Person::new("Bob"),
            money: 500,
            items: 0,
        };
        assert!(balance.has_money());
        assert!(!balance.has_items());
    }
}
