// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use tally::application::LedgerService;
use tally::domain::{Amount, PersonId, TransactionDraft};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// Build a minimal draft: no description, timestamp defaulting to now.
pub fn draft(person_id: PersonId, amount: Amount, is_monetary: bool) -> TransactionDraft {
    TransactionDraft {
        person_id,
        amount,
        is_monetary,
        description: String::new(),
        timestamp: None,
    }
}

/// Same as [`draft`] but with an explicit timestamp.
pub fn dated_draft(
    person_id: PersonId,
    amount: Amount,
    is_monetary: bool,
    date: &str,
) -> TransactionDraft {
    TransactionDraft {
        timestamp: Some(parse_date(date)),
        ..draft(person_id, amount, is_monetary)
    }
}

/// Test fixture: two standard persons
pub struct StandardPersons;

impl StandardPersons {
    /// Create Alice and Bob, returning their ids.
    pub async fn create(service: &LedgerService) -> Result<(PersonId, PersonId)> {
        let alice = service.add_person("Alice").wait().await?;
        let bob = service.add_person("Bob").wait().await?;
        Ok((alice.id, bob.id))
    }
}
