use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    Person, PersonBalance, PersonId, Transaction, TransactionId, TransactionWithPerson,
};

use super::MIGRATION_001_INITIAL;

const TRANSACTION_COLUMNS: &str =
    "t.id, t.person_id, t.amount, t.is_monetary, t.description, t.timestamp, t.recorded_at, \
     p.name AS person_name, p.created_at AS person_created_at";

/// Repository for persisting and querying persons and transactions.
///
/// This layer is storage plumbing only: referential integrity and amount
/// rules are validated by the service layer, which is the sole caller and
/// serializes all access, so every query here observes a fully committed
/// state.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Person operations
    // ========================

    /// Look up a person by name, creating the record if the name is new.
    /// Names match case-insensitively, so re-inserting the same logical
    /// person returns the original record instead of creating a second.
    pub async fn insert_person(&self, name: &str) -> Result<Person> {
        if let Some(existing) = self.person_by_name(name).await? {
            return Ok(existing);
        }

        let person = Person::new(name);
        sqlx::query("INSERT INTO persons (id, name, created_at) VALUES (?, ?, ?)")
            .bind(person.id.to_string())
            .bind(&person.name)
            .bind(person.created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .context("Failed to save person")?;
        Ok(person)
    }

    /// Get a person by name (case-insensitive).
    pub async fn person_by_name(&self, name: &str) -> Result<Option<Person>> {
        let row = sqlx::query("SELECT id, name, created_at FROM persons WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch person by name")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_person(&row)?)),
            None => Ok(None),
        }
    }

    /// Get a person by id.
    pub async fn person_by_id(&self, id: PersonId) -> Result<Option<Person>> {
        let row = sqlx::query("SELECT id, name, created_at FROM persons WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch person")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_person(&row)?)),
            None => Ok(None),
        }
    }

    /// Check whether a person with the given name exists.
    pub async fn person_exists(&self, name: &str) -> Result<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM persons WHERE name = ?) AS present")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check person existence")?;
        Ok(row.get::<i32, _>("present") != 0)
    }

    // ========================
    // Transaction operations
    // ========================

    /// Save a new transaction to the database.
    pub async fn insert_transaction(&self, txn: &Transaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, person_id, amount, is_monetary, description, timestamp, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(txn.id.to_string())
        .bind(txn.person_id.to_string())
        .bind(txn.amount)
        .bind(txn.is_monetary)
        .bind(&txn.description)
        .bind(txn.timestamp.to_rfc3339())
        .bind(txn.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save transaction")?;
        Ok(())
    }

    /// Overwrite an existing transaction. Returns false when the id is
    /// unknown. `recorded_at` is immutable and left untouched.
    pub async fn update_transaction(&self, txn: &Transaction) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET person_id = ?, amount = ?, is_monetary = ?, description = ?, timestamp = ?
            WHERE id = ?
            "#,
        )
        .bind(txn.person_id.to_string())
        .bind(txn.amount)
        .bind(txn.is_monetary)
        .bind(&txn.description)
        .bind(txn.timestamp.to_rfc3339())
        .bind(txn.id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update transaction")?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a transaction. Returns false when the id is unknown.
    pub async fn delete_transaction(&self, id: TransactionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete transaction")?;

        Ok(result.rows_affected() > 0)
    }

    /// Get a transaction by id, joined with its person.
    pub async fn transaction_by_id(
        &self,
        id: TransactionId,
    ) -> Result<Option<TransactionWithPerson>> {
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions t \
             JOIN persons p ON p.id = t.person_id WHERE t.id = ?"
        );
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch transaction")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_transaction_with_person(&row)?)),
            None => Ok(None),
        }
    }

    /// List transactions joined with their persons, most recent first,
    /// optionally restricted to one person by (case-insensitive) name.
    pub async fn transactions(
        &self,
        person_name: Option<&str>,
    ) -> Result<Vec<TransactionWithPerson>> {
        let mut query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions t \
             JOIN persons p ON p.id = t.person_id"
        );
        if person_name.is_some() {
            query.push_str(" WHERE p.name = ?");
        }
        query.push_str(" ORDER BY t.timestamp DESC, t.recorded_at DESC");

        let mut sql_query = sqlx::query(&query);
        if let Some(name) = person_name {
            sql_query = sql_query.bind(name);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions")?;

        rows.iter()
            .map(Self::row_to_transaction_with_person)
            .collect()
    }

    /// Compute the per-person aggregates in a single query. The monetary
    /// sum and the item-count sum are accumulated independently since they
    /// use different units. Persons without transactions appear with both
    /// sums at zero.
    pub async fn persons_with_balances(&self) -> Result<Vec<PersonBalance>> {
        let rows = sqlx::query(
            r#"
            SELECT
                p.id, p.name, p.created_at,
                COALESCE(SUM(CASE WHEN t.is_monetary <> 0 THEN t.amount ELSE 0 END), 0) AS money,
                COALESCE(SUM(CASE WHEN t.is_monetary = 0 THEN t.amount ELSE 0 END), 0) AS items
            FROM persons p
            LEFT JOIN transactions t ON t.person_id = p.id
            GROUP BY p.id
            ORDER BY p.name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to compute balances")?;

        rows.iter()
            .map(|row| {
                Ok(PersonBalance {
                    person: Self::row_to_person(row)?,
                    money: row.get("money"),
                    items: row.get("items"),
                })
            })
            .collect()
    }

    fn row_to_person(row: &sqlx::sqlite::SqliteRow) -> Result<Person> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(Person {
            id: Uuid::parse_str(&id_str).context("Invalid person ID")?,
            name: row.get("name"),
            created_at: parse_timestamp(&created_at_str)?,
        })
    }

    fn row_to_transaction_with_person(
        row: &sqlx::sqlite::SqliteRow,
    ) -> Result<TransactionWithPerson> {
        let id_str: String = row.get("id");
        let person_id_str: String = row.get("person_id");
        let timestamp_str: String = row.get("timestamp");
        let recorded_at_str: String = row.get("recorded_at");
        let person_created_at_str: String = row.get("person_created_at");

        let person_id = Uuid::parse_str(&person_id_str).context("Invalid person ID")?;

        Ok(TransactionWithPerson {
            transaction: Transaction {
                id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
                person_id,
                amount: row.get("amount"),
                is_monetary: row.get::<i32, _>("is_monetary") != 0,
                description: row.get("description"),
                timestamp: parse_timestamp(&timestamp_str)?,
                recorded_at: parse_timestamp(&recorded_at_str)?,
            },
            person: Person {
                id: person_id,
                name: row.get("person_name"),
                created_at: parse_timestamp(&person_created_at_str)?,
            },
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .context("Invalid timestamp")?
        .with_timezone(&Utc))
}
