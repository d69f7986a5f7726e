//! SQLite persistence
//!
//! One [`Store`] owns one connection. Multi-row invariants (slot conflicts,
//! one rating per appointment, status compare-and-set) are checked inside
//! `IMMEDIATE` transactions so they also hold across processes sharing the
//! database file.

mod notifications;
mod ratings;
mod requests;
mod users;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

use crate::Result;

/// SQLite-backed store for every CareConnect entity
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database at `db_path`
    pub fn new(db_path: &str) -> Result<Self> {
        debug!("Opening database at: {}", db_path);
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let store = Self { conn };
        store.init_tables()?;
        info!("Store initialized at {}", db_path);
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_tables()?;
        Ok(store)
    }

    fn init_tables(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                role TEXT NOT NULL,
                full_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                phone TEXT,
                bio TEXT,
                hourly_rate_cents INTEGER,
                specialties TEXT NOT NULL,
                availability TEXT NOT NULL,
                favorites TEXT NOT NULL,
                payment_customer_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);

            CREATE TABLE IF NOT EXISTS hire_requests (
                id TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                caregiver_id TEXT NOT NULL,
                date TEXT NOT NULL,
                start_hour INTEGER NOT NULL,
                end_hour INTEGER NOT NULL,
                status TEXT NOT NULL,
                notes TEXT,
                total_amount_cents INTEGER NOT NULL,
                caregiver_amount_cents INTEGER,
                platform_fee_cents INTEGER,
                payment_reference TEXT,
                payment_status TEXT,
                payment_claim TEXT,
                payment_claimed_at TEXT,
                cancellation_reason TEXT,
                reminder_sent INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_requests_caregiver_date ON hire_requests(caregiver_id, date);
            CREATE INDEX IF NOT EXISTS idx_requests_client ON hire_requests(client_id);
            CREATE INDEX IF NOT EXISTS idx_requests_status_date ON hire_requests(status, date);

            CREATE TABLE IF NOT EXISTS ratings (
                appointment_id TEXT PRIMARY KEY,
                caregiver_id TEXT NOT NULL,
                client_id TEXT NOT NULL,
                stars INTEGER NOT NULL CHECK (stars BETWEEN 1 AND 5),
                comment TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_ratings_caregiver ON ratings(caregiver_id);

            CREATE TABLE IF NOT EXISTS caregiver_ratings (
                caregiver_id TEXT PRIMARY KEY,
                stars_1 INTEGER NOT NULL DEFAULT 0,
                stars_2 INTEGER NOT NULL DEFAULT 0,
                stars_3 INTEGER NOT NULL DEFAULT 0,
                stars_4 INTEGER NOT NULL DEFAULT 0,
                stars_5 INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                status TEXT NOT NULL,
                priority TEXT NOT NULL,
                channel TEXT NOT NULL,
                related_request_id TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, status);",
        )?;

        Ok(())
    }
}

// ============================================================================
// Column helpers
// ============================================================================

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn date_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn json_col<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| conversion_error(idx, e))
}

/// Parse a column holding one of our string enums
fn enum_col<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> crate::Result<T>) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    parse(&text).map_err(|e| conversion_error(idx, e))
}

const DATE_FORMAT: &str = "%Y-%m-%d";

fn date_str(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// `?N, ?N+1, ...` for `count` parameters starting at `first`
fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_creation() {
        let store = Store::in_memory().unwrap();
        assert!(store.list_caregivers().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("care.db");
        let path = path.to_str().unwrap();

        {
            let store = Store::new(path).unwrap();
            let user = crate::User::new(crate::Role::Client, "Ana", "ana@example.com");
            store.insert_user(&user).unwrap();
        }

        let store = Store::new(path).unwrap();
        assert!(store.find_user_by_email("ana@example.com").unwrap().is_some());
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1, 3), "?1, ?2, ?3");
        assert_eq!(placeholders(3, 1), "?3");
    }
}
