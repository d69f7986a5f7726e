//! Rating persistence

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use tracing::info;

use super::{time_col, Store};
use crate::rating::{Rating, RatingSummary};
use crate::{Error, Result};

fn rating_from_row(row: &Row<'_>) -> rusqlite::Result<Rating> {
    Ok(Rating {
        appointment_id: row.get(0)?,
        caregiver_id: row.get(1)?,
        client_id: row.get(2)?,
        stars: row.get(3)?,
        comment: row.get(4)?,
        created_at: time_col(row, 5)?,
    })
}

fn load_summary(conn: &rusqlite::Connection, caregiver_id: &str) -> Result<RatingSummary> {
    let histogram = conn
        .query_row(
            "SELECT stars_1, stars_2, stars_3, stars_4, stars_5
             FROM caregiver_ratings WHERE caregiver_id = ?1",
            params![caregiver_id],
            |row| {
                Ok([
                    row.get::<_, u32>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, u32>(4)?,
                ])
            },
        )
        .optional()?;

    Ok(match histogram {
        Some(h) => RatingSummary::from_histogram(caregiver_id, h),
        None => RatingSummary::empty(caregiver_id),
    })
}

impl Store {
    /// Store a rating and fold it into the caregiver summary, atomically.
    /// A second rating for the same appointment is [`Error::AlreadyRated`].
    pub fn insert_rating(&mut self, rating: &Rating) -> Result<RatingSummary> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let inserted = tx.execute(
            "INSERT INTO ratings (appointment_id, caregiver_id, client_id, stars, comment, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                rating.appointment_id,
                rating.caregiver_id,
                rating.client_id,
                rating.stars,
                rating.comment,
                rating.created_at.to_rfc3339(),
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if Error::is_constraint_violation(&e) => {
                return Err(Error::AlreadyRated(rating.appointment_id.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        let summary = load_summary(&tx, &rating.caregiver_id)?.with_rating(rating.stars)?;
        let h = summary.histogram;
        tx.execute(
            "INSERT INTO caregiver_ratings (caregiver_id, stars_1, stars_2, stars_3, stars_4, stars_5, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(caregiver_id) DO UPDATE SET
                stars_1 = excluded.stars_1, stars_2 = excluded.stars_2, stars_3 = excluded.stars_3,
                stars_4 = excluded.stars_4, stars_5 = excluded.stars_5, updated_at = excluded.updated_at",
            params![
                rating.caregiver_id,
                h[0],
                h[1],
                h[2],
                h[3],
                h[4],
                Utc::now().to_rfc3339()
            ],
        )?;

        tx.commit()?;
        info!(
            appointment = %rating.appointment_id,
            caregiver = %rating.caregiver_id,
            "Rated {} stars (average now {:.2})",
            rating.stars,
            summary.average
        );
        Ok(summary)
    }

    pub fn get_rating(&self, appointment_id: &str) -> Result<Option<Rating>> {
        let rating = self
            .conn
            .query_row(
                "SELECT appointment_id, caregiver_id, client_id, stars, comment, created_at
                 FROM ratings WHERE appointment_id = ?1",
                params![appointment_id],
                rating_from_row,
            )
            .optional()?;
        Ok(rating)
    }

    pub fn rating_summary(&self, caregiver_id: &str) -> Result<RatingSummary> {
        load_summary(&self.conn, caregiver_id)
    }

    /// Ratings for a caregiver, newest first
    pub fn list_ratings(&self, caregiver_id: &str) -> Result<Vec<Rating>> {
        let mut stmt = self.conn.prepare(
            "SELECT appointment_id, caregiver_id, client_id, stars, comment, created_at
             FROM ratings WHERE caregiver_id = ?1 ORDER BY created_at DESC",
        )?;
        let ratings = stmt
            .query_map(params![caregiver_id], rating_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ratings)
    }
}
