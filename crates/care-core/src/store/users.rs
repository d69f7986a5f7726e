//! User persistence

use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::{enum_col, json_col, time_col, Store};
use crate::user::{Role, User};
use crate::{Error, Result};

const USER_COLUMNS: &str = "id, role, full_name, email, phone, bio, hourly_rate_cents, specialties, \
     availability, favorites, payment_customer_id, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        role: enum_col(row, 1, |s| s.parse::<Role>())?,
        full_name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        bio: row.get(5)?,
        hourly_rate_cents: row.get(6)?,
        specialties: json_col(row, 7)?,
        availability: json_col(row, 8)?,
        favorites: json_col(row, 9)?,
        payment_customer_id: row.get(10)?,
        created_at: time_col(row, 11)?,
        updated_at: time_col(row, 12)?,
    })
}

impl Store {
    /// Insert a new user. Duplicate emails are a [`Error::Conflict`].
    pub fn insert_user(&self, user: &User) -> Result<()> {
        let result = self.conn.execute(
            &format!(
                "INSERT INTO users ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                USER_COLUMNS
            ),
            params![
                user.id,
                user.role.as_str(),
                user.full_name,
                user.email,
                user.phone,
                user.bio,
                user.hourly_rate_cents,
                serde_json::to_string(&user.specialties)?,
                serde_json::to_string(&user.availability)?,
                serde_json::to_string(&user.favorites)?,
                user.payment_customer_id,
                user.created_at.to_rfc3339(),
                user.updated_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => {
                debug!("Inserted user {}", user.id);
                Ok(())
            }
            Err(e) if Error::is_constraint_violation(&e) => Err(Error::Conflict(format!(
                "email already registered: {}",
                user.email
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite every mutable column of an existing user
    pub fn update_user(&self, user: &User) -> Result<()> {
        let affected = self.conn.execute(
            "UPDATE users SET full_name = ?2, phone = ?3, bio = ?4, hourly_rate_cents = ?5,
                specialties = ?6, availability = ?7, favorites = ?8, payment_customer_id = ?9,
                updated_at = ?10
             WHERE id = ?1",
            params![
                user.id,
                user.full_name,
                user.phone,
                user.bio,
                user.hourly_rate_cents,
                serde_json::to_string(&user.specialties)?,
                serde_json::to_string(&user.availability)?,
                serde_json::to_string(&user.favorites)?,
                user.payment_customer_id,
                user.updated_at.to_rfc3339(),
            ],
        )?;

        if affected == 0 {
            return Err(Error::UserNotFound(user.id.clone()));
        }
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                params![email.to_lowercase()],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Every caregiver, ordered by name
    pub fn list_caregivers(&self) -> Result<Vec<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM users WHERE role = ?1 ORDER BY full_name",
            USER_COLUMNS
        ))?;

        let users = stmt
            .query_map(params![Role::Caregiver.as_str()], user_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }
}
