//! Hire request persistence

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info};

use super::{date_col, date_str, enum_col, placeholders, time_col, Store};
use crate::booking::{BookingStatus, HireRequest, PaymentSplit, TimeSlot};
use crate::marketplace::EarningsSummary;
use crate::payment::ChargeReceipt;
use crate::{Error, Result};

const REQUEST_COLUMNS: &str = "id, client_id, caregiver_id, date, start_hour, end_hour, status, notes, \
     total_amount_cents, caregiver_amount_cents, platform_fee_cents, payment_reference, \
     payment_status, cancellation_reason, reminder_sent, created_at, updated_at";

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<HireRequest> {
    Ok(HireRequest {
        id: row.get(0)?,
        client_id: row.get(1)?,
        caregiver_id: row.get(2)?,
        date: date_col(row, 3)?,
        slot: TimeSlot {
            start_hour: row.get(4)?,
            end_hour: row.get(5)?,
        },
        status: enum_col(row, 6, |s| s.parse::<BookingStatus>())?,
        notes: row.get(7)?,
        total_amount_cents: row.get(8)?,
        caregiver_amount_cents: row.get(9)?,
        platform_fee_cents: row.get(10)?,
        payment_reference: row.get(11)?,
        payment_status: row.get(12)?,
        cancellation_reason: row.get(13)?,
        reminder_sent: row.get(14)?,
        created_at: time_col(row, 15)?,
        updated_at: time_col(row, 16)?,
    })
}

fn status_values(statuses: &[BookingStatus]) -> Vec<Value> {
    statuses
        .iter()
        .map(|s| Value::Text(s.as_str().to_string()))
        .collect()
}

fn text(value: impl Into<String>) -> Value {
    Value::Text(value.into())
}

/// A payment claim older than this no longer blocks the request
pub const PAYMENT_CLAIM_TIMEOUT_SECS: i64 = 300;

/// Fixed-width so claim times compare correctly as text
fn claim_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn claim_cutoff() -> String {
    claim_timestamp(Utc::now() - Duration::seconds(PAYMENT_CLAIM_TIMEOUT_SECS))
}

impl Store {
    /// Insert `request` unless it overlaps an active booking of the same
    /// caregiver on the same date. Check and insert share one transaction.
    pub fn insert_request_if_free(&mut self, request: &HireRequest) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let statuses = status_values(&BookingStatus::BLOCKING);
        let sql = format!(
            "SELECT id, start_hour, end_hour FROM hire_requests
             WHERE caregiver_id = ?1 AND date = ?2
               AND start_hour < ?3 AND end_hour > ?4
               AND status IN ({})
             LIMIT 1",
            placeholders(5, statuses.len())
        );

        let mut values = vec![
            text(request.caregiver_id.as_str()),
            text(date_str(request.date)),
            Value::Integer(i64::from(request.slot.end_hour)),
            Value::Integer(i64::from(request.slot.start_hour)),
        ];
        values.extend(statuses);

        let conflict: Option<(String, u8, u8)> = tx
            .query_row(&sql, params_from_iter(values.iter()), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .optional()?;

        if let Some((other_id, start, end)) = conflict {
            debug!(
                "Slot {} on {} conflicts with request {} ({:02}:00-{:02}:00)",
                request.slot, request.date, other_id, start, end
            );
            return Err(Error::SlotUnavailable(format!(
                "{} on {} is already booked",
                request.slot, request.date
            )));
        }

        tx.execute(
            &format!(
                "INSERT INTO hire_requests ({})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                REQUEST_COLUMNS
            ),
            params![
                request.id,
                request.client_id,
                request.caregiver_id,
                date_str(request.date),
                request.slot.start_hour,
                request.slot.end_hour,
                request.status.as_str(),
                request.notes,
                request.total_amount_cents,
                request.caregiver_amount_cents,
                request.platform_fee_cents,
                request.payment_reference,
                request.payment_status,
                request.cancellation_reason,
                request.reminder_sent,
                request.created_at.to_rfc3339(),
                request.updated_at.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        info!(request = %request.id, "Booked {} on {}", request.slot, request.date);
        Ok(())
    }

    pub fn get_request(&self, id: &str) -> Result<Option<HireRequest>> {
        let request = self
            .conn
            .query_row(
                &format!("SELECT {} FROM hire_requests WHERE id = ?1", REQUEST_COLUMNS),
                params![id],
                request_from_row,
            )
            .optional()?;
        Ok(request)
    }

    fn require_request(&self, id: &str) -> Result<HireRequest> {
        self.get_request(id)?
            .ok_or_else(|| Error::RequestNotFound(id.to_string()))
    }

    /// Intervals holding a caregiver's time on `date`
    pub fn booked_slots(&self, caregiver_id: &str, date: NaiveDate) -> Result<Vec<TimeSlot>> {
        let statuses = status_values(&BookingStatus::BLOCKING);
        let sql = format!(
            "SELECT start_hour, end_hour FROM hire_requests
             WHERE caregiver_id = ?1 AND date = ?2 AND status IN ({})
             ORDER BY start_hour",
            placeholders(3, statuses.len())
        );

        let mut values = vec![text(caregiver_id), text(date_str(date))];
        values.extend(statuses);

        let mut stmt = self.conn.prepare(&sql)?;
        let slots = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok(TimeSlot {
                    start_hour: row.get(0)?,
                    end_hour: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(slots)
    }

    /// Requests where `column` (client_id or caregiver_id) equals `user_id`
    fn list_for_party(
        &self,
        column: &str,
        user_id: &str,
        status: Option<BookingStatus>,
    ) -> Result<Vec<HireRequest>> {
        let mut sql = format!(
            "SELECT {} FROM hire_requests WHERE {} = ?1",
            REQUEST_COLUMNS, column
        );
        let mut values = vec![user_id.to_string()];
        if let Some(status) = status {
            sql.push_str(" AND status = ?2");
            values.push(status.as_str().to_string());
        }
        sql.push_str(" ORDER BY date DESC, start_hour DESC, created_at DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let requests = stmt
            .query_map(params_from_iter(values.iter()), request_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(requests)
    }

    pub fn list_client_requests(
        &self,
        client_id: &str,
        status: Option<BookingStatus>,
    ) -> Result<Vec<HireRequest>> {
        self.list_for_party("client_id", client_id, status)
    }

    pub fn list_caregiver_requests(
        &self,
        caregiver_id: &str,
        status: Option<BookingStatus>,
    ) -> Result<Vec<HireRequest>> {
        self.list_for_party("caregiver_id", caregiver_id, status)
    }

    /// Requests in any of `statuses` dated within `from..=to`
    pub fn list_by_status_between(
        &self,
        statuses: &[BookingStatus],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HireRequest>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM hire_requests
             WHERE date >= ?1 AND date <= ?2 AND status IN ({})
             ORDER BY date, start_hour",
            REQUEST_COLUMNS,
            placeholders(3, statuses.len())
        );
        let mut values = vec![text(date_str(from)), text(date_str(to))];
        values.extend(status_values(statuses));

        let mut stmt = self.conn.prepare(&sql)?;
        let requests = stmt
            .query_map(params_from_iter(values.iter()), request_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(requests)
    }

    /// Compare-and-set the status. Fails with [`Error::InvalidTransition`]
    /// when the move is illegal or the stored status is no longer `expected`,
    /// and with [`Error::Conflict`] while a payment holds the request.
    pub fn update_status(
        &mut self,
        id: &str,
        expected: BookingStatus,
        next: BookingStatus,
        reason: Option<&str>,
    ) -> Result<HireRequest> {
        expected.transition(next)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let affected = tx.execute(
            "UPDATE hire_requests
             SET status = ?3, cancellation_reason = COALESCE(?4, cancellation_reason), updated_at = ?5
             WHERE id = ?1 AND status = ?2
               AND (payment_claim IS NULL OR payment_claimed_at < ?6)",
            params![
                id,
                expected.as_str(),
                next.as_str(),
                reason,
                Utc::now().to_rfc3339(),
                claim_cutoff(),
            ],
        )?;
        tx.commit()?;

        if affected == 0 {
            let current = self.require_request(id)?;
            if current.status == expected {
                return Err(Error::Conflict(format!(
                    "payment for request {} is in progress",
                    id
                )));
            }
            return Err(Error::InvalidTransition {
                from: current.status,
                to: next,
            });
        }

        info!(request = %id, "Status {} -> {}", expected, next);
        self.require_request(id)
    }

    /// Reserve an accepted request for one charge. Until the claim is
    /// released or turned into a payment, no other claim and no status
    /// change succeeds. Claims older than [`PAYMENT_CLAIM_TIMEOUT_SECS`]
    /// count as abandoned.
    pub fn claim_payment(&mut self, id: &str, claim: &str) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let affected = tx.execute(
            "UPDATE hire_requests
             SET payment_claim = ?3, payment_claimed_at = ?4
             WHERE id = ?1 AND status = ?2
               AND (payment_claim IS NULL OR payment_claimed_at < ?5)",
            params![
                id,
                BookingStatus::Accepted.as_str(),
                claim,
                claim_timestamp(Utc::now()),
                claim_cutoff(),
            ],
        )?;
        tx.commit()?;

        if affected == 0 {
            let current = self.require_request(id)?;
            if current.status == BookingStatus::Accepted {
                return Err(Error::Conflict(format!(
                    "payment for request {} is already in progress",
                    id
                )));
            }
            return Err(Error::InvalidTransition {
                from: current.status,
                to: BookingStatus::Paid,
            });
        }

        debug!(request = %id, "Payment claimed");
        Ok(())
    }

    /// Drop `claim` after a failed charge
    pub fn release_payment_claim(&mut self, id: &str, claim: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE hire_requests SET payment_claim = NULL, payment_claimed_at = NULL
             WHERE id = ?1 AND payment_claim = ?2",
            params![id, claim],
        )?;
        Ok(())
    }

    /// Move accepted -> paid under `claim`, recording the split and the charge
    pub fn mark_paid(
        &mut self,
        id: &str,
        split: &PaymentSplit,
        receipt: &ChargeReceipt,
        claim: &str,
    ) -> Result<HireRequest> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let affected = tx.execute(
            "UPDATE hire_requests
             SET status = ?3, caregiver_amount_cents = ?4, platform_fee_cents = ?5,
                 payment_reference = ?6, payment_status = ?7, updated_at = ?8,
                 payment_claim = NULL, payment_claimed_at = NULL
             WHERE id = ?1 AND status = ?2 AND total_amount_cents = ?9 AND payment_claim = ?10",
            params![
                id,
                BookingStatus::Accepted.as_str(),
                BookingStatus::Paid.as_str(),
                split.caregiver_amount_cents,
                split.platform_fee_cents,
                receipt.reference,
                receipt.status,
                Utc::now().to_rfc3339(),
                split.total_cents,
                claim,
            ],
        )?;
        tx.commit()?;

        if affected == 0 {
            let current = self.require_request(id)?;
            if current.status == BookingStatus::Accepted {
                return Err(Error::Conflict(format!(
                    "request {} changed before payment was recorded",
                    id
                )));
            }
            return Err(Error::InvalidTransition {
                from: current.status,
                to: BookingStatus::Paid,
            });
        }

        info!(request = %id, reference = %receipt.reference, "Payment recorded");
        self.require_request(id)
    }

    /// Flag the reminder as sent. False when it already was.
    pub fn mark_reminder_sent(&self, id: &str) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE hire_requests SET reminder_sent = 1 WHERE id = ?1 AND reminder_sent = 0",
            params![id],
        )?;
        Ok(affected == 1)
    }

    /// Aggregate a caregiver's bookings; `today` bounds "upcoming"
    pub fn earnings(&self, caregiver_id: &str, today: NaiveDate) -> Result<EarningsSummary> {
        let (total_earned_cents, platform_fees_cents): (i64, i64) = self.conn.query_row(
            "SELECT COALESCE(SUM(caregiver_amount_cents), 0), COALESCE(SUM(platform_fee_cents), 0)
             FROM hire_requests
             WHERE caregiver_id = ?1 AND status IN ('paid', 'completed')",
            params![caregiver_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let count = |extra: &str, today: Option<String>| -> Result<u32> {
            let sql = format!(
                "SELECT COUNT(*) FROM hire_requests WHERE caregiver_id = ?1 AND {}",
                extra
            );
            let n: i64 = match today {
                Some(day) => self.conn.query_row(&sql, params![caregiver_id, day], |r| r.get(0))?,
                None => self.conn.query_row(&sql, params![caregiver_id], |r| r.get(0))?,
            };
            Ok(n as u32)
        };

        Ok(EarningsSummary {
            caregiver_id: caregiver_id.to_string(),
            total_earned_cents,
            platform_fees_cents,
            completed_count: count("status = 'completed'", None)?,
            upcoming_count: count(
                "status IN ('accepted', 'paid') AND date >= ?2",
                Some(date_str(today)),
            )?,
            pending_count: count("status = 'pending'", None)?,
        })
    }
}
