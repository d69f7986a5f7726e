//! Time-driven housekeeping: reminders, auto-completion, expiry

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, info};

use super::Marketplace;
use crate::booking::{BookingStatus, HireRequest};
use crate::notification::{Notification, NotificationKind};
use crate::{Error, Result};

pub const EXPIRED_REASON: &str = "expired";

/// Counts of what one maintenance pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub reminders_sent: usize,
    pub completed: usize,
    pub expired: usize,
}

impl Marketplace {
    /// Remind both parties of tomorrow's accepted or paid appointments.
    /// Each appointment is reminded once.
    pub async fn send_reminders(&self, now: NaiveDateTime) -> Result<usize> {
        let tomorrow = now.date() + Duration::days(1);
        let due: Vec<HireRequest> = self
            .store()?
            .list_by_status_between(&[BookingStatus::Accepted, BookingStatus::Paid], tomorrow, tomorrow)?
            .into_iter()
            .filter(|r| !r.reminder_sent)
            .collect();

        let mut sent = 0;
        for request in &due {
            // Another run may have reminded this one since it was listed
            if !self.store()?.mark_reminder_sent(&request.id)? {
                debug!(request = %request.id, "Reminder already sent");
                continue;
            }
            let message = format!("Appointment tomorrow, {} on {}", request.slot, request.date);
            for user in [&request.client_id, &request.caregiver_id] {
                self.notify(
                    Notification::new(user, NotificationKind::Reminder, "Appointment reminder", &message)
                        .for_request(&request.id),
                )
                .await;
            }
            sent += 1;
        }

        if sent > 0 {
            info!("Sent reminders for {} appointments", sent);
        }
        Ok(sent)
    }

    /// Complete paid appointments that have ended
    pub async fn complete_finished(&self, now: NaiveDateTime) -> Result<usize> {
        let candidates = self.store()?.list_by_status_between(
            &[BookingStatus::Paid],
            NaiveDate::default(),
            now.date(),
        )?;

        let mut completed = 0;
        for request in candidates.into_iter().filter(|r| r.ends_at() <= now) {
            let updated = self.store()?.update_status(
                &request.id,
                BookingStatus::Paid,
                BookingStatus::Completed,
                None,
            );
            match updated {
                Ok(done) => {
                    self.notify_completed(&done).await;
                    completed += 1;
                }
                Err(Error::InvalidTransition { from, .. }) => {
                    debug!(request = %request.id, "Already moved to {}", from);
                }
                Err(e) => return Err(e),
            }
        }

        if completed > 0 {
            info!("Auto-completed {} appointments", completed);
        }
        Ok(completed)
    }

    /// Cancel pending or accepted requests whose start time has passed
    pub async fn expire_stale(&self, now: NaiveDateTime) -> Result<usize> {
        let candidates = self.store()?.list_by_status_between(
            &[BookingStatus::Pending, BookingStatus::Accepted],
            NaiveDate::default(),
            now.date(),
        )?;

        let mut expired = 0;
        for request in candidates.into_iter().filter(|r| r.starts_at() <= now) {
            let updated = self.store()?.update_status(
                &request.id,
                request.status,
                BookingStatus::Cancelled,
                Some(EXPIRED_REASON),
            );
            match updated {
                Ok(cancelled) => {
                    let message = format!(
                        "{} on {} expired before it was {}",
                        cancelled.slot,
                        cancelled.date,
                        if request.status == BookingStatus::Pending {
                            "accepted"
                        } else {
                            "paid"
                        }
                    );
                    for user in [&cancelled.client_id, &cancelled.caregiver_id] {
                        self.notify(
                            Notification::new(user, NotificationKind::BookingCancelled, "Booking expired", &message)
                                .for_request(&cancelled.id),
                        )
                        .await;
                    }
                    expired += 1;
                }
                Err(Error::InvalidTransition { from, .. }) => {
                    debug!(request = %request.id, "Already moved to {}", from);
                }
                Err(Error::Conflict(reason)) => {
                    debug!(request = %request.id, "Skipped: {}", reason);
                }
                Err(e) => return Err(e),
            }
        }

        if expired > 0 {
            info!("Expired {} stale requests", expired);
        }
        Ok(expired)
    }

    /// Run every maintenance job once
    pub async fn run_maintenance(&self, now: NaiveDateTime) -> Result<MaintenanceReport> {
        Ok(MaintenanceReport {
            reminders_sent: self.send_reminders(now).await?,
            completed: self.complete_finished(now).await?,
            expired: self.expire_stale(now).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::NewHireRequest;
    use crate::marketplace::fixtures::{caregiver, client, day};

    fn at(d: u32, hour: u32) -> NaiveDateTime {
        day(d).and_hms_opt(hour, 0, 0).unwrap()
    }

    async fn book(market: &Marketplace, client_id: &str, caregiver_id: &str, d: u32) -> HireRequest {
        market
            .request_booking(
                client_id,
                NewHireRequest {
                    caregiver_id: caregiver_id.to_string(),
                    date: day(d),
                    start_hour: 9,
                    end_hour: 11,
                    notes: None,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_reminders_sent_once() {
        let market = Marketplace::in_memory().unwrap();
        let cg = caregiver(&market, "Carla");
        let cl = client(&market, "Kim");
        let accepted = book(&market, &cl.id, &cg.id, 14).await;
        market.accept(&cg.id, &accepted.id).await.unwrap();
        // Pending requests get no reminder
        book(&market, &cl.id, &cg.id, 15).await;

        assert_eq!(market.send_reminders(at(13, 18)).await.unwrap(), 1);
        assert_eq!(market.send_reminders(at(13, 19)).await.unwrap(), 0);

        let reminders = market
            .list_notifications(&cl.id, false)
            .unwrap()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::Reminder)
            .count();
        assert_eq!(reminders, 1);
        assert!(market.get_request(&cl.id, &accepted.id).unwrap().reminder_sent);
    }

    #[tokio::test]
    async fn test_complete_finished_only_after_end() {
        let market = Marketplace::in_memory().unwrap();
        let cg = caregiver(&market, "Carla");
        let cl = client(&market, "Kim");
        let req = book(&market, &cl.id, &cg.id, 13).await;
        market.accept(&cg.id, &req.id).await.unwrap();
        market.pay(&cl.id, &req.id).await.unwrap();

        assert_eq!(market.complete_finished(at(13, 10)).await.unwrap(), 0);
        assert_eq!(market.complete_finished(at(13, 11)).await.unwrap(), 1);
        assert_eq!(
            market.get_request(&cl.id, &req.id).unwrap().status,
            BookingStatus::Completed
        );
        assert_eq!(market.complete_finished(at(14, 0)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expire_stale() {
        let market = Marketplace::in_memory().unwrap();
        let cg = caregiver(&market, "Carla");
        let cl = client(&market, "Kim");
        let pending = book(&market, &cl.id, &cg.id, 13).await;
        let accepted = book(&market, &cl.id, &cg.id, 14).await;
        market.accept(&cg.id, &accepted.id).await.unwrap();
        let paid = book(&market, &cl.id, &cg.id, 15).await;
        market.accept(&cg.id, &paid.id).await.unwrap();
        market.pay(&cl.id, &paid.id).await.unwrap();

        assert_eq!(market.expire_stale(at(13, 8)).await.unwrap(), 0);
        assert_eq!(market.expire_stale(at(20, 0)).await.unwrap(), 2);

        for id in [&pending.id, &accepted.id] {
            let request = market.get_request(&cl.id, id).unwrap();
            assert_eq!(request.status, BookingStatus::Cancelled);
            assert_eq!(request.cancellation_reason.as_deref(), Some(EXPIRED_REASON));
        }
        assert_eq!(
            market.get_request(&cl.id, &paid.id).unwrap().status,
            BookingStatus::Paid
        );
    }

    #[tokio::test]
    async fn test_run_maintenance_report() {
        let market = Marketplace::in_memory().unwrap();
        let cg = caregiver(&market, "Carla");
        let cl = client(&market, "Kim");
        let paid = book(&market, &cl.id, &cg.id, 13).await;
        market.accept(&cg.id, &paid.id).await.unwrap();
        market.pay(&cl.id, &paid.id).await.unwrap();
        book(&market, &cl.id, &cg.id, 14).await;

        let report = market.run_maintenance(at(14, 12)).await.unwrap();
        assert_eq!(
            report,
            MaintenanceReport {
                reminders_sent: 0,
                completed: 1,
                expired: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_overlapping_reminder_runs_send_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = crate::Config::default();
        config.database.db_path = dir.path().join("care.db").to_string_lossy().to_string();
        let first = Marketplace::open(&config).unwrap();
        let second = Marketplace::open(&config).unwrap();

        let cg = caregiver(&first, "Carla");
        let cl = client(&first, "Kim");
        let req = book(&first, &cl.id, &cg.id, 14).await;
        first.accept(&cg.id, &req.id).await.unwrap();

        let (a, b) = tokio::join!(
            first.send_reminders(at(13, 18)),
            second.send_reminders(at(13, 18))
        );
        assert_eq!(a.unwrap() + b.unwrap(), 1);

        let reminders = first
            .list_notifications(&cg.id, false)
            .unwrap()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::Reminder)
            .count();
        assert_eq!(reminders, 1);
    }

    #[tokio::test]
    async fn test_expiry_skips_request_being_paid() {
        let market = Marketplace::in_memory().unwrap();
        let cg = caregiver(&market, "Carla");
        let cl = client(&market, "Kim");
        let req = book(&market, &cl.id, &cg.id, 13).await;
        market.accept(&cg.id, &req.id).await.unwrap();
        market.store().unwrap().claim_payment(&req.id, "in-flight").unwrap();

        assert_eq!(market.expire_stale(at(20, 0)).await.unwrap(), 0);
        assert_eq!(
            market.get_request(&cl.id, &req.id).unwrap().status,
            BookingStatus::Accepted
        );
    }
}
