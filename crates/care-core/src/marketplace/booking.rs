//! Booking lifecycle: request, accept/reject, cancel, pay, complete

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::Marketplace;
use crate::booking::slots;
use crate::booking::{pricing, BookingStatus, HireRequest, NewHireRequest, TimeSlot};
use crate::notification::{Notification, NotificationKind};
use crate::payment::{ChargeReceipt, ChargeRequest, CustomerRequest};
use crate::user::{Role, User};
use crate::{Error, Result};

impl Marketplace {
    /// Book a caregiver for a contiguous block of hours
    pub async fn request_booking(&self, client_id: &str, input: NewHireRequest) -> Result<HireRequest> {
        if client_id == input.caregiver_id {
            return Err(Error::Validation("cannot book yourself".to_string()));
        }
        self.user_with_role(client_id, Role::Client)?;
        let caregiver = self.get_user(&input.caregiver_id)?;
        if !caregiver.is_caregiver() {
            return Err(Error::Validation(format!("{} is not a caregiver", input.caregiver_id)));
        }

        if input.date < Utc::now().date_naive() {
            return Err(Error::Validation(format!("{} is in the past", input.date)));
        }
        let slot = TimeSlot::new(input.start_hour, input.end_hour)?;
        if !self.grid.contains(&slot) {
            return Err(Error::Validation(format!(
                "{} is outside bookable hours {:02}:00-{:02}:00",
                slot,
                self.grid.first_hour(),
                self.grid.last_hour()
            )));
        }
        if slot.hours() > self.max_booking_hours {
            return Err(Error::Validation(format!(
                "bookings are limited to {} hours",
                self.max_booking_hours
            )));
        }
        let offered = caregiver.availability.offered_on(input.date);
        if !slot.start_hours().all(|h| offered.contains(&h)) {
            return Err(Error::SlotUnavailable(format!(
                "caregiver does not offer {} on {}",
                slot, input.date
            )));
        }

        let rate = caregiver
            .hourly_rate_cents
            .ok_or_else(|| Error::Validation("caregiver has no hourly rate".to_string()))?;
        let total = pricing::quote(rate, slot.hours())?;
        let request = HireRequest::new(client_id, &caregiver.id, input.date, slot, total)
            .with_notes(input.notes);

        self.store()?.insert_request_if_free(&request)?;

        self.notify(
            Notification::new(
                &request.caregiver_id,
                NotificationKind::BookingRequested,
                "New booking request",
                format!("{} on {}", request.slot, request.date),
            )
            .for_request(&request.id),
        )
        .await;
        Ok(request)
    }

    /// Load a request and move it to `next`, after `authorize` approves the actor.
    /// The store only applies the move if the status is still the one loaded here.
    fn change_status(
        &self,
        id: &str,
        next: BookingStatus,
        reason: Option<&str>,
        authorize: impl FnOnce(&HireRequest) -> Result<()>,
    ) -> Result<HireRequest> {
        let mut store = self.store()?;
        let current = store
            .get_request(id)?
            .ok_or_else(|| Error::RequestNotFound(id.to_string()))?;
        authorize(&current)?;
        store.update_status(id, current.status, next, reason)
    }

    fn owner_caregiver(caregiver_id: &str) -> impl FnOnce(&HireRequest) -> Result<()> + '_ {
        move |request: &HireRequest| {
            if request.caregiver_id == caregiver_id {
                Ok(())
            } else {
                Err(Error::Forbidden(format!(
                    "request {} belongs to another caregiver",
                    request.id
                )))
            }
        }
    }

    pub async fn accept(&self, caregiver_id: &str, id: &str) -> Result<HireRequest> {
        let request = self.change_status(
            id,
            BookingStatus::Accepted,
            None,
            Self::owner_caregiver(caregiver_id),
        )?;
        self.notify(
            Notification::new(
                &request.client_id,
                NotificationKind::BookingAccepted,
                "Booking accepted",
                format!("{} on {} is confirmed, payment is due", request.slot, request.date),
            )
            .for_request(&request.id),
        )
        .await;
        Ok(request)
    }

    pub async fn reject(&self, caregiver_id: &str, id: &str) -> Result<HireRequest> {
        let request = self.change_status(
            id,
            BookingStatus::Rejected,
            None,
            Self::owner_caregiver(caregiver_id),
        )?;
        self.notify(
            Notification::new(
                &request.client_id,
                NotificationKind::BookingRejected,
                "Booking declined",
                format!("{} on {} was declined", request.slot, request.date),
            )
            .for_request(&request.id),
        )
        .await;
        Ok(request)
    }

    /// Either party may cancel while the request is pending or accepted
    pub async fn cancel(&self, actor_id: &str, id: &str, reason: Option<String>) -> Result<HireRequest> {
        let reason = reason.filter(|r| !r.trim().is_empty());
        let request = self.change_status(id, BookingStatus::Cancelled, reason.as_deref(), |request| {
            if request.is_party(actor_id) {
                Ok(())
            } else {
                Err(Error::Forbidden(format!("not a party to request {}", request.id)))
            }
        })?;

        let other = if request.client_id == actor_id {
            &request.caregiver_id
        } else {
            &request.client_id
        };
        let message = match &request.cancellation_reason {
            Some(reason) => format!("{} on {} was cancelled: {}", request.slot, request.date, reason),
            None => format!("{} on {} was cancelled", request.slot, request.date),
        };
        self.notify(
            Notification::new(other, NotificationKind::BookingCancelled, "Booking cancelled", message)
                .for_request(&request.id),
        )
        .await;
        Ok(request)
    }

    pub async fn complete(&self, caregiver_id: &str, id: &str) -> Result<HireRequest> {
        let request = self.change_status(
            id,
            BookingStatus::Completed,
            None,
            Self::owner_caregiver(caregiver_id),
        )?;
        self.notify_completed(&request).await;
        Ok(request)
    }

    pub(crate) async fn notify_completed(&self, request: &HireRequest) {
        self.notify(
            Notification::new(
                &request.client_id,
                NotificationKind::AppointmentCompleted,
                "Appointment completed",
                format!("How was {} on {}? Leave a rating", request.slot, request.date),
            )
            .for_request(&request.id),
        )
        .await;
    }

    /// Charge the client for an accepted request and record the split.
    /// The request is claimed first, so it is charged at most once and
    /// cannot be cancelled while the charge is in flight. A failed charge
    /// releases the claim and leaves the request accepted.
    pub async fn pay(&self, client_id: &str, id: &str) -> Result<HireRequest> {
        let (request, client) = {
            let store = self.store()?;
            let request = store
                .get_request(id)?
                .ok_or_else(|| Error::RequestNotFound(id.to_string()))?;
            if request.client_id != client_id {
                return Err(Error::Forbidden(format!("request {} belongs to another client", id)));
            }
            request.status.transition(BookingStatus::Paid)?;
            let client = store
                .get_user(client_id)?
                .ok_or_else(|| Error::UserNotFound(client_id.to_string()))?;
            (request, client)
        };
        let split = pricing::split(request.total_amount_cents, self.platform_fee_percent)?;

        let claim = Uuid::new_v4().to_string();
        self.store()?.claim_payment(id, &claim)?;

        let receipt = match self.charge(&request, client, split.total_cents).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(request = %id, gateway = self.gateway.name(), "Charge failed: {}", e);
                if let Err(release) = self
                    .store()
                    .and_then(|mut store| store.release_payment_claim(id, &claim))
                {
                    error!(request = %id, "Failed to release payment claim: {}", release);
                }
                return Err(e);
            }
        };

        let paid = self
            .store()?
            .mark_paid(id, &split, &receipt, &claim)
            .inspect_err(|e| {
                error!(
                    request = %id,
                    reference = %receipt.reference,
                    "Charge issued but not recorded: {}", e
                )
            })?;
        self.notify(
            Notification::new(
                &paid.caregiver_id,
                NotificationKind::PaymentReceived,
                "Payment received",
                format!(
                    "{} on {} was paid, your share is {} cents",
                    paid.slot, paid.date, split.caregiver_amount_cents
                ),
            )
            .for_request(&paid.id),
        )
        .await;
        Ok(paid)
    }

    /// Register the customer if needed and issue the charge. The request id
    /// travels as the gateway's external reference.
    async fn charge(
        &self,
        request: &HireRequest,
        client: User,
        amount_cents: i64,
    ) -> Result<ChargeReceipt> {
        let customer_id = self.ensure_customer(client).await?;
        self.gateway
            .create_charge(&ChargeRequest {
                customer_id,
                request_id: request.id.clone(),
                amount_cents,
                due_date: Utc::now().date_naive(),
                description: format!("Care appointment {} on {}", request.slot, request.date),
            })
            .await
    }

    /// Gateway customer id of `client`, registering it on first use
    async fn ensure_customer(&self, client: User) -> Result<String> {
        if let Some(existing) = client.payment_customer_id {
            return Ok(existing);
        }

        let customer_id = self
            .gateway
            .create_customer(&CustomerRequest {
                user_id: client.id.clone(),
                name: client.full_name.clone(),
                email: client.email.clone(),
                phone: client.phone.clone(),
            })
            .await?;

        let store = self.store()?;
        let mut fresh = store
            .get_user(&client.id)?
            .ok_or_else(|| Error::UserNotFound(client.id.clone()))?;
        if let Some(existing) = fresh.payment_customer_id {
            // A concurrent payment registered first
            return Ok(existing);
        }
        fresh.payment_customer_id = Some(customer_id.clone());
        fresh.updated_at = Utc::now();
        store.update_user(&fresh)?;
        info!(user = %client.id, gateway = self.gateway.name(), "Registered payment customer");
        Ok(customer_id)
    }

    /// A request, visible only to its client and caregiver
    pub fn get_request(&self, actor_id: &str, id: &str) -> Result<HireRequest> {
        let request = self
            .store()?
            .get_request(id)?
            .ok_or_else(|| Error::RequestNotFound(id.to_string()))?;
        if !request.is_party(actor_id) {
            return Err(Error::Forbidden(format!("not a party to request {}", id)));
        }
        Ok(request)
    }

    pub fn list_client_requests(
        &self,
        client_id: &str,
        status: Option<BookingStatus>,
    ) -> Result<Vec<HireRequest>> {
        self.store()?.list_client_requests(client_id, status)
    }

    pub fn list_caregiver_requests(
        &self,
        caregiver_id: &str,
        status: Option<BookingStatus>,
    ) -> Result<Vec<HireRequest>> {
        self.store()?.list_caregiver_requests(caregiver_id, status)
    }

    /// Requests of `user_id` in whichever role they hold
    pub fn list_requests(&self, user_id: &str, status: Option<BookingStatus>) -> Result<Vec<HireRequest>> {
        let user = self.get_user(user_id)?;
        match user.role {
            Role::Client => self.list_client_requests(user_id, status),
            Role::Caregiver => self.list_caregiver_requests(user_id, status),
        }
    }

    /// Free one-hour slots of a caregiver on `date`
    pub fn available_slots(&self, caregiver_id: &str, date: chrono::NaiveDate) -> Result<Vec<TimeSlot>> {
        let store = self.store()?;
        let caregiver = store
            .get_user(caregiver_id)?
            .ok_or_else(|| Error::UserNotFound(caregiver_id.to_string()))?;
        if !caregiver.is_caregiver() {
            return Err(Error::Validation(format!("{} is not a caregiver", caregiver_id)));
        }
        let booked = store.booked_slots(caregiver_id, date)?;
        let free = slots::available_slots(&self.grid, &caregiver.availability.offered_on(date), &booked);
        debug!(caregiver = %caregiver_id, "{} free slots on {}", free.len(), date);
        Ok(free)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::booking::{BookingStatus, NewHireRequest, TimeSlot};
    use crate::marketplace::fixtures::{caregiver, client, day};
    use crate::marketplace::Marketplace;
    use crate::notification::NotificationKind;
    use crate::payment::{ChargeReceipt, ChargeRequest, CustomerRequest, PaymentGateway};
    use crate::user::{Availability, DayOfWeek};
    use crate::{Config, Error, Result};

    fn booking(caregiver_id: &str, d: u32, start: u8, end: u8) -> NewHireRequest {
        NewHireRequest {
            caregiver_id: caregiver_id.to_string(),
            date: day(d),
            start_hour: start,
            end_hour: end,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let market = Marketplace::in_memory().unwrap();
        let cg = caregiver(&market, "Carla");
        let cl = client(&market, "Kim");

        let req = market.request_booking(&cl.id, booking(&cg.id, 13, 9, 12)).await.unwrap();
        assert_eq!(req.status, BookingStatus::Pending);
        assert_eq!(req.total_amount_cents, 15_000);

        market.accept(&cg.id, &req.id).await.unwrap();
        let paid = market.pay(&cl.id, &req.id).await.unwrap();
        assert_eq!(paid.status, BookingStatus::Paid);
        assert_eq!(paid.platform_fee_cents, Some(3_000));
        assert_eq!(paid.caregiver_amount_cents, Some(12_000));
        assert!(paid.payment_reference.unwrap().starts_with("pay_offline_"));
        assert_eq!(
            market.get_user(&cl.id).unwrap().payment_customer_id.as_deref(),
            Some(format!("cus_offline_{}", cl.id).as_str())
        );

        let done = market.complete(&cg.id, &req.id).await.unwrap();
        assert_eq!(done.status, BookingStatus::Completed);

        // Caregiver heard about the request and the payment
        let inbox = market.list_notifications(&cg.id, false).unwrap();
        assert_eq!(inbox.len(), 2);
        assert_eq!(market.list_notifications(&cl.id, false).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_booking_validation() {
        let market = Marketplace::in_memory().unwrap();
        let cg = caregiver(&market, "Carla");
        let cl = client(&market, "Kim");

        let cases = [
            booking(&cg.id, 13, 7, 9),  // before grid
            booking(&cg.id, 13, 18, 21), // after grid
            booking(&cg.id, 13, 10, 10), // empty
            booking(&cg.id, 13, 8, 17), // too long
        ];
        for case in cases {
            assert!(matches!(
                market.request_booking(&cl.id, case).await,
                Err(Error::Validation(_))
            ));
        }

        let mut past = booking(&cg.id, 13, 9, 10);
        past.date = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert!(matches!(market.request_booking(&cl.id, past).await, Err(Error::Validation(_))));

        assert!(matches!(
            market.request_booking(&cg.id, booking(&cg.id, 13, 9, 10)).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            market.request_booking(&cg.id, booking(&cl.id, 13, 9, 10)).await,
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            market.request_booking(&cl.id, booking("ghost", 13, 9, 10)).await,
            Err(Error::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_hours_must_be_offered() {
        let market = Marketplace::in_memory().unwrap();
        let cg = caregiver(&market, "Carla");
        let cl = client(&market, "Kim");
        // 2030-05-13 is a Monday
        market
            .set_availability(&cg.id, Availability::new().with_hours(DayOfWeek::Monday, 9..11))
            .unwrap();

        market.request_booking(&cl.id, booking(&cg.id, 13, 9, 11)).await.unwrap();
        assert!(matches!(
            market.request_booking(&cl.id, booking(&cg.id, 14, 9, 10)).await,
            Err(Error::SlotUnavailable(_))
        ));
        assert!(matches!(
            market.request_booking(&cl.id, booking(&cg.id, 20, 10, 12)).await,
            Err(Error::SlotUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_available_slots_follow_bookings() {
        let market = Marketplace::in_memory().unwrap();
        let cg = caregiver(&market, "Carla");
        let cl = client(&market, "Kim");

        assert_eq!(market.available_slots(&cg.id, day(13)).unwrap().len(), 12);
        let req = market.request_booking(&cl.id, booking(&cg.id, 13, 9, 12)).await.unwrap();
        let free = market.available_slots(&cg.id, day(13)).unwrap();
        assert_eq!(free.len(), 9);
        assert!(!free.contains(&TimeSlot::hour(10)));

        market.reject(&cg.id, &req.id).await.unwrap();
        assert_eq!(market.available_slots(&cg.id, day(13)).unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_only_owner_caregiver_acts() {
        let market = Marketplace::in_memory().unwrap();
        let cg = caregiver(&market, "Carla");
        let other = caregiver(&market, "Olga");
        let cl = client(&market, "Kim");
        let req = market.request_booking(&cl.id, booking(&cg.id, 13, 9, 10)).await.unwrap();

        assert!(matches!(market.accept(&other.id, &req.id).await, Err(Error::Forbidden(_))));
        assert!(matches!(market.accept(&cl.id, &req.id).await, Err(Error::Forbidden(_))));
        assert!(matches!(market.get_request(&other.id, &req.id), Err(Error::Forbidden(_))));
        assert!(matches!(market.accept(&cg.id, "missing").await, Err(Error::RequestNotFound(_))));
    }

    #[tokio::test]
    async fn test_illegal_transitions() {
        let market = Marketplace::in_memory().unwrap();
        let cg = caregiver(&market, "Carla");
        let cl = client(&market, "Kim");
        let req = market.request_booking(&cl.id, booking(&cg.id, 13, 9, 10)).await.unwrap();

        // Cannot pay or complete before acceptance
        assert!(matches!(market.pay(&cl.id, &req.id).await, Err(Error::InvalidTransition { .. })));
        assert!(matches!(
            market.complete(&cg.id, &req.id).await,
            Err(Error::InvalidTransition { .. })
        ));

        let cancelled = market
            .cancel(&cl.id, &req.id, Some("Plans changed".to_string()))
            .await
            .unwrap();
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Plans changed"));
        assert!(matches!(
            market.accept(&cg.id, &req.id).await,
            Err(Error::InvalidTransition {
                from: BookingStatus::Cancelled,
                to: BookingStatus::Accepted
            })
        ));
        let inbox = market.list_notifications(&cg.id, false).unwrap();
        let cancel_note = inbox
            .iter()
            .find(|n| n.kind == NotificationKind::BookingCancelled)
            .unwrap();
        assert!(cancel_note.message.contains("Plans changed"));
    }

    #[tokio::test]
    async fn test_paid_request_cannot_be_cancelled() {
        let market = Marketplace::in_memory().unwrap();
        let cg = caregiver(&market, "Carla");
        let cl = client(&market, "Kim");
        let req = market.request_booking(&cl.id, booking(&cg.id, 13, 9, 10)).await.unwrap();
        market.accept(&cg.id, &req.id).await.unwrap();
        market.pay(&cl.id, &req.id).await.unwrap();

        assert!(matches!(
            market.cancel(&cg.id, &req.id, None).await,
            Err(Error::InvalidTransition { .. })
        ));
        assert!(matches!(market.pay(&cl.id, &req.id).await, Err(Error::InvalidTransition { .. })));
    }

    struct DecliningGateway;

    #[async_trait]
    impl PaymentGateway for DecliningGateway {
        fn name(&self) -> &str {
            "declining"
        }

        async fn create_customer(&self, request: &CustomerRequest) -> Result<String> {
            Ok(format!("cus_{}", request.user_id))
        }

        async fn create_charge(&self, _request: &ChargeRequest) -> Result<ChargeReceipt> {
            Err(Error::Payment("card declined".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_charge_keeps_request_accepted() {
        let market = Marketplace::in_memory()
            .unwrap()
            .with_gateway(Arc::new(DecliningGateway));
        let cg = caregiver(&market, "Carla");
        let cl = client(&market, "Kim");
        let req = market.request_booking(&cl.id, booking(&cg.id, 13, 9, 10)).await.unwrap();
        market.accept(&cg.id, &req.id).await.unwrap();

        assert!(matches!(market.pay(&cl.id, &req.id).await, Err(Error::Payment(_))));
        let current = market.get_request(&cl.id, &req.id).unwrap();
        assert_eq!(current.status, BookingStatus::Accepted);
        assert_eq!(current.payment_reference, None);

        // The claim was released: the client may still cancel
        let cancelled = market.cancel(&cl.id, &req.id, None).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    /// Takes a while to charge and counts every charge it issues
    #[derive(Default)]
    struct SlowGateway {
        charges: AtomicUsize,
    }

    #[async_trait]
    impl PaymentGateway for SlowGateway {
        fn name(&self) -> &str {
            "slow"
        }

        async fn create_customer(&self, request: &CustomerRequest) -> Result<String> {
            Ok(format!("cus_{}", request.user_id))
        }

        async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let n = self.charges.fetch_add(1, Ordering::SeqCst);
            Ok(ChargeReceipt {
                reference: format!("pay_{}_{}", request.request_id, n),
                status: "PENDING".to_string(),
            })
        }
    }

    async fn accepted_with(gateway: Arc<SlowGateway>) -> (Arc<Marketplace>, String, String, String) {
        let market = Arc::new(Marketplace::in_memory().unwrap().with_gateway(gateway));
        let cg = caregiver(&market, "Carla");
        let cl = client(&market, "Kim");
        let req = market.request_booking(&cl.id, booking(&cg.id, 13, 9, 10)).await.unwrap();
        market.accept(&cg.id, &req.id).await.unwrap();
        (market, cg.id, cl.id, req.id)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_payments_charge_once() {
        let gateway = Arc::new(SlowGateway::default());
        let (market, _, client_id, id) = accepted_with(gateway.clone()).await;

        let tasks = (0..2).map(|_| {
            let market = market.clone();
            let client_id = client_id.clone();
            let id = id.clone();
            tokio::spawn(async move { market.pay(&client_id, &id).await })
        });
        let results = futures::future::join_all(tasks).await;

        assert_eq!(results.iter().filter(|r| matches!(r, Ok(Ok(_)))).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Ok(Err(Error::Conflict(_)))))
                .count(),
            1
        );
        assert_eq!(gateway.charges.load(Ordering::SeqCst), 1);

        let paid = market.get_request(&client_id, &id).unwrap();
        assert_eq!(paid.status, BookingStatus::Paid);
        assert_eq!(paid.payment_status.as_deref(), Some("PENDING"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancel_waits_out_payment_in_flight() {
        let gateway = Arc::new(SlowGateway::default());
        let (market, caregiver_id, client_id, id) = accepted_with(gateway.clone()).await;

        let paying = {
            let market = market.clone();
            let client_id = client_id.clone();
            let id = id.clone();
            tokio::spawn(async move { market.pay(&client_id, &id).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(matches!(
            market.cancel(&caregiver_id, &id, None).await,
            Err(Error::Conflict(_))
        ));
        let paid = paying.await.unwrap().unwrap();
        assert_eq!(paid.status, BookingStatus::Paid);
        assert_eq!(gateway.charges.load(Ordering::SeqCst), 1);
        assert_eq!(
            market.get_request(&client_id, &id).unwrap().payment_reference,
            paid.payment_reference
        );
    }

    #[tokio::test]
    async fn test_pay_after_cancel_issues_no_charge() {
        let gateway = Arc::new(SlowGateway::default());
        let (market, _, client_id, id) = accepted_with(gateway.clone()).await;

        market.cancel(&client_id, &id, None).await.unwrap();
        assert!(matches!(
            market.pay(&client_id, &id).await,
            Err(Error::InvalidTransition { from: BookingStatus::Cancelled, .. })
        ));
        assert_eq!(gateway.charges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_list_requests_by_role() {
        let market = Marketplace::in_memory().unwrap();
        let cg = caregiver(&market, "Carla");
        let cl = client(&market, "Kim");
        let first = market.request_booking(&cl.id, booking(&cg.id, 13, 9, 10)).await.unwrap();
        market.request_booking(&cl.id, booking(&cg.id, 14, 9, 10)).await.unwrap();
        market.accept(&cg.id, &first.id).await.unwrap();

        assert_eq!(market.list_requests(&cl.id, None).unwrap().len(), 2);
        let accepted = market
            .list_requests(&cg.id, Some(BookingStatus::Accepted))
            .unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].id, first.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_overlapping_bookings_one_wins() {
        let market = Arc::new(Marketplace::in_memory().unwrap());
        let cg = caregiver(&market, "Carla");
        let clients: Vec<_> = (0..8).map(|i| client(&market, &format!("Client{}", i))).collect();

        let tasks = clients.iter().enumerate().map(|(i, cl)| {
            let market = market.clone();
            let client_id = cl.id.clone();
            // Every request overlaps 10:00-11:00
            let input = booking(&cg.id, 13, 9 + (i % 2) as u8, 11);
            tokio::spawn(async move { market.request_booking(&client_id, input).await })
        });
        let results = futures::future::join_all(tasks).await;

        let booked = results.iter().filter(|r| matches!(r, Ok(Ok(_)))).count();
        let refused = results
            .iter()
            .filter(|r| matches!(r, Ok(Err(Error::SlotUnavailable(_)))))
            .count();
        assert_eq!(booked, 1);
        assert_eq!(refused, 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_bookings_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.database.db_path = dir.path().join("care.db").to_string_lossy().to_string();

        let first = Arc::new(Marketplace::open(&config).unwrap());
        let second = Arc::new(Marketplace::open(&config).unwrap());
        let cg = caregiver(&first, "Carla");
        let a = client(&first, "Ana");
        let b = client(&first, "Bia");

        let (ra, rb) = tokio::join!(
            {
                let m = first.clone();
                let input = booking(&cg.id, 13, 9, 11);
                let id = a.id.clone();
                tokio::spawn(async move { m.request_booking(&id, input).await })
            },
            {
                let m = second.clone();
                let input = booking(&cg.id, 13, 10, 12);
                let id = b.id.clone();
                tokio::spawn(async move { m.request_booking(&id, input).await })
            }
        );
        let outcomes = [ra.unwrap(), rb.unwrap()];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(Error::SlotUnavailable(_)))));
    }
}
