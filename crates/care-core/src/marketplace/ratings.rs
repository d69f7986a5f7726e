//! Rating operations

use super::Marketplace;
use crate::booking::BookingStatus;
use crate::notification::{Notification, NotificationKind};
use crate::rating::{Rating, RatingSummary};
use crate::{Error, Result};

impl Marketplace {
    /// Rate a completed appointment. Only its client may rate, once.
    pub async fn rate(
        &self,
        client_id: &str,
        appointment_id: &str,
        stars: u8,
        comment: Option<String>,
    ) -> Result<Rating> {
        let (rating, summary) = {
            let mut store = self.store()?;
            let request = store
                .get_request(appointment_id)?
                .ok_or_else(|| Error::RequestNotFound(appointment_id.to_string()))?;
            if request.client_id != client_id {
                return Err(Error::Forbidden(format!(
                    "only the client of {} can rate it",
                    appointment_id
                )));
            }
            if request.status != BookingStatus::Completed {
                return Err(Error::Validation(format!(
                    "appointment {} is {}, not completed",
                    appointment_id, request.status
                )));
            }

            let rating = Rating::new(appointment_id, &request.caregiver_id, client_id, stars, comment)?;
            let summary = store.insert_rating(&rating)?;
            (rating, summary)
        };

        self.notify(
            Notification::new(
                &rating.caregiver_id,
                NotificationKind::RatingReceived,
                "New rating",
                format!(
                    "You received {} stars, average {:.2} over {} ratings",
                    rating.stars, summary.average, summary.total
                ),
            )
            .for_request(&rating.appointment_id),
        )
        .await;
        Ok(rating)
    }

    pub fn rating_summary(&self, caregiver_id: &str) -> Result<RatingSummary> {
        self.store()?.rating_summary(caregiver_id)
    }

    /// Newest first
    pub fn list_ratings(&self, caregiver_id: &str) -> Result<Vec<Rating>> {
        self.store()?.list_ratings(caregiver_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::booking::{HireRequest, NewHireRequest};
    use crate::marketplace::fixtures::{caregiver, client, day};
    use crate::marketplace::Marketplace;
    use crate::Error;

    async fn completed_appointment(market: &Marketplace, caregiver_id: &str, client_id: &str) -> HireRequest {
        let req = market
            .request_booking(
                client_id,
                NewHireRequest {
                    caregiver_id: caregiver_id.to_string(),
                    date: day(13),
                    start_hour: 9,
                    end_hour: 10,
                    notes: None,
                },
            )
            .await
            .unwrap();
        market.accept(caregiver_id, &req.id).await.unwrap();
        market.pay(client_id, &req.id).await.unwrap();
        market.complete(caregiver_id, &req.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_rate_completed_appointment() {
        let market = Marketplace::in_memory().unwrap();
        let cg = caregiver(&market, "Carla");
        let cl = client(&market, "Kim");
        let appt = completed_appointment(&market, &cg.id, &cl.id).await;

        let rating = market
            .rate(&cl.id, &appt.id, 4, Some("Very kind".to_string()))
            .await
            .unwrap();
        assert_eq!(rating.caregiver_id, cg.id);

        let summary = market.rating_summary(&cg.id).unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.average, 4.0);
        assert_eq!(market.list_ratings(&cg.id).unwrap()[0].comment.as_deref(), Some("Very kind"));

        assert!(matches!(
            market.rate(&cl.id, &appt.id, 5, None).await,
            Err(Error::AlreadyRated(_))
        ));
    }

    #[tokio::test]
    async fn test_rating_rules() {
        let market = Marketplace::in_memory().unwrap();
        let cg = caregiver(&market, "Carla");
        let cl = client(&market, "Kim");
        let intruder = client(&market, "Ivan");

        let pending = market
            .request_booking(
                &cl.id,
                NewHireRequest {
                    caregiver_id: cg.id.clone(),
                    date: day(14),
                    start_hour: 9,
                    end_hour: 10,
                    notes: None,
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            market.rate(&cl.id, &pending.id, 5, None).await,
            Err(Error::Validation(_))
        ));

        let appt = completed_appointment(&market, &cg.id, &cl.id).await;
        assert!(matches!(
            market.rate(&intruder.id, &appt.id, 5, None).await,
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            market.rate(&cl.id, &appt.id, 0, None).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            market.rate(&cl.id, &appt.id, 6, None).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            market.rate(&cl.id, "missing", 5, None).await,
            Err(Error::RequestNotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ratings_one_survives() {
        let market = Arc::new(Marketplace::in_memory().unwrap());
        let cg = caregiver(&market, "Carla");
        let cl = client(&market, "Kim");
        let appt = completed_appointment(&market, &cg.id, &cl.id).await;

        let tasks = (1..=5u8).map(|stars| {
            let market = market.clone();
            let client_id = cl.id.clone();
            let appt_id = appt.id.clone();
            tokio::spawn(async move { market.rate(&client_id, &appt_id, stars, None).await })
        });
        let results = futures::future::join_all(tasks).await;

        assert_eq!(results.iter().filter(|r| matches!(r, Ok(Ok(_)))).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Ok(Err(Error::AlreadyRated(_)))))
                .count(),
            4
        );
        assert_eq!(market.rating_summary(&cg.id).unwrap().total, 1);
    }
}
