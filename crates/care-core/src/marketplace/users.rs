//! Account operations

use chrono::Utc;
use tracing::info;

use super::Marketplace;
use crate::user::{Availability, NewUser, ProfileUpdate, Role, User};
use crate::{Error, Result};

impl Marketplace {
    pub fn register_user(&self, input: NewUser) -> Result<User> {
        input.validate()?;
        let user = input.into_user();
        self.store()?.insert_user(&user)?;
        info!(user = %user.id, role = %user.role, "Registered user");
        Ok(user)
    }

    pub fn get_user(&self, id: &str) -> Result<User> {
        self.store()?
            .get_user(id)?
            .ok_or_else(|| Error::UserNotFound(id.to_string()))
    }

    /// Load a user and require a role
    pub(crate) fn user_with_role(&self, id: &str, role: Role) -> Result<User> {
        let user = self.get_user(id)?;
        if user.role != role {
            return Err(Error::Forbidden(format!("user {} is not a {}", id, role)));
        }
        Ok(user)
    }

    pub fn update_profile(&self, id: &str, update: ProfileUpdate) -> Result<User> {
        let store = self.store()?;
        let mut user = store
            .get_user(id)?
            .ok_or_else(|| Error::UserNotFound(id.to_string()))?;
        update.apply(&mut user)?;
        store.update_user(&user)?;
        Ok(user)
    }

    /// Replace a caregiver's weekly availability
    pub fn set_availability(&self, caregiver_id: &str, availability: Availability) -> Result<User> {
        availability.validate(&self.grid)?;

        let store = self.store()?;
        let mut user = store
            .get_user(caregiver_id)?
            .ok_or_else(|| Error::UserNotFound(caregiver_id.to_string()))?;
        if !user.is_caregiver() {
            return Err(Error::Forbidden("only caregivers publish availability".to_string()));
        }

        user.availability = availability;
        user.updated_at = Utc::now();
        store.update_user(&user)?;
        info!(caregiver = %caregiver_id, "Availability updated");
        Ok(user)
    }

    /// Add or remove a caregiver from a client's favorites.
    /// Returns whether the caregiver is a favorite afterwards.
    pub fn toggle_favorite(&self, client_id: &str, caregiver_id: &str) -> Result<bool> {
        let store = self.store()?;
        let mut client = store
            .get_user(client_id)?
            .ok_or_else(|| Error::UserNotFound(client_id.to_string()))?;
        if !client.is_client() {
            return Err(Error::Forbidden("only clients keep favorites".to_string()));
        }

        let caregiver = store
            .get_user(caregiver_id)?
            .ok_or_else(|| Error::UserNotFound(caregiver_id.to_string()))?;
        if !caregiver.is_caregiver() {
            return Err(Error::Validation(format!("{} is not a caregiver", caregiver_id)));
        }

        let now_favorite = match client.favorites.iter().position(|id| id == caregiver_id) {
            Some(pos) => {
                client.favorites.remove(pos);
                false
            }
            None => {
                client.favorites.push(caregiver_id.to_string());
                true
            }
        };
        client.updated_at = Utc::now();
        store.update_user(&client)?;
        Ok(now_favorite)
    }

    /// Profiles of a client's favorite caregivers; deleted ones are skipped
    pub fn list_favorites(&self, client_id: &str) -> Result<Vec<User>> {
        let store = self.store()?;
        let client = store
            .get_user(client_id)?
            .ok_or_else(|| Error::UserNotFound(client_id.to_string()))?;

        let mut favorites = Vec::with_capacity(client.favorites.len());
        for id in &client.favorites {
            if let Some(user) = store.get_user(id)? {
                favorites.push(user);
            }
        }
        Ok(favorites)
    }
}

#[cfg(test)]
mod tests {
    use crate::marketplace::Marketplace;
    use crate::user::{Availability, DayOfWeek, NewUser, Role};
    use crate::Error;

    fn new_user(role: Role, email: &str) -> NewUser {
        NewUser {
            role,
            full_name: "Someone".to_string(),
            email: email.to_string(),
            phone: None,
            bio: None,
            hourly_rate_cents: (role == Role::Caregiver).then_some(5_000),
            specialties: Vec::new(),
        }
    }

    #[test]
    fn test_register_and_get() {
        let market = Marketplace::in_memory().unwrap();
        let user = market.register_user(new_user(Role::Client, "a@example.com")).unwrap();
        assert_eq!(market.get_user(&user.id).unwrap().email, "a@example.com");
        assert!(matches!(market.get_user("nope"), Err(Error::UserNotFound(_))));
        assert!(matches!(
            market.register_user(new_user(Role::Client, "A@example.com")),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_set_availability_rules() {
        let market = Marketplace::in_memory().unwrap();
        let caregiver = market.register_user(new_user(Role::Caregiver, "c@example.com")).unwrap();
        let client = market.register_user(new_user(Role::Client, "k@example.com")).unwrap();

        let week = Availability::new().with_hours(DayOfWeek::Tuesday, 9..13);
        let updated = market.set_availability(&caregiver.id, week.clone()).unwrap();
        assert_eq!(updated.availability, week);

        assert!(matches!(
            market.set_availability(&client.id, week),
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            market.set_availability(&caregiver.id, Availability::new().with_hours(DayOfWeek::Tuesday, 5..7)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_toggle_favorite() {
        let market = Marketplace::in_memory().unwrap();
        let caregiver = market.register_user(new_user(Role::Caregiver, "c@example.com")).unwrap();
        let client = market.register_user(new_user(Role::Client, "k@example.com")).unwrap();

        assert!(market.toggle_favorite(&client.id, &caregiver.id).unwrap());
        assert_eq!(market.list_favorites(&client.id).unwrap().len(), 1);
        assert!(!market.toggle_favorite(&client.id, &caregiver.id).unwrap());
        assert!(market.list_favorites(&client.id).unwrap().is_empty());

        assert!(matches!(
            market.toggle_favorite(&caregiver.id, &caregiver.id),
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            market.toggle_favorite(&client.id, &client.id),
            Err(Error::Validation(_))
        ));
    }
}
