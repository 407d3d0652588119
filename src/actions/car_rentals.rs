//! Car rental actions: search plus book / update / cancel by rental id.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::ConciergeResult;
use crate::registry::{Action, ActionSchema};
use crate::state::UserContext;
use crate::store::TravelStore;
use crate::types::{ActionName, Classification};

#[derive(Debug, Deserialize)]
struct SearchCarRentalsArgs {
    location: Option<String>,
    name: Option<String>,
    price_tier: Option<String>,
}

pub struct SearchCarRentalsAction {
    store: Arc<dyn TravelStore>,
}

impl SearchCarRentalsAction {
    pub fn new(store: Arc<dyn TravelStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Action for SearchCarRentalsAction {
    fn name(&self) -> ActionName {
        ActionName::SearchCarRentals
    }

    fn classification(&self) -> Classification {
        Classification::Safe
    }

    fn schema(&self) -> ActionSchema {
        ActionSchema {
            name: self.name(),
            description: "Search for car rentals based on location, name, and price tier.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "location": {"type": "string"},
                    "name": {"type": "string"},
                    "price_tier": {"type": "string"}
                }
            }),
        }
    }

    async fn invoke(
        &self,
        arguments: serde_json::Value,
        _user_context: &UserContext,
    ) -> ConciergeResult<String> {
        let args: SearchCarRentalsArgs = serde_json::from_value(arguments)?;
        let rentals = self
            .store
            .search_car_rentals(
                args.location.as_deref(),
                args.name.as_deref(),
                args.price_tier.as_deref(),
            )
            .await?;
        Ok(serde_json::to_string(&rentals)?)
    }
}

#[derive(Debug, Deserialize)]
struct RentalIdArgs {
    rental_id: i64,
}

pub struct BookCarRentalAction {
    store: Arc<dyn TravelStore>,
}

impl BookCarRentalAction {
    pub fn new(store: Arc<dyn TravelStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Action for BookCarRentalAction {
    fn name(&self) -> ActionName {
        ActionName::BookCarRental
    }

    fn classification(&self) -> Classification {
        Classification::Sensitive
    }

    fn schema(&self) -> ActionSchema {
        ActionSchema {
            name: self.name(),
            description: "Book a car rental by its ID.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"rental_id": {"type": "integer"}},
                "required": ["rental_id"]
            }),
        }
    }

    async fn invoke(
        &self,
        arguments: serde_json::Value,
        _user_context: &UserContext,
    ) -> ConciergeResult<String> {
        let args: RentalIdArgs = serde_json::from_value(arguments)?;
        if self.store.set_car_rental_booked(args.rental_id, true).await? {
            Ok(format!("Car rental {} successfully booked.", args.rental_id))
        } else {
            Ok(format!("No car rental found with ID {}.", args.rental_id))
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpdateCarRentalArgs {
    rental_id: i64,
    start_date: Option<String>,
    end_date: Option<String>,
}

pub struct UpdateCarRentalAction {
    store: Arc<dyn TravelStore>,
}

impl UpdateCarRentalAction {
    pub fn new(store: Arc<dyn TravelStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Action for UpdateCarRentalAction {
    fn name(&self) -> ActionName {
        ActionName::UpdateCarRental
    }

    fn classification(&self) -> Classification {
        Classification::Sensitive
    }

    fn schema(&self) -> ActionSchema {
        ActionSchema {
            name: self.name(),
            description: "Update a car rental's start and end dates by its ID.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "rental_id": {"type": "integer"},
                    "start_date": {"type": "string"},
                    "end_date": {"type": "string"}
                },
                "required": ["rental_id"]
            }),
        }
    }

    async fn invoke(
        &self,
        arguments: serde_json::Value,
        _user_context: &UserContext,
    ) -> ConciergeResult<String> {
        let args: UpdateCarRentalArgs = serde_json::from_value(arguments)?;
        let updated = self
            .store
            .update_car_rental_dates(
                args.rental_id,
                args.start_date.as_deref(),
                args.end_date.as_deref(),
            )
            .await?;
        if updated {
            Ok(format!("Car rental {} successfully updated.", args.rental_id))
        } else {
            Ok(format!("No car rental found with ID {}.", args.rental_id))
        }
    }
}

pub struct CancelCarRentalAction {
    store: Arc<dyn TravelStore>,
}

impl CancelCarRentalAction {
    pub fn new(store: Arc<dyn TravelStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Action for CancelCarRentalAction {
    fn name(&self) -> ActionName {
        ActionName::CancelCarRental
    }

    fn classification(&self) -> Classification {
        Classification::Sensitive
    }

    fn schema(&self) -> ActionSchema {
        ActionSchema {
            name: self.name(),
            description: "Cancel a car rental by its ID.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"rental_id": {"type": "integer"}},
                "required": ["rental_id"]
            }),
        }
    }

    async fn invoke(
        &self,
        arguments: serde_json::Value,
        _user_context: &UserContext,
    ) -> ConciergeResult<String> {
        let args: RentalIdArgs = serde_json::from_value(arguments)?;
        if self.store.set_car_rental_booked(args.rental_id, false).await? {
            Ok(format!("Car rental {} successfully cancelled.", args.rental_id))
        } else {
            Ok(format!("No car rental found with ID {}.", args.rental_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CarRentalRecord, MemoryTravelStore};

    fn store() -> Arc<MemoryTravelStore> {
        let store = Arc::new(MemoryTravelStore::new());
        store.insert_car_rental(CarRentalRecord {
            id: 1,
            name: "Europcar".into(),
            location: "Basel".into(),
            price_tier: "Economy".into(),
            start_date: "2024-04-14".into(),
            end_date: "2024-04-11".into(),
            booked: false,
        });
        store
    }

    #[tokio::test]
    async fn full_rental_lifecycle() {
        let store = store();

        let search = SearchCarRentalsAction::new(store.clone());
        let out = search
            .invoke(json!({"location": "Basel"}), &UserContext::new())
            .await
            .unwrap();
        assert!(out.contains("Europcar"));

        let book = BookCarRentalAction::new(store.clone());
        let out = book
            .invoke(json!({"rental_id": 1}), &UserContext::new())
            .await
            .unwrap();
        assert_eq!(out, "Car rental 1 successfully booked.");

        let update = UpdateCarRentalAction::new(store.clone());
        let out = update
            .invoke(
                json!({"rental_id": 1, "end_date": "2024-04-20"}),
                &UserContext::new(),
            )
            .await
            .unwrap();
        assert_eq!(out, "Car rental 1 successfully updated.");

        let cancel = CancelCarRentalAction::new(store.clone());
        let out = cancel
            .invoke(json!({"rental_id": 1}), &UserContext::new())
            .await
            .unwrap();
        assert_eq!(out, "Car rental 1 successfully cancelled.");

        let rental = &store.search_car_rentals(None, None, None).await.unwrap()[0];
        assert!(!rental.booked);
        assert_eq!(rental.end_date, "2024-04-20");
    }

    #[tokio::test]
    async fn unknown_ids_refuse_politely() {
        let book = BookCarRentalAction::new(store());
        let out = book
            .invoke(json!({"rental_id": 77}), &UserContext::new())
            .await
            .unwrap();
        assert_eq!(out, "No car rental found with ID 77.");
    }
}
