//! Hotel actions: search plus book / update / cancel by hotel id.

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
struct SearchHotelsArgs {
    location: Option<String>,
    name: Option<String>,
    price_tier: Option<String>,
}

pub struct SearchHotelsAction {
    store: Arc<dyn TravelStore>,
}

impl SearchHotelsAction {
    pub fn new(store: Arc<dyn TravelStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Action for SearchHotelsAction {
    fn name(&self) -> ActionName {
        ActionName::SearchHotels
    }

    fn classification(&self) -> Classification {
        Classification::Safe
    }

    fn schema(&self) -> ActionSchema {
        ActionSchema {
            name: self.name(),
            description: "Search for hotels based on location, name, and price tier.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "location": {"type": "string"},
                    "name": {"type": "string"},
                    "price_tier": {
                        "type": "string",
                        "description": "Midscale, Upper Midscale, Upscale, Luxury"
                    }
                }
            }),
        }
    }

    async fn invoke(
        &self,
        arguments: serde_json::Value,
        _user_context: &UserContext,
    ) -> ConciergeResult<String> {
        let args: SearchHotelsArgs = serde_json::from_value(arguments)?;
        let hotels = self
            .store
            .search_hotels(
                args.location.as_deref(),
                args.name.as_deref(),
                args.price_tier.as_deref(),
            )
            .await?;
        Ok(serde_json::to_string(&hotels)?)
    }
}

#[derive(Debug, Deserialize)]
struct HotelIdArgs {
    hotel_id: i64,
}

pub struct BookHotelAction {
    store: Arc<dyn TravelStore>,
}

impl BookHotelAction {
    pub fn new(store: Arc<dyn TravelStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Action for BookHotelAction {
    fn name(&self) -> ActionName {
        ActionName::BookHotel
    }

    fn classification(&self) -> Classification {
        Classification::Sensitive
    }

    fn schema(&self) -> ActionSchema {
        ActionSchema {
            name: self.name(),
            description: "Book a hotel by its ID.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"hotel_id": {"type": "integer"}},
                "required": ["hotel_id"]
            }),
        }
    }

    async fn invoke(
        &self,
        arguments: serde_json::Value,
        _user_context: &UserContext,
    ) -> ConciergeResult<String> {
        let args: HotelIdArgs = serde_json::from_value(arguments)?;
        if self.store.set_hotel_booked(args.hotel_id, true).await? {
            Ok(format!("Hotel {} successfully booked.", args.hotel_id))
        } else {
            Ok(format!("No hotel found with ID {}.", args.hotel_id))
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpdateHotelArgs {
    hotel_id: i64,
    checkin_date: Option<String>,
    checkout_date: Option<String>,
}

pub struct UpdateHotelAction {
    store: Arc<dyn TravelStore>,
}

impl UpdateHotelAction {
    pub fn new(store: Arc<dyn TravelStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Action for UpdateHotelAction {
    fn name(&self) -> ActionName {
        ActionName::UpdateHotel
    }

    fn classification(&self) -> Classification {
        Classification::Sensitive
    }

    fn schema(&self) -> ActionSchema {
        ActionSchema {
            name: self.name(),
            description: "Update a hotel booking's check-in and check-out dates by its ID.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "hotel_id": {"type": "integer"},
                    "checkin_date": {"type": "string"},
                    "checkout_date": {"type": "string"}
                },
                "required": ["hotel_id"]
            }),
        }
    }

    async fn invoke(
        &self,
        arguments: serde_json::Value,
        _user_context: &UserContext,
    ) -> ConciergeResult<String> {
        let args: UpdateHotelArgs = serde_json::from_value(arguments)?;
        let updated = self
            .store
            .update_hotel_dates(
                args.hotel_id,
                args.checkin_date.as_deref(),
                args.checkout_date.as_deref(),
            )
            .await?;
        if updated {
            Ok(format!("Hotel {} successfully updated.", args.hotel_id))
        } else {
            Ok(format!("No hotel found with ID {}.", args.hotel_id))
        }
    }
}

pub struct CancelHotelAction {
    store: Arc<dyn TravelStore>,
}

impl CancelHotelAction {
    pub fn new(store: Arc<dyn TravelStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Action for CancelHotelAction {
    fn name(&self) -> ActionName {
        ActionName::CancelHotel
    }

    fn classification(&self) -> Classification {
        Classification::Sensitive
    }

    fn schema(&self) -> ActionSchema {
        ActionSchema {
            name: self.name(),
            description: "Cancel a hotel booking by its ID.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"hotel_id": {"type": "integer"}},
                "required": ["hotel_id"]
            }),
        }
    }

    async fn invoke(
        &self,
        arguments: serde_json::Value,
        _user_context: &UserContext,
    ) -> ConciergeResult<String> {
        let args: HotelIdArgs = serde_json::from_value(arguments)?;
        if self.store.set_hotel_booked(args.hotel_id, false).await? {
            Ok(format!("Hotel {} successfully cancelled.", args.hotel_id))
        } else {
            Ok(format!("No hotel found with ID {}.", args.hotel_id))
        }
    }
}
