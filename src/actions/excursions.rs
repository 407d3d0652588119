//! Excursion actions: trip recommendation search plus book / update / cancel.

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
struct SearchTripArgs {
    location: Option<String>,
    name: Option<String>,
    keywords: Option<String>,
}

pub struct SearchTripRecommendationsAction {
    store: Arc<dyn TravelStore>,
}

impl SearchTripRecommendationsAction {
    pub fn new(store: Arc<dyn TravelStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Action for SearchTripRecommendationsAction {
    fn name(&self) -> ActionName {
        ActionName::SearchTripRecommendations
    }

    fn classification(&self) -> Classification {
        Classification::Safe
    }

    fn schema(&self) -> ActionSchema {
        ActionSchema {
            name: self.name(),
            description: "Search for trip recommendations based on location, name, and \
                comma-separated keywords."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "location": {"type": "string"},
                    "name": {"type": "string"},
                    "keywords": {"type": "string"}
                }
            }),
        }
    }

    async fn invoke(
        &self,
        arguments: serde_json::Value,
        _user_context: &UserContext,
    ) -> ConciergeResult<String> {
        let args: SearchTripArgs = serde_json::from_value(arguments)?;
        let excursions = self
            .store
            .search_excursions(
                args.location.as_deref(),
                args.name.as_deref(),
                args.keywords.as_deref(),
            )
            .await?;
        Ok(serde_json::to_string(&excursions)?)
    }
}

#[derive(Debug, Deserialize)]
struct RecommendationIdArgs {
    recommendation_id: i64,
}

pub struct BookExcursionAction {
    store: Arc<dyn TravelStore>,
}

impl BookExcursionAction {
    pub fn new(store: Arc<dyn TravelStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Action for BookExcursionAction {
    fn name(&self) -> ActionName {
        ActionName::BookExcursion
    }

    fn classification(&self) -> Classification {
        Classification::Sensitive
    }

    fn schema(&self) -> ActionSchema {
        ActionSchema {
            name: self.name(),
            description: "Book an excursion by its recommendation ID.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"recommendation_id": {"type": "integer"}},
                "required": ["recommendation_id"]
            }),
        }
    }

    async fn invoke(
        &self,
        arguments: serde_json::Value,
        _user_context: &UserContext,
    ) -> ConciergeResult<String> {
        let args: RecommendationIdArgs = serde_json::from_value(arguments)?;
        if self
            .store
            .set_excursion_booked(args.recommendation_id, true)
            .await?
        {
            Ok(format!(
                "Trip recommendation {} successfully booked.",
                args.recommendation_id
            ))
        } else {
            Ok(format!(
                "No trip recommendation found with ID {}.",
                args.recommendation_id
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpdateExcursionArgs {
    recommendation_id: i64,
    details: String,
}

pub struct UpdateExcursionAction {
    store: Arc<dyn TravelStore>,
}

impl UpdateExcursionAction {
    pub fn new(store: Arc<dyn TravelStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Action for UpdateExcursionAction {
    fn name(&self) -> ActionName {
        ActionName::UpdateExcursion
    }

    fn classification(&self) -> Classification {
        Classification::Sensitive
    }

    fn schema(&self) -> ActionSchema {
        ActionSchema {
            name: self.name(),
            description: "Update an excursion's details by its recommendation ID.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "recommendation_id": {"type": "integer"},
                    "details": {"type": "string"}
                },
                "required": ["recommendation_id", "details"]
            }),
        }
    }

    async fn invoke(
        &self,
        arguments: serde_json::Value,
        _user_context: &UserContext,
    ) -> ConciergeResult<String> {
        let args: UpdateExcursionArgs = serde_json::from_value(arguments)?;
        if self
            .store
            .update_excursion_details(args.recommendation_id, &args.details)
            .await?
        {
            Ok(format!(
                "Trip recommendation {} successfully updated.",
                args.recommendation_id
            ))
        } else {
            Ok(format!(
                "No trip recommendation found with ID {}.",
                args.recommendation_id
            ))
        }
    }
}

pub struct CancelExcursionAction {
    store: Arc<dyn TravelStore>,
}

impl CancelExcursionAction {
    pub fn new(store: Arc<dyn TravelStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Action for CancelExcursionAction {
    fn name(&self) -> ActionName {
        ActionName::CancelExcursion
    }

    fn classification(&self) -> Classification {
        Classification::Sensitive
    }

    fn schema(&self) -> ActionSchema {
        ActionSchema {
            name: self.name(),
            description: "Cancel an excursion by its recommendation ID.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"recommendation_id": {"type": "integer"}},
                "required": ["recommendation_id"]
            }),
        }
    }

    async fn invoke(
        &self,
        arguments: serde_json::Value,
        _user_context: &UserContext,
    ) -> ConciergeResult<String> {
        let args: RecommendationIdArgs = serde_json::from_value(arguments)?;
        if self
            .store
            .set_excursion_booked(args.recommendation_id, false)
            .await?
        {
            Ok(format!(
                "Trip recommendation {} successfully cancelled.",
                args.recommendation_id
            ))
        } else {
            Ok(format!(
                "No trip recommendation found with ID {}.",
                args.recommendation_id
            ))
        }
    }
}
