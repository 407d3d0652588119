//! Flight actions: ticket lookup, flight search, reschedule, cancel.
//!
//! Ticket-scoped actions take the passenger id from the per-turn user
//! context, never from the decision port, so one user can never reach
//! another passenger's bookings.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::error::{ConciergeError, ConciergeResult};
use crate::registry::{Action, ActionSchema};
use crate::state::UserContext;
use crate::store::TravelStore;
use crate::types::{ActionName, Classification};

const DEFAULT_SEARCH_LIMIT: usize = 20;

fn require_passenger(user_context: &UserContext, action: ActionName) -> ConciergeResult<&str> {
    user_context
        .passenger_id()
        .ok_or_else(|| ConciergeError::ActionExecution {
            action: action.to_string(),
            message: "No passenger ID configured.".into(),
        })
}

// ─── fetch_user_flight_information ──────────────────────────────────────────

pub struct FetchUserFlightInformationAction {
    store: Arc<dyn TravelStore>,
}

impl FetchUserFlightInformationAction {
    pub fn new(store: Arc<dyn TravelStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Action for FetchUserFlightInformationAction {
    fn name(&self) -> ActionName {
        ActionName::FetchUserFlightInformation
    }

    fn classification(&self) -> Classification {
        Classification::Safe
    }

    fn schema(&self) -> ActionSchema {
        ActionSchema {
            name: self.name(),
            description: "Fetch all tickets for the user along with corresponding flight \
                information and seat assignments."
                .into(),
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    async fn invoke(
        &self,
        _arguments: serde_json::Value,
        user_context: &UserContext,
    ) -> ConciergeResult<String> {
        let passenger_id = require_passenger(user_context, self.name())?;
        let tickets = self.store.user_tickets(passenger_id).await?;
        Ok(serde_json::to_string(&tickets)?)
    }
}

// ─── search_flights ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SearchFlightsArgs {
    departure_airport: Option<String>,
    arrival_airport: Option<String>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    limit: Option<usize>,
}

pub struct SearchFlightsAction {
    store: Arc<dyn TravelStore>,
}

impl SearchFlightsAction {
    pub fn new(store: Arc<dyn TravelStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Action for SearchFlightsAction {
    fn name(&self) -> ActionName {
        ActionName::SearchFlights
    }

    fn classification(&self) -> Classification {
        Classification::Safe
    }

    fn schema(&self) -> ActionSchema {
        ActionSchema {
            name: self.name(),
            description: "Search for flights based on departure airport, arrival airport, and \
                departure time range."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "departure_airport": {"type": "string"},
                    "arrival_airport": {"type": "string"},
                    "start_time": {"type": "string", "format": "date-time"},
                    "end_time": {"type": "string", "format": "date-time"},
                    "limit": {"type": "integer", "default": DEFAULT_SEARCH_LIMIT}
                }
            }),
        }
    }

    async fn invoke(
        &self,
        arguments: serde_json::Value,
        _user_context: &UserContext,
    ) -> ConciergeResult<String> {
        let args: SearchFlightsArgs = serde_json::from_value(arguments)?;
        let flights = self
            .store
            .search_flights(
                args.departure_airport.as_deref(),
                args.arrival_airport.as_deref(),
                args.start_time,
                args.end_time,
                args.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
            )
            .await?;
        Ok(serde_json::to_string(&flights)?)
    }
}

// ─── update_ticket_to_new_flight ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct UpdateTicketArgs {
    ticket_no: String,
    new_flight_id: i64,
}

pub struct UpdateTicketToNewFlightAction {
    store: Arc<dyn TravelStore>,
}

impl UpdateTicketToNewFlightAction {
    pub fn new(store: Arc<dyn TravelStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Action for UpdateTicketToNewFlightAction {
    fn name(&self) -> ActionName {
        ActionName::UpdateTicketToNewFlight
    }

    fn classification(&self) -> Classification {
        Classification::Sensitive
    }

    fn schema(&self) -> ActionSchema {
        ActionSchema {
            name: self.name(),
            description: "Update the user's ticket to a new valid flight.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "ticket_no": {"type": "string"},
                    "new_flight_id": {"type": "integer"}
                },
                "required": ["ticket_no", "new_flight_id"]
            }),
        }
    }

    async fn invoke(
        &self,
        arguments: serde_json::Value,
        user_context: &UserContext,
    ) -> ConciergeResult<String> {
        let passenger_id = require_passenger(user_context, self.name())?;
        let args: UpdateTicketArgs = serde_json::from_value(arguments)?;

        let new_flight = match self.store.flight(args.new_flight_id).await? {
            Some(flight) => flight,
            None => return Ok("Invalid new flight ID provided.".into()),
        };

        // The decision port is told about this policy too, but the API is
        // what actually enforces it.
        let time_until = new_flight.scheduled_departure - Utc::now();
        if time_until < Duration::hours(3) {
            return Ok(format!(
                "Not permitted to reschedule to a flight that is less than 3 hours from the \
                 current time. Selected flight is at {}.",
                new_flight.scheduled_departure
            ));
        }

        let ticket = match self.store.ticket(&args.ticket_no).await? {
            Some(ticket) => ticket,
            None => return Ok("No existing ticket found for the given ticket number.".into()),
        };
        if ticket.passenger_id != passenger_id {
            return Ok(format!(
                "Current signed-in passenger with ID {passenger_id} not the owner of ticket {}",
                args.ticket_no
            ));
        }

        self.store
            .reassign_ticket(&args.ticket_no, args.new_flight_id)
            .await?;
        Ok("Ticket successfully updated to new flight.".into())
    }
}

// ─── cancel_ticket ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CancelTicketArgs {
    ticket_no: String,
}

pub struct CancelTicketAction {
    store: Arc<dyn TravelStore>,
}

impl CancelTicketAction {
    pub fn new(store: Arc<dyn TravelStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Action for CancelTicketAction {
    fn name(&self) -> ActionName {
        ActionName::CancelTicket
    }

    fn classification(&self) -> Classification {
        Classification::Sensitive
    }

    fn schema(&self) -> ActionSchema {
        ActionSchema {
            name: self.name(),
            description: "Cancel the user's ticket and remove it from the database.".into(),
            parameters: json!({
                "type": "object",
                "properties": {"ticket_no": {"type": "string"}},
                "required": ["ticket_no"]
            }),
        }
    }

    async fn invoke(
        &self,
        arguments: serde_json::Value,
        user_context: &UserContext,
    ) -> ConciergeResult<String> {
        let passenger_id = require_passenger(user_context, self.name())?;
        let args: CancelTicketArgs = serde_json::from_value(arguments)?;

        let ticket = match self.store.ticket(&args.ticket_no).await? {
            Some(ticket) => ticket,
            None => return Ok("No existing ticket found for the given ticket number.".into()),
        };
        if ticket.passenger_id != passenger_id {
            return Ok(format!(
                "Current signed-in passenger with ID {passenger_id} not the owner of ticket {}",
                args.ticket_no
            ));
        }

        self.store.remove_ticket(&args.ticket_no).await?;
        Ok("Ticket successfully cancelled.".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FlightRecord, MemoryTravelStore, TicketRecord};

    const PASSENGER: &str = "3442 587242";
    const TICKET: &str = "7240005432906569";

    fn store_with_ticket(departure_offset: Duration) -> Arc<MemoryTravelStore> {
        let store = Arc::new(MemoryTravelStore::new());
        let departs = Utc::now() + departure_offset;
        store.insert_flight(FlightRecord {
            flight_id: 1,
            flight_no: "LX0112".into(),
            departure_airport: "BSL".into(),
            arrival_airport: "CDG".into(),
            scheduled_departure: departs,
            scheduled_arrival: departs + Duration::hours(2),
        });
        store.insert_flight(FlightRecord {
            flight_id: 2,
            flight_no: "LX0113".into(),
            departure_airport: "BSL".into(),
            arrival_airport: "CDG".into(),
            scheduled_departure: departs + Duration::days(1),
            scheduled_arrival: departs + Duration::days(1) + Duration::hours(2),
        });
        store.insert_ticket(TicketRecord {
            ticket_no: TICKET.into(),
            book_ref: "C46E9F".into(),
            passenger_id: PASSENGER.into(),
            flight_id: 1,
            seat_no: Some("18E".into()),
        });
        store
    }

    fn ctx() -> UserContext {
        UserContext::new().with("passenger_id", PASSENGER)
    }

    #[tokio::test]
    async fn fetch_requires_passenger_id() {
        let action = FetchUserFlightInformationAction::new(store_with_ticket(Duration::days(2)));
        let err = action.invoke(json!({}), &UserContext::new()).await.unwrap_err();
        assert!(err.to_string().contains("No passenger ID configured."));
    }

    #[tokio::test]
    async fn fetch_returns_joined_tickets() {
        let action = FetchUserFlightInformationAction::new(store_with_ticket(Duration::days(2)));
        let out = action.invoke(json!({}), &ctx()).await.unwrap();
        assert!(out.contains(TICKET));
        assert!(out.contains("LX0112"));
        assert!(out.contains("18E"));
    }

    #[tokio::test]
    async fn search_filters_by_airport() {
        let action = SearchFlightsAction::new(store_with_ticket(Duration::days(2)));
        let out = action
            .invoke(json!({"departure_airport": "BSL", "limit": 5}), &ctx())
            .await
            .unwrap();
        assert!(out.contains("LX0112"));
        assert!(out.contains("LX0113"));

        let none = action
            .invoke(json!({"departure_airport": "ZRH"}), &ctx())
            .await
            .unwrap();
        assert_eq!(none, "[]");
    }

    #[tokio::test]
    async fn update_rejects_unknown_flight() {
        let action = UpdateTicketToNewFlightAction::new(store_with_ticket(Duration::days(2)));
        let out = action
            .invoke(json!({"ticket_no": TICKET, "new_flight_id": 999}), &ctx())
            .await
            .unwrap();
        assert_eq!(out, "Invalid new flight ID provided.");
    }

    #[tokio::test]
    async fn update_enforces_three_hour_rule() {
        // both flights depart within 3 hours
        let action = UpdateTicketToNewFlightAction::new(store_with_ticket(Duration::hours(1)));
        let out = action
            .invoke(json!({"ticket_no": TICKET, "new_flight_id": 1}), &ctx())
            .await
            .unwrap();
        assert!(out.starts_with(
            "Not permitted to reschedule to a flight that is less than 3 hours"
        ));
    }

    #[tokio::test]
    async fn update_rejects_missing_ticket_and_wrong_owner() {
        let store = store_with_ticket(Duration::days(2));
        let action = UpdateTicketToNewFlightAction::new(store);

        let out = action
            .invoke(json!({"ticket_no": "0000", "new_flight_id": 2}), &ctx())
            .await
            .unwrap();
        assert_eq!(out, "No existing ticket found for the given ticket number.");

        let stranger = UserContext::new().with("passenger_id", "0000 000000");
        let out = action
            .invoke(json!({"ticket_no": TICKET, "new_flight_id": 2}), &stranger)
            .await
            .unwrap();
        assert!(out.contains("not the owner of ticket"));
    }

    #[tokio::test]
    async fn update_moves_the_ticket() {
        let store = store_with_ticket(Duration::days(2));
        let action = UpdateTicketToNewFlightAction::new(store.clone());

        let out = action
            .invoke(json!({"ticket_no": TICKET, "new_flight_id": 2}), &ctx())
            .await
            .unwrap();
        assert_eq!(out, "Ticket successfully updated to new flight.");
        assert_eq!(store.ticket(TICKET).await.unwrap().unwrap().flight_id, 2);
    }

    #[tokio::test]
    async fn cancel_checks_ownership_then_removes() {
        let store = store_with_ticket(Duration::days(2));
        let action = CancelTicketAction::new(store.clone());

        let stranger = UserContext::new().with("passenger_id", "0000 000000");
        let out = action
            .invoke(json!({"ticket_no": TICKET}), &stranger)
            .await
            .unwrap();
        assert!(out.contains("not the owner of ticket"));

        let out = action.invoke(json!({"ticket_no": TICKET}), &ctx()).await.unwrap();
        assert_eq!(out, "Ticket successfully cancelled.");
        assert!(store.ticket(TICKET).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_arguments_surface_as_errors() {
        let action = CancelTicketAction::new(store_with_ticket(Duration::days(2)));
        let err = action.invoke(json!({"ticket": 7}), &ctx()).await.unwrap_err();
        assert!(matches!(err, ConciergeError::Serialization(_)));
    }
}
