use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Handler & Action Identifiers ────────────────────────────────────────────

/// Identifier of a conversation handler.
///
/// `Primary` is the supervisor; the others are delegated task handlers.
/// The set is closed: delegation to anything outside it is a wiring bug,
/// rejected when the handler set is built, not at routing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerId {
    Primary,
    UpdateFlight,
    BookHotel,
    BookCarRental,
    BookExcursion,
}

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerId::Primary => write!(f, "primary"),
            HandlerId::UpdateFlight => write!(f, "update_flight"),
            HandlerId::BookHotel => write!(f, "book_hotel"),
            HandlerId::BookCarRental => write!(f, "book_car_rental"),
            HandlerId::BookExcursion => write!(f, "book_excursion"),
        }
    }
}

/// Safety classification of an action.
///
/// `Sensitive` actions mutate real-world state and never execute without an
/// explicit approval signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Safe,
    Sensitive,
}

/// Closed catalogue of every action name the decision port may request.
///
/// Domain actions are registered in the [`ActionRegistry`](crate::registry::ActionRegistry);
/// the control markers (`CompleteOrEscalate` and the `To*` delegation markers)
/// are consumed by the router and never reach the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionName {
    // flights
    FetchUserFlightInformation,
    SearchFlights,
    UpdateTicketToNewFlight,
    CancelTicket,
    // hotels
    SearchHotels,
    BookHotel,
    UpdateHotel,
    CancelHotel,
    // car rentals
    SearchCarRentals,
    BookCarRental,
    UpdateCarRental,
    CancelCarRental,
    // excursions
    SearchTripRecommendations,
    BookExcursion,
    UpdateExcursion,
    CancelExcursion,
    // policy lookup
    LookupPolicy,
    // control markers
    #[serde(rename = "CompleteOrEscalate")]
    CompleteOrEscalate,
    #[serde(rename = "ToFlightBookingAssistant")]
    ToFlightBooking,
    #[serde(rename = "ToHotelBookingAssistant")]
    ToHotelBooking,
    #[serde(rename = "ToBookCarRentalAssistant")]
    ToCarRental,
    #[serde(rename = "ToBookExcursionAssistant")]
    ToExcursion,
}

impl ActionName {
    /// Wire name, as the decision port sees it.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionName::FetchUserFlightInformation => "fetch_user_flight_information",
            ActionName::SearchFlights => "search_flights",
            ActionName::UpdateTicketToNewFlight => "update_ticket_to_new_flight",
            ActionName::CancelTicket => "cancel_ticket",
            ActionName::SearchHotels => "search_hotels",
            ActionName::BookHotel => "book_hotel",
            ActionName::UpdateHotel => "update_hotel",
            ActionName::CancelHotel => "cancel_hotel",
            ActionName::SearchCarRentals => "search_car_rentals",
            ActionName::BookCarRental => "book_car_rental",
            ActionName::UpdateCarRental => "update_car_rental",
            ActionName::CancelCarRental => "cancel_car_rental",
            ActionName::SearchTripRecommendations => "search_trip_recommendations",
            ActionName::BookExcursion => "book_excursion",
            ActionName::UpdateExcursion => "update_excursion",
            ActionName::CancelExcursion => "cancel_excursion",
            ActionName::LookupPolicy => "lookup_policy",
            ActionName::CompleteOrEscalate => "CompleteOrEscalate",
            ActionName::ToFlightBooking => "ToFlightBookingAssistant",
            ActionName::ToHotelBooking => "ToHotelBookingAssistant",
            ActionName::ToCarRental => "ToBookCarRentalAssistant",
            ActionName::ToExcursion => "ToBookExcursionAssistant",
        }
    }

    /// Parse a wire name. Unknown names are a decision-port defect and map
    /// to [`ConciergeError::UnknownAction`](crate::error::ConciergeError) at the caller.
    pub fn parse(name: &str) -> Option<Self> {
        let all = [
            ActionName::FetchUserFlightInformation,
            ActionName::SearchFlights,
            ActionName::UpdateTicketToNewFlight,
            ActionName::CancelTicket,
            ActionName::SearchHotels,
            ActionName::BookHotel,
            ActionName::UpdateHotel,
            ActionName::CancelHotel,
            ActionName::SearchCarRentals,
            ActionName::BookCarRental,
            ActionName::UpdateCarRental,
            ActionName::CancelCarRental,
            ActionName::SearchTripRecommendations,
            ActionName::BookExcursion,
            ActionName::UpdateExcursion,
            ActionName::CancelExcursion,
            ActionName::LookupPolicy,
            ActionName::CompleteOrEscalate,
            ActionName::ToFlightBooking,
            ActionName::ToHotelBooking,
            ActionName::ToCarRental,
            ActionName::ToExcursion,
        ];
        all.into_iter().find(|a| a.as_str() == name)
    }

    /// True for router-consumed markers that are never executed.
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            ActionName::CompleteOrEscalate
                | ActionName::ToFlightBooking
                | ActionName::ToHotelBooking
                | ActionName::ToCarRental
                | ActionName::ToExcursion
        )
    }

    /// The handler a delegation marker hands the conversation to.
    pub fn delegation_target(&self) -> Option<HandlerId> {
        match self {
            ActionName::ToFlightBooking => Some(HandlerId::UpdateFlight),
            ActionName::ToHotelBooking => Some(HandlerId::BookHotel),
            ActionName::ToCarRental => Some(HandlerId::BookCarRental),
            ActionName::ToExcursion => Some(HandlerId::BookExcursion),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ─── Action Requests ─────────────────────────────────────────────────────────

/// A single action requested by the decision port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Unique within a turn; the matching action-result message carries it back.
    pub request_id: String,
    pub name: ActionName,
    pub arguments: serde_json::Value,
}

impl ActionRequest {
    pub fn new(name: ActionName, arguments: serde_json::Value) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            name,
            arguments,
        }
    }

    pub fn with_id(
        request_id: impl Into<String>,
        name: ActionName,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            name,
            arguments,
        }
    }
}

// ─── Message Types ───────────────────────────────────────────────────────────

/// Role in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A content block within a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ActionCall {
        id: String,
        name: ActionName,
        arguments: serde_json::Value,
    },
    ActionResult {
        action_call_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(s: impl Into<String>) -> Self {
        ContentBlock::Text { text: s.into() }
    }

    pub fn action_call(id: impl Into<String>, name: ActionName, args: serde_json::Value) -> Self {
        ContentBlock::ActionCall {
            id: id.into(),
            name,
            arguments: args,
        }
    }

    pub fn action_result(
        action_call_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        ContentBlock::ActionResult {
            action_call_id: action_call_id.into(),
            content: content.into(),
            is_error,
        }
    }
}

/// A message in a conversation. Immutable once appended to history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: Vec<ContentBlock>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentBlock::text(text)])
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentBlock::text(text)])
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![ContentBlock::text(text)])
    }

    pub fn action_result(
        action_call_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self::new(
            Role::Tool,
            vec![ContentBlock::action_result(action_call_id, content, is_error)],
        )
    }

    /// Assistant message carrying an optional reply plus requested actions.
    pub fn from_decision(content: Option<&str>, requests: &[ActionRequest]) -> Self {
        let mut blocks = Vec::new();
        if let Some(text) = content {
            if !text.is_empty() {
                blocks.push(ContentBlock::text(text));
            }
        }
        for req in requests {
            blocks.push(ContentBlock::action_call(
                req.request_id.clone(),
                req.name,
                req.arguments.clone(),
            ));
        }
        Self::new(Role::Assistant, blocks)
    }

    /// Extract the action requests carried by this message.
    pub fn action_requests(&self) -> Vec<ActionRequest> {
        self.content
            .iter()
            .filter_map(|c| match c {
                ContentBlock::ActionCall {
                    id,
                    name,
                    arguments,
                } => Some(ActionRequest::with_id(id.clone(), *name, arguments.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn has_action_calls(&self) -> bool {
        self.content
            .iter()
            .any(|c| matches!(c, ContentBlock::ActionCall { .. }))
    }

    /// Get text content concatenated
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_user_creates_text() {
        let msg = Message::user("what time is my flight?");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text_content(), "what time is my flight?");
        assert!(!msg.id.is_empty());
    }

    #[test]
    fn message_action_result_creates() {
        let msg = Message::action_result("req_1", "Ticket successfully cancelled.", false);
        assert_eq!(msg.role, Role::Tool);
        assert!(!msg.has_action_calls());
    }

    #[test]
    fn message_from_decision_carries_requests() {
        let requests = vec![
            ActionRequest::with_id("r1", ActionName::SearchFlights, json!({"limit": 5})),
            ActionRequest::with_id("r2", ActionName::LookupPolicy, json!({"query": "refunds"})),
        ];
        let msg = Message::from_decision(Some("Let me check."), &requests);

        assert!(msg.has_action_calls());
        assert_eq!(msg.text_content(), "Let me check.");

        let extracted = msg.action_requests();
        assert_eq!(extracted.len(), 2);
        assert_eq!(extracted[0].request_id, "r1");
        assert_eq!(extracted[1].name, ActionName::LookupPolicy);
    }

    #[test]
    fn message_from_decision_skips_empty_text() {
        let msg = Message::from_decision(Some(""), &[]);
        assert!(msg.content.is_empty());
    }

    #[test]
    fn message_serializes_roundtrip() {
        let msg = Message::from_decision(
            None,
            &[ActionRequest::with_id(
                "r1",
                ActionName::CancelTicket,
                json!({"ticket_no": "7240005432906569"}),
            )],
        );
        let json = serde_json::to_string(&msg).unwrap();
        let deserialized: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, msg);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, r#""assistant""#);
    }

    #[test]
    fn action_name_parse_roundtrip() {
        for name in [
            "search_flights",
            "update_ticket_to_new_flight",
            "lookup_policy",
            "CompleteOrEscalate",
            "ToFlightBookingAssistant",
        ] {
            let parsed = ActionName::parse(name).unwrap();
            assert_eq!(parsed.as_str(), name);
        }
        assert!(ActionName::parse("teleport_user").is_none());
    }

    #[test]
    fn control_markers_are_control() {
        assert!(ActionName::CompleteOrEscalate.is_control());
        assert!(ActionName::ToHotelBooking.is_control());
        assert!(!ActionName::SearchHotels.is_control());
    }

    #[test]
    fn delegation_targets() {
        assert_eq!(
            ActionName::ToFlightBooking.delegation_target(),
            Some(HandlerId::UpdateFlight)
        );
        assert_eq!(
            ActionName::ToExcursion.delegation_target(),
            Some(HandlerId::BookExcursion)
        );
        assert_eq!(ActionName::CompleteOrEscalate.delegation_target(), None);
        assert_eq!(ActionName::BookHotel.delegation_target(), None);
    }

    #[test]
    fn handler_id_display() {
        assert_eq!(HandlerId::Primary.to_string(), "primary");
        assert_eq!(HandlerId::BookCarRental.to_string(), "book_car_rental");
    }

    #[test]
    fn action_request_ids_unique() {
        let a = ActionRequest::new(ActionName::SearchHotels, json!({}));
        let b = ActionRequest::new(ActionName::SearchHotels, json!({}));
        assert_ne!(a.request_id, b.request_id);
    }
}
