//! Action catalogue and handler capability sets.
//!
//! Every invokable action registers here once at process start, with a
//! `safe`/`sensitive` classification. Handlers are described by a capability
//! set drawn from the registry plus the entry text shown when the supervisor
//! delegates to them. Unknown identifiers are rejected when the registry and
//! handler set are built — routing never sees an unregistered name.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ConciergeError, ConciergeResult};
use crate::state::UserContext;
use crate::types::{ActionName, ActionRequest, Classification, HandlerId};

/// Schema for an action's input parameters, handed to the decision port.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSchema {
    pub name: ActionName,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// An invokable action implementation.
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> ActionName;

    fn classification(&self) -> Classification;

    fn schema(&self) -> ActionSchema;

    /// Invoke with the request arguments and per-turn user context.
    /// Domain-level refusals ("ticket not found") come back as `Ok` text,
    /// like any other result; `Err` means the implementation itself failed.
    async fn invoke(
        &self,
        arguments: serde_json::Value,
        user_context: &UserContext,
    ) -> ConciergeResult<String>;
}

/// Catalogue of registered actions, read-only after initialization.
#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<ActionName, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action. Control markers and duplicates are wiring bugs
    /// and are rejected here rather than surfacing at routing time.
    pub fn register(&mut self, action: Arc<dyn Action>) -> ConciergeResult<()> {
        let name = action.name();
        if name.is_control() {
            return Err(ConciergeError::UnknownAction {
                name: format!("{name} is a control marker, not an invokable action"),
            });
        }
        if self.actions.contains_key(&name) {
            return Err(ConciergeError::UnknownAction {
                name: format!("{name} registered twice"),
            });
        }
        self.actions.insert(name, action);
        Ok(())
    }

    pub fn get(&self, name: ActionName) -> Option<&Arc<dyn Action>> {
        self.actions.get(&name)
    }

    pub fn contains(&self, name: ActionName) -> bool {
        self.actions.contains_key(&name)
    }

    pub fn classification_of(&self, name: ActionName) -> Option<Classification> {
        self.actions.get(&name).map(|a| a.classification())
    }

    /// Schemas for a set of actions, for binding to a decision port.
    pub fn schemas_for(&self, names: &BTreeSet<ActionName>) -> Vec<ActionSchema> {
        names
            .iter()
            .filter_map(|n| self.actions.get(n).map(|a| a.schema()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// The actions one handler is allowed to request, split by classification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilitySet {
    safe: BTreeSet<ActionName>,
    sensitive: BTreeSet<ActionName>,
}

impl CapabilitySet {
    pub fn new(
        safe: impl IntoIterator<Item = ActionName>,
        sensitive: impl IntoIterator<Item = ActionName>,
    ) -> Self {
        Self {
            safe: safe.into_iter().collect(),
            sensitive: sensitive.into_iter().collect(),
        }
    }

    pub fn is_safe(&self, name: ActionName) -> bool {
        self.safe.contains(&name)
    }

    pub fn allows(&self, name: ActionName) -> bool {
        self.safe.contains(&name) || self.sensitive.contains(&name)
    }

    /// True when every request in the batch is in the safe subset.
    pub fn all_safe(&self, batch: &[ActionRequest]) -> bool {
        batch.iter().all(|r| self.is_safe(r.name))
    }

    pub fn safe_names(&self) -> &BTreeSet<ActionName> {
        &self.safe
    }

    pub fn sensitive_names(&self) -> &BTreeSet<ActionName> {
        &self.sensitive
    }

    /// All action names in the set, safe first.
    pub fn all_names(&self) -> BTreeSet<ActionName> {
        self.safe.union(&self.sensitive).copied().collect()
    }
}

/// Static description of one handler. Immutable for process lifetime.
#[derive(Debug, Clone)]
pub struct HandlerDescriptor {
    pub id: HandlerId,
    pub capabilities: CapabilitySet,
    /// Synthetic action-result text appended when the supervisor delegates here.
    pub entry_text: String,
    pub system_prompt: String,
}

/// All handler descriptors, validated against the action registry at startup.
#[derive(Debug)]
pub struct HandlerSet {
    descriptors: HashMap<HandlerId, HandlerDescriptor>,
}

impl HandlerSet {
    /// Build a handler set, verifying that every capability names a
    /// registered action. A miss is a configuration defect and fails fast.
    pub fn new(
        descriptors: Vec<HandlerDescriptor>,
        registry: &ActionRegistry,
    ) -> ConciergeResult<Self> {
        let mut map = HashMap::new();
        for desc in descriptors {
            for name in desc.capabilities.all_names() {
                if !registry.contains(name) {
                    return Err(ConciergeError::UnknownAction {
                        name: format!("{name} (required by handler {})", desc.id),
                    });
                }
            }
            map.insert(desc.id, desc);
        }
        Ok(Self { descriptors: map })
    }

    pub fn get(&self, id: HandlerId) -> Option<&HandlerDescriptor> {
        self.descriptors.get(&id)
    }

    pub fn contains(&self, id: HandlerId) -> bool {
        self.descriptors.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// The standard travel-support wiring: a supervisor plus four delegated
    /// handlers, each owning its domain's searches (safe) and mutations
    /// (sensitive).
    pub fn travel_descriptors() -> Vec<HandlerDescriptor> {
        vec![
            HandlerDescriptor {
                id: HandlerId::Primary,
                capabilities: CapabilitySet::new(
                    [
                        ActionName::FetchUserFlightInformation,
                        ActionName::SearchFlights,
                        ActionName::LookupPolicy,
                    ],
                    [],
                ),
                entry_text: String::new(),
                system_prompt: "You are a helpful customer support assistant for Swiss Airlines. \
                    Use the provided tools to search for flights, company policies, and other \
                    information to assist the user's queries. When searching, be persistent: \
                    expand your query bounds if the first search returns no results. If the user \
                    needs to change a booking, delegate the task to the appropriate specialized \
                    assistant. Only the specialized assistants may make booking changes."
                    .into(),
            },
            HandlerDescriptor {
                id: HandlerId::UpdateFlight,
                capabilities: CapabilitySet::new(
                    [ActionName::SearchFlights],
                    [
                        ActionName::UpdateTicketToNewFlight,
                        ActionName::CancelTicket,
                    ],
                ),
                entry_text: "The assistant is now the Flight Updates Assistant. Reflect on the \
                    above conversation between the host assistant and the user. The user's intent \
                    is unsatisfied; use the provided tools to update or cancel their flight \
                    bookings. If the user changes their mind or needs help beyond flight changes, \
                    call CompleteOrEscalate to return control to the host assistant."
                    .into(),
                system_prompt: "You are a specialized assistant for handling flight updates. The \
                    primary assistant delegates work to you whenever the user needs to change \
                    their flight bookings. Confirm the updated flight details with the customer \
                    and inform them of any additional fees. Do not waste the user's time, and do \
                    not make up invalid tools or functions."
                    .into(),
            },
            HandlerDescriptor {
                id: HandlerId::BookHotel,
                capabilities: CapabilitySet::new(
                    [ActionName::SearchHotels],
                    [
                        ActionName::BookHotel,
                        ActionName::UpdateHotel,
                        ActionName::CancelHotel,
                    ],
                ),
                entry_text: "The assistant is now the Hotel Booking Assistant. Reflect on the \
                    above conversation between the host assistant and the user. The user's intent \
                    is unsatisfied; use the provided tools to search for and book hotels. If the \
                    user changes their mind or needs help beyond hotel booking, call \
                    CompleteOrEscalate to return control to the host assistant."
                    .into(),
                system_prompt: "You are a specialized assistant for handling hotel bookings. The \
                    primary assistant delegates work to you whenever the user needs to book a \
                    hotel. Search for available hotels based on the user's preferences and \
                    confirm the booking details with the customer."
                    .into(),
            },
            HandlerDescriptor {
                id: HandlerId::BookCarRental,
                capabilities: CapabilitySet::new(
                    [ActionName::SearchCarRentals],
                    [
                        ActionName::BookCarRental,
                        ActionName::UpdateCarRental,
                        ActionName::CancelCarRental,
                    ],
                ),
                entry_text: "The assistant is now the Car Rental Assistant. Reflect on the above \
                    conversation between the host assistant and the user. The user's intent is \
                    unsatisfied; use the provided tools to search for and book car rentals. If \
                    the user changes their mind or needs help beyond car rentals, call \
                    CompleteOrEscalate to return control to the host assistant."
                    .into(),
                system_prompt: "You are a specialized assistant for handling car rental bookings. \
                    The primary assistant delegates work to you whenever the user needs to book a \
                    car rental. Search for available rentals based on the user's preferences and \
                    confirm the booking details with the customer."
                    .into(),
            },
            HandlerDescriptor {
                id: HandlerId::BookExcursion,
                capabilities: CapabilitySet::new(
                    [ActionName::SearchTripRecommendations],
                    [
                        ActionName::BookExcursion,
                        ActionName::UpdateExcursion,
                        ActionName::CancelExcursion,
                    ],
                ),
                entry_text: "The assistant is now the Excursion Assistant. Reflect on the above \
                    conversation between the host assistant and the user. The user's intent is \
                    unsatisfied; use the provided tools to search for and book excursions. If the \
                    user changes their mind or needs help beyond trip recommendations, call \
                    CompleteOrEscalate to return control to the host assistant."
                    .into(),
                system_prompt: "You are a specialized assistant for handling trip \
                    recommendations. The primary assistant delegates work to you whenever the \
                    user needs help booking a recommended trip. Search for available excursions \
                    based on the user's preferences and confirm the booking details with the \
                    customer."
                    .into(),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct StubAction {
        name: ActionName,
        classification: Classification,
    }

    #[async_trait]
    impl Action for StubAction {
        fn name(&self) -> ActionName {
            self.name
        }

        fn classification(&self) -> Classification {
            self.classification
        }

        fn schema(&self) -> ActionSchema {
            ActionSchema {
                name: self.name,
                description: format!("stub for {}", self.name),
                parameters: json!({"type": "object", "properties": {}}),
            }
        }

        async fn invoke(
            &self,
            _arguments: serde_json::Value,
            _user_context: &UserContext,
        ) -> ConciergeResult<String> {
            Ok("ok".into())
        }
    }

    fn stub(name: ActionName, classification: Classification) -> Arc<dyn Action> {
        Arc::new(StubAction {
            name,
            classification,
        })
    }

    fn full_registry() -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        let safe = [
            ActionName::FetchUserFlightInformation,
            ActionName::SearchFlights,
            ActionName::SearchHotels,
            ActionName::SearchCarRentals,
            ActionName::SearchTripRecommendations,
            ActionName::LookupPolicy,
        ];
        let sensitive = [
            ActionName::UpdateTicketToNewFlight,
            ActionName::CancelTicket,
            ActionName::BookHotel,
            ActionName::UpdateHotel,
            ActionName::CancelHotel,
            ActionName::BookCarRental,
            ActionName::UpdateCarRental,
            ActionName::CancelCarRental,
            ActionName::BookExcursion,
            ActionName::UpdateExcursion,
            ActionName::CancelExcursion,
        ];
        for name in safe {
            registry.register(stub(name, Classification::Safe)).unwrap();
        }
        for name in sensitive {
            registry
                .register(stub(name, Classification::Sensitive))
                .unwrap();
        }
        registry
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = ActionRegistry::new();
        assert!(registry.is_empty());

        registry
            .register(stub(ActionName::SearchFlights, Classification::Safe))
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(ActionName::SearchFlights));
        assert_eq!(
            registry.classification_of(ActionName::SearchFlights),
            Some(Classification::Safe)
        );
        assert!(registry.get(ActionName::CancelTicket).is_none());
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut registry = ActionRegistry::new();
        registry
            .register(stub(ActionName::BookHotel, Classification::Sensitive))
            .unwrap();
        let err = registry
            .register(stub(ActionName::BookHotel, Classification::Sensitive))
            .unwrap_err();
        assert!(matches!(err, ConciergeError::UnknownAction { .. }));
    }

    #[test]
    fn register_rejects_control_markers() {
        let mut registry = ActionRegistry::new();
        let err = registry
            .register(stub(ActionName::CompleteOrEscalate, Classification::Safe))
            .unwrap_err();
        assert!(matches!(err, ConciergeError::UnknownAction { .. }));
    }

    #[test]
    fn capability_set_splits_by_classification() {
        let caps = CapabilitySet::new(
            [ActionName::SearchHotels],
            [ActionName::BookHotel, ActionName::CancelHotel],
        );
        assert!(caps.is_safe(ActionName::SearchHotels));
        assert!(!caps.is_safe(ActionName::BookHotel));
        assert!(caps.allows(ActionName::BookHotel));
        assert!(!caps.allows(ActionName::CancelTicket));
    }

    #[test]
    fn capability_all_safe_batch() {
        let caps = CapabilitySet::new([ActionName::SearchHotels], [ActionName::BookHotel]);

        let safe_batch = vec![ActionRequest::new(ActionName::SearchHotels, json!({}))];
        assert!(caps.all_safe(&safe_batch));

        let mixed_batch = vec![
            ActionRequest::new(ActionName::SearchHotels, json!({})),
            ActionRequest::new(ActionName::BookHotel, json!({"hotel_id": 3})),
        ];
        assert!(!caps.all_safe(&mixed_batch));
    }

    #[test]
    fn handler_set_validates_against_registry() {
        let registry = full_registry();
        let handlers = HandlerSet::new(HandlerSet::travel_descriptors(), &registry).unwrap();
        assert_eq!(handlers.len(), 5);
        assert!(handlers.contains(HandlerId::Primary));
        assert!(handlers.contains(HandlerId::BookExcursion));
    }

    #[test]
    fn handler_set_rejects_unregistered_capability() {
        let mut registry = ActionRegistry::new();
        registry
            .register(stub(ActionName::SearchHotels, Classification::Safe))
            .unwrap();

        // descriptor names book_hotel, which is not registered
        let descriptors = vec![HandlerDescriptor {
            id: HandlerId::BookHotel,
            capabilities: CapabilitySet::new([ActionName::SearchHotels], [ActionName::BookHotel]),
            entry_text: "hotel time".into(),
            system_prompt: "hotels".into(),
        }];

        let err = HandlerSet::new(descriptors, &registry).unwrap_err();
        assert!(matches!(err, ConciergeError::UnknownAction { .. }));
    }

    #[test]
    fn travel_descriptors_shape() {
        let descriptors = HandlerSet::travel_descriptors();
        assert_eq!(descriptors.len(), 5);

        let primary = descriptors
            .iter()
            .find(|d| d.id == HandlerId::Primary)
            .unwrap();
        assert!(primary.capabilities.sensitive_names().is_empty());
        assert!(primary.capabilities.is_safe(ActionName::LookupPolicy));

        let flight = descriptors
            .iter()
            .find(|d| d.id == HandlerId::UpdateFlight)
            .unwrap();
        assert!(flight
            .capabilities
            .sensitive_names()
            .contains(&ActionName::CancelTicket));
        assert!(!flight.entry_text.is_empty());
    }

    #[test]
    fn schemas_for_capability_set() {
        let registry = full_registry();
        let caps = CapabilitySet::new([ActionName::SearchHotels], [ActionName::BookHotel]);
        let schemas = registry.schemas_for(&caps.all_names());
        assert_eq!(schemas.len(), 2);
    }
}
