//! Concrete action implementations, one module per travel domain.
//!
//! Domain refusals (unknown ids, ownership mismatches, policy violations)
//! come back as `Ok` text the handler can relay to the user. `Err` is
//! reserved for infrastructure failures. Registration wiring lives in
//! [`register_travel_actions`].

use std::sync::Arc;

use crate::error::ConciergeResult;
use crate::registry::ActionRegistry;
use crate::retrieval::PolicyRetriever;
use crate::store::TravelStore;

pub mod car_rentals;
pub mod excursions;
pub mod flights;
pub mod hotels;
pub mod policy;

pub use car_rentals::{
    BookCarRentalAction, CancelCarRentalAction, SearchCarRentalsAction, UpdateCarRentalAction,
};
pub use excursions::{
    BookExcursionAction, CancelExcursionAction, SearchTripRecommendationsAction,
    UpdateExcursionAction,
};
pub use flights::{
    CancelTicketAction, FetchUserFlightInformationAction, SearchFlightsAction,
    UpdateTicketToNewFlightAction,
};
pub use hotels::{BookHotelAction, CancelHotelAction, SearchHotelsAction, UpdateHotelAction};
pub use policy::LookupPolicyAction;

/// Register the full travel action catalogue against one store and policy
/// retriever.
pub fn register_travel_actions(
    registry: &mut ActionRegistry,
    store: Arc<dyn TravelStore>,
    retriever: Arc<PolicyRetriever>,
) -> ConciergeResult<()> {
    registry.register(Arc::new(FetchUserFlightInformationAction::new(
        store.clone(),
    )))?;
    registry.register(Arc::new(SearchFlightsAction::new(store.clone())))?;
    registry.register(Arc::new(UpdateTicketToNewFlightAction::new(store.clone())))?;
    registry.register(Arc::new(CancelTicketAction::new(store.clone())))?;

    registry.register(Arc::new(SearchHotelsAction::new(store.clone())))?;
    registry.register(Arc::new(BookHotelAction::new(store.clone())))?;
    registry.register(Arc::new(UpdateHotelAction::new(store.clone())))?;
    registry.register(Arc::new(CancelHotelAction::new(store.clone())))?;

    registry.register(Arc::new(SearchCarRentalsAction::new(store.clone())))?;
    registry.register(Arc::new(BookCarRentalAction::new(store.clone())))?;
    registry.register(Arc::new(UpdateCarRentalAction::new(store.clone())))?;
    registry.register(Arc::new(CancelCarRentalAction::new(store.clone())))?;

    registry.register(Arc::new(SearchTripRecommendationsAction::new(
        store.clone(),
    )))?;
    registry.register(Arc::new(BookExcursionAction::new(store.clone())))?;
    registry.register(Arc::new(UpdateExcursionAction::new(store.clone())))?;
    registry.register(Arc::new(CancelExcursionAction::new(store)))?;

    registry.register(Arc::new(LookupPolicyAction::new(retriever)))?;
    Ok(())
}
