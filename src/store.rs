//! Travel data store — the booking records behind the domain actions.
//!
//! The actions never touch storage directly; they go through [`TravelStore`]
//! so the same handlers run against the in-memory store in tests and a real
//! backend in production. All lookups that touch tickets are scoped by
//! passenger id at the action layer, not here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::ConciergeResult;

// ─── Records ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    pub flight_id: i64,
    pub flight_no: String,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub scheduled_departure: DateTime<Utc>,
    pub scheduled_arrival: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub ticket_no: String,
    pub book_ref: String,
    pub passenger_id: String,
    pub flight_id: i64,
    pub seat_no: Option<String>,
}

/// Ticket joined with its current flight, as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketFlightInfo {
    pub ticket_no: String,
    pub book_ref: String,
    pub flight_id: i64,
    pub flight_no: String,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub scheduled_departure: DateTime<Utc>,
    pub scheduled_arrival: DateTime<Utc>,
    pub seat_no: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelRecord {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub price_tier: String,
    pub checkin_date: String,
    pub checkout_date: String,
    pub booked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarRentalRecord {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub price_tier: String,
    pub start_date: String,
    pub end_date: String,
    pub booked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcursionRecord {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub keywords: String,
    pub details: String,
    pub booked: bool,
}

// ─── Store contract ─────────────────────────────────────────────────────────

#[async_trait]
pub trait TravelStore: Send + Sync {
    async fn user_tickets(&self, passenger_id: &str) -> ConciergeResult<Vec<TicketFlightInfo>>;

    async fn search_flights(
        &self,
        departure_airport: Option<&str>,
        arrival_airport: Option<&str>,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
        limit: usize,
    ) -> ConciergeResult<Vec<FlightRecord>>;

    async fn flight(&self, flight_id: i64) -> ConciergeResult<Option<FlightRecord>>;

    async fn ticket(&self, ticket_no: &str) -> ConciergeResult<Option<TicketRecord>>;

    /// Move a ticket onto a different flight. Returns false if the ticket
    /// does not exist.
    async fn reassign_ticket(&self, ticket_no: &str, new_flight_id: i64)
        -> ConciergeResult<bool>;

    /// Remove a ticket entirely. Returns false if the ticket does not exist.
    async fn remove_ticket(&self, ticket_no: &str) -> ConciergeResult<bool>;

    async fn search_hotels(
        &self,
        location: Option<&str>,
        name: Option<&str>,
        price_tier: Option<&str>,
    ) -> ConciergeResult<Vec<HotelRecord>>;

    async fn set_hotel_booked(&self, id: i64, booked: bool) -> ConciergeResult<bool>;

    async fn update_hotel_dates(
        &self,
        id: i64,
        checkin_date: Option<&str>,
        checkout_date: Option<&str>,
    ) -> ConciergeResult<bool>;

    async fn search_car_rentals(
        &self,
        location: Option<&str>,
        name: Option<&str>,
        price_tier: Option<&str>,
    ) -> ConciergeResult<Vec<CarRentalRecord>>;

    async fn set_car_rental_booked(&self, id: i64, booked: bool) -> ConciergeResult<bool>;

    async fn update_car_rental_dates(
        &self,
        id: i64,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> ConciergeResult<bool>;

    async fn search_excursions(
        &self,
        location: Option<&str>,
        name: Option<&str>,
        keywords: Option<&str>,
    ) -> ConciergeResult<Vec<ExcursionRecord>>;

    async fn set_excursion_booked(&self, id: i64, booked: bool) -> ConciergeResult<bool>;

    async fn update_excursion_details(&self, id: i64, details: &str) -> ConciergeResult<bool>;
}

// ─── In-memory store ────────────────────────────────────────────────────────

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Reference implementation backed by concurrent maps. Used directly in
/// tests and small deployments.
#[derive(Default)]
pub struct MemoryTravelStore {
    flights: DashMap<i64, FlightRecord>,
    tickets: DashMap<String, TicketRecord>,
    hotels: DashMap<i64, HotelRecord>,
    car_rentals: DashMap<i64, CarRentalRecord>,
    excursions: DashMap<i64, ExcursionRecord>,
}

impl MemoryTravelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_flight(&self, flight: FlightRecord) {
        self.flights.insert(flight.flight_id, flight);
    }

    pub fn insert_ticket(&self, ticket: TicketRecord) {
        self.tickets.insert(ticket.ticket_no.clone(), ticket);
    }

    pub fn insert_hotel(&self, hotel: HotelRecord) {
        self.hotels.insert(hotel.id, hotel);
    }

    pub fn insert_car_rental(&self, rental: CarRentalRecord) {
        self.car_rentals.insert(rental.id, rental);
    }

    pub fn insert_excursion(&self, excursion: ExcursionRecord) {
        self.excursions.insert(excursion.id, excursion);
    }
}

#[async_trait]
impl TravelStore for MemoryTravelStore {
    async fn user_tickets(&self, passenger_id: &str) -> ConciergeResult<Vec<TicketFlightInfo>> {
        let mut results: Vec<TicketFlightInfo> = self
            .tickets
            .iter()
            .filter(|t| t.passenger_id == passenger_id)
            .filter_map(|t| {
                self.flights.get(&t.flight_id).map(|f| TicketFlightInfo {
                    ticket_no: t.ticket_no.clone(),
                    book_ref: t.book_ref.clone(),
                    flight_id: f.flight_id,
                    flight_no: f.flight_no.clone(),
                    departure_airport: f.departure_airport.clone(),
                    arrival_airport: f.arrival_airport.clone(),
                    scheduled_departure: f.scheduled_departure,
                    scheduled_arrival: f.scheduled_arrival,
                    seat_no: t.seat_no.clone(),
                })
            })
            .collect();
        results.sort_by(|a, b| a.ticket_no.cmp(&b.ticket_no));
        Ok(results)
    }

    async fn search_flights(
        &self,
        departure_airport: Option<&str>,
        arrival_airport: Option<&str>,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
        limit: usize,
    ) -> ConciergeResult<Vec<FlightRecord>> {
        let mut results: Vec<FlightRecord> = self
            .flights
            .iter()
            .filter(|f| {
                departure_airport.map_or(true, |a| f.departure_airport.eq_ignore_ascii_case(a))
                    && arrival_airport.map_or(true, |a| f.arrival_airport.eq_ignore_ascii_case(a))
                    && start_time.map_or(true, |t| f.scheduled_departure >= t)
                    && end_time.map_or(true, |t| f.scheduled_departure <= t)
            })
            .map(|f| f.clone())
            .collect();
        results.sort_by_key(|f| (f.scheduled_departure, f.flight_id));
        results.truncate(limit);
        Ok(results)
    }

    async fn flight(&self, flight_id: i64) -> ConciergeResult<Option<FlightRecord>> {
        Ok(self.flights.get(&flight_id).map(|f| f.clone()))
    }

    async fn ticket(&self, ticket_no: &str) -> ConciergeResult<Option<TicketRecord>> {
        Ok(self.tickets.get(ticket_no).map(|t| t.clone()))
    }

    async fn reassign_ticket(
        &self,
        ticket_no: &str,
        new_flight_id: i64,
    ) -> ConciergeResult<bool> {
        match self.tickets.get_mut(ticket_no) {
            Some(mut ticket) => {
                ticket.flight_id = new_flight_id;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_ticket(&self, ticket_no: &str) -> ConciergeResult<bool> {
        Ok(self.tickets.remove(ticket_no).is_some())
    }

    async fn search_hotels(
        &self,
        location: Option<&str>,
        name: Option<&str>,
        price_tier: Option<&str>,
    ) -> ConciergeResult<Vec<HotelRecord>> {
        let mut results: Vec<HotelRecord> = self
            .hotels
            .iter()
            .filter(|h| {
                location.map_or(true, |l| contains_ci(&h.location, l))
                    && name.map_or(true, |n| contains_ci(&h.name, n))
                    && price_tier.map_or(true, |p| h.price_tier.eq_ignore_ascii_case(p))
            })
            .map(|h| h.clone())
            .collect();
        results.sort_by_key(|h| h.id);
        Ok(results)
    }

    async fn set_hotel_booked(&self, id: i64, booked: bool) -> ConciergeResult<bool> {
        match self.hotels.get_mut(&id) {
            Some(mut hotel) => {
                hotel.booked = booked;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_hotel_dates(
        &self,
        id: i64,
        checkin_date: Option<&str>,
        checkout_date: Option<&str>,
    ) -> ConciergeResult<bool> {
        match self.hotels.get_mut(&id) {
            Some(mut hotel) => {
                if let Some(checkin) = checkin_date {
                    hotel.checkin_date = checkin.to_string();
                }
                if let Some(checkout) = checkout_date {
                    hotel.checkout_date = checkout.to_string();
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn search_car_rentals(
        &self,
        location: Option<&str>,
        name: Option<&str>,
        price_tier: Option<&str>,
    ) -> ConciergeResult<Vec<CarRentalRecord>> {
        let mut results: Vec<CarRentalRecord> = self
            .car_rentals
            .iter()
            .filter(|r| {
                location.map_or(true, |l| contains_ci(&r.location, l))
                    && name.map_or(true, |n| contains_ci(&r.name, n))
                    && price_tier.map_or(true, |p| r.price_tier.eq_ignore_ascii_case(p))
            })
            .map(|r| r.clone())
            .collect();
        results.sort_by_key(|r| r.id);
        Ok(results)
    }

    async fn set_car_rental_booked(&self, id: i64, booked: bool) -> ConciergeResult<bool> {
        match self.car_rentals.get_mut(&id) {
            Some(mut rental) => {
                rental.booked = booked;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_car_rental_dates(
        &self,
        id: i64,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> ConciergeResult<bool> {
        match self.car_rentals.get_mut(&id) {
            Some(mut rental) => {
                if let Some(start) = start_date {
                    rental.start_date = start.to_string();
                }
                if let Some(end) = end_date {
                    rental.end_date = end.to_string();
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn search_excursions(
        &self,
        location: Option<&str>,
        name: Option<&str>,
        keywords: Option<&str>,
    ) -> ConciergeResult<Vec<ExcursionRecord>> {
        let mut results: Vec<ExcursionRecord> = self
            .excursions
            .iter()
            .filter(|e| {
                location.map_or(true, |l| contains_ci(&e.location, l))
                    && name.map_or(true, |n| contains_ci(&e.name, n))
                    && keywords.map_or(true, |ks| {
                        // any keyword may match, comma separated
                        ks.split(',')
                            .map(str::trim)
                            .filter(|k| !k.is_empty())
                            .any(|k| contains_ci(&e.keywords, k))
                    })
            })
            .map(|e| e.clone())
            .collect();
        results.sort_by_key(|e| e.id);
        Ok(results)
    }

    async fn set_excursion_booked(&self, id: i64, booked: bool) -> ConciergeResult<bool> {
        match self.excursions.get_mut(&id) {
            Some(mut excursion) => {
                excursion.booked = booked;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_excursion_details(&self, id: i64, details: &str) -> ConciergeResult<bool> {
        match self.excursions.get_mut(&id) {
            Some(mut excursion) => {
                excursion.details = details.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
