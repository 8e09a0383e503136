//! In-process collaborators for running without the NLU service or the
//! booking backend. The NLU stand-in only understands fairly literal input.

use async_trait::async_trait;
use concierge_core::{
    CollaboratorResult, ContactClient, InventoryClient, NluClient, NluRequest, NluTask, ReservationClient,
    ReservationRecord, ReservationRequest, ScheduleQuery, ScheduleRecord,
};
use concierge_shared::{ContactInfo, Direction, ProductType};
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use tracing::info;

const TITLES: [&str; 5] = ["mr", "mrs", "ms", "miss", "dr"];

/// Pattern-matching stand-in for the NLU collaborator. Produces replies in
/// the same JSON shape the real model is asked for.
pub struct OfflineNlu {
    airport: Regex,
    date: Regex,
    flight: Regex,
    adults: Regex,
    children: Regex,
    email: Regex,
    phone: Regex,
    title: Regex,
    name: Regex,
}

impl OfflineNlu {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            airport: Regex::new(r"\b([A-Z]{3})\b")?,
            date: Regex::new(r"\b(\d{4}-\d{2}-\d{2}|\d{8})\b")?,
            flight: Regex::new(r"(?i)\b([A-Z]{2}\d{1,4})\b")?,
            adults: Regex::new(r"(?i)\b(\d+)\s*adults?\b")?,
            children: Regex::new(r"(?i)\b(\d+)\s*(?:child|children|kids?)\b")?,
            email: Regex::new(r"[\w.+-]+@[\w-]+(?:\.[\w-]+)+")?,
            phone: Regex::new(r"\+?\d[\d\s-]{5,}\d")?,
            title: Regex::new(r"(?i)\b(mr|mrs|ms|miss|dr)\.?(?:\s|$)")?,
            name: Regex::new(r"\b([A-Z][a-z'-]+)\s+([A-Z][a-z'-]+)\b")?,
        })
    }

    fn product(&self, text: &str) -> Value {
        let lowered = text.to_lowercase();
        let has_arrival = lowered.contains("arrival") || lowered.contains("arriving");
        let has_departure = lowered.contains("departure") || lowered.contains("departing") || lowered.contains("lounge");

        let product = if lowered.contains("bundle") || lowered.contains("both") || (has_arrival && has_departure) {
            Some(ProductType::ArrivalDepartureBundle)
        } else if has_departure {
            Some(ProductType::DepartureOnly)
        } else if has_arrival {
            Some(ProductType::ArrivalOnly)
        } else {
            None
        };

        match product {
            Some(product) => json!({
                "message": format!("{} selected.", product.description()),
                "done": true,
                "fields": { "product_type": product.as_str() },
            }),
            None => json!({
                "message": "Would you like arrival service, departure service, or both?",
                "done": false,
            }),
        }
    }

    fn leg(&self, direction: Direction, text: &str) -> Value {
        let mut fields = Map::new();
        fields.insert("direction".to_string(), json!(direction.as_str()));

        let flight = self.flight.captures(text).map(|c| c[1].to_uppercase());
        if let Some(flight) = &flight {
            fields.insert("flight_id".to_string(), json!(flight));
        }
        if let Some(airport) = self
            .airport
            .captures_iter(text)
            .map(|c| c[1].to_string())
            .find(|code| flight.as_deref() != Some(code.as_str()))
        {
            fields.insert("origin_airport_id".to_string(), json!(airport));
        }
        if let Some(date) = self.date.captures(text) {
            fields.insert("travel_date".to_string(), json!(&date[1]));
        }
        if let Some(adults) = self.adults.captures(text).and_then(|c| c[1].parse::<u32>().ok()) {
            fields.insert("adult_tickets".to_string(), json!(adults));
        }
        if let Some(children) = self.children.captures(text).and_then(|c| c[1].parse::<u32>().ok()) {
            fields.insert("child_tickets".to_string(), json!(children));
        }

        json!({ "message": "", "done": false, "fields": fields })
    }

    fn contact(&self, text: &str) -> Value {
        let mut fields = Map::new();
        let mut rest = text.to_string();

        if let Some(m) = self.email.find(text) {
            fields.insert("email".to_string(), json!(m.as_str()));
            rest = rest.replace(m.as_str(), " ");
        }
        if let Some(m) = self.phone.find(&rest) {
            let phone = m.as_str().to_string();
            fields.insert("phone".to_string(), json!(phone.trim()));
            rest = rest.replace(&phone, " ");
        }
        if let Some(c) = self.title.captures(&rest) {
            let title = format!("{}.", c[1].to_uppercase());
            fields.insert("title".to_string(), json!(title));
        }
        if let Some(c) = self
            .name
            .captures_iter(&rest)
            .find(|c| !TITLES.contains(&c[1].to_lowercase().as_str()))
        {
            fields.insert("first_name".to_string(), json!(&c[1]));
            fields.insert("last_name".to_string(), json!(&c[2]));
        }

        json!({ "message": "", "done": false, "fields": fields })
    }
}

#[async_trait]
impl NluClient for OfflineNlu {
    async fn complete(&self, request: &NluRequest) -> CollaboratorResult<String> {
        let reply = match request.task {
            NluTask::ProductSelection => self.product(&request.user_text),
            NluTask::FlightLeg(direction) => self.leg(direction, &request.user_text),
            NluTask::Contact => self.contact(&request.user_text),
        };
        Ok(reply.to_string())
    }
}

/// A daily timetable: the same flights run every day.
pub struct StaticInventory {
    flights: Vec<(Direction, String, ScheduleRecord)>,
}

impl StaticInventory {
    pub fn new(flights: Vec<(Direction, String, ScheduleRecord)>) -> Self {
        Self { flights }
    }

    pub fn sample() -> Self {
        let row = |direction, airport: &str, flight: &str, id| {
            let mut record = ScheduleRecord::new(flight, id);
            record.details.insert("airportid".to_string(), json!(airport));
            (direction, airport.to_string(), record)
        };
        Self::new(vec![
            row(Direction::Arrival, "JFK", "AA100", 55),
            row(Direction::Arrival, "JFK", "BA117", 56),
            row(Direction::Arrival, "SIA", "JM7", 101),
            row(Direction::Departure, "JFK", "AA200", 77),
            row(Direction::Departure, "SIA", "JM8", 102),
        ])
    }
}

#[async_trait]
impl InventoryClient for StaticInventory {
    async fn lookup_schedules(&self, query: &ScheduleQuery) -> CollaboratorResult<Vec<ScheduleRecord>> {
        Ok(self
            .flights
            .iter()
            .filter(|(direction, airport, _)| {
                *direction == query.direction && airport.eq_ignore_ascii_case(&query.origin_airport_id)
            })
            .map(|(_, _, record)| record.clone())
            .collect())
    }
}

/// Accepts every reservation and hands out increasing cart item ids.
pub struct DeskReservations {
    next_id: AtomicI64,
}

impl DeskReservations {
    pub fn new(first_id: i64) -> Self {
        Self {
            next_id: AtomicI64::new(first_id),
        }
    }
}

impl Default for DeskReservations {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl ReservationClient for DeskReservations {
    async fn reserve(&self, request: &ReservationRequest) -> CollaboratorResult<ReservationRecord> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut record = ReservationRecord::new(id);
        record
            .details
            .insert("productid".to_string(), json!(request.product_type.product_id()));
        record
            .details
            .insert("ticketsrequested".to_string(), json!(request.tickets_requested()));
        info!(cart_item_id = id, product = %request.product_type, "offline reservation");
        Ok(record)
    }
}

/// Accepts every contact submission.
#[derive(Default)]
pub struct AcceptingContactDesk {
    received: AtomicUsize,
}

impl AcceptingContactDesk {
    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContactClient for AcceptingContactDesk {
    async fn submit_contact(&self, reservation: &ReservationRecord, contact: &ContactInfo) -> CollaboratorResult<()> {
        self.received.fetch_add(1, Ordering::SeqCst);
        info!(cart_item_id = reservation.cart_item_id, email = %contact.email, "offline contact accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use concierge_core::parse_nlu_reply;

    fn ask(nlu: &OfflineNlu, task: NluTask, text: &str) -> concierge_core::NluReply {
        let raw = match task {
            NluTask::ProductSelection => nlu.product(text),
            NluTask::FlightLeg(direction) => nlu.leg(direction, text),
            NluTask::Contact => nlu.contact(text),
        };
        parse_nlu_reply(&raw.to_string()).unwrap()
    }

    #[test]
    fn test_product_detection() {
        let nlu = OfflineNlu::new().unwrap();
        let product = |text| ask(&nlu, NluTask::ProductSelection, text).field_str(&["product_type"]);

        assert_eq!(product("I need an arrival service").as_deref(), Some("ARRIVAL_ONLY"));
        assert_eq!(product("departure lounge please").as_deref(), Some("DEPARTURE_ONLY"));
        assert_eq!(product("arrival and departure").as_deref(), Some("ARRIVAL_DEPARTURE_BUNDLE"));
        assert_eq!(product("not sure yet"), None);
    }

    #[test]
    fn test_leg_extraction() {
        let nlu = OfflineNlu::new().unwrap();
        let reply = ask(
            &nlu,
            NluTask::FlightLeg(Direction::Arrival),
            "Landing at JFK on 2025-06-21, flight aa100, 2 adults and 1 child",
        );

        assert_eq!(reply.field_str(&["origin_airport_id"]).as_deref(), Some("JFK"));
        assert_eq!(reply.field_str(&["travel_date"]).as_deref(), Some("2025-06-21"));
        assert_eq!(reply.field_str(&["flight_id"]).as_deref(), Some("AA100"));
        assert_eq!(reply.field_u32(&["adult_tickets"]), Some(2));
        assert_eq!(reply.field_u32(&["child_tickets"]), Some(1));
    }

    #[test]
    fn test_contact_extraction() {
        let nlu = OfflineNlu::new().unwrap();
        let reply = ask(
            &nlu,
            NluTask::Contact,
            "Mrs. Jane Doe, jane.doe@example.com, +1 876 555 0100",
        );

        assert_eq!(reply.field_str(&["title"]).as_deref(), Some("MRS."));
        assert_eq!(reply.field_str(&["first_name"]).as_deref(), Some("Jane"));
        assert_eq!(reply.field_str(&["last_name"]).as_deref(), Some("Doe"));
        assert_eq!(reply.field_str(&["email"]).as_deref(), Some("jane.doe@example.com"));
        assert_eq!(reply.field_str(&["phone"]).as_deref(), Some("+1 876 555 0100"));
    }

    #[tokio::test]
    async fn test_static_inventory_matches_direction_and_airport() {
        let inventory = StaticInventory::sample();
        let records = inventory
            .lookup_schedules(&ScheduleQuery {
                direction: Direction::Arrival,
                origin_airport_id: "jfk".to_string(),
                travel_date: NaiveDate::from_ymd_opt(2025, 6, 21).unwrap(),
            })
            .await
            .unwrap();

        let flights: Vec<&str> = records.iter().map(|r| r.flight_id.as_str()).collect();
        assert_eq!(flights, vec!["AA100", "BA117"]);
    }

    #[tokio::test]
    async fn test_desk_reservations_hand_out_increasing_ids() {
        let desk = DeskReservations::new(500);
        let request = ReservationRequest {
            adult_tickets: 1,
            child_tickets: 0,
            arrival_schedule_id: 55,
            departure_schedule_id: 0,
            product_type: ProductType::ArrivalOnly,
        };
        let first = desk.reserve(&request).await.unwrap();
        let second = desk.reserve(&request).await.unwrap();
        assert_eq!(first.cart_item_id, 500);
        assert_eq!(second.cart_item_id, 501);
        assert_eq!(first.details["productid"], "ARRIVALONLY");
    }
}
