use async_trait::async_trait;
use concierge_core::{
    CollaboratorError, CollaboratorResult, ContactClient, InventoryClient, ReservationClient, ReservationRecord,
    ReservationRequest, ScheduleQuery, ScheduleRecord,
};
use concierge_shared::ContactInfo;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::app_config::BackendConfig;

/// HTTP client for the booking backend. One instance serves inventory,
/// reservation and contact calls; every request carries the same envelope.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    session_id: String,
    payment_type: String,
    default_title: String,
    timeout: Duration,
}

impl BackendClient {
    pub fn new(config: &BackendConfig, default_title: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            session_id: config.session_id.clone(),
            payment_type: config.payment_type.clone(),
            default_title: default_title.to_string(),
            timeout,
        })
    }

    fn envelope(&self, request: Value) -> Value {
        json!({
            "username": self.username,
            "sessionid": self.session_id,
            "failstatus": 0,
            "request": request,
        })
    }

    /// Posts an enveloped request and returns the response's `data` member,
    /// `Null` when there is none.
    async fn post(&self, service: &'static str, path: &str, request: Value) -> CollaboratorResult<Value> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(service, url = %url, "backend request");

        let response = self
            .http
            .post(&url)
            .json(&self.envelope(request))
            .send()
            .await
            .map_err(|e| transport_error(service, self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(service, status = status.as_u16(), "backend rejected request");
            return Err(CollaboratorError::Rejected {
                service,
                status: status.as_u16(),
                body,
            });
        }

        let mut body: Value = response
            .json()
            .await
            .map_err(|e| CollaboratorError::UnexpectedResponse {
                service,
                detail: e.to_string(),
            })?;

        if let Some(code) = body.get("failstatus").and_then(Value::as_i64).filter(|c| *c != 0) {
            return Err(CollaboratorError::Rejected {
                service,
                status: status.as_u16(),
                body: format!("failstatus {}: {}", code, body.get("message").unwrap_or(&Value::Null)),
            });
        }

        Ok(body.get_mut("data").map(Value::take).unwrap_or(Value::Null))
    }
}

pub(crate) fn transport_error(service: &'static str, timeout: Duration, e: reqwest::Error) -> CollaboratorError {
    if e.is_timeout() {
        CollaboratorError::Timeout {
            service,
            millis: timeout.as_millis() as u64,
        }
    } else {
        CollaboratorError::Unavailable {
            service,
            reason: e.to_string(),
        }
    }
}

pub(crate) fn schedule_body(query: &ScheduleQuery) -> Value {
    json!({
        "direction": query.direction.code(),
        "airportid": query.origin_airport_id,
        "traveldate": query.travel_date.format("%Y-%m-%d").to_string(),
    })
}

pub(crate) fn reservation_body(request: &ReservationRequest, payment_type: &str) -> Value {
    json!({
        "adulttickets": request.adult_tickets,
        "childtickets": request.child_tickets,
        "arrivalscheduleid": request.arrival_schedule_id,
        "departurescheduleid": request.departure_schedule_id,
        "cartitemid": 0,
        "distributorid": "",
        "paymenttype": payment_type,
        "productid": request.product_type.product_id(),
        "ticketsrequested": request.tickets_requested(),
    })
}

pub(crate) fn contact_body(reservation: &ReservationRecord, contact: &ContactInfo, default_title: &str) -> Value {
    let title = if contact.title.trim().is_empty() {
        default_title
    } else {
        contact.title.trim()
    };
    json!({
        "contact": {
            "cartitemid": reservation.cart_item_id,
            "email": contact.email,
            "firstname": contact.first_name,
            "lastname": contact.last_name,
            "phone": contact.phone,
            "title": title,
        }
    })
}

pub(crate) fn parse_schedules(data: Value) -> CollaboratorResult<Vec<ScheduleRecord>> {
    match data.get("flightschedule") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(list) => serde_json::from_value(list.clone()).map_err(|e| CollaboratorError::UnexpectedResponse {
            service: "inventory",
            detail: e.to_string(),
        }),
    }
}

#[async_trait]
impl InventoryClient for BackendClient {
    async fn lookup_schedules(&self, query: &ScheduleQuery) -> CollaboratorResult<Vec<ScheduleRecord>> {
        let data = self.post("inventory", "getschedule", schedule_body(query)).await?;
        let records = parse_schedules(data)?;
        info!(
            direction = %query.direction,
            airport = %query.origin_airport_id,
            count = records.len(),
            "schedules fetched"
        );
        Ok(records)
    }
}

#[async_trait]
impl ReservationClient for BackendClient {
    async fn reserve(&self, request: &ReservationRequest) -> CollaboratorResult<ReservationRecord> {
        let data = self
            .post("reservation", "reservecartitem", reservation_body(request, &self.payment_type))
            .await?;
        serde_json::from_value(data).map_err(|e| CollaboratorError::UnexpectedResponse {
            service: "reservation",
            detail: e.to_string(),
        })
    }
}

#[async_trait]
impl ContactClient for BackendClient {
    async fn submit_contact(&self, reservation: &ReservationRecord, contact: &ContactInfo) -> CollaboratorResult<()> {
        self.post("contact", "setcontact", contact_body(reservation, contact, &self.default_title))
            .await?;
        info!(cart_item_id = reservation.cart_item_id, email = %contact.email, "contact set");
        Ok(())
    }
}
