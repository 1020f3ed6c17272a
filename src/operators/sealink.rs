//! Адаптер Sealink Adventures (суда Sealink и Nautika).
//!
//! Протокол: POST-запросы с `userName` + `token` в корне JSON, даты в
//! формате `d-m-yyyy` без ведущих нулей, места двумя словарями
//! `bClass`/`pClass` (ключ — номер места). Ответ всегда в конверте
//! `{err, data}` с HTTP 200, ошибки приходят строкой в `err`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::SealinkConfig;
use crate::error::{OperatorError, OperatorErrorKind};
use crate::locations::{self, Location};
use crate::models::booking::BookingCallOutcome;
use crate::models::ferry::{
    ClassPricing, FerryClass, FerryOperator, OperatorData, OperatorFeatures, PricingSummary,
    RouteInfo, ScheduleInfo, UnifiedFerryResult,
};
use crate::models::search::SearchParams;
use crate::models::seat::{SeatLayout, SeatLayoutRequest, SeatTier};
use crate::models::session::{FerryBookingSession, Gender};
use crate::services::seatmap;

use super::{
    call_with_retry, classify_operator_failure, map_http_status, map_transport_error, parse_hhmm,
    sealink_date, truthy, OperatorAdapter,
};

pub struct SealinkAdapter {
    base_url: String,
    username: String,
    token: String,
    client: reqwest::Client,
    search_timeout: Duration,
    booking_timeout: Duration,
    retry_attempts: u32,
}

impl SealinkAdapter {
    pub fn new(config: &SealinkConfig, retry_attempts: u32) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            token: config.token.clone(),
            client,
            search_timeout: Duration::from_secs(config.search_timeout_seconds),
            booking_timeout: Duration::from_secs(config.booking_timeout_seconds),
            retry_attempts,
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    /// Проверка кред на старте. Сбой не фатален, просто сигнал в лог.
    pub async fn verify_auth(&self) -> Result<(), OperatorError> {
        let body = AuthOnlyRequest {
            user_name: &self.username,
            token: &self.token,
        };

        let response = self
            .client
            .post(self.endpoint("getProfile"))
            .timeout(self.search_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(self.operator(), "getProfile", e))?;

        if !response.status().is_success() {
            return Err(map_http_status(self.operator(), "getProfile", response.status()));
        }

        let envelope: Envelope<Value> = response
            .json()
            .await
            .map_err(|e| map_transport_error(self.operator(), "getProfile", e))?;

        match envelope.err_text() {
            Some(err) => Err(classify_operator_failure(self.operator(), err)),
            None => Ok(()),
        }
    }

    async fn fetch_trips_once(
        &self,
        date: &str,
        from: &Location,
        to: &Location,
    ) -> Result<Vec<(Value, SealinkTrip)>, OperatorError> {
        let body = TripDataRequest {
            date,
            from: from.sealink_name,
            to: to.sealink_name,
            user_name: &self.username,
            token: &self.token,
        };

        let response = self
            .client
            .post(self.endpoint("getTripData"))
            .timeout(self.search_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(self.operator(), "getTripData", e))?;

        if !response.status().is_success() {
            return Err(map_http_status(self.operator(), "getTripData", response.status()));
        }

        let envelope: Envelope<Vec<Value>> = response
            .json()
            .await
            .map_err(|e| map_transport_error(self.operator(), "getTripData", e))?;

        if let Some(err) = envelope.err_text() {
            return Err(classify_operator_failure(self.operator(), err));
        }

        let raw_trips = envelope.data.unwrap_or_default();
        let mut trips = Vec::with_capacity(raw_trips.len());
        for raw in raw_trips {
            match serde_json::from_value::<SealinkTrip>(raw.clone()) {
                Ok(trip) => trips.push((raw, trip)),
                Err(e) => warn!(error = %e, "skipping malformed sealink trip entry"),
            }
        }
        Ok(trips)
    }

    fn map_trip(&self, raw: Value, trip: &SealinkTrip, params: &SearchParams) -> UnifiedFerryResult {
        let departure = parse_hhmm(&format!("{:02}:{:02}", trip.d_time.hour, trip.d_time.minute));
        let arrival = parse_hhmm(&format!("{:02}:{:02}", trip.a_time.hour, trip.a_time.minute));
        let duration = match (departure, arrival) {
            (Some(d), Some(a)) => super::format_duration(d, a),
            _ => String::new(),
        };

        let mut classes = Vec::new();
        if trip.fares.b_base_fare > 0.0 || !trip.b_class.is_empty() {
            classes.push(FerryClass {
                id: "B".into(),
                name: "Royal".into(),
                price: trip.fares.b_base_fare,
                available_seats: count_free(&trip.b_class),
                pricing: ClassPricing::flat(trip.fares.b_base_fare),
                amenities: vec!["Air Conditioned".into()],
            });
        }
        if trip.fares.p_base_fare > 0.0 || !trip.p_class.is_empty() {
            classes.push(FerryClass {
                id: "P".into(),
                name: "Luxury".into(),
                price: trip.fares.p_base_fare,
                available_seats: count_free(&trip.p_class),
                pricing: ClassPricing::flat(trip.fares.p_base_fare),
                amenities: vec!["Air Conditioned".into(), "Luxury Lounge".into()],
            });
        }

        let availability = classes.iter().map(|c| c.available_seats).sum();
        let min_price = classes
            .iter()
            .map(|c| c.price)
            .fold(f64::INFINITY, f64::min);

        UnifiedFerryResult {
            id: UnifiedFerryResult::compose_id(self.operator(), &trip.id.to_string()),
            operator: self.operator(),
            operator_ferry_id: trip.id.to_string(),
            ferry_name: vessel_name(trip.vessel_id),
            route: RouteInfo {
                from: params.from.clone(),
                to: params.to.clone(),
            },
            schedule: ScheduleInfo {
                date: params.date,
                departure_time: format!("{:02}:{:02}", trip.d_time.hour, trip.d_time.minute),
                arrival_time: format!("{:02}:{:02}", trip.a_time.hour, trip.a_time.minute),
                duration,
            },
            classes,
            availability,
            pricing: PricingSummary {
                min_price: if min_price.is_finite() { min_price } else { 0.0 },
                currency: "INR".into(),
            },
            features: OperatorFeatures {
                supports_seat_selection: true,
                supports_auto_assignment: false,
            },
            operator_data: OperatorData {
                original_response: raw,
            },
        }
    }

    fn resolve_pair(
        &self,
        from: &str,
        to: &str,
    ) -> Result<(&'static Location, &'static Location), OperatorError> {
        let from = locations::resolve(from).ok_or_else(|| {
            OperatorError::new(
                self.operator(),
                OperatorErrorKind::Validation,
                format!("unknown location: {from}"),
            )
        })?;
        let to = locations::resolve(to).ok_or_else(|| {
            OperatorError::new(
                self.operator(),
                OperatorErrorKind::Validation,
                format!("unknown location: {to}"),
            )
        })?;
        Ok((from, to))
    }
}

#[async_trait]
impl OperatorAdapter for SealinkAdapter {
    fn operator(&self) -> FerryOperator {
        FerryOperator::Sealink
    }

    async fn search(&self, params: &SearchParams) -> Result<Vec<UnifiedFerryResult>, OperatorError> {
        let (from, to) = self.resolve_pair(&params.from, &params.to)?;
        let date = sealink_date(params.date);

        let trips = call_with_retry(self.operator(), "getTripData", self.retry_attempts, || {
            self.fetch_trips_once(&date, from, to)
        })
        .await?;

        debug!(count = trips.len(), "sealink returned trips");
        Ok(trips
            .into_iter()
            .map(|(raw, trip)| self.map_trip(raw, &trip, params))
            .collect())
    }

    async fn seat_layout(&self, request: &SeatLayoutRequest) -> Result<SeatLayout, OperatorError> {
        let (from, to) = self.resolve_pair(&request.from, &request.to)?;
        let date = sealink_date(request.travel_date);

        // Схему не кэшируем и не переиспользуем из поиска: занятость
        // мест меняется каждую минуту, берём свежий снимок.
        let trips = call_with_retry(self.operator(), "getTripData", self.retry_attempts, || {
            self.fetch_trips_once(&date, from, to)
        })
        .await?;

        let (raw, trip) = trips
            .into_iter()
            .find(|(_, t)| t.id.to_string() == request.ferry_id)
            .ok_or_else(|| {
                OperatorError::new(
                    self.operator(),
                    OperatorErrorKind::Validation,
                    format!("trip {} not found on {}", request.ferry_id, request.travel_date),
                )
            })?;

        let mut seats =
            seatmap::normalize_sealink(&raw, trip.fares.b_base_fare, trip.fares.p_base_fare);
        match request.class_id.as_str() {
            "B" => seats.retain(|s| s.tier == Some(SeatTier::B)),
            "P" => seats.retain(|s| s.tier == Some(SeatTier::P)),
            _ => {}
        }
        Ok(SeatLayout::Manual { seats })
    }

    async fn book(&self, session: &FerryBookingSession) -> BookingCallOutcome {
        let request = match self.build_booking_request(session) {
            Ok(r) => r,
            Err(e) => return BookingCallOutcome::Failed(e),
        };

        let response = self
            .client
            .post(self.endpoint("bookSeats"))
            .timeout(self.booking_timeout)
            .json(&request)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            // connect refused — запрос гарантированно не дошёл
            Err(e) if e.is_connect() => {
                return BookingCallOutcome::Failed(map_transport_error(
                    self.operator(),
                    "bookSeats",
                    e,
                ))
            }
            // таймаут и прочие обрывы: бронь могла успеть создаться
            Err(e) => {
                return BookingCallOutcome::Ambiguous(map_transport_error(
                    self.operator(),
                    "bookSeats",
                    e,
                ))
            }
        };

        let status = response.status();
        if status.is_server_error() {
            return BookingCallOutcome::Ambiguous(map_http_status(
                self.operator(),
                "bookSeats",
                status,
            ));
        }
        if !status.is_success() {
            return BookingCallOutcome::Failed(map_http_status(self.operator(), "bookSeats", status));
        }

        let envelope: Envelope<Value> = match response.json().await {
            Ok(e) => e,
            Err(e) => {
                return BookingCallOutcome::Ambiguous(map_transport_error(
                    self.operator(),
                    "bookSeats",
                    e,
                ))
            }
        };

        if let Some(err) = envelope.err_text() {
            return BookingCallOutcome::Failed(classify_operator_failure(self.operator(), err));
        }

        let data = match envelope.data {
            Some(d) if !d.is_null() => d,
            _ => {
                return BookingCallOutcome::Ambiguous(OperatorError::upstream(
                    self.operator(),
                    "bookSeats returned empty payload",
                ))
            }
        };

        let seat_status = truthy(&data["seatStatus"]);
        let pnr = data["pnr"].as_str().unwrap_or_default().to_string();

        if !seat_status {
            return BookingCallOutcome::Failed(OperatorError::new(
                self.operator(),
                OperatorErrorKind::SeatUnavailable,
                "seats could not be confirmed by sealink",
            ));
        }
        if pnr.is_empty() {
            return BookingCallOutcome::Ambiguous(OperatorError::upstream(
                self.operator(),
                "bookSeats accepted but returned no pnr",
            ));
        }

        BookingCallOutcome::Confirmed {
            pnr,
            operator_booking_id: None,
            raw_response: data,
        }
    }
}

impl SealinkAdapter {
    fn build_booking_request<'a>(
        &'a self,
        session: &'a FerryBookingSession,
    ) -> Result<BookSeatsRequest<'a>, OperatorError> {
        let trip: SealinkTripRef = serde_json::from_value(session.selected_ferry.route_data.clone())
            .map_err(|e| {
                OperatorError::new(
                    self.operator(),
                    OperatorErrorKind::Validation,
                    format!("stored trip payload is unusable: {e}"),
                )
            })?;

        let seats = session.seat_numbers();
        if seats.is_empty() {
            return Err(OperatorError::new(
                self.operator(),
                OperatorErrorKind::Validation,
                "sealink booking requires selected seats",
            ));
        }

        let seated: Vec<_> = session.passengers.iter().filter(|p| !p.is_infant).collect();
        if seated.len() != seats.len() {
            return Err(OperatorError::new(
                self.operator(),
                OperatorErrorKind::Validation,
                format!(
                    "{} seats selected for {} seated passengers",
                    seats.len(),
                    seated.len()
                ),
            ));
        }

        let contact = session.contact.as_ref().ok_or_else(|| {
            OperatorError::new(
                self.operator(),
                OperatorErrorKind::Validation,
                "contact details are required for sealink booking",
            )
        })?;

        let mut pax = Vec::with_capacity(seated.len());
        for (passenger, seat_id) in seated.iter().zip(seats.iter()) {
            let (tier, seat) =
                parse_seat_id(seat_id, &session.selected_class.class_id).ok_or_else(|| {
                    OperatorError::new(
                        self.operator(),
                        OperatorErrorKind::Validation,
                        format!("unrecognized seat id: {seat_id}"),
                    )
                })?;
            pax.push(PaxEntry {
                name: &passenger.name,
                age: passenger.age.to_string(),
                gender: gender_code(passenger.gender),
                nationality: sealink_nationality(&passenger.nationality),
                passport: passenger.passport.as_deref(),
                tier,
                seat,
                is_cancelled: false,
            });
        }

        let infant_pax = session
            .passengers
            .iter()
            .filter(|p| p.is_infant)
            .map(|p| InfantEntry {
                name: &p.name,
                age: p.age.to_string(),
                gender: gender_code(p.gender),
            })
            .collect();

        Ok(BookSeatsRequest {
            id: trip.id,
            trip_id: trip.trip_id,
            vessel_id: trip.vessel_id,
            from: trip.from,
            to: trip.to,
            booking_ts: Utc::now().timestamp(),
            pax_detail: PaxDetail {
                email: &contact.email,
                phone: &contact.phone,
                pax,
                infant_pax,
            },
            user_name: &self.username,
            token: &self.token,
        })
    }
}

/* ---------- wire types ---------- */

#[derive(Serialize)]
struct AuthOnlyRequest<'a> {
    #[serde(rename = "userName")]
    user_name: &'a str,
    token: &'a str,
}

#[derive(Serialize)]
struct TripDataRequest<'a> {
    date: &'a str,
    from: &'a str,
    to: &'a str,
    #[serde(rename = "userName")]
    user_name: &'a str,
    token: &'a str,
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn err_text(&self) -> Option<String> {
        match &self.err {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SealinkTrip {
    id: i64,
    #[serde(rename = "vesselID")]
    vessel_id: i64,
    #[serde(rename = "dTime")]
    d_time: SealinkTime,
    #[serde(rename = "aTime")]
    a_time: SealinkTime,
    fares: SealinkFares,
    #[serde(default, rename = "bClass")]
    b_class: HashMap<String, SealinkSeatCell>,
    #[serde(default, rename = "pClass")]
    p_class: HashMap<String, SealinkSeatCell>,
}

// усечённый вид trip-а, который адаптер достаёт из route_data сессии
#[derive(Debug, Deserialize)]
struct SealinkTripRef {
    id: i64,
    #[serde(rename = "tripId")]
    trip_id: i64,
    #[serde(rename = "vesselID")]
    vessel_id: i64,
    from: String,
    to: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SealinkTime {
    hour: u32,
    minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct SealinkFares {
    #[serde(default, rename = "pBaseFare")]
    p_base_fare: f64,
    #[serde(default, rename = "bBaseFare")]
    b_base_fare: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct SealinkSeatCell {
    #[serde(default, rename = "isBooked")]
    is_booked: i64,
    #[serde(default, rename = "isBlocked")]
    is_blocked: i64,
}

#[derive(Serialize)]
struct BookSeatsRequest<'a> {
    id: i64,
    #[serde(rename = "tripId")]
    trip_id: i64,
    #[serde(rename = "vesselID")]
    vessel_id: i64,
    from: String,
    to: String,
    #[serde(rename = "bookingTS")]
    booking_ts: i64,
    #[serde(rename = "paxDetail")]
    pax_detail: PaxDetail<'a>,
    #[serde(rename = "userName")]
    user_name: &'a str,
    token: &'a str,
}

#[derive(Serialize)]
struct PaxDetail<'a> {
    email: &'a str,
    phone: &'a str,
    pax: Vec<PaxEntry<'a>>,
    #[serde(rename = "infantPax")]
    infant_pax: Vec<InfantEntry<'a>>,
}

// возраст у Sealink — строка, число сандбокс молча отвергает
#[derive(Serialize)]
struct PaxEntry<'a> {
    name: &'a str,
    age: String,
    gender: &'static str,
    nationality: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    passport: Option<&'a str>,
    tier: String,
    seat: String,
    #[serde(rename = "isCancelled")]
    is_cancelled: bool,
}

#[derive(Serialize)]
struct InfantEntry<'a> {
    name: &'a str,
    age: String,
    gender: &'static str,
}

fn vessel_name(vessel_id: i64) -> String {
    match vessel_id {
        1 => "Sealink".to_string(),
        2 => "Nautika".to_string(),
        other => format!("Sealink Vessel {other}"),
    }
}

fn gender_code(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "M",
        Gender::Female => "F",
        Gender::Other => "O",
    }
}

/// Словарь Sealink: "India", не "Indian". Остальные гражданства
/// уходят как есть.
fn sealink_nationality(raw: &str) -> &str {
    match raw.trim().to_lowercase().as_str() {
        "india" | "indian" | "in" => "India",
        _ => raw,
    }
}

fn count_free(seats: &HashMap<String, SealinkSeatCell>) -> u32 {
    seats
        .values()
        .filter(|s| s.is_booked == 0 && s.is_blocked == 0)
        .count() as u32
}

/// Места Sealink ходят по системе как `b_A1` / `p_C3`. Голый номер
/// без префикса относим к выбранному классу.
fn parse_seat_id(seat_id: &str, class_id: &str) -> Option<(String, String)> {
    if let Some((tier, number)) = seat_id.split_once('_') {
        let tier = match tier {
            "b" | "B" => "B",
            "p" | "P" => "P",
            _ => return None,
        };
        return Some((tier.to_string(), number.to_string()));
    }
    match class_id {
        "B" | "P" => Some((class_id.to_string(), seat_id.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_ids_carry_their_tier() {
        assert_eq!(
            parse_seat_id("b_A1", "P"),
            Some(("B".to_string(), "A1".to_string()))
        );
        assert_eq!(
            parse_seat_id("p_C3", "B"),
            Some(("P".to_string(), "C3".to_string()))
        );
        // голый номер наследует класс сессии
        assert_eq!(
            parse_seat_id("A1", "B"),
            Some(("B".to_string(), "A1".to_string()))
        );
        assert_eq!(parse_seat_id("x_A1", "B"), None);
        assert_eq!(parse_seat_id("A1", "royal"), None);
    }

    #[test]
    fn envelope_err_can_be_string_or_object() {
        let with_text: Envelope<Value> =
            serde_json::from_str(r#"{"err": "Invalid token", "data": null}"#).unwrap();
        assert_eq!(with_text.err_text().unwrap(), "Invalid token");

        let with_null: Envelope<Value> =
            serde_json::from_str(r#"{"err": null, "data": []}"#).unwrap();
        assert!(with_null.err_text().is_none());

        let with_object: Envelope<Value> =
            serde_json::from_str(r#"{"err": {"code": 401}, "data": null}"#).unwrap();
        assert!(with_object.err_text().unwrap().contains("401"));
    }

    #[test]
    fn free_seats_exclude_booked_and_blocked() {
        let mut map = HashMap::new();
        map.insert(
            "A1".to_string(),
            SealinkSeatCell {
                is_booked: 1,
                is_blocked: 0,
            },
        );
        map.insert(
            "A2".to_string(),
            SealinkSeatCell {
                is_booked: 0,
                is_blocked: 1,
            },
        );
        map.insert(
            "A3".to_string(),
            SealinkSeatCell {
                is_booked: 0,
                is_blocked: 0,
            },
        );
        assert_eq!(count_free(&map), 1);
    }

    #[test]
    fn truthy_accepts_bool_and_numeric_flags() {
        assert!(truthy(&serde_json::json!(true)));
        assert!(truthy(&serde_json::json!(1)));
        assert!(!truthy(&serde_json::json!(0)));
        assert!(!truthy(&serde_json::json!(null)));
    }

    #[test]
    fn nationality_follows_the_sealink_vocabulary() {
        assert_eq!(sealink_nationality("Indian"), "India");
        assert_eq!(sealink_nationality("india"), "India");
        assert_eq!(sealink_nationality(" IN "), "India");
        assert_eq!(sealink_nationality("German"), "German");
    }
}
