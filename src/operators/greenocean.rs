//! Адаптер Green Ocean Seaways.
//!
//! Аутентификация без токенов: каждый запрос несёт `public_key` и
//! `hash_string` — SHA-512 от значений полей запроса, соединённых
//! вертикальной чертой в порядке, зафиксированном документацией
//! оператора, с `private_key`, дописанным последним. Массивы (места)
//! перед хэшированием склеиваются запятой. Порядок полей свой у каждой
//! ручки; перепутанный порядок оператор встречает отказом "Invalid
//! hash". Даты — `dd-mm-yyyy` с ведущими нулями.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha512};
use tracing::debug;

use crate::config::GreenOceanConfig;
use crate::error::{OperatorError, OperatorErrorKind};
use crate::locations::{self, Location};
use crate::models::booking::BookingCallOutcome;
use crate::models::ferry::{
    ClassPricing, FerryClass, FerryOperator, OperatorData, OperatorFeatures, PricingSummary,
    RouteInfo, ScheduleInfo, UnifiedFerryResult,
};
use crate::models::search::SearchParams;
use crate::models::seat::{SeatLayout, SeatLayoutRequest};
use crate::models::session::{FerryBookingSession, Gender, SelectedFerry};
use crate::services::seatmap;

use super::{
    call_with_retry, classify_operator_failure, green_ocean_date, lenient_f64, lenient_i64,
    lenient_u32, map_http_status, map_transport_error, parse_hhmm, truthy, value_to_id,
    OperatorAdapter,
};

pub struct GreenOceanAdapter {
    base_url: String,
    public_key: String,
    private_key: String,
    client: reqwest::Client,
    search_timeout: Duration,
    booking_timeout: Duration,
    retry_attempts: u32,
}

impl GreenOceanAdapter {
    pub fn new(config: &GreenOceanConfig, retry_attempts: u32) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            public_key: config.public_key.clone(),
            private_key: config.private_key.clone(),
            client,
            search_timeout: Duration::from_secs(config.search_timeout_seconds),
            booking_timeout: Duration::from_secs(config.booking_timeout_seconds),
            retry_attempts,
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/v1/{}", self.base_url, name)
    }

    /// `field1|field2|...|public_key|private_key` -> SHA-512 hex.
    /// Порядок полей задаёт вызывающий, private_key дописывается здесь.
    fn hash_fields(&self, fields: &[String]) -> String {
        let mut joined = fields.join("|");
        joined.push('|');
        joined.push_str(&self.private_key);

        let mut hasher = Sha512::new();
        hasher.update(joined.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn route_details_hash(&self, from_id: u32, dest_to: u32, adults: u32, infants: u32, date: &str) -> String {
        self.hash_fields(&[
            from_id.to_string(),
            dest_to.to_string(),
            adults.to_string(),
            infants.to_string(),
            date.to_string(),
            self.public_key.clone(),
        ])
    }

    fn seat_layout_hash(
        &self,
        ship_id: i64,
        from_id: u32,
        dest_to: u32,
        class_id: i64,
        route_id: i64,
        date: &str,
    ) -> String {
        self.hash_fields(&[
            ship_id.to_string(),
            from_id.to_string(),
            dest_to.to_string(),
            class_id.to_string(),
            route_id.to_string(),
            date.to_string(),
            self.public_key.clone(),
        ])
    }

    fn seat_block_hash(
        &self,
        ship_id: i64,
        from_id: u32,
        dest_to: u32,
        route_id: i64,
        class_id: i64,
        date: &str,
        seat_csv: &str,
    ) -> String {
        self.hash_fields(&[
            ship_id.to_string(),
            from_id.to_string(),
            dest_to.to_string(),
            route_id.to_string(),
            class_id.to_string(),
            date.to_string(),
            seat_csv.to_string(),
            self.public_key.clone(),
        ])
    }

    #[allow(clippy::too_many_arguments)]
    fn book_ticket_hash(
        &self,
        ship_id: i64,
        from_id: u32,
        dest_to: u32,
        route_id: i64,
        class_id: i64,
        adults: u32,
        infants: u32,
        date: &str,
        seat_csv: &str,
    ) -> String {
        self.hash_fields(&[
            ship_id.to_string(),
            from_id.to_string(),
            dest_to.to_string(),
            route_id.to_string(),
            class_id.to_string(),
            adults.to_string(),
            infants.to_string(),
            date.to_string(),
            seat_csv.to_string(),
            self.public_key.clone(),
        ])
    }

    async fn post_envelope(
        &self,
        name: &str,
        timeout: Duration,
        body: &impl Serialize,
    ) -> Result<GoEnvelope, OperatorError> {
        let response = self
            .client
            .post(self.endpoint(name))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| map_transport_error(self.operator(), name, e))?;

        if !response.status().is_success() {
            return Err(map_http_status(self.operator(), name, response.status()));
        }

        let envelope: GoEnvelope = response
            .json()
            .await
            .map_err(|e| map_transport_error(self.operator(), name, e))?;

        if !envelope.ok() {
            return Err(classify_operator_failure(self.operator(), envelope.message()));
        }
        Ok(envelope)
    }

    async fn route_details_once(
        &self,
        from: &Location,
        to: &Location,
        params: &SearchParams,
    ) -> Result<Vec<(Value, GoRoute)>, OperatorError> {
        let date = green_ocean_date(params.date);
        let body = RouteDetailsRequest {
            from_id: from.green_ocean_id,
            dest_to: to.green_ocean_id,
            number_of_adults: params.seated_passengers(),
            number_of_infants: params.infants,
            travel_date: date.clone(),
            public_key: &self.public_key,
            hash_string: self.route_details_hash(
                from.green_ocean_id,
                to.green_ocean_id,
                params.seated_passengers(),
                params.infants,
                &date,
            ),
        };

        let envelope = self
            .post_envelope("route-details", self.search_timeout, &body)
            .await?;

        let raw_routes = match envelope.data {
            Value::Array(routes) => routes,
            Value::Null => Vec::new(),
            other => other["routes"]
                .as_array()
                .cloned()
                .unwrap_or_default(),
        };

        let mut routes = Vec::with_capacity(raw_routes.len());
        for raw in raw_routes {
            match serde_json::from_value::<GoRoute>(raw.clone()) {
                Ok(route) => routes.push((raw, route)),
                Err(e) => tracing::warn!(error = %e, "skipping malformed green ocean route"),
            }
        }
        Ok(routes)
    }

    fn map_route(&self, raw: Value, route: &GoRoute, params: &SearchParams) -> UnifiedFerryResult {
        let departure = parse_hhmm(&route.departure_time);
        let arrival = parse_hhmm(&route.arrival_time);
        let duration = match (departure, arrival) {
            (Some(d), Some(a)) => super::format_duration(d, a),
            _ => String::new(),
        };

        let classes: Vec<FerryClass> = route
            .ship_class
            .iter()
            .map(|class| {
                let total = class.adult_seat_rate + class.port_fee + class.gst;
                FerryClass {
                    id: class.class_id.to_string(),
                    name: class.class_title.clone(),
                    price: total,
                    available_seats: class.seat_available,
                    pricing: ClassPricing {
                        base_price: class.adult_seat_rate,
                        fees: class.port_fee,
                        taxes: class.gst,
                        total,
                    },
                    amenities: vec!["Air Conditioned".into()],
                }
            })
            .collect();

        let availability = classes.iter().map(|c| c.available_seats).sum();
        let min_price = classes
            .iter()
            .map(|c| c.price)
            .fold(f64::INFINITY, f64::min);

        UnifiedFerryResult {
            // route_id различает отправления одного судна в течение дня
            id: UnifiedFerryResult::compose_id(
                self.operator(),
                &format!("{}-{}", route.ship_id, route.route_id),
            ),
            operator: self.operator(),
            operator_ferry_id: route.ship_id.to_string(),
            ferry_name: route.ship_title.clone(),
            route: RouteInfo {
                from: params.from.clone(),
                to: params.to.clone(),
            },
            schedule: ScheduleInfo {
                date: params.date,
                departure_time: departure
                    .map(|t| t.format("%H:%M").to_string())
                    .unwrap_or_else(|| route.departure_time.clone()),
                arrival_time: arrival
                    .map(|t| t.format("%H:%M").to_string())
                    .unwrap_or_else(|| route.arrival_time.clone()),
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
        let resolve = |raw: &str| {
            locations::resolve(raw).ok_or_else(|| {
                OperatorError::new(
                    self.operator(),
                    OperatorErrorKind::Validation,
                    format!("unknown location: {raw}"),
                )
            })
        };
        Ok((resolve(from)?, resolve(to)?))
    }
}

#[async_trait]
impl OperatorAdapter for GreenOceanAdapter {
    fn operator(&self) -> FerryOperator {
        FerryOperator::Greenocean
    }

    async fn search(&self, params: &SearchParams) -> Result<Vec<UnifiedFerryResult>, OperatorError> {
        let (from, to) = self.resolve_pair(&params.from, &params.to)?;

        let routes = call_with_retry(self.operator(), "route-details", self.retry_attempts, || {
            self.route_details_once(from, to, params)
        })
        .await?;

        debug!(count = routes.len(), "green ocean returned routes");
        Ok(routes
            .into_iter()
            .map(|(raw, route)| self.map_route(raw, &route, params))
            .collect())
    }

    async fn seat_layout(&self, request: &SeatLayoutRequest) -> Result<SeatLayout, OperatorError> {
        let (from, to) = self.resolve_pair(&request.from, &request.to)?;

        let ship_id = parse_numeric_id(self.operator(), "ferryId", &request.ferry_id)?;
        let class_id = parse_numeric_id(self.operator(), "classId", &request.class_id)?;
        let route_id = match &request.route_id {
            Some(r) => parse_numeric_id(self.operator(), "routeId", r)?,
            None => {
                return Err(OperatorError::new(
                    self.operator(),
                    OperatorErrorKind::Validation,
                    "routeId is required for green ocean seat layout",
                ))
            }
        };

        let date = green_ocean_date(request.travel_date);
        let body = SeatLayoutWireRequest {
            ship_id,
            from_id: from.green_ocean_id,
            dest_to: to.green_ocean_id,
            class_id,
            route_id,
            travel_date: date.clone(),
            public_key: &self.public_key,
            hash_string: self.seat_layout_hash(
                ship_id,
                from.green_ocean_id,
                to.green_ocean_id,
                class_id,
                route_id,
                &date,
            ),
        };

        let envelope = call_with_retry(self.operator(), "seat-layout", self.retry_attempts, || {
            self.post_envelope("seat-layout", self.search_timeout, &body)
        })
        .await?;

        Ok(SeatLayout::Manual {
            seats: seatmap::normalize_green_ocean(&envelope.data),
        })
    }

    async fn hold_seats(
        &self,
        ferry: &SelectedFerry,
        class_id: &str,
        seats: &[String],
        params: &SearchParams,
    ) -> Result<Option<DateTime<Utc>>, OperatorError> {
        let (from, to) = self.resolve_pair(&params.from, &params.to)?;
        let route_ref: GoRouteRef = serde_json::from_value(ferry.route_data.clone()).map_err(|e| {
            OperatorError::new(
                self.operator(),
                OperatorErrorKind::Validation,
                format!("stored route payload is unusable: {e}"),
            )
        })?;
        let class_id = parse_numeric_id(self.operator(), "classId", class_id)?;
        let seat_ids = parse_seat_ids(self.operator(), seats)?;
        let seat_csv = join_seats(&seat_ids);
        let date = green_ocean_date(params.date);

        let body = SeatBlockRequest {
            ship_id: route_ref.ship_id,
            from_id: from.green_ocean_id,
            dest_to: to.green_ocean_id,
            route_id: route_ref.route_id,
            class_id,
            travel_date: date.clone(),
            seat_id: &seat_ids,
            public_key: &self.public_key,
            hash_string: self.seat_block_hash(
                route_ref.ship_id,
                from.green_ocean_id,
                to.green_ocean_id,
                route_ref.route_id,
                class_id,
                &date,
                &seat_csv,
            ),
        };

        self.post_envelope("temporary-seat-block", self.booking_timeout, &body)
            .await?;

        // оператор держит блок 15 минут с момента подтверждения
        Ok(Some(Utc::now() + chrono::Duration::minutes(15)))
    }

    async fn book(&self, session: &FerryBookingSession) -> BookingCallOutcome {
        let (from, to) = match self.resolve_pair(&session.search_params.from, &session.search_params.to)
        {
            Ok(pair) => pair,
            Err(e) => return BookingCallOutcome::Failed(e),
        };

        let route_ref: GoRouteRef =
            match serde_json::from_value(session.selected_ferry.route_data.clone()) {
                Ok(r) => r,
                Err(e) => {
                    return BookingCallOutcome::Failed(OperatorError::new(
                        self.operator(),
                        OperatorErrorKind::Validation,
                        format!("stored route payload is unusable: {e}"),
                    ))
                }
            };

        let class_id =
            match parse_numeric_id(self.operator(), "classId", &session.selected_class.class_id) {
                Ok(id) => id,
                Err(e) => return BookingCallOutcome::Failed(e),
            };

        let seats = session.seat_numbers();
        if seats.is_empty() {
            return BookingCallOutcome::Failed(OperatorError::new(
                self.operator(),
                OperatorErrorKind::Validation,
                "green ocean booking requires selected seats",
            ));
        }
        let seat_ids = match parse_seat_ids(self.operator(), seats) {
            Ok(ids) => ids,
            Err(e) => return BookingCallOutcome::Failed(e),
        };
        let seat_csv = join_seats(&seat_ids);

        let adults: Vec<_> = session.passengers.iter().filter(|p| !p.is_infant).collect();
        let infants: Vec<_> = session.passengers.iter().filter(|p| p.is_infant).collect();
        if adults.len() != seat_ids.len() {
            return BookingCallOutcome::Failed(OperatorError::new(
                self.operator(),
                OperatorErrorKind::Validation,
                format!(
                    "{} seats blocked for {} seated passengers",
                    seat_ids.len(),
                    adults.len()
                ),
            ));
        }

        let date = green_ocean_date(session.search_params.date);
        let body = BookTicketRequest {
            ship_id: route_ref.ship_id,
            from_id: from.green_ocean_id,
            dest_to: to.green_ocean_id,
            route_id: route_ref.route_id,
            class_id,
            number_of_adults: adults.len() as u32,
            number_of_infants: infants.len() as u32,
            travel_date: date.clone(),
            seat_id: &seat_ids,
            passenger_prefix: adults.iter().map(|p| prefix_for(p.gender)).collect(),
            passenger_name: adults.iter().map(|p| p.name.as_str()).collect(),
            passenger_age: adults.iter().map(|p| p.age).collect(),
            gender: adults.iter().map(|p| gender_word(p.gender)).collect(),
            nationality: adults.iter().map(|p| p.nationality.as_str()).collect(),
            fpassport: adults
                .iter()
                .map(|p| p.passport.as_deref().unwrap_or(""))
                .collect(),
            infant_name: infants.iter().map(|p| p.name.as_str()).collect(),
            infant_age: infants.iter().map(|p| p.age).collect(),
            infant_gender: infants.iter().map(|p| gender_word(p.gender)).collect(),
            public_key: &self.public_key,
            hash_string: self.book_ticket_hash(
                route_ref.ship_id,
                from.green_ocean_id,
                to.green_ocean_id,
                route_ref.route_id,
                class_id,
                adults.len() as u32,
                infants.len() as u32,
                &date,
                &seat_csv,
            ),
        };

        let response = self
            .client
            .post(self.endpoint("book-ticket"))
            .timeout(self.booking_timeout)
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_connect() => {
                return BookingCallOutcome::Failed(map_transport_error(
                    self.operator(),
                    "book-ticket",
                    e,
                ))
            }
            Err(e) => {
                return BookingCallOutcome::Ambiguous(map_transport_error(
                    self.operator(),
                    "book-ticket",
                    e,
                ))
            }
        };

        let status = response.status();
        if status.is_server_error() {
            return BookingCallOutcome::Ambiguous(map_http_status(
                self.operator(),
                "book-ticket",
                status,
            ));
        }
        if !status.is_success() {
            return BookingCallOutcome::Failed(map_http_status(
                self.operator(),
                "book-ticket",
                status,
            ));
        }

        let envelope: GoEnvelope = match response.json().await {
            Ok(e) => e,
            Err(e) => {
                return BookingCallOutcome::Ambiguous(map_transport_error(
                    self.operator(),
                    "book-ticket",
                    e,
                ))
            }
        };

        if !envelope.ok() {
            return BookingCallOutcome::Failed(classify_operator_failure(
                self.operator(),
                envelope.message(),
            ));
        }

        let pnr = envelope.data["pnr"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| value_to_id(&envelope.data["pnr"]));
        if pnr.is_empty() {
            return BookingCallOutcome::Ambiguous(OperatorError::upstream(
                self.operator(),
                "book-ticket succeeded but returned no pnr",
            ));
        }

        let booking_id = value_to_id(&envelope.data["booking_id"]);
        BookingCallOutcome::Confirmed {
            pnr,
            operator_booking_id: (!booking_id.is_empty()).then_some(booking_id),
            raw_response: envelope.data,
        }
    }
}

/* ---------- helpers ---------- */

fn parse_numeric_id(
    operator: FerryOperator,
    field: &str,
    raw: &str,
) -> Result<i64, OperatorError> {
    raw.parse().map_err(|_| {
        OperatorError::new(
            operator,
            OperatorErrorKind::Validation,
            format!("{field} must be numeric for green ocean, got: {raw}"),
        )
    })
}

fn parse_seat_ids(operator: FerryOperator, seats: &[String]) -> Result<Vec<i64>, OperatorError> {
    seats
        .iter()
        .map(|s| {
            s.parse().map_err(|_| {
                OperatorError::new(
                    operator,
                    OperatorErrorKind::Validation,
                    format!("green ocean seat ids are numeric, got: {s}"),
                )
            })
        })
        .collect()
}

fn join_seats(seat_ids: &[i64]) -> String {
    seat_ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn gender_word(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "male",
        Gender::Female => "female",
        Gender::Other => "other",
    }
}

fn prefix_for(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "Mr",
        Gender::Female => "Ms",
        Gender::Other => "Mx",
    }
}

/* ---------- wire types ---------- */

#[derive(Deserialize)]
struct GoEnvelope {
    #[serde(default)]
    status: Value,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

impl GoEnvelope {
    fn ok(&self) -> bool {
        truthy(&self.status)
    }

    fn message(&self) -> String {
        self.message
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "operator refused request".to_string())
    }
}

#[derive(Serialize)]
struct RouteDetailsRequest<'a> {
    from_id: u32,
    dest_to: u32,
    number_of_adults: u32,
    number_of_infants: u32,
    travel_date: String,
    public_key: &'a str,
    hash_string: String,
}

#[derive(Serialize)]
struct SeatLayoutWireRequest<'a> {
    ship_id: i64,
    from_id: u32,
    dest_to: u32,
    class_id: i64,
    route_id: i64,
    travel_date: String,
    public_key: &'a str,
    hash_string: String,
}

#[derive(Serialize)]
struct SeatBlockRequest<'a> {
    ship_id: i64,
    from_id: u32,
    dest_to: u32,
    route_id: i64,
    class_id: i64,
    travel_date: String,
    seat_id: &'a [i64],
    public_key: &'a str,
    hash_string: String,
}

#[derive(Serialize)]
struct BookTicketRequest<'a> {
    ship_id: i64,
    from_id: u32,
    dest_to: u32,
    route_id: i64,
    class_id: i64,
    number_of_adults: u32,
    number_of_infants: u32,
    travel_date: String,
    seat_id: &'a [i64],
    passenger_prefix: Vec<&'static str>,
    passenger_name: Vec<&'a str>,
    passenger_age: Vec<u32>,
    gender: Vec<&'static str>,
    nationality: Vec<&'a str>,
    fpassport: Vec<&'a str>,
    infant_name: Vec<&'a str>,
    infant_age: Vec<u32>,
    infant_gender: Vec<&'static str>,
    public_key: &'a str,
    hash_string: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GoRoute {
    #[serde(deserialize_with = "lenient_i64")]
    ship_id: i64,
    ship_title: String,
    #[serde(deserialize_with = "lenient_i64")]
    route_id: i64,
    departure_time: String,
    arrival_time: String,
    #[serde(default)]
    ship_class: Vec<GoClass>,
}

#[derive(Debug, Clone, Deserialize)]
struct GoClass {
    #[serde(deserialize_with = "lenient_i64")]
    class_id: i64,
    class_title: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    seat_available: u32,
    #[serde(default, deserialize_with = "lenient_f64")]
    adult_seat_rate: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    port_fee: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    gst: f64,
}

// минимум, который нужен адаптеру из route_data сессии
#[derive(Debug, Deserialize)]
struct GoRouteRef {
    #[serde(deserialize_with = "lenient_i64")]
    ship_id: i64,
    #[serde(deserialize_with = "lenient_i64")]
    route_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn adapter() -> GreenOceanAdapter {
        GreenOceanAdapter::new(
            &GreenOceanConfig {
                base_url: "http://localhost:0".into(),
                public_key: "pk".into(),
                private_key: "sk".into(),
                search_timeout_seconds: 1,
                booking_timeout_seconds: 1,
            },
            0,
        )
    }

    fn sha512_hex(input: &str) -> String {
        let mut hasher = Sha512::new();
        hasher.update(input.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    #[test]
    fn book_ticket_hash_uses_documented_field_order() {
        let a = adapter();
        let hash = a.book_ticket_hash(2, 1, 2, 1, 1, 2, 0, "25-12-2024", "5,6");
        assert_eq!(hash, sha512_hex("2|1|2|1|1|2|0|25-12-2024|5,6|pk|sk"));
        // 128 hex-символов: SHA-512, не SHA-256
        assert_eq!(hash.len(), 128);
    }

    #[test]
    fn hash_is_sensitive_to_field_order() {
        let a = adapter();
        let correct = a.hash_fields(&["2".into(), "1".into(), "pk".into()]);
        let swapped = a.hash_fields(&["1".into(), "2".into(), "pk".into()]);
        assert_ne!(correct, swapped);
    }

    #[test]
    fn route_details_hash_matches_manual_join() {
        let a = adapter();
        let hash = a.route_details_hash(1, 2, 3, 1, "05-08-2025");
        assert_eq!(hash, sha512_hex("1|2|3|1|05-08-2025|pk|sk"));
    }

    #[test]
    fn seat_block_hash_skips_passenger_counts() {
        // тот же префикс, что у book-ticket, но без adults/infants
        let a = adapter();
        let hash = a.seat_block_hash(2, 1, 2, 7, 1, "25-12-2024", "5,6");
        assert_eq!(hash, sha512_hex("2|1|2|7|1|25-12-2024|5,6|pk|sk"));
    }

    #[test]
    fn seat_csv_joins_with_comma_no_spaces() {
        assert_eq!(join_seats(&[5, 6]), "5,6");
        assert_eq!(join_seats(&[42]), "42");
        assert_eq!(join_seats(&[]), "");
    }

    #[test]
    fn non_numeric_seat_ids_are_rejected() {
        let err = parse_seat_ids(FerryOperator::Greenocean, &["A1".to_string()]).unwrap_err();
        assert_eq!(err.kind, OperatorErrorKind::Validation);
        assert_eq!(
            parse_seat_ids(FerryOperator::Greenocean, &["5".to_string(), "6".to_string()]).unwrap(),
            vec![5, 6]
        );
    }

    #[test]
    fn routes_map_to_unified_results_with_fee_breakdown() {
        let a = adapter();
        let params = SearchParams {
            from: "port-blair".into(),
            to: "havelock".into(),
            date: NaiveDate::from_ymd_opt(2025, 8, 5).unwrap(),
            adults: 2,
            children: 0,
            infants: 0,
        };
        let raw = serde_json::json!({
            "ship_id": 2,
            "ship_title": "Green Ocean 1",
            "route_id": 7,
            "departure_time": "06:30",
            "arrival_time": "08:45",
            "ship_class": [
                {
                    "class_id": 1,
                    "class_title": "Economy",
                    "seat_available": "58",
                    "adult_seat_rate": "1150",
                    "port_fee": "50",
                    "gst": "60"
                },
                {
                    "class_id": 2,
                    "class_title": "Royal",
                    "seat_available": 14,
                    "adult_seat_rate": 1650,
                    "port_fee": 50,
                    "gst": 85
                }
            ]
        });
        let route: GoRoute = serde_json::from_value(raw.clone()).unwrap();
        let unified = a.map_route(raw, &route, &params);

        assert_eq!(unified.id, "greenocean-2-7");
        assert_eq!(unified.operator_ferry_id, "2");
        assert_eq!(unified.availability, 72);
        assert_eq!(unified.schedule.duration, "2h 15m");

        let economy = &unified.classes[0];
        assert_eq!(economy.price, 1260.0);
        assert_eq!(economy.pricing.base_price, 1150.0);
        assert_eq!(economy.pricing.fees, 50.0);
        assert_eq!(economy.pricing.taxes, 60.0);
        assert_eq!(unified.pricing.min_price, 1260.0);
        assert!(unified.features.supports_seat_selection);
    }
}
