//! Адаптер Makruzz.
//!
//! Протокол: логин выдаёт токен, который живёт часами и передаётся в
//! заголовке `Mak_Authorization`. Все тела завёрнуты в `{"data": ...}`,
//! код успеха приходит в поле `code` (то строкой, то числом). Выбора
//! мест нет: паром сажает пассажиров сам. Расписание возвращается
//! плоским списком "рейс+класс", по одной строке на класс, и склейка
//! в один рейс с несколькими классами происходит на нашей стороне.
//! Бронирование двухфазное: savePassengers создаёт черновик,
//! confirm_booking выдаёт PNR.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::MakruzzConfig;
use crate::error::{OperatorError, OperatorErrorKind};
use crate::locations::{self, Location};
use crate::models::booking::BookingCallOutcome;
use crate::models::ferry::{
    ClassPricing, FerryClass, FerryOperator, OperatorData, OperatorFeatures, PricingSummary,
    RouteInfo, ScheduleInfo, UnifiedFerryResult,
};
use crate::models::search::SearchParams;
use crate::models::seat::{SeatLayout, SeatLayoutRequest};
use crate::models::session::{FerryBookingSession, Gender};

use super::{
    call_with_retry, classify_operator_failure, lenient_f64, lenient_i64, lenient_u32,
    map_http_status, map_transport_error, parse_hhmm, value_to_id, OperatorAdapter,
};

const AUTH_HEADER: &str = "Mak_Authorization";

struct CachedToken {
    token: String,
    fetched_at: DateTime<Utc>,
}

pub struct MakruzzAdapter {
    base_url: String,
    username: String,
    password: String,
    token_validity: chrono::Duration,
    token_cache: tokio::sync::RwLock<Option<CachedToken>>,
    client: reqwest::Client,
    search_timeout: Duration,
    booking_timeout: Duration,
    retry_attempts: u32,
}

impl MakruzzAdapter {
    pub fn new(config: &MakruzzConfig, retry_attempts: u32) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            token_validity: chrono::Duration::hours(config.token_validity_hours),
            token_cache: tokio::sync::RwLock::new(None),
            client,
            search_timeout: Duration::from_secs(config.search_timeout_seconds),
            booking_timeout: Duration::from_secs(config.booking_timeout_seconds),
            retry_attempts,
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    /// Токен из кэша, пока не протух; иначе свежий логин.
    async fn token(&self) -> Result<String, OperatorError> {
        {
            let guard = self.token_cache.read().await;
            if let Some(cached) = guard.as_ref() {
                if Utc::now() - cached.fetched_at < self.token_validity {
                    return Ok(cached.token.clone());
                }
            }
        }
        self.refresh_token().await
    }

    async fn refresh_token(&self) -> Result<String, OperatorError> {
        debug!("logging in to makruzz");
        let body = DataEnvelope {
            data: LoginData {
                username: &self.username,
                password: &self.password,
            },
        };

        let response = self
            .client
            .post(self.endpoint("login"))
            .timeout(self.search_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(self.operator(), "login", e))?;

        if !response.status().is_success() {
            return Err(map_http_status(self.operator(), "login", response.status()));
        }

        let envelope: MakruzzEnvelope = response
            .json()
            .await
            .map_err(|e| map_transport_error(self.operator(), "login", e))?;

        if !envelope.code_ok() {
            return Err(OperatorError::new(
                self.operator(),
                OperatorErrorKind::Auth,
                format!("login rejected: {}", envelope.message()),
            ));
        }

        let token = envelope.data["token"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        if token.is_empty() {
            return Err(OperatorError::upstream(
                self.operator(),
                "login succeeded but returned no token",
            ));
        }

        let mut guard = self.token_cache.write().await;
        *guard = Some(CachedToken {
            token: token.clone(),
            fetched_at: Utc::now(),
        });
        Ok(token)
    }

    async fn schedule_rows_once(
        &self,
        token: &str,
        from: &Location,
        to: &Location,
        params: &SearchParams,
    ) -> Result<Vec<(Value, MakruzzRow)>, OperatorError> {
        let body = DataEnvelope {
            data: ScheduleSearchData {
                trip_type: "single_trip",
                from_location: from.makruzz_id,
                to_location: to.makruzz_id,
                travel_date: params.date.to_string(),
                no_of_passenger: params.seated_passengers().to_string(),
            },
        };

        let response = self
            .client
            .post(self.endpoint("schedule_search"))
            .timeout(self.search_timeout)
            .header(AUTH_HEADER, token)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(self.operator(), "schedule_search", e))?;

        if !response.status().is_success() {
            return Err(map_http_status(
                self.operator(),
                "schedule_search",
                response.status(),
            ));
        }

        let envelope: MakruzzEnvelope = response
            .json()
            .await
            .map_err(|e| map_transport_error(self.operator(), "schedule_search", e))?;

        if !envelope.code_ok() {
            return Err(classify_operator_failure(self.operator(), envelope.message()));
        }

        let raw_rows = match envelope.data {
            Value::Array(rows) => rows,
            Value::Null => Vec::new(),
            other => {
                return Err(OperatorError::upstream(
                    self.operator(),
                    format!("schedule_search returned unexpected payload: {other}"),
                ))
            }
        };

        let mut rows = Vec::with_capacity(raw_rows.len());
        for raw in raw_rows {
            match serde_json::from_value::<MakruzzRow>(raw.clone()) {
                Ok(row) => rows.push((raw, row)),
                Err(e) => warn!(error = %e, "skipping malformed makruzz schedule row"),
            }
        }
        Ok(rows)
    }

    async fn call_booking_step(
        &self,
        step: &'static str,
        token: &str,
        body: &impl Serialize,
    ) -> Result<MakruzzEnvelope, BookingCallOutcome> {
        let response = self
            .client
            .post(self.endpoint(step))
            .timeout(self.booking_timeout)
            .header(AUTH_HEADER, token)
            .json(body)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_connect() => {
                return Err(BookingCallOutcome::Failed(map_transport_error(
                    self.operator(),
                    step,
                    e,
                )))
            }
            Err(e) => {
                return Err(BookingCallOutcome::Ambiguous(map_transport_error(
                    self.operator(),
                    step,
                    e,
                )))
            }
        };

        let status = response.status();
        if status.is_server_error() {
            return Err(BookingCallOutcome::Ambiguous(map_http_status(
                self.operator(),
                step,
                status,
            )));
        }
        if !status.is_success() {
            return Err(BookingCallOutcome::Failed(map_http_status(
                self.operator(),
                step,
                status,
            )));
        }

        let envelope: MakruzzEnvelope = match response.json().await {
            Ok(e) => e,
            Err(e) => {
                return Err(BookingCallOutcome::Ambiguous(map_transport_error(
                    self.operator(),
                    step,
                    e,
                )))
            }
        };

        if !envelope.code_ok() {
            return Err(BookingCallOutcome::Failed(classify_operator_failure(
                self.operator(),
                format!("{step} rejected: {}", envelope.message()),
            )));
        }
        Ok(envelope)
    }
}

#[async_trait]
impl OperatorAdapter for MakruzzAdapter {
    fn operator(&self) -> FerryOperator {
        FerryOperator::Makruzz
    }

    async fn search(&self, params: &SearchParams) -> Result<Vec<UnifiedFerryResult>, OperatorError> {
        let from = resolve_location(self.operator(), &params.from)?;
        let to = resolve_location(self.operator(), &params.to)?;

        let token = self.token().await?;
        let rows = match call_with_retry(self.operator(), "schedule_search", self.retry_attempts, || {
            self.schedule_rows_once(&token, from, to, params)
        })
        .await
        {
            // токен мог протухнуть на стороне оператора раньше срока
            Err(e) if e.kind == OperatorErrorKind::Auth => {
                warn!("makruzz token rejected, re-logging in");
                let token = self.refresh_token().await?;
                self.schedule_rows_once(&token, from, to, params).await?
            }
            other => other?,
        };

        debug!(count = rows.len(), "makruzz returned schedule rows");
        Ok(group_rows(self.operator(), params, rows))
    }

    async fn seat_layout(&self, _request: &SeatLayoutRequest) -> Result<SeatLayout, OperatorError> {
        // сентинел, не ошибка: у Makruzz выбора мест нет в принципе
        Ok(SeatLayout::AutoAssignOnly)
    }

    async fn book(&self, session: &FerryBookingSession) -> BookingCallOutcome {
        let token = match self.token().await {
            Ok(t) => t,
            // до savePassengers дело не дошло, брони точно нет
            Err(e) => return BookingCallOutcome::Failed(e),
        };

        let save_body = match build_save_passengers(session) {
            Ok(b) => b,
            Err(e) => return BookingCallOutcome::Failed(e),
        };

        let saved = match self
            .call_booking_step("savePassengers", &token, &save_body)
            .await
        {
            Ok(envelope) => envelope,
            Err(outcome) => return outcome,
        };

        let booking_id = saved.data["booking_id"].clone();
        let booking_id_text = value_to_id(&booking_id);
        if booking_id_text.is_empty() {
            return BookingCallOutcome::Ambiguous(OperatorError::upstream(
                self.operator(),
                "savePassengers succeeded but returned no booking_id",
            ));
        }

        let confirm_body = DataEnvelope {
            data: ConfirmBookingData {
                booking_id: booking_id.clone(),
            },
        };
        let confirmed = match self
            .call_booking_step("confirm_booking", &token, &confirm_body)
            .await
        {
            Ok(envelope) => envelope,
            // черновик уже создан, любой обрыв здесь неоднозначен
            Err(BookingCallOutcome::Failed(e))
                if matches!(e.kind, OperatorErrorKind::Timeout | OperatorErrorKind::Upstream) =>
            {
                return BookingCallOutcome::Ambiguous(e)
            }
            Err(outcome) => return outcome,
        };

        let pnr = confirmed.data["pnr_number"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| value_to_id(&confirmed.data["pnr_number"]));

        if pnr.is_empty() {
            return BookingCallOutcome::Ambiguous(OperatorError::upstream(
                self.operator(),
                format!("confirm_booking returned no pnr for booking {booking_id_text}"),
            ));
        }

        BookingCallOutcome::Confirmed {
            pnr,
            operator_booking_id: Some(booking_id_text),
            raw_response: confirmed.data,
        }
    }
}

/* ---------- mapping ---------- */

fn resolve_location(
    operator: FerryOperator,
    raw: &str,
) -> Result<&'static Location, OperatorError> {
    locations::resolve(raw).ok_or_else(|| {
        OperatorError::new(
            operator,
            OperatorErrorKind::Validation,
            format!("unknown location: {raw}"),
        )
    })
}

/// Склейка строк "рейс+класс" в рейсы. Ключ группы — судно и время
/// отправления; каждая строка становится классом, её schedule id —
/// идентификатором класса (он и нужен для savePassengers).
fn group_rows(
    operator: FerryOperator,
    params: &SearchParams,
    rows: Vec<(Value, MakruzzRow)>,
) -> Vec<UnifiedFerryResult> {
    let mut groups: BTreeMap<(String, String), Vec<(Value, MakruzzRow)>> = BTreeMap::new();
    for (raw, row) in rows {
        groups
            .entry((row.ship_title.clone(), row.departure_time.clone()))
            .or_default()
            .push((raw, row));
    }

    groups
        .into_values()
        .map(|group| {
            let first = &group[0].1;
            let departure = parse_hhmm(&first.departure_time);
            let arrival = parse_hhmm(&first.arrival_time);
            let duration = match (departure, arrival) {
                (Some(d), Some(a)) => super::format_duration(d, a),
                _ => String::new(),
            };

            let classes: Vec<FerryClass> = group
                .iter()
                .map(|(_, row)| FerryClass {
                    id: row.id.to_string(),
                    name: row.ship_class_title.clone(),
                    price: row.total_fare,
                    available_seats: row.seat,
                    pricing: ClassPricing::flat(row.total_fare),
                    amenities: vec!["Air Conditioned".into()],
                })
                .collect();

            let availability = classes.iter().map(|c| c.available_seats).sum();
            let min_price = classes
                .iter()
                .map(|c| c.price)
                .fold(f64::INFINITY, f64::min);
            let raw_rows: Vec<Value> = group.iter().map(|(raw, _)| raw.clone()).collect();

            UnifiedFerryResult {
                id: UnifiedFerryResult::compose_id(operator, &first.id.to_string()),
                operator,
                operator_ferry_id: first.id.to_string(),
                ferry_name: first.ship_title.clone(),
                route: RouteInfo {
                    from: params.from.clone(),
                    to: params.to.clone(),
                },
                schedule: ScheduleInfo {
                    date: params.date,
                    departure_time: departure
                        .map(|t| t.format("%H:%M").to_string())
                        .unwrap_or_else(|| first.departure_time.clone()),
                    arrival_time: arrival
                        .map(|t| t.format("%H:%M").to_string())
                        .unwrap_or_else(|| first.arrival_time.clone()),
                    duration,
                },
                classes,
                availability,
                pricing: PricingSummary {
                    min_price: if min_price.is_finite() { min_price } else { 0.0 },
                    currency: "INR".into(),
                },
                features: OperatorFeatures {
                    supports_seat_selection: false,
                    supports_auto_assignment: true,
                },
                operator_data: OperatorData {
                    original_response: Value::Array(raw_rows),
                },
            }
        })
        .collect()
}

fn build_save_passengers(
    session: &FerryBookingSession,
) -> Result<DataEnvelope<SavePassengersData>, OperatorError> {
    let operator = FerryOperator::Makruzz;

    if session.passengers.is_empty() {
        return Err(OperatorError::new(
            operator,
            OperatorErrorKind::Validation,
            "no passengers attached to session",
        ));
    }
    let contact = session.contact.as_ref().ok_or_else(|| {
        OperatorError::new(
            operator,
            OperatorErrorKind::Validation,
            "contact details are required for makruzz booking",
        )
    })?;

    // class_id сессии — это schedule id строки класса; ship_class_id
    // достаём из сохранённого ответа оператора
    let schedule_id = &session.selected_class.class_id;
    let rows: Vec<MakruzzRow> =
        serde_json::from_value(session.selected_ferry.route_data.clone()).map_err(|e| {
            OperatorError::new(
                operator,
                OperatorErrorKind::Validation,
                format!("stored schedule payload is unusable: {e}"),
            )
        })?;
    let row = rows
        .iter()
        .find(|r| r.id.to_string() == *schedule_id)
        .ok_or_else(|| {
            OperatorError::new(
                operator,
                OperatorErrorKind::Validation,
                format!("schedule {schedule_id} is missing from stored payload"),
            )
        })?;

    let mut passenger = serde_json::Map::new();
    for (idx, p) in session.passengers.iter().enumerate() {
        passenger.insert(
            idx.to_string(),
            serde_json::json!({
                "title": title_for(p.gender),
                "name": p.name,
                "age": p.age,
                "sex": sex_for(p.gender),
                "nationality": p.nationality,
                "fpassport": p.passport,
            }),
        );
    }

    let seated = session.passengers.iter().filter(|p| !p.is_infant).count() as u32;
    let infants = session.passengers.len() as u32 - seated;
    let first_name = session.passengers[0].name.clone();

    Ok(DataEnvelope {
        data: SavePassengersData {
            passenger,
            c_name: first_name,
            c_mobile: contact.phone.clone(),
            c_email: contact.email.clone(),
            p_contact: contact.phone.clone(),
            c_remark: String::new(),
            no_of_passenger: seated,
            schedule_id: schedule_id.clone(),
            travel_date: session.search_params.date.to_string(),
            class_id: row.ship_class_id,
            fare: session.total_amount,
            no_of_infant: infants,
            tc_check: true,
        },
    })
}

fn sex_for(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "male",
        Gender::Female => "female",
        Gender::Other => "other",
    }
}

fn title_for(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "Mr",
        Gender::Female => "Ms",
        Gender::Other => "Mx",
    }
}

/* ---------- wire types ---------- */

#[derive(Debug, Serialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Serialize)]
struct LoginData<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct ScheduleSearchData<'a> {
    trip_type: &'static str,
    from_location: &'a str,
    to_location: &'a str,
    travel_date: String,
    no_of_passenger: String,
}

// tc_check — обязательная галка "условия приняты", Makruzz без неё
// пассажиров не сохраняет
#[derive(Debug, Serialize)]
struct SavePassengersData {
    passenger: serde_json::Map<String, Value>,
    c_name: String,
    c_mobile: String,
    c_email: String,
    p_contact: String,
    c_remark: String,
    no_of_passenger: u32,
    schedule_id: String,
    travel_date: String,
    class_id: i64,
    fare: f64,
    no_of_infant: u32,
    tc_check: bool,
}

#[derive(Serialize)]
struct ConfirmBookingData {
    booking_id: Value,
}

#[derive(Deserialize)]
struct MakruzzEnvelope {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    code: Value,
    #[serde(default)]
    msg: Option<String>,
}

impl MakruzzEnvelope {
    // code приходит то числом 200, то строкой "200"
    fn code_ok(&self) -> bool {
        self.code.as_i64() == Some(200) || self.code.as_str() == Some("200")
    }

    fn message(&self) -> String {
        self.msg
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("operator code {}", self.code))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct MakruzzRow {
    #[serde(deserialize_with = "lenient_i64")]
    id: i64,
    ship_title: String,
    departure_time: String,
    arrival_time: String,
    #[serde(deserialize_with = "lenient_i64")]
    ship_class_id: i64,
    ship_class_title: String,
    #[serde(deserialize_with = "lenient_f64")]
    total_fare: f64,
    #[serde(default, deserialize_with = "lenient_u32")]
    seat: u32,
}
