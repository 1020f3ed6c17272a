//! Параллельный поиск по всем операторам.
//!
//! Фан-аут с семантикой settle-all: каждый оператор изолирован, сбой
//! или тормоза одного не трогают результаты остальных. Ошибки не
//! выбрасываются, а собираются в `errors` рядом с результатами —
//! HTTP-слой решает, 200 это, 207 или 503.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{FerryError, FerryResult, OperatorError, OperatorErrorKind};
use crate::locations;
use crate::models::ferry::FerryOperator;
use crate::models::seat::{SeatLayout, SeatLayoutRequest};
use crate::models::{SearchParams, UnifiedFerryResult};
use crate::operators::OperatorRegistry;

use super::breaker::CircuitBreaker;

/// Итог фан-аута. `attempted` — операторы, которых вообще звали
/// (маршрутная матрица могла исключить часть ещё до вызова).
#[derive(Debug)]
pub struct AggregatedSearch {
    pub results: Vec<UnifiedFerryResult>,
    pub errors: Vec<OperatorFailure>,
    pub attempted: Vec<FerryOperator>,
}

impl AggregatedSearch {
    pub fn succeeded(&self) -> Vec<FerryOperator> {
        self.attempted
            .iter()
            .copied()
            .filter(|op| !self.errors.iter().any(|e| e.operator == *op))
            .collect()
    }

    pub fn all_failed(&self) -> bool {
        !self.attempted.is_empty() && self.errors.len() == self.attempted.len()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorFailure {
    pub operator: FerryOperator,
    pub error: &'static str,
    pub message: String,
}

impl From<&OperatorError> for OperatorFailure {
    fn from(err: &OperatorError) -> Self {
        Self {
            operator: err.operator,
            error: err.kind.as_str(),
            message: err.message.clone(),
        }
    }
}

pub struct FerryAggregator {
    registry: Arc<OperatorRegistry>,
    breakers: HashMap<FerryOperator, CircuitBreaker>,
    seat_layout_timeout: Duration,
}

impl FerryAggregator {
    pub fn new(
        registry: Arc<OperatorRegistry>,
        failure_threshold: u32,
        breaker_timeout_seconds: u64,
        seat_layout_timeout_seconds: u64,
    ) -> Self {
        let breakers = registry
            .operators()
            .into_iter()
            .map(|op| {
                (
                    op,
                    CircuitBreaker::new(op, failure_threshold, breaker_timeout_seconds),
                )
            })
            .collect();
        Self {
            registry,
            breakers,
            seat_layout_timeout: Duration::from_secs(seat_layout_timeout_seconds),
        }
    }

    /// Поиск по всем операторам, обслуживающим маршрут.
    pub async fn search_all(&self, params: &SearchParams) -> FerryResult<AggregatedSearch> {
        let from = locations::resolve(&params.from)
            .ok_or_else(|| FerryError::LocationNotFound(params.from.clone()))?;
        let to = locations::resolve(&params.to)
            .ok_or_else(|| FerryError::LocationNotFound(params.to.clone()))?;

        let eligible: Vec<FerryOperator> = self
            .registry
            .operators()
            .into_iter()
            .filter(|op| locations::is_route_supported(*op, from, to))
            .collect();

        let mut results = Vec::new();
        let mut errors = Vec::new();
        let mut calls = Vec::new();

        for op in &eligible {
            // Открытый выключатель даёт мгновенный отказ этого оператора,
            // остальных не касаясь.
            if !self.breaker(*op).can_execute() {
                warn!(operator = %op, "circuit breaker open, skipping search call");
                errors.push(OperatorFailure::from(&OperatorError::circuit_open(*op)));
                continue;
            }

            let adapter = match self.registry.get(*op) {
                Some(adapter) => adapter,
                None => continue,
            };
            let op = *op;
            calls.push(async move { (op, adapter.search(params).await) });
        }

        for (op, outcome) in join_all(calls).await {
            match outcome {
                Ok(mut found) => {
                    self.breaker(op).record_success();
                    results.append(&mut found);
                }
                Err(err) => {
                    self.track_failure(op, &err);
                    warn!(operator = %op, error = %err, "operator search failed");
                    errors.push(OperatorFailure::from(&err));
                }
            }
        }

        info!(
            from = from.id,
            to = to.id,
            date = %params.date,
            attempted = eligible.len(),
            results = results.len(),
            failed = errors.len(),
            "ferry search completed"
        );

        Ok(AggregatedSearch {
            results,
            errors,
            attempted: eligible,
        })
    }

    /// Схема мест одного оператора, под защитой его выключателя
    /// и общего дедлайна на весь запрос.
    pub async fn seat_layout(&self, request: &SeatLayoutRequest) -> FerryResult<SeatLayout> {
        let operator = request.operator;
        let adapter = self.registry.get(operator).ok_or_else(|| {
            FerryError::Validation(format!("operator {} is not configured", operator))
        })?;

        let from = locations::resolve(&request.from)
            .ok_or_else(|| FerryError::LocationNotFound(request.from.clone()))?;
        let to = locations::resolve(&request.to)
            .ok_or_else(|| FerryError::LocationNotFound(request.to.clone()))?;
        if !locations::is_route_supported(operator, from, to) {
            return Err(FerryError::RouteNotSupported {
                operator,
                from: from.id.to_string(),
                to: to.id.to_string(),
            });
        }

        if !self.breaker(operator).can_execute() {
            return Err(OperatorError::circuit_open(operator).into());
        }

        let outcome = tokio::time::timeout(self.seat_layout_timeout, adapter.seat_layout(request))
            .await
            .unwrap_or_else(|_| {
                Err(OperatorError::timeout(operator, "seat layout request timed out"))
            });

        match outcome {
            Ok(layout) => {
                self.breaker(operator).record_success();
                Ok(layout)
            }
            Err(err) => {
                self.track_failure(operator, &err);
                Err(err.into())
            }
        }
    }

    fn breaker(&self, operator: FerryOperator) -> &CircuitBreaker {
        // реестр и выключатели создаются из одного списка операторов
        self.breakers
            .get(&operator)
            .unwrap_or_else(|| panic!("no circuit breaker for operator {operator}"))
    }

    /// Выключатель считает только инфраструктурные сбои. Отказ по
    /// валидации или занятым местам значит, что оператор жив.
    fn track_failure(&self, operator: FerryOperator, err: &OperatorError) {
        match err.kind {
            OperatorErrorKind::Timeout | OperatorErrorKind::Upstream => {
                self.breaker(operator).record_failure();
            }
            _ => self.breaker(operator).record_success(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::booking::BookingCallOutcome;
    use crate::models::ferry::{
        ClassPricing, FerryClass, OperatorData, OperatorFeatures, PricingSummary, RouteInfo,
        ScheduleInfo,
    };
    use crate::models::session::FerryBookingSession;
    use crate::operators::OperatorAdapter;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Тестовый адаптер: либо отдаёт один рейс, либо валится с заданной
    /// ошибкой; считает вызовы.
    struct ScriptedAdapter {
        operator: FerryOperator,
        fail_with: Option<OperatorErrorKind>,
        calls: AtomicU32,
    }

    impl ScriptedAdapter {
        fn ok(operator: FerryOperator) -> Self {
            Self {
                operator,
                fail_with: None,
                calls: AtomicU32::new(0),
            }
        }

        fn failing(operator: FerryOperator, kind: OperatorErrorKind) -> Self {
            Self {
                operator,
                fail_with: Some(kind),
                calls: AtomicU32::new(0),
            }
        }

        fn result(&self) -> UnifiedFerryResult {
            UnifiedFerryResult {
                id: UnifiedFerryResult::compose_id(self.operator, "9"),
                operator: self.operator,
                operator_ferry_id: "9".into(),
                ferry_name: "Scripted".into(),
                route: RouteInfo {
                    from: "port-blair".into(),
                    to: "havelock".into(),
                },
                schedule: ScheduleInfo {
                    date: NaiveDate::from_ymd_opt(2025, 8, 5).unwrap(),
                    departure_time: "08:00".into(),
                    arrival_time: "09:30".into(),
                    duration: "1h 30m".into(),
                },
                classes: vec![FerryClass {
                    id: "E".into(),
                    name: "Economy".into(),
                    price: 1200.0,
                    available_seats: 10,
                    pricing: ClassPricing::flat(1200.0),
                    amenities: vec![],
                }],
                availability: 10,
                pricing: PricingSummary {
                    min_price: 1200.0,
                    currency: "INR".into(),
                },
                features: OperatorFeatures {
                    supports_seat_selection: true,
                    supports_auto_assignment: false,
                },
                operator_data: OperatorData {
                    original_response: serde_json::json!({}),
                },
            }
        }
    }

    #[async_trait]
    impl OperatorAdapter for ScriptedAdapter {
        fn operator(&self) -> FerryOperator {
            self.operator
        }

        async fn search(
            &self,
            _params: &SearchParams,
        ) -> Result<Vec<UnifiedFerryResult>, OperatorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                None => Ok(vec![self.result()]),
                Some(kind) => Err(OperatorError::new(self.operator, kind, "scripted failure")),
            }
        }

        async fn seat_layout(
            &self,
            _request: &SeatLayoutRequest,
        ) -> Result<SeatLayout, OperatorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                None => Ok(SeatLayout::Manual { seats: vec![] }),
                Some(kind) => Err(OperatorError::new(self.operator, kind, "scripted failure")),
            }
        }

        async fn book(&self, _session: &FerryBookingSession) -> BookingCallOutcome {
            BookingCallOutcome::Failed(OperatorError::new(
                self.operator,
                OperatorErrorKind::Validation,
                "not under test",
            ))
        }
    }

    fn params(from: &str, to: &str) -> SearchParams {
        SearchParams {
            from: from.into(),
            to: to.into(),
            date: NaiveDate::from_ymd_opt(2025, 8, 5).unwrap(),
            adults: 2,
            children: 0,
            infants: 0,
        }
    }

    fn aggregator(adapters: Vec<Arc<dyn OperatorAdapter>>) -> FerryAggregator {
        FerryAggregator::new(Arc::new(OperatorRegistry::new(adapters)), 5, 60, 10)
    }

    #[tokio::test]
    async fn one_failure_does_not_suppress_other_results() {
        let agg = aggregator(vec![
            Arc::new(ScriptedAdapter::ok(FerryOperator::Sealink)),
            Arc::new(ScriptedAdapter::failing(
                FerryOperator::Makruzz,
                OperatorErrorKind::Timeout,
            )),
            Arc::new(ScriptedAdapter::ok(FerryOperator::Greenocean)),
        ]);

        let out = agg.search_all(&params("port-blair", "havelock")).await.unwrap();

        assert_eq!(out.attempted.len(), 3);
        assert_eq!(out.results.len(), 2);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].operator, FerryOperator::Makruzz);
        assert_eq!(out.errors[0].error, "timeout");
        assert!(!out.all_failed());
        assert_eq!(
            out.succeeded(),
            vec![FerryOperator::Sealink, FerryOperator::Greenocean]
        );
    }

    #[tokio::test]
    async fn unsupported_route_skips_operator_without_error() {
        let go = Arc::new(ScriptedAdapter::ok(FerryOperator::Greenocean));
        let agg = aggregator(vec![
            Arc::new(ScriptedAdapter::ok(FerryOperator::Sealink)),
            Arc::new(ScriptedAdapter::ok(FerryOperator::Makruzz)),
            go.clone(),
        ]);

        // havelock -> neil мимо Порт-Блэра: Green Ocean не ходит
        let out = agg.search_all(&params("havelock", "neil")).await.unwrap();

        assert_eq!(out.attempted.len(), 2);
        assert!(!out.attempted.contains(&FerryOperator::Greenocean));
        assert!(out.errors.is_empty());
        assert_eq!(go.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_location_fails_the_request() {
        let agg = aggregator(vec![Arc::new(ScriptedAdapter::ok(FerryOperator::Sealink))]);
        let err = agg
            .search_all(&params("atlantis", "havelock"))
            .await
            .unwrap_err();
        assert!(matches!(err, FerryError::LocationNotFound(_)));
    }

    #[tokio::test]
    async fn all_operators_down_is_reported_not_thrown() {
        let agg = aggregator(vec![
            Arc::new(ScriptedAdapter::failing(
                FerryOperator::Sealink,
                OperatorErrorKind::Upstream,
            )),
            Arc::new(ScriptedAdapter::failing(
                FerryOperator::Makruzz,
                OperatorErrorKind::Timeout,
            )),
        ]);

        let out = agg.search_all(&params("port-blair", "neil")).await.unwrap();
        assert!(out.results.is_empty());
        assert!(out.all_failed());
    }

    #[tokio::test]
    async fn open_breaker_short_circuits_searches() {
        let failing = Arc::new(ScriptedAdapter::failing(
            FerryOperator::Sealink,
            OperatorErrorKind::Upstream,
        ));
        // порог 2, чтобы выключатель открылся за два прохода
        let agg = FerryAggregator::new(
            Arc::new(OperatorRegistry::new(vec![failing.clone() as Arc<dyn OperatorAdapter>])),
            2,
            60,
            10,
        );

        let p = params("port-blair", "havelock");
        agg.search_all(&p).await.unwrap();
        agg.search_all(&p).await.unwrap();
        assert_eq!(failing.calls.load(Ordering::SeqCst), 2);

        // выключатель открыт: адаптер больше не зовут
        let out = agg.search_all(&p).await.unwrap();
        assert_eq!(failing.calls.load(Ordering::SeqCst), 2);
        assert_eq!(out.errors[0].error, "circuit_open");
    }

    #[tokio::test]
    async fn validation_failures_do_not_trip_the_breaker() {
        let failing = Arc::new(ScriptedAdapter::failing(
            FerryOperator::Sealink,
            OperatorErrorKind::Validation,
        ));
        let agg = FerryAggregator::new(
            Arc::new(OperatorRegistry::new(vec![failing.clone() as Arc<dyn OperatorAdapter>])),
            2,
            60,
            10,
        );

        let p = params("port-blair", "havelock");
        for _ in 0..5 {
            agg.search_all(&p).await.unwrap();
        }
        // все пять раз дошли до адаптера, выключатель не открылся
        assert_eq!(failing.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn seat_layout_reports_operator_errors() {
        let agg = aggregator(vec![Arc::new(ScriptedAdapter::failing(
            FerryOperator::Sealink,
            OperatorErrorKind::Timeout,
        ))]);

        let request = SeatLayoutRequest {
            operator: FerryOperator::Sealink,
            ferry_id: "sealink-9".into(),
            class_id: "B".into(),
            route_id: None,
            travel_date: NaiveDate::from_ymd_opt(2025, 8, 5).unwrap(),
            from: "port-blair".into(),
            to: "havelock".into(),
        };
        let err = agg.seat_layout(&request).await.unwrap_err();
        assert!(matches!(
            err,
            FerryError::Operator(OperatorError {
                kind: OperatorErrorKind::Timeout,
                ..
            })
        ));
    }
}
