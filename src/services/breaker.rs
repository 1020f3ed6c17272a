//! Автоматический выключатель для внешних операторов.
//!
//! У каждого оператора свой выключатель: лежащий Sealink не должен
//! отключать Makruzz. Защищает только поиск и схемы мест; выкуп брони
//! идёт мимо — после списания денег отказываться от вызова нельзя.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::models::ferry::FerryOperator;

/// Состояния выключателя.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Нормальный режим, запросы разрешены.
    Closed,
    /// Блокировка после серии сбоев, запросы запрещены до таймаута.
    Open,
    /// Пробный режим: разрешён один тестовый запрос.
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    operator: FerryOperator,
    state: RwLock<CircuitState>,
    /// Счётчик последовательных сбоев.
    failure_count: AtomicU32,
    /// Секунды от `epoch` на момент последнего сбоя.
    last_failure_secs: AtomicU64,
    /// Монотонная точка отсчёта; системные часы могут прыгать.
    epoch: Instant,
    failure_threshold: u32,
    timeout_duration: Duration,
}

impl CircuitBreaker {
    pub fn new(operator: FerryOperator, failure_threshold: u32, timeout_seconds: u64) -> Self {
        Self {
            operator,
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            last_failure_secs: AtomicU64::new(0),
            epoch: Instant::now(),
            failure_threshold,
            timeout_duration: Duration::from_secs(timeout_seconds),
        }
    }

    fn now_secs(&self) -> u64 {
        self.epoch.elapsed().as_secs()
    }

    /// Можно ли выполнить следующий запрос.
    pub fn can_execute(&self) -> bool {
        let state = *self.state.read().unwrap();

        match state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let now = self.now_secs();
                let last_failure = self.last_failure_secs.load(Ordering::Relaxed);

                if now.saturating_sub(last_failure) >= self.timeout_duration.as_secs() {
                    *self.state.write().unwrap() = CircuitState::HalfOpen;
                    info!(operator = %self.operator, "circuit breaker transitioning to HalfOpen");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.write().unwrap();

        match *state {
            CircuitState::HalfOpen => {
                *state = CircuitState::Closed;
                self.failure_count.store(0, Ordering::Relaxed);
                info!(operator = %self.operator, "circuit breaker recovered, now Closed");
            }
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::Relaxed);
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let failure_count = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        self.last_failure_secs
            .store(self.now_secs(), Ordering::Relaxed);

        let mut state = self.state.write().unwrap();

        match *state {
            CircuitState::Closed => {
                if failure_count >= self.failure_threshold {
                    *state = CircuitState::Open;
                    error!(
                        operator = %self.operator,
                        failures = failure_count,
                        threshold = self.failure_threshold,
                        "circuit breaker OPENED"
                    );
                }
            }
            CircuitState::HalfOpen => {
                *state = CircuitState::Open;
                warn!(operator = %self.operator, "circuit breaker probe failed, back to Open");
            }
            CircuitState::Open => {}
        }
    }

    /// Текущее состояние для мониторинга.
    pub fn get_state(&self) -> CircuitState {
        *self.state.read().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, timeout_seconds: u64) -> CircuitBreaker {
        CircuitBreaker::new(FerryOperator::Sealink, threshold, timeout_seconds)
    }

    #[test]
    fn opens_after_reaching_failure_threshold() {
        let cb = breaker(3, 60);
        assert!(cb.can_execute());

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.get_state(), CircuitState::Closed);
        assert!(cb.can_execute());

        cb.record_failure();
        assert_eq!(cb.get_state(), CircuitState::Open);
        assert!(!cb.can_execute());
    }

    #[test]
    fn success_resets_consecutive_failures() {
        let cb = breaker(3, 60);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        // серия прервана успехом, порог не достигнут
        assert_eq!(cb.get_state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_probe_after_timeout_then_closes_on_success() {
        // нулевой таймаут: Open переходит в HalfOpen сразу
        let cb = breaker(1, 0);
        cb.record_failure();
        assert_eq!(cb.get_state(), CircuitState::Open);

        assert!(cb.can_execute());
        assert_eq!(cb.get_state(), CircuitState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.get_state(), CircuitState::Closed);
    }

    #[test]
    fn failed_probe_reopens_the_circuit() {
        let cb = breaker(1, 0);
        cb.record_failure();
        assert!(cb.can_execute()); // HalfOpen
        cb.record_failure();
        assert_eq!(cb.get_state(), CircuitState::Open);
    }
}
