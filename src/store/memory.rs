//! In-memory реализации хранилищ для dev-режима и тестов.
//!
//! Семантика повторяет боевые стораджи: условный переход платежа
//! атомарен под одним замком, кеш поиска уважает TTL.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::FerryResult;
use crate::models::{FerryBookingSession, PaymentAttempt, PaymentStatus, ProviderBooking};

use super::{BookingStore, SearchCache, SessionStore};

/* ---------- sessions ---------- */

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, FerryBookingSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, session: &FerryBookingSession) -> FerryResult<()> {
        self.sessions
            .write()
            .unwrap()
            .insert(session.session_id, session.clone());
        Ok(())
    }

    async fn get(&self, session_id: Uuid) -> FerryResult<Option<FerryBookingSession>> {
        Ok(self.sessions.read().unwrap().get(&session_id).cloned())
    }

    async fn delete(&self, session_id: Uuid) -> FerryResult<()> {
        self.sessions.write().unwrap().remove(&session_id);
        Ok(())
    }
}

/* ---------- payments + bookings ---------- */

#[derive(Default)]
struct BookingInner {
    payments: HashMap<String, PaymentAttempt>,
    bookings: Vec<ProviderBooking>,
}

/// Платежи и брони под одним замком: переход статуса и чтение видят
/// согласованное состояние, как и при UPDATE ... WHERE в Postgres.
#[derive(Default)]
pub struct MemoryBookingStore {
    inner: Mutex<BookingInner>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Все брони сессии, для ассертов в тестах.
    pub fn bookings_for_session(&self, session_id: Uuid) -> Vec<ProviderBooking> {
        self.inner
            .lock()
            .unwrap()
            .bookings
            .iter()
            .filter(|b| b.session_id == session_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn create_payment(&self, payment: &PaymentAttempt) -> FerryResult<()> {
        self.inner
            .lock()
            .unwrap()
            .payments
            .insert(payment.payment_ref.clone(), payment.clone());
        Ok(())
    }

    async fn get_payment(&self, payment_ref: &str) -> FerryResult<Option<PaymentAttempt>> {
        Ok(self.inner.lock().unwrap().payments.get(payment_ref).cloned())
    }

    async fn payment_by_session(&self, session_id: Uuid) -> FerryResult<Option<PaymentAttempt>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .payments
            .values()
            .filter(|p| p.session_id == session_id)
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn transition_payment(
        &self,
        payment_ref: &str,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> FerryResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        match inner.payments.get_mut(payment_ref) {
            Some(payment) if payment.status == from => {
                payment.status = to;
                payment.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_stale_pending(&self, cutoff: DateTime<Utc>) -> FerryResult<Vec<PaymentAttempt>> {
        let inner = self.inner.lock().unwrap();
        let mut stale: Vec<PaymentAttempt> = inner
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Pending && p.created_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|p| p.created_at);
        Ok(stale)
    }

    async fn insert_booking(&self, booking: &ProviderBooking) -> FerryResult<()> {
        self.inner.lock().unwrap().bookings.push(booking.clone());
        Ok(())
    }

    async fn booking_by_session(&self, session_id: Uuid) -> FerryResult<Option<ProviderBooking>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .bookings
            .iter()
            .filter(|b| b.session_id == session_id)
            .max_by_key(|b| b.created_at)
            .cloned())
    }
}

/* ---------- search cache ---------- */

#[derive(Default)]
pub struct MemorySearchCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemorySearchCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SearchCache for MemorySearchCache {
    async fn get(&self, key: &str) -> FerryResult<Option<String>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((value, deadline)) if Instant::now() < *deadline => Ok(Some(value.clone())),
            // протухший ключ удаляется при чтении, как у Redis с EX
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl_seconds: u64) -> FerryResult<()> {
        let deadline = Instant::now() + Duration::from_secs(ttl_seconds);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(payment_ref: &str, created_at: DateTime<Utc>) -> PaymentAttempt {
        PaymentAttempt {
            payment_ref: payment_ref.to_string(),
            session_id: Uuid::new_v4(),
            amount_paise: 300_000,
            status: PaymentStatus::Pending,
            created_at,
            updated_at: created_at,
        }
    }

    #[tokio::test]
    async fn transition_is_exactly_once() {
        let store = MemoryBookingStore::new();
        store
            .create_payment(&payment("pay-1", Utc::now()))
            .await
            .unwrap();

        let first = store
            .transition_payment("pay-1", PaymentStatus::Pending, PaymentStatus::Confirmed)
            .await
            .unwrap();
        let second = store
            .transition_payment("pay-1", PaymentStatus::Pending, PaymentStatus::Confirmed)
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        let stored = store.get_payment("pay-1").await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Confirmed);
    }

    #[tokio::test]
    async fn transition_from_wrong_state_is_noop() {
        let store = MemoryBookingStore::new();
        store
            .create_payment(&payment("pay-2", Utc::now()))
            .await
            .unwrap();
        store
            .transition_payment("pay-2", PaymentStatus::Pending, PaymentStatus::Failed)
            .await
            .unwrap();

        // уже failed, в confirmed не переводится
        let moved = store
            .transition_payment("pay-2", PaymentStatus::Pending, PaymentStatus::Confirmed)
            .await
            .unwrap();
        assert!(!moved);

        // и неизвестный payment_ref тоже no-op
        let unknown = store
            .transition_payment("no-such", PaymentStatus::Pending, PaymentStatus::Confirmed)
            .await
            .unwrap();
        assert!(!unknown);
    }

    #[tokio::test]
    async fn stale_listing_respects_cutoff_and_status() {
        let store = MemoryBookingStore::new();
        let old = Utc::now() - chrono::Duration::minutes(60);
        let fresh = Utc::now();

        store.create_payment(&payment("pay-old", old)).await.unwrap();
        store
            .create_payment(&payment("pay-fresh", fresh))
            .await
            .unwrap();
        store
            .create_payment(&payment("pay-done", old))
            .await
            .unwrap();
        store
            .transition_payment("pay-done", PaymentStatus::Pending, PaymentStatus::Confirmed)
            .await
            .unwrap();

        let cutoff = Utc::now() - chrono::Duration::minutes(35);
        let stale = store.list_stale_pending(cutoff).await.unwrap();

        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].payment_ref, "pay-old");
    }

    #[tokio::test]
    async fn booking_by_session_returns_latest() {
        let store = MemoryBookingStore::new();
        let session_id = Uuid::new_v4();
        let base = Utc::now();

        for (i, status) in [crate::models::BookingStatus::Failed, crate::models::BookingStatus::Confirmed]
            .into_iter()
            .enumerate()
        {
            store
                .insert_booking(&ProviderBooking {
                    id: Uuid::new_v4(),
                    session_id,
                    payment_ref: "pay-3".into(),
                    operator: crate::models::FerryOperator::Makruzz,
                    pnr: None,
                    operator_booking_id: None,
                    status,
                    provider_response: None,
                    error_message: None,
                    created_at: base + chrono::Duration::seconds(i as i64),
                })
                .await
                .unwrap();
        }

        let latest = store.booking_by_session(session_id).await.unwrap().unwrap();
        assert_eq!(latest.status, crate::models::BookingStatus::Confirmed);
        assert_eq!(store.bookings_for_session(session_id).len(), 2);
    }

    #[tokio::test]
    async fn payment_by_session_returns_latest() {
        let store = MemoryBookingStore::new();
        let session_id = Uuid::new_v4();

        let mut first = payment("pay-a", Utc::now() - chrono::Duration::minutes(5));
        first.session_id = session_id;
        let mut retry = payment("pay-b", Utc::now());
        retry.session_id = session_id;
        store.create_payment(&first).await.unwrap();
        store.create_payment(&retry).await.unwrap();

        let latest = store.payment_by_session(session_id).await.unwrap().unwrap();
        assert_eq!(latest.payment_ref, "pay-b");

        assert!(store
            .payment_by_session(Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn search_cache_honors_ttl() {
        let cache = MemorySearchCache::new();
        cache.put("k-live", "v1", 60).await.unwrap();
        cache.put("k-dead", "v2", 0).await.unwrap();

        assert_eq!(cache.get("k-live").await.unwrap().as_deref(), Some("v1"));
        assert_eq!(cache.get("k-dead").await.unwrap(), None);
        assert_eq!(cache.get("k-missing").await.unwrap(), None);

        // чтение протухшего ключа освобождает запись, живой остаётся
        let entries = cache.entries.lock().unwrap();
        assert!(!entries.contains_key("k-dead"));
        assert!(entries.contains_key("k-live"));
    }
}
