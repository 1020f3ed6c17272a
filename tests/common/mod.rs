//! Общая обвязка интеграционных тестов: приложение собирается так же,
//! как в main, но хранилища in-memory, а адаптеры операторов смотрят
//! на wiremock-серверы.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use tower::ServiceExt;

use ferry_gateway::config::{
    AppConfig, CircuitBreakerConfig, Config, DatabaseConfig, FerryConfig, GreenOceanConfig,
    MakruzzConfig, PaymentConfig, RedisConfig, SealinkConfig,
};
use ferry_gateway::middleware::compute_signature;
use ferry_gateway::operators::{
    GreenOceanAdapter, MakruzzAdapter, OperatorAdapter, OperatorRegistry, SealinkAdapter,
};
use ferry_gateway::AppState;

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const GO_PUBLIC_KEY: &str = "pk-test";
pub const GO_PRIVATE_KEY: &str = "sk-test";

/// Конфиг на in-memory хранилищах. Таймаут поиска Sealink — 1 секунда,
/// чтобы сценарии с медленным оператором не тянулись.
pub fn test_config(sealink_url: &str, makruzz_url: &str, green_ocean_url: &str) -> Config {
    Config {
        app: AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            environment: "test".into(),
            rust_log: "ferry_gateway=debug".into(),
            store: "memory".into(),
        },
        database: DatabaseConfig {
            url: String::new(),
            pool_size: 1,
        },
        redis: RedisConfig {
            url: "redis://127.0.0.1:6379".into(),
            pool_size: 1,
        },
        payment: PaymentConfig {
            webhook_secret: WEBHOOK_SECRET.into(),
            stale_after_minutes: 35,
            sweep_interval_seconds: 300,
        },
        sealink: SealinkConfig {
            base_url: sealink_url.into(),
            username: "agent".into(),
            token: "sealink-token".into(),
            search_timeout_seconds: 1,
            booking_timeout_seconds: 2,
        },
        makruzz: MakruzzConfig {
            base_url: makruzz_url.into(),
            username: "agent@example.com".into(),
            password: "secret".into(),
            token_validity_hours: 12,
            search_timeout_seconds: 2,
            booking_timeout_seconds: 2,
        },
        green_ocean: GreenOceanConfig {
            base_url: green_ocean_url.into(),
            public_key: GO_PUBLIC_KEY.into(),
            private_key: GO_PRIVATE_KEY.into(),
            search_timeout_seconds: 2,
            booking_timeout_seconds: 2,
        },
        ferry: FerryConfig {
            retry_attempts: 0,
            seat_layout_timeout_seconds: 2,
            search_cache_ttl_seconds: 60,
            session_ttl_minutes: 30,
            seat_hold_minutes: 15,
        },
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 5,
            timeout_seconds: 60,
        },
    }
}

/// Приложение с боевыми адаптерами и роутером как в main.
pub async fn build_app(config: Config) -> (Router, Arc<AppState>) {
    let retry = config.ferry.retry_attempts;
    let adapters: Vec<Arc<dyn OperatorAdapter>> = vec![
        Arc::new(SealinkAdapter::new(&config.sealink, retry)),
        Arc::new(MakruzzAdapter::new(&config.makruzz, retry)),
        Arc::new(GreenOceanAdapter::new(&config.green_ocean, retry)),
    ];
    let registry = Arc::new(OperatorRegistry::new(adapters));
    let state = AppState::build(config, registry)
        .await
        .expect("failed to build app state");

    let app = Router::new()
        .route("/health", axum::routing::get(|| async { "OK" }))
        .nest("/api", ferry_gateway::controllers::routes())
        .with_state(state.clone());
    (app, state)
}

pub async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: &serde_json::Value) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// Корректно подписанный вебхук платёжного шлюза.
pub async fn post_webhook(app: &Router, payment_ref: &str, status: &str) -> Response {
    let payload = json!({"paymentRef": payment_ref, "status": status}).to_string();
    let encoded = general_purpose::STANDARD.encode(payload);
    let signature = compute_signature(&encoded, WEBHOOK_SECRET);

    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/webhook/payment")
                .header("content-type", "application/json")
                .header("X-Verify", signature)
                .body(Body::from(json!({"response": encoded}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn read_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/* ---------- ответы операторов ---------- */

/// Один рейс Sealink: судно Sealink, классы B (Royal) и P (Luxury).
pub fn sealink_trips() -> serde_json::Value {
    json!({
        "err": null,
        "data": [{
            "id": 901,
            "tripId": 17,
            "vesselID": 1,
            "from": "Port Blair",
            "to": "Swaraj Dweep",
            "dTime": {"hour": 8, "minute": 0},
            "aTime": {"hour": 9, "minute": 30},
            "fares": {"pBaseFare": 1500.0, "bBaseFare": 1100.0},
            "bClass": {
                "1A": {"isBooked": 0, "isBlocked": 0},
                "1B": {"isBooked": 1, "isBlocked": 0}
            },
            "pClass": {
                "2A": {"isBooked": 0, "isBlocked": 0}
            }
        }]
    })
}

pub fn makruzz_login_ok() -> serde_json::Value {
    json!({"data": {"token": "tok-mkz"}, "code": 200, "msg": "success"})
}

/// Одна строка расписания Makruzz: рейс 77, класс Premium.
/// Числа строками — так их и отдаёт оператор.
pub fn makruzz_schedules() -> serde_json::Value {
    json!({
        "code": "200",
        "msg": "",
        "data": [{
            "id": "77",
            "ship_title": "Makruzz Gold",
            "departure_time": "08:30:00",
            "arrival_time": "10:00:00",
            "ship_class_id": "3",
            "ship_class_title": "Premium",
            "total_fare": "1725",
            "seat": "52"
        }]
    })
}

/// Один маршрут Green Ocean: судно 22, отправление 150, класс 1.
/// Цена класса складывается из тарифа, портового сбора и GST.
pub fn green_ocean_routes() -> serde_json::Value {
    json!({
        "status": true,
        "message": "Routes fetched successfully",
        "data": [{
            "ship_id": 22,
            "ship_title": "Green Ocean 1",
            "route_id": 150,
            "departure_time": "06:30",
            "arrival_time": "08:45",
            "ship_class": [{
                "class_id": 1,
                "class_title": "Economy",
                "seat_available": "120",
                "adult_seat_rate": "1150",
                "port_fee": "50",
                "gst": "60"
            }]
        }]
    })
}
