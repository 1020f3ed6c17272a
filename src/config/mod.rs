use serde::Deserialize;
use std::env;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub payment: PaymentConfig,
    pub sealink: SealinkConfig,
    pub makruzz: MakruzzConfig,
    pub green_ocean: GreenOceanConfig,
    pub ferry: FerryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    /// "postgres" (боевой) или "memory" (локальная разработка и тесты).
    pub store: String,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Обязателен при APP_STORE=postgres, проверяется на старте.
    pub url: String,
    pub pool_size: u32,
}

// Настройки Redis
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: u32,
}

// Настройки платёжного шлюза (входящие вебхуки)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub webhook_secret: String,
    /// Через сколько минут pending-платёж считается протухшим.
    pub stale_after_minutes: i64,
    pub sweep_interval_seconds: u64,
}

// Креды и таймауты Sealink Adventures
#[derive(Debug, Clone, Deserialize)]
pub struct SealinkConfig {
    pub base_url: String,
    pub username: String,
    pub token: String,
    pub search_timeout_seconds: u64,
    pub booking_timeout_seconds: u64,
}

// Креды и таймауты Makruzz
#[derive(Debug, Clone, Deserialize)]
pub struct MakruzzConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub token_validity_hours: i64,
    pub search_timeout_seconds: u64,
    pub booking_timeout_seconds: u64,
}

// Ключи и таймауты Green Ocean
#[derive(Debug, Clone, Deserialize)]
pub struct GreenOceanConfig {
    pub base_url: String,
    pub public_key: String,
    pub private_key: String,
    pub search_timeout_seconds: u64,
    pub booking_timeout_seconds: u64,
}

// Общие настройки агрегатора
#[derive(Debug, Clone, Deserialize)]
pub struct FerryConfig {
    /// Дополнительные попытки для поиска и схем мест. Бронирование
    /// не ретраится никогда.
    pub retry_attempts: u32,
    pub seat_layout_timeout_seconds: u64,
    pub search_cache_ttl_seconds: u64,
    pub session_ttl_minutes: i64,
    pub seat_hold_minutes: i64,
}

// Настройки Circuit Breaker
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .expect("PORT must be a valid number"),
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "ferry_gateway=debug,tower_http=debug".to_string()),
                store: env::var("APP_STORE").unwrap_or_else(|_| "postgres".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_default(),
                pool_size: env::var("DB_POOL_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("DB_POOL_SIZE must be a valid number"),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
                pool_size: env::var("REDIS_POOL_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("REDIS_POOL_SIZE must be a valid number"),
            },
            payment: PaymentConfig {
                webhook_secret: env::var("PAYMENT_WEBHOOK_SECRET")
                    .expect("PAYMENT_WEBHOOK_SECRET must be set"),
                stale_after_minutes: env::var("PAYMENT_STALE_AFTER_MINUTES")
                    .unwrap_or_else(|_| "35".to_string())
                    .parse()
                    .expect("PAYMENT_STALE_AFTER_MINUTES must be a valid number"),
                sweep_interval_seconds: env::var("PAYMENT_SWEEP_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .expect("PAYMENT_SWEEP_INTERVAL_SECONDS must be a valid number"),
            },
            sealink: SealinkConfig {
                base_url: env::var("SEALINK_BASE_URL")
                    .unwrap_or_else(|_| "https://api.sealink.example.com/api".to_string()),
                username: env::var("SEALINK_USERNAME").expect("SEALINK_USERNAME must be set"),
                token: env::var("SEALINK_TOKEN").expect("SEALINK_TOKEN must be set"),
                search_timeout_seconds: env::var("SEALINK_SEARCH_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "8".to_string())
                    .parse()
                    .expect("SEALINK_SEARCH_TIMEOUT_SECONDS must be a valid number"),
                booking_timeout_seconds: env::var("SEALINK_BOOKING_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("SEALINK_BOOKING_TIMEOUT_SECONDS must be a valid number"),
            },
            makruzz: MakruzzConfig {
                base_url: env::var("MAKRUZZ_BASE_URL")
                    .unwrap_or_else(|_| "https://api.makruzz.example.com".to_string()),
                username: env::var("MAKRUZZ_USERNAME").expect("MAKRUZZ_USERNAME must be set"),
                password: env::var("MAKRUZZ_PASSWORD").expect("MAKRUZZ_PASSWORD must be set"),
                token_validity_hours: env::var("MAKRUZZ_TOKEN_VALIDITY_HOURS")
                    .unwrap_or_else(|_| "12".to_string())
                    .parse()
                    .expect("MAKRUZZ_TOKEN_VALIDITY_HOURS must be a valid number"),
                search_timeout_seconds: env::var("MAKRUZZ_SEARCH_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .expect("MAKRUZZ_SEARCH_TIMEOUT_SECONDS must be a valid number"),
                booking_timeout_seconds: env::var("MAKRUZZ_BOOKING_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "25".to_string())
                    .parse()
                    .expect("MAKRUZZ_BOOKING_TIMEOUT_SECONDS must be a valid number"),
            },
            green_ocean: GreenOceanConfig {
                base_url: env::var("GREEN_OCEAN_BASE_URL")
                    .unwrap_or_else(|_| "https://api.greenocean.example.com/api".to_string()),
                public_key: env::var("GREEN_OCEAN_PUBLIC_KEY")
                    .expect("GREEN_OCEAN_PUBLIC_KEY must be set"),
                private_key: env::var("GREEN_OCEAN_PRIVATE_KEY")
                    .expect("GREEN_OCEAN_PRIVATE_KEY must be set"),
                search_timeout_seconds: env::var("GREEN_OCEAN_SEARCH_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .expect("GREEN_OCEAN_SEARCH_TIMEOUT_SECONDS must be a valid number"),
                booking_timeout_seconds: env::var("GREEN_OCEAN_BOOKING_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "35".to_string())
                    .parse()
                    .expect("GREEN_OCEAN_BOOKING_TIMEOUT_SECONDS must be a valid number"),
            },
            ferry: FerryConfig {
                retry_attempts: env::var("FERRY_RETRY_ATTEMPTS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .expect("FERRY_RETRY_ATTEMPTS must be a valid number"),
                seat_layout_timeout_seconds: env::var("FERRY_SEAT_LAYOUT_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .expect("FERRY_SEAT_LAYOUT_TIMEOUT_SECONDS must be a valid number"),
                search_cache_ttl_seconds: env::var("FERRY_SEARCH_CACHE_TTL_SECONDS")
                    .unwrap_or_else(|_| "120".to_string())
                    .parse()
                    .expect("FERRY_SEARCH_CACHE_TTL_SECONDS must be a valid number"),
                session_ttl_minutes: env::var("FERRY_SESSION_TTL_MINUTES")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("FERRY_SESSION_TTL_MINUTES must be a valid number"),
                seat_hold_minutes: env::var("FERRY_SEAT_HOLD_MINUTES")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()
                    .expect("FERRY_SEAT_HOLD_MINUTES must be a valid number"),
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: env::var("CIRCUIT_BREAKER_FAILURE_THRESHOLD")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .expect("CIRCUIT_BREAKER_FAILURE_THRESHOLD must be a valid number"),
                timeout_seconds: env::var("CIRCUIT_BREAKER_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .expect("CIRCUIT_BREAKER_TIMEOUT_SECONDS must be a valid number"),
            },
        }
    }
}
