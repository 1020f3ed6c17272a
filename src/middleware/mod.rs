//! Проверка подписи платёжного вебхука.
//!
//! Шлюз кладёт полезную нагрузку в base64 и подписывает её заголовком
//! `X-Verify`: sha256 от строки base64 с дописанным секретом, в hex,
//! плюс `###` и индекс соли. Подпись сверяется до любой работы с
//! состоянием; тело с плохой подписью не декодируется вовсе.

use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{FerryError, FerryResult};

/// Конверт вебхука: нагрузка упакована в base64.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    pub response: String,
}

/// Распакованная нагрузка.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub payment_ref: String,
    pub status: String,
}

// Индекс соли фиксирован: ключ у шлюза один.
const SALT_INDEX: &str = "1";

/// Значение `X-Verify` для данного base64-тела.
pub fn compute_signature(base64_payload: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(base64_payload.as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}###{}", hasher.finalize(), SALT_INDEX)
}

pub fn verify_signature(base64_payload: &str, secret: &str, header: &str) -> bool {
    compute_signature(base64_payload, secret) == header
}

/// Декодирует base64-нагрузку в типизированный вид.
pub fn decode_payload(base64_payload: &str) -> FerryResult<WebhookPayload> {
    let bytes = general_purpose::STANDARD
        .decode(base64_payload)
        .map_err(|e| FerryError::Validation(format!("webhook payload is not base64: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| FerryError::Validation(format!("webhook payload is malformed: {e}")))
}
