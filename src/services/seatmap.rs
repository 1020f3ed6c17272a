//! Нормализация схем мест в канонический вид.
//!
//! Вход — сырой JSON оператора, как он пришёл с провода; выход —
//! плоский `Vec<Seat>`. Пустая или отсутствующая схема даёт пустой
//! вектор: места здесь никогда не выдумываются.

use serde_json::Value;

use crate::models::seat::{Seat, SeatStatus, SeatTier};

/// Sealink: два словаря `bClass`/`pClass`, ключ — номер места.
/// `isBooked`/`isBlocked` приходят как 0/1 или bool. Занятость имеет
/// приоритет над блокировкой.
pub fn normalize_sealink(raw_trip: &Value, b_price: f64, p_price: f64) -> Vec<Seat> {
    let mut seats = Vec::new();
    for (tier, key, price, premium) in [
        (SeatTier::B, "bClass", b_price, false),
        (SeatTier::P, "pClass", p_price, true),
    ] {
        let map = match raw_trip[key].as_object() {
            Some(m) => m,
            None => continue,
        };
        for (number, cell) in map {
            let number = cell["number"]
                .as_str()
                .filter(|n| !n.is_empty())
                .unwrap_or(number);

            let status = if flag_set(&cell["isBooked"]) {
                SeatStatus::Booked
            } else if flag_set(&cell["isBlocked"]) {
                SeatStatus::Blocked
            } else {
                SeatStatus::Available
            };

            seats.push(Seat {
                id: format!("{}_{}", tier_letter(tier), number),
                number: number.to_string(),
                display_number: number.to_string(),
                status,
                tier: Some(tier),
                price: Some(price),
                is_accessible: false,
                is_premium: premium,
            });
        }
    }
    seats
}

/// Green Ocean: плоский массив `layout`, одна запись — одно место.
/// Всё, что не помечено `booked`, считается свободным.
pub fn normalize_green_ocean(data: &Value) -> Vec<Seat> {
    let layout = data["layout"]
        .as_array()
        .or_else(|| data.as_array())
        .cloned()
        .unwrap_or_default();

    layout
        .iter()
        .filter_map(|entry| {
            let seat_no = match &entry["seat_no"] {
                Value::Number(n) => n.to_string(),
                Value::String(s) if !s.is_empty() => s.clone(),
                _ => return None,
            };
            let display = entry["seat_numbering"]
                .as_str()
                .filter(|s| !s.is_empty())
                .unwrap_or(&seat_no)
                .to_string();
            let status = if entry["status"]
                .as_str()
                .map(|s| s.eq_ignore_ascii_case("booked"))
                .unwrap_or(false)
            {
                SeatStatus::Booked
            } else {
                SeatStatus::Available
            };

            Some(Seat {
                id: seat_no.clone(),
                number: seat_no,
                display_number: display,
                status,
                tier: None,
                price: None,
                is_accessible: false,
                is_premium: false,
            })
        })
        .collect()
}

fn tier_letter(tier: SeatTier) -> &'static str {
    match tier {
        SeatTier::B => "b",
        SeatTier::P => "p",
    }
}

fn flag_set(value: &Value) -> bool {
    value
        .as_bool()
        .unwrap_or_else(|| value.as_i64() == Some(1))
}
