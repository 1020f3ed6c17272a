use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FerryOperator {
    Sealink,
    Makruzz,
    Greenocean,
}

impl FerryOperator {
    pub const ALL: [FerryOperator; 3] = [
        FerryOperator::Sealink,
        FerryOperator::Makruzz,
        FerryOperator::Greenocean,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FerryOperator::Sealink => "sealink",
            FerryOperator::Makruzz => "makruzz",
            FerryOperator::Greenocean => "greenocean",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sealink" => Some(FerryOperator::Sealink),
            "makruzz" => Some(FerryOperator::Makruzz),
            "greenocean" => Some(FerryOperator::Greenocean),
            _ => None,
        }
    }
}

impl std::fmt::Display for FerryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Единый формат рейса, в который адаптеры сводят ответы всех операторов.
/// Фронту не нужно знать, чей это рейс: цены, классы и расписание везде
/// выглядят одинаково, а исходный ответ оператора лежит в `operatorData`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedFerryResult {
    /// Глобально уникален: `<operator>-<operator_ferry_id>`.
    pub id: String,
    pub operator: FerryOperator,
    pub operator_ferry_id: String,
    pub ferry_name: String,
    pub route: RouteInfo,
    pub schedule: ScheduleInfo,
    pub classes: Vec<FerryClass>,
    /// Суммарно свободных мест по всем классам.
    pub availability: u32,
    pub pricing: PricingSummary,
    pub features: OperatorFeatures,
    pub operator_data: OperatorData,
}

impl UnifiedFerryResult {
    pub fn compose_id(operator: FerryOperator, operator_ferry_id: &str) -> String {
        format!("{}-{}", operator, operator_ferry_id)
    }

    pub fn class(&self, class_id: &str) -> Option<&FerryClass> {
        self.classes.iter().find(|c| c.id == class_id)
    }

    pub fn min_price(&self) -> f64 {
        self.classes
            .iter()
            .map(|c| c.price)
            .fold(f64::INFINITY, f64::min)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteInfo {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInfo {
    pub date: NaiveDate,
    /// Локальное время `HH:MM`.
    pub departure_time: String,
    pub arrival_time: String,
    /// Человекочитаемо: `"1h 30m"`.
    pub duration: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FerryClass {
    /// Что именно лежит в id — зависит от оператора: у Makruzz это
    /// schedule_id конкретного класса, у Sealink литера палубы.
    pub id: String,
    pub name: String,
    /// Итоговая цена за взрослого/ребёнка, INR.
    pub price: f64,
    pub available_seats: u32,
    pub pricing: ClassPricing,
    pub amenities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPricing {
    pub base_price: f64,
    pub fees: f64,
    pub taxes: f64,
    pub total: f64,
}

impl ClassPricing {
    pub fn flat(total: f64) -> Self {
        Self {
            base_price: total,
            fees: 0.0,
            taxes: 0.0,
            total,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingSummary {
    pub min_price: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorFeatures {
    pub supports_seat_selection: bool,
    pub supports_auto_assignment: bool,
}

/// Непрозрачный для остального кода кусок: исходный ответ оператора.
/// Сессия бронирования переносит его до шага покупки, где адаптер
/// достаёт из него свои ship_id/route_id/schedule_id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorData {
    pub original_response: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&FerryOperator::Greenocean).unwrap(),
            "\"greenocean\""
        );
        assert_eq!(FerryOperator::parse("makruzz"), Some(FerryOperator::Makruzz));
        assert_eq!(FerryOperator::parse("uber-boats"), None);
    }

    #[test]
    fn composed_id_is_namespaced() {
        assert_eq!(
            UnifiedFerryResult::compose_id(FerryOperator::Sealink, "472"),
            "sealink-472"
        );
    }
}
