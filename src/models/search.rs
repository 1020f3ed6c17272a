use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Параметры поиска в канонической форме: идентификаторы локаций
/// (`port-blair`, `havelock`, `neil`) и дата ISO `yyyy-mm-dd`.
/// Перевод в форматы операторов происходит только внутри адаптеров.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = validate_search_params))]
pub struct SearchParams {
    #[validate(length(min = 1, max = 40))]
    pub from: String,
    #[validate(length(min = 1, max = 40))]
    pub to: String,
    pub date: NaiveDate,
    #[validate(range(min = 1, max = 40))]
    pub adults: u32,
    #[serde(default)]
    #[validate(range(max = 40))]
    pub children: u32,
    #[serde(default)]
    #[validate(range(max = 10))]
    pub infants: u32,
}

impl SearchParams {
    /// Пассажиры, занимающие место. Младенцы едут на руках.
    pub fn seated_passengers(&self) -> u32 {
        self.adults + self.children
    }

    pub fn total_passengers(&self) -> u32 {
        self.adults + self.children + self.infants
    }
}

fn validate_search_params(params: &SearchParams) -> Result<(), ValidationError> {
    if params.from == params.to {
        return Err(ValidationError::new("same_location")
            .with_message("from and to must be different locations".into()));
    }
    if params.total_passengers() > 50 {
        return Err(ValidationError::new("too_many_passengers")
            .with_message("at most 50 passengers per booking".into()));
    }
    Ok(())
}
