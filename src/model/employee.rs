use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::leave::{accrual, dates};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "name": "Marko Petrović",
        "hired_at": "2019-03-15",
        "birth_date": "1988-11-02"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "Marko Petrović")]
    pub name: String,

    #[schema(
        example = "2019-03-15",
        value_type = String,
        format = "date"
    )]
    pub hired_at: NaiveDate,

    #[schema(example = "1988-11-02", value_type = Option<String>, format = "date", nullable = true)]
    pub birth_date: Option<NaiveDate>,
}

impl Employee {
    pub fn age(&self, today: NaiveDate) -> Option<u32> {
        self.birth_date.map(|birth| dates::age_from(birth, today))
    }

    pub fn seniority_years(&self, today: NaiveDate) -> u32 {
        accrual::seniority_years(self.hired_at, today)
    }
}
