pub mod employee;
pub mod leave;
pub mod policy;

use chrono::{NaiveDate, Utc};

/// Reference date for balances and notice checks. Handlers read the clock
/// here and nowhere else.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
