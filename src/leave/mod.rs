//! Leave entitlement and scheduling.
//!
//! Everything here is a pure function over data that was already loaded:
//! no I/O, no clock reads. Callers pass "today" explicitly.

pub mod accrual;
pub mod balance;
pub mod calendar;
pub mod constraints;
pub mod dates;
