pub mod employee_store;
pub mod leave_store;
pub mod policy_store;
