pub mod employee;
pub mod leave;
pub mod leave_policy;
pub mod role;
