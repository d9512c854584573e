//! HTTP handlers for the routed operations.

pub mod owners;
pub mod status;
pub mod users;
