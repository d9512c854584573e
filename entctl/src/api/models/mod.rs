//! Request and response models for the API.

pub mod owners;
pub mod pagination;
pub mod users;
