//! Authentication and authorization for the request pipeline.

pub mod chain;
pub mod gate;
pub mod password;
pub mod principal;
