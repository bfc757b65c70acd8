//! Fleet billing service: recurring invoice generation for rental contracts.

pub mod config;
pub mod models;
pub mod services;
pub mod startup;
