//! API route handlers

pub mod health;
pub mod requests;
pub mod servers;
pub mod stats;
