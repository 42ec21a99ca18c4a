//! Platform API access.
//!
//! The exporter talks to the multi-tenant platform over blocking HTTP.
//! Everything above this module depends only on the [`PlatformApi`]
//! trait so tests can substitute canned fixtures for the network.

pub mod auth;
pub mod client;

pub use auth::Credentials;
pub use client::{FetchError, HttpPlatformApi, PlatformApi};
