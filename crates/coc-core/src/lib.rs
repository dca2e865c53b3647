//! Core of the Clash of Clans API client.
//!
//! This crate is transport-agnostic: it owns the data model, the request
//! throttle, route templating and the schema-less response materializer. The
//! reqwest-backed session and dispatcher live in `coc-http`.

pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod models;
pub mod ports;
pub mod protocol;
pub mod record;
pub mod route;
pub mod tag;
pub mod throttle;

pub use errors::{Error, ErrorKind, Result};
