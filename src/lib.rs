//! ACME certificate lifecycle: obtain, renew, inspect and delete
//! certificates for stored ACME accounts, validating domains over DNS-01
//! (provider API or manual record) or HTTP-01.

pub mod acme;
mod challenge;
mod client;
mod config;
mod context;
pub mod dns;
mod domains;
mod error;
mod metadata;
mod model;
pub mod repository;
mod service;

pub use challenge::*;
pub use client::*;
pub use config::*;
pub use context::*;
pub use domains::*;
pub use error::*;
pub use metadata::*;
pub use model::*;
pub use service::*;
