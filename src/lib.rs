//! Crop disease detection and agronomy chat service.
//!
//! A leaf photo is classified by an external model; the resulting
//! `<Plant>___<Condition>` label is reconciled with the plant the user
//! declared and enriched with treatment advice.

pub mod catalog;
pub mod chat;
pub mod config;
pub mod error;
#[cfg(feature = "tensorflow")]
pub mod graph;
pub mod model;
pub mod reconcile;
pub mod responses;
pub mod routes;
pub mod utils;

pub use catalog::Catalog;
pub use error::{Result, ServiceError};
pub use model::{ClassificationResult, Classifier};
pub use reconcile::{reconcile, Diagnosis, ReconciliationOutcome};
