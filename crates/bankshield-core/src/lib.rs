//! BankShield Core Types and Traits
//!
//! This crate provides the fundamental types shared by the BankShield crates:
//! - Candidate entity model and detection provenance
//! - Token-classification collaborator trait
//! - Core error types

pub mod classifier;
pub mod entity;
pub mod error;

pub use classifier::{ClassifierError, RawPrediction, TokenClassifier};
pub use entity::{CandidateEntity, DetectionMethod, FusedEntity, Provenance};
pub use error::{Error, Result};
