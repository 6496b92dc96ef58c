//! Consensus layer of the Proof-of-Judgment chain.
//!
//! This module provides the pieces the chain facade composes:
//!
//! - configuration parameters ([`config::ConsensusConfig`]),
//! - error types ([`error::ChainError`], [`error::ValidationError`]),
//! - chain-context block validation and the validator membership list
//!   ([`validator::ChainValidator`], [`validator::ValidatorRegistry`]),
//! - the slot-driven block producer ([`proposer::Producer`]),
//! - attestation-driven finalization ([`finalizer::Finalizer`]).

pub mod config;
pub mod error;
pub mod finalizer;
pub mod proposer;
pub mod validator;

pub use config::ConsensusConfig;
pub use error::{ChainError, ValidationError};
pub use finalizer::Finalizer;
pub use proposer::Producer;
pub use validator::{ChainValidator, ValidatorRegistry};
