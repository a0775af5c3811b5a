//! Regional stack fan-out domain primitives.
//!
//! This crate owns deterministic document generation (region resolution,
//! identifier derivation, parameter composition, forced-update tokens and
//! fan-out assembly) and the custom resource wire contract shared with the
//! backing handler. It intentionally excludes AWS SDK and Lambda runtime
//! concerns.

pub mod compose;
pub mod contract;
pub mod document;
pub mod error;
pub mod generate;
pub mod intrinsic;
pub mod logging;
pub mod naming;
pub mod region;
pub mod update_token;

pub use document::{assemble, DeploymentDocument};
pub use error::{GenerationError, ResolutionError};
pub use generate::{generate_document, GenerationSettings};
pub use region::{RegionDirectory, RegionId};
