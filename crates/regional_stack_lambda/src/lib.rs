//! AWS-oriented adapters and handlers for the regional stack custom resource.
//!
//! This crate owns runtime integration details (the lifecycle handler, stack
//! service and response adapters). Wire contracts come from
//! `regional_stack_core`.

pub mod adapters;
pub mod error;
pub mod handlers;

#[cfg(test)]
pub(crate) mod test_support;
