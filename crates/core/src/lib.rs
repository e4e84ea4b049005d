//! Shared domain types for the tutorial generation service.
//!
//! This crate has zero internal dependencies and holds everything the
//! other crates agree on: id/timestamp aliases, the domain error type,
//! the generation request/result payloads, and the two capability traits
//! ([`ProgressSink`](progress::ProgressSink) and
//! [`Pipeline`](pipeline::Pipeline)) that decouple the execution side
//! from the content-generation side.

pub mod error;
pub mod generation;
pub mod pipeline;
pub mod progress;
pub mod types;
