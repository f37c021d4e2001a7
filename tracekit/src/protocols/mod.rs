//! The four wrapper protocols over a validated capability.
//!
//! - **[`direct`]** and **[`builder`]** return `Result` and fail at the
//!   earliest synchronous point.
//! - **[`direct_safe`]** and **[`builder_safe`]** report every failure as a
//!   value and never return an error.
//!
//! All four resolve and execute through [`resolve`].

pub mod builder;
pub mod builder_safe;
pub mod chain;
pub mod direct;
pub mod direct_safe;
pub mod outcome;
pub mod resolve;
