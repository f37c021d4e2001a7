//! Deterministic, pure logic shared by every wrapper protocol.
//!
//! Core modules are free of I/O and logging. They operate on in-memory
//! values and return deterministic outputs suitable for tests; the only
//! suspension point, `Tracer::execute`, is declared here but never awaited
//! here.

pub mod capability;
pub mod freeze;
pub mod limits;
pub mod pipeline;
pub mod types;
