// Case Module
// Materialization and discovery of per-combination case directories. Both
// sides share the naming module, so a rescan reproduces the descriptors that
// generation produced.

pub mod discovery;
pub mod materializer;
pub mod models;

pub use discovery::scan;
pub use materializer::write_case;
pub use models::CaseDescriptor;
