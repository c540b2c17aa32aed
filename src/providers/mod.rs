/// Local inference backends behind the model invocation boundary

pub mod model;

// Re-export the backend types and clients
pub use model::{ModelBackend, ModelClient, ModelHandle, StubModel};
