// Adapters layer: concrete implementations for external systems.

pub mod http;
pub mod signature;

pub use http::HttpExtractionClient;
pub use signature::SignatureResolver;
