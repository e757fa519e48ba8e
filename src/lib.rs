pub mod config;
pub mod error;
pub mod traceability;
pub mod workspace;

pub use error::VerifierError;
