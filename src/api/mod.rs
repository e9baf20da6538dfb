//! Transport boundary.
//!
//! The pipeline returns typed values; this module maps them to the JSON
//! envelopes a transport (HTTP handler, CLI) emits. No server lives here.

pub mod envelope;

pub use envelope::Envelope;
