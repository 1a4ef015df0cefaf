//! Remote vision classification and content generation.

pub mod client;
pub mod remote;

pub use client::VisionClient;
pub use remote::{EdgeFunctionProvider, RawAnalysis, RawGenerated, VisionProvider};
