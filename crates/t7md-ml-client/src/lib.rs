//! Client for the recognition and depth estimation service.
//!
//! The service runs the face/person/object detectors and the monocular
//! depth model out of process. This crate speaks its JSON-over-HTTP API and
//! adapts it to the pipeline's [`t7md_media::Detector`] and
//! [`t7md_media::DepthEstimator`] boundaries.

pub mod adapters;
pub mod client;
pub mod error;
pub mod types;

pub use adapters::{HttpDepthEstimator, HttpDetector};
pub use client::{MlClient, MlClientConfig, DEFAULT_BASE_URL};
pub use error::{MlError, MlResult};
pub use types::{encode_frame, DepthResponse, DetectBody, HealthResponse};
