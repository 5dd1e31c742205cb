//! Text Detect Server Library
//!
//! Job-based text detection over HTTP. A client creates a pending job, posts
//! an image for it, and reads back the detected text once the job completes.
//!
//! # Modules
//!
//! - `detection`: Job orchestrator and its state machine
//! - `vision`: Cloud Vision adapter behind the `TextDetector` trait
//! - `db`: SQLite persistence for jobs and detections
//! - `routes`: HTTP endpoints

pub mod config;
pub mod db;
pub mod detection;
pub mod error;
pub mod routes;
pub mod state;
pub mod vision;
