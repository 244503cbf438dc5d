//! Batch content generation for a content calendar.
//!
//! Expand a timeframe into dated jobs, tag each job with a content pillar,
//! call the idea generator one job at a time and save every result as a
//! calendar entry, publishing progress along the way.

pub mod batch;
pub mod config;
pub mod db;
pub mod generator;
pub mod model;
pub mod pillar;
pub mod progress;
pub mod throttle;
pub mod timeframe;

pub use batch::{BatchJob, BatchParams, BatchReport, BatchRun, BatchRunner, GenerationDefaults};
pub use model::{BatchStatus, ContentType, GenerationStrategy, TimeframeKind, WeekStart};
pub use pillar::ContentPillar;
pub use progress::BatchProgress;
