//! Course marketplace moderation: the review lifecycle shared by courses, lectures, exams
//! and enrollment cancellation requests, plus the ambient config, error and telemetry
//! plumbing used by the API service.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
