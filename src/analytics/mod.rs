//! Analytics event recording
//!
//! Event writes never sit on the request path: [`EventRecorder`] hands each
//! event to a background task bounded by a timeout.

mod recorder;

pub use recorder::EventRecorder;
