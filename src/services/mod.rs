//! Read/write services layered over the backend capability set.

pub mod materializer;
pub mod roster;
pub mod store;

pub use store::{CandidateStore, GeneratedArtifacts, UploadedAudio};
