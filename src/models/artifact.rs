//! Artifact kinds owned by a session.

use serde::{Deserialize, Serialize};

/// The fixed set of files a session may own. Each session holds at most one
/// artifact of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Audio,
    Transcript,
    Profile,
    Metadata,
    Html,
    Pdf,
}

impl ArtifactKind {
    /// Content type sent when persisting this kind. Uploaded audio may carry
    /// its own mime type, which overrides the default.
    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::Audio => "audio/mpeg",
            ArtifactKind::Transcript => "text/plain",
            ArtifactKind::Profile => "application/json",
            ArtifactKind::Metadata => "application/json",
            ArtifactKind::Html => "text/html",
            ArtifactKind::Pdf => "application/pdf",
        }
    }
}

/// Where one artifact lives: the backend-specific locator (absolute path or
/// object key) and the public link it is served under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub locator: String,
    pub link: String,
}
