//! Build job description and outcome labels

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Conventional name of the build-spec file written into the source tree
pub const DEFAULT_SPEC_FILE_NAME: &str = "Dockerfile";

/// A single image build request.
///
/// Owned by one orchestration call; nothing about it outlives the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildJob {
    /// Tag applied to the resulting image
    pub image_tag: String,
    /// Directory packaged as the build context
    pub source_path: PathBuf,
    /// Build-spec text written into `source_path` before packaging
    pub build_spec_text: String,
}

impl BuildJob {
    /// Create a new build job
    pub fn new(
        image_tag: impl Into<String>,
        source_path: impl Into<PathBuf>,
        build_spec_text: impl Into<String>,
    ) -> Self {
        Self {
            image_tag: image_tag.into(),
            source_path: source_path.into(),
            build_spec_text: build_spec_text.into(),
        }
    }
}

/// Metric label recorded for each build transition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuildOutcome {
    /// Build was accepted and is about to run
    Started,

    /// Build stream ended cleanly
    Success,

    /// Build aborted at any step
    Failure,
}

impl BuildOutcome {
    /// All labels, in exposition order
    pub const ALL: [BuildOutcome; 3] = [Self::Started, Self::Success, Self::Failure];

    /// Label value used by the metrics backend
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
