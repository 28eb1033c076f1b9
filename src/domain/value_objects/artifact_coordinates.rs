use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::common::result::Cons3rtResult;

/// Maven-style coordinates of an artifact in a Nexus repository.
///
/// Fields are trimmed on construction; [`Validate`] rejects empty ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ArtifactCoordinates {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub group_id: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub artifact_id: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub version: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub packaging: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
}

impl ArtifactCoordinates {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
        packaging: impl Into<String>,
    ) -> Cons3rtResult<Self> {
        let coordinates = Self {
            group_id: group_id.into().trim().to_string(),
            artifact_id: artifact_id.into().trim().to_string(),
            version: version.into().trim().to_string(),
            packaging: packaging.into().trim().to_string(),
            classifier: None,
        };
        coordinates.validate()?;
        Ok(coordinates)
    }

    /// Empty classifiers are treated as absent.
    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        let classifier = classifier.into().trim().to_string();
        self.classifier = (!classifier.is_empty()).then_some(classifier);
        self
    }

    /// `snapshots` for snapshot or `latest` versions, `releases` otherwise.
    pub fn repository(&self) -> &'static str {
        let version = self.version.to_lowercase();
        if version.contains("snapshot") || version == "latest" {
            "snapshots"
        } else {
            "releases"
        }
    }

    /// Query parameters understood by the Nexus redirect service.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![
            ("g", self.group_id.as_str()),
            ("a", self.artifact_id.as_str()),
            ("v", self.version.as_str()),
            ("r", self.repository()),
            ("p", self.packaging.as_str()),
        ];
        if let Some(classifier) = &self.classifier {
            pairs.push(("c", classifier.as_str()));
        }
        pairs
    }
}

impl fmt::Display for ArtifactCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.group_id, self.artifact_id, self.version, self.packaging
        )?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        Ok(())
    }
}
