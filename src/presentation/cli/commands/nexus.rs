use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use crate::common::context::AppContext;
use crate::domain::value_objects::artifact_coordinates::ArtifactCoordinates;
use crate::presentation::cli::NexusFetchArgs;

/// Download an artifact from Nexus
pub struct NexusFetchCommand {
    pub group: String,
    pub artifact: String,
    pub version: String,
    pub packaging: String,
    pub classifier: Option<String>,
    pub dest: PathBuf,
    pub url: Option<String>,
    pub show_progress: bool,
}

impl NexusFetchCommand {
    pub fn from_args(args: &NexusFetchArgs) -> Self {
        Self {
            group: args.group.clone(),
            artifact: args.artifact.clone(),
            version: args.version.clone(),
            packaging: args.packaging.clone(),
            classifier: args.classifier.clone(),
            dest: args.dest.clone(),
            url: args.url.clone(),
            show_progress: !args.no_progress,
        }
    }

    pub async fn execute(&self, context: &AppContext) -> Result<()> {
        let mut coordinates =
            ArtifactCoordinates::new(&self.group, &self.artifact, &self.version, &self.packaging)?;
        if let Some(classifier) = &self.classifier {
            coordinates = coordinates.with_classifier(classifier);
        }

        let client = context
            .nexus_client(self.url.as_deref())?
            .with_progress(self.show_progress);
        let path = client.download(&coordinates, &self.dest).await?;
        println!("{} Saved {}", "✓".green(), path.display());
        Ok(())
    }
}
