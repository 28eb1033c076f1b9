use std::path::Path;
use tracing::{debug, error, info};

use crate::common::error::Cons3rtError;
use crate::common::result::Cons3rtResult;
use crate::domain::entities::property_map::PropertyMap;

/// Reads `key=value` properties files from disk.
#[derive(Debug, Clone, Default)]
pub struct PropertiesStore;

impl PropertiesStore {
    pub fn new() -> Self {
        Self
    }

    /// Loads a properties file. Lines that are not valid UTF-8 are skipped.
    pub async fn load(&self, path: &Path) -> Cons3rtResult<PropertyMap> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            error!("Unable to read properties file {}: {}", path.display(), e);
            Cons3rtError::properties_file_error_with_source(
                format!("Unable to read properties file {}", path.display()),
                path,
                e,
            )
        })?;

        let mut skipped = 0usize;
        let lines = bytes.split(|b| *b == b'\n').filter_map(|raw| match std::str::from_utf8(raw) {
            Ok(line) => Some(line),
            Err(_) => {
                skipped += 1;
                None
            }
        });
        let map = PropertyMap::from_lines(lines);

        if skipped > 0 {
            debug!("Skipped {} undecodable line(s) in {}", skipped, path.display());
        }
        info!("Loaded {} properties from {}", map.len(), path.display());
        Ok(map)
    }
}
