use regex::{NoExpand, Regex};
use std::path::Path;
use tracing::{debug, info};

use crate::common::error::Cons3rtError;
use crate::common::result::{Cons3rtResult, ResultExt};

/// Rewrites every line of `path` that matches `pattern`, like `sed -i`.
///
/// # Arguments
///
/// * `path` - File to edit in place; it must exist
/// * `pattern` - Regex matched against each line without its line ending
/// * `replacement` - Literal text; `$` is not expanded
/// * `limit` - Replacements per line, `0` for all of them
///
/// # Returns
///
/// The number of lines that changed.
pub async fn replace_in_file(
    path: &Path,
    pattern: &str,
    replacement: &str,
    limit: usize,
) -> Cons3rtResult<usize> {
    let regex = Regex::new(pattern).map_err(|e| {
        Cons3rtError::validation_error("pattern", e.to_string(), Some(pattern.to_string()))
    })?;
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(Cons3rtError::filesystem_error(
            format!("File not found: {}", path.display()),
            Some(path.to_path_buf()),
        ));
    }

    info!("Updating file: {}", path.display());
    let content = tokio::fs::read_to_string(path)
        .await
        .with_filesystem_error("Unable to read file", Some(path.to_path_buf()))?;
    let (updated, changed) = replace_lines(&content, &regex, replacement, limit);
    if changed > 0 {
        tokio::fs::write(path, updated)
            .await
            .with_filesystem_error("Unable to write file", Some(path.to_path_buf()))?;
    }
    Ok(changed)
}

pub(crate) fn replace_lines(content: &str, regex: &Regex, replacement: &str, limit: usize) -> (String, usize) {
    let mut updated = String::with_capacity(content.len());
    let mut changed = 0;
    for line in content.split_inclusive('\n') {
        let (body, ending) = split_line_ending(line);
        if regex.is_match(body) {
            let new_body = regex.replacen(body, limit, NoExpand(replacement));
            debug!("Replacing line [{}] with [{}]", body, new_body);
            changed += usize::from(new_body != body);
            updated.push_str(&new_body);
        } else {
            updated.push_str(body);
        }
        updated.push_str(ending);
    }
    (updated, changed)
}

fn split_line_ending(line: &str) -> (&str, &str) {
    let body = line.trim_end_matches(['\r', '\n']);
    (body, &line[body.len()..])
}
