//! Local fixture tier: a JSON array of assignments on disk.

use std::path::Path;

use crate::model::Assignment;

/// Why the fixture tier could not produce assignments.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    /// No file at the configured path. Not worth a warning.
    #[error("fixture not found at {path}")]
    NotFound { path: String },

    /// The file exists but cannot be used.
    #[error("fixture at {path} is invalid: {reason}")]
    Invalid { path: String, reason: String },
}

/// Load and validate the fixture at `path`.
///
/// The file must be a non-empty JSON array of assignments, each with a
/// non-blank id and title.
pub async fn load_fixture(path: &Path) -> Result<Vec<Assignment>, FixtureError> {
    let display = path.display().to_string();
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FixtureError::NotFound { path: display });
        }
        Err(e) => {
            return Err(FixtureError::Invalid {
                path: display,
                reason: e.to_string(),
            });
        }
    };
    parse_fixture(&contents).map_err(|reason| FixtureError::Invalid {
        path: display,
        reason,
    })
}

fn parse_fixture(contents: &str) -> Result<Vec<Assignment>, String> {
    let assignments: Vec<Assignment> =
        serde_json::from_str(contents).map_err(|e| e.to_string())?;
    if assignments.is_empty() {
        return Err("no assignments".to_owned());
    }
    if let Some(pos) = assignments.iter().position(|a| !a.is_valid()) {
        return Err(format!("assignment at index {pos} has a blank id or title"));
    }
    Ok(assignments)
}
