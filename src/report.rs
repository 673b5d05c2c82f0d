use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use tracing::{debug, info};
use ulid::Ulid;

use crate::window::HistoryRecord;

pub const DEFAULT_OUTPUT_FILENAME: &str = "running_averages.out";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to serialize the report: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to write the report to {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Writes the history as a JSON array of `{"date", "average_delivery_time"}`
/// objects.
///
/// The report goes to a temporary file next to `path` first and is only moved
/// into place once it is fully on disk, so an existing report is never left
/// half written.
#[tracing::instrument(level = "debug", skip(history), fields(records = history.len()))]
pub fn write_history(path: &Path, history: &[HistoryRecord]) -> Result<(), ReportError> {
    let contents = serde_json::to_vec(history)?;

    let temp_path = temp_path_for(path);
    debug!("Writing report to {}", temp_path.display());
    if let Err(source) = write_synced(&temp_path, &contents) {
        // Best effort cleanup
        let _ = fs::remove_file(&temp_path);
        return Err(ReportError::Io {
            path: temp_path.display().to_string(),
            source,
        });
    }

    fs::rename(&temp_path, path).map_err(|source| {
        let _ = fs::remove_file(&temp_path);
        ReportError::Io {
            path: path.display().to_string(),
            source,
        }
    })?;
    info!("Wrote {} averages to {}", history.len(), path.display());
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = format!(".{}.tmp", Ulid::new());
    match path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(contents)?;
    // Make sure the data is on disk before the rename makes it visible
    file.flush()?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use std::env;

    use super::*;

    fn scratch_dir() -> PathBuf {
        let dir = env::temp_dir().join(format!("report-{}", Ulid::new()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_write_history_format() {
        let dir = scratch_dir();
        let path = dir.join(DEFAULT_OUTPUT_FILENAME);
        let history = [
            HistoryRecord {
                minute: 25_713_971,
                average_delivery_time: 0.0,
            },
            HistoryRecord {
                minute: 25_713_972,
                average_delivery_time: 25.5,
            },
        ];

        write_history(&path, &history).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            written,
            serde_json::json!([
                {"date": "2018-11-21 22:11:00", "average_delivery_time": 0.0},
                {"date": "2018-11-21 22:12:00", "average_delivery_time": 25.5},
            ])
        );

        // Only the report is left behind
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 1);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_write_empty_history() {
        let dir = scratch_dir();
        let path = dir.join("empty.out");
        write_history(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_write_history_replaces_existing() {
        let dir = scratch_dir();
        let path = dir.join(DEFAULT_OUTPUT_FILENAME);
        fs::write(&path, "stale").unwrap();

        write_history(
            &path,
            &[HistoryRecord {
                minute: 0,
                average_delivery_time: 1.5,
            }],
        )
        .unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            r#"[{"date":"1970-01-01 00:00:00","average_delivery_time":1.5}]"#
        );
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_write_history_missing_directory() {
        let dir = env::temp_dir().join(format!("missing-{}", Ulid::new()));
        let result = write_history(&dir.join("out.json"), &[]);
        assert!(matches!(result, Err(ReportError::Io { .. })));
        assert!(!dir.exists());
    }
}
