//! Local dump files

use std::path::Path;

use cutter_core::{Artifact, BackupError};

/// Whether a file name looks like a dump (`*.sql*`)
pub fn is_backup_file(name: &str) -> bool {
    name.contains(".sql")
}

/// List dump files directly inside `dir`, sorted by name
pub fn list_backups(dir: &Path) -> Result<Vec<Artifact>, BackupError> {
    let entries = std::fs::read_dir(dir).map_err(|e| BackupError::io(dir, e))?;

    let mut backups = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| BackupError::io(dir, e))?;
        let name = entry.file_name();
        if !is_backup_file(&name.to_string_lossy()) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", entry.path(), e);
                continue;
            }
        };

        backups.push(Artifact {
            path: entry.path(),
            size_bytes: metadata.len(),
        });
    }

    backups.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(backups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_backup_file() {
        assert!(is_backup_file("mydb_20240309140507.sql"));
        assert!(is_backup_file("mydb.sql.gz"));
        assert!(!is_backup_file("notes.txt"));
        assert!(!is_backup_file("sql"));
    }

    #[test]
    fn test_list_empty_dir() {
        let dir = TempDir::new().unwrap();
        assert!(list_backups(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_list_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["backup3.sql", "backup1.sql", "backup2.sql.gz", "readme.md"] {
            std::fs::write(dir.path().join(name), b"test content").unwrap();
        }
        std::fs::create_dir(dir.path().join("old.sql.d")).unwrap();

        let backups = list_backups(dir.path()).unwrap();
        let names: Vec<_> = backups
            .iter()
            .map(|a| a.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["backup1.sql", "backup2.sql.gz", "backup3.sql"]);
        assert!(backups.iter().all(|a| a.size_bytes == 12));
    }

    #[test]
    fn test_list_missing_dir() {
        let dir = TempDir::new().unwrap();
        let err = list_backups(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, BackupError::Io { .. }));
    }
}
