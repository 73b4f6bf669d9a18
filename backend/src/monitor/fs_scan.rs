use chrono::{DateTime, Local, NaiveDateTime};
use glob::{MatchOptions, Pattern};
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "tif"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Creation time where the filesystem records one, modification time otherwise.
pub fn created_time(metadata: &Metadata) -> SystemTime {
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .unwrap_or(UNIX_EPOCH)
}

pub fn modified_time(metadata: &Metadata) -> SystemTime {
    metadata.modified().unwrap_or(UNIX_EPOCH)
}

pub fn created_time_of(path: &Path) -> io::Result<SystemTime> {
    Ok(created_time(&std::fs::metadata(path)?))
}

pub fn to_local(time: SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local()
}

/// Regular files directly under `dir` whose name matches `pattern`, in name
/// order. A missing directory yields no files.
pub fn matching_files(dir: &Path, pattern: &str) -> io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let pattern =
        Pattern::new(pattern).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if pattern.matches_with(name, MATCH_OPTIONS) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Files with one of the recognised image extensions, grouped by extension in
/// `IMAGE_EXTENSIONS` order.
pub fn image_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for ext in IMAGE_EXTENSIONS {
        files.extend(matching_files(dir, &format!("*.{}", ext))?);
    }
    Ok(files)
}

/// Image files whose name contains `token`.
pub fn image_files_containing(dir: &Path, token: &str) -> io::Result<Vec<PathBuf>> {
    let token = Pattern::escape(token);
    let mut files = Vec::new();
    for ext in IMAGE_EXTENSIONS {
        files.extend(matching_files(dir, &format!("*{}*.{}", token, ext))?);
    }
    Ok(files)
}

pub fn newest_by_creation(paths: Vec<PathBuf>) -> Option<PathBuf> {
    paths
        .into_iter()
        .filter_map(|path| created_time_of(&path).ok().map(|created| (created, path)))
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, path)| path)
}

/// Joins a client-supplied file name onto `dir`, refusing anything that could
/// leave it.
pub fn join_file_name(dir: &Path, name: &str) -> Option<PathBuf> {
    if name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
    {
        return None;
    }
    Some(dir.join(name))
}

pub fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let files = matching_files(&dir.path().join("absent"), "*.log").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn matches_by_extension_and_skips_directories() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.png"), b"").unwrap();
        fs::write(dir.path().join("b.jpg"), b"").unwrap();
        fs::write(dir.path().join("c.txt"), b"").unwrap();
        fs::create_dir(dir.path().join("d.png")).unwrap();

        let names: Vec<_> = image_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| file_name_string(p))
            .collect();
        assert_eq!(names, vec!["a.png", "b.jpg"]);
    }

    #[test]
    fn token_match_is_a_substring_match() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("overlay_20240101_120000_mask.png"), b"").unwrap();
        fs::write(dir.path().join("20240101_120000.tif"), b"").unwrap();
        fs::write(dir.path().join("20240102_120000.png"), b"").unwrap();

        let names: Vec<_> = image_files_containing(dir.path(), "20240101_120000")
            .unwrap()
            .iter()
            .map(|p| file_name_string(p))
            .collect();
        assert_eq!(names, vec!["overlay_20240101_120000_mask.png", "20240101_120000.tif"]);
    }

    #[test]
    fn token_with_glob_metacharacters_is_literal() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("run[1].png"), b"").unwrap();
        fs::write(dir.path().join("run1.png"), b"").unwrap();

        let files = image_files_containing(dir.path(), "run[1]").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(file_name_string(&files[0]), "run[1].png");
    }

    #[test]
    fn join_refuses_traversal() {
        let dir = Path::new("/data/images");
        assert!(join_file_name(dir, "../secret.png").is_none());
        assert!(join_file_name(dir, "a/b.png").is_none());
        assert!(join_file_name(dir, "").is_none());
        assert_eq!(
            join_file_name(dir, "ok.png"),
            Some(PathBuf::from("/data/images/ok.png"))
        );
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(2.499), 2.5);
    }
}
