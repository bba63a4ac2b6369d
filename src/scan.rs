use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::WavemarkResult;

/// Extensions picked up when no configuration overrides them.
pub const DEFAULT_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tiff"];

/// Recursively collect image files under `dir`, sorted by path.
///
/// Extension matching ignores case and a leading dot in `extensions`.
/// Unreadable entries below the root are skipped with a warning; an
/// unreadable root is an error.
pub fn find_images<S: AsRef<str>>(dir: &Path, extensions: &[S]) -> WavemarkResult<Vec<PathBuf>> {
    let wanted: Vec<String> = extensions
        .iter()
        .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
        .collect();

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .map(|ext| wanted.contains(&ext.to_string_lossy().to_lowercase()))
            .unwrap_or(false);
        if matches {
            files.push(entry.into_path());
        }
    }

    files.sort();
    tracing::info!(dir = %dir.display(), count = files.len(), "scanned for images");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_recursive_sorted_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b/nested")).unwrap();
        for name in ["z.PNG", "a.jpg", "notes.txt", "b/nested/c.TIFF", "b/d.jpeg", "b/e.gif"] {
            fs::write(root.join(name), b"").unwrap();
        }

        let found = find_images(root, &DEFAULT_EXTENSIONS).unwrap();
        let rel: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(rel, vec!["a.jpg", "b/d.jpeg", "b/nested/c.TIFF", "z.PNG"]);
    }

    #[test]
    fn test_custom_extensions_accept_leading_dot() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x.bmp"), b"").unwrap();
        fs::write(dir.path().join("y.png"), b"").unwrap();
        let found = find_images(dir.path(), &[".BMP"]).unwrap();
        assert_eq!(found, vec![dir.path().join("x.bmp")]);
    }

    #[test]
    fn test_missing_root_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_images(&dir.path().join("absent"), &DEFAULT_EXTENSIONS).is_err());
    }
}
