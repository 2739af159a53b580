//! Knowledge base directory layout.
//!
//! Each knowledge base is a directory under the configured root:
//!
//! ```text
//! <root>/<name>/
//!   content/      original documents, served for download
//! ```

use kbchat_core::{AppError, AppResult};
use std::path::{Component, Path, PathBuf};

/// Get the base directory for a knowledge base.
pub fn get_base_dir(root: &Path, base_name: &str) -> PathBuf {
    root.join(base_name)
}

/// Get the directory holding a base's original documents.
pub fn get_content_dir(root: &Path, base_name: &str) -> PathBuf {
    get_base_dir(root, base_name).join("content")
}

/// Whether `name` is a single, ordinary path segment.
pub fn is_valid_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

/// Whether a knowledge base with this name exists under `root`.
pub fn base_exists(root: &Path, base_name: &str) -> bool {
    is_valid_name(base_name) && get_base_dir(root, base_name).is_dir()
}

/// Resolve a downloadable document to a path inside the base's content directory.
///
/// # Errors
/// `InvalidRequest` when either name is not a plain path segment,
/// `NotFound` when the base or the file does not exist.
pub fn resolve_document(root: &Path, base_name: &str, file_name: &str) -> AppResult<PathBuf> {
    if !is_valid_name(base_name) {
        return Err(AppError::InvalidRequest(format!(
            "Invalid knowledge base name: '{}'",
            base_name
        )));
    }
    if !is_valid_name(file_name) {
        return Err(AppError::InvalidRequest(format!(
            "Invalid file name: '{}'",
            file_name
        )));
    }

    if !get_base_dir(root, base_name).is_dir() {
        return Err(AppError::NotFound(format!(
            "未找到知识库 {}",
            base_name
        )));
    }

    let path = get_content_dir(root, base_name).join(file_name);
    if !path.is_file() {
        return Err(AppError::NotFound(format!(
            "File '{}' not found in knowledge base '{}'",
            file_name, base_name
        )));
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_base(root: &Path, name: &str, files: &[&str]) {
        let content = get_content_dir(root, name);
        fs::create_dir_all(&content).unwrap();
        for file in files {
            fs::write(content.join(file), "contents").unwrap();
        }
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("samples"));
        assert!(is_valid_name("知识库"));
        assert!(is_valid_name("report v2.pdf"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name(".."));
        assert!(!is_valid_name("."));
        assert!(!is_valid_name("a/b"));
        assert!(!is_valid_name("a\\b"));
        assert!(!is_valid_name("/etc"));
    }

    #[test]
    fn test_base_exists() {
        let temp = TempDir::new().unwrap();
        create_base(temp.path(), "samples", &[]);
        fs::write(temp.path().join("stray.txt"), "x").unwrap();

        assert!(base_exists(temp.path(), "samples"));
        assert!(!base_exists(temp.path(), "missing"));
        assert!(!base_exists(temp.path(), "stray.txt"));
    }

    #[test]
    fn test_resolve_document() {
        let temp = TempDir::new().unwrap();
        create_base(temp.path(), "samples", &["guide.md"]);

        let path = resolve_document(temp.path(), "samples", "guide.md").unwrap();
        assert_eq!(path, temp.path().join("samples").join("content").join("guide.md"));

        assert!(matches!(
            resolve_document(temp.path(), "samples", "absent.md"),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            resolve_document(temp.path(), "missing", "guide.md"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve_document_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        create_base(temp.path(), "samples", &["guide.md"]);

        assert!(matches!(
            resolve_document(temp.path(), "samples", "../../secret"),
            Err(AppError::InvalidRequest(_))
        ));
        assert!(matches!(
            resolve_document(temp.path(), "..", "guide.md"),
            Err(AppError::InvalidRequest(_))
        ));
    }
}
