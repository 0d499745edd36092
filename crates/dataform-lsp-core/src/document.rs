//! Documents open in the editor and workspace recognition

use std::path::{Path, PathBuf};

/// File extensions that go through the dry-run flow
pub const SUPPORTED_EXTENSIONS: &[&str] = &["sqlx"];

/// Files whose presence marks a directory as a Dataform workspace
pub const WORKSPACE_SIGNATURE_FILES: &[&str] = &["workflow_settings.yaml", "dataform.json"];

/// A snapshot of a file open for editing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Absolute path of the file
    pub path: PathBuf,

    /// Full text as currently held by the editor
    pub text: String,
}

impl Document {
    /// Create a document snapshot
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    /// Iterate over the document's lines (without line terminators)
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines()
    }

    /// Logical name used to look the file up in the compiled project
    pub fn logical_name(&self) -> Option<String> {
        logical_file_name(&self.path)
    }
}

/// Logical name of a source file: the base name up to the first `.`.
///
/// Returns `None` when the part after the first `.` is not a supported
/// extension, so `definitions/orders.sqlx` yields `orders` while
/// `orders.test.sqlx` and `orders.sql` yield nothing.
pub fn logical_file_name(path: &Path) -> Option<String> {
    let base = path.file_name()?.to_str()?;
    let mut parts = base.split('.');
    let stem = parts.next()?;
    let extension = parts.next()?;

    if stem.is_empty() || !SUPPORTED_EXTENSIONS.contains(&extension) {
        return None;
    }

    Some(stem.to_string())
}

/// Check whether `root` looks like a Dataform workspace
pub fn is_dataform_workspace(root: &Path) -> bool {
    WORKSPACE_SIGNATURE_FILES
        .iter()
        .any(|name| root.join(name).exists())
}

/// Nearest directory at or above `path` that is a Dataform workspace
pub fn find_workspace_root(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|dir| is_dataform_workspace(dir))
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_name_strips_directory_and_extension() {
        assert_eq!(
            logical_file_name(Path::new("/ws/definitions/orders.sqlx")),
            Some("orders".to_string())
        );
    }

    #[test]
    fn unsupported_files_have_no_logical_name() {
        assert_eq!(logical_file_name(Path::new("/ws/definitions/orders.sql")), None);
        assert_eq!(logical_file_name(Path::new("/ws/definitions/orders")), None);
        assert_eq!(logical_file_name(Path::new("/ws/orders.test.sqlx")), None);
    }

    #[test]
    fn document_lines() {
        let doc = Document::new("/ws/a.sqlx", "config {\n}\nselect 1\n");
        let lines: Vec<&str> = doc.lines().collect();
        assert_eq!(lines, vec!["config {", "}", "select 1"]);
        assert_eq!(doc.logical_name().as_deref(), Some("a"));
    }

    #[test]
    fn workspace_detection() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_dataform_workspace(dir.path()));

        std::fs::write(dir.path().join("workflow_settings.yaml"), "defaultProject: p\n").unwrap();
        assert!(is_dataform_workspace(dir.path()));
    }

    #[test]
    fn workspace_root_from_nested_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("definitions").join("reporting").join("orders.sqlx");
        assert_eq!(find_workspace_root(&file), None);

        std::fs::write(dir.path().join("dataform.json"), "{}").unwrap();
        assert_eq!(find_workspace_root(&file), Some(dir.path().to_path_buf()));
    }
}
