//! Path containment and file-type helpers shared by tools and resources

use std::path::{Component, Path, PathBuf};

use serde_json::{Map, Value};

use crate::errors::AppError;

/// Resolves `relative` against `root` and returns the result only when it
/// stays inside `root`.
///
/// `..` components are folded lexically so that targets which do not exist
/// yet are still checked. When the target exists it is also canonicalized, so
/// a symlink pointing outside the root is rejected as well.
pub fn resolve_within_root(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut resolved = PathBuf::new();
    for component in root.join(relative).components() {
        match component {
            Component::ParentDir => {
                resolved.pop();
            }
            Component::CurDir => {}
            other => resolved.push(other.as_os_str()),
        }
    }

    if !resolved.starts_with(root) {
        return None;
    }

    match resolved.canonicalize() {
        Ok(canonical) if canonical.starts_with(root) => Some(canonical),
        Ok(_) => None,
        Err(_) => Some(resolved),
    }
}

pub fn mime_type_for(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("md") => "text/markdown",
        Some("json") => "application/json",
        Some("ts") => "text/typescript",
        Some("js") => "text/javascript",
        Some("txt") => "text/plain",
        Some("py") => "text/x-python",
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("toml") => "application/toml",
        Some("rs") => "text/x-rust",
        _ => "text/plain",
    }
}

pub fn required_string_arg<'a>(
    arguments: &'a Map<String, Value>,
    name: &'static str,
) -> Result<&'a str, AppError> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            AppError::bad_request(
                "missing_argument",
                format!("missing required argument {name}"),
            )
        })
}

pub fn optional_string_arg<'a>(arguments: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::{mime_type_for, optional_string_arg, required_string_arg, resolve_within_root};
    use serde_json::json;

    #[test]
    fn resolves_paths_inside_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().canonicalize().expect("canonical root");
        std::fs::create_dir(root.join("src")).expect("mkdir");

        assert_eq!(resolve_within_root(&root, "."), Some(root.clone()));
        assert_eq!(resolve_within_root(&root, "src"), Some(root.join("src")));
        assert_eq!(
            resolve_within_root(&root, "src/../README.md"),
            Some(root.join("README.md"))
        );
    }

    #[test]
    fn rejects_paths_escaping_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().canonicalize().expect("canonical root");

        assert_eq!(resolve_within_root(&root, ".."), None);
        assert_eq!(resolve_within_root(&root, "../../etc/passwd"), None);
        assert_eq!(resolve_within_root(&root, "/etc/passwd"), None);
    }

    #[test]
    fn rejects_sibling_directory_sharing_a_prefix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path().canonicalize().expect("canonical base");
        let root = base.join("project");
        std::fs::create_dir(&root).expect("mkdir project");
        std::fs::create_dir(base.join("project-secrets")).expect("mkdir sibling");

        assert_eq!(resolve_within_root(&root, "../project-secrets"), None);
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink_leaving_root() {
        let outside = tempfile::tempdir().expect("outside");
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().canonicalize().expect("canonical root");
        std::os::unix::fs::symlink(outside.path(), root.join("escape")).expect("symlink");

        assert_eq!(resolve_within_root(&root, "escape"), None);
    }

    #[test]
    fn maps_known_extensions() {
        assert_eq!(mime_type_for("README.md"), "text/markdown");
        assert_eq!(mime_type_for("Cargo.toml"), "application/toml");
        assert_eq!(mime_type_for("src/main.RS"), "text/x-rust");
        assert_eq!(mime_type_for("LICENSE"), "text/plain");
    }

    #[test]
    fn reads_string_arguments() {
        let arguments = json!({"file_path": "src/lib.rs", "focus_areas": "  ", "n": 3});
        let arguments = arguments.as_object().expect("object");

        assert_eq!(
            required_string_arg(arguments, "file_path").expect("present"),
            "src/lib.rs"
        );
        let error = required_string_arg(arguments, "n").expect_err("not a string");
        assert!(error.to_string().contains("missing required argument n"));
        assert_eq!(optional_string_arg(arguments, "focus_areas"), None);
    }
}
