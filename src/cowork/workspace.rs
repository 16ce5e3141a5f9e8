use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};

const MAX_LISTED_FILES: usize = 20;

/// Sandboxed file-system root all file-producing workers write into. Every
/// path is validated against traversal before it touches the disk.
pub struct WorkspaceContext {
    root: PathBuf,
}

impl WorkspaceContext {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root: PathBuf = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("cannot create workspace '{}'", root.display()))?;
        let root = std::fs::canonicalize(&root)
            .with_context(|| format!("cannot resolve workspace '{}'", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a workspace-relative path, refusing absolute paths and any
    /// `..` that would climb out of the sandbox.
    pub fn validate(&self, filename: &str) -> Result<PathBuf> {
        let candidate = Path::new(filename);
        let mut resolved = PathBuf::new();
        for component in candidate.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !resolved.pop() {
                        bail!("Access denied: path '{filename}' is outside the workspace");
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    bail!("Access denied: absolute path '{filename}' is not allowed");
                }
            }
        }
        if resolved.as_os_str().is_empty() {
            bail!("Access denied: empty path");
        }
        Ok(self.root.join(resolved))
    }

    pub fn list_files(&self, recursive: bool) -> Vec<String> {
        let mut files = Vec::new();
        collect_files(&self.root, &self.root, recursive, &mut files);
        files.sort();
        files
    }

    pub fn read_file(&self, filename: &str) -> Result<String> {
        let target = self.validate(filename)?;
        if !target.exists() {
            bail!("File not found: '{filename}'");
        }
        std::fs::read_to_string(&target).with_context(|| format!("cannot read '{filename}'"))
    }

    /// Writes (overwriting) a file, creating parent directories as needed.
    pub fn write_file(&self, filename: &str, content: &str) -> Result<String> {
        let target = self.validate(filename)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create parent dirs for '{filename}'"))?;
        }
        std::fs::write(&target, content).with_context(|| format!("cannot write '{filename}'"))?;
        Ok(format!("Successfully wrote to '{filename}'"))
    }

    /// Compact workspace summary fed to the planner prompt.
    pub fn context_description(&self) -> String {
        let files = self.list_files(true);
        let mut listing: Vec<String> = files
            .iter()
            .take(MAX_LISTED_FILES)
            .map(|f| format!("- {f}"))
            .collect();
        if files.len() > MAX_LISTED_FILES {
            listing.push(format!("... (and {} more)", files.len() - MAX_LISTED_FILES));
        }
        format!(
            "Current workspace: {}\nFiles:\n{}",
            self.root.display(),
            listing.join("\n")
        )
    }
}

fn collect_files(root: &Path, dir: &Path, recursive: bool, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if recursive {
                collect_files(root, &path, recursive, out);
            }
            continue;
        }
        if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::WorkspaceContext;

    fn workspace() -> WorkspaceContext {
        let dir = std::env::temp_dir().join(format!(
            "moabot-ws-{}-{}",
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ));
        WorkspaceContext::new(dir).expect("workspace")
    }

    #[test]
    fn write_then_read_round_trip() {
        let ws = workspace();
        ws.write_file("docs/result.md", "# Report").expect("write");
        assert_eq!(ws.read_file("docs/result.md").expect("read"), "# Report");
        assert!(ws.list_files(true).contains(&"docs/result.md".to_string()));
    }

    #[test]
    fn traversal_is_rejected() {
        let ws = workspace();
        assert!(ws.validate("../outside.txt").is_err());
        assert!(ws.validate("docs/../../outside.txt").is_err());
        assert!(ws.validate("/etc/passwd").is_err());
    }

    #[test]
    fn internal_dotdot_is_allowed() {
        let ws = workspace();
        let p = ws.validate("docs/../notes.md").expect("valid");
        assert!(p.ends_with("notes.md"));
    }

    #[test]
    fn missing_file_read_fails() {
        let ws = workspace();
        assert!(ws.read_file("nope.md").is_err());
    }
}
