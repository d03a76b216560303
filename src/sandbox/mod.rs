//! Path sandbox
//!
//! Resolves untrusted, root-relative paths against a single sandbox root and
//! decides containment. A [`ResolvedPath`] can only be produced here, so every
//! file operation downstream is guaranteed to target a validated path.
//!
//! Resolution never mutates the filesystem. It does read link metadata, since
//! a symbolic link inside the root may point anywhere on the host.

pub mod policy;

use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use log::debug;

use crate::error::{PathRejection, SandboxError};

pub use policy::{AccessPolicy, AllowAll, Operation, ReadOnly};

/// Whether the host's default filesystems compare names case-insensitively.
pub const HOST_CASE_INSENSITIVE: bool = cfg!(any(windows, target_os = "macos"));

/// A path that has passed containment validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    path: PathBuf,
    relative: String,
}

impl ResolvedPath {
    /// Absolute host path.
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    /// Root-relative form with `/` separators; empty for the root itself.
    pub fn relative(&self) -> &str {
        &self.relative
    }

    pub fn is_root(&self) -> bool {
        self.relative.is_empty()
    }

    /// Last segment of the relative form, `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            None
        } else {
            self.relative.rsplit('/').next()
        }
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.relative)
    }
}

/// Sandbox rooted at a single canonical directory.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
    case_insensitive: bool,
}

impl PathSandbox {
    /// Create a sandbox rooted at `root`, which must already exist.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, SandboxError> {
        let root = root.as_ref();
        let canonical = fs::canonicalize(root).map_err(|source| SandboxError::RootUnavailable {
            path: root.to_path_buf(),
            source,
        })?;

        if !canonical.is_dir() {
            return Err(SandboxError::RootNotADirectory(canonical));
        }

        Ok(Self {
            root: canonical,
            case_insensitive: HOST_CASE_INSENSITIVE,
        })
    }

    /// Override case sensitivity of the containment comparison.
    pub fn with_case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    /// Canonical sandbox root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The root itself as a resolved path.
    pub fn root_path(&self) -> ResolvedPath {
        ResolvedPath {
            path: self.root.clone(),
            relative: String::new(),
        }
    }

    /// Resolve a caller-supplied relative path.
    ///
    /// 1. Reject NUL bytes and absolute-looking input
    /// 2. Normalize `.` and `..` lexically, rejecting any climb above the root
    /// 3. Resolve symbolic links along the existing part of the path
    /// 4. Verify the result is the root or a descendant of it
    pub fn resolve(&self, relative: &str) -> Result<ResolvedPath, PathRejection> {
        let segments = normalize(relative)?;
        let resolved = self.walk(self.root.clone(), &segments, relative)?;
        debug!("Resolved {relative:?} to {}", resolved.path.display());
        Ok(resolved)
    }

    /// Resolve `relative` without following a symbolic link in its last
    /// segment, so the link itself can be acted on. Links in the parent
    /// segments are still resolved and checked.
    pub fn resolve_entry(&self, relative: &str) -> Result<ResolvedPath, PathRejection> {
        let mut segments = normalize(relative)?;
        let Some(name) = segments.pop() else {
            return Ok(self.root_path());
        };

        let parent = self.walk(self.root.clone(), &segments, relative)?;
        let relative = if parent.is_root() {
            name.clone()
        } else {
            format!("{}/{}", parent.relative, name)
        };
        debug!("Resolved entry {relative:?} in {}", parent.path.display());

        Ok(ResolvedPath {
            path: parent.path.join(&name),
            relative,
        })
    }

    /// Resolve a single entry `name` inside an already resolved directory.
    pub fn resolve_child(
        &self,
        parent: &ResolvedPath,
        name: &str,
    ) -> Result<ResolvedPath, PathRejection> {
        validate_name(name)?;
        if !self.contains(parent) {
            return Err(PathRejection::ForeignPath(parent.to_string()));
        }
        self.walk(parent.path.clone(), &[name.to_string()], name)
    }

    /// Whether `path` lies inside this sandbox.
    pub fn contains(&self, path: &ResolvedPath) -> bool {
        self.is_within(&path.path)
    }

    /// Walk `segments` from `start`, resolving symbolic links that exist on
    /// disk. The first missing segment ends the walk.
    fn walk(
        &self,
        start: PathBuf,
        segments: &[String],
        original: &str,
    ) -> Result<ResolvedPath, PathRejection> {
        let mut current = start;
        let mut remaining = segments.iter();

        while let Some(segment) = remaining.next() {
            let candidate = current.join(segment);
            match fs::symlink_metadata(&candidate) {
                Ok(metadata) if metadata.file_type().is_symlink() => {
                    current = fs::canonicalize(&candidate)
                        .map_err(|_| PathRejection::UnresolvableLink(original.to_string()))?;
                    if !self.is_within(&current) {
                        return Err(PathRejection::EscapesRoot(original.to_string()));
                    }
                }
                Ok(_) => current = candidate,
                Err(_) => {
                    // Nothing below a missing or unreadable entry can be a link.
                    current = candidate;
                    for rest in remaining.by_ref() {
                        current.push(rest);
                    }
                }
            }
        }

        if !self.is_within(&current) {
            return Err(PathRejection::EscapesRoot(original.to_string()));
        }

        let relative = match current.strip_prefix(&self.root) {
            Ok(rest) => join_components(rest),
            Err(_) => segments.join("/"),
        };

        Ok(ResolvedPath {
            path: current,
            relative,
        })
    }

    /// Component-wise prefix test: `/sandboxes-evil` never matches `/sandbox`.
    pub(crate) fn is_within(&self, path: &Path) -> bool {
        let mut components = path.components();
        for root_component in self.root.components() {
            match components.next() {
                Some(component) if self.component_eq(root_component, component) => {}
                _ => return false,
            }
        }
        !components.any(|c| matches!(c, Component::ParentDir))
    }

    fn component_eq(&self, a: Component<'_>, b: Component<'_>) -> bool {
        if self.case_insensitive {
            a.as_os_str().to_string_lossy().to_lowercase()
                == b.as_os_str().to_string_lossy().to_lowercase()
        } else {
            a == b
        }
    }
}

/// Check that `name` is a single, plain entry name.
pub fn validate_name(name: &str) -> Result<(), PathRejection> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0', '\r', '\n'])
    {
        return Err(PathRejection::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Lexically normalize a relative path into plain segments.
fn normalize(relative: &str) -> Result<Vec<String>, PathRejection> {
    if relative.contains('\0') {
        return Err(PathRejection::NulByte);
    }

    if relative.starts_with(['/', '\\']) || has_drive_prefix(relative) {
        return Err(PathRejection::AbsolutePath(relative.to_string()));
    }

    let mut segments: Vec<String> = Vec::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                return Err(PathRejection::AbsolutePath(relative.to_string()));
            }
            Component::CurDir => continue,
            Component::ParentDir => {
                if segments.pop().is_none() {
                    return Err(PathRejection::EscapesRoot(relative.to_string()));
                }
            }
            Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
        }
    }

    Ok(segments)
}

/// `C:` style prefixes are refused on every host, not only on Windows.
fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn join_components(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathSandbox) {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("photos/2024")).unwrap();
        fs::write(temp_dir.path().join("photos/cat.png"), b"meow").unwrap();
        let sandbox = PathSandbox::new(temp_dir.path()).unwrap();
        (temp_dir, sandbox)
    }

    #[test]
    fn test_resolve_inside_root() {
        let (_temp, sandbox) = setup();

        let resolved = sandbox.resolve("photos/cat.png").unwrap();
        assert_eq!(resolved.as_path(), sandbox.root().join("photos").join("cat.png"));
        assert_eq!(resolved.relative(), "photos/cat.png");
        assert_eq!(resolved.file_name(), Some("cat.png"));
        assert_eq!(resolved.to_string(), "/photos/cat.png");
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let (_temp, sandbox) = setup();

        let first = sandbox.resolve("photos/./2024/").unwrap();
        let second = sandbox.resolve("photos/./2024/").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.relative(), "photos/2024");
    }

    #[test]
    fn test_resolve_empty_and_dot_is_root() {
        let (_temp, sandbox) = setup();

        assert!(sandbox.resolve("").unwrap().is_root());
        assert!(sandbox.resolve(".").unwrap().is_root());
        assert!(sandbox.resolve("photos/..").unwrap().is_root());
        assert_eq!(sandbox.resolve("").unwrap(), sandbox.root_path());
    }

    #[test]
    fn test_reject_traversal() {
        let (_temp, sandbox) = setup();

        for input in ["..", "../../etc/passwd", "photos/../../x", "./../x", "a/b/../../../x"] {
            let result = sandbox.resolve(input);
            assert!(
                matches!(result, Err(PathRejection::EscapesRoot(_))),
                "{input:?} resolved to {result:?}"
            );
        }
    }

    #[test]
    fn test_inner_parent_segments_stay_inside() {
        let (_temp, sandbox) = setup();

        let resolved = sandbox.resolve("photos/2024/../cat.png").unwrap();
        assert_eq!(resolved.relative(), "photos/cat.png");
    }

    #[test]
    fn test_reject_absolute_inputs() {
        let (_temp, sandbox) = setup();

        for input in ["/etc/passwd", "\\windows\\system32", "C:/Windows", "c:secret"] {
            assert!(
                matches!(sandbox.resolve(input), Err(PathRejection::AbsolutePath(_))),
                "{input:?} was not rejected"
            );
        }
    }

    #[test]
    fn test_reject_nul_byte() {
        let (_temp, sandbox) = setup();
        assert_eq!(sandbox.resolve("cat\0.png"), Err(PathRejection::NulByte));
    }

    #[test]
    fn test_missing_path_still_resolves() {
        let (_temp, sandbox) = setup();

        let resolved = sandbox.resolve("photos/new/deeper/file.txt").unwrap();
        assert_eq!(
            resolved.as_path(),
            sandbox.root().join("photos/new/deeper/file.txt")
        );
    }

    #[test]
    fn test_sibling_prefix_is_not_contained() {
        let outer = TempDir::new().unwrap();
        fs::create_dir_all(outer.path().join("sandbox")).unwrap();
        fs::create_dir_all(outer.path().join("sandboxes-evil")).unwrap();

        let sandbox = PathSandbox::new(outer.path().join("sandbox")).unwrap();
        let evil = fs::canonicalize(outer.path().join("sandboxes-evil")).unwrap();
        assert!(!sandbox.is_within(&evil));
        assert!(sandbox.is_within(sandbox.root()));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        use std::os::unix::fs::symlink;

        let (temp, sandbox) = setup();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), b"secret").unwrap();
        symlink(outside.path(), temp.path().join("escape")).unwrap();

        let result = sandbox.resolve("escape/secret.txt");
        assert!(matches!(result, Err(PathRejection::EscapesRoot(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_root_followed() {
        use std::os::unix::fs::symlink;

        let (temp, sandbox) = setup();
        symlink(temp.path().join("photos"), temp.path().join("pics")).unwrap();

        let resolved = sandbox.resolve("pics/cat.png").unwrap();
        assert_eq!(resolved.relative(), "photos/cat.png");
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_rejected() {
        use std::os::unix::fs::symlink;

        let (temp, sandbox) = setup();
        symlink("/nonexistent/target/file", temp.path().join("dangling.png")).unwrap();

        let result = sandbox.resolve("dangling.png");
        assert!(matches!(result, Err(PathRejection::UnresolvableLink(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_entry_keeps_final_link() {
        use std::os::unix::fs::symlink;

        let (temp, sandbox) = setup();
        symlink(temp.path().join("photos/cat.png"), temp.path().join("photos/alias.png")).unwrap();
        symlink("/nonexistent/target/file", temp.path().join("dangling.png")).unwrap();
        symlink(temp.path().join("photos"), temp.path().join("pics")).unwrap();

        let alias = sandbox.resolve_entry("photos/alias.png").unwrap();
        assert_eq!(alias.as_path(), sandbox.root().join("photos").join("alias.png"));
        assert_eq!(alias.relative(), "photos/alias.png");

        let dangling = sandbox.resolve_entry("dangling.png").unwrap();
        assert_eq!(dangling.relative(), "dangling.png");

        // Links before the last segment are still followed.
        let through = sandbox.resolve_entry("pics/cat.png").unwrap();
        assert_eq!(through.relative(), "photos/cat.png");

        assert!(sandbox.resolve_entry("").unwrap().is_root());
        assert!(matches!(
            sandbox.resolve_entry("../x.png"),
            Err(PathRejection::EscapesRoot(_))
        ));
    }

    #[test]
    fn test_resolve_child() {
        let (_temp, sandbox) = setup();
        let parent = sandbox.resolve("photos").unwrap();

        let child = sandbox.resolve_child(&parent, "dog.png").unwrap();
        assert_eq!(child.relative(), "photos/dog.png");

        for bad in ["", ".", "..", "a/b", "a\\b", "a\rb.txt", "a\nb.txt"] {
            assert!(matches!(
                sandbox.resolve_child(&parent, bad),
                Err(PathRejection::InvalidName(_))
            ));
        }
    }

    #[test]
    fn test_foreign_parent_rejected() {
        let (_temp, sandbox) = setup();
        let (_other_temp, other) = setup();
        let foreign = other.resolve("photos").unwrap();

        assert!(!sandbox.contains(&foreign));
        assert!(matches!(
            sandbox.resolve_child(&foreign, "x.png"),
            Err(PathRejection::ForeignPath(_))
        ));
    }

    #[test]
    fn test_case_insensitive_containment() {
        let (_temp, sandbox) = setup();
        let sandbox = sandbox.with_case_insensitive(true);

        let shouted = PathBuf::from(sandbox.root().to_string_lossy().to_uppercase()).join("x");
        assert!(sandbox.is_within(&shouted));

        let strict = sandbox.with_case_insensitive(false);
        if strict.root().to_string_lossy() != strict.root().to_string_lossy().to_uppercase() {
            assert!(!strict.is_within(&shouted));
        }
    }

    #[test]
    fn test_missing_root_fails() {
        let temp = TempDir::new().unwrap();
        let result = PathSandbox::new(temp.path().join("absent"));
        assert!(matches!(result, Err(SandboxError::RootUnavailable { .. })));
    }
}
