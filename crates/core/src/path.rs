//! Path parsing and resolution
//!
//! Paths arrive in the host's addressing convention: an optional drive root
//! (for example `helm:`), then `container/key/segments...`, with either `/` or
//! `\` as separator. [`PathResolver`] turns them into [`ParsedPath`] values
//! addressing a container and an ordered list of key segments. Depth is
//! unbounded unless the drive is configured with a `max_depth`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Canonical path separator, also used as the key delimiter in the store
pub const SEPARATOR: char = '/';

/// Separator accepted on input and rewritten to [`SEPARATOR`]
pub const ALT_SEPARATOR: char = '\\';

/// Allowed characters for container names and key segments
static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-a-zA-Z0-9_!][-a-zA-Z0-9_!.]+$").expect("valid name pattern")
});

/// A path resolved against a drive: container plus key segments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedPath {
    /// Container (bucket) name; empty only for the drive root
    pub container: String,
    /// Key segments below the container, in order
    pub key_segments: Vec<String>,
    /// Whether the path addresses the drive root itself
    pub is_drive_root: bool,
}

impl ParsedPath {
    /// The drive root
    pub fn drive_root() -> Self {
        Self {
            container: String::new(),
            key_segments: Vec::new(),
            is_drive_root: true,
        }
    }

    /// A container-only path
    pub fn container(name: impl Into<String>) -> Self {
        Self {
            container: name.into(),
            key_segments: Vec::new(),
            is_drive_root: false,
        }
    }

    /// A path from a container and a full key (`a/b/c`)
    pub fn object(container: impl Into<String>, key: &str) -> Self {
        Self {
            container: container.into(),
            key_segments: key
                .split(SEPARATOR)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            is_drive_root: false,
        }
    }

    /// True when the path names a container and nothing below it
    pub fn is_container_only(&self) -> bool {
        !self.is_drive_root && self.key_segments.is_empty()
    }

    /// Object key inside the container (`a/b/c`), empty for container-only paths
    pub fn key(&self) -> String {
        self.key_segments.join("/")
    }

    /// Listing prefix for children of this path (`a/b/`), empty for containers
    pub fn prefix(&self) -> String {
        if self.key_segments.is_empty() {
            String::new()
        } else {
            format!("{}{SEPARATOR}", self.key())
        }
    }

    /// Last key segment, if any
    pub fn leaf_name(&self) -> Option<&str> {
        self.key_segments.last().map(String::as_str)
    }

    /// Descend by one or more segments (`child` may contain separators)
    pub fn child(&self, child: &str) -> Self {
        let mut segments = self.key_segments.clone();
        let mut container = self.container.clone();
        for segment in child.split(SEPARATOR).filter(|s| !s.is_empty()) {
            if container.is_empty() {
                container = segment.to_string();
            } else {
                segments.push(segment.to_string());
            }
        }
        Self {
            is_drive_root: container.is_empty(),
            container,
            key_segments: segments,
        }
    }

    /// One level up; `None` for the drive root
    pub fn parent(&self) -> Option<Self> {
        if self.is_drive_root {
            return None;
        }
        if self.key_segments.is_empty() {
            return Some(Self::drive_root());
        }
        let mut parent = self.clone();
        parent.key_segments.pop();
        Some(parent)
    }

    /// Drive-relative display form (`container/a/b`), empty for the drive root
    pub fn display(&self) -> String {
        if self.is_drive_root {
            String::new()
        } else if self.key_segments.is_empty() {
            self.container.clone()
        } else {
            format!("{}{SEPARATOR}{}", self.container, self.key())
        }
    }

    /// Check the container and every key segment against the naming pattern
    pub fn validate_names(&self) -> Result<()> {
        if self.is_drive_root {
            return Err(Error::PathInvalid("the drive root has no name".into()));
        }
        validate_name(&self.container)?;
        self.key_segments.iter().try_for_each(|s| validate_name(s))
    }
}

impl fmt::Display for ParsedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_drive_root {
            write!(f, "{SEPARATOR}")
        } else {
            write!(f, "{}", self.display())
        }
    }
}

/// Resolves raw path strings against a drive root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    root: String,
    max_depth: Option<usize>,
}

impl PathResolver {
    /// Create a resolver for the given drive root (may be empty)
    pub fn new(root: &str) -> Self {
        let root = root
            .replace(ALT_SEPARATOR, "/")
            .trim_end_matches(SEPARATOR)
            .to_string();
        Self {
            root,
            max_depth: None,
        }
    }

    /// Limit the number of key segments below a container
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The normalized drive root
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Parse a raw path into a [`ParsedPath`]
    pub fn parse(&self, path: &str) -> Result<ParsedPath> {
        if !is_valid_syntax(path) {
            return Err(Error::PathInvalid(format!("'{path}' is not a valid path")));
        }
        let normalized = normalize(path)?;
        let rest = self
            .strip_root(&normalized)
            .trim_start_matches(SEPARATOR)
            .trim_end_matches(SEPARATOR);

        if rest.is_empty() {
            return Ok(ParsedPath::drive_root());
        }

        let mut segments = rest.split(SEPARATOR).map(str::to_string);
        let container = segments.next().unwrap_or_default();
        let key_segments: Vec<String> = segments.collect();

        if let Some(max) = self.max_depth
            && key_segments.len() > max
        {
            return Err(Error::PathInvalid(format!(
                "'{path}' has {} key segments, this drive allows at most {max}",
                key_segments.len()
            )));
        }

        Ok(ParsedPath {
            container,
            key_segments,
            is_drive_root: false,
        })
    }

    /// True iff the path is the root, the root plus separator, or a lone separator
    pub fn is_drive_root(&self, path: &str) -> bool {
        if !is_valid_syntax(path) {
            return false;
        }
        match normalize(path) {
            Ok(normalized) => self
                .strip_root(&normalized)
                .trim_matches(SEPARATOR)
                .is_empty(),
            Err(_) => false,
        }
    }

    /// Last path segment, or the drive root itself
    pub fn child_name(&self, path: &str) -> Result<String> {
        if self.is_drive_root(path) {
            return Ok(self.root.clone());
        }
        let normalized = normalize(path)?;
        let trimmed = normalized.trim_end_matches(SEPARATOR);
        Ok(trimmed
            .rsplit(SEPARATOR)
            .next()
            .unwrap_or(trimmed)
            .to_string())
    }

    /// Render a parsed path back into the host convention (`root/container/key`)
    pub fn to_host_path(&self, path: &ParsedPath) -> String {
        join(&self.root, &path.display())
    }

    fn strip_root<'a>(&self, normalized: &'a str) -> &'a str {
        if self.root.is_empty() {
            return normalized;
        }
        match normalized.strip_prefix(self.root.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with(SEPARATOR) => rest,
            _ => normalized,
        }
    }
}

/// Rewrite alternate separators to the canonical one
pub fn normalize(path: &str) -> Result<String> {
    if path.is_empty() {
        return Err(Error::PathInvalid("path cannot be empty".into()));
    }
    Ok(path.replace(ALT_SEPARATOR, "/"))
}

/// False for empty paths and paths with an empty segment between separators
pub fn is_valid_syntax(path: &str) -> bool {
    let Ok(normalized) = normalize(path) else {
        return false;
    };
    let inner = normalized.strip_prefix(SEPARATOR).unwrap_or(&normalized);
    let inner = inner.strip_suffix(SEPARATOR).unwrap_or(inner);
    inner.is_empty() || inner.split(SEPARATOR).all(|segment| !segment.is_empty())
}

/// Join two paths with exactly one separator; an empty side yields the other
pub fn join(parent: &str, child: &str) -> String {
    let parent = parent.replace(ALT_SEPARATOR, "/");
    let child = child.replace(ALT_SEPARATOR, "/");
    if parent.is_empty() {
        return child;
    }
    if child.is_empty() {
        return parent;
    }
    format!(
        "{}{SEPARATOR}{}",
        parent.trim_end_matches(SEPARATOR),
        child.trim_start_matches(SEPARATOR)
    )
}

/// Express `path` relative to `base`
pub fn relative_to(path: &str, base: &str) -> Result<String> {
    let path = normalize(path)?;
    let base = base.replace(ALT_SEPARATOR, "/");
    let base = base.trim_end_matches(SEPARATOR);
    if base.is_empty() {
        return Ok(path);
    }
    if path.trim_end_matches(SEPARATOR) == base {
        return Ok(String::new());
    }
    path.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix(SEPARATOR))
        .map(str::to_string)
        .ok_or_else(|| Error::NotContained {
            path: path.clone(),
            base: base.to_string(),
        })
}

/// Drop the final segment
pub fn parent(path: &str) -> Result<String> {
    let normalized = normalize(path)?;
    let trimmed = normalized.trim_end_matches(SEPARATOR);
    match trimmed.rfind(SEPARATOR) {
        Some(0) => Ok(SEPARATOR.to_string()),
        Some(pos) => Ok(trimmed[..pos].to_string()),
        None => Err(Error::NoParent(path.to_string())),
    }
}

/// Check a container name or key segment against the naming pattern
///
/// Names start with a letter, digit, `-`, `_` or `!`, continue with the same
/// set plus `.`, and are at least two characters long.
pub fn validate_name(name: &str) -> Result<()> {
    if NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(Error::NameInvalid(format!(
            "'{name}' must match {}",
            NAME_PATTERN.as_str()
        )))
    }
}
