//! # Discovery Service
//!
//! Enumerates definition files under a synced source's cache subtree and
//! computes a deterministic flat deployment name for each.
//!
//! Upstream repositories organize definitions by category/subcategory for
//! human maintainability (`collaboration/dispatching-parallel-agents/
//! DEFINITION.md`), while the consumer environment requires a flat
//! namespace. [`flatten`] bridges the two: it takes the directory segments
//! above the definition file, lowercases each, replaces non-alphanumeric
//! runs with a single hyphen, and joins with hyphens: a pure function of
//! the relative path, with no hidden state, so re-running discovery on an
//! unchanged cache always yields identical names.
//!
//! Two distinct paths may legally collide on the same flat name
//! (`x/y/DEFINITION.md` and `x-y/DEFINITION.md` both yield `x-y`).
//! Discovery processes candidates in lexicographic path order, keeps the
//! first, and records a [`CollisionWarning`] naming both paths; it never
//! silently merges or overwrites.
//!
//! Legacy single-file definitions (`engineer.md` directly at the source
//! root) are discovered in the same pass, named by their file stem, and
//! participate in the same collision check.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::Result;
use crate::hash;

/// Canonical definition filename, recognized at any depth.
pub const DEFINITION_FILE: &str = "DEFINITION.md";

/// Parsed front-matter metadata of a definition file.
///
/// Fixed, documented fields plus an explicit bag of unparsed extras, so
/// resolution logic never depends on string-matching undocumented keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Metadata {
    /// Display name; informational only, the deployment name comes from
    /// the path.
    #[serde(default)]
    pub name: Option<String>,
    /// Declared semantic version. Kept as the raw string; malformed values
    /// are ranked lowest at resolution time instead of failing discovery.
    #[serde(default)]
    pub version: Option<String>,
    /// Front-matter fields this engine does not interpret.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// How a definition is laid out in the source tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    /// A directory containing `DEFINITION.md` plus co-located resources;
    /// the whole directory is the deployable unit.
    Directory,
    /// A legacy single `.md` file at the source root.
    SingleFile,
}

/// One discovered definition, recomputed on each discovery pass from cache
/// contents, never persisted directly.
#[derive(Debug, Clone)]
pub struct CachedDefinition {
    /// Id of the source this definition came from.
    pub source_id: String,
    /// Path of the definition file within the source tree.
    pub relative_path: PathBuf,
    /// Flattened name; pure function of `relative_path`.
    pub deployment_name: String,
    /// Declared version string from front matter, if any.
    pub version: Option<String>,
    /// SHA-256 over the deployable unit's content.
    pub content_hash: String,
    pub kind: DefinitionKind,
    /// Absolute path of the deployable unit in the cache: the containing
    /// directory for [`DefinitionKind::Directory`], the file itself for
    /// [`DefinitionKind::SingleFile`].
    pub content_root: PathBuf,
}

/// Two distinct paths flattened to the same deployment name; the first (in
/// lexicographic path order) was kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionWarning {
    pub deployment_name: String,
    pub kept: PathBuf,
    pub discarded: PathBuf,
}

impl std::fmt::Display for CollisionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "deployment name {} claimed by both {} (kept) and {} (ignored)",
            self.deployment_name,
            self.kept.display(),
            self.discarded.display()
        )
    }
}

/// Result of one discovery pass over a single source.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub definitions: Vec<CachedDefinition>,
    pub collisions: Vec<CollisionWarning>,
    pub warnings: Vec<String>,
}

/// Normalize one path segment: lowercase, non-alphanumeric runs collapsed
/// to a single hyphen, no leading or trailing hyphen.
fn normalize_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// Compute the flat deployment name for a definition file's relative path.
///
/// Drops the filename, normalizes every remaining directory segment, and
/// joins with hyphens: `collaboration/dispatching-parallel-agents/
/// DEFINITION.md` becomes `collaboration-dispatching-parallel-agents`.
/// Returns an empty string for a root-level path (no directory segments),
/// which discovery skips with a warning.
pub fn flatten(relative_path: &Path) -> String {
    let segments: Vec<String> = relative_path
        .parent()
        .map(|parent| {
            parent
                .components()
                .filter_map(|c| c.as_os_str().to_str())
                .map(normalize_segment)
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    segments.join("-")
}

/// Parse YAML front matter from a definition file's content.
///
/// Absent or malformed front matter yields default metadata; discovery
/// never fails over a definition's own contents.
pub fn parse_front_matter(content: &str) -> Metadata {
    let Some(rest) = content.strip_prefix("---") else {
        return Metadata::default();
    };
    let Some(end) = rest.find("\n---") else {
        return Metadata::default();
    };
    serde_yaml::from_str(&rest[..end]).unwrap_or_default()
}

/// Discover every definition under `root` for the given source.
///
/// The walk order is sorted and candidates are processed in lexicographic
/// relative-path order, so the result (including collision outcomes) is
/// invariant to filesystem enumeration order.
pub fn discover(source_id: &str, root: &Path) -> Result<DiscoveryReport> {
    let mut report = DiscoveryReport::default();

    if !root.is_dir() {
        report.warnings.push(format!(
            "source {}: definitions root {} does not exist",
            source_id,
            root.display()
        ));
        return Ok(report);
    }

    // Collect candidates first, then sort, so collision resolution does not
    // depend on walk order.
    let mut candidates: Vec<(PathBuf, DefinitionKind)> = Vec::new();

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = match entry.path().strip_prefix(root) {
            Ok(p) => p.to_path_buf(),
            Err(_) => continue,
        };
        let file_name = entry.file_name().to_string_lossy();

        if file_name == DEFINITION_FILE {
            if relative.parent().map(|p| p.as_os_str().is_empty()).unwrap_or(true) {
                report.warnings.push(format!(
                    "source {}: {} at the source root has no category path and was skipped",
                    source_id, DEFINITION_FILE
                ));
                continue;
            }
            candidates.push((relative, DefinitionKind::Directory));
        } else if entry.depth() == 1 && file_name.ends_with(".md") {
            // Legacy flat layout: a plain markdown file at the source root.
            candidates.push((relative, DefinitionKind::SingleFile));
        }
    }

    candidates.sort_by(|a, b| a.0.cmp(&b.0));

    let mut claimed: BTreeMap<String, PathBuf> = BTreeMap::new();

    for (relative, kind) in candidates {
        let deployment_name = match kind {
            DefinitionKind::Directory => flatten(&relative),
            DefinitionKind::SingleFile => relative
                .file_stem()
                .map(|s| normalize_segment(&s.to_string_lossy()))
                .unwrap_or_default(),
        };
        if deployment_name.is_empty() {
            report.warnings.push(format!(
                "source {}: {} produced an empty deployment name and was skipped",
                source_id,
                relative.display()
            ));
            continue;
        }

        if let Some(kept) = claimed.get(&deployment_name) {
            report.collisions.push(CollisionWarning {
                deployment_name,
                kept: kept.clone(),
                discarded: relative,
            });
            continue;
        }

        let absolute = root.join(&relative);
        let (content_root, content_hash) = match kind {
            DefinitionKind::Directory => {
                let dir = absolute
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| absolute.clone());
                let hash = hash::hash_tree(&dir)?;
                (dir, hash)
            }
            DefinitionKind::SingleFile => {
                let hash = hash::hash_file(&absolute)?;
                (absolute.clone(), hash)
            }
        };

        let metadata = parse_front_matter(&fs::read_to_string(&absolute).unwrap_or_default());

        claimed.insert(deployment_name.clone(), relative.clone());
        report.definitions.push(CachedDefinition {
            source_id: source_id.to_string(),
            relative_path: relative,
            deployment_name,
            version: metadata.version,
            content_hash,
            kind,
            content_root,
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_flatten_nested_category_path() {
        assert_eq!(
            flatten(Path::new(
                "collaboration/dispatching-parallel-agents/DEFINITION.md"
            )),
            "collaboration-dispatching-parallel-agents"
        );
    }

    #[test]
    fn test_flatten_single_level() {
        assert_eq!(flatten(Path::new("engineer/DEFINITION.md")), "engineer");
    }

    #[test]
    fn test_flatten_root_level_is_empty() {
        assert_eq!(flatten(Path::new("DEFINITION.md")), "");
    }

    #[test]
    fn test_flatten_lowercases_and_collapses_runs() {
        assert_eq!(
            flatten(Path::new("Code Review/My__Skill!/DEFINITION.md")),
            "code-review-my-skill"
        );
    }

    #[test]
    fn test_flatten_is_pure() {
        let path = Path::new("a/b/c/DEFINITION.md");
        assert_eq!(flatten(path), "a-b-c");
        assert_eq!(flatten(path), "a-b-c");
    }

    #[test]
    fn test_parse_front_matter_version() {
        let content = "---\nname: Engineer\nversion: 1.2.3\nauthor: someone\n---\n# Body\n";
        let meta = parse_front_matter(content);
        assert_eq!(meta.name.as_deref(), Some("Engineer"));
        assert_eq!(meta.version.as_deref(), Some("1.2.3"));
        assert!(meta.extra.contains_key("author"));
    }

    #[test]
    fn test_parse_front_matter_absent_or_malformed() {
        assert_eq!(parse_front_matter("# Just a body"), Metadata::default());
        assert_eq!(parse_front_matter("---\nnot yaml: [oops"), Metadata::default());
    }

    #[test]
    fn test_discover_nested_definitions() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "collaboration/dispatching-parallel-agents/DEFINITION.md",
            "---\nversion: 2.0.0\n---\nbody",
        );
        write(
            temp.path(),
            "collaboration/dispatching-parallel-agents/prompts/setup.md",
            "aux resource",
        );
        write(temp.path(), "engineer/DEFINITION.md", "no front matter");

        let report = discover("src-a", temp.path()).unwrap();
        assert!(report.collisions.is_empty());
        assert_eq!(report.definitions.len(), 2);

        let names: Vec<&str> = report
            .definitions
            .iter()
            .map(|d| d.deployment_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["collaboration-dispatching-parallel-agents", "engineer"]
        );

        let dispatcher = &report.definitions[0];
        assert_eq!(dispatcher.version.as_deref(), Some("2.0.0"));
        assert_eq!(dispatcher.kind, DefinitionKind::Directory);
        assert!(dispatcher.content_root.ends_with("dispatching-parallel-agents"));
    }

    #[test]
    fn test_discover_legacy_single_file() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "engineer.md", "---\nversion: 1.0.0\n---\nbody");
        write(temp.path(), "nested/ignored.md", "not at root, not canonical");

        let report = discover("src-a", temp.path()).unwrap();
        assert_eq!(report.definitions.len(), 1);
        let def = &report.definitions[0];
        assert_eq!(def.deployment_name, "engineer");
        assert_eq!(def.kind, DefinitionKind::SingleFile);
        assert_eq!(def.version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn test_discover_collision_first_wins() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "x/y/DEFINITION.md", "nested");
        write(temp.path(), "x-y/DEFINITION.md", "flat");

        let report = discover("src-a", temp.path()).unwrap();

        // Exactly one survivor named x-y, exactly one collision naming both
        assert_eq!(report.definitions.len(), 1);
        assert_eq!(report.definitions[0].deployment_name, "x-y");
        assert_eq!(report.collisions.len(), 1);

        let collision = &report.collisions[0];
        assert_eq!(collision.deployment_name, "x-y");
        // Lexicographic path order: "x-y/..." sorts before "x/y/..."
        assert_eq!(collision.kept, PathBuf::from("x-y/DEFINITION.md"));
        assert_eq!(collision.discarded, PathBuf::from("x/y/DEFINITION.md"));
    }

    #[test]
    fn test_discover_invariant_to_sibling_noise() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "m/DEFINITION.md", "body");

        let before = discover("src-a", temp.path()).unwrap();
        // Unrelated siblings must not affect names or hashes of others
        write(temp.path(), "a-very-early-dir/notes.txt", "noise");
        write(temp.path(), "zz-late/notes.txt", "noise");
        let after = discover("src-a", temp.path()).unwrap();

        assert_eq!(before.definitions.len(), 1);
        assert_eq!(after.definitions.len(), 1);
        assert_eq!(
            before.definitions[0].deployment_name,
            after.definitions[0].deployment_name
        );
        assert_eq!(
            before.definitions[0].content_hash,
            after.definitions[0].content_hash
        );
    }

    #[test]
    fn test_discover_root_definition_file_skipped_with_warning() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "DEFINITION.md", "rootless");

        let report = discover("src-a", temp.path()).unwrap();
        assert!(report.definitions.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("source root"));
    }

    #[test]
    fn test_discover_missing_root_is_empty_with_warning() {
        let temp = TempDir::new().unwrap();
        let report = discover("src-a", &temp.path().join("nope")).unwrap();
        assert!(report.definitions.is_empty());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_discover_content_hash_tracks_resources() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "skill/DEFINITION.md", "body");
        let before = discover("src-a", temp.path()).unwrap();

        // Touching a co-located resource changes the definition's hash
        write(temp.path(), "skill/extra.json", "{}");
        let after = discover("src-a", temp.path()).unwrap();

        assert_ne!(
            before.definitions[0].content_hash,
            after.definitions[0].content_hash
        );
    }
}
