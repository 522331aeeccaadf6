//! Content hashing helpers.
//!
//! All hashes are SHA-256 rendered as lowercase hex. A definition's hash
//! covers both relative paths and file bytes, in sorted path order, so that
//! renaming or reordering files changes the hash even when the bytes do not.

use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::Result;

/// Hash a byte slice.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Hash a single file's contents.
pub fn hash_file(path: &Path) -> Result<String> {
    Ok(hash_bytes(&fs::read(path)?))
}

/// Hash every file under `root`, folding in each file's root-relative path
/// before its bytes. Walk order is sorted, so the result is independent of
/// filesystem enumeration order.
pub fn hash_tree(root: &Path) -> Result<String> {
    let mut hasher = Sha256::new();

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or_else(|_| entry.path());
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(&fs::read(entry.path())?);
        hasher.update([0u8]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_bytes_stable() {
        let a = hash_bytes(b"content");
        let b = hash_bytes(b"content");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_bytes(b"other"));
    }

    #[test]
    fn test_hash_tree_deterministic() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("b.txt"), "bee").unwrap();
        fs::write(temp.path().join("a.txt"), "ay").unwrap();
        fs::write(temp.path().join("sub/c.txt"), "see").unwrap();

        let first = hash_tree(temp.path()).unwrap();
        let second = hash_tree(temp.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_hash_tree_sensitive_to_renames() {
        let temp1 = TempDir::new().unwrap();
        let temp2 = TempDir::new().unwrap();
        fs::write(temp1.path().join("a.txt"), "same bytes").unwrap();
        fs::write(temp2.path().join("b.txt"), "same bytes").unwrap();

        assert_ne!(
            hash_tree(temp1.path()).unwrap(),
            hash_tree(temp2.path()).unwrap()
        );
    }

    #[test]
    fn test_hash_tree_empty_dir() {
        let temp = TempDir::new().unwrap();
        // An empty tree hashes to the empty-input digest, not an error
        let h = hash_tree(temp.path()).unwrap();
        assert_eq!(h.len(), 64);
    }
}
