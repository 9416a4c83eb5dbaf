// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Finding test targets on disk.

use crate::errors::DiscoveryError;
use camino::{Utf8Path, Utf8PathBuf};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use itertools::Itertools;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Directories that are never searched for test targets.
const SKIPPED_DIRS: &[&str] = &["target", "node_modules"];

/// A test target found on disk.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestTarget {
    /// The path relative to the directory the search was run in, with `/` separators. This is
    /// used as the title of the target's tests.
    pub title: String,

    /// The absolute path to the target.
    pub path: Utf8PathBuf,
}

/// Finds the test targets matching `patterns`, relative to `cwd`.
///
/// Each pattern is resolved as follows:
///
/// * an existing file is a target;
/// * every file beneath an existing directory is a target;
/// * anything else is a glob, matched against every file beneath `cwd`.
///
/// Hidden entries and build output directories are skipped while searching. The result is sorted
/// by title and contains no duplicates. Finding nothing is an error.
pub fn discover_targets<S: AsRef<str>>(
    cwd: &Utf8Path,
    patterns: &[S],
) -> Result<Vec<TestTarget>, DiscoveryError> {
    let mut targets = Vec::new();
    let mut globs = GlobSetBuilder::new();
    let mut has_globs = false;

    for pattern in patterns {
        let pattern = pattern.as_ref();
        let path = cwd.join(pattern);
        if path.is_file() {
            debug!("pattern `{pattern}` is a file");
            targets.push(make_target(cwd, path));
        } else if path.is_dir() {
            debug!("pattern `{pattern}` is a directory");
            walk_files(&path, |file| targets.push(make_target(cwd, file)))?;
        } else {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|error| DiscoveryError::InvalidGlob {
                    pattern: pattern.to_owned(),
                    error,
                })?;
            globs.add(glob);
            has_globs = true;
        }
    }

    if has_globs {
        let globs = globs.build().map_err(|error| DiscoveryError::InvalidGlob {
            pattern: patterns.iter().map(|p| p.as_ref()).join(" "),
            error,
        })?;
        match_globs(cwd, &globs, &mut targets)?;
    }

    targets.sort_unstable();
    targets.dedup();
    debug!("discovered {} test targets", targets.len());

    if targets.is_empty() {
        return Err(DiscoveryError::NoTargets {
            patterns: patterns.iter().map(|p| p.as_ref().to_owned()).collect(),
        });
    }
    Ok(targets)
}

fn match_globs(
    cwd: &Utf8Path,
    globs: &GlobSet,
    targets: &mut Vec<TestTarget>,
) -> Result<(), DiscoveryError> {
    walk_files(cwd, |file| {
        let target = make_target(cwd, file);
        if globs.is_match(&target.title) {
            targets.push(target);
        }
    })
}

fn walk_files(
    root: &Utf8Path,
    mut callback: impl FnMut(Utf8PathBuf),
) -> Result<(), DiscoveryError> {
    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped(entry));
    for entry in walker {
        let entry = entry.map_err(DiscoveryError::Walk)?;
        if !entry.file_type().is_file() {
            continue;
        }
        match Utf8PathBuf::from_path_buf(entry.into_path()) {
            Ok(path) => callback(path),
            Err(path) => debug!("skipping non-UTF-8 path {}", path.display()),
        }
    }
    Ok(())
}

fn is_skipped(entry: &DirEntry) -> bool {
    let Some(name) = entry.file_name().to_str() else {
        return false;
    };
    name.starts_with('.') || (entry.file_type().is_dir() && SKIPPED_DIRS.contains(&name))
}

fn make_target(cwd: &Utf8Path, path: Utf8PathBuf) -> TestTarget {
    let title = match path.strip_prefix(cwd) {
        Ok(relative) => relative.components().map(|c| c.as_str()).join("/"),
        Err(_) => path.to_string(),
    };
    TestTarget { title, path }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use pretty_assertions::assert_eq;

    fn fixture() -> Utf8TempDir {
        let dir = camino_tempfile::tempdir().unwrap();
        for file in [
            "test-math",
            "test-strings",
            "lib",
            "test/unit/a",
            "test/unit/b",
            "test/.hidden/c",
            "target/test-built",
            ".git/test-hook",
        ] {
            let path = dir.path().join(file);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, "").unwrap();
        }
        dir
    }

    fn titles(targets: &[TestTarget]) -> Vec<&str> {
        targets.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn default_patterns() {
        let dir = fixture();
        let targets = discover_targets(dir.path(), &["test", "test-*", "test/*"]).unwrap();
        assert_eq!(
            titles(&targets),
            vec!["test-math", "test-strings", "test/unit/a", "test/unit/b"]
        );
        assert!(targets.iter().all(|t| t.path.is_absolute()));
    }

    #[test]
    fn explicit_file_and_dedup() {
        let dir = fixture();
        let targets = discover_targets(dir.path(), &["lib", "lib", "l*"]).unwrap();
        assert_eq!(titles(&targets), vec!["lib"]);
    }

    #[test]
    fn recursive_glob_skips_hidden_and_build_dirs() {
        let dir = fixture();
        let targets = discover_targets(dir.path(), &["test/**/*", "*-built"]).unwrap();
        assert_eq!(titles(&targets), vec!["test/unit/a", "test/unit/b"]);
    }

    #[test]
    fn nothing_found() {
        let dir = fixture();
        let err = discover_targets(dir.path(), &["missing-*"]).unwrap_err();
        assert!(
            matches!(&err, DiscoveryError::NoTargets { patterns } if patterns == &["missing-*"]),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn invalid_glob() {
        let dir = fixture();
        let err = discover_targets(dir.path(), &["test-[a"]).unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidGlob { .. }), "{err:?}");
    }
}
