//! Build context packaging
//!
//! The engine receives the source tree as a single tar archive. Entries keep
//! their path relative to the context root and their permission bits, and
//! are written in sorted order so the same tree always yields the same
//! entry sequence.

use std::fs;
use std::path::{Path, PathBuf};

use tar::Builder;
use tracing::debug;

use crate::error::{DockerError, Result};

/// Package every entry under `root` into an in-memory tar archive.
///
/// Fails on the first entry that cannot be stat'ed or read, naming it.
pub fn archive_directory(root: &Path) -> Result<Vec<u8>> {
    check_context_root(root)?;

    let mut builder = Builder::new(Vec::new());
    builder.follow_symlinks(false);

    let mut entries = 0usize;
    append_dir_contents(&mut builder, root, root, &mut entries)?;

    let data = builder.into_inner().map_err(|e| DockerError::archive(root, e))?;
    debug!("Archived {} entries from {} ({} bytes)", entries, root.display(), data.len());

    Ok(data)
}

/// Check that `root` is an existing directory that can serve as a build context
pub fn check_context_root(root: &Path) -> Result<()> {
    let meta = fs::metadata(root).map_err(|e| DockerError::archive(root, e))?;
    if !meta.is_dir() {
        return Err(DockerError::archive(root, "not a directory"));
    }
    Ok(())
}

fn append_dir_contents(
    builder: &mut Builder<Vec<u8>>,
    root: &Path,
    dir: &Path,
    entries: &mut usize,
) -> Result<()> {
    for path in sorted_children(dir)? {
        let meta = fs::symlink_metadata(&path).map_err(|e| DockerError::archive(&path, e))?;
        let relative = path.strip_prefix(root).map_err(|e| DockerError::archive(&path, e))?;

        builder
            .append_path_with_name(&path, relative)
            .map_err(|e| DockerError::archive(&path, e))?;
        *entries += 1;

        if meta.is_dir() {
            append_dir_contents(builder, root, &path, entries)?;
        }
    }

    Ok(())
}

fn sorted_children(dir: &Path) -> Result<Vec<PathBuf>> {
    let read_dir = fs::read_dir(dir).map_err(|e| DockerError::archive(dir, e))?;

    let mut children = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| DockerError::archive(dir, e))?;
        children.push(entry.path());
    }
    children.sort();

    Ok(children)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::Read;

    use tempfile::TempDir;

    use super::*;

    fn read_entries(data: &[u8]) -> BTreeMap<String, (u32, Vec<u8>)> {
        let mut archive = tar::Archive::new(data);
        let mut map = BTreeMap::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            let mode = entry.header().mode().unwrap();
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            map.insert(path, (mode, content));
        }
        map
    }

    #[test]
    fn test_archive_preserves_relative_paths() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("Dockerfile"), "FROM scratch").unwrap();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::write(root.join("src/main.py"), "print('hi')").unwrap();
        fs::write(root.join("src/nested/data.txt"), "data").unwrap();

        let data = archive_directory(root).unwrap();
        let entries = read_entries(&data);

        let names: Vec<_> = entries.keys().map(|k| k.trim_end_matches('/').to_string()).collect();
        assert_eq!(
            names,
            vec!["Dockerfile", "src", "src/main.py", "src/nested", "src/nested/data.txt"]
        );
        assert_eq!(entries["Dockerfile"].1, b"FROM scratch");
    }

    #[cfg(unix)]
    #[test]
    fn test_archive_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let script = root.join("run.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        let plain = root.join("README");
        fs::write(&plain, "readme").unwrap();
        fs::set_permissions(&plain, fs::Permissions::from_mode(0o640)).unwrap();

        let entries = read_entries(&archive_directory(root).unwrap());
        assert_eq!(entries["run.sh"].0 & 0o777, 0o755);
        assert_eq!(entries["README"].0 & 0o777, 0o640);
    }

    #[test]
    fn test_archive_missing_root_names_path() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("does-not-exist");

        match archive_directory(&missing) {
            Err(DockerError::Archive { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected archive error, got {other:?}"),
        }
    }

    #[test]
    fn test_archive_rejects_file_root() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        assert!(matches!(archive_directory(&file), Err(DockerError::Archive { .. })));
    }

    #[test]
    fn test_archive_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let data = archive_directory(temp_dir.path()).unwrap();
        assert!(read_entries(&data).is_empty());
    }
}
