use std::{fs, io, path::Path};

use log::debug;

/// Removes every regular file directly under `dir` whose name ends with one of
/// `extensions`. Subdirectories are neither entered nor removed.
///
/// # Arguments
/// * `dir` - The directory to prune.
/// * `extensions` - Name suffixes to match, e.g. `".json"`.
///
/// # Returns
/// The number of removed files, or an io error if `dir` cannot be listed or a
/// file cannot be removed.
pub fn prune<P: AsRef<Path>>(dir: P, extensions: &[&str]) -> io::Result<usize> {
    let mut removed = 0;

    for entry in fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if !extensions.iter().any(|ext| name.ends_with(ext)) {
            continue;
        }

        if !entry.file_type()?.is_file() {
            debug!("skipping non-file entry {name}");
            continue;
        }

        fs::remove_file(entry.path())?;
        removed += 1;
    }

    debug!(removed = removed; "pruned {}", dir.as_ref().display());
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn removes_only_matching_extensions() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.json");
        touch(dir.path(), "b.txt");
        touch(dir.path(), "c.pkl");
        touch(dir.path(), "d.json.bak");

        let removed = prune(dir.path(), &[".json", ".txt"]).unwrap();

        assert_eq!(removed, 2);
        assert!(!dir.path().join("a.json").exists());
        assert!(!dir.path().join("b.txt").exists());
        assert!(dir.path().join("c.pkl").exists());
        assert!(dir.path().join("d.json.bak").exists());
    }

    #[test]
    fn does_not_recurse() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        touch(&nested, "inner.pkl");

        let removed = prune(dir.path(), &[".pkl"]).unwrap();

        assert_eq!(removed, 0);
        assert!(nested.join("inner.pkl").exists());
    }

    #[test]
    fn matching_directory_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("archive.json")).unwrap();

        assert_eq!(prune(dir.path(), &[".json"]).unwrap(), 0);
        assert!(dir.path().join("archive.json").is_dir());
    }

    #[test]
    fn missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = prune(dir.path().join("missing"), &[".json"]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
