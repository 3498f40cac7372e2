use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Saves a script somewhere it can be executed and returns its path.
pub trait ScriptSink {
    fn persist(&self, script: &str) -> io::Result<PathBuf>;
}

/// Writes scripts as `install_<random>.sh` files in one directory.
///
/// Files are created exclusively, so a name is never reused, and are left
/// on disk after the run.
#[derive(Debug, Clone)]
pub struct ScriptStore {
    dir: PathBuf,
}

impl ScriptStore {
    const PREFIX: &'static str = "install_";
    const SUFFIX: &'static str = ".sh";
    const RAND_BYTES: usize = 8;

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ScriptSink for ScriptStore {
    fn persist(&self, script: &str) -> io::Result<PathBuf> {
        let mut file = tempfile::Builder::new()
            .prefix(Self::PREFIX)
            .suffix(Self::SUFFIX)
            .rand_bytes(Self::RAND_BYTES)
            .tempfile_in(&self.dir)?;

        file.write_all(script.as_bytes())?;
        if !script.ends_with('\n') {
            file.write_all(b"\n")?;
        }
        file.flush()?;

        let (handle, path) = file.keep().map_err(|e| e.error)?;
        // The write handle must be closed before the script can be exec'd.
        drop(handle);
        make_executable(&path)?;

        debug!(path = %path.display(), "script saved");
        Ok(path)
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashSet, fs};
    use tempfile::TempDir;

    fn setup() -> (ScriptStore, TempDir) {
        let tmp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = ScriptStore::new(tmp_dir.path());
        (store, tmp_dir)
    }

    #[test]
    fn test_persist_writes_content() {
        let (store, _tmp_dir) = setup();
        let path = store.persist("#!/bin/bash\necho hi").unwrap();

        assert!(path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "#!/bin/bash\necho hi\n");
    }

    #[test]
    fn test_persist_name_scheme() {
        let (store, tmp_dir) = setup();
        let path = store.persist("echo hi\n").unwrap();

        assert_eq!(path.parent(), Some(tmp_dir.path()));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("install_"));
        assert!(name.ends_with(".sh"));
    }

    #[test]
    fn test_persist_names_are_unique() {
        let (store, tmp_dir) = setup();
        let paths: HashSet<PathBuf> = (0..20).map(|_| store.persist("echo hi").unwrap()).collect();

        assert_eq!(paths.len(), 20);
        assert_eq!(fs::read_dir(tmp_dir.path()).unwrap().count(), 20);
    }

    #[cfg(unix)]
    #[test]
    fn test_persist_marks_executable() {
        use std::os::unix::fs::PermissionsExt;

        let (store, _tmp_dir) = setup();
        let path = store.persist("echo hi").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_persist_into_missing_dir() {
        let store = ScriptStore::new("/nonexistent/scripts");
        assert!(store.persist("echo hi").is_err());
    }
}
