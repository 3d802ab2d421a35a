//! Filesystem utilities.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use glob::glob;
use tempfile::NamedTempFile;

use crate::core::errors::{IrError, Result};

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.as_os_str().is_empty() && !path.exists() {
        fs::create_dir_all(path).map_err(|e| IrError::io(path, e))?;
    }
    Ok(())
}

/// Read a file to string.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| IrError::io(path, e))
}

/// Write `path` all at once: the content goes to a temporary file next to
/// the destination which replaces it only after `write` succeeded. Parent
/// directories are created as needed.
///
/// On any error the destination is left untouched and the temporary file is
/// removed.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    ensure_dir(&parent)?;

    let temp = NamedTempFile::new_in(&parent).map_err(|e| IrError::io(&parent, e))?;
    {
        let mut out = BufWriter::new(temp.as_file());
        write(&mut out).map_err(|e| IrError::io(path, e))?;
        out.flush().map_err(|e| IrError::io(path, e))?;
    }

    temp.persist(path).map_err(|e| IrError::io(path, e.error))?;
    Ok(())
}

/// Expand glob patterns relative to a base directory.
///
/// Patterns that match nothing and name an existing file are kept as-is, so
/// plain paths work unchanged.
pub fn glob_files(base: &Path, patterns: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut results = Vec::new();

    for pattern in patterns {
        let full_pattern = base.join(pattern);
        let pattern_str = full_pattern.to_string_lossy();

        let before = results.len();
        for entry in glob(&pattern_str)
            .with_context(|| format!("invalid glob pattern: {}", pattern))?
        {
            match entry {
                Ok(path) => {
                    if path.is_file() {
                        results.push(path);
                    }
                }
                Err(e) => {
                    tracing::warn!("glob error: {}", e);
                }
            }
        }

        if results.len() == before {
            anyhow::bail!("no input matches `{}`", pattern);
        }
    }

    results.dedup();
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_glob_files() {
        let tmp = TempDir::new().unwrap();
        let obj = tmp.path().join("obj");
        fs::create_dir_all(&obj).unwrap();
        fs::write(obj.join("a.wixobj"), "<a/>").unwrap();
        fs::write(obj.join("b.wixobj"), "<b/>").unwrap();
        fs::write(obj.join("readme.txt"), "readme").unwrap();

        let files = glob_files(tmp.path(), &["obj/*.wixobj".to_string()]).unwrap();
        assert_eq!(files.len(), 2);

        assert!(glob_files(tmp.path(), &["obj/*.wxl".to_string()]).is_err());
    }

    #[test]
    fn test_write_atomic_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("deep/er/out.txt");

        write_atomic(&path, |w| w.write_all(b"content")).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "content");
    }

    #[test]
    fn test_write_atomic_leaves_nothing_on_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.txt");

        let result = write_atomic(&path, |w| {
            w.write_all(b"partial")?;
            Err(std::io::Error::other("boom"))
        });
        assert!(result.is_err());
        assert!(!path.exists());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
