use std::fs::create_dir_all;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::BufRead;
use std::io::BufReader;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use tracing::error;

use crate::Result;
use crate::StorageError;

pub fn create_parent_dir_if_not_exist(path: &Path) -> Result<()> {
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            if let Err(e) = create_dir_all(parent_dir) {
                error!("Failed to create directory {:?}: {:?}", parent_dir, e);
                return Err(StorageError::PathError {
                    path: parent_dir.to_path_buf(),
                    source: e,
                }
                .into());
            }
        }
    }
    Ok(())
}

pub fn open_file_for_append(path: PathBuf) -> Result<File> {
    create_parent_dir_if_not_exist(&path)?;
    let log_file = match OpenOptions::new().append(true).create(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            return Err(StorageError::PathError { path, source: e }.into());
        }
    };
    Ok(log_file)
}

/// Replaces `path` with `buf` through a sibling temp file and a rename, so
/// readers see either the old or the new content.
pub(crate) fn write_file_atomically(
    path: &Path,
    buf: &[u8],
) -> Result<()> {
    create_parent_dir_if_not_exist(path)?;

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let io_result = (|| -> std::io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(buf)?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, path)
    })();

    io_result.map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        StorageError::PathError {
            path: path.to_path_buf(),
            source: e,
        }
        .into()
    })
}

/// First line of `path` without its terminator; `None` when the file does not exist.
pub(crate) fn read_first_line(path: &Path) -> Result<Option<String>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StorageError::PathError {
                path: path.to_path_buf(),
                source: e,
            }
            .into())
        }
    };

    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|e| StorageError::PathError {
            path: path.to_path_buf(),
            source: e,
        })?;

    let trimmed_len = line.trim_end_matches(&['\r', '\n'][..]).len();
    line.truncate(trimmed_len);
    Ok(Some(line))
}
