//! On-disk file pair for a single time-series log: `<base>.pts.hdr` and
//! `<base>.pts.data` inside a container directory.
//!
//! The repository owns file lifecycle only — creation, header validation
//! and growth, appending write handle, and fresh sequential readers. It has
//! no opinion about timestamp encoding, merging, or what the caller writes;
//! that is [`crate::codec`] and [`crate::writer`]'s job.

#[cfg(test)]
mod tests;

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::{self, CodecError};
use crate::row::{Schema, SchemaError};

/// File extension for the header file.
const HEADER_EXT: &str = "pts.hdr";
/// File extension for the data file.
const DATA_EXT: &str = "pts.data";

/// Errors raised while opening or operating on a repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Underlying file system error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A header or data line failed to parse.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A header or data line failed schema validation.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The data file exists but the header does not.
    #[error("data file present without a header at {0}")]
    DataWithoutHeader(PathBuf),

    /// The on-disk header's version exceeds what this implementation supports.
    #[error("unsupported header version {found} (supports up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

fn header_path(container: &Path, base: &str) -> PathBuf {
    container.join(format!("{base}.{HEADER_EXT}"))
}

fn data_path(container: &Path, base: &str) -> PathBuf {
    container.join(format!("{base}.{DATA_EXT}"))
}

/// Returns true iff both the header and data file exist for `base` inside `container`.
pub fn exists(container: &Path, base: &str) -> bool {
    header_path(container, base).is_file() && data_path(container, base).is_file()
}

/// Owns the header/data file pair for one time-series log.
#[derive(Debug)]
pub struct Repository {
    header_path: PathBuf,
    data_path: PathBuf,
    data_file: File,
    schema: Schema,
}

impl Repository {
    /// Opens (creating as needed) the repository for `base` inside `container`.
    ///
    /// `schema` is the caller's desired column list. If the on-disk header
    /// has fewer columns that are a prefix of `schema`, the header is
    /// rewritten to match. If the header disagrees with `schema`'s prefix,
    /// or has strictly more columns, opening fails.
    pub fn open(container: &Path, base: &str, schema: &Schema) -> Result<Self, RepositoryError> {
        fs::create_dir_all(container)?;
        let header_path = header_path(container, base);
        let data_path = data_path(container, base);

        let header_exists = header_path.is_file();
        let data_exists = data_path.is_file();

        if data_exists && !header_exists {
            return Err(RepositoryError::DataWithoutHeader(data_path));
        }

        let resolved_schema = if header_exists {
            let on_disk = read_header(&header_path)?;
            if on_disk.len() > schema.len() {
                return Err(RepositoryError::Schema(SchemaError::HeaderLongerThanSchema {
                    on_disk_len: on_disk.len(),
                    schema_len: schema.len(),
                }));
            }
            schema.validate_growth_from(&on_disk)?;
            if on_disk.len() < schema.len() {
                info!(
                    path = %header_path.display(),
                    from = on_disk.len(),
                    to = schema.len(),
                    "repository header grown"
                );
                write_header(&header_path, schema)?;
            }
            schema.clone()
        } else {
            write_header(&header_path, schema)?;
            info!(path = %header_path.display(), columns = schema.len(), "repository header created");
            schema.clone()
        };

        let mut data_file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&data_path)?;

        if data_file.metadata()?.len() == 0 {
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0);
            writeln!(data_file, "# opened {millis}")?;
            data_file.flush()?;
            debug!(path = %data_path.display(), millis, "repository data file created");
        }

        info!(path = %data_path.display(), "repository opened");

        Ok(Self {
            header_path,
            data_path,
            data_file,
            schema: resolved_schema,
        })
    }

    /// Returns the current (possibly just-grown) schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Path of the header file.
    pub fn header_path(&self) -> &Path {
        &self.header_path
    }

    /// Path of the data file.
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Appends a single already-encoded record line (without trailing newline).
    pub fn append_line(&mut self, line: &str) -> Result<(), RepositoryError> {
        writeln!(self.data_file, "{line}")?;
        Ok(())
    }

    /// Flushes buffered writes to the OS.
    pub fn flush(&mut self) -> Result<(), RepositoryError> {
        self.data_file.flush()?;
        Ok(())
    }

    /// Opens a fresh sequential reader over the data file from its start.
    pub fn reader(&self) -> Result<RepositoryReader, RepositoryError> {
        let file = File::open(&self.data_path)?;
        Ok(RepositoryReader {
            lines: BufReader::new(file).lines(),
        })
    }

    /// Current size in bytes of the data file, as observed on disk.
    pub fn data_file_len(&self) -> Result<u64, RepositoryError> {
        Ok(self.data_file.metadata()?.len())
    }
}

/// Sequential line reader over a repository's data file.
pub struct RepositoryReader {
    lines: io::Lines<BufReader<File>>,
}

impl Iterator for RepositoryReader {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines.next()
    }
}

fn write_header(path: &Path, schema: &Schema) -> Result<(), RepositoryError> {
    let columns: Vec<String> = schema.columns().to_vec();
    let text = codec::encode_header(&columns);
    fs::write(path, text)?;
    Ok(())
}

fn read_header(path: &Path) -> Result<Schema, RepositoryError> {
    let text = fs::read_to_string(path)?;
    let mut lines = text.lines();
    let version_line = lines.next().unwrap_or("");
    let columns_line = lines.next().unwrap_or("");
    let (version, columns) = codec::decode_header(version_line, columns_line)?;
    if version > codec::CURRENT_VERSION {
        warn!(found = version, supported = codec::CURRENT_VERSION, "unsupported header version");
        return Err(RepositoryError::UnsupportedVersion {
            found: version,
            supported: codec::CURRENT_VERSION,
        });
    }
    Ok(Schema::new(columns)?)
}
