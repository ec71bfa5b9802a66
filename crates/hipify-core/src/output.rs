//! Output placement and persistence.
//!
//! Every write goes through a temporary file in the destination directory
//! that is synced and renamed over the target, so a failed run never leaves
//! a half-written file behind. In-place runs keep the untouched input in a
//! `.prehip` backup and always read from it once it exists, which makes
//! repeated runs start from the same source.
//!
//! Sources that are not valid UTF-8 are read as Latin-1, one char per byte,
//! and written back the same way, so bytes outside rewritten spans survive
//! unchanged.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{OutputPlanError, PersistError};

/// Suffix of the in-place backup.
pub const BACKUP_SUFFIX: &str = ".prehip";

/// Where one input is read from and written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPlan {
    pub input: PathBuf,
    /// The backup on repeated in-place runs, the input otherwise
    pub read_from: PathBuf,
    pub destination: PathBuf,
    /// Written before the destination when it does not exist yet
    pub backup: Option<PathBuf>,
}

/// Decide where `input` goes.
///
/// An explicit `output` wins over `in_place`. Without either, `x.cu` is
/// written to `x.hip`.
pub fn plan_output(
    input: &Path,
    output: Option<&Path>,
    in_place: bool,
) -> Result<OutputPlan, OutputPlanError> {
    if let Some(output) = output {
        return Ok(OutputPlan {
            input: input.to_path_buf(),
            read_from: input.to_path_buf(),
            destination: output.to_path_buf(),
            backup: None,
        });
    }

    if in_place {
        let backup = backup_path(input);
        let read_from = if backup.exists() {
            backup.clone()
        } else {
            input.to_path_buf()
        };
        return Ok(OutputPlan {
            input: input.to_path_buf(),
            read_from,
            destination: input.to_path_buf(),
            backup: Some(backup),
        });
    }

    if input.extension().is_some_and(|ext| ext == "cu") {
        return Ok(OutputPlan {
            input: input.to_path_buf(),
            read_from: input.to_path_buf(),
            destination: input.with_extension("hip"),
            backup: None,
        });
    }
    Err(OutputPlanError::NotCudaSource(input.to_path_buf()))
}

/// An explicit output path only makes sense for a single source.
pub fn validate_explicit_output(
    sources: usize,
    output: Option<&Path>,
) -> Result<(), OutputPlanError> {
    match output {
        Some(_) if sources != 1 => Err(OutputPlanError::OutputWithManySources(sources)),
        _ => Ok(()),
    }
}

/// `<input>.prehip`
pub fn backup_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// How a source file's bytes map to the text the engine sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceEncoding {
    Utf8,
    /// Each byte decoded as the char of the same value
    Latin1,
}

/// A source file decoded for rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    pub text: String,
    pub encoding: SourceEncoding,
}

impl SourceText {
    /// Decode as UTF-8, falling back to Latin-1.
    pub fn decode(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self {
                text,
                encoding: SourceEncoding::Utf8,
            },
            Err(err) => Self {
                text: err.into_bytes().into_iter().map(char::from).collect(),
                encoding: SourceEncoding::Latin1,
            },
        }
    }

    /// Encode `text` the way this source was decoded.
    ///
    /// Fails with the first char Latin-1 cannot represent.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, char> {
        match self.encoding {
            SourceEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            SourceEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(c).map_err(|_| c))
                .collect(),
        }
    }

    pub fn positions(&self) -> FilePositions<'_> {
        FilePositions::new(self)
    }
}

/// Where a text offset lands in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilePosition {
    pub line: u32,
    /// 1-based, in file bytes
    pub column: u32,
    pub offset: u32,
}

/// Maps offsets into [`SourceText::text`] back to file bytes.
#[derive(Debug, Clone)]
pub struct FilePositions<'a> {
    source: &'a SourceText,
    /// Text and file offset of each line start
    line_starts: Vec<(u32, u32)>,
}

impl<'a> FilePositions<'a> {
    fn new(source: &'a SourceText) -> Self {
        let mut line_starts = vec![(0, 0)];
        let mut file_offset = 0u32;
        for (i, c) in source.text.char_indices() {
            file_offset += match source.encoding {
                SourceEncoding::Utf8 => c.len_utf8() as u32,
                SourceEncoding::Latin1 => 1,
            };
            if c == '\n' {
                line_starts.push(((i + 1) as u32, file_offset));
            }
        }
        Self {
            source,
            line_starts,
        }
    }

    /// Offsets past the end clamp to the end.
    pub fn locate(&self, offset: u32) -> FilePosition {
        let offset = offset.min(self.source.text.len() as u32);
        let line_idx = self
            .line_starts
            .partition_point(|&(start, _)| start <= offset)
            .max(1)
            - 1;
        let (text_start, file_start) = self.line_starts[line_idx];
        let within = match self.source.encoding {
            SourceEncoding::Utf8 => offset - text_start,
            SourceEncoding::Latin1 => self
                .source
                .text
                .get(text_start as usize..offset as usize)
                .map_or(0, |line| line.chars().count() as u32),
        };
        FilePosition {
            line: line_idx as u32 + 1,
            column: within + 1,
            offset: file_start + within,
        }
    }
}

pub fn read_source(path: &Path) -> Result<SourceText, PersistError> {
    let bytes = fs::read(path).map_err(|source| PersistError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let source = SourceText::decode(bytes);
    if source.encoding == SourceEncoding::Latin1 {
        warn!(path = %path.display(), "source is not valid UTF-8, reading it as Latin-1");
    }
    Ok(source)
}

/// Write the backup (if planned and missing), then the transformed text in
/// the original's encoding.
pub fn persist(
    plan: &OutputPlan,
    original: &SourceText,
    transformed: &str,
) -> Result<(), PersistError> {
    let encode = |text: &str| {
        original
            .encode(text)
            .map_err(|character| PersistError::Unencodable {
                path: plan.destination.clone(),
                character,
            })
    };
    let output = encode(transformed)?;

    if let Some(backup) = &plan.backup {
        if backup.exists() {
            debug!(backup = %backup.display(), "backup already present");
        } else {
            write_atomic(backup, &encode(&original.text)?)?;
            info!(backup = %backup.display(), "saved original");
        }
    }
    write_atomic(&plan.destination, &output)?;
    debug!(destination = %plan.destination.display(), bytes = output.len(), "output written");
    Ok(())
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PersistError> {
    let write_err = |source| PersistError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(contents).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}
