//! Engine errors

use std::path::PathBuf;

use thiserror::Error;

use crate::driver::CompilationPass;
use crate::edit::Provenance;

/// Engine result type
pub type Result<T> = std::result::Result<T, EngineError>;

/// A file could not be transformed.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{pass} pass: {line}:{column}: {message}")]
    Parse {
        pass: CompilationPass,
        message: String,
        line: u32,
        column: u32,
    },

    /// The front end rejected the pass's compiler arguments
    #[error("{pass} pass: {message}")]
    Invocation {
        pass: CompilationPass,
        message: String,
    },

    #[error(transparent)]
    Edit(#[from] EditError),
}

/// The collected edits cannot be committed to the buffer.
#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    #[error("conflicting edits at offset {offset}: {first} and {second}")]
    Conflict {
        offset: u32,
        first: Provenance,
        second: Provenance,
    },

    #[error("edit {offset}+{length} from {provenance} lies outside a buffer of {buffer_len} bytes")]
    OutOfBounds {
        offset: u32,
        length: u32,
        buffer_len: u32,
        provenance: Provenance,
    },

    #[error("edit at offset {offset} from {provenance} splits a character")]
    NotCharBoundary { offset: u32, provenance: Provenance },
}

/// Reading the input or writing the result failed.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {path}: {character:?} has no Latin-1 encoding")]
    Unencodable { path: PathBuf, character: char },
}

/// No output location can be derived for an input.
#[derive(Debug, Error, PartialEq)]
pub enum OutputPlanError {
    #[error("input {0} is not a .cu file; pass an explicit output path")]
    NotCudaSource(PathBuf),

    #[error("an explicit output path needs exactly one source, got {0}")]
    OutputWithManySources(usize),
}
