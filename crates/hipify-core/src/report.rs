//! Per-file run report.
//!
//! Serializable summary of what a run did to each input: every committed
//! edit with its position and provenance, every vendor symbol left alone,
//! and the error for inputs that failed.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::dispatch::SkippedMatch;
use crate::driver::Transformation;
use crate::edit::{RewriteContext, TextEdit};
use crate::output::{FilePositions, SourceText};

/// One committed edit, positioned in file bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditRecord {
    pub line: u32,
    pub column: u32,
    pub offset: u32,
    pub length: u32,
    pub replacement: String,
    pub context: RewriteContext,
    pub symbol: String,
}

impl EditRecord {
    fn new(edit: &TextEdit, positions: &FilePositions<'_>) -> Self {
        let start = positions.locate(edit.offset);
        let end = positions.locate(edit.offset + edit.length);
        Self {
            line: start.line,
            column: start.column,
            offset: start.offset,
            length: end.offset - start.offset,
            replacement: edit.text.clone(),
            context: edit.provenance.context,
            symbol: edit.provenance.symbol.clone(),
        }
    }
}

/// A vendor symbol with no replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipRecord {
    pub line: u32,
    pub column: u32,
    pub context: RewriteContext,
    pub name: String,
}

impl SkipRecord {
    fn new(skip: &SkippedMatch, positions: &FilePositions<'_>) -> Self {
        let at = positions.locate(skip.offset);
        Self {
            line: at.line,
            column: at.column,
            context: skip.context,
            name: skip.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Rewritten,
    /// Nothing to rewrite; the output is a copy of the input
    Unchanged,
    /// Nothing was written
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub status: FileStatus,
    pub applied: Vec<EditRecord>,
    pub folded: usize,
    pub skipped: Vec<SkipRecord>,
    pub duplicates: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    /// Report a transformation of `source` written to `output`.
    pub fn success(
        input: &Path,
        output: &Path,
        source: &SourceText,
        transformation: &Transformation,
    ) -> Self {
        let positions = source.positions();
        let status = if transformation.is_unchanged() {
            FileStatus::Unchanged
        } else {
            FileStatus::Rewritten
        };
        Self {
            input: input.to_path_buf(),
            output: Some(output.to_path_buf()),
            status,
            applied: transformation
                .applied
                .iter()
                .map(|edit| EditRecord::new(edit, &positions))
                .collect(),
            folded: transformation.folded.len(),
            skipped: transformation
                .skipped
                .iter()
                .map(|skip| SkipRecord::new(skip, &positions))
                .collect(),
            duplicates: transformation.duplicates,
            error: None,
        }
    }

    pub fn failure(input: &Path, error: impl ToString) -> Self {
        Self {
            input: input.to_path_buf(),
            output: None,
            status: FileStatus::Failed,
            applied: Vec::new(),
            folded: 0,
            skipped: Vec::new(),
            duplicates: 0,
            error: Some(error.to_string()),
        }
    }
}

/// Reports of one invocation, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub files: Vec<FileReport>,
}

impl RunReport {
    pub fn push(&mut self, report: FileReport) {
        self.files.push(report);
    }

    pub fn failures(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.status == FileStatus::Failed)
            .count()
    }

    pub fn has_failures(&self) -> bool {
        self.failures() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::Provenance;
    use hipify_ast::Span;

    fn transformation() -> Transformation {
        Transformation {
            output: "int a;\nhipFree(p);".to_string(),
            applied: vec![TextEdit::replace(
                Span::new(7, 15),
                "hipFree",
                Provenance::new(RewriteContext::Call, "cudaFree"),
            )],
            folded: Vec::new(),
            skipped: vec![SkippedMatch {
                context: RewriteContext::Call,
                name: "__syncthreads".to_string(),
                offset: 0,
            }],
            duplicates: 1,
        }
    }

    #[test]
    fn test_success_positions() {
        let report = FileReport::success(
            Path::new("a.cu"),
            Path::new("a.hip"),
            &SourceText::decode(b"int a;\ncudaFree(p);".to_vec()),
            &transformation(),
        );
        assert_eq!(report.status, FileStatus::Rewritten);
        assert_eq!(report.applied[0].line, 2);
        assert_eq!(report.applied[0].column, 1);
        assert_eq!(report.applied[0].length, 8);
        assert_eq!(report.skipped[0].line, 1);
    }

    #[test]
    fn test_latin1_positions_in_file_bytes() {
        let source = SourceText::decode(b"int \xe9;\ncudaFree(p);".to_vec());
        let transformation = Transformation {
            output: "int \u{e9};\nhipFree(p);".to_string(),
            applied: vec![TextEdit::replace(
                Span::new(8, 16),
                "hipFree",
                Provenance::new(RewriteContext::Call, "cudaFree"),
            )],
            folded: Vec::new(),
            skipped: Vec::new(),
            duplicates: 0,
        };
        let report = FileReport::success(
            Path::new("a.cu"),
            Path::new("a.hip"),
            &source,
            &transformation,
        );
        assert_eq!(report.applied[0].line, 2);
        assert_eq!(report.applied[0].column, 1);
        assert_eq!(report.applied[0].offset, 7);
        assert_eq!(report.applied[0].length, 8);
    }

    #[test]
    fn test_json_shape() {
        let report = FileReport::success(
            Path::new("a.cu"),
            Path::new("a.hip"),
            &SourceText::decode(b"int a;\ncudaFree(p);".to_vec()),
            &transformation(),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "rewritten");
        assert_eq!(json["applied"][0]["context"], "call");
        assert_eq!(json["applied"][0]["symbol"], "cudaFree");
        assert_eq!(json["skipped"][0]["name"], "__syncthreads");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failures_counted() {
        let mut run = RunReport::default();
        run.push(FileReport::failure(Path::new("a.cu"), "host pass: 1:1: boom"));
        assert!(run.has_failures());
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["files"][0]["status"], "failed");
        assert_eq!(json["files"][0]["error"], "host pass: 1:1: boom");
    }
}
