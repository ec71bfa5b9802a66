//! Text edits and the per-file edit collector.
//!
//! Every rewriter produces [`TextEdit`]s against the one immutable source
//! buffer. The [`EditCollector`] accumulates them across both compilation
//! passes and, on [`commit`](EditCollector::commit), resolves them into a
//! sorted, pairwise non-overlapping set:
//!
//! 1. identical `(offset, length, text)` edits merge, keeping the first
//!    provenance;
//! 2. an edit lying inside a verbatim segment of a composite edit is folded
//!    into the composite's replacement text;
//! 3. any remaining overlap is an [`EditError::Conflict`].
//!
//! A zero-length insertion touching the start or end of another edit is not
//! an overlap. Insertions apply before a replacement at the same offset.

use std::fmt;

use hipify_ast::Span;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::EditError;

/// Syntactic context a rewrite was produced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteContext {
    Call,
    KernelLaunch,
    /// Synthetic parameter added to a launched kernel
    KernelParams,
    BuiltinMember,
    EnumConstantRef,
    EnumTypedVar,
    StructVar,
    StructPointerVar,
    ParamType,
    PointerParamType,
    SizeofType,
    StringLiteral,
    IncludeDirective,
    MacroDefine,
    MacroExpansionArg,
}

impl RewriteContext {
    pub fn as_str(self) -> &'static str {
        match self {
            RewriteContext::Call => "call",
            RewriteContext::KernelLaunch => "kernel launch",
            RewriteContext::KernelParams => "kernel parameters",
            RewriteContext::BuiltinMember => "builtin member",
            RewriteContext::EnumConstantRef => "enum constant",
            RewriteContext::EnumTypedVar => "enum-typed variable",
            RewriteContext::StructVar => "struct variable",
            RewriteContext::StructPointerVar => "struct pointer variable",
            RewriteContext::ParamType => "parameter type",
            RewriteContext::PointerParamType => "pointer parameter type",
            RewriteContext::SizeofType => "sizeof operand",
            RewriteContext::StringLiteral => "string literal",
            RewriteContext::IncludeDirective => "include directive",
            RewriteContext::MacroDefine => "macro definition",
            RewriteContext::MacroExpansionArg => "macro argument",
        }
    }
}

impl fmt::Display for RewriteContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which rewriter produced an edit, and for which symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub context: RewriteContext,
    /// Name the rewriter looked up
    pub symbol: String,
}

impl Provenance {
    pub fn new(context: RewriteContext, symbol: impl Into<String>) -> Self {
        Self {
            context,
            symbol: symbol.into(),
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`", self.context, self.symbol)
    }
}

/// A source range copied unchanged into a composite edit's replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerbatimSegment {
    /// Range of the original buffer
    pub source: Span,
    /// Where the copy starts in the replacement text
    pub output_offset: u32,
}

/// Replace `length` bytes at `offset` with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub offset: u32,
    pub length: u32,
    pub text: String,
    pub provenance: Provenance,
    /// Non-empty for composite edits
    pub segments: Vec<VerbatimSegment>,
}

impl TextEdit {
    pub fn replace(span: Span, text: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            offset: span.start,
            length: span.len(),
            text: text.into(),
            provenance,
            segments: Vec::new(),
        }
    }

    pub fn insert(offset: u32, text: impl Into<String>, provenance: Provenance) -> Self {
        Self::replace(Span::empty(offset), text, provenance)
    }

    /// A replacement that embeds verbatim copies of parts of `span`.
    pub fn composite(
        span: Span,
        text: impl Into<String>,
        segments: Vec<VerbatimSegment>,
        provenance: Provenance,
    ) -> Self {
        Self {
            segments,
            ..Self::replace(span, text, provenance)
        }
    }

    pub fn end(&self) -> u32 {
        self.offset + self.length
    }

    pub fn span(&self) -> Span {
        Span::new(self.offset, self.end())
    }

    pub fn is_insertion(&self) -> bool {
        self.length == 0
    }

    pub fn is_composite(&self) -> bool {
        !self.segments.is_empty()
    }

    fn key(&self) -> EditKey {
        (self.offset, self.length, self.text.clone())
    }

    fn sort_key(&self) -> (u32, u32) {
        (self.offset, self.length)
    }
}

type EditKey = (u32, u32, String);

/// Accumulates the candidate edits of one file.
#[derive(Debug, Default)]
pub struct EditCollector {
    edits: IndexMap<EditKey, TextEdit>,
    duplicates: usize,
}

impl EditCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edit; returns false when an identical edit was already present.
    pub fn push(&mut self, edit: TextEdit) -> bool {
        match self.edits.entry(edit.key()) {
            indexmap::map::Entry::Occupied(existing) => {
                trace!(
                    offset = edit.offset,
                    kept = %existing.get().provenance,
                    merged = %edit.provenance,
                    "merged duplicate edit"
                );
                self.duplicates += 1;
                false
            }
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(edit);
                true
            }
        }
    }

    pub fn extend(&mut self, edits: impl IntoIterator<Item = TextEdit>) {
        for edit in edits {
            self.push(edit);
        }
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Identical edits merged so far.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Resolve the collected edits against `source`.
    pub fn commit(self, source: &str) -> Result<CommittedEdits, EditError> {
        let edits: Vec<TextEdit> = self.edits.into_values().collect();
        for edit in &edits {
            validate(edit, source)?;
        }

        let (mut edits, folded) = fold_composites(edits, source)?;
        edits.sort_by_key(TextEdit::sort_key);
        check_overlaps(&edits)?;

        debug!(
            applied = edits.len(),
            folded = folded.len(),
            duplicates = self.duplicates,
            "committed edits"
        );
        Ok(CommittedEdits {
            edits,
            folded,
            duplicates: self.duplicates,
        })
    }
}

/// Sorted, pairwise non-overlapping edits ready to splice.
#[derive(Debug, Clone, Default)]
pub struct CommittedEdits {
    pub edits: Vec<TextEdit>,
    /// Edits absorbed into a composite edit's replacement
    pub folded: Vec<TextEdit>,
    pub duplicates: usize,
}

impl CommittedEdits {
    /// Splice the edits into `source` in one linear pass.
    pub fn apply(&self, source: &str) -> String {
        splice(source, Span::new(0, source.len() as u32), &self.edits)
    }
}

fn validate(edit: &TextEdit, source: &str) -> Result<(), EditError> {
    let buffer_len = source.len() as u32;
    if edit.end() > buffer_len {
        return Err(EditError::OutOfBounds {
            offset: edit.offset,
            length: edit.length,
            buffer_len,
            provenance: edit.provenance.clone(),
        });
    }
    for offset in [edit.offset, edit.end()] {
        if !source.is_char_boundary(offset as usize) {
            return Err(EditError::NotCharBoundary {
                offset,
                provenance: edit.provenance.clone(),
            });
        }
    }
    Ok(())
}

/// Fold edits lying inside verbatim segments into their composite,
/// innermost composite first. Returns the remaining edits and the folded ones.
fn fold_composites(
    edits: Vec<TextEdit>,
    source: &str,
) -> Result<(Vec<TextEdit>, Vec<TextEdit>), EditError> {
    let mut slots: Vec<Option<TextEdit>> = edits.into_iter().map(Some).collect();
    let mut composites: Vec<usize> = slots
        .iter()
        .enumerate()
        .filter(|(_, e)| e.as_ref().is_some_and(TextEdit::is_composite))
        .map(|(i, _)| i)
        .collect();
    composites.sort_by_key(|&i| slots[i].as_ref().map_or(0, |e| e.length));

    let mut folded = Vec::new();
    for index in composites {
        let Some(mut composite) = slots[index].take() else {
            continue;
        };

        let mut inner: Vec<Vec<TextEdit>> = vec![Vec::new(); composite.segments.len()];
        for slot in slots.iter_mut() {
            let Some(segment) = slot.as_ref().and_then(|edit| {
                composite
                    .segments
                    .iter()
                    .position(|s| s.source.contains(&edit.span()))
            }) else {
                continue;
            };
            if let Some(edit) = slot.take() {
                inner[segment].push(edit);
            }
        }

        if inner.iter().any(|edits| !edits.is_empty()) {
            rebuild_composite(&mut composite, &mut inner, source)?;
            for edit in inner.into_iter().flatten() {
                debug!(
                    offset = edit.offset,
                    edit = %edit.provenance,
                    into = %composite.provenance,
                    "folded edit into composite"
                );
                folded.push(edit);
            }
        }
        slots[index] = Some(composite);
    }

    Ok((slots.into_iter().flatten().collect(), folded))
}

/// Re-render a composite's replacement with `inner` edits applied inside
/// the matching verbatim segments.
fn rebuild_composite(
    composite: &mut TextEdit,
    inner: &mut [Vec<TextEdit>],
    source: &str,
) -> Result<(), EditError> {
    let mut text = String::with_capacity(composite.text.len());
    let mut cursor = 0usize;
    for (segment, edits) in composite.segments.iter_mut().zip(inner.iter_mut()) {
        let start = segment.output_offset as usize;
        text.push_str(&composite.text[cursor..start]);
        cursor = start + segment.source.len() as usize;

        edits.sort_by_key(TextEdit::sort_key);
        check_overlaps(edits)?;
        segment.output_offset = text.len() as u32;
        text.push_str(&splice(source, segment.source, edits));
    }
    text.push_str(&composite.text[cursor..]);
    composite.text = text;
    Ok(())
}

/// Verify sorted edits are pairwise non-overlapping.
fn check_overlaps(edits: &[TextEdit]) -> Result<(), EditError> {
    let mut reach: Option<&TextEdit> = None;
    for (i, edit) in edits.iter().enumerate() {
        if let Some(previous) = i.checked_sub(1).map(|p| &edits[p]) {
            if previous.is_insertion() && edit.is_insertion() && previous.offset == edit.offset {
                return Err(conflict(previous, edit));
            }
        }
        if let Some(covering) = reach {
            if edit.offset < covering.end() {
                return Err(conflict(covering, edit));
            }
        }
        if !edit.is_insertion() && reach.map_or(true, |r| edit.end() > r.end()) {
            reach = Some(edit);
        }
    }
    Ok(())
}

fn conflict(first: &TextEdit, second: &TextEdit) -> EditError {
    EditError::Conflict {
        offset: second.offset,
        first: first.provenance.clone(),
        second: second.provenance.clone(),
    }
}

/// `source[range]` with sorted, non-overlapping `edits` applied.
fn splice(source: &str, range: Span, edits: &[TextEdit]) -> String {
    let mut output = String::with_capacity(range.len() as usize);
    let mut cursor = range.start as usize;
    for edit in edits {
        output.push_str(&source[cursor..edit.offset as usize]);
        output.push_str(&edit.text);
        cursor = edit.end() as usize;
    }
    output.push_str(&source[cursor..range.end as usize]);
    output
}
