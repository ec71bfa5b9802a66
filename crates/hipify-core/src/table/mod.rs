//! Rename table
//!
//! Immutable mapping from a context-qualified CUDA symbol to its HIP
//! replacement. Entries are grouped by [`SymbolClass`]; a lookup names the
//! [`LookupContext`] the symbol was found in, and the context decides which
//! classes may answer. The same spelling can therefore map differently as a
//! callee and as a macro body token.
//!
//! The table is built once and shared read-only (`Arc<RenameTable>`) by
//! every rewriter.

mod cuda;

use indexmap::IndexMap;
use serde::Serialize;

/// Kind of declaration a table entry renames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SymbolClass {
    Function,
    Type,
    EnumConstant,
    Macro,
    Variable,
    Header,
    /// Composite `receiver.axis` key of a coordinate builtin
    BuiltinMember,
}

/// Syntactic role of the symbol being looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupContext {
    /// Callee of a call expression
    Callee,
    /// Reference to an enumerator
    EnumConstant,
    /// Type name written in a declaration or `sizeof`
    TypeName,
    /// File name of an inclusion directive
    Header,
    /// `receiver.axis` member access on a coordinate builtin
    BuiltinMember,
    /// Bare identifier token (macro bodies and arguments, string literals)
    Token,
}

impl LookupContext {
    /// Symbol classes consulted, in order.
    pub fn classes(self) -> &'static [SymbolClass] {
        match self {
            LookupContext::Callee => &[SymbolClass::Function],
            LookupContext::EnumConstant => &[SymbolClass::EnumConstant],
            LookupContext::TypeName => &[SymbolClass::Type],
            LookupContext::Header => &[SymbolClass::Header],
            LookupContext::BuiltinMember => &[SymbolClass::BuiltinMember],
            LookupContext::Token => &[
                SymbolClass::Function,
                SymbolClass::Type,
                SymbolClass::EnumConstant,
                SymbolClass::Macro,
                SymbolClass::Variable,
            ],
        }
    }
}

/// CUDA to HIP rename table.
#[derive(Debug, Clone, Default)]
pub struct RenameTable {
    classes: IndexMap<SymbolClass, IndexMap<String, String>>,
}

impl RenameTable {
    /// The CUDA runtime to HIP table.
    pub fn cuda_to_hip() -> Self {
        let mut builder = RenameTableBuilder::new();
        for (class, entries) in cuda::ENTRIES {
            for (from, to) in entries.iter() {
                builder = builder.insert(*class, *from, *to);
            }
        }
        for group in ["thread", "block", "grid"] {
            for (kind, hip_kind) in [("Idx", "Idx"), ("Dim", "Dim")] {
                for axis in ["x", "y", "z"] {
                    let receiver = format!("{}{}", group, kind);
                    let replacement = format!("hip{}{}_{}", capitalize(group), hip_kind, axis);
                    builder = builder.insert(
                        SymbolClass::BuiltinMember,
                        format!("{}.{}", receiver, axis),
                        replacement,
                    );
                }
            }
        }
        builder.build()
    }

    /// Replacement for `key` in `context`, if the symbol is part of the
    /// target API.
    pub fn lookup(&self, context: LookupContext, key: &str) -> Option<&str> {
        context
            .classes()
            .iter()
            .filter_map(|class| self.classes.get(class))
            .find_map(|entries| entries.get(key))
            .map(String::as_str)
    }

    /// Every entry, grouped by class, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (SymbolClass, &str, &str)> {
        self.classes.iter().flat_map(|(class, entries)| {
            entries
                .iter()
                .map(move |(from, to)| (*class, from.as_str(), to.as_str()))
        })
    }

    pub fn len(&self) -> usize {
        self.classes.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds a [`RenameTable`]; later inserts of the same key win.
#[derive(Debug, Default)]
pub struct RenameTableBuilder {
    table: RenameTable,
}

impl RenameTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        mut self,
        class: SymbolClass,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.table
            .classes
            .entry(class)
            .or_default()
            .insert(from.into(), to.into());
        self
    }

    pub fn build(self) -> RenameTable {
        self.table
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
