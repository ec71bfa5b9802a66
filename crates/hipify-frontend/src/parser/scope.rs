//! Lexical scopes of main-file declarations.

use hipify_ast::{DeclKind, FunctionId, TypeInfo};
use std::collections::HashMap;
use std::rc::Rc;

/// What a name declared in the main file stands for.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Symbol {
    /// Overload set of non-template functions
    Functions(Vec<FunctionId>),
    FunctionTemplate,
    /// Variable, parameter or enumerator
    Value(DeclKind),
    Type(TypeInfo),
}

/// Stack of scopes; the bottom frame is namespace scope.
///
/// Namespaces do not open a frame, so `ns::f` and `f` resolve alike.
#[derive(Debug)]
pub(crate) struct Scopes {
    frames: Vec<HashMap<Rc<str>, Symbol>>,
}

impl Scopes {
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Drop frames opened after `depth` was taken.
    pub fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth.max(1));
    }

    /// Declare `name` in the innermost frame, returning what it replaced.
    ///
    /// Function declarations join an overload set already in the frame.
    pub fn declare(&mut self, name: Rc<str>, symbol: Symbol) -> Option<Symbol> {
        let frame = self.innermost();
        if let (Some(Symbol::Functions(ids)), Symbol::Functions(new)) =
            (frame.get_mut(&name), &symbol)
        {
            ids.extend(new.iter().copied());
            return None;
        }
        frame.insert(name, symbol)
    }

    /// Undo a [`Scopes::declare`] in the innermost frame.
    pub fn restore(&mut self, name: Rc<str>, previous: Option<Symbol>) {
        let frame = self.innermost();
        match previous {
            Some(symbol) => {
                frame.insert(name, symbol);
            }
            None => {
                frame.remove(&name);
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    fn innermost(&mut self) -> &mut HashMap<Rc<str>, Symbol> {
        if self.frames.is_empty() {
            self.frames.push(HashMap::new());
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hipify_ast::{DeclOrigin, TypeKind};

    #[test]
    fn test_inner_scope_shadows_and_unwinds() {
        let mut scopes = Scopes::new();
        scopes.declare(
            "n".into(),
            Symbol::Type(TypeInfo::plain(TypeKind::Record, DeclOrigin::MainFile)),
        );
        scopes.push();
        scopes.declare("n".into(), Symbol::Value(DeclKind::Variable));
        assert_eq!(scopes.lookup("n"), Some(&Symbol::Value(DeclKind::Variable)));
        scopes.pop();
        assert!(matches!(scopes.lookup("n"), Some(Symbol::Type(_))));
    }

    #[test]
    fn test_overloads_accumulate() {
        let mut scopes = Scopes::new();
        scopes.declare("f".into(), Symbol::Functions(vec![FunctionId(0)]));
        scopes.declare("f".into(), Symbol::Functions(vec![FunctionId(3)]));
        assert_eq!(
            scopes.lookup("f"),
            Some(&Symbol::Functions(vec![FunctionId(0), FunctionId(3)]))
        );
    }

    #[test]
    fn test_truncate_keeps_namespace_scope() {
        let mut scopes = Scopes::new();
        scopes.declare("g".into(), Symbol::FunctionTemplate);
        scopes.push();
        scopes.push();
        scopes.truncate(0);
        assert_eq!(scopes.depth(), 1);
        assert_eq!(scopes.lookup("g"), Some(&Symbol::FunctionTemplate));
    }

    #[test]
    fn test_restore_undoes_declaration() {
        let mut scopes = Scopes::new();
        let previous = scopes.declare(
            "T".into(),
            Symbol::Type(TypeInfo::plain(TypeKind::TemplateParam, DeclOrigin::MainFile)),
        );
        scopes.restore("T".into(), previous);
        assert!(scopes.lookup("T").is_none());
    }
}
