//! Ancestor tracking for the pure call annotator.
//!
//! SWC nodes carry no parent links, so the visitor records one [Frame] per
//! structurally relevant node on the way down. A [Cursor] is a borrowed view
//! over that stack: its node is the last frame and its parent is the stack
//! one frame shorter.

/// The kinds of nodes the classifiers care about.
///
/// Everything that is not one of the specific kinds is either a
/// [NodeKind::Statement] or a plain [NodeKind::Expr].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// `Module` or `Script`.
    Program,
    /// Any statement, block or module declaration without a more specific kind.
    Statement,
    /// `var`/`let`/`const`/`using` declarations.
    VarDecl,
    /// `export default ...`
    ExportDefault,
    /// A function declaration is a statement and a function at once.
    FnDecl,
    /// Function expressions, arrows, methods, accessors and constructors.
    Function,
    Call,
    New,
    Assign,
    Expr,
}

impl NodeKind {
    pub fn is_statement(self) -> bool {
        match self {
            NodeKind::Statement
            | NodeKind::VarDecl
            | NodeKind::ExportDefault
            | NodeKind::FnDecl => true,
            NodeKind::Program
            | NodeKind::Function
            | NodeKind::Call
            | NodeKind::New
            | NodeKind::Assign
            | NodeKind::Expr => false,
        }
    }

    pub fn is_function(self) -> bool {
        match self {
            NodeKind::FnDecl | NodeKind::Function => true,
            NodeKind::Program
            | NodeKind::Statement
            | NodeKind::VarDecl
            | NodeKind::ExportDefault
            | NodeKind::Call
            | NodeKind::New
            | NodeKind::Assign
            | NodeKind::Expr => false,
        }
    }

    /// Call and `new` expressions, the only nodes with a callee slot.
    pub fn is_callable(self) -> bool {
        match self {
            NodeKind::Call | NodeKind::New => true,
            NodeKind::Program
            | NodeKind::Statement
            | NodeKind::VarDecl
            | NodeKind::ExportDefault
            | NodeKind::FnDecl
            | NodeKind::Function
            | NodeKind::Assign
            | NodeKind::Expr => false,
        }
    }
}

/// The slot a node occupies inside its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Slot {
    /// The function being invoked by a call or `new` expression.
    Callee,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub kind: NodeKind,
    pub slot: Slot,
}

impl Frame {
    pub fn new(kind: NodeKind, slot: Slot) -> Self {
        Frame { kind, slot }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    node: Frame,
    ancestors: &'a [Frame],
}

impl<'a> Cursor<'a> {
    /// Returns a cursor on the last frame of `path`, or `None` for an empty path.
    pub fn from_path(path: &'a [Frame]) -> Option<Self> {
        let (node, ancestors) = path.split_last()?;
        Some(Cursor {
            node: *node,
            ancestors,
        })
    }

    pub fn kind(self) -> NodeKind {
        self.node.kind
    }

    pub fn slot(self) -> Slot {
        self.node.slot
    }

    pub fn parent(self) -> Option<Cursor<'a>> {
        Cursor::from_path(self.ancestors)
    }

    pub fn ancestors(self) -> impl Iterator<Item = Cursor<'a>> {
        std::iter::successors(self.parent(), |cursor| cursor.parent())
    }

    /// Nearest strict ancestor satisfying `pred`.
    pub fn find_ancestor(self, pred: impl Fn(Cursor<'a>) -> bool) -> Option<Cursor<'a>> {
        self.ancestors().find(|ancestor| pred(*ancestor))
    }

    /// Walks up from the parent. Each ancestor is first tested with `matches`
    /// and then with `stop`, so a boundary that matches still counts as a match.
    ///
    /// Panics when the root is passed without reaching a boundary; every
    /// visited expression lives inside a statement, so that means the
    /// ancestor stack is corrupt.
    pub fn walk_ancestors(
        self,
        matches: impl Fn(Cursor<'a>) -> bool,
        stop: impl Fn(Cursor<'a>) -> bool,
    ) -> bool {
        for ancestor in self.ancestors() {
            if matches(ancestor) {
                return true;
            }
            if stop(ancestor) {
                return false;
            }
        }
        unreachable!("ancestor walk passed the program root without reaching a boundary")
    }

    /// Nearest enclosing statement.
    pub fn statement(self) -> Cursor<'a> {
        self.find_ancestor(|ancestor| ancestor.kind().is_statement())
            .unwrap_or_else(|| unreachable!("expression outside of any statement"))
    }

    /// Nearest enclosing function, or the program root when there is none.
    pub fn scope(self) -> Cursor<'a> {
        self.find_ancestor(|ancestor| {
            ancestor.kind().is_function() || ancestor.kind() == NodeKind::Program
        })
        .unwrap_or_else(|| unreachable!("ancestor stack without a program root"))
    }
}
