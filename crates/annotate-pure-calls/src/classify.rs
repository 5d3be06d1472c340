//! Structural checks deciding whether a call runs at module initialization
//! and whether its result is kept.
//!
//! All checks are shallow and syntactic. They never look at bindings or
//! data flow.

use crate::ancestry::{Cursor, NodeKind, Slot};

/// Returns true if `cursor` is the function being invoked by its parent call
/// or `new` expression. An argument that is itself a call is not a callee.
pub fn is_callee(cursor: Cursor<'_>) -> bool {
    cursor.slot() == Slot::Callee && cursor.parent().is_some_and(|p| p.kind().is_callable())
}

/// Returns true if some ancestor up to (and including) the nearest statement
/// or function boundary sits in a callee slot, as the inner call in
/// `(a, b.c())()` does.
pub fn is_nested_in_callee(cursor: Cursor<'_>) -> bool {
    cursor.walk_ancestors(is_callee, |ancestor| {
        ancestor.kind().is_statement() || ancestor.kind().is_function()
    })
}

/// Returns true if the call is reached while the program is evaluated top to
/// bottom: every enclosing function must be invoked on the spot.
pub fn is_init_time(cursor: Cursor<'_>) -> bool {
    let mut scope = cursor.scope();
    loop {
        match scope.kind() {
            NodeKind::Program => return true,
            NodeKind::FnDecl | NodeKind::Function => {
                if !is_callee(scope) {
                    return false;
                }
                scope = scope.scope();
            }
            NodeKind::Statement
            | NodeKind::VarDecl
            | NodeKind::ExportDefault
            | NodeKind::Call
            | NodeKind::New
            | NodeKind::Assign
            | NodeKind::Expr => unreachable!("scope is always a function or the program"),
        }
    }
}

/// Returns true if a variable declaration or an assignment encloses the call
/// within its statement.
pub fn is_captured(cursor: Cursor<'_>) -> bool {
    cursor.walk_ancestors(
        |ancestor| matches!(ancestor.kind(), NodeKind::VarDecl | NodeKind::Assign),
        |ancestor| ancestor.kind().is_statement(),
    )
}

/// Returns true if the enclosing statement is `export default`.
pub fn is_bare_export_default(cursor: Cursor<'_>) -> bool {
    cursor.statement().kind() == NodeKind::ExportDefault
}
