use std::mem;

use rustc_hash::FxHashSet;
use swc_core::{
    atoms::Atom,
    common::{Span, comments::Comments},
    ecma::{
        ast::*,
        visit::{VisitMut, VisitMutWith, noop_visit_mut_type, visit_mut_pass},
    },
};

use crate::{
    ancestry::{Cursor, Frame, NodeKind, Slot},
    classify::{is_bare_export_default, is_callee, is_captured, is_init_time, is_nested_in_callee},
    config::Config,
    marker::annotate_as_pure,
};

/// Annotates calls and `new` expressions of the configured names with
/// `/*#__PURE__*/` when they run during module initialization and their
/// result is kept.
#[tracing::instrument(level = tracing::Level::TRACE, skip_all)]
pub fn annotate_pure_calls<C: Comments>(config: Config, comments: C) -> impl VisitMut + Pass {
    visit_mut_pass(PureCallAnnotator::new(config, comments))
}

/// Runs the pass over `program` and returns the number of annotations it
/// inserted. Calls that were already annotated are not counted.
pub fn annotate_program<C: Comments>(program: &mut Program, config: Config, comments: C) -> usize {
    let mut annotator = PureCallAnnotator::new(config, comments);
    program.visit_mut_with(&mut annotator);
    annotator.annotated
}

/// Why a call was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// The call is, or sits inside, the function being invoked by another call.
    Callee,
    /// An enclosing function is not invoked on the spot.
    Deferred,
    /// The result is neither assigned nor exported.
    Discarded,
    /// The callee is not one of the configured names.
    NotEligible,
}

/// Runs the checks in order and stops at the first one that fails.
pub fn check_call(
    cursor: Cursor<'_>,
    callee: Option<&Atom>,
    eligible: &FxHashSet<Atom>,
) -> Result<(), Skip> {
    if is_callee(cursor) || is_nested_in_callee(cursor) {
        return Err(Skip::Callee);
    }
    if !is_init_time(cursor) {
        return Err(Skip::Deferred);
    }
    if !is_captured(cursor) && !is_bare_export_default(cursor) {
        return Err(Skip::Discarded);
    }
    match callee {
        Some(name) if eligible.contains(name) => Ok(()),
        _ => Err(Skip::NotEligible),
    }
}

struct PureCallAnnotator<C: Comments> {
    comments: C,
    eligible: FxHashSet<Atom>,
    frames: Vec<Frame>,
    /// Slot of the next frame, set by the parent right before visiting a child.
    next_slot: Slot,
    annotated: usize,
}

impl<C: Comments> PureCallAnnotator<C> {
    fn new(config: Config, comments: C) -> Self {
        PureCallAnnotator {
            comments,
            eligible: config.eligible_callees(),
            frames: Vec::new(),
            next_slot: Slot::Other,
            annotated: 0,
        }
    }

    fn with_frame(&mut self, kind: NodeKind, f: impl FnOnce(&mut Self)) {
        let slot = mem::take(&mut self.next_slot);
        self.frames.push(Frame::new(kind, slot));
        f(self);
        self.frames.pop();
        self.next_slot = Slot::Other;
    }

    /// Called with the frame of the call or `new` expression on top of the stack.
    fn visit_callable(&mut self, span: Span, callee: &Expr) {
        let Some(cursor) = Cursor::from_path(&self.frames) else {
            return;
        };
        let callee = callee_name(callee);

        if let Err(skip) = check_call(cursor, callee, &self.eligible) {
            tracing::trace!(?skip, ?callee, "not annotating call at {:?}", span);
            return;
        }

        if annotate_as_pure(&self.comments, span) {
            tracing::debug!(?callee, "annotated call at {:?} as pure", span);
            self.annotated += 1;
        }
    }
}

/// Name of an identifier callee; `(f)()` calls `f`.
fn callee_name(callee: &Expr) -> Option<&Atom> {
    let mut expr = callee;
    while let Expr::Paren(ParenExpr { expr: inner, .. }) = expr {
        expr = &**inner;
    }
    match expr {
        Expr::Ident(ident) => Some(&ident.sym),
        _ => None,
    }
}

impl<C: Comments> VisitMut for PureCallAnnotator<C> {
    noop_visit_mut_type!();

    fn visit_mut_program(&mut self, program: &mut Program) {
        if self.eligible.is_empty() {
            return;
        }
        program.visit_mut_children_with(self);
        tracing::debug!(annotated = self.annotated, "annotate_pure_calls: done");
    }

    fn visit_mut_module(&mut self, module: &mut Module) {
        self.with_frame(NodeKind::Program, |this| module.visit_mut_children_with(this));
    }

    fn visit_mut_script(&mut self, script: &mut Script) {
        self.with_frame(NodeKind::Program, |this| script.visit_mut_children_with(this));
    }

    fn visit_mut_module_decl(&mut self, decl: &mut ModuleDecl) {
        let kind = match decl {
            ModuleDecl::ExportDefaultDecl(_) | ModuleDecl::ExportDefaultExpr(_) => {
                NodeKind::ExportDefault
            }
            _ => NodeKind::Statement,
        };
        self.with_frame(kind, |this| decl.visit_mut_children_with(this));
    }

    fn visit_mut_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            // Declarations and blocks push their own frames.
            Stmt::Decl(_) | Stmt::Block(_) => stmt.visit_mut_children_with(self),
            _ => self.with_frame(NodeKind::Statement, |this| stmt.visit_mut_children_with(this)),
        }
    }

    fn visit_mut_block_stmt(&mut self, block: &mut BlockStmt) {
        self.with_frame(NodeKind::Statement, |this| block.visit_mut_children_with(this));
    }

    fn visit_mut_decl(&mut self, decl: &mut Decl) {
        match decl {
            Decl::Var(_) | Decl::Using(_) | Decl::Fn(_) => decl.visit_mut_children_with(self),
            _ => self.with_frame(NodeKind::Statement, |this| decl.visit_mut_children_with(this)),
        }
    }

    fn visit_mut_var_decl(&mut self, decl: &mut VarDecl) {
        self.with_frame(NodeKind::VarDecl, |this| decl.visit_mut_children_with(this));
    }

    fn visit_mut_using_decl(&mut self, decl: &mut UsingDecl) {
        self.with_frame(NodeKind::VarDecl, |this| decl.visit_mut_children_with(this));
    }

    fn visit_mut_fn_decl(&mut self, decl: &mut FnDecl) {
        self.with_frame(NodeKind::FnDecl, |this| decl.visit_mut_children_with(this));
    }

    fn visit_mut_fn_expr(&mut self, f: &mut FnExpr) {
        self.with_frame(NodeKind::Function, |this| f.visit_mut_children_with(this));
    }

    fn visit_mut_arrow_expr(&mut self, f: &mut ArrowExpr) {
        self.with_frame(NodeKind::Function, |this| f.visit_mut_children_with(this));
    }

    fn visit_mut_method_prop(&mut self, f: &mut MethodProp) {
        self.with_frame(NodeKind::Function, |this| f.visit_mut_children_with(this));
    }

    fn visit_mut_getter_prop(&mut self, f: &mut GetterProp) {
        self.with_frame(NodeKind::Function, |this| f.visit_mut_children_with(this));
    }

    fn visit_mut_setter_prop(&mut self, f: &mut SetterProp) {
        self.with_frame(NodeKind::Function, |this| f.visit_mut_children_with(this));
    }

    fn visit_mut_class_method(&mut self, f: &mut ClassMethod) {
        self.with_frame(NodeKind::Function, |this| f.visit_mut_children_with(this));
    }

    fn visit_mut_private_method(&mut self, f: &mut PrivateMethod) {
        self.with_frame(NodeKind::Function, |this| f.visit_mut_children_with(this));
    }

    fn visit_mut_constructor(&mut self, f: &mut Constructor) {
        self.with_frame(NodeKind::Function, |this| f.visit_mut_children_with(this));
    }

    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        match expr {
            // Parentheses are not nodes of their own, the inner expression
            // inherits the slot.
            Expr::Paren(_) => expr.visit_mut_children_with(self),
            // These push their own frames.
            Expr::Call(_) | Expr::New(_) | Expr::Assign(_) | Expr::Fn(_) | Expr::Arrow(_) => {
                expr.visit_mut_children_with(self)
            }
            _ => self.with_frame(NodeKind::Expr, |this| expr.visit_mut_children_with(this)),
        }
    }

    fn visit_mut_call_expr(&mut self, call: &mut CallExpr) {
        self.with_frame(NodeKind::Call, |this| {
            if let Callee::Expr(callee) = &call.callee {
                this.visit_callable(call.span, callee);
            }

            this.next_slot = Slot::Callee;
            call.callee.visit_mut_with(this);
            this.next_slot = Slot::Other;
            call.args.visit_mut_with(this);
        });
    }

    fn visit_mut_new_expr(&mut self, new: &mut NewExpr) {
        self.with_frame(NodeKind::New, |this| {
            this.visit_callable(new.span, &new.callee);

            this.next_slot = Slot::Callee;
            new.callee.visit_mut_with(this);
            this.next_slot = Slot::Other;
            new.args.visit_mut_with(this);
        });
    }

    fn visit_mut_assign_expr(&mut self, assign: &mut AssignExpr) {
        self.with_frame(NodeKind::Assign, |this| assign.visit_mut_children_with(this));
    }
}

#[cfg(test)]
mod tests {
    use swc_core::{
        common::{FileName, GLOBALS, SourceMap, comments::SingleThreadedComments, sync::Lrc},
        ecma::{
            ast::EsVersion,
            parser::{EsSyntax, Syntax, parse_file_as_program},
            visit::{Visit, VisitWith},
        },
    };

    use super::*;
    use crate::marker::is_pure_annotated;

    fn parse(code: &str, comments: &SingleThreadedComments) -> Program {
        let cm = Lrc::new(SourceMap::default());
        let fm = cm.new_source_file(Lrc::new(FileName::Anon), code.to_string());
        let mut errors = vec![];
        parse_file_as_program(
            &fm,
            Syntax::Es(EsSyntax {
                jsx: true,
                ..Default::default()
            }),
            EsVersion::latest(),
            Some(comments),
            &mut errors,
        )
        .expect("Failed to parse")
    }

    /// Collects the callee names of calls and `new` expressions carrying a
    /// pure annotation, in source order.
    struct AnnotatedCallees<'a> {
        comments: &'a SingleThreadedComments,
        names: Vec<String>,
    }

    impl AnnotatedCallees<'_> {
        fn record(&mut self, span: Span, callee: &Expr) {
            if is_pure_annotated(self.comments, span) {
                let name = callee_name(callee).map_or("<expr>", |name| &**name);
                self.names.push(name.to_string());
            }
        }
    }

    impl Visit for AnnotatedCallees<'_> {
        fn visit_call_expr(&mut self, call: &CallExpr) {
            if let Callee::Expr(callee) = &call.callee {
                self.record(call.span, callee);
            }
            call.visit_children_with(self);
        }

        fn visit_new_expr(&mut self, new: &NewExpr) {
            self.record(new.span, &new.callee);
            new.visit_children_with(self);
        }
    }

    fn annotated(code: &str, names: &[&str]) -> Vec<String> {
        GLOBALS.set(&Default::default(), || {
            let comments = SingleThreadedComments::default();
            let mut program = parse(code, &comments);
            program.visit_mut_with(&mut annotate_pure_calls(
                Config::new(names.iter().copied()),
                &comments,
            ));

            let mut collector = AnnotatedCallees {
                comments: &comments,
                names: vec![],
            };
            program.visit_with(&mut collector);
            collector.names
        })
    }

    const ELIGIBLE: &[&str] = &["f", "g", "Foo"];

    macro_rules! assert_annotated {
        ($name:ident, $code:expr, [$($expected:expr),* $(,)?]) => {
            #[test]
            fn $name() {
                let expected: Vec<&str> = vec![$($expected),*];
                assert_eq!(annotated($code, ELIGIBLE), expected, "{}", $code);
            }
        };
    }

    macro_rules! not_annotated {
        ($name:ident, $code:expr) => {
            assert_annotated!($name, $code, []);
        };
    }

    mod capture_tests {
        use super::*;

        assert_annotated!(test_const_declaration, "const x = f();", ["f"]);

        assert_annotated!(test_let_and_var, "let a = f(); var b = g();", ["f", "g"]);

        assert_annotated!(test_assignment, "let a; a = f();", ["f"]);

        assert_annotated!(test_member_assignment, "obj.prop = f();", ["f"]);

        assert_annotated!(test_export_const, "export const x = f();", ["f"]);

        assert_annotated!(test_export_default, "export default f();", ["f"]);

        assert_annotated!(test_nested_in_initializer, "const x = [f(), { a: g() }];", ["f", "g"]);

        assert_annotated!(test_argument_of_captured_call, "const x = h(f());", ["f"]);

        not_annotated!(test_bare_statement, "f();");

        not_annotated!(test_bare_argument, "h(f());");

        not_annotated!(test_condition, "if (f()) {}");
    }

    mod callee_tests {
        use super::*;

        not_annotated!(test_called_result, "const x = f()();");

        not_annotated!(test_sequence_callee, "const x = (0, f())();");

        not_annotated!(test_member_of_callee, "const x = f().g();");

        not_annotated!(test_new_with_call_callee, "const x = new (f())();");

        not_annotated!(test_member_callee, "const x = a.f();");

        not_annotated!(test_ineligible_name, "const x = h();");

        assert_annotated!(test_parenthesized_name, "const x = (f)();", ["f"]);
    }

    mod init_time_tests {
        use super::*;

        not_annotated!(test_function_declaration, "function later() { const x = f(); }");

        not_annotated!(test_arrow_callback, "const cb = () => f();");

        not_annotated!(
            test_returned_from_invoked_function,
            "function g2() { return f(); }\ng2();"
        );

        not_annotated!(test_method, "const o = { m() { const x = f(); } };");

        not_annotated!(test_class_method, "class A { m() { const x = f(); } }");

        assert_annotated!(
            test_iife,
            "(function () { const x = f(); })();",
            ["f"]
        );

        assert_annotated!(
            test_arrow_iife,
            "const y = (() => { const z = f(); return z; })();",
            ["f"]
        );

        not_annotated!(
            test_iife_inside_callback,
            "setTimeout(function () { (function () { const x = f(); })(); });"
        );

        not_annotated!(test_arrow_iife_expression_body, "const y = (() => f())();");
    }

    mod new_expr_tests {
        use super::*;

        assert_annotated!(test_new, "const a = new Foo();", ["Foo"]);

        assert_annotated!(test_new_without_args, "const a = new Foo;", ["Foo"]);

        not_annotated!(test_new_discarded, "new Foo();");

        not_annotated!(test_new_ineligible, "const a = new Bar();");
    }

    mod existing_annotation_tests {
        use super::*;

        assert_annotated!(test_keeps_at_form, "const a = /*@__PURE__*/ f();", ["f"]);

        assert_annotated!(
            test_keeps_annotation_on_discarded_call,
            "/*#__PURE__*/ f();",
            ["f"]
        );
    }

    #[test]
    fn empty_config_annotates_nothing() {
        assert!(annotated("const x = f(); export default g();", &[]).is_empty());
    }

    #[test]
    fn running_twice_adds_one_annotation() {
        struct FirstCall(Option<Span>);

        impl Visit for FirstCall {
            fn visit_call_expr(&mut self, call: &CallExpr) {
                self.0.get_or_insert(call.span);
                call.visit_children_with(self);
            }
        }

        GLOBALS.set(&Default::default(), || {
            let comments = SingleThreadedComments::default();
            let mut program = parse("const x = f();", &comments);
            for _ in 0..2 {
                program.visit_mut_with(&mut annotate_pure_calls(Config::new(["f"]), &comments));
            }

            let mut first_call = FirstCall(None);
            program.visit_with(&mut first_call);
            let span = first_call.0.expect("a call expression");
            let leading = comments.get_leading(span.lo).unwrap_or_default();
            assert_eq!(leading.len(), 1);
            assert_eq!(&*leading[0].text, "#__PURE__");
        })
    }

    #[test]
    fn annotate_program_counts_inserted_annotations() {
        GLOBALS.set(&Default::default(), || {
            let comments = SingleThreadedComments::default();
            let mut program = parse(
                "const a = /*@__PURE__*/ f();\nconst b = f();\nexport default new Foo();\nf();\n",
                &comments,
            );
            assert_eq!(
                annotate_program(&mut program, Config::new(["f", "Foo"]), &comments),
                2
            );
            assert_eq!(
                annotate_program(&mut program, Config::new(["f", "Foo"]), &comments),
                0
            );
        })
    }

    #[test]
    fn check_call_reports_first_failing_rule() {
        use crate::ancestry::NodeKind::{Call, FnDecl, Statement, VarDecl};

        const O: Slot = Slot::Other;

        let eligible: FxHashSet<Atom> = [Atom::from("f")].into_iter().collect();
        let name = Atom::from("f");
        let other = Atom::from("h");

        let top = [Frame::new(NodeKind::Program, O), Frame::new(VarDecl, O), Frame::new(Call, O)];
        let cursor = Cursor::from_path(&top).unwrap();
        assert_eq!(check_call(cursor, Some(&name), &eligible), Ok(()));
        assert_eq!(
            check_call(cursor, Some(&other), &eligible),
            Err(Skip::NotEligible)
        );
        assert_eq!(check_call(cursor, None, &eligible), Err(Skip::NotEligible));

        let bare = [Frame::new(NodeKind::Program, O), Frame::new(Statement, O), Frame::new(Call, O)];
        let cursor = Cursor::from_path(&bare).unwrap();
        assert_eq!(check_call(cursor, Some(&name), &eligible), Err(Skip::Discarded));

        let deferred = [
            Frame::new(NodeKind::Program, O),
            Frame::new(FnDecl, O),
            Frame::new(Statement, O),
            Frame::new(Statement, O),
            Frame::new(Call, O),
        ];
        let cursor = Cursor::from_path(&deferred).unwrap();
        assert_eq!(check_call(cursor, Some(&name), &eligible), Err(Skip::Deferred));
    }
}
