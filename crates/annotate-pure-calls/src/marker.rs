use once_cell::sync::Lazy;
use regex::Regex;
use swc_core::common::{
    DUMMY_SP, Span,
    comments::{Comment, CommentKind, Comments},
};

pub const PURE_ANNOTATION: &str = "#__PURE__";

static PURE_ANNOTATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[@#]__PURE__").expect("valid pure annotation regex"));

/// Check if the node starting at `span` has a `/*#__PURE__*/` or `/*@__PURE__*/`
/// leading comment.
pub fn is_pure_annotated<C: Comments>(comments: &C, span: Span) -> bool {
    comments.with_leading(span.lo, |cmts| {
        cmts.iter().any(|c| PURE_ANNOTATION_RE.is_match(&c.text))
    })
}

/// Adds a leading `/*#__PURE__*/` to the node starting at `span` unless one is
/// already there. Returns whether a comment was inserted.
pub fn annotate_as_pure<C: Comments>(comments: &C, span: Span) -> bool {
    if is_pure_annotated(comments, span) {
        return false;
    }

    comments.add_leading(
        span.lo,
        Comment {
            span: DUMMY_SP,
            kind: CommentKind::Block,
            text: PURE_ANNOTATION.into(),
        },
    );
    true
}
