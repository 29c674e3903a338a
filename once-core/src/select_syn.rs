//! Syntactic [`VariantSelector`] over Rust source.
//!
//! Only the guarded block's own effects count. Nested closures, nested
//! `async` blocks and nested items are separate units of work: an `.await`
//! or `?` inside them does not make the outer block suspend or fail.

use crate::error::OnceError;
use crate::select::{BlockFlags, VariantSelector};
use syn::visit::{self, Visit};
use syn::{Expr, ExprAsync, ExprAwait, ExprClosure, ExprTry, Item, ReturnType, Type};

#[derive(Debug, Clone, Copy, Default)]
pub struct SourceClassifier;

impl SourceClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify_expr(&self, expr: &Expr) -> BlockFlags {
        let mut finder = EffectFinder::default();

        match expr {
            Expr::Closure(closure) => {
                finder.suspends |= closure.asyncness.is_some();
                finder.fails |= returns_result(&closure.output);
                finder.visit_root(&closure.body);
            }
            root => finder.visit_root(root),
        }

        BlockFlags {
            is_asynchronous: finder.suspends,
            is_failable: finder.fails,
        }
    }
}

impl VariantSelector for SourceClassifier {
    fn classify(&self, source: &str) -> Result<BlockFlags, OnceError> {
        let expr: Expr =
            syn::parse_str(source.trim()).map_err(|e| OnceError::Parse(e.to_string()))?;
        Ok(self.classify_expr(&expr))
    }
}

#[derive(Default)]
struct EffectFinder {
    suspends: bool,
    fails: bool,
}

impl EffectFinder {
    /// The root may itself be an `async` block (`async { .. }` or the body
    /// of `|| async { .. }`); descend into it instead of treating it as nested.
    fn visit_root(&mut self, expr: &Expr) {
        match expr {
            Expr::Async(root) => {
                self.suspends = true;
                self.visit_block(&root.block);
            }
            other => self.visit_expr(other),
        }
    }
}

impl<'ast> Visit<'ast> for EffectFinder {
    fn visit_expr_await(&mut self, node: &'ast ExprAwait) {
        self.suspends = true;
        visit::visit_expr_await(self, node);
    }

    fn visit_expr_try(&mut self, node: &'ast ExprTry) {
        self.fails = true;
        visit::visit_expr_try(self, node);
    }

    fn visit_expr_closure(&mut self, _: &'ast ExprClosure) {}

    fn visit_expr_async(&mut self, _: &'ast ExprAsync) {}

    fn visit_item(&mut self, _: &'ast Item) {}
}

fn returns_result(output: &ReturnType) -> bool {
    let ReturnType::Type(_, ty) = output else {
        return false;
    };
    match ty.as_ref() {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Result"),
        _ => false,
    }
}
