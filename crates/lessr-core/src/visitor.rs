use crate::ast::Node;
use crate::error::CompileError;
use crate::ruleset::Ruleset;
use crate::selector::{Selector, SelectorPath};

/// Rebuilds a compiled tree node by node. Every method defaults to visiting
/// the children and leaving the node itself unchanged.
pub trait Fold {
    fn fold_node(&mut self, node: Node) -> Result<Node, CompileError> {
        node.fold_children_with(self)
    }

    fn fold_ruleset(&mut self, ruleset: Ruleset) -> Result<Ruleset, CompileError> {
        ruleset.fold_children_with(self)
    }

    fn fold_selector(&mut self, selector: Selector) -> Result<Selector, CompileError> {
        Ok(selector)
    }

    fn fold_path(&mut self, path: SelectorPath) -> Result<SelectorPath, CompileError> {
        path.into_iter()
            .map(|selector| self.fold_selector(selector))
            .collect()
    }
}
