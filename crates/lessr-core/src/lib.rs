pub mod ast;
pub mod emitter;
pub mod env;
pub mod error;
pub mod imports;
pub mod join;
pub mod mixin;
pub mod options;
pub mod ruleset;
pub mod selector;
pub mod value;
pub mod visitor;

use log::debug;
use std::rc::Rc;

pub use ast::Node;
pub use emitter::emit_css;
pub use env::Env;
pub use error::{CompileError, ConfigError, ImportError, Span};
pub use imports::{ImportTable, Importer, Loaded};
pub use options::CompileOptions;
pub use ruleset::Ruleset;
pub use selector::Selector;

use join::JoinSelectors;
use visitor::Fold;

/// Compile a parsed document and compute the selector paths of every
/// ruleset in it.
pub fn compile_tree(rules: Vec<Node>, env: &mut Env) -> Result<Ruleset, CompileError> {
    let compiled = Rc::new(Ruleset::root(rules)).compile(env)?;
    if env.frame_depth() != 0 {
        return Err(CompileError::InternalInvariantViolation(format!(
            "{} frame(s) left on the stack after compilation",
            env.frame_depth()
        )));
    }
    debug!("joining selectors");
    JoinSelectors::new().fold_ruleset(compiled)
}

/// Compile and render in one step.
pub fn compile_to_css(
    rules: Vec<Node>,
    options: CompileOptions,
    importer: Option<ImportTable>,
) -> Result<String, CompileError> {
    let mut env = Env::new(options);
    if let Some(importer) = importer {
        env = env.with_importer(importer);
    }
    let root = compile_tree(rules, &mut env)?;
    Ok(emit_css(&root, &mut env))
}
