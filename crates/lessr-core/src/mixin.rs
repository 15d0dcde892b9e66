use crate::ast::{Declaration, MixinCall, MixinDefinition, Node, Param};
use crate::env::Env;
use crate::error::{CompileError, Span};
use crate::ruleset::{find_in_rules, Ruleset};
use crate::selector::Selector;
use crate::value::Value;
use crate::visitor::Fold;
use log::debug;
use std::rc::Rc;

/// Something a mixin call can expand: an explicit definition, or a plain
/// ruleset used as a parameterless mixin.
#[derive(Clone, Debug)]
pub enum MixinCandidate {
    Ruleset(Rc<Ruleset>),
    Definition(Rc<MixinDefinition>),
}

impl MixinCandidate {
    pub fn name(&self) -> String {
        match self {
            MixinCandidate::Ruleset(ruleset) => ruleset
                .selectors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            MixinCandidate::Definition(definition) => definition.name.to_string(),
        }
    }

    pub fn find(&self, selector: &Selector, exclude: Option<&Rc<Ruleset>>) -> Vec<MixinCandidate> {
        match self {
            MixinCandidate::Ruleset(ruleset) => ruleset.find(selector, exclude),
            MixinCandidate::Definition(definition) => {
                find_in_rules(&definition.rules, selector, exclude)
            }
        }
    }

    pub fn match_args(&self, args: &[Value]) -> bool {
        match self {
            MixinCandidate::Ruleset(ruleset) => ruleset.match_args(args),
            MixinCandidate::Definition(definition) => definition.match_args(args),
        }
    }

    fn eval_call(
        &self,
        env: &mut Env,
        args: &[Value],
        call: &MixinCall,
    ) -> Result<Vec<Node>, CompileError> {
        let Some(depth) = env.enter_mixin() else {
            return Err(CompileError::MixinRecursion {
                selector: call.selector.to_string(),
                limit: env.options().max_mixin_depth,
                span: call.span.clone(),
            });
        };
        debug!("expanding `{}` at depth {}", call.selector, depth);
        let result = self.eval_body(env, args, &call.span);
        env.leave_mixin();

        let rules = result?;
        if call.important {
            rules.into_iter().map(|rule| MakeImportant.fold_node(rule)).collect()
        } else {
            Ok(rules)
        }
    }

    fn eval_body(&self, env: &mut Env, args: &[Value], span: &Span) -> Result<Vec<Node>, CompileError> {
        let (params, rules, closure): (&[Param], &[Node], _) = match self {
            MixinCandidate::Ruleset(ruleset) => (&[][..], ruleset.rules(), None),
            MixinCandidate::Definition(definition) => (
                definition.params.as_slice(),
                definition.rules.as_slice(),
                definition.frames.as_ref(),
            ),
        };

        let mut bindings = Vec::with_capacity(params.len() + 1);
        for (i, param) in params.iter().enumerate() {
            let value = match (args.get(i), &param.default) {
                (Some(arg), _) => arg.clone(),
                (None, Some(default)) => default.compile(env, span)?,
                (None, None) => {
                    return Err(CompileError::ArgumentMismatch {
                        selector: self.name(),
                        arity: args.len(),
                        span: span.clone(),
                    })
                }
            };
            bindings.push(Node::Declaration(Declaration {
                span: span.clone(),
                ..Declaration::new(&param.name, value)
            }));
        }
        bindings.push(Node::Declaration(Declaration::new(
            "@arguments",
            Value::join(args),
        )));

        let mut frames = env.frames_outermost_first().to_vec();
        if let Some(closure) = closure {
            frames.extend(closure.frames().iter().cloned());
        }
        frames.push(Rc::new(Ruleset::new(Vec::new(), bindings)));

        let body = Rc::new(Ruleset::new(Vec::new(), rules.to_vec()));
        let compiled = env.with_frames(frames, |env| body.compile(env))?;
        Ok(compiled.into_rules())
    }
}

impl MixinDefinition {
    pub fn new(name: Selector, params: Vec<Param>, rules: Vec<Node>) -> Self {
        Self {
            name,
            params,
            rules,
            frames: None,
            span: Span::dummy(),
        }
    }

    pub fn match_args(&self, args: &[Value]) -> bool {
        let required = self
            .params
            .iter()
            .filter(|param| param.default.is_none())
            .count();
        args.len() >= required && args.len() <= self.params.len()
    }
}

impl MixinCall {
    /// Expands the call into the nodes of every matching candidate.
    pub fn compile(&self, env: &mut Env) -> Result<Vec<Node>, CompileError> {
        let args = self
            .args
            .iter()
            .map(|arg| arg.compile(env, &self.span))
            .collect::<Result<Vec<_>, _>>()?;

        let Some(candidates) = env.mixin(&self.selector) else {
            return Err(CompileError::MixinNotFound {
                selector: self.selector.to_string(),
                span: self.span.clone(),
            });
        };

        let mut rules = Vec::new();
        let mut matched = false;
        for candidate in candidates {
            if let MixinCandidate::Ruleset(ruleset) = &candidate {
                if env.is_compiling(ruleset) {
                    continue;
                }
            }
            if !candidate.match_args(&args) {
                continue;
            }
            matched = true;
            rules.extend(candidate.eval_call(env, &args, self)?);
        }

        if !matched {
            return Err(CompileError::ArgumentMismatch {
                selector: self.selector.to_string(),
                arity: args.len(),
                span: self.span.clone(),
            });
        }
        debug!("`{}` expanded into {} node(s)", self.selector, rules.len());
        Ok(rules)
    }
}

/// Marks every declaration of an expansion `!important`.
struct MakeImportant;

impl Fold for MakeImportant {
    fn fold_node(&mut self, node: Node) -> Result<Node, CompileError> {
        match node {
            Node::Declaration(mut declaration) => {
                declaration.important = true;
                Ok(Node::Declaration(declaration))
            }
            Node::MixinDefinition(_) => Ok(node),
            other => other.fold_children_with(self),
        }
    }
}
