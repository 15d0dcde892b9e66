use crate::env::{Closure, Env};
use crate::error::{CompileError, Span};
use crate::ruleset::Ruleset;
use crate::selector::Selector;
use crate::value::Value;
use crate::visitor::Fold;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// One entry of a ruleset's body.
///
/// Nested rulesets, mixin definitions and media blocks are reference counted:
/// frames snapshot the rule list of the ruleset being compiled, and mixin
/// definitions capture those snapshots as closures.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Declaration(Declaration),
    Ruleset(Rc<Ruleset>),
    MixinDefinition(Rc<MixinDefinition>),
    MixinCall(MixinCall),
    Import(Import),
    Comment(Comment),
    Media(Rc<RefCell<Media>>),
    Directive(Directive),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    pub value: Value,
    #[serde(default)]
    pub important: bool,
    #[serde(default)]
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MixinDefinition {
    pub name: Selector,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub rules: Vec<Node>,
    #[serde(skip)]
    pub frames: Option<Closure>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default)]
    pub default: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MixinCall {
    pub selector: Selector,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub important: bool,
    #[serde(default)]
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Import {
    pub path: String,
    #[serde(default)]
    pub css: bool,
    #[serde(default)]
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    #[serde(default)]
    pub silent: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Media {
    pub features: String,
    #[serde(default)]
    pub rules: Vec<Node>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Directive {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub rules: Option<Vec<Node>>,
    #[serde(default)]
    pub span: Span,
}

impl Node {
    pub fn declaration(name: &str, value: &str) -> Self {
        Node::Declaration(Declaration::new(name, value))
    }

    pub fn ruleset(ruleset: Ruleset) -> Self {
        Node::Ruleset(Rc::new(ruleset))
    }

    pub fn media(media: Media) -> Self {
        Node::Media(Rc::new(RefCell::new(media)))
    }

    /// Compiles a node that produces exactly one replacement.
    ///
    /// Mixin calls expand into several nodes and are handled by the owning
    /// ruleset before this is reached.
    pub fn compile(&self, env: &mut Env) -> Result<Node, CompileError> {
        match self {
            Node::Declaration(declaration) => Ok(Node::Declaration(declaration.compile(env)?)),
            Node::Ruleset(ruleset) => Ok(Node::Ruleset(Rc::new(ruleset.compile(env)?))),
            Node::MixinDefinition(_) | Node::Import(_) | Node::Comment(_) => Ok(self.clone()),
            Node::Media(media) => {
                let source = media.borrow().clone();
                source.compile(env)
            }
            Node::Directive(directive) => Ok(Node::Directive(directive.compile(env)?)),
            Node::MixinCall(call) => Err(CompileError::InternalInvariantViolation(format!(
                "mixin call `{}` reached node compilation without being expanded",
                call.selector
            ))),
        }
    }

    pub fn fold_children_with<F: Fold + ?Sized>(self, folder: &mut F) -> Result<Node, CompileError> {
        match self {
            Node::Ruleset(ruleset) => {
                let ruleset = folder.fold_ruleset(Rc::unwrap_or_clone(ruleset))?;
                Ok(Node::Ruleset(Rc::new(ruleset)))
            }
            Node::Media(media) => {
                let rules = std::mem::take(&mut media.borrow_mut().rules);
                let rules = fold_rules(rules, folder)?;
                media.borrow_mut().rules = rules;
                Ok(Node::Media(media))
            }
            Node::Directive(mut directive) => {
                if let Some(rules) = directive.rules.take() {
                    directive.rules = Some(fold_rules(rules, folder)?);
                }
                Ok(Node::Directive(directive))
            }
            other => Ok(other),
        }
    }

    /// Whether rendering this node produces any output.
    pub fn is_visible(&self, compress: bool) -> bool {
        match self {
            Node::Declaration(declaration) => !declaration.is_variable(),
            Node::Ruleset(ruleset) => ruleset.rules().iter().any(|rule| rule.is_visible(compress)),
            Node::MixinDefinition(_) | Node::MixinCall(_) => false,
            Node::Import(_) | Node::Directive(_) => true,
            Node::Comment(comment) => comment.is_rendered(compress),
            Node::Media(media) => media
                .borrow()
                .rules
                .iter()
                .any(|rule| rule.is_visible(compress)),
        }
    }

    /// Whether this node renders as its own block after the owner's body.
    pub fn is_block(&self, at_root: bool) -> bool {
        match self {
            Node::Ruleset(_) | Node::Media(_) | Node::Directive(_) => true,
            Node::Comment(_) => at_root,
            _ => false,
        }
    }
}

pub(crate) fn fold_rules<F: Fold + ?Sized>(
    rules: Vec<Node>,
    folder: &mut F,
) -> Result<Vec<Node>, CompileError> {
    rules.into_iter().map(|rule| folder.fold_node(rule)).collect()
}

impl Declaration {
    pub fn new(name: &str, value: impl Into<Value>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            important: false,
            span: Span::dummy(),
        }
    }

    pub fn is_variable(&self) -> bool {
        self.name.starts_with('@')
    }

    pub fn compile(&self, env: &mut Env) -> Result<Declaration, CompileError> {
        Ok(Declaration {
            name: self.name.clone(),
            value: self.value.compile(env, &self.span)?,
            important: self.important,
            span: self.span.clone(),
        })
    }
}

impl Comment {
    pub fn is_rendered(&self, compress: bool) -> bool {
        !self.silent && (!compress || self.text.starts_with("/*!"))
    }
}

impl Media {
    pub fn new(features: &str, rules: Vec<Node>) -> Self {
        Self {
            features: features.to_string(),
            rules,
            span: Span::dummy(),
        }
    }

    pub fn compile(&self, env: &mut Env) -> Result<Node, CompileError> {
        let body = Rc::new(Ruleset::new(Vec::new(), self.rules.clone()));
        let compiled = body.compile(env)?;
        let media = Rc::new(RefCell::new(Media {
            features: self.features.clone(),
            rules: compiled.into_rules(),
            span: self.span.clone(),
        }));
        env.register_media(Rc::clone(&media));
        Ok(Node::Media(media))
    }

    /// Wraps the block's content in a ruleset carrying `selectors`, so the
    /// joiner can restore the selector chain the block was nested in.
    pub fn bubble_selectors(&mut self, selectors: &[Selector]) {
        if selectors.is_empty() {
            return;
        }
        let rules = std::mem::take(&mut self.rules);
        self.rules = vec![Node::ruleset(Ruleset::new(selectors.to_vec(), rules))];
    }
}

impl Directive {
    pub fn compile(&self, env: &mut Env) -> Result<Directive, CompileError> {
        let rules = match &self.rules {
            Some(rules) => {
                let body = Rc::new(Ruleset::new(Vec::new(), rules.clone()));
                Some(body.compile(env)?.into_rules())
            }
            None => None,
        };
        Ok(Directive {
            name: self.name.clone(),
            value: self.value.clone(),
            rules,
            span: self.span.clone(),
        })
    }
}
