use crate::ast::{fold_rules, Declaration, MixinDefinition, Node};
use crate::env::{Closure, Env};
use crate::error::CompileError;
use crate::imports::inline_imports;
use crate::mixin::MixinCandidate;
use crate::selector::{Selector, SelectorPath};
use crate::visitor::Fold;
use log::{debug, trace};
use once_cell::unsync::OnceCell;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A selector list and its body.
///
/// `rules` is only reachable through methods that drop the lookup and
/// variable caches whenever the list is replaced.
#[derive(Default, Serialize, Deserialize)]
pub struct Ruleset {
    #[serde(default)]
    pub selectors: Vec<Selector>,
    #[serde(default)]
    rules: Vec<Node>,
    #[serde(default)]
    pub root: bool,
    #[serde(default)]
    pub first_root: bool,
    #[serde(default)]
    pub allow_imports: bool,
    #[serde(default)]
    pub strict_imports: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<SelectorPath>,
    #[serde(skip)]
    original: Option<Rc<Ruleset>>,
    #[serde(skip)]
    lookups: RefCell<FxHashMap<String, Vec<MixinCandidate>>>,
    #[serde(skip)]
    variables: OnceCell<FxHashMap<String, Declaration>>,
}

impl Ruleset {
    pub fn new(selectors: Vec<Selector>, rules: Vec<Node>) -> Self {
        Self {
            selectors,
            rules,
            ..Self::default()
        }
    }

    /// The top-level ruleset of a document.
    pub fn root(rules: Vec<Node>) -> Self {
        Self {
            root: true,
            first_root: true,
            ..Self::new(Vec::new(), rules)
        }
    }

    pub fn rules(&self) -> &[Node] {
        &self.rules
    }

    pub fn into_rules(self) -> Vec<Node> {
        self.rules
    }

    pub fn set_rules(&mut self, rules: Vec<Node>) {
        self.rules = rules;
        self.reset_cache();
    }

    pub fn reset_cache(&mut self) {
        self.lookups.get_mut().clear();
        self.variables.take();
    }

    /// The ruleset this one was compiled from.
    pub fn original(&self) -> Option<&Rc<Ruleset>> {
        self.original.as_ref()
    }

    /// Same selectors and flags around a new rule list, with empty caches.
    fn with_rules(&self, rules: Vec<Node>) -> Ruleset {
        Ruleset {
            selectors: self.selectors.clone(),
            rules,
            root: self.root,
            first_root: self.first_root,
            allow_imports: self.allow_imports,
            strict_imports: self.strict_imports,
            paths: self.paths.clone(),
            original: self.original.clone(),
            lookups: RefCell::default(),
            variables: OnceCell::new(),
        }
    }

    pub fn variables(&self) -> &FxHashMap<String, Declaration> {
        self.variables.get_or_init(|| {
            self.rules
                .iter()
                .filter_map(|rule| match rule {
                    Node::Declaration(declaration) if declaration.is_variable() => {
                        Some((declaration.name.clone(), declaration.clone()))
                    }
                    _ => None,
                })
                .collect()
        })
    }

    pub fn variable(&self, name: &str) -> Option<&Declaration> {
        self.variables().get(name)
    }

    /// A ruleset used as a mixin takes no arguments.
    pub fn match_args(&self, args: &[crate::value::Value]) -> bool {
        args.is_empty()
    }

    /// Nested rulesets and mixin definitions whose selector is a prefix of
    /// `selector`, following the remainder into the matched children.
    ///
    /// Results are memoized per rendered selector until `rules` changes.
    pub fn find(&self, selector: &Selector, exclude: Option<&Rc<Ruleset>>) -> Vec<MixinCandidate> {
        let key = selector.to_string();
        if let Some(found) = self.lookups.borrow().get(&key) {
            trace!("lookup cache hit for `{}`", key);
            return found.clone();
        }
        trace!("lookup cache miss for `{}`", key);
        let found = find_in_rules(&self.rules, selector, exclude);
        self.lookups.borrow_mut().insert(key, found.clone());
        found
    }

    pub fn compile(self: &Rc<Self>, env: &mut Env) -> Result<Ruleset, CompileError> {
        let selectors = self
            .selectors
            .iter()
            .map(|selector| selector.compile(env))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "compiling ruleset `{}` with {} rule(s)",
            DisplaySelectors(&selectors),
            self.rules.len()
        );

        let mut frame = Rc::new(Ruleset {
            selectors: selectors.clone(),
            rules: self.rules.clone(),
            root: self.root,
            first_root: self.first_root,
            allow_imports: self.allow_imports,
            strict_imports: self.strict_imports,
            paths: Vec::new(),
            original: Some(Rc::clone(self)),
            lookups: RefCell::default(),
            variables: OnceCell::new(),
        });
        let mut scope = env.enter(Rc::clone(&frame), selectors);

        let strict = frame.strict_imports || scope.options().strict_imports;
        if frame.root || frame.allow_imports || !strict {
            if let Some(rules) = inline_imports(&frame.rules, &mut scope)? {
                frame = Rc::new(frame.with_rules(rules));
                scope.replace_frame(Rc::clone(&frame));
            }
        }

        let closure = scope.capture_frames();
        if let Some(rules) = capture_closures(&frame.rules, &closure) {
            frame = Rc::new(frame.with_rules(rules));
            scope.replace_frame(Rc::clone(&frame));
        }

        let watermark = scope.media_blocks().len();

        let mut expanded = vec![false; frame.rules.len()];
        let mut i = 0;
        while i < frame.rules.len() {
            let Node::MixinCall(call) = &frame.rules[i] else {
                i += 1;
                continue;
            };
            let results: Vec<Node> = call
                .compile(&mut scope)?
                .into_iter()
                .filter(|node| match node {
                    Node::Declaration(declaration) if declaration.is_variable() => {
                        frame.variable(&declaration.name).is_none()
                    }
                    _ => true,
                })
                .collect();
            let count = results.len();
            let mut rules = Vec::with_capacity(frame.rules.len() + count);
            rules.extend_from_slice(&frame.rules[..i]);
            rules.extend(results);
            rules.extend_from_slice(&frame.rules[i + 1..]);
            expanded.splice(i..=i, std::iter::repeat(true).take(count));

            frame = Rc::new(frame.with_rules(rules));
            scope.replace_frame(Rc::clone(&frame));
            i += count;
        }

        // Compiled nested rulesets go back into the live frame so later
        // siblings find them with their closures captured.
        let mut rules = frame.rules.clone();
        for (i, done) in expanded.iter().enumerate() {
            if *done || matches!(rules[i], Node::MixinDefinition(_)) {
                continue;
            }
            let compiled = rules[i].compile(&mut scope)?;
            let nested = matches!(compiled, Node::Ruleset(_));
            rules[i] = compiled;
            if nested {
                frame = Rc::new(frame.with_rules(rules.clone()));
                scope.replace_frame(Rc::clone(&frame));
            }
        }

        scope.bubble_media(watermark);
        drop(scope);

        Ok(frame.with_rules(rules))
    }

    /// Visits `paths` when they were joined already, else `selectors`, and
    /// then every rule.
    pub fn fold_children_with<F: Fold + ?Sized>(
        mut self,
        folder: &mut F,
    ) -> Result<Ruleset, CompileError> {
        if !self.paths.is_empty() {
            self.paths = std::mem::take(&mut self.paths)
                .into_iter()
                .map(|path| folder.fold_path(path))
                .collect::<Result<_, _>>()?;
        } else {
            self.selectors = std::mem::take(&mut self.selectors)
                .into_iter()
                .map(|selector| folder.fold_selector(selector))
                .collect::<Result<_, _>>()?;
        }
        let rules = std::mem::take(&mut self.rules);
        self.set_rules(fold_rules(rules, folder)?);
        Ok(self)
    }
}

pub(crate) fn find_in_rules(
    rules: &[Node],
    selector: &Selector,
    exclude: Option<&Rc<Ruleset>>,
) -> Vec<MixinCandidate> {
    let mut found = Vec::new();
    for rule in rules {
        let (candidate, own_selectors) = match rule {
            Node::Ruleset(ruleset) => {
                if exclude.is_some_and(|exclude| Rc::ptr_eq(exclude, ruleset)) {
                    continue;
                }
                (
                    MixinCandidate::Ruleset(Rc::clone(ruleset)),
                    ruleset.selectors.as_slice(),
                )
            }
            Node::MixinDefinition(definition) => (
                MixinCandidate::Definition(Rc::clone(definition)),
                std::slice::from_ref(&definition.name),
            ),
            _ => continue,
        };

        for own in own_selectors {
            let matched = selector.match_prefix(own);
            if matched == 0 {
                continue;
            }
            if selector.elements.len() > matched {
                let rest = selector.create_derived(selector.elements[matched..].to_vec());
                found.extend(candidate.find(&rest, exclude));
            } else {
                found.push(candidate.clone());
            }
            break;
        }
    }
    found
}

/// Attaches `closure` to mixin definitions that have not captured one yet.
fn capture_closures(rules: &[Node], closure: &Closure) -> Option<Vec<Node>> {
    let pending = rules.iter().any(|rule| {
        matches!(rule, Node::MixinDefinition(definition) if definition.frames.is_none())
    });
    if !pending {
        return None;
    }
    Some(
        rules
            .iter()
            .map(|rule| match rule {
                Node::MixinDefinition(definition) if definition.frames.is_none() => {
                    Node::MixinDefinition(Rc::new(MixinDefinition {
                        frames: Some(closure.clone()),
                        ..MixinDefinition::clone(definition)
                    }))
                }
                other => other.clone(),
            })
            .collect(),
    )
}

impl Clone for Ruleset {
    fn clone(&self) -> Self {
        self.with_rules(self.rules.clone())
    }
}

impl fmt::Debug for Ruleset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ruleset")
            .field("selectors", &DisplaySelectors(&self.selectors).to_string())
            .field("rules", &self.rules)
            .field("root", &self.root)
            .field("paths", &self.paths.len())
            .finish_non_exhaustive()
    }
}

struct DisplaySelectors<'a>(&'a [Selector]);

impl fmt::Display for DisplaySelectors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, selector) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", selector)?;
        }
        Ok(())
    }
}
