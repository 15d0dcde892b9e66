use crate::ast::Node;
use crate::error::CompileError;
use crate::ruleset::Ruleset;
use crate::selector::{Element, Selector, SelectorPath};
use crate::visitor::Fold;

/// Joins every selector of a ruleset onto the paths of its parent.
///
/// Without a parent reference each selector is appended to every context
/// path. With one, each `&` is replaced by every context path in turn, so
/// `K` context paths and `N` selectors yield `K * N` paths in
/// selector-major order.
pub fn join_selectors(
    context: &[SelectorPath],
    selectors: &[Selector],
) -> Result<Vec<SelectorPath>, CompileError> {
    let mut paths = Vec::new();
    for selector in selectors {
        join_selector(&mut paths, context, selector)?;
    }
    Ok(paths)
}

pub fn join_selector(
    paths: &mut Vec<SelectorPath>,
    context: &[SelectorPath],
    selector: &Selector,
) -> Result<(), CompileError> {
    if !selector.has_parent_reference() {
        if context.is_empty() {
            paths.push(vec![selector.clone()]);
        } else {
            for parent in context {
                let mut path = parent.clone();
                path.push(selector.clone());
                paths.push(path);
            }
        }
        return Ok(());
    }

    // Elements seen since the last `&`, and the paths built so far. Starts
    // with a single empty path that each `&` multiplies by the context.
    let mut current: Vec<Element> = Vec::new();
    let mut building: Vec<SelectorPath> = vec![Vec::new()];

    for element in &selector.elements {
        if !element.is_parent_reference() {
            current.push(element.clone());
            continue;
        }

        if !current.is_empty() {
            merge_elements_onto(std::mem::take(&mut current), &mut building);
        }

        let mut multiplied = Vec::with_capacity(building.len() * context.len().max(1));
        for mut path in building {
            if context.is_empty() {
                // A lone `&` outside any ruleset keeps its combinator on the
                // following element.
                if let Some(first) = path.first_mut() {
                    let mut elements = first.elements.clone();
                    elements.push(Element::new(element.combinator, ""));
                    *first = first.create_derived(elements);
                }
                multiplied.push(path);
                continue;
            }

            for parent in context {
                let mut joined_path = path.clone();
                let mut joined = match joined_path.pop() {
                    Some(last) => selector.create_derived(last.elements),
                    None => selector.create_derived(Vec::new()),
                };
                let mut has_joined = !path.is_empty();

                if let Some(head) = parent.first() {
                    let Some(first) = head.elements.first() else {
                        return Err(CompileError::SelectorSyntax {
                            selector: selector.to_string(),
                            reason: "parent selector has no elements".to_string(),
                            span: selector.span.clone(),
                        });
                    };
                    joined
                        .elements
                        .push(Element::new(element.combinator, first.value.clone()));
                    joined.elements.extend(head.elements[1..].iter().cloned());
                    has_joined = true;
                }

                if has_joined {
                    joined_path.push(joined);
                }
                joined_path.extend(parent.iter().skip(1).cloned());
                multiplied.push(joined_path);
            }
        }
        building = multiplied;
    }

    if !current.is_empty() {
        merge_elements_onto(current, &mut building);
    }
    paths.extend(building.into_iter().filter(|path| !path.is_empty()));
    Ok(())
}

fn merge_elements_onto(elements: Vec<Element>, paths: &mut Vec<SelectorPath>) {
    if paths.is_empty() {
        paths.push(vec![Selector::new(elements)]);
        return;
    }
    for path in paths.iter_mut() {
        match path.last_mut() {
            Some(last) => {
                let mut merged = last.elements.clone();
                merged.extend(elements.iter().cloned());
                *last = last.create_derived(merged);
            }
            None => path.push(Selector::new(elements.clone())),
        }
    }
}

/// Computes `paths` for every ruleset of a compiled tree.
///
/// Root rulesets and rulesets without selectors pass their context through
/// unchanged. Media and directive bodies start again from an empty context,
/// since bubbling already wrapped their content in the enclosing selectors.
#[derive(Default)]
pub struct JoinSelectors {
    contexts: Vec<Vec<SelectorPath>>,
}

impl JoinSelectors {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Fold for JoinSelectors {
    fn fold_node(&mut self, node: Node) -> Result<Node, CompileError> {
        match node {
            Node::MixinDefinition(_) => Ok(node),
            Node::Media(_) | Node::Directive(_) => {
                self.contexts.push(Vec::new());
                let result = node.fold_children_with(self);
                self.contexts.pop();
                result
            }
            other => other.fold_children_with(self),
        }
    }

    fn fold_ruleset(&mut self, mut ruleset: Ruleset) -> Result<Ruleset, CompileError> {
        if ruleset.root || ruleset.selectors.is_empty() {
            ruleset.paths = Vec::new();
            return ruleset.fold_children_with(self);
        }

        let context = self.contexts.last().map(Vec::as_slice).unwrap_or_default();
        ruleset.paths = join_selectors(context, &ruleset.selectors)?;

        self.contexts.push(ruleset.paths.clone());
        let result = ruleset.fold_children_with(self);
        self.contexts.pop();
        result
    }
}
