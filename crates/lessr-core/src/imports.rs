use crate::ast::{Import, Node};
use crate::env::Env;
use crate::error::{CompileError, ImportError};
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};

pub enum Loaded {
    Nodes(Vec<Node>),
    /// The path was inlined before; it expands to nothing.
    AlreadyImported,
}

/// Supplies the parsed content of an imported path.
pub trait Importer {
    fn load(&mut self, path: &str) -> Result<Loaded, ImportError>;
}

/// Parsed stylesheets keyed by import path. Each path is handed out once.
#[derive(Clone, Debug, Default)]
pub struct ImportTable {
    sources: FxHashMap<String, Vec<Node>>,
    imported: FxHashSet<String>,
}

impl ImportTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, rules: Vec<Node>) {
        self.sources.insert(path.into(), rules);
    }
}

impl FromIterator<(String, Vec<Node>)> for ImportTable {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Node>)>>(iter: I) -> Self {
        Self {
            sources: iter.into_iter().collect(),
            imported: FxHashSet::default(),
        }
    }
}

impl Importer for ImportTable {
    fn load(&mut self, path: &str) -> Result<Loaded, ImportError> {
        let Some(rules) = self.sources.get(path) else {
            return Err(ImportError::NotFound);
        };
        if !self.imported.insert(path.to_string()) {
            return Ok(Loaded::AlreadyImported);
        }
        Ok(Loaded::Nodes(rules.clone()))
    }
}

/// Replaces every import in `rules` with the content it resolves to.
/// Returns `None` when there is nothing to replace.
pub(crate) fn inline_imports(
    rules: &[Node],
    env: &mut Env,
) -> Result<Option<Vec<Node>>, CompileError> {
    if !rules.iter().any(|rule| matches!(rule, Node::Import(_))) {
        return Ok(None);
    }
    let mut inlined = Vec::with_capacity(rules.len());
    for rule in rules {
        match rule {
            Node::Import(import) => inlined.extend(import.compile(env)?),
            other => inlined.push(other.clone()),
        }
    }
    Ok(Some(inlined))
}

impl Import {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            css: false,
            span: Default::default(),
        }
    }

    /// Resolves the import through the installed importer. CSS imports, and
    /// every import when no importer is installed, are kept as they are.
    pub fn compile(&self, env: &mut Env) -> Result<Vec<Node>, CompileError> {
        if self.css {
            return Ok(vec![Node::Import(self.clone())]);
        }
        if env.import_stack().iter().any(|pending| *pending == self.path) {
            return Err(self.error(ImportError::Recursive));
        }
        let loaded = match env.importer_mut() {
            Some(importer) => importer.load(&self.path).map_err(|e| self.error(e))?,
            None => return Ok(vec![Node::Import(self.clone())]),
        };
        let rules = match loaded {
            Loaded::Nodes(rules) => rules,
            Loaded::AlreadyImported => {
                debug!("skipping `{}`, already imported", self.path);
                return Ok(Vec::new());
            }
        };
        debug!("inlining `{}` ({} node(s))", self.path, rules.len());

        env.import_stack().push(self.path.clone());
        let nested = inline_imports(&rules, env);
        env.import_stack().pop();
        Ok(nested?.unwrap_or(rules))
    }

    fn error(&self, source: ImportError) -> CompileError {
        CompileError::ImportResolution {
            path: self.path.clone(),
            source,
            span: self.span.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str) -> Node {
        Node::ruleset(crate::ruleset::Ruleset::new(
            vec![name.parse().unwrap()],
            vec![Node::declaration("color", "red")],
        ))
    }

    fn import(path: &str) -> Node {
        Node::Import(Import::new(path))
    }

    fn table(entries: Vec<(&str, Vec<Node>)>) -> Env {
        let table: ImportTable = entries
            .into_iter()
            .map(|(path, rules)| (path.to_string(), rules))
            .collect();
        Env::default().with_importer(table)
    }

    fn selectors(rules: &[Node]) -> Vec<String> {
        rules
            .iter()
            .filter_map(|rule| match rule {
                Node::Ruleset(ruleset) => Some(ruleset.selectors[0].to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn inline_nested_imports_once() {
        let mut env = table(vec![
            ("a", vec![class(".a")]),
            ("b", vec![import("a"), class(".b")]),
        ]);
        let rules = inline_imports(&[import("b"), class(".c")], &mut env)
            .unwrap()
            .unwrap();
        assert_eq!(selectors(&rules), vec![".a", ".b", ".c"]);
        assert!(!rules.iter().any(|rule| matches!(rule, Node::Import(_))));
    }

    #[test]
    fn skip_duplicate_imports() {
        let mut env = table(vec![("a", vec![class(".a")])]);
        let rules = inline_imports(&[import("a"), import("a")], &mut env)
            .unwrap()
            .unwrap();
        assert_eq!(selectors(&rules), vec![".a"]);
    }

    #[test]
    fn detect_cycles() {
        let mut env = table(vec![
            ("cycle-a", vec![import("cycle-b")]),
            ("cycle-b", vec![import("cycle-a")]),
        ]);
        let error = inline_imports(&[import("cycle-a")], &mut env).unwrap_err();
        assert!(matches!(
            error,
            CompileError::ImportResolution {
                source: ImportError::Recursive,
                ..
            }
        ));
        assert!(env.import_stack().is_empty());
    }

    #[test]
    fn missing_path_error() {
        let mut env = table(Vec::new());
        let error = inline_imports(&[import("missing")], &mut env).unwrap_err();
        assert_eq!(error.name(), "ImportResolution");
        assert!(error.to_string().contains("`missing`"));
    }

    #[test]
    fn keeps_css_imports_and_imports_without_an_importer() {
        let css = Node::Import(Import {
            css: true,
            ..Import::new("reset.css")
        });
        let mut env = table(Vec::new());
        let rules = inline_imports(&[css], &mut env).unwrap().unwrap();
        assert!(matches!(&rules[0], Node::Import(import) if import.path == "reset.css"));

        let mut bare = Env::default();
        let rules = inline_imports(&[import("theme")], &mut bare).unwrap().unwrap();
        assert!(matches!(&rules[0], Node::Import(import) if import.path == "theme"));
    }

    #[test]
    fn nothing_to_inline() {
        let mut env = Env::default();
        assert!(inline_imports(&[class(".a")], &mut env).unwrap().is_none());
    }
}
