use crate::env::Env;
use crate::error::{CompileError, Span};
use crate::value::interpolate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The value of an element that refers to the enclosing ruleset's selectors.
pub const PARENT_REFERENCE: &str = "&";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Combinator {
    #[default]
    None,
    Descendant,
    Child,
    Sibling,
    GeneralSibling,
}

impl Combinator {
    pub fn as_css(self, compress: bool) -> &'static str {
        match (self, compress) {
            (Combinator::None, _) => "",
            (Combinator::Descendant, _) => " ",
            (Combinator::Child, true) => ">",
            (Combinator::Child, false) => " > ",
            (Combinator::Sibling, true) => "+",
            (Combinator::Sibling, false) => " + ",
            (Combinator::GeneralSibling, true) => "~",
            (Combinator::GeneralSibling, false) => " ~ ",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub combinator: Combinator,
    pub value: String,
    pub span: Span,
}

impl Element {
    pub fn new(combinator: Combinator, value: impl Into<String>) -> Self {
        Self {
            combinator,
            value: value.into(),
            span: Span::dummy(),
        }
    }

    pub fn is_parent_reference(&self) -> bool {
        self.value == PARENT_REFERENCE
    }
}

/// A compound selector chain such as `.a > .b:hover`.
///
/// Derived selectors share `condition` and `span` with their source and only
/// replace the element list; the source is never modified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Selector {
    pub elements: Vec<Element>,
    pub condition: Option<String>,
    pub evaluated: bool,
    pub span: Span,
}

/// One inheritance chain of selectors, outermost first.
pub type SelectorPath = Vec<Selector>;

impl Selector {
    pub fn new(elements: Vec<Element>) -> Self {
        Self {
            elements,
            condition: None,
            evaluated: false,
            span: Span::dummy(),
        }
    }

    pub fn create_derived(&self, elements: Vec<Element>) -> Self {
        Self {
            elements,
            condition: self.condition.clone(),
            evaluated: self.evaluated,
            span: self.span.clone(),
        }
    }

    pub fn has_parent_reference(&self) -> bool {
        self.elements.iter().any(Element::is_parent_reference)
    }

    /// Parses a comma separated selector list.
    pub fn list(text: &str) -> Result<Vec<Selector>, CompileError> {
        split_selector_terms(text)
            .into_iter()
            .map(|term| term.parse())
            .collect()
    }

    /// Number of leading elements of `self` matched by `other`, or zero when
    /// `other` is not a prefix of `self`.
    ///
    /// The first combinator is not compared so that a suffix left over from
    /// a namespaced lookup (`#ns > .m`) still matches a bare `.m`.
    pub fn match_prefix(&self, other: &Selector) -> usize {
        let count = other.elements.len();
        if count == 0 || self.elements.len() < count {
            return 0;
        }
        let matches = self
            .elements
            .iter()
            .zip(&other.elements)
            .enumerate()
            .all(|(i, (mine, theirs))| {
                mine.value == theirs.value && (i == 0 || mine.combinator == theirs.combinator)
            });
        if matches {
            count
        } else {
            0
        }
    }

    pub fn compile(&self, env: &mut Env) -> Result<Selector, CompileError> {
        let mut elements = Vec::with_capacity(self.elements.len());
        for element in &self.elements {
            let value = if element.value.contains("@{") {
                interpolate(&element.value, env, &self.span)?
            } else {
                element.value.clone()
            };
            elements.push(Element {
                combinator: element.combinator,
                value,
                span: element.span.clone(),
            });
        }
        let mut compiled = self.create_derived(elements);
        compiled.evaluated = true;
        Ok(compiled)
    }

    pub fn to_css(&self, compress: bool) -> String {
        self.elements
            .iter()
            .map(|element| format!("{}{}", element.combinator.as_css(compress), element.value))
            .collect()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_css(false).trim_start())
    }
}

impl FromStr for Selector {
    type Err = CompileError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        SelectorReader::new(text).read()
    }
}

impl TryFrom<String> for Selector {
    type Error = CompileError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.to_string()
    }
}

fn split_selector_terms(selector: &str) -> Vec<&str> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in selector.char_indices() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                terms.push(selector[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    terms.push(selector[start..].trim());
    terms.into_iter().filter(|term| !term.is_empty()).collect()
}

struct SelectorReader<'a> {
    text: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    elements: Vec<Element>,
    current: String,
    combinator: Option<Combinator>,
    saw_space: bool,
}

impl<'a> SelectorReader<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().peekable(),
            elements: Vec::new(),
            current: String::new(),
            combinator: None,
            saw_space: false,
        }
    }

    fn error(&self, reason: &str) -> CompileError {
        CompileError::SelectorSyntax {
            selector: self.text.to_string(),
            reason: reason.to_string(),
            span: Span::dummy(),
        }
    }

    fn read(mut self) -> Result<Selector, CompileError> {
        while let Some((_, ch)) = self.chars.next() {
            match ch {
                c if c.is_whitespace() => {
                    self.flush();
                    self.saw_space = true;
                }
                '>' | '+' | '~' => {
                    self.flush();
                    if self.combinator.is_some() {
                        return Err(self.error("consecutive combinators"));
                    }
                    self.combinator = Some(match ch {
                        '>' => Combinator::Child,
                        '+' => Combinator::Sibling,
                        _ => Combinator::GeneralSibling,
                    });
                }
                ',' => return Err(self.error("unexpected `,` in a single selector")),
                '&' => {
                    self.flush();
                    self.current.push('&');
                    self.flush();
                }
                '.' | '#' => {
                    self.flush();
                    self.current.push(ch);
                }
                ':' => {
                    self.flush();
                    self.current.push(':');
                    if let Some((_, ':')) = self.chars.peek() {
                        self.chars.next();
                        self.current.push(':');
                    }
                }
                '[' => {
                    self.flush();
                    self.read_balanced('[', ']')?;
                    self.flush();
                }
                '(' => self.read_balanced('(', ')')?,
                _ => self.current.push(ch),
            }
        }
        self.flush();

        if self.combinator.is_some() {
            return Err(self.error("trailing combinator"));
        }
        if self.elements.is_empty() {
            return Err(self.error("selector is empty"));
        }
        Ok(Selector::new(self.elements))
    }

    fn read_balanced(&mut self, open: char, close: char) -> Result<(), CompileError> {
        let mut depth = 1usize;
        self.current.push(open);
        for (_, ch) in self.chars.by_ref() {
            self.current.push(ch);
            if ch == open {
                depth += 1;
            } else if ch == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
        }
        Err(self.error("unbalanced brackets"))
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let combinator = match self.combinator.take() {
            Some(combinator) => combinator,
            None if self.saw_space && !self.elements.is_empty() => Combinator::Descendant,
            None => Combinator::None,
        };
        self.saw_space = false;
        self.elements
            .push(Element::new(combinator, std::mem::take(&mut self.current)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn shape(selector: &Selector) -> Vec<(Combinator, &str)> {
        selector
            .elements
            .iter()
            .map(|element| (element.combinator, element.value.as_str()))
            .collect()
    }

    #[test]
    fn reads_compound_and_combinators() {
        let selector: Selector = ".a > .b:hover  .c".parse().unwrap();
        assert_eq!(
            shape(&selector),
            vec![
                (Combinator::None, ".a"),
                (Combinator::Child, ".b"),
                (Combinator::None, ":hover"),
                (Combinator::Descendant, ".c"),
            ]
        );
    }

    #[test]
    fn reads_parent_references() {
        let selector: Selector = "&-title + &".parse().unwrap();
        assert_eq!(
            shape(&selector),
            vec![
                (Combinator::None, "&"),
                (Combinator::None, "-title"),
                (Combinator::Sibling, "&"),
            ]
        );
        assert!(selector.has_parent_reference());
    }

    #[test]
    fn keeps_brackets_and_pseudo_arguments_whole() {
        let selector: Selector = "a[href='x y']:not(.b .c)::after".parse().unwrap();
        assert_eq!(
            shape(&selector),
            vec![
                (Combinator::None, "a"),
                (Combinator::None, "[href='x y']"),
                (Combinator::None, ":not(.b .c)"),
                (Combinator::None, "::after"),
            ]
        );
    }

    #[test_case(""; "empty")]
    #[test_case(".a >"; "trailing combinator")]
    #[test_case(".a > > .b"; "double combinator")]
    #[test_case(".a, .b"; "list in single selector")]
    #[test_case("a[href"; "unbalanced bracket")]
    fn rejects_malformed(text: &str) {
        let error = text.parse::<Selector>().unwrap_err();
        assert_eq!(error.name(), "SelectorSyntax");
    }

    #[test]
    fn splits_lists_at_top_level_only() {
        let selectors = Selector::list(".a, :is(.b, .c) , .d").unwrap();
        let rendered: Vec<String> = selectors.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec![".a", ":is(.b, .c)", ".d"]);
    }

    #[test]
    fn renders_with_and_without_compression() {
        let selector: Selector = ".a > .b ~ .c .d".parse().unwrap();
        assert_eq!(selector.to_string(), ".a > .b ~ .c .d");
        assert_eq!(selector.to_css(true), ".a>.b~.c .d");
    }

    #[test_case(".m", ".m", 1; "exact")]
    #[test_case("#ns > .m", "#ns", 1; "namespace prefix")]
    #[test_case(".m", "#ns", 0; "different value")]
    #[test_case(".a .b", ".a.b", 0; "different combinator")]
    #[test_case(".a.b", ".a.b", 2; "compound")]
    #[test_case(".a", ".a.b", 0; "longer candidate")]
    fn prefix_matching(query: &str, candidate: &str, expected: usize) {
        let query: Selector = query.parse().unwrap();
        let candidate: Selector = candidate.parse().unwrap();
        assert_eq!(query.match_prefix(&candidate), expected);
    }

    #[test]
    fn derived_selector_leaves_source_untouched() {
        let mut source: Selector = ".a".parse().unwrap();
        source.condition = Some("(@mode = dark)".to_string());
        let derived = source.create_derived(vec![Element::new(Combinator::None, ".b")]);
        assert_eq!(source.to_string(), ".a");
        assert_eq!(derived.to_string(), ".b");
        assert_eq!(derived.condition, source.condition);
    }
}
