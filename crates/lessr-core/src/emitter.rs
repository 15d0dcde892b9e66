use crate::ast::{Comment, Declaration, Directive, Import, Media, Node};
use crate::env::Env;
use crate::options::CompileOptions;
use crate::ruleset::Ruleset;
use crate::selector::{Combinator, Selector, SelectorPath};

const INDENT: &str = "  ";

/// Render a compiled and joined tree.
pub fn emit_css(root: &Ruleset, env: &mut Env) -> String {
    let mut out = String::new();
    emit_ruleset(root, env, &mut out);
    out
}

fn indent(env: &Env, level: usize) -> String {
    if env.compress() {
        String::new()
    } else {
        INDENT.repeat(level)
    }
}

fn emit_ruleset(ruleset: &Ruleset, env: &mut Env, out: &mut String) {
    // Unjoined rulesets render each of their selectors as its own path.
    let unjoined: Vec<SelectorPath>;
    let paths = if ruleset.paths.is_empty() && !ruleset.selectors.is_empty() {
        unjoined = ruleset
            .selectors
            .iter()
            .map(|selector| vec![selector.clone()])
            .collect();
        unjoined.as_slice()
    } else {
        ruleset.paths.as_slice()
    };
    let header = (!ruleset.root).then_some(paths);
    emit_body(ruleset.rules(), header, ruleset.root, ruleset.first_root, env, out);
}

/// Writes the selector header and simple nodes, then every nested block at
/// the same level. Without a header the rules are written as a root body.
fn emit_body(
    rules: &[Node],
    header: Option<&[SelectorPath]>,
    root: bool,
    first_root: bool,
    env: &mut Env,
    out: &mut String,
) {
    let compress = env.compress();
    let (blocks, simple): (Vec<&Node>, Vec<&Node>) = rules
        .iter()
        .filter(|rule| rule.is_visible(compress))
        .partition(|rule| rule.is_block(root));

    let level = env.tab_level;
    let tab_set = indent(env, level);
    let tab_rule = match header {
        Some(_) => indent(env, level + 1),
        None => tab_set.clone(),
    };
    let header = header.filter(|_| !simple.is_empty());

    if let Some(paths) = header {
        for (i, path) in paths.iter().enumerate() {
            if i > 0 {
                out.push(',');
                if !compress {
                    out.push('\n');
                    out.push_str(&tab_set);
                }
            }
            emit_path(path, env, out);
        }
        if compress {
            out.push('{');
        } else {
            out.push_str(" {\n");
            out.push_str(&tab_rule);
        }
        env.tab_level += 1;
    }

    for (i, rule) in simple.iter().enumerate() {
        if i + 1 == simple.len() && (!root || blocks.is_empty() || first_root) {
            env.last_rule = true;
        }
        emit_node(rule, env, out);
        if env.last_rule {
            env.last_rule = false;
        } else if !compress {
            out.push('\n');
            out.push_str(&tab_rule);
        }
    }

    if header.is_some() {
        env.tab_level -= 1;
        if compress {
            out.push('}');
        } else {
            out.push('\n');
            out.push_str(&tab_set);
            out.push('}');
        }
    }

    for (i, block) in blocks.iter().enumerate() {
        if (i == 0 && !simple.is_empty()) || i > 0 {
            if !compress {
                out.push('\n');
            }
            out.push_str(&tab_set);
        }
        emit_node(block, env, out);
    }

    if out.is_empty() && !compress && first_root {
        out.push('\n');
    }
}

fn emit_node(node: &Node, env: &mut Env, out: &mut String) {
    match node {
        Node::Declaration(declaration) => emit_declaration(declaration, env, out),
        Node::Ruleset(ruleset) => emit_ruleset(ruleset, env, out),
        Node::Media(media) => emit_media(&media.borrow(), env, out),
        Node::Directive(directive) => emit_directive(directive, env, out),
        Node::Import(import) => emit_import(import, out),
        Node::Comment(comment) => emit_comment(comment, out),
        Node::MixinDefinition(_) | Node::MixinCall(_) => {}
    }
}

fn emit_declaration(declaration: &Declaration, env: &Env, out: &mut String) {
    let compress = env.compress();
    out.push_str(&declaration.name);
    out.push_str(if compress { ":" } else { ": " });
    out.push_str(&declaration.value.to_string());
    if declaration.important {
        out.push_str(if compress { "!important" } else { " !important" });
    }
    if !(compress && env.last_rule) {
        out.push(';');
    }
}

fn emit_import(import: &Import, out: &mut String) {
    out.push_str("@import \"");
    out.push_str(&import.path);
    out.push_str("\";");
}

fn emit_comment(comment: &Comment, out: &mut String) {
    out.push_str(&comment.text);
}

fn emit_media(media: &Media, env: &mut Env, out: &mut String) {
    out.push_str("@media ");
    out.push_str(&media.features);
    emit_block(&media.rules, env, out);
}

fn emit_directive(directive: &Directive, env: &mut Env, out: &mut String) {
    out.push_str(&directive.name);
    if let Some(value) = &directive.value {
        out.push(' ');
        out.push_str(value);
    }
    match &directive.rules {
        Some(rules) => emit_block(rules, env, out),
        None => out.push(';'),
    }
}

/// Braces around a body rendered as its own root one level deeper.
fn emit_block(rules: &[Node], env: &mut Env, out: &mut String) {
    let level = env.tab_level;
    if env.compress() {
        out.push('{');
    } else {
        out.push_str(" {\n");
        out.push_str(&indent(env, level + 1));
    }
    env.tab_level += 1;
    emit_body(rules, None, true, false, env, out);
    env.tab_level = level;
    if env.compress() {
        out.push('}');
    } else {
        out.push('\n');
        out.push_str(&indent(env, level));
        out.push('}');
    }
}

fn emit_path(path: &[Selector], env: &mut Env, out: &mut String) {
    env.first_selector = true;
    for selector in path {
        emit_selector(selector, env, out);
        env.first_selector = false;
    }
}

fn emit_selector(selector: &Selector, env: &Env, out: &mut String) {
    let compress = env.compress();
    let mut elements = selector.elements.iter();
    if let Some(first) = elements.next() {
        match first.combinator {
            Combinator::None if !env.first_selector => out.push(' '),
            Combinator::Descendant if env.first_selector => {}
            combinator => out.push_str(combinator.as_css(compress)),
        }
        out.push_str(&first.value);
    }
    for element in elements {
        out.push_str(element.combinator.as_css(compress));
        out.push_str(&element.value);
    }
}

/// Renders one selector path on its own, as it appears in a header.
pub fn path_to_css(path: &[Selector], compress: bool) -> String {
    let mut env = Env::new(CompileOptions {
        compress,
        ..CompileOptions::default()
    });
    let mut out = String::new();
    emit_path(path, &mut env, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::JoinSelectors;
    use crate::visitor::Fold;
    use std::rc::Rc;

    fn ruleset(selectors: &str, rules: Vec<Node>) -> Node {
        Node::ruleset(Ruleset::new(Selector::list(selectors).unwrap(), rules))
    }

    fn render(rules: Vec<Node>, compress: bool) -> String {
        let root = JoinSelectors::new()
            .fold_ruleset(Ruleset::root(rules))
            .unwrap();
        let mut env = Env::new(CompileOptions {
            compress,
            ..CompileOptions::default()
        });
        emit_css(&root, &mut env)
    }

    #[test]
    fn nested_blocks_follow_their_parent() {
        let css = render(
            vec![ruleset(
                ".a",
                vec![
                    Node::declaration("color", "red"),
                    ruleset(".b", vec![Node::declaration("color", "blue")]),
                ],
            )],
            false,
        );
        assert_eq!(css, ".a {\n  color: red;\n}\n.a .b {\n  color: blue;\n}");
    }

    #[test]
    fn compact_mode_drops_whitespace_and_last_semicolon() {
        let css = render(
            vec![ruleset(
                ".a > .b",
                vec![
                    Node::declaration("color", "red"),
                    Node::declaration("margin", "0 auto"),
                ],
            )],
            true,
        );
        assert_eq!(css, ".a>.b{color:red;margin:0 auto}");
    }

    #[test]
    fn variables_and_empty_rulesets_are_not_rendered() {
        let css = render(
            vec![
                ruleset(".empty", vec![Node::declaration("@c", "red")]),
                ruleset(".a", vec![Node::declaration("color", "red")]),
            ],
            false,
        );
        assert_eq!(css, ".a {\n  color: red;\n}");
    }

    #[test]
    fn empty_document_renders_a_newline() {
        assert_eq!(render(Vec::new(), false), "\n");
        assert_eq!(render(Vec::new(), true), "");
    }

    #[test]
    fn comments_only_survive_compression_when_marked() {
        let comment = |text: &str| {
            Node::Comment(Comment {
                text: text.to_string(),
                silent: false,
            })
        };
        let rules = vec![comment("/* plain */"), comment("/*! keep */")];
        assert_eq!(render(rules.clone(), false), "/* plain */\n/*! keep */");
        assert_eq!(render(rules, true), "/*! keep */");
    }

    #[test]
    fn media_body_is_indented_one_level() {
        let media = Node::media(Media::new(
            "screen",
            vec![ruleset(".a", vec![Node::declaration("color", "red")])],
        ));
        assert_eq!(
            render(vec![media.clone()], false),
            "@media screen {\n  .a {\n    color: red;\n  }\n}"
        );
        assert_eq!(render(vec![media], true), "@media screen{.a{color:red}}");
    }

    #[test]
    fn directives_with_and_without_bodies() {
        let charset = Node::Directive(Directive {
            name: "@charset".to_string(),
            value: Some("\"utf-8\"".to_string()),
            rules: None,
            span: Default::default(),
        });
        let font_face = Node::Directive(Directive {
            name: "@font-face".to_string(),
            value: None,
            rules: Some(vec![Node::declaration("font-family", "Mono")]),
            span: Default::default(),
        });
        assert_eq!(
            render(vec![charset, font_face], false),
            "@charset \"utf-8\";\n@font-face {\n  font-family: Mono;\n}"
        );
    }

    #[test]
    fn imports_render_as_statements() {
        let css = render(
            vec![
                Node::Import(Import::new("reset.css")),
                ruleset(".a", vec![Node::declaration("color", "red")]),
            ],
            false,
        );
        assert_eq!(css, "@import \"reset.css\";\n.a {\n  color: red;\n}");
    }

    #[test]
    fn important_declarations() {
        let mut declaration = Declaration::new("color", "red");
        declaration.important = true;
        let rules = vec![ruleset(".a", vec![Node::Declaration(declaration)])];
        assert_eq!(render(rules.clone(), false), ".a {\n  color: red !important;\n}");
        assert_eq!(render(rules, true), ".a{color:red!important}");
    }

    #[test]
    fn unjoined_rulesets_render_by_selectors() {
        let source = Rc::new(Ruleset::root(vec![ruleset(
            ".a, .b > .c",
            vec![Node::declaration("color", "red")],
        )]));
        let mut env = Env::default();
        let compiled = source.compile(&mut env).unwrap();
        assert_eq!(
            emit_css(&compiled, &mut env),
            ".a,\n.b > .c {\n  color: red;\n}"
        );
    }
}
