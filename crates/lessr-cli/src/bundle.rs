use anyhow::{Context, Result};
use lessr_core::{ImportTable, Node};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// A parsed document plus the parsed content of every path it may import.
#[derive(Debug, Deserialize)]
pub struct Bundle {
    pub rules: Vec<Node>,
    #[serde(default)]
    pub imports: FxHashMap<String, Vec<Node>>,
}

impl Bundle {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse rule tree {}", path.display()))
    }

    pub fn into_parts(self) -> (Vec<Node>, ImportTable) {
        (self.rules, self.imports.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessr_core::{compile_to_css, CompileOptions};
    use std::path::PathBuf;

    fn fixture_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
    }

    #[test]
    fn compile_bundle_with_imports() {
        let bundle = Bundle::load(&fixture_dir().join("button.json")).expect("load bundle");
        assert_eq!(bundle.imports.len(), 1);

        let (rules, imports) = bundle.into_parts();
        let css = compile_to_css(rules, CompileOptions::default(), Some(imports)).unwrap();
        assert_eq!(
            css,
            ".button {\n  color: #336699;\n}\n.button:hover {\n  color: #6699cc;\n}"
        );
    }

    #[test]
    fn imports_are_optional() {
        let bundle = Bundle::load(&fixture_dir().join("plain.json")).expect("load bundle");
        assert!(bundle.imports.is_empty());
        assert_eq!(bundle.rules.len(), 1);
    }

    #[test]
    fn invalid_tree_error() {
        let err = Bundle::load(&fixture_dir().join("invalid.json")).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse rule tree"));
    }

    #[test]
    fn missing_file_error() {
        let err = Bundle::load(&fixture_dir().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
