use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_MAX_MIXIN_DEPTH: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompileOptions {
    /// Render without newlines or indentation.
    pub compress: bool,
    /// Only expand imports at the root and in rulesets that allow them.
    pub strict_imports: bool,
    pub max_mixin_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            compress: false,
            strict_imports: false,
            max_mixin_depth: DEFAULT_MAX_MIXIN_DEPTH,
        }
    }
}

impl CompileOptions {
    /// Load options from a JSON file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures/options")
            .join(name)
    }

    #[test]
    fn missing_keys_keep_defaults() {
        let options: CompileOptions = serde_json::from_str(r#"{ "compress": true }"#).unwrap();
        assert!(options.compress);
        assert!(!options.strict_imports);
        assert_eq!(options.max_mixin_depth, DEFAULT_MAX_MIXIN_DEPTH);
    }

    #[test]
    fn load_from_file() {
        let options = CompileOptions::load(&fixture("strict.json")).unwrap();
        assert!(options.strict_imports);
        assert_eq!(options.max_mixin_depth, 8);
    }

    #[test]
    fn missing_file_error() {
        let error = CompileOptions::load(&fixture("missing.json")).unwrap_err();
        assert!(matches!(error, ConfigError::Read { .. }));
    }

    #[test]
    fn invalid_json_error() {
        let error = CompileOptions::load(&fixture("invalid.json")).unwrap_err();
        assert!(matches!(error, ConfigError::Parse { .. }));
        assert!(error.to_string().contains("invalid.json"));
    }
}
