//! Tree-sitter parsing capability.
//!
//! Wraps tree-sitter construction per spec.md §1: the engine consumes a parser
//! capability (the per-language tree-sitter grammars) but does not implement
//! grammar loading itself. [`SupportedLanguage`] is the closed set from the
//! data model (§3); [`CodeParser`] turns source text into a [`Tree`] for the
//! AST extractor ([`crate::unit`]) to walk.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use thiserror::Error;
use tree_sitter::{Language, Parser, Tree};

/// Closed set of languages the engine can extract code units from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportedLanguage {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Rust,
    Go,
    C,
    Cpp,
    CSharp,
}

impl SupportedLanguage {
    /// Stable tag used in file descriptors and stored records.
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportedLanguage::Python => "python",
            SupportedLanguage::JavaScript => "javascript",
            SupportedLanguage::TypeScript => "typescript",
            SupportedLanguage::Tsx => "typescript",
            SupportedLanguage::Rust => "rust",
            SupportedLanguage::Go => "go",
            SupportedLanguage::C => "c",
            SupportedLanguage::Cpp => "cpp",
            SupportedLanguage::CSharp => "csharp",
        }
    }

    pub fn tree_sitter_language(&self) -> Language {
        match self {
            SupportedLanguage::Python => tree_sitter_python::LANGUAGE.into(),
            SupportedLanguage::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            SupportedLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            SupportedLanguage::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            SupportedLanguage::Rust => tree_sitter_rust::LANGUAGE.into(),
            SupportedLanguage::Go => tree_sitter_go::LANGUAGE.into(),
            SupportedLanguage::C => tree_sitter_c::LANGUAGE.into(),
            SupportedLanguage::Cpp => tree_sitter_cpp::LANGUAGE.into(),
            SupportedLanguage::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        extension_map().get(ext.to_lowercase().as_str()).copied()
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn all_extensions() -> &'static [&'static str] {
        &[
            "py", "js", "mjs", "cjs", "ts", "tsx", "rs", "go", "c", "h", "cpp", "hpp", "cc", "cxx",
            "cs",
        ]
    }
}

impl std::fmt::Display for SupportedLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static EXTENSION_MAP: OnceLock<HashMap<&'static str, SupportedLanguage>> = OnceLock::new();

fn extension_map() -> &'static HashMap<&'static str, SupportedLanguage> {
    EXTENSION_MAP.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert("py", SupportedLanguage::Python);
        map.insert("js", SupportedLanguage::JavaScript);
        map.insert("mjs", SupportedLanguage::JavaScript);
        map.insert("cjs", SupportedLanguage::JavaScript);
        map.insert("ts", SupportedLanguage::TypeScript);
        map.insert("tsx", SupportedLanguage::Tsx);
        map.insert("rs", SupportedLanguage::Rust);
        map.insert("go", SupportedLanguage::Go);
        map.insert("c", SupportedLanguage::C);
        map.insert("h", SupportedLanguage::C);
        map.insert("cpp", SupportedLanguage::Cpp);
        map.insert("hpp", SupportedLanguage::Cpp);
        map.insert("cc", SupportedLanguage::Cpp);
        map.insert("cxx", SupportedLanguage::Cpp);
        map.insert("cs", SupportedLanguage::CSharp);
        map
    })
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("failed to set tree-sitter language: {0}")]
    LanguageSet(String),

    #[error("tree-sitter failed to produce a syntax tree")]
    ParseFailed,

    #[error("unsupported language for file: {0}")]
    UnsupportedLanguage(String),
}

/// A tree-sitter parser bound to one [`SupportedLanguage`].
pub struct CodeParser {
    parser: Parser,
    language: SupportedLanguage,
}

impl CodeParser {
    pub fn new(language: SupportedLanguage) -> Result<Self, ParserError> {
        let mut parser = Parser::new();
        parser
            .set_language(&language.tree_sitter_language())
            .map_err(|e| ParserError::LanguageSet(e.to_string()))?;
        Ok(Self { parser, language })
    }

    pub fn for_path(path: &Path) -> Result<Self, ParserError> {
        let language = SupportedLanguage::from_path(path)
            .ok_or_else(|| ParserError::UnsupportedLanguage(path.display().to_string()))?;
        Self::new(language)
    }

    pub fn language(&self) -> SupportedLanguage {
        self.language
    }

    /// Parse source text into a syntax tree.
    ///
    /// Per spec.md §4.3 failure mode, a `None` result from tree-sitter (rather
    /// than a panic) is the only parse failure this wrapper can observe; the
    /// extractor falls back to a file-only unit when this returns `Err`.
    pub fn parse(&mut self, source: &str) -> Result<Tree, ParserError> {
        self.parser
            .parse(source, None)
            .ok_or(ParserError::ParseFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn detects_language_from_extension() {
        assert_eq!(
            SupportedLanguage::from_extension("py"),
            Some(SupportedLanguage::Python)
        );
        assert_eq!(
            SupportedLanguage::from_extension("RS"),
            Some(SupportedLanguage::Rust)
        );
        assert_eq!(SupportedLanguage::from_extension("txt"), None);
    }

    #[test]
    fn detects_language_from_path() {
        let path = PathBuf::from("src/main.go");
        assert_eq!(
            SupportedLanguage::from_path(&path),
            Some(SupportedLanguage::Go)
        );
    }

    #[test]
    fn parses_simple_python() {
        let mut parser = CodeParser::new(SupportedLanguage::Python).unwrap();
        let tree = parser.parse("def f():\n    pass\n").unwrap();
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn unsupported_extension_errors() {
        let path = PathBuf::from("README.md");
        assert!(matches!(
            CodeParser::for_path(&path),
            Err(ParserError::UnsupportedLanguage(_))
        ));
    }
}
