//! Syntax Highlighting
//!
//! Tree-sitter based highlighting for the languages with a compiled-in
//! grammar, plus the highlight categories shared by every engine.

use tree_sitter::{Language, Parser, Query, QueryCursor, Tree};
use tracing::debug;

use crate::error::EditorError;

/// Highlight type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HighlightType {
    Keyword,
    String,
    Number,
    Comment,
    Function,
    Type,
    Operator,
    Annotation,
    Macro,
    Constant,
}

impl HighlightType {
    /// Convert from tree-sitter capture name
    pub fn from_capture_name(name: &str) -> Option<Self> {
        match name {
            "keyword" | "keyword.control" | "keyword.function" | "keyword.operator" => Some(Self::Keyword),
            "string" | "string.special" => Some(Self::String),
            "number" | "float" => Some(Self::Number),
            "comment" => Some(Self::Comment),
            "function" | "function.method" => Some(Self::Function),
            "type" | "type.builtin" => Some(Self::Type),
            "operator" => Some(Self::Operator),
            "attribute" | "annotation" => Some(Self::Annotation),
            "macro" => Some(Self::Macro),
            "constant" | "constant.builtin" | "boolean" => Some(Self::Constant),
            _ => None,
        }
    }

    /// Convert from a keyword or pattern category of a language configuration
    pub fn from_category(category: &str) -> Option<Self> {
        match category {
            "keyword" | "keywords" | "control" | "modifier" => Some(Self::Keyword),
            "type" | "types" => Some(Self::Type),
            "constant" | "constants" | "literal" => Some(Self::Constant),
            "builtin" | "builtins" | "function" => Some(Self::Function),
            "comment" => Some(Self::Comment),
            "string" | "char" => Some(Self::String),
            "number" => Some(Self::Number),
            "annotation" | "decorator" | "preprocessor" => Some(Self::Annotation),
            "operator" => Some(Self::Operator),
            "macro" => Some(Self::Macro),
            _ => None,
        }
    }

    /// Palette slot this type is painted with
    pub fn palette_slot(&self) -> &'static str {
        match self {
            Self::Keyword | Self::Constant => "keyword",
            Self::String => "string",
            Self::Number => "number",
            Self::Comment => "comment",
            Self::Function | Self::Macro => "function",
            Self::Type => "type",
            Self::Operator => "operator",
            Self::Annotation => "annotation",
        }
    }
}

/// A highlighted byte range in the text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightRange {
    pub start: usize,
    pub end: usize,
    pub highlight_type: HighlightType,
}

/// Languages with a compiled-in grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrammarLanguage {
    Kotlin,
    Java,
    Rust,
}

impl GrammarLanguage {
    fn tree_sitter_language(&self) -> Language {
        match self {
            GrammarLanguage::Kotlin => tree_sitter_kotlin::language(),
            GrammarLanguage::Java => tree_sitter_java::language(),
            GrammarLanguage::Rust => tree_sitter_rust::language(),
        }
    }

    fn highlight_query(&self) -> &'static str {
        match self {
            GrammarLanguage::Kotlin => KOTLIN_HIGHLIGHTS,
            GrammarLanguage::Java => JAVA_HIGHLIGHTS,
            GrammarLanguage::Rust => RUST_HIGHLIGHTS,
        }
    }

    /// Grammar for a normalized language name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "kotlin" => Some(GrammarLanguage::Kotlin),
            "java" => Some(GrammarLanguage::Java),
            "rust" => Some(GrammarLanguage::Rust),
            _ => None,
        }
    }

    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "kt" | "kts" => Some(GrammarLanguage::Kotlin),
            "java" => Some(GrammarLanguage::Java),
            "rs" => Some(GrammarLanguage::Rust),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GrammarLanguage::Kotlin => "kotlin",
            GrammarLanguage::Java => "java",
            GrammarLanguage::Rust => "rust",
        }
    }
}

/// Syntax highlighter using tree-sitter
pub struct GrammarHighlighter {
    parser: Parser,
    language: GrammarLanguage,
    query: Query,
    tree: Option<Tree>,
}

impl GrammarHighlighter {
    pub fn new(language: GrammarLanguage) -> Result<Self, EditorError> {
        let ts_language = language.tree_sitter_language();

        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| EditorError::Grammar(format!("{}: {}", language.name(), e)))?;

        let query = Query::new(&ts_language, language.highlight_query())
            .map_err(|e| EditorError::Grammar(format!("{} query: {}", language.name(), e)))?;

        debug!("Grammar highlighter ready for {}", language.name());

        Ok(Self {
            parser,
            language,
            query,
            tree: None,
        })
    }

    /// Parse `source` from scratch
    pub fn parse(&mut self, source: &str) {
        self.tree = self.parser.parse(source, None);
    }

    /// Highlights for the last parsed tree, sorted and non-overlapping
    pub fn highlights(&self, source: &str) -> Vec<HighlightRange> {
        let Some(tree) = &self.tree else {
            return Vec::new();
        };

        let mut highlights = Vec::new();
        let mut cursor = QueryCursor::new();
        let capture_names = self.query.capture_names();

        for match_ in cursor.matches(&self.query, tree.root_node(), source.as_bytes()) {
            for capture in match_.captures {
                let name = &capture_names[capture.index as usize];
                if let Some(highlight_type) = HighlightType::from_capture_name(name) {
                    highlights.push(HighlightRange {
                        start: capture.node.start_byte(),
                        end: capture.node.end_byte(),
                        highlight_type,
                    });
                }
            }
        }

        // Outer nodes first so a string wins over anything inside it
        highlights.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
        let mut resolved: Vec<HighlightRange> = Vec::with_capacity(highlights.len());
        for range in highlights {
            if resolved.last().map_or(true, |last| range.start >= last.end) {
                resolved.push(range);
            }
        }
        resolved
    }

    /// Parse then highlight
    pub fn highlight(&mut self, source: &str) -> Vec<HighlightRange> {
        self.parse(source);
        self.highlights(source)
    }

    pub fn language(&self) -> GrammarLanguage {
        self.language
    }

    pub fn has_tree(&self) -> bool {
        self.tree.is_some()
    }
}

const KOTLIN_HIGHLIGHTS: &str = r#"
"fun" @keyword.function
"val" @keyword
"var" @keyword
"class" @keyword
"object" @keyword
"interface" @keyword
"package" @keyword
"import" @keyword
"if" @keyword.control
"else" @keyword.control
"when" @keyword.control
"for" @keyword.control
"while" @keyword.control
"return" @keyword.control

(type_identifier) @type
(function_declaration (simple_identifier) @function)
(annotation) @attribute

(integer_literal) @number
(real_literal) @number
(boolean_literal) @constant.builtin
"null" @constant.builtin

(string_literal) @string
(character_literal) @string

(line_comment) @comment
(multiline_comment) @comment
"#;

const JAVA_HIGHLIGHTS: &str = r#"
"class" @keyword
"interface" @keyword
"enum" @keyword
"extends" @keyword
"implements" @keyword
"import" @keyword
"package" @keyword
"public" @keyword
"private" @keyword
"protected" @keyword
"static" @keyword
"final" @keyword
"new" @keyword
"if" @keyword.control
"else" @keyword.control
"for" @keyword.control
"while" @keyword.control
"return" @keyword.control
"try" @keyword.control
"catch" @keyword.control
"throw" @keyword.control

(type_identifier) @type
(integral_type) @type.builtin
(floating_point_type) @type.builtin
(boolean_type) @type.builtin
(void_type) @type.builtin

(method_declaration name: (identifier) @function)
(method_invocation name: (identifier) @function)
(marker_annotation) @attribute
(annotation) @attribute

(decimal_integer_literal) @number
(decimal_floating_point_literal) @number
(true) @constant.builtin
(false) @constant.builtin
(null_literal) @constant.builtin

(string_literal) @string
(character_literal) @string

(line_comment) @comment
(block_comment) @comment
"#;

const RUST_HIGHLIGHTS: &str = r#"
"fn" @keyword.function
"let" @keyword
(mutable_specifier) @keyword
"const" @keyword
"static" @keyword
"pub" @keyword
"mod" @keyword
"use" @keyword
"struct" @keyword
"enum" @keyword
"trait" @keyword
"impl" @keyword
"if" @keyword.control
"else" @keyword.control
"match" @keyword.control
"for" @keyword.control
"while" @keyword.control
"loop" @keyword.control
"return" @keyword.control

(type_identifier) @type
(primitive_type) @type.builtin

(function_item name: (identifier) @function)
(call_expression function: (identifier) @function)
(macro_invocation macro: (identifier) @macro)
(attribute_item) @attribute

(integer_literal) @number
(float_literal) @number
(boolean_literal) @constant.builtin

(string_literal) @string
(char_literal) @string

(line_comment) @comment
(block_comment) @comment
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn types_of(source: &str, language: GrammarLanguage) -> Vec<(String, HighlightType)> {
        let mut highlighter = GrammarHighlighter::new(language).unwrap();
        highlighter
            .highlight(source)
            .into_iter()
            .map(|h| (source[h.start..h.end].to_string(), h.highlight_type))
            .collect()
    }

    #[test]
    fn test_rust_highlights() {
        let found = types_of("fn main() {\n    // hi\n    let x = 42;\n}\n", GrammarLanguage::Rust);
        assert!(found.contains(&("fn".into(), HighlightType::Keyword)));
        assert!(found.contains(&("main".into(), HighlightType::Function)));
        assert!(found.contains(&("// hi".into(), HighlightType::Comment)));
        assert!(found.contains(&("42".into(), HighlightType::Number)));
    }

    #[test]
    fn test_kotlin_highlights() {
        let found = types_of("// greet\nfun greet() = \"hi\"\n", GrammarLanguage::Kotlin);
        assert!(found.iter().any(|(_, t)| *t == HighlightType::Comment));
        assert!(found.contains(&("fun".into(), HighlightType::Keyword)));
    }

    #[test]
    fn test_java_highlights() {
        let found = types_of("class A { /* c */ int f() { return 1; } }", GrammarLanguage::Java);
        assert!(found.contains(&("class".into(), HighlightType::Keyword)));
        assert!(found.contains(&("/* c */".into(), HighlightType::Comment)));
        assert!(found.contains(&("f".into(), HighlightType::Function)));
    }

    #[test]
    fn test_every_grammar_builds() {
        for language in [GrammarLanguage::Kotlin, GrammarLanguage::Java, GrammarLanguage::Rust] {
            let highlighter = GrammarHighlighter::new(language);
            assert!(highlighter.is_ok(), "{}: {:?}", language.name(), highlighter.err());
        }
    }

    #[test]
    fn test_rust_mut_is_keyword() {
        let found = types_of("fn f() { let mut n = 1; }", GrammarLanguage::Rust);
        assert!(found.contains(&("mut".into(), HighlightType::Keyword)));
        assert!(found.contains(&("let".into(), HighlightType::Keyword)));
    }

    #[test]
    fn test_ranges_do_not_overlap() {
        let mut highlighter = GrammarHighlighter::new(GrammarLanguage::Rust).unwrap();
        let ranges = highlighter.highlight("#[derive(Debug)]\nstruct S(u8);\nfn f() { println!(\"{}\", 1); }");
        for pair in ranges.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn test_no_tree_no_highlights() {
        let highlighter = GrammarHighlighter::new(GrammarLanguage::Java).unwrap();
        assert!(!highlighter.has_tree());
        assert!(highlighter.highlights("class A {}").is_empty());
    }

    #[test]
    fn test_language_lookup() {
        assert_eq!(GrammarLanguage::from_extension(".KT"), Some(GrammarLanguage::Kotlin));
        assert_eq!(GrammarLanguage::from_name("rust"), Some(GrammarLanguage::Rust));
        assert_eq!(GrammarLanguage::from_name("python"), None);
    }
}
