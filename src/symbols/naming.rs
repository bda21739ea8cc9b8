//! Naming Utilities
//!
//! Case conversion, keyword escaping, and counter-based disambiguation.

use std::collections::BTreeSet;

// =============================================================================
// Keywords and Reserved Names
// =============================================================================

const RUST_KEYWORDS: &[&str] = &[
    "as", "break", "const", "continue", "crate", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "pub", "ref", "return", "self", "Self", "static", "struct",
    "super", "trait", "true", "type", "unsafe", "use", "where", "while",
    "async", "await", "dyn", "abstract", "become", "box", "do", "final",
    "macro", "override", "priv", "typeof", "unsized", "virtual", "yield", "try",
];

/// Keywords that cannot be raw identifiers
const NON_RAW_KEYWORDS: &[&str] = &["self", "Self", "super", "crate"];

/// Type names the generated crate already uses or imports
pub const RESERVED_TYPE_NAMES: &[&str] = &[
    // std and prelude
    "String", "Vec", "Option", "Result", "Box", "Some", "None", "Ok", "Err",
    "HashMap", "Default", "Debug", "Clone", "Copy", "PartialEq", "Send", "Sync",
    "Self",
    // generated runtime
    "Blob", "DateTime", "Document", "BigInteger", "BigDecimal", "TimestampFormat",
    "HttpRequest", "HttpResponse", "HttpConnector", "Client", "Config", "Error",
    "SdkError", "BuildError", "ConnectorError", "ResolveEndpointError", "Unhandled",
    "Endpoint", "Params", "Builder",
];

/// Items of the generated `error` module that are not derived from shapes
pub const ERROR_RUNTIME_NAMES: &[&str] = &[
    "BuildError", "ConnectorError", "ErrorMetadata", "ProvideErrorCode", "SdkError", "Unhandled",
];

/// Member names that clash with generated builder and fluent methods
const RESERVED_MEMBER_NAMES: &[&str] = &["build", "builder", "send", "customize"];

pub fn is_rust_keyword(s: &str) -> bool {
    RUST_KEYWORDS.contains(&s)
}

/// Escape a field or function name that is a keyword
///
/// `type` becomes `r#type`; `self`, `Self`, `super` and `crate` cannot be
/// raw identifiers and get a trailing underscore instead.
pub fn escape_keyword(name: &str) -> String {
    if NON_RAW_KEYWORDS.contains(&name) {
        format!("{}_", name)
    } else if is_rust_keyword(name) {
        format!("r#{}", name)
    } else {
        name.to_string()
    }
}

/// Field name for a member: snake_case, reserved builder names suffixed,
/// keywords escaped
pub fn field_name(member: &str) -> String {
    let snake = to_snake_case(member);
    if RESERVED_MEMBER_NAMES.contains(&snake.as_str()) {
        return format!("{}_value", snake);
    }
    escape_keyword(&snake)
}

/// Enum or union variant name. `Self` is the only keyword PascalCase can
/// produce and it cannot be escaped, so keywords take a `Value` suffix.
pub fn variant_name(pascal: String) -> String {
    if is_rust_keyword(&pascal) {
        format!("{}Value", pascal)
    } else {
        pascal
    }
}

/// Strip a raw-identifier prefix (`r#type` → `type`), for building derived names
pub fn unescaped(ident: &str) -> &str {
    ident.strip_prefix("r#").unwrap_or(ident)
}

// =============================================================================
// Word Splitting
// =============================================================================

/// Split an identifier into words on separators and case humps.
///
/// `HTTPServerError` → `HTTP`, `Server`, `Error`; `cityId` → `city`, `Id`;
/// `t2.micro` → `t2`, `micro`.
pub fn split_words(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_ascii_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).map(|n| n.is_ascii_lowercase()).unwrap_or(false);
            let hump = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower);
            if hump {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

// =============================================================================
// Case Conversion
// =============================================================================

/// Converts names to Rust casing, preserving configured acronyms
#[derive(Debug, Clone, Default)]
pub struct CaseConverter {
    acronyms: BTreeSet<String>,
}

impl CaseConverter {
    pub fn new(acronyms: &BTreeSet<String>) -> Self {
        Self {
            acronyms: acronyms.iter().map(|a| a.to_uppercase()).collect(),
        }
    }

    /// Convert to PascalCase
    pub fn pascal(&self, s: &str) -> String {
        let result: String = split_words(s).iter().map(|w| self.case_word(w)).collect();
        if result.is_empty() {
            "Value".to_string()
        } else if result.starts_with(|c: char| c.is_ascii_digit()) {
            format!("Value{}", result)
        } else {
            result
        }
    }

    /// Apply casing to a word, preserving acronyms
    fn case_word(&self, word: &str) -> String {
        let upper = word.to_uppercase();
        if self.acronyms.contains(&upper) {
            return upper;
        }
        let mut chars = word.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => {
                let mut result = first.to_ascii_uppercase().to_string();
                for c in chars {
                    result.push(c.to_ascii_lowercase());
                }
                result
            }
        }
    }
}

/// Convert to snake_case. Keywords are not escaped here.
pub fn to_snake_case(s: &str) -> String {
    let result = split_words(s)
        .iter()
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_");
    if result.is_empty() {
        "value".to_string()
    } else if result.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{}", result)
    } else {
        result
    }
}

/// Convert to SCREAMING_SNAKE_CASE
pub fn to_screaming_snake_case(s: &str) -> String {
    to_snake_case(s).trim_start_matches('_').to_ascii_uppercase()
}

// =============================================================================
// Collision Handling
// =============================================================================

/// Hands out names unique within one namespace.
///
/// Uniqueness is case-insensitive. The first request for a name gets it
/// unchanged; later requests get the name plus a counter starting at 2,
/// skipping any candidate already taken.
#[derive(Debug, Clone, Default)]
pub struct NameAllocator {
    taken: BTreeSet<String>,
    separator: &'static str,
}

impl NameAllocator {
    /// Allocator for type names (`Foo`, `Foo2`, ...)
    pub fn for_types() -> Self {
        Self {
            taken: BTreeSet::new(),
            separator: "",
        }
    }

    /// Allocator for snake_case names (`foo`, `foo_2`, ...)
    pub fn for_fields() -> Self {
        Self {
            taken: BTreeSet::new(),
            separator: "_",
        }
    }

    fn key(name: &str) -> String {
        unescaped(name).to_lowercase()
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(&Self::key(name))
    }

    /// Mark a name as used without allocating it
    pub fn reserve(&mut self, name: &str) {
        self.taken.insert(Self::key(name));
    }

    /// Returns the unique name and whether it had to be disambiguated
    pub fn allocate(&mut self, base: &str) -> (String, bool) {
        if !self.is_taken(base) {
            self.reserve(base);
            return (base.to_string(), false);
        }
        // a counter suffix is never a keyword, so escaping is dropped
        let stem = unescaped(base);
        let mut counter = 2usize;
        loop {
            let candidate = format!("{}{}{}", stem, self.separator, counter);
            if !self.is_taken(&candidate) {
                self.reserve(&candidate);
                return (candidate, true);
            }
            counter += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter(acronyms: &[&str]) -> CaseConverter {
        CaseConverter::new(&acronyms.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("HTTPServerError"), vec!["HTTP", "Server", "Error"]);
        assert_eq!(split_words("cityId"), vec!["city", "Id"]);
        assert_eq!(split_words("t2.micro"), vec!["t2", "micro"]);
        assert_eq!(split_words("SCREAMING_SNAKE"), vec!["SCREAMING", "SNAKE"]);
        assert_eq!(split_words("V2Thing"), vec!["V2", "Thing"]);
    }

    #[test]
    fn test_to_pascal_case() {
        let c = converter(&[]);
        assert_eq!(c.pascal("hello_world"), "HelloWorld");
        assert_eq!(c.pascal("HelloWorld"), "HelloWorld");
        assert_eq!(c.pascal("hello-world"), "HelloWorld");
        assert_eq!(c.pascal("PENDING"), "Pending");
        assert_eq!(c.pascal("t2.micro"), "T2Micro");
        assert_eq!(c.pascal("1st"), "Value1st");
    }

    #[test]
    fn test_acronym_preservation() {
        let c = converter(&["ID", "URL"]);
        assert_eq!(c.pascal("CityId"), "CityID");
        assert_eq!(c.pascal("base_url"), "BaseURL");
        assert_eq!(c.pascal("Identity"), "Identity");
    }

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("HelloWorld"), "hello_world");
        assert_eq!(to_snake_case("helloWorld"), "hello_world");
        assert_eq!(to_snake_case("UseFIPS"), "use_fips");
        assert_eq!(to_snake_case("type"), "type");
        assert_eq!(to_screaming_snake_case("getForecast"), "GET_FORECAST");
    }

    #[test]
    fn test_keyword_escape() {
        assert_eq!(escape_keyword("type"), "r#type");
        assert_eq!(escape_keyword("self"), "self_");
        assert_eq!(escape_keyword("crate"), "crate_");
        assert_eq!(escape_keyword("name"), "name");
        assert_eq!(field_name("Type"), "r#type");
        assert_eq!(field_name("build"), "build_value");
    }

    #[test]
    fn test_keyword_variants_are_suffixed() {
        let c = converter(&[]);
        assert_eq!(variant_name(c.pascal("SELF")), "SelfValue");
        assert_eq!(variant_name(c.pascal("type")), "Type");
    }

    #[test]
    fn test_allocator_counts_from_two_case_insensitively() {
        let mut names = NameAllocator::for_types();
        assert_eq!(names.allocate("Foo"), ("Foo".to_string(), false));
        assert_eq!(names.allocate("FOO"), ("FOO2".to_string(), true));
        names.reserve("Foo3");
        assert_eq!(names.allocate("foo"), ("foo4".to_string(), true));
    }

    #[test]
    fn test_field_allocator_drops_escape_on_suffix() {
        let mut fields = NameAllocator::for_fields();
        assert_eq!(fields.allocate("r#type").0, "r#type");
        assert_eq!(fields.allocate("r#type").0, "type_2");
    }
}
