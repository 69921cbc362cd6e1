//! Compiled SQL text patterns for sqlforge
//! Kept in a separate crate so the regex set is compiled once and shared

use once_cell::sync::Lazy;
use regex::Regex;

/// Creation-statement patterns (`CREATE OR REPLACE TABLE ...`)
pub mod statement {
    use super::*;

    /// The canonical keyword sequence every normalized script starts with.
    pub const CREATION_KEYWORDS: &str = "CREATE OR REPLACE TABLE";

    pub static CREATION_MARKER: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)CREATE\s+OR\s+REPLACE\s+TABLE").expect("Invalid regex pattern")
    });

    pub static SELECT_KEYWORD: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\bSELECT\b").expect("Invalid regex pattern"));

    pub static QUOTED_TARGET: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)CREATE\s+OR\s+REPLACE\s+TABLE\s*`([^`]+)`")
            .expect("Invalid regex pattern")
    });

    pub static BARE_TARGET: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)CREATE\s+OR\s+REPLACE\s+TABLE\s+([A-Za-z0-9_][A-Za-z0-9_.\-]*)")
            .expect("Invalid regex pattern")
    });

    /// Where the query of a creation statement begins
    pub static PROJECTION_START: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\b(?:SELECT|WITH)\b").expect("Invalid regex pattern"));

    /// Table name right after a creation marker, backticked or bare
    pub static LEADING_TARGET: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^\s*(`[^`\n]*`|[A-Za-z0-9_][A-Za-z0-9_.\-]*)").expect("Invalid regex pattern")
    });

    pub static LEADING_AS: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)^\s*AS\b").expect("Invalid regex pattern"));

    /// Closing `AS` of a statement head plus the spacing and parentheses that
    /// open the query; matches empty when the head has no `AS`
    pub static HEAD_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)(\bAS\b)?([\s(]*)$").expect("Invalid regex pattern")
    });

    /// Words that can follow the marker in place of a table name
    const HEAD_KEYWORDS: &[&str] = &["AS", "OPTIONS", "PARTITION", "CLUSTER", "SELECT", "WITH"];

    /// Table named at the start of `head` and the byte offset where it ends
    pub fn leading_target(head: &str) -> Option<(&str, usize)> {
        let caps = LEADING_TARGET.captures(head)?;
        let token = caps.get(1)?;
        if HEAD_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(token.as_str())) {
            return None;
        }
        Some((token.as_str(), token.end()))
    }

    /// Number of creation markers in the text
    pub fn count_creations(text: &str) -> usize {
        CREATION_MARKER.find_iter(text).count()
    }

    /// Table named by the first creation statement, backticked form first
    pub fn creation_target(text: &str) -> Option<String> {
        if let Some(caps) = QUOTED_TARGET.captures(text) {
            return caps.get(1).map(|m| m.as_str().trim().to_string());
        }

        BARE_TARGET
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|name| !name.eq_ignore_ascii_case("AS"))
    }
}

/// Identifier shapes
pub mod identifier {
    use super::*;

    pub static DOTTED_PATH: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^[A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+)+$").expect("Invalid regex pattern")
    });

    /// Two or more bare identifier segments joined by `.`
    pub fn is_dotted_path(text: &str) -> bool {
        DOTTED_PATH.is_match(text)
    }

    pub fn is_identifier_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_'
    }
}

/// Markdown fence handling
pub mod fence {
    use super::*;

    pub const MARKER: &str = "```";

    pub static LANGUAGE_TAG: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^(?i)(?:sql|googlesql|bigquery)\b").expect("Invalid regex pattern")
    });

    /// Remove a leading dialect tag left over from an inline fence
    pub fn strip_language_tag(text: &str) -> &str {
        match LANGUAGE_TAG.find(text) {
            Some(m) => &text[m.end()..],
            None => text,
        }
    }
}

/// Projection-list shapes
pub mod projection {
    use super::*;

    /// `<default> AS <alias>` where the default is a literal placeholder:
    /// `NULL`, `0`, `FALSE`, `[]`, `''`, `""`, or one of those under `CAST`.
    /// Group 1 is the default, group 2 or 3 the alias.
    pub static DEFAULTED_ALIAS: Lazy<Regex> = Lazy::new(|| {
        Regex::new(concat!(
            r#"(?i)(?:^|[^\w.])"#,
            r#"((?:SAFE_)?CAST\s*\(\s*(?:NULL|0|FALSE|''|""|\[\])\s+AS\s+[^)]*\)"#,
            r#"|NULL|0|FALSE|\[\]|''|"")"#,
            r#"\s+AS\s+(?:`([^`]+)`|([A-Za-z_]\w*))"#,
        ))
        .expect("Invalid regex pattern")
    });

    /// Opening of a `STRUCT(...)` or `ARRAY(...)` constructor, type parameters allowed
    pub static CONSTRUCTOR_OPEN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)\b(?:STRUCT|ARRAY)\s*(?:<[^()]*?>)?\s*\(").expect("Invalid regex pattern")
    });

    /// Alias following a closed constructor, optionally inside `[...]`
    pub static TRAILING_ALIAS: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)^\s*\]?\s*AS\s+(?:`([^`]+)`|([A-Za-z_]\w*))")
            .expect("Invalid regex pattern")
    });

    /// Alias captured by either alternative of an alias pattern
    pub fn alias<'t>(caps: &regex::Captures<'t>, quoted: usize, bare: usize) -> Option<&'t str> {
        caps.get(quoted).or_else(|| caps.get(bare)).map(|m| m.as_str())
    }
}

/// Warehouse diagnostic patterns
pub mod diagnostic {
    use super::*;

    pub static INVALID_FIELD_REFERENCE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)Invalid field reference\s+'([^']+)'").expect("Invalid regex pattern")
    });

    pub static FIELD_DOES_NOT_EXIST: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)Field does not exist").expect("Invalid regex pattern"));

    pub static INVALID_FIELD_NAME: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#"(?i)Invalid field name\s+"([^"]+)""#).expect("Invalid regex pattern")
    });

    pub static UNRECOGNIZED_NAME: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)Unrecognized name:\s*([A-Za-z0-9_.]+)").expect("Invalid regex pattern")
    });

    pub static SYNTAX_ERROR: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)Syntax error:\s*([^\[\n]+)").expect("Invalid regex pattern")
    });

    pub static LOCATION: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\[at (\d+:\d+)\]").expect("Invalid regex pattern"));

    pub static SYNTAX_PHRASES: Lazy<Regex> = Lazy::new(|| {
        Regex::new(concat!(
            r"(?i)syntax error|invalid syntax|unrecognized name|column not found",
            r"|expected .+ but got|unclosed|unexpected",
        ))
        .expect("Invalid regex pattern")
    });

    /// Field named by a "field does not exist" diagnostic
    pub fn missing_field(text: &str) -> Option<String> {
        if !FIELD_DOES_NOT_EXIST.is_match(text) {
            return None;
        }

        INVALID_FIELD_REFERENCE
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    pub fn looks_like_syntax_error(text: &str) -> bool {
        SYNTAX_PHRASES.is_match(text)
    }

    /// First capture group of `pattern` in `text`
    pub fn capture(pattern: &Regex, text: &str) -> Option<String> {
        pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_creations() {
        let text =
            "create or replace table a AS SELECT 1;\nCREATE  OR\nREPLACE TABLE b AS SELECT 2;";
        assert_eq!(statement::count_creations(text), 2);
        assert_eq!(statement::count_creations("SELECT 1"), 0);
    }

    #[test]
    fn test_creation_target() {
        assert_eq!(
            statement::creation_target("CREATE OR REPLACE TABLE `p.d.t` AS SELECT 1"),
            Some("p.d.t".to_string())
        );
        assert_eq!(
            statement::creation_target("CREATE OR REPLACE TABLE p.d.t AS SELECT 1"),
            Some("p.d.t".to_string())
        );
        assert_eq!(statement::creation_target("CREATE OR REPLACE TABLE AS SELECT 1"), None);
        assert_eq!(statement::creation_target("SELECT 1"), None);
    }

    #[test]
    fn test_leading_target() {
        assert_eq!(statement::leading_target(" `p.d.t` AS SELECT"), Some(("`p.d.t`", 8)));
        assert_eq!(statement::leading_target("\n p.d.t\nOPTIONS()"), Some(("p.d.t", 7)));
        assert_eq!(statement::leading_target(" AS SELECT"), None);
        assert_eq!(statement::leading_target(" partition by d"), None);
    }

    #[test]
    fn test_head_boundary() {
        let boundary = |s: &str| {
            let caps = statement::HEAD_BOUNDARY.captures(s).unwrap();
            (caps.get(1).is_some(), caps.get(2).map_or("", |m| m.as_str()).to_string())
        };
        assert_eq!(boundary(" t OPTIONS(a='b') AS "), (true, " ".to_string()));
        assert_eq!(boundary(" t AS (\n  "), (true, " (\n  ".to_string()));
        assert_eq!(boundary(" t "), (false, " ".to_string()));
        assert_eq!(boundary(" tAS"), (false, String::new()));
    }

    #[test]
    fn test_defaulted_alias() {
        let aliases = |s: &str| -> Vec<(String, String)> {
            projection::DEFAULTED_ALIAS
                .captures_iter(s)
                .map(|c| {
                    let alias = projection::alias(&c, 2, 3).unwrap_or_default();
                    (c[1].to_string(), alias.to_string())
                })
                .collect()
        };
        assert_eq!(
            aliases("SELECT NULL AS description, '' AS `title`, CAST(NULL AS STRING) AS name"),
            vec![
                ("NULL".to_string(), "description".to_string()),
                ("''".to_string(), "title".to_string()),
                ("CAST(NULL AS STRING)".to_string(), "name".to_string()),
            ]
        );
        assert!(aliases("SELECT IFNULL(x, 0) AS qty, 1.0 AS ratio, 10 AS n").is_empty());
    }

    #[test]
    fn test_constructor_open() {
        assert!(projection::CONSTRUCTOR_OPEN.is_match("STRUCT(NULL AS price)"));
        assert!(projection::CONSTRUCTOR_OPEN.is_match("STRUCT<a STRING, b ARRAY<INT64>>(x, y)"));
        assert!(projection::CONSTRUCTOR_OPEN.is_match("ARRAY (SELECT AS STRUCT 1 AS x)"));
        assert!(!projection::CONSTRUCTOR_OPEN.is_match("SELECT AS STRUCT 1"));
    }

    #[test]
    fn test_dotted_path() {
        assert!(identifier::is_dotted_path("source.priceInfo.cost"));
        assert!(identifier::is_dotted_path("a.b"));
        assert!(!identifier::is_dotted_path("cost"));
        assert!(!identifier::is_dotted_path("my-project.ds.t"));
        assert!(!identifier::is_dotted_path("a..b"));
    }

    #[test]
    fn test_strip_language_tag() {
        assert_eq!(fence::strip_language_tag("sql SELECT 1"), " SELECT 1");
        assert_eq!(fence::strip_language_tag("SELECT 1"), "SELECT 1");
        assert_eq!(fence::strip_language_tag("sqlish"), "sqlish");
    }

    #[test]
    fn test_missing_field() {
        let text = "Invalid field reference 'colorFamilies'. Field does not exist in source";
        assert_eq!(diagnostic::missing_field(text), Some("colorFamilies".to_string()));
        assert_eq!(diagnostic::missing_field("Invalid field reference 'x'"), None);
    }

    #[test]
    fn test_syntax_phrases() {
        assert!(diagnostic::looks_like_syntax_error(
            "Syntax error: Expected end of input but got keyword AS [at 5:1]"
        ));
        assert!(diagnostic::looks_like_syntax_error("Unrecognized name: foo [at 1:8]"));
        assert!(!diagnostic::looks_like_syntax_error("Access Denied: Table p:d.t"));
    }
}
