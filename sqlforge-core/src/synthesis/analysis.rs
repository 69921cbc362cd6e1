//! Which destination fields a script fills with a placeholder
//!
//! A backend that cannot map a destination field projects a literal default
//! for it (`NULL AS description`, `STRUCT(NULL AS price) AS priceInfo`).
//! Scanning for those tells the caller which fields still need a source.

use super::schema::{SchemaDescriptor, SchemaField};
use serde::{Deserialize, Serialize};
use sql_patterns::projection::{CONSTRUCTOR_OPEN, DEFAULTED_ALIAS, TRAILING_ALIAS, alias};
use sql_patterns::statement::PROJECTION_START;
use tracing::info;

/// A destination field projected as a literal default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultedField {
    /// Dotted path from the top of the schema, e.g. `priceInfo.price`
    pub path: String,
    /// The default as written in the script
    pub default: String,
}

/// Destination fields the script defaults, in schema order.
///
/// Top-level fields are matched in the outermost projection; children of
/// `RECORD` fields inside the `STRUCT(...)`/`ARRAY(...)` aliased to their
/// parent. A record defaulted as a whole is reported once, not per child.
pub fn defaulted_fields(script: &str, schema: &SchemaDescriptor) -> Vec<DefaultedField> {
    let base = PROJECTION_START
        .find_iter(script)
        .map(|m| m.start())
        .find(|&pos| !Nesting::at(script, pos).quoted)
        .map_or(0, |pos| Nesting::at(script, pos).depth);

    let mut found = Vec::new();
    scan(script, base, &schema.fields, "", &mut found);

    if !found.is_empty() {
        let paths: Vec<&str> = found.iter().map(|f| f.path.as_str()).collect();
        info!("{} destination field(s) defaulted: {}", found.len(), paths.join(", "));
    }
    found
}

fn scan(
    scope: &str,
    depth: usize,
    fields: &[SchemaField],
    parent: &str,
    found: &mut Vec<DefaultedField>,
) {
    let defaults = defaults_at(scope, depth);

    for field in fields {
        let path = if parent.is_empty() {
            field.name.clone()
        } else {
            format!("{}.{}", parent, field.name)
        };

        let default = defaults.iter().find(|(name, _)| name.eq_ignore_ascii_case(&field.name));
        if let Some((_, default)) = default {
            if !found.iter().any(|f| f.path == path) {
                found.push(DefaultedField { path, default: default.to_string() });
            }
        } else if field.is_record() {
            for body in constructor_bodies(scope, depth, &field.name) {
                scan(body, 0, &field.fields, &path, found);
            }
        }
    }
}

/// `(alias, default)` pairs at exactly `depth` parentheses inside `scope`
fn defaults_at(scope: &str, depth: usize) -> Vec<(&str, &str)> {
    DEFAULTED_ALIAS
        .captures_iter(scope)
        .filter_map(|caps| {
            let default = caps.get(1)?;
            let name = alias(&caps, 2, 3)?;
            let nesting = Nesting::at(scope, default.start());
            (!nesting.quoted && nesting.depth == depth).then_some((name, default.as_str()))
        })
        .collect()
}

/// Contents of every constructor at `depth` whose alias is `name`
fn constructor_bodies<'s>(scope: &'s str, depth: usize, name: &str) -> Vec<&'s str> {
    CONSTRUCTOR_OPEN
        .find_iter(scope)
        .filter(|m| {
            let nesting = Nesting::at(scope, m.start());
            !nesting.quoted && nesting.depth == depth
        })
        .filter_map(|m| {
            let open = m.end() - 1;
            let close = matching_paren(scope, open)?;
            let caps = TRAILING_ALIAS.captures(&scope[close + 1..])?;
            alias(&caps, 1, 2)
                .filter(|found| found.eq_ignore_ascii_case(name))
                .map(|_| &scope[open + 1..close])
        })
        .collect()
}

/// Parenthesis depth and quoting at one byte offset
struct Nesting {
    depth: usize,
    quoted: bool,
}

impl Nesting {
    fn at(text: &str, pos: usize) -> Self {
        let mut depth = 0usize;
        let mut quote: Option<char> = None;

        for c in text[..pos].chars() {
            match (quote, c) {
                (None, '`' | '\'' | '"') => quote = Some(c),
                (Some(q), c) if q == c => quote = None,
                (None, '(') => depth += 1,
                (None, ')') => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        Self { depth, quoted: quote.is_some() }
    }
}

/// Byte offset of the `)` closing the `(` at `open`
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (pos, c) in text[open..].char_indices() {
        match (quote, c) {
            (None, '`' | '\'' | '"') => quote = Some(c),
            (Some(q), c) if q == c => quote = None,
            (None, '(') => depth += 1,
            (None, ')') => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + pos);
                }
            }
            _ => {}
        }
    }
    None
}
