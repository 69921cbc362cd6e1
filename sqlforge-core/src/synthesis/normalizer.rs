//! Deterministic canonicalization of generated scripts
//!
//! Normalization is an ordered table of rules. Each rule is a pure
//! `&str -> String` function and is tested on its own; the order is part of
//! the contract, since later rules assume the shape earlier ones establish
//! (one creation statement, canonical keywords, balanced quotes).
//!
//! Normalization never fails. Input beyond what the rules can repair comes
//! back patched as far as possible; `normalize_with_report` tells the caller
//! which rules changed anything.

use super::schema::bare_reference;
use serde::Serialize;
use sql_patterns::identifier::{is_dotted_path, is_identifier_char};
use sql_patterns::statement::{
    CREATION_KEYWORDS, CREATION_MARKER, HEAD_BOUNDARY, LEADING_AS, PROJECTION_START, SELECT_KEYWORD,
    leading_target,
};
use std::fmt;
use tracing::{debug, warn};

/// Destination used when none can be recovered
pub const FALLBACK_DESTINATION: &str = "destination_table";

/// Words that put a following quoted identifier in table position
const TABLE_POSITION_KEYWORDS: &[&str] = &["FROM", "JOIN", "TABLE", "INTO", "UPDATE", "MERGE"];

/// `CREATE OR REPLACE TABLE `<destination>` AS`
pub fn canonical_prefix(destination_ref: &str) -> String {
    format!("{} `{}` AS", CREATION_KEYWORDS, destination_or_fallback(destination_ref))
}

fn destination_or_fallback(destination_ref: &str) -> String {
    let bare = bare_reference(destination_ref);
    if bare.is_empty() { FALLBACK_DESTINATION.to_string() } else { bare }
}

/// Identifies one normalization rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleId {
    CollapseDuplicates,
    EnforcePrefix,
    AnchorStatement,
    BalanceQuotes,
    Retarget,
    QuoteSpacing,
    QuoteDestination,
    UnquoteNestedPaths,
    Terminate,
}

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CollapseDuplicates => "collapse-duplicates",
            Self::EnforcePrefix => "enforce-prefix",
            Self::AnchorStatement => "anchor-statement",
            Self::BalanceQuotes => "balance-quotes",
            Self::Retarget => "retarget",
            Self::QuoteSpacing => "quote-spacing",
            Self::QuoteDestination => "quote-destination",
            Self::UnquoteNestedPaths => "unquote-nested-paths",
            Self::Terminate => "terminate",
        }
    }

    /// Rules that change statement structure rather than spelling
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::CollapseDuplicates | Self::EnforcePrefix | Self::BalanceQuotes | Self::Retarget
        )
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs shared by every rule
struct RuleContext {
    destination: String,
    prefix: String,
    /// Prefix text after the creation keywords
    head: String,
}

impl RuleContext {
    fn new(destination_ref: &str) -> Self {
        let destination = destination_or_fallback(destination_ref);
        let head = format!(" `{}` AS", destination);
        let prefix = format!("{}{}", CREATION_KEYWORDS, head);
        Self { destination, prefix, head }
    }
}

struct Rule {
    id: RuleId,
    apply: fn(&str, &RuleContext) -> String,
}

const RULES: &[Rule] = &[
    Rule { id: RuleId::CollapseDuplicates, apply: collapse_duplicates },
    Rule { id: RuleId::EnforcePrefix, apply: enforce_prefix },
    Rule { id: RuleId::AnchorStatement, apply: anchor_statement },
    Rule { id: RuleId::BalanceQuotes, apply: balance_quotes },
    Rule { id: RuleId::Retarget, apply: retarget },
    // unquoting exposes new adjacencies, so spacing and quoting run after it
    Rule { id: RuleId::UnquoteNestedPaths, apply: unquote_nested_paths },
    Rule { id: RuleId::QuoteSpacing, apply: quote_spacing },
    Rule { id: RuleId::QuoteDestination, apply: quote_destination },
    Rule { id: RuleId::Terminate, apply: terminate },
];

/// Normalized script plus the rules that changed it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizationReport {
    pub script: String,
    pub applied: Vec<RuleId>,
}

impl NormalizationReport {
    /// True when no rule had to change the input
    pub fn was_canonical(&self) -> bool {
        self.applied.is_empty()
    }

    pub fn patched_structure(&self) -> bool {
        self.applied.iter().any(RuleId::is_structural)
    }
}

/// Canonicalize `script` for `destination_ref`
pub fn normalize(script: &str, destination_ref: &str) -> String {
    normalize_with_report(script, destination_ref).script
}

pub fn normalize_with_report(script: &str, destination_ref: &str) -> NormalizationReport {
    let ctx = RuleContext::new(destination_ref);
    let mut current = script.to_string();
    let mut applied = Vec::new();

    for rule in RULES {
        let next = (rule.apply)(&current, &ctx);
        if next != current {
            debug!("Normalization rule {} changed the script", rule.id);
            applied.push(rule.id);
            current = next;
        }
    }

    let report = NormalizationReport { script: current, applied };
    if report.patched_structure() {
        let rules: Vec<&str> = report.applied.iter().map(RuleId::as_str).collect();
        warn!("Script for {} needed structural patching: {}", ctx.destination, rules.join(", "));
    }
    report
}

/// Keep one creation statement: preamble, canonical prefix, then the
/// projection that follows the second marker. Repeats while markers remain.
fn collapse_duplicates(text: &str, ctx: &RuleContext) -> String {
    let mut current = text.to_string();
    loop {
        let mut markers = CREATION_MARKER.find_iter(&current);
        let (Some(first), Some(second)) = (markers.next(), markers.next()) else {
            return current;
        };

        let tail = &current[second.end()..];
        let next = match SELECT_KEYWORD.find(tail) {
            Some(select) => format!(
                "{}{}\n{}",
                &current[..first.start()],
                ctx.prefix,
                &tail[select.start()..]
            ),
            // second statement has no projection to keep
            None => current[..second.start()].trim_end().to_string(),
        };
        current = next;
    }
}

/// A bare projection becomes the body of the canonical statement
fn enforce_prefix(text: &str, ctx: &RuleContext) -> String {
    if CREATION_MARKER.is_match(text) {
        return text.to_string();
    }
    format!("{}\n{}", ctx.prefix, text.trim())
}

/// Drop anything before the creation marker and spell the marker canonically
fn anchor_statement(text: &str, _ctx: &RuleContext) -> String {
    match CREATION_MARKER.find(text) {
        Some(marker) => format!("{}{}", CREATION_KEYWORDS, &text[marker.end()..]),
        None => text.to_string(),
    }
}

/// An odd backtick count loses its last backtick
fn balance_quotes(text: &str, _ctx: &RuleContext) -> String {
    if text.matches('`').count() % 2 == 0 {
        return text.to_string();
    }
    match text.rfind('`') {
        Some(pos) => format!("{}{}", &text[..pos], &text[pos + 1..]),
        None => text.to_string(),
    }
}

/// Rewrite the statement head to `` `<destination>` AS``.
///
/// Everything between the marker and the query (target, column list,
/// `PARTITION BY`, `CLUSTER BY`, `OPTIONS`) is replaced; a missing `AS` is
/// supplied. Without a recognizable query only the target is replaced.
fn retarget(text: &str, ctx: &RuleContext) -> String {
    let Some(marker) = CREATION_MARKER.find(text) else {
        return text.to_string();
    };
    let rest = &text[marker.end()..];

    // a head with an odd backtick count cannot be dropped without
    // unbalancing the script
    let query = projection_start(rest)
        .map(|start| (start, head_boundary(&rest[..start])))
        .filter(|(_, (clauses_end, _))| rest[..*clauses_end].matches('`').count() % 2 == 0);

    let (head, body) = match query {
        Some((start, (clauses_end, opening))) => {
            let opening = if opening.is_empty() { " " } else { opening };
            (&rest[..clauses_end], format!("{}{}", opening, &rest[start..]))
        }
        None => {
            let target_end = leading_target(rest).map_or(0, |(_, end)| end);
            let after = &rest[target_end..];
            let after = LEADING_AS.find(after).map_or(after, |m| &after[m.end()..]);
            let body = if after.starts_with(|c: char| c.is_alphanumeric() || c == '_' || c == '`') {
                format!(" {}", after)
            } else {
                after.to_string()
            };
            (&rest[..target_end], body)
        }
    };

    let (found, dropped) = match leading_target(head) {
        Some((target, end)) => (Some(target), head[end..].trim()),
        None => (None, head.trim()),
    };
    if let Some(found) = found.filter(|found| bare_reference(found) != ctx.destination) {
        warn!("Script targeted {} instead of {}", found, ctx.destination);
    }
    if !dropped.is_empty() {
        warn!(
            "Dropped table clauses ahead of AS for {}: {}",
            ctx.destination,
            dropped.lines().next().unwrap_or_default()
        );
    }

    format!("{}{}{}", &text[..marker.end()], ctx.head, body)
}

/// First `SELECT`/`WITH` outside quoted text
fn projection_start(text: &str) -> Option<usize> {
    PROJECTION_START.find_iter(text).map(|m| m.start()).find(|&pos| !is_quoted_at(text, pos))
}

/// End of the table clauses in a statement head, and the text opening the
/// query after its `AS`
fn head_boundary(head: &str) -> (usize, &str) {
    match HEAD_BOUNDARY.captures(head) {
        Some(caps) => (
            caps.get(0).map_or(head.len(), |m| m.start()),
            caps.get(2).map_or("", |m| m.as_str()),
        ),
        None => (head.len(), ""),
    }
}

/// Whether `pos` sits inside a backticked, single- or double-quoted span
fn is_quoted_at(text: &str, pos: usize) -> bool {
    let mut open: Option<char> = None;
    for c in text[..pos].chars() {
        if matches!(c, '`' | '\'' | '"') {
            open = match open {
                None => Some(c),
                Some(q) if q == c => None,
                other => other,
            };
        }
    }
    open.is_some()
}

/// Separate quoted identifiers from adjacent words: `FROM`t`` and `` `t`AS``
fn quote_spacing(text: &str, _ctx: &RuleContext) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut opening = true;
    let mut chars = text.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if c != '`' {
            out.push(c);
            continue;
        }

        if opening {
            let after_word = preceding_word(text, pos)
                .is_some_and(|w| w.chars().any(|c| c.is_ascii_alphabetic()));
            if after_word {
                out.push(' ');
            }
            out.push(c);
        } else {
            out.push(c);
            if chars.peek().is_some_and(|(_, next)| next.is_alphabetic()) {
                out.push(' ');
            }
        }
        opening = !opening;
    }
    out
}

/// Wrap unquoted occurrences of the destination in backticks
fn quote_destination(text: &str, ctx: &RuleContext) -> String {
    let dest = ctx.destination.as_str();
    let mut out = String::with_capacity(text.len() + 4);
    let mut last = 0;

    for (start, _) in text.match_indices(dest) {
        let end = start + dest.len();
        let outside_quotes = text[..start].matches('`').count() % 2 == 0;
        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();

        let standalone =
            !before.is_some_and(joins_reference) && !after.is_some_and(joins_reference);
        if outside_quotes && standalone {
            out.push_str(&text[last..start]);
            out.push('`');
            out.push_str(dest);
            out.push('`');
            last = end;
        }
    }

    out.push_str(&text[last..]);
    out
}

/// Characters that make a match part of a longer name or a literal
fn joins_reference(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '`' | '-' | '\'' | '"')
}

/// `` `source.priceInfo.cost` `` -> `source.priceInfo.cost`, except for
/// table references
fn unquote_nested_paths(text: &str, ctx: &RuleContext) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for (open, close) in quote_spans(text) {
        let content = &text[open + 1..close];
        if !is_dotted_path(content) || content == ctx.destination || in_table_position(text, open) {
            continue;
        }

        out.push_str(&text[last..open]);
        if text[..open].chars().next_back().is_some_and(is_identifier_char) {
            out.push(' ');
        }
        out.push_str(content);
        if text[close + 1..].chars().next().is_some_and(is_identifier_char) {
            out.push(' ');
        }
        last = close + 1;
    }

    out.push_str(&text[last..]);
    out
}

/// Statement ends with `;`, on its own line after a trailing comment
fn terminate(text: &str, _ctx: &RuleContext) -> String {
    let trimmed = text.trim_end();
    if trimmed.ends_with(';') || last_code(trimmed).is_some_and(|code| code.ends_with(';')) {
        return trimmed.to_string();
    }
    if trimmed.lines().last().is_some_and(|line| line.contains("--")) {
        format!("{}\n;", trimmed)
    } else {
        format!("{};", trimmed)
    }
}

/// Last line of `text` with code on it, `--` comments removed
fn last_code(text: &str) -> Option<&str> {
    text.lines()
        .rev()
        .map(|line| line.split_once("--").map_or(line, |(code, _)| code).trim_end())
        .find(|code| !code.trim().is_empty())
}

/// Byte offsets of paired backticks; a trailing unpaired one is ignored
fn quote_spans(text: &str) -> Vec<(usize, usize)> {
    let positions: Vec<usize> = text.match_indices('`').map(|(pos, _)| pos).collect();
    positions.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect()
}

/// Identifier run ending right at `pos`, unless it is the tail of a dotted name
fn preceding_word(text: &str, pos: usize) -> Option<&str> {
    let before = &text[..pos];
    let start = before
        .char_indices()
        .rev()
        .find(|(_, c)| !is_identifier_char(*c))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);

    let word = &before[start..];
    if word.is_empty() || before[..start].ends_with('.') {
        return None;
    }
    Some(word)
}

fn in_table_position(text: &str, open: usize) -> bool {
    let before = text[..open].trim_end();
    preceding_word(before, before.len())
        .is_some_and(|word| TABLE_POSITION_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word)))
}
