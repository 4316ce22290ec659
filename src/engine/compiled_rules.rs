//! Rule compilation.
//!
//! This module holds the *static* side of the engine: each rule string is
//! turned into a [`RuleSpec`] exactly once, when the engine is constructed,
//! and reused by every `apply` call.
//!
//! ## Rule language
//!
//! ```text
//! rule      := [ "!" ] path [ modifier ]
//! path      := segment { ("." segment) | index }
//! segment   := literal | "*" | "{*}" | "{" literal {"," literal} "}"
//! index     := "[" digits "]" | "[*]"
//! modifier  := "[:unique:]" | "[:replace:]"
//! ```
//!
//! | token        | compiles to          | meaning                                  |
//! |--------------|----------------------|------------------------------------------|
//! | `name`       | `name` (escaped)     | that exact key                           |
//! | `*`          | `.+`                 | anything, may span several segments      |
//! | `{*}`        | `[^.\[\]]+`          | exactly one key segment                  |
//! | `{a,b}`      | `(?:a\|b)`           | one of the listed keys                   |
//! | `[*]`        | `\[\d+\]`            | any array index                          |
//! | `[3]`        | `\[3\]`              | that array index                         |
//!
//! The whole path is anchored at both ends.
//!
//! A `[:replace:]` or `[:unique:]` modifier turns the rule into a *scope
//! rule*: the text before the modifier is the scope path, and the grant
//! covers the entire value there instead of individual leaves. Anything
//! after the modifier is ignored. A leading `!` turns a grant into a denial.
//!
//! ## Invariants
//!
//! - `UNIQUE` implies `REPLACE`.
//! - `scope_path` is `Some` exactly when `REPLACE` is set.
//! - A `RuleSpec` never changes after `compile`.

use crate::error::PatchRulesError;
use regex::Regex;

bitflags::bitflags! {
    /// Behavior flags of a compiled rule.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RuleFlags: u8 {
        /// Replace the whole value at the scope path, no merge of children.
        const REPLACE = 1 << 0;
        /// Deduplicate the array at the scope path (implies `REPLACE`).
        const UNIQUE  = 1 << 1;
        /// The rule denies instead of granting.
        const DENY    = 1 << 2;
    }
}

/// Regex fragment for `{*}`: one key segment.
const ANY_KEY: &str = r"[^.\[\]]+";
/// Regex fragment for `[*]`: one array index.
const ANY_INDEX: &str = r"\[\d+\]";
/// Regex fragment for `*`: anything, across segments.
const ANY_SUFFIX: &str = ".+";

/// Compiled form of one rule string.
#[derive(Debug, Clone)]
pub struct RuleSpec {
    source: String,
    pattern: Regex,
    scope_path: Option<String>,
    /// True when the scope path contains no wildcard and is itself a path.
    literal_scope: bool,
    flags: RuleFlags,
}

impl RuleSpec {
    /// Compile one rule string.
    ///
    /// # Errors
    ///
    /// [`PatchRulesError::MalformedRule`] for unbalanced braces or brackets,
    /// empty segments or alternatives, non-numeric indices and unknown
    /// modifiers.
    pub fn compile(rule: &str) -> Result<Self, PatchRulesError> {
        let (deny, body) = match rule.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, rule),
        };

        let (path, modifier) = split_modifier(rule, body)?;
        if path.is_empty() && modifier.is_empty() {
            return Err(PatchRulesError::malformed_rule(rule, "empty rule"));
        }

        let (regex_body, literal) = translate(rule, path)?;
        let pattern = Regex::new(&format!("^(?:{regex_body})$"))
            .map_err(|err| PatchRulesError::malformed_rule(rule, err.to_string()))?;

        let mut flags = modifier;
        flags.set(RuleFlags::DENY, deny);
        let scoped = flags.contains(RuleFlags::REPLACE);

        Ok(RuleSpec {
            source: rule.to_string(),
            pattern,
            scope_path: scoped.then(|| path.to_string()),
            literal_scope: scoped && literal,
            flags,
        })
    }

    /// The rule text as given to [`compile`](Self::compile).
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Path of the subtree a scope rule governs; `None` for leaf rules.
    pub fn scope_path(&self) -> Option<&str> {
        self.scope_path.as_deref()
    }

    pub fn flags(&self) -> RuleFlags {
        self.flags
    }

    pub fn whole_replace(&self) -> bool {
        self.flags.contains(RuleFlags::REPLACE)
    }

    pub fn dedupe(&self) -> bool {
        self.flags.contains(RuleFlags::UNIQUE)
    }

    pub fn denies(&self) -> bool {
        self.flags.contains(RuleFlags::DENY)
    }

    /// Whether the compiled pattern accepts `path` in full.
    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    /// The scope path, when it is a concrete path rather than a pattern.
    pub(crate) fn literal_scope(&self) -> Option<&str> {
        if self.literal_scope { self.scope_path() } else { None }
    }

    /// Shortest prefix of `leaf`, ending on a segment boundary, that the
    /// scope pattern accepts.
    pub(crate) fn scope_prefix<'p>(&self, leaf: &'p str) -> Option<&'p str> {
        leaf.char_indices()
            .filter(|&(at, c)| at > 0 && (c == '.' || c == '['))
            .map(|(at, _)| at)
            .chain(std::iter::once(leaf.len()))
            .map(|end| &leaf[..end])
            .find(|prefix| self.pattern.is_match(prefix))
    }
}

/// Split `body` at its first `[:name:]` modifier.
fn split_modifier<'r>(rule: &str, body: &'r str) -> Result<(&'r str, RuleFlags), PatchRulesError> {
    let Some(caps) = regex!(r"\[:([^\]]*):\]").captures(body) else {
        return Ok((body, RuleFlags::empty()));
    };

    let flags = match &caps[1] {
        "unique" => RuleFlags::UNIQUE | RuleFlags::REPLACE,
        "replace" => RuleFlags::REPLACE,
        other => return Err(PatchRulesError::malformed_rule(rule, format!("unknown modifier '[:{other}:]'"))),
    };

    let start = caps.get(0).map_or(body.len(), |m| m.start());
    Ok((&body[..start], flags))
}

/// Translate a rule path into a regex body. Also reports whether the path
/// is wildcard-free.
fn translate(rule: &str, path: &str) -> Result<(String, bool), PatchRulesError> {
    let mut out = String::with_capacity(path.len() * 2);
    let mut literal = true;
    // Whether the current segment (since the start or the last '.') has content.
    let mut has_content = false;
    let mut after_dot = false;
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !has_content {
                    return Err(PatchRulesError::malformed_rule(rule, "empty path segment"));
                }
                out.push_str(r"\.");
                has_content = false;
                after_dot = true;
            }
            '*' => {
                out.push_str(ANY_SUFFIX);
                literal = false;
                has_content = true;
            }
            '{' => {
                let inner = take_until(&mut chars, '}', &['{', '.', '['])
                    .ok_or_else(|| PatchRulesError::malformed_rule(rule, "unbalanced '{'"))?;
                out.push_str(&alternation(rule, &inner)?);
                literal = false;
                has_content = true;
            }
            '[' => {
                if after_dot && !has_content {
                    return Err(PatchRulesError::malformed_rule(rule, "empty path segment"));
                }
                let inner = take_until(&mut chars, ']', &['[', '.', '{'])
                    .ok_or_else(|| PatchRulesError::malformed_rule(rule, "unbalanced '['"))?;
                if inner == "*" {
                    out.push_str(ANY_INDEX);
                    literal = false;
                } else if !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit()) {
                    out.push_str(&format!(r"\[{inner}\]"));
                } else {
                    return Err(PatchRulesError::malformed_rule(rule, format!("invalid index '[{inner}]'")));
                }
                has_content = true;
            }
            '}' => return Err(PatchRulesError::malformed_rule(rule, "unbalanced '}'")),
            ']' => return Err(PatchRulesError::malformed_rule(rule, "unbalanced ']'")),
            other => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(other.encode_utf8(&mut buf)));
                has_content = true;
            }
        }
    }

    if after_dot && !has_content {
        return Err(PatchRulesError::malformed_rule(rule, "trailing '.'"));
    }

    Ok((out, literal))
}

/// Consume characters up to `close`. `None` if the input ends first or one of
/// `forbidden` shows up.
fn take_until(chars: &mut std::str::Chars<'_>, close: char, forbidden: &[char]) -> Option<String> {
    let mut inner = String::new();
    for c in chars.by_ref() {
        if c == close {
            return Some(inner);
        }
        if forbidden.contains(&c) {
            return None;
        }
        inner.push(c);
    }
    None
}

fn alternation(rule: &str, inner: &str) -> Result<String, PatchRulesError> {
    if inner == "*" {
        return Ok(ANY_KEY.to_string());
    }

    let mut keys = Vec::new();
    for key in inner.split(',') {
        if key.is_empty() {
            return Err(PatchRulesError::malformed_rule(rule, format!("empty alternative in '{{{inner}}}'")));
        }
        keys.push(regex::escape(key));
    }
    Ok(format!("(?:{})", keys.join("|")))
}
