//! Tokenizing inbound text, alias expansion and greedy chain matching.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    sync::Arc,
};

use shared::protocol::InvocationStyle;

use crate::command::{Command, Registry};

/// Ordered name tokens identifying a (possibly nested) command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Invocation(Vec<String>);

impl Invocation {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    /// Whitespace-separated form, e.g. `"config set"`.
    pub fn parse(raw: &str) -> Self {
        Self::of(raw.split_whitespace())
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut names = self.0.clone();
        names.push(name.into());
        Self(names)
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, parent) = self.0.split_last()?;
        Some(Self(parent.to_vec()))
    }

    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

/// Splits one shell-style token off the front of `input`.
///
/// A token that opens with `"` or `'` runs until the same quote followed by
/// whitespace or end of input; without such a close it takes the rest of the
/// input verbatim.
pub fn split_token(input: &str) -> Option<(String, &str)> {
    let input = input.trim_start();
    let first = input.chars().next()?;

    if first == '"' || first == '\'' {
        let body = &input[1..];
        let mut search = 0;
        while let Some(offset) = body[search..].find(first) {
            let close = search + offset;
            let after = &body[close + 1..];
            if after.is_empty() || after.starts_with(char::is_whitespace) {
                return Some((body[..close].to_string(), after));
            }
            search = close + 1;
        }
        return Some((input.to_string(), ""));
    }

    let end = input.find(char::is_whitespace).unwrap_or(input.len());
    Some((input[..end].to_string(), &input[end..]))
}

pub fn split_all(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = input;
    while let Some((token, next)) = split_token(rest) {
        tokens.push(token);
        rest = next;
    }
    tokens
}

/// Lazily tokenized argument text.
///
/// Spliced tokens (from alias expansion) sit in front of the untouched raw
/// remainder, so the remainder never depends on whether an alias applied.
#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    pending: VecDeque<String>,
    rest: String,
}

impl TokenStream {
    pub fn from_text(text: &str) -> Self {
        Self {
            pending: VecDeque::new(),
            rest: text.trim_start().to_string(),
        }
    }

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pending: tokens.into_iter().map(Into::into).collect(),
            rest: String::new(),
        }
    }

    pub fn peek(&self) -> Option<String> {
        self.peek_many(1).pop()
    }

    /// Up to `count` upcoming tokens without consuming them.
    pub fn peek_many(&self, count: usize) -> Vec<String> {
        let mut tokens: Vec<String> = self.pending.iter().take(count).cloned().collect();
        let mut rest = self.rest.as_str();
        while tokens.len() < count {
            let Some((token, next)) = split_token(rest) else {
                break;
            };
            tokens.push(token);
            rest = next;
        }
        tokens
    }

    pub fn next_token(&mut self) -> Option<String> {
        if let Some(token) = self.pending.pop_front() {
            return Some(token);
        }
        let (token, rest) = split_token(&self.rest)?;
        self.rest = rest.trim_start().to_string();
        Some(token)
    }

    pub fn skip(&mut self, count: usize) {
        for _ in 0..count {
            if self.next_token().is_none() {
                break;
            }
        }
    }

    /// Places `tokens` in front of everything not yet consumed.
    pub fn splice<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spliced: VecDeque<String> = tokens.into_iter().map(Into::into).collect();
        spliced.extend(self.pending.drain(..));
        self.pending = spliced;
    }

    /// Everything not yet consumed, with the raw text kept verbatim.
    pub fn remainder(&self) -> String {
        let mut parts: Vec<&str> = self.pending.iter().map(String::as_str).collect();
        let rest = self.rest.trim_end();
        if !rest.is_empty() {
            parts.push(rest);
        }
        parts.join(" ")
    }

    pub fn has_remaining(&self) -> bool {
        !self.pending.is_empty() || !self.rest.trim().is_empty()
    }

    pub fn drain_tokens(&mut self) -> Vec<String> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token() {
            tokens.push(token);
        }
        tokens
    }
}

/// Invocation-to-invocation rewrites applied before chain matching.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: HashMap<Invocation, Invocation>,
    longest: usize,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias: Invocation, target: Invocation) {
        self.longest = self.longest.max(alias.len());
        self.entries.insert(alias, target);
    }

    pub fn with(mut self, alias: Invocation, target: Invocation) -> Self {
        self.insert(alias, target);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrites the longest aliased prefix of `stream`, returning the alias used.
    pub fn apply(&self, stream: &mut TokenStream) -> Option<Invocation> {
        if self.entries.is_empty() {
            return None;
        }

        let upcoming = stream.peek_many(self.longest);
        for len in (1..=upcoming.len()).rev() {
            let candidate = Invocation::of(upcoming[..len].iter().cloned());
            if let Some(target) = self.entries.get(&candidate) {
                stream.skip(len);
                stream.splice(target.names().iter().cloned());
                return Some(candidate);
            }
        }
        None
    }
}

impl<const N: usize> From<[(&str, &str); N]> for AliasTable {
    fn from(entries: [(&str, &str); N]) -> Self {
        entries
            .into_iter()
            .fold(Self::new(), |table, (alias, target)| {
                table.with(Invocation::parse(alias), Invocation::parse(target))
            })
    }
}

/// The commands matched by an invocation, root first.
#[derive(Clone)]
pub struct ChainMatch {
    pub chain: Vec<Arc<Command>>,
    pub invocation: Invocation,
}

impl ChainMatch {
    pub fn command(&self) -> Option<&Arc<Command>> {
        self.chain.last()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

/// Greedily walks `stream`, consuming each token that names a child of the
/// chain matched so far.
pub fn match_chain(
    registry: &dyn Registry,
    style: InvocationStyle,
    stream: &mut TokenStream,
) -> ChainMatch {
    let mut invocation = Invocation::root();
    let mut chain = Vec::new();

    while let Some(token) = stream.peek() {
        let Some(command) = registry.lookup(&invocation.child(token), style) else {
            break;
        };
        stream.skip(1);
        invocation = invocation.child(command.name());
        chain.push(command);
    }

    ChainMatch { chain, invocation }
}

#[cfg(test)]
#[path = "tests/invocation_tests.rs"]
mod tests;
