//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Variable expansion.
//!
//! A single [`VariablePattern`] recognises three kinds of [`Reference`], told apart by how many
//! times the delimiters are repeated. With the angle style:
//!
//! * `$<name>` - a variable from the [`SymbolTable`], whose value is itself expanded.
//! * `$<<NAME>>` - a process environment variable, substituted literally.
//! * `$<<<kind:name[:vault]>>>` - handed to the [`ProfileResolver`].
//!
//! Substituted text is never rescanned, expansion continues after it.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::options::VariablePattern;
use crate::profile::{ProfileReference, ProfileResolver, ResolveError};
use crate::symbols::SymbolTable;

static ANGLE_REGEX: Lazy<Regex> = Lazy::new(|| compile(VariablePattern::ANGLE));
static CURLY_REGEX: Lazy<Regex> = Lazy::new(|| compile(VariablePattern::CURLY));
static PAREN_REGEX: Lazy<Regex> = Lazy::new(|| compile(VariablePattern::PAREN));

const NAME: &str = "[A-Za-z_][A-Za-z0-9_]*";

/// Alternatives are ordered from the most to the least nested delimiters so that the leftmost
/// match at any position is the longest reference starting there.
fn compile(pattern: VariablePattern) -> Regex {
    let prefix = regex::escape(&pattern.prefix.to_string());
    let open = regex::escape(&pattern.open.to_string());
    let close = regex::escape(&pattern.close.to_string());
    let source = format!(
        "{prefix}{open}{open}{open}(?P<profile>[^{open}{close}]+){close}{close}{close}\
         |{prefix}{open}{open}(?P<environment>{NAME}){close}{close}\
         |{prefix}{open}(?P<plain>{NAME}){close}"
    );
    Regex::new(&source).expect("escaped variable pattern should always compile")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference<'t> {
    Plain(&'t str),
    Environment(&'t str),
    Profile(&'t str),
}

/// Everything a reference may be resolved against.
pub(crate) struct Scope<'a> {
    pub symbols: &'a SymbolTable,
    pub default_variable: Option<&'a str>,
    pub default_environment_variable: Option<&'a str>,
    pub resolver: &'a dyn ProfileResolver,
}

/// Names currently being expanded, innermost first. Each nested expansion links a new frame
/// onto its caller's, so no state outlives a call.
struct Expanding<'a> {
    name: &'a str,
    outer: Option<&'a Expanding<'a>>,
}

impl Expanding<'_> {
    fn contains(&self, name: &str) -> bool {
        let mut frame = Some(self);
        while let Some(f) = frame {
            if f.name == name {
                return true;
            }
            frame = f.outer;
        }
        false
    }

    fn chain(&self, closing: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut frame = Some(self);
        while let Some(f) = frame {
            chain.push(f.name.to_owned());
            frame = f.outer;
        }
        chain.reverse();
        chain.push(closing.to_owned());
        chain
    }
}

#[derive(Debug, Clone)]
pub struct Expander {
    regex: Regex,
}

impl Expander {
    pub fn new(pattern: VariablePattern) -> Self {
        let regex = match pattern {
            VariablePattern::ANGLE => ANGLE_REGEX.clone(),
            VariablePattern::CURLY => CURLY_REGEX.clone(),
            VariablePattern::PAREN => PAREN_REGEX.clone(),
            custom => compile(custom),
        };
        Self { regex }
    }

    /// All references in `text`, with the byte range each one occupies.
    pub fn references<'t>(
        &'t self,
        text: &'t str,
    ) -> impl Iterator<Item = (std::ops::Range<usize>, Reference<'t>)> + 't {
        self.regex.captures_iter(text).filter_map(|captures| {
            let whole = captures.get(0)?;
            let reference = if let Some(m) = captures.name("profile") {
                Reference::Profile(m.as_str())
            } else if let Some(m) = captures.name("environment") {
                Reference::Environment(m.as_str())
            } else {
                Reference::Plain(captures.name("plain")?.as_str())
            };
            Some((whole.range(), reference))
        })
    }

    pub(crate) fn expand(&self, text: &str, scope: &Scope<'_>) -> Result<String> {
        self.expand_within(text, scope, None)
    }

    fn expand_within(
        &self,
        text: &str,
        scope: &Scope<'_>,
        expanding: Option<&Expanding<'_>>,
    ) -> Result<String> {
        let mut output = String::with_capacity(text.len());
        let mut last = 0;
        for (range, reference) in self.references(text) {
            output.push_str(&text[last..range.start]);
            match reference {
                Reference::Plain(name) => {
                    output.push_str(&self.resolve_variable(name, scope, expanding)?)
                }
                Reference::Environment(name) => {
                    output.push_str(&resolve_environment(name, scope)?)
                }
                Reference::Profile(reference) => {
                    output.push_str(&resolve_profile(reference, scope)?)
                }
            }
            last = range.end;
        }
        output.push_str(&text[last..]);
        Ok(output)
    }

    fn resolve_variable(
        &self,
        name: &str,
        scope: &Scope<'_>,
        expanding: Option<&Expanding<'_>>,
    ) -> Result<String> {
        if let Some(expanding) = expanding {
            if expanding.contains(name) {
                return Err(Error::CyclicReference(expanding.chain(name)));
            }
        }

        match scope.symbols.get(name) {
            Some(value) => {
                let frame = Expanding {
                    name,
                    outer: expanding,
                };
                self.expand_within(value, scope, Some(&frame))
            }
            None => scope
                .default_variable
                .map(str::to_owned)
                .ok_or_else(|| Error::UndefinedVariable(name.to_owned())),
        }
    }
}

fn resolve_environment(name: &str, scope: &Scope<'_>) -> Result<String> {
    match std::env::var(name) {
        Ok(value) => Ok(value),
        Err(_) => scope
            .default_environment_variable
            .map(str::to_owned)
            .ok_or_else(|| Error::UndefinedEnvironmentVariable(name.to_owned())),
    }
}

fn resolve_profile(reference: &str, scope: &Scope<'_>) -> Result<String> {
    let parsed = ProfileReference::parse(reference).ok_or_else(|| {
        Error::InvalidProfileReference {
            reference: reference.to_owned(),
        }
    })?;
    log::debug!("resolving {} reference {:?}", parsed.kind, parsed.name);
    scope
        .resolver
        .resolve(parsed.kind, parsed.name, parsed.vault)
        .map_err(|error| match error {
            ResolveError::NotFound => Error::ProfileNotFound {
                reference: reference.to_owned(),
            },
            ResolveError::Other(source) => Error::Resolver(source),
        })
}
