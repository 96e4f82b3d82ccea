//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Resolution of `$<<<kind:name[:vault]>>>` references.
//!
//! The preprocessor does not know where passwords, secrets or profile values live. It hands
//! each reference to a [`ProfileResolver`] supplied by the caller.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileKind {
    Password,
    Secret,
    Profile,
}

impl ProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Password => "password",
            ProfileKind::Secret => "secret",
            ProfileKind::Profile => "profile",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password" => Ok(ProfileKind::Password),
            "secret" => Ok(ProfileKind::Secret),
            "profile" => Ok(ProfileKind::Profile),
            _ => Err(()),
        }
    }
}

#[derive(Debug)]
pub enum ResolveError {
    NotFound,
    /// Any other failure, surfaced to the caller as is.
    Other(Box<dyn std::error::Error + Send + Sync>),
}

pub trait ProfileResolver: Send + Sync {
    fn resolve(
        &self,
        kind: ProfileKind,
        name: &str,
        vault: Option<&str>,
    ) -> Result<String, ResolveError>;
}

/// Used when no resolver is supplied, nothing can be resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProfileResolver;

impl ProfileResolver for NoProfileResolver {
    fn resolve(
        &self,
        _kind: ProfileKind,
        _name: &str,
        _vault: Option<&str>,
    ) -> Result<String, ResolveError> {
        Err(ResolveError::NotFound)
    }
}

/// A parsed `kind:name[:vault]` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProfileReference<'a> {
    pub kind: ProfileKind,
    pub name: &'a str,
    pub vault: Option<&'a str>,
}

impl<'a> ProfileReference<'a> {
    pub fn parse(reference: &'a str) -> Option<Self> {
        let mut parts = reference.split(':').map(str::trim);
        let kind = parts.next()?.parse().ok()?;
        let name = parts.next().filter(|name| !name.is_empty())?;
        let vault = match parts.next() {
            Some("") => return None,
            vault => vault,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self { kind, name, vault })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_reference() {
        assert_eq!(
            ProfileReference::parse("secret:db_password"),
            Some(ProfileReference {
                kind: ProfileKind::Secret,
                name: "db_password",
                vault: None,
            })
        );
        assert_eq!(
            ProfileReference::parse("password:admin:prod"),
            Some(ProfileReference {
                kind: ProfileKind::Password,
                name: "admin",
                vault: Some("prod"),
            })
        );
    }

    #[test]
    fn test_parse_reference_malformed() {
        for reference in ["", "secret", "secret:", "token:name", "secret:a:", "secret:a:b:c"] {
            assert_eq!(ProfileReference::parse(reference), None, "{reference:?}");
        }
    }

    #[test]
    fn test_no_resolver() {
        assert!(matches!(
            NoProfileResolver.resolve(ProfileKind::Profile, "anything", None),
            Err(ResolveError::NotFound)
        ));
    }
}
