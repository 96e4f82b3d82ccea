//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Variable names shall consist of letters, digits, and underscores, where the first character
/// is not a digit. `[_a-zA-Z][_a-zA-Z0-9]*`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Case sensitive variable definitions. Values are stored exactly as defined, references inside
/// them are resolved each time the variable is expanded.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    definitions: HashMap<String, String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        if !is_identifier(name) {
            return Err(Error::InvalidArgument(format!(
                "{name:?} is not a valid variable name"
            )));
        }
        let value = value.into();
        log::debug!("SymbolTable::set() {name}={value:?}");
        self.definitions.insert(name.to_owned(), value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.definitions.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
