//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A malformed or structurally invalid directive.
    #[error("line {line}: {message}")]
    Directive { line: usize, message: String },
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),
    #[error("undefined environment variable: {0}")]
    UndefinedEnvironmentVariable(String),
    /// The chain of variable names, ending with the one that closed the cycle.
    #[error("cyclic variable reference: {}", .0.join(" -> "))]
    CyclicReference(Vec<String>),
    #[error("unable to resolve profile reference: {reference}")]
    ProfileNotFound { reference: String },
    #[error("invalid profile reference: {reference}")]
    InvalidProfileReference { reference: String },
    /// Raised by a [`crate::ProfileResolver`] and passed through untouched.
    #[error(transparent)]
    Resolver(Box<dyn std::error::Error + Send + Sync>),
    #[error("{0} is not supported, the preprocessor only reads whole lines")]
    NotSupported(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("configuration cannot change once reading has started")]
    ConfigurationLocked,
    #[error("Error processing io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn directive(line: usize, message: impl Into<String>) -> Self {
        Self::Directive {
            line,
            message: message.into(),
        }
    }

    pub fn is_directive_syntax(&self) -> bool {
        matches!(self, Self::Directive { .. })
    }

    pub fn is_undefined_reference(&self) -> bool {
        matches!(
            self,
            Self::UndefinedVariable(_) | Self::UndefinedEnvironmentVariable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub trait GetExitCode {
    fn get_exit_code(&self) -> i32;
}

impl<T> GetExitCode for Result<T> {
    fn get_exit_code(&self) -> i32 {
        match self {
            Ok(_) => 0,
            Err(_) => 1,
        }
    }
}
