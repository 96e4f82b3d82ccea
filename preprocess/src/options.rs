//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Configuration for a [`crate::Preprocessor`].
//!
//! An [`Options`] value is assembled with [`OptionsBuilder`] and handed to the preprocessor
//! when it is constructed. From then on it is read only, apart from the comment marker
//! operations which are allowed up until the first line is requested.

use crate::error::{Error, Result};

pub const DEFAULT_STATEMENT_MARKER: char = '#';
pub const DEFAULT_COMMENT_MARKER: &str = "//";

/// Terminator appended to every emitted line, regardless of what the input used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LineEnding {
    Crlf,
    Lf,
    /// `\r\n` on Windows, `\n` everywhere else.
    #[default]
    Platform,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Crlf => "\r\n",
            LineEnding::Lf => "\n",
            LineEnding::Platform => {
                if cfg!(windows) {
                    "\r\n"
                } else {
                    "\n"
                }
            }
        }
    }
}

/// Delimiters of a variable reference: `<prefix><open>name<close>`.
///
/// Doubling the delimiters (`$<<NAME>>`) references an environment variable, tripling them
/// (`$<<<kind:name[:vault]>>>`) references a secret or profile value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariablePattern {
    pub prefix: char,
    pub open: char,
    pub close: char,
}

impl VariablePattern {
    /// `$<name>`
    pub const ANGLE: Self = Self::new('$', '<', '>');
    /// `${name}`
    pub const CURLY: Self = Self::new('$', '{', '}');
    /// `$(name)`
    pub const PAREN: Self = Self::new('$', '(', ')');

    pub const fn new(prefix: char, open: char, close: char) -> Self {
        Self {
            prefix,
            open,
            close,
        }
    }
}

impl Default for VariablePattern {
    fn default() -> Self {
        Self::ANGLE
    }
}

/// Built in [`VariablePattern`]s, selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum VariableStyle {
    #[default]
    Angle,
    Curly,
    Paren,
}

impl From<VariableStyle> for VariablePattern {
    fn from(style: VariableStyle) -> Self {
        match style {
            VariableStyle::Angle => VariablePattern::ANGLE,
            VariableStyle::Curly => VariablePattern::CURLY,
            VariableStyle::Paren => VariablePattern::PAREN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub(crate) statement_marker: char,
    pub(crate) variable_pattern: VariablePattern,
    pub(crate) process_statements: bool,
    pub(crate) expand_variables: bool,
    pub(crate) comment_markers: Vec<String>,
    pub(crate) strip_comments: bool,
    pub(crate) remove_comments: bool,
    pub(crate) remove_blank: bool,
    pub(crate) tab_stop: usize,
    pub(crate) indent: usize,
    pub(crate) line_ending: LineEnding,
    pub(crate) default_variable: Option<String>,
    pub(crate) default_environment_variable: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            statement_marker: DEFAULT_STATEMENT_MARKER,
            variable_pattern: VariablePattern::default(),
            process_statements: true,
            expand_variables: true,
            comment_markers: vec![DEFAULT_COMMENT_MARKER.to_owned()],
            strip_comments: true,
            remove_comments: false,
            remove_blank: false,
            tab_stop: 0,
            indent: 0,
            line_ending: LineEnding::default(),
            default_variable: None,
            default_environment_variable: None,
        }
    }
}

impl Options {
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    pub fn statement_marker(&self) -> char {
        self.statement_marker
    }

    pub fn variable_pattern(&self) -> VariablePattern {
        self.variable_pattern
    }

    pub fn process_statements(&self) -> bool {
        self.process_statements
    }

    pub fn expand_variables(&self) -> bool {
        self.expand_variables
    }

    pub fn comment_markers(&self) -> &[String] {
        &self.comment_markers
    }

    pub fn strip_comments(&self) -> bool {
        self.strip_comments
    }

    pub fn remove_comments(&self) -> bool {
        self.remove_comments
    }

    pub fn remove_blank(&self) -> bool {
        self.remove_blank
    }

    pub fn tab_stop(&self) -> usize {
        self.tab_stop
    }

    pub fn indent(&self) -> usize {
        self.indent
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn default_variable(&self) -> Option<&str> {
        self.default_variable.as_deref()
    }

    pub fn default_environment_variable(&self) -> Option<&str> {
        self.default_environment_variable.as_deref()
    }

    pub(crate) fn add_comment_marker(&mut self, marker: &str) -> Result<()> {
        validate_comment_marker(marker)?;
        if !self.comment_markers.iter().any(|m| m == marker) {
            self.comment_markers.push(marker.to_owned());
        }
        Ok(())
    }
}

/// Comment markers must be non-empty runs of punctuation.
pub fn validate_comment_marker(marker: &str) -> Result<()> {
    if marker.is_empty() {
        return Err(Error::InvalidArgument(
            "comment marker cannot be empty".to_owned(),
        ));
    }
    if marker.chars().any(char::is_whitespace) {
        return Err(Error::InvalidArgument(format!(
            "comment marker {marker:?} cannot contain whitespace"
        )));
    }
    if !marker.chars().all(|c| c.is_ascii_punctuation()) {
        return Err(Error::InvalidArgument(format!(
            "comment marker {marker:?} must consist of punctuation characters"
        )));
    }
    Ok(())
}

/// Builder for [`Options`]. Validation happens in [`OptionsBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct OptionsBuilder {
    options: Options,
    pending_markers: Vec<String>,
}

impl OptionsBuilder {
    pub fn statement_marker(mut self, marker: char) -> Self {
        self.options.statement_marker = marker;
        self
    }

    pub fn variable_pattern(mut self, pattern: impl Into<VariablePattern>) -> Self {
        self.options.variable_pattern = pattern.into();
        self
    }

    pub fn process_statements(mut self, enabled: bool) -> Self {
        self.options.process_statements = enabled;
        self
    }

    pub fn expand_variables(mut self, enabled: bool) -> Self {
        self.options.expand_variables = enabled;
        self
    }

    pub fn comment_marker(mut self, marker: impl Into<String>) -> Self {
        self.pending_markers.push(marker.into());
        self
    }

    pub fn clear_comment_markers(mut self) -> Self {
        self.options.comment_markers.clear();
        self.pending_markers.clear();
        self
    }

    pub fn strip_comments(mut self, enabled: bool) -> Self {
        self.options.strip_comments = enabled;
        self
    }

    pub fn remove_comments(mut self, enabled: bool) -> Self {
        self.options.remove_comments = enabled;
        self
    }

    pub fn remove_blank(mut self, enabled: bool) -> Self {
        self.options.remove_blank = enabled;
        self
    }

    pub fn tab_stop(mut self, tab_stop: usize) -> Self {
        self.options.tab_stop = tab_stop;
        self
    }

    pub fn indent(mut self, indent: usize) -> Self {
        self.options.indent = indent;
        self
    }

    pub fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.options.line_ending = line_ending;
        self
    }

    /// Value substituted for undefined variables instead of failing.
    pub fn default_variable(mut self, value: impl Into<String>) -> Self {
        self.options.default_variable = Some(value.into());
        self
    }

    pub fn default_environment_variable(mut self, value: impl Into<String>) -> Self {
        self.options.default_environment_variable = Some(value.into());
        self
    }

    pub fn build(self) -> Result<Options> {
        let Self {
            mut options,
            pending_markers,
        } = self;

        if !options.statement_marker.is_ascii_punctuation() {
            return Err(Error::InvalidArgument(format!(
                "statement marker {:?} must be a punctuation character",
                options.statement_marker
            )));
        }

        let VariablePattern {
            prefix,
            open,
            close,
        } = options.variable_pattern;
        if open == close || [prefix, open, close].iter().any(|c| c.is_alphanumeric()) {
            return Err(Error::InvalidArgument(format!(
                "invalid variable pattern {prefix}{open}name{close}"
            )));
        }

        for marker in &pending_markers {
            options.add_comment_marker(marker)?;
        }

        Ok(options)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::builder().build().unwrap();
        assert_eq!(options.statement_marker(), '#');
        assert_eq!(options.variable_pattern(), VariablePattern::ANGLE);
        assert_eq!(options.comment_markers(), ["//"]);
        assert!(options.process_statements());
        assert!(options.strip_comments());
        assert!(!options.remove_comments());
        assert_eq!(options.tab_stop(), 0);
        assert_eq!(options.default_variable(), None);
    }

    #[test]
    fn test_comment_markers() {
        let options = Options::builder()
            .clear_comment_markers()
            .comment_marker("--")
            .comment_marker(";")
            .comment_marker("--")
            .build()
            .unwrap();
        assert_eq!(options.comment_markers(), ["--", ";"]);
    }

    #[test]
    fn test_invalid_comment_markers() {
        for marker in ["", "/ /", "rem", "#a"] {
            let error = Options::builder().comment_marker(marker).build().unwrap_err();
            assert!(matches!(error, Error::InvalidArgument(_)), "{marker:?}");
        }
    }

    #[test]
    fn test_invalid_statement_marker() {
        let error = Options::builder().statement_marker('x').build().unwrap_err();
        assert!(matches!(error, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_style_patterns() {
        assert_eq!(
            VariablePattern::from(VariableStyle::Curly),
            VariablePattern::new('$', '{', '}')
        );
        assert_eq!(LineEnding::Crlf.as_str(), "\r\n");
        assert_eq!(LineEnding::Lf.as_str(), "\n");
    }
}
