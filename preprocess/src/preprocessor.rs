//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::io::{BufRead, Cursor, Write};
use std::sync::Arc;

use crate::directive::{parse_directive, split_directive, Condition, ConditionalStack, Directive};
use crate::error::{Error, Result};
use crate::expand::{Expander, Scope};
use crate::format::format_line;
use crate::input::{LineSource, ReadLines};
use crate::options::Options;
use crate::profile::{NoProfileResolver, ProfileResolver};
use crate::symbols::SymbolTable;

/// What became of one raw input line.
enum Step {
    Emit(String),
    Skip,
}

/// Forward only, line granular preprocessor over a [`LineSource`].
///
/// Each raw line is first offered to the directive interpreter. Directive lines are consumed,
/// other lines are dropped while inside an unselected branch, and the rest are expanded and
/// formatted. State built up by one line (definitions, open blocks) applies to every line after
/// it, so lines are always processed strictly in order.
pub struct Preprocessor<S> {
    source: S,
    options: Options,
    symbols: SymbolTable,
    expander: Expander,
    resolver: Arc<dyn ProfileResolver>,
    stack: ConditionalStack,
    line_number: usize,
    started: bool,
    finished: bool,
}

impl<R: BufRead> Preprocessor<ReadLines<R>> {
    pub fn from_reader(reader: R, options: Options) -> Self {
        Self::new(ReadLines::new(reader), options)
    }
}

impl Preprocessor<ReadLines<Cursor<String>>> {
    pub fn from_text(text: &str, options: Options) -> Self {
        Self::from_reader(Cursor::new(text.to_owned()), options)
    }
}

impl<S> Preprocessor<S> {
    pub fn new(source: S, options: Options) -> Self {
        Self {
            source,
            expander: Expander::new(options.variable_pattern),
            options,
            symbols: SymbolTable::new(),
            resolver: Arc::new(NoProfileResolver),
            stack: ConditionalStack::default(),
            line_number: 0,
            started: false,
            finished: false,
        }
    }

    /// Resolver for `kind:name[:vault]` references, by default every lookup fails.
    pub fn with_resolver(mut self, resolver: Arc<dyn ProfileResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Define or redefine a variable. Allowed at any point, the new value applies to the lines
    /// read after the call.
    pub fn set(&mut self, name: &str, value: impl ToString) -> Result<()> {
        self.symbols.set(name, value.to_string())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.symbols.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.symbols.contains(name)
    }

    pub fn add_comment_marker(&mut self, marker: &str) -> Result<()> {
        if self.started {
            return Err(Error::ConfigurationLocked);
        }
        self.options.add_comment_marker(marker)
    }

    pub fn clear_comment_markers(&mut self) -> Result<()> {
        if self.started {
            return Err(Error::ConfigurationLocked);
        }
        self.options.comment_markers.clear();
        Ok(())
    }

    /// Number of raw input lines consumed so far.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn read_char(&mut self) -> Result<char> {
        Err(Error::NotSupported("reading a single character"))
    }

    pub fn peek_char(&self) -> Result<char> {
        Err(Error::NotSupported("peeking at a character"))
    }

    pub fn read_block(&mut self, _buffer: &mut [char]) -> Result<usize> {
        Err(Error::NotSupported("reading a block of characters"))
    }

    /// Gives back the line source, dropping all preprocessing state.
    pub fn into_inner(self) -> S {
        self.source
    }

    /// `raw` is the next input line, `None` at the end of the input. Returns `None` once the
    /// input is exhausted and every block has been closed.
    fn process(&mut self, raw: Option<String>) -> Result<Option<Step>> {
        self.started = true;
        match raw {
            None => {
                self.finished = true;
                self.stack.finish()?;
                Ok(None)
            }
            Some(line) => {
                self.line_number += 1;
                self.process_line(line).map(Some)
            }
        }
    }

    fn process_line(&mut self, line: String) -> Result<Step> {
        if self.options.process_statements {
            if let Some((keyword, args)) = split_directive(&line, self.options.statement_marker)
            {
                let directive = parse_directive(keyword, args)
                    .map_err(|message| Error::directive(self.line_number, message))?;
                self.execute(directive)?;
                return Ok(Step::Skip);
            }
        }

        if !self.stack.is_active() {
            log::trace!("line {}: suppressed", self.line_number);
            return Ok(Step::Skip);
        }

        let line = self.expand(&line)?;
        match format_line(&self.options, line) {
            Some(line) => {
                log::trace!("line {}: {line:?}", self.line_number);
                Ok(Step::Emit(line))
            }
            None => Ok(Step::Skip),
        }
    }

    /// Apply a directive. Inside an unselected branch only the block structure is tracked,
    /// nothing is defined or expanded.
    fn execute(&mut self, directive: Directive<'_>) -> Result<()> {
        let line = self.line_number;
        let active = self.stack.is_active();
        log::debug!(
            "line {line}: {directive:?} (depth: {}, active: {active})",
            self.stack.depth()
        );

        match directive {
            Directive::Define { name, value } => {
                if active {
                    self.symbols.set(name, value)?;
                }
            }
            Directive::If(condition) => {
                let selected = active && self.evaluate(&condition)?;
                self.stack.push_if(selected, line);
            }
            Directive::Else => self.stack.else_branch(line)?,
            Directive::EndIf => self.stack.end_if(line)?,
            Directive::Switch(expression) => {
                let value = if active {
                    Some(self.expand(expression)?)
                } else {
                    None
                };
                self.stack.push_switch(value, line);
            }
            Directive::Case(value) => self.stack.case(value, line)?,
            Directive::Default => self.stack.default_branch(line)?,
            Directive::EndSwitch => self.stack.end_switch(line)?,
        }
        Ok(())
    }

    fn evaluate(&self, condition: &Condition<'_>) -> Result<bool> {
        Ok(match condition {
            Condition::Equals(lhs, rhs) => self.expand(lhs)? == self.expand(rhs)?,
            Condition::NotEquals(lhs, rhs) => self.expand(lhs)? != self.expand(rhs)?,
            Condition::Defined(name) => self.symbols.contains(name),
            Condition::Undefined(name) => !self.symbols.contains(name),
        })
    }

    fn expand(&self, text: &str) -> Result<String> {
        if !self.options.expand_variables {
            return Ok(text.to_owned());
        }
        let scope = Scope {
            symbols: &self.symbols,
            default_variable: self.options.default_variable.as_deref(),
            default_environment_variable: self.options.default_environment_variable.as_deref(),
            resolver: self.resolver.as_ref(),
        };
        self.expander.expand(text, &scope)
    }
}

impl<S: LineSource> Preprocessor<S> {
    /// The next output line without its terminator, or `None` at the end of the output.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        while !self.finished {
            let raw = self.source.next_line()?;
            match self.process(raw)? {
                Some(Step::Emit(line)) => return Ok(Some(line)),
                Some(Step::Skip) => continue,
                None => break,
            }
        }
        Ok(None)
    }

    /// All remaining output, each line followed by the configured line ending.
    pub fn read_to_end(&mut self) -> Result<String> {
        let ending = self.options.line_ending.as_str();
        let mut output = String::new();
        while let Some(line) = self.read_line()? {
            output.push_str(&line);
            output.push_str(ending);
        }
        Ok(output)
    }

    pub fn write_to<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<()> {
        let ending = self.options.line_ending.as_str();
        while let Some(line) = self.read_line()? {
            writer.write_all(line.as_bytes())?;
            writer.write_all(ending.as_bytes())?;
        }
        Ok(())
    }

    /// Remaining output lines, without terminators. The iterator stops after the first error.
    pub fn lines(&mut self) -> Lines<'_, S> {
        Lines {
            preprocessor: self,
            failed: false,
        }
    }
}

#[cfg(feature = "async")]
impl<S: crate::input::AsyncLineSource> Preprocessor<S> {
    pub async fn read_line_async(&mut self) -> Result<Option<String>> {
        while !self.finished {
            let raw = self.source.next_line().await?;
            match self.process(raw)? {
                Some(Step::Emit(line)) => return Ok(Some(line)),
                Some(Step::Skip) => continue,
                None => break,
            }
        }
        Ok(None)
    }

    pub async fn read_to_end_async(&mut self) -> Result<String> {
        let ending = self.options.line_ending.as_str();
        let mut output = String::new();
        while let Some(line) = self.read_line_async().await? {
            output.push_str(&line);
            output.push_str(ending);
        }
        Ok(output)
    }
}

pub struct Lines<'a, S> {
    preprocessor: &'a mut Preprocessor<S>,
    failed: bool,
}

impl<S: LineSource> Iterator for Lines<'_, S> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.preprocessor.read_line() {
            Ok(line) => line.map(Ok),
            Err(error) => {
                self.failed = true;
                Some(Err(error))
            }
        }
    }
}

impl<S: LineSource> std::iter::FusedIterator for Lines<'_, S> {}
