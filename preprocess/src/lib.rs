//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! A line oriented text preprocessor.
//!
//! Input is read one line at a time. Lines starting with the statement marker (`#` by default)
//! are directives which define variables and open conditional or switch blocks; they are never
//! part of the output. Every other line in a selected branch has its variable references
//! expanded, comment and blank lines handled, tabs expanded, indentation added and is then
//! emitted with the configured line ending. Nothing about the format of the text being
//! processed is assumed.
//!
//! ```text
//! #define env=prod
//! #if $<env>==prod
//! host = $<<PROD_HOST>>
//! #else
//! host = localhost
//! #endif
//! ```

use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use clap::builder::{TypedValueParser, ValueParserFactory};

mod directive;
pub mod error;
mod expand;
mod format;
mod input;
mod options;
mod preprocessor;
mod profile;
mod symbols;

pub use error::{Error, GetExitCode, Result};
pub use expand::{Expander, Reference};
pub use input::{LineSource, ReadLines};
#[cfg(feature = "async")]
pub use input::{AsyncLineSource, AsyncReadLines};
pub use options::{LineEnding, Options, OptionsBuilder, VariablePattern, VariableStyle};
pub use preprocessor::{Lines, Preprocessor};
pub use profile::{NoProfileResolver, ProfileKind, ProfileResolver, ResolveError};
pub use symbols::{is_identifier, SymbolTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentDefine {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Clone)]
pub struct ArgumentDefineParser;

impl TypedValueParser for ArgumentDefineParser {
    type Value = ArgumentDefine;

    fn parse_ref(
        &self,
        cmd: &clap::Command,
        _arg: Option<&clap::Arg>,
        value: &OsStr,
    ) -> std::result::Result<Self::Value, clap::Error> {
        let value = value
            .to_str()
            .ok_or_else(|| clap::Error::new(clap::error::ErrorKind::InvalidUtf8).with_cmd(cmd))?;
        let (name, value) = match value.split_once('=') {
            Some((name, value)) => (name, Some(value.to_owned())),
            None => (value, None),
        };
        if !is_identifier(name) {
            return Err(clap::Error::raw(
                clap::error::ErrorKind::InvalidValue,
                format!("invalid variable name {name:?}\n"),
            )
            .with_cmd(cmd));
        }
        Ok(ArgumentDefine {
            name: name.to_owned(),
            value,
        })
    }
}

impl ValueParserFactory for ArgumentDefine {
    type Parser = ArgumentDefineParser;

    fn value_parser() -> Self::Parser {
        ArgumentDefineParser
    }
}

#[derive(Debug, clap::Parser, Clone)]
#[command(version, about)]
pub struct Args {
    /// `name[=val]`
    ///
    /// Define `name` to `val` or to the empty string if `=val` is omitted.
    #[arg(short = 'D', long)]
    pub define: Vec<ArgumentDefine>,
    /// Character introducing a directive line.
    #[arg(short = 'm', long, default_value_t = options::DEFAULT_STATEMENT_MARKER)]
    pub statement_marker: char,
    /// Delimiters used by variable references.
    #[arg(short = 's', long, value_enum, default_value_t)]
    pub style: VariableStyle,
    /// Treat directive lines as ordinary text.
    #[arg(long)]
    pub no_statements: bool,
    /// Leave variable references untouched.
    #[arg(long)]
    pub no_expand: bool,
    /// Prefix marking a comment line, may be repeated. Replaces the default `//`.
    #[arg(short = 'c', long = "comment-marker")]
    pub comment_markers: Vec<String>,
    /// Emit comment lines as they are instead of blanking them.
    #[arg(short = 'k', long)]
    pub keep_comments: bool,
    /// Drop comment lines from the output entirely.
    #[arg(short = 'r', long)]
    pub remove_comments: bool,
    /// Drop lines that are empty or only whitespace.
    #[arg(short = 'b', long)]
    pub remove_blank: bool,
    /// Expand tabs to this column width, 0 leaves tabs alone.
    #[arg(short = 't', long, default_value_t = 0)]
    pub tab_stop: usize,
    /// Number of spaces prefixed to every output line.
    #[arg(short = 'i', long, default_value_t = 0)]
    pub indent: usize,
    #[arg(long, value_enum, default_value_t)]
    pub line_ending: LineEnding,
    /// Substituted for undefined variables instead of failing.
    #[arg(long)]
    pub default_variable: Option<String>,
    /// Substituted for undefined environment variables instead of failing.
    #[arg(long)]
    pub default_environment_variable: Option<String>,
    /// Files to process, standard input when none are given.
    pub files: Vec<PathBuf>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            define: Vec::default(),
            statement_marker: options::DEFAULT_STATEMENT_MARKER,
            style: VariableStyle::default(),
            no_statements: false,
            no_expand: false,
            comment_markers: Vec::default(),
            keep_comments: false,
            remove_comments: false,
            remove_blank: false,
            tab_stop: 0,
            indent: 0,
            line_ending: LineEnding::default(),
            default_variable: None,
            default_environment_variable: None,
            files: Vec::default(),
        }
    }
}

impl Args {
    pub fn options(&self) -> Result<Options> {
        let mut builder = Options::builder()
            .statement_marker(self.statement_marker)
            .variable_pattern(self.style)
            .process_statements(!self.no_statements)
            .expand_variables(!self.no_expand)
            .strip_comments(!self.keep_comments)
            .remove_comments(self.remove_comments)
            .remove_blank(self.remove_blank)
            .tab_stop(self.tab_stop)
            .indent(self.indent)
            .line_ending(self.line_ending);
        if !self.comment_markers.is_empty() {
            builder = builder.clear_comment_markers();
            for marker in &self.comment_markers {
                builder = builder.comment_marker(marker.as_str());
            }
        }
        if let Some(value) = &self.default_variable {
            builder = builder.default_variable(value.as_str());
        }
        if let Some(value) = &self.default_environment_variable {
            builder = builder.default_environment_variable(value.as_str());
        }
        builder.build()
    }
}

pub fn run<STDOUT: Write, STDERR: Write>(
    mut stdout: STDOUT,
    mut stderr: STDERR,
    args: Args,
) -> crate::error::Result<()> {
    let result = run_impl(&mut stdout, &args);
    stdout.flush()?;
    if let Err((name, error)) = result {
        let message = match name {
            Some(name) => format!("preprocess: {name}: {error}\n"),
            None => format!("preprocess: {error}\n"),
        };
        stderr.write_all(message.as_bytes())?;
        return Err(error);
    }
    Ok(())
}

/// On failure, also returns the name of the input being processed, if any.
fn run_impl(
    stdout: &mut dyn Write,
    args: &Args,
) -> std::result::Result<(), (Option<String>, Error)> {
    let options = args.options().map_err(|error| (None, error))?;

    if args.files.is_empty() {
        log::debug!("processing stdin");
        return process_input(io::stdin().lock(), options, &args.define, stdout)
            .map_err(|error| (Some("stdin".to_owned()), error));
    }

    for path in &args.files {
        log::debug!("processing {}", path.display());
        let name = || Some(path.display().to_string());
        let file = File::open(path).map_err(|error| (name(), Error::from(error)))?;
        process_input(BufReader::new(file), options.clone(), &args.define, stdout)
            .map_err(|error| (name(), error))?;
    }
    Ok(())
}

/// Each input is a separate document, only the `-D` definitions carry over.
fn process_input<R: BufRead>(
    reader: R,
    options: Options,
    defines: &[ArgumentDefine],
    stdout: &mut dyn Write,
) -> Result<()> {
    let mut preprocessor = Preprocessor::from_reader(reader, options);
    for define in defines {
        preprocessor.set(&define.name, define.value.as_deref().unwrap_or_default())?;
    }
    preprocessor.write_to(stdout)
}
