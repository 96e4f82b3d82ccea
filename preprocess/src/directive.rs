//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Directive lines and the stack of open `if`/`switch` blocks.
//!
//! A directive is a line whose trimmed text starts with the statement marker immediately
//! followed by one of the keywords below. Anything else, `#ifdef` or `#!/bin/sh` included,
//! is ordinary text.
//!
//! ```text
//! #define name[=value]
//! #if lhs == rhs | lhs != rhs | defined(name) | undefined(name)
//! #else
//! #endif
//! #switch expression
//! #case value
//! #default
//! #endswitch
//! ```

use std::collections::HashSet;

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{alpha1, alphanumeric1, char, space0};
use nom::combinator::recognize;
use nom::multi::many0_count;
use nom::sequence::{delimited, pair, terminated};
use nom::IResult;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Define,
    If,
    Else,
    EndIf,
    Switch,
    Case,
    Default,
    EndSwitch,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "define" => Keyword::Define,
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "endif" => Keyword::EndIf,
            "switch" => Keyword::Switch,
            "case" => Keyword::Case,
            "default" => Keyword::Default,
            "endswitch" => Keyword::EndSwitch,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Define => "define",
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::EndIf => "endif",
            Keyword::Switch => "switch",
            Keyword::Case => "case",
            Keyword::Default => "default",
            Keyword::EndSwitch => "endswitch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition<'a> {
    Equals(&'a str, &'a str),
    NotEquals(&'a str, &'a str),
    Defined(&'a str),
    Undefined(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive<'a> {
    Define { name: &'a str, value: &'a str },
    If(Condition<'a>),
    Else,
    EndIf,
    Switch(&'a str),
    Case(&'a str),
    Default,
    EndSwitch,
}

/// `[_a-zA-Z][_a-zA-Z0-9]*`
fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(input)
}

/// Splits a directive line into its keyword and argument text. Returns `None` when the line
/// is not a directive at all.
pub fn split_directive(line: &str, marker: char) -> Option<(Keyword, &str)> {
    let rest = line.trim().strip_prefix(marker)?;
    let (args, word) = alpha1::<_, nom::error::Error<&str>>(rest).ok()?;
    Keyword::from_word(word).map(|keyword| (keyword, args))
}

/// Parses the arguments of a directive. The error is a message describing the problem.
pub fn parse_directive(keyword: Keyword, args: &str) -> std::result::Result<Directive<'_>, String> {
    let args = args.trim();
    match keyword {
        Keyword::Define => parse_define(args),
        Keyword::If => parse_condition(args).map(Directive::If),
        Keyword::Switch => required(keyword, args).map(Directive::Switch),
        Keyword::Case => required(keyword, args).map(Directive::Case),
        Keyword::Else => bare(keyword, args, Directive::Else),
        Keyword::EndIf => bare(keyword, args, Directive::EndIf),
        Keyword::Default => bare(keyword, args, Directive::Default),
        Keyword::EndSwitch => bare(keyword, args, Directive::EndSwitch),
    }
}

fn required(keyword: Keyword, args: &str) -> std::result::Result<&str, String> {
    if args.is_empty() {
        Err(format!("`{}` requires an argument", keyword.as_str()))
    } else {
        Ok(args)
    }
}

fn bare(
    keyword: Keyword,
    args: &str,
    directive: Directive<'static>,
) -> std::result::Result<Directive<'static>, String> {
    if args.is_empty() {
        Ok(directive)
    } else {
        Err(format!(
            "unexpected {args:?} after `{}`",
            keyword.as_str()
        ))
    }
}

fn parse_define(args: &str) -> std::result::Result<Directive<'_>, String> {
    if args.is_empty() {
        return Err("`define` requires a variable name".to_owned());
    }
    let (rest, name) =
        identifier(args).map_err(|_| format!("invalid variable name in `define {args}`"))?;
    let rest = rest.trim_start();
    if rest.is_empty() {
        return Ok(Directive::Define { name, value: "" });
    }
    match rest.strip_prefix('=') {
        Some(value) => Ok(Directive::Define {
            name,
            value: value.trim(),
        }),
        None => Err(format!("unexpected {rest:?} after variable name {name:?}")),
    }
}

fn parse_condition(args: &str) -> std::result::Result<Condition<'_>, String> {
    if args.is_empty() {
        return Err("`if` requires an expression".to_owned());
    }

    let function: IResult<&str, &str> =
        terminated(alt((tag("defined"), tag("undefined"))), space0)(args);
    if let Ok((rest, function)) = function {
        if rest.starts_with('(') {
            let call: IResult<&str, &str> =
                delimited(pair(char('('), space0), identifier, pair(space0, char(')')))(rest);
            return match call {
                Ok((tail, name)) if tail.trim().is_empty() => Ok(if function == "defined" {
                    Condition::Defined(name)
                } else {
                    Condition::Undefined(name)
                }),
                _ => Err(format!("malformed `{function}(name)` in `if {args}`")),
            };
        }
    }

    let operator = [("==", false), ("!=", true)]
        .into_iter()
        .filter_map(|(op, negated)| args.find(op).map(|at| (at, negated)))
        .min_by_key(|(at, _)| *at);
    let Some((at, negated)) = operator else {
        return Err(format!(
            "expected `==`, `!=`, `defined(name)` or `undefined(name)` in `if {args}`"
        ));
    };
    let lhs = args[..at].trim();
    let rhs = args[at + 2..].trim();
    if lhs.is_empty() || rhs.is_empty() {
        return Err(format!("missing operand in `if {args}`"));
    }
    Ok(if negated {
        Condition::NotEquals(lhs, rhs)
    } else {
        Condition::Equals(lhs, rhs)
    })
}

#[derive(Debug)]
enum FrameKind {
    If {
        in_else: bool,
    },
    Switch {
        /// Expanded `switch` expression, `None` when the block is inside an inactive branch.
        value: Option<String>,
        cases: HashSet<String>,
        matched: bool,
        in_default: bool,
    },
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    /// Whether this frame's current branch is the selected one.
    selected: bool,
    /// Whether every enclosing frame was active when this one was opened.
    outer_active: bool,
    /// Line of the opening directive.
    line: usize,
}

impl Frame {
    fn is_active(&self) -> bool {
        self.selected && self.outer_active
    }
}

/// Open `if` and `switch` blocks. A line is emitted only while every open block has its
/// current branch selected, an inner block can never re-enable output its outer block disabled.
#[derive(Debug, Default)]
pub struct ConditionalStack {
    frames: Vec<Frame>,
}

impl ConditionalStack {
    pub fn is_active(&self) -> bool {
        self.frames.last().map_or(true, Frame::is_active)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push_if(&mut self, selected: bool, line: usize) {
        let outer_active = self.is_active();
        self.frames.push(Frame {
            kind: FrameKind::If { in_else: false },
            selected,
            outer_active,
            line,
        });
    }

    pub fn else_branch(&mut self, line: usize) -> Result<()> {
        match self.frames.last_mut() {
            Some(Frame {
                kind: FrameKind::If { in_else },
                selected,
                ..
            }) => {
                if *in_else {
                    return Err(Error::directive(line, "`else` after `else`"));
                }
                *in_else = true;
                *selected = !*selected;
                Ok(())
            }
            _ => Err(Error::directive(line, "`else` without matching `if`")),
        }
    }

    pub fn end_if(&mut self, line: usize) -> Result<()> {
        match self.frames.last() {
            Some(Frame {
                kind: FrameKind::If { .. },
                ..
            }) => {
                self.frames.pop();
                Ok(())
            }
            _ => Err(Error::directive(line, "`endif` without matching `if`")),
        }
    }

    /// The body between `switch` and its first `case` is never emitted.
    pub fn push_switch(&mut self, value: Option<String>, line: usize) {
        let outer_active = self.is_active();
        self.frames.push(Frame {
            kind: FrameKind::Switch {
                value,
                cases: HashSet::new(),
                matched: false,
                in_default: false,
            },
            selected: false,
            outer_active,
            line,
        });
    }

    /// First matching case wins, later cases are skipped even when they match too.
    pub fn case(&mut self, case: &str, line: usize) -> Result<()> {
        let Some(Frame {
            kind:
                FrameKind::Switch {
                    value,
                    cases,
                    matched,
                    in_default,
                },
            selected,
            ..
        }) = self.frames.last_mut()
        else {
            return Err(Error::directive(line, "`case` without matching `switch`"));
        };

        if *in_default {
            return Err(Error::directive(line, "`case` after `default`"));
        }
        if !cases.insert(case.to_owned()) {
            return Err(Error::directive(line, format!("duplicate `case {case}`")));
        }

        *selected = !*matched && value.as_deref() == Some(case);
        *matched |= *selected;
        Ok(())
    }

    pub fn default_branch(&mut self, line: usize) -> Result<()> {
        let Some(Frame {
            kind:
                FrameKind::Switch {
                    matched,
                    in_default,
                    ..
                },
            selected,
            ..
        }) = self.frames.last_mut()
        else {
            return Err(Error::directive(line, "`default` without matching `switch`"));
        };

        if *in_default {
            return Err(Error::directive(line, "duplicate `default`"));
        }
        *in_default = true;
        *selected = !*matched;
        *matched = true;
        Ok(())
    }

    pub fn end_switch(&mut self, line: usize) -> Result<()> {
        match self.frames.last() {
            Some(Frame {
                kind: FrameKind::Switch { .. },
                ..
            }) => {
                self.frames.pop();
                Ok(())
            }
            _ => Err(Error::directive(
                line,
                "`endswitch` without matching `switch`",
            )),
        }
    }

    /// Fails if any block is still open once the input is exhausted.
    pub fn finish(&self) -> Result<()> {
        match self.frames.last() {
            None => Ok(()),
            Some(frame) => {
                let (opened, closing) = match frame.kind {
                    FrameKind::If { .. } => ("if", "endif"),
                    FrameKind::Switch { .. } => ("switch", "endswitch"),
                };
                Err(Error::directive(
                    frame.line,
                    format!("`{opened}` is never closed by `{closing}`"),
                ))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(line: &str) -> std::result::Result<Directive<'_>, String> {
        let (keyword, args) = split_directive(line, '#').expect("a directive");
        parse_directive(keyword, args)
    }

    #[test]
    fn test_not_directives() {
        for line in ["plain text", "#ifdef X", "#!/bin/bash", "# define x", "#", "x #if a==b"] {
            assert_eq!(split_directive(line, '#'), None, "{line:?}");
        }
    }

    #[test]
    fn test_custom_marker() {
        assert_eq!(split_directive("  @endif ", '@'), Some((Keyword::EndIf, "")));
        assert_eq!(split_directive("#endif", '@'), None);
    }

    #[test]
    fn test_define() {
        assert_eq!(
            parse("#define test=1"),
            Ok(Directive::Define {
                name: "test",
                value: "1"
            })
        );
        assert_eq!(
            parse("  #define  _name = a $<b> c  "),
            Ok(Directive::Define {
                name: "_name",
                value: "a $<b> c"
            })
        );
        assert_eq!(
            parse("#define flag"),
            Ok(Directive::Define {
                name: "flag",
                value: ""
            })
        );
    }

    #[test]
    fn test_define_malformed() {
        for line in ["#define", "#define   ", "#define 1abc=2", "#define a-b=1", "#define a b"] {
            assert!(parse(line).is_err(), "{line:?}");
        }
    }

    #[test]
    fn test_conditions() {
        assert_eq!(
            parse("#if $<test>==1"),
            Ok(Directive::If(Condition::Equals("$<test>", "1")))
        );
        assert_eq!(
            parse("#if a b != c d"),
            Ok(Directive::If(Condition::NotEquals("a b", "c d")))
        );
        assert_eq!(
            parse("#if defined( name )"),
            Ok(Directive::If(Condition::Defined("name")))
        );
        assert_eq!(
            parse("#if undefined(name)"),
            Ok(Directive::If(Condition::Undefined("name")))
        );
        assert_eq!(
            parse("#if definedness==x"),
            Ok(Directive::If(Condition::Equals("definedness", "x")))
        );
    }

    #[test]
    fn test_conditions_malformed() {
        for line in [
            "#if",
            "#if a",
            "#if ==b",
            "#if a!=",
            "#if defined(",
            "#if defined(a",
            "#if defined()",
            "#if defined(a) x",
            "#if undefined(1a)",
        ] {
            assert!(parse(line).is_err(), "{line:?}");
        }
    }

    #[test]
    fn test_bare_keywords() {
        assert_eq!(parse("#else"), Ok(Directive::Else));
        assert_eq!(parse("#endswitch  "), Ok(Directive::EndSwitch));
        assert!(parse("#endif extra").is_err());
        assert!(parse("#switch").is_err());
        assert!(parse("#case").is_err());
    }

    #[test]
    fn test_nested_inactive() {
        let mut stack = ConditionalStack::default();
        stack.push_if(false, 1);
        stack.push_if(true, 2);
        assert!(!stack.is_active());
        stack.else_branch(3).unwrap();
        assert!(!stack.is_active());
        stack.end_if(4).unwrap();
        stack.else_branch(5).unwrap();
        assert!(stack.is_active());
        stack.end_if(6).unwrap();
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_structure_errors() {
        let mut stack = ConditionalStack::default();
        assert!(stack.else_branch(1).unwrap_err().is_directive_syntax());
        assert!(stack.end_if(1).is_err());
        assert!(stack.case("a", 1).is_err());
        assert!(stack.default_branch(1).is_err());
        assert!(stack.end_switch(1).is_err());

        stack.push_if(true, 1);
        stack.else_branch(2).unwrap();
        assert!(stack.else_branch(3).is_err());
        assert!(stack.end_switch(3).is_err());
        match stack.finish() {
            Err(Error::Directive { line, .. }) => assert_eq!(line, 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_switch_first_match_wins() {
        let mut stack = ConditionalStack::default();
        stack.push_switch(Some("one".to_owned()), 1);
        assert!(!stack.is_active());
        stack.case("zero", 2).unwrap();
        assert!(!stack.is_active());
        stack.case("one", 3).unwrap();
        assert!(stack.is_active());
        stack.case("two", 4).unwrap();
        assert!(!stack.is_active());
        stack.default_branch(5).unwrap();
        assert!(!stack.is_active());
        stack.end_switch(6).unwrap();
        assert!(stack.is_active());
    }

    #[test]
    fn test_switch_default_and_errors() {
        let mut stack = ConditionalStack::default();
        stack.push_switch(Some("none".to_owned()), 1);
        stack.case("a", 2).unwrap();
        assert!(stack.case("a", 3).is_err());
        stack.default_branch(4).unwrap();
        assert!(stack.is_active());
        assert!(stack.case("b", 5).is_err());
        assert!(stack.default_branch(6).is_err());
        assert!(stack.end_if(7).is_err());
    }
}
