//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use crate::options::Options;

/// A comment line starts with one of the markers once leading whitespace is skipped. Markers
/// further along the line do not count.
pub fn is_comment(line: &str, markers: &[String]) -> bool {
    let trimmed = line.trim_start();
    markers.iter().any(|marker| trimmed.starts_with(marker.as_str()))
}

/// Replace each tab with spaces up to the next column that is a multiple of `tab_stop`.
pub fn expand_tabs(line: &str, tab_stop: usize) -> String {
    if tab_stop == 0 || !line.contains('\t') {
        return line.to_owned();
    }

    let mut output = String::with_capacity(line.len() + tab_stop);
    let mut column: usize = 0;
    for c in line.chars() {
        if c == '\t' {
            let n = tab_stop - (column % tab_stop);
            output.extend(std::iter::repeat(' ').take(n));
            column += n;
        } else {
            output.push(c);
            column += 1;
        }
    }
    output
}

/// Comment, blank line, tab and indent handling for an already expanded line. Returns `None`
/// when the line is to be dropped from the output altogether.
pub fn format_line(options: &Options, line: String) -> Option<String> {
    let line = if is_comment(&line, &options.comment_markers) {
        if options.remove_comments {
            log::trace!("removing comment line {line:?}");
            return None;
        }
        if options.strip_comments {
            String::new()
        } else {
            line
        }
    } else {
        line
    };

    if options.remove_blank && line.trim().is_empty() {
        return None;
    }

    let line = expand_tabs(&line, options.tab_stop);

    if options.indent == 0 {
        return Some(line);
    }
    let mut indented = " ".repeat(options.indent);
    indented.push_str(&line);
    Some(indented)
}
