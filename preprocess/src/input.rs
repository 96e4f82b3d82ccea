//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::io::{self, BufRead};

/// Something the preprocessor can pull raw lines from. Lines are returned without their
/// terminator, `None` signals the end of the input.
pub trait LineSource {
    fn next_line(&mut self) -> io::Result<Option<String>>;
}

impl<T: LineSource + ?Sized> LineSource for Box<T> {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        (**self).next_line()
    }
}

/// Splitting state shared by the blocking and async readers.
#[derive(Debug, Default)]
struct LineSplitter {
    line: Vec<u8>,
    /// The previous line ended with a bare `\r`, a `\n` at the start of the next buffer
    /// belongs to it.
    pending_cr: bool,
    line_number: usize,
}

enum Scan {
    /// Terminator found, consume this many bytes and yield the line.
    Line(usize),
    /// No terminator yet, consume everything and refill.
    Partial(usize),
}

impl LineSplitter {
    fn scan(&mut self, available: &[u8]) -> Scan {
        let mut start = 0;
        if self.pending_cr {
            self.pending_cr = false;
            if available.first() == Some(&b'\n') {
                start = 1;
            }
        }

        match available[start..]
            .iter()
            .position(|b| *b == b'\n' || *b == b'\r')
        {
            Some(i) => {
                let end = start + i;
                self.line.extend_from_slice(&available[start..end]);
                if available[end] == b'\r' {
                    if available.get(end + 1) == Some(&b'\n') {
                        return Scan::Line(end + 2);
                    }
                    // The `\n` may still be in the next buffer.
                    self.pending_cr = end + 1 == available.len();
                }
                Scan::Line(end + 1)
            }
            None => {
                self.line.extend_from_slice(&available[start..]);
                Scan::Partial(available.len())
            }
        }
    }

    /// Called once the reader is exhausted, flushes an unterminated last line.
    fn finish(&mut self) -> io::Result<Option<String>> {
        if self.line.is_empty() {
            return Ok(None);
        }
        self.take()
    }

    fn take(&mut self) -> io::Result<Option<String>> {
        self.line_number += 1;
        let bytes = std::mem::take(&mut self.line);
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// Reads lines from a [`BufRead`], accepting `\n`, `\r\n` and bare `\r` terminators.
pub struct ReadLines<R> {
    reader: R,
    splitter: LineSplitter,
}

impl<R: BufRead> ReadLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            splitter: LineSplitter::default(),
        }
    }

    /// Number of lines returned so far.
    pub fn line_number(&self) -> usize {
        self.splitter.line_number
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: BufRead> LineSource for ReadLines<R> {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            let available = match self.reader.fill_buf() {
                Ok(available) => available,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if available.is_empty() {
                return self.splitter.finish();
            }
            match self.splitter.scan(available) {
                Scan::Line(n) => {
                    self.reader.consume(n);
                    return self.splitter.take();
                }
                Scan::Partial(n) => self.reader.consume(n),
            }
        }
    }
}

#[cfg(feature = "async")]
pub use self::non_blocking::{AsyncLineSource, AsyncReadLines};

#[cfg(feature = "async")]
mod non_blocking {
    use super::{LineSplitter, Scan};
    use std::io;
    use tokio::io::{AsyncBufRead, AsyncBufReadExt};

    /// Async counterpart of [`super::LineSource`].
    #[async_trait::async_trait]
    pub trait AsyncLineSource {
        async fn next_line(&mut self) -> io::Result<Option<String>>;
    }

    /// Reads lines from a tokio [`AsyncBufRead`], with the same terminator handling as
    /// [`super::ReadLines`].
    pub struct AsyncReadLines<R> {
        reader: R,
        splitter: LineSplitter,
    }

    impl<R: AsyncBufRead + Unpin + Send> AsyncReadLines<R> {
        pub fn new(reader: R) -> Self {
            Self {
                reader,
                splitter: LineSplitter::default(),
            }
        }

        pub fn line_number(&self) -> usize {
            self.splitter.line_number
        }

        pub fn into_inner(self) -> R {
            self.reader
        }
    }

    #[async_trait::async_trait]
    impl<R: AsyncBufRead + Unpin + Send> AsyncLineSource for AsyncReadLines<R> {
        async fn next_line(&mut self) -> io::Result<Option<String>> {
            loop {
                let scan = {
                    let available = self.reader.fill_buf().await?;
                    if available.is_empty() {
                        return self.splitter.finish();
                    }
                    self.splitter.scan(available)
                };
                match scan {
                    Scan::Line(n) => {
                        self.reader.consume(n);
                        return self.splitter.take();
                    }
                    Scan::Partial(n) => self.reader.consume(n),
                }
            }
        }
    }
}
