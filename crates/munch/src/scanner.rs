//! Streaming maximal-munch tokenizer over a queue of input sources

use std::{
    borrow::Cow,
    collections::VecDeque,
    fmt,
    fs::File,
    io::{self, Read},
    mem,
    path::PathBuf,
};

use crate::table::{CompiledTable, Label};

/// Tuning knobs for a [`Scanner`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScannerConfig {
    /// Capacity of each of the two input buffers, in bytes
    pub buffer_size: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self { Self { buffer_size: 4096 } }
}

impl ScannerConfig {
    /// # Errors
    /// Returns an error if the buffer size is zero.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.buffer_size == 0 {
            return Err(ScanError::Config("buffer size must be at least 1"));
        }

        Ok(())
    }
}

/// One input stream
pub enum Source {
    /// A file, opened when the scanner reaches it
    Path(PathBuf),
    Reader(Box<dyn Read>),
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Self::Reader(_) => f.debug_tuple("Reader").finish_non_exhaustive(),
        }
    }
}

impl Source {
    #[must_use]
    #[inline]
    pub fn path(path: impl Into<PathBuf>) -> Self { Self::Path(path.into()) }

    #[must_use]
    #[inline]
    pub fn reader(reader: impl Read + 'static) -> Self { Self::Reader(Box::new(reader)) }

    fn open(self) -> io::Result<Box<dyn Read>> {
        Ok(match self {
            Self::Path(p) => Box::new(File::open(p)?),
            Self::Reader(r) => r,
        })
    }
}

impl From<PathBuf> for Source {
    #[inline]
    fn from(path: PathBuf) -> Self { Self::Path(path) }
}

/// Sources waiting to be scanned, front first
pub type SourceQueue = VecDeque<Source>;

/// Where a lexeme starts: the index of its source in the queue the scanner
/// was created with, and a byte offset into that source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub source: usize,
    pub offset: u64,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.offset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Lexeme {
    pub label: Label,
    pub text: Vec<u8>,
    pub position: Position,
}

impl Lexeme {
    #[must_use]
    #[inline]
    pub fn text_lossy(&self) -> Cow<'_, str> { String::from_utf8_lossy(&self.text) }
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("No token matches at {position} (byte {byte:#04x})")]
    NoMatch { position: Position, byte: u8 },
    #[error("All sources have been scanned")]
    SourceExhausted,
    #[error("Error reading source {source_index}")]
    Io {
        source_index: usize,
        #[source]
        error: io::Error,
    },
    #[error("Invalid scanner configuration: {0}")]
    Config(&'static str),
}

// Marks the end of the valid bytes in a buffer
const SENTINEL: u8 = 0;

/// Splits a queue of sources into lexemes using a compiled table
///
/// Input is read through two alternating buffers of `buffer_size` bytes plus
/// one sentinel slot each.  Each refill takes whatever a single read of the
/// source returns, so input arriving in small pieces is scanned as soon as it
/// arrives.  The scanner reads ahead until the table dies,
/// then backs off to the longest accepting prefix; bytes read past the end of
/// that prefix are replayed by the next call.  Lexemes never span two sources
/// and are never empty.
pub struct Scanner<'t> {
    table: &'t CompiledTable,
    size: usize,
    sources: SourceQueue,
    opened: usize,
    reader: Option<Box<dyn Read>>,

    buffers: [Box<[u8]>; 2],
    valid: [usize; 2],
    eof: [bool; 2],
    cur: usize,
    pos: usize,

    // offset of the first byte of the next attempt within the current source
    begin: u64,
    // offset of the next byte `next_byte` returns
    forward: u64,
    replay: VecDeque<u8>,
    pending: Vec<u8>,
    stack: Vec<u32>,
}

impl fmt::Debug for Scanner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("buffer_size", &self.size)
            .field("sources", &self.sources)
            .field("source", &self.source_index())
            .field("begin", &self.begin)
            .field("forward", &self.forward)
            .field("replay", &self.replay.len())
            .finish_non_exhaustive()
    }
}

impl<'t> Scanner<'t> {
    /// Create a scanner with the default configuration
    #[must_use]
    pub fn new<S: IntoIterator<Item = Source>>(table: &'t CompiledTable, sources: S) -> Self {
        Self::init(table, sources, ScannerConfig::default())
    }

    /// # Errors
    /// Returns an error if `config` is invalid.
    pub fn with_config<S: IntoIterator<Item = Source>>(
        table: &'t CompiledTable,
        sources: S,
        config: ScannerConfig,
    ) -> Result<Self, ScanError> {
        config.validate()?;
        Ok(Self::init(table, sources, config))
    }

    fn init<S: IntoIterator<Item = Source>>(
        table: &'t CompiledTable,
        sources: S,
        config: ScannerConfig,
    ) -> Self {
        let size = config.buffer_size;
        let buffer = || vec![0; size + 1].into_boxed_slice();

        Self {
            table,
            size,
            sources: sources.into_iter().collect(),
            opened: 0,
            reader: None,
            buffers: [buffer(), buffer()],
            // Nothing open yet, so both buffers read as spent; zeroed buffers
            // already start with the sentinel
            valid: [0; 2],
            eof: [true; 2],
            cur: 0,
            pos: 0,
            begin: 0,
            forward: 0,
            replay: VecDeque::new(),
            pending: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// Index of the source currently being scanned, if any has been opened
    #[must_use]
    #[inline]
    pub fn source_index(&self) -> Option<usize> { self.opened.checked_sub(1) }

    /// Sources not opened yet
    #[must_use]
    #[inline]
    pub fn remaining_sources(&self) -> usize { self.sources.len() }

    fn start_position(&self) -> Position {
        Position {
            source: self.source_index().unwrap_or(0),
            offset: self.begin,
        }
    }

    fn source_over(&self) -> bool { self.eof[self.cur] && self.pos >= self.valid[self.cur] }

    fn io_error(&mut self, error: io::Error) -> ScanError {
        let source_index = self.source_index().unwrap_or(0);
        tracing::debug!(source_index, %error, "Abandoning source");

        self.reader = None;
        self.valid[self.cur] = self.pos;
        self.eof[self.cur] = true;
        self.buffers[self.cur][self.pos] = SENTINEL;
        self.replay.clear();
        self.pending.clear();
        self.forward = self.begin;

        ScanError::Io {
            source_index,
            error,
        }
    }

    /// Refill buffer `idx` with a single read of up to `size` bytes from the
    /// current source and terminate it with the sentinel.  An empty read is
    /// the end of the source.
    fn fill(&mut self, idx: usize) -> io::Result<()> {
        let buf = &mut self.buffers[idx];
        let mut len = 0;

        if let Some(reader) = self.reader.as_mut() {
            len = loop {
                match reader.read(&mut buf[..self.size]) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => (),
                    Err(e) => return Err(e),
                }
            };
        }

        buf[len] = SENTINEL;
        self.valid[idx] = len;
        self.eof[idx] = len == 0;
        if len == 0 {
            self.reader = None;
        }

        Ok(())
    }

    /// Advance to the next non-empty source.  Returns false if the queue ran
    /// dry.
    fn open_next(&mut self) -> Result<bool, ScanError> {
        while let Some(source) = self.sources.pop_front() {
            self.opened += 1;
            self.begin = 0;
            self.forward = 0;
            self.cur = 0;
            self.pos = 0;
            self.valid = [0; 2];
            self.eof = [true; 2];

            let reader = source.open().map_err(|e| self.io_error(e))?;
            self.reader = Some(reader);
            self.fill(0).map_err(|e| self.io_error(e))?;

            if self.valid[0] > 0 {
                tracing::debug!(source_index = self.opened - 1, "Opened source");
                return Ok(true);
            }

            tracing::debug!(source_index = self.opened - 1, "Skipping empty source");
        }

        Ok(false)
    }

    /// Next byte of the current source from the buffers, refilling the other
    /// buffer when the cursor reaches the sentinel slot
    fn read_buffered(&mut self) -> io::Result<Option<u8>> {
        loop {
            let cur = self.cur;
            debug_assert!(self.pos <= self.valid[cur]);
            let byte = self.buffers[cur][self.pos];

            // The sentinel value is also a valid input byte
            if byte != SENTINEL || self.pos < self.valid[cur] {
                self.pos += 1;
                return Ok(Some(byte));
            }

            if self.eof[cur] {
                return Ok(None);
            }

            let next = 1 - cur;
            self.fill(next)?;
            self.cur = next;
            self.pos = 0;
        }
    }

    fn next_byte(&mut self) -> Result<Option<u8>, ScanError> {
        let byte = match self.replay.pop_front() {
            Some(b) => Some(b),
            None => self.read_buffered().map_err(|e| self.io_error(e))?,
        };

        if byte.is_some() {
            self.forward += 1;
        }

        Ok(byte)
    }

    /// Hand the last `n` bytes of the pending lexeme back to the replay queue
    fn unread_pending(&mut self, n: usize) {
        let keep = self.pending.len() - n;
        for byte in self.pending.drain(keep..).rev() {
            self.replay.push_front(byte);
        }
        self.forward -= n as u64;
    }

    /// Try to match one lexeme at the start of the unread input.  Returns
    /// `None` if the current source ended before any byte was read.
    fn attempt(&mut self) -> Result<Option<Lexeme>, ScanError> {
        debug_assert_eq!(self.forward, self.begin);
        let position = self.start_position();
        self.pending.clear();
        self.stack.clear();
        self.stack.push(self.table.initial());

        while let Some(byte) = self.next_byte()? {
            let top = self.stack.last().copied().unwrap_or_else(|| unreachable!());
            let next = self.table.trans(top, byte);

            if next == 0 {
                self.replay.push_front(byte);
                self.forward -= 1;
                break;
            }

            self.pending.push(byte);
            self.stack.push(next);
        }

        while let Some(state) = self.stack.pop() {
            // `state` was reached after reading `pending[..depth]`
            let depth = self.stack.len();
            if depth == 0 {
                break;
            }

            let label = self.table.label(state);
            if label != 0 {
                self.unread_pending(self.pending.len() - depth);

                let text = mem::take(&mut self.pending);
                self.begin = self.forward;
                tracing::trace!(label, len = text.len(), %position, "Matched lexeme");

                return Ok(Some(Lexeme {
                    label,
                    text,
                    position,
                }));
            }
        }

        let byte = if self.pending.is_empty() {
            match self.replay.pop_front() {
                Some(b) => {
                    self.forward += 1;
                    b
                },
                None => return Ok(None),
            }
        } else {
            self.unread_pending(self.pending.len() - 1);
            self.pending[0]
        };

        self.begin = self.forward;
        Err(ScanError::NoMatch { position, byte })
    }

    /// Scan the next lexeme
    ///
    /// On [`ScanError::NoMatch`] the offending byte has been skipped, so
    /// calling again resumes right after it.  On [`ScanError::Io`] the failing
    /// source has been abandoned and the next call moves on to the following
    /// source.
    ///
    /// # Errors
    /// Returns [`ScanError::SourceExhausted`] once every source is used up,
    /// and the errors above.
    pub fn next_lexeme(&mut self) -> Result<Lexeme, ScanError> {
        loop {
            if self.replay.is_empty() && self.source_over() && !self.open_next()? {
                return Err(ScanError::SourceExhausted);
            }

            if let Some(lexeme) = self.attempt()? {
                return Ok(lexeme);
            }
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = Result<Lexeme, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_lexeme() {
            Err(ScanError::SourceExhausted) => None,
            res => Some(res),
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use proptest::prelude::*;

    use super::*;
    use crate::{
        lexer::{Rule, build},
        prop,
    };

    fn src(s: impl AsRef<[u8]> + 'static) -> Source { Source::reader(Cursor::new(s)) }

    fn scanner<'t>(table: &'t CompiledTable, size: usize, sources: Vec<Source>) -> Scanner<'t> {
        Scanner::with_config(table, sources, ScannerConfig { buffer_size: size }).unwrap()
    }

    // a => 2, ab* => 1
    fn longest_match_table() -> CompiledTable {
        build(&[
            Rule::new(2, prop::literal(b"a", 1)),
            Rule::new(1, prop::prefix_star(b'a', b'b', 1)),
        ])
        .unwrap()
    }

    // a+ => 1, ab => 2, ' '+ => 3
    fn word_table() -> CompiledTable {
        build(&[
            Rule::new(1, prop::plus(b"a", 1)),
            Rule::new(2, prop::literal(b"ab", 1)),
            Rule::new(3, prop::plus(b" ", 1)),
        ])
        .unwrap()
    }

    fn summarize(scanner: Scanner<'_>) -> Vec<Result<(Label, Vec<u8>, u64), (u64, u8)>> {
        scanner
            .map(|r| match r {
                Ok(l) => Ok((l.label, l.text, l.position.offset)),
                Err(ScanError::NoMatch { position, byte }) => Err((position.offset, byte)),
                Err(e) => panic!("Unexpected error: {e}"),
            })
            .collect()
    }

    struct Flaky(&'static [u8]);

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() {
                return Err(io::Error::other("flaky"));
            }

            let n = buf.len().min(self.0.len());
            buf[..n].copy_from_slice(&self.0[..n]);
            self.0 = &self.0[n..];
            Ok(n)
        }
    }

    // Hands out one chunk, then blocks like an idle terminal
    struct Interactive(Option<&'static [u8]>);

    impl Read for Interactive {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let Some(chunk) = self.0.take() else {
                return Err(io::ErrorKind::WouldBlock.into());
            };

            let n = buf.len().min(chunk.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            Ok(n)
        }
    }

    #[test]
    fn longest_match_wins() {
        let table = longest_match_table();
        let mut s = Scanner::new(&table, [src(b"abb")]);

        let lex = s.next_lexeme().unwrap();
        assert_eq!((lex.label, &lex.text[..]), (1, &b"abb"[..]));
        assert!(matches!(s.next_lexeme(), Err(ScanError::SourceExhausted)));
    }

    #[test]
    fn backtracks_then_reports_no_match() {
        let table = longest_match_table();
        let mut s = Scanner::new(&table, [src(b"ac")]);

        let lex = s.next_lexeme().unwrap();
        assert_eq!((lex.label, &lex.text[..]), (2, &b"a"[..]));

        match s.next_lexeme() {
            Err(ScanError::NoMatch { position, byte }) => {
                assert_eq!(position, Position {
                    source: 0,
                    offset: 1
                });
                assert_eq!(byte, b'c');
            },
            r => panic!("Expected NoMatch, got {r:?}"),
        }

        assert!(matches!(s.next_lexeme(), Err(ScanError::SourceExhausted)));
        assert!(matches!(s.next_lexeme(), Err(ScanError::SourceExhausted)));
    }

    #[test]
    fn partial_progress_replays_after_skip() {
        let table = build(&[
            Rule::new(1, prop::literal(b"abc", 1)),
            Rule::new(2, prop::literal(b"b", 1)),
        ])
        .unwrap();
        let s = scanner(&table, 2, vec![src(b"abx")]);

        assert_eq!(summarize(s), vec![
            Err((0, b'a')),
            Ok((2, b"b".to_vec(), 1)),
            Err((2, b'x'))
        ]);
    }

    #[test]
    fn tokens_across_buffer_boundaries() {
        const N: usize = 4;
        let table = word_table();

        let mut input = Vec::new();
        for len in [N, 2 * N, 3 * N, N - 1, N + 1] {
            input.extend(std::iter::repeat_n(b'a', len));
            input.push(b' ');
        }
        let lexemes: Vec<_> = scanner(&table, N, vec![src(input)])
            .map(Result::unwrap)
            .filter(|l| l.label == 1)
            .map(|l| l.text.len())
            .collect();

        assert_eq!(lexemes, [N, 2 * N, 3 * N, N - 1, N + 1]);
    }

    #[test]
    fn tokens_do_not_span_sources() {
        let table = build(&[Rule::new(1, prop::plus(b"ab", 1))]).unwrap();
        let lexemes: Vec<_> = scanner(&table, 1, vec![src(b"ab"), src(b""), src(b"ba")])
            .map(Result::unwrap)
            .map(|l| (l.text, l.position))
            .collect();

        assert_eq!(lexemes, [
            (b"ab".to_vec(), Position {
                source: 0,
                offset: 0
            }),
            (b"ba".to_vec(), Position {
                source: 2,
                offset: 0
            }),
        ]);
    }

    #[test]
    fn io_errors_abandon_the_source() {
        let table = word_table();
        let mut s = scanner(&table, 2, vec![
            Source::reader(Flaky(b"aaa")),
            Source::path("/nonexistent/munch/input"),
            src(b"aa"),
        ]);

        assert!(matches!(s.next_lexeme(), Err(ScanError::Io {
            source_index: 0,
            ..
        })));
        assert!(matches!(s.next_lexeme(), Err(ScanError::Io {
            source_index: 1,
            ..
        })));

        let lex = s.next_lexeme().unwrap();
        assert_eq!(lex.text, b"aa");
        assert_eq!(lex.position.source, 2);
        assert!(s.next().is_none());
    }

    #[test]
    fn reads_files() {
        let path = std::env::temp_dir().join(format!("munch-scanner-{}", std::process::id()));
        std::fs::write(&path, b"aa ab").unwrap();

        let table = word_table();
        let labels: Vec<_> = scanner(&table, 3, vec![Source::path(&path)])
            .map(|r| r.unwrap().label)
            .collect();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(labels, [1, 3, 2]);
    }

    #[test]
    fn short_reads_yield_lexemes_early() {
        let table = word_table();
        let mut s = Scanner::new(&table, [Source::reader(Interactive(Some(b"aa ")))]);

        let lex = s.next_lexeme().unwrap();
        assert_eq!((lex.label, &lex.text[..]), (1, &b"aa"[..]));

        // The space could still grow, so the scanner has to ask for more
        match s.next_lexeme() {
            Err(ScanError::Io { source_index, error }) => {
                assert_eq!(source_index, 0);
                assert_eq!(error.kind(), io::ErrorKind::WouldBlock);
            },
            r => panic!("Expected Io, got {r:?}"),
        }
        assert!(s.next().is_none());
    }

    #[test]
    fn sentinel_bytes_are_input() {
        let table = build(&[
            Rule::new(1, prop::plus(b"\0a", 1)),
            Rule::new(3, prop::plus(b" ", 1)),
        ])
        .unwrap();

        for size in 1..=4 {
            let lexemes: Vec<_> = scanner(&table, size, vec![src(b"a\0\0 \0 a\0")])
                .map(Result::unwrap)
                .map(|l| (l.label, l.text, l.position.offset))
                .collect();

            assert_eq!(
                lexemes,
                [
                    (1, b"a\0\0".to_vec(), 0),
                    (3, b" ".to_vec(), 3),
                    (1, b"\0".to_vec(), 4),
                    (3, b" ".to_vec(), 5),
                    (1, b"a\0".to_vec(), 6),
                ],
                "size = {size}"
            );
        }
    }

    #[test]
    fn iterator_adapters_see_every_lexeme() {
        let table = word_table();
        let found =
            Scanner::new(&table, [src(b"aa  ab")]).position(|r| r.is_ok_and(|l| l.label == 2));

        assert_eq!(found, Some(2));
    }

    #[test]
    fn zero_buffer_is_rejected() {
        let table = word_table();
        assert!(matches!(
            Scanner::with_config(&table, [], ScannerConfig { buffer_size: 0 }),
            Err(ScanError::Config(_))
        ));
    }

    proptest! {
        #[test]
        fn buffer_size_does_not_matter(
            input in proptest::collection::vec(prop::symbol(b"ab "), 0..64),
            size in 1_usize..9,
        ) {
            let table = word_table();
            let small = summarize(scanner(&table, size, vec![src(input.clone())]));
            let large = summarize(Scanner::new(&table, [src(input.clone())]));
            prop_assert_eq!(&small, &large);

            let matched: usize = large.iter().map(|r| r.as_ref().map_or(1, |(_, t, _)| t.len())).sum();
            prop_assert_eq!(matched, input.len());
        }
    }
}
