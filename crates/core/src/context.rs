//! Per-parse mutable state.

use tagweave_diagnostics::Logger;

/// Build a log parameter list from displayable values.
macro_rules! params {
    ($($value:expr),* $(,)?) => {
        vec![$($value.to_string()),*]
    };
}
pub(crate) use params;

/// Everything a single parse mutates. Created fresh for each call so a
/// compiled grammar can be shared between threads.
pub(crate) struct ParseContext<'t> {
    pub(crate) text: &'t str,
    pub(crate) log: Logger,
    /// Byte offset below which no further tag may start.
    pub(crate) cursor: usize,
    /// Open elements per tag id.
    pub(crate) open_counts: Vec<u32>,
    /// Accepted start tags per tag id.
    pub(crate) total_counts: Vec<u32>,
}

impl<'t> ParseContext<'t> {
    pub(crate) fn new(text: &'t str, tag_count: usize) -> Self {
        Self {
            text,
            log: Logger::new(),
            cursor: 0,
            open_counts: vec![0; tag_count],
            total_counts: vec![0; tag_count],
        }
    }

    pub(crate) fn log(&mut self, id: &'static str, pos: usize, params: Vec<String>) {
        self.log.log(id, pos, params);
    }

    /// Source text of `pos..pos + len`, clamped to the input.
    pub(crate) fn slice(&self, pos: usize, len: usize) -> &'t str {
        self.text.get(pos..pos + len).unwrap_or_default()
    }
}
