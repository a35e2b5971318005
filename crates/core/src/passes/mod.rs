//! Tokenizer passes.
//!
//! Each pass scans the whole text independently and proposes
//! [`Candidate`]s. Bracket and regexp passes are built in and configured
//! by the grammar; anything else is a [`TagPass`] registered on the
//! parser under the name of a `plugin` pass.

mod bracket;
mod regexp;

use std::collections::HashMap;

use tagweave_diagnostics::{Logger, codes};
use tagweave_grammar::{Grammar, LimitAction, PassDef, PassKind};

use crate::context::params;
use crate::tag::Candidate;

/// A tokenizer pass supplied by the host application.
pub trait TagPass: Send + Sync {
    /// Scan `text` and push candidates into `sink`. Stop scanning once
    /// [`PassSink::push`] returns `false`.
    fn scan(&self, text: &str, grammar: &Grammar, sink: &mut PassSink<'_>);
}

impl<F> TagPass for F
where
    F: Fn(&str, &Grammar, &mut PassSink<'_>) + Send + Sync,
{
    fn scan(&self, text: &str, grammar: &Grammar, sink: &mut PassSink<'_>) {
        self(text, grammar, sink);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    Open,
    Full,
    Aborted,
}

/// Collects the candidates of one pass and enforces its limit.
pub struct PassSink<'a> {
    index: usize,
    text: &'a str,
    def: &'a PassDef,
    candidates: Vec<Candidate>,
    log: &'a mut Logger,
    state: SinkState,
}

impl<'a> PassSink<'a> {
    pub(crate) fn new(
        index: usize,
        text: &'a str,
        def: &'a PassDef,
        log: &'a mut Logger,
    ) -> Self {
        Self {
            index,
            text,
            def,
            candidates: Vec::new(),
            log,
            state: SinkState::Open,
        }
    }

    /// Name of the pass being run.
    pub fn pass_name(&self) -> &str {
        &self.def.name
    }

    /// Offer a candidate. Returns `false` when the pass has reached its
    /// limit and must stop; the candidate is then dropped.
    ///
    /// A candidate whose span does not fit the text on character
    /// boundaries is dropped with a warning and does not count towards
    /// the limit.
    pub fn push(&mut self, mut candidate: Candidate) -> bool {
        if self.state != SinkState::Open {
            return false;
        }
        if !self.fits(&candidate) {
            self.log.log(
                codes::INVALID_SPAN,
                candidate.pos.min(self.text.len()),
                params![self.def.name, candidate.pos, candidate.len],
            );
            return true;
        }
        if self.candidates.len() >= self.def.limit {
            let limit = self.def.limit;
            match self.def.limit_action {
                LimitAction::Ignore => {}
                LimitAction::Warn => self.log.log(
                    codes::PASS_LIMIT_EXCEEDED,
                    candidate.pos,
                    params![self.def.name, limit],
                ),
                LimitAction::Abort => {
                    self.log.log(
                        codes::PASS_ABORTED,
                        candidate.pos,
                        params![self.def.name, limit],
                    );
                    self.candidates.clear();
                    self.state = SinkState::Aborted;
                    return false;
                }
            }
            self.state = SinkState::Full;
            return false;
        }
        candidate.pass = self.index;
        self.candidates.push(candidate);
        true
    }

    fn fits(&self, candidate: &Candidate) -> bool {
        candidate
            .pos
            .checked_add(candidate.len)
            .is_some_and(|end| {
                end <= self.text.len()
                    && self.text.is_char_boundary(candidate.pos)
                    && self.text.is_char_boundary(end)
            })
    }

    /// Record a log entry on behalf of the pass.
    pub fn log(&mut self, id: &'static str, pos: usize, params: Vec<String>) {
        self.log.log(id, pos, params);
    }

    /// No further candidates will be accepted.
    pub fn is_closed(&self) -> bool {
        self.state != SinkState::Open
    }

    /// Number of candidates accepted so far.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// No candidate accepted yet.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    fn finish(self) -> Vec<Candidate> {
        self.candidates
    }
}

/// Run every pass of `grammar` over `text`, in declaration order.
pub(crate) fn run_passes(
    text: &str,
    grammar: &Grammar,
    plugins: &HashMap<String, Box<dyn TagPass>>,
    log: &mut Logger,
) -> Vec<Candidate> {
    let mut all = Vec::new();
    for (index, def) in grammar.passes().iter().enumerate() {
        let mut sink = PassSink::new(index, text, def, log);
        match &def.kind {
            PassKind::Bracket(pass) => bracket::scan(text, grammar, pass, &mut sink),
            PassKind::Regexp(pass) => regexp::scan(text, pass, &mut sink),
            PassKind::Plugin => {
                if let Some(plugin) = plugins.get(&def.name) {
                    plugin.scan(text, grammar, &mut sink);
                }
            }
        }
        all.extend(sink.finish());
    }
    all
}
