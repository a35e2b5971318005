//! Candidate normalization and sequencing.

use tagweave_diagnostics::{Logger, codes};
use tagweave_grammar::Grammar;

use crate::context::params;
use crate::tag::{Candidate, Tag};

/// Bind candidates to grammar entries. Candidates whose name resolves to
/// nothing are logged and dropped; later duplicates of an attribute win.
pub(crate) fn normalize(
    candidates: Vec<Candidate>,
    grammar: &Grammar,
    text: &str,
    log: &mut Logger,
) -> Vec<Tag> {
    let mut tags = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let Some(id) = grammar.resolve(&candidate.name) else {
            let source = text
                .get(candidate.pos..candidate.pos + candidate.len)
                .unwrap_or(&candidate.name);
            let pass = grammar
                .passes()
                .get(candidate.pass)
                .map_or("", |p| p.name.as_str());
            log.log(codes::UNKNOWN_TAG, candidate.pos, params![source, pass]);
            continue;
        };
        tags.push(Tag {
            id,
            name: grammar.tag(id).name.clone(),
            pos: candidate.pos,
            len: candidate.len,
            kind: candidate.kind,
            suffix: candidate.suffix,
            params: candidate.params.into_iter().collect(),
            trim_before: 0,
            trim_after: 0,
            pass: candidate.pass,
        });
    }
    tags
}

/// Order tags for resolution and return them as a stack: the next tag to
/// process is the last element.
///
/// Ascending position; at equal positions start before end before
/// self-closing, then later passes before earlier ones.
pub(crate) fn sequence(mut tags: Vec<Tag>) -> Vec<Tag> {
    tags.sort_by(|a, b| {
        a.pos
            .cmp(&b.pos)
            .then(a.kind.bits().cmp(&b.kind.bits()))
            .then(b.pass.cmp(&a.pass))
    });
    tags.reverse();
    tags
}
