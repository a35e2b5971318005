//! Tag stack resolver.
//!
//! Consumes the sequenced queue one tag at a time and decides, against the
//! grammar and the currently open elements, whether each tag is accepted.
//! Accepted tags come out in ascending position, never overlap, and pair
//! up into a balanced tree: every end tag matches the innermost open start
//! tag, synthesizing zero-length end tags where the input leaves elements
//! open.

mod attributes;
mod stack;

use tagweave_diagnostics::codes;
use tagweave_grammar::{Grammar, TagDef};

use crate::context::{ParseContext, params};
use crate::tag::{Tag, TagType};

use self::attributes::filter_attributes;
use self::stack::{AllowedSets, Frame};

/// Resolve `queue` (as produced by the sequencer) into the final tag list.
pub(crate) fn resolve(grammar: &Grammar, ctx: &mut ParseContext<'_>, queue: Vec<Tag>) -> Vec<Tag> {
    let mut resolver = Resolver {
        grammar,
        ctx,
        queue,
        output: Vec::new(),
        stack: Vec::new(),
        sets: AllowedSets::new(grammar.root_allowed()),
    };
    resolver.run();
    resolver.output
}

struct Resolver<'g, 'c, 't> {
    grammar: &'g Grammar,
    ctx: &'c mut ParseContext<'t>,
    queue: Vec<Tag>,
    output: Vec<Tag>,
    stack: Vec<Frame>,
    sets: AllowedSets,
}

impl Resolver<'_, '_, '_> {
    fn run(&mut self) {
        while let Some(tag) = self.queue.pop() {
            if tag.pos < self.ctx.cursor {
                self.ctx
                    .log(codes::OVERLAPPING_TAG, tag.pos, params![tag.name]);
                continue;
            }
            if let Some(frame) = self.stack.last()
                && frame.ignore_tags
                && !(tag.kind == TagType::END && tag.pairs_with(frame.id, frame.suffix.as_deref()))
            {
                let container = &self.grammar.tag(frame.id).name;
                self.ctx.log(
                    codes::IGNORED_TAG,
                    tag.pos,
                    params![tag.name, container],
                );
                continue;
            }
            if tag.kind.is_start() {
                self.process_start(tag);
            } else {
                self.process_end(tag);
            }
        }
        self.close_remaining();
    }

    fn process_start(&mut self, mut tag: Tag) {
        let grammar = self.grammar;
        let def = grammar.tag(tag.id);

        if let Some(target) = self.auto_close_target(def) {
            let frame = &self.stack[target];
            let end = Tag::synthetic_end(grammar.tag(frame.id), tag.pos, frame.suffix.clone());
            self.queue.push(tag);
            self.queue.push(end);
            return;
        }

        let index = tag.id.index();
        if self.ctx.open_counts[index] >= def.nesting_limit
            || self.ctx.total_counts[index] >= def.tag_limit
        {
            return;
        }

        let denied_here = self
            .stack
            .last()
            .is_some_and(|frame| grammar.tag(frame.id).denied_children.contains(tag.id));
        if denied_here || !self.sets.current().contains(tag.id) {
            self.ctx
                .log(codes::TAG_NOT_ALLOWED, tag.pos, params![tag.name]);
            return;
        }

        if let Some(parent) = def.require_parent
            && self.stack.last().map(|frame| frame.id) != Some(parent)
        {
            self.ctx.log(
                codes::REQUIRED_PARENT,
                tag.pos,
                params![tag.name, grammar.tag(parent).name],
            );
            return;
        }

        if let Some(&missing) = def
            .require_ascendant
            .iter()
            .find(|id| self.ctx.open_counts[id.index()] == 0)
        {
            self.ctx.log(
                codes::REQUIRED_ASCENDANT,
                tag.pos,
                params![tag.name, grammar.tag(missing).name],
            );
            return;
        }

        let raw = std::mem::take(&mut tag.params);
        let Some(params) = filter_attributes(def, raw, tag.pos, &mut self.ctx.log) else {
            return;
        };
        tag.params = params;

        let id = tag.id;
        let kind = tag.kind;
        let suffix = tag.suffix.clone();
        self.accept(tag);
        self.ctx.total_counts[index] += 1;

        if kind == TagType::START {
            self.stack.push(Frame {
                id,
                suffix,
                saved_sets: self.sets.len(),
                ignore_tags: def.ignore_tags,
            });
            self.sets.narrow(def);
            self.ctx.open_counts[index] += 1;
        }
    }

    /// Stack index of the frame a `closeParent` or `closeAncestor` rule
    /// of `def` would close before `def` opens.
    fn auto_close_target(&self, def: &TagDef) -> Option<usize> {
        let top = self.stack.len().checked_sub(1)?;
        if def.close_parent.contains(&self.stack[top].id) {
            return Some(top);
        }
        if def.close_ancestor.is_empty() {
            return None;
        }
        self.stack
            .iter()
            .rposition(|frame| def.close_ancestor.contains(&frame.id))
    }

    fn process_end(&mut self, tag: Tag) {
        let Some(target) = self
            .stack
            .iter()
            .rposition(|frame| tag.pairs_with(frame.id, frame.suffix.as_deref()))
        else {
            self.ctx
                .log(codes::DANGLING_END_TAG, tag.pos, params![tag.name]);
            return;
        };
        while self.stack.len() > target + 1 {
            if let Some(frame) = self.stack.pop() {
                self.close_frame(frame, tag.pos);
            }
        }
        if let Some(frame) = self.stack.pop() {
            self.accept(tag);
            self.finish_frame(&frame);
        }
    }

    fn close_remaining(&mut self) {
        let end = self.ctx.text.len();
        while let Some(frame) = self.stack.pop() {
            let name = &self.grammar.tag(frame.id).name;
            self.ctx.log(codes::UNCLOSED_TAG, end, params![name]);
            self.close_frame(frame, end);
        }
    }

    /// Emit a zero-length end tag for `frame` at `pos`.
    fn close_frame(&mut self, frame: Frame, pos: usize) {
        let end = Tag::synthetic_end(self.grammar.tag(frame.id), pos, frame.suffix.clone());
        self.accept(end);
        self.finish_frame(&frame);
    }

    fn finish_frame(&mut self, frame: &Frame) {
        let count = &mut self.ctx.open_counts[frame.id.index()];
        *count = count.saturating_sub(1);
        self.sets.restore(frame.saved_sets);
    }

    /// Absorb whitespace per the tag's trim rules, append it and advance
    /// the cursor.
    fn accept(&mut self, mut tag: Tag) {
        let trim = &self.grammar.tag(tag.id).trim;
        let (before, after) = if tag.kind.is_self_closing() {
            (trim.before, trim.after)
        } else if tag.kind.is_start() {
            (trim.before, trim.ltrim_content)
        } else {
            (trim.rtrim_content, trim.after)
        };
        let bytes = self.ctx.text.as_bytes();
        if before {
            let mut pos = tag.pos;
            while pos > self.ctx.cursor && is_trim_space(bytes[pos - 1]) {
                pos -= 1;
            }
            tag.trim_before = tag.pos - pos;
            tag.len += tag.trim_before;
            tag.pos = pos;
        }
        if after {
            let end = tag.end();
            let mut pos = end;
            while pos < bytes.len() && is_trim_space(bytes[pos]) {
                pos += 1;
            }
            tag.trim_after = pos - end;
            tag.len += tag.trim_after;
        }
        self.ctx.cursor = tag.end();
        self.output.push(tag);
    }
}

fn is_trim_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}
