//! Running a state table over a glyph sequence.

use font_types::GlyphId16;

use crate::{
    entry::{ActionPayload, ContextualAction, KerningAction, RearrangementAction},
    names::{ClassId, StateId},
    state_table::StateTable,
};

/// The number of consecutive steps without advancing after which the
/// interpreter advances anyway.
pub const MAX_CYCLES: usize = 0x4000;

/// The depth of the kerning stack.
const KERNING_STACK_LEN: usize = 8;

/// The traversal state of one run.
struct Machine<'a> {
    table: &'a StateTable,
    reverse: bool,
    glyphs: Vec<(usize, GlyphId16)>,
    adjustments: Vec<i32>,
    state: StateId,
    // the low and high ends of the marked span
    first: usize,
    last: usize,
    mark: Option<usize>,
    stack: [usize; KERNING_STACK_LEN],
    depth: usize,
}

impl StateTable {
    /// Run the table over `glyphs` starting from "Start of text".
    ///
    /// Returns each output glyph along with its position in the input.
    pub fn run(&self, glyphs: &[GlyphId16]) -> Vec<(usize, GlyphId16)> {
        self.run_from(glyphs, StateId::START_OF_TEXT)
    }

    /// Run the table over `glyphs` starting from `start`.
    pub fn run_from(&self, glyphs: &[GlyphId16], start: StateId) -> Vec<(usize, GlyphId16)> {
        Machine::new(self, glyphs, start).run().glyphs
    }

    /// Run the table, also returning the sum of the kerning values applied
    /// to each position.
    ///
    /// Adjustments are all zero for kinds other than kerning.
    pub fn run_with_adjustments(
        &self,
        glyphs: &[GlyphId16],
        start: StateId,
    ) -> (Vec<(usize, GlyphId16)>, Vec<i32>) {
        let machine = Machine::new(self, glyphs, start).run();
        (machine.glyphs, machine.adjustments)
    }
}

impl<'a> Machine<'a> {
    fn new(table: &'a StateTable, glyphs: &[GlyphId16], start: StateId) -> Self {
        Machine {
            table,
            reverse: table.is_reverse(),
            glyphs: glyphs.iter().copied().enumerate().collect(),
            adjustments: vec![0; glyphs.len()],
            state: start,
            first: 0,
            last: 0,
            mark: None,
            stack: [0; KERNING_STACK_LEN],
            depth: 0,
        }
    }

    fn run(mut self) -> Self {
        let len = self.glyphs.len();
        if len == 0 {
            return self;
        }
        let mut step = 0;
        let mut cycles = 0;
        // the last pass is for "End of text"
        while step <= len {
            let end_of_text = step == len;
            let index = match (self.reverse, end_of_text) {
                (false, false) => step,
                (true, false) => len - 1 - step,
                (false, true) => len - 1,
                (true, true) => 0,
            };
            let class = if end_of_text {
                ClassId::END_OF_TEXT
            } else {
                self.table.class_table().classify(self.glyphs[index].1)
            };
            let advances = self.step(index, class);
            if end_of_text {
                break;
            }
            if advances {
                cycles = 0;
                step += 1;
            } else if cycles >= MAX_CYCLES {
                log::warn!(
                    "{} state table made no progress at glyph {index} after {MAX_CYCLES} steps",
                    self.table.kind()
                );
                cycles = 0;
                step += 1;
            } else {
                cycles += 1;
            }
        }
        self
    }

    /// Process one glyph, returning whether to move to the next one.
    fn step(&mut self, index: usize, class: ClassId) -> bool {
        let table = self.table;
        let Some(entry) = table.entry(self.state, class) else {
            self.state = StateId::START_OF_TEXT;
            return true;
        };
        match &entry.payload {
            ActionPayload::Rearrangement(action) => self.rearrange(index, action),
            ActionPayload::Contextual(action) => {
                self.substitute(index, class != ClassId::END_OF_TEXT, action)
            }
            ActionPayload::Kerning(action) => self.kern(index, action),
        }
        self.state = entry.new_state;
        entry.advances()
    }

    fn rearrange(&mut self, index: usize, action: &RearrangementAction) {
        // in reverse, the first glyph marked is the high end of the span
        let (mark_low, mark_high) = if self.reverse {
            (action.mark_last, action.mark_first)
        } else {
            (action.mark_first, action.mark_last)
        };
        if mark_low {
            self.first = index;
        }
        if mark_high {
            self.last = index;
        }
        if action.verb.code() == 0 || self.first > self.last {
            return;
        }
        let shape = if self.reverse {
            action.verb.shape().mirrored()
        } else {
            action.verb.shape()
        };
        if let Some(span) = self.glyphs.get_mut(self.first..=self.last) {
            shape.apply(span);
        }
    }

    fn substitute(&mut self, index: usize, has_current: bool, action: &ContextualAction) {
        if action.set_mark() {
            self.mark = Some(index);
        }
        if let Some(map) = action.current_substitution().filter(|_| has_current) {
            let glyph = &mut self.glyphs[index].1;
            if let Some(new) = map.get(&*glyph) {
                *glyph = *new;
            }
        }
        if let (Some(map), Some(mark)) = (action.mark_substitution(), self.mark) {
            let glyph = &mut self.glyphs[mark].1;
            if let Some(new) = map.get(&*glyph) {
                *glyph = *new;
            }
        }
    }

    fn kern(&mut self, index: usize, action: &KerningAction) {
        if action.push {
            if self.depth == KERNING_STACK_LEN {
                self.depth = 0;
            }
            self.stack[self.depth] = index;
            self.depth += 1;
        }
        for value in action.values() {
            if self.depth == 0 {
                break;
            }
            self.depth -= 1;
            self.adjustments[self.stack[self.depth]] += *value as i32;
        }
        if action.reset {
            self.depth = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        entry::{Entry, GlyphMap, Verb},
        state_table::{Coverage, NormalizeOptions, SubtableKind},
        tests::fixtures::{kerning_table, rearrangement_table, swash_table},
    };

    fn glyphs(ids: &[u16]) -> Vec<GlyphId16> {
        ids.iter().copied().map(GlyphId16::new).collect()
    }

    fn pairs(ids: &[(usize, u16)]) -> Vec<(usize, GlyphId16)> {
        ids.iter().map(|(i, g)| (*i, GlyphId16::new(*g))).collect()
    }

    #[test]
    fn rearrangement_without_trigger() {
        let table = rearrangement_table();
        let out = table.run(&glyphs(&[30, 12, 1, 2, 3, 19]));
        assert_eq!(
            out,
            pairs(&[(0, 30), (1, 12), (2, 1), (3, 2), (4, 3), (5, 19)])
        );
    }

    #[test]
    fn rearrangement_with_trigger() {
        let table = rearrangement_table();
        let out = table.run(&glyphs(&[50, 12, 1, 2, 3, 19]));
        assert_eq!(
            out,
            pairs(&[(0, 50), (5, 19), (2, 1), (3, 2), (4, 3), (1, 12)])
        );
    }

    #[test]
    fn rearrangement_in_reverse() {
        // marks the high end first, so 'Last' is marked first
        let mut table = StateTable::new(SubtableKind::Rearrangement);
        table.coverage = Coverage::reverse(SubtableKind::Rearrangement);
        let first = table.class("First");
        let last = table.class("Last");
        table.map_glyph(GlyphId16::new(12), first);
        table.map_glyph(GlyphId16::new(19), last);
        let saw_last = table.state("Saw last");
        let start = StateId::START_OF_TEXT;
        table.set_entry(
            start,
            last,
            Entry::new(saw_last, RearrangementAction::default().with_mark_first()),
        );
        table.set_entry(
            saw_last,
            ClassId::OUT_OF_BOUNDS,
            Entry::new(saw_last, RearrangementAction::default()),
        );
        table.set_entry(
            saw_last,
            first,
            Entry::new(start, RearrangementAction::new(Verb::AX_TO_XA).with_mark_last()),
        );
        table.normalize(NormalizeOptions::default());
        assert!(table.is_reverse());

        // "Ax => xA" in processing order moves the high glyph to the low end
        let out = table.run(&glyphs(&[12, 1, 2, 19]));
        assert_eq!(out, pairs(&[(3, 19), (0, 12), (1, 1), (2, 2)]));
    }

    /// Marks a span between two 'Edge' glyphs and applies `verb` to it.
    fn edge_span_table(reverse: bool, verb: Verb) -> StateTable {
        let mut table = StateTable::new(SubtableKind::Rearrangement);
        if reverse {
            table.coverage = Coverage::reverse(SubtableKind::Rearrangement);
        }
        let edge = table.class("Edge");
        table.map_glyph(GlyphId16::new(12), edge);
        table.map_glyph(GlyphId16::new(13), edge);
        let in_span = table.state("In span");
        table.set_entry(
            StateId::START_OF_TEXT,
            edge,
            Entry::new(in_span, RearrangementAction::default().with_mark_first()),
        );
        table.set_entry(
            in_span,
            ClassId::OUT_OF_BOUNDS,
            Entry::new(in_span, RearrangementAction::default()),
        );
        table.set_entry(
            in_span,
            edge,
            Entry::new(
                StateId::START_OF_TEXT,
                RearrangementAction::new(verb).with_mark_last(),
            ),
        );
        table.normalize(NormalizeOptions::default());
        table
    }

    #[test]
    fn reverse_verb_is_the_mirrored_verb() {
        // "AxCD => DCxA" read from the end is "ABxD => DxBA"
        let input = glyphs(&[12, 1, 2, 3, 12]);
        let reverse = edge_span_table(true, Verb::new(9).unwrap()).run(&input);
        let forward = edge_span_table(false, Verb::new(11).unwrap()).run(&input);
        assert_eq!(reverse, pairs(&[(4, 12), (2, 2), (3, 3), (1, 1), (0, 12)]));
        assert_eq!(reverse, forward);
    }

    #[test]
    fn reverse_axd_is_an_involution() {
        let table = edge_span_table(true, Verb::AXD_TO_DXA);
        let input = glyphs(&[12, 1, 2, 13]);
        let once = table.run(&input);
        assert_eq!(once, pairs(&[(3, 13), (1, 1), (2, 2), (0, 12)]));
        let once = once.into_iter().map(|(_, glyph)| glyph).collect::<Vec<_>>();
        let twice = table.run(&once);
        let twice = twice.into_iter().map(|(_, glyph)| glyph).collect::<Vec<_>>();
        assert_eq!(twice, input);
    }

    #[test]
    fn reverse_no_advance_remarks_same_position() {
        // after the first swap the glyph at the low end is a 'Tail', which
        // only the "Again" state acts on
        let mut table = StateTable::new(SubtableKind::Rearrangement);
        table.coverage = Coverage::reverse(SubtableKind::Rearrangement);
        let edge = table.class("Edge");
        let tail = table.class("Tail");
        table.map_glyph(GlyphId16::new(12), edge);
        table.map_glyph(GlyphId16::new(13), tail);
        let in_span = table.state("In span");
        let again = table.state("Again");
        let start = StateId::START_OF_TEXT;
        table.set_entry(
            start,
            tail,
            Entry::new(in_span, RearrangementAction::default().with_mark_first()),
        );
        table.set_entry(
            in_span,
            ClassId::OUT_OF_BOUNDS,
            Entry::new(in_span, RearrangementAction::default()),
        );
        table.set_entry(
            in_span,
            edge,
            Entry::new(again, RearrangementAction::new(Verb::AX_TO_XA).with_mark_last())
                .dont_advance(),
        );
        table.set_entry(
            again,
            tail,
            Entry::new(start, RearrangementAction::new(Verb::AX_TO_XA).with_mark_last()),
        );
        table.normalize(NormalizeOptions::default());

        let out = table.run(&glyphs(&[12, 1, 2, 13]));
        assert_eq!(out, pairs(&[(2, 2), (3, 13), (0, 12), (1, 1)]));
    }

    #[test]
    fn identity_table_changes_nothing() {
        let mut table = StateTable::new(SubtableKind::Rearrangement);
        let letters = table.class("Letters");
        table.map_glyph(GlyphId16::new(4), letters);
        for state in [StateId::START_OF_TEXT, StateId::START_OF_LINE] {
            for class in table.names().classes().collect::<Vec<_>>() {
                table.set_entry(state, class, Entry::new(state, RearrangementAction::default()));
            }
        }
        let input = glyphs(&[4, 0xFFFF, 9, 4]);
        let out = table.run_from(&input, StateId::START_OF_LINE);
        assert_eq!(out, pairs(&[(0, 4), (1, 0xFFFF), (2, 9), (3, 4)]));
    }

    #[test]
    fn contextual_swash() {
        let table = swash_table();
        assert_eq!(table.run(&glyphs(&[22, 24])), pairs(&[(0, 22), (1, 24)]));
        assert_eq!(
            table.run(&glyphs(&[50, 22, 24])),
            pairs(&[(0, 50), (1, 95), (2, 97)])
        );
        assert_eq!(
            table.run(&glyphs(&[50, 90, 92, 95, 14, 22, 24])),
            pairs(&[(0, 50), (1, 90), (2, 92), (3, 95), (4, 14), (5, 95), (6, 97)])
        );
    }

    #[test]
    fn contextual_mark_substitution() {
        // marks an 'a' and changes it to 'b' when a 'c' follows
        let mut table = StateTable::new(SubtableKind::Contextual);
        let a = table.class("a");
        let c = table.class("c");
        table.map_glyph(GlyphId16::new(1), a);
        table.map_glyph(GlyphId16::new(3), c);
        let saw_a = table.state("Saw a");
        table.set_entry(
            StateId::START_OF_TEXT,
            a,
            Entry::new(saw_a, ContextualAction::new().with_mark()),
        );
        let map: GlyphMap = [(GlyphId16::new(1), GlyphId16::new(2))].into_iter().collect();
        table.set_entry(
            saw_a,
            c,
            Entry::new(
                StateId::START_OF_TEXT,
                ContextualAction::new().with_mark_substitution(map),
            ),
        );
        table.normalize(NormalizeOptions::default());
        assert_eq!(
            table.run(&glyphs(&[1, 3, 1, 5, 3])),
            pairs(&[(0, 2), (1, 3), (2, 1), (3, 5), (4, 3)])
        );
    }

    #[test]
    fn kerning_pops_most_recent_first() {
        let table = kerning_table();
        let (out, adjustments) =
            table.run_with_adjustments(&glyphs(&[7, 7, 7, 8, 7]), StateId::START_OF_TEXT);
        assert_eq!(out.len(), 5);
        assert_eq!(adjustments, [0, -20, -40, 0, 0]);
    }

    #[test]
    fn kerning_stack_overflow_resets() {
        let mut table = StateTable::new(SubtableKind::Kerning);
        let letter = table.class("Letter");
        let period = table.class("Period");
        table.map_glyph(GlyphId16::new(7), letter);
        table.map_glyph(GlyphId16::new(8), period);
        let push = Entry::new(StateId::START_OF_TEXT, KerningAction::new().with_push());
        table.set_entry(StateId::START_OF_TEXT, letter, push);
        table.set_entry(
            StateId::START_OF_TEXT,
            period,
            Entry::new(
                StateId::START_OF_TEXT,
                KerningAction::new().with_values([10, 10]),
            ),
        );
        table.normalize(NormalizeOptions::default());
        // the ninth push starts a new stack
        let mut input = vec![7; 9];
        input.push(8);
        let (_, adjustments) =
            table.run_with_adjustments(&glyphs(&input), StateId::START_OF_TEXT);
        assert_eq!(adjustments, [0, 0, 0, 0, 0, 0, 0, 0, 10, 0]);
    }

    #[test]
    fn end_of_text_flushes_marks() {
        // the swap happens on "End of text", with the last glyph as the
        // high end of the span
        let mut table = StateTable::new(SubtableKind::Rearrangement);
        let first = table.class("First");
        table.map_glyph(GlyphId16::new(12), first);
        let saw_first = table.state("Saw first");
        table.set_entry(
            StateId::START_OF_TEXT,
            first,
            Entry::new(saw_first, RearrangementAction::default().with_mark_first()),
        );
        table.set_entry(
            saw_first,
            ClassId::END_OF_TEXT,
            Entry::new(
                StateId::START_OF_TEXT,
                RearrangementAction::new(Verb::AXD_TO_DXA).with_mark_last(),
            ),
        );
        table.set_entry(
            saw_first,
            ClassId::OUT_OF_BOUNDS,
            Entry::new(saw_first, RearrangementAction::default()),
        );
        table.normalize(NormalizeOptions::default());
        assert_eq!(
            table.run(&glyphs(&[3, 12, 4, 5])),
            pairs(&[(0, 3), (3, 5), (2, 4), (1, 12)])
        );
    }

    #[test]
    fn stuck_tables_terminate() {
        let mut table = StateTable::new(SubtableKind::Rearrangement);
        let start = StateId::START_OF_TEXT;
        table.set_entry(
            start,
            ClassId::OUT_OF_BOUNDS,
            Entry::new(start, RearrangementAction::default()).dont_advance(),
        );
        table.normalize(NormalizeOptions::default());
        let out = table.run(&glyphs(&[1, 2]));
        assert_eq!(out, pairs(&[(0, 1), (1, 2)]));
    }

    #[test]
    fn empty_input() {
        assert!(rearrangement_table().run(&[]).is_empty());
    }
}
