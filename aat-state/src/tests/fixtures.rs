//! Tables shared by tests in several modules.

use font_types::GlyphId16;

use crate::{
    entry::{ContextualAction, Entry, GlyphMap, KerningAction, RearrangementAction, Verb},
    names::{ClassId, StateId},
    state_table::{NormalizeOptions, StateTable, SubtableKind},
};

/// Swaps the first and last glyph of a span that starts with a 'First'
/// and ends with a 'Last', if a 'Trigger' came before.
pub(crate) fn rearrangement_table() -> StateTable {
    let mut table = StateTable::new(SubtableKind::Rearrangement);
    let first = table.class("First");
    let last = table.class("Last");
    let trigger = table.class("Trigger");
    table.map_glyph(GlyphId16::new(12), first);
    table.map_glyph(GlyphId16::new(19), last);
    table.map_glyph(GlyphId16::new(50), trigger);
    let saw_trigger = table.state("Saw trigger");
    let saw_first = table.state("Saw first");

    let start = StateId::START_OF_TEXT;
    table.set_entry(start, trigger, Entry::new(saw_trigger, RearrangementAction::default()));
    table.set_entry(
        saw_trigger,
        first,
        Entry::new(saw_first, RearrangementAction::default().with_mark_first()),
    );
    table.set_entry(
        saw_first,
        ClassId::OUT_OF_BOUNDS,
        Entry::new(saw_first, RearrangementAction::default()),
    );
    table.set_entry(
        saw_first,
        last,
        Entry::new(
            start,
            RearrangementAction::new(Verb::AXD_TO_DXA).with_mark_last(),
        ),
    );
    table.normalize(NormalizeOptions {
        add_transitions: false,
    });
    table
}

/// Changes 22..=25 into 95..=98, but only after a 50.
pub(crate) fn swash_table() -> StateTable {
    let mut table = StateTable::new(SubtableKind::Contextual);
    let swash = table.class("Swash");
    let trigger = table.class("Trigger");
    for glyph in 22..=25 {
        table.map_glyph(GlyphId16::new(glyph), swash);
    }
    table.map_glyph(GlyphId16::new(50), trigger);
    let saw_trigger = table.state("Saw trigger");
    let stay = Entry::new(saw_trigger, ContextualAction::new());
    for state in [StateId::START_OF_TEXT, StateId::START_OF_LINE] {
        table.set_entry(state, trigger, stay.clone());
    }
    for class in [
        ClassId::END_OF_TEXT,
        ClassId::OUT_OF_BOUNDS,
        ClassId::DELETED_GLYPH,
        ClassId::END_OF_LINE,
        trigger,
    ] {
        table.set_entry(saw_trigger, class, stay.clone());
    }
    let map: GlyphMap = (22..=25)
        .map(|g| (GlyphId16::new(g), GlyphId16::new(g + 73)))
        .collect();
    table.set_entry(
        saw_trigger,
        swash,
        Entry::new(saw_trigger, ContextualAction::new().with_current_substitution(map)),
    );
    table.normalize(NormalizeOptions::default());
    table
}

/// Pushes letters and pulls them together before a period.
pub(crate) fn kerning_table() -> StateTable {
    let mut table = StateTable::new(SubtableKind::Kerning);
    let letter = table.class("Letter");
    let period = table.class("Period");
    table.map_glyph(GlyphId16::new(7), letter);
    table.map_glyph(GlyphId16::new(8), period);
    let saw_letter = table.state("Saw letter");
    let push = Entry::new(saw_letter, KerningAction::new().with_push());
    table.set_entry(StateId::START_OF_TEXT, letter, push.clone());
    table.set_entry(saw_letter, letter, push);
    table.set_entry(
        saw_letter,
        period,
        Entry::new(
            StateId::START_OF_TEXT,
            KerningAction::new().with_values([-40, -20]).with_reset(),
        ),
    );
    table.normalize(NormalizeOptions::default());
    table
}
