#![no_main]

mod helpers;

use aat_state::{Diagnostics, StateId, StateTable};
use libfuzzer_sys::fuzz_target;
use read_fonts::FontData;

fuzz_target!(|data: &[u8]| {
    let Some((kind, context, bytes)) = helpers::split_input(data) else {
        return;
    };
    let data = FontData::new(bytes);
    let mut sink = Diagnostics::new();
    if let Some(table) = StateTable::read_validated(data, kind, &context, &mut sink) {
        let glyphs = helpers::glyph_run(bytes);
        let _ = table.run_with_adjustments(&glyphs, StateId::START_OF_LINE);
    }
    if let Ok(table) = StateTable::read(data, kind, &context) {
        let _ = table.run(&helpers::glyph_run(bytes));
        let _ = table.to_string();
    }
});
