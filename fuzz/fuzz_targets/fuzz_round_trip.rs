#![no_main]

mod helpers;

use aat_state::{BuildOptions, StateId, StateTable, SubtableKind};
use libfuzzer_sys::fuzz_target;
use read_fonts::FontData;

// anything we can read, we can write, and read back to a table that
// behaves the same
fuzz_target!(|data: &[u8]| {
    let Some((kind, context, bytes)) = helpers::split_input(data) else {
        return;
    };
    let Ok(table) = StateTable::read(FontData::new(bytes), kind, &context) else {
        return;
    };
    let options = BuildOptions {
        stash_names: bytes.len() % 2 == 0,
        ..Default::default()
    };
    let Ok(rebuilt) = table.build_binary(&options) else {
        return;
    };
    let reread = match StateTable::read(FontData::new(&rebuilt), kind, &context) {
        Ok(reread) => reread,
        Err(e) => panic!("failed to read back a table we wrote: {e}"),
    };
    let glyphs = helpers::glyph_run(bytes);
    if kind == SubtableKind::Kerning {
        assert_eq!(
            table.run_with_adjustments(&glyphs, StateId::START_OF_TEXT),
            reread.run_with_adjustments(&glyphs, StateId::START_OF_TEXT)
        );
    } else {
        assert_eq!(table.run(&glyphs), reread.run(&glyphs));
    }
});
