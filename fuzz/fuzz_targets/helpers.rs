//! Common helpers

use aat_state::{Coverage, DecodeContext, SubtableKind};
use font_types::GlyphId16;

/// Splits the input into a table kind, a decode context and the table bytes.
///
/// The first byte picks the kind and direction, the second caps the glyph
/// count.
pub(crate) fn split_input(data: &[u8]) -> Option<(SubtableKind, DecodeContext, &[u8])> {
    let [selector, count, rest @ ..] = data else {
        return None;
    };
    let kind = match selector & 0x3 {
        0 => SubtableKind::Rearrangement,
        1 => SubtableKind::Contextual,
        _ => SubtableKind::Kerning,
    };
    let coverage = if selector & 0x80 != 0 {
        Coverage::reverse(kind)
    } else {
        Coverage::default()
    };
    let mut context = DecodeContext::new(coverage);
    if selector & 0x40 != 0 {
        context = context.with_glyph_count(*count as u16);
    }
    Some((kind, context, rest))
}

/// A short run of glyphs taken from the tail of the input.
pub(crate) fn glyph_run(data: &[u8]) -> Vec<GlyphId16> {
    data.iter()
        .rev()
        .take(32)
        .map(|b| GlyphId16::new(*b as u16))
        .collect()
}
