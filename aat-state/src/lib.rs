//! Reading, validating, running and writing AAT extended state tables
//!
//! The glyph transformation subtables of the `morx` table and the
//! contextual kerning subtables of `kerx` are driven by finite state
//! machines stored in a shared binary form, the "extended state table".
//! This crate provides a symbolic, editable model of such a table, along
//! with:
//!
//! - a decoder that tolerates malformed input and reports problems as
//!   [`Diagnostic`]s, with a strict variant for validation,
//! - an interpreter that runs a table over a glyph sequence,
//! - an encoder that picks the smallest class table format and shares
//!   identical entries and payloads.
//!
//! States and classes are identified by name. Names survive a round trip
//! through the binary form when they are written to the table's name stash;
//! otherwise names such as "State 3" are synthesized on decode.
//!
//! The outer `morx` and `kerx` structures (chains, feature flags and
//! subtable headers) are out of scope: callers hand this crate the bytes of
//! one state table, along with its [`Coverage`].
//!
//! Rearrangement, contextual and kerning tables have payload support.
//! Ligature and insertion tables are recognised but cannot be decoded or
//! encoded.
//!
//! # Example
//!
//! ```
//! use aat_state::{
//!     BuildOptions, DecodeContext, Entry, NormalizeOptions, RearrangementAction, StateId,
//!     StateTable, SubtableKind, Verb,
//! };
//! use font_types::GlyphId16;
//! use read_fonts::FontData;
//!
//! // swap a glyph in class 'First' with the next glyph in class 'Last'
//! let mut table = StateTable::new(SubtableKind::Rearrangement);
//! let first = table.class("First");
//! let last = table.class("Last");
//! table.map_glyph(GlyphId16::new(10), first);
//! table.map_glyph(GlyphId16::new(11), last);
//! let saw_first = table.state("Saw first");
//! table.set_entry(
//!     StateId::START_OF_TEXT,
//!     first,
//!     Entry::new(saw_first, RearrangementAction::default().with_mark_first()),
//! );
//! table.set_entry(
//!     saw_first,
//!     last,
//!     Entry::new(
//!         StateId::START_OF_TEXT,
//!         RearrangementAction::new(Verb::AXD_TO_DXA).with_mark_last(),
//!     ),
//! );
//! table.normalize(NormalizeOptions::default());
//!
//! let glyphs = [10, 11].map(GlyphId16::new);
//! let output = table.run(&glyphs);
//! assert_eq!(output, [(1, GlyphId16::new(11)), (0, GlyphId16::new(10))]);
//!
//! let bytes = table.build_binary(&BuildOptions::default()).unwrap();
//! let decoded = StateTable::read(
//!     FontData::new(&bytes),
//!     SubtableKind::Rearrangement,
//!     &DecodeContext::default(),
//! )
//! .unwrap();
//! assert_eq!(decoded, table);
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![forbid(unsafe_code)]

mod class_table;
mod compile;
pub mod diagnostics;
mod entry;
mod error;
mod interpret;
mod lookup;
mod names;
mod parse;
mod state_table;
mod validate;
mod write;

#[cfg(test)]
mod tests;

pub use class_table::ClassTable;
pub use compile::BuildOptions;
pub use diagnostics::{Diagnostic, DiagnosticSink, Diagnostics, LogSink, Severity};
pub use entry::{
    ActionPayload, ContextualAction, Entry, EntryFlags, GlyphMap, KerningAction,
    RearrangementAction, Verb,
};
pub use error::{BuildError, DecodeError, NameError};
pub use interpret::MAX_CYCLES;
pub use lookup::LookupFormat;
pub use names::{ClassId, Names, StateId, FIXED_CLASS_NAMES, FIXED_STATE_NAMES};
pub use parse::DecodeContext;
pub use state_table::{Coverage, NormalizeOptions, StateRow, StateTable, SubtableKind};
