//! Decoding state tables from binary data.
//!
//! The layout of an extended state table is a header of `u32` fields
//! followed by components at the offsets it gives:
//!
//! ```text
//! u32 numClasses
//! u32 classTableOffset
//! u32 stateArrayOffset
//! u32 entryTableOffset
//! u32 payloadTableOffset   (contextual and kerning only)
//! ```
//!
//! The counts of states and entries are not stored; they are inferred from
//! the sizes of the components and the indices that refer to them.

use std::{collections::BTreeMap, ops::Range};

use font_types::GlyphId16;
use read_fonts::FontData;

use crate::{
    class_table::ClassTable,
    diagnostics::{codes, Diagnostic, DiagnosticSink, Diagnostics, LogSink, Severity},
    entry::{
        ActionPayload, ContextualAction, Entry, EntryFlags, GlyphMap, KerningAction,
        RearrangementAction,
    },
    error::DecodeError,
    lookup::{self, ReadOptions},
    names::{self, ClassId, StateId, FIXED_CLASS_NAMES, FIXED_STATE_NAMES},
    state_table::{Coverage, StateTable, SubtableKind},
};

/// An entry index, state index, or payload index meaning "none".
const NONE_INDEX: u16 = 0xFFFF;

/// States beyond this cannot be reached by any entry.
const MAX_STATES: usize = 0x10000;

/// Information from outside the state table needed to decode it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeContext {
    /// The coverage of the enclosing subtable.
    pub coverage: Coverage,
    /// The number of glyphs in the font, which bounds format 0 lookups.
    pub glyph_count: Option<u16>,
}

impl DecodeContext {
    pub fn new(coverage: Coverage) -> Self {
        DecodeContext {
            coverage,
            glyph_count: None,
        }
    }

    pub fn with_glyph_count(mut self, glyph_count: u16) -> Self {
        self.glyph_count = Some(glyph_count);
        self
    }
}

impl StateTable {
    /// Decode a state table, tolerating anomalies that do not prevent
    /// decoding.
    ///
    /// Warnings are logged.
    pub fn read(
        data: FontData,
        kind: SubtableKind,
        context: &DecodeContext,
    ) -> Result<StateTable, DecodeError> {
        let mut sink = Diagnostics::new();
        let table = Parser::new(data, kind, context, false).parse(&mut sink);
        let mut log = LogSink;
        for diagnostic in sink.iter().filter(|d| !d.is_error()) {
            log.report(diagnostic.clone());
        }
        table.ok_or_else(|| {
            let diagnostic = sink.first_error().cloned().unwrap_or_else(|| {
                Diagnostic::new(
                    Severity::Error,
                    codes::CANNOT_CONTINUE,
                    "Decoding could not continue.",
                )
            });
            DecodeError::new(diagnostic)
        })
    }

    /// Decode a state table, rejecting anything malformed, and then run
    /// [`validate`][Self::validate] on the result.
    ///
    /// Returns `None` if any errors were reported to `sink`.
    pub fn read_validated(
        data: FontData,
        kind: SubtableKind,
        context: &DecodeContext,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<StateTable> {
        let table = Parser::new(data, kind, context, true).parse(sink)?;
        table.validate(sink).then_some(table)
    }
}

/// An entry as stored, before its payload indices are resolved.
#[derive(Clone, Copy)]
struct RawEntry {
    new_state: u16,
    flags: u16,
    /// the mark and current substitution indices, or the value index
    payload: [u16; 2],
}

struct Parser<'a> {
    data: FontData<'a>,
    kind: SubtableKind,
    context: &'a DecodeContext,
    strict: bool,
}

impl<'a> Parser<'a> {
    fn new(
        data: FontData<'a>,
        kind: SubtableKind,
        context: &'a DecodeContext,
        strict: bool,
    ) -> Self {
        Parser {
            data,
            kind,
            context,
            strict,
        }
    }

    fn lookup_options(&self) -> ReadOptions {
        ReadOptions {
            value_limit: None,
            glyph_count: self.context.glyph_count,
            strict: self.strict,
        }
    }

    fn parse(&self, sink: &mut dyn DiagnosticSink) -> Option<StateTable> {
        let kind = self.kind;
        if ActionPayload::noop(kind).is_none() {
            sink.error(
                codes::CANNOT_CONTINUE,
                format!("Decoding {kind} state tables is not supported."),
            );
            return None;
        }
        let header_len = kind.header_len();
        if self.data.len() < header_len {
            sink.error(
                codes::INSUFFICIENT_BYTES,
                format!("Insufficient bytes for the {kind} state table header."),
            );
            return None;
        }
        let num_classes = self.data.read_at::<u32>(0).ok()? as usize;
        if num_classes < FIXED_CLASS_NAMES.len() {
            sink.error(
                codes::TOO_FEW_CLASSES,
                format!("The class count ({num_classes}) is less than four."),
            );
            return None;
        }
        if num_classes > u16::MAX as usize {
            sink.error(
                codes::CANNOT_CONTINUE,
                format!("The class count ({num_classes}) does not fit in 16 bits."),
            );
            return None;
        }

        let layout = self.layout(sink)?;
        let (num_states, cells) =
            self.read_state_array(layout.state_array.clone(), num_classes, sink)?;
        let raw_entries =
            self.read_entries(layout.entry_table.clone(), &cells, num_states, sink)?;
        let entries = match layout.payload_table.clone() {
            Some(range) => self.resolve_payloads(range, raw_entries, sink)?,
            None => raw_entries
                .into_iter()
                .map(|raw| self.entry(raw, RearrangementAction::from_flags(raw.flags).into()))
                .collect(),
        };

        let class_data = self.data.slice(layout.class_table)?;
        let class_table = ClassTable::read(class_data, num_classes, self.lookup_options(), sink)?;
        let stash = self.data.slice(layout.stash)?;
        let names = names::read_names(stash, num_states, num_classes, sink)?;

        let mut table = StateTable::with_parts(kind, self.context.coverage, names, class_table);
        for (state, row) in cells.chunks(num_classes).enumerate() {
            let state = StateId::new(state as u16);
            let row_entries = table.define_state(state);
            for (class, index) in row.iter().enumerate() {
                row_entries.insert(ClassId::new(class as u16), entries[*index as usize].clone());
            }
        }
        Some(table)
    }

    /// Locate the components, bounding each by the next one.
    fn layout(&self, sink: &mut dyn DiagnosticSink) -> Option<Layout> {
        let header_len = self.kind.header_len();
        let len = self.data.len();
        let mut offsets = Vec::with_capacity(4);
        for (i, (what, missing)) in COMPONENTS.iter().enumerate() {
            let field = 4 + i * 4;
            if field >= header_len {
                break;
            }
            let offset = self.data.read_at::<u32>(field).ok()? as usize;
            if offset < header_len {
                sink.error(
                    codes::BAD_OFFSET,
                    format!("The {what} offset ({offset}) points inside the header."),
                );
                return None;
            }
            if offset > len {
                sink.error(
                    *missing,
                    format!(
                        "The {what} is missing; its offset ({offset}) is past the end of the \
                         data."
                    ),
                );
                return None;
            }
            offsets.push(offset);
        }
        let region = |offset: usize| {
            let end = offsets
                .iter()
                .copied()
                .filter(|other| *other > offset)
                .min()
                .unwrap_or(len);
            offset..end
        };
        let first = offsets.iter().copied().min().unwrap_or(header_len);
        Some(Layout {
            stash: header_len..first,
            class_table: region(offsets[0]),
            state_array: region(offsets[1]),
            entry_table: region(offsets[2]),
            payload_table: offsets.get(3).map(|offset| region(*offset)),
        })
    }

    fn read_state_array(
        &self,
        range: Range<usize>,
        num_classes: usize,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<(usize, Vec<u16>)> {
        let row_len = num_classes * 2;
        let num_states = (range.len() / row_len).min(MAX_STATES);
        if num_states < FIXED_STATE_NAMES.len() {
            sink.error(
                codes::TOO_FEW_STATES,
                format!(
                    "The state array has room for {num_states} states; at least two are \
                     required."
                ),
            );
            return None;
        }
        let data = self.data.slice(range.start..range.start + num_states * row_len)?;
        let cells = (0..num_states * num_classes)
            .map(|i| data.read_at::<u16>(i * 2).ok())
            .collect::<Option<Vec<_>>>()?;
        Some((num_states, cells))
    }

    fn read_entries(
        &self,
        range: Range<usize>,
        cells: &[u16],
        num_states: usize,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<Vec<RawEntry>> {
        let num_entries = cells.iter().copied().max().map(|max| max as usize + 1).unwrap_or(0);
        let entry_len = self.kind.entry_len();
        if range.len() < num_entries * entry_len {
            let available = range.len() / entry_len;
            if range.end == self.data.len() {
                sink.error(
                    codes::MISSING_ENTRY_TABLE,
                    format!(
                        "The entry table is missing or incomplete: {num_entries} entries are \
                         used but there is only room for {available}."
                    ),
                );
            } else {
                sink.error(
                    codes::ENTRY_INDEX_OUT_OF_RANGE,
                    format!(
                        "The state array refers to entry {}, but the entry table has only \
                         {available} entries.",
                        num_entries - 1
                    ),
                );
            }
            return None;
        }
        let mut entries = Vec::with_capacity(num_entries);
        for i in 0..num_entries {
            let pos = range.start + i * entry_len;
            let word = |n: usize| self.data.read_at::<u16>(pos + n * 2).ok();
            let new_state = word(0)?;
            if new_state as usize >= num_states {
                sink.error(
                    codes::STATE_INDEX_OUT_OF_RANGE,
                    format!(
                        "Entry {i} goes to state {new_state}, but there are only {num_states} \
                         states."
                    ),
                );
                return None;
            }
            let mut payload = [NONE_INDEX; 2];
            for (n, slot) in payload.iter_mut().enumerate().take((entry_len - 4) / 2) {
                *slot = word(2 + n)?;
            }
            entries.push(RawEntry {
                new_state,
                flags: word(1)?,
                payload,
            });
        }
        Some(entries)
    }

    fn entry(&self, raw: RawEntry, payload: ActionPayload) -> Entry {
        let owned = ActionPayload::owned_flag_bits(self.kind);
        Entry {
            new_state: StateId::new(raw.new_state),
            flags: EntryFlags::from_bits_retain(raw.flags & !owned),
            payload,
        }
    }

    fn resolve_payloads(
        &self,
        range: Range<usize>,
        raw_entries: Vec<RawEntry>,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<Vec<Entry>> {
        let used = raw_entries
            .iter()
            .flat_map(|raw| raw.payload)
            .filter(|index| *index != NONE_INDEX);
        match self.kind {
            SubtableKind::Contextual => {
                let lookups = self.read_substitutions(range, used, sink)?;
                let get = |index: u16| lookups.get(&index).cloned().unwrap_or_default();
                Some(
                    raw_entries
                        .into_iter()
                        .map(|raw| {
                            let [mark, current] = raw.payload;
                            let mut action = ContextualAction::new()
                                .with_mark_substitution(get(mark))
                                .with_current_substitution(get(current));
                            if raw.flags & ContextualAction::SET_MARK != 0 {
                                action = action.with_mark();
                            }
                            self.entry(raw, action.into())
                        })
                        .collect(),
                )
            }
            SubtableKind::Kerning => {
                let values = self.read_values(range, used, sink)?;
                Some(
                    raw_entries
                        .into_iter()
                        .map(|raw| {
                            let mut action = KerningAction::from_flags(raw.flags);
                            if let Some(values) = values.get(&raw.payload[0]) {
                                action = action.with_values(values.iter().copied());
                            }
                            self.entry(raw, action.into())
                        })
                        .collect(),
                )
            }
            _ => None,
        }
    }

    /// Read the lookups at the given indices of the substitution table.
    fn read_substitutions(
        &self,
        range: Range<usize>,
        used: impl Iterator<Item = u16>,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<BTreeMap<u16, GlyphMap>> {
        let used = used.collect::<std::collections::BTreeSet<_>>();
        let Some(max) = used.last() else {
            return Some(BTreeMap::new());
        };
        let num_lookups = *max as usize + 1;
        let table = self.data.slice(range)?;
        let offsets = (0..num_lookups)
            .map(|i| table.read_at::<u32>(i * 4).ok().map(|offset| offset as usize))
            .collect::<Option<Vec<_>>>();
        let Some(offsets) = offsets else {
            sink.error(
                codes::MISSING_PAYLOAD_TABLE,
                format!(
                    "The substitution table is missing or incomplete: {num_lookups} lookups \
                     are used."
                ),
            );
            return None;
        };
        let mut lookups = BTreeMap::new();
        for index in used {
            let offset = offsets[index as usize];
            if offset < num_lookups * 4 || offset >= table.len() {
                sink.error(
                    codes::BAD_OFFSET,
                    format!(
                        "The offset ({offset}) to substitution lookup {index} is out of bounds."
                    ),
                );
                return None;
            }
            let end = offsets
                .iter()
                .copied()
                .filter(|other| *other > offset)
                .min()
                .unwrap_or(table.len())
                .min(table.len());
            let data = table.slice(offset..end)?;
            let pairs = lookup::read_lookup(data, self.lookup_options(), sink)?;
            let map = pairs
                .into_iter()
                .map(|(from, to)| (GlyphId16::new(from), GlyphId16::new(to)))
                .collect();
            lookups.insert(index, map);
        }
        Some(lookups)
    }

    /// Read the value lists at the given indices of the value table.
    fn read_values(
        &self,
        range: Range<usize>,
        used: impl Iterator<Item = u16>,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<BTreeMap<u16, Vec<i16>>> {
        let table = self.data.slice(range)?;
        let mut lists = BTreeMap::new();
        for index in used {
            if lists.contains_key(&index) {
                continue;
            }
            let mut values = Vec::new();
            let mut pos = index as usize * 2;
            loop {
                let Ok(value) = table.read_at::<i16>(pos) else {
                    sink.error(
                        codes::UNTERMINATED_VALUES,
                        format!("The kerning values at index {index} are not terminated."),
                    );
                    return None;
                };
                values.push(value & !1);
                if value & 1 != 0 {
                    break;
                }
                pos += 2;
            }
            lists.insert(index, values);
        }
        Some(lists)
    }
}

/// The components, with the diagnostic for each being past the end.
const COMPONENTS: [(&str, &str); 4] = [
    ("class table", codes::MISSING_CLASS_TABLE),
    ("state array", codes::MISSING_STATE_ARRAY),
    ("entry table", codes::MISSING_ENTRY_TABLE),
    ("payload table", codes::MISSING_PAYLOAD_TABLE),
];

/// The byte ranges of the components of a table.
struct Layout {
    stash: Range<usize>,
    class_table: Range<usize>,
    state_array: Range<usize>,
    entry_table: Range<usize>,
    payload_table: Option<Range<usize>>,
}
