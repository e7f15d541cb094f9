//! Encoding state tables to binary data.
//!
//! Structurally identical entries share one row of the entry table, and
//! identical substitutions and value lists are written once. Everything is
//! numbered in first-seen order, so the same table always produces the same
//! bytes.

use std::collections::BTreeMap;

use indexmap::IndexSet;

use crate::{
    entry::{ActionPayload, Entry, GlyphMap},
    error::BuildError,
    lookup::{self, Gap, LookupFormat},
    names::{self, ClassId, StateId, FIXED_STATE_NAMES},
    state_table::{StateTable, SubtableKind},
    write::{OffsetLen, TableWriter},
};

const NONE_INDEX: u16 = 0xFFFF;

/// Options for [`StateTable::build_binary`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuildOptions {
    /// Always write the class table in this format.
    pub class_table_format: Option<LookupFormat>,
    /// Always write contextual substitutions in this format.
    pub substitution_format: Option<LookupFormat>,
    /// Write the names of states and classes into the binary.
    pub stash_names: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            class_table_format: None,
            substitution_format: None,
            stash_names: true,
        }
    }
}

/// An entry as it will be written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct EntryRecord {
    new_state: u16,
    flags: u16,
    payload: [u16; 2],
}

/// The pooled payloads of one table.
#[derive(Default)]
struct Payloads {
    substitutions: IndexSet<BTreeMap<u16, u16>>,
    values: IndexSet<Vec<i16>>,
    /// the position of each value list, in 16-bit units
    value_positions: Vec<u16>,
    value_len: usize,
}

impl Payloads {
    fn substitution(&mut self, map: Option<&GlyphMap>) -> Result<u16, BuildError> {
        let Some(map) = map else {
            return Ok(NONE_INDEX);
        };
        let raw = map
            .iter()
            .map(|(from, to)| (from.to_u16(), to.to_u16()))
            .collect();
        let (index, _) = self.substitutions.insert_full(raw);
        u16::try_from(index)
            .ok()
            .filter(|index| *index != NONE_INDEX)
            .ok_or(BuildError::TooMany("substitutions"))
    }

    fn values(&mut self, values: &[i16]) -> Result<u16, BuildError> {
        if values.is_empty() {
            return Ok(NONE_INDEX);
        }
        let (index, new) = self.values.insert_full(values.to_vec());
        if new {
            let position = u16::try_from(self.value_len)
                .ok()
                .filter(|position| *position != NONE_INDEX)
                .ok_or(BuildError::TooMany("kerning values"))?;
            self.value_positions.push(position);
            self.value_len += values.len();
        }
        Ok(self.value_positions[index])
    }
}

/// The binary numbering of states and classes.
struct Numbering {
    states: Vec<StateId>,
    classes: Vec<ClassId>,
    /// binary index by handle
    state_index: Vec<Option<u16>>,
    class_index: Vec<Option<u16>>,
}

impl Numbering {
    fn new(table: &StateTable) -> Result<Self, BuildError> {
        let names = table.names();
        let states = table.rows().map(|(state, _)| state).collect::<Vec<_>>();
        let mut used_classes = vec![false; names.num_classes()];
        for (_, class) in table.class_table().iter() {
            used_classes[class.index()] = true;
        }
        for (_, row) in table.rows() {
            for (class, _) in row.iter() {
                used_classes[class.index()] = true;
            }
        }
        let classes = names
            .classes()
            .filter(|class| class.is_fixed() || used_classes[class.index()])
            .collect::<Vec<_>>();
        if states.len() > u16::MAX as usize {
            return Err(BuildError::TooMany("states"));
        }
        if classes.len() > u16::MAX as usize {
            return Err(BuildError::TooMany("classes"));
        }
        let mut state_index = vec![None; names.num_states()];
        for (i, state) in states.iter().enumerate() {
            state_index[state.index()] = Some(i as u16);
        }
        let mut class_index = vec![None; names.num_classes()];
        for (i, class) in classes.iter().enumerate() {
            class_index[class.index()] = Some(i as u16);
        }
        Ok(Numbering {
            states,
            classes,
            state_index,
            class_index,
        })
    }

    fn class(&self, class: ClassId) -> u16 {
        // every class in the class table is numbered
        self.class_index[class.index()].unwrap_or(ClassId::OUT_OF_BOUNDS.to_u16())
    }
}

impl StateTable {
    /// Encode the table.
    ///
    /// The table must be complete: both fixed states defined, every defined
    /// state with an entry for every class, and every entry going to a
    /// defined state. [`normalize`][Self::normalize] makes a table complete.
    pub fn build_binary(&self, options: &BuildOptions) -> Result<Vec<u8>, BuildError> {
        let kind = self.kind();
        if ActionPayload::noop(kind).is_none() {
            return Err(BuildError::UnsupportedKind(kind));
        }
        for (state, name) in [StateId::START_OF_TEXT, StateId::START_OF_LINE]
            .into_iter()
            .zip(FIXED_STATE_NAMES)
        {
            if !self.is_defined(state) {
                return Err(BuildError::MissingFixedState(name));
            }
        }

        let numbering = Numbering::new(self)?;
        let mut entries = IndexSet::new();
        let mut payloads = Payloads::default();
        let mut cells = Vec::with_capacity(numbering.states.len() * numbering.classes.len());
        for state in &numbering.states {
            for class in &numbering.classes {
                let entry = self.entry(*state, *class).ok_or_else(|| BuildError::MissingCell {
                    state: self.state_name(*state).to_owned(),
                    class: self.class_name(*class).to_owned(),
                })?;
                let record = self.entry_record(*state, *class, entry, &numbering, &mut payloads)?;
                let (index, _) = entries.insert_full(record);
                cells.push(u16::try_from(index).map_err(|_| BuildError::TooMany("entries"))?);
            }
        }
        log::debug!(
            "{kind} table: {} states, {} classes, {} distinct entries",
            numbering.states.len(),
            numbering.classes.len(),
            entries.len()
        );

        let alignment = kind.alignment();
        let mut writer = TableWriter::default();
        let start = writer.stake_here();
        writer.write(numbering.classes.len() as u32);
        let class_table = writer.stake();
        let state_array = writer.stake();
        let entry_table = writer.stake();
        writer.write_offset(start, class_table, OffsetLen::Offset32);
        writer.write_offset(start, state_array, OffsetLen::Offset32);
        writer.write_offset(start, entry_table, OffsetLen::Offset32);
        let payload_table = (kind.header_len() > 16).then(|| {
            let stake = writer.stake();
            writer.write_offset(start, stake, OffsetLen::Offset32);
            stake
        });

        if options.stash_names {
            self.write_names(&mut writer, &numbering, alignment);
        }

        writer.place(class_table);
        let class_map = self.class_table().to_lookup(|class| numbering.class(class));
        let gap = Gap::Value(ClassId::OUT_OF_BOUNDS.to_u16());
        let (format, bytes) = lookup::write_lookup(&class_map, gap, options.class_table_format)?;
        log::debug!("class table uses {format}, {} bytes", bytes.len());
        writer.write_slice(&bytes);
        writer.align(alignment);

        writer.place(state_array);
        writer.write(cells.as_slice());
        writer.align(alignment);

        writer.place(entry_table);
        for record in &entries {
            writer.write(record.new_state);
            writer.write(record.flags);
            match kind {
                SubtableKind::Contextual => writer.write(record.payload.as_slice()),
                SubtableKind::Kerning => writer.write(record.payload[0]),
                _ => (),
            }
        }
        writer.align(alignment);

        if let Some(payload_table) = payload_table {
            writer.place(payload_table);
            match kind {
                SubtableKind::Contextual => {
                    write_substitutions(&mut writer, &payloads, options.substitution_format)?
                }
                _ => write_values(&mut writer, &payloads),
            }
        }
        writer.finish()
    }

    fn entry_record(
        &self,
        state: StateId,
        class: ClassId,
        entry: &Entry,
        numbering: &Numbering,
        payloads: &mut Payloads,
    ) -> Result<EntryRecord, BuildError> {
        if entry.payload.kind() != self.kind() {
            return Err(BuildError::PayloadMismatch {
                state: self.state_name(state).to_owned(),
                class: self.class_name(class).to_owned(),
            });
        }
        let new_state = numbering
            .state_index
            .get(entry.new_state.index())
            .copied()
            .flatten()
            .ok_or_else(|| BuildError::UndefinedState {
                from: self.state_name(state).to_owned(),
                target: self.state_name(entry.new_state).to_owned(),
            })?;
        let payload = match &entry.payload {
            ActionPayload::Rearrangement(_) => [NONE_INDEX; 2],
            ActionPayload::Contextual(action) => [
                payloads.substitution(action.mark_substitution())?,
                payloads.substitution(action.current_substitution())?,
            ],
            ActionPayload::Kerning(action) => [payloads.values(action.values())?, NONE_INDEX],
        };
        Ok(EntryRecord {
            new_state,
            flags: entry.raw_flags(),
            payload,
        })
    }

    fn write_names(&self, writer: &mut TableWriter, numbering: &Numbering, alignment: usize) {
        let class_names = numbering
            .classes
            .iter()
            .filter(|class| !class.is_fixed())
            .map(|class| self.class_name(*class))
            .collect::<Vec<_>>();
        let state_names = numbering
            .states
            .iter()
            .filter(|state| !state.is_fixed())
            .map(|state| self.state_name(*state))
            .collect::<Vec<_>>();
        if !names::can_stash(class_names.iter().chain(&state_names).copied()) {
            log::warn!("names are not all short ASCII strings; not writing a name stash");
            return;
        }
        names::write_stash(writer, &class_names, &state_names, alignment);
    }
}

fn write_substitutions(
    writer: &mut TableWriter,
    payloads: &Payloads,
    pinned: Option<LookupFormat>,
) -> Result<(), BuildError> {
    let base = writer.stake_here();
    let stakes = payloads
        .substitutions
        .iter()
        .map(|_| {
            let stake = writer.stake();
            writer.write_offset(base, stake, OffsetLen::Offset32);
            stake
        })
        .collect::<Vec<_>>();
    for (map, stake) in payloads.substitutions.iter().zip(stakes) {
        let (format, bytes) = lookup::write_lookup(map, Gap::Identity, pinned)?;
        log::debug!("substitution uses {format}, {} bytes", bytes.len());
        writer.place(stake);
        writer.write_slice(&bytes);
    }
    Ok(())
}

/// Write the value lists, marking the last value of each with its low bit.
fn write_values(writer: &mut TableWriter, payloads: &Payloads) {
    for values in &payloads.values {
        for (i, value) in values.iter().enumerate() {
            let marker = (i + 1 == values.len()) as i16;
            writer.write(value & !1 | marker);
        }
    }
}
