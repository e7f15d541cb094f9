//! The in-memory state table.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
};

use font_types::GlyphId16;

use crate::{
    class_table::ClassTable,
    entry::{ActionPayload, Entry, EntryFlags},
    error::NameError,
    names::{ClassId, Names, StateId},
};

/// The kind of subtable a state table belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SubtableKind {
    /// 'morx' type 0
    Rearrangement,
    /// 'morx' type 1
    Contextual,
    /// 'morx' type 2
    Ligature,
    /// 'morx' type 5
    Insertion,
    /// 'kerx' type 1
    Kerning,
}

impl SubtableKind {
    /// The size of one entry in the entry table.
    pub(crate) fn entry_len(self) -> usize {
        match self {
            SubtableKind::Rearrangement => 4,
            SubtableKind::Contextual => 8,
            SubtableKind::Ligature => 6,
            SubtableKind::Insertion => 8,
            SubtableKind::Kerning => 6,
        }
    }

    /// The size of the header, including the kind-specific extra offset.
    pub(crate) fn header_len(self) -> usize {
        match self {
            SubtableKind::Rearrangement => 16,
            _ => 20,
        }
    }

    /// Components are padded to this.
    pub(crate) fn alignment(self) -> usize {
        match self {
            SubtableKind::Kerning => 4,
            _ => 2,
        }
    }
}

impl Display for SubtableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SubtableKind::Rearrangement => "rearrangement",
            SubtableKind::Contextual => "contextual",
            SubtableKind::Ligature => "ligature",
            SubtableKind::Insertion => "insertion",
            SubtableKind::Kerning => "kerning",
        };
        f.write_str(name)
    }
}

/// The coverage word of the subtable that owns a state table.
///
/// The meaning of the low bits differs between 'morx' and 'kerx'.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coverage(u32);

impl Coverage {
    pub const VERTICAL: u32 = 0x80000000;
    /// 'morx': process glyphs in descending order.
    pub const MORX_BACKWARDS: u32 = 0x40000000;
    /// 'morx': apply to both horizontal and vertical text.
    pub const MORX_ALL_DIRECTIONS: u32 = 0x20000000;
    /// 'morx': the backwards bit refers to logical order.
    pub const MORX_LOGICAL: u32 = 0x10000000;
    /// 'kerx': kerning is perpendicular to the flow of text.
    pub const KERX_CROSS_STREAM: u32 = 0x40000000;
    /// 'kerx': values are variation deltas.
    pub const KERX_VARIATION: u32 = 0x20000000;
    /// 'kerx': process glyphs from last to first.
    pub const KERX_PROCESS_DIRECTION: u32 = 0x10000000;

    pub const fn new(bits: u32) -> Self {
        Coverage(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Coverage with only the reverse-processing bit for `kind` set.
    pub fn reverse(kind: SubtableKind) -> Self {
        Coverage(Self::reverse_bit(kind))
    }

    pub fn is_vertical(self) -> bool {
        self.0 & Self::VERTICAL != 0
    }

    /// `true` if glyphs are processed from the end of the sequence.
    pub fn is_reverse(self, kind: SubtableKind) -> bool {
        self.0 & Self::reverse_bit(kind) != 0
    }

    fn reverse_bit(kind: SubtableKind) -> u32 {
        match kind {
            SubtableKind::Kerning => Self::KERX_PROCESS_DIRECTION,
            _ => Self::MORX_BACKWARDS,
        }
    }
}

/// The entries of one state, by class.
///
/// Once a table is normalized every row has an entry for every class.
#[derive(Clone, Debug, Default, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateRow {
    entries: Vec<Option<Entry>>,
}

impl StateRow {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get(&self, class: ClassId) -> Option<&Entry> {
        self.entries.get(class.index()).and_then(Option::as_ref)
    }

    pub fn insert(&mut self, class: ClassId, entry: Entry) -> Option<Entry> {
        if self.entries.len() <= class.index() {
            self.entries.resize(class.index() + 1, None);
        }
        self.entries[class.index()].replace(entry)
    }

    pub fn remove(&mut self, class: ClassId) -> Option<Entry> {
        self.entries.get_mut(class.index()).and_then(Option::take)
    }

    pub fn contains(&self, class: ClassId) -> bool {
        self.get(class).is_some()
    }

    /// The number of classes with entries.
    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClassId, &Entry)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| entry.as_ref().map(|entry| (ClassId::new(i as u16), entry)))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (ClassId, &mut Entry)> + '_ {
        self.entries
            .iter_mut()
            .enumerate()
            .filter_map(|(i, entry)| entry.as_mut().map(|entry| (ClassId::new(i as u16), entry)))
    }
}

impl PartialEq for StateRow {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

/// An extended state table: a class table, and a row of entries for each
/// state.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateTable {
    kind: SubtableKind,
    pub coverage: Coverage,
    names: Names,
    class_table: ClassTable,
    /// indexed by state; `None` for states that are named but undefined
    rows: Vec<Option<StateRow>>,
}

/// Options for [`StateTable::normalize`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Add the transitions that restart matching after a partial match
    /// fails, and keep every non-start state put on deleted glyphs.
    pub add_transitions: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        NormalizeOptions {
            add_transitions: true,
        }
    }
}

impl StateTable {
    /// An empty table, with no states defined.
    pub fn new(kind: SubtableKind) -> Self {
        StateTable::with_parts(kind, Coverage::default(), Names::new(), ClassTable::new())
    }

    pub(crate) fn with_parts(
        kind: SubtableKind,
        coverage: Coverage,
        names: Names,
        class_table: ClassTable,
    ) -> Self {
        let rows = vec![None; names.num_states()];
        StateTable {
            kind,
            coverage,
            names,
            class_table,
            rows,
        }
    }

    pub fn kind(&self) -> SubtableKind {
        self.kind
    }

    pub fn names(&self) -> &Names {
        &self.names
    }

    pub fn class_table(&self) -> &ClassTable {
        &self.class_table
    }

    pub fn class_table_mut(&mut self) -> &mut ClassTable {
        &mut self.class_table
    }

    /// `true` if the glyph sequence is processed from its end.
    pub fn is_reverse(&self) -> bool {
        self.coverage.is_reverse(self.kind)
    }

    /// The handle for the state `name`, adding the name if it is new.
    ///
    /// This does not define the state; see [`define_state`][Self::define_state].
    pub fn state(&mut self, name: &str) -> StateId {
        let id = self.names.state(name);
        if self.rows.len() <= id.index() {
            self.rows.resize(id.index() + 1, None);
        }
        id
    }

    /// The handle for the class `name`, adding the name if it is new.
    pub fn class(&mut self, name: &str) -> ClassId {
        self.names.class(name)
    }

    pub fn find_state(&self, name: &str) -> Option<StateId> {
        self.names.find_state(name)
    }

    pub fn find_class(&self, name: &str) -> Option<ClassId> {
        self.names.find_class(name)
    }

    pub fn state_name(&self, state: StateId) -> &str {
        self.names.state_name(state)
    }

    pub fn class_name(&self, class: ClassId) -> &str {
        self.names.class_name(class)
    }

    /// Assign `glyph` to the class `class`.
    pub fn map_glyph(&mut self, glyph: GlyphId16, class: ClassId) {
        self.class_table.insert(glyph, class);
    }

    /// Give `state` a row, if it does not have one.
    pub fn define_state(&mut self, state: StateId) -> &mut StateRow {
        if self.rows.len() <= state.index() {
            self.rows.resize(state.index() + 1, None);
        }
        self.rows[state.index()].get_or_insert_with(StateRow::new)
    }

    pub fn is_defined(&self, state: StateId) -> bool {
        self.row(state).is_some()
    }

    /// Set the entry for `class` in `state`, defining the state.
    pub fn set_entry(&mut self, state: StateId, class: ClassId, entry: Entry) {
        self.define_state(state).insert(class, entry);
    }

    pub fn entry(&self, state: StateId, class: ClassId) -> Option<&Entry> {
        self.row(state)?.get(class)
    }

    pub fn row(&self, state: StateId) -> Option<&StateRow> {
        self.rows.get(state.index()).and_then(Option::as_ref)
    }

    pub fn row_mut(&mut self, state: StateId) -> Option<&mut StateRow> {
        self.rows.get_mut(state.index()).and_then(Option::as_mut)
    }

    /// The defined states and their rows, in handle order.
    pub fn rows(&self) -> impl Iterator<Item = (StateId, &StateRow)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| row.as_ref().map(|row| (StateId::new(i as u16), row)))
    }

    /// Rename states; names not in the table are ignored.
    ///
    /// All renames are applied together, so names may be swapped.
    pub fn rename_states<'a>(
        &mut self,
        renames: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<(), NameError> {
        self.names.rename_states(renames)
    }

    /// Rename classes; names not in the table are ignored.
    pub fn rename_classes<'a>(
        &mut self,
        renames: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<(), NameError> {
        self.names.rename_classes(renames)
    }

    /// Fill in every missing cell, so that each defined state has an entry
    /// for every class.
    ///
    /// Does nothing for kinds without payload support.
    pub fn normalize(&mut self, options: NormalizeOptions) {
        let Some(nop) = Entry::noop(self.kind) else {
            return;
        };
        self.define_state(StateId::START_OF_TEXT);
        if !self.is_defined(StateId::START_OF_LINE) {
            let start = self.row(StateId::START_OF_TEXT).cloned().unwrap_or_default();
            self.rows[StateId::START_OF_LINE.index()] = Some(start);
        }

        let classes = self.names.classes().collect::<Vec<_>>();
        let start_row = self.row(StateId::START_OF_TEXT).cloned().unwrap_or_default();
        // the classes that begin a match
        let starting = classes
            .iter()
            .copied()
            .filter(|class| !class.is_fixed())
            .filter(|class| start_row.get(*class).is_some_and(|entry| *entry != nop))
            .collect::<BTreeSet<_>>();

        for row in self.rows.iter_mut().flatten() {
            for class in &classes {
                if !row.contains(*class) {
                    row.insert(*class, nop.clone());
                }
            }
        }
        if !options.add_transitions {
            return;
        }
        for (i, row) in self.rows.iter_mut().enumerate() {
            let state = StateId::new(i as u16);
            let Some(row) = row.as_mut().filter(|_| !state.is_fixed()) else {
                continue;
            };
            if row.get(ClassId::DELETED_GLYPH) == Some(&nop) {
                row.insert(ClassId::DELETED_GLYPH, Entry::new(state, nop.payload.clone()));
            }
            for (class, entry) in row.iter_mut() {
                if *entry == nop && starting.contains(&class) {
                    if let Some(restart) = start_row.get(class) {
                        *entry = restart.clone();
                    }
                }
            }
        }
    }

    /// The table keyed by names rather than handles, for comparison.
    #[allow(clippy::type_complexity)]
    fn symbolic(
        &self,
    ) -> (
        BTreeMap<GlyphId16, &str>,
        BTreeMap<&str, BTreeMap<&str, (&str, EntryFlags, &ActionPayload)>>,
    ) {
        let classes = self
            .class_table
            .iter()
            .map(|(glyph, class)| (glyph, self.class_name(class)))
            .collect();
        let rows = self
            .rows()
            .map(|(state, row)| {
                let row = row
                    .iter()
                    .map(|(class, entry)| {
                        (
                            self.class_name(class),
                            (self.state_name(entry.new_state), entry.flags, &entry.payload),
                        )
                    })
                    .collect();
                (self.state_name(state), row)
            })
            .collect();
        (classes, rows)
    }
}

/// Tables are equal if they agree on everything, by name.
///
/// The numeric handles behind the names do not take part.
impl PartialEq for StateTable {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.coverage == other.coverage
            && self.symbolic() == other.symbolic()
    }
}

impl Eq for StateTable {}

impl Display for StateTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} state table", self.kind)?;
        writeln!(f, "Class table:")?;
        for (glyph, class) in self.class_table.iter() {
            writeln!(f, "  {}: {}", glyph.to_u16(), self.class_name(class))?;
        }
        for (state, row) in self.rows() {
            writeln!(f, "State '{}':", self.state_name(state))?;
            for (class, entry) in row.iter() {
                write!(
                    f,
                    "  Class '{}': {}, then go to state '{}'",
                    self.class_name(class),
                    entry.payload,
                    self.state_name(entry.new_state)
                )?;
                if !entry.advances() {
                    write!(f, " without advancing")?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
