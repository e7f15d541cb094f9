//! Symbolic state and class names.
//!
//! States and classes are identified by small integer handles, with their
//! names kept in a side table. The first few handles are reserved for the
//! fixed names that every extended state table has.
//!
//! Binaries may carry the names of the non-fixed states and classes in a
//! "name stash" between the header and the first component; when they do
//! not, names are synthesized from the binary indices.

use std::collections::HashMap;

use read_fonts::FontData;

use crate::{
    diagnostics::{codes, DiagnosticSink},
    error::NameError,
    write::TableWriter,
};

/// The names of the fixed states, in index order.
pub const FIXED_STATE_NAMES: [&str; 2] = ["Start of text", "Start of line"];

/// The names of the fixed classes, in index order.
pub const FIXED_CLASS_NAMES: [&str; 4] =
    ["End of text", "Out of bounds", "Deleted glyph", "End of line"];

const STASH_GUARD: u16 = 0xFEED;
const MIN_STASH_LEN: usize = 6;

/// A handle to a state in a [`StateTable`][crate::StateTable].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateId(u16);

/// A handle to a class in a [`StateTable`][crate::StateTable].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassId(u16);

impl StateId {
    pub const START_OF_TEXT: StateId = StateId(0);
    pub const START_OF_LINE: StateId = StateId(1);

    pub(crate) const fn new(raw: u16) -> Self {
        StateId(raw)
    }

    pub const fn to_u16(self) -> u16 {
        self.0
    }

    pub fn is_fixed(self) -> bool {
        (self.0 as usize) < FIXED_STATE_NAMES.len()
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl ClassId {
    pub const END_OF_TEXT: ClassId = ClassId(0);
    pub const OUT_OF_BOUNDS: ClassId = ClassId(1);
    pub const DELETED_GLYPH: ClassId = ClassId(2);
    pub const END_OF_LINE: ClassId = ClassId(3);

    pub(crate) const fn new(raw: u16) -> Self {
        ClassId(raw)
    }

    pub const fn to_u16(self) -> u16 {
        self.0
    }

    pub fn is_fixed(self) -> bool {
        (self.0 as usize) < FIXED_CLASS_NAMES.len()
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// One namespace of interned names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct Symbols {
    names: Vec<String>,
    lookup: HashMap<String, u16>,
}

impl Symbols {
    fn with_fixed(fixed: &[&str]) -> Self {
        let mut symbols = Symbols::default();
        for name in fixed {
            symbols.intern(name);
        }
        symbols
    }

    fn get(&self, name: &str) -> Option<u16> {
        self.lookup.get(name).copied()
    }

    fn intern(&mut self, name: &str) -> u16 {
        if let Some(existing) = self.get(name) {
            return existing;
        }
        let raw = u16::try_from(self.names.len()).expect("more than 65536 names interned");
        self.names.push(name.to_owned());
        self.lookup.insert(name.to_owned(), raw);
        raw
    }

    fn name(&self, raw: u16) -> &str {
        &self.names[raw as usize]
    }

    fn len(&self) -> usize {
        self.names.len()
    }

    fn rename<'a>(
        &mut self,
        n_fixed: usize,
        renames: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<(), NameError> {
        let mut names = self.names.clone();
        for (from, to) in renames {
            let Some(raw) = self.get(from) else {
                continue;
            };
            if (raw as usize) < n_fixed {
                return Err(NameError::Fixed(from.to_owned()));
            }
            if self.names[..n_fixed].iter().any(|fixed| fixed == to) {
                return Err(NameError::Fixed(to.to_owned()));
            }
            names[raw as usize] = to.to_owned();
        }
        let mut lookup = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if lookup.insert(name.clone(), i as u16).is_some() {
                return Err(NameError::Collision(name.clone()));
            }
        }
        self.names = names;
        self.lookup = lookup;
        Ok(())
    }
}

/// The bidirectional mapping between handles and names, for both the
/// states and the classes of a table.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Names {
    states: Symbols,
    classes: Symbols,
}

impl Default for Names {
    fn default() -> Self {
        Names {
            states: Symbols::with_fixed(&FIXED_STATE_NAMES),
            classes: Symbols::with_fixed(&FIXED_CLASS_NAMES),
        }
    }
}

impl Names {
    /// Names containing only the fixed states and classes.
    pub fn new() -> Self {
        Default::default()
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn state_name(&self, state: StateId) -> &str {
        self.states.name(state.0)
    }

    pub fn class_name(&self, class: ClassId) -> &str {
        self.classes.name(class.0)
    }

    pub fn find_state(&self, name: &str) -> Option<StateId> {
        self.states.get(name).map(StateId)
    }

    pub fn find_class(&self, name: &str) -> Option<ClassId> {
        self.classes.get(name).map(ClassId)
    }

    /// Return the handle for `name`, adding it if it is new.
    ///
    /// # Panics
    ///
    /// Panics if more than 65536 states are interned.
    pub fn state(&mut self, name: &str) -> StateId {
        StateId(self.states.intern(name))
    }

    /// Return the handle for `name`, adding it if it is new.
    ///
    /// # Panics
    ///
    /// Panics if more than 65536 classes are interned.
    pub fn class(&mut self, name: &str) -> ClassId {
        ClassId(self.classes.intern(name))
    }

    pub fn states(&self) -> impl Iterator<Item = StateId> + '_ {
        (0..self.states.len()).map(|i| StateId(i as u16))
    }

    pub fn classes(&self) -> impl Iterator<Item = ClassId> + '_ {
        (0..self.classes.len()).map(|i| ClassId(i as u16))
    }

    pub(crate) fn rename_states<'a>(
        &mut self,
        renames: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<(), NameError> {
        self.states.rename(FIXED_STATE_NAMES.len(), renames)
    }

    pub(crate) fn rename_classes<'a>(
        &mut self,
        renames: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<(), NameError> {
        self.classes.rename(FIXED_CLASS_NAMES.len(), renames)
    }

    /// Build names for a binary with the given counts, synthesizing the
    /// names of everything that is not fixed.
    pub(crate) fn synthesize(num_states: usize, num_classes: usize) -> Names {
        let mut names = Names::new();
        names.fill_synthesized(num_states, num_classes);
        names
    }

    fn fill_synthesized(&mut self, num_states: usize, num_classes: usize) {
        for i in self.states.len()..num_states {
            self.states.intern(&format!("State {i}"));
        }
        for i in self.classes.len()..num_classes {
            self.classes.intern(&format!("Class {i}"));
        }
    }
}

/// Read the names for a binary table.
///
/// `stash` is the region between the header and the first component. If it
/// does not contain a name stash, names are synthesized; if it contains a
/// malformed one, errors are reported and `None` is returned.
pub(crate) fn read_names(
    stash: FontData,
    num_states: usize,
    num_classes: usize,
    sink: &mut dyn DiagnosticSink,
) -> Option<Names> {
    if stash.len() < MIN_STASH_LEN || stash.read_at::<u16>(0).ok() != Some(STASH_GUARD) {
        return Some(Names::synthesize(num_states, num_classes));
    }
    let mut pos = 2;
    let class_names = read_pascal_strings(stash, &mut pos, "class", sink)?;
    let state_names = read_pascal_strings(stash, &mut pos, "state", sink)?;

    let expected_classes = num_classes.saturating_sub(FIXED_CLASS_NAMES.len());
    let expected_states = num_states.saturating_sub(FIXED_STATE_NAMES.len());
    check_stash_count("class", class_names.len(), expected_classes, sink);
    check_stash_count("state", state_names.len(), expected_states, sink);

    let mut names = Names::new();
    for name in class_names.iter().take(expected_classes) {
        if names.find_class(name).is_some() {
            report_duplicate_name("class", name, sink);
            return None;
        }
        names.class(name);
    }
    for name in state_names.iter().take(expected_states) {
        if names.find_state(name).is_some() {
            report_duplicate_name("state", name, sink);
            return None;
        }
        names.state(name);
    }
    names.fill_synthesized(num_states, num_classes);
    if names.num_states() != num_states || names.num_classes() != num_classes {
        // a synthesized name collided with a stashed one
        sink.error(
            codes::BAD_NAME_STASH,
            "Stashed names collide with synthesized names.".into(),
        );
        return None;
    }
    Some(names)
}

fn check_stash_count(kind: &str, found: usize, expected: usize, sink: &mut dyn DiagnosticSink) {
    if found != expected {
        sink.warning(
            codes::NAME_STASH_COUNT,
            format!("The name stash has {found} {kind} names but the table has {expected}."),
        );
    }
}

fn report_duplicate_name(kind: &str, name: &str, sink: &mut dyn DiagnosticSink) {
    sink.error(
        codes::BAD_NAME_STASH,
        format!("The stashed {kind} name '{name}' duplicates another name."),
    );
}

fn read_pascal_strings(
    data: FontData,
    pos: &mut usize,
    kind: &str,
    sink: &mut dyn DiagnosticSink,
) -> Option<Vec<String>> {
    let Ok(count) = data.read_at::<u16>(*pos) else {
        sink.error(
            codes::BAD_NAME_STASH,
            format!("The name stash is missing its {kind} name count."),
        );
        return None;
    };
    *pos += 2;
    let mut result = Vec::with_capacity(count as usize);
    for i in 0..count {
        let bytes = data
            .read_at::<u8>(*pos)
            .ok()
            .and_then(|len| data.slice(*pos + 1..*pos + 1 + len as usize));
        let Some(bytes) = bytes else {
            sink.error(
                codes::BAD_NAME_STASH,
                format!("The name stash is truncated in {kind} name {i}."),
            );
            return None;
        };
        let bytes: &[u8] = bytes.as_ref();
        if !bytes.is_ascii() {
            sink.error(
                codes::BAD_NAME_STASH,
                format!("The stashed {kind} name {i} is not ASCII."),
            );
            return None;
        }
        // ascii is always valid utf-8
        result.push(String::from_utf8_lossy(bytes).into_owned());
        *pos += 1 + bytes.len();
    }
    Some(result)
}

/// `true` if the names can be written to a name stash.
pub(crate) fn can_stash<'a>(mut names: impl Iterator<Item = &'a str>) -> bool {
    names.all(|name| name.is_ascii() && name.len() <= u8::MAX as usize)
}

/// Write a name stash, padded to `alignment` bytes.
pub(crate) fn write_stash<'a>(
    writer: &mut TableWriter,
    class_names: &[&'a str],
    state_names: &[&'a str],
    alignment: usize,
) {
    writer.write(STASH_GUARD);
    for list in [class_names, state_names] {
        writer.write(list.len() as u16);
        for name in list {
            writer.write(name.len() as u8);
            writer.write_slice(name.as_bytes());
        }
    }
    writer.align(alignment);
}
