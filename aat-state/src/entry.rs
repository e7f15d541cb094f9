//! Transitions and the actions they perform.

use std::{collections::BTreeMap, fmt::Display};

use font_types::GlyphId16;

use crate::{names::StateId, state_table::SubtableKind};

/// A glyph substitution, as performed by contextual subtables.
pub type GlyphMap = BTreeMap<GlyphId16, GlyphId16>;

/// The glyph ids that never appear in a class table or substitution key.
pub(crate) fn is_sentinel_glyph(glyph: GlyphId16) -> bool {
    glyph.to_u16() >= 0xFFFE
}

/// Flags on an entry that are not owned by its payload.
///
/// Bits that this crate does not understand are kept, so that they
/// survive being read and written back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntryFlags(u16);

impl EntryFlags {
    /// Process the current glyph again after the transition.
    pub const DONT_ADVANCE: EntryFlags = EntryFlags(0x4000);

    pub const fn empty() -> Self {
        EntryFlags(0)
    }

    pub const fn from_bits_retain(bits: u16) -> Self {
        EntryFlags(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: EntryFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: EntryFlags) {
        self.0 |= other.0
    }

    pub fn remove(&mut self, other: EntryFlags) {
        self.0 &= !other.0
    }
}

impl std::ops::BitOr for EntryFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        EntryFlags(self.0 | rhs.0)
    }
}

/// One cell of a state table: where to go next, and what to do first.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Entry {
    pub new_state: StateId,
    pub flags: EntryFlags,
    pub payload: ActionPayload,
}

impl Entry {
    pub fn new(new_state: StateId, payload: impl Into<ActionPayload>) -> Self {
        Entry {
            new_state,
            flags: EntryFlags::empty(),
            payload: payload.into(),
        }
    }

    /// The entry that does nothing and returns to "Start of text".
    pub fn noop(kind: SubtableKind) -> Option<Self> {
        ActionPayload::noop(kind).map(|payload| Entry::new(StateId::START_OF_TEXT, payload))
    }

    /// Set the no-advance flag.
    pub fn dont_advance(mut self) -> Self {
        self.flags.insert(EntryFlags::DONT_ADVANCE);
        self
    }

    pub fn advances(&self) -> bool {
        !self.flags.contains(EntryFlags::DONT_ADVANCE)
    }

    /// The flags word as stored in the binary.
    pub(crate) fn raw_flags(&self) -> u16 {
        let owned = ActionPayload::owned_flag_bits(self.payload.kind());
        (self.flags.bits() & !owned) | self.payload.flag_bits()
    }
}

/// What an entry does, by subtable kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActionPayload {
    Rearrangement(RearrangementAction),
    Contextual(ContextualAction),
    Kerning(KerningAction),
}

impl ActionPayload {
    /// The payload that has no effect, for kinds that have payloads.
    pub fn noop(kind: SubtableKind) -> Option<Self> {
        match kind {
            SubtableKind::Rearrangement => Some(RearrangementAction::default().into()),
            SubtableKind::Contextual => Some(ContextualAction::default().into()),
            SubtableKind::Kerning => Some(KerningAction::default().into()),
            SubtableKind::Ligature | SubtableKind::Insertion => None,
        }
    }

    pub fn kind(&self) -> SubtableKind {
        match self {
            ActionPayload::Rearrangement(_) => SubtableKind::Rearrangement,
            ActionPayload::Contextual(_) => SubtableKind::Contextual,
            ActionPayload::Kerning(_) => SubtableKind::Kerning,
        }
    }

    pub fn is_noop(&self) -> bool {
        ActionPayload::noop(self.kind()).as_ref() == Some(self)
    }

    /// The flag bits that belong to the payload of `kind`.
    pub(crate) fn owned_flag_bits(kind: SubtableKind) -> u16 {
        match kind {
            SubtableKind::Rearrangement => {
                RearrangementAction::MARK_FIRST
                    | RearrangementAction::MARK_LAST
                    | RearrangementAction::VERB_MASK
            }
            SubtableKind::Contextual => ContextualAction::SET_MARK,
            SubtableKind::Kerning => KerningAction::PUSH | KerningAction::RESET,
            SubtableKind::Ligature | SubtableKind::Insertion => 0,
        }
    }

    fn flag_bits(&self) -> u16 {
        match self {
            ActionPayload::Rearrangement(action) => {
                let mut bits = action.verb.code() as u16;
                if action.mark_first {
                    bits |= RearrangementAction::MARK_FIRST;
                }
                if action.mark_last {
                    bits |= RearrangementAction::MARK_LAST;
                }
                bits
            }
            ActionPayload::Contextual(action) if action.set_mark => ContextualAction::SET_MARK,
            ActionPayload::Contextual(_) => 0,
            ActionPayload::Kerning(action) => {
                let mut bits = 0;
                if action.push {
                    bits |= KerningAction::PUSH;
                }
                if action.reset {
                    bits |= KerningAction::RESET;
                }
                bits
            }
        }
    }
}

/// Marks a span of glyphs and permutes it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RearrangementAction {
    /// The current glyph becomes the first glyph of the span.
    pub mark_first: bool,
    /// The current glyph becomes the last glyph of the span.
    pub mark_last: bool,
    pub verb: Verb,
}

impl RearrangementAction {
    pub(crate) const MARK_FIRST: u16 = 0x8000;
    pub(crate) const MARK_LAST: u16 = 0x2000;
    pub(crate) const VERB_MASK: u16 = 0x000F;

    pub fn new(verb: Verb) -> Self {
        RearrangementAction {
            verb,
            ..Default::default()
        }
    }

    pub fn with_mark_first(mut self) -> Self {
        self.mark_first = true;
        self
    }

    pub fn with_mark_last(mut self) -> Self {
        self.mark_last = true;
        self
    }

    pub(crate) fn from_flags(flags: u16) -> Self {
        RearrangementAction {
            mark_first: flags & Self::MARK_FIRST != 0,
            mark_last: flags & Self::MARK_LAST != 0,
            verb: Verb((flags & Self::VERB_MASK) as u8),
        }
    }
}

/// Substitutes the current glyph and/or a previously marked glyph.
///
/// An empty substitution means no substitution. Identity mappings and
/// mappings from the sentinel glyphs are never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContextualAction {
    set_mark: bool,
    mark_substitution: GlyphMap,
    current_substitution: GlyphMap,
}

impl ContextualAction {
    pub(crate) const SET_MARK: u16 = 0x8000;

    pub fn new() -> Self {
        Default::default()
    }

    /// Remember the current glyph as the marked glyph.
    pub fn with_mark(mut self) -> Self {
        self.set_mark = true;
        self
    }

    pub fn with_mark_substitution(mut self, map: GlyphMap) -> Self {
        self.mark_substitution = clean_substitution(map);
        self
    }

    pub fn with_current_substitution(mut self, map: GlyphMap) -> Self {
        self.current_substitution = clean_substitution(map);
        self
    }

    pub fn set_mark(&self) -> bool {
        self.set_mark
    }

    pub fn mark_substitution(&self) -> Option<&GlyphMap> {
        Some(&self.mark_substitution).filter(|map| !map.is_empty())
    }

    pub fn current_substitution(&self) -> Option<&GlyphMap> {
        Some(&self.current_substitution).filter(|map| !map.is_empty())
    }
}

fn clean_substitution(mut map: GlyphMap) -> GlyphMap {
    map.retain(|from, to| from != to && !is_sentinel_glyph(*from));
    map
}

/// Pushes glyphs onto the kerning stack and pops them to apply values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KerningAction {
    /// Push the current glyph onto the stack.
    pub push: bool,
    /// Clear the stack once any values have been applied.
    pub reset: bool,
    values: Vec<i16>,
}

impl KerningAction {
    pub(crate) const PUSH: u16 = 0x8000;
    pub(crate) const RESET: u16 = 0x2000;

    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_push(mut self) -> Self {
        self.push = true;
        self
    }

    pub fn with_reset(mut self) -> Self {
        self.reset = true;
        self
    }

    /// Set the values popped glyphs receive, most recently pushed first.
    ///
    /// The low bit of each value is reserved by the binary format and is
    /// cleared.
    pub fn with_values(mut self, values: impl IntoIterator<Item = i16>) -> Self {
        self.values = values.into_iter().map(|value| value & !1).collect();
        self
    }

    pub fn values(&self) -> &[i16] {
        &self.values
    }

    pub(crate) fn from_flags(flags: u16) -> Self {
        KerningAction {
            push: flags & Self::PUSH != 0,
            reset: flags & Self::RESET != 0,
            values: Vec::new(),
        }
    }
}

/// One of the sixteen rearrangement patterns.
///
/// `A` and `B` are the first glyphs of the marked span, `C` and `D` the
/// last, and `x` whatever lies between.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Verb(u8);

/// For each verb, the number of glyphs moved from the start (high nibble)
/// and from the end (low nibble) of the span; 3 means two glyphs, reversed.
const REARRANGEMENT_MAP: [u8; 16] = [
    0x00, 0x10, 0x01, 0x11, 0x20, 0x30, 0x02, 0x03, 0x12, 0x13, 0x21, 0x31, 0x22, 0x32, 0x23, 0x33,
];

const VERB_PATTERNS: [&str; 16] = [
    "no change",
    "Ax => xA",
    "xD => Dx",
    "AxD => DxA",
    "ABx => xAB",
    "ABx => xBA",
    "xCD => CDx",
    "xCD => DCx",
    "AxCD => CDxA",
    "AxCD => DCxA",
    "ABxD => DxAB",
    "ABxD => DxBA",
    "ABxCD => CDxAB",
    "ABxCD => CDxBA",
    "ABxCD => DCxAB",
    "ABxCD => DCxBA",
];

/// How a verb moves glyphs; see [`Verb::shape`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct VerbShape {
    /// glyphs taken from the start of the span
    pub(crate) l: usize,
    /// glyphs taken from the end of the span
    pub(crate) r: usize,
    pub(crate) reverse_l: bool,
    pub(crate) reverse_r: bool,
}

impl Verb {
    pub const NO_CHANGE: Verb = Verb(0);
    pub const AX_TO_XA: Verb = Verb(1);
    pub const XD_TO_DX: Verb = Verb(2);
    pub const AXD_TO_DXA: Verb = Verb(3);

    /// Returns `None` if `code` is greater than 15.
    pub fn new(code: u8) -> Option<Self> {
        (code <= 15).then_some(Verb(code))
    }

    pub fn code(self) -> u8 {
        self.0
    }

    /// The pattern, as in "AxD => DxA".
    pub fn pattern(self) -> &'static str {
        VERB_PATTERNS[self.0 as usize]
    }

    pub(crate) fn shape(self) -> VerbShape {
        let m = REARRANGEMENT_MAP[self.0 as usize];
        VerbShape {
            l: 2.min(m >> 4) as usize,
            r: 2.min(m & 0x0F) as usize,
            reverse_l: m >> 4 == 3,
            reverse_r: m & 0x0F == 3,
        }
    }
}

impl VerbShape {
    /// The shape that produces the geometric mirror of this one, used when
    /// the glyph sequence is processed from the end.
    pub(crate) fn mirrored(self) -> Self {
        VerbShape {
            l: self.r,
            r: self.l,
            reverse_l: self.reverse_r,
            reverse_r: self.reverse_l,
        }
    }

    /// Apply to `span`, which is everything from the first to the last mark.
    ///
    /// Spans too short for the shape are left alone.
    pub(crate) fn apply<T: Copy>(self, span: &mut [T]) {
        let VerbShape {
            l,
            r,
            reverse_l,
            reverse_r,
        } = self;
        let len = span.len();
        if len < l + r || l + r == 0 {
            return;
        }
        let mut tmp = [span[0]; 4];
        tmp[..l].copy_from_slice(&span[..l]);
        tmp[2..2 + r].copy_from_slice(&span[len - r..]);
        if l != r {
            span.copy_within(l..len - r, r);
        }
        span[..r].copy_from_slice(&tmp[2..2 + r]);
        span[len - l..].copy_from_slice(&tmp[..l]);
        if reverse_l {
            span.swap(len - 1, len - 2);
        }
        if reverse_r {
            span.swap(0, 1);
        }
    }
}

impl Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.pattern())
    }
}

impl From<RearrangementAction> for ActionPayload {
    fn from(src: RearrangementAction) -> ActionPayload {
        ActionPayload::Rearrangement(src)
    }
}

impl From<ContextualAction> for ActionPayload {
    fn from(src: ContextualAction) -> ActionPayload {
        ActionPayload::Contextual(src)
    }
}

impl From<KerningAction> for ActionPayload {
    fn from(src: KerningAction) -> ActionPayload {
        ActionPayload::Kerning(src)
    }
}

impl Display for ActionPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        match self {
            ActionPayload::Rearrangement(action) => {
                if action.mark_first {
                    parts.push("mark first".to_string());
                }
                if action.mark_last {
                    parts.push("mark last".to_string());
                }
                if action.verb != Verb::NO_CHANGE {
                    parts.push(format!("rearrange {}", action.verb));
                }
            }
            ActionPayload::Contextual(action) => {
                if action.set_mark {
                    parts.push("mark".to_string());
                }
                if let Some(map) = action.mark_substitution() {
                    parts.push(format!("substitute marked glyph ({} mappings)", map.len()));
                }
                if let Some(map) = action.current_substitution() {
                    parts.push(format!("substitute current glyph ({} mappings)", map.len()));
                }
            }
            ActionPayload::Kerning(action) => {
                if action.push {
                    parts.push("push".to_string());
                }
                if !action.values.is_empty() {
                    parts.push(format!("apply {:?}", action.values));
                }
                if action.reset {
                    parts.push("reset".to_string());
                }
            }
        }
        if parts.is_empty() {
            f.write_str("no action")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}
