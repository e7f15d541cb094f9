//! Mapping glyphs to classes.

use std::collections::BTreeMap;

use font_types::GlyphId16;
use read_fonts::FontData;

use crate::{
    diagnostics::{codes, DiagnosticSink},
    entry::is_sentinel_glyph,
    lookup::{self, ReadOptions},
    names::{ClassId, Names},
};

/// A partial map from glyphs to classes.
///
/// Glyphs with no entry belong to "Out of bounds", and the sentinel glyphs
/// always belong to "Deleted glyph".
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassTable {
    map: BTreeMap<GlyphId16, ClassId>,
}

impl ClassTable {
    pub fn new() -> Self {
        Default::default()
    }

    /// The class of `glyph` as the interpreter sees it.
    pub fn classify(&self, glyph: GlyphId16) -> ClassId {
        if is_sentinel_glyph(glyph) {
            return ClassId::DELETED_GLYPH;
        }
        self.get(glyph).unwrap_or(ClassId::OUT_OF_BOUNDS)
    }

    /// The explicit class of `glyph`, if it has one.
    pub fn get(&self, glyph: GlyphId16) -> Option<ClassId> {
        self.map.get(&glyph).copied()
    }

    /// Assign `glyph` to `class`, returning its previous class.
    ///
    /// Sentinel glyphs cannot be assigned and are ignored.
    pub fn insert(&mut self, glyph: GlyphId16, class: ClassId) -> Option<ClassId> {
        if is_sentinel_glyph(glyph) {
            return None;
        }
        self.map.insert(glyph, class)
    }

    pub fn remove(&mut self, glyph: GlyphId16) -> Option<ClassId> {
        self.map.remove(&glyph)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GlyphId16, ClassId)> + '_ {
        self.map.iter().map(|(glyph, class)| (*glyph, *class))
    }

    /// Read a class table whose values index `num_classes` classes.
    ///
    /// Mappings to the fixed classes are dropped, since they are implicit.
    pub(crate) fn read(
        data: FontData,
        num_classes: usize,
        options: ReadOptions,
        sink: &mut dyn DiagnosticSink,
    ) -> Option<ClassTable> {
        let options = ReadOptions {
            value_limit: Some(num_classes as u32),
            ..options
        };
        let pairs = lookup::read_lookup(data, options, sink)?;
        let map = pairs
            .into_iter()
            .map(|(glyph, class)| (GlyphId16::new(glyph), ClassId::new(class)))
            .filter(|(glyph, class)| !class.is_fixed() && !is_sentinel_glyph(*glyph))
            .collect();
        Some(ClassTable { map })
    }

    /// The raw lookup contents, given each class's binary index.
    pub(crate) fn to_lookup(&self, class_index: impl Fn(ClassId) -> u16) -> BTreeMap<u16, u16> {
        self.map
            .iter()
            .map(|(glyph, class)| (glyph.to_u16(), class_index(*class)))
            .collect()
    }

    /// Warn about mappings that are legal but unusual.
    pub(crate) fn check(&self, names: &Names, sink: &mut dyn DiagnosticSink) {
        let only_out_of_bounds = self.map.values().all(|c| *c == ClassId::OUT_OF_BOUNDS);
        if only_out_of_bounds {
            sink.warning(
                codes::EMPTY_CLASS_TABLE,
                "Class table empty or only maps to 'Out of bounds'.".into(),
            );
        } else if self.map.values().any(|c| *c == ClassId::OUT_OF_BOUNDS) {
            sink.warning(
                codes::EXPLICIT_OUT_OF_BOUNDS,
                "Class table has explicit entries mapping to 'Out of bounds'; since this is \
                 the default, these entries should be removed to save space."
                    .into(),
            );
        }
        let mut fixed = self
            .map
            .values()
            .filter(|c| c.is_fixed() && **c != ClassId::OUT_OF_BOUNDS)
            .map(|c| names.class_name(*c))
            .collect::<Vec<_>>();
        fixed.sort_unstable();
        fixed.dedup();
        if !fixed.is_empty() {
            sink.warning(
                codes::EXPLICIT_FIXED_CLASS,
                format!("Class table has explicit mappings to the fixed classes {fixed:?}."),
            );
        }
    }
}

impl FromIterator<(GlyphId16, ClassId)> for ClassTable {
    fn from_iter<T: IntoIterator<Item = (GlyphId16, ClassId)>>(iter: T) -> Self {
        let mut table = ClassTable::new();
        for (glyph, class) in iter {
            table.insert(glyph, class);
        }
        table
    }
}
