//! AAT lookup tables.
//!
//! A lookup maps glyph ids to 16-bit values. Class tables and the glyph
//! substitution tables of contextual subtables are both lookups. There are
//! five interchangeable layouts; when writing, each is computed and the
//! smallest wins.
//!
//! See <https://developer.apple.com/fonts/TrueType-Reference-Manual/RM06/Chap6Tables.html>

use std::{collections::BTreeMap, fmt::Display};

use read_fonts::FontData;

use crate::{
    diagnostics::{codes, DiagnosticSink},
    error::BuildError,
    write::{FontWrite, OffsetLen, TableWriter},
};

const SENTINEL: u16 = 0xFFFF;
const LOOKUP_HEADER_LEN: usize = 2 + BinSrchHeader::RAW_BYTE_LEN;
const SEGMENT_LEN: u16 = 6;
const SINGLE_LEN: u16 = 4;
/// Glyphs further apart than this start a new format 4 segment.
const MAX_SEGMENT_GAP: u16 = 4;
/// The number of distinct glyph ids.
const MAX_COVERED_GLYPHS: usize = 0x10000;

/// The layout of a lookup table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LookupFormat {
    /// A value for every glyph, starting at glyph 0.
    Simple = 0,
    /// Ranges of glyphs sharing one value.
    Segmented = 2,
    /// Ranges of glyphs, each with its own array of values.
    SegmentArray = 4,
    /// Individual glyph/value pairs.
    Single = 6,
    /// A value for every glyph in a contiguous run.
    Trimmed = 8,
}

impl LookupFormat {
    pub const ALL: [LookupFormat; 5] = [
        LookupFormat::Simple,
        LookupFormat::Segmented,
        LookupFormat::SegmentArray,
        LookupFormat::Single,
        LookupFormat::Trimmed,
    ];

    pub fn new(raw: u16) -> Option<Self> {
        LookupFormat::ALL
            .into_iter()
            .find(|format| *format as u16 == raw)
    }
}

impl Display for LookupFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lookup format {}", *self as u16)
    }
}

/// The value given to glyphs that fall inside a dense run but have no
/// mapping of their own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Gap {
    /// Every gap glyph gets this value.
    Value(u16),
    /// Gap glyphs map to themselves.
    Identity,
}

impl Gap {
    fn value_for(self, glyph: u16) -> u16 {
        match self {
            Gap::Value(value) => value,
            Gap::Identity => glyph,
        }
    }
}

/// How a lookup is read.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ReadOptions {
    /// Values must be less than this.
    pub(crate) value_limit: Option<u32>,
    /// Format 0 lookups cover at most this many glyphs.
    pub(crate) glyph_count: Option<u16>,
    /// Reject ordering anomalies instead of tolerating them.
    pub(crate) strict: bool,
}

/// The binary search header shared by formats 2, 4 and 6.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BinSrchHeader {
    pub(crate) unit_size: u16,
    pub(crate) n_units: u16,
    pub(crate) search_range: u16,
    pub(crate) entry_selector: u16,
    pub(crate) range_shift: u16,
}

impl BinSrchHeader {
    const RAW_BYTE_LEN: usize = 10;

    /// Compute the header for `n_units` units of `unit_size` bytes.
    ///
    /// Returns `None` if the fields do not fit in 16 bits.
    pub(crate) fn compute(unit_size: u16, n_units: usize) -> Option<Self> {
        let n_units_16 = u16::try_from(n_units).ok()?;
        if n_units == 0 {
            return Some(BinSrchHeader {
                unit_size,
                n_units: 0,
                search_range: 0,
                entry_selector: 0,
                range_shift: 0,
            });
        }
        let entry_selector = n_units.ilog2();
        let search_range = (unit_size as usize) << entry_selector;
        let range_shift = n_units * unit_size as usize - search_range;
        Some(BinSrchHeader {
            unit_size,
            n_units: n_units_16,
            search_range: u16::try_from(search_range).ok()?,
            entry_selector: entry_selector as u16,
            range_shift: u16::try_from(range_shift).ok()?,
        })
    }

    fn read(data: FontData, pos: usize) -> Option<Self> {
        Some(BinSrchHeader {
            unit_size: data.read_at(pos).ok()?,
            n_units: data.read_at(pos + 2).ok()?,
            search_range: data.read_at(pos + 4).ok()?,
            entry_selector: data.read_at(pos + 6).ok()?,
            range_shift: data.read_at(pos + 8).ok()?,
        })
    }
}

impl FontWrite for BinSrchHeader {
    fn write_into(&self, writer: &mut TableWriter) {
        writer.write(self.unit_size);
        writer.write(self.n_units);
        writer.write(self.search_range);
        writer.write(self.entry_selector);
        writer.write(self.range_shift);
    }
}

/// A `(last, first, value)` record, as used by formats 2 and 4.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Segment {
    last: u16,
    first: u16,
    value: u16,
}

impl Segment {
    fn is_sentinel(&self) -> bool {
        self.last == SENTINEL && self.first == SENTINEL
    }

    fn len(&self) -> usize {
        (self.last - self.first) as usize + 1
    }
}

impl FontWrite for Segment {
    fn write_into(&self, writer: &mut TableWriter) {
        writer.write(self.last);
        writer.write(self.first);
        writer.write(self.value);
    }
}

/// Decode a lookup into a glyph to value map.
///
/// Every value present in the table is returned, including those for gap
/// glyphs in the dense formats; callers decide which values are implicit.
/// When a glyph appears more than once, the last value in table order wins.
pub(crate) fn read_lookup(
    data: FontData,
    options: ReadOptions,
    sink: &mut dyn DiagnosticSink,
) -> Option<BTreeMap<u16, u16>> {
    let Ok(raw_format) = data.read_at::<u16>(0) else {
        sink.error(
            codes::INSUFFICIENT_BYTES,
            "Insufficient bytes for the lookup format.".into(),
        );
        return None;
    };
    let Some(format) = LookupFormat::new(raw_format) else {
        sink.error(
            codes::UNKNOWN_LOOKUP_FORMAT,
            format!("The lookup format ({raw_format}) is not recognized."),
        );
        return None;
    };
    let pairs = match format {
        LookupFormat::Simple => read_simple(data, options),
        LookupFormat::Segmented => read_segmented(data, options, sink)?,
        LookupFormat::SegmentArray => read_segment_array(data, options, sink)?,
        LookupFormat::Single => read_single(data, options, sink)?,
        LookupFormat::Trimmed => read_trimmed(data, sink)?,
    };
    let map = pairs.into_iter().collect::<BTreeMap<_, _>>();
    if let Some(limit) = options.value_limit {
        let bad = map
            .iter()
            .filter(|(_, value)| **value as u32 >= limit)
            .map(|(glyph, _)| *glyph)
            .collect::<Vec<_>>();
        if !bad.is_empty() {
            sink.error(
                codes::CLASS_INDEX_OUT_OF_RANGE,
                format!("The following glyphs map to values that are out of range: {bad:?}"),
            );
            return None;
        }
    }
    Some(map)
}

fn read_simple(data: FontData, options: ReadOptions) -> Vec<(u16, u16)> {
    let mut count = ((data.len() - 2) / 2).min(SENTINEL as usize);
    if let Some(glyph_count) = options.glyph_count {
        count = count.min(glyph_count as usize);
    }
    // format 0 runs to the end of the data, so cannot be truncated
    (0..count)
        .filter_map(|i| Some((i as u16, data.read_at::<u16>(2 + i * 2).ok()?)))
        .collect()
}

fn read_bin_srch_header(
    data: FontData,
    format: LookupFormat,
    unit_size: u16,
    sink: &mut dyn DiagnosticSink,
) -> Option<BinSrchHeader> {
    let Some(header) = BinSrchHeader::read(data, 2) else {
        sink.error(
            codes::INSUFFICIENT_BYTES,
            format!("The binary search header of a {format} lookup is missing or incomplete."),
        );
        return None;
    };
    if header.unit_size != unit_size {
        sink.error(
            codes::BAD_UNIT_SIZE,
            format!(
                "Was expecting a unitSize of {unit_size} in the binary search header for \
                 a {format} lookup, but got {} instead.",
                header.unit_size
            ),
        );
        return None;
    }
    if data.len() < LOOKUP_HEADER_LEN + header.n_units as usize * unit_size as usize {
        sink.error(
            codes::INSUFFICIENT_BYTES,
            format!("The data for the {format} lookup are missing or incomplete."),
        );
        return None;
    }
    Some(header)
}

fn read_segments(
    data: FontData,
    format: LookupFormat,
    options: ReadOptions,
    sink: &mut dyn DiagnosticSink,
) -> Option<Vec<Segment>> {
    let header = read_bin_srch_header(data, format, SEGMENT_LEN, sink)?;
    let segments = (0..header.n_units as usize)
        .filter_map(|i| {
            let pos = LOOKUP_HEADER_LEN + i * SEGMENT_LEN as usize;
            Some(Segment {
                last: data.read_at(pos).ok()?,
                first: data.read_at(pos + 2).ok()?,
                value: data.read_at(pos + 4).ok()?,
            })
        })
        .filter(|seg| !seg.is_sentinel())
        .collect::<Vec<_>>();

    let swapped = segments
        .iter()
        .filter(|seg| seg.first > seg.last)
        .map(|seg| (seg.first, seg.last))
        .collect::<Vec<_>>();
    if !swapped.is_empty() {
        sink.error(
            codes::BAD_LOOKUP_ORDER,
            format!(
                "The following glyph ranges have their start and end glyph indices swapped: \
                 {swapped:?}"
            ),
        );
        return None;
    }
    // more coverage than there are glyphs can only come from overlaps
    let covered = segments.iter().map(Segment::len).sum::<usize>();
    if covered > MAX_COVERED_GLYPHS {
        sink.error(
            codes::BAD_LOOKUP_ORDER,
            format!(
                "The segments cover {covered} glyphs in total, more than the \
                 {MAX_COVERED_GLYPHS} glyphs a font can have."
            ),
        );
        return None;
    }
    if options.strict {
        if segments.windows(2).any(|pair| pair[0].first > pair[1].first) {
            sink.error(
                codes::BAD_LOOKUP_ORDER,
                "The segments are not sorted by first glyph.".into(),
            );
            return None;
        }
        if segments.windows(2).any(|pair| pair[0].last >= pair[1].first) {
            sink.error(
                codes::BAD_LOOKUP_ORDER,
                "The segments have overlaps in glyph coverage.".into(),
            );
            return None;
        }
    }
    Some(segments)
}

fn read_segmented(
    data: FontData,
    options: ReadOptions,
    sink: &mut dyn DiagnosticSink,
) -> Option<Vec<(u16, u16)>> {
    let segments = read_segments(data, LookupFormat::Segmented, options, sink)?;
    Some(
        segments
            .iter()
            .flat_map(|seg| (seg.first..=seg.last).map(move |glyph| (glyph, seg.value)))
            .collect(),
    )
}

fn read_segment_array(
    data: FontData,
    options: ReadOptions,
    sink: &mut dyn DiagnosticSink,
) -> Option<Vec<(u16, u16)>> {
    let segments = read_segments(data, LookupFormat::SegmentArray, options, sink)?;
    let min_offset = LOOKUP_HEADER_LEN + SEGMENT_LEN as usize * segments.len();
    let mut pairs = Vec::new();
    for seg in &segments {
        let offset = seg.value as usize;
        if options.strict && offset < min_offset {
            sink.error(
                codes::LOOKUP_OFFSET_COLLISION,
                format!(
                    "The segment offset for the ({}, {}) group is {offset}, which places it \
                     within the segment index data.",
                    seg.first, seg.last
                ),
            );
            return None;
        }
        let values = data.slice(offset..offset + seg.len() * 2);
        let Some(values) = values else {
            sink.error(
                codes::INSUFFICIENT_BYTES,
                format!(
                    "The values for the ({}, {}) segment are missing or incomplete.",
                    seg.first, seg.last
                ),
            );
            return None;
        };
        pairs.extend((seg.first..=seg.last).enumerate().filter_map(|(i, glyph)| {
            values.read_at::<u16>(i * 2).ok().map(|value| (glyph, value))
        }));
    }
    Some(pairs)
}

fn read_single(
    data: FontData,
    options: ReadOptions,
    sink: &mut dyn DiagnosticSink,
) -> Option<Vec<(u16, u16)>> {
    let header = read_bin_srch_header(data, LookupFormat::Single, SINGLE_LEN, sink)?;
    let pairs = (0..header.n_units as usize)
        .filter_map(|i| {
            let pos = LOOKUP_HEADER_LEN + i * SINGLE_LEN as usize;
            Some((
                data.read_at::<u16>(pos).ok()?,
                data.read_at::<u16>(pos + 2).ok()?,
            ))
        })
        .filter(|(glyph, _)| *glyph != SENTINEL)
        .collect::<Vec<(u16, u16)>>();
    if options.strict {
        if let Some(pair) = pairs.windows(2).find(|pair| pair[0].0 >= pair[1].0) {
            let message = if pair[0].0 == pair[1].0 {
                format!("Glyph {} appears more than once.", pair[0].0)
            } else {
                "The glyphs are not sorted.".to_string()
            };
            sink.error(codes::BAD_LOOKUP_ORDER, message);
            return None;
        }
    }
    Some(pairs)
}

fn read_trimmed(data: FontData, sink: &mut dyn DiagnosticSink) -> Option<Vec<(u16, u16)>> {
    let (Ok(first), Ok(count)) = (data.read_at::<u16>(2), data.read_at::<u16>(4)) else {
        sink.error(
            codes::INSUFFICIENT_BYTES,
            "The format 8 header is missing or incomplete.".into(),
        );
        return None;
    };
    if data.len() < 6 + count as usize * 2 || first as usize + count as usize > 0x10000 {
        sink.error(
            codes::INSUFFICIENT_BYTES,
            "The format 8 data is missing or incomplete.".into(),
        );
        return None;
    }
    Some(
        (0..count as usize)
            .filter_map(|i| {
                let value = data.read_at::<u16>(6 + i * 2).ok()?;
                Some((first + i as u16, value))
            })
            .collect(),
    )
}

/// Encode a lookup, choosing the smallest format unless one is pinned.
///
/// Ties go to the lowest format number, so the choice is deterministic.
pub(crate) fn write_lookup(
    map: &BTreeMap<u16, u16>,
    gap: Gap,
    pinned: Option<LookupFormat>,
) -> Result<(LookupFormat, Vec<u8>), BuildError> {
    if let Some(format) = pinned {
        return write_format(map, gap, format)
            .map(|bytes| (format, bytes))
            .ok_or(BuildError::UnrepresentableLookup(format));
    }
    let mut best: Option<(LookupFormat, Vec<u8>)> = None;
    for format in LookupFormat::ALL {
        let Some(bytes) = write_format(map, gap, format) else {
            continue;
        };
        if best
            .as_ref()
            .map(|(_, current)| bytes.len() < current.len())
            .unwrap_or(true)
        {
            best = Some((format, bytes));
        }
    }
    // format 6 can always represent a lookup of real glyphs
    let best = best.ok_or(BuildError::UnrepresentableLookup(LookupFormat::Single))?;
    log::debug!("chose {} ({} bytes)", best.0, best.1.len());
    Ok(best)
}

/// Encode a lookup in a single format, or `None` if it cannot be represented.
pub(crate) fn write_format(
    map: &BTreeMap<u16, u16>,
    gap: Gap,
    format: LookupFormat,
) -> Option<Vec<u8>> {
    let mut writer = TableWriter::default();
    // format 4 value offsets are measured from the start of the lookup
    let start = writer.stake_here();
    writer.write(format as u16);
    match format {
        LookupFormat::Simple => {
            if let Some(max) = map.keys().next_back() {
                for glyph in 0..=*max {
                    writer.write(map.get(&glyph).copied().unwrap_or(gap.value_for(glyph)));
                }
            }
        }
        LookupFormat::Segmented => {
            let segments = uniform_segments(map);
            writer.write(BinSrchHeader::compute(SEGMENT_LEN, segments.len())?);
            writer.write(segments.as_slice());
            writer.write(Segment {
                last: SENTINEL,
                first: SENTINEL,
                value: SENTINEL,
            });
        }
        LookupFormat::SegmentArray => {
            let runs = dense_runs(map);
            writer.write(BinSrchHeader::compute(SEGMENT_LEN, runs.len())?);
            let stakes = runs
                .iter()
                .map(|(first, last)| {
                    let stake = writer.stake();
                    writer.write(*last);
                    writer.write(*first);
                    writer.write_offset(start, stake, OffsetLen::Offset16);
                    stake
                })
                .collect::<Vec<_>>();
            writer.write(Segment {
                last: SENTINEL,
                first: SENTINEL,
                value: 0,
            });
            for ((first, last), stake) in runs.iter().zip(stakes) {
                writer.place(stake);
                for glyph in *first..=*last {
                    writer.write(map.get(&glyph).copied().unwrap_or(gap.value_for(glyph)));
                }
            }
        }
        LookupFormat::Single => {
            writer.write(BinSrchHeader::compute(SINGLE_LEN, map.len())?);
            for (glyph, value) in map {
                writer.write(*glyph);
                writer.write(*value);
            }
            writer.write(SENTINEL);
            writer.write(SENTINEL);
        }
        LookupFormat::Trimmed => {
            let first = map.keys().next().copied().unwrap_or_default();
            let last = map.keys().next_back().copied();
            let count = last.map(|last| last - first + 1).unwrap_or_default();
            writer.write(first);
            writer.write(count);
            if let Some(last) = last {
                for glyph in first..=last {
                    writer.write(map.get(&glyph).copied().unwrap_or(gap.value_for(glyph)));
                }
            }
        }
    }
    writer.finish().ok()
}

/// Group contiguous glyphs that share a value.
fn uniform_segments(map: &BTreeMap<u16, u16>) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    for (glyph, value) in map {
        match segments.last_mut() {
            Some(seg) if seg.last + 1 == *glyph && seg.value == *value => seg.last = *glyph,
            _ => segments.push(Segment {
                last: *glyph,
                first: *glyph,
                value: *value,
            }),
        }
    }
    segments
}

/// Group glyphs into `(first, last)` runs with only small gaps.
fn dense_runs(map: &BTreeMap<u16, u16>) -> Vec<(u16, u16)> {
    let mut runs: Vec<(u16, u16)> = Vec::new();
    for glyph in map.keys() {
        match runs.last_mut() {
            Some((_, last)) if glyph - *last < MAX_SEGMENT_GAP => *last = *glyph,
            _ => runs.push((*glyph, *glyph)),
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{diagnostics::Diagnostics, tests::test_helpers::BeBuffer};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn classes(num_classes: u32) -> ReadOptions {
        ReadOptions {
            value_limit: Some(num_classes),
            glyph_count: None,
            strict: true,
        }
    }

    fn read_map(bytes: &[u8], options: ReadOptions) -> Option<BTreeMap<u16, u16>> {
        let mut sink = Diagnostics::new();
        read_lookup(FontData::new(bytes), options, &mut sink)
    }

    fn sample() -> BTreeMap<u16, u16> {
        [(10, 4), (11, 4), (12, 4), (14, 5), (40, 6)].into_iter().collect()
    }

    #[test]
    fn bin_srch_header() {
        let header = BinSrchHeader::compute(6, 3).unwrap();
        assert_eq!(
            (
                header.unit_size,
                header.n_units,
                header.search_range,
                header.entry_selector,
                header.range_shift
            ),
            (6, 3, 12, 1, 6)
        );
        let header = BinSrchHeader::compute(4, 8).unwrap();
        assert_eq!((header.search_range, header.entry_selector, header.range_shift), (32, 3, 0));
    }

    #[test]
    fn segmented_layout() {
        let map: BTreeMap<u16, u16> = [(0, 4), (1, 5), (23, 6), (24, 6), (25, 6), (26, 6), (27, 6)]
            .into_iter()
            .collect();
        let bytes = write_format(&map, Gap::Value(1), LookupFormat::Segmented).unwrap();
        #[rustfmt::skip]
        let expected = BeBuffer::new().extend([
            2u16,                       // format
            6, 3, 12, 1, 6,             // binary search header
            0, 0, 4,                    // (last, first, value)
            1, 1, 5,
            0x1B, 0x17, 6,
            0xFFFF, 0xFFFF, 0xFFFF,     // sentinel
        ]);
        assert_eq!(bytes, expected.as_slice());
    }

    #[test]
    fn segment_array_layout() {
        let map: BTreeMap<u16, u16> = [(3, 4), (5, 5), (20, 4)].into_iter().collect();
        let bytes = write_format(&map, Gap::Value(1), LookupFormat::SegmentArray).unwrap();
        #[rustfmt::skip]
        let expected = BeBuffer::new().extend([
            4u16,                       // format
            6, 2, 12, 1, 0,             // binary search header
            5, 3, 30,                   // (last, first, offset)
            20, 20, 36,
            0xFFFF, 0xFFFF, 0,          // sentinel
            4, 1, 5,                    // glyphs 3..=5, with a gap
            4,                          // glyph 20
        ]);
        assert_eq!(bytes, expected.as_slice());
    }

    #[test]
    fn single_and_trimmed_layout() {
        let map: BTreeMap<u16, u16> = [(12, 4), (90, 5)].into_iter().collect();
        let single = write_format(&map, Gap::Value(1), LookupFormat::Single).unwrap();
        #[rustfmt::skip]
        let expected = BeBuffer::new().extend([
            6u16,
            4, 2, 8, 1, 0,
            12, 4,
            90, 5,
            0xFFFF, 0xFFFF,
        ]);
        assert_eq!(single, expected.as_slice());

        let map: BTreeMap<u16, u16> = [(12, 4)].into_iter().collect();
        let trimmed = write_format(&map, Gap::Value(1), LookupFormat::Trimmed).unwrap();
        assert_eq!(trimmed, BeBuffer::new().extend([8u16, 12, 1, 4]).as_slice());
    }

    #[rstest]
    #[case::simple(LookupFormat::Simple)]
    #[case::segmented(LookupFormat::Segmented)]
    #[case::segment_array(LookupFormat::SegmentArray)]
    #[case::single(LookupFormat::Single)]
    #[case::trimmed(LookupFormat::Trimmed)]
    fn each_format_reads_back(#[case] format: LookupFormat) {
        let map = sample();
        let bytes = write_format(&map, Gap::Value(1), format).unwrap();
        let read = read_map(&bytes, classes(7)).unwrap();
        // dense formats also return the gap glyphs
        let explicit = read
            .into_iter()
            .filter(|(_, value)| *value >= 4)
            .collect::<BTreeMap<_, _>>();
        assert_eq!(explicit, map);
    }

    #[test]
    fn segment_array_chosen_and_read_back() {
        let map: BTreeMap<u16, u16> = (0..10)
            .chain(1000..1010)
            .map(|glyph| (glyph, 4 + glyph % 5))
            .collect();
        let (format, bytes) = write_lookup(&map, Gap::Value(1), None).unwrap();
        assert_eq!(format, LookupFormat::SegmentArray);
        // first value offset: header, two segments and the sentinel
        assert_eq!(bytes[16..18], [0, 30]);
        assert_eq!(read_map(&bytes, classes(9)), Some(map));
    }

    #[test]
    fn identity_gaps() {
        let map: BTreeMap<u16, u16> = [(22, 95), (25, 98)].into_iter().collect();
        let bytes = write_format(&map, Gap::Identity, LookupFormat::Trimmed).unwrap();
        let read = read_map(&bytes, ReadOptions::default()).unwrap();
        assert_eq!(read.get(&23), Some(&23));
        assert_eq!(read.get(&25), Some(&98));
    }

    #[test]
    fn picks_smallest() {
        // one long uniform run: format 2 beats everything else
        let map: BTreeMap<u16, u16> = (100..200).map(|glyph| (glyph, 4)).collect();
        let (format, _) = write_lookup(&map, Gap::Value(1), None).unwrap();
        assert_eq!(format, LookupFormat::Segmented);

        // a dense run starting at zero with varied values: format 0
        let map: BTreeMap<u16, u16> = (0..20).map(|glyph| (glyph, 4 + glyph % 3)).collect();
        let (format, _) = write_lookup(&map, Gap::Value(1), None).unwrap();
        assert_eq!(format, LookupFormat::Simple);

        // a dense varied run far from zero: format 8
        let map: BTreeMap<u16, u16> = (500..520).map(|glyph| (glyph, 4 + glyph % 3)).collect();
        let (format, _) = write_lookup(&map, Gap::Value(1), None).unwrap();
        assert_eq!(format, LookupFormat::Trimmed);

        // two isolated glyphs: format 6
        let map: BTreeMap<u16, u16> = [(5, 4), (9000, 5)].into_iter().collect();
        let (format, _) = write_lookup(&map, Gap::Value(1), None).unwrap();
        assert_eq!(format, LookupFormat::Single);
    }

    #[test]
    fn pinned_format() {
        let map = sample();
        let (format, bytes) =
            write_lookup(&map, Gap::Value(1), Some(LookupFormat::SegmentArray)).unwrap();
        assert_eq!(format, LookupFormat::SegmentArray);
        assert_eq!(bytes[..2], [0, 4]);
    }

    #[test]
    fn empty() {
        let (format, bytes) = write_lookup(&BTreeMap::new(), Gap::Value(1), None).unwrap();
        assert_eq!(format, LookupFormat::Simple);
        assert_eq!(bytes, [0, 0]);
        assert_eq!(read_map(&bytes, classes(4)), Some(BTreeMap::new()));
    }

    #[test]
    fn class_out_of_range() {
        let buf = BeBuffer::new().extend([8u16, 10, 2, 4, 9]);
        let mut sink = Diagnostics::new();
        assert!(read_lookup(buf.font_data(), classes(6), &mut sink).is_none());
        assert_eq!(sink.codes(), [codes::CLASS_INDEX_OUT_OF_RANGE]);
    }

    #[test]
    fn unknown_format() {
        let buf = BeBuffer::new().extend([3u16, 0, 0]);
        let mut sink = Diagnostics::new();
        assert!(read_lookup(buf.font_data(), classes(6), &mut sink).is_none());
        assert_eq!(sink.codes(), [codes::UNKNOWN_LOOKUP_FORMAT]);
    }

    #[test]
    fn swapped_segment() {
        #[rustfmt::skip]
        let buf = BeBuffer::new().extend([
            2u16,
            6, 1, 6, 0, 0,
            10, 20, 4,                  // first > last
        ]);
        let mut sink = Diagnostics::new();
        assert!(read_lookup(buf.font_data(), classes(6), &mut sink).is_none());
        assert_eq!(sink.codes(), [codes::BAD_LOOKUP_ORDER]);
    }

    #[test]
    fn overlapping_segments_strict_and_lenient() {
        #[rustfmt::skip]
        let buf = BeBuffer::new().extend([
            2u16,
            6, 2, 12, 1, 0,
            20, 10, 4,
            25, 15, 5,                  // overlaps the previous segment
        ]);
        let mut sink = Diagnostics::new();
        assert!(read_lookup(buf.font_data(), classes(6), &mut sink).is_none());
        assert_eq!(sink.codes(), [codes::BAD_LOOKUP_ORDER]);

        let lenient = ReadOptions {
            strict: false,
            ..classes(6)
        };
        let map = read_map(buf.as_slice(), lenient).unwrap();
        assert_eq!(map.get(&15), Some(&5), "later segments win");
    }

    #[test]
    fn overlapping_coverage_is_bounded() {
        let buf = (0..3).fold(BeBuffer::new().extend([2u16, 6, 3, 12, 1, 6]), |buf, _| {
            buf.extend([0xFFFDu16, 0, 4])
        });
        let lenient = ReadOptions {
            strict: false,
            ..classes(6)
        };
        let mut sink = Diagnostics::new();
        assert!(read_lookup(buf.font_data(), lenient, &mut sink).is_none());
        assert_eq!(sink.codes(), [codes::BAD_LOOKUP_ORDER]);

        // the same segments, sharing one value array
        #[rustfmt::skip]
        let buf = BeBuffer::new().extend([
            4u16,
            6, 2, 12, 1, 0,
            0xFFFD, 0, 30,
            0xFFFD, 0, 30,
            0xFFFF, 0xFFFF, 0,
        ]);
        let mut sink = Diagnostics::new();
        assert!(read_lookup(buf.font_data(), lenient, &mut sink).is_none());
        assert_eq!(sink.codes(), [codes::BAD_LOOKUP_ORDER]);
    }

    #[test]
    fn duplicate_single_glyph() {
        #[rustfmt::skip]
        let buf = BeBuffer::new().extend([
            6u16,
            4, 2, 8, 1, 0,
            12, 4,
            12, 5,
        ]);
        let mut sink = Diagnostics::new();
        assert!(read_lookup(buf.font_data(), classes(6), &mut sink).is_none());
        assert_eq!(sink.codes(), [codes::BAD_LOOKUP_ORDER]);
    }

    #[test]
    fn segment_array_offset_collision() {
        #[rustfmt::skip]
        let buf = BeBuffer::new().extend([
            4u16,
            6, 1, 6, 0, 0,
            11, 10, 12,                 // points at its own record
            0xFFFF, 0xFFFF, 0,
        ]);
        let mut sink = Diagnostics::new();
        assert!(read_lookup(buf.font_data(), classes(0xFFFF), &mut sink).is_none());
        assert_eq!(sink.codes(), [codes::LOOKUP_OFFSET_COLLISION]);
    }

    #[test]
    fn truncated_segments() {
        let buf = BeBuffer::new().extend([2u16, 6, 4, 24, 2, 0, 10, 10, 4]);
        let mut sink = Diagnostics::new();
        assert!(read_lookup(buf.font_data(), classes(6), &mut sink).is_none());
        assert_eq!(sink.codes(), [codes::INSUFFICIENT_BYTES]);
    }

    #[test]
    fn unit_size_mismatch() {
        let buf = BeBuffer::new().extend([6u16, 6, 0, 0, 0, 0]);
        let mut sink = Diagnostics::new();
        assert!(read_lookup(buf.font_data(), classes(6), &mut sink).is_none());
        assert_eq!(sink.codes(), [codes::BAD_UNIT_SIZE]);
    }

    #[test]
    fn simple_respects_glyph_count() {
        let buf = BeBuffer::new().extend([0u16, 4, 5, 0, 0]);
        let options = ReadOptions {
            glyph_count: Some(2),
            ..classes(6)
        };
        let map = read_map(buf.as_slice(), options).unwrap();
        assert_eq!(map.len(), 2);
    }
}
