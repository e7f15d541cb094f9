//! Writing big-endian data with forward offsets.
//!
//! Subtables are written front to back into a single buffer. Offsets to
//! components that have not been written yet are reserved as placeholders
//! and patched in a second pass, once the positions of everything are known.

use std::collections::HashMap;

use font_types::GlyphId16;

use crate::error::BuildError;

/// A type that can be written as big-endian bytes.
pub(crate) trait FontWrite {
    fn write_into(&self, writer: &mut TableWriter);
}

/// A named position in the output.
///
/// A stake is created before the thing it marks is written, so that offsets
/// to it can be emitted early; it is bound to a position by
/// [`TableWriter::place`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Stake(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OffsetLen {
    Offset16 = 2,
    Offset32 = 4,
}

/// The position and type of an offset, along with the stakes it spans
#[derive(Clone, Debug)]
struct OffsetRecord {
    /// the position of the placeholder in the buffer
    pos: usize,
    len: OffsetLen,
    /// the offset is measured from here
    base: Stake,
    target: Stake,
}

#[derive(Debug, Default)]
pub(crate) struct TableWriter {
    bytes: Vec<u8>,
    positions: HashMap<Stake, usize>,
    offsets: Vec<OffsetRecord>,
    next_stake: u32,
}

impl TableWriter {
    /// The number of bytes written so far.
    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn write(&mut self, item: impl FontWrite) {
        item.write_into(self)
    }

    /// Write raw bytes.
    ///
    /// The caller is responsible for ensuring bytes are in big-endian order.
    pub(crate) fn write_slice(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes)
    }

    /// Pad with zeros until the length is a multiple of `alignment`.
    pub(crate) fn align(&mut self, alignment: usize) {
        while self.bytes.len() % alignment != 0 {
            self.bytes.push(0);
        }
    }

    /// Reserve a stake whose position is not yet known.
    pub(crate) fn stake(&mut self) -> Stake {
        let stake = Stake(self.next_stake);
        self.next_stake += 1;
        stake
    }

    /// Reserve a stake bound to the current position.
    pub(crate) fn stake_here(&mut self) -> Stake {
        let stake = self.stake();
        self.place(stake);
        stake
    }

    /// Bind `stake` to the current position.
    pub(crate) fn place(&mut self, stake: Stake) {
        self.positions.insert(stake, self.bytes.len());
    }

    /// Write a placeholder for the offset from `base` to `target`.
    pub(crate) fn write_offset(&mut self, base: Stake, target: Stake, len: OffsetLen) {
        self.offsets.push(OffsetRecord {
            pos: self.bytes.len(),
            len,
            base,
            target,
        });
        self.bytes.extend(std::iter::repeat(0).take(len as usize));
    }

    /// Resolve all offsets, returning the finished bytes.
    pub(crate) fn finish(mut self) -> Result<Vec<u8>, BuildError> {
        for offset in &self.offsets {
            let (Some(base), Some(target)) = (
                self.positions.get(&offset.base),
                self.positions.get(&offset.target),
            ) else {
                // a stake was never placed; only possible through a bug
                return Err(BuildError::OffsetOverflow);
            };
            let resolved = target
                .checked_sub(*base)
                .ok_or(BuildError::OffsetOverflow)?;
            let at = &mut self.bytes[offset.pos..offset.pos + offset.len as usize];
            match offset.len {
                OffsetLen::Offset16 => at.copy_from_slice(
                    &u16::try_from(resolved)
                        .map_err(|_| BuildError::OffsetOverflow)?
                        .to_be_bytes(),
                ),
                OffsetLen::Offset32 => at.copy_from_slice(
                    &u32::try_from(resolved)
                        .map_err(|_| BuildError::OffsetOverflow)?
                        .to_be_bytes(),
                ),
            }
        }
        Ok(self.bytes)
    }
}

macro_rules! write_be_bytes {
    ($ty:ty) => {
        impl FontWrite for $ty {
            #[inline]
            fn write_into(&self, writer: &mut TableWriter) {
                writer.write_slice(&self.to_be_bytes())
            }
        }
    };
}

write_be_bytes!(u8);
write_be_bytes!(u16);
write_be_bytes!(i16);
write_be_bytes!(u32);
write_be_bytes!(GlyphId16);

impl<T: FontWrite> FontWrite for [T] {
    fn write_into(&self, writer: &mut TableWriter) {
        self.iter().for_each(|item| item.write_into(writer))
    }
}

impl<T: FontWrite + ?Sized> FontWrite for &T {
    fn write_into(&self, writer: &mut TableWriter) {
        (*self).write_into(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_offsets() {
        let mut writer = TableWriter::default();
        let start = writer.stake_here();
        let first = writer.stake();
        let second = writer.stake();
        writer.write_offset(start, first, OffsetLen::Offset32);
        writer.write_offset(start, second, OffsetLen::Offset16);
        writer.place(first);
        writer.write(0xAAAAu16);
        writer.place(second);
        writer.write(0xBBu8);
        let bytes = writer.finish().unwrap();
        assert_eq!(bytes, [0, 0, 0, 6, 0, 8, 0xAA, 0xAA, 0xBB]);
    }

    #[test]
    fn relative_to_base() {
        let mut writer = TableWriter::default();
        writer.write(0u32);
        let base = writer.stake_here();
        let target = writer.stake();
        writer.write_offset(base, target, OffsetLen::Offset16);
        writer.place(target);
        assert_eq!(writer.finish().unwrap(), [0, 0, 0, 0, 0, 2]);
    }

    #[test]
    fn overflow() {
        let mut writer = TableWriter::default();
        let base = writer.stake_here();
        let target = writer.stake();
        writer.write_offset(base, target, OffsetLen::Offset16);
        writer.write_slice(&vec![0; 0x10000]);
        writer.place(target);
        assert_eq!(writer.finish(), Err(BuildError::OffsetOverflow));
    }

    #[test]
    fn align() {
        let mut writer = TableWriter::default();
        writer.write(1u8);
        writer.align(4);
        assert_eq!(writer.len(), 4);
        writer.align(4);
        assert_eq!(writer.len(), 4);
    }
}
