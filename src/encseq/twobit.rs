//! Two-bit packed windows
//!
//! Symbols of a 4-letter alphabet are packed 32 per `u64`, the first symbol in the two
//! most significant bits. A [`TwobitWindow`] holds the 32 symbols starting at some
//! position together with the number of leading symbols that are not special, which
//! is all a suffix comparison needs to decide or to advance by a full word.

use std::cmp::Ordering;

/// Number of symbols held by one packed word
pub const UNITS_IN_TWOBIT: usize = 32;

/// Up to 32 packed symbols starting at `position`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TwobitWindow {
    /// Packed symbols, first symbol most significant; only the first `units` are meaningful
    pub tbe: u64,
    /// Number of leading symbols before the first special symbol or the sequence end
    pub units: u32,
    /// Start position of the window in read-mode coordinates
    pub position: usize,
}

/// Outcome of comparing one pair of windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WindowCmp {
    /// The order is decided (or the depth bound was hit, `Equal`) after `common` symbols
    Decided(Ordering, usize),
    /// All 32 symbols agree and none is special
    Continue,
}

/// Number of units needed to pack `totallength` symbols
#[must_use]
pub fn units_of_twobit(totallength: usize) -> usize {
    totallength.div_ceil(UNITS_IN_TWOBIT)
}

/// The symbol stored at `pos`
#[inline]
pub(crate) fn twobit_symbol(words: &[u64], pos: usize) -> u8 {
    let shift = 2 * (UNITS_IN_TWOBIT - 1 - pos % UNITS_IN_TWOBIT);
    ((words[pos / UNITS_IN_TWOBIT] >> shift) & 3) as u8
}

/// Stores `code` at `pos`; the slot must be zero
#[inline]
pub(crate) fn twobit_store(words: &mut [u64], pos: usize, code: u8) {
    let shift = 2 * (UNITS_IN_TWOBIT - 1 - pos % UNITS_IN_TWOBIT);
    words[pos / UNITS_IN_TWOBIT] |= u64::from(code & 3) << shift;
}

/// The 32 stored symbols starting at `pos`, reading across a word boundary if needed
#[inline]
pub(crate) fn twobit_word_at(words: &[u64], pos: usize) -> u64 {
    let unit = pos / UNITS_IN_TWOBIT;
    let rem = pos % UNITS_IN_TWOBIT;
    let first = words.get(unit).copied().unwrap_or(0);
    if rem == 0 {
        first
    } else {
        let second = words.get(unit + 1).copied().unwrap_or(0);
        (first << (2 * rem)) | (second >> (2 * (UNITS_IN_TWOBIT - rem)))
    }
}

/// The 32 stored symbols ending at `pos` and read backwards, `pos` most significant
#[inline]
pub(crate) fn twobit_word_before(words: &[u64], pos: usize) -> u64 {
    let word = if pos + 1 >= UNITS_IN_TWOBIT {
        twobit_word_at(words, pos + 1 - UNITS_IN_TWOBIT)
    } else {
        twobit_word_at(words, 0) >> (2 * (UNITS_IN_TWOBIT - 1 - pos))
    };
    reverse_twobit(word)
}

/// Reverses the order of the 32 two-bit groups of a word
#[inline]
#[must_use]
pub fn reverse_twobit(mut word: u64) -> u64 {
    word = ((word >> 2) & 0x3333_3333_3333_3333) | ((word & 0x3333_3333_3333_3333) << 2);
    word = ((word >> 4) & 0x0F0F_0F0F_0F0F_0F0F) | ((word & 0x0F0F_0F0F_0F0F_0F0F) << 4);
    word.swap_bytes()
}

/// Mask selecting the first `units` symbols of a word
#[inline]
fn prefix_mask(units: usize) -> u64 {
    match units {
        0 => 0,
        u if u >= UNITS_IN_TWOBIT => u64::MAX,
        u => !(u64::MAX >> (2 * u)),
    }
}

/// Number of leading symbols two words share
#[inline]
fn common_units(a: u64, b: u64) -> usize {
    ((a ^ b).leading_zeros() / 2) as usize
}

/// Compares two windows whose suffixes agree on everything before them
///
/// Returns the order and the number of symbols they share. If one window reaches a
/// special symbol (or the end) first while the other continues, the shorter one is
/// greater; if both reach one at the same offset, the earlier position is smaller.
#[must_use]
pub fn compare_twobit(a: &TwobitWindow, b: &TwobitWindow) -> (Ordering, usize) {
    match compare_window_step(a, b, UNITS_IN_TWOBIT) {
        WindowCmp::Decided(order, common) => (order, common),
        WindowCmp::Continue => (Ordering::Equal, UNITS_IN_TWOBIT),
    }
}

/// Compares two windows, looking at no more than `limit` symbols
///
/// A result of `Decided(Equal, limit)` means the depth bound was reached with all
/// examined symbols equal.
pub(crate) fn compare_window_step(a: &TwobitWindow, b: &TwobitWindow, limit: usize) -> WindowCmp {
    let aunits = a.units as usize;
    let bunits = b.units as usize;
    let minunits = aunits.min(bunits).min(limit);
    let mask = prefix_mask(minunits);
    let x = a.tbe & mask;
    let y = b.tbe & mask;
    if x != y {
        return WindowCmp::Decided(x.cmp(&y), common_units(x, y));
    }
    if minunits == limit {
        if limit >= UNITS_IN_TWOBIT {
            return WindowCmp::Continue;
        }
        return WindowCmp::Decided(Ordering::Equal, limit);
    }
    // minunits < limit: at least one side stops at a special symbol within the window
    let order = match aunits.cmp(&bunits) {
        Ordering::Less => Ordering::Greater,
        Ordering::Greater => Ordering::Less,
        Ordering::Equal => a.position.cmp(&b.position),
    };
    WindowCmp::Decided(order, minunits)
}
