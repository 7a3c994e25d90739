//! # Suffix sorting driver
//!
//! [`Suffixer`] sorts all suffixes of an [`EncodedSequence`] under one read mode:
//!
//! 1. A [`Bcktab`] counts the prefix codes of all suffixes.
//! 2. Every suffix is written to its bucket. Suffixes whose prefix runs into a
//!    special symbol go to the end of the bucket, after the regular ones.
//! 3. The regular suffixes of each bucket are sorted beyond the prefix by one of the
//!    [bucket sorters](crate::sort); the special ones only need ordering by the length
//!    of their regular prefix.
//! 4. Suffixes starting with a special symbol follow all buckets in position order,
//!    and the empty suffix comes last.
//!
//! Buckets are independent, so they can be sorted by several worker threads, each
//! with its own sorter instance.

use std::cmp::Reverse;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::alphabet::UNDEFBWTCHAR;
use crate::bcktab::{recommended_prefix_length, scan_prefixes, Bcktab, SuffixPrefix};
use crate::encseq::{with_suffix, EncodedSequence, ReadMode};
use crate::error::{EncseqError, Result, SortError};
use crate::mapspec::{Backing, FieldBuffer, FieldData, FieldKind, MappedFile, Mapspec};
use crate::sort::{
    BucketSort, BucketSorter, IgnoreUnsorted, UnsortedRangeHandler, UnsortedRanges,
    DEFAULT_TRIE_THRESHOLD,
};

/// File extension of a persisted suffix table
pub const SUFTAB_SUFFIX: &str = "suf";

/// File extension of a persisted LCP table
pub const LCPTAB_SUFFIX: &str = "lcp";

/// Current magic number: "SUF1" in ASCII (in little-endian byte order)
#[allow(clippy::unreadable_literal)]
const MAGIC: u32 = 0x31465553;

/// Current format version of the table layout
const FORMAT: u8 = 1;

/// Size of the table header in bytes
pub const SIZE_HEADER: usize = 32;

const KIND_SUFTAB: u8 = 1;
const KIND_LCPTAB: u8 = 2;

/// Settings of a suffix sorting run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuffixerConfig {
    prefixlength: Option<usize>,
    readmode: ReadMode,
    maxdepth: Option<usize>,
    bucket_sort: BucketSort,
    trie_threshold: usize,
    threads: usize,
}
impl Default for SuffixerConfig {
    fn default() -> Self {
        Self {
            prefixlength: None,
            readmode: ReadMode::Forward,
            maxdepth: None,
            bucket_sort: BucketSort::Auto,
            trie_threshold: DEFAULT_TRIE_THRESHOLD,
            threads: 1,
        }
    }
}
impl SuffixerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of symbols of the bucket codes; derived from the input if unset
    #[must_use]
    pub fn prefixlength(mut self, prefixlength: usize) -> Self {
        self.prefixlength = Some(prefixlength);
        self
    }

    #[must_use]
    pub fn readmode(mut self, readmode: ReadMode) -> Self {
        self.readmode = readmode;
        self
    }

    /// Number of symbols after which suffixes are left unsorted
    #[must_use]
    pub fn maxdepth(mut self, maxdepth: usize) -> Self {
        self.maxdepth = Some(maxdepth);
        self
    }

    #[must_use]
    pub fn bucket_sort(mut self, bucket_sort: BucketSort) -> Self {
        self.bucket_sort = bucket_sort;
        self
    }

    /// Largest bucket handed to the blind trie by [`BucketSort::Auto`]
    #[must_use]
    pub fn trie_threshold(mut self, trie_threshold: usize) -> Self {
        self.trie_threshold = trie_threshold;
        self
    }

    /// Number of worker threads; 0 uses all available cores
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }
}

/// Suffix sorter over one encoded sequence
#[derive(Debug, Clone, Copy)]
pub struct Suffixer<'a> {
    encseq: &'a EncodedSequence,
    config: SuffixerConfig,
    prefixlength: usize,
    maxdepth: usize,
    threads: usize,
}
impl<'a> Suffixer<'a> {
    /// Validates `config` against `encseq`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * A complement read mode is requested for an alphabet without complement
    /// * A two-bit sorter is forced on an alphabet that is not of size four
    /// * The depth bound is smaller than the prefix length
    pub fn new(encseq: &'a EncodedSequence, config: SuffixerConfig) -> Result<Self> {
        let alphabet = encseq.alphabet();
        if config.readmode.is_complement() && !alphabet.has_complement() {
            return Err(EncseqError::NoComplement(config.readmode.name()).into());
        }
        if matches!(config.bucket_sort, BucketSort::Radix | BucketSort::ShortRead)
            && !alphabet.is_twobit()
        {
            return Err(SortError::RequiresTwobit(config.bucket_sort.name()).into());
        }
        let prefixlength = config.prefixlength.unwrap_or_else(|| {
            recommended_prefix_length(alphabet.num_of_chars(), encseq.total_length())
        });
        let maxdepth = config.maxdepth.unwrap_or(usize::MAX);
        if maxdepth < prefixlength {
            return Err(SortError::MaxDepthTooSmall {
                maxdepth,
                prefixlength,
            }
            .into());
        }
        let threads = if config.threads == 0 {
            num_cpus::get()
        } else {
            config.threads
        };
        Ok(Self {
            encseq,
            config,
            prefixlength,
            maxdepth,
            threads,
        })
    }

    #[must_use]
    pub fn prefixlength(&self) -> usize {
        self.prefixlength
    }

    #[must_use]
    pub fn maxdepth(&self) -> Option<usize> {
        self.config.maxdepth
    }

    /// Sorts all suffixes, dropping unsorted ranges
    pub fn sort(&self) -> Result<SuffixArray> {
        self.sort_with(&mut IgnoreUnsorted)
    }

    /// Sorts all suffixes and hands runs tied at the depth bound to `handler`
    ///
    /// The runs are reported in suffix table order after sorting finished.
    pub fn sort_with<H: UnsortedRangeHandler>(&self, handler: &mut H) -> Result<SuffixArray> {
        let total = self.encseq.total_length();
        let mode = self.config.readmode;
        let bcktab = Bcktab::build(self.encseq, self.prefixlength, mode)?;
        log::info!(
            "sorting {} suffixes ({}, prefix length {}, {} threads, maximum bucket size {})",
            total + 1,
            mode,
            self.prefixlength,
            self.threads,
            bcktab.max_bucket_size()
        );

        let mut suftab = vec![0usize; total + 1];
        let mut lcptab = vec![0usize; total + 1];
        self.insert_suffixes(&bcktab, &mut suftab);
        suftab[total] = total;

        let chunks = self.sort_buckets(&bcktab, &mut suftab, &mut lcptab)?;
        self.boundary_lcps(&bcktab, &suftab, &mut lcptab);
        for ranges in &chunks {
            ranges.replay(handler)?;
        }
        log::debug!(
            "sorted {} suffixes, {} unsorted ranges",
            total + 1,
            chunks.iter().map(|c| c.ranges.len()).sum::<usize>()
        );
        Ok(SuffixArray {
            suftab,
            lcptab,
            bcktab,
            readmode: mode,
        })
    }

    /// Writes every suffix to its bucket, in position order within each part
    fn insert_suffixes(&self, bcktab: &Bcktab, suftab: &mut [usize]) {
        let numofallcodes = bcktab.numofallcodes();
        let mut regular: Vec<usize> = (0..numofallcodes).map(|c| bcktab.leftborder(c)).collect();
        let mut special: Vec<usize> = (0..numofallcodes)
            .map(|c| {
                let bounds = bcktab.calc_bucket_boundaries(c);
                bounds.left + bounds.nonspecials
            })
            .collect();
        let mut specialstart = bcktab.num_of_bucketed();
        scan_prefixes(
            self.encseq,
            self.config.readmode,
            bcktab.code_tables(),
            |pos, prefix| match prefix {
                SuffixPrefix::Full(code) => {
                    suftab[regular[code]] = pos;
                    regular[code] += 1;
                }
                SuffixPrefix::Special { code, .. } => {
                    suftab[special[code]] = pos;
                    special[code] += 1;
                }
                SuffixPrefix::SpecialStart => {
                    suftab[specialstart] = pos;
                    specialstart += 1;
                }
            },
        );
    }

    /// Code ranges of about equal suffix counts, one per worker
    fn chunks(&self, bcktab: &Bcktab) -> Vec<Range<usize>> {
        let numofallcodes = bcktab.numofallcodes();
        let bucketed = bcktab.num_of_bucketed();
        let per_thread = bucketed.div_ceil(self.threads).max(1);
        let mut chunks = Vec::with_capacity(self.threads);
        let mut start = 0;
        for tid in 1..=self.threads {
            let end = if tid == self.threads {
                numofallcodes
            } else {
                let target = (tid * per_thread).min(bucketed);
                bcktab
                    .find_first_larger(target.saturating_sub(1))
                    .clamp(start, numofallcodes)
            };
            chunks.push(start..end);
            start = end;
        }
        chunks
    }

    fn sort_buckets(
        &self,
        bcktab: &Bcktab,
        suftab: &mut [usize],
        lcptab: &mut [usize],
    ) -> Result<Vec<UnsortedRanges>> {
        let bucketed = bcktab.num_of_bucketed();
        if self.threads <= 1 {
            let ranges = self.sort_chunk(
                bcktab,
                0..bcktab.numofallcodes(),
                &mut suftab[..bucketed],
                &mut lcptab[..bucketed],
            )?;
            return Ok(vec![ranges]);
        }
        let chunks = self.chunks(bcktab);
        std::thread::scope(|scope| {
            let mut suf_rest = &mut suftab[..bucketed];
            let mut lcp_rest = &mut lcptab[..bucketed];
            let mut handles = Vec::with_capacity(chunks.len());
            for codes in chunks {
                let width = bcktab.leftborder(codes.end) - bcktab.leftborder(codes.start);
                let (suf, rest) = std::mem::take(&mut suf_rest).split_at_mut(width);
                suf_rest = rest;
                let (lcp, rest) = std::mem::take(&mut lcp_rest).split_at_mut(width);
                lcp_rest = rest;
                handles.push(scope.spawn(move || self.sort_chunk(bcktab, codes, suf, lcp)));
            }
            let mut collected = Vec::with_capacity(handles.len());
            for (tid, handle) in handles.into_iter().enumerate() {
                let ranges = handle.join().map_err(|_| SortError::WorkerPanic(tid))??;
                collected.push(ranges);
            }
            Ok(collected)
        })
    }

    /// Sorts the buckets `codes`, whose suffixes occupy `suftab` and `lcptab`
    fn sort_chunk(
        &self,
        bcktab: &Bcktab,
        codes: Range<usize>,
        suftab: &mut [usize],
        lcptab: &mut [usize],
    ) -> Result<UnsortedRanges> {
        let mode = self.config.readmode;
        let k = self.prefixlength;
        let base = bcktab.leftborder(codes.start);
        let mut sorter = BucketSorter::new(self.config.bucket_sort, self.config.trie_threshold);
        let mut ranges = UnsortedRanges::default();
        let mut speciallcps = Vec::new();
        for code in codes.clone() {
            let bounds = bcktab.calc_bucket_boundaries(code);
            let regular = bounds.left - base..bounds.left - base + bounds.nonspecials;
            sorter.sort_bucket(
                self.encseq,
                mode,
                &mut suftab[regular.clone()],
                &mut lcptab[regular.clone()],
                bounds.left,
                k,
                self.maxdepth,
                &mut ranges,
            )?;
            if bounds.specials > 0 {
                let specials = regular.end..regular.end + bounds.specials;
                // longer regular prefixes first, then by position
                suftab[specials.clone()]
                    .sort_by_cached_key(|&pos| Reverse(self.encseq.special_offset(pos, k, mode)));
                bcktab.special_lcps(code, &mut speciallcps);
                lcptab[specials].copy_from_slice(&speciallcps);
            }
        }
        log::debug!(
            "sorted buckets {}..{} ({} suffixes)",
            codes.start,
            codes.end,
            suftab.len()
        );
        Ok(ranges)
    }

    /// LCP values of the first suffix of each bucket with its predecessor
    fn boundary_lcps(&self, bcktab: &Bcktab, suftab: &[usize], lcptab: &mut [usize]) {
        let mode = self.config.readmode;
        for code in 0..bcktab.numofallcodes() {
            let range = bcktab.bucket_range(code);
            if range.is_empty() || range.start == 0 {
                continue;
            }
            let (_, lcp) = self.encseq.compare_suffixes(
                suftab[range.start - 1],
                suftab[range.start],
                mode,
                0,
                self.prefixlength,
            );
            lcptab[range.start] = lcp;
        }
    }
}

/// Named output streams of a sorted suffix array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Suffix start positions
    Suftab,
    /// Symbol preceding each suffix, [`UNDEFBWTCHAR`] for the suffix at position 0
    Bwttab,
    /// Common prefix length with the preceding suffix
    Lcptab,
}

/// Sorted suffixes of an encoded sequence with their LCP values
///
/// Both tables have `total_length + 1` entries; the last suffix is the empty one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixArray {
    suftab: Vec<usize>,
    lcptab: Vec<usize>,
    bcktab: Bcktab,
    readmode: ReadMode,
}
impl SuffixArray {
    #[must_use]
    pub fn suftab(&self) -> &[usize] {
        &self.suftab
    }

    #[must_use]
    pub fn lcptab(&self) -> &[usize] {
        &self.lcptab
    }

    #[must_use]
    pub fn bcktab(&self) -> &Bcktab {
        &self.bcktab
    }

    #[must_use]
    pub fn readmode(&self) -> ReadMode {
        self.readmode
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.suftab.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.suftab.is_empty()
    }

    #[must_use]
    pub fn total_length(&self) -> usize {
        self.suftab.len().saturating_sub(1)
    }

    /// Symbol preceding the suffix at table position `idx`
    #[must_use]
    pub fn bwt_symbol(&self, encseq: &EncodedSequence, idx: usize) -> u8 {
        match self.suftab[idx] {
            0 => UNDEFBWTCHAR,
            pos => encseq.get(pos - 1, self.readmode),
        }
    }

    /// Pull reader over one of the output streams, `page_size` values at a time
    #[must_use]
    pub fn stream<'a>(
        &'a self,
        encseq: &'a EncodedSequence,
        stream: Stream,
        page_size: usize,
    ) -> PageReader<'a> {
        PageReader {
            array: self,
            encseq,
            stream,
            page_size: page_size.max(1),
            cursor: 0,
            page: Vec::with_capacity(page_size.max(1)),
        }
    }

    /// Writes `<indexname>.suf`, `<indexname>.lcp` and `<indexname>.bck`
    pub fn flush<P: AsRef<Path>>(&self, indexname: P) -> Result<()> {
        let indexname = indexname.as_ref();
        self.write_table(with_suffix(indexname, SUFTAB_SUFFIX), KIND_SUFTAB, &self.suftab)?;
        self.write_table(with_suffix(indexname, LCPTAB_SUFFIX), KIND_LCPTAB, &self.lcptab)?;
        self.bcktab.flush(indexname)?;
        log::debug!("wrote suffix array of {} entries to {}", self.len(), indexname.display());
        Ok(())
    }

    /// Loads the tables written by [`SuffixArray::flush`]
    pub fn load<P: AsRef<Path>>(indexname: P) -> Result<Self> {
        let indexname = indexname.as_ref();
        let (readmode, suftab) = read_table(with_suffix(indexname, SUFTAB_SUFFIX), KIND_SUFTAB)?;
        let (lcpmode, lcptab) = read_table(with_suffix(indexname, LCPTAB_SUFFIX), KIND_LCPTAB)?;
        if lcpmode != readmode {
            return Err(SortError::InvalidReadMode(lcpmode.tag()).into());
        }
        if lcptab.len() != suftab.len() {
            return Err(SortError::InvalidSize(lcptab.len(), suftab.len()).into());
        }
        let bcktab = Bcktab::load(indexname)?;
        if bcktab.totallength() + 1 != suftab.len() {
            return Err(SortError::InvalidSize(bcktab.totallength() + 1, suftab.len()).into());
        }
        Ok(Self {
            suftab,
            lcptab,
            bcktab,
            readmode,
        })
    }

    fn header_bytes(&self, kind: u8) -> [u8; SIZE_HEADER] {
        let mut buffer = [0u8; SIZE_HEADER];
        LittleEndian::write_u32(&mut buffer[0..4], MAGIC);
        buffer[4] = FORMAT;
        buffer[5] = kind;
        buffer[6] = self.readmode.tag();
        LittleEndian::write_u64(&mut buffer[8..16], self.bcktab.prefixlength() as u64);
        LittleEndian::write_u64(&mut buffer[16..24], self.total_length() as u64);
        buffer
    }

    fn write_table<P: AsRef<Path>>(&self, path: P, kind: u8, values: &[usize]) -> Result<()> {
        let (spec, expected) = table_layout(values.len());
        let header = self.header_bytes(kind);
        let words: Vec<u64> = values.iter().map(|&v| v as u64).collect();
        let mut writer = File::create(path).map(BufWriter::new)?;
        spec.write(
            &mut writer,
            &[FieldData::Uchar(&header), FieldData::U64(&words)],
            expected,
        )?;
        writer.flush()?;
        Ok(())
    }
}

fn table_layout(entries: usize) -> (Mapspec, usize) {
    let mut spec = Mapspec::new();
    spec.add("header", FieldKind::Uchar, SIZE_HEADER)
        .add("table", FieldKind::U64, entries);
    (spec, SIZE_HEADER + 8 * entries)
}

fn read_table<P: AsRef<Path>>(path: P, kind: u8) -> Result<(ReadMode, Vec<usize>)> {
    let backing = Backing::Mapped(MappedFile::open(path)?);
    let bytes = backing.as_bytes();
    if bytes.len() < SIZE_HEADER {
        return Err(SortError::InvalidSize(bytes.len(), SIZE_HEADER).into());
    }
    let magic = LittleEndian::read_u32(&bytes[0..4]);
    if magic != MAGIC {
        return Err(SortError::InvalidMagicNumber(magic).into());
    }
    if bytes[4] != FORMAT {
        return Err(SortError::InvalidFormatVersion(bytes[4]).into());
    }
    if bytes[5] != kind {
        return Err(SortError::InvalidFormatVersion(bytes[5]).into());
    }
    let Some(readmode) = ReadMode::from_tag(bytes[6]) else {
        return Err(SortError::InvalidReadMode(bytes[6]).into());
    };
    let entries = LittleEndian::read_u64(&bytes[16..24]) as usize + 1;
    let (spec, expected) = table_layout(entries);
    let buffer = FieldBuffer::new(backing, &spec, expected)?;
    let table = buffer.u64s(1).iter().map(|&v| v as usize).collect();
    Ok((readmode, table))
}

/// Pull-style page reader over a [`Stream`]
#[derive(Debug)]
pub struct PageReader<'a> {
    array: &'a SuffixArray,
    encseq: &'a EncodedSequence,
    stream: Stream,
    page_size: usize,
    cursor: usize,
    page: Vec<u64>,
}
impl PageReader<'_> {
    /// The next page of values, or `None` once the stream is exhausted
    pub fn next_page(&mut self) -> Option<&[u64]> {
        let len = self.array.len();
        if self.cursor >= len {
            return None;
        }
        let range = self.cursor..(self.cursor + self.page_size).min(len);
        self.page.clear();
        match self.stream {
            Stream::Suftab => self
                .page
                .extend(self.array.suftab[range.clone()].iter().map(|&v| v as u64)),
            Stream::Lcptab => self
                .page
                .extend(self.array.lcptab[range.clone()].iter().map(|&v| v as u64)),
            Stream::Bwttab => self.page.extend(
                range
                    .clone()
                    .map(|idx| u64::from(self.array.bwt_symbol(self.encseq, idx))),
            ),
        }
        self.cursor = range.end;
        Some(&self.page)
    }

    /// Number of values not yet read
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.array.len().saturating_sub(self.cursor)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::sort::testing::{naive_sort, random_dna};
    use crate::sort::UnsortedRange;
    use crate::{Alphabet, EncseqBuilder};
    use anyhow::Result;

    fn scenario() -> Result<EncodedSequence> {
        let mut builder = EncseqBuilder::new(Alphabet::dna());
        builder.add_sequence(b"", b"ACGTNACGT")?;
        builder.add_sequence(b"", b"ACGT")?;
        Ok(builder.build()?)
    }

    fn check_against_naive(
        encseq: &EncodedSequence,
        array: &SuffixArray,
        maxdepth: usize,
    ) {
        let all: Vec<usize> = (0..=encseq.total_length()).collect();
        let (expected, expected_lcps) = naive_sort(encseq, array.readmode(), &all, maxdepth);
        assert_eq!(array.suftab(), expected.as_slice());
        assert_eq!(array.lcptab()[1..], expected_lcps[1..]);
        assert_eq!(array.lcptab()[0], 0);
    }

    #[test]
    fn test_scenario() -> Result<()> {
        let encseq = scenario()?;
        let suffixer = Suffixer::new(&encseq, SuffixerConfig::new().prefixlength(2))?;
        let array = suffixer.sort()?;
        check_against_naive(&encseq, &array, usize::MAX);

        let ac = array.bcktab().bucket_range(1);
        let mut bucket = array.suftab()[ac].to_vec();
        assert_eq!(bucket, vec![0, 5, 10]);
        bucket.sort_unstable();
        assert_eq!(bucket, vec![0, 5, 10]);
        // special-start suffixes then the empty suffix
        assert_eq!(array.suftab()[12..], [4, 9, 14]);
        Ok(())
    }

    #[test]
    fn test_random_all_modes_and_sorters() -> Result<()> {
        let encseq = random_dna(41, 2500)?;
        for mode in ReadMode::ALL {
            for kind in [
                BucketSort::Auto,
                BucketSort::BlindTrie,
                BucketSort::Radix,
                BucketSort::ShortRead,
            ] {
                let config = SuffixerConfig::new()
                    .readmode(mode)
                    .bucket_sort(kind)
                    .trie_threshold(8)
                    .prefixlength(3);
                let array = Suffixer::new(&encseq, config)?.sort()?;
                check_against_naive(&encseq, &array, usize::MAX);
            }
        }
        Ok(())
    }

    #[test]
    fn test_threads_agree() -> Result<()> {
        let encseq = random_dna(43, 3000)?;
        let single = Suffixer::new(&encseq, SuffixerConfig::new().prefixlength(4))?.sort()?;
        for threads in [2, 3, 7, 0] {
            let config = SuffixerConfig::new().prefixlength(4).threads(threads);
            let array = Suffixer::new(&encseq, config)?.sort()?;
            assert_eq!(array, single, "{threads} threads");
        }
        check_against_naive(&encseq, &single, usize::MAX);
        Ok(())
    }

    #[test]
    fn test_depth_bound() -> Result<()> {
        let encseq = random_dna(47, 2000)?;
        for (prefixlength, maxdepth) in [(2, 2), (3, 5), (4, 9)] {
            for threads in [1, 4] {
                let config = SuffixerConfig::new()
                    .prefixlength(prefixlength)
                    .maxdepth(maxdepth)
                    .threads(threads);
                let mut ranges = UnsortedRanges::default();
                let array = Suffixer::new(&encseq, config)?.sort_with(&mut ranges)?;
                check_against_naive(&encseq, &array, maxdepth);

                let lcps = array.lcptab();
                let mut expected = Vec::new();
                let mut i = 1;
                while i < lcps.len() {
                    if lcps[i] == maxdepth {
                        let left = i - 1;
                        while i < lcps.len() && lcps[i] == maxdepth {
                            i += 1;
                        }
                        expected.push(UnsortedRange {
                            left,
                            width: i - left,
                            depth: maxdepth,
                        });
                    } else {
                        i += 1;
                    }
                }
                assert_eq!(ranges.ranges, expected);
            }
        }
        Ok(())
    }

    #[test]
    fn test_protein() -> Result<()> {
        let mut builder = EncseqBuilder::new(Alphabet::protein());
        builder.add_sequence(b"", b"MKVLAAGIVALLLAAGCSSXMKVLAAG")?;
        builder.add_sequence(b"", b"GCSSMKVL")?;
        builder.add_sequence(b"", b"LLLAAGC")?;
        let encseq = builder.build()?;
        let array = Suffixer::new(&encseq, SuffixerConfig::new().prefixlength(2))?.sort()?;
        check_against_naive(&encseq, &array, usize::MAX);

        assert!(matches!(
            Suffixer::new(
                &encseq,
                SuffixerConfig::new().readmode(ReadMode::Complement)
            ),
            Err(crate::Error::EncseqError(EncseqError::NoComplement(_)))
        ));
        assert!(matches!(
            Suffixer::new(&encseq, SuffixerConfig::new().bucket_sort(BucketSort::Radix)),
            Err(crate::Error::SortError(SortError::RequiresTwobit(_)))
        ));
        assert!(matches!(
            Suffixer::new(
                &encseq,
                SuffixerConfig::new().prefixlength(3).maxdepth(2)
            ),
            Err(crate::Error::SortError(SortError::MaxDepthTooSmall { .. }))
        ));
        Ok(())
    }

    #[test]
    fn test_short_reads() -> Result<()> {
        let mut builder = EncseqBuilder::new(Alphabet::dna());
        for read in [
            b"ACGTACGTTTGACCA", b"ACGTACGTTTGACCT", b"TTGACCAACGTACGT", b"ACGTNCGTTTGACCA",
        ] {
            for _ in 0..5 {
                builder.add_sequence(b"", read)?;
            }
        }
        let encseq = builder.build()?;
        let config = SuffixerConfig::new().prefixlength(2).trie_threshold(4);
        let array = Suffixer::new(&encseq, config)?.sort()?;
        check_against_naive(&encseq, &array, usize::MAX);
        Ok(())
    }

    #[test]
    fn test_streams() -> Result<()> {
        let encseq = scenario()?;
        let array = Suffixer::new(&encseq, SuffixerConfig::new().prefixlength(2))?.sort()?;

        let mut reader = array.stream(&encseq, Stream::Suftab, 4);
        let mut suftab = Vec::new();
        let mut pages = 0;
        while let Some(page) = reader.next_page() {
            assert!(page.len() <= 4);
            suftab.extend(page.iter().map(|&v| v as usize));
            pages += 1;
        }
        assert_eq!(pages, 4);
        assert_eq!(reader.remaining(), 0);
        assert_eq!(suftab, array.suftab());

        let mut reader = array.stream(&encseq, Stream::Lcptab, 100);
        assert_eq!(reader.remaining(), 15);
        let lcps: Vec<usize> = reader
            .next_page()
            .map(|page| page.iter().map(|&v| v as usize).collect())
            .unwrap_or_default();
        assert_eq!(lcps, array.lcptab());
        assert!(reader.next_page().is_none());

        let mut reader = array.stream(&encseq, Stream::Bwttab, 5);
        let mut bwt = Vec::new();
        while let Some(page) = reader.next_page() {
            bwt.extend(page.iter().map(|&v| v as u8));
        }
        for (idx, &symbol) in bwt.iter().enumerate() {
            let pos = array.suftab()[idx];
            if pos == 0 {
                assert_eq!(symbol, UNDEFBWTCHAR);
            } else {
                assert_eq!(symbol, encseq.get(pos - 1, ReadMode::Forward));
            }
        }
        assert_eq!(bwt.iter().filter(|&&s| s == UNDEFBWTCHAR).count(), 1);
        Ok(())
    }

    #[test]
    fn test_flush_and_load() -> Result<()> {
        let encseq = random_dna(53, 700)?;
        let config = SuffixerConfig::new()
            .prefixlength(3)
            .readmode(ReadMode::ReverseComplement);
        let array = Suffixer::new(&encseq, config)?.sort()?;
        let dir = tempfile::tempdir()?;
        let indexname = dir.path().join("index");
        array.flush(&indexname)?;
        assert!(with_suffix(&indexname, SUFTAB_SUFFIX).exists());
        assert!(with_suffix(&indexname, LCPTAB_SUFFIX).exists());
        let loaded = SuffixArray::load(&indexname)?;
        assert_eq!(loaded, array);
        assert_eq!(loaded.readmode(), ReadMode::ReverseComplement);

        std::fs::write(with_suffix(&indexname, LCPTAB_SUFFIX), b"garbage")?;
        assert!(SuffixArray::load(&indexname).is_err());
        Ok(())
    }
}
