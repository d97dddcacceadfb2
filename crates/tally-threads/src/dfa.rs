//! Counting constrained digit strings with finite-automaton transition
//! matrices.
//!
//! Several side threads only admit counts whose digit strings satisfy a
//! property like "every digit that appears, appears at least twice". To map
//! such a count to its position we need to know, for an arbitrary prefix,
//! how many valid strings precede it in length-then-lex order. The automata
//! here track a multiset summary of the string seen so far; the number of
//! valid completions of a prefix is an entry sum in a power of the one-step
//! transition matrix. Powers are computed on demand and kept for the life of
//! the automaton.
//!
//! With ten symbols every entry fits comfortably in a `u128` for word
//! lengths beyond thirty digits; all arithmetic is checked and overflow is
//! reported rather than wrapped.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use snafu::Snafu;

use crate::ALPHANUMERIC;

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum EnumerateError {
    #[snafu(display("enumeration exceeded 128-bit arithmetic"))]
    Overflow,
    #[snafu(display("no word of this length family holds position {position}"))]
    NoSuchPosition { position: u128 },
}

pub type EnumerateResult<T> = std::result::Result<T, EnumerateError>;

fn checked_add(a: u128, b: u128) -> EnumerateResult<u128> {
    a.checked_add(b).ok_or(EnumerateError::Overflow)
}

fn checked_mul(a: u128, b: u128) -> EnumerateResult<u128> {
    a.checked_mul(b).ok_or(EnumerateError::Overflow)
}

pub fn binomial(n: usize, k: usize) -> u128 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut result: u128 = 1;
    for i in 0..k {
        result = result * (n - i) as u128 / (i + 1) as u128;
    }
    result
}

/// A square matrix of non-negative counts in compressed sparse row form.
///
/// Rows are the access axis: enumeration reads "from this state, how many
/// accepted states after m more symbols", which is a row slice of the m-th
/// power.
#[derive(Debug, Clone)]
pub struct SparseMatrix {
    size: usize,
    row_ptr: Vec<usize>,
    cols: Vec<usize>,
    vals: Vec<u128>,
}

impl SparseMatrix {
    pub fn identity(size: usize) -> Self {
        Self {
            size,
            row_ptr: (0..=size).collect(),
            cols: (0..size).collect(),
            vals: vec![1; size],
        }
    }

    /// Build from (row, col) → value triplets; duplicate coordinates are
    /// summed.
    pub fn from_triplets(size: usize, triplets: impl IntoIterator<Item = (usize, usize, u128)>) -> Self {
        let mut rows: Vec<BTreeMap<usize, u128>> = vec![BTreeMap::new(); size];
        for (row, col, val) in triplets {
            *rows[row].entry(col).or_insert(0) += val;
        }
        let mut row_ptr = Vec::with_capacity(size + 1);
        let mut cols = Vec::new();
        let mut vals = Vec::new();
        row_ptr.push(0);
        for row in rows {
            for (col, val) in row {
                if val != 0 {
                    cols.push(col);
                    vals.push(val);
                }
            }
            row_ptr.push(cols.len());
        }
        Self {
            size,
            row_ptr,
            cols,
            vals,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, u128)> + '_ {
        let range = self.row_ptr[row]..self.row_ptr[row + 1];
        self.cols[range.clone()]
            .iter()
            .copied()
            .zip(self.vals[range].iter().copied())
    }

    pub fn multiply(&self, other: &SparseMatrix) -> EnumerateResult<SparseMatrix> {
        let mut scratch: Vec<u128> = vec![0; self.size];
        let mut touched: Vec<usize> = Vec::new();
        let mut row_ptr = Vec::with_capacity(self.size + 1);
        let mut cols = Vec::new();
        let mut vals = Vec::new();
        row_ptr.push(0);
        for row in 0..self.size {
            for (mid, left) in self.row(row) {
                for (col, right) in other.row(mid) {
                    if scratch[col] == 0 {
                        touched.push(col);
                    }
                    scratch[col] = checked_add(scratch[col], checked_mul(left, right)?)?;
                }
            }
            touched.sort_unstable();
            for &col in &touched {
                cols.push(col);
                vals.push(scratch[col]);
                scratch[col] = 0;
            }
            touched.clear();
            row_ptr.push(cols.len());
        }
        Ok(SparseMatrix {
            size: self.size,
            row_ptr,
            cols,
            vals,
        })
    }

    /// Sum of the row entries whose column is in the sorted `accepting`
    /// list.
    pub fn row_sum(&self, row: usize, accepting: &[usize]) -> EnumerateResult<u128> {
        let mut total: u128 = 0;
        for (col, val) in self.row(row) {
            if accepting.binary_search(&col).is_ok() {
                total = checked_add(total, val)?;
            }
        }
        Ok(total)
    }
}

/// The state encodings recognised by the enumerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DfaKind {
    /// Per-digit occurrence counts capped at `n_states - 1`; size
    /// `n_states^n`. With two states per digit this is the presence bitmask.
    Histogram { n_states: u32 },
    /// Occurrence histogram collapsed to (absent, once, twice-or-more)
    /// totals; size `C(n + 2, 2)`. Equivalent to the three-state histogram
    /// an order of magnitude smaller.
    Compressed,
    /// Remembers only the last symbol plus a failure flag; size `n + 2`.
    LastSymbol,
    /// Product of presence bitmask, twice-count and a repeated-pair trit,
    /// with a dense index that skips unreachable combinations; size
    /// `3·n·2^(n-1) + 1`.
    NotAnyOfThose,
}

pub struct Dfa {
    kind: DfaKind,
    n_symbols: usize,
    size: usize,
    transition: SparseMatrix,
    /// powers[i] is the i-th power of the transition matrix; powers[0] is
    /// the identity. Grown on demand, never shrunk.
    powers: Mutex<Vec<SparseMatrix>>,
}

impl std::fmt::Debug for Dfa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dfa")
            .field("kind", &self.kind)
            .field("n_symbols", &self.n_symbols)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl Dfa {
    pub fn new(n_symbols: usize, kind: DfaKind) -> Self {
        let size = match &kind {
            DfaKind::Histogram { n_states } => (*n_states as usize).pow(n_symbols as u32),
            DfaKind::Compressed => (binomial(n_symbols + 2, 2)) as usize,
            DfaKind::LastSymbol => n_symbols + 2,
            DfaKind::NotAnyOfThose => 3 * n_symbols * (1 << (n_symbols - 1)) + 1,
        };
        let transition = match &kind {
            DfaKind::Histogram { n_states } => histogram_matrix(n_symbols, *n_states as usize),
            DfaKind::Compressed => compressed_matrix(n_symbols),
            DfaKind::LastSymbol => last_symbol_matrix(n_symbols),
            DfaKind::NotAnyOfThose => not_any_matrix(n_symbols),
        };
        Self {
            kind,
            n_symbols,
            size,
            transition,
            powers: Mutex::new(Vec::new()),
        }
    }

    pub fn n_symbols(&self) -> usize {
        self.n_symbols
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// State index of a word given as digit values.
    pub fn encode(&self, word: &[usize]) -> usize {
        match &self.kind {
            DfaKind::Histogram { n_states } => {
                let n_states = *n_states as usize;
                let mut counts = vec![0usize; self.n_symbols];
                for &digit in word {
                    counts[digit] = (counts[digit] + 1).min(n_states - 1);
                }
                counts
                    .iter()
                    .rev()
                    .fold(0, |acc, &count| acc * n_states + count)
            }
            DfaKind::Compressed => {
                let (once, twice) = once_twice(self.n_symbols, word);
                compressed_index(self.n_symbols, once, twice)
            }
            DfaKind::LastSymbol => {
                if word.is_empty() {
                    return 0;
                }
                for pair in word.windows(2) {
                    if pair[0] == pair[1] {
                        return self.size - 1;
                    }
                }
                1 + word[word.len() - 1]
            }
            DfaKind::NotAnyOfThose => {
                let mut mask = vec![false; self.n_symbols];
                let mut counts = vec![0usize; self.n_symbols];
                for &digit in word {
                    mask[digit] = true;
                    counts[digit] += 1;
                }
                let mut c = 0;
                if word.windows(2).any(|pair| pair[0] == pair[1]) {
                    c = 2;
                } else if let Some(&last) = word.last() {
                    c = counts[last].min(2) - 1;
                }
                let b = counts.iter().filter(|&&count| count >= 2).count();
                not_any_state_to_int(self.n_symbols, &mask, b, c)
            }
        }
    }

    /// Row sums of the `power`-th matrix power over the accepting set, for
    /// every state at once. This is the quantity enumeration consumes:
    /// entry `s` is the number of accepted states reachable from `s` in
    /// exactly `power` further symbols.
    pub fn accept_sums(&self, power: usize, accepting: &[usize]) -> EnumerateResult<Vec<u128>> {
        let mut powers = self.powers.lock().expect("dfa power cache poisoned");
        if powers.is_empty() {
            powers.push(SparseMatrix::identity(self.size));
        }
        while powers.len() <= power {
            let next = powers[powers.len() - 1].multiply(&self.transition)?;
            powers.push(next);
        }
        let matrix = &powers[power];
        (0..self.size).map(|state| matrix.row_sum(state, accepting)).collect()
    }
}

fn once_twice(n_symbols: usize, word: &[usize]) -> (usize, usize) {
    let mut counts = vec![0usize; n_symbols];
    for &digit in word {
        counts[digit] += 1;
    }
    let once = counts.iter().filter(|&&c| c == 1).count();
    let twice = counts.iter().filter(|&&c| c >= 2).count();
    (once, twice)
}

/// Dense index of a compressed-histogram state. States are ordered by the
/// digit sum `once + 2·twice`, then by `once / 2`, which is bijective for a
/// fixed sum.
pub fn compressed_index(n_symbols: usize, once: usize, twice: usize) -> usize {
    let digit_sum = once + 2 * twice;
    let predecessors: usize = (0..digit_sum)
        .map(|i| i / 2 + 1 - i.saturating_sub(n_symbols))
        .sum();
    predecessors + once / 2
}

fn histogram_matrix(n_symbols: usize, n_states: usize) -> SparseMatrix {
    let size = n_states.pow(n_symbols as u32);
    let mut triplets = Vec::with_capacity(size * n_symbols);
    for state in 0..size {
        let mut place = 1;
        for _digit in 0..n_symbols {
            let count = (state / place) % n_states;
            let target = if count + 1 < n_states { state + place } else { state };
            // State 1 is "a lone leading zero"; only the empty state can
            // reach it and counts never start with zero, so it is cut out of
            // the graph entirely.
            if target != 1 {
                triplets.push((state, target, 1));
            }
            place *= n_states;
        }
    }
    SparseMatrix::from_triplets(size, triplets)
}

fn compressed_matrix(n_symbols: usize) -> SparseMatrix {
    let size = binomial(n_symbols + 2, 2) as usize;
    let mut triplets = Vec::new();
    for absent in 0..=n_symbols {
        for once in 0..=(n_symbols - absent) {
            let twice = n_symbols - absent - once;
            let state = compressed_index(n_symbols, once, twice);
            if absent > 0 {
                triplets.push((state, compressed_index(n_symbols, once + 1, twice), absent as u128));
            }
            if once > 0 {
                triplets.push((state, compressed_index(n_symbols, once - 1, twice + 1), once as u128));
            }
            if twice > 0 {
                triplets.push((state, state, twice as u128));
            }
        }
    }
    SparseMatrix::from_triplets(size, triplets)
}

fn last_symbol_matrix(n_symbols: usize) -> SparseMatrix {
    let size = n_symbols + 2;
    let failed = size - 1;
    let mut triplets = Vec::new();
    for digit in 0..n_symbols {
        triplets.push((0, 1 + digit, 1));
    }
    for state in 1..=n_symbols {
        for digit in 0..n_symbols {
            let target = if 1 + digit == state { failed } else { 1 + digit };
            triplets.push((state, target, 1));
        }
    }
    // The failure state has no outgoing edges: failed words contribute no
    // completions.
    SparseMatrix::from_triplets(size, triplets)
}

/// Number of composite states with exactly `bits` mask bits set and a
/// twice-count strictly between zero and `bits`, summed for all weights up
/// to and including `bits`.
fn not_any_cumulative(n_symbols: usize, bits: usize) -> u128 {
    (0..=bits)
        .map(|i| (i as u128).saturating_sub(1) * binomial(n_symbols, i))
        .sum()
}

fn mask_to_int(mask: &[bool]) -> usize {
    mask.iter()
        .enumerate()
        .map(|(i, &bit)| (bit as usize) << i)
        .sum()
}

fn int_to_mask(value: usize, n_symbols: usize) -> Vec<bool> {
    (0..n_symbols).map(|i| (value >> i) & 1 == 1).collect()
}

/// Dense index of a composite state `(mask, b, c)`: `b` counts digits
/// present at least twice, `c` is 0 when the last symbol is present once,
/// 1 when it is present at least twice, 2 once a repeated pair has been
/// seen.
pub fn not_any_state_to_int(n_symbols: usize, mask: &[bool], b: usize, c: usize) -> usize {
    let total: usize = mask.iter().filter(|&&bit| bit).count();
    if b == 0 {
        return mask_to_int(mask);
    }
    let mut offset = 1 << n_symbols;
    if b == total {
        debug_assert!(c != 0);
        return offset + (mask_to_int(mask) - 1) * 2 + (c - 1);
    }
    offset += 2 * ((1 << n_symbols) - 1);
    offset += 3 * not_any_cumulative(n_symbols, total - 1) as usize;
    // Rank of the mask among same-weight masks, in the order where the
    // lowest set positions come first.
    let mut ones = 0;
    let mut cw_position = 0usize;
    for (idx, &bit) in mask.iter().enumerate() {
        if bit {
            ones += 1;
            cw_position += binomial(idx, ones) as usize;
        }
    }
    offset + 3 * (total - 1) * cw_position + (b - 1) * 3 + c
}

pub fn not_any_int_to_state(n_symbols: usize, state: usize) -> (Vec<bool>, usize, usize) {
    let full = 1 << n_symbols;
    if state < full {
        return (int_to_mask(state, n_symbols), 0, 0);
    }
    let mut state = state - full;
    if state < 2 * full - 2 {
        let c = state % 2 + 1;
        let mask = int_to_mask(state / 2 + 1, n_symbols);
        let total = mask.iter().filter(|&&bit| bit).count();
        return (mask, total, c);
    }
    state -= 2 * full - 2;
    let c = state % 3;
    state /= 3;
    let mut weight = 0;
    let mut below = 0usize;
    for idx in 0..=n_symbols {
        let value = not_any_cumulative(n_symbols, idx) as usize;
        if value > state {
            weight = idx;
            break;
        }
        below = value;
    }
    state -= below;
    let b = state % (weight - 1) + 1;
    state /= weight - 1;
    let mask = decode_mask(state, weight, n_symbols);
    (mask, b, c)
}

/// Invert the same-weight mask ranking: the highest position is decided
/// first, paying `C(n - 1, ones)` to set it.
fn decode_mask(state: usize, ones: usize, n_symbols: usize) -> Vec<bool> {
    if n_symbols == 0 {
        return Vec::new();
    }
    let cost = binomial(n_symbols - 1, ones) as usize;
    if state >= cost {
        let mut mask = decode_mask(state - cost, ones - 1, n_symbols - 1);
        mask.push(true);
        mask
    } else {
        let mut mask = decode_mask(state, ones, n_symbols - 1);
        mask.push(false);
        mask
    }
}

fn not_any_next_states(
    mask: &[bool],
    b: usize,
    c: usize,
) -> Vec<(u128, (Vec<bool>, usize, usize))> {
    let total: usize = mask.iter().filter(|&&bit| bit).count();
    let mut result: Vec<(i128, (Vec<bool>, usize, usize))> = Vec::new();
    // A digit not yet present sets one more bit and becomes the once-present
    // last symbol.
    for (idx, &bit) in mask.iter().enumerate() {
        if !bit {
            let mut next = mask.to_vec();
            next[idx] = true;
            result.push((1, (next, b, if c == 2 { 2 } else { 0 })));
        }
    }
    if total > 0 {
        // Repeating the last symbol forms a pair.
        if c != 2 {
            result.push((1, (mask.to_vec(), b + usize::from(c == 0), 2)));
        }
        // A digit already present at least twice (other than the last, when
        // the last is one of them).
        result.push((
            b as i128 - i128::from(c == 1),
            (mask.to_vec(), b, if c == 2 { 2 } else { 1 }),
        ));
        // A digit present exactly once (other than the last, when the last
        // is one of them) crosses into the twice set.
        result.push((
            total as i128 - b as i128 - i128::from(c == 0),
            (mask.to_vec(), b + 1, if c == 2 { 2 } else { 1 }),
        ));
    }
    result
        .into_iter()
        .filter(|(weight, _)| *weight > 0)
        .map(|(weight, state)| (weight as u128, state))
        .collect()
}

fn not_any_matrix(n_symbols: usize) -> SparseMatrix {
    let size = 3 * n_symbols * (1 << (n_symbols - 1)) + 1;
    let mut triplets = Vec::new();
    for state in 0..size {
        let (mask, b, c) = not_any_int_to_state(n_symbols, state);
        for (weight, (mask2, b2, c2)) in not_any_next_states(&mask, b, c) {
            triplets.push((state, not_any_state_to_int(n_symbols, &mask2, b2, c2), weight));
        }
    }
    SparseMatrix::from_triplets(size, triplets)
}

// ---------------------------------------------------------------------------
// Accepting-state index sets for the known thread families, at any base.

/// Presence bitmasks with no two adjacent bits: the digits present never
/// include a consecutive pair.
pub fn no_consecutive_indices(n_symbols: usize) -> Vec<usize> {
    (1..1usize << n_symbols)
        .filter(|mask| mask & (mask << 1) == 0)
        .collect()
}

/// Presence bitmasks forming one contiguous run of digits.
pub fn only_consecutive_indices(n_symbols: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (1..=n_symbols)
        .flat_map(|max| (0..max).map(move |min| (1usize << max) - (1usize << min)))
        .collect();
    indices.sort_unstable();
    indices
}

/// Last-symbol states that have not hit the failure flag.
pub fn no_successive_indices(n_symbols: usize) -> Vec<usize> {
    (1..=n_symbols).collect()
}

/// Compressed states with no digit present twice.
pub fn no_repeating_indices(n_symbols: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (1..=n_symbols)
        .map(|once| compressed_index(n_symbols, once, 0))
        .collect();
    indices.sort_unstable();
    indices
}

/// Compressed states where every digit present is present at least twice.
pub fn only_repeating_indices(n_symbols: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (1..=n_symbols)
        .map(|twice| compressed_index(n_symbols, 0, twice))
        .collect();
    indices.sort_unstable();
    indices
}

/// Compressed states where exactly one digit is present once.
pub fn mostly_repeating_indices(n_symbols: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (1..n_symbols)
        .map(|twice| compressed_index(n_symbols, 1, twice))
        .collect();
    indices.sort_unstable();
    indices
}

/// Composite states that fail all six of the sibling thread conditions.
pub fn not_any_indices(n_symbols: usize) -> Vec<usize> {
    let no_consecutive = no_consecutive_indices(n_symbols);
    let only_consecutive = only_consecutive_indices(n_symbols);
    let mut indices = Vec::new();
    for mask_value in 0..1usize << n_symbols {
        if no_consecutive.binary_search(&mask_value).is_ok()
            || only_consecutive.binary_search(&mask_value).is_ok()
        {
            continue;
        }
        let mask = int_to_mask(mask_value, n_symbols);
        let total = mask.iter().filter(|&&bit| bit).count();
        // At least one digit twice, at least two digits once: fails the
        // repeating-digit family in every direction.
        for b in 1..total.saturating_sub(1) {
            indices.push(not_any_state_to_int(n_symbols, &mask, b, 2));
        }
    }
    indices.sort_unstable();
    indices
}

/// The constrained-digit-string encoder: a DFA, its accepting set, and the
/// enumeration conventions of the thread.
pub struct DfaEncoder {
    dfa: Arc<Dfa>,
    accepting: Vec<usize>,
    /// Positions conventionally skipped at the start of the thread (e.g.
    /// single digits that satisfy the rule but are not counted).
    offset: u128,
    bijective: bool,
    /// Summed accepting-completions vectors, keyed by matrix power.
    sums: Mutex<BTreeMap<usize, Arc<Vec<u128>>>>,
}

impl std::fmt::Debug for DfaEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DfaEncoder")
            .field("dfa", &self.dfa)
            .field("accepting", &self.accepting.len())
            .field("offset", &self.offset)
            .field("bijective", &self.bijective)
            .finish_non_exhaustive()
    }
}

impl Clone for DfaEncoder {
    fn clone(&self) -> Self {
        Self {
            dfa: Arc::clone(&self.dfa),
            accepting: self.accepting.clone(),
            offset: self.offset,
            bijective: self.bijective,
            sums: Mutex::new(self.sums.lock().expect("sum cache poisoned").clone()),
        }
    }
}

impl DfaEncoder {
    pub fn new(dfa: Arc<Dfa>, mut accepting: Vec<usize>, offset: u128) -> Self {
        accepting.sort_unstable();
        Self {
            dfa,
            accepting,
            offset,
            bijective: false,
            sums: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn bijective(mut self) -> Self {
        self.bijective = true;
        self
    }

    pub fn n_symbols(&self) -> usize {
        self.dfa.n_symbols()
    }

    pub fn word_is_valid(&self, word: &[usize]) -> bool {
        self.accepting.binary_search(&self.dfa.encode(word)).is_ok()
    }

    fn sums_for(&self, power: usize) -> EnumerateResult<Arc<Vec<u128>>> {
        let mut cache = self.sums.lock().expect("sum cache poisoned");
        if let Some(sums) = cache.get(&power) {
            return Ok(Arc::clone(sums));
        }
        let sums = Arc::new(self.dfa.accept_sums(power, &self.accepting)?);
        cache.insert(power, Arc::clone(&sums));
        Ok(sums)
    }

    fn completions(&self, state: usize, power: usize) -> EnumerateResult<u128> {
        Ok(self.sums_for(power)?[state])
    }

    /// The number of words in the language at or before `word` in
    /// length-then-lex order, adjusted by the thread's starting offset.
    ///
    /// For a valid word this is its one-based position; the function is
    /// strictly monotonic over valid words.
    pub fn count_word(&self, word: &[usize]) -> EnumerateResult<u128> {
        let n = self.dfa.n_symbols();
        let length = word.len();
        let mut total: u128 = 0;
        for i in (0..length).rev() {
            let power = length - 1 - i;
            let current = word[i];
            let start = usize::from(i == 0);
            let mut states: Vec<usize> = (start..current)
                .map(|symbol| {
                    let mut prefix = word[..i].to_vec();
                    prefix.push(symbol);
                    self.dfa.encode(&prefix)
                })
                .collect();
            if self.bijective {
                states.push(self.dfa.encode(&[]));
            } else if power > 0 {
                // Words shorter than the target length, grouped by their
                // non-zero first symbol.
                for symbol in 1..n {
                    let state = self.dfa.encode(&[symbol]);
                    total = checked_add(total, self.completions(state, power - 1)?)?;
                }
            }
            for state in states {
                total = checked_add(total, self.completions(state, power)?)?;
            }
        }
        let total = checked_add(total, u128::from(self.word_is_valid(word)))?;
        total
            .checked_sub(self.offset)
            .ok_or(EnumerateError::NoSuchPosition { position: total })
    }

    /// Greedy inverse of [`Self::count_word`]: the valid word at position
    /// `count`.
    pub fn word_at(&self, count: u128) -> EnumerateResult<Vec<usize>> {
        let n = self.dfa.n_symbols();
        let rank = checked_add(count, self.offset)?;
        if rank == 0 {
            return Err(EnumerateError::NoSuchPosition { position: count });
        }
        let first_symbols: Vec<usize> = if self.bijective { (0..n).collect() } else { (1..n).collect() };
        let mut cum: u128 = 0;
        let mut length = 0;
        loop {
            length += 1;
            if length > 128 {
                return Err(EnumerateError::NoSuchPosition { position: count });
            }
            let mut this_length: u128 = 0;
            for &symbol in &first_symbols {
                let state = self.dfa.encode(&[symbol]);
                this_length = checked_add(this_length, self.completions(state, length - 1)?)?;
            }
            if checked_add(cum, this_length)? >= rank {
                break;
            }
            cum = checked_add(cum, this_length)?;
        }
        let mut remaining = rank - cum;
        let mut word: Vec<usize> = Vec::with_capacity(length);
        for position in 0..length {
            let candidates: Vec<usize> = if position == 0 {
                first_symbols.clone()
            } else {
                (0..n).collect()
            };
            let before = word.len();
            for symbol in candidates {
                word.push(symbol);
                let below = self.completions(self.dfa.encode(&word), length - 1 - position)?;
                if remaining > below {
                    remaining -= below;
                    word.pop();
                } else {
                    break;
                }
            }
            debug_assert_eq!(word.len(), before + 1, "greedy descent must always pick a symbol");
        }
        debug_assert_eq!(remaining, 1);
        Ok(word)
    }
}

/// Digit values of a token over the base-n alphabet; the token must already
/// be normalised to the alphabet.
pub fn word_digits(token: &str) -> Vec<usize> {
    token
        .chars()
        .filter_map(|c| ALPHANUMERIC.find(c))
        .collect()
}

pub fn digits_word(digits: &[usize]) -> String {
    digits
        .iter()
        .filter_map(|&d| ALPHANUMERIC.chars().nth(d))
        .collect()
}

#[cfg(test)]
mod tests;
