//! Bijections between post bodies and integer positions.
//!
//! Every side thread that can be tallied precisely has an encoder: a pair of
//! operations `count_to_body` / `body_to_count` that are mutually inverse on
//! the encoder's domain. Positions are `u128`; arithmetic that would leave
//! 128 bits reports [`CountError::Overflow`] instead of wrapping.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

use regex::Regex;
use snafu::Snafu;

use crate::dfa::{self, DfaEncoder, EnumerateError};
use crate::fuzzy::{self, WordAlphabet};
use crate::parsing;

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum CountError {
    #[snafu(transparent)]
    NotACount { source: parsing::NotACount },
    #[snafu(display("arithmetic overflow while converting a count"))]
    Overflow,
    #[snafu(display("position {position} is outside the encoding's domain"))]
    OutOfDomain { position: u128 },
    #[snafu(display("body {body:?} does not follow the thread's format"))]
    BadFormat { body: String },
}

pub type CountResult<T> = std::result::Result<T, CountError>;

impl From<EnumerateError> for CountError {
    fn from(err: EnumerateError) -> Self {
        match err {
            EnumerateError::Overflow => CountError::Overflow,
            EnumerateError::NoSuchPosition { position } => CountError::OutOfDomain { position },
        }
    }
}

fn bad_format(body: &str) -> CountError {
    CountError::BadFormat {
        body: body.to_owned(),
    }
}

static WAVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(-?\d+)[^(]*\((\d+)[+-]?\)").expect("static regex"));
static PAIR_IN_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+)\D+(\d+)\)").expect("static regex"));

/// A collatz stopping-time cache; the sums in the collatz thread revisit
/// the same small integers over and over.
#[derive(Debug, Default)]
pub struct Collatz {
    cache: Mutex<HashMap<u64, u64>>,
}

impl Clone for Collatz {
    fn clone(&self) -> Self {
        Self {
            cache: Mutex::new(self.cache.lock().expect("collatz cache poisoned").clone()),
        }
    }
}

impl Collatz {
    /// Number of terms in the collatz trajectory of `n`, endpoints included.
    pub fn stopping_time(&self, n: u64) -> u64 {
        let mut path = Vec::new();
        let mut current = n;
        let mut base = {
            let cache = self.cache.lock().expect("collatz cache poisoned");
            loop {
                if current == 1 {
                    break 1;
                }
                if let Some(&hit) = cache.get(&current) {
                    break hit;
                }
                path.push(current);
                current = if current % 2 == 0 {
                    current / 2
                } else {
                    3 * current + 1
                };
            }
        };
        let mut cache = self.cache.lock().expect("collatz cache poisoned");
        for &value in path.iter().rev() {
            base += 1;
            cache.insert(value, base);
        }
        base
    }
}

#[derive(Debug, Clone)]
pub enum Encoder {
    /// Standard positional base-n.
    BaseN(u32),
    /// Base-n over digits 1..=n, no zero.
    BijectiveBaseN(u32),
    /// Threads counting in steps of k: position is the base-10 value
    /// divided by the stride.
    ByK(u128),
    /// Positional counting where the digits are words.
    WordList {
        alphabet: WordAlphabet,
        bijective: bool,
        /// Element-symbol tokenization (split before capitals) instead of
        /// whitespace words.
        elements: bool,
        ignored: &'static str,
    },
    /// Constrained digit strings, enumerated through a DFA.
    Dfa(DfaEncoder),
    /// `a (b)` with position `2b² - a`.
    Wave,
    /// `v (n, steps)`: sum of collatz trajectory lengths below n, plus the
    /// steps taken into n's trajectory.
    Collatz(Collatz),
    /// Base-2i counting; the position is the odd square `(2·corner + 1)²`
    /// where `corner` is the base -4 value of the even-placed digits.
    GaussianInteger,
    /// `a (b₁) … (bₘ)` with position summed from simplex numbers.
    Increasing { sequences: u32 },
    /// Permutations of the first l alphabet symbols, in length-then-lex
    /// order; the one-symbol word is the conventional zeroth entry.
    Permutations { alphabet: &'static str },
    /// Strings of distinct letters in length-then-lex order.
    NoRepeatingLetters,
    /// Five increasing balls (1..=69) plus a powerball (1..=26).
    Powerball,
    /// Binary groups of four bits per decimal digit.
    BinaryCodedDecimal,
}

impl Encoder {
    pub fn word_list(alphabet: WordAlphabet) -> Self {
        Encoder::WordList {
            alphabet,
            bijective: false,
            elements: false,
            ignored: ">",
        }
    }

    pub fn body_to_count(&self, body: &str) -> CountResult<u128> {
        match self {
            Encoder::BaseN(base) => Ok(parsing::find_count_in_text(body, *base)?),
            Encoder::BijectiveBaseN(base) => {
                let token = parsing::extract_count_string(body, (*base + 1).min(36))?;
                let mut total: u128 = 0;
                for digit in dfa::word_digits(&token) {
                    if digit == 0 {
                        return Err(bad_format(body));
                    }
                    total = total
                        .checked_mul(u128::from(*base))
                        .and_then(|t| t.checked_add(digit as u128))
                        .ok_or(CountError::Overflow)?;
                }
                Ok(total)
            }
            Encoder::ByK(stride) => Ok(parsing::find_count_in_text(body, 10)? / stride),
            Encoder::WordList {
                alphabet,
                elements,
                ignored,
                ..
            } => {
                let words = if *elements {
                    fuzzy::tokenize_elements(body)
                } else {
                    fuzzy::tokenize_words(body, ignored)
                };
                // The word values already carry any bijective shift.
                let values = fuzzy::match_tokens(alphabet, &words);
                if values.is_empty() {
                    return Err(bad_format(body));
                }
                let radix = alphabet.radix();
                let mut total: u128 = 0;
                for value in values {
                    total = total
                        .checked_mul(radix)
                        .and_then(|t| t.checked_add(value))
                        .ok_or(CountError::Overflow)?;
                }
                Ok(total)
            }
            Encoder::Dfa(encoder) => {
                let token =
                    parsing::extract_count_string(body, encoder.n_symbols() as u32)?;
                Ok(encoder.count_word(&dfa::word_digits(&token))?)
            }
            Encoder::Wave => {
                let line = parsing::normalize_body(body);
                let caps = WAVE.captures(&line).ok_or_else(|| bad_format(body))?;
                let a: i128 = caps[1].parse().map_err(|_| bad_format(body))?;
                let b: i128 = caps[2].parse().map_err(|_| bad_format(body))?;
                let count = 2 * b * b - a;
                u128::try_from(count).map_err(|_| bad_format(body))
            }
            Encoder::Collatz(collatz) => {
                let line = parsing::normalize_body(body);
                let caps = PAIR_IN_PARENS.captures(&line).ok_or_else(|| bad_format(body))?;
                let n: u64 = caps[1].parse().map_err(|_| bad_format(body))?;
                let steps: u128 = caps[2].parse().map_err(|_| bad_format(body))?;
                let mut total: u128 = 0;
                for i in 1..n {
                    total = total
                        .checked_add(u128::from(collatz.stopping_time(i)))
                        .ok_or(CountError::Overflow)?;
                }
                total.checked_add(steps).ok_or(CountError::Overflow)
            }
            Encoder::GaussianInteger => {
                let token = parsing::extract_count_string(body, 4)?;
                let digits = dfa::word_digits(&token);
                let mut corner: i128 = 0;
                let mut place: i128 = 1;
                // Digits at even places from the right carry the base -4
                // component; odd places are the imaginary axis and do not
                // move the position.
                for &digit in digits.iter().rev().step_by(2) {
                    corner = corner
                        .checked_add(place.checked_mul(digit as i128).ok_or(CountError::Overflow)?)
                        .ok_or(CountError::Overflow)?;
                    place = place.checked_mul(-4).ok_or(CountError::Overflow)?;
                }
                let side = 2 * corner + 1;
                u128::try_from(side * side).map_err(|_| CountError::Overflow)
            }
            Encoder::Increasing { sequences } => {
                let line = parsing::normalize_body(body);
                let values = increasing_values(&line, *sequences).ok_or_else(|| bad_format(body))?;
                let mut total: u128 = 0;
                for (dimension, value) in values.iter().enumerate() {
                    total = total
                        .checked_add(simplex(dimension + 1, *value)?)
                        .ok_or(CountError::Overflow)?;
                }
                Ok(total)
            }
            Encoder::Permutations { alphabet } => {
                let alphabet: Vec<char> = alphabet.chars().collect();
                let line = parsing::normalize_body(body).to_lowercase();
                let word: Vec<char> = line.chars().filter(|c| alphabet.contains(c)).collect();
                if word.is_empty() || word.len() > alphabet.len() {
                    return Err(bad_format(body));
                }
                let length = word.len();
                let mut total = shorter_factorials(length)?;
                total = total
                    .checked_add(
                        permutation_order(&word, &alphabet[..length]).ok_or_else(|| bad_format(body))?,
                    )
                    .ok_or(CountError::Overflow)?;
                total
                    .checked_sub(1)
                    .ok_or(CountError::OutOfDomain { position: 0 })
            }
            Encoder::NoRepeatingLetters => {
                let alphabet: Vec<char> = ('a'..='z').collect();
                let line = parsing::normalize_body(body).to_lowercase();
                let word: Vec<char> = line.chars().filter(|c| c.is_ascii_lowercase()).collect();
                if word.is_empty() || word.len() > alphabet.len() {
                    return Err(bad_format(body));
                }
                let mut total: u128 = 0;
                for i in 1..word.len() {
                    total = total
                        .checked_add(falling_factorial(26, i)?)
                        .ok_or(CountError::Overflow)?;
                }
                total
                    .checked_add(arrangement_order(&word, &alphabet).ok_or_else(|| bad_format(body))?)
                    .ok_or(CountError::Overflow)
            }
            Encoder::Powerball => {
                let line = parsing::normalize_body(body);
                let (balls, powerball) = line.split_once('+').ok_or_else(|| bad_format(body))?;
                let balls: Vec<u32> = balls
                    .split_whitespace()
                    .map(|b| b.parse())
                    .collect::<Result<_, _>>()
                    .map_err(|_| bad_format(body))?;
                let powerball: u128 = powerball.trim().parse().map_err(|_| bad_format(body))?;
                if powerball < 1 || powerball > 26 {
                    return Err(bad_format(body));
                }
                let rank = combination_order(&balls, 69).ok_or_else(|| bad_format(body))?;
                rank.checked_mul(26)
                    .and_then(|r| r.checked_add(powerball - 1))
                    .ok_or(CountError::Overflow)
            }
            Encoder::BinaryCodedDecimal => {
                let token = parsing::extract_count_string(body, 2)?;
                let padding = (4 - token.len() % 4) % 4;
                let padded: String = "0".repeat(padding) + &token;
                let mut total: u128 = 0;
                for chunk in padded.as_bytes().chunks(4) {
                    let digit = chunk.iter().fold(0u32, |acc, b| acc * 2 + u32::from(*b == b'1'));
                    if digit > 9 {
                        return Err(bad_format(body));
                    }
                    total = total
                        .checked_mul(10)
                        .and_then(|t| t.checked_add(u128::from(digit)))
                        .ok_or(CountError::Overflow)?;
                }
                Ok(total)
            }
        }
    }

    pub fn count_to_body(&self, count: u128) -> CountResult<String> {
        let out_of_domain = CountError::OutOfDomain { position: count };
        match self {
            Encoder::BaseN(base) => Ok(to_radix(count, *base)),
            Encoder::BijectiveBaseN(base) => {
                if count == 0 {
                    return Err(out_of_domain);
                }
                let base = u128::from(*base);
                let mut digits = Vec::new();
                let mut rest = count;
                while rest > 0 {
                    let digit = (rest - 1) % base + 1;
                    digits.push(digit as usize);
                    rest = (rest - 1) / base;
                }
                digits.reverse();
                Ok(dfa::digits_word(&digits))
            }
            Encoder::ByK(stride) => {
                let value = count.checked_mul(*stride).ok_or(CountError::Overflow)?;
                Ok(value.to_string())
            }
            Encoder::WordList {
                alphabet,
                bijective,
                ..
            } => {
                let radix = alphabet.radix();
                let mut values = Vec::new();
                let mut rest = count;
                if *bijective {
                    if count == 0 {
                        return Err(out_of_domain);
                    }
                    while rest > 0 {
                        values.push((rest - 1) % radix + 1);
                        rest = (rest - 1) / radix;
                    }
                } else if rest == 0 {
                    values.push(0);
                } else {
                    while rest > 0 {
                        values.push(rest % radix);
                        rest /= radix;
                    }
                }
                values.reverse();
                let words: Option<Vec<&str>> =
                    values.iter().map(|&value| alphabet.word_for(value)).collect();
                Ok(words.ok_or(out_of_domain)?.join(" "))
            }
            Encoder::Dfa(encoder) => Ok(dfa::digits_word(&encoder.word_at(count)?)),
            Encoder::Wave => {
                let b = nearest_sqrt_half(count);
                let a = 2 * (b as i128) * (b as i128) - count as i128;
                Ok(format!("{a} ({b})"))
            }
            Encoder::Collatz(collatz) => {
                let mut n: u64 = 1;
                let mut cum: u128 = 0;
                loop {
                    let here = u128::from(collatz.stopping_time(n));
                    if cum + here > count {
                        break;
                    }
                    cum += here;
                    n += 1;
                    if n > 10_000_000 {
                        return Err(out_of_domain);
                    }
                }
                let steps = count - cum;
                let mut value = n;
                for _ in 0..steps {
                    value = if value % 2 == 0 { value / 2 } else { 3 * value + 1 };
                }
                Ok(format!("{value} ({n}, {steps})"))
            }
            Encoder::GaussianInteger => {
                let side = isqrt(count);
                if side * side != count || side % 2 == 0 {
                    return Err(out_of_domain);
                }
                let mut corner = ((side - 1) / 2) as i128;
                if corner == 0 {
                    return Ok("0".to_owned());
                }
                let mut digits = Vec::new();
                while corner != 0 {
                    let mut rem = corner % -4;
                    corner /= -4;
                    if rem < 0 {
                        rem += 4;
                        corner += 1;
                    }
                    digits.push(rem as usize);
                }
                // Interleave zeros for the odd, imaginary places.
                let mut word = Vec::new();
                for (idx, &digit) in digits.iter().enumerate().rev() {
                    word.push(digit);
                    if idx > 0 {
                        word.push(0);
                    }
                }
                Ok(dfa::digits_word(&word))
            }
            Encoder::Increasing { sequences } => {
                let dimensions = *sequences as usize + 1;
                let mut values = vec![1u128; dimensions];
                let mut rest = count;
                for dimension in (1..=dimensions).rev() {
                    let value = largest_simplex_below(dimension, rest)?;
                    rest -= simplex(dimension, value)?;
                    values[dimension - 1] = value;
                }
                if rest != 0 {
                    return Err(out_of_domain);
                }
                let mut body = values[0].to_string();
                for value in &values[1..] {
                    body.push_str(&format!(" ({value})"));
                }
                Ok(body)
            }
            Encoder::Permutations { alphabet } => {
                let alphabet: Vec<char> = alphabet.chars().collect();
                let rank = count.checked_add(1).ok_or(CountError::Overflow)?;
                let mut length = 1usize;
                let mut shorter: u128 = 0;
                loop {
                    if length > alphabet.len() {
                        return Err(out_of_domain);
                    }
                    let block = factorial(length)?;
                    if rank <= shorter + block {
                        break;
                    }
                    shorter += block;
                    length += 1;
                }
                let word = unrank_permutation(&alphabet[..length], rank - shorter)?;
                Ok(word.into_iter().collect())
            }
            Encoder::NoRepeatingLetters => {
                let alphabet: Vec<char> = ('a'..='z').collect();
                let mut length = 1usize;
                let mut shorter: u128 = 0;
                loop {
                    if length > alphabet.len() {
                        return Err(out_of_domain);
                    }
                    let block = falling_factorial(26, length)?;
                    if count < shorter + block {
                        break;
                    }
                    shorter += block;
                    length += 1;
                }
                let word = unrank_arrangement(&alphabet, length, count - shorter)?;
                Ok(word.into_iter().collect())
            }
            Encoder::Powerball => {
                let powerball = count % 26 + 1;
                let rank = count / 26;
                let balls = unrank_combination(rank, 69, 5).ok_or(out_of_domain)?;
                let balls: Vec<String> = balls.iter().map(u32::to_string).collect();
                Ok(format!("{} + {powerball}", balls.join(" ")))
            }
            Encoder::BinaryCodedDecimal => {
                let digits = to_radix(count, 10);
                let groups: Vec<String> = digits
                    .chars()
                    .map(|c| {
                        let value = c.to_digit(10).expect("decimal digit");
                        format!("{value:04b}")
                    })
                    .collect();
                Ok(groups.join(" "))
            }
        }
    }
}

pub fn to_radix(mut value: u128, base: u32) -> String {
    if value == 0 {
        return "0".to_owned();
    }
    let base = u128::from(base);
    let mut digits = Vec::new();
    while value > 0 {
        digits.push((value % base) as usize);
        value /= base;
    }
    digits.reverse();
    dfa::digits_word(&digits)
}

fn factorial(n: usize) -> CountResult<u128> {
    let mut result: u128 = 1;
    for i in 2..=n {
        result = result.checked_mul(i as u128).ok_or(CountError::Overflow)?;
    }
    Ok(result)
}

fn shorter_factorials(length: usize) -> CountResult<u128> {
    let mut total: u128 = 0;
    for i in 1..length {
        total = total.checked_add(factorial(i)?).ok_or(CountError::Overflow)?;
    }
    Ok(total)
}

/// n·(n-1)·…·(n-k+1).
fn falling_factorial(n: usize, k: usize) -> CountResult<u128> {
    let mut result: u128 = 1;
    for i in 0..k {
        result = result
            .checked_mul((n - i) as u128)
            .ok_or(CountError::Overflow)?;
    }
    Ok(result)
}

/// Rank of `word` among permutations of `alphabet` that use each symbol
/// exactly once, zero-based.
fn permutation_order(word: &[char], alphabet: &[char]) -> Option<u128> {
    let Some((&first, rest)) = word.split_first() else {
        return Some(0);
    };
    let index = alphabet.iter().position(|&c| c == first)?;
    let remaining: Vec<char> = alphabet
        .iter()
        .copied()
        .enumerate()
        .filter(|&(i, _)| i != index)
        .map(|(_, c)| c)
        .collect();
    let below = (index as u128)
        .checked_mul(falling_factorial(alphabet.len() - 1, word.len() - 1).ok()?)?;
    below.checked_add(permutation_order(rest, &remaining)?)
}

/// Rank of `word` among same-length arrangements of distinct symbols from
/// `alphabet`, zero-based.
fn arrangement_order(word: &[char], alphabet: &[char]) -> Option<u128> {
    let Some((&first, rest)) = word.split_first() else {
        return Some(0);
    };
    let index = alphabet.iter().position(|&c| c == first)?;
    let remaining: Vec<char> = alphabet
        .iter()
        .copied()
        .filter(|&c| c != first)
        .collect();
    let below = (index as u128)
        .checked_mul(falling_factorial(alphabet.len() - 1, word.len() - 1).ok()?)?;
    below.checked_add(arrangement_order(rest, &remaining)?)
}

fn unrank_permutation(alphabet: &[char], rank: u128) -> CountResult<Vec<char>> {
    // One-based rank within the block of |alphabet|! permutations.
    let mut remaining: Vec<char> = alphabet.to_vec();
    let mut rank = rank - 1;
    let mut word = Vec::with_capacity(alphabet.len());
    for position in (0..alphabet.len()).rev() {
        let block = factorial(position)?;
        let index = (rank / block) as usize;
        rank %= block;
        word.push(remaining.remove(index));
    }
    Ok(word)
}

fn unrank_arrangement(alphabet: &[char], length: usize, mut rank: u128) -> CountResult<Vec<char>> {
    let mut remaining: Vec<char> = alphabet.to_vec();
    let mut word = Vec::with_capacity(length);
    for position in 0..length {
        let block = falling_factorial(remaining.len() - 1, length - position - 1)?;
        let index = (rank / block) as usize;
        rank %= block;
        word.push(remaining.remove(index));
    }
    Ok(word)
}

/// Lexicographic rank of an increasing sequence of balls drawn from
/// 1..=pool, zero-based. None when the sequence is not strictly increasing
/// or leaves the pool.
fn combination_order(balls: &[u32], pool: u32) -> Option<u128> {
    let k = balls.len();
    let mut rank: u128 = 0;
    let mut previous = 0u32;
    for (i, &ball) in balls.iter().enumerate() {
        if ball <= previous || ball > pool {
            return None;
        }
        for skipped in previous + 1..ball {
            rank += dfa::binomial((pool - skipped) as usize, k - i - 1);
        }
        previous = ball;
    }
    Some(rank)
}

fn unrank_combination(mut rank: u128, pool: u32, k: usize) -> Option<Vec<u32>> {
    let mut balls = Vec::with_capacity(k);
    let mut candidate = 1u32;
    for i in 0..k {
        loop {
            if candidate > pool {
                return None;
            }
            let block = dfa::binomial((pool - candidate) as usize, k - i - 1);
            if rank < block {
                balls.push(candidate);
                candidate += 1;
                break;
            }
            rank -= block;
            candidate += 1;
        }
    }
    if rank == 0 { Some(balls) } else { None }
}

/// The simplex numbers the increasing-sequence threads are built on:
/// dimension 1 is `value - 1`, dimension 2 the triangular numbers, and so
/// on.
fn simplex(dimension: usize, value: u128) -> CountResult<u128> {
    if value <= 1 {
        return Ok(0);
    }
    // C(value - 2 + dimension, dimension)
    let n = value - 2 + dimension as u128;
    let mut result: u128 = 1;
    for i in 0..dimension as u128 {
        result = result
            .checked_mul(n - i)
            .ok_or(CountError::Overflow)?
            / (i + 1);
    }
    Ok(result)
}

fn largest_simplex_below(dimension: usize, target: u128) -> CountResult<u128> {
    let mut low: u128 = 1;
    let mut high: u128 = 2;
    while simplex(dimension, high)? <= target {
        low = high;
        high = high.checked_mul(2).ok_or(CountError::Overflow)?;
    }
    while low + 1 < high {
        let mid = low + (high - low) / 2;
        if simplex(dimension, mid)? <= target {
            low = mid;
        } else {
            high = mid;
        }
    }
    Ok(low)
}

fn increasing_values(line: &str, sequences: u32) -> Option<Vec<u128>> {
    let mut pattern = String::from(r"(-?\d+)");
    for _ in 0..sequences {
        pattern.push_str(r"[^(]*\((\d+)\)");
    }
    let regex = Regex::new(&pattern).expect("assembled from fixed pieces");
    let caps = regex.captures(line)?;
    (1..=sequences as usize + 1)
        .map(|i| caps[i].parse().ok())
        .collect()
}

fn isqrt(value: u128) -> u128 {
    if value < 2 {
        return value;
    }
    let mut guess = 1u128 << (value.ilog2() / 2 + 1);
    loop {
        let next = (guess + value / guess) / 2;
        if next >= guess {
            return guess;
        }
        guess = next;
    }
}

/// The integer b minimising |2b² - count|.
fn nearest_sqrt_half(count: u128) -> u128 {
    let b = isqrt(count / 2);
    let error = |b: u128| (2 * b * b).abs_diff(count);
    if error(b + 1) < error(b) { b + 1 } else { b }
}

#[cfg(test)]
mod tests;
