use std::sync::Arc;

use super::*;

/// Visit all words over `n` symbols of length 1..=max_len without a leading
/// zero, in length-then-lex order.
fn for_all_words(n: usize, max_len: usize, mut visit: impl FnMut(&[usize])) {
    let mut word = Vec::with_capacity(max_len);
    for length in 1..=max_len {
        let lower = n.pow(length as u32 - 1);
        let upper = n.pow(length as u32);
        for value in lower..upper {
            word.clear();
            let mut rest = value;
            for _ in 0..length {
                word.push(rest % n);
                rest /= n;
            }
            word.reverse();
            visit(&word);
        }
    }
}

fn counts(word: &[usize], n: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n];
    for &digit in word {
        counts[digit] += 1;
    }
    counts
}

fn once_count(word: &[usize], n: usize) -> usize {
    counts(word, n).iter().filter(|&&c| c == 1).count()
}

fn twice_count(word: &[usize], n: usize) -> usize {
    counts(word, n).iter().filter(|&&c| c >= 2).count()
}

fn has_adjacent_equal(word: &[usize]) -> bool {
    word.windows(2).any(|pair| pair[0] == pair[1])
}

fn present_mask(word: &[usize], n: usize) -> Vec<bool> {
    let mut mask = vec![false; n];
    for &digit in word {
        mask[digit] = true;
    }
    mask
}

fn mask_has_adjacent_values(mask: &[bool]) -> bool {
    mask.windows(2).any(|pair| pair[0] && pair[1])
}

fn mask_is_run(mask: &[bool]) -> bool {
    let first = mask.iter().position(|&bit| bit);
    let last = mask.iter().rposition(|&bit| bit);
    match (first, last) {
        (Some(first), Some(last)) => mask[first..=last].iter().all(|&bit| bit),
        _ => false,
    }
}

/// Check the encoder against a brute-force enumeration: the k-th valid word
/// must count to k (adjusted by the thread offset), and the greedy inverse
/// must return it.
fn cross_check(
    encoder: &DfaEncoder,
    n: usize,
    max_len: usize,
    offset: u128,
    predicate: impl Fn(&[usize]) -> bool,
) {
    let mut rank: u128 = 0;
    let mut checked = 0usize;
    for_all_words(n, max_len, |word| {
        if !predicate(word) {
            return;
        }
        rank += 1;
        assert!(
            encoder.word_is_valid(word),
            "brute force says valid, dfa disagrees: {word:?}"
        );
        if rank < offset {
            assert!(
                encoder.count_word(word).is_err(),
                "word below the thread offset must not have a position: {word:?}"
            );
            return;
        }
        let expected = rank - offset;
        let counted = encoder.count_word(word).expect("count");
        assert_eq!(counted, expected, "count mismatch for {word:?}");
        let decoded = encoder.word_at(expected).expect("decode");
        assert_eq!(decoded, word, "inverse mismatch at position {expected}");
        checked += 1;
    });
    assert!(checked > 0, "the brute-force range produced no valid words");
}

#[test]
fn only_repeating_digits_match_brute_force() {
    let dfa = Arc::new(Dfa::new(10, DfaKind::Compressed));
    let encoder = DfaEncoder::new(dfa, only_repeating_indices(10), 0);
    cross_check(&encoder, 10, 6, 0, |word| {
        counts(word, 10).iter().all(|&c| c != 1)
    });
}

#[test]
fn only_repeating_digits_start_with_the_doubles() {
    let dfa = Arc::new(Dfa::new(10, DfaKind::Compressed));
    let encoder = DfaEncoder::new(dfa, only_repeating_indices(10), 0);
    for k in 1..=9u128 {
        let word = encoder.word_at(k).expect("decode");
        assert_eq!(word, vec![k as usize, k as usize]);
    }
    // After 11..99 come the triples, then the four-digit combinations.
    assert_eq!(encoder.word_at(10).expect("decode"), vec![1, 1, 1]);
    assert_eq!(encoder.word_at(19).expect("decode"), vec![1, 0, 0, 1]);
}

#[test]
fn mostly_repeating_digits_match_brute_force() {
    let dfa = Arc::new(Dfa::new(10, DfaKind::Compressed));
    let encoder = DfaEncoder::new(dfa, mostly_repeating_indices(10), 0);
    cross_check(&encoder, 10, 5, 0, |word| {
        once_count(word, 10) == 1 && twice_count(word, 10) >= 1
    });
}

#[test]
fn no_repeating_digits_match_brute_force() {
    let dfa = Arc::new(Dfa::new(10, DfaKind::Compressed));
    let encoder = DfaEncoder::new(dfa, no_repeating_indices(10), 0);
    cross_check(&encoder, 10, 5, 0, |word| twice_count(word, 10) == 0);
}

#[test]
fn no_consecutive_digits_match_brute_force() {
    let dfa = Arc::new(Dfa::new(10, DfaKind::Histogram { n_states: 2 }));
    let encoder = DfaEncoder::new(dfa, no_consecutive_indices(10), 0);
    cross_check(&encoder, 10, 5, 0, |word| {
        !mask_has_adjacent_values(&present_mask(word, 10))
    });
}

#[test]
fn only_consecutive_digits_match_brute_force() {
    let dfa = Arc::new(Dfa::new(10, DfaKind::Histogram { n_states: 2 }));
    let encoder = DfaEncoder::new(dfa, only_consecutive_indices(10), 9);
    cross_check(&encoder, 10, 5, 9, |word| mask_is_run(&present_mask(word, 10)));
}

#[test]
fn no_successive_digits_match_brute_force() {
    let dfa = Arc::new(Dfa::new(10, DfaKind::LastSymbol));
    let encoder = DfaEncoder::new(dfa, no_successive_indices(10), 0);
    cross_check(&encoder, 10, 5, 0, |word| !has_adjacent_equal(word));
}

#[test]
fn not_any_of_those_match_brute_force() {
    let dfa = Arc::new(Dfa::new(10, DfaKind::NotAnyOfThose));
    let encoder = DfaEncoder::new(dfa, not_any_indices(10), 0);
    cross_check(&encoder, 10, 6, 0, |word| {
        let mask = present_mask(word, 10);
        has_adjacent_equal(word)
            && twice_count(word, 10) >= 1
            && once_count(word, 10) >= 2
            && mask_has_adjacent_values(&mask)
            && !mask_is_run(&mask)
    });
}

#[test]
fn not_any_of_those_small_base_deep_words() {
    let dfa = Arc::new(Dfa::new(5, DfaKind::NotAnyOfThose));
    let encoder = DfaEncoder::new(dfa, not_any_indices(5), 0);
    cross_check(&encoder, 5, 8, 0, |word| {
        let mask = present_mask(word, 5);
        has_adjacent_equal(word)
            && twice_count(word, 5) >= 1
            && once_count(word, 5) >= 2
            && mask_has_adjacent_values(&mask)
            && !mask_is_run(&mask)
    });
}

#[test]
fn not_any_state_codec_roundtrips() {
    for n in [4usize, 6, 10] {
        let size = 3 * n * (1 << (n - 1)) + 1;
        for state in 0..size {
            let (mask, b, c) = not_any_int_to_state(n, state);
            assert_eq!(
                not_any_state_to_int(n, &mask, b, c),
                state,
                "state {state} at n={n}"
            );
        }
    }
}

#[test]
fn compressed_index_is_dense_and_bijective() {
    let n = 10;
    let mut seen = vec![false; binomial(n + 2, 2) as usize];
    for once in 0..=n {
        for twice in 0..=(n - once) {
            let index = compressed_index(n, once, twice);
            assert!(!seen[index], "collision at once={once} twice={twice}");
            seen[index] = true;
        }
    }
    assert!(seen.iter().all(|&bit| bit));
}

#[test]
fn counts_are_strictly_monotonic_across_lengths() {
    let dfa = Arc::new(Dfa::new(10, DfaKind::Compressed));
    let encoder = DfaEncoder::new(dfa, only_repeating_indices(10), 0);
    let mut previous = 0u128;
    for_all_words(10, 5, |word| {
        if !encoder.word_is_valid(word) {
            return;
        }
        let count = encoder.count_word(word).expect("count");
        assert!(count > previous, "count must grow in length-lex order");
        previous = count;
    });
}

#[test]
fn matrix_powers_count_unconstrained_words() {
    // With every state accepting, the completions from any state over m
    // steps must equal n^m, one per appended-digit sequence.
    let dfa = Arc::new(Dfa::new(4, DfaKind::Compressed));
    let all_states: Vec<usize> = (0..dfa.size()).collect();
    let encoder = DfaEncoder::new(Arc::clone(&dfa), all_states, 0);
    for power in 0..6usize {
        let state = dfa.encode(&[1]);
        assert_eq!(
            encoder.completions(state, power).expect("sum"),
            4u128.pow(power as u32)
        );
    }
}

#[test]
fn digit_helpers_roundtrip() {
    assert_eq!(word_digits("10a"), vec![1, 0, 10]);
    assert_eq!(digits_word(&[1, 0, 10]), "10a");
}
