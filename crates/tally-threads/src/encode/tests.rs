use std::sync::Arc;

use proptest::prelude::*;

use super::*;
use crate::dfa::{only_repeating_indices, Dfa, DfaKind};
use crate::fuzzy::WordAlphabet;

fn roundtrip(encoder: &Encoder, counts: impl IntoIterator<Item = u128>) {
    for count in counts {
        let body = encoder.count_to_body(count).expect("encode");
        let parsed = encoder.body_to_count(&body).expect("decode");
        assert_eq!(parsed, count, "round trip through {body:?}");
    }
}

#[test]
fn base_n_roundtrips() {
    for base in [2u32, 7, 10, 16, 36] {
        roundtrip(&Encoder::BaseN(base), 0..500);
    }
    assert_eq!(Encoder::BaseN(16).count_to_body(255).expect("encode"), "ff");
    assert_eq!(
        Encoder::BaseN(10).body_to_count("2,171,000 woo").expect("decode"),
        2_171_000
    );
}

#[test]
fn bijective_base_n_roundtrips() {
    for base in [2u32, 3, 10] {
        roundtrip(&Encoder::BijectiveBaseN(base), 1..500);
    }
    let bijective = Encoder::BijectiveBaseN(2);
    assert_eq!(bijective.count_to_body(1).expect("encode"), "1");
    assert_eq!(bijective.count_to_body(2).expect("encode"), "2");
    assert_eq!(bijective.count_to_body(3).expect("encode"), "11");
    assert!(bijective.count_to_body(0).is_err());
    assert!(bijective.body_to_count("102").is_err());
}

#[test]
fn stride_counting() {
    let by_threes = Encoder::ByK(3);
    assert_eq!(by_threes.body_to_count("12").expect("decode"), 4);
    assert_eq!(by_threes.body_to_count("14").expect("decode"), 4);
    roundtrip(&by_threes, 0..100);
}

#[test]
fn word_lists_roundtrip() {
    let rainbow = Encoder::word_list(WordAlphabet::from_list(
        ["red", "orange", "yellow", "green", "blue", "indigo", "violet"],
        false,
    ));
    roundtrip(&rainbow, 0..500);
    assert_eq!(rainbow.count_to_body(0).expect("encode"), "red");
    assert_eq!(rainbow.count_to_body(7).expect("encode"), "orange red");
    // Typos within the fuzzy threshold still parse.
    assert_eq!(rainbow.body_to_count("organge red").expect("decode"), 7);
}

#[test]
fn bijective_element_words_roundtrip() {
    let elements = Encoder::WordList {
        alphabet: WordAlphabet::from_list(["H", "He", "Li", "Be", "B", "C", "N", "O"], true),
        bijective: true,
        elements: true,
        ignored: ">",
    };
    assert_eq!(elements.count_to_body(1).expect("encode"), "H");
    assert_eq!(elements.body_to_count("HHe").expect("decode"), 10);
    roundtrip(&elements, 1..200);
}

#[test]
fn wave_counts() {
    let wave = Encoder::Wave;
    assert_eq!(wave.body_to_count("11 (4)").expect("decode"), 21);
    assert_eq!(wave.body_to_count("-3 (2)").expect("decode"), 11);
    roundtrip(&wave, 0..300);
}

#[test]
fn collatz_counts() {
    let collatz = Encoder::Collatz(Collatz::default());
    // 1 has a one-term trajectory, 2 a two-term one; position 1 is the
    // first step into the trajectory of 2.
    assert_eq!(collatz.body_to_count("2 (2, 0)").expect("decode"), 1);
    assert_eq!(collatz.count_to_body(0).expect("encode"), "1 (1, 0)");
    assert_eq!(collatz.count_to_body(1).expect("encode"), "2 (2, 0)");
    assert_eq!(collatz.count_to_body(2).expect("encode"), "1 (2, 1)");
    roundtrip(&collatz, 0..500);
}

#[test]
fn gaussian_integer_counts() {
    let gaussian = Encoder::GaussianInteger;
    // corner 1 → (2·1+1)² = 9, written as "1" in the even place.
    assert_eq!(gaussian.body_to_count("1").expect("decode"), 9);
    assert_eq!(gaussian.count_to_body(9).expect("encode"), "1");
    assert_eq!(gaussian.count_to_body(1).expect("encode"), "0");
    // corner digits interleave with zeros for the imaginary places.
    let body = gaussian.count_to_body((2 * 5 + 1) * (2 * 5 + 1)).expect("encode");
    assert_eq!(gaussian.body_to_count(&body).expect("decode"), 121);
    for corner in 0u128..200 {
        let count = (2 * corner + 1) * (2 * corner + 1);
        let body = gaussian.count_to_body(count).expect("encode");
        assert_eq!(gaussian.body_to_count(&body).expect("decode"), count);
    }
    assert!(gaussian.count_to_body(4).is_err());
}

#[test]
fn increasing_sequences_count() {
    let single = Encoder::Increasing { sequences: 1 };
    // "5 (3)" is (5 - 1) + C(3, 2).
    assert_eq!(single.body_to_count("5 (3)").expect("decode"), 7);
    roundtrip(&single, 0..300);
    let double = Encoder::Increasing { sequences: 2 };
    roundtrip(&double, 0..300);
    let triple = Encoder::Increasing { sequences: 3 };
    roundtrip(&triple, 0..300);
}

#[test]
fn permutation_counts() {
    let digits = Encoder::Permutations {
        alphabet: "123456789",
    };
    // "12" opens the two-symbol block.
    assert_eq!(digits.body_to_count("12").expect("decode"), 0);
    assert_eq!(digits.body_to_count("21").expect("decode"), 1);
    assert_eq!(digits.body_to_count("123").expect("decode"), 2);
    assert_eq!(digits.body_to_count("132").expect("decode"), 3);
    roundtrip(&digits, 0..500);

    let letters = Encoder::Permutations {
        alphabet: "abcdefghijklmnopqrstuvwxyz",
    };
    assert_eq!(letters.body_to_count("ab").expect("decode"), 0);
    roundtrip(&letters, 0..500);
}

#[test]
fn no_repeating_letters_counts() {
    let encoder = Encoder::NoRepeatingLetters;
    assert_eq!(encoder.body_to_count("a").expect("decode"), 0);
    assert_eq!(encoder.body_to_count("z").expect("decode"), 25);
    assert_eq!(encoder.body_to_count("ab").expect("decode"), 26);
    assert_eq!(encoder.body_to_count("ba").expect("decode"), 51);
    roundtrip(&encoder, 0..2000);
}

#[test]
fn powerball_counts() {
    let encoder = Encoder::Powerball;
    assert_eq!(encoder.body_to_count("1 2 3 4 5 + 1").expect("decode"), 0);
    assert_eq!(encoder.body_to_count("1 2 3 4 5 + 26").expect("decode"), 25);
    assert_eq!(encoder.body_to_count("1 2 3 4 6 + 1").expect("decode"), 26);
    assert!(encoder.body_to_count("5 4 3 2 1 + 1").is_err());
    roundtrip(&encoder, 0..2000);
}

#[test]
fn binary_coded_decimal_counts() {
    let encoder = Encoder::BinaryCodedDecimal;
    assert_eq!(encoder.body_to_count("0001 0010").expect("decode"), 12);
    assert_eq!(encoder.count_to_body(12).expect("encode"), "0001 0010");
    assert!(encoder.body_to_count("1010").is_err());
    roundtrip(&encoder, 0..500);
}

#[test]
fn dfa_encoder_roundtrips_through_bodies() {
    let dfa = Arc::new(Dfa::new(10, DfaKind::Compressed));
    let encoder = Encoder::Dfa(DfaEncoder::new(dfa, only_repeating_indices(10), 0));
    assert_eq!(encoder.count_to_body(1).expect("encode"), "11");
    assert_eq!(encoder.count_to_body(2).expect("encode"), "22");
    assert_eq!(encoder.body_to_count("3,434,433").expect("decode"), {
        let roundtrip = encoder
            .count_to_body(encoder.body_to_count("3,434,433").expect("decode"))
            .expect("encode");
        assert_eq!(roundtrip, "3434433");
        encoder.body_to_count("3434433").expect("decode")
    });
    roundtrip(&encoder, 1..400);
}

proptest! {
    #[test]
    fn base_ten_roundtrip_holds_for_large_counts(count in 0u128..u64::MAX as u128) {
        let encoder = Encoder::BaseN(10);
        let body = encoder.count_to_body(count).expect("encode");
        prop_assert_eq!(encoder.body_to_count(&body).expect("decode"), count);
    }

    #[test]
    fn bijective_roundtrip_holds_for_large_counts(count in 1u128..u64::MAX as u128) {
        let encoder = Encoder::BijectiveBaseN(3);
        let body = encoder.count_to_body(count).expect("encode");
        prop_assert_eq!(encoder.body_to_count(&body).expect("decode"), count);
    }
}
