//! Binding side-thread names and root posts to their descriptors.
//!
//! A [`SideThread`] bundles the three things the engine needs to know about
//! a thread: its form, its rule, and (when the thread can be tallied
//! precisely) its encoder. The [`Registry`] owns the built-in table of known
//! threads and the mapping from side-thread root ids to names, loaded from a
//! plain `[threads]` configuration section.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use tally_core::units::{DAY, HOUR, MINUTE};
use tally_core::{CountRecord, PostId};
use tracing::info;

use crate::dfa::{
    mostly_repeating_indices, no_consecutive_indices, no_repeating_indices,
    no_successive_indices, not_any_indices, only_consecutive_indices, only_repeating_indices,
    Dfa, DfaEncoder, DfaKind,
};
use crate::encode::{Collatz, CountResult, Encoder};
use crate::form::Form;
use crate::fuzzy::WordAlphabet;
use crate::parsing;
use crate::rules::{HistoryPost, Rule};
use crate::DEFAULT_THREAD_LENGTH;

const LOG_TARGET: &str = "tally::registry";

/// How a directory row's running total advances when new submissions are
/// linked onto the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    /// Add the thread length per completed submission.
    FromLength,
    /// Re-derive the total from the newest submission's title.
    FromEncoder,
    /// Date threads: each submission covers three years of days.
    FromTitleYears { previous: bool },
    /// The total can only be found by walking the comments; left to the
    /// caller.
    FromTraversal,
}

#[derive(Debug, Clone)]
pub struct SideThread {
    pub form: Form,
    pub rule: Rule,
    pub encoder: Option<Encoder>,
    pub length_hint: Option<u32>,
    pub update: Update,
}

impl Default for SideThread {
    fn default() -> Self {
        Self::new()
    }
}

impl SideThread {
    pub fn new() -> Self {
        Self {
            form: Form::Permissive,
            rule: Rule::default(),
            encoder: None,
            length_hint: Some(DEFAULT_THREAD_LENGTH),
            update: Update::FromLength,
        }
    }

    pub fn form(mut self, form: Form) -> Self {
        self.form = form;
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rule = rule;
        self
    }

    pub fn encoder(mut self, encoder: Encoder) -> Self {
        self.encoder = Some(encoder);
        if self.update == Update::FromLength {
            self.update = Update::FromEncoder;
        }
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length_hint = Some(length);
        self.update = Update::FromLength;
        self
    }

    pub fn unknown_length(mut self) -> Self {
        self.length_hint = None;
        self
    }

    pub fn update(mut self, update: Update) -> Self {
        self.update = update;
        self
    }

    /// The thread length used for get validation.
    pub fn length_or_default(&self) -> u32 {
        self.length_hint.unwrap_or(DEFAULT_THREAD_LENGTH)
    }

    pub fn looks_like_count(&self, body: &str) -> bool {
        self.form.looks_like_count(body)
    }

    /// Position of a body, through the thread's encoder or the base-10
    /// default.
    pub fn body_to_count(&self, body: &str) -> CountResult<u128> {
        match &self.encoder {
            Some(encoder) => encoder.body_to_count(body),
            None => Ok(parsing::find_count_in_text(body, 10)?),
        }
    }

    /// The id of the first record violating the thread's rule, if any.
    pub fn first_invalid(&self, records: &[CountRecord]) -> Option<PostId> {
        let history: Vec<HistoryPost<'_>> = records.iter().map(Into::into).collect();
        let mask = self.rule.is_valid(&history);
        mask.iter()
            .position(|&ok| !ok)
            .map(|index| records[index].id.clone())
    }

    /// Advance a directory total across newly linked submissions. Revival
    /// submissions re-open archived chains and are not counted.
    pub fn update_count(&self, old_count: u128, chain_titles: &[String]) -> Option<u128> {
        let live: Vec<&String> = chain_titles
            .iter()
            .filter(|title| !parsing::is_revived(title))
            .collect();
        match self.update {
            Update::FromLength => {
                let completed = live.len().saturating_sub(1) as u128;
                Some(old_count + u128::from(self.length_or_default()) * completed)
            }
            Update::FromEncoder => {
                let title = live.last()?;
                self.body_to_count(&parsing::body_from_title(title)).ok()
            }
            Update::FromTitleYears { previous } => {
                let range: &[&String] = if previous {
                    live.get(1..).unwrap_or(&[])
                } else {
                    &live[..live.len().saturating_sub(1)]
                };
                let mut count = old_count;
                for title in range {
                    let year = trailing_year(title)?;
                    let leap = (year..year + 3).any(is_leap_year);
                    count += 1095 + u128::from(leap);
                }
                Some(count)
            }
            Update::FromTraversal => None,
        }
    }
}

fn trailing_year(title: &str) -> Option<u64> {
    let digits: String = title
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .collect::<String>()
        .chars()
        .rev()
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

fn is_leap_year(year: u64) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// The 118 element symbols, for the periodic-table thread.
const ELEMENTS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn",
    "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

const PLANETS: [&str; 8] = [
    "mercury", "venus", "earth", "mars", "jupiter", "saturn", "uranus", "neptune",
];

const COLORS: [&str; 7] = ["red", "orange", "yellow", "green", "blue", "indigo", "violet"];

const COLORED_SQUARES: [char; 10] = [
    '\u{2B1B}', '\u{FE0F}', '\u{1F7EB}', '\u{1F7EA}', '\u{1F7E6}', '\u{1F7E9}', '\u{1F7E8}',
    '\u{1F7E7}', '\u{1F7E5}', '\u{2B1C}',
];

/// Threads that follow the default descriptor apart from their length.
const FIXED_LENGTH_THREADS: [(&str, u32); 8] = [
    ("eban", 800),
    ("factoradic", 720),
    ("feet and inches", 600),
    ("hoi4 states", 806),
    ("ipv4", 1024),
    ("lucas numbers", 200),
    ("seconds minutes hours", 1200),
    ("time", 900),
];

/// Threads we cannot check the contents of.
const NO_VALIDATION_THREADS: [(&str, Option<u32>); 18] = [
    ("acronyms", Some(676)),
    ("base 40", Some(1600)),
    ("base 60", Some(900)),
    ("base 62", Some(992)),
    ("base 64", Some(1024)),
    ("base 93", Some(930)),
    ("bijective base 205", Some(1025)),
    ("cards", Some(676)),
    ("degrees", Some(900)),
    ("iterate each letter", None),
    ("letters", Some(676)),
    ("musical notes", Some(1008)),
    ("octal letter stack", Some(1024)),
    ("palindromes - letters", Some(676)),
    ("permutations - letters", None),
    ("previous_dates", None),
    ("qwerty alphabet", Some(676)),
    ("youtube", Some(1024)),
];

/// Base-10 threads with the standard length and rule; only their topic
/// differs.
const DEFAULT_TOPIC_THREADS: [&str; 48] = [
    "10 at a time",
    "3 or fewer palindromes",
    "69, 420, or 666",
    "age",
    "all even or all odd",
    "by 0.025s",
    "by 0.02s",
    "by 0.05s",
    "by 1000s",
    "by 10s",
    "by 11s",
    "by 123s",
    "by 12s",
    "by 20s",
    "by 23s",
    "by 29s",
    "by 2s even",
    "by 2s odd",
    "by 40s",
    "by 50s",
    "by 64s",
    "by 69s",
    "by 6s",
    "by 8s",
    "by meters",
    "by one-hundredths",
    "california license plates",
    "decimal",
    "four squares",
    "n read as base n number",
    "negative numbers",
    "palindromes",
    "powers of 2",
    "prime factorization",
    "prime numbers",
    "rational numbers",
    "rotational symmetry",
    "scientific notation",
    "sheep",
    "street view counting",
    "thread completion",
    "top subreddits",
    "triangular numbers",
    "unordered consecutive digits",
    "william the conqueror",
    "word association",
    "base of previous digit",
    "divisors",
];

/// Threads whose length varies per submission; totals come from walking the
/// comments.
const TRAVERSAL_THREADS: [&str; 23] = [
    "2d tug of war",
    "boost 5",
    "by battery percentage",
    "by coad rank",
    "by comment karma",
    "by counters met irl",
    "by day of the week",
    "by day of the year",
    "by digits in total karma",
    "by gme increase/decrease",
    "by hoc rank",
    "by how well your day is going",
    "by length of username",
    "by number of post upvotes",
    "by random number (1-1000)",
    "by random number",
    "by timestamp seconds",
    "check-in streak",
    "nim",
    "pick from five",
    "post karma",
    "total karma",
    "tug of war",
];

pub struct Registry {
    threads: HashMap<String, SideThread>,
    ids: HashMap<PostId, String>,
    fallback: SideThread,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            threads: built_in_threads(),
            ids: HashMap::new(),
            fallback: SideThread::new().form(Form::base_n(10)),
        }
    }

    /// Load the `[threads]` section of a registry file: one
    /// `root_id = thread name` line per registered side thread.
    pub fn load_thread_ids(mut self, text: &str) -> Self {
        let mut in_section = false;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                in_section = section.trim() == "threads";
                continue;
            }
            if !in_section {
                continue;
            }
            let Some((id, name)) = line.split_once('=') else {
                continue;
            };
            if let Ok(id) = PostId::from_str(id.trim()) {
                self.ids.insert(id, name.trim().to_owned());
            }
        }
        self
    }

    pub fn thread_names(&self) -> impl Iterator<Item = &str> {
        self.threads.keys().map(String::as_str)
    }

    pub fn by_name(&self, name: &str) -> Option<&SideThread> {
        self.threads.get(name)
    }

    /// The descriptor for a named thread, falling back to the permissive
    /// default when the name is unknown.
    pub fn get(&self, name: &str) -> &SideThread {
        if let Some(thread) = self.threads.get(name) {
            return thread;
        }
        if name != "default" {
            info!(
                target: LOG_TARGET,
                thread = name,
                "no rule found; not validating contents, assuming length 1000 and no double counting"
            );
        }
        &self.fallback
    }

    /// The thread name registered for a side thread's first submission.
    pub fn name_for_root(&self, root: &PostId) -> Option<&str> {
        self.ids.get(root).map(String::as_str)
    }

    /// Descriptor lookup by chain root, with the same fallback as
    /// [`Self::get`].
    pub fn for_root(&self, root: &PostId) -> &SideThread {
        match self.name_for_root(root) {
            Some(name) => self.get(name),
            None => {
                info!(
                    target: LOG_TARGET,
                    %root,
                    "side thread root is not registered; using the default descriptor"
                );
                &self.fallback
            }
        }
    }
}

fn built_in_threads() -> HashMap<String, SideThread> {
    let base_10 = Form::base_n(10);
    let roman = Form::any_of_chars("IVXLCDM\u{2181}\u{2182}\u{2187}");
    let compressed = Arc::new(Dfa::new(10, DfaKind::Compressed));
    let bitmask = Arc::new(Dfa::new(10, DfaKind::Histogram { n_states: 2 }));
    let isenary = WordAlphabet::from_entries(
        [
            ("they're", 1),
            ("taking", 2),
            ("the", 3),
            ("hobbits", 4),
            ("to", 5),
            ("isengard", 0),
            ("gard", 0),
        ],
        6,
    );

    let mut threads: HashMap<String, SideThread> = HashMap::new();
    let mut add = |name: &str, thread: SideThread| {
        threads.insert(name.to_owned(), thread);
    };

    add("-illion", SideThread::new().form(Form::Illion).length(1000));
    add(
        "2d20 experimental v theoretical",
        SideThread::new().form(Form::D20).length(1000),
    );
    add(
        "balanced ternary",
        SideThread::new().form(Form::any_of_chars("T-0+")).length(729),
    );
    add("base 16 roman", SideThread::new().form(roman.clone()));
    add(
        "base 2i",
        SideThread::new().form(Form::base_n(4)).encoder(Encoder::GaussianInteger),
    );
    add(
        "beenary",
        SideThread::new().form(Form::any_of_words(["bee", "movie"])).length(1024),
    );
    add(
        "bijective base 2",
        SideThread::new()
            .form(Form::base_n(3))
            .encoder(Encoder::BijectiveBaseN(2))
            .length(1024),
    );
    add(
        "binary encoded decimal",
        SideThread::new().form(Form::base_n(2)).encoder(Encoder::BinaryCodedDecimal),
    );
    add(
        "binary encoded hexadecimal",
        SideThread::new().form(Form::base_n(2)).length(1024),
    );
    add("by 3s in base 7", SideThread::new().form(Form::base_n(7)));
    for stride in [3u128, 4, 5, 7, 99] {
        add(
            &format!("by {stride}s"),
            SideThread::new().form(base_10.clone()).encoder(Encoder::ByK(stride)),
        );
    }
    add(
        "collatz conjecture",
        SideThread::new()
            .form(base_10.clone())
            .encoder(Encoder::Collatz(Collatz::default())),
    );
    add(
        "colored squares",
        SideThread::new()
            .form(Form::any_of_words(COLORED_SQUARES.map(String::from)))
            .length(729),
    );
    add("cyclical bases", SideThread::new().form(Form::base_n(16)));
    add(
        "dates",
        SideThread::new()
            .form(base_10.clone())
            .update(Update::FromTitleYears { previous: false }),
    );
    add(
        "decimal encoded sexagesimal",
        SideThread::new().form(base_10.clone()).length(900),
    );
    add("dollars and cents", SideThread::new().form(Form::base_n(4)));
    add(
        "double increasing",
        SideThread::new()
            .form(base_10.clone())
            .encoder(Encoder::Increasing { sequences: 2 }),
    );
    add(
        "fast or slow",
        SideThread::new().rule(Rule::FastOrSlow {
            fast_secs: 10,
            slow_secs: HOUR,
        }),
    );
    add("four fours", SideThread::new().form(Form::any_of_chars("4")));
    add(
        "increasing sequences",
        SideThread::new()
            .form(base_10.clone())
            .encoder(Encoder::Increasing { sequences: 1 }),
    );
    add(
        "invisible numbers",
        SideThread::new().form(Form::BaseN {
            base: 10,
            strip_links: false,
        }),
    );
    add(
        "isenary",
        SideThread::new()
            .form(Form::any_of_words([
                "they're", "taking", "the", "hobbits", "to", "isengard", "gard",
            ]))
            .encoder(Encoder::WordList {
                alphabet: isenary,
                bijective: false,
                elements: false,
                ignored: "!>",
            }),
    );
    add(
        "japanese",
        SideThread::new().form(Form::any_of_chars("一二三四五六七八九十百千")),
    );
    add(
        "letter permutations",
        SideThread::new().encoder(Encoder::Permutations {
            alphabet: "abcdefghijklmnopqrstuvwxyz",
        }),
    );
    add(
        "mayan numerals",
        SideThread::new().form(Form::any_of_chars("Ø1234|-")).length(800),
    );
    add(
        "no repeating digits",
        SideThread::new().form(base_10.clone()).encoder(Encoder::Dfa(DfaEncoder::new(
            Arc::clone(&compressed),
            no_repeating_indices(10),
            0,
        ))),
    );
    add(
        "no repeating letters",
        SideThread::new().encoder(Encoder::NoRepeatingLetters),
    );
    add(
        "no successive digits",
        SideThread::new().form(base_10.clone()).encoder(Encoder::Dfa(DfaEncoder::new(
            Arc::new(Dfa::new(10, DfaKind::LastSymbol)),
            no_successive_indices(10),
            0,
        ))),
    );
    add(
        "o/l binary",
        SideThread::new().form(Form::any_of_chars("ol")).length(1024),
    );
    add(
        "once per thread",
        SideThread::new().form(base_10.clone()).rule(Rule::once_per_thread()),
    );
    add(
        "only double counting",
        SideThread::new().form(base_10.clone()).rule(Rule::OnlyDoubleCounting),
    );
    add(
        "only repeating digits",
        SideThread::new().form(base_10.clone()).encoder(Encoder::Dfa(DfaEncoder::new(
            Arc::clone(&compressed),
            only_repeating_indices(10),
            0,
        ))),
    );
    add(
        "mostly repeating digits",
        SideThread::new().form(base_10.clone()).encoder(Encoder::Dfa(DfaEncoder::new(
            Arc::clone(&compressed),
            mostly_repeating_indices(10),
            0,
        ))),
    );
    add(
        "no consecutive digits",
        SideThread::new().form(base_10.clone()).encoder(Encoder::Dfa(DfaEncoder::new(
            Arc::clone(&bitmask),
            no_consecutive_indices(10),
            0,
        ))),
    );
    add(
        "only consecutive digits",
        SideThread::new().form(base_10.clone()).encoder(Encoder::Dfa(DfaEncoder::new(
            Arc::clone(&bitmask),
            only_consecutive_indices(10),
            9,
        ))),
    );
    add(
        "not any of those",
        SideThread::new().form(base_10.clone()).encoder(Encoder::Dfa(DfaEncoder::new(
            Arc::new(Dfa::new(10, DfaKind::NotAnyOfThose)),
            not_any_indices(10),
            0,
        ))),
    );
    add("parentheses", SideThread::new().form(Form::any_of_chars("()")));
    add(
        "periodic table",
        SideThread::new()
            .form(Form::any_of_words(ELEMENTS))
            .encoder(Encoder::WordList {
                alphabet: WordAlphabet::from_list(ELEMENTS, true),
                bijective: true,
                elements: true,
                ignored: ">",
            }),
    );
    add(
        "permutations",
        SideThread::new().form(base_10.clone()).encoder(Encoder::Permutations {
            alphabet: "123456789",
        }),
    );
    add(
        "previous dates",
        SideThread::new()
            .form(base_10.clone())
            .update(Update::FromTitleYears { previous: true }),
    );
    add(
        "planetary octal",
        SideThread::new()
            .form(Form::any_of_words(PLANETS))
            .encoder(Encoder::word_list(WordAlphabet::from_list(PLANETS, false))),
    );
    add(
        "powerball",
        SideThread::new().form(base_10.clone()).encoder(Encoder::Powerball),
    );
    add(
        "rainbow",
        SideThread::new()
            .form(Form::any_of_words(COLORS))
            .encoder(Encoder::word_list(WordAlphabet::from_list(COLORS, false))),
    );
    add(
        "reddit usernames",
        SideThread::new().form(Form::Username).length(722),
    );
    add("roman progressbar", SideThread::new().form(roman.clone()));
    add("roman", SideThread::new().form(roman));
    add(
        "slow",
        SideThread::new().form(base_10.clone()).rule(Rule::time_gap(MINUTE, 0)),
    );
    add(
        "slower",
        SideThread::new().form(base_10.clone()).rule(Rule::time_gap(0, HOUR)),
    );
    add(
        "slowestest",
        SideThread::new().form(base_10.clone()).rule(Rule::time_gap(HOUR, DAY)),
    );
    add("symbols", SideThread::new().form(Form::any_of_chars("!@#$%^&*()")));
    add("throwaways", SideThread::new().form(Form::Throwaway));
    add(
        "triple increasing",
        SideThread::new()
            .form(base_10.clone())
            .encoder(Encoder::Increasing { sequences: 3 }),
    );
    add(
        "twitter handles",
        SideThread::new().form(Form::any_of_chars("@")).length(1369),
    );
    add("unary", SideThread::new().form(Form::any_of_chars("|")));
    add(
        "unicode",
        SideThread::new().form(Form::base_n(16)).length(1024),
    );
    add("using 12345", SideThread::new().form(Form::any_of_chars("12345")));
    add(
        "valid brainfuck programs",
        SideThread::new().form(Form::any_of_chars("><+-.,[]")),
    );
    for wait in [2u32, 3, 4, 9, 10] {
        add(
            &format!("wait {wait}"),
            SideThread::new().form(base_10.clone()).rule(Rule::wait(wait)),
        );
    }
    add("wait 2 - letters", SideThread::new().rule(Rule::wait(2)));
    add(
        "wait 5s",
        SideThread::new().form(base_10.clone()).rule(Rule::time_gap(5, 0)),
    );
    add(
        "wave",
        SideThread::new().form(base_10.clone()).encoder(Encoder::Wave),
    );

    for base in 2u32..=36 {
        add(
            &format!("base {base}"),
            SideThread::new().form(Form::base_n(base)).encoder(Encoder::BaseN(base)),
        );
    }

    for name in DEFAULT_TOPIC_THREADS {
        add(name, SideThread::new().form(base_10.clone()).length(1000));
    }
    for (name, length) in FIXED_LENGTH_THREADS {
        add(name, SideThread::new().form(base_10.clone()).length(length));
    }
    for (name, length) in NO_VALIDATION_THREADS {
        let thread = match length {
            Some(length) => SideThread::new().length(length),
            None => SideThread::new().unknown_length(),
        };
        add(name, thread);
    }
    for name in TRAVERSAL_THREADS {
        add(
            name,
            SideThread::new()
                .form(base_10.clone())
                .unknown_length()
                .update(Update::FromTraversal),
        );
    }

    threads
}
