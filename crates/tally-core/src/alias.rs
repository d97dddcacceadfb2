use std::collections::{HashMap, HashSet};

/// Username equivalences for tabulation, plus the small static sets of
/// moderators and usernames excluded from counting.
///
/// The alias file is line based: `canonical,alias1,alias2,...`. Every name on
/// a line maps to the first entry, the canonical one included, so lookups
/// never need a fallback branch for registered users.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
    mods: HashSet<String>,
    ignored: HashSet<String>,
}

impl AliasTable {
    pub fn parse(text: &str) -> Self {
        let mut aliases = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut names = line.split(',').map(str::trim).filter(|s| !s.is_empty());
            let Some(canonical) = names.next() else {
                continue;
            };
            aliases.insert(canonical.to_owned(), canonical.to_owned());
            for alias in names {
                aliases.insert(alias.to_owned(), canonical.to_owned());
            }
        }
        Self {
            aliases,
            ..Self::default()
        }
    }

    pub fn with_mods<I, S>(mut self, mods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mods = mods.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ignored<I, S>(mut self, ignored: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored = ignored.into_iter().map(Into::into).collect();
        self
    }

    /// The canonical username, or the input unchanged for unregistered users.
    pub fn canonical<'a>(&'a self, username: &'a str) -> &'a str {
        self.aliases.get(username).map_or(username, String::as_str)
    }

    pub fn is_mod(&self, username: &str) -> bool {
        self.mods.contains(username)
    }

    /// Counts by these users are skipped during validation.
    pub fn is_ignored(&self, username: &str) -> bool {
        username == "[deleted]" || self.ignored.contains(username)
    }
}
