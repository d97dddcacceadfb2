//! Extracting count tokens, urls and directory tables from messy post
//! bodies.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use snafu::Snafu;
use tally_core::PostId;

use crate::ALPHANUMERIC;

/// Non-whitespace thousands separators people actually use in counts.
const SEPARATORS: [char; 7] = ['\'', '’', '\u{202f}', ',', '.', '*', '/'];

/// Markdown links, with escaped parens tolerated inside the url.
static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]*)\]\(((?:[^)\\]|\\.)+?)\)").expect("static regex")
});

/// Everything that looks like `/comments/<id>[/<slug>/<id>]`.
static COMMENT_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/comments/(\w+)(?:/[^/\s)]*/(\w*))?").expect("static regex"));

/// Opaque short links that need a network round-trip to resolve.
static SHORT_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/r/counting/s/([A-Za-z0-9]+)").expect("static regex"));

static REVIVAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(*reviv\w*\)*").expect("static regex"));

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(display("no count token in base {base} at the start of {body:?}"))]
pub struct NotACount {
    pub body: String,
    pub base: u32,
}

/// Replace all markdown links of the form `[description](url)` with
/// `description`.
pub fn strip_markdown_links(body: &str) -> String {
    MARKDOWN_LINK.replace_all(body, "$1").into_owned()
}

/// Find markdown links in a body, as `(description, url)` pairs.
pub fn parse_markdown_links(body: &str) -> Vec<(String, String)> {
    MARKDOWN_LINK
        .captures_iter(body)
        .map(|cap| (cap[1].to_owned(), cap[2].to_owned()))
        .collect()
}

/// The first non-empty line of a body, with markdown links reduced to their
/// descriptions and surrounding whitespace removed. Normalising twice is a
/// no-op.
pub fn normalize_body(body: &str) -> String {
    let first_line = body
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("");
    strip_markdown_links(first_line).trim().to_owned()
}

/// Extract a normalised base-n representation of an integer from a messy
/// post body.
///
/// The first non-empty line is stripped of links, whitespace and one set of
/// permitted thousands separators, lowercased, and the longest leading run
/// of base-n digits is the token. An empty run fails with [`NotACount`].
pub fn extract_count_string(body: &str, base: u32) -> Result<String, NotACount> {
    let alphabet = &ALPHANUMERIC[..base as usize];
    let squeezed: String = normalize_body(body)
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && !SEPARATORS.contains(c))
        .collect();
    let token: String = squeezed.chars().take_while(|c| alphabet.contains(*c)).collect();
    if token.is_empty() {
        return Err(NotACount {
            body: body.to_owned(),
            base,
        });
    }
    Ok(token)
}

/// Extract a base-n integer from a post body.
pub fn find_count_in_text(body: &str, base: u32) -> Result<u128, NotACount> {
    let token = extract_count_string(body, base)?;
    u128::from_str_radix(&token, base).map_err(|_| NotACount {
        body: body.to_owned(),
        base,
    })
}

/// All `(submission_id, comment_id)` pairs linked from a body. The comment
/// id is absent when someone linked a bare submission.
pub fn find_urls_in_text(body: &str) -> Vec<(PostId, Option<PostId>)> {
    COMMENT_URL
        .captures_iter(body)
        .filter_map(|cap| {
            let submission = PostId::from_str(&cap[1]).ok()?;
            let comment = cap
                .get(2)
                .map(|m| m.as_str())
                .filter(|s| !s.is_empty())
                .and_then(|s| PostId::from_str(s).ok());
            Some((submission, comment))
        })
        .collect()
}

/// Opaque short-link tokens in a body; resolving them needs the post source.
pub fn find_short_links(body: &str) -> Vec<String> {
    SHORT_LINK
        .captures_iter(body)
        .map(|cap| cap[1].to_owned())
        .collect()
}

/// The part of a submission title that holds the current state, by
/// convention everything after the first pipe.
pub fn body_from_title(title: &str) -> String {
    match title.split_once('|') {
        Some((_, rest)) => rest.to_owned(),
        None => String::new(),
    }
}

/// Whether a title marks the submission as a revival of an archived chain.
pub fn is_revived(title: &str) -> bool {
    REVIVAL.is_match(&title.to_lowercase())
}

/// Normalise a title for a directory table: square brackets and literal
/// pipes would break the markdown table, and revival markers are
/// standardised.
pub fn normalise_title(title: &str) -> String {
    let title: String = title
        .chars()
        .map(|c| match c {
            '[' => '(',
            ']' => ')',
            other => other,
        })
        .collect();
    let title = title.replace('|', "&#124;");
    match REVIVAL.find(&title.to_lowercase()) {
        Some(m) => {
            let (start, end) = (m.start(), m.end());
            format!("{}(Revival){}", &title[..start], &title[end..])
        }
        None => title,
    }
}

/// One row of a directory table: the thread's name and first submission,
/// the current submission/comment, and the running total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRow {
    pub name: String,
    pub first_submission: PostId,
    pub title: String,
    pub submission_id: PostId,
    pub comment_id: Option<PostId>,
    pub count: String,
}

impl DirectoryRow {
    pub fn to_markdown(&self) -> String {
        let comment = self
            .comment_id
            .as_ref()
            .map(|c| format!("/_/{c}"))
            .unwrap_or_default();
        format!(
            "[{}](/{}) | [{}](/comments/{}{}) | {}",
            self.name,
            self.first_submission,
            normalise_title(&self.title),
            self.submission_id,
            comment,
            self.count
        )
    }
}

/// A directory page split into prose and tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryChunk {
    Text(String),
    Table(Vec<DirectoryRow>),
}

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(display("directory row is not of the form name | current | count: {row:?}"))]
pub struct MalformedRow {
    pub row: String,
}

/// Extract the side-thread attributes from one markdown table row.
pub fn parse_row(markdown_row: &str) -> Result<DirectoryRow, MalformedRow> {
    let err = || MalformedRow {
        row: markdown_row.to_owned(),
    };
    let mut fields = markdown_row.splitn(3, '|');
    let (first, current, count) = (
        fields.next().ok_or_else(err)?,
        fields.next().ok_or_else(err)?,
        fields.next().ok_or_else(err)?,
    );
    let (name, first_link) = parse_markdown_links(first).into_iter().next().ok_or_else(err)?;
    let first_submission = first_link
        .trim()
        .trim_start_matches('/')
        .parse()
        .map_err(|_| err())?;
    let (title, link) = parse_markdown_links(current).into_iter().next().ok_or_else(err)?;
    let (submission_id, comment_id) = find_urls_in_text(&link).into_iter().next().ok_or_else(err)?;
    Ok(DirectoryRow {
        name: name.trim().to_owned(),
        first_submission,
        title: title.trim().to_owned(),
        submission_id,
        comment_id,
        count: count.trim().to_owned(),
    })
}

/// Tag each paragraph of a directory page as prose or a parsed table.
///
/// A paragraph is a table when every line contains at least two pipes; the
/// first two lines of a table are its header and alignment row.
pub fn parse_directory_page(page: &str) -> Vec<DirectoryChunk> {
    let mut chunks = Vec::new();
    let mut text: Vec<&str> = Vec::new();
    for paragraph in page.split("\n\n") {
        let lines: Vec<&str> = paragraph.lines().filter(|l| !l.is_empty()).collect();
        let is_table = !lines.is_empty()
            && lines.iter().all(|line| line.matches('|').count() >= 2);
        if !is_table {
            text.push(paragraph);
            continue;
        }
        chunks.push(DirectoryChunk::Text(text.join("\n\n")));
        text.clear();
        let rows = lines[2.min(lines.len())..]
            .iter()
            .filter_map(|row| parse_row(row).ok())
            .collect();
        chunks.push(DirectoryChunk::Table(rows));
    }
    if !text.is_empty() {
        chunks.push(DirectoryChunk::Text(text.join("\n\n")));
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_links() {
        assert_eq!(
            strip_markdown_links("[2,000,000](/comments/abc123/_/def456) and on"),
            "2,000,000 and on"
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let bodies = [
            "  [1,234,567](/comments/abc/_/def)\nsecond line",
            "\n\n42 is the answer",
            "plain text",
        ];
        for body in bodies {
            let once = normalize_body(body);
            assert_eq!(normalize_body(&once), once);
        }
    }

    #[test]
    fn extracts_counts_through_separators() {
        assert_eq!(extract_count_string("1 234 567", 10).expect("count"), "1234567");
        assert_eq!(extract_count_string("1,234,567 cool!", 10).expect("count"), "1234567");
        assert_eq!(extract_count_string("2'171'000", 10).expect("count"), "2171000");
        assert_eq!(extract_count_string("1A2B", 16).expect("count"), "1a2b");
    }

    #[test]
    fn rejects_bodies_without_leading_count() {
        assert!(extract_count_string("hello 123", 10).is_err());
        assert!(extract_count_string("", 10).is_err());
    }

    #[test]
    fn finds_comment_urls() {
        let body = "previous [get](/r/counting/comments/8w151j/title_here/e1rvbvp)";
        let urls = find_urls_in_text(body);
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].0.as_str(), "8w151j");
        assert_eq!(urls[0].1.as_ref().expect("comment id").as_str(), "e1rvbvp");
    }

    #[test]
    fn finds_bare_submission_urls() {
        let urls = find_urls_in_text("see /comments/abc123");
        assert_eq!(urls, vec![("abc123".parse().expect("id"), None)]);
    }

    #[test]
    fn finds_short_links() {
        assert_eq!(
            find_short_links("https://www.reddit.com/r/counting/s/AbCd123"),
            vec!["AbCd123".to_owned()]
        );
    }

    #[test]
    fn title_bodies_and_revivals() {
        assert_eq!(body_from_title("Slow | 12 345"), " 12 345");
        assert!(is_revived("Base 16 (Revival)"));
        assert!(!is_revived("Base 16"));
        assert_eq!(
            normalise_title("slow [continued] (revived)"),
            "slow (continued) (Revival)"
        );
    }

    #[test]
    fn parses_directory_rows() {
        let row = "[slow](/aaaa1) | [Slow Thread (2,000)](/comments/bbbb2/_/cccc3) | 2,000";
        let parsed = parse_row(row).expect("row");
        assert_eq!(parsed.name, "slow");
        assert_eq!(parsed.first_submission.as_str(), "aaaa1");
        assert_eq!(parsed.submission_id.as_str(), "bbbb2");
        assert_eq!(parsed.comment_id.as_ref().expect("comment").as_str(), "cccc3");
        assert_eq!(parsed.count, "2,000");
        assert!(parse_row("no pipes here").is_err());
    }

    #[test]
    fn splits_directory_pages() {
        let page = "Intro paragraph\n\n\
            Name &amp; Initial Thread|Current Thread|# of Counts\n\
            :--:|:--:|--:\n\
            [slow](/aaaa1) | [Slow (2,000)](/comments/bbbb2/_/cccc3) | 2,000\n\n\
            Outro";
        let chunks = parse_directory_page(page);
        assert_eq!(chunks.len(), 3);
        assert!(matches!(&chunks[0], DirectoryChunk::Text(t) if t == "Intro paragraph"));
        assert!(matches!(&chunks[1], DirectoryChunk::Table(rows) if rows.len() == 1));
        assert!(matches!(&chunks[2], DirectoryChunk::Text(t) if t == "Outro"));
    }
}
