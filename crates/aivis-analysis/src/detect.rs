//! Text analysis of a model answer: brand mentions, entity rank, and cited URLs.

use std::collections::HashSet;
use std::sync::LazyLock;

use aivis_core::Citation;
use regex::Regex;

static MARKDOWN_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]+)\]\((https?://[^\s)]+)\)").expect("valid markdown link regex")
});
static BARE_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>\[\]()]+").expect("valid url regex"));

const SNIPPET_MAX_CHARS: usize = 200;
const TRAILING_URL_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '"', '\''];

/// Case-insensitive whole-word matcher for an entity name.
///
/// Word boundaries are only enforced on edges where the name itself starts
/// or ends with a word character, so names like `C++` still match.
fn name_pattern(name: &str) -> Option<Regex> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }
    let starts_word = trimmed.chars().next().is_some_and(char::is_alphanumeric);
    let ends_word = trimmed.chars().last().is_some_and(char::is_alphanumeric);
    let pattern = format!(
        "(?i){}{}{}",
        if starts_word { r"\b" } else { "" },
        regex::escape(trimmed),
        if ends_word { r"\b" } else { "" },
    );
    Regex::new(&pattern).ok()
}

/// Byte offsets of every mention of `name` in `text`.
#[must_use]
pub fn mention_offsets(text: &str, name: &str) -> Vec<usize> {
    name_pattern(name)
        .map(|re| re.find_iter(text).map(|m| m.start()).collect())
        .unwrap_or_default()
}

/// `true` if `name` appears in `text` as a whole word, ignoring case.
#[must_use]
pub fn detect_mention(text: &str, name: &str) -> bool {
    name_pattern(name).is_some_and(|re| re.is_match(text))
}

/// 1-based ordinal of each named entity among those mentioned, ordered by first
/// appearance. Entities that never appear get `None`.
///
/// Ties on the same offset (one name containing another) resolve to the
/// earlier entry in `names`.
#[must_use]
pub fn extract_ranks(text: &str, names: &[&str]) -> Vec<Option<u32>> {
    let firsts: Vec<Option<usize>> = names
        .iter()
        .map(|name| mention_offsets(text, name).first().copied())
        .collect();

    let mut order: Vec<(usize, usize)> = firsts
        .iter()
        .enumerate()
        .filter_map(|(idx, first)| first.map(|offset| (offset, idx)))
        .collect();
    order.sort_unstable();

    let mut ranks = vec![None; names.len()];
    for (rank, (_, idx)) in order.into_iter().enumerate() {
        ranks[idx] = u32::try_from(rank + 1).ok();
    }
    ranks
}

/// Rank of `brand` among itself and `competitors`.
#[must_use]
pub fn extract_rank(text: &str, brand: &str, competitors: &[&str]) -> Option<u32> {
    let mut names = Vec::with_capacity(competitors.len() + 1);
    names.push(brand);
    names.extend_from_slice(competitors);
    extract_ranks(text, &names).first().copied().flatten()
}

/// URLs cited in the answer, in order of first appearance.
///
/// Markdown links `[title](url)` keep their title; bare `http(s)://` URLs have
/// none. Duplicate URLs are collapsed onto their first occurrence.
#[must_use]
pub fn extract_citations(text: &str) -> Vec<Citation> {
    let mut found: Vec<(usize, Option<String>, String)> = Vec::new();
    let mut covered: Vec<(usize, usize)> = Vec::new();

    for caps in MARKDOWN_LINK_RE.captures_iter(text) {
        let (Some(whole), Some(title), Some(url)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        covered.push((whole.start(), whole.end()));
        found.push((
            whole.start(),
            Some(title.as_str().trim().to_string()),
            clean_url(url.as_str()),
        ));
    }

    for m in BARE_URL_RE.find_iter(text) {
        if covered
            .iter()
            .any(|&(start, end)| m.start() >= start && m.start() < end)
        {
            continue;
        }
        found.push((m.start(), None, clean_url(m.as_str())));
    }

    found.sort_by_key(|(offset, _, _)| *offset);

    let mut seen = HashSet::new();
    let mut citations = Vec::new();
    for (offset, title, url) in found {
        if url.is_empty() || !seen.insert(url.clone()) {
            continue;
        }
        let position = u32::try_from(citations.len() + 1).unwrap_or(u32::MAX);
        citations.push(Citation {
            title,
            snippet: sentence_around(text, offset),
            url,
            position,
        });
    }
    citations
}

fn clean_url(raw: &str) -> String {
    raw.trim_end_matches(TRAILING_URL_PUNCTUATION).to_string()
}

/// The sentence containing byte `offset`, truncated to a snippet.
#[must_use]
pub fn sentence_around(text: &str, offset: usize) -> Option<String> {
    let offset = offset.min(text.len());
    let before = text.get(..offset)?;
    let start = before
        .char_indices()
        .rev()
        .find(|&(i, c)| c == '\n' || (is_terminal_punct(c) && next_is_space(text, i)))
        .map_or(0, |(i, c)| i + c.len_utf8());

    let after = text.get(offset..)?;
    let end = after
        .char_indices()
        .find(|&(i, c)| c == '\n' || (is_terminal_punct(c) && next_is_space(after, i)))
        .map_or(text.len(), |(i, c)| offset + i + c.len_utf8());

    let sentence = text.get(start..end)?.trim();
    if sentence.is_empty() {
        return None;
    }
    Some(truncate_chars(sentence, SNIPPET_MAX_CHARS))
}

/// Non-empty sentences of `text`, trimmed.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if c == '\n' || (is_terminal_punct(c) && next_is_space(text, i)) {
            let end = i + c.len_utf8();
            if let Some(s) = text.get(start..end).map(str::trim) {
                if !s.is_empty() {
                    sentences.push(s);
                }
            }
            start = end;
        }
    }
    if let Some(s) = text.get(start..).map(str::trim) {
        if !s.is_empty() {
            sentences.push(s);
        }
    }
    sentences
}

fn is_terminal_punct(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn next_is_space(text: &str, idx: usize) -> bool {
    text.get(idx + 1..)
        .and_then(|rest| rest.chars().next())
        .is_none_or(char::is_whitespace)
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mention_is_case_insensitive() {
        assert!(detect_mention("I would pick ACME for this.", "Acme"));
    }

    #[test]
    fn mention_requires_whole_word() {
        assert!(!detect_mention("Acmeville is a town", "Acme"));
        assert!(detect_mention("Try Acme, it works", "Acme"));
    }

    #[test]
    fn mention_handles_symbol_names() {
        assert!(detect_mention("Use C++ for speed", "C++"));
        assert!(!detect_mention("nothing here", "C++"));
    }

    #[test]
    fn blank_name_never_matches() {
        assert!(!detect_mention("anything", "  "));
    }

    #[test]
    fn rank_follows_first_mention_order() {
        let text = "Top picks: Globex, then Acme. Initech is fine. Acme again.";
        assert_eq!(extract_rank(text, "Acme", &["Globex", "Initech"]), Some(2));
        assert_eq!(
            extract_ranks(text, &["Acme", "Globex", "Initech", "Umbrella"]),
            vec![Some(2), Some(1), Some(3), None]
        );
    }

    #[test]
    fn rank_absent_when_brand_not_mentioned() {
        assert_eq!(extract_rank("Globex wins", "Acme", &["Globex"]), None);
    }

    #[test]
    fn extracts_markdown_and_bare_urls_in_order() {
        let text = "See [Acme docs](https://acme.com/docs). Also https://review.example/acme, \
                    and again https://acme.com/docs.";
        let citations = extract_citations(text);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].url, "https://acme.com/docs");
        assert_eq!(citations[0].title.as_deref(), Some("Acme docs"));
        assert_eq!(citations[0].position, 1);
        assert_eq!(citations[1].url, "https://review.example/acme");
        assert_eq!(citations[1].title, None);
        assert_eq!(citations[1].position, 2);
    }

    #[test]
    fn citation_snippet_is_surrounding_sentence() {
        let text = "Intro sentence. Acme is rated highly by https://rate.example/acme today. Done.";
        let citations = extract_citations(text);
        assert_eq!(
            citations[0].snippet.as_deref(),
            Some("Acme is rated highly by https://rate.example/acme today.")
        );
    }

    #[test]
    fn no_urls_yields_no_citations() {
        assert!(extract_citations("plain answer without links").is_empty());
    }

    #[test]
    fn splits_on_terminal_punctuation_and_newlines() {
        let text = "Acme leads. Globex v2.1 follows!\nInitech trails";
        assert_eq!(
            split_sentences(text),
            vec!["Acme leads.", "Globex v2.1 follows!", "Initech trails"]
        );
    }

    #[test]
    fn truncate_marks_long_text() {
        let long = "a".repeat(300);
        let out = truncate_chars(&long, 10);
        assert_eq!(out.chars().count(), 10);
        assert!(out.ends_with('…'));
    }
}
