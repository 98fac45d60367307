use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use crate::flags::ParserFlags;

/// A bare URL, `www.` host or e-mail address found in normal text. The
/// link target is `prefix` followed by the matched text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Autolink {
    pub range: Range<usize>,
    pub prefix: &'static str,
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Url,
    Www,
    Email,
}

fn url_regex() -> &'static Regex {
    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    URL_REGEX.get_or_init(|| {
        Regex::new(r"\b(?:https?|ftp)://[^\s<>\[\]]+").expect("Invalid URL regex")
    })
}

fn www_regex() -> &'static Regex {
    static WWW_REGEX: OnceLock<Regex> = OnceLock::new();
    WWW_REGEX.get_or_init(|| Regex::new(r"\bwww\.[^\s<>\[\]]+").expect("Invalid www regex"))
}

fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+")
            .expect("Invalid email regex")
    })
}

/// Find the permissive autolinks enabled by `flags` in `text`.
///
/// Matches come back sorted and non-overlapping; where two kinds overlap
/// the one starting first wins.
pub(super) fn find_autolinks(text: &str, flags: ParserFlags) -> Vec<Autolink> {
    let mut patterns: Vec<(usize, usize, Kind)> = Vec::new();

    let mut collect = |regex: &Regex, kind: Kind| {
        for found in regex.find_iter(text) {
            let start = found.start();
            let end = start + trim_trailing_punctuation(found.as_str()).len();
            if end > start {
                patterns.push((start, end, kind));
            }
        }
    };

    if flags.contains(ParserFlags::PERMISSIVE_URL_AUTOLINKS) {
        collect(url_regex(), Kind::Url);
    }
    if flags.contains(ParserFlags::PERMISSIVE_WWW_AUTOLINKS) {
        collect(www_regex(), Kind::Www);
    }
    if flags.contains(ParserFlags::PERMISSIVE_EMAIL_AUTOLINKS) {
        collect(email_regex(), Kind::Email);
    }

    patterns.sort_by_key(|&(start, _, _)| start);

    let mut links: Vec<Autolink> = Vec::new();
    for (start, end, kind) in patterns {
        let overlaps = links
            .iter()
            .any(|prev| start < prev.range.end && end > prev.range.start);
        if overlaps {
            continue;
        }

        let prefix = match kind {
            Kind::Url => "",
            Kind::Www => "http://",
            Kind::Email => "mailto:",
        };
        links.push(Autolink {
            range: start..end,
            prefix,
        });
    }
    links
}

fn trim_trailing_punctuation(matched: &str) -> &str {
    matched.trim_end_matches(['.', ',', ':', ';', '!', '?', ')', ']', '}', '\'', '"'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn href(text: &str, link: &Autolink) -> String {
        format!("{}{}", link.prefix, &text[link.range.clone()])
    }

    #[test]
    fn urls_drop_trailing_punctuation() {
        let text = "See https://example.com/a. Then stop.";
        let links = find_autolinks(text, ParserFlags::PERMISSIVE_URL_AUTOLINKS);
        assert_eq!(links.len(), 1);
        assert_eq!(&text[links[0].range.clone()], "https://example.com/a");
        assert_eq!(href(text, &links[0]), "https://example.com/a");
    }

    #[test]
    fn www_links_get_a_scheme() {
        let text = "go to www.rust-lang.org!";
        let links = find_autolinks(text, ParserFlags::PERMISSIVE_WWW_AUTOLINKS);
        assert_eq!(href(text, &links[0]), "http://www.rust-lang.org");
    }

    #[test]
    fn emails_become_mailto() {
        let text = "mail jo.doe@example.org today";
        let links = find_autolinks(text, ParserFlags::PERMISSIVE_EMAIL_AUTOLINKS);
        assert_eq!(href(text, &links[0]), "mailto:jo.doe@example.org");
        assert_eq!(links[0].range, 5..23);
    }

    #[test]
    fn only_enabled_kinds_are_found() {
        let text = "https://a.io www.b.io c@d.io";
        assert!(find_autolinks(text, ParserFlags::empty()).is_empty());
        assert_eq!(find_autolinks(text, ParserFlags::PERMISSIVE_AUTOLINKS).len(), 3);
    }

    #[test]
    fn overlapping_matches_keep_the_earliest() {
        let text = "https://www.x.io";
        let links = find_autolinks(text, ParserFlags::PERMISSIVE_AUTOLINKS);
        assert_eq!(links.len(), 1);
        assert_eq!(href(text, &links[0]), "https://www.x.io");
    }
}
