//! Tagged-region substitution for the README.
//!
//! A region is `<!-- key -->value<!-- key -->` on a single line. When `key` is
//! known, `value` is replaced and both tags are kept, so the same README can be
//! regenerated on every run.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const OPEN_SEQ: &str = "<!-- ";
pub const CLOSE_SEQ: &str = " -->";

static TAG_RE: OnceLock<Regex> = OnceLock::new();

fn tag_re() -> &'static Regex {
    TAG_RE.get_or_init(|| Regex::new(r"<!-- ([^<>]*?) -->").unwrap())
}

pub type Values = BTreeMap<String, String>;

pub fn tag(key: &str) -> String {
    format!("{OPEN_SEQ}{key}{CLOSE_SEQ}")
}

/// Render every line of `content`. Line endings are preserved.
pub fn render(content: &str, values: &Values) -> String {
    content
        .split_inclusive('\n')
        .map(|line| render_line(line, values))
        .collect()
}

/// Replace the regions of one line. Two adjacent tags with the same key form
/// a region; a tag whose neighbour has a different key is left untouched.
pub fn render_line(line: &str, values: &Values) -> String {
    if !line.contains(OPEN_SEQ) {
        return line.to_string();
    }

    let tags: Vec<(usize, usize, &str)> = tag_re()
        .captures_iter(line)
        .filter_map(|c| {
            let whole = c.get(0)?;
            Some((whole.start(), whole.end(), c.get(1)?.as_str()))
        })
        .collect();

    let mut out = String::with_capacity(line.len());
    let mut cursor = 0;
    let mut i = 0;
    while i + 1 < tags.len() {
        let (_, open_end, key) = tags[i];
        let (close_start, _, close_key) = tags[i + 1];
        match values.get(key) {
            Some(value) if key == close_key => {
                out.push_str(&line[cursor..open_end]);
                out.push_str(value);
                cursor = close_start;
                i += 2;
            }
            _ => i += 1,
        }
    }
    out.push_str(&line[cursor..]);
    out
}

/// Keys of all well-formed regions in `content`, in order of appearance.
pub fn region_keys(content: &str) -> Vec<String> {
    let mut keys = Vec::new();
    for line in content.lines() {
        let tags: Vec<&str> = tag_re()
            .captures_iter(line)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        let mut i = 0;
        while i + 1 < tags.len() {
            if tags[i] == tags[i + 1] {
                keys.push(tags[i].to_string());
                i += 2;
            } else {
                i += 1;
            }
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> Values {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn replaces_known_region_and_keeps_tags() {
        let v = values(&[("city", "Berlin")]);
        assert_eq!(
            render_line("I live in <!-- city -->Paris<!-- city -->.\n", &v),
            "I live in <!-- city -->Berlin<!-- city -->.\n"
        );
    }

    #[test]
    fn rendering_is_repeatable() {
        let v = values(&[("date", "Monday, 06 May 2024, CEST")]);
        let once = render("Updated <!-- date --><!-- date -->\n", &v);
        let twice = render(&once, &v);
        assert_eq!(once, twice);
        assert!(once.contains("Monday, 06 May 2024, CEST"));
    }

    #[test]
    fn multiple_regions_on_one_line() {
        let v = values(&[("name", "Nico"), ("city", "Berlin")]);
        let line = "<!-- name -->x<!-- name --> from <!-- city -->y<!-- city -->";
        assert_eq!(
            render_line(line, &v),
            "<!-- name -->Nico<!-- name --> from <!-- city -->Berlin<!-- city -->"
        );
    }

    #[test]
    fn unknown_keys_and_mismatched_pairs_untouched() {
        let v = values(&[("city", "Berlin")]);
        let unknown = "<!-- other -->keep<!-- other -->";
        assert_eq!(render_line(unknown, &v), unknown);
        let mismatched = "<!-- city -->keep<!-- name -->";
        assert_eq!(render_line(mismatched, &v), mismatched);
    }

    #[test]
    fn plain_comments_are_ignored() {
        let v = values(&[("city", "Berlin")]);
        let line = "<!-- a note --> text <!-- city -->old<!-- city -->\n";
        assert_eq!(
            render_line(line, &v),
            "<!-- a note --> text <!-- city -->Berlin<!-- city -->\n"
        );
    }

    #[test]
    fn regions_do_not_span_lines() {
        let v = values(&[("city", "Berlin")]);
        let content = "<!-- city -->a\nb<!-- city -->\n";
        assert_eq!(render(content, &v), content);
    }

    #[test]
    fn region_keys_in_order() {
        let content = "<!-- name -->a<!-- name -->\n<!-- projects --><!-- projects --> <!-- x -->\n";
        assert_eq!(region_keys(content), ["name", "projects"]);
    }

    #[test]
    fn tag_format() {
        assert_eq!(tag("date"), "<!-- date -->");
    }
}
