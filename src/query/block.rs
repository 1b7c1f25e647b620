//! Parses a free-form query block: a filter expression on the leading
//! line(s) followed by option lines. Option lines start with an all-caps
//! keyword:
//!
//! ```text
//! filePath contains drafts && words > 0
//! HEATMAP low=100, medium=500, high=1000
//! UNIT words
//! ```
//!
//! Options are not interpreted here; they are handed to the renderer as
//! plain key/value pairs.

use std::collections::HashMap;

use tracing::warn;

use crate::filter::{compile, Predicate};

pub struct QueryBlock {
    pub filter: Predicate,
    pub options: HashMap<String, String>,
}

pub fn parse_block(text: &str) -> QueryBlock {
    let mut filter_lines = vec![];
    let mut options = HashMap::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        match split_option_line(line) {
            Some((keyword, args)) => {
                options.insert(keyword.to_lowercase(), args.to_string());
                for (key, value) in parse_pairs(args) {
                    options.insert(key, value);
                }
            }
            None if options.is_empty() => filter_lines.push(line),
            // filter text after the first option line is malformed; keep
            // going with what parsed so far
            None => warn!("Ignoring stray query line: {line}"),
        }
    }

    let filter_text = filter_lines.join(" ");
    let filter = if filter_text.is_empty() {
        Predicate::match_all()
    } else {
        match compile(&filter_text) {
            Ok(predicate) => predicate,
            Err(e) => {
                warn!("Invalid filter expression '{filter_text}', matching everything: {e}");
                Predicate::match_all()
            }
        }
    };

    QueryBlock { filter, options }
}

/// An option line starts with an all-caps keyword token.
fn split_option_line(line: &str) -> Option<(&str, &str)> {
    let (keyword, args) = match line.split_once(char::is_whitespace) {
        Some((keyword, args)) => (keyword, args.trim()),
        None => (line, ""),
    };
    let is_keyword = !keyword.is_empty()
        && keyword
            .chars()
            .all(|c| c.is_ascii_uppercase() || c == '_');
    is_keyword.then_some((keyword, args))
}

fn parse_pairs(args: &str) -> impl Iterator<Item = (String, String)> + '_ {
    args.split(',').filter_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        Some((key.trim().to_string(), value.trim().to_string()))
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::storage::entities::DailyRecord;

    use super::parse_block;

    fn record(path: &str) -> DailyRecord {
        DailyRecord::new(
            NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
            path.into(),
            0,
            0,
        )
    }

    #[test]
    fn splits_filter_from_options() {
        let block = parse_block(
            "filePath contains drafts\nHEATMAP low=100, medium=500\nUNIT words",
        );
        assert!(block.filter.matches(&record("drafts/a.md")));
        assert!(!block.filter.matches(&record("notes/a.md")));
        assert_eq!(block.options["heatmap"], "low=100, medium=500");
        assert_eq!(block.options["low"], "100");
        assert_eq!(block.options["medium"], "500");
        assert_eq!(block.options["unit"], "words");
    }

    #[test]
    fn empty_filter_matches_everything() {
        let block = parse_block("HEATMAP low=1");
        assert!(block.filter.matches(&record("anything.md")));
    }

    #[test]
    fn invalid_filter_falls_back_to_match_all() {
        let block = parse_block("words > (\nUNIT chars");
        assert!(block.filter.matches(&record("a.md")));
        assert_eq!(block.options["unit"], "chars");
    }

    #[test]
    fn bare_keyword_lines_are_kept() {
        let block = parse_block("STREAK");
        assert_eq!(block.options["streak"], "");
    }

    #[test]
    fn multiline_filters_join() {
        let block = parse_block("filePath contains drafts\n&& words > 100");
        assert!(!block.filter.matches(&record("drafts/a.md")));
    }
}
