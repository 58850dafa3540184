//! Title normalization for comparison and lookup queries.

use once_cell::sync::Lazy;
use regex::Regex;

static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Compound words the upstream extractor tends to concatenate when it
/// loses a line-break hyphen, mapped back to their hyphenated form.
static ARTIFACT_REPAIRS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        ("schemabased", "schema-based"),
        ("schemaagnostic", "schema-agnostic"),
        ("datadriven", "data-driven"),
        ("multiway", "multi-way"),
        ("multiscale", "multi-scale"),
        ("crosssilo", "cross-silo"),
        ("lowresource", "low-resource"),
        ("pretrained", "pre-trained"),
        ("finetuning", "fine-tuning"),
        ("finetune", "fine-tune"),
        ("prompttuning", "prompt-tuning"),
        ("zeroshot", "zero-shot"),
        ("fewshot", "few-shot"),
        ("endtoend", "end-to-end"),
        ("stateoftheart", "state-of-the-art"),
        ("realtime", "real-time"),
        ("realworld", "real-world"),
        ("largescale", "large-scale"),
        ("highresolution", "high-resolution"),
        ("instanceoptimal", "instance-optimal"),
        ("useroptimized", "user-optimized"),
        ("utilityoptimized", "utility-optimized"),
    ]
    .into_iter()
    .map(|(wrong, correct)| {
        let re = Regex::new(&format!(r"(?i)\b{}\b", wrong)).unwrap();
        (re, correct)
    })
    .collect()
});

/// Punctuation and quote characters stripped from the ends of a title.
const EDGE_CHARS: &[char] = &[
    '"', '\'', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}', '.', ',', ';', ':', '(', ')', '[',
    ']', ' ', '\t', '\n',
];

/// Strip HTML tags and collapse whitespace. Keeps original casing.
pub fn clean_title(raw: &str) -> String {
    let stripped = HTML_TAG_RE.replace_all(raw, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonicalize a raw extracted title for comparison.
///
/// Steps: HTML-tag stripping, surrounding punctuation/quote stripping,
/// extraction-artifact repair, lowercasing, whitespace collapse. Never
/// fails; empty or garbage input yields an empty string, which the
/// classifier treats as "no usable title".
pub fn normalize_title(raw: &str) -> String {
    let cleaned = clean_title(raw);
    let trimmed = cleaned.trim_matches(|c| EDGE_CHARS.contains(&c));

    let mut repaired = trimmed.to_string();
    for (re, correct) in ARTIFACT_REPAIRS.iter() {
        repaired = re.replace_all(&repaired, *correct).into_owned();
    }

    repaired
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Shorten a normalized title for the lookup query. The first few words
/// give better recall than the full title against search APIs.
pub fn query_string(normalized: &str, max_words: usize) -> String {
    normalized
        .split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn word_count(title: &str) -> usize {
    title.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_collapses_whitespace() {
        assert_eq!(
            normalize_title("  Attention   Is All\tYou Need "),
            "attention is all you need"
        );
    }

    #[test]
    fn strips_html_tags() {
        assert_eq!(
            normalize_title("Deep <i>Learning</i> for Entity Matching"),
            "deep learning for entity matching"
        );
    }

    #[test]
    fn strips_surrounding_quotes_and_punctuation() {
        assert_eq!(
            normalize_title("\u{201c}A Study of Caching.\u{201d}"),
            "a study of caching"
        );
        assert_eq!(normalize_title("'Quoted Title',"), "quoted title");
    }

    #[test]
    fn repairs_concatenated_compounds() {
        assert_eq!(
            normalize_title("Zeroshot Learning with Pretrained Models"),
            "zero-shot learning with pre-trained models"
        );
        assert_eq!(
            normalize_title("Stateoftheart Realtime Systems"),
            "state-of-the-art real-time systems"
        );
    }

    #[test]
    fn repair_is_word_bounded() {
        // "pretrained" inside a longer word must not be rewritten
        assert_eq!(normalize_title("unpretrainedly"), "unpretrainedly");
    }

    #[test]
    fn empty_and_garbage_input() {
        assert_eq!(normalize_title(""), "");
        assert_eq!(normalize_title("  \"\" ..  "), "");
    }

    #[test]
    fn query_string_truncates() {
        let norm = normalize_title("A Very Long Title With Many Trailing Words Here");
        assert_eq!(query_string(&norm, 6), "a very long title with many");
    }

    #[test]
    fn query_string_shorter_than_limit() {
        assert_eq!(query_string("short title", 6), "short title");
    }

    #[test]
    fn counts_words() {
        assert_eq!(word_count("a study"), 2);
        assert_eq!(word_count(""), 0);
    }
}
