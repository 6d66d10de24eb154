use std::sync::LazyLock;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;

use crate::extract::ArticleRecord;
use crate::nlp::{collect_sets, EntityAnalyzer};

/// An article plus the fields derived from its title. The embedded record is
/// never modified; enrichment only adds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub article: ArticleRecord,
    pub title_word_count: usize,
    pub title_char_count: usize,
    pub capitalized_words: String,
    pub persons: String,
    pub organizations: String,
    pub locations: String,
}

impl EnrichedRecord {
    pub fn link(&self) -> &str {
        &self.article.link
    }
}

/// Derive all per-title fields for one record. Pure: output depends on the
/// title alone, so re-running is idempotent.
pub fn enrich_one(article: ArticleRecord, analyzer: &impl EntityAnalyzer) -> EnrichedRecord {
    let title = article.title.as_str();
    let sets = collect_sets(&analyzer.analyze(title));

    EnrichedRecord {
        title_word_count: word_count(title),
        title_char_count: title.chars().count(),
        capitalized_words: capitalized_words(title),
        persons: sets.persons,
        organizations: sets.organizations,
        locations: sets.locations,
        article,
    }
}

/// Enrich a whole batch. Records are independent, so the work fans out over
/// the rayon pool; output order matches input order.
pub fn enrich<A>(records: Vec<ArticleRecord>, analyzer: &A) -> Vec<EnrichedRecord>
where
    A: EntityAnalyzer + Sync,
{
    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} enriching")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let enriched: Vec<EnrichedRecord> = records
        .into_par_iter()
        .map(|r| {
            let e = enrich_one(r, analyzer);
            pb.inc(1);
            e
        })
        .collect();

    pb.finish_and_clear();
    enriched
}

static LEADING_UPPER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\p{Lu}").unwrap());

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Comma-joined tokens matching the leading-uppercase pattern, in title
/// order, duplicates kept.
pub fn capitalized_words(text: &str) -> String {
    text.split_whitespace()
        .filter(|w| LEADING_UPPER_RE.is_match(w))
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::LexiconAnalyzer;

    fn article(title: &str) -> ArticleRecord {
        ArticleRecord {
            title: title.to_string(),
            kicker: "Markets".to_string(),
            image_url: String::new(),
            link: "https://example.com/a".to_string(),
        }
    }

    #[test]
    fn word_count_basics() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   "), 0);
        assert_eq!(word_count("one"), 1);
        assert_eq!(word_count("two  spaced\twords"), 3);
    }

    #[test]
    fn capitalized_words_keeps_order_and_duplicates() {
        assert_eq!(capitalized_words("Hello world Foo"), "Hello, Foo");
        assert_eq!(capitalized_words("Go Go gadget Go"), "Go, Go, Go");
        assert_eq!(capitalized_words("all lower here"), "");
    }

    #[test]
    fn char_count_is_chars_not_bytes() {
        let analyzer = LexiconAnalyzer::new();
        let e = enrich_one(article("Casino in Córdoba"), &analyzer);
        assert_eq!(e.title_char_count, 17);
        assert_eq!(e.title_word_count, 3);
    }

    #[test]
    fn enrichment_is_idempotent() {
        let analyzer = LexiconAnalyzer::new();
        let a = article("MGM Resorts expands in Macau, says CEO Bill Hornbuckle");
        let first = enrich_one(a.clone(), &analyzer);
        let second = enrich_one(a, &analyzer);
        assert_eq!(first, second);
    }

    #[test]
    fn article_fields_survive_unchanged() {
        let analyzer = LexiconAnalyzer::new();
        let a = article("Brazil Senate advances gaming bill");
        let e = enrich_one(a.clone(), &analyzer);
        assert_eq!(e.article, a);
        assert_eq!(e.title_word_count, 5);
        assert_eq!(e.locations, "Brazil");
    }

    #[test]
    fn batch_preserves_input_order() {
        let analyzer = LexiconAnalyzer::new();
        let batch = vec![article("First story"), article("Second story")];
        let enriched = enrich(batch, &analyzer);
        assert_eq!(enriched[0].article.title, "First story");
        assert_eq!(enriched[1].article.title, "Second story");
    }
}
