use std::collections::HashSet;

/// Entity categories the pipeline cares about. GPE covers political
/// geographies (countries, states, cities); LOC covers physical regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityLabel {
    Person,
    Org,
    Gpe,
    Loc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub text: String,
    pub label: EntityLabel,
}

/// Named-entity capability. The pipeline only depends on this seam, so tests
/// substitute a canned analyzer and the default can be swapped for a real
/// model-backed one without touching the stages.
pub trait EntityAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Entity>;
}

// ── Lexicon analyzer ──

/// Gazetteer of geographies that show up in gaming-industry headlines.
/// Entries are matched as whole phrases, case-sensitively.
const GPE_GAZETTEER: &[&str] = &[
    "Las Vegas",
    "Atlantic City",
    "Macau",
    "Nevada",
    "New Jersey",
    "New York",
    "Pennsylvania",
    "Michigan",
    "Ontario",
    "United States",
    "United Kingdom",
    "Brazil",
    "Argentina",
    "Spain",
    "Italy",
    "France",
    "Germany",
    "Sweden",
    "Malta",
    "Gibraltar",
    "Canada",
    "Australia",
    "Philippines",
    "Singapore",
    "London",
    "Madrid",
    "Buenos Aires",
];

const LOC_GAZETTEER: &[&str] = &[
    "Europe",
    "Asia",
    "Latin America",
    "North America",
    "Middle East",
    "Asia Pacific",
];

/// A capitalized run whose last token is one of these reads as a company or
/// body name ("MGM Resorts", "Gaming Commission").
const ORG_SUFFIXES: &[&str] = &[
    "Inc",
    "Corp",
    "Ltd",
    "LLC",
    "Group",
    "Holdings",
    "Resorts",
    "Entertainment",
    "Gaming",
    "Interactive",
    "International",
    "Casino",
    "Casinos",
    "Association",
    "Commission",
    "Authority",
    "Lottery",
    "Partners",
    "Technologies",
    "Digital",
    "Studios",
];

/// Role words that signal the adjacent capitalized run is a person.
const ROLE_WORDS: &[&str] = &[
    "ceo", "cfo", "coo", "president", "chairman", "chairwoman", "minister",
    "governor", "senator", "founder", "director", "executive", "secretary",
];

const HONORIFICS: &[&str] = &["Mr", "Mrs", "Ms", "Dr"];

/// Rule-based analyzer over curated gazetteers and suffix/role cues.
/// Deterministic and dependency-free; intentionally conservative — a span is
/// only labeled PERSON when a role word or honorific anchors it.
pub struct LexiconAnalyzer;

impl LexiconAnalyzer {
    pub fn new() -> Self {
        LexiconAnalyzer
    }
}

impl Default for LexiconAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityAnalyzer for LexiconAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Entity> {
        let mut entities = Vec::new();

        scan_gazetteer(text, GPE_GAZETTEER, EntityLabel::Gpe, &mut entities);
        scan_gazetteer(text, LOC_GAZETTEER, EntityLabel::Loc, &mut entities);

        for run in capitalized_runs(text) {
            classify_run(&run, &mut entities);
        }

        entities
    }
}

fn scan_gazetteer(text: &str, phrases: &[&str], label: EntityLabel, out: &mut Vec<Entity>) {
    for phrase in phrases {
        if contains_phrase(text, phrase) {
            out.push(Entity {
                text: (*phrase).to_string(),
                label,
            });
        }
    }
}

/// Whole-word phrase containment: "Nevada" must not match inside "Nevadan".
fn contains_phrase(text: &str, phrase: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = text[start..].find(phrase) {
        let abs = start + pos;
        let before_ok = abs == 0
            || !text[..abs].chars().next_back().is_some_and(char::is_alphanumeric);
        let end = abs + phrase.len();
        let after_ok = end == text.len()
            || !text[end..].chars().next().is_some_and(char::is_alphanumeric);
        if before_ok && after_ok {
            return true;
        }
        start = abs + phrase.len().max(1);
    }
    false
}

/// One maximal run of leading-uppercase tokens, plus whether a role word
/// immediately preceded or followed it in the original token stream.
struct Run {
    tokens: Vec<String>,
    person_cue: bool,
}

fn capitalized_runs(text: &str) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut current: Vec<String> = Vec::new();
    // Set when the previous token was a role word ("CEO Jane Doe").
    let mut pending_cue = false;
    let mut current_cue = false;

    let close = |current: &mut Vec<String>, cue: bool, runs: &mut Vec<Run>| {
        if !current.is_empty() {
            runs.push(Run {
                tokens: std::mem::take(current),
                person_cue: cue,
            });
        }
    };

    for raw in text.split_whitespace() {
        let token = clean_token(raw);
        if token.is_empty() {
            close(&mut current, current_cue, &mut runs);
            pending_cue = false;
            continue;
        }

        if is_role_word(&token) {
            // A role word right after a punctuation-closed run anchors that
            // run ("Jane Doe, CEO of ..."); either way it cues the next one.
            if current.is_empty() {
                if let Some(last) = runs.last_mut() {
                    last.person_cue = true;
                }
            }
            close(&mut current, current_cue, &mut runs);
            pending_cue = true;
            continue;
        }

        if starts_uppercase(&token) {
            if current.is_empty() {
                current_cue = pending_cue;
                pending_cue = false;
            }
            current.push(token);
        } else {
            close(&mut current, current_cue, &mut runs);
            pending_cue = false;
        }

        // Sentence punctuation ends the run regardless of the next token.
        if matches!(raw.chars().next_back(), Some(',' | '.' | ':' | ';' | '!' | '?')) {
            close(&mut current, current_cue, &mut runs);
        }
    }
    close(&mut current, current_cue, &mut runs);

    runs
}

/// Strip punctuation from both edges, keeping interior apostrophes/hyphens.
fn clean_token(raw: &str) -> String {
    raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '&')
        .to_string()
}

fn starts_uppercase(token: &str) -> bool {
    token.chars().next().is_some_and(char::is_uppercase)
}

fn is_role_word(token: &str) -> bool {
    ROLE_WORDS.contains(&token.to_lowercase().as_str())
}

fn classify_run(run: &Run, out: &mut Vec<Entity>) {
    let mut tokens: Vec<&str> = run.tokens.iter().map(String::as_str).collect();

    let honorific_led = HONORIFICS.contains(&tokens[0]);
    if honorific_led {
        tokens.remove(0);
        if tokens.is_empty() {
            return;
        }
    }
    let text = tokens.join(" ");

    // Gazetteer phrases were already captured by the whole-title scan.
    if GPE_GAZETTEER.contains(&text.as_str()) || LOC_GAZETTEER.contains(&text.as_str()) {
        return;
    }

    if tokens.len() >= 2 && ORG_SUFFIXES.contains(tokens.last().unwrap()) {
        out.push(Entity {
            text,
            label: EntityLabel::Org,
        });
        return;
    }

    let personish = (1..=3).contains(&tokens.len())
        && tokens.iter().all(|t| t.chars().all(char::is_alphabetic));
    if personish && (run.person_cue || honorific_led) {
        out.push(Entity {
            text,
            label: EntityLabel::Person,
        });
    }
}

/// Fold a stream of entities into the three comma-joined set columns.
/// Sets are sorted so repeated analysis of the same title is bit-identical.
pub struct EntitySets {
    pub persons: String,
    pub organizations: String,
    pub locations: String,
}

pub fn collect_sets(entities: &[Entity]) -> EntitySets {
    let mut persons: HashSet<&str> = HashSet::new();
    let mut orgs: HashSet<&str> = HashSet::new();
    let mut locations: HashSet<&str> = HashSet::new();

    for e in entities {
        match e.label {
            EntityLabel::Person => persons.insert(e.text.as_str()),
            EntityLabel::Org => orgs.insert(e.text.as_str()),
            EntityLabel::Gpe | EntityLabel::Loc => locations.insert(e.text.as_str()),
        };
    }

    EntitySets {
        persons: join_sorted(persons),
        organizations: join_sorted(orgs),
        locations: join_sorted(locations),
    }
}

fn join_sorted(set: HashSet<&str>) -> String {
    let mut items: Vec<&str> = set.into_iter().collect();
    items.sort_unstable();
    items.join(", ")
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(title: &str) -> (String, String, String) {
        let analyzer = LexiconAnalyzer::new();
        let sets = collect_sets(&analyzer.analyze(title));
        (sets.persons, sets.organizations, sets.locations)
    }

    #[test]
    fn org_by_suffix() {
        let (_, orgs, _) = labels("MGM Resorts posts record quarterly revenue");
        assert_eq!(orgs, "MGM Resorts");
    }

    #[test]
    fn location_from_gazetteer() {
        let (_, _, locs) = labels("New casino opens on the Las Vegas strip");
        assert_eq!(locs, "Las Vegas");
    }

    #[test]
    fn person_needs_role_cue() {
        let (persons, _, _) = labels("CEO Jason Robins outlines expansion plans");
        assert_eq!(persons, "Jason Robins");

        // Same name without any cue stays unlabeled.
        let (persons, _, _) = labels("Jason Robins outlines expansion plans");
        assert_eq!(persons, "");
    }

    #[test]
    fn trailing_role_anchors_person() {
        let (persons, _, _) = labels("Bill Hornbuckle, CEO of the operator, steps down");
        assert_eq!(persons, "Bill Hornbuckle");
    }

    #[test]
    fn regions_fold_into_locations() {
        let (_, _, locs) = labels("Regulators across Europe and Latin America tighten rules");
        assert_eq!(locs, "Europe, Latin America");
    }

    #[test]
    fn whole_word_matching() {
        let (_, _, locs) = labels("Nevadans vote on the measure");
        assert_eq!(locs, "");
    }

    #[test]
    fn sets_are_deduplicated_and_sorted() {
        let (_, _, locs) = labels("Macau and Las Vegas revenue up; Macau leads");
        assert_eq!(locs, "Las Vegas, Macau");
    }

    #[test]
    fn mixed_title() {
        let (persons, orgs, locs) =
            labels("DraftKings Group CEO Jason Robins eyes New Jersey launch");
        assert_eq!(persons, "Jason Robins");
        assert_eq!(orgs, "DraftKings Group");
        assert_eq!(locs, "New Jersey");
    }
}
