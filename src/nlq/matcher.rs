//! Pattern matcher
//!
//! First-match-wins over the ordered table. No ranking and no ambiguity
//! detection: an earlier rule always shadows a later one.

use tracing::{debug, trace};

use crate::nlq::pattern::{ParamRole, PatternSpec, PatternTable};
use crate::nlq::NlqResult;
use crate::value::{Params, Value};

/// Tokens skipped when guessing a search keyword
pub const STOPWORDS: &[&str] = &[
    "find", "show", "get", "list", "all", "the", "a", "an", "clause", "clauses",
    // connectives between the verb and the term
    "about", "with", "containing", "contain", "for", "on", "re", "me", "any", "search",
];

/// A rule selected for a question, with its extracted parameters
#[derive(Debug, Clone)]
pub struct MatchResult<'a> {
    pub spec: &'a PatternSpec,
    pub params: Params,
}

/// Lower-case and trim a question before matching
pub fn normalize(question: &str) -> String {
    question.trim().to_lowercase()
}

/// Find the first rule matching `question`.
pub fn match_question<'a>(
    table: &'a PatternTable,
    question: &str,
) -> NlqResult<Option<MatchResult<'a>>> {
    let normalized = normalize(question);

    for spec in table.specs() {
        for regex in &spec.patterns {
            let Some(captures) = regex.captures(&normalized) else {
                continue;
            };
            let extracted = spec
                .extract
                .and_then(|extract| captures.get(extract.group).map(|g| (extract.role, g.as_str())));
            if let Some((role, raw)) = extracted {
                if !role.accepts(raw) {
                    trace!("/{}/ captured reserved {} '{}'", regex.as_str(), role.name(), raw);
                    continue;
                }
            }
            trace!("'{}' matched /{}/", normalized, regex.as_str());

            let mut params = Params::new();
            if let Some((role, raw)) = extracted {
                params.insert(role.name().to_string(), role.convert(raw)?);
            }

            let keyword = ParamRole::Keyword.name();
            if !params.contains_key(keyword) && spec.query.references(keyword) {
                params.insert(keyword.to_string(), Value::from(infer_keyword(&normalized)));
            }

            debug!("Matched '{}' -> {}", question, spec.description);
            return Ok(Some(MatchResult { spec, params }));
        }
    }

    debug!("No pattern matched '{}'", question);
    Ok(None)
}

/// First token longer than two characters that is not a stopword, or `""`.
pub fn infer_keyword(normalized: &str) -> String {
    normalized
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .find(|token| token.chars().count() > 2 && !STOPWORDS.contains(token))
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlq::format::Formatter;
    use crate::nlq::pattern::ParamSpec;

    fn builtin() -> PatternTable {
        PatternTable::builtin().unwrap()
    }

    fn matched(table: &PatternTable, question: &str) -> (String, Params) {
        let m = match_question(table, question).unwrap().expect("no match");
        (m.spec.description.clone(), m.params)
    }

    #[test]
    fn test_round_extracts_integer_version() {
        let table = builtin();
        let (desc, params) = matched(&table, "show round 2");
        assert_eq!(desc, "Show decisions made in a specific round/version");
        assert_eq!(params.get("version"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_actor_is_title_cased() {
        let table = builtin();
        let (desc, params) = matched(&table, "What did sarah chen decide?");
        assert_eq!(desc, "Show decisions made by a specific person");
        assert_eq!(params.get("actor"), Some(&Value::from("Sarah Chen")));
    }

    #[test]
    fn test_actor_by_phrase() {
        let table = builtin();
        let (_, params) = matched(&table, "Show decisions made by james wilson");
        assert_eq!(params.get("actor"), Some(&Value::from("James Wilson")));
    }

    #[test]
    fn test_distribution_by_type_is_not_an_actor() {
        let table = builtin();
        let (desc, params) = matched(&table, "show decision distribution by type");
        assert_eq!(desc, "Show breakdown of decision types");
        assert!(params.is_empty());
    }

    #[test]
    fn test_pronoun_is_not_an_actor() {
        let table = builtin();
        let (desc, params) = matched(&table, "what did we decide in round 2");
        assert_eq!(desc, "Show decisions made in a specific round/version");
        assert!(!params.contains_key("actor"));
        assert_eq!(params.get("version"), Some(&Value::Integer(2)));

        let outcome = match_question(&table, "what did we decide").unwrap();
        assert!(outcome.map_or(true, |m| !m.params.contains_key("actor")));
    }

    #[test]
    fn test_clause_number_extraction() {
        let table = builtin();
        let (desc, params) = matched(&table, "Track clause 1.1 history");
        assert_eq!(desc, "Track how a specific clause evolved across versions");
        assert_eq!(params.get("clause_number"), Some(&Value::from("1.1")));
    }

    #[test]
    fn test_matter_extraction() {
        let table = builtin();
        let (desc, params) = matched(&table, "Overview of matter_001");
        assert_eq!(desc, "Show overview of a specific matter");
        assert_eq!(params.get("matter_id"), Some(&Value::from("matter_001")));
    }

    #[test]
    fn test_keyword_from_capture() {
        let table = builtin();
        let (desc, params) = matched(&table, "Find liability clauses");
        assert_eq!(desc, "Find clauses containing specific terms");
        assert_eq!(params.get("keyword"), Some(&Value::from("liability")));

        let (_, params) = matched(&table, "find clauses about indemnity");
        assert_eq!(params.get("keyword"), Some(&Value::from("indemnity")));
    }

    #[test]
    fn test_keyword_fallback_without_capture_group() {
        let spec = PatternSpec::template(
            "Keyword search",
            "MATCH (c:Clause) WHERE c.title CONTAINS $keyword RETURN c",
            Formatter::ClauseSearch,
            &[r"find clauses"],
            None,
        )
        .unwrap();
        let table = PatternTable::new(vec![spec]);

        let (_, params) = matched(&table, "find clauses about indemnity");
        assert_eq!(params.get("keyword"), Some(&Value::from("indemnity")));

        let (_, params) = matched(&table, "find clauses");
        assert_eq!(params.get("keyword"), Some(&Value::from("")));
    }

    #[test]
    fn test_infer_keyword_skips_short_tokens_and_punctuation() {
        assert_eq!(infer_keyword("show me an ip clause"), "");
        assert_eq!(infer_keyword("find warranty?"), "warranty");
    }

    #[test]
    fn test_first_match_wins() {
        let first = PatternSpec::fixed("first", "RETURN 1", Formatter::Generic, &[r"concession"]).unwrap();
        let second = PatternSpec::fixed("second", "RETURN 2", Formatter::Generic, &[r"show.*concession"]).unwrap();
        let table = PatternTable::new(vec![first, second]);
        let (desc, _) = matched(&table, "show concessions");
        assert_eq!(desc, "first");
    }

    #[test]
    fn test_no_match() {
        let table = builtin();
        assert!(match_question(&table, "zzzqqq nonsense").unwrap().is_none());
        assert!(match_question(&table, "").unwrap().is_none());
    }

    #[test]
    fn test_extract_group_that_did_not_participate() {
        let spec = PatternSpec::template(
            "optional group",
            "RETURN $version",
            Formatter::Generic,
            &[r"round(?:\s+(\d+))?"],
            Some(ParamSpec::new(1, ParamRole::Version)),
        )
        .unwrap();
        let table = PatternTable::new(vec![spec]);
        let (_, params) = matched(&table, "round");
        assert!(params.is_empty());
    }
}
