//! Pattern table: the ordered rule set mapping questions to queries
//!
//! Each [`PatternSpec`] pairs a handful of regexes with a query and a result
//! formatter. Order matters: the first spec with a matching regex wins.

use regex::Regex;
use std::sync::Arc;

use crate::nlq::builder::placeholders;
use crate::nlq::format::Formatter;
use crate::nlq::{NlqError, NlqResult};
use crate::value::Value;

/// What a captured group means, and how to convert it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRole {
    /// Negotiation round / document version, parsed as an integer
    Version,
    /// Clause number such as `1.1`, kept verbatim
    ClauseNumber,
    /// Matter identifier, kept verbatim
    MatterId,
    /// Person name, title-cased
    Actor,
    /// Free search term, kept verbatim
    Keyword,
}

impl ParamRole {
    /// Parameter name the role binds
    pub fn name(&self) -> &'static str {
        match self {
            ParamRole::Version => "version",
            ParamRole::ClauseNumber => "clause_number",
            ParamRole::MatterId => "matter_id",
            ParamRole::Actor => "actor",
            ParamRole::Keyword => "keyword",
        }
    }

    /// Whether captured text can stand for this role. A rejected capture
    /// makes its regex count as not matching.
    pub fn accepts(&self, raw: &str) -> bool {
        match self {
            ParamRole::Actor => raw
                .split_whitespace()
                .all(|token| !ACTOR_RESERVED.contains(&token)),
            _ => true,
        }
    }

    /// Convert captured text into the bound value
    pub fn convert(&self, raw: &str) -> NlqResult<Value> {
        let raw = raw.trim();
        match self {
            ParamRole::Version => raw.parse::<i64>().map(Value::Integer).map_err(|_| {
                NlqError::InvalidParameter {
                    name: self.name().to_string(),
                    value: raw.to_string(),
                }
            }),
            ParamRole::ClauseNumber => Ok(Value::from(raw.trim_end_matches('.'))),
            ParamRole::MatterId | ParamRole::Keyword => Ok(Value::from(raw)),
            ParamRole::Actor => Ok(Value::from(title_case(raw))),
        }
    }
}

/// Words an actor capture may not contain: pronouns, determiners and the
/// nouns other rules group by
pub const ACTOR_RESERVED: &[&str] = &[
    "i", "me", "we", "us", "you", "they", "them", "he", "she", "it", "our", "their",
    "the", "a", "an", "all", "any", "each", "every", "everyone", "anyone", "someone",
    "type", "types", "round", "version", "matter", "contract", "clause", "date", "time",
];

/// Capital first letter for each alphabetic run, lower case elsewhere
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

/// Declarative extraction: capture `group` carries a `role` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub group: usize,
    pub role: ParamRole,
}

impl ParamSpec {
    pub fn new(group: usize, role: ParamRole) -> Self {
        Self { group, role }
    }
}

/// The query a pattern runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySource {
    /// Used unchanged, takes no parameters
    Fixed(String),
    /// References `$name` placeholders bound at execution
    Template(String),
}

impl QuerySource {
    pub fn text(&self) -> &str {
        match self {
            QuerySource::Fixed(text) | QuerySource::Template(text) => text,
        }
    }

    /// Placeholder names the query needs bound
    pub fn placeholders(&self) -> Vec<String> {
        match self {
            QuerySource::Fixed(_) => Vec::new(),
            QuerySource::Template(text) => placeholders(text),
        }
    }

    pub fn references(&self, name: &str) -> bool {
        self.placeholders().iter().any(|p| p == name)
    }
}

/// One rule: regexes, a query, and a formatter for its rows
#[derive(Debug, Clone)]
pub struct PatternSpec {
    pub patterns: Vec<Regex>,
    pub description: String,
    pub query: QuerySource,
    pub formatter: Formatter,
    pub extract: Option<ParamSpec>,
    pub requires_params: bool,
}

impl PatternSpec {
    /// Rule with a fixed query
    pub fn fixed(
        description: &str,
        query: &str,
        formatter: Formatter,
        patterns: &[&str],
    ) -> NlqResult<Self> {
        Ok(Self {
            patterns: compile(patterns)?,
            description: description.to_string(),
            query: QuerySource::Fixed(query.to_string()),
            formatter,
            extract: None,
            requires_params: false,
        })
    }

    /// Rule with a parameterized template; parameters are mandatory
    pub fn template(
        description: &str,
        template: &str,
        formatter: Formatter,
        patterns: &[&str],
        extract: Option<ParamSpec>,
    ) -> NlqResult<Self> {
        Ok(Self {
            patterns: compile(patterns)?,
            description: description.to_string(),
            query: QuerySource::Template(template.to_string()),
            formatter,
            extract,
            requires_params: true,
        })
    }

    /// Relax or enforce the mandatory-parameter check
    pub fn with_required_params(mut self, required: bool) -> Self {
        self.requires_params = required;
        self
    }
}

fn compile(patterns: &[&str]) -> NlqResult<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| NlqError::InvalidPattern {
                pattern: p.to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Immutable, ordered list of rules
#[derive(Debug, Clone)]
pub struct PatternTable {
    specs: Vec<PatternSpec>,
}

impl PatternTable {
    pub fn new(specs: Vec<PatternSpec>) -> Self {
        Self { specs }
    }

    pub fn specs(&self) -> &[PatternSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Built-in table, shareable across interpreters
    pub fn shared() -> NlqResult<Arc<Self>> {
        Ok(Arc::new(Self::builtin()?))
    }

    /// The negotiation-history rules
    pub fn builtin() -> NlqResult<Self> {
        Ok(Self::new(vec![
            PatternSpec::fixed(
                "Find all concessions made during negotiations",
                CONCESSIONS,
                Formatter::Concessions,
                &[
                    r"show.*concession",
                    r"find.*concession",
                    r"list.*concession",
                    r"what concession",
                    r"all concession",
                    r"get.*concession",
                ],
            )?,
            PatternSpec::template(
                "Show decisions made in a specific round/version",
                ROUND_DECISIONS,
                Formatter::RoundDecisions,
                &[
                    r"what.*(?:agree|agreed).*(?:round|version)\s*(\d+)",
                    r"\b(?:decide|decided|decisions?)\b.*\b(?:round|version)\s*(\d+)",
                    r"show.*(?:round|version)\s*(\d+)",
                    r"(?:round|version)\s*(\d+).*(?:decision|change)",
                ],
                Some(ParamSpec::new(1, ParamRole::Version)),
            )?,
            PatternSpec::template(
                "Find clauses containing specific terms",
                CLAUSE_SEARCH,
                Formatter::ClauseSearch,
                &[
                    r#"find.*(?:clause|clauses).*(?:about|contain|with|re:?)?\s+['"]?(\w+)['"]?"#,
                    r#"show.*(?:clause|clauses).*(?:about|contain|with|re:?)?\s+['"]?(\w+)['"]?"#,
                    r#"search.*(?:clause|clauses).*\s['"]?(\w+)['"]?"#,
                    r"\b(liability|indemnit\w*|warrant\w*|termination|payment|data|ip|intellectual)\s*clause",
                ],
                Some(ParamSpec::new(1, ParamRole::Keyword)),
            )?,
            PatternSpec::template(
                "Show decisions made by a specific person",
                ACTOR_DECISIONS,
                Formatter::ActorDecisions,
                &[
                    r"\b(?:made|decided|reviewed|approved|taken|done)\s+by\s+([a-z]+(?:\s+[a-z]+)?)",
                    r"\b(?:decisions?|reviews?|work)\s+(?:by|from)\s+([a-z]+(?:\s+[a-z]+)?)",
                    r"what\s+did\s+([a-z]+(?:\s+[a-z]+)?)\s+(?:decide|review|do)\b",
                    r"show\s+([a-z]+(?:\s+[a-z]+)?)'s\s+(?:decision|review|work)",
                ],
                Some(ParamSpec::new(1, ParamRole::Actor)),
            )?,
            PatternSpec::fixed(
                "Find all unfavorable terms flagged in reviews",
                UNFAVORABLE_TERMS,
                Formatter::UnfavorableTerms,
                &[
                    r"unfavorable",
                    r"(?:bad|problematic|risky)\s+(?:term|clause)",
                    r"(?:issue|problem|concern|risk).*clause",
                ],
            )?,
            PatternSpec::template(
                "Show overview of a specific matter",
                MATTER_OVERVIEW,
                Formatter::MatterOverview,
                &[
                    r"(?:overview|summary|status).*\b(matter_\w+)",
                    r"(?:overview|summary|status).*(?:matter|contract)\s+(\w+)",
                    r"\b(matter_\w+)\s+(?:overview|summary|status)",
                    r"(?:matter|contract)\s+(\w+)\s+(?:overview|summary|status)",
                    r"show.*\b(matter_\w+)",
                    r"show.*(?:matter|contract)\s+(\w+)",
                ],
                Some(ParamSpec::new(1, ParamRole::MatterId)),
            )?,
            PatternSpec::template(
                "Track how a specific clause evolved across versions",
                CLAUSE_HISTORY,
                Formatter::ClauseHistory,
                &[
                    r"(?:track|history|evolution).*clause\s+([\d.]+)",
                    r"clause\s+([\d.]+).*(?:change|history|version)",
                    r"how.*clause\s+([\d.]+).*(?:change|evolve)",
                ],
                Some(ParamSpec::new(1, ParamRole::ClauseNumber)),
            )?,
            PatternSpec::fixed(
                "Show overall system statistics",
                STATISTICS,
                Formatter::Statistics,
                &[
                    r"(?:statistics|stats|count)",
                    r"how many",
                    r"total.*(?:clause|recommendation|decision|concession)",
                ],
            )?,
            PatternSpec::fixed(
                "Show breakdown of decision types",
                DECISION_DISTRIBUTION,
                Formatter::DecisionDistribution,
                &[
                    r"decision.*(?:distribution|breakdown|type)",
                    r"(?:apply|override|defer).*decision",
                ],
            )?,
        ]))
    }
}

const CONCESSIONS: &str = "\
MATCH (d:Decision)-[:RESULTED_IN_CONCESSION]->(con:Concession)
MATCH (c:Clause {clause_id: con.clause_id})
RETURN con.matter_id AS matter,
       c.clause_number AS clause,
       c.title AS clause_title,
       d.actor AS who_made_it,
       con.description AS what_happened,
       con.impact AS impact_level,
       con.rationale AS why,
       d.timestamp AS when
ORDER BY d.timestamp";

const ROUND_DECISIONS: &str = "\
MATCH (m:Matter {version: $version})
MATCH (c:Clause {matter_id: m.matter_id, version: $version})
OPTIONAL MATCH (c)-[:HAS_RECOMMENDATION]->(r:Recommendation)
OPTIONAL MATCH (r)-[:HAS_DECISION]->(d:Decision)
RETURN m.matter_id AS matter,
       m.version AS version,
       c.clause_number AS clause,
       c.title AS clause_title,
       r.classification AS recommendation,
       d.decision_type AS decision,
       d.actor AS who_decided,
       d.notes AS notes
ORDER BY c.clause_number";

const CLAUSE_SEARCH: &str = "\
MATCH (c:Clause)
WHERE toLower(c.title) CONTAINS toLower($keyword)
   OR toLower(c.category) CONTAINS toLower($keyword)
RETURN DISTINCT c.matter_id AS matter,
       c.version AS version,
       c.clause_number AS clause,
       c.title AS title,
       c.category AS category
ORDER BY c.matter_id, c.version, c.clause_number";

const ACTOR_DECISIONS: &str = "\
MATCH (d:Decision {actor: $actor})
MATCH (r:Recommendation)-[:HAS_DECISION]->(d)
MATCH (c:Clause)-[:HAS_RECOMMENDATION]->(r)
RETURN d.matter_id AS matter,
       c.clause_number AS clause,
       c.title AS clause_title,
       r.classification AS recommendation_type,
       d.decision_type AS decision,
       d.timestamp AS when,
       left(d.notes, 100) AS notes
ORDER BY d.timestamp";

const UNFAVORABLE_TERMS: &str = "\
MATCH (c:Clause)-[:HAS_RECOMMENDATION]->(r:Recommendation {classification: 'unfavorable'})
OPTIONAL MATCH (r)-[:HAS_DECISION]->(d:Decision)
RETURN c.matter_id AS matter,
       c.version AS version,
       c.clause_number AS clause,
       c.title AS clause_title,
       r.issue_type AS issue,
       d.decision_type AS decision,
       d.actor AS reviewed_by
ORDER BY c.matter_id, c.version, c.clause_number
LIMIT 20";

const MATTER_OVERVIEW: &str = "\
MATCH (m:Matter {matter_id: $matter_id})
OPTIONAL MATCH (c:Clause {matter_id: $matter_id, version: m.version})
OPTIONAL MATCH (c)-[:HAS_RECOMMENDATION]->(r:Recommendation)
OPTIONAL MATCH (r)-[:HAS_DECISION]->(d:Decision)
OPTIONAL MATCH (d)-[:RESULTED_IN_CONCESSION]->(con:Concession)
RETURN m.matter_id AS matter,
       m.version AS version,
       m.matter_type AS type,
       m.timestamp AS last_updated,
       count(DISTINCT c) AS total_clauses,
       count(DISTINCT r) AS recommendations,
       count(DISTINCT d) AS decisions,
       count(DISTINCT con) AS concessions
ORDER BY m.version";

const CLAUSE_HISTORY: &str = "\
MATCH (c:Clause {clause_number: $clause_number})
OPTIONAL MATCH (c)-[:HAS_RECOMMENDATION]->(r:Recommendation)
OPTIONAL MATCH (r)-[:HAS_DECISION]->(d:Decision)
RETURN c.matter_id AS matter,
       c.version AS version,
       c.clause_number AS clause,
       c.title AS title,
       r.classification AS recommendation,
       r.issue_type AS issue,
       d.decision_type AS decision
ORDER BY c.matter_id, c.version";

const STATISTICS: &str = "\
MATCH (m:Matter)
WITH count(DISTINCT m) AS matters
MATCH (p:Party)
WITH matters, count(DISTINCT p) AS parties
MATCH (c:Clause)
WITH matters, parties, count(DISTINCT c) AS clauses
OPTIONAL MATCH (r:Recommendation)
WITH matters, parties, clauses, count(DISTINCT r) AS recommendations
OPTIONAL MATCH (d:Decision)
WITH matters, parties, clauses, recommendations, count(DISTINCT d) AS decisions
OPTIONAL MATCH (con:Concession)
RETURN matters, parties, clauses, recommendations, decisions, count(DISTINCT con) AS concessions";

const DECISION_DISTRIBUTION: &str = "\
MATCH (d:Decision)
WITH count(d) AS total
MATCH (d2:Decision)
WITH d2.decision_type AS decision_type, count(d2) AS count, total
RETURN decision_type, count, round(100.0 * count / total) AS percentage
ORDER BY count DESC";
