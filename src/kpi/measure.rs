//! KPI measurement
//!
//! Scores a populated negotiation graph against five targets:
//! clause linkage, recommendation suppression, handover completeness,
//! concession visibility latency and query latency. Every per-matter query
//! binds its values as parameters.

use chrono::Utc;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

use crate::gateway::QueryGateway;
use crate::kpi::KpiResult;
use crate::value::{cell, Params, Row, Value};

pub const TARGET_PRECISION: f64 = 0.90;
pub const TARGET_RECALL: f64 = 0.85;
pub const TARGET_SUPPRESSION: f64 = 0.75;
pub const TARGET_COMPLETENESS: f64 = 0.95;
pub const TARGET_VISIBILITY_SECONDS: f64 = 120.0;
pub const TARGET_QUERY_MS: f64 = 5000.0;

/// Examples kept in each report section
const EXAMPLE_LIMIT: usize = 5;

pub const MATTER_IDS: &str = "\
MATCH (m:Matter)
RETURN DISTINCT m.matter_id AS matter_id
ORDER BY matter_id";

pub const CLAUSE_NUMBERS: &str = "\
MATCH (c:Clause {matter_id: $matter_id})
RETURN DISTINCT c.clause_number AS clause_number
ORDER BY clause_number";

pub const CLAUSE_VERSIONS: &str = "\
MATCH (c:Clause {matter_id: $matter_id, clause_number: $clause_number})
RETURN c.version AS version, c.title AS title
ORDER BY c.version";

pub const TITLE_MISMATCHES: &str = "\
MATCH (c1:Clause), (c2:Clause)
WHERE c1.matter_id = c2.matter_id
  AND c1.clause_number = c2.clause_number
  AND c1.version <> c2.version
  AND c1.title <> c2.title
RETURN c1.matter_id, c1.clause_number, c1.title, c2.title, count(*) AS mismatches";

pub const APPLIED_RECOMMENDATIONS: &str = "\
MATCH (c:Clause {matter_id: $matter_id})-[:HAS_RECOMMENDATION]->(r:Recommendation)
MATCH (r)-[:HAS_DECISION]->(d:Decision {decision_type: 'apply'})
RETURN c.clause_number AS clause_number,
       c.version AS version,
       r.issue_type AS issue_type,
       r.classification AS classification
ORDER BY c.clause_number, c.version";

pub const LATER_REPEATS: &str = "\
MATCH (c:Clause {matter_id: $matter_id, clause_number: $clause_number})
WHERE c.version > $version
MATCH (c)-[:HAS_RECOMMENDATION]->(r:Recommendation {issue_type: $issue_type})
RETURN c.version, r.issue_type";

pub const MATTER_VERSIONS: &str = "\
MATCH (m:Matter)
RETURN m.matter_id AS matter_id, m.version AS version
ORDER BY m.matter_id, m.version";

pub const HANDOVER_ELEMENTS: &str = "\
MATCH (m:Matter {matter_id: $matter_id, version: $version})
OPTIONAL MATCH (p:Party {matter_id: $matter_id})
OPTIONAL MATCH (c:Clause {matter_id: $matter_id, version: $version})
OPTIONAL MATCH (c)-[:HAS_RECOMMENDATION]->(r:Recommendation)
OPTIONAL MATCH (r)-[:HAS_DECISION]->(d:Decision)
OPTIONAL MATCH (d)-[:RESULTED_IN_CONCESSION]->(con:Concession)
RETURN count(DISTINCT m) AS matter_count,
       count(DISTINCT p) AS party_count,
       count(DISTINCT c) AS clause_count,
       count(DISTINCT r) AS rec_count,
       count(DISTINCT d) AS decision_count,
       count(DISTINCT con) AS concession_count";

pub const CONCESSION_LOOKUP: &str = "\
MATCH (d:Decision)-[:RESULTED_IN_CONCESSION]->(con:Concession)
MATCH (c:Clause {clause_id: con.clause_id})
RETURN con.matter_id, con.clause_id, c.clause_number, c.title, d.actor,
       con.description, con.impact, con.rationale, d.timestamp
ORDER BY d.timestamp";

/// Sample values for the latency benchmark queries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasureOptions {
    pub matter_id: String,
    pub clause_number: String,
    pub actor: String,
    pub title_term: String,
}

impl Default for MeasureOptions {
    fn default() -> Self {
        Self {
            matter_id: "matter_001".to_string(),
            clause_number: "1.1".to_string(),
            actor: "Jessica Martinez".to_string(),
            title_term: "Liability".to_string(),
        }
    }
}

/// One latency benchmark: a named query with its parameters
#[derive(Debug, Clone)]
pub struct BenchmarkQuery {
    pub name: &'static str,
    pub cypher: &'static str,
    pub params: Params,
}

fn bind(pairs: &[(&str, &str)]) -> Params {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), Value::from(*value)))
        .collect()
}

/// The common query shapes whose latency is measured
pub fn benchmark_queries(options: &MeasureOptions) -> Vec<BenchmarkQuery> {
    vec![
        BenchmarkQuery {
            name: "Cross-Version Clause Tracking",
            cypher: "\
MATCH (c:Clause {matter_id: $matter_id, clause_number: $clause_number})
RETURN c.version, c.title, c.category
ORDER BY c.version",
            params: bind(&[
                ("matter_id", options.matter_id.as_str()),
                ("clause_number", options.clause_number.as_str()),
            ]),
        },
        BenchmarkQuery {
            name: "All Unfavorable Recommendations",
            cypher: "\
MATCH (c:Clause)-[:HAS_RECOMMENDATION]->(r:Recommendation {classification: 'unfavorable'})
RETURN c.matter_id, c.clause_number, c.title, r.issue_type
ORDER BY c.matter_id, c.clause_number
LIMIT 10",
            params: Params::new(),
        },
        BenchmarkQuery {
            name: "Decisions by Actor",
            cypher: "\
MATCH (d:Decision {actor: $actor})
RETURN d.matter_id, d.decision_type, d.role, d.notes
ORDER BY d.matter_id",
            params: bind(&[("actor", options.actor.as_str())]),
        },
        BenchmarkQuery {
            name: "Cross-Matter Precedent Search",
            cypher: "\
MATCH (c:Clause)
WHERE c.title CONTAINS $title_term
RETURN c.matter_id, c.version, c.clause_number, c.title, c.category
ORDER BY c.matter_id, c.version",
            params: bind(&[("title_term", options.title_term.as_str())]),
        },
        BenchmarkQuery {
            name: "Recommendation Coverage",
            cypher: "\
MATCH (m:Matter)
OPTIONAL MATCH (c:Clause {matter_id: m.matter_id})-[:HAS_RECOMMENDATION]->(r:Recommendation)
RETURN m.matter_id, m.version, count(DISTINCT c) AS total_clauses, count(r) AS recommendations
ORDER BY m.matter_id, m.version",
            params: Params::new(),
        },
        BenchmarkQuery {
            name: "Decision Type Distribution",
            cypher: "\
MATCH (d:Decision)
RETURN d.decision_type, count(d) AS count
ORDER BY count DESC",
            params: Params::new(),
        },
    ]
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkageExample {
    pub matter_id: Value,
    pub clause_number: Value,
    pub versions_found: usize,
    pub linkable: bool,
    pub links: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClauseLinkage {
    pub actual_precision: f64,
    pub actual_recall: f64,
    pub precision_pass: bool,
    pub recall_pass: bool,
    pub overall_pass: bool,
    pub true_positives: usize,
    pub false_positives: usize,
    pub linkable_clauses: usize,
    pub linked_clauses: usize,
    pub examples: Vec<LinkageExample>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuppressionExample {
    pub matter_id: Value,
    pub clause_number: Value,
    pub version: Value,
    pub issue_type: Value,
    pub classification: Value,
    pub repeated_in_later_versions: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationAdherence {
    pub actual: f64,
    pub pass: bool,
    pub applied_recommendations: usize,
    pub not_repeated: usize,
    pub repeated: usize,
    pub examples: Vec<SuppressionExample>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HandoverElements {
    pub matter: i64,
    pub parties: i64,
    pub clauses: i64,
    pub recommendations: i64,
    pub decisions: i64,
    pub concessions: i64,
}

impl HandoverElements {
    /// Fraction of the six handover elements present. A matter needs at
    /// least two parties and one clause; recommendations, decisions and
    /// concessions may legitimately be absent and always count.
    pub fn completeness(&self) -> f64 {
        let required = [self.matter > 0, self.parties >= 2, self.clauses > 0, true, true, true];
        required.iter().filter(|present| **present).count() as f64 / required.len() as f64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionCompleteness {
    pub matter_id: Value,
    pub version: Value,
    pub completeness: f64,
    pub elements: HandoverElements,
}

#[derive(Debug, Clone, Serialize)]
pub struct HandoverCompleteness {
    pub actual: f64,
    pub pass: bool,
    pub versions_measured: usize,
    pub scores: Vec<VersionCompleteness>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConcessionVisibility {
    pub actual_milliseconds: f64,
    pub pass: bool,
    pub concessions_found: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryTiming {
    pub name: String,
    pub latency_ms: f64,
    pub rows_returned: usize,
    pub pass: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryPerformance {
    pub actual_avg_ms: f64,
    pub max_latency_ms: f64,
    pub min_latency_ms: f64,
    pub pass: bool,
    pub queries: Vec<QueryTiming>,
}

/// All five measurements
#[derive(Debug, Clone, Serialize)]
pub struct KpiReport {
    pub timestamp: String,
    pub overall_pass: bool,
    pub clause_linkage: ClauseLinkage,
    pub recommendation_adherence: RecommendationAdherence,
    pub handover_completeness: HandoverCompleteness,
    pub concession_visibility: ConcessionVisibility,
    pub query_performance: QueryPerformance,
}

fn count(value: &Value) -> i64 {
    value
        .as_integer()
        .or_else(|| value.as_float().map(|f| f as i64))
        .unwrap_or(0)
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        1.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn timed<G: QueryGateway + ?Sized>(
    gateway: &G,
    query: &str,
    params: &Params,
) -> KpiResult<(Vec<Row>, f64)> {
    let start = Instant::now();
    let rows = gateway.execute(query, params)?;
    Ok((rows, start.elapsed().as_secs_f64() * 1000.0))
}

/// Runs the measurements against one gateway
pub struct KpiMeasurement<'g, G: ?Sized> {
    gateway: &'g G,
    options: MeasureOptions,
}

impl<'g, G: QueryGateway + ?Sized> KpiMeasurement<'g, G> {
    pub fn new(gateway: &'g G) -> Self {
        Self::with_options(gateway, MeasureOptions::default())
    }

    pub fn with_options(gateway: &'g G, options: MeasureOptions) -> Self {
        Self { gateway, options }
    }

    fn query(&self, cypher: &str, params: Params) -> KpiResult<Vec<Row>> {
        Ok(self.gateway.execute(cypher, &params)?)
    }

    fn matter_ids(&self) -> KpiResult<Vec<Value>> {
        let rows = self.query(MATTER_IDS, Params::new())?;
        Ok(rows.iter().map(|row| cell(row, 0).clone()).collect())
    }

    /// Clauses sharing a number within a matter link across versions:
    /// n versions give n - 1 links. Precision counts title mismatches
    /// between linked versions as false links; recall is links found per
    /// linkable clause, capped at 1.
    pub fn clause_linkage(&self) -> KpiResult<ClauseLinkage> {
        let mut details = Vec::new();
        for matter_id in self.matter_ids()? {
            let mut params = Params::new();
            params.insert("matter_id".to_string(), matter_id.clone());
            for number_row in self.query(CLAUSE_NUMBERS, params.clone())? {
                let clause_number = cell(&number_row, 0).clone();
                let mut versions_params = params.clone();
                versions_params.insert("clause_number".to_string(), clause_number.clone());
                let versions_found = self.query(CLAUSE_VERSIONS, versions_params)?.len();
                let linkable = versions_found > 1;
                details.push(LinkageExample {
                    matter_id: matter_id.clone(),
                    clause_number,
                    versions_found,
                    linkable,
                    links: if linkable { versions_found - 1 } else { 0 },
                });
            }
        }

        let false_positives = self.query(TITLE_MISMATCHES, Params::new())?.len();
        let true_positives: usize = details.iter().map(|d| d.links).sum();
        let linkable_clauses = details.iter().filter(|d| d.linkable).count();
        let linked_clauses = true_positives;

        let precision = ratio(true_positives, true_positives + false_positives);
        let recall = ratio(linked_clauses, linkable_clauses).min(1.0);
        let precision_pass = precision >= TARGET_PRECISION;
        let recall_pass = recall >= TARGET_RECALL;
        info!("Clause linkage: precision {:.3}, recall {:.3}", precision, recall);

        details.truncate(EXAMPLE_LIMIT);
        Ok(ClauseLinkage {
            actual_precision: precision,
            actual_recall: recall,
            precision_pass,
            recall_pass,
            overall_pass: precision_pass && recall_pass,
            true_positives,
            false_positives,
            linkable_clauses,
            linked_clauses,
            examples: details,
        })
    }

    /// Share of applied recommendations whose issue does not come back on
    /// the same clause in a later version.
    pub fn recommendation_adherence(&self) -> KpiResult<RecommendationAdherence> {
        let mut examples = Vec::new();
        let mut applied = 0;
        let mut repeated = 0;

        for matter_id in self.matter_ids()? {
            let mut params = Params::new();
            params.insert("matter_id".to_string(), matter_id.clone());
            for row in self.query(APPLIED_RECOMMENDATIONS, params.clone())? {
                let mut later = params.clone();
                later.insert("clause_number".to_string(), cell(&row, 0).clone());
                later.insert("version".to_string(), cell(&row, 1).clone());
                later.insert("issue_type".to_string(), cell(&row, 2).clone());
                let is_repeat = !self.query(LATER_REPEATS, later)?.is_empty();

                applied += 1;
                if is_repeat {
                    repeated += 1;
                }
                examples.push(SuppressionExample {
                    matter_id: matter_id.clone(),
                    clause_number: cell(&row, 0).clone(),
                    version: cell(&row, 1).clone(),
                    issue_type: cell(&row, 2).clone(),
                    classification: cell(&row, 3).clone(),
                    repeated_in_later_versions: is_repeat,
                });
            }
        }

        let rate = ratio(applied - repeated, applied);
        info!("Recommendation suppression: {:.3} over {} applied", rate, applied);
        examples.truncate(EXAMPLE_LIMIT);
        Ok(RecommendationAdherence {
            actual: rate,
            pass: rate >= TARGET_SUPPRESSION,
            applied_recommendations: applied,
            not_repeated: applied - repeated,
            repeated,
            examples,
        })
    }

    /// Average completeness of the handover context per matter version.
    pub fn handover_completeness(&self) -> KpiResult<HandoverCompleteness> {
        let mut scores = Vec::new();
        for version_row in self.query(MATTER_VERSIONS, Params::new())? {
            let matter_id = cell(&version_row, 0).clone();
            let version = cell(&version_row, 1).clone();
            let mut params = Params::new();
            params.insert("matter_id".to_string(), matter_id.clone());
            params.insert("version".to_string(), version.clone());

            let rows = self.query(HANDOVER_ELEMENTS, params)?;
            let Some(row) = rows.first() else {
                debug!("No handover elements for {} v{}", matter_id, version);
                continue;
            };
            let elements = HandoverElements {
                matter: count(cell(row, 0)),
                parties: count(cell(row, 1)),
                clauses: count(cell(row, 2)),
                recommendations: count(cell(row, 3)),
                decisions: count(cell(row, 4)),
                concessions: count(cell(row, 5)),
            };
            scores.push(VersionCompleteness {
                matter_id,
                version,
                completeness: elements.completeness(),
                elements,
            });
        }

        let average = if scores.is_empty() {
            0.0
        } else {
            scores.iter().map(|s| s.completeness).sum::<f64>() / scores.len() as f64
        };
        info!("Handover completeness: {:.3} over {} version(s)", average, scores.len());
        Ok(HandoverCompleteness {
            actual: average,
            pass: average >= TARGET_COMPLETENESS,
            versions_measured: scores.len(),
            scores,
        })
    }

    /// Time to retrieve every concession with its context.
    pub fn concession_visibility(&self) -> KpiResult<ConcessionVisibility> {
        let (rows, elapsed_ms) = timed(self.gateway, CONCESSION_LOOKUP, &Params::new())?;
        info!("Concession lookup: {} row(s) in {:.2}ms", rows.len(), elapsed_ms);
        Ok(ConcessionVisibility {
            actual_milliseconds: elapsed_ms,
            pass: elapsed_ms / 1000.0 < TARGET_VISIBILITY_SECONDS,
            concessions_found: rows.len(),
        })
    }

    /// Latency of the common query shapes.
    pub fn query_performance(&self) -> KpiResult<QueryPerformance> {
        let mut queries = Vec::new();
        for bench in benchmark_queries(&self.options) {
            let (rows, latency_ms) = timed(self.gateway, bench.cypher, &bench.params)?;
            debug!("{}: {:.2}ms", bench.name, latency_ms);
            queries.push(QueryTiming {
                name: bench.name.to_string(),
                latency_ms,
                rows_returned: rows.len(),
                pass: latency_ms < TARGET_QUERY_MS,
            });
        }

        let latencies = queries.iter().map(|q| q.latency_ms);
        let total: f64 = latencies.clone().sum();
        Ok(QueryPerformance {
            actual_avg_ms: total / queries.len().max(1) as f64,
            max_latency_ms: latencies.clone().fold(0.0, f64::max),
            min_latency_ms: latencies.fold(f64::INFINITY, f64::min),
            pass: queries.iter().all(|q| q.pass),
            queries,
        })
    }

    /// Run all five measurements
    pub fn report(&self) -> KpiResult<KpiReport> {
        let clause_linkage = self.clause_linkage()?;
        let recommendation_adherence = self.recommendation_adherence()?;
        let handover_completeness = self.handover_completeness()?;
        let concession_visibility = self.concession_visibility()?;
        let query_performance = self.query_performance()?;

        let overall_pass = clause_linkage.overall_pass
            && recommendation_adherence.pass
            && handover_completeness.pass
            && concession_visibility.pass
            && query_performance.pass;

        Ok(KpiReport {
            timestamp: Utc::now().to_rfc3339(),
            overall_pass,
            clause_linkage,
            recommendation_adherence,
            handover_completeness,
            concession_visibility,
            query_performance,
        })
    }
}

/// Summary lines for a report: (KPI, target, actual, passed)
pub fn summary(report: &KpiReport) -> Vec<(&'static str, &'static str, String, bool)> {
    let pct = |v: f64| format!("{:.1}%", v * 100.0);
    vec![
        (
            "Clause Linkage (Precision)",
            ">=90%",
            pct(report.clause_linkage.actual_precision),
            report.clause_linkage.precision_pass,
        ),
        (
            "Clause Linkage (Recall)",
            ">=85%",
            pct(report.clause_linkage.actual_recall),
            report.clause_linkage.recall_pass,
        ),
        (
            "Recommendation Suppression",
            ">=75%",
            pct(report.recommendation_adherence.actual),
            report.recommendation_adherence.pass,
        ),
        (
            "Handover Completeness",
            ">=95%",
            pct(report.handover_completeness.actual),
            report.handover_completeness.pass,
        ),
        (
            "Concession Visibility",
            "<120s",
            format!("{:.1}ms", report.concession_visibility.actual_milliseconds),
            report.concession_visibility.pass,
        ),
        (
            "Query Performance (avg)",
            "<5000ms",
            format!("{:.1}ms", report.query_performance.actual_avg_ms),
            report.query_performance.pass,
        ),
    ]
}
