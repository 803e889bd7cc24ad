//! KPI query templates
//!
//! Named lineage and audit queries. Each template declares its parameters as
//! `$name` placeholders; `build_queries` hands every template only the
//! parameters it references. `measure` scores a populated graph against
//! the negotiation KPI targets.

pub mod measure;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::gateway::{GatewayError, QueryGateway};
use crate::nlq::placeholders;
use crate::value::{Params, Row};

#[derive(Error, Debug)]
pub enum KpiError {
    #[error("Unknown KPI template: {0}")]
    UnknownTemplate(String),
    #[error("Missing parameter '{name}' for KPI '{template}'")]
    MissingParameter { template: String, name: String },
    #[error("KPI query failed: {0}")]
    Gateway(#[from] GatewayError),
}

pub type KpiResult<T> = Result<T, KpiError>;

/// A named, documented query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KpiTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub cypher: &'static str,
}

impl KpiTemplate {
    /// Placeholder names this template binds
    pub fn parameters(&self) -> Vec<String> {
        placeholders(self.cypher)
    }

    /// Attach the subset of `params` this template references
    pub fn with_parameters(&self, params: &Params) -> KpiQuery {
        let wanted = self.parameters();
        let parameters = params
            .iter()
            .filter(|(name, _)| wanted.contains(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        KpiQuery {
            template: self.clone(),
            parameters,
        }
    }
}

/// A template with its bound parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiQuery {
    #[serde(flatten)]
    pub template: KpiTemplate,
    pub parameters: Params,
}

impl KpiQuery {
    pub fn name(&self) -> &str {
        self.template.name
    }

    /// Run against `gateway`. Every placeholder must be bound.
    pub fn run<G: QueryGateway + ?Sized>(&self, gateway: &G) -> KpiResult<Vec<Row>> {
        if let Some(name) = self
            .template
            .parameters()
            .into_iter()
            .find(|name| !self.parameters.contains_key(name))
        {
            return Err(KpiError::MissingParameter {
                template: self.template.name.to_string(),
                name,
            });
        }
        let rows = gateway.execute(self.template.cypher.trim(), &self.parameters)?;
        info!("KPI {} -> {} row(s)", self.template.name, rows.len());
        Ok(rows)
    }
}

pub const CLAUSE_LINEAGE: KpiTemplate = KpiTemplate {
    name: "clause_lineage",
    description: "Track clause lineage with associated decisions across versions.",
    cypher: "
MATCH path = (c1:Clause {canonical_clause_id: $canonical_clause_id})-[:EVOLVES_TO*0..]->(cN)
WITH nodes(path) AS clauses
UNWIND clauses AS clause
OPTIONAL MATCH (clause)-[:HAS_AGENT_RECOMMENDATION]->(rec)
OPTIONAL MATCH (rec)<-[:APPLIES_TO]-(decision)
RETURN clause.version_id AS version_id,
       clause.section_path AS section_path,
       rec.rec_id AS recommendation_id,
       decision.decision_type AS decision_type,
       decision.actor AS actor,
       decision.ts AS decided_at
ORDER BY clause.version_id",
};

pub const OUTSTANDING_RECOMMENDATIONS: KpiTemplate = KpiTemplate {
    name: "outstanding_recommendations",
    description: "Identify pending recommendations awaiting user action.",
    cypher: "
MATCH (rec:AgentRecommendation)
WHERE rec.status = 'pending'
  AND NOT EXISTS { MATCH (:UserDecision)-[:APPLIES_TO]->(rec) }
RETURN rec.rec_id AS recommendation_id,
       rec.issue_type AS issue_type,
       rec.severity AS severity,
       rec.ts AS created_at
ORDER BY rec.ts",
};

pub const HANDOVER_SNAPSHOT: KpiTemplate = KpiTemplate {
    name: "handover_snapshot",
    description: "Gather session-specific context for a lawyer handover.",
    cypher: "
MATCH (session:ReviewSession {session_id: $session_id})
MATCH (session)<-[:LOGGED_IN]-(decision:UserDecision)-[:APPLIES_TO]->(rec:AgentRecommendation)
MATCH (rec)<-[:HAS_AGENT_RECOMMENDATION]-(clause:Clause)
OPTIONAL MATCH (rec)-[:JUSTIFIED_BY]->(rat:Rationale)
RETURN clause.section_path AS section_path,
       rec.issue_type AS issue_type,
       rec.severity AS severity,
       decision.decision_type AS decision_type,
       decision.status AS status,
       decision.actor AS actor,
       decision.ts AS decided_at,
       rat.rationale_text AS rationale
ORDER BY clause.section_path",
};

pub const CONCESSION_TRAIL: KpiTemplate = KpiTemplate {
    name: "concession_trail",
    description: "List recent concessions with timing and impact.",
    cypher: "
MATCH (cons:Concession)-[:AFFECTS_CLAUSE]->(clause:Clause)
WHERE cons.ts >= datetime($since)
RETURN clause.canonical_clause_id AS canonical_clause_id,
       clause.section_path AS section_path,
       cons.description AS description,
       cons.trigger AS trigger,
       cons.value_impact AS value_impact,
       cons.ts AS conceded_at
ORDER BY cons.ts DESC",
};

pub fn default_templates() -> Vec<KpiTemplate> {
    vec![
        CLAUSE_LINEAGE,
        OUTSTANDING_RECOMMENDATIONS,
        HANDOVER_SNAPSHOT,
        CONCESSION_TRAIL,
    ]
}

pub fn find_template(name: &str) -> KpiResult<KpiTemplate> {
    default_templates()
        .into_iter()
        .find(|t| t.name == name)
        .ok_or_else(|| KpiError::UnknownTemplate(name.to_string()))
}

/// Every default template with the parameters it references
pub fn build_queries(params: &Params) -> Vec<KpiQuery> {
    default_templates()
        .iter()
        .map(|t| t.with_parameters(params))
        .collect()
}

/// JSON description of `queries`: name, description, trimmed cypher, parameters
pub fn describe_queries(queries: &[KpiQuery]) -> serde_json::Value {
    serde_json::Value::Array(
        queries
            .iter()
            .map(|q| {
                serde_json::json!({
                    "name": q.template.name,
                    "description": q.template.description,
                    "cypher": q.template.cypher.trim(),
                    "parameters": q.parameters,
                })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ScriptedGateway;
    use crate::value::Value;

    fn params() -> Params {
        let mut p = Params::new();
        p.insert("session_id".to_string(), Value::from("sess-1"));
        p.insert("since".to_string(), Value::from("2024-01-01T00:00:00"));
        p.insert("unused".to_string(), Value::Integer(1));
        p
    }

    #[test]
    fn test_template_parameters() {
        assert_eq!(CLAUSE_LINEAGE.parameters(), vec!["canonical_clause_id"]);
        assert!(OUTSTANDING_RECOMMENDATIONS.parameters().is_empty());
    }

    #[test]
    fn test_build_queries_binds_subset() {
        let queries = build_queries(&params());
        assert_eq!(queries.len(), 4);

        let handover = queries.iter().find(|q| q.name() == "handover_snapshot").unwrap();
        assert_eq!(handover.parameters.len(), 1);
        assert_eq!(handover.parameters.get("session_id"), Some(&Value::from("sess-1")));

        let outstanding = queries.iter().find(|q| q.name() == "outstanding_recommendations").unwrap();
        assert!(outstanding.parameters.is_empty());
    }

    #[test]
    fn test_describe_queries() {
        let described = describe_queries(&build_queries(&params()));
        let trail = &described[3];
        assert_eq!(trail["name"], "concession_trail");
        assert_eq!(trail["parameters"]["since"], "2024-01-01T00:00:00");
        assert!(trail["cypher"].as_str().unwrap().starts_with("MATCH"));
    }

    #[test]
    fn test_run_requires_all_parameters() {
        let gateway = ScriptedGateway::new();
        let query = CLAUSE_LINEAGE.with_parameters(&Params::new());
        assert!(matches!(
            query.run(&gateway),
            Err(KpiError::MissingParameter { .. })
        ));
        assert!(gateway.executed().is_empty());
    }

    #[test]
    fn test_run_through_gateway() {
        let gateway = ScriptedGateway::new()
            .respond("AgentRecommendation", vec![vec![Value::from("rec-1")]]);
        let rows = OUTSTANDING_RECOMMENDATIONS
            .with_parameters(&Params::new())
            .run(&gateway)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(gateway.last().unwrap().query.starts_with("MATCH (rec:AgentRecommendation)"));
    }

    #[test]
    fn test_find_template() {
        assert_eq!(find_template("concession_trail").unwrap().name, "concession_trail");
        assert!(matches!(find_template("nope"), Err(KpiError::UnknownTemplate(_))));
    }
}
