//! Result formatters
//!
//! Each formatter knows the column layout its query returns. Rows shorter
//! than expected read the missing cells as null.

use crate::value::{cell, Params, Row, Value};

/// How to render the rows of a rule's query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatter {
    /// matter, clause, title, actor, description, impact, rationale, timestamp
    Concessions,
    /// matter, version, clause, title, recommendation, decision, actor, notes
    RoundDecisions,
    /// matter, version, clause, title, category
    ClauseSearch,
    /// matter, clause, title, recommendation type, decision, timestamp, notes
    ActorDecisions,
    /// matter, version, clause, title, issue, decision, reviewer
    UnfavorableTerms,
    /// matter, version, type, updated, clauses, recommendations, decisions, concessions
    MatterOverview,
    /// matter, version, clause, title, recommendation, issue, decision
    ClauseHistory,
    /// matters, parties, clauses, recommendations, decisions, concessions
    Statistics,
    /// decision type, count, percentage
    DecisionDistribution,
    /// any shape, cells joined with `|`
    Generic,
}

impl Formatter {
    /// Render `rows` as text. `params` supplies context for headings and
    /// empty-result messages.
    pub fn render(&self, rows: &[Row], params: &Params) -> String {
        match self {
            Formatter::Concessions => concessions(rows),
            Formatter::RoundDecisions => round_decisions(rows, params),
            Formatter::ClauseSearch => clause_search(rows, params),
            Formatter::ActorDecisions => actor_decisions(rows, params),
            Formatter::UnfavorableTerms => unfavorable_terms(rows),
            Formatter::MatterOverview => matter_overview(rows, params),
            Formatter::ClauseHistory => clause_history(rows, params),
            Formatter::Statistics => statistics(rows),
            Formatter::DecisionDistribution => decision_distribution(rows),
            Formatter::Generic => generic(rows),
        }
    }
}

fn param(params: &Params, name: &str) -> String {
    params
        .get(name)
        .map(|v| v.to_string())
        .unwrap_or_else(|| "?".to_string())
}

fn or_else(value: &Value, fallback: &str) -> String {
    if value.is_present() {
        value.to_string()
    } else {
        fallback.to_string()
    }
}

fn concessions(rows: &[Row]) -> String {
    if rows.is_empty() {
        return "No concessions found in the database.".to_string();
    }

    let mut out = vec![format!("Found {} concession(s):", rows.len()), String::new()];
    for (i, row) in rows.iter().enumerate() {
        out.push(format!(
            "{}. {} - Clause {}: {}",
            i + 1,
            cell(row, 0),
            cell(row, 1),
            cell(row, 2)
        ));
        out.push(format!("   Who: {}", cell(row, 3)));
        out.push(format!("   What: {}", cell(row, 4)));
        out.push(format!("   Impact: {}", cell(row, 5)));
        out.push(format!("   Rationale: {}", cell(row, 6)));
        out.push(format!("   When: {}", cell(row, 7)));
        out.push(String::new());
    }
    out.join("\n")
}

fn round_decisions(rows: &[Row], params: &Params) -> String {
    let version = param(params, "version");
    if rows.is_empty() {
        return format!("No decisions found for version {}.", version);
    }

    let mut out = vec![format!("Decisions in Round/Version {}:", version), String::new()];
    let decided = rows.iter().filter(|row| cell(row, 5).is_present());
    let mut shown = 0;
    for (i, row) in decided.enumerate() {
        out.push(format!("{}. Clause {}: {}", i + 1, cell(row, 2), cell(row, 3)));
        out.push(format!("   Recommendation: {}", or_else(cell(row, 4), "None")));
        out.push(format!("   Decision: {} (by {})", cell(row, 5), cell(row, 6)));
        if cell(row, 7).is_present() {
            out.push(format!("   Notes: {}", cell(row, 7)));
        }
        out.push(String::new());
        shown += 1;
    }

    if shown == 0 {
        return format!("No decisions recorded for version {}.", version);
    }
    out.join("\n")
}

fn clause_search(rows: &[Row], params: &Params) -> String {
    let keyword = params
        .get("keyword")
        .map(|v| v.to_string())
        .unwrap_or_default();
    if rows.is_empty() {
        return format!("No clauses found containing '{}'.", keyword);
    }

    let mut out = vec![
        format!("Found {} clause(s) matching '{}':", rows.len(), keyword),
        String::new(),
    ];
    for (i, row) in rows.iter().enumerate() {
        out.push(format!(
            "{}. {} v{} - Clause {}: {}",
            i + 1,
            cell(row, 0),
            cell(row, 1),
            cell(row, 2),
            cell(row, 3)
        ));
        out.push(format!("   Category: {}", cell(row, 4)));
        out.push(String::new());
    }
    out.join("\n")
}

fn actor_decisions(rows: &[Row], params: &Params) -> String {
    let actor = param(params, "actor");
    if rows.is_empty() {
        return format!("No decisions found for {}.", actor);
    }

    let mut out = vec![format!("Decisions by {}:", actor), String::new()];
    for (i, row) in rows.iter().enumerate() {
        out.push(format!(
            "{}. {} - Clause {}: {}",
            i + 1,
            cell(row, 0),
            cell(row, 1),
            cell(row, 2)
        ));
        out.push(format!("   Recommendation type: {}", cell(row, 3)));
        out.push(format!("   Decision: {}", cell(row, 4)));
        out.push(format!("   When: {}", cell(row, 5)));
        if cell(row, 6).is_present() {
            out.push(format!("   Notes: {}...", cell(row, 6)));
        }
        out.push(String::new());
    }
    out.join("\n")
}

fn unfavorable_terms(rows: &[Row]) -> String {
    if rows.is_empty() {
        return "No unfavorable terms found.".to_string();
    }

    let mut out = vec![format!("Found {} unfavorable term(s):", rows.len()), String::new()];
    for (i, row) in rows.iter().enumerate() {
        out.push(format!(
            "{}. {} v{} - Clause {}: {}",
            i + 1,
            cell(row, 0),
            cell(row, 1),
            cell(row, 2),
            cell(row, 3)
        ));
        out.push(format!("   Issue: {}", cell(row, 4)));
        let reviewer = cell(row, 6);
        if reviewer.is_present() {
            out.push(format!(
                "   Decision: {} by {}",
                or_else(cell(row, 5), "Pending"),
                reviewer
            ));
        } else {
            out.push(format!("   Decision: {}", or_else(cell(row, 5), "Pending")));
        }
        out.push(String::new());
    }
    out.join("\n")
}

fn matter_overview(rows: &[Row], params: &Params) -> String {
    if rows.is_empty() {
        return format!("Matter {} not found.", param(params, "matter_id"));
    }

    let mut out = vec!["Matter Overview:".to_string(), String::new()];
    for row in rows {
        out.push(format!("Matter: {} (Version {})", cell(row, 0), cell(row, 1)));
        out.push(format!("Type: {}", cell(row, 2)));
        out.push(format!("Last updated: {}", cell(row, 3)));
        out.push(String::new());
        out.push("Statistics:".to_string());
        out.push(format!("  - Clauses: {}", cell(row, 4)));
        out.push(format!("  - Recommendations: {}", cell(row, 5)));
        out.push(format!("  - Decisions: {}", cell(row, 6)));
        out.push(format!("  - Concessions: {}", cell(row, 7)));
        out.push(String::new());
    }
    out.join("\n")
}

fn clause_history(rows: &[Row], params: &Params) -> String {
    let clause = param(params, "clause_number");
    if rows.is_empty() {
        return format!("No history found for clause {}.", clause);
    }

    let mut out = vec![format!("History of Clause {}:", clause), String::new()];
    for (i, row) in rows.iter().enumerate() {
        out.push(format!(
            "{}. Version {} ({}): {}",
            i + 1,
            cell(row, 1),
            cell(row, 0),
            cell(row, 3)
        ));
        if cell(row, 4).is_present() {
            out.push(format!("   Recommendation: {} ({})", cell(row, 4), cell(row, 5)));
            out.push(format!("   Decision: {}", or_else(cell(row, 6), "Pending")));
        } else {
            out.push("   No recommendations".to_string());
        }
        out.push(String::new());
    }
    out.join("\n")
}

fn statistics(rows: &[Row]) -> String {
    let Some(row) = rows.first() else {
        return "No statistics available.".to_string();
    };

    let labels = [
        "Matters",
        "Parties",
        "Clauses",
        "Recommendations",
        "Decisions",
        "Concessions",
    ];
    let mut out = vec!["System Statistics:".to_string(), String::new()];
    for (i, label) in labels.iter().enumerate() {
        out.push(format!("{}: {}", label, cell(row, i)));
    }
    out.push(String::new());
    out.join("\n")
}

fn decision_distribution(rows: &[Row]) -> String {
    if rows.is_empty() {
        return "No decision data available.".to_string();
    }

    let mut out = vec!["Decision Distribution:".to_string(), String::new()];
    for row in rows {
        out.push(format!("{}: {} ({}%)", cell(row, 0), cell(row, 1), cell(row, 2)));
    }
    out.push(String::new());
    out.join("\n")
}

fn generic(rows: &[Row]) -> String {
    if rows.is_empty() {
        return "No results found.".to_string();
    }

    let mut out = vec![format!("Found {} result(s):", rows.len()), String::new()];
    for (i, row) in rows.iter().enumerate() {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        out.push(format!("{}. {}", i + 1, cells.join(" | ")));
    }
    out.push(String::new());
    out.join("\n")
}
