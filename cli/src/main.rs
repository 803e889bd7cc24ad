//! negotiation-cli: ask negotiation-history questions from the command line
//!
//! Connects to a FalkorDB-compatible graph server through `RespGateway`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use negotiation_graph::kpi::measure::{self, KpiMeasurement, MeasureOptions};
use negotiation_graph::kpi::{self, KpiTemplate};
use negotiation_graph::{
    GatewayConfig, Interpreter, Params, QueryOutcome, RespGateway, Row, Value, EXAMPLE_QUESTIONS,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "negotiation-cli", version, about = "Negotiation history query CLI")]
struct Cli {
    /// Graph server host
    #[arg(long, global = true, env = "NEGOTIATION_GRAPH_HOST")]
    host: Option<String>,

    /// Graph server port
    #[arg(long, global = true, env = "NEGOTIATION_GRAPH_PORT")]
    port: Option<u16>,

    /// Graph name
    #[arg(long, global = true, env = "NEGOTIATION_GRAPH_NAME")]
    graph: Option<String>,

    /// YAML gateway configuration
    #[arg(long, global = true, env = "NEGOTIATION_GRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Print the query and parameters sent to the server
    #[arg(long, global = true)]
    show_cypher: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask one question
    Ask {
        /// The question, e.g. "Show me all concessions"
        #[arg(required = true, trailing_var_arg = true)]
        question: Vec<String>,
    },
    /// Start an interactive question loop
    Shell,
    /// List example questions
    Examples,
    /// Named lineage and audit queries
    Kpi {
        #[command(subcommand)]
        command: KpiCommands,
    },
    /// Ping the server
    Ping,
}

#[derive(Subcommand)]
enum KpiCommands {
    /// List the available KPI queries
    List,
    /// Run one KPI query
    Run {
        /// KPI name, see `kpi list`
        name: String,

        /// Query parameter, repeatable
        #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
        params: Vec<(String, Value)>,
    },
    /// Score the graph against the negotiation KPI targets
    Measure {
        /// Write the JSON report to this file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Matter used by the latency queries
        #[arg(long, default_value = "matter_001")]
        matter_id: String,

        /// Clause number used by the latency queries
        #[arg(long, default_value = "1.1")]
        clause_number: String,

        /// Actor used by the latency queries
        #[arg(long, default_value = "Jessica Martinez")]
        actor: String,

        /// Title term used by the latency queries
        #[arg(long, default_value = "Liability")]
        title_term: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns `false` when the command completed but did not succeed.
fn run(cli: &Cli) -> anyhow::Result<bool> {
    match &cli.command {
        Commands::Examples => {
            print_examples(cli.format)?;
            return Ok(true);
        }
        Commands::Kpi {
            command: KpiCommands::List,
        } => {
            print_kpi_list(cli.format)?;
            return Ok(true);
        }
        _ => {}
    }

    let config = gateway_config(cli)?;
    let gateway = RespGateway::new(config);

    match &cli.command {
        Commands::Ask { question } => {
            let interpreter =
                Interpreter::new(gateway).context("failed to build pattern table")?;
            let outcome = interpreter.execute_query(&question.join(" "));
            print_outcome(&outcome, cli, 5)?;
            Ok(outcome.success)
        }
        Commands::Shell => {
            let interpreter =
                Interpreter::new(gateway).context("failed to build pattern table")?;
            run_shell(&interpreter, cli)?;
            Ok(true)
        }
        Commands::Kpi {
            command: KpiCommands::Run { name, params },
        } => {
            let params: Params = params.iter().cloned().collect();
            run_kpi(&gateway, name, &params, cli)?;
            Ok(true)
        }
        Commands::Kpi {
            command:
                KpiCommands::Measure {
                    output,
                    matter_id,
                    clause_number,
                    actor,
                    title_term,
                },
        } => {
            let options = MeasureOptions {
                matter_id: matter_id.clone(),
                clause_number: clause_number.clone(),
                actor: actor.clone(),
                title_term: title_term.clone(),
            };
            run_measure(&gateway, options, output.as_deref(), cli.format)
        }
        Commands::Ping => {
            let reply = gateway.ping().with_context(|| {
                format!("could not reach {}", gateway.config().address())
            })?;
            println!("{}", reply);
            Ok(true)
        }
        Commands::Examples
        | Commands::Kpi {
            command: KpiCommands::List,
        } => Ok(true),
    }
}

fn gateway_config(cli: &Cli) -> anyhow::Result<GatewayConfig> {
    let mut config = match &cli.config {
        Some(path) => GatewayConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => GatewayConfig::default(),
    };
    debug!(
        "Loaded gateway config from {}",
        cli.config
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "defaults".to_string())
    );
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(graph) = &cli.graph {
        config.graph = graph.clone();
    }
    debug!("Using graph '{}' at {}", config.graph, config.address());
    Ok(config)
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(format!("expected KEY=VALUE, got '{}'", raw));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{}'", raw));
    }
    let value = match value.parse::<i64>() {
        Ok(i) => Value::Integer(i),
        Err(_) => Value::String(value.to_string()),
    };
    Ok((key.to_string(), value))
}

fn print_outcome(outcome: &QueryOutcome, cli: &Cli, max_suggestions: usize) -> anyhow::Result<()> {
    if let OutputFormat::Json = cli.format {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    if let Some(description) = &outcome.description {
        println!("Interpretation: {}", description);
    }
    if cli.show_cypher && !outcome.cypher.is_empty() {
        println!("Cypher:\n{}", outcome.cypher);
        if !outcome.parameters.is_empty() {
            println!("Parameters: {}", serde_json::to_string(&outcome.parameters)?);
        }
    }

    if outcome.success {
        println!();
        println!("{}", outcome.results.trim_end());
    } else {
        if let Some(error) = &outcome.error {
            println!("Error: {}", error);
        }
        if let Some(suggestions) = &outcome.suggestions {
            println!("Try asking:");
            for suggestion in suggestions.iter().take(max_suggestions) {
                println!("  - {}", suggestion);
            }
        }
    }
    Ok(())
}

fn run_shell(interpreter: &Interpreter<RespGateway>, cli: &Cli) -> anyhow::Result<()> {
    println!("Negotiation History Shell");
    println!("Ask a question, or 'help' for examples. 'quit' to exit.\n");

    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        print!("ask> ");
        std::io::stdout().flush()?;

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match trimmed.to_lowercase().as_str() {
            "quit" | "exit" | "q" => break,
            "help" | "h" | "?" => {
                println!("Example questions:");
                for question in EXAMPLE_QUESTIONS {
                    println!("  - {}", question);
                }
                println!("Commands: help, quit");
            }
            _ => {
                let outcome = interpreter.execute_query(trimmed);
                print_outcome(&outcome, cli, 3)?;
                println!();
            }
        }
    }

    println!("Bye!");
    Ok(())
}

fn print_examples(format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&EXAMPLE_QUESTIONS)?),
        OutputFormat::Text => {
            for question in EXAMPLE_QUESTIONS {
                println!("{}", question);
            }
        }
    }
    Ok(())
}

fn print_kpi_list(format: OutputFormat) -> anyhow::Result<()> {
    let templates = kpi::default_templates();
    match format {
        OutputFormat::Json => {
            let queries = kpi::build_queries(&Params::new());
            println!("{}", serde_json::to_string_pretty(&kpi::describe_queries(&queries))?);
        }
        OutputFormat::Text => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Name", "Parameters", "Description"]);
            for template in &templates {
                table.add_row(vec![
                    template.name.to_string(),
                    template.parameters().join(", "),
                    template.description.to_string(),
                ]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}

fn run_kpi(gateway: &RespGateway, name: &str, params: &Params, cli: &Cli) -> anyhow::Result<()> {
    let template: KpiTemplate = kpi::find_template(name)?;
    let query = template.with_parameters(params);
    debug!("Running KPI '{}' with {} parameter(s)", name, query.parameters.len());
    if cli.show_cypher {
        eprintln!("{}", template.cypher.trim());
    }
    let rows = query
        .run(gateway)
        .with_context(|| format!("KPI '{}' failed", name))?;

    match cli.format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "name": template.name,
                "parameters": query.parameters,
                "rows": rows,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => print_rows(&rows),
    }
    Ok(())
}

fn run_measure(
    gateway: &RespGateway,
    options: MeasureOptions,
    output: Option<&Path>,
    format: OutputFormat,
) -> anyhow::Result<bool> {
    debug!("Measuring KPIs with {:?}", options);
    let report = KpiMeasurement::with_options(gateway, options)
        .report()
        .context("KPI measurement failed")?;
    debug!("KPI measurement finished, overall pass: {}", report.overall_pass);

    let json = serde_json::to_string_pretty(&report)?;
    if let Some(path) = output {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, &json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!("Wrote KPI report to {}", path.display());
    }

    match format {
        OutputFormat::Json => println!("{}", json),
        OutputFormat::Text => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["KPI", "Target", "Actual", "Status"]);
            for (name, target, actual, pass) in measure::summary(&report) {
                let status = if pass { "PASS" } else { "FAIL" };
                table.add_row(vec![name.to_string(), target.to_string(), actual, status.to_string()]);
            }
            println!("{}", table);
            println!(
                "Overall: {}",
                if report.overall_pass { "ALL KPIs PASSED" } else { "SOME KPIs FAILED" }
            );
        }
    }
    Ok(report.overall_pass)
}

fn print_rows(rows: &[Row]) {
    if rows.is_empty() {
        println!("(no results)");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    for row in rows {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        table.add_row(cells);
    }

    println!("{}", table);
    println!("{} row(s)", rows.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("session_id=abc").unwrap(),
            ("session_id".to_string(), Value::from("abc"))
        );
        assert_eq!(
            parse_param("version=2").unwrap(),
            ("version".to_string(), Value::Integer(2))
        );
        assert_eq!(
            parse_param("since=2024-01-01T00:00:00Z").unwrap().1,
            Value::from("2024-01-01T00:00:00Z")
        );
        assert!(parse_param("no_equals").is_err());
        assert!(parse_param("=value").is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "negotiation-cli",
            "--host",
            "graph.internal",
            "--port",
            "7000",
            "ask",
            "Show",
            "me",
            "all",
            "concessions",
        ]);
        let config = gateway_config(&cli).unwrap();
        assert_eq!(config.host, "graph.internal");
        assert_eq!(config.port, 7000);
        match cli.command {
            Commands::Ask { question } => assert_eq!(question.join(" "), "Show me all concessions"),
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_measure_arguments() {
        let cli = Cli::parse_from([
            "negotiation-cli",
            "kpi",
            "measure",
            "--output",
            "reports/kpi_report.json",
            "--actor",
            "Sarah Chen",
        ]);
        match cli.command {
            Commands::Kpi {
                command:
                    KpiCommands::Measure {
                        output,
                        matter_id,
                        actor,
                        ..
                    },
            } => {
                assert_eq!(output, Some(PathBuf::from("reports/kpi_report.json")));
                assert_eq!(matter_id, "matter_001");
                assert_eq!(actor, "Sarah Chen");
            }
            _ => panic!("expected kpi measure"),
        }
    }
}
