use clap::{Parser, Subcommand};
use roundtable_agent::AgentConfig;
use roundtable_orchestrator::{
    AgentRegistry, AgreementConvergence, CollaborationRequest, Orchestrator,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "roundtable", about = "Roundtable — multi-agent collaborative tasks")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "roundtable.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a collaborative task and print the result
    Run {
        /// The question or task prompt
        prompt: String,
        /// Additional context for every agent
        #[arg(long)]
        context: Option<String>,
        /// Only consult these agents (comma separated)
        #[arg(long, value_delimiter = ',')]
        agents: Vec<String>,
        /// Single-round mode
        #[arg(long)]
        fast: bool,
        /// Print the full result as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Run a collaborative task, printing events as NDJSON while it runs
    Stream {
        /// The question or task prompt
        prompt: String,
        /// Additional context for every agent
        #[arg(long)]
        context: Option<String>,
        /// Only consult these agents (comma separated)
        #[arg(long, value_delimiter = ',')]
        agents: Vec<String>,
        /// Single-round mode
        #[arg(long)]
        fast: bool,
    },
    /// Probe all configured agents and print a health report
    Health,
    /// Print the agent analytics report
    Analytics,
}

#[derive(Deserialize)]
struct RoundtableConfig {
    agents: Vec<AgentConfig>,
    #[serde(default)]
    orchestrator: OrchestratorConfig,
}

#[derive(Deserialize)]
struct OrchestratorConfig {
    #[serde(default = "default_max_iterations")]
    max_iterations: u32,
    #[serde(default = "default_convergence_threshold")]
    convergence_threshold: f64,
    #[serde(default = "default_shutdown_drain_secs")]
    shutdown_drain_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            convergence_threshold: default_convergence_threshold(),
            shutdown_drain_secs: default_shutdown_drain_secs(),
        }
    }
}

fn default_max_iterations() -> u32 {
    3
}
fn default_convergence_threshold() -> f64 {
    0.85
}
fn default_shutdown_drain_secs() -> u64 {
    30
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_str = tokio::fs::read_to_string(&cli.config).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to read config file '{}': {}",
            cli.config.display(),
            e
        )
    })?;
    let config: RoundtableConfig = toml::from_str(&config_str)?;
    if config.agents.is_empty() {
        anyhow::bail!("config '{}' defines no agents", cli.config.display());
    }

    let registry = Arc::new(AgentRegistry::new());
    for agent in config.agents {
        info!(agent = %agent.name, backend = ?agent.backend, "registering agent");
        registry.register(agent).await;
    }
    let orchestrator = Arc::new(
        Orchestrator::new(registry).with_convergence(AgreementConvergence::new(
            config.orchestrator.convergence_threshold,
        )),
    );
    let drain = Duration::from_secs(config.orchestrator.shutdown_drain_secs);

    match cli.command {
        Commands::Run {
            prompt,
            context,
            agents,
            fast,
            json,
        } => {
            let request = build_request(
                prompt,
                context,
                agents,
                fast,
                config.orchestrator.max_iterations,
            );
            let result = orchestrator.execute_collaborative_task(request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.final_answer);
                println!();
                println!(
                    "confidence {:.2} | {} responses | {} ms",
                    result.confidence_score,
                    result.agent_responses.len(),
                    result.total_time_ms
                );
                for line in &result.collaboration_log {
                    eprintln!("  {line}");
                }
            }
        }
        Commands::Stream {
            prompt,
            context,
            agents,
            fast,
        } => {
            let request = build_request(
                prompt,
                context,
                agents,
                fast,
                config.orchestrator.max_iterations,
            );
            let (task_id, mut rx) = orchestrator.stream_collaborative_task(request).await?;
            info!(task_id = %task_id, "streaming task started");
            while let Some(event) = rx.recv().await {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
        Commands::Health => {
            let report = orchestrator.health_check().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Analytics => {
            let report = orchestrator.get_agent_analytics().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    orchestrator.shutdown(drain).await;
    Ok(())
}

fn build_request(
    prompt: String,
    context: Option<String>,
    agents: Vec<String>,
    fast: bool,
    max_iterations: u32,
) -> CollaborationRequest {
    let mut request = CollaborationRequest::new(prompt).with_max_iterations(max_iterations);
    if let Some(context) = context {
        request = request.with_context(context);
    }
    if !agents.is_empty() {
        request = request.with_required_agents(agents);
    }
    if fast {
        request = request.fast();
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use roundtable_agent::BackendKind;

    #[test]
    fn test_config_parses_with_defaults() {
        let config: RoundtableConfig = toml::from_str(
            r#"
            [[agents]]
            name = "gpt"
            backend = "openai"
            role = "proposer"
            model_type = "gpt-4o-mini"

            [[agents]]
            name = "local"
            backend = "echo"
            role = "synthesizer"
            model_type = "echo-1"
            "#,
        )
        .unwrap();

        assert_eq!(config.agents.len(), 2);
        assert_eq!(config.agents[0].backend, BackendKind::OpenAi);
        assert_eq!(config.orchestrator.max_iterations, 3);
        assert!((config.orchestrator.convergence_threshold - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn test_orchestrator_section_overrides() {
        let config: RoundtableConfig = toml::from_str(
            r#"
            [[agents]]
            name = "gpt"
            backend = "openai"
            role = "critic"
            model_type = "gpt-4o-mini"

            [orchestrator]
            max_iterations = 5
            convergence_threshold = 0.6
            "#,
        )
        .unwrap();

        assert_eq!(config.orchestrator.max_iterations, 5);
        assert!((config.orchestrator.convergence_threshold - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.orchestrator.shutdown_drain_secs, 30);
    }
}
