//! cortex-chat - Ask questions about Snowflake data through Cortex Analyst.

mod cli;
mod logging;
mod repl;

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{bail, Context};
use cli::Cli;
use cortex_chat::analyst::{AnalystClient, CortexAnalystClient, MockAnalystClient};
use cortex_chat::app::Orchestrator;
use cortex_chat::config::Config;
use cortex_chat::credentials::{CredentialField, CredentialLayer, CredentialResolver};
use cortex_chat::error::ChatError;
use cortex_chat::warehouse::{self, MockWarehouse, Warehouse};
use logging::LogTarget;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();

    let log_target = logging::init(&LogTarget::for_cli(&cli), cli.debug);
    debug!(?log_target, "Logging initialized");

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<ChatError>() {
            Some(chat) => error!("{}: {}", chat.category(), chat),
            None => error!("{e:#}"),
        }
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let resolver = build_resolver(&cli)?;
    let (warehouse, analyst) = build_clients(&cli, &config)?;

    let mut orchestrator = Orchestrator::new(&config, resolver, warehouse, analyst)?;

    if let Some(query) = &cli.model {
        let index = orchestrator
            .models()
            .find(query)
            .with_context(|| format!("No semantic model matches '{query}'"))?;
        orchestrator.select_model(index)?;
    }

    if let Some(question) = &cli.ask {
        return ask_once(&mut orchestrator, question).await;
    }

    if cli.connect {
        match orchestrator.connect().await {
            Ok(connection) => info!("Connected: {connection}"),
            Err(e) => warn!("Startup connect failed: {e}"),
        }
    }

    repl::run(&mut orchestrator).await
}

fn build_resolver(cli: &Cli) -> anyhow::Result<CredentialResolver> {
    let mut interactive = cli.interactive_layer();
    if cli.mock {
        // The mock warehouse still requires the three credentials.
        let placeholders = [
            (CredentialField::Account, "mock"),
            (CredentialField::User, "mock"),
            (CredentialField::Token, "mock-token"),
        ];
        for (field, value) in placeholders {
            if interactive.get(field).is_none() {
                interactive.set(field, value);
            }
        }
    }

    let secrets = if cli.debug {
        let path = cli.secrets_path();
        info!("Debug mode: reading secrets from {}", path.display());
        Some(CredentialLayer::from_secrets_file(&path)?)
    } else {
        None
    };

    Ok(CredentialResolver::standard(
        interactive,
        CredentialLayer::from_env(),
        secrets,
        cli.debug,
    ))
}

fn build_clients(
    cli: &Cli,
    config: &Config,
) -> anyhow::Result<(Arc<dyn Warehouse>, Box<dyn AnalystClient>)> {
    if cli.mock {
        info!("Using scripted warehouse and analyst");
        let warehouse: Arc<dyn Warehouse> = Arc::new(MockWarehouse::demo());
        let analyst: Box<dyn AnalystClient> = Box::new(MockAnalystClient::new());
        return Ok((warehouse, analyst));
    }

    let warehouse = warehouse::connect(&config.warehouse)?;
    let analyst: Box<dyn AnalystClient> =
        Box::new(CortexAnalystClient::new(config.analyst.timeout())?);
    Ok((warehouse, analyst))
}

/// Connects, asks a single question and prints the transcript.
async fn ask_once(orchestrator: &mut Orchestrator, question: &str) -> anyhow::Result<()> {
    let connection = orchestrator.connect().await?;
    info!("Connected: {connection}");

    orchestrator.submit(question).await;
    let lines = repl::after_cycle(orchestrator).await;

    let mut out = io::stdout();
    let styled = out.is_terminal();
    repl::print_lines(&mut out, &lines, styled)?;

    let failed = orchestrator
        .conversation()
        .last()
        .is_some_and(|m| m.is_error());
    orchestrator.disconnect().await;

    if failed {
        bail!("The analyst request failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_mock_resolver_fills_required_credentials() {
        let cli = Cli::try_parse_from(["cortex-chat", "--mock", "--user", "analyst"]).unwrap();
        let resolver = build_resolver(&cli).unwrap();
        let resolved = resolver.resolve();
        let (account, user, _) = resolved.config.require_credentials().unwrap();
        assert_eq!(account, "mock");
        assert_eq!(user, "analyst");
    }

    #[tokio::test]
    async fn test_ask_once_with_mock_clients() {
        let cli = Cli::try_parse_from([
            "cortex-chat",
            "--mock",
            "--ask",
            "What was the revenue by month?",
        ])
        .unwrap();
        let config = Config::default();
        let resolver = build_resolver(&cli).unwrap();
        let (warehouse, analyst) = build_clients(&cli, &config).unwrap();
        let mut orchestrator = Orchestrator::new(&config, resolver, warehouse, analyst).unwrap();

        ask_once(&mut orchestrator, "What was the revenue by month?")
            .await
            .unwrap();
        assert!(!orchestrator.conversation().last().unwrap().is_error());
        assert!(!orchestrator.gateway().is_connected());
    }
}
