//! `ndag` - CLI for nda-guardian
//!
//! This binary serves the HTTP API and offers one-shot commands for loading
//! and questioning an agreement from the terminal.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use nda_guardian::cli::{
    AskCommand, Cli, Command, ConfigCommand, HistoryCommand, LoadCommand, ToolsCommand,
};
use nda_guardian::{demo, server, tools, Config, Document, Error, QueryService, Storage, Tool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Configuration comes first so its log format applies.
    let config = Config::load_from(cli.config.clone())?;
    nda_guardian::init_logging(cli.verbosity(), config.logging.format);

    match cli.command {
        Command::Serve(cmd) => {
            let bind = cmd.bind.unwrap_or_else(|| config.server.bind.clone());
            let service = QueryService::from_config(&config)?;
            server::serve(Arc::new(service), &bind).await?;
        }
        Command::Load(cmd) => handle_load(&cmd)?,
        Command::Ask(cmd) => handle_ask(&config, &cmd).await?,
        Command::Demo(cmd) => {
            let mut stdout = std::io::stdout().lock();
            demo::run(&config, cmd.mode(), &mut stdout).await?;
        }
        Command::Tools(cmd) => handle_tools(&cmd)?,
        Command::History(cmd) => handle_history(&config, &cmd)?,
        Command::Config(cmd) => handle_config(&config, cmd)?,
    }
    Ok(())
}

fn read_document(path: &Path) -> nda_guardian::Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

fn handle_load(cmd: &LoadCommand) -> anyhow::Result<()> {
    let document = Document::parse(&read_document(&cmd.file)?)?;
    let keys: Vec<String> = document.keys().iter().map(ToString::to_string).collect();

    if cmd.json {
        let summary = serde_json::json!({
            "file": cmd.file,
            "content_hash": document.content_hash(),
            "word_count": document.word_count(),
            "clauses_found": keys,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", cmd.file.display());
        println!("  Words:   {}", document.word_count());
        println!("  Hash:    {}", document.content_hash());
        println!("  Clauses: {}", keys.len());
        for clause in document.clauses() {
            println!(
                "    - {:<18} {} words",
                clause.key.as_str(),
                tools::word_count(&clause.text)
            );
        }
    }
    Ok(())
}

async fn handle_ask(config: &Config, cmd: &AskCommand) -> anyhow::Result<()> {
    let text = read_document(&cmd.file)?;
    let service = QueryService::from_config(config)?;
    service.load(&text).await?;
    let response = service
        .query(&cmd.question)
        .await
        .with_context(|| format!("could not answer {:?}", cmd.question))?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", response.answer);
        println!();
        println!("  Tool:       {}", response.tool_called);
        println!("  Route:      {}", response.source);
        if let Some(confidence) = response.confidence {
            println!("  Confidence: {confidence:.2}");
        }
        println!("  Latency:    {:.0}ms", response.latency_ms);
        println!("  Privacy:    {}", response.privacy_note);
    }
    Ok(())
}

fn handle_tools(cmd: &ToolsCommand) -> anyhow::Result<()> {
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&Tool::specs())?);
    } else {
        for tool in Tool::ALL {
            let route = if tool.requires_cloud() {
                "cloud"
            } else {
                "on-device"
            };
            println!("{:<22} [{route}] {}", tool.name(), tool.spec().description);
        }
    }
    Ok(())
}

fn handle_history(config: &Config, cmd: &HistoryCommand) -> anyhow::Result<()> {
    if !config.storage.audit_enabled {
        println!("Audit logging is disabled (storage.audit_enabled = false).");
        return Ok(());
    }

    let storage = Storage::open(config.database_path())?;
    let records = storage.recent_queries(cmd.limit)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No queries recorded yet.");
        return Ok(());
    }
    for record in &records {
        println!(
            "{}  {:<22} {:<34} words={:<4} {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.tool,
            record.source.as_str(),
            record.words_sent,
            record.query
        );
    }

    let stats = storage.stats()?;
    println!();
    println!(
        "{} queries ({} cloud), {} words sent to cloud",
        stats.total_queries, stats.cloud_queries, stats.total_words_sent
    );
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Bind:                 {}", config.server.bind);
                println!();
                println!("[Routing]");
                println!(
                    "  Confidence threshold: {}",
                    config.routing.confidence_threshold
                );
                println!("  Local model:          {:?}", config.routing.local_model);
                println!("  Endpoint URL:         {}", config.routing.endpoint_url);
                println!();
                println!("[Cloud]");
                println!("  Model:                {}", config.cloud.model);
                println!(
                    "  API key:              {}",
                    if config.cloud.has_api_key() {
                        "set"
                    } else {
                        "not set"
                    }
                );
                println!("  Cost per word (USD):  {}", config.cloud.cost_per_word_usd);
                println!();
                println!("[Privacy]");
                println!("  Summary max words:    {}", config.privacy.summary_max_words);
                println!("  Filters enabled:      {}", config.privacy.filters_enabled);
                println!("  Filter mode:          {:?}", config.privacy.mode);
                println!(
                    "  Custom patterns:      {}",
                    config.privacy.custom_patterns.len()
                );
                println!();
                println!("[Storage]");
                println!("  Audit enabled:        {}", config.storage.audit_enabled);
                println!("  Database path:        {}", config.database_path().display());
                println!("  Max age (days):       {}", config.storage.max_age_days);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
