use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use healthbot::config::AppConfig;
use healthbot::engine::Resolver;
use healthbot::knowledge::KnowledgeBase;
use healthbot::mode::effective_mode;
use healthbot::models::{ChatMode, ResolutionResult};
use healthbot::render::render_markdown;
use healthbot::together::TogetherClient;

#[derive(Parser, Debug)]
#[command(name = "eval")]
#[command(about = "Run a symptom-matching evaluation set")]
struct Cli {
    #[arg(long, default_value = "eval/prompts.jsonl")]
    file: String,
    /// online, offline or auto
    #[arg(long, default_value = "offline")]
    mode: String,
    /// Connectivity snapshot used to resolve `auto`, e.g. `--connected false`
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    connected: bool,
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct EvalPrompt {
    id: String,
    query: String,
    #[serde(default)]
    expect_top: Option<String>,
    #[serde(default)]
    expect_variant: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();
    let selected = ChatMode::parse(&cli.mode)
        .with_context(|| format!("unknown mode {:?}; use online, offline or auto", cli.mode))?;
    let mode = effective_mode(selected, cli.connected);

    let kb = Arc::new(KnowledgeBase::load(&config)?);
    let together = Arc::new(TogetherClient::from_config(&config)?);
    let resolver = Resolver::new(kb, together, config.resolver_options());

    let prompts = load_prompts(&cli.file)?;
    if prompts.is_empty() {
        anyhow::bail!("no prompts found in {}", cli.file);
    }

    let mut total = 0usize;
    let mut passed = 0usize;
    let mut no_match = 0usize;
    let mut failed_turns = 0usize;

    for prompt in prompts {
        total += 1;

        let result = match resolver.resolve(&prompt.query, &[], mode).await {
            Ok(result) => result,
            Err(err) => {
                failed_turns += 1;
                println!("{}: remote call failed: {err}", prompt.id);
                continue;
            }
        };

        if matches!(result, ResolutionResult::PlainText { .. }) {
            no_match += 1;
        }

        let mut pass = true;
        if let Some(expected) = &prompt.expect_variant {
            if result.kind() != expected.as_str() {
                pass = false;
            }
        }
        if let Some(expected) = &prompt.expect_top {
            if top_name(&result) != Some(expected.as_str()) {
                pass = false;
            }
        }
        if pass {
            passed += 1;
        } else {
            println!(
                "{}: expected top={:?} variant={:?}, got top={:?} variant={}",
                prompt.id,
                prompt.expect_top,
                prompt.expect_variant,
                top_name(&result),
                result.kind()
            );
        }

        if cli.verbose {
            println!("--- {} ---", prompt.id);
            println!("Q: {}", prompt.query);
            println!("A: {}", render_markdown(&result).replace('\n', " "));
            println!();
        }
    }

    println!("Eval prompts: {}", total);
    println!("Expectation accuracy: {:.1}%", ratio(passed, total) * 100.0);
    println!("No-match rate: {:.1}%", ratio(no_match, total) * 100.0);
    if failed_turns > 0 {
        println!("Failed turns: {}", failed_turns);
    }

    Ok(())
}

fn top_name(result: &ResolutionResult) -> Option<&str> {
    match result {
        ResolutionResult::ExpertMatches { matches, .. }
        | ResolutionResult::AiFallback { matches, .. } => {
            matches.first().map(|m| m.name.as_str())
        }
        ResolutionResult::PlainText { .. } | ResolutionResult::AiOnly { .. } => None,
    }
}

fn load_prompts(path: &str) -> Result<Vec<EvalPrompt>> {
    let file = File::open(path).with_context(|| format!("failed opening {}", path))?;
    let reader = BufReader::new(file);
    let mut prompts = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let parsed: EvalPrompt = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid JSON at {} line {}", path, idx + 1))?;
        prompts.push(parsed);
    }

    Ok(prompts)
}

fn ratio(n: usize, d: usize) -> f32 {
    if d == 0 {
        return 0.0;
    }
    n as f32 / d as f32
}
