#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use conclave::config::CouncilConfig;
use conclave::council::{CouncilMember, CouncilRequest};
use conclave::events::{CouncilEvent, EventError, EventSink, JsonlEventSink};
use conclave::gateway::{ChatGateway, NoopUsageSink, ProviderGateway};

#[derive(Parser)]
#[command(name = "conclave", version, about = "Multi-model council deliberation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full deliberation: answers, peer rankings, chairman synthesis
    Run {
        /// Inline question text
        #[arg(long, group = "input")]
        prompt: Option<String>,

        /// Read the question from a file (alternative to --prompt)
        #[arg(long, group = "input")]
        prompt_file: Option<PathBuf>,

        /// Comma-separated OpenRouter model IDs for the council
        /// (default: COUNCIL_MODELS env or the built-in roster)
        #[arg(long, value_delimiter = ',')]
        models: Option<Vec<String>>,

        /// Chairman model for the final synthesis
        /// (default: CHAIRMAN_MODEL env or the built-in chairman)
        #[arg(long)]
        chairman: Option<String>,

        /// Also generate a short title for the question
        #[arg(long)]
        title: bool,

        /// Stream progress events to a JSONL file
        #[arg(long)]
        events: Option<PathBuf>,

        /// Write the full outcome JSON (answers, rankings, final answer)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the effective council configuration
    Models,
}

/// Human progress on stderr, plus optional JSONL forwarding.
struct CliEventSink {
    jsonl: Option<JsonlEventSink>,
}

impl EventSink for CliEventSink {
    fn emit(&self, event: CouncilEvent) -> Result<(), EventError> {
        match &event {
            CouncilEvent::Stage1Complete { data } => {
                let failed = data.iter().filter(|a| a.failed).count();
                eprintln!(
                    "[council] stage 1 complete ({} answers, {} failed)",
                    data.len(),
                    failed
                );
            }
            CouncilEvent::Stage2Complete { data, .. } => {
                eprintln!("[council] stage 2 complete ({} rankings)", data.len());
            }
            CouncilEvent::Stage3Complete { data } => {
                eprintln!("[council] stage 3 complete (chairman: {})", data.model);
            }
            CouncilEvent::TitleComplete { data } => {
                eprintln!("[council] title: {}", data.title);
            }
            CouncilEvent::Error { message } => {
                eprintln!("[council] error: {message}");
            }
            other => eprintln!("[council] {}", other.kind()),
        }
        if let Some(jsonl) = &self.jsonl {
            jsonl.emit(event)?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            prompt,
            prompt_file,
            models,
            chairman,
            title,
            events,
            out,
        } => {
            let question = if let Some(p) = prompt {
                p
            } else if let Some(path) = prompt_file {
                std::fs::read_to_string(&path)?
            } else {
                return Err("run requires --prompt or --prompt-file".into());
            };

            let config = CouncilConfig::from_env();
            let mut req = CouncilRequest::new(question);
            if let Some(models) = models {
                req.council_models =
                    Some(models.into_iter().map(CouncilMember::new).collect());
            }
            req.chairman_model = chairman;
            req.want_title = title;

            let gateway: Arc<dyn ChatGateway> =
                Arc::new(ProviderGateway::from_env(Arc::new(NoopUsageSink))?);

            let (jsonl, worker) = if let Some(path) = events {
                let (sink, worker) = JsonlEventSink::new(path)?;
                (Some(sink), Some(worker))
            } else {
                (None, None)
            };
            let sink = CliEventSink { jsonl };

            let result = conclave::deliberate(gateway, &config, req, &sink, None).await;

            // Close the channel before joining so the writer drains.
            drop(sink);
            if let Some(worker) = worker {
                worker.join()?;
            }

            let outcome =
                result.map_err(|e| -> Box<dyn std::error::Error> { e.to_string().into() })?;

            if let Some(path) = out {
                write_json(&path, &outcome)?;
                eprintln!("[council] outcome written to {}", path.display());
            }
            println!("{}", outcome.final_answer.content);
        }
        Commands::Models => {
            let config = CouncilConfig::from_env();
            for model in &config.council_models {
                println!("{model}");
            }
            println!("chairman: {}", config.chairman_model);
        }
    }

    Ok(())
}

fn write_json<T: serde::Serialize>(path: &PathBuf, value: &T) -> Result<(), std::io::Error> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}
