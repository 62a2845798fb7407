mod assistant;

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pyreview::{clean, execute, is_safe, parse, review, Rejection};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use crate::assistant::{AnthropicClient, DEFAULT_MODEL};

/// Exit status when the safety filter refuses to run a snippet.
const EXIT_REJECTED: u8 = 2;

/// Review, clean and run Python snippets in a restricted interpreter.
#[derive(Parser, Debug)]
#[command(name = "pyreview-cli", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute code and print the result as JSON
    Run {
        /// Read code from this file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Report whether code passes the safety filter
    Check {
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Strip markdown artifacts from code
    Clean {
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Split an assistant reply into feedback and code
    Parse {
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Ask the assistant to review code for a task
    Review {
        /// What the code should do
        #[arg(long)]
        task: String,

        #[arg(long)]
        file: Option<PathBuf>,

        /// Also execute the refined code
        #[arg(long)]
        run: bool,

        #[arg(long, env = "CLAUDE_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        #[arg(long, env = "PYREVIEW_MODEL", default_value = DEFAULT_MODEL)]
        model: String,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Run { .. } => "run",
            Command::Check { .. } => "check",
            Command::Clean { .. } => "clean",
            Command::Parse { .. } => "parse",
            Command::Review { .. } => "review",
        }
    }
}

fn main() -> Result<ExitCode> {
    // A missing .env is normal.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(command = cli.command.name(), "starting");

    match cli.command {
        Command::Run { file } => {
            let code = read_input(file.as_ref())?;
            match execute(&code) {
                Ok(result) => {
                    println!("{}", serde_json::to_string(&result)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(rejection) => {
                    println!("{}", rejection_json(&rejection));
                    Ok(ExitCode::from(EXIT_REJECTED))
                }
            }
        }
        Command::Check { file } => {
            let code = read_input(file.as_ref())?;
            let pattern = pyreview::check(&code).err().map(|r| r.pattern);
            println!("{}", json!({ "safe": is_safe(&code), "pattern": pattern }));
            Ok(ExitCode::SUCCESS)
        }
        Command::Clean { file } => {
            let code = read_input(file.as_ref())?;
            println!("{}", clean(&code));
            Ok(ExitCode::SUCCESS)
        }
        Command::Parse { file } => {
            let reply = read_input(file.as_ref())?;
            println!("{}", serde_json::to_string(&parse(&reply))?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Review {
            task,
            file,
            run,
            api_key,
            model,
        } => {
            let Some(api_key) = api_key.filter(|k| !k.trim().is_empty()) else {
                bail!("no API key: pass --api-key or set CLAUDE_API_KEY");
            };
            let code = read_input(file.as_ref())?;
            validate_review_input(&task, &code)?;
            let client = AnthropicClient::new(api_key, model)?;
            let parsed = review(&client, &task, &code).context("assistant review failed")?;

            let execution = if run && !parsed.code.is_empty() {
                Some(match execute(&parsed.code) {
                    Ok(result) => serde_json::to_value(&result)?,
                    Err(rejection) => rejection_json(&rejection),
                })
            } else {
                None
            };

            let out = json!({
                "feedback": parsed.feedback,
                "code": parsed.code,
                "execution": execution,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// A review needs both a task and some code to look at.
fn validate_review_input(task: &str, code: &str) -> Result<()> {
    if task.trim().is_empty() {
        bail!("--task must not be blank");
    }
    if code.trim().is_empty() {
        bail!("no code to review: input is blank");
    }
    Ok(())
}

fn rejection_json(rejection: &Rejection) -> serde_json::Value {
    json!({ "rejected": rejection.to_string(), "pattern": rejection.pattern })
}

fn read_input(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            Ok(buf)
        }
    }
}
