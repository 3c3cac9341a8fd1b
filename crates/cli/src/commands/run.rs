//! `toolgate run` — one-shot turn from a prompt.

use std::path::{Path, PathBuf};

use toolgate_agent::{AgentLoop, TurnHooks, TurnOptions, TurnReport, TurnStatus};
use toolgate_core::{Conversation, SessionSnapshot};
use tracing::info;

use super::{CliError, load_config, require_api_key, standard_handler};

const CODE_PROFILE_SYSTEM: &str = "You are a coding agent. Prefer domain.files -> \
    files.mkdir/files.write to create files. Use absolute paths. Do not print code \
    inline; write files instead. Finish with assistant.final.";

#[derive(clap::Args)]
pub struct RunArgs {
    /// The user prompt
    #[arg(short, long)]
    pub prompt: String,

    /// System message (overrides --profile)
    #[arg(long)]
    pub system: Option<String>,

    /// Sampling temperature (default 0.7)
    #[arg(long = "temp")]
    pub temperature: Option<f32>,

    /// Max tokens per model response (default 800)
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Max tool rounds per turn (default 100)
    #[arg(long)]
    pub steps: Option<u32>,

    /// Require assistant.final to end the turn (the default)
    #[arg(long, overrides_with = "no_final_required")]
    pub final_required: bool,

    /// Let plain text end the turn without assistant.final
    #[arg(long)]
    pub no_final_required: bool,

    /// Preset system guidance; `code` steers toward writing files
    #[arg(long, value_parser = ["default", "code"], default_value = "default")]
    pub profile: String,

    /// Human-readable output with the step trace
    #[arg(long)]
    pub pretty: bool,

    /// Print only the final text
    #[arg(long, conflicts_with = "pretty")]
    pub plain: bool,

    /// Load and save a session snapshot at this path
    #[arg(long)]
    pub session: Option<PathBuf>,
}

pub async fn run(args: RunArgs) -> Result<(), CliError> {
    let config = load_config()?;
    require_api_key(&config)?;
    let client = toolgate_providers::build_from_config(&config).map_err(CliError::config)?;
    let handler = standard_handler(&config);

    let system_message = args.system.clone().or_else(|| {
        (args.profile == "code").then(|| CODE_PROFILE_SYSTEM.to_string())
    });
    let options = TurnOptions {
        system_message,
        temperature: args.temperature.unwrap_or(config.agent.temperature),
        max_tokens: args.max_tokens.unwrap_or(config.agent.max_tokens),
        max_steps: args.steps.unwrap_or(config.agent.max_steps),
        require_final_tool: args.final_required || !args.no_final_required,
    };

    let mut conversation = match &args.session {
        Some(path) if path.exists() => load_snapshot(path)?.conversation,
        _ => Conversation::new(),
    };

    let agent = AgentLoop::new(client, handler);
    let report = agent
        .run_turn(
            &mut conversation,
            &args.prompt,
            &options,
            TurnHooks::default(),
        )
        .await
        .map_err(CliError::turn)?;

    if let Some(path) = &args.session {
        save_snapshot(path, &conversation, &report)?;
        info!(path = %path.display(), "Session snapshot saved");
    }

    print_report(&report, args.pretty, args.plain);

    match report.status {
        TurnStatus::Completed => Ok(()),
        TurnStatus::StepLimitExceeded => Err(CliError::Turn(format!(
            "step limit exceeded after {} rounds",
            options.max_steps
        ))),
        TurnStatus::Cancelled => Err(CliError::Turn("turn cancelled".into())),
    }
}

fn print_report(report: &TurnReport, pretty: bool, plain: bool) {
    if plain {
        println!("{}", report.text);
    } else if pretty {
        for step in &report.steps {
            let args = serde_json::Value::Object(step.arguments.clone());
            println!("→ {}({})", step.name, args);
            println!("  {}", step.result);
        }
        println!();
        println!("{}", report.text);
    } else {
        let out = serde_json::json!({
            "text": report.text,
            "steps": report.steps,
        });
        println!("{}", serde_json::to_string_pretty(&out).unwrap_or_default());
    }
}

pub fn load_snapshot(path: &Path) -> Result<SessionSnapshot, CliError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CliError::Config(format!("cannot read session {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| CliError::Config(format!("invalid session {}: {e}", path.display())))
}

pub fn save_snapshot(
    path: &Path,
    conversation: &Conversation,
    report: &TurnReport,
) -> Result<(), CliError> {
    let snapshot = SessionSnapshot {
        conversation: conversation.clone(),
        last_text: report.text.clone(),
        last_steps: report.steps.clone(),
    };
    let json = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| CliError::Turn(format!("cannot serialize session: {e}")))?;
    std::fs::write(path, json)
        .map_err(|e| CliError::Turn(format!("cannot write session {}: {e}", path.display())))
}
