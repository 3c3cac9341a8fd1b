//! `toolgate chat` — interactive REPL over one session.
//!
//! Ctrl-C cancels the in-flight turn cooperatively instead of killing the
//! process. `/save <file>` writes a session snapshot, `/quit` exits.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use toolgate_agent::{AgentLoop, TurnHooks, TurnOptions, TurnReport, TurnStatus};
use toolgate_core::{CancelToken, Conversation, StepEvent};

use super::{CliError, load_config, require_api_key, standard_handler};

pub async fn run(system: Option<String>) -> Result<(), CliError> {
    let config = load_config()?;
    require_api_key(&config)?;
    let client = toolgate_providers::build_from_config(&config).map_err(CliError::config)?;
    let handler = standard_handler(&config);
    let agent = AgentLoop::new(client, handler);

    let options = TurnOptions {
        system_message: system,
        temperature: config.agent.temperature,
        max_tokens: config.agent.max_tokens,
        max_steps: config.agent.max_steps,
        require_final_tool: config.agent.require_final_tool,
    };

    let mut conversation = Conversation::new();
    let mut last_report: Option<TurnReport> = None;

    println!("toolgate chat — /save <file> to snapshot, /quit to exit, Ctrl-C cancels a turn");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt().await;
        let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| CliError::Turn(format!("stdin closed: {e}")))?
        else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }
        if let Some(path) = line.strip_prefix("/save ") {
            match &last_report {
                Some(report) => {
                    super::run::save_snapshot(path.trim().as_ref(), &conversation, report)?;
                    println!("saved {}", path.trim());
                }
                None => println!("nothing to save yet"),
            }
            continue;
        }

        let token = CancelToken::new();
        let watcher = {
            let token = token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("\ncancelling...");
                    token.cancel();
                }
            })
        };

        let observer = |event: &StepEvent| {
            if let StepEvent::Call { name, .. } = event {
                eprintln!("  [{name}]");
            }
        };
        let outcome = agent
            .run_turn(
                &mut conversation,
                &line,
                &options,
                TurnHooks {
                    observer: Some(&observer),
                    cancel: Some(&token),
                    ..TurnHooks::default()
                },
            )
            .await;
        watcher.abort();

        match outcome {
            Ok(report) => {
                match report.status {
                    TurnStatus::Completed => println!("{}", report.text),
                    TurnStatus::StepLimitExceeded => {
                        println!("(step limit exceeded without a final answer)")
                    }
                    TurnStatus::Cancelled => println!("(cancelled) {}", report.text),
                }
                last_report = Some(report);
            }
            Err(e) => eprintln!("turn failed: {e}"),
        }
    }

    Ok(())
}

async fn prompt() {
    let mut stdout = tokio::io::stdout();
    let _ = stdout.write_all(b"> ").await;
    let _ = stdout.flush().await;
}
