//! `toolwright chat`: interactive or single-message chat over a tool pack.

use std::io::Write;

use chrono::NaiveDate;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use toolwright_agent::{LoopError, LoopSettings, ToolLoop};
use toolwright_config::AppConfig;
use toolwright_core::error::ToolError;
use toolwright_core::event::DomainEvent;
use toolwright_core::gateway::ToolSelectionPolicy;
use toolwright_core::message::Conversation;
use toolwright_core::tool::ToolRegistry;
use toolwright_tools::{OrderStore, Outbox, research_registry, sms_registry, support_registry};

use super::{build_loop, load_config};

const EXIT_COMMANDS: &[&str] = &["exit", "quit", "bye"];

const SMS_SYSTEM_PROMPT: &str = "\
All your communication with a user is done via text message.
Only call tools when you have enough information to accurately call them.
Do not call the get_customer_info tool until a user has provided you with their username. This is important.
If you do not know a user's username, simply ask a user for their username.
";

/// The tool set a chat session runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Pack {
    /// Order lookup and cancellation for an online store
    Support,
    /// Text-message assistant that must always call a tool
    Sms,
    /// Web search and a calculator
    Research,
}

struct Session {
    tools: ToolRegistry,
    system: String,
    default_policy: ToolSelectionPolicy,
    outbox: Option<Outbox>,
}

impl Pack {
    fn session(self, config: &AppConfig, today: NaiveDate) -> Result<Session, ToolError> {
        Ok(match self {
            Self::Support => Session {
                tools: support_registry(OrderStore::demo())?,
                system: config.system_prompt().to_string(),
                default_policy: ToolSelectionPolicy::Automatic,
                outbox: None,
            },
            Self::Sms => {
                let outbox = Outbox::new();
                Session {
                    tools: sms_registry(outbox.clone())?,
                    system: SMS_SYSTEM_PROMPT.to_string(),
                    default_policy: ToolSelectionPolicy::MandatoryAny,
                    outbox: Some(outbox),
                }
            }
            Self::Research => Session {
                tools: research_registry()?,
                system: research_directive(today),
                default_policy: ToolSelectionPolicy::Automatic,
                outbox: None,
            },
        })
    }
}

fn research_directive(today: NaiveDate) -> String {
    format!(
        "Answer as many questions as you can using your existing knowledge.\n\
         Only search the web for queries that you can not confidently answer.\n\
         Today's date is {}\n\
         If you think a user's question involves something in the future that hasn't happened yet, use the search tool.\n",
        today.format("%B %d %Y")
    )
}

pub async fn run(
    message: Option<String>,
    tool_choice: Option<&str>,
    pack: Pack,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let session = pack.session(&config, chrono::Local::now().date_naive())?;

    let policy = match tool_choice {
        Some(choice) => choice.parse::<ToolSelectionPolicy>()?,
        None => session.default_policy.clone(),
    };
    if let ToolSelectionPolicy::MandatoryNamed(name) = &policy
        && !session.tools.contains(name)
    {
        return Err(format!(
            "--tool-choice names unknown tool '{name}' (available: {})",
            session.tools.names().join(", ")
        )
        .into());
    }
    let tool_names = session.tools.names().join(", ");

    let settings = LoopSettings {
        system: Some(session.system),
        ..LoopSettings::from_config(&config)
    };
    let cancel = CancellationToken::new();
    let agent = build_loop(&config, session.tools, settings)?.with_cancellation(cancel.clone());
    let outbox = session.outbox;
    let progress = spawn_progress_printer(&agent);

    // Ctrl+C aborts the current turn between phases and ends the session
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut conv = Conversation::new();

    if let Some(msg) = message {
        // Single message mode
        let outcome = agent.run_turn(&mut conv, &msg, policy).await;
        deliver_texts(outbox.as_ref()).await;
        println!("{}", outcome?.reply);
    } else {
        // Interactive mode
        println!();
        println!("  ╔══════════════════════════════════════════════╗");
        println!("  ║     Toolwright Chat: Interactive Mode        ║");
        println!("  ╚══════════════════════════════════════════════╝");
        println!();
        println!("  Model:     {}", config.model);
        println!("  Pack:      {pack:?}");
        println!("  Tools:     {tool_names}");
        println!("  Policy:    {policy}");
        println!();
        println!("  Type your message and press Enter.");
        println!("  Type 'exit', 'quit' or 'bye' to leave.");
        println!();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("  You > ");
            std::io::stdout().flush()?;

            let line = tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => line?,
            };
            let Some(line) = line else { break };
            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            if is_exit_command(input) {
                break;
            }

            let outcome = agent.run_turn(&mut conv, input, policy.clone()).await;
            deliver_texts(outbox.as_ref()).await;
            match outcome {
                Ok(outcome) => {
                    println!();
                    for line in outcome.reply.lines() {
                        println!("  Assistant > {line}");
                    }
                    println!();
                }
                Err(LoopError::Cancelled) => {
                    eprintln!("  [Cancelled]");
                    break;
                }
                Err(e) => {
                    eprintln!("  {}", failure_line(&e));
                    println!();
                }
            }
        }

        println!();
        println!("  Thank you for chatting. Goodbye!");
        println!();
    }

    watcher.abort();
    progress.abort();
    Ok(())
}

fn is_exit_command(input: &str) -> bool {
    EXIT_COMMANDS.iter().any(|c| input.eq_ignore_ascii_case(c))
}

/// Tell a hiccup the user can retry apart from a hard failure.
fn failure_line(err: &LoopError) -> String {
    if err.is_transient() {
        format!("[Temporarily unavailable] {err}. Please try again.")
    } else {
        format!("[Error] {err}")
    }
}

async fn deliver_texts(outbox: Option<&Outbox>) {
    let Some(outbox) = outbox else { return };
    for text in outbox.drain().await {
        println!("  [Text message] {text}");
    }
}

/// Print "still working" lines while a turn is in progress.
fn spawn_progress_printer(agent: &ToolLoop) -> tokio::task::JoinHandle<()> {
    let mut rx = agent.event_bus().subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(line) = progress_line(&event) {
                        eprintln!("{line}");
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn progress_line(event: &DomainEvent) -> Option<String> {
    match event {
        DomainEvent::ToolRequested { tool_name, .. } => {
            Some(format!("  ...the assistant wants to use the {tool_name} tool"))
        }
        DomainEvent::ToolExecuted {
            tool_name,
            is_error: true,
            ..
        } => Some(format!("  ...{tool_name} reported an error")),
        _ => None,
    }
}
