//! `toolwright extract`: structured JSON through a forced tool call.

use tokio::io::AsyncReadExt;
use toolwright_agent::LoopSettings;
use toolwright_tools::structured_registry;

use super::{build_loop, load_config};

pub async fn run(tool: &str, text: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    let tools = structured_registry()?;
    if !tools.contains(tool) {
        return Err(format!(
            "unknown extraction tool '{tool}' (available: {})",
            tools.names().join(", ")
        )
        .into());
    }

    let text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };
    if text.trim().is_empty() {
        return Err("no input text given (use --text or pipe it on stdin)".into());
    }

    let settings = LoopSettings {
        system: None,
        ..LoopSettings::from_config(&config)
    };
    let agent = build_loop(&config, tools, settings)?;

    let extraction = agent.extract_structured(&extraction_prompt(&text, tool), tool).await?;
    tracing::debug!(
        attempts = extraction.attempts,
        tokens = extraction.usage.total(),
        "Extraction complete"
    );
    println!("{}", serde_json::to_string_pretty(&extraction.value)?);

    Ok(())
}

fn extraction_prompt(text: &str, tool: &str) -> String {
    format!("<text>\n{}\n</text>\n\nUse the {tool} tool.", text.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_wraps_text_and_names_tool() {
        let prompt = extraction_prompt("  I love pickles \n", "print_sentiment_scores");
        assert!(prompt.starts_with("<text>\nI love pickles\n</text>"));
        assert!(prompt.ends_with("Use the print_sentiment_scores tool."));
    }
}
