use anyhow::Result;
use colored::Colorize;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use study_companion::lifecycle::Surface;
use study_companion::models::Role;
use study_companion::{Companion, Config, TurnOutcome};

/// Terminal implementation of the rendering contract.
struct TerminalSurface;

impl Surface for TerminalSurface {
    fn render_message(&self, role: Role, text: &str) {
        match role {
            Role::User => println!("{} {}", "you>".cyan().bold(), text),
            Role::Assistant => println!("{} {}", "companion>".green().bold(), text),
            Role::Other => {}
        }
    }

    fn render_status(&self, text: &str) {
        println!("{}", text.yellow());
    }

    fn render_error(&self, text: &str) {
        eprintln!("{}", text.red().bold());
    }
}

const SESSION_KEY: &str = "local";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "study_companion=info".into()),
        )
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();
    let mut companion = Companion::new(&config)?;
    let surface = TerminalSurface;

    println!("{}", config.app.title.bold());
    println!("{}", config.app.tagline);
    println!(
        "Commands: /attach <file.json>, /assistant <id>, /apikey <key>, /feedback <up|down> <text>, /quit"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        if line == "/quit" || line == "/exit" {
            break;
        }

        if let Some(path) = line.strip_prefix("/attach ") {
            match std::fs::read_to_string(path.trim()) {
                Ok(json) => {
                    let file_name = std::path::Path::new(path.trim())
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("converted.json")
                        .to_string();
                    match companion
                        .attach_converted_blob(SESSION_KEY, &file_name, json)
                        .await
                    {
                        Ok(blob_id) => {
                            surface.render_status(&format!("File uploaded successfully ({blob_id})"))
                        }
                        Err(e) => surface.render_error(&format!("Upload failed: {e}")),
                    }
                }
                Err(e) => surface.render_error(&format!("An error occurred: {e}")),
            }
            continue;
        }

        if let Some(id) = line.strip_prefix("/assistant ") {
            match companion.override_assistant(SESSION_KEY, id.trim()).await {
                Ok(profile) => surface.render_status(&format!(
                    "Assistant updated: {}",
                    profile.name.as_deref().unwrap_or(&profile.id)
                )),
                Err(e) => surface.render_error(&format!("Assistant update failed: {e}")),
            }
            continue;
        }

        if let Some(key) = line.strip_prefix("/apikey ") {
            match companion.override_credential(key) {
                Ok(()) => surface.render_status("API key updated successfully!"),
                Err(e) => surface.render_error(&format!("API key update failed: {e}")),
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("/feedback ") {
            let mut parts = rest.splitn(2, ' ');
            let value = parts.next().unwrap_or_default();
            let message = parts.next().unwrap_or_default();
            if !matches!(value, "up" | "down") || message.is_empty() {
                surface.render_error("Usage: /feedback <up|down> <text>");
                continue;
            }
            companion
                .record_feedback(message, value, "assistant_message")
                .await;
            surface.render_status("Feedback recorded!");
            continue;
        }

        match companion.handle_turn(SESSION_KEY, &line, &surface).await {
            Ok(TurnOutcome::Failed) => {
                // Terminal error already rendered by the controller.
            }
            Ok(_) => {}
            Err(e) => surface.render_error(&format!("An error occurred: {e}")),
        }
    }

    Ok(())
}
