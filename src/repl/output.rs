// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Terminal output: spinner, agent callbacks and text rendering.
//!
//! Rendering functions return plain strings; color is applied when printing.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::agent::{AgentCallbacks, TurnStats};
use crate::mcp::{Catalog, ResourceContents};

/// Longest tool result shown inline before truncation.
pub const MAX_RESULT_DISPLAY: usize = 500;

/// A spinner that can be paused to print around it.
#[derive(Default)]
pub struct Activity {
    spinner: Mutex<Option<ProgressBar>>,
}

impl Activity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show the spinner with a message, replacing any running one.
    pub fn start(&self, message: impl Into<Cow<'static, str>>) {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let spinner = ProgressBar::new_spinner().with_style(style);
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(previous) = slot.replace(spinner) {
                previous.finish_and_clear();
            }
        }
    }

    /// Change the message of the running spinner.
    pub fn set_message(&self, message: impl Into<Cow<'static, str>>) {
        if let Ok(slot) = self.spinner.lock() {
            if let Some(spinner) = slot.as_ref() {
                spinner.set_message(message);
            }
        }
    }

    /// Remove the spinner.
    pub fn stop(&self) {
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(spinner) = slot.take() {
                spinner.finish_and_clear();
            }
        }
    }

    /// Print a line to stdout without tearing the spinner.
    pub fn println(&self, text: impl AsRef<str>) {
        let text = text.as_ref();
        match self.spinner.lock() {
            Ok(slot) => match slot.as_ref() {
                Some(spinner) => spinner.suspend(|| println!("{}", text)),
                None => println!("{}", text),
            },
            Err(_) => println!("{}", text),
        }
    }
}

/// Callbacks that print the turn as it happens.
///
/// With `verbose`, tool results and turn stats are shown too.
pub fn terminal_callbacks(activity: Arc<Activity>, verbose: bool) -> AgentCallbacks {
    let on_text: Arc<dyn Fn(&str) + Send + Sync> = {
        let activity = activity.clone();
        Arc::new(move |text: &str| {
            activity.println(text);
        })
    };

    let on_tool_call: Arc<dyn Fn(&str, &str, &serde_json::Value) + Send + Sync> = {
        let activity = activity.clone();
        Arc::new(move |_id: &str, name: &str, input: &serde_json::Value| {
            activity.println(format!(
                "{} Calling tool {} with args {}",
                "→".cyan(),
                name.bright_white(),
                input
            ));
            activity.set_message(format!("Running {}...", name));
        })
    };

    let on_tool_result: Arc<dyn Fn(&str, &str, &str, bool) + Send + Sync> = {
        let activity = activity.clone();
        Arc::new(move |_id: &str, name: &str, content: &str, is_error: bool| {
            if is_error {
                activity.println(format!(
                    "{} {} failed: {}",
                    "✗".red(),
                    name,
                    truncate(content, MAX_RESULT_DISPLAY)
                ));
            } else if verbose {
                let shown = truncate(content, MAX_RESULT_DISPLAY);
                activity.println(format!("{} {}", "✓".green(), shown.as_str().dimmed()));
            }
            activity.set_message("Thinking...");
        })
    };

    let on_turn_complete = verbose.then(|| {
        let activity = activity.clone();
        Arc::new(move |stats: &TurnStats| {
            activity.println(render_stats(stats).as_str().dimmed().to_string());
        }) as Arc<dyn Fn(&TurnStats) + Send + Sync>
    });

    AgentCallbacks {
        on_text: Some(on_text),
        on_tool_call: Some(on_tool_call),
        on_tool_result: Some(on_tool_result),
        on_turn_complete,
    }
}

/// Shorten `text` to at most `max` characters, noting what was cut.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => {
            let rest = text[cut..].chars().count();
            format!("{}... [truncated {} more chars]", &text[..cut], rest)
        }
        None => text.to_string(),
    }
}

/// One line of turn statistics.
pub fn render_stats(stats: &TurnStats) -> String {
    format!(
        "({:.1}s, {} model call{}, {} tool call{}, {} tokens)",
        stats.duration_ms as f64 / 1000.0,
        stats.iterations,
        if stats.iterations == 1 { "" } else { "s" },
        stats.tool_call_count,
        if stats.tool_call_count == 1 { "" } else { "s" },
        stats.total_tokens
    )
}

/// Listing for `/prompts`.
pub fn render_prompt_list(catalog: &Catalog) -> String {
    if catalog.prompts.is_empty() {
        return "No prompts available.".to_string();
    }

    let mut out = String::from("Available prompts:");
    for prompt in catalog.prompts.iter() {
        let _ = write!(out, "\n- {}", prompt.public_id);
        if let Some(description) = prompt.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = write!(out, ": {}", description);
        }
        let arguments = prompt.arguments();
        if !arguments.is_empty() {
            out.push_str("\n  Arguments:");
            for arg in arguments {
                let required = if arg.required { " (required)" } else { "" };
                let _ = write!(out, "\n    - {}{}", arg.name, required);
            }
        }
    }
    out
}

/// Display for an `@` resource read.
pub fn render_resource(uri: &str, contents: &ResourceContents) -> String {
    let mut out = format!("Resource: {}\nContent:", uri);
    if contents.is_empty() {
        out.push_str("\nNo content available.");
        return out;
    }
    for item in &contents.items {
        match (&item.text, &item.blob) {
            (Some(text), _) => {
                let _ = write!(out, "\n{}", text);
            }
            (None, Some(blob)) => {
                let mime = item.mime_type.as_deref().unwrap_or("application/octet-stream");
                let _ = write!(out, "\n[binary {}, {} base64 chars]", mime, blob.len());
            }
            (None, None) => out.push_str("\n(empty)"),
        }
    }
    out
}

/// Per-server discovery summary shown at startup: counts, then the names of
/// what the server contributed, one line per non-empty class.
pub fn render_server_summary(server: &str, catalog: &Catalog) -> String {
    let (tools, prompts, resources) = catalog.counts_for(server);
    if (tools, prompts, resources) == (0, 0, 0) {
        return format!("{}: No capabilities discovered", server);
    }

    let mut out = format!(
        "{}: {} tools, {} prompts, {} resources",
        server, tools, prompts, resources
    );
    for (label, map) in [
        ("tools", &catalog.tools),
        ("prompts", &catalog.prompts),
        ("resources", &catalog.resources),
    ] {
        let names: Vec<&str> = map
            .iter()
            .filter(|r| r.server == server)
            .map(|r| r.local_id.as_str())
            .collect();
        if !names.is_empty() {
            let _ = write!(out, "\n  {}: {}", label, names.join(", "));
        }
    }
    out
}

/// Text for `/help`.
pub fn help_text(scheme: &str) -> String {
    format!(
        "Commands:\n  \
         @folders                       List available topic folders ({scheme}://folders)\n  \
         @<topic>                       Read the resource {scheme}://<topic>\n  \
         /prompts                       List available prompts\n  \
         /prompt <name> <arg=value>...  Run a prompt with arguments\n  \
         /help                          Show this help\n  \
         quit                           Exit\n\
         Anything else is sent to the model as a query.",
        scheme = scheme
    )
}
