// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Interactive chat loop.
//!
//! A line-oriented terminal front-end over the [`Agent`]: normal scrollback,
//! history and tab completion from `rustyline`, a spinner while waiting.
//!
//! Each input line is handled independently; a failing query or command is
//! reported and the loop keeps going. Ctrl-C at the prompt or during a turn
//! ends the loop so the caller can shut sessions down.

mod command;
mod output;

pub use command::{Command, PROMPT_USAGE};
pub use output::{
    help_text, render_prompt_list, render_resource, render_server_summary, render_stats,
    terminal_callbacks, truncate, Activity, MAX_RESULT_DISPLAY,
};

use std::collections::HashMap;
use std::sync::Arc;

use colored::Colorize;
use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Context, Editor, Helper, Highlighter, Hinter, Validator};

use crate::agent::{Agent, TurnOutcome};
use crate::error::AgentError;

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The user typed `quit` or closed input.
    Quit,
    /// Ctrl-C.
    Interrupted,
}

/// What to do after handling one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Stop(Exit),
}

/// Tab completion for commands and prompt names.
#[derive(Helper, Hinter, Highlighter, Validator)]
struct CommandHelper {
    words: Vec<String>,
}

impl CommandHelper {
    fn new(prompt_names: impl IntoIterator<Item = String>) -> Self {
        let mut words: Vec<String> = ["/help", "/prompts", "/prompt", "@folders", "quit"]
            .iter()
            .map(|w| w.to_string())
            .collect();
        words.extend(prompt_names.into_iter().map(|name| format!("/prompt {}", name)));
        Self { words }
    }
}

impl Completer for CommandHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let typed = &line[..pos];
        let candidates = self
            .words
            .iter()
            .filter(|w| w.starts_with(typed) && w.as_str() != typed)
            .cloned()
            .collect();
        Ok((0, candidates))
    }
}

/// The interactive session.
pub struct Repl {
    agent: Agent,
    activity: Arc<Activity>,
    scheme: String,
}

impl Repl {
    /// `activity` should be the one the agent's callbacks print through.
    pub fn new(agent: Agent, activity: Arc<Activity>, scheme: impl Into<String>) -> Self {
        Self {
            agent,
            activity,
            scheme: scheme.into(),
        }
    }

    /// Read and handle lines until the user quits or presses Ctrl-C.
    pub async fn run(&self) -> anyhow::Result<Exit> {
        let prompt_names: Vec<String> = self
            .agent
            .router()
            .catalog()
            .prompts
            .keys()
            .map(str::to_string)
            .collect();
        let mut editor: Editor<CommandHelper, DefaultHistory> = Editor::new()?;
        editor.set_helper(Some(CommandHelper::new(prompt_names)));

        println!();
        println!("{}", "MCP Chatbot started!".bright_blue().bold());
        println!("Type your queries, /help for commands, or 'quit' to exit.");

        loop {
            println!();
            let line = match tokio::task::block_in_place(|| editor.readline("Query: ")) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => return Ok(Exit::Interrupted),
                Err(ReadlineError::Eof) => return Ok(Exit::Quit),
                Err(e) => return Err(e.into()),
            };

            if !line.trim().is_empty() {
                let _ = editor.add_history_entry(line.trim());
            }

            if let Control::Stop(exit) = self.handle_line(&line).await {
                return Ok(exit);
            }
        }
    }

    /// Handle one input line.
    pub async fn handle_line(&self, line: &str) -> Control {
        match Command::parse(line, &self.scheme) {
            Command::Empty => Control::Continue,
            Command::Quit => Control::Stop(Exit::Quit),
            Command::Help => {
                println!("{}", help_text(&self.scheme));
                Control::Continue
            }
            Command::Invalid(message) => {
                eprintln!("{}", message.red());
                Control::Continue
            }
            Command::ListPrompts => {
                println!("{}", render_prompt_list(self.agent.router().catalog()));
                Control::Continue
            }
            Command::Resource(uri) => {
                self.show_resource(&uri).await;
                Control::Continue
            }
            Command::Prompt { name, arguments } => {
                tracing::info!(
                    prompt = %name,
                    arguments = %describe_arguments(&arguments),
                    "Running prompt"
                );
                println!("{}", format!("Executing prompt '{}'...", name).dimmed());
                self.run_turn(self.agent.run_prompt(&name, &arguments)).await
            }
            Command::Query(query) => self.run_turn(self.agent.chat(&query)).await,
        }
    }

    async fn show_resource(&self, uri: &str) {
        match self.agent.router().read_resource(uri).await {
            Ok(contents) => println!("{}", render_resource(uri, &contents)),
            Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
        }
    }

    /// Run a turn under the spinner; Ctrl-C abandons it.
    async fn run_turn(
        &self,
        turn: impl std::future::Future<Output = Result<TurnOutcome, AgentError>>,
    ) -> Control {
        self.activity.start("Thinking...");
        let result = tokio::select! {
            result = turn => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };
        self.activity.stop();

        match result {
            None => {
                println!("{}", "Interrupted.".yellow());
                Control::Stop(Exit::Interrupted)
            }
            Some(Ok(_)) => Control::Continue,
            Some(Err(e)) => {
                tracing::debug!(error = ?e, "Turn failed");
                eprintln!("{}", format!("Error: {}", e).red());
                Control::Continue
            }
        }
    }
}

/// Render prompt arguments for logs.
pub fn describe_arguments(arguments: &HashMap<String, String>) -> String {
    let mut pairs: Vec<_> = arguments.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    pairs.sort();
    pairs.join(" ")
}
