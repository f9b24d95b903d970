// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Input line parsing for the interactive loop.
//!
//! Plain text is a query. A leading `@` reads a resource, a leading `/` is a
//! command, and `quit` leaves.

use std::collections::HashMap;

/// What the user asked for on one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Blank line.
    Empty,
    /// Leave the loop.
    Quit,
    /// Show command help.
    Help,
    /// Read a resource by URI.
    Resource(String),
    /// List the prompts in the catalog.
    ListPrompts,
    /// Render a prompt and run it as a query.
    Prompt {
        name: String,
        arguments: HashMap<String, String>,
    },
    /// Send the text to the model.
    Query(String),
    /// Input that could not be understood; the message says why.
    Invalid(String),
}

/// Usage line for `/prompt`.
pub const PROMPT_USAGE: &str = "Usage: /prompt <name> <arg1=value1> <arg2=value2>";

impl Command {
    /// Parse one input line.
    ///
    /// `scheme` is the resource scheme `@` shortcuts expand into, e.g.
    /// `@folders` becomes `{scheme}://folders`.
    pub fn parse(input: &str, scheme: &str) -> Self {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return Self::Empty;
        }

        if trimmed.eq_ignore_ascii_case("quit") {
            return Self::Quit;
        }

        if let Some(topic) = trimmed.strip_prefix('@') {
            let topic = topic.trim();
            if topic.is_empty() {
                return Self::Invalid("Usage: @folders or @<topic>".to_string());
            }
            return Self::Resource(format!("{}://{}", scheme, topic));
        }

        if trimmed.starts_with('/') {
            return parse_slash_command(trimmed);
        }

        Self::Query(trimmed.to_string())
    }
}

fn parse_slash_command(input: &str) -> Command {
    let mut parts = input.split_whitespace();
    let command = parts.next().unwrap_or_default().to_lowercase();

    match command.as_str() {
        "/help" | "/h" | "/?" => Command::Help,
        "/prompts" => Command::ListPrompts,
        "/prompt" => match parts.next() {
            Some(name) => Command::Prompt {
                name: name.to_string(),
                arguments: parse_arguments(parts),
            },
            None => Command::Invalid(PROMPT_USAGE.to_string()),
        },
        _ => Command::Invalid(format!("Unknown command: {}", command)),
    }
}

/// Collect `key=value` tokens; tokens without `=` are ignored.
///
/// Only the first `=` splits, so values may contain `=`.
fn parse_arguments<'a>(tokens: impl Iterator<Item = &'a str>) -> HashMap<String, String> {
    tokens
        .filter_map(|token| token.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
