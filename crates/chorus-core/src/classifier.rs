//! Mention and command classifier
//!
//! Turns a raw message body into either a slash command or the set of
//! recognized agent mentions. Purely textual, no side effects; malformed
//! commands produce a `ParseError` whose Display text doubles as the reply
//! hint sent back to the user.

use tracing::debug;

use crate::error::ParseError;

/// What a message body turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A recognized slash command with parsed arguments
    Command(Command),
    /// Agent mentions in first-appearance order (possibly empty)
    Mentions(Vec<String>),
}

/// Parsed command surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/invite <agent> [for <N> hours]`
    Invite { agent: String, hours: Option<i64> },
    /// `/uninvite <agent>`
    Uninvite { agent: String },
    /// `/list_invites`
    ListInvites,
    /// `/help`
    Help,
}

/// Classify a message body against the set of known agent names.
///
/// Bodies starting with `/` are parsed as commands and may fail with a
/// `ParseError`; everything else yields `Mentions` and never fails.
/// Mention matching is case-insensitive; the canonical agent name is
/// returned.
pub fn classify(body: &str, known_agents: &[String]) -> Result<Classification, ParseError> {
    let trimmed = body.trim();

    if let Some(rest) = trimmed.strip_prefix('/') {
        let command = parse_command(rest)?;
        debug!("Classified command: {:?}", command);
        return Ok(Classification::Command(command));
    }

    Ok(Classification::Mentions(extract_mentions(
        trimmed,
        known_agents,
    )))
}

fn parse_command(rest: &str) -> Result<Command, ParseError> {
    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or("").to_lowercase();
    let args: Vec<&str> = words.collect();

    match name.as_str() {
        "invite" => {
            let agent = args
                .first()
                .map(|s| s.to_string())
                .ok_or(ParseError::MissingAgent {
                    command: "invite".to_string(),
                })?;
            let hours = parse_duration_clause(&args[1..])?;
            Ok(Command::Invite { agent, hours })
        }
        "uninvite" => {
            let agent = args
                .first()
                .map(|s| s.to_string())
                .ok_or(ParseError::MissingAgent {
                    command: "uninvite".to_string(),
                })?;
            Ok(Command::Uninvite { agent })
        }
        "list_invites" => Ok(Command::ListInvites),
        "help" => Ok(Command::Help),
        other => Err(ParseError::UnknownCommand(other.to_string())),
    }
}

/// Parse the optional `for <N> hours` tail of an invite command.
/// An empty tail means no expiry; anything else must match the shape exactly.
fn parse_duration_clause(args: &[&str]) -> Result<Option<i64>, ParseError> {
    if args.is_empty() {
        return Ok(None);
    }

    let given = args.join(" ");
    if args.len() != 3 || !args[0].eq_ignore_ascii_case("for") {
        return Err(ParseError::BadDuration { given });
    }
    let n: i64 = args[1]
        .parse()
        .map_err(|_| ParseError::BadDuration {
            given: given.clone(),
        })?;
    if n <= 0 {
        return Err(ParseError::BadDuration { given });
    }
    match args[2].to_lowercase().as_str() {
        "hour" | "hours" => Ok(Some(n)),
        _ => Err(ParseError::BadDuration { given }),
    }
}

/// Extract `@name` tokens that match a known agent, preserving first
/// appearance order and collapsing duplicates.
fn extract_mentions(body: &str, known_agents: &[String]) -> Vec<String> {
    let mut mentions = Vec::new();

    for token in body.split_whitespace() {
        let Some(raw) = token.strip_prefix('@') else {
            continue;
        };
        let name = raw.trim_end_matches(|c: char| !c.is_alphanumeric() && c != '_' && c != '-');
        if name.is_empty() {
            continue;
        }
        let Some(canonical) = known_agents.iter().find(|a| a.eq_ignore_ascii_case(name)) else {
            continue;
        };
        if !mentions.contains(canonical) {
            mentions.push(canonical.clone());
        }
    }

    mentions
}
