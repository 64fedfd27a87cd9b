//! Minimal IRC line parsing: just enough to route numerics to the rejoin
//! handlers and pull parameters out of an event payload.

use std::collections::HashMap;
use std::fmt;

use crate::error::RejoinError;

/// `<nick/channel> :Nick/channel is temporarily unavailable`
pub const ERR_UNAVAILRESOURCE: &str = "437";

/// A parsed IRC message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub tags: HashMap<String, String>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl Message {
    /// Parse a raw line (with or without trailing CRLF).
    /// Returns `None` for empty lines or lines with no command.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        let mut tags = HashMap::new();
        if let Some(stripped) = rest.strip_prefix('@') {
            let (raw_tags, after) = stripped.split_once(' ')?;
            for tag in raw_tags.split(';').filter(|t| !t.is_empty()) {
                let (k, v) = tag.split_once('=').unwrap_or((tag, ""));
                tags.insert(k.to_string(), v.to_string());
            }
            rest = after.trim_start_matches(' ');
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (p, after) = stripped.split_once(' ')?;
            prefix = Some(p.to_string());
            rest = after.trim_start_matches(' ');
        }

        let (command, params_str) = match rest.split_once(' ') {
            Some((c, p)) => (c, p),
            None => (rest, ""),
        };
        if command.is_empty() {
            return None;
        }

        let params = split_params(params_str, usize::MAX)
            .into_iter()
            .map(String::from)
            .collect();

        Some(Self {
            tags,
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// The parameter string as handed to event handlers: everything after
    /// the command, with the last parameter in trailing form when needed.
    pub fn event_data(&self) -> String {
        let mut out = String::new();
        let last = self.params.len().saturating_sub(1);
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            if i == last && (p.is_empty() || p.contains(' ') || p.starts_with(':')) {
                out.push(':');
            }
            out.push_str(p);
        }
        out
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.tags.is_empty() {
            let mut tags: Vec<_> = self.tags.iter().collect();
            tags.sort();
            let joined: Vec<String> = tags
                .into_iter()
                .map(|(k, v)| if v.is_empty() { k.clone() } else { format!("{k}={v}") })
                .collect();
            write!(f, "@{} ", joined.join(";"))?;
        }
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;
        if !self.params.is_empty() {
            write!(f, " {}", self.event_data())?;
        }
        Ok(())
    }
}

/// Split up to `max` parameters off `data`. A parameter starting with `:`
/// swallows the rest of the line.
fn split_params(data: &str, max: usize) -> Vec<&str> {
    let mut params = Vec::new();
    let mut rest = data.trim_start_matches(' ');
    while !rest.is_empty() && params.len() < max {
        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing);
            break;
        }
        match rest.split_once(' ') {
            Some((p, after)) => {
                params.push(p);
                rest = after.trim_start_matches(' ');
            }
            None => {
                params.push(rest);
                break;
            }
        }
    }
    params
}

/// Extract the first `count` parameters of an event payload.
pub fn event_params(data: &str, count: usize) -> Result<Vec<&str>, RejoinError> {
    let params = split_params(data, count);
    if params.len() < count || params.iter().any(|p| p.is_empty()) {
        return Err(RejoinError::MalformedEvent {
            expected: count,
            data: data.to_string(),
        });
    }
    Ok(params)
}
