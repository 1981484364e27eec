//! Agent logging commands
//!
//! The agent reads `##vso[...]` commands from the task's standard output.

use std::fmt;
use std::io::Write;
use std::sync::Mutex;
use tracing::info;

use crate::error::{BlobstageError, Result};
use crate::resources::sas::SasGrant;

/// Suffix of the output variable carrying the full container URL
pub const URL_VARIABLE_SUFFIX: &str = "_URL";

/// Final outcome reported to the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskResult {
    Succeeded,
    Failed,
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskResult::Succeeded => write!(f, "Succeeded"),
            TaskResult::Failed => write!(f, "Failed"),
        }
    }
}

/// The facilities the task needs from its host
pub trait TaskHost: Send + Sync {
    fn set_variable(&self, name: &str, value: &str) -> Result<()>;
    fn set_result(&self, result: TaskResult, message: &str) -> Result<()>;
}

/// Writes agent logging commands to any writer, normally stdout
pub struct AgentCommandWriter<W: Write + Send> {
    out: Mutex<W>,
}

impl AgentCommandWriter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> AgentCommandWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit(&self, command: &str, properties: &[(&str, &str)], data: &str) -> Result<()> {
        let mut line = format!("##vso[{}", command);
        for (i, (key, value)) in properties.iter().enumerate() {
            line.push(if i == 0 { ' ' } else { ';' });
            line.push_str(key);
            line.push('=');
            line.push_str(&escape_property(value));
        }
        if !properties.is_empty() {
            line.push(';');
        }
        line.push(']');
        line.push_str(&escape_data(data));

        let mut out = self
            .out
            .lock()
            .map_err(|_| BlobstageError::config("agent command writer lock poisoned"))?;
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> TaskHost for AgentCommandWriter<W> {
    fn set_variable(&self, name: &str, value: &str) -> Result<()> {
        self.emit("task.setvariable", &[("variable", name)], value)
    }

    fn set_result(&self, result: TaskResult, message: &str) -> Result<()> {
        let result = result.to_string();
        self.emit("task.complete", &[("result", result.as_str())], message)
    }
}

/// Escape the data part of a logging command
pub fn escape_data(value: &str) -> String {
    value
        .replace('%', "%AZP25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Escape a property value of a logging command
pub fn escape_property(value: &str) -> String {
    escape_data(value).replace(';', "%3B").replace(']', "%5D")
}

/// Publish the token as `name` and the container URL as `name_URL`
pub fn publish_sas(host: &dyn TaskHost, name: &str, grant: &SasGrant) -> Result<()> {
    host.set_variable(name, &grant.token)?;
    let url_variable = format!("{}{}", name, URL_VARIABLE_SUFFIX);
    host.set_variable(&url_variable, &grant.url)?;
    info!("Published SAS token to '{}' and '{}'", name, url_variable);
    Ok(())
}
