//! Execute a script and render its results.

use super::CliError;
use crate::{output, Interpreter, LuaValue};

/// Options for the run command.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Script source text
    pub source: String,
    /// Pretty-print JSON output
    pub pretty: bool,
    /// JSON document bound as the global `data`
    pub input: Option<String>,
    /// Maximum call depth (None keeps the default)
    pub max_call_depth: Option<usize>,
}

/// Result of running a script.
#[derive(Debug)]
pub enum RunOutcome {
    /// The script returned nothing
    NoResult,
    /// JSON renderings of the returned values
    Results(Vec<String>),
}

pub fn execute_run(options: &RunOptions) -> Result<RunOutcome, CliError> {
    let lua = match options.max_call_depth {
        Some(depth) => Interpreter::with_max_call_depth(depth),
        None => Interpreter::new(),
    };
    if let Some(input) = &options.input {
        let json: serde_json::Value = serde_json::from_str(input)?;
        lua.define("data", output::to_lua(&json));
    }
    let values = lua.eval(&options.source)?;
    if values.is_empty() {
        return Ok(RunOutcome::NoResult);
    }
    let mut rendered = Vec::with_capacity(values.len());
    for value in &values {
        rendered.push(render(value, options.pretty)?);
    }
    Ok(RunOutcome::Results(rendered))
}

fn render(value: &LuaValue, pretty: bool) -> Result<String, CliError> {
    if pretty {
        Ok(output::to_json_pretty(value)?)
    } else {
        let json = output::to_json(value)?;
        Ok(json.to_string())
    }
}
