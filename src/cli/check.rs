//! Validate script syntax without running it.

use super::CliError;
use crate::{lexer, parser};

/// Options for the check command.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Script source text
    pub source: String,
    /// Dump the token stream instead of parsing
    pub tokens: bool,
}

/// Result of a check operation.
#[derive(Debug)]
pub enum CheckResult {
    /// Parse succeeded
    SyntaxValid,
    /// Token dump, one description per token
    Tokens(Vec<String>),
}

/// Tokenize (and unless `tokens` was requested, parse) the source.
///
/// Syntax errors come back with a 1-based line and column, which is what a
/// human staring at an editor wants.
pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    if options.tokens {
        let tokens = lexer::tokenize(&options.source).map_err(|e| locate(e, &options.source))?;
        let dump = tokens
            .iter()
            .map(|t| format!("{:?} @ {}..{}", t.kind, t.span.start, t.span.end))
            .collect();
        return Ok(CheckResult::Tokens(dump));
    }
    parser::parse(&options.source).map_err(|e| locate(e, &options.source))?;
    Ok(CheckResult::SyntaxValid)
}

fn locate(error: crate::SyntaxError, source: &str) -> CliError {
    let (line, column) = error.line_column(source);
    crate::SyntaxError::new(
        format!("{} (line {}, column {})", error.message, line, column),
        error.position,
    )
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_syntax() {
        let options = CheckOptions {
            source: "local x = 1 return x".to_string(),
            tokens: false,
        };
        assert!(matches!(
            execute_check(&options),
            Ok(CheckResult::SyntaxValid)
        ));
    }

    #[test]
    fn test_error_carries_line_and_column() {
        let options = CheckOptions {
            source: "local x = 1\nlocal = 2".to_string(),
            tokens: false,
        };
        let err = execute_check(&options).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
