//! Shell executor
//!
//! Runs `<program> <args..> <template>` with the value bag exported as
//! environment variables, so `$Env:name` inside a PowerShell template reads
//! the untrusted value without it ever being parsed as script.

use super::{command_name, HostAutomation, HostFailure, ValueBag};
use std::process::Command;

/// Default interpreter
pub const DEFAULT_PROGRAM: &str = "powershell";

/// Executes templates through a shell, PowerShell by default
#[derive(Debug, Clone)]
pub struct PowerShell {
    program: String,
    args: Vec<String>,
}

impl PowerShell {
    pub fn new() -> Self {
        Self::with_program(DEFAULT_PROGRAM, default_args())
    }

    /// Use a different interpreter, e.g. `pwsh` or `sh -c` in tests
    pub fn with_program(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for PowerShell {
    fn default() -> Self {
        Self::new()
    }
}

/// Arguments placed before the template
pub fn default_args() -> Vec<String> {
    vec![
        "-NoProfile".to_string(),
        "-NonInteractive".to_string(),
        "-Command".to_string(),
    ]
}

impl HostAutomation for PowerShell {
    fn run(&self, template: &str, values: &ValueBag) -> Result<String, HostFailure> {
        log::debug!(
            "Running {} via {} ({} value(s))",
            command_name(template),
            self.program,
            values.iter().count()
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(template)
            .envs(values.iter())
            .output()
            .map_err(|e| HostFailure::new(format!("failed to start {}: {}", self.program, e), ""))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            log::warn!("{} exited with {}", command_name(template), output.status);
            return Err(HostFailure::new(format!("{}", output.status), combined));
        }

        Ok(combined)
    }
}

/// Parse the output of `ConvertTo-Json -InputObject @(...)` into strings.
/// Numbers are kept in their decimal form; empty output is an empty list.
pub fn parse_json_list(output: &str) -> Result<Vec<String>, String> {
    let output = output.trim();
    if output.is_empty() {
        return Ok(Vec::new());
    }

    let value: serde_json::Value =
        serde_json::from_str(output).map_err(|e| format!("unexpected output {:?}: {}", output, e))?;
    let items = match value {
        serde_json::Value::Null => return Ok(Vec::new()),
        serde_json::Value::Array(items) => items,
        single => vec![single],
    };

    items
        .into_iter()
        .filter(|item| !item.is_null())
        .map(|item| match item {
            serde_json::Value::String(s) => Ok(s.trim().to_string()),
            serde_json::Value::Number(n) => Ok(n.to_string()),
            other => Err(format!("unexpected list item {}", other)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_list() {
        assert_eq!(parse_json_list("").unwrap(), Vec::<String>::new());
        assert_eq!(parse_json_list("null").unwrap(), Vec::<String>::new());
        assert_eq!(parse_json_list("[\"iqn.a\", \"iqn.b\"]").unwrap(), ["iqn.a", "iqn.b"]);
        assert_eq!(parse_json_list("[\"2 \", 3]").unwrap(), ["2", "3"]);
        assert_eq!(parse_json_list("\"iqn.a\"").unwrap(), ["iqn.a"]);
        assert!(parse_json_list("[{}]").is_err());
        assert!(parse_json_list("WARNING: something").is_err());
    }

    #[cfg(unix)]
    fn sh() -> PowerShell {
        PowerShell::with_program("sh", vec!["-c".to_string()])
    }

    #[test]
    #[cfg(unix)]
    fn test_values_are_passed_out_of_band() {
        let hostile = "$(echo pwned); echo pwned";
        let bag = ValueBag::new().with("proxy_value", hostile);

        let output = sh().run("printf '%s' \"$proxy_value\"", &bag).unwrap();
        assert_eq!(output, hostile);
    }

    #[test]
    #[cfg(unix)]
    fn test_failure_captures_output() {
        let err = sh()
            .run("echo 'no such service' >&2; exit 3", &ValueBag::new())
            .unwrap_err();
        assert!(err.output.contains("no such service"));
        assert!(err.reason.contains('3'));
    }

    #[test]
    #[cfg(unix)]
    fn test_missing_program() {
        let shell = PowerShell::with_program("/nonexistent/shell", vec![]);
        let err = shell.run("anything", &ValueBag::new()).unwrap_err();
        assert!(err.reason.contains("failed to start"));
    }
}
