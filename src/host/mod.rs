//! Host automation capability
//!
//! Group servers never splice caller supplied strings into a command line.
//! A command is a fixed template plus a [`ValueBag`]; the executor hands the
//! bag to the host shell out of band (environment variables for PowerShell)
//! and the template refers to the values by name.

mod dry_run;
mod powershell;
#[cfg(test)]
mod scripted;

pub use dry_run::DryRunAutomation;
pub use powershell::{default_args, parse_json_list, PowerShell, DEFAULT_PROGRAM};
#[cfg(test)]
pub use scripted::{RecordedCall, ScriptedAutomation};

use crate::error::ProxyError;
use std::collections::BTreeMap;
use thiserror::Error;

/// Why a host command failed, with whatever output it produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct HostFailure {
    pub reason: String,
    pub output: String,
}

impl HostFailure {
    pub fn new(reason: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            output: output.into(),
        }
    }

    /// Wrap into a [`ProxyError`] naming the action that was attempted
    pub fn into_error(self, action: &str) -> ProxyError {
        ProxyError::HostExecution {
            action: action.to_string(),
            reason: self.reason,
            output: self.output,
        }
    }
}

/// Untrusted values passed to a command template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueBag {
    values: BTreeMap<String, String>,
}

impl ValueBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value. Keys are environment variable names chosen by the proxy,
    /// never by the caller.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        debug_assert!(is_valid_key(key), "invalid value bag key: {}", key);
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Runs templated commands on the host
pub trait HostAutomation: Send + Sync {
    /// Run `template` with `values` available to it by name.
    /// Returns the captured output on success.
    fn run(&self, template: &str, values: &ValueBag) -> Result<String, HostFailure>;
}

/// Short label for a template, used in logs and error messages
pub fn command_name(template: &str) -> &str {
    template
        .split(|c: char| c.is_whitespace() || c == ';' || c == '(')
        .find(|word| word.starts_with(|c: char| c.is_ascii_alphabetic()))
        .unwrap_or(template)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_bag_keys() {
        assert!(is_valid_key("smbremotepath"));
        assert!(is_valid_key("_x1"));
        assert!(!is_valid_key("1abc"));
        assert!(!is_valid_key("a-b"));
        assert!(!is_valid_key(""));
    }

    #[test]
    fn test_value_bag_keeps_values_verbatim() {
        let bag = ValueBag::new().with("name", "x'; Remove-Item C:\\ -Recurse; '");
        assert_eq!(bag.get("name"), Some("x'; Remove-Item C:\\ -Recurse; '"));
        assert_eq!(bag.iter().count(), 1);
    }

    #[test]
    fn test_command_name() {
        assert_eq!(command_name("Start-Service -Name $Env:ServiceName"), "Start-Service");
        assert_eq!(
            command_name("$PWord = ConvertTo-SecureString -String $Env:p"),
            "ConvertTo-SecureString"
        );
        assert_eq!(command_name("(Get-Disk -Number $Env:diskNumber).Size"), "Get-Disk");
    }

    #[test]
    fn test_failure_into_error() {
        let err = HostFailure::new("exit status 1", "access denied").into_error("Set-Disk");
        match err {
            ProxyError::HostExecution { action, output, .. } => {
                assert_eq!(action, "Set-Disk");
                assert_eq!(output, "access denied");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
