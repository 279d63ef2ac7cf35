//! Scripted host automation
//!
//! Test double that records every command it is asked to run and answers
//! from a list of rules.

use super::{command_name, HostAutomation, HostFailure, ValueBag};
use std::sync::{Mutex, PoisonError};

/// One command the scripted host was asked to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub template: String,
    pub values: ValueBag,
}

impl RecordedCall {
    pub fn command(&self) -> &str {
        command_name(&self.template)
    }
}

#[derive(Debug, Default)]
pub struct ScriptedAutomation {
    rules: Mutex<Vec<(String, Result<String, HostFailure>)>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedAutomation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer templates containing `needle` with `output`. Later rules win.
    pub fn respond(&self, needle: &str, output: &str) {
        self.push_rule(needle, Ok(output.to_string()));
    }

    /// Fail templates containing `needle`
    pub fn fail(&self, needle: &str, reason: &str, output: &str) {
        self.push_rule(needle, Err(HostFailure::new(reason, output)));
    }

    fn push_rule(&self, needle: &str, result: Result<String, HostFailure>) {
        self.rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((needle.to_string(), result));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Commands run so far, by name
    pub fn commands(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.command().to_string()).collect()
    }
}

impl HostAutomation for ScriptedAutomation {
    fn run(&self, template: &str, values: &ValueBag) -> Result<String, HostFailure> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                template: template.to_string(),
                values: values.clone(),
            });

        let rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        rules
            .iter()
            .rev()
            .find(|(needle, _)| template.contains(needle.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| Ok(String::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_and_recording() {
        let host = ScriptedAutomation::new();
        host.respond("Get-Service", "{}");
        host.fail("Start-Service", "exit status 1", "denied");

        assert_eq!(host.run("Get-Service -Name $Env:ServiceName", &ValueBag::new()).unwrap(), "{}");
        assert!(host.run("Start-Service -Name $Env:ServiceName", &ValueBag::new()).is_err());
        assert_eq!(host.run("Stop-Service", &ValueBag::new()).unwrap(), "");
        assert_eq!(host.commands(), ["Get-Service", "Start-Service", "Stop-Service"]);
    }

    #[test]
    fn test_later_rules_win() {
        let host = ScriptedAutomation::new();
        host.respond("Get-SmbGlobalMapping", "");
        host.respond("Get-SmbGlobalMapping", "OK");
        assert_eq!(host.run("Get-SmbGlobalMapping", &ValueBag::new()).unwrap(), "OK");
    }
}
