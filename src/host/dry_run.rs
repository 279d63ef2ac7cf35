//! Dry-run host automation
//!
//! Logs the command each template names and succeeds with no output. Values
//! are neither stored nor logged, so credentials passed through the bag go
//! nowhere.

use super::{command_name, HostAutomation, HostFailure, ValueBag};

#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunAutomation;

impl DryRunAutomation {
    pub fn new() -> Self {
        Self
    }
}

impl HostAutomation for DryRunAutomation {
    fn run(&self, template: &str, values: &ValueBag) -> Result<String, HostFailure> {
        log::info!(
            "Dry run: {} ({} value(s) withheld)",
            command_name(template),
            values.iter().count()
        );
        Ok(String::new())
    }
}
