//! Host side of disk management

use super::types::{DiskIdentifiers, DiskLocation};
use crate::error::{ProxyError, ProxyResult};
use crate::host::{HostAutomation, HostFailure, ValueBag};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Disk operations on the host. Unknown disks are [`ProxyError::NotFound`].
pub trait DiskHost: Send + Sync {
    fn list_ids(&self) -> ProxyResult<BTreeMap<String, DiskIdentifiers>>;

    fn list_locations(&self) -> ProxyResult<BTreeMap<String, DiskLocation>>;

    fn is_online(&self, disk_id: &str) -> ProxyResult<bool>;

    fn set_online(&self, disk_id: &str, online: bool) -> ProxyResult<()>;

    /// Whether the disk already carries a data partition
    fn is_partitioned(&self, disk_id: &str) -> ProxyResult<bool>;

    /// Initialize the disk if needed and create one partition spanning it
    fn partition(&self, disk_id: &str) -> ProxyResult<()>;

    fn rescan(&self) -> ProxyResult<()>;

    fn size(&self, disk_id: &str) -> ProxyResult<u64>;
}

const LIST_IDS: &str =
    "ConvertTo-Json -InputObject @(Get-Disk | Select-Object Number, SerialNumber, UniqueId)";

const LIST_LOCATIONS: &str =
    "ConvertTo-Json -InputObject @(Get-Disk | Select-Object Number, Location)";

const IS_OFFLINE: &str = "(Get-Disk -Number $Env:disk_number -ErrorAction Stop).IsOffline";

const SET_OFFLINE: &str =
    "Set-Disk -Number $Env:disk_number -IsOffline ([bool]::Parse($Env:disk_offline)) \
     -ErrorAction Stop";

const PARTITION_COUNT: &str = "@(Get-Disk -Number $Env:disk_number -ErrorAction Stop \
     | Get-Partition -ErrorAction SilentlyContinue \
     | Where-Object { $_.Type -ne 'Reserved' }).Count";

const PARTITION: &str = "$ErrorActionPreference = 'Stop'; \
     $d = Get-Disk -Number $Env:disk_number; \
     if ($d.PartitionStyle -eq 'RAW') { \
     Initialize-Disk -Number $Env:disk_number -PartitionStyle GPT }; \
     New-Partition -DiskNumber $Env:disk_number -UseMaximumSize | Out-Null";

const RESCAN: &str = "Update-HostStorageCache";

const SIZE: &str = "(Get-Disk -Number $Env:disk_number -ErrorAction Stop).Size";

/// What Get-Disk says when the number matches nothing
const NO_SUCH_DISK: &str = "No MSFT_Disk objects found";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DiskIdRow {
    number: u32,
    #[serde(default)]
    serial_number: Option<String>,
    #[serde(default)]
    unique_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DiskLocationRow {
    number: u32,
    #[serde(default)]
    location: Option<String>,
}

/// Storage cmdlets on Windows
pub struct PowerShellDisks {
    automation: Arc<dyn HostAutomation>,
}

impl PowerShellDisks {
    pub fn new(automation: Arc<dyn HostAutomation>) -> Self {
        Self { automation }
    }

    fn run_on(
        &self,
        action: &str,
        template: &str,
        disk_id: &str,
        values: ValueBag,
    ) -> ProxyResult<String> {
        if disk_id.is_empty() || !disk_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProxyError::NotFound(format!("disk {}", disk_id)));
        }
        let values = values.with("disk_number", disk_id);
        self.automation
            .run(template, &values)
            .map_err(|f| disk_failure(action, disk_id, f))
    }

    fn rows<T>(&self, action: &str, template: &str) -> ProxyResult<Vec<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let output = self
            .automation
            .run(template, &ValueBag::new())
            .map_err(|f| f.into_error(action))?;
        parse_rows(&output).map_err(|reason| ProxyError::HostExecution {
            action: action.to_string(),
            reason,
            output,
        })
    }
}

fn disk_failure(action: &str, disk_id: &str, failure: HostFailure) -> ProxyError {
    if failure.output.contains(NO_SUCH_DISK) {
        return ProxyError::NotFound(format!("disk {}", disk_id));
    }
    failure.into_error(action)
}

/// Parse `ConvertTo-Json -InputObject @(...)` output of objects
fn parse_rows<T: for<'de> Deserialize<'de>>(output: &str) -> Result<Vec<T>, String> {
    let output = output.trim();
    if output.is_empty() || output == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str(output).map_err(|e| format!("unexpected output: {}", e))
}

fn parse_bool(action: &str, output: String) -> ProxyResult<bool> {
    match output.trim() {
        "True" | "true" => Ok(true),
        "False" | "false" => Ok(false),
        _ => Err(ProxyError::HostExecution {
            action: action.to_string(),
            reason: "expected True or False".to_string(),
            output,
        }),
    }
}

fn parse_number(action: &str, output: String) -> ProxyResult<u64> {
    output.trim().parse().map_err(|_| ProxyError::HostExecution {
        action: action.to_string(),
        reason: "expected a number".to_string(),
        output,
    })
}

/// Split a Windows disk location such as
/// `PCI Slot 3 : Adapter 0 : Port 1 : Target 2 : LUN 4`
pub fn parse_location(location: &str) -> DiskLocation {
    let mut parsed = DiskLocation::default();
    for part in location.split(':') {
        let mut words = part.split_whitespace();
        let (Some(name), Some(value)) = (words.next(), words.next()) else {
            continue;
        };
        let slot = match name {
            "Adapter" => &mut parsed.adapter,
            "Port" => &mut parsed.bus,
            "Target" => &mut parsed.target,
            "LUN" => &mut parsed.lun_id,
            _ => continue,
        };
        *slot = value.to_string();
    }
    parsed
}

impl DiskHost for PowerShellDisks {
    fn list_ids(&self) -> ProxyResult<BTreeMap<String, DiskIdentifiers>> {
        let rows: Vec<DiskIdRow> = self.rows("Get-Disk", LIST_IDS)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let ids = DiskIdentifiers {
                    page83: row.unique_id.unwrap_or_default(),
                    serial_number: row.serial_number.unwrap_or_default().trim().to_string(),
                };
                (row.number.to_string(), ids)
            })
            .collect())
    }

    fn list_locations(&self) -> ProxyResult<BTreeMap<String, DiskLocation>> {
        let rows: Vec<DiskLocationRow> = self.rows("Get-Disk", LIST_LOCATIONS)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let location = row.location?;
                Some((row.number.to_string(), parse_location(&location)))
            })
            .collect())
    }

    fn is_online(&self, disk_id: &str) -> ProxyResult<bool> {
        let output = self.run_on("Get-Disk", IS_OFFLINE, disk_id, ValueBag::new())?;
        parse_bool("Get-Disk", output).map(|offline| !offline)
    }

    fn set_online(&self, disk_id: &str, online: bool) -> ProxyResult<()> {
        let values = ValueBag::new().with("disk_offline", (!online).to_string());
        self.run_on("Set-Disk", SET_OFFLINE, disk_id, values)?;
        Ok(())
    }

    fn is_partitioned(&self, disk_id: &str) -> ProxyResult<bool> {
        let output = self.run_on("Get-Partition", PARTITION_COUNT, disk_id, ValueBag::new())?;
        parse_number("Get-Partition", output).map(|count| count > 0)
    }

    fn partition(&self, disk_id: &str) -> ProxyResult<()> {
        self.run_on("New-Partition", PARTITION, disk_id, ValueBag::new())?;
        Ok(())
    }

    fn rescan(&self) -> ProxyResult<()> {
        self.automation
            .run(RESCAN, &ValueBag::new())
            .map_err(|f| f.into_error("Update-HostStorageCache"))?;
        Ok(())
    }

    fn size(&self, disk_id: &str) -> ProxyResult<u64> {
        let output = self.run_on("Get-Disk", SIZE, disk_id, ValueBag::new())?;
        parse_number("Get-Disk", output)
    }
}
