//! Canonical system request and response shapes

/// How a service is started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartType {
    Boot,
    System,
    Automatic,
    #[default]
    Manual,
    Disabled,
}

/// Service controller state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ServiceStatus {
    #[default]
    Unknown,
    Stopped,
    StartPending,
    StopPending,
    Running,
    ContinuePending,
    PausePending,
    Paused,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartServiceRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartServiceResponse {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopServiceRequest {
    pub name: String,
    /// Also stop dependent services
    pub force: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopServiceResponse {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetServiceRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetServiceResponse {
    pub display_name: String,
    pub start_type: StartType,
    pub status: ServiceStatus,
}
