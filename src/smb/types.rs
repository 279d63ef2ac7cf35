//! Canonical SMB request and response shapes

use std::fmt;

#[derive(Clone, Default, PartialEq, Eq)]
pub struct NewSmbGlobalMappingRequest {
    /// UNC path of the share, e.g. `\\server\share`
    pub remote_path: String,
    /// Where to link the share. Empty means no link.
    pub local_path: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for NewSmbGlobalMappingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewSmbGlobalMappingRequest")
            .field("remote_path", &self.remote_path)
            .field("local_path", &self.local_path)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewSmbGlobalMappingResponse {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveSmbGlobalMappingRequest {
    pub remote_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveSmbGlobalMappingResponse {}
