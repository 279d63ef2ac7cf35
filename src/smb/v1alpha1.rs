//! SMB API v1alpha1
//!
//! Maps shares only. Linking a local path arrived in v1beta1.

use super::server::SmbServer;
use super::types;
use crate::error::{ConversionError, ProxyResult};
use crate::server::dispatch::{Dispatcher, Versioned};
use crate::server::{registered_version, ApiGroup};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const VERSION: &str = "v1alpha1";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewSmbGlobalMappingRequest {
    pub remote_path: String,
    pub username: String,
    pub password: String,
}

impl Versioned for NewSmbGlobalMappingRequest {
    type Canonical = types::NewSmbGlobalMappingRequest;

    fn to_canonical(self) -> Result<Self::Canonical, ConversionError> {
        Ok(types::NewSmbGlobalMappingRequest {
            remote_path: self.remote_path,
            local_path: String::new(),
            username: self.username,
            password: self.password,
        })
    }

    fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
        if !c.local_path.is_empty() {
            return Err(ConversionError::new(format!("{} cannot link a local path", VERSION)));
        }
        Ok(Self {
            remote_path: c.remote_path,
            username: c.username,
            password: c.password,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoveSmbGlobalMappingRequest {
    pub remote_path: String,
}

impl Versioned for RemoveSmbGlobalMappingRequest {
    type Canonical = types::RemoveSmbGlobalMappingRequest;

    fn to_canonical(self) -> Result<Self::Canonical, ConversionError> {
        Ok(types::RemoveSmbGlobalMappingRequest {
            remote_path: self.remote_path,
        })
    }

    fn from_canonical(c: Self::Canonical) -> Result<Self, ConversionError> {
        Ok(Self {
            remote_path: c.remote_path,
        })
    }
}

empty_message!(NewSmbGlobalMappingResponse, NewSmbGlobalMappingResponse);
empty_message!(RemoveSmbGlobalMappingResponse, RemoveSmbGlobalMappingResponse);

pub fn register(server: Arc<SmbServer>, dispatcher: &mut Dispatcher) -> ProxyResult<()> {
    dispatcher
        .registrar(ApiGroup::Smb, registered_version(VERSION)?, server)
        .method::<NewSmbGlobalMappingRequest, NewSmbGlobalMappingResponse>(
            "NewSmbGlobalMapping",
            SmbServer::new_smb_global_mapping,
        )?
        .method::<RemoveSmbGlobalMappingRequest, RemoveSmbGlobalMappingResponse>(
            "RemoveSmbGlobalMapping",
            SmbServer::remove_smb_global_mapping,
        )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_path_has_no_representation() {
        let wire = NewSmbGlobalMappingRequest {
            remote_path: r"\\s\share".to_string(),
            username: "u".to_string(),
            password: "p".to_string(),
        };
        let canonical = wire.clone().to_canonical().unwrap();
        assert!(canonical.local_path.is_empty());
        assert_eq!(NewSmbGlobalMappingRequest::from_canonical(canonical.clone()).unwrap(), wire);

        let linked = types::NewSmbGlobalMappingRequest {
            local_path: r"C:\mnt".to_string(),
            ..canonical
        };
        assert!(NewSmbGlobalMappingRequest::from_canonical(linked).is_err());
    }
}
