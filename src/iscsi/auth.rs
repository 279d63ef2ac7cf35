//! Initiator side of login authentication
//!
//! [`negotiate`] drives the security negotiation phase against anything that
//! plays the target role ([`ChapResponder`]): first the target challenges the
//! initiator, then for mutual CHAP the initiator challenges the target and
//! checks its answer against the mutual secret.

use super::chap::{response_hex, ChapChallenge, CHAP_ALGORITHM_MD5};
use super::types::AuthenticationType;
use crate::error::ProxyError;
use std::fmt;

/// Credentials for one connect attempt
#[derive(Clone, PartialEq, Eq)]
pub struct ChapCredentials {
    pub username: String,
    pub secret: String,
}

impl ChapCredentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for ChapCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChapCredentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// What the initiator brings to a login
#[derive(Clone, PartialEq, Eq)]
pub enum LoginAuth {
    None,
    OneWay(ChapCredentials),
    Mutual {
        credentials: ChapCredentials,
        mutual_secret: String,
    },
}

impl LoginAuth {
    pub fn auth_type(&self) -> AuthenticationType {
        match self {
            LoginAuth::None => AuthenticationType::None,
            LoginAuth::OneWay(_) => AuthenticationType::OneWayChap,
            LoginAuth::Mutual { .. } => AuthenticationType::MutualChap,
        }
    }

    pub fn credentials(&self) -> Option<&ChapCredentials> {
        match self {
            LoginAuth::None => None,
            LoginAuth::OneWay(credentials) | LoginAuth::Mutual { credentials, .. } => {
                Some(credentials)
            }
        }
    }
}

impl fmt::Debug for LoginAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginAuth::None => f.write_str("None"),
            LoginAuth::OneWay(c) => f.debug_tuple("OneWay").field(c).finish(),
            LoginAuth::Mutual { credentials, .. } => f
                .debug_struct("Mutual")
                .field("credentials", credentials)
                .field("mutual_secret", &"<redacted>")
                .finish(),
        }
    }
}

/// Authentication methods a target accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetAuthPolicy {
    /// AuthMethod=None only
    None,
    /// AuthMethod=CHAP required
    Chap,
}

/// The target role in a login's security negotiation
pub trait ChapResponder {
    fn policy(&self) -> TargetAuthPolicy;

    /// CHAP_A the target selects
    fn algorithm(&self) -> u8 {
        CHAP_ALGORITHM_MD5
    }

    /// Issue CHAP_I/CHAP_C to the initiator
    fn challenge(&mut self) -> ChapChallenge;

    /// Check the initiator's CHAP_N/CHAP_R
    fn verify_initiator(&mut self, name: &str, response: &[u8]) -> Result<(), String>;

    /// Answer the initiator's challenge during mutual CHAP
    fn answer(&mut self, challenge: &ChapChallenge) -> Result<Vec<u8>, String>;
}

/// Run the security negotiation. Any failure is a [`ProxyError::Connect`].
pub fn negotiate(auth: &LoginAuth, target: &mut dyn ChapResponder) -> Result<(), ProxyError> {
    let credentials = match (auth, target.policy()) {
        (LoginAuth::None, TargetAuthPolicy::None) => return Ok(()),
        (LoginAuth::None, TargetAuthPolicy::Chap) => {
            return Err(ProxyError::Connect(
                "target requires CHAP authentication".to_string(),
            ))
        }
        (_, TargetAuthPolicy::None) => {
            return Err(ProxyError::Connect(format!(
                "target does not accept {} authentication",
                auth.auth_type()
            )))
        }
        (LoginAuth::OneWay(c), TargetAuthPolicy::Chap)
        | (LoginAuth::Mutual { credentials: c, .. }, TargetAuthPolicy::Chap) => c,
    };

    let algorithm = target.algorithm();
    if algorithm != CHAP_ALGORITHM_MD5 {
        return Err(ProxyError::Connect(format!(
            "unsupported CHAP algorithm {}",
            algorithm
        )));
    }

    let challenge = target.challenge();
    log::trace!("Target challenge: {}", challenge);

    let response = challenge.respond(&credentials.secret);
    target
        .verify_initiator(&credentials.username, &response)
        .map_err(|reason| {
            ProxyError::Connect(format!("initiator authentication failed: {}", reason))
        })?;

    let LoginAuth::Mutual { mutual_secret, .. } = auth else {
        return Ok(());
    };

    // A target replaying our own challenge back at us is a reflection attack
    let mut ours = ChapChallenge::generate();
    while ours.value == challenge.value {
        ours = ChapChallenge::generate();
    }
    log::trace!("Initiator challenge: {}", ours);

    let answer = target
        .answer(&ours)
        .map_err(|reason| {
            ProxyError::Connect(format!("target authentication failed: {}", reason))
        })?;
    log::trace!("Target answer: {}", response_hex(&answer));

    if !ours.verify(&answer, mutual_secret) {
        return Err(ProxyError::Connect(
            "target failed mutual CHAP authentication, check the mutual CHAP secret".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A target configured with a CHAP user and optional reverse secret
    struct Target {
        policy: TargetAuthPolicy,
        username: String,
        secret: String,
        reverse_secret: Option<String>,
        issued: Option<ChapChallenge>,
    }

    impl Target {
        fn chap(reverse_secret: Option<&str>) -> Self {
            Self {
                policy: TargetAuthPolicy::Chap,
                username: "anotheruser".to_string(),
                secret: "averylongsecret".to_string(),
                reverse_secret: reverse_secret.map(str::to_string),
                issued: None,
            }
        }
    }

    impl ChapResponder for Target {
        fn policy(&self) -> TargetAuthPolicy {
            self.policy
        }

        fn challenge(&mut self) -> ChapChallenge {
            let challenge = ChapChallenge::generate();
            self.issued = Some(challenge.clone());
            challenge
        }

        fn verify_initiator(&mut self, name: &str, response: &[u8]) -> Result<(), String> {
            let issued = self.issued.take().ok_or("no challenge issued")?;
            if name != self.username || !issued.verify(response, &self.secret) {
                return Err("bad credentials".to_string());
            }
            Ok(())
        }

        fn answer(&mut self, challenge: &ChapChallenge) -> Result<Vec<u8>, String> {
            let secret = self.reverse_secret.as_ref().ok_or("no reverse secret")?;
            Ok(challenge.respond(secret))
        }
    }

    fn one_way(secret: &str) -> LoginAuth {
        LoginAuth::OneWay(ChapCredentials::new("anotheruser", secret))
    }

    fn mutual(mutual_secret: &str) -> LoginAuth {
        LoginAuth::Mutual {
            credentials: ChapCredentials::new("anotheruser", "averylongsecret"),
            mutual_secret: mutual_secret.to_string(),
        }
    }

    #[test]
    fn test_no_auth() {
        let mut target = Target::chap(None);
        target.policy = TargetAuthPolicy::None;
        assert!(negotiate(&LoginAuth::None, &mut target).is_ok());
        assert!(negotiate(&one_way("averylongsecret"), &mut target).is_err());
    }

    #[test]
    fn test_chap_required() {
        let err = negotiate(&LoginAuth::None, &mut Target::chap(None)).unwrap_err();
        assert!(matches!(err, ProxyError::Connect(_)));
    }

    #[test]
    fn test_one_way() {
        assert!(negotiate(&one_way("averylongsecret"), &mut Target::chap(None)).is_ok());

        let err = negotiate(&one_way("notthesecret!"), &mut Target::chap(None)).unwrap_err();
        assert!(err.to_string().contains("initiator authentication failed"));
    }

    #[test]
    fn test_mutual() {
        let mut target = Target::chap(Some("reversssssssse"));
        assert!(negotiate(&mutual("reversssssssse"), &mut target).is_ok());

        let mut target = Target::chap(Some("reversssssssse"));
        let err = negotiate(&mutual("made-up-pass"), &mut target).unwrap_err();
        assert!(err.to_string().contains("mutual CHAP"));

        let err = negotiate(&mutual("reversssssssse"), &mut Target::chap(None)).unwrap_err();
        assert!(err.to_string().contains("target authentication failed"));
    }

    #[test]
    fn test_mutual_needs_one_way_first() {
        let auth = LoginAuth::Mutual {
            credentials: ChapCredentials::new("anotheruser", "wrong-secret!"),
            mutual_secret: "reversssssssse".to_string(),
        };
        let err = negotiate(&auth, &mut Target::chap(Some("reversssssssse"))).unwrap_err();
        assert!(err.to_string().contains("initiator authentication failed"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let text = format!("{:?}", mutual("reversssssssse"));
        assert!(!text.contains("reversssssssse"));
        assert!(!text.contains("averylongsecret"));
        assert!(text.contains("anotheruser"));
    }
}
