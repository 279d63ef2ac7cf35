//! CHAP primitives
//!
//! RFC 1994 with the iSCSI encoding of RFC 3720 section 11.1.4: the response
//! is MD5(identifier || secret || challenge).

use rand::Rng;
use std::fmt;

/// Length of the challenges we generate
pub const CHALLENGE_LEN: usize = 16;

/// CHAP_A value for MD5
pub const CHAP_ALGORITHM_MD5: u8 = 5;

/// One side's challenge: CHAP_I and CHAP_C
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapChallenge {
    pub identifier: u8,
    pub value: Vec<u8>,
}

impl ChapChallenge {
    pub fn new(identifier: u8, value: Vec<u8>) -> Self {
        Self { identifier, value }
    }

    /// Random identifier and challenge bytes
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let identifier = rng.gen::<u8>();
        let mut value = vec![0u8; CHALLENGE_LEN];
        rng.fill(&mut value[..]);
        Self { identifier, value }
    }

    /// CHAP_R for this challenge under `secret`
    pub fn respond(&self, secret: &str) -> Vec<u8> {
        let mut data = Vec::with_capacity(1 + secret.len() + self.value.len());
        data.push(self.identifier);
        data.extend_from_slice(secret.as_bytes());
        data.extend_from_slice(&self.value);
        md5::compute(&data).0.to_vec()
    }

    /// Check a response in constant time
    pub fn verify(&self, response: &[u8], secret: &str) -> bool {
        let expected = self.respond(secret);
        if response.len() != expected.len() {
            return false;
        }

        let mut diff = 0u8;
        for (a, b) in response.iter().zip(expected.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    }
}

/// Text form as it appears in a login PDU
impl fmt::Display for ChapChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CHAP_I={} CHAP_C=0x{}", self.identifier, hex::encode(&self.value))
    }
}

/// Hex form of a response, for logs
pub fn response_hex(response: &[u8]) -> String {
    format!("0x{}", hex::encode(response))
}
