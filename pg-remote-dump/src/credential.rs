//! Identity file loading

use crate::error::CredentialError;
use russh::keys::ssh_key::{Algorithm, HashAlg, PrivateKey};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Private key used as the only authentication method for the session.
#[derive(Clone)]
pub struct Credential {
    key: Arc<PrivateKey>,
}

impl Credential {
    pub fn algorithm(&self) -> Algorithm {
        self.key.algorithm()
    }

    /// SHA-256 fingerprint of the public half, for logging.
    pub fn fingerprint(&self) -> String {
        self.key.public_key().fingerprint(HashAlg::Sha256).to_string()
    }

    pub(crate) fn key(&self) -> Arc<PrivateKey> {
        Arc::clone(&self.key)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("algorithm", &self.algorithm().as_str())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Read and parse an unencrypted private key file.
///
/// Passphrase-protected keys are reported as unparseable.
pub fn load_credential(path: &Path) -> Result<Credential, CredentialError> {
    let buf = fs::read(path).map_err(|source| CredentialError::FileUnreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let unparseable = |source: Box<dyn std::error::Error + Send + Sync>| {
        CredentialError::KeyUnparseable {
            path: path.to_path_buf(),
            source,
        }
    };

    let text = String::from_utf8(buf).map_err(|e| unparseable(Box::new(e)))?;
    let key = russh::keys::decode_secret_key(&text, None).map_err(|e| unparseable(Box::new(e)))?;

    Ok(Credential { key: Arc::new(key) })
}
