use crate::error::AuthError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use zeroize::Zeroizing;

/// Management certificate with its private key, PEM encoded.
#[derive(Clone)]
pub struct ClientCertificate {
    thumbprint: String,
    pem: Zeroizing<Vec<u8>>,
}

impl ClientCertificate {
    pub fn new(thumbprint: &str, pem: impl Into<Vec<u8>>) -> Self {
        Self {
            thumbprint: normalize_thumbprint(thumbprint),
            pem: Zeroizing::new(pem.into()),
        }
    }

    /// Upper-case hex thumbprint without separators.
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    pub fn pem(&self) -> &[u8] {
        &self.pem
    }

    /// TLS client identity for mutual-TLS requests to the classic endpoint.
    pub fn identity(&self) -> Result<reqwest::Identity, AuthError> {
        reqwest::Identity::from_pem(&self.pem).map_err(|e| {
            AuthError::Configuration(format!(
                "Certificate {} is not a valid PEM identity: {e}",
                self.thumbprint
            ))
        })
    }
}

impl fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("thumbprint", &self.thumbprint)
            .field("pem", &"<redacted>")
            .finish()
    }
}

/// `AB:cd 12` → `ABCD12`
pub fn normalize_thumbprint(thumbprint: &str) -> String {
    thumbprint
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Local certificate store lookup.
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Returns `Ok(None)` when no certificate carries the thumbprint.
    async fn find_by_thumbprint(
        &self,
        thumbprint: &str,
    ) -> Result<Option<ClientCertificate>, AuthError>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCertificateStore {
    certificates: HashMap<String, ClientCertificate>,
}

impl InMemoryCertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, certificate: ClientCertificate) {
        self.certificates
            .insert(certificate.thumbprint.clone(), certificate);
    }
}

#[async_trait]
impl CertificateStore for InMemoryCertificateStore {
    async fn find_by_thumbprint(
        &self,
        thumbprint: &str,
    ) -> Result<Option<ClientCertificate>, AuthError> {
        Ok(self
            .certificates
            .get(&normalize_thumbprint(thumbprint))
            .cloned())
    }
}

/// Directory of `<THUMBPRINT>.pem` files, each holding a certificate and its key.
#[derive(Debug, Clone)]
pub struct PemDirectoryCertificateStore {
    directory: PathBuf,
}

impl PemDirectoryCertificateStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &std::path::Path {
        &self.directory
    }
}

#[async_trait]
impl CertificateStore for PemDirectoryCertificateStore {
    async fn find_by_thumbprint(
        &self,
        thumbprint: &str,
    ) -> Result<Option<ClientCertificate>, AuthError> {
        let thumbprint = normalize_thumbprint(thumbprint);
        if thumbprint.is_empty() || !thumbprint.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(None);
        }

        let path = self.directory.join(format!("{thumbprint}.pem"));
        match tokio::fs::read(&path).await {
            Ok(pem) => {
                log::debug!("Loaded certificate {thumbprint} from {}", path.display());
                Ok(Some(ClientCertificate::new(&thumbprint, pem)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AuthError::Configuration(format!(
                "Failed to read certificate {}: {e}",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_thumbprint() {
        assert_eq!(normalize_thumbprint("ab:cd ef 01"), "ABCDEF01");
    }

    #[tokio::test]
    async fn test_in_memory_lookup_ignores_formatting() {
        let mut store = InMemoryCertificateStore::new();
        store.insert(ClientCertificate::new("ABCDEF01", b"pem".to_vec()));

        let found = store.find_by_thumbprint("ab:cd:ef:01").await.unwrap();
        assert_eq!(found.unwrap().thumbprint(), "ABCDEF01");
        assert!(store.find_by_thumbprint("FFFF").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pem_directory_lookup() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ABCDEF01.pem"), b"-----BEGIN CERTIFICATE-----").unwrap();
        let store = PemDirectoryCertificateStore::new(dir.path());

        let found = store.find_by_thumbprint("abcdef01").await.unwrap().unwrap();
        assert_eq!(found.pem(), b"-----BEGIN CERTIFICATE-----");
        assert!(store.find_by_thumbprint("0123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pem_directory_rejects_path_like_thumbprints() {
        let dir = TempDir::new().unwrap();
        let store = PemDirectoryCertificateStore::new(dir.path());
        assert!(store.find_by_thumbprint("../secret").await.unwrap().is_none());
    }
}
