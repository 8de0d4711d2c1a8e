//! Credential cache and resolution.

pub mod cache;
pub mod certificate;
pub mod profile;
pub mod resolver;

pub use cache::CredentialCache;
pub use certificate::{
    CertificateStore, ClientCertificate, InMemoryCertificateStore, PemDirectoryCertificateStore,
    normalize_thumbprint,
};
pub use profile::{InMemoryProfileStore, ProfileEntry, ProfileStore};
pub use resolver::{
    AccessTokenCredential, CertificateCredential, CredentialResolver, ResolvedCredential,
};
