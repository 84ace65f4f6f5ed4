//! TLS material loading and self-signed certificate generation.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// A certificate chain and its private key, ready for a QUIC server config.
#[derive(Debug)]
pub struct TlsMaterial {
    /// End-entity certificate first, then intermediates.
    pub cert_chain: Vec<CertificateDer<'static>>,
    /// Private key matching the end-entity certificate.
    pub private_key: PrivateKeyDer<'static>,
}

impl TlsMaterial {
    /// Load a PEM certificate chain and a PEM private key from disk.
    ///
    /// Both files are read and parsed before anything else happens, so a
    /// caller can validate material without touching the network.
    pub fn load(cert_path: impl AsRef<Path>, key_path: impl AsRef<Path>) -> Result<Self> {
        let cert_chain = load_cert_chain(cert_path)?;
        let private_key = load_private_key(key_path)?;
        Ok(Self {
            cert_chain,
            private_key,
        })
    }
}

/// Read every PEM certificate in `path`.
pub fn load_cert_chain(path: impl AsRef<Path>) -> Result<Vec<CertificateDer<'static>>> {
    let path = path.as_ref();
    let mut reader = open_pem(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|source| TransportError::TlsMaterial {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(TransportError::MissingCertificate {
            path: path.to_path_buf(),
        });
    }
    debug!(path = %path.display(), count = certs.len(), "loaded certificate chain");
    Ok(certs)
}

/// Read the first PKCS#8, PKCS#1 or SEC1 private key in `path`.
pub fn load_private_key(path: impl AsRef<Path>) -> Result<PrivateKeyDer<'static>> {
    let path = path.as_ref();
    let mut reader = open_pem(path)?;
    let key = rustls_pemfile::private_key(&mut reader).map_err(|source| {
        TransportError::TlsMaterial {
            path: path.to_path_buf(),
            source,
        }
    })?;

    key.ok_or_else(|| TransportError::MissingPrivateKey {
        path: path.to_path_buf(),
    })
}

/// Build a root store trusting every certificate in `path`.
pub fn load_root_store(path: impl AsRef<Path>) -> Result<rustls::RootCertStore> {
    let mut roots = rustls::RootCertStore::empty();
    for cert in load_cert_chain(path)? {
        roots.add(cert)?;
    }
    Ok(roots)
}

fn open_pem(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|source| TransportError::TlsMaterial {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

/// Paths written by [`generate_self_signed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedMaterial {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Generate a self-signed certificate for `subject_alt_names` and write the
/// certificate and PKCS#8 key as PEM files.
pub fn generate_self_signed(
    subject_alt_names: &[String],
    cert_path: impl AsRef<Path>,
    key_path: impl AsRef<Path>,
) -> Result<GeneratedMaterial> {
    let cert_path = cert_path.as_ref();
    let key_path = key_path.as_ref();

    let certified = rcgen::generate_simple_self_signed(subject_alt_names.to_vec())
        .map_err(|err| TransportError::Generate(err.to_string()))?;

    write_pem(cert_path, certified.cert.pem())?;
    write_pem(key_path, certified.key_pair.serialize_pem())?;

    info!(
        cert = %cert_path.display(),
        key = %key_path.display(),
        names = ?subject_alt_names,
        "generated self-signed certificate"
    );

    Ok(GeneratedMaterial {
        cert_path: cert_path.to_path_buf(),
        key_path: key_path.to_path_buf(),
    })
}

/// Generate self-signed material in memory without touching the filesystem.
pub fn self_signed_material(subject_alt_names: &[String]) -> Result<TlsMaterial> {
    let certified = rcgen::generate_simple_self_signed(subject_alt_names.to_vec())
        .map_err(|err| TransportError::Generate(err.to_string()))?;
    let private_key =
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));
    Ok(TlsMaterial {
        cert_chain: vec![certified.cert.der().clone()],
        private_key,
    })
}

fn write_pem(path: &Path, contents: String) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| TransportError::TlsMaterial {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, contents).map_err(|source| TransportError::TlsMaterial {
        path: path.to_path_buf(),
        source,
    })
}
