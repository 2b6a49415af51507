//! Key, CSR and certificate generation.
//!
//! Thin wrappers over `rcgen` producing PEM output, enough to provision a
//! self-signed TLS deployment or hand a CSR to an external CA.

use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};

use crate::{Error, Result};

/// A PEM-encoded certificate signing request and its private key.
#[derive(Clone, Debug)]
pub struct CsrBundle {
    pub csr_pem: String,
    pub key_pem: String,
}

/// A PEM-encoded self-signed certificate and its private key.
#[derive(Clone, Debug)]
pub struct CertifiedKey {
    pub cert_pem: String,
    pub key_pem: String,
}

/// Generates a fresh key pair and a CSR for `common_name` with the given
/// subject alternative names.
pub fn generate_csr(common_name: &str, alt_names: &[&str]) -> Result<CsrBundle> {
    let key_pair = KeyPair::generate().map_err(Error::new_tls)?;
    let params = params_for(common_name, alt_names)?;
    let csr = params
        .serialize_request(&key_pair)
        .map_err(Error::new_tls)?;
    Ok(CsrBundle {
        csr_pem: csr.pem().map_err(Error::new_tls)?,
        key_pem: key_pair.serialize_pem(),
    })
}

/// Generates a fresh key pair and a self-signed certificate for
/// `common_name` with the given subject alternative names.
pub fn self_signed(common_name: &str, alt_names: &[&str]) -> Result<CertifiedKey> {
    let key_pair = KeyPair::generate().map_err(Error::new_tls)?;
    let params = params_for(common_name, alt_names)?;
    let cert = params.self_signed(&key_pair).map_err(Error::new_tls)?;
    Ok(CertifiedKey {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
    })
}

fn params_for(common_name: &str, alt_names: &[&str]) -> Result<CertificateParams> {
    let names: Vec<String> = alt_names.iter().map(|n| n.to_string()).collect();
    let mut params = CertificateParams::new(names).map_err(Error::new_tls)?;
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csr_is_pem_encoded() {
        let bundle = generate_csr("unit.test", &["unit.test"]).unwrap();
        assert!(bundle.csr_pem.contains("BEGIN CERTIFICATE REQUEST"));
        assert!(bundle.key_pem.contains("BEGIN PRIVATE KEY"));
    }

    #[test]
    fn self_signed_cert_loads_into_tls_config() {
        let pair = self_signed("localhost", &["localhost"]).unwrap();
        assert!(pair.cert_pem.contains("BEGIN CERTIFICATE"));
        let config =
            crate::net::tls::tls_server_config(pair.cert_pem.as_bytes(), pair.key_pem.as_bytes());
        assert!(config.is_ok());
    }
}
