use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::EncodePublicKey;
use rsa::RsaPrivateKey;
use tracing::debug;

use crate::config::KeySpec;
use crate::error::{ProvisionError, Result};

/// Longest character-string a single TXT segment may hold.
const TXT_SEGMENT: usize = 255;

/// Files written for one key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPairFiles {
    pub private_key: PathBuf,
    pub public_record: PathBuf,
}

impl KeyPairFiles {
    pub fn in_dir(spec: &KeySpec, dir: &Path) -> Self {
        Self {
            private_key: dir.join(format!("{}.private", spec.selector)),
            public_record: dir.join(format!("{}.txt", spec.selector)),
        }
    }
}

/// Produces `<selector>.private` and `<selector>.txt` inside `dir`.
///
/// Implementations must not leave a private key behind when they fail.
pub trait KeyGenerator {
    fn generate_keypair(&self, spec: &KeySpec, dir: &Path) -> Result<KeyPairFiles>;
}

/// In-process RSA generator. Keys may sign for subdomains of the domain.
#[derive(Debug, Default, Clone, Copy)]
pub struct RsaKeyGenerator;

impl KeyGenerator for RsaKeyGenerator {
    fn generate_keypair(&self, spec: &KeySpec, dir: &Path) -> Result<KeyPairFiles> {
        let files = KeyPairFiles::in_dir(spec, dir);
        let (pem_private, dns_record) = generate_dkim_keys(spec)?;

        fs::write(&files.public_record, dns_record)
            .map_err(|e| ProvisionError::io("write", &files.public_record, e))?;
        write_private_key(&files.private_key, pem_private.as_bytes())?;

        debug!(domain = %spec.domain, bits = spec.size.bits(), "generated RSA key pair");
        Ok(files)
    }
}

/// Generates a key pair and returns the PKCS#1 PEM private key together with
/// the zone-file TXT record publishing its public half.
pub fn generate_dkim_keys(spec: &KeySpec) -> Result<(String, String)> {
    let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), spec.size.bits())?;
    let public_key = private_key.to_public_key();

    let pem_private = private_key.to_pkcs1_pem(LineEnding::LF)?.to_string();
    let public_der = public_key.to_public_key_der()?;
    let dns_record = txt_record(spec, &STANDARD.encode(public_der.as_bytes()));

    Ok((pem_private, dns_record))
}

/// Formats the public key the way `opendkim-genkey` lays out its `.txt` file.
pub fn txt_record(spec: &KeySpec, public_key_b64: &str) -> String {
    let value = format!("p={public_key_b64}");
    let segments: Vec<String> = value
        .as_bytes()
        .chunks(TXT_SEGMENT)
        .map(|chunk| format!("\t  \"{}\"", String::from_utf8_lossy(chunk)))
        .collect();

    format!(
        "{selector}._domainkey\tIN\tTXT\t( \"v=DKIM1; h=sha256; k=rsa; \"\n{body} )  ; ----- DKIM key {selector} for {domain}\n",
        selector = spec.selector,
        domain = spec.domain,
        body = segments.join("\n"),
    )
}

// Written to a sibling file first so an interrupted write never leaves a
// partial key under the final name.
fn write_private_key(path: &Path, pem: &[u8]) -> Result<()> {
    let tmp = path.with_extension("private.tmp");
    let written = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(&tmp)
        .and_then(|mut file| {
            file.write_all(pem)?;
            file.sync_all()
        });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(ProvisionError::io("write", &tmp, e));
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        ProvisionError::io("rename", &tmp, e)
    })
}
