//! AWS Signature Version 4 request signing.
//!
//! Just enough of SigV4 for the API Gateway control plane: the canonical
//! request covers `host` and `x-amz-date` (plus the session token when one is
//! present), and the payload hash is computed over the JSON body or the empty
//! string. The timestamp is a parameter so tests can pin it against the
//! published AWS test vectors.
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::config::Credentials;

type HmacSha256 = Hmac<Sha256>;

/// Fixed signing context: who signs, for which endpoint.
pub struct Signer {
    credentials: Credentials,
    region: String,
    service: &'static str,
    host: String,
}

/// Headers to attach to an outgoing control-plane request.
#[derive(Debug)]
pub struct SignedRequest {
    pub amz_date: String,
    pub authorization: String,
    pub security_token: Option<String>,
}

impl Signer {
    pub fn new(credentials: Credentials, region: &str, service: &'static str, host: &str) -> Self {
        Self {
            credentials,
            region: region.to_string(),
            service,
            host: host.to_string(),
        }
    }

    /// Sign one request. `path` must already be percent-encoded per segment
    /// and `query` is canonicalized (sorted, encoded) here.
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        query: &[(String, String)],
        payload: &[u8],
        at: DateTime<Utc>,
    ) -> Result<SignedRequest> {
        let amz_date = at.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = at.format("%Y%m%d").to_string();

        let mut canonical_headers = format!("host:{}\nx-amz-date:{amz_date}\n", self.host);
        let mut signed_headers = String::from("host;x-amz-date");
        if let Some(token) = &self.credentials.session_token {
            canonical_headers.push_str(&format!("x-amz-security-token:{token}\n"));
            signed_headers.push_str(";x-amz-security-token");
        }

        let canonical_request = format!(
            "{method}\n{path}\n{}\n{canonical_headers}\n{signed_headers}\n{}",
            canonical_query(query),
            sha256_hex(payload),
        );

        let scope = format!(
            "{date_stamp}/{}/{}/aws4_request",
            self.region, self.service
        );
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
            sha256_hex(canonical_request.as_bytes()),
        );

        let secret = format!("AWS4{}", self.credentials.secret_access_key);
        let k_date = hmac_sha256(secret.as_bytes(), date_stamp.as_bytes())?;
        let k_region = hmac_sha256(&k_date, self.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, self.service.as_bytes())?;
        let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
        let signature = hex(&hmac_sha256(&k_signing, string_to_sign.as_bytes())?);

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.credentials.access_key_id,
        );

        Ok(SignedRequest {
            amz_date,
            authorization,
            security_token: self.credentials.session_token.clone(),
        })
    }
}

/// Sorted, percent-encoded `k=v&k=v` form shared by the signature and the
/// request URL, so the two can never disagree.
pub(crate) fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(key, value)| (uri_encode(key), uri_encode(value)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode one path segment or query component (RFC 3986 unreserved
/// characters pass through, everything else is `%XX`).
pub fn uri_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32]> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|err| anyhow!("hmac key setup: {err}"))?;
    mac.update(data);
    let digest = mac.finalize().into_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Ok(out)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
