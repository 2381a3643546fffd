//! `pseudonymize_email`: deterministic pseudo-identities for email addresses.

use std::sync::Arc;

use guardette_config::{keys, GatewayConfig};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{compile_paths, parse_fields, Action, ActionContext};
use crate::error::{GatewayResult, PolicyResult};
use crate::jsonpath::JsonPath;
use crate::BoxFuture;

/// RFC 4648 base32 alphabet, lower-cased.
const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PseudonymizeFields {
    json_paths: Vec<String>,
}

/// Rewrites `user@domain` values as `u-<hash>@d-<hash>.invalid`.
///
/// The salt is read from the secrets resolver on every invocation.
#[derive(Debug)]
pub struct PseudonymizeEmail {
    paths: Vec<Arc<JsonPath>>,
}

impl PseudonymizeEmail {
    /// Registered kind.
    pub const KIND: &'static str = "pseudonymize_email";

    /// Builds the action from its policy fields.
    pub fn from_fields(fields: Value) -> PolicyResult<Self> {
        let fields: PseudonymizeFields = parse_fields(Self::KIND, fields)?;
        Ok(Self {
            paths: compile_paths(Self::KIND, &fields.json_paths)?,
        })
    }
}

impl Action for PseudonymizeEmail {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn on_response<'a>(&'a self, ctx: &'a mut ActionContext) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(async move {
            let salt = ctx.secrets.get(keys::PSEUDONYMIZE_SALT).await?;
            let config = &ctx.config;

            for path in &self.paths {
                path.update_with(&mut ctx.response.json, |value| {
                    let email = value.as_str()?;
                    pseudonymize_email(email, &salt, config).map(Value::String)
                });
            }
            Ok(())
        })
    }
}

/// Pseudonymises one address.
///
/// Returns `None` when the value must be left untouched: not exactly one
/// `@`, or a domain on the configured allowlist.
pub fn pseudonymize_email(email: &str, salt: &str, config: &GatewayConfig) -> Option<String> {
    let lowered = email.to_lowercase();
    let mut parts = lowered.split('@');
    let (username, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(username), Some(domain), None) => (username, domain),
        _ => return None,
    };

    if config.is_allowlisted_domain(domain) {
        return None;
    }

    Some(format!(
        "u-{}@d-{}.invalid",
        salted_hash(username, salt),
        salted_hash(domain, salt)
    ))
}

fn salted_hash(value: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hasher.update(salt.as_bytes());
    base32_unpadded(&hasher.finalize())
}

fn base32_unpadded(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut buffer: u32 = 0;
    let mut bits = 0u32;

    for &byte in bytes {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(char::from(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize]));
        }
    }
    if bits > 0 {
        out.push(char::from(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize]));
    }
    out
}
