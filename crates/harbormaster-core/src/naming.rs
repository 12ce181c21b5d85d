//! Deterministic job naming.
//!
//! Executor jobs need unique names per deployment, but random suffixes make
//! runs irreproducible. The suffix is the first eight hex characters of
//! sha256 over a discriminator (commit SHA for commit-driven deploys, the
//! new image URL for version-driven ones) and the manifest path: unique per
//! (discriminator, file), stable across restarts.

use sha2::{Digest, Sha256};

const SUFFIX_LEN: usize = 8;

/// Build a job name from a stem and a discriminating context.
///
/// The stem is lowercased and non-alphanumeric runs collapse to single
/// dashes so the result is a valid DNS-1123 label fragment.
pub fn job_name(stem: &str, discriminator: &str, path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(discriminator.as_bytes());
    hasher.update(b"\0");
    hasher.update(path.as_bytes());
    let digest = hex::encode(hasher.finalize());

    format!("{}-{}", sanitize(stem), &digest[..SUFFIX_LEN])
}

fn sanitize(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    let mut last_dash = true;
    for c in stem.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("manifest");
    }
    out
}
