//! Content hashing for cached artifacts.
//!
//! Checksums are lowercase hex SHA-256. A file is only ever "verified" or "not
//! verified": an unreadable file, a short read or any I/O error counts as a
//! mismatch.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

const READ_CHUNK: usize = 64 * 1024;

/// Hex digest of an in-memory buffer.
pub fn digest_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Streams `path` once and returns its hex digest.
pub async fn digest_file(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let expected_len = file.metadata().await?.len();

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];
    let mut read_total: u64 = 0;
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        read_total += n as u64;
    }

    if read_total != expected_len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("short read: {read_total} of {expected_len} bytes"),
        ));
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Normalizes a checksum for comparison: trims whitespace, drops an optional
/// `sha256:` prefix and lowercases the hex.
pub fn normalize_checksum(raw: &str) -> String {
    let s = raw.trim();
    let s = s
        .strip_prefix("sha256:")
        .or_else(|| s.strip_prefix("SHA256:"))
        .unwrap_or(s);
    s.to_ascii_lowercase()
}

/// Exact comparison of two checksums after normalization. Never a prefix match.
pub fn checksums_match(actual: &str, expected: &str) -> bool {
    let expected = normalize_checksum(expected);
    !expected.is_empty() && normalize_checksum(actual) == expected
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Match,
    Mismatch { actual: String },
    Unreadable { message: String },
}

impl Verification {
    pub fn is_match(&self) -> bool {
        matches!(self, Verification::Match)
    }
}

/// Detailed form of [`verify`], keeping the actual digest for error reports.
pub async fn check(path: &Path, expected: &str) -> Verification {
    match digest_file(path).await {
        Ok(actual) if checksums_match(&actual, expected) => Verification::Match,
        Ok(actual) => Verification::Mismatch { actual },
        Err(e) => {
            tracing::debug!(
                target: "adminkit.integrity",
                path = %path.display(),
                error = %e,
                "artifact unreadable during verification"
            );
            Verification::Unreadable {
                message: e.to_string(),
            }
        }
    }
}

pub async fn verify(path: &Path, expected: &str) -> bool {
    check(path, expected).await.is_match()
}

#[cfg(test)]
mod tests {
    use super::*;

    // sha256("hello world")
    const HELLO: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn digest_bytes_is_lower_hex() {
        assert_eq!(digest_bytes(b"hello world"), HELLO);
    }

    #[test]
    fn comparison_is_exact_not_prefix() {
        assert!(checksums_match(HELLO, HELLO));
        assert!(checksums_match(HELLO, &HELLO.to_uppercase()));
        assert!(checksums_match(HELLO, &format!("sha256:{HELLO}")));
        assert!(!checksums_match(HELLO, &HELLO[..16]));
        assert!(!checksums_match(&HELLO[..16], HELLO));
        assert!(!checksums_match(HELLO, ""));
    }

    #[tokio::test]
    async fn verify_streams_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.sh");
        tokio::fs::write(&path, b"hello world").await.unwrap();

        assert!(verify(&path, HELLO).await);
        assert_eq!(
            check(&path, "00").await,
            Verification::Mismatch {
                actual: HELLO.to_string()
            }
        );
    }

    #[tokio::test]
    async fn missing_file_is_a_failure_not_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sh");

        assert!(!verify(&path, HELLO).await);
        assert!(matches!(
            check(&path, HELLO).await,
            Verification::Unreadable { .. }
        ));
    }
}
