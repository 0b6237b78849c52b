// SPDX-License-Identifier: MIT
// Copyright 2026 nn-interop contributors

//! Checkpoint download with integrity verification.
//!
//! Model weights are fetched over plain HTTP(S) GET and streamed straight
//! to the destination file; the payload is never buffered in memory. When a
//! SHA-256 prefix is supplied, the finished file's digest must start with it
//! or [`Error::IntegrityMismatch`] is raised. The file stays on disk in
//! that case and callers must treat it as untrusted until the check passes.
//!
//! The operation is implemented once, asynchronously;
//! [`download_url_to_file`] is a thin blocking adapter that spins up a
//! current-thread runtime and re-raises the inner error unchanged. There is
//! no cancellation token and no timeout: a hung remote hangs the operation,
//! a known limitation of this surface.
//!
//! Progress reporting is real but unobtrusive: when enabled, a structured
//! `tracing` event per received chunk under the `nn_interop::hub` target,
//! not a terminal bar.

use crate::error::{Error, Result};
use crate::logging::log_download_progress;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Download `url` into `dst`, optionally verifying a SHA-256 digest prefix.
///
/// Asynchronous form; may be awaited directly or composed with other
/// concurrent work.
///
/// # Errors
///
/// - [`Error::TransferFailed`] when the endpoint answers with a non-success
///   status; the destination file is not created or overwritten.
/// - [`Error::IntegrityMismatch`] when `hash_prefix` is given and the
///   downloaded file's lowercase-hex SHA-256 does not start with it; the
///   file is already on disk.
/// - [`Error::Http`] / [`Error::Io`] for transport and file failures.
pub async fn download_url_to_file_async(
    url: &str,
    dst: impl AsRef<Path>,
    hash_prefix: Option<&str>,
    progress: bool,
) -> Result<()> {
    let dst = dst.as_ref();

    let mut response = reqwest::get(url).await?;
    let status = response.status();
    if !status.is_success() {
        // Fail before touching the destination path.
        return Err(Error::TransferFailed {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let total = response.content_length();
    let mut file = tokio::fs::File::create(dst).await?;
    let mut downloaded: u64 = 0;

    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        if progress {
            log_download_progress(url, downloaded, total);
        }
    }
    file.flush().await?;
    drop(file);

    tracing::info!(
        target: "nn_interop::hub",
        url,
        bytes = downloaded,
        dst = %dst.display(),
        "download complete"
    );

    if let Some(prefix) = hash_prefix {
        let digest = file_sha256(dst)?;
        if !digest.starts_with(prefix) {
            return Err(Error::IntegrityMismatch {
                expected: prefix.to_string(),
                actual: digest,
            });
        }
    }
    Ok(())
}

/// Blocking form of [`download_url_to_file_async`].
///
/// Builds a private current-thread runtime and blocks on the async
/// operation, propagating its error without wrapping. Must not be called
/// from inside an async runtime; use the async form there.
///
/// # Errors
///
/// Same conditions as [`download_url_to_file_async`].
pub fn download_url_to_file(
    url: &str,
    dst: impl AsRef<Path>,
    hash_prefix: Option<&str>,
    progress: bool,
) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(download_url_to_file_async(url, dst, hash_prefix, progress))
}

/// Compute a file's SHA-256 digest as lowercase hexadecimal.
///
/// Streams the file through the hasher in filesystem-sized chunks.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file cannot be read.
pub fn file_sha256(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    let digest = hasher.finalize();
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}
