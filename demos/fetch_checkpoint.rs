//! Example: Checkpoint Download With Integrity Verification
//!
//! Downloads a file to a local path, verifying a SHA-256 digest prefix when
//! one is given. Uses the blocking call shape; the async form composes the
//! same way inside a runtime.
//!
//! Run with:
//! ```bash
//! cargo run --example fetch_checkpoint -- <url> <dst> [sha256-prefix]
//! ```

use nn_interop::{download_url_to_file, file_sha256, init_logging, LogConfig};

fn main() {
    init_logging(&LogConfig::development());

    let mut args = std::env::args().skip(1);
    let (Some(url), Some(dst)) = (args.next(), args.next()) else {
        eprintln!("usage: fetch_checkpoint <url> <dst> [sha256-prefix]");
        std::process::exit(2);
    };
    let prefix = args.next();

    match download_url_to_file(&url, &dst, prefix.as_deref(), true) {
        Ok(()) => {
            let digest = file_sha256(&dst).expect("digest of downloaded file");
            println!("downloaded {url} -> {dst}");
            println!("sha256: {digest}");
        }
        Err(err) => {
            eprintln!("download failed: {err}");
            std::process::exit(1);
        }
    }
}
