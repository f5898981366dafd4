//! Persisted snapshot of the whole index set.
//!
//! Layout: one JSON header line, then the JSON payload.
//!
//! ```text
//! {"version":1,"fingerprint":"<sha256>","checksum":<crc32>,"payload_len":<bytes>}
//! {...IndexSet...}
//! ```
//!
//! The fingerprint covers the four source streams and the index config, so a
//! snapshot built from different data or settings is never reused.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::IndexConfig;
use crate::errors::{MatchError, MatchResult};
use crate::indexer::parser::{LANG_FILE, REPOS_FILE, TEST_FILE, WATCH_FILE};
use crate::indexer::pipeline::IndexSet;

pub const SNAPSHOT_VERSION: u32 = 1;
pub const SNAPSHOT_FILE: &str = "index.snapshot";

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotHeader {
    version: u32,
    fingerprint: String,
    checksum: u32,
    payload_len: u64,
}

/// SHA-256 over the source streams (missing ones included as such) and the config.
pub fn source_fingerprint(data_dir: &Path, config: &IndexConfig) -> MatchResult<String> {
    let mut hasher = Sha256::new();
    for name in [WATCH_FILE, REPOS_FILE, LANG_FILE, TEST_FILE] {
        hasher.update(name.as_bytes());
        let path = data_dir.join(name);
        match File::open(&path) {
            Ok(mut file) => {
                hasher.update(b"\x01");
                io::copy(&mut file, &mut hasher)?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => hasher.update(b"\x00"),
            Err(e) => return Err(e.into()),
        }
    }
    hasher.update(serde_json::to_vec(config)?);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Write `set` to `path` through a temporary sibling file, then rename.
pub fn store(path: &Path, fingerprint: &str, set: &IndexSet) -> MatchResult<()> {
    let payload = serde_json::to_vec(set)?;
    let header = SnapshotHeader {
        version: SNAPSHOT_VERSION,
        fingerprint: fingerprint.to_string(),
        checksum: crc32fast::hash(&payload),
        payload_len: payload.len() as u64,
    };

    let tmp = path.with_extension("snapshot.tmp");
    let written = (|| -> MatchResult<()> {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut writer, &header)?;
        writer.write_all(b"\n")?;
        writer.write_all(&payload)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    })();
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)?;
    debug!(bytes = payload.len(), "snapshot written to {}", path.display());
    Ok(())
}

/// Restore an index set, rejecting version, fingerprint, or checksum mismatches.
pub fn load(path: &Path, fingerprint: &str) -> MatchResult<IndexSet> {
    let bytes = fs::read(path)?;
    let split = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| MatchError::Snapshot("missing header line".into()))?;
    let header: SnapshotHeader = serde_json::from_slice(&bytes[..split])
        .map_err(|e| MatchError::Snapshot(format!("unreadable header: {e}")))?;
    let payload = &bytes[split + 1..];

    if header.version != SNAPSHOT_VERSION {
        return Err(MatchError::Snapshot(format!(
            "version {} does not match {}",
            header.version, SNAPSHOT_VERSION
        )));
    }
    if header.fingerprint != fingerprint {
        return Err(MatchError::Snapshot("source data changed since snapshot".into()));
    }
    if header.payload_len != payload.len() as u64 || header.checksum != crc32fast::hash(payload) {
        return Err(MatchError::Snapshot("payload is truncated or corrupt".into()));
    }
    serde_json::from_slice(payload)
        .map_err(|e| MatchError::Snapshot(format!("unreadable payload: {e}")))
}
