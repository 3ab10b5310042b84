//! The ledger writer: exclusive, append-only, crash-consistent (§4.6).

use crate::envelope::{Envelope, SigningSurface};
use crate::error::GefError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// What recovery found when [`LedgerWriter::open`] scanned an existing file.
#[derive(Debug, Default)]
pub struct RecoveredState {
    /// The last entry's `sequence`, or `None` for an empty ledger.
    pub last_sequence: Option<u64>,
    /// The canonical signing-surface bytes of the last entry, needed to
    /// compute the next `causal_hash`.
    pub last_canonical_bytes: Option<Vec<u8>>,
    /// Whether the final line in the file failed to parse. Per §4.6 this
    /// must never invalidate any preceding entry — it is reported here, not
    /// propagated as an error.
    pub trailing_partial_line: bool,
}

/// Owns exclusive write access to one ledger file for its entire lifetime.
///
/// Only one [`LedgerWriter`] may hold the file open at a time; on platforms
/// with advisory locks (`fs2`) this is enforced with
/// [`FileExt::lock_exclusive`], taken before the recovery scan and held
/// until the OS closes the file descriptor on drop. Readers (the replay
/// engine) may open the same file concurrently and must tolerate a trailing
/// partial line, exactly as this writer does.
pub struct LedgerWriter {
    file: File,
}

impl LedgerWriter {
    /// Opens `path` for appending, creating it if it does not exist, and
    /// recovers `(last_sequence, last_canonical_bytes)` by scanning it once.
    ///
    /// # Errors
    ///
    /// Returns [`GefError::Io`] if the file cannot be created, opened,
    /// locked, or read, or if a line before the final one fails to parse
    /// (which indicates corruption the writer did not itself produce, since
    /// only the final line of a crash-interrupted write is tolerated).
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, RecoveredState), GefError> {
        let path = path.as_ref();
        if !path.exists() {
            File::create(path)?;
        }

        let file = OpenOptions::new().append(true).read(true).open(path)?;
        file.lock_exclusive()?;

        let recovered = recover(path)?;
        Ok((Self { file }, recovered))
    }

    /// Appends one envelope as a single JSON line terminated by `\n`, in one
    /// write call (§4.6: "append the line plus a single `\n` as one write
    /// call").
    ///
    /// # Errors
    ///
    /// Returns [`GefError::Serialize`] if the envelope cannot be serialized,
    /// or [`GefError::Io`] if the write fails.
    pub fn append_line(&mut self, envelope: &Envelope) -> Result<(), GefError> {
        let mut line = serde_json::to_string(envelope)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Flushes and `fsync`s the file. Callers requiring durability must call
    /// this; plain writes are flushed but not necessarily synced to disk.
    ///
    /// # Errors
    ///
    /// Returns [`GefError::Io`] if the flush or sync fails.
    pub fn sync(&mut self) -> Result<(), GefError> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

fn recover(path: &Path) -> Result<RecoveredState, GefError> {
    let reader = BufReader::new(File::open(path)?);
    let lines: Vec<String> = reader.lines().collect::<std::io::Result<_>>()?;

    let mut state = RecoveredState::default();
    let last_index = lines.len().saturating_sub(1);

    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Envelope>(line) {
            Ok(envelope) => {
                let canon = gef_canon::canonicalize_value(&envelope.signing_surface_value())
                    .map_err(|e| {
                        std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            format!("recovered entry does not canonicalize: {e}"),
                        )
                    })?;
                state.last_sequence = Some(envelope.unsigned.sequence);
                state.last_canonical_bytes = Some(canon);
                state.trailing_partial_line = false;
            }
            Err(_) if i == last_index => {
                state.trailing_partial_line = true;
            }
            Err(e) => {
                return Err(GefError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("malformed ledger line {i} before end of file: {e}"),
                )));
            }
        }
    }

    Ok(state)
}
