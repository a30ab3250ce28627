//! Log store: frame-level access to a collection's log file.

use crate::error::{CoreError, CoreResult};
use crate::types::{Document, DocumentId};
use orbital_codec::{decode, retag, CodecError, FrameHeader, HEADER_SIZE};
use orbital_storage::{FileBackend, StagedReplace, StorageBackend};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// The stored document.
    pub document: Document,
    /// Whether the frame is flagged deleted.
    pub tombstone: bool,
    /// Total frame length including the header.
    pub frame_len: u64,
}

impl LogRecord {
    /// Returns the document's id, if it has a usable one.
    #[must_use]
    pub fn id(&self) -> Option<DocumentId> {
        DocumentId::of(&self.document)
    }
}

/// Frame-level access to a log file.
///
/// `LogStore` holds no state besides its backend: sizes and frames are read
/// from storage on every call.
#[derive(Debug)]
pub struct LogStore<B = FileBackend> {
    backend: B,
}

impl LogStore<FileBackend> {
    /// Opens the log at `path`, creating an empty file if none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn open(path: &Path, sync_writes: bool) -> CoreResult<Self> {
        let backend = FileBackend::open(path)?.with_sync_writes(sync_writes);
        Ok(Self { backend })
    }

    /// Returns the path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.backend.path()
    }
}

impl<B: StorageBackend> LogStore<B> {
    /// Wraps an existing backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the underlying backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Current size of the log in bytes; the offset of the next append.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be read.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Appends an encoded frame and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn append(&mut self, frame: &[u8]) -> CoreResult<u64> {
        let offset = self.backend.append(frame)?;
        debug!(offset, len = frame.len(), "appended frame");
        Ok(offset)
    }

    /// Overwrites bytes in place. The log size never changes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OffsetOutOfRange`] if the write would extend
    /// past the end of the log.
    pub fn overwrite(&mut self, offset: u64, bytes: &[u8]) -> CoreResult<()> {
        self.backend.write_at(offset, bytes)?;
        Ok(())
    }

    /// Flags the frame at `offset` as deleted, keeping its payload.
    ///
    /// Returns `false` if the frame was already a tombstone.
    ///
    /// # Errors
    ///
    /// Returns an error if no valid frame starts at `offset`.
    pub fn tombstone(&mut self, offset: u64) -> CoreResult<bool> {
        let frame = self.read_frame(offset)?;
        let header = FrameHeader::parse(&frame).map_err(|e| corrupt(offset, &e))?;
        if header.tombstone {
            return Ok(false);
        }

        let flagged = retag(&frame, true).map_err(|e| corrupt(offset, &e))?;
        self.overwrite(offset, &flagged)?;
        debug!(offset, "tombstoned frame");
        Ok(true)
    }

    /// Reads the raw bytes of the frame starting at `offset`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::OffsetOutOfRange`] if `offset` is at or past the end
    ///   of the log
    /// - [`CoreError::CorruptRecord`] if the header is invalid or the frame
    ///   runs past the end of the log
    pub fn read_frame(&self, offset: u64) -> CoreResult<Vec<u8>> {
        let size = self.size()?;
        if offset >= size {
            return Err(CoreError::OffsetOutOfRange {
                offset,
                len: HEADER_SIZE,
                size,
            });
        }
        if offset + HEADER_SIZE as u64 > size {
            return Err(CoreError::corrupt_record(offset, "truncated frame header"));
        }

        let header_bytes = self.backend.read_at(offset, HEADER_SIZE)?;
        let header = FrameHeader::parse(&header_bytes).map_err(|e| corrupt(offset, &e))?;
        let frame_len = header.frame_len();

        if offset + frame_len > size {
            return Err(CoreError::corrupt_record(
                offset,
                format!(
                    "frame of {frame_len} bytes runs past end of log ({} bytes left)",
                    size - offset
                ),
            ));
        }

        let len = usize::try_from(frame_len)
            .map_err(|_| CoreError::corrupt_record(offset, "frame too large"))?;
        Ok(self.backend.read_at(offset, len)?)
    }

    /// Reads and decodes the frame starting at `offset`.
    ///
    /// # Errors
    ///
    /// See [`read_frame`](Self::read_frame); additionally returns
    /// [`CoreError::CorruptRecord`] if the payload is not a JSON object.
    pub fn read_at(&self, offset: u64) -> CoreResult<LogRecord> {
        let frame = self.read_frame(offset)?;
        decode_record(offset, &frame)
    }

    /// Iterates over every frame from offset 0 to the end of the log.
    ///
    /// The iterator yields an error and then stops at the first frame that
    /// cannot be read.
    ///
    /// # Errors
    ///
    /// Returns an error if the log size cannot be read.
    pub fn scan(&self) -> CoreResult<LogScan<'_, B>> {
        Ok(LogScan {
            store: self,
            offset: 0,
            end: self.size()?,
            failed: false,
        })
    }

    /// Cuts the log back to `new_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` exceeds the current size.
    pub fn truncate(&mut self, new_size: u64) -> CoreResult<()> {
        self.backend.truncate(new_size)?;
        Ok(())
    }

    /// Forces written data to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.backend.sync()?;
        Ok(())
    }
}

impl<B: StagedReplace> LogStore<B> {
    /// Rewrites the log so it holds only the given live documents.
    ///
    /// `live` lists `(id, offset)` pairs; the frames are copied in that
    /// order with their flag forced to live. The new log is built in a
    /// staging area and swapped in atomically, so a failure at any point
    /// leaves the original log untouched.
    ///
    /// Returns the new offset of every id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IndexDesync`] if a listed frame does not hold
    /// the listed id, or an I/O error. The staging area is discarded on
    /// error.
    pub fn compact(&mut self, live: &[(DocumentId, u64)]) -> CoreResult<HashMap<DocumentId, u64>> {
        let mut staged = self.backend.stage()?;

        let copied = self.copy_live(&mut staged, live);
        let offsets = match copied {
            Ok(offsets) => offsets,
            Err(e) => {
                self.backend.discard_staging()?;
                return Err(e);
            }
        };

        if let Err(e) = self.backend.install(staged) {
            self.backend.discard_staging()?;
            return Err(e.into());
        }

        info!(records = offsets.len(), "log compacted");
        Ok(offsets)
    }

    /// Removes a staging area left behind by an interrupted compaction.
    ///
    /// Returns `true` if one was found.
    ///
    /// # Errors
    ///
    /// Returns an error if the leftover cannot be removed.
    pub fn discard_stale_staging(&self) -> CoreResult<bool> {
        let removed = self.backend.discard_staging()?;
        if removed {
            warn!("removed stale compaction staging file");
        }
        Ok(removed)
    }

    fn copy_live(
        &self,
        staged: &mut B,
        live: &[(DocumentId, u64)],
    ) -> CoreResult<HashMap<DocumentId, u64>> {
        let mut offsets = HashMap::with_capacity(live.len());

        for (id, offset) in live {
            let frame = self.read_frame(*offset)?;
            let record = decode_record(*offset, &frame)?;
            if record.id().as_ref() != Some(id) {
                return Err(CoreError::index_desync(
                    id.clone(),
                    *offset,
                    "frame holds a different document",
                ));
            }

            let frame = retag(&frame, false).map_err(|e| corrupt(*offset, &e))?;
            let new_offset = staged.append(&frame)?;
            offsets.insert(id.clone(), new_offset);
        }

        Ok(offsets)
    }
}

/// Iterator over the frames of a log, in offset order.
pub struct LogScan<'a, B> {
    store: &'a LogStore<B>,
    offset: u64,
    end: u64,
    failed: bool,
}

impl<B: StorageBackend> Iterator for LogScan<'_, B> {
    type Item = CoreResult<(u64, LogRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.end {
            return None;
        }

        let offset = self.offset;
        match self.store.read_at(offset) {
            Ok(record) => {
                self.offset += record.frame_len;
                Some(Ok((offset, record)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn decode_record(offset: u64, frame: &[u8]) -> CoreResult<LogRecord> {
    let (document, tombstone): (Document, bool) = decode(frame).map_err(|e| corrupt(offset, &e))?;
    Ok(LogRecord {
        document,
        tombstone,
        frame_len: frame.len() as u64,
    })
}

fn corrupt(offset: u64, err: &CodecError) -> CoreError {
    CoreError::corrupt_record(offset, err.to_string())
}
