//! Binary event-stream files: a buffered reader for the driver and a small
//! writer for tooling.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use super::constants::EVENT_HEADER_SIZE;
use super::error::EventFileError;
use super::event::{Event, EventHeader};

/// Streams events out of anything readable.
///
/// A malformed payload surfaces as [`EventFileError::BadEvent`] with the
/// stream already positioned at the next record, so callers can skip the
/// event and keep reading.
#[derive(Debug)]
pub struct EventReader<R: Read> {
    reader: R,
    events_read: u64,
    bytes_read: u64,
}

impl EventReader<BufReader<File>> {
    /// Open an event file on disk.
    pub fn open(path: &Path) -> Result<Self, EventFileError> {
        if !path.exists() {
            return Err(EventFileError::BadFilePath(path.to_path_buf()));
        }
        Ok(EventReader::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read> EventReader<R> {
    pub fn new(reader: R) -> Self {
        EventReader {
            reader,
            events_read: 0,
            bytes_read: 0,
        }
    }

    /// Events successfully returned so far.
    pub fn events_read(&self) -> u64 {
        self.events_read
    }

    /// Stream bytes consumed so far, malformed records included.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Read the next event. `Ok(None)` at a clean end of stream.
    pub fn next_event(&mut self) -> Result<Option<Event>, EventFileError> {
        let mut header_buf = [0u8; EVENT_HEADER_SIZE];
        let mut filled = 0;
        while filled < EVENT_HEADER_SIZE {
            let n = self.reader.read(&mut header_buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled < EVENT_HEADER_SIZE {
            return Err(EventFileError::TruncatedRecord);
        }

        let header = EventHeader::from_bytes(&header_buf);
        let mut payload = vec![0u8; header.data_size as usize];
        self.reader.read_exact(&mut payload).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                EventFileError::TruncatedRecord
            } else {
                EventFileError::IOError(e)
            }
        })?;
        self.bytes_read += (EVENT_HEADER_SIZE + payload.len()) as u64;

        match Event::parse(header, &payload) {
            Ok(event) => {
                self.events_read += 1;
                Ok(Some(event))
            }
            Err(source) => Err(EventFileError::BadEvent {
                serial: header.serial,
                source,
            }),
        }
    }
}

/// Writes events back out in the same wire format.
#[derive(Debug)]
pub struct EventWriter<W: Write> {
    writer: W,
}

impl EventWriter<BufWriter<File>> {
    /// Create an event file on disk.
    pub fn create(path: &Path) -> Result<Self, EventFileError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(EventFileError::BadFilePath(PathBuf::from(parent)));
            }
        }
        Ok(EventWriter::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> EventWriter<W> {
    pub fn new(writer: W) -> Self {
        EventWriter { writer }
    }

    pub fn write_event(&mut self, event: &Event) -> Result<(), EventFileError> {
        self.writer.write_all(&event.to_bytes())?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), EventFileError> {
        self.writer.flush()?;
        Ok(())
    }
}
