/// Open image files and decompression scratch files

use log::{debug, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

static SCRATCH_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Attempts made to find an unused scratch file name
const SCRATCH_ATTEMPTS: u32 = 64;

/// Deletes a scratch file when dropped
#[derive(Debug)]
struct ScratchPath(PathBuf);

impl Drop for ScratchPath {
    fn drop(&mut self) {
        match fs::remove_file(&self.0) {
            Ok(()) => debug!("Removed scratch file {}", self.0.display()),
            Err(e) => warn!("Could not remove scratch file {}: {}", self.0.display(), e),
        }
    }
}

/// An open disk image
///
/// Owns the file for as long as the image is mounted. Handles created with
/// [`ImageHandle::scratch`] delete their backing file when dropped.
#[derive(Debug)]
pub struct ImageHandle {
    file: File,
    // Declared after `file` so the file is closed before it is removed
    scratch: Option<ScratchPath>,
}

impl ImageHandle {
    /// Open an existing image, for writing too if `writable`
    pub fn open<P: AsRef<Path>>(path: P, writable: bool) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(writable).open(path)?;
        Ok(ImageHandle {
            file,
            scratch: None,
        })
    }

    /// Create a fresh, empty scratch file in the system temp directory
    pub fn scratch() -> io::Result<Self> {
        let dir = std::env::temp_dir();

        for _ in 0..SCRATCH_ATTEMPTS {
            let n = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
            let path = dir.join(format!("atrsio-{}-{}.tmp", std::process::id(), n));

            match OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(file) => {
                    debug!("Created scratch file {}", path.display());
                    return Ok(ImageHandle {
                        file,
                        scratch: Some(ScratchPath(path)),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }

        Err(io::Error::new(
            ErrorKind::AlreadyExists,
            "no free scratch file name",
        ))
    }

    /// Whether this handle is backed by a scratch file
    pub fn is_scratch(&self) -> bool {
        self.scratch.is_some()
    }

    /// Path of the scratch file, if any
    pub fn scratch_path(&self) -> Option<&Path> {
        self.scratch.as_ref().map(|s| s.0.as_path())
    }

    /// Current length of the image in bytes
    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Whether the image is empty
    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Read up to `buf.len()` bytes at `offset`, returning the count read
    ///
    /// A short count means the image ended first.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Write all of `data` at `offset`
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.file.flush()
    }

    /// Rewind and borrow the file as a reader
    pub fn rewound(&mut self) -> io::Result<&mut File> {
        self.file.seek(SeekFrom::Start(0))?;
        Ok(&mut self.file)
    }
}
