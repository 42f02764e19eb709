//! Whole-file byte access with optional memory mapping
//!
//! With the `io-mmap` feature, files above [`MIN_MMAP_SIZE`] are memory
//! mapped; everything else (and every platform without support) falls back to
//! a single buffered read.

#[cfg(feature = "io-mmap")]
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::Path;
use voxcrate_core::{Error, Result};

/// Files smaller than this are read into memory; mapping overhead dominates
pub const MIN_MMAP_SIZE: u64 = 64 * 1024;

/// Contents of a file, either mapped or owned
pub enum FileBytes {
    #[cfg(feature = "io-mmap")]
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl FileBytes {
    /// Open `path` and expose its full contents
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| Error::file_access(path, e))?;
        let len = file
            .metadata()
            .map_err(|e| Error::file_access(path, e))?
            .len();

        #[cfg(feature = "io-mmap")]
        {
            if is_supported() && len >= MIN_MMAP_SIZE {
                // Safety: read-only mapping; files under objects/ are not rewritten during a run.
                if let Ok(mmap) = unsafe { Mmap::map(&file) } {
                    return Ok(FileBytes::Mapped(mmap));
                }
            }
        }

        let mut buffer = Vec::with_capacity(len as usize);
        file.read_to_end(&mut buffer)
            .map_err(|e| Error::file_access(path, e))?;
        Ok(FileBytes::Buffered(buffer))
    }

    pub fn is_mapped(&self) -> bool {
        match self {
            #[cfg(feature = "io-mmap")]
            FileBytes::Mapped(_) => true,
            FileBytes::Buffered(_) => false,
        }
    }
}

impl Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            #[cfg(feature = "io-mmap")]
            FileBytes::Mapped(mmap) => &mmap[..],
            FileBytes::Buffered(buffer) => &buffer[..],
        }
    }
}

/// Check if memory mapping is supported on this platform
pub fn is_supported() -> bool {
    cfg!(all(feature = "io-mmap", any(unix, windows)))
}
