//! Page store: page-level I/O over the single backing file.

use meridian_common::page::{PageId, PAGE_SIZE};
use meridian_common::{MeridianError, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Configuration for the page store.
#[derive(Debug, Clone)]
pub struct PageStoreConfig {
    /// Path to the backing file.
    pub path: PathBuf,
    /// Enable fsync after writes.
    pub fsync_enabled: bool,
}

impl PageStoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fsync_enabled: true,
        }
    }
}

/// Reads and writes pages of the single backing file.
///
/// Page `N` occupies bytes `[N * PAGE_SIZE, (N + 1) * PAGE_SIZE)`.
/// Writing past the current end zero-extends the file, so the length
/// is always a multiple of `PAGE_SIZE` after a flush.
pub struct PageStore {
    inner: Mutex<StoreInner>,
    path: PathBuf,
    fsync_enabled: bool,
}

struct StoreInner {
    file: File,
    /// Number of pages currently in the file.
    num_pages: u32,
}

impl PageStore {
    /// Opens or creates the backing file.
    pub fn open(config: PageStoreConfig) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&config.path)?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as u32;

        Ok(Self {
            inner: Mutex::new(StoreInner { file, num_pages }),
            path: config.path,
            fsync_enabled: config.fsync_enabled,
        })
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of pages currently in the file.
    pub fn num_pages(&self) -> u32 {
        self.inner.lock().num_pages
    }

    /// Reads a page from disk.
    pub fn read_page(&self, page_id: PageId) -> Result<[u8; PAGE_SIZE]> {
        let mut inner = self.inner.lock();

        if page_id.0 >= inner.num_pages {
            return Err(MeridianError::PageOutOfBounds { page_id: page_id.0 });
        }

        inner.file.seek(SeekFrom::Start(page_id.file_offset()))?;

        let mut buffer = [0u8; PAGE_SIZE];
        inner.file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    /// Writes a page to disk, extending the file if necessary.
    pub fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        let mut inner = self.inner.lock();

        // Zero-fill any gap so the file stays a dense page array.
        if page_id.0 > inner.num_pages {
            inner
                .file
                .set_len(page_id.0 as u64 * PAGE_SIZE as u64)?;
        }

        inner.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        inner.file.write_all(data)?;

        if self.fsync_enabled {
            inner.file.sync_all()?;
        }

        if page_id.0 >= inner.num_pages {
            inner.num_pages = page_id.0 + 1;
        }

        Ok(())
    }

    /// Flushes all pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.inner.lock().file.sync_all()?;
        Ok(())
    }
}

impl Drop for PageStore {
    fn drop(&mut self) {
        let _ = self.inner.lock().file.sync_all();
    }
}
