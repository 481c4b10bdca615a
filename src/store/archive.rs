//! Whole-set transfer: zip export/import and loading a directory tree.

use super::{FileStore, StoreError, UploadOutcome};
use crate::security::NameRules;
use std::fs;
use std::io::{Read, Seek, Write};
use std::path::Path;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

impl FileStore {
    /// Write every file into a zip archive as `<name>.<extension>`
    pub fn export_archive<W: Write + Seek>(
        &self,
        writer: W,
        extension: &str,
    ) -> Result<W, StoreError> {
        let mut zip = ZipWriter::new(writer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in self.entries() {
            zip.start_file(NameRules::with_extension(&entry.name, extension), options)?;
            zip.write_all(entry.content.as_bytes())?;
        }

        let writer = zip.finish()?;
        tracing::info!(files = self.len(), "archive exported");
        Ok(writer)
    }

    /// Upload every file in a zip archive, in archive order
    pub fn import_archive<R: Read + Seek>(
        &mut self,
        reader: R,
        mut confirm: impl FnMut(&str) -> bool,
    ) -> Result<Vec<(String, UploadOutcome)>, StoreError> {
        let mut archive = ZipArchive::new(reader)?;
        let mut outcomes = Vec::new();

        // refuse the whole archive before importing any of it
        for i in 0..archive.len() {
            let file = archive.by_index_raw(i)?;
            if !file.is_dir() {
                self.check_declared_size(file.size())?;
            }
        }

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;

            // Skip directories
            if file.is_dir() {
                continue;
            }

            let file_name = file.name().to_string();
            // the header may understate the size; never read past the limit
            let mut contents = Vec::new();
            file.by_ref()
                .take(self.limits.max_file_size.saturating_add(1))
                .read_to_end(&mut contents)?;

            let outcome = self.upload(&file_name, &contents, |key| confirm(key))?;
            outcomes.push((file_name, outcome));
        }

        tracing::info!(files = outcomes.len(), "archive imported");
        Ok(outcomes)
    }

    /// Upload every regular file below `dir`, skipping hidden entries
    pub fn load_dir(
        &mut self,
        dir: &Path,
        mut confirm: impl FnMut(&str) -> bool,
    ) -> Result<Vec<(String, UploadOutcome)>, StoreError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
        {
            let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let metadata = entry.metadata().map_err(|e| StoreError::Io(e.into()))?;
            self.check_declared_size(metadata.len())?;
            files.push(entry);
        }

        let mut outcomes = Vec::new();
        for entry in files {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let bytes = fs::read(entry.path())?;
            let outcome = self.upload(&file_name, &bytes, |key| confirm(key))?;
            outcomes.push((file_name, outcome));
        }

        tracing::info!(dir = %dir.display(), files = outcomes.len(), "directory loaded");
        Ok(outcomes)
    }

    /// Reject an entry by its size on disk or in the archive header
    fn check_declared_size(&self, size: u64) -> Result<(), StoreError> {
        let max = self.limits.max_file_size;
        if size > max {
            return Err(StoreError::FileTooLarge { size, max });
        }
        Ok(())
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}
