use std::{
    fmt,
    fs::{self, DirBuilder, File, OpenOptions},
    io::{self, BufRead, BufReader, Read},
    os::unix::fs::{DirBuilderExt, OpenOptionsExt},
    path::Path,
};

use crate::{fs::sanitize_path, EventHandler, Inventory};

use super::inspector::{try_io, InspectError};

/// Suffix of the nested archives with the contents of a layer.
const LAYER_SUFFIX: &str = "layer.tar";

/// Mode for directories created during the extraction.
const DIRECTORY_MODE: u32 = 0o750;

const GZIP_MAGIC: &[u8] = b"\x1f\x8b";

#[cfg(feature = "zstd")]
const ZSTD_MAGIC: &[u8] = b"\x28\xb5\x2f\xfd";

pub(crate) struct Context<'a, E> {
    pub root: &'a Path,
    pub max_file_size: u64,
    pub max_depth: usize,
    pub event_handler: &'a E,
}

impl<E: EventHandler> Context<'_, E> {
    /// Extract the tar archive in `archive` to the extraction root.
    ///
    /// Nested layer archives are extracted when they are found, and
    /// their entries are added to the returned inventory.
    pub fn extract(&self, archive: &Path) -> Result<Inventory, InspectError> {
        self.extract_nested(archive, &[])
    }

    /// `parents` are the archives that contain `archive`, from the
    /// outermost one. They are still open when `archive` is read.
    fn extract_nested(&self, archive: &Path, parents: &[&Path]) -> Result<Inventory, InspectError> {
        let depth = parents.len();

        if depth > self.max_depth {
            return Err(InspectError::NestingTooDeep {
                path: archive.to_owned(),
                limit: self.max_depth,
            });
        }

        tracing::info!(archive = %archive.display(), depth, "extracting archive");
        self.event_handler.archive_start(archive, depth);

        let file = try_io!(archive, File::open(archive));
        let reader = try_io!(archive, decompress(BufReader::new(file)));

        let mut tarball = tar::Archive::new(reader);
        let mut inventory = Inventory::default();

        for entry in try_io!(archive, tarball.entries()) {
            let entry = try_io!(archive, entry);
            self.unpack(archive, parents, entry, &mut inventory)?;
        }

        self.event_handler
            .archive_finished(archive, inventory.files.len(), inventory.dirs.len());

        Ok(inventory)
    }

    fn unpack(
        &self,
        archive: &Path,
        parents: &[&Path],
        mut entry: tar::Entry<impl Read>,
        inventory: &mut Inventory,
    ) -> Result<(), InspectError> {
        let name = try_io!(archive, entry.path()).into_owned();

        let target = match sanitize_path(self.root, &name) {
            Ok(target) => target,

            Err(err) => {
                tracing::warn!(entry = %name.display(), "ignoring entry: {err}");
                self.event_handler.entry_skipped(&name, &err);
                return Ok(());
            }
        };

        // Writing over an archive would corrupt the stream being read.
        if target == archive || parents.contains(&target.as_path()) {
            self.skip(&name, &"entry replaces an archive being extracted");
            return Ok(());
        }

        match entry.header().entry_type() {
            tar::EntryType::Directory => {
                if !target.is_dir() {
                    if target.exists() {
                        self.skip(&name, &"directory conflicts with an existing file");
                        return Ok(());
                    }

                    try_io!(&target, create_dir(&target));
                }

                tracing::debug!(path = %target.display(), "directory");
                inventory.dirs.push(target);
            }

            tar::EntryType::Regular => {
                self.unpack_regular(&target, &mut entry)?;

                if is_layer(&target) {
                    let mut chain = parents.to_vec();
                    chain.push(archive);

                    let layer = self.extract_nested(&target, &chain)?;
                    inventory.append(layer);
                } else {
                    tracing::debug!(path = %target.display(), "file");
                    inventory.files.push(target);
                }
            }

            other => {
                self.skip(&name, &format!("unsupported entry type: {other:?}"));
            }
        }

        Ok(())
    }

    fn skip(&self, name: &Path, cause: &dyn fmt::Display) {
        tracing::debug!(entry = %name.display(), "ignoring entry: {cause}");
        self.event_handler.entry_skipped(name, cause);
    }

    /// Write the contents of a regular file to `target`.
    ///
    /// If the size of the file exceeds `max_file_size`, the file is
    /// removed and the extraction is aborted.
    fn unpack_regular(
        &self,
        target: &Path,
        entry: &mut tar::Entry<impl Read>,
    ) -> Result<(), InspectError> {
        let too_large = || InspectError::FileTooLarge {
            path: target.to_owned(),
            limit: self.max_file_size,
        };

        if entry.size() > self.max_file_size {
            return Err(too_large());
        }

        if let Some(parent) = target.parent() {
            if !parent.exists() {
                try_io!(parent, create_dir(parent));
            }
        }

        let mode = try_io!(target, entry.header().mode()) & 0o7777;

        let mut output = try_io!(
            target,
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(mode)
                .open(target)
        );

        // Read one more byte than the limit to detect truncated copies.
        let result = io::copy(&mut entry.take(self.max_file_size + 1), &mut output);
        drop(output);

        match result {
            Ok(n) if n <= self.max_file_size => Ok(()),

            Ok(_) => {
                discard(target);
                Err(too_large())
            }

            Err(e) => {
                discard(target);
                Err(InspectError::Io(e, target.to_owned()))
            }
        }
    }
}

/// Return `true` if `path` is the name of a nested layer archive.
fn is_layer(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(LAYER_SUFFIX))
}

fn create_dir(path: &Path) -> io::Result<()> {
    DirBuilder::new()
        .recursive(true)
        .mode(DIRECTORY_MODE)
        .create(path)
}

/// Remove a partially written file.
fn discard(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        tracing::warn!(path = %path.display(), "failed to remove partial file: {err}");
    }
}

/// Detect if the stream is compressed, and wrap it with a decoder.
fn decompress<'a, R>(mut reader: R) -> io::Result<Box<dyn Read + 'a>>
where
    R: BufRead + 'a,
{
    let magic = reader.fill_buf()?;

    if magic.starts_with(GZIP_MAGIC) {
        return Ok(Box::new(flate2::bufread::GzDecoder::new(reader)));
    }

    #[cfg(feature = "zstd")]
    if magic.starts_with(ZSTD_MAGIC) {
        return Ok(Box::new(zstd::stream::read::Decoder::with_buffer(reader)?));
    }

    Ok(Box::new(reader))
}
