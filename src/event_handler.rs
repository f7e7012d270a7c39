use std::{fmt::Display, path::Path};

/// Handler to receive notifications for events during the inspection.
///
/// All methods are optional.
#[expect(unused_variables)]
pub trait EventHandler {
    /// The image is going to be pulled by the [`ImageSource`](crate::ImageSource).
    fn image_pull(&self, reference: &str) {}

    /// The image was written to the transport archive in `path`.
    fn image_saved(&self, reference: &str, path: &Path) {}

    /// Start to extract an archive.
    ///
    /// `depth` is `0` for the transport archive, and it is incremented
    /// for every nested layer archive.
    fn archive_start(&self, path: &Path, depth: usize) {}

    /// All entries of the archive in `path` were extracted.
    ///
    /// `files` and `dirs` include the entries from nested archives.
    fn archive_finished(&self, path: &Path, files: usize, dirs: usize) {}

    /// An entry in the archive is skipped.
    ///
    /// For example, if its path escapes from the extraction root, or
    /// if it is a symbolic link.
    fn entry_skipped(&self, path: &Path, cause: &dyn Display) {}
}

/// [`EventHandler`] instance to ignore all events.
pub struct NoEventHandler;

impl EventHandler for NoEventHandler {}

impl<E: EventHandler + ?Sized> EventHandler for &E {
    fn image_pull(&self, reference: &str) {
        (**self).image_pull(reference)
    }

    fn image_saved(&self, reference: &str, path: &Path) {
        (**self).image_saved(reference, path)
    }

    fn archive_start(&self, path: &Path, depth: usize) {
        (**self).archive_start(path, depth)
    }

    fn archive_finished(&self, path: &Path, files: usize, dirs: usize) {
        (**self).archive_finished(path, files, dirs)
    }

    fn entry_skipped(&self, path: &Path, cause: &dyn Display) {
        (**self).entry_skipped(path, cause)
    }
}
