use std::{
    cell::RefCell,
    fmt::Display,
    path::{Path, PathBuf},
};

use image_inspect::EventHandler;

/// [`EventHandler`] to collect the notifications received during a test.
#[derive(Default)]
pub struct Recorder {
    pub skipped: RefCell<Vec<(PathBuf, String)>>,
    pub archives: RefCell<Vec<(PathBuf, usize)>>,
    pub saved: RefCell<Vec<PathBuf>>,
}

impl EventHandler for Recorder {
    fn image_saved(&self, _: &str, path: &Path) {
        self.saved.borrow_mut().push(path.to_owned());
    }

    fn archive_start(&self, path: &Path, depth: usize) {
        self.archives.borrow_mut().push((path.to_owned(), depth));
    }

    fn entry_skipped(&self, path: &Path, cause: &dyn Display) {
        self.skipped
            .borrow_mut()
            .push((path.to_owned(), cause.to_string()));
    }
}
