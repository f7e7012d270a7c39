use std::{
    io,
    path::{Path, PathBuf},
};

use sha2::Digest as _;

use crate::{
    acquire::{AcquireError, ImageSource},
    digest::HexString,
    extractor,
    fs::{clean_path, PathTraversal},
    manifest,
    reference::{self, Reference},
    EventHandler, ImageAttributes, ImageDescription, Inventory, NoEventHandler,
};

/// Default limit for the size of a single file in the archive.
const DEFAULT_MAX_FILE_SIZE: u64 = 200_000_000;

/// Default limit for nested layer archives.
const DEFAULT_MAX_DEPTH: usize = 8;

/// Error type for the [`Recommender`] implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(thiserror::Error, Debug)]
pub enum InspectError {
    #[error("Invalid image reference: {0}")]
    InvalidReference(#[from] reference::ParseError),

    #[error("Failed to get the image: {0}")]
    Acquire(#[from] AcquireError),

    #[error("I/O error in {1}: {0}")]
    Io(io::Error, PathBuf),

    #[error("File {path} is larger than {limit} bytes.")]
    FileTooLarge { path: PathBuf, limit: u64 },

    #[error("Archive {path} is nested in more than {limit} archives.")]
    NestingTooDeep { path: PathBuf, limit: usize },

    #[error("Expected one manifest.json, found {0}.")]
    ManifestFiles(usize),

    #[error("Expected one record in manifest.json, found {0}.")]
    ManifestRecords(usize),

    #[error("Invalid JSON in {path}: {source}")]
    Metadata {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid config path: {0}")]
    InvalidConfigPath(PathTraversal),

    #[error("Missing architecture or OS in {0}.")]
    MissingPlatform(PathBuf),

    #[error("Invalid digest for {path}. Expected {expected}, got {actual}.")]
    ConfigDigest {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Recommendation failed: {0}")]
    Recommend(BoxError),
}

/// Classification of an [`InspectError`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The image can't be pulled or saved.
    Acquisition,

    /// The archive can't be read, or it exceeds the limits.
    ArchiveRead,

    /// The number of manifest files, or records in the manifest, is
    /// not exactly one.
    ManifestCardinality,

    /// Manifest or config files are invalid.
    MetadataParse,

    /// Error from the [`Recommender`].
    Recommendation,
}

impl InspectError {
    pub fn kind(&self) -> ErrorKind {
        use InspectError::*;

        match self {
            InvalidReference(_) | Acquire(_) => ErrorKind::Acquisition,
            Io(..) | FileTooLarge { .. } | NestingTooDeep { .. } => ErrorKind::ArchiveRead,
            ManifestFiles(_) | ManifestRecords(_) => ErrorKind::ManifestCardinality,
            Metadata { .. } | InvalidConfigPath(_) | MissingPlatform(_) | ConfigDigest { .. } => {
                ErrorKind::MetadataParse
            }
            Recommend(_) => ErrorKind::Recommendation,
        }
    }
}

macro_rules! try_io {
    ($path:expr, $e:expr $(,)?) => {
        $e.map_err(|e| {
            $crate::inspector::InspectError::Io(::std::io::Error::from(e), $path.into())
        })?
    };
}

// Make visible to mods.
pub(crate) use try_io;

/// Receiver of the images described by an [`Inspector`].
pub trait Recommender {
    fn recommend(&mut self, image: &ImageDescription) -> Result<(), BoxError>;
}

impl<F> Recommender for F
where
    F: FnMut(&ImageDescription) -> Result<(), BoxError>,
{
    fn recommend(&mut self, image: &ImageDescription) -> Result<(), BoxError> {
        self(image)
    }
}

/// Extract container images, and build an [`ImageDescription`] for them.
///
/// All files are written in the extraction root. The root is not removed
/// after the inspection, and it must be empty before inspecting a new
/// image. Otherwise, the manifest of a previous image may be found.
///
/// # Examples
///
/// ```no_run
/// # use image_inspect::*;
/// let mut recommender = |image: &ImageDescription| {
///     println!("{} {:?}", image.name, image.repo_tags);
///     Ok::<_, BoxError>(())
/// };
///
/// let image = Inspector::new("/tmp/scratch")
///     .max_file_size(1 << 30)
///     .inspect("debian:stable", &DockerCli::new(), &mut recommender)
///     .unwrap();
///
/// assert_eq!(image.os, "linux");
/// ```
pub struct Inspector<E = NoEventHandler> {
    root: PathBuf,
    max_file_size: u64,
    max_depth: usize,
    event_handler: E,
}

impl Inspector {
    /// Create an inspector to extract images in `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Inspector {
            root: root.into(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
            event_handler: NoEventHandler,
        }
    }
}

impl<E: EventHandler> Inspector<E> {
    /// Maximum size, in bytes, of a file in the archive.
    ///
    /// Default is 200 MB.
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Maximum number of nested layer archives.
    ///
    /// Default is 8.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Handler to receive notifications during the inspection.
    pub fn event_handler<H: EventHandler>(self, event_handler: H) -> Inspector<H> {
        Inspector {
            root: self.root,
            max_file_size: self.max_file_size,
            max_depth: self.max_depth,
            event_handler,
        }
    }

    /// Extraction root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Extract the tar archive in `archive`, including the nested layer
    /// archives.
    ///
    /// The extraction root is created if it does not exist.
    pub fn extract(&self, archive: &Path) -> Result<Inventory, InspectError> {
        let root = self.absolute_root()?;

        let context = extractor::Context {
            root: &root,
            max_file_size: self.max_file_size,
            max_depth: self.max_depth,
            event_handler: &self.event_handler,
        };

        context.extract(archive)
    }

    /// Read the manifest and config files found in `inventory`.
    pub fn resolve(&self, inventory: &Inventory) -> Result<ImageAttributes, InspectError> {
        manifest::resolve(&self.absolute_root()?, inventory)
    }

    /// Extract the image saved in `archive`, and read its attributes.
    pub fn inspect_archive(
        &self,
        name: &str,
        archive: &Path,
    ) -> Result<ImageDescription, InspectError> {
        let inventory = self.extract(archive)?;
        let attributes = self.resolve(&inventory)?;

        tracing::info!(
            image = name,
            files = inventory.files.len(),
            dirs = inventory.dirs.len(),
            "image inspected"
        );

        Ok(ImageDescription::new(name, inventory, attributes))
    }

    /// Get the image from `source`, extract it, and send its description
    /// to `recommender`.
    ///
    /// The transport archive is written in the extraction root.
    pub fn inspect(
        &self,
        name: &str,
        source: &impl ImageSource,
        recommender: &mut impl Recommender,
    ) -> Result<ImageDescription, InspectError> {
        let reference = Reference::try_from(name)?;

        tracing::info!(image = name, "pulling image");
        self.event_handler.image_pull(name);
        source.pull(&reference)?;

        let root = self.absolute_root()?;
        let archive = root.join(archive_name(name));
        source.save(&reference, &archive)?;

        tracing::info!(image = name, archive = %archive.display(), "image saved");
        self.event_handler.image_saved(name, &archive);

        let image = self.inspect_archive(name, &archive)?;

        recommender
            .recommend(&image)
            .map_err(InspectError::Recommend)?;

        Ok(image)
    }

    /// Create the extraction root, and return its absolute path, without
    /// `.` or `..` components.
    fn absolute_root(&self) -> Result<PathBuf, InspectError> {
        try_io!(&self.root, std::fs::create_dir_all(&self.root));
        let absolute = try_io!(&self.root, std::path::absolute(&self.root));

        // Entry paths are compared with paths built from the root.
        Ok(clean_path(&absolute))
    }
}

/// File name for the transport archive of the image `name`.
fn archive_name(name: &str) -> String {
    let hash = HexString(sha2::Sha256::digest(name)).to_string();
    format!("{}.tar", &hash[..16])
}

#[test]
fn archive_names() {
    let a = archive_name("debian:stable");
    assert_eq!(a.len(), 16 + 4);
    assert!(a.ends_with(".tar"));
    assert_eq!(a, archive_name("debian:stable"));
    assert_ne!(a, archive_name("debian:latest"));
}

#[test]
fn error_kinds() {
    let cases = [
        (InspectError::ManifestFiles(0), ErrorKind::ManifestCardinality),
        (InspectError::ManifestRecords(2), ErrorKind::ManifestCardinality),
        (
            InspectError::MissingPlatform("c.json".into()),
            ErrorKind::MetadataParse,
        ),
        (
            InspectError::FileTooLarge {
                path: "f".into(),
                limit: 1,
            },
            ErrorKind::ArchiveRead,
        ),
        (
            InspectError::Io(io::ErrorKind::NotFound.into(), "f".into()),
            ErrorKind::ArchiveRead,
        ),
        (
            InspectError::Recommend("failed".into()),
            ErrorKind::Recommendation,
        ),
    ];

    for (error, kind) in cases {
        assert_eq!(error.kind(), kind, "{error}");
    }
}
