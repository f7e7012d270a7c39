//! Inspect container images saved as transport archives (`docker save`).
//!
//! The archive is unpacked into an extraction root, including the nested
//! `layer.tar` archives, and the `manifest.json` and config files are used
//! to get the platform and tags of the image.
//!
//! ```no_run
//! use image_inspect::Inspector;
//!
//! let image = Inspector::new("/tmp/scratch")
//!     .inspect_archive("debian:stable", "/tmp/debian.tar".as_ref())
//!     .unwrap();
//!
//! println!("{}/{}: {} files", image.os, image.architecture, image.files.len());
//! ```

mod digest;
mod event_handler;
mod extractor;
mod fs;
mod image;
mod inspector;
mod manifest;

pub mod acquire;
pub mod reference;

pub use acquire::{AcquireError, Credentials, DockerCli, ImageSource};
pub use digest::{Digest, DigestAlgorithm, DigestError};
pub use event_handler::{EventHandler, NoEventHandler};
pub use fs::{sanitize_path, PathTraversal};
pub use image::{ImageAttributes, ImageDescription, Inventory};
pub use inspector::{BoxError, ErrorKind, InspectError, Inspector, Recommender};
pub use manifest::{ConfigRecord, ManifestRecord};
pub use reference::Reference;
