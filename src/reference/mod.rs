mod parser;

use std::{borrow::Cow, fmt};

use crate::digest::Digest;

pub use parser::DEFAULT_REGISTRY;

/// Errors from [`Reference::try_from`].
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("Missing repository.")]
    MissingRepository,

    #[error("Invalid character in the reference: {0:?}")]
    InvalidCharacter(char),

    #[error("Reference starts with '-'.")]
    LeadingDash,

    #[error("{0}")]
    InvalidDigest(#[from] crate::digest::DigestError),
}

/// Reference to an image, like `debian:stable` or
/// `registry.example.com/foo/bar:1.0`.
///
/// The parser tries to be close to what `docker pull` does:
///
/// * If the reference does not include the hostname of the registry,
///   it uses Docker Hub, and the repository namespace defaults to
///   `library` if there is none.
/// * It accepts any tag value after the last `:` character. If no tag
///   is given, it uses `latest`.
/// * It accepts a fixed digest (the last part after a `@` character), but
///   only SHA256 and SHA512.
///
/// The reference is only used to validate the image name before running
/// the [`ImageSource`](crate::ImageSource), and to get the registry for
/// the credentials. The image is always requested with its original name.
///
/// # Examples
///
/// ```
/// # use image_inspect::*;
/// let reference = Reference::try_from("example.com:5000/foo/bar:1.2").unwrap();
/// assert_eq!(reference.registry, "example.com:5000");
/// assert_eq!(reference.repository, "foo/bar");
/// assert_eq!(reference.tag, "1.2");
/// assert!(!reference.is_default_registry());
///
/// let reference = Reference::try_from("debian").unwrap();
/// assert_eq!(reference.repository, "library/debian");
/// assert_eq!(reference.tag, "latest");
/// assert_eq!(reference.to_string(), "debian");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Reference<'a> {
    /// Original string used to parse this reference.
    pub source: &'a str,

    /// Address of the registry server.
    pub registry: &'a str,

    /// Repository name, including its namespace.
    pub repository: Cow<'a, str>,

    /// Image tag.
    pub tag: &'a str,

    /// Manifest digest, if present.
    pub digest: Option<Digest>,
}

impl Reference<'_> {
    /// Return `true` if the image is in Docker Hub.
    pub fn is_default_registry(&self) -> bool {
        self.registry == DEFAULT_REGISTRY
    }
}

impl fmt::Display for Reference<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source)
    }
}

impl<'a> TryFrom<&'a str> for Reference<'a> {
    type Error = ParseError;

    fn try_from(reference: &'a str) -> Result<Self, Self::Error> {
        parser::parse(reference)
    }
}
