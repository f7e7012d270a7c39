use std::path::PathBuf;

/// Files and directories extracted from an archive.
///
/// Paths are joined to the extraction root, and they are stored in the
/// same order as they appear in the archive. Entries from nested archives
/// are placed at the position of the nested archive.
///
/// Paths are not deduplicated: if multiple layers contain the same file,
/// it appears once for every layer.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct Inventory {
    pub files: Vec<PathBuf>,
    pub dirs: Vec<PathBuf>,
}

impl Inventory {
    /// Move the entries of `other` to the end of this inventory.
    pub fn append(&mut self, mut other: Inventory) {
        self.files.append(&mut other.files);
        self.dirs.append(&mut other.dirs);
    }
}

/// Attributes of an image, read from its manifest and config files.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ImageAttributes {
    pub repo_tags: Vec<String>,
    pub architecture: String,
    pub os: String,
}

/// Description of an inspected image.
///
/// It is built only when both the extraction and the manifest resolution
/// are successful, so every field is always populated.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ImageDescription {
    /// Image reference, as requested by the caller.
    pub name: String,

    /// Tags registered in the manifest. It may be empty.
    pub repo_tags: Vec<String>,

    pub architecture: String,

    /// Operating system, like `linux` or `windows`.
    pub os: String,

    /// Regular files across all layers.
    pub files: Vec<PathBuf>,

    /// Directories across all layers.
    pub dirs: Vec<PathBuf>,
}

impl ImageDescription {
    pub fn new(name: impl Into<String>, inventory: Inventory, attributes: ImageAttributes) -> Self {
        let Inventory { files, dirs } = inventory;
        let ImageAttributes {
            repo_tags,
            architecture,
            os,
        } = attributes;

        ImageDescription {
            name: name.into(),
            repo_tags,
            architecture,
            os,
            files,
            dirs,
        }
    }
}

#[test]
fn append_keeps_duplicates() {
    let mut a = Inventory {
        files: vec!["/r/a".into(), "/r/b".into()],
        dirs: vec!["/r".into()],
    };

    let b = Inventory {
        files: vec!["/r/b".into()],
        dirs: vec!["/r/c".into()],
    };

    a.append(b);

    assert_eq!(a.files, [PathBuf::from("/r/a"), "/r/b".into(), "/r/b".into()]);
    assert_eq!(a.dirs, [PathBuf::from("/r"), "/r/c".into()]);
}
