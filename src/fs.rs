use std::path::{Component, Path, PathBuf};

/// Error from [`sanitize_path`] when the path of an archive entry
/// escapes from the extraction root.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("Path escapes from the extraction root: {name}")]
pub struct PathTraversal {
    pub name: PathBuf,
}

/// Join `name` to `root`, and verify that the result is still inside `root`.
///
/// The path is cleaned without accessing the filesystem: `.` components
/// are dropped, and `..` removes the previous component. A leading `/`
/// in `name` is relative to `root`, like in most tar implementations.
///
/// # Examples
///
/// ```
/// # use image_inspect::sanitize_path;
/// # use std::path::Path;
/// let root = Path::new("/var/tmp/root");
///
/// assert_eq!(
///     sanitize_path(root, "./etc/../usr/bin/sh").unwrap(),
///     Path::new("/var/tmp/root/usr/bin/sh"),
/// );
///
/// assert!(sanitize_path(root, "../../etc/passwd").is_err());
/// ```
pub fn sanitize_path(root: &Path, name: impl AsRef<Path>) -> Result<PathBuf, PathTraversal> {
    let name = name.as_ref();
    let root = clean_path(root);

    let mut target = root.clone();
    for component in name.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::CurDir => continue,

            Component::ParentDir => {
                if !target.pop() {
                    return Err(PathTraversal {
                        name: name.to_owned(),
                    });
                }
            }

            Component::Normal(part) => target.push(part),
        }
    }

    if target.starts_with(&root) {
        Ok(target)
    } else {
        Err(PathTraversal {
            name: name.to_owned(),
        })
    }
}

/// Lexical cleanup of `path`. A `..` after the root is ignored.
pub(crate) fn clean_path(path: &Path) -> PathBuf {
    let mut clean = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => continue,

            Component::ParentDir => {
                let popped = match clean.components().next_back() {
                    Some(Component::Normal(_)) => clean.pop(),
                    Some(Component::RootDir | Component::Prefix(_)) => true,
                    _ => false,
                };

                if !popped {
                    clean.push("..");
                }
            }

            other => clean.push(other),
        }
    }

    if clean.as_os_str().is_empty() {
        clean.push(".");
    }

    clean
}

#[test]
fn join_regular_names() {
    let root = Path::new("/scratch");

    for (name, expected) in [
        ("etc/hostname", "/scratch/etc/hostname"),
        ("./etc/hostname", "/scratch/etc/hostname"),
        ("/etc/hostname", "/scratch/etc/hostname"),
        ("usr//lib/./x", "/scratch/usr/lib/x"),
        ("a/b/../c", "/scratch/a/c"),
        ("./", "/scratch"),
    ] {
        assert_eq!(sanitize_path(root, name).unwrap(), Path::new(expected));
    }
}

#[test]
fn reject_traversal() {
    let root = Path::new("/scratch/root");

    for name in [
        "..",
        "../etc/passwd",
        "../../etc/passwd",
        "a/../../b",
        "a/b/../../../rootx",
        "/../root2/file",
    ] {
        assert_eq!(
            sanitize_path(root, name),
            Err(PathTraversal { name: name.into() }),
            "{name}",
        );
    }
}

#[test]
fn sibling_with_same_prefix() {
    // `/scratch/rootx` shares the prefix with `/scratch/root`
    // as a string, but not as a path.
    let result = sanitize_path(Path::new("/scratch/root"), "../rootx/f");
    assert!(result.is_err());
}

#[test]
fn unclean_root() {
    let root = Path::new("/scratch/./a/../root/");
    assert_eq!(
        sanitize_path(root, "f").unwrap(),
        Path::new("/scratch/root/f")
    );

    assert!(sanitize_path(root, "../f").is_err());
}

#[test]
fn clean_relative_paths() {
    assert_eq!(clean_path(Path::new("a/./b/..")), Path::new("a"));
    assert_eq!(clean_path(Path::new("../a")), Path::new("../a"));
    assert_eq!(clean_path(Path::new("a/..")), Path::new("."));
    assert_eq!(clean_path(Path::new("/..")), Path::new("/"));
}
