use std::{
    fmt,
    path::{Path, PathBuf},
};

use sha2::{Digest, Sha256};

/// Builder for tar archives.
pub struct Archive {
    builder: tar::Builder<Vec<u8>>,
}

impl Archive {
    pub fn new() -> Archive {
        Archive {
            builder: tar::Builder::new(Vec::with_capacity(4096)),
        }
    }

    pub fn build(self) -> Vec<u8> {
        self.builder.into_inner().unwrap()
    }

    pub fn directory(mut self, path: impl AsRef<Path>) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_path(path).unwrap();
        header.set_mode(0o755);
        header.set_entry_type(tar::EntryType::dir());
        header.set_size(0);
        header.set_cksum();
        self.builder.append(&header, &b""[..]).unwrap();
        self
    }

    pub fn regular(mut self, path: impl AsRef<Path>, data: impl AsRef<[u8]>) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_path(path).unwrap();
        self.append_regular(header, data.as_ref());
        self
    }

    /// Add a regular file without validating its name, so it can contain
    /// `..` components.
    pub fn raw_regular(mut self, name: &str, data: impl AsRef<[u8]>) -> Self {
        let mut header = tar::Header::new_gnu();
        header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
        self.append_regular(header, data.as_ref());
        self
    }

    pub fn symlink(mut self, path: impl AsRef<Path>, target: impl AsRef<Path>) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_mode(0o755);
        header.set_entry_type(tar::EntryType::symlink());
        header.set_size(0);
        self.builder.append_link(&mut header, path, target).unwrap();
        self
    }

    fn append_regular(&mut self, mut header: tar::Header, data: &[u8]) {
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::file());
        header.set_size(data.len() as u64);
        header.set_cksum();
        self.builder.append(&header, data).unwrap();
    }
}

/// Builder for transport archives, with the same layout as
/// the archives from `docker save`:
///
/// ```text
/// <n>/
/// <n>/layer.tar
/// <sha256 of config>.json
/// manifest.json
/// ```
pub struct Image {
    config: Vec<u8>,
    config_name: Option<String>,
    repo_tags: serde_json::Value,
    layers: Vec<Vec<u8>>,
    manifest: Option<String>,
}

impl Image {
    pub fn new(architecture: &str, os: &str) -> Image {
        let config = serde_json::json!({
            "architecture": architecture,
            "os": os,
            "config": { "Env": ["PATH=/usr/bin"] },
        });

        Image::with_config(config.to_string())
    }

    pub fn with_config(config: impl Into<Vec<u8>>) -> Image {
        Image {
            config: config.into(),
            config_name: None,
            repo_tags: serde_json::json!(["test/image:1.0"]),
            layers: vec![],
            manifest: None,
        }
    }

    pub fn layer(mut self, layer: Archive) -> Self {
        self.layers.push(layer.build());
        self
    }

    pub fn repo_tags(mut self, tags: serde_json::Value) -> Self {
        self.repo_tags = tags;
        self
    }

    /// Replace the name of the config file.
    pub fn config_name(mut self, name: &str) -> Self {
        self.config_name = Some(name.to_owned());
        self
    }

    /// Replace the generated `manifest.json`.
    pub fn manifest(mut self, manifest: impl Into<String>) -> Self {
        self.manifest = Some(manifest.into());
        self
    }

    pub fn config_file(&self) -> String {
        match &self.config_name {
            Some(name) => name.clone(),
            None => format!("{}.json", HexString(Sha256::digest(&self.config))),
        }
    }

    pub fn build(self) -> Vec<u8> {
        let config_file = self.config_file();

        let layer_names: Vec<_> = (0..self.layers.len())
            .map(|n| format!("{n}/layer.tar"))
            .collect();

        let manifest = self.manifest.unwrap_or_else(|| {
            serde_json::json!([{
                "Config": config_file,
                "RepoTags": self.repo_tags,
                "Layers": layer_names,
            }])
            .to_string()
        });

        let mut archive = Archive::new();

        for (n, layer) in self.layers.into_iter().enumerate() {
            archive = archive
                .directory(format!("{n}"))
                .regular(&layer_names[n], layer);
        }

        archive
            .regular(config_file, self.config)
            .regular("manifest.json", manifest)
            .build()
    }

    /// Write the transport archive to `dir`.
    pub fn write(self, dir: &Path) -> PathBuf {
        let path = dir.join("image.tar");
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

/// Encode a byte buffer as hex string.
struct HexString<T>(T);

impl<T: AsRef<[u8]>> fmt::Display for HexString<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0
            .as_ref()
            .iter()
            .try_for_each(|byte| write!(f, "{:02x}", byte))
    }
}
