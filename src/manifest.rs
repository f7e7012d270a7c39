use std::{fs, path::Path};

use crate::{digest::Digest, fs::sanitize_path, ImageAttributes, Inventory};

use super::inspector::{try_io, InspectError};

/// Name of the manifest file in the transport archive.
const MANIFEST_PATH: &str = "manifest.json";

/// Entry of the `manifest.json` file generated by `docker save`.
///
/// Other fields (like `Layers`) are ignored.
#[derive(serde::Deserialize, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ManifestRecord {
    /// Path of the config file, relative to the root of the archive.
    pub config: String,

    /// Tags of the image. `null` for untagged images.
    #[serde(default)]
    pub repo_tags: Option<Vec<String>>,
}

/// Platform fields of the image config file.
#[derive(serde::Deserialize, Debug, PartialEq)]
pub struct ConfigRecord {
    pub architecture: String,
    pub os: String,
}

/// Read the manifest and the config file of the image extracted
/// in `root`.
///
/// `inventory` must contain exactly one `manifest.json` file at the top
/// of the extraction root, and that file must contain exactly one record.
pub(crate) fn resolve(root: &Path, inventory: &Inventory) -> Result<ImageAttributes, InspectError> {
    let manifest_path = root.join(MANIFEST_PATH);

    let matches = inventory
        .files
        .iter()
        .filter(|path| **path == manifest_path)
        .count();

    if matches != 1 {
        return Err(InspectError::ManifestFiles(matches));
    }

    let mut records: Vec<ManifestRecord> = read_json(&manifest_path)?;
    if records.len() != 1 {
        return Err(InspectError::ManifestRecords(records.len()));
    }

    let ManifestRecord { config, repo_tags } = records.remove(0);

    let config_path = sanitize_path(root, &config).map_err(InspectError::InvalidConfigPath)?;
    let config_data = try_io!(&config_path, fs::read(&config_path));

    if let Some(digest) = Digest::from_file_name(&config_path) {
        digest
            .verify(&config_data)
            .map_err(|actual| InspectError::ConfigDigest {
                path: config_path.clone(),
                expected: digest.hash_value().to_owned(),
                actual,
            })?;
    }

    let ConfigRecord { architecture, os } =
        serde_json::from_slice(&config_data).map_err(|source| InspectError::Metadata {
            path: config_path.clone(),
            source,
        })?;

    if architecture.is_empty() || os.is_empty() {
        return Err(InspectError::MissingPlatform(config_path));
    }

    tracing::info!(%architecture, %os, "image config");

    Ok(ImageAttributes {
        repo_tags: repo_tags.unwrap_or_default(),
        architecture,
        os,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, InspectError> {
    let data = try_io!(path, fs::read(path));
    serde_json::from_slice(&data).map_err(|source| InspectError::Metadata {
        path: path.to_owned(),
        source,
    })
}
