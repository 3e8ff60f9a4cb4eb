//! Layered configuration for hoard.
//!
//! Sources are merged in order, later sources overriding earlier ones:
//!
//! 1. Built-in defaults.
//! 2. A configuration file: either the one passed explicitly, or any of
//!    `hoard.toml`, `hoard.yaml` and `hoard.json` found in the platform
//!    config directory (`~/.config/hoard` on Linux).
//! 3. Environment variables prefixed with `HOARD_`, using a double
//!    underscore between section and key (`HOARD_STORAGE__ROOT`,
//!    `HOARD_LIBRARY__MAX_UPLOAD_SIZE`).
//!
//! ```toml
//! [storage]
//! root = "/srv/hoard"
//! compress = true
//! compression = "zstd"
//!
//! [library]
//! default_folder = "Inbox"
//! date_template = "{{ year }}/{{ month|pad }}-{{ day|pad }}"
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use hoard_compress::Compression;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_FOLDER: &str = "Default";
pub const DEFAULT_DATE_TEMPLATE: &str = "{{ year }}/{{ month|pad }}";
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 4 * 1024 * 1024 * 1024;
const ENV_PREFIX: &str = "HOARD_";
const FILE_STEM: &str = "hoard";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub library: LibraryConfig,
    pub cache: CacheConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory every stored file lives beneath. Must be absolute.
    pub root: PathBuf,
    /// Where soft-deleted files go. Defaults to `.recycle` inside the root.
    pub recycle_bin: Option<PathBuf>,
    /// Format used when compressing, and whose suffix marks compressed
    /// variants during path resolution.
    #[serde(serialize_with = "compression::serialize", deserialize_with = "compression::deserialize")]
    pub compression: Compression,
    /// Compress newly uploaded files.
    pub compress: bool,
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: project_dirs().map(|dirs| dirs.data_dir().join("files")).unwrap_or_default(),
            recycle_bin: None,
            compression: Compression::Gzip,
            compress: false,
        }
    }
}
impl StorageConfig {
    pub fn recycle_bin(&self) -> PathBuf {
        self.recycle_bin.clone().unwrap_or_else(|| self.root.join(".recycle"))
    }

    /// Compression applied to new uploads.
    pub fn upload_compression(&self) -> Compression {
        match self.compress {
            true => self.compression,
            false => Compression::None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Folder that uploads land in when no (valid) destination is given.
    pub default_folder: String,
    /// Subdirectory template used when organizing uploads by date.
    pub date_template: String,
    /// Largest accepted upload, in bytes.
    pub max_upload_size: u64,
}
impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            default_folder: DEFAULT_FOLDER.to_string(),
            date_template: DEFAULT_DATE_TEMPLATE.to_string(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// SQLite database holding folder and file records.
    pub database: PathBuf,
}
impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            database: project_dirs().map(|dirs| dirs.data_dir().join("hoard.db")).unwrap_or_else(|| "hoard.db".into()),
        }
    }
}

impl Config {
    /// Load and validate configuration from every source.
    ///
    /// An explicit `file` must exist; the platform default files are
    /// optional.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(file)?)
    }

    /// The merged sources, before extraction. Useful for layering extra
    /// providers on top.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match file {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
                }
                figment = merge_file(figment, path);
            },
            None => {
                if let Some(dirs) = project_dirs() {
                    for extension in ["toml", "yaml", "yml", "json"] {
                        let path = dirs.config_dir().join(format!("{FILE_STEM}.{extension}"));
                        figment = merge_file(figment, &path);
                    }
                }
            },
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        debug!(root = %config.storage.root.display(), database = %config.cache.database.display(), "loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.storage.root.is_absolute() {
            exn::bail!(ErrorKind::Invalid("storage.root"));
        }
        if !self.storage.recycle_bin().is_absolute() {
            exn::bail!(ErrorKind::Invalid("storage.recycle_bin"));
        }
        if self.library.default_folder.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("library.default_folder"));
        }
        if self.library.max_upload_size == 0 {
            exn::bail!(ErrorKind::Invalid("library.max_upload_size"));
        }
        upon::Engine::new()
            .compile(self.library.date_template.as_str())
            .or_raise(|| ErrorKind::Invalid("library.date_template"))?;
        Ok(())
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", FILE_STEM)
}

/// Missing files are skipped by figment, so this is safe for optional paths.
fn merge_file(figment: Figment, path: &Path) -> Figment {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => figment.merge(Toml::file(path)),
    }
}

/// Compression formats are configured by name (`"gzip"`, `"zstd"`, ...).
mod compression {
    use super::*;

    pub(super) fn serialize<S: Serializer>(value: &Compression, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_str())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Compression, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse::<Compression>().map_err(|err| serde::de::Error::custom(&*err))
    }
}
