use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::BLAZEFACE_MODEL_URL_ENV;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model file not found: {0}")]
    MissingFile(PathBuf),
    #[error("model {name} is not cached and no download URL is configured (set FACEMARK_MODEL_URL)")]
    NoSource { name: String },
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Where the detection model comes from.
///
/// An explicit `path` wins. Otherwise the model is looked up by `name` in
/// the user cache directory and downloaded from `url` on a miss.
#[derive(Clone, Debug, Default)]
pub struct ModelSource {
    pub name: String,
    pub path: Option<PathBuf>,
    pub url: Option<String>,
}

impl ModelSource {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: None,
            url: None,
        }
    }

    pub fn with_path(mut self, path: Option<PathBuf>) -> Self {
        self.path = path;
        self
    }

    /// Sets the download URL, falling back to `FACEMARK_MODEL_URL`.
    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url.or_else(|| std::env::var(BLAZEFACE_MODEL_URL_ENV).ok());
        self
    }

    pub fn resolve(&self) -> Result<PathBuf, ModelResolveError> {
        if let Some(path) = &self.path {
            return if path.is_file() {
                Ok(path.clone())
            } else {
                Err(ModelResolveError::MissingFile(path.clone()))
            };
        }
        resolve_in(&model_cache_dir()?, &self.name, self.url.as_deref())
    }
}

fn resolve_in(cache_dir: &Path, name: &str, url: Option<&str>) -> Result<PathBuf, ModelResolveError> {
    let cached_path = cache_dir.join(name);
    if cached_path.is_file() {
        return Ok(cached_path);
    }

    let url = url.ok_or_else(|| ModelResolveError::NoSource {
        name: name.to_string(),
    })?;
    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading detection model from {url}");
    download(url, &cached_path)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/Facemark/models/`
/// - Linux: `$XDG_CACHE_HOME/Facemark/models/` or `~/.cache/Facemark/models/`
/// - Windows: `%LOCALAPPDATA%/Facemark/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join("Facemark").join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn download(url: &str, dest: &Path) -> Result<(), ModelResolveError> {
    let download_err = |source| ModelResolveError::Download {
        url: url.to_string(),
        source,
    };
    let bytes = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.bytes())
        .map_err(download_err)?;

    // Written next to the destination and renamed so a failed download
    // never leaves a truncated model behind.
    let temp_path = dest.with_extension("part");
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ModelResolveError::Write { path, source }
    };
    let mut file = fs::File::create(&temp_path).map_err(write_err(&temp_path))?;
    file.write_all(&bytes).map_err(write_err(&temp_path))?;
    file.flush().map_err(write_err(&temp_path))?;
    drop(file);

    fs::rename(&temp_path, dest).map_err(write_err(dest))?;
    log::info!("Saved model to {} ({} bytes)", dest.display(), bytes.len());
    Ok(())
}
