use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use regex::Regex;
use tempfile::NamedTempFile;

use crate::api::common::ErrorCode;
use crate::content::check_path_component;
use crate::database::common::random_hex;
use crate::error::BlogError;

pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];
pub const PUBLIC_PREFIX: &str = "/static/uploads";
const MAX_STEM_CHARS: usize = 40;
const FALLBACK_STEM: &str = "img";

/// Lowercased extension of `filename` when it is an allowed image type.
pub fn image_extension(filename: &str) -> Option<String> {
    let (_, extension) = filename.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        Some(extension)
    } else {
        None
    }
}

pub fn content_type(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// ASCII-only stem safe to put in a URL, at most 40 characters.
fn secure_stem(stem: &str) -> String {
    lazy_static! {
        static ref UNSAFE_CHARS: Regex = Regex::new("[^A-Za-z0-9_.-]").unwrap();
    }
    let joined = stem.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = UNSAFE_CHARS.replace_all(&joined, "");
    let cleaned = cleaned.trim_matches(|ch: char| ch == '.' || ch == '_');
    let stem: String = cleaned.chars().take(MAX_STEM_CHARS).collect();
    if stem.is_empty() {
        FALLBACK_STEM.to_owned()
    } else {
        stem
    }
}

pub fn stored_name(original: &str, extension: &str) -> String {
    let stem = original.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(original);
    format!("{}_{}.{}", secure_stem(stem), random_hex(16), extension)
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> UploadStore {
        UploadStore {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn too_large(&self) -> BlogError {
        BlogError::validation(
            ErrorCode::FileTooLarge,
            format!("uploads are limited to {} bytes", self.max_bytes),
        )
    }

    /// Stores the image under a fresh unique name and returns its public URL.
    /// Nothing is written when the upload is rejected.
    pub fn save(&self, original_name: &str, bytes: &[u8]) -> Result<String, BlogError> {
        let original_name = original_name.trim();
        if original_name.is_empty() || bytes.is_empty() {
            return Err(BlogError::validation(ErrorCode::MissingField, "no file was sent"));
        }
        let extension = image_extension(original_name).ok_or_else(|| {
            BlogError::validation(ErrorCode::UnsupportedFileType, format!("{:?} is not an allowed image", original_name))
        })?;
        if bytes.len() > self.max_bytes {
            return Err(self.too_large());
        }
        fs::create_dir_all(&self.dir)?;
        let name = stored_name(original_name, &extension);
        let mut file = NamedTempFile::new_in(&self.dir)?;
        file.write_all(bytes)?;
        file.persist(self.dir.join(&name)).map_err(|e| e.error)?;
        tracing::info!("stored upload {} ({} bytes)", name, bytes.len());
        Ok(format!("{}/{}", PUBLIC_PREFIX, name))
    }

    /// Reads a stored image with its content type.
    pub fn open(&self, name: &str) -> Result<(Vec<u8>, &'static str), BlogError> {
        let name = check_path_component(name).map_err(|_| BlogError::NotFound)?;
        let extension = image_extension(name).ok_or(BlogError::NotFound)?;
        match fs::read(self.dir.join(name)) {
            Ok(bytes) => Ok((bytes, content_type(&extension))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BlogError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}
