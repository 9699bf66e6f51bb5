use std::path::PathBuf;

use tower_http::services::ServeDir;
use uuid::Uuid;

use crate::{
    appresult::{AppResult, FieldErrors},
    form::UploadedFile,
};

/// Public prefix the media directory is served under.
pub const MEDIA_ROUTE: &str = "/media";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    HousePhoto,
    IdDocument,
    TransactionPhoto,
}

impl MediaKind {
    fn dir(&self) -> &'static str {
        match self {
            MediaKind::HousePhoto => "house_photos",
            MediaKind::IdDocument => "id_documents",
            MediaKind::TransactionPhoto => "transaction_photos",
        }
    }
}

/// Uploaded files on local disk, one subdirectory per [`MediaKind`].
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn service(&self) -> ServeDir {
        ServeDir::new(&self.root)
    }

    /// Writes the file and returns its public URL.
    pub async fn save(&self, kind: MediaKind, file: &UploadedFile) -> AppResult<String> {
        let dir = self.root.join(kind.dir());
        tokio::fs::create_dir_all(&dir).await?;

        let name = format!("{}-{}", Uuid::now_v7().simple(), sanitize_file_name(&file.file_name));
        tokio::fs::write(dir.join(&name), &file.bytes).await?;

        tracing::debug!(kind = kind.dir(), %name, bytes = file.bytes.len(), "stored upload");
        Ok(format!("{MEDIA_ROUTE}/{}/{name}", kind.dir()))
    }

    pub async fn save_all(&self, kind: MediaKind, files: &[UploadedFile]) -> AppResult<Vec<String>> {
        let mut urls = Vec::with_capacity(files.len());
        for file in files {
            urls.push(self.save(kind, file).await?);
        }
        Ok(urls)
    }

    /// Best effort: a missing file is not an error.
    pub async fn remove(&self, url: &str) {
        let Some(relative) = url.strip_prefix(MEDIA_ROUTE).map(|r| r.trim_start_matches('/')) else {
            return;
        };
        if relative.split('/').any(|segment| segment == "..") {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(self.root.join(relative)).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(error = %e, %url, "could not remove upload");
            }
        }
    }
}

/// Records an error unless every file in `files` is an image.
pub fn check_images(errors: &mut FieldErrors, field: &str, files: &[UploadedFile]) {
    let all_images = files.iter().all(|file| {
        file.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"))
    });
    errors.check(all_images, field, "Only image files are accepted");
}

fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_owned()
    } else {
        cleaned.chars().take(100).collect()
    }
}
