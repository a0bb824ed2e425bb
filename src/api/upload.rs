// ==================== PICTURE UPLOAD ====================
// Parsing do multipart de POST /user e gravação do arquivo em disco.

use crate::utils::ApiError;
use actix_multipart::{Field, Multipart};
use futures::stream::TryStreamExt;
use mongodb::bson::Document;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// The only file field accepted by `POST /user`
pub const PICTURE_FIELD: &str = "picture";

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Destination directory for stored pictures
    pub dir: PathBuf,
    /// Byte limit for one picture. `None` disables the check.
    pub max_file_size: Option<u64>,
}

/// A picture written to disk whose user record is not saved yet.
///
/// Dropping it without calling [`PendingUpload::commit`] deletes the file,
/// so any failure after the write leaves nothing behind.
#[derive(Debug)]
pub struct PendingUpload {
    path: PathBuf,
    committed: bool,
}

impl PendingUpload {
    fn new(path: PathBuf) -> Self {
        Self { path, committed: false }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value stored in the user's `picture` attribute
    pub fn stored_path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Keeps the file: the record referencing it was saved
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::warn!("🧹 Removed orphaned upload {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::error!("❌ Failed to remove orphaned upload {}: {}", self.path.display(), e),
        }
    }
}

/// Parsed `POST /user` form
#[derive(Debug, Default)]
pub struct UserForm {
    /// Text fields, stored verbatim on the user
    pub fields: Document,
    pub picture: Option<PendingUpload>,
    /// A `picture` part was sent but its MIME type is not `image/*`
    pub rejected_picture: bool,
    /// Number of parts in the body, text and file
    pub parts: usize,
}

/// `<epoch-millis>-<original-filename>`, keeping only the last path component
pub fn stored_filename(original: &str, millis: i64) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();
    let base = match base {
        "" | "." | ".." => "upload",
        name => name,
    };
    format!("{}-{}", millis, base)
}

fn is_image(field: &Field) -> bool {
    field
        .content_type()
        .map(|mime| mime.type_().as_str() == "image")
        .unwrap_or(false)
}

fn malformed(e: impl std::fmt::Display) -> ApiError {
    log::warn!("⚠️ Malformed multipart body: {}", e);
    ApiError::InvalidBody("malformed multipart body")
}

/// Reads the whole multipart body.
///
/// Text parts become user fields. A file part named `picture` with an
/// `image/*` type is streamed to disk; one with another type is skipped and
/// flagged. File parts under any other name are rejected.
pub async fn read_user_form(config: &UploadConfig, payload: &mut Multipart) -> Result<UserForm, ApiError> {
    let mut form = UserForm::default();

    loop {
        let next = payload.try_next().await;
        let mut field = match next {
            Ok(Some(field)) => field,
            Ok(None) => break,
            // An empty body or a closing boundary alone fails before the first part
            Err(e) if form.parts == 0 => {
                log::warn!("⚠️ Multipart body without parts: {}", e);
                return Err(ApiError::MissingBody);
            }
            Err(e) => return Err(malformed(e)),
        };
        form.parts += 1;

        let name = field.name().unwrap_or_default().to_string();
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        match filename {
            Some(original) => {
                if name != PICTURE_FIELD {
                    log::warn!("⚠️ Unexpected file field '{}'", name);
                    return Err(ApiError::InvalidBody("unexpected file field"));
                }
                if form.picture.is_some() || form.rejected_picture {
                    return Err(ApiError::InvalidBody("only one picture is accepted"));
                }
                if !is_image(&field) {
                    log::warn!("⚠️ Rejected non-image picture '{}' ({:?})", original, field.content_type());
                    drain(&mut field).await?;
                    form.rejected_picture = true;
                    continue;
                }
                form.picture = Some(save_picture(config, &mut field, &original).await?);
            }
            None => {
                let value = read_text(&mut field).await?;
                // `picture` is set by the server from the stored file
                if name != PICTURE_FIELD && !name.is_empty() {
                    form.fields.insert(name, value);
                }
            }
        }
    }

    Ok(form)
}

async fn read_text(field: &mut Field) -> Result<String, ApiError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(malformed)? {
        bytes.extend_from_slice(&chunk);
    }
    String::from_utf8(bytes).map_err(|_| ApiError::InvalidBody("form fields must be UTF-8"))
}

async fn drain(field: &mut Field) -> Result<(), ApiError> {
    while field.try_next().await.map_err(malformed)?.is_some() {}
    Ok(())
}

const MAX_NAME_ATTEMPTS: i64 = 1000;

/// Creates a file that did not exist before, moving to the next millisecond
/// while `<millis>-<name>` is taken. The guard only ever owns a file created here.
async fn create_unique(dir: &Path, original: &str) -> Result<(PendingUpload, tokio::fs::File), ApiError> {
    let millis = chrono::Utc::now().timestamp_millis();

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let path = dir.join(stored_filename(original, millis + attempt));
        match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((PendingUpload::new(path), file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                log::error!("❌ Failed to create {}: {}", path.display(), e);
                return Err(ApiError::UploadFailed);
            }
        }
    }

    log::error!("❌ No free name for '{}' after {} attempts", original, MAX_NAME_ATTEMPTS);
    Err(ApiError::UploadFailed)
}

async fn save_picture(config: &UploadConfig, field: &mut Field, original: &str) -> Result<PendingUpload, ApiError> {
    // The guard outlives the file handle, so the file is closed before removal
    let (upload, mut file) = create_unique(&config.dir, original).await?;

    let mut written: u64 = 0;
    while let Some(chunk) = field.try_next().await.map_err(malformed)? {
        written += chunk.len() as u64;
        if let Some(limit) = config.max_file_size {
            if written > limit {
                log::warn!("⚠️ Picture '{}' exceeds {} bytes", original, limit);
                return Err(ApiError::PayloadTooLarge(limit));
            }
        }
        file.write_all(&chunk).await.map_err(|e| {
            log::error!("❌ Failed to write {}: {}", upload.path().display(), e);
            ApiError::UploadFailed
        })?;
    }
    file.flush().await.map_err(|e| {
        log::error!("❌ Failed to flush {}: {}", upload.path().display(), e);
        ApiError::UploadFailed
    })?;

    log::info!("📁 Stored picture {} ({} bytes)", upload.path().display(), written);
    Ok(upload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_filename_prefixes_epoch_millis() {
        assert_eq!(stored_filename("me.png", 1700000000000), "1700000000000-me.png");
    }

    #[test]
    fn stored_filename_drops_client_directories() {
        assert_eq!(stored_filename("../../etc/passwd", 1), "1-passwd");
        assert_eq!(stored_filename("C:\\Users\\kobi\\me.jpg", 2), "2-me.jpg");
        assert_eq!(stored_filename("dir/", 3), "3-upload");
        assert_eq!(stored_filename("..", 4), "4-upload");
    }

    #[tokio::test]
    async fn taken_names_are_never_reused() {
        let dir = tempfile::tempdir().unwrap();

        let mut uploads = Vec::new();
        for _ in 0..50 {
            let (upload, _file) = create_unique(dir.path(), "me.png").await.unwrap();
            uploads.push(upload);
        }

        let mut paths: Vec<PathBuf> = uploads.iter().map(|u| u.path().to_path_buf()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 50);
        assert!(paths.iter().all(|p| p.file_name().unwrap().to_string_lossy().ends_with("-me.png")));
    }

    #[tokio::test]
    async fn existing_file_is_not_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let millis = chrono::Utc::now().timestamp_millis();
        // Occupy the next few names so the first free one is further ahead
        for offset in 0..5 {
            std::fs::write(dir.path().join(stored_filename("me.png", millis + offset)), b"kept").unwrap();
        }

        let (upload, _file) = create_unique(dir.path(), "me.png").await.unwrap();
        drop(upload);

        for offset in 0..5 {
            let path = dir.path().join(stored_filename("me.png", millis + offset));
            assert_eq!(std::fs::read(path).unwrap(), b"kept");
        }
    }

    #[test]
    fn uncommitted_upload_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1-a.png");
        std::fs::write(&path, b"png").unwrap();

        drop(PendingUpload::new(path.clone()));
        assert!(!path.exists());
    }

    #[test]
    fn committed_upload_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1-a.png");
        std::fs::write(&path, b"png").unwrap();

        let upload = PendingUpload::new(path.clone());
        assert_eq!(upload.stored_path(), path.to_string_lossy());
        upload.commit();
        assert!(path.exists());
    }
}
