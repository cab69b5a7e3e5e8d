//! Media uploads
//!
//! Only the URL an upload returns ever reaches a message: photo and video
//! messages carry it as their content.

use std::sync::Arc;

use murmur_core::{BlobUploader, StorageKey};
use tracing::{info, instrument};
use url::Url;

use crate::error::SyncResult;
use crate::message::{MediaItem, MessageKind};

const PROFILE_PICTURES: &str = "images";
const MESSAGE_PHOTOS: &str = "message_images";
const MESSAGE_VIDEOS: &str = "message_videos";

/// Kind of media attached to a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
}

/// Object name for a message attachment, e.g. `photo_message_<id>.png`
pub fn media_filename(kind: MediaKind, message_id: &str) -> String {
    let id = message_id.replace(' ', "-");
    match kind {
        MediaKind::Photo => format!("photo_message_{}.png", id),
        MediaKind::Video => format!("video_message_{}.mov", id),
    }
}

/// Uploads profile pictures and message attachments
#[derive(Clone)]
pub struct MediaUploader {
    uploader: Arc<dyn BlobUploader>,
}

impl MediaUploader {
    pub fn new(uploader: Arc<dyn BlobUploader>) -> Self {
        Self { uploader }
    }

    async fn upload(&self, folder: &str, bytes: Vec<u8>, filename: &str) -> SyncResult<Url> {
        let name = format!("{}/{}", folder, filename);
        Ok(self.uploader.upload(bytes, &name).await?)
    }

    /// Upload to `images/<key>_profile_picture.png`
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_profile_picture(&self, bytes: Vec<u8>, user: &StorageKey) -> SyncResult<Url> {
        let url = self
            .upload(PROFILE_PICTURES, bytes, &user.profile_picture_filename())
            .await?;
        info!(%url, "Uploaded profile picture");
        Ok(url)
    }

    /// Upload to `message_images/<filename>`
    pub async fn upload_message_photo(&self, bytes: Vec<u8>, filename: &str) -> SyncResult<Url> {
        self.upload(MESSAGE_PHOTOS, bytes, filename).await
    }

    /// Upload to `message_videos/<filename>`
    pub async fn upload_message_video(&self, bytes: Vec<u8>, filename: &str) -> SyncResult<Url> {
        self.upload(MESSAGE_VIDEOS, bytes, filename).await
    }

    /// Upload a photo and wrap its URL as a message payload
    pub async fn photo_message(&self, bytes: Vec<u8>, message_id: &str) -> SyncResult<MessageKind> {
        let filename = media_filename(MediaKind::Photo, message_id);
        let url = self.upload_message_photo(bytes, &filename).await?;
        Ok(MessageKind::Photo(MediaItem::new(url)))
    }

    /// Upload a video and wrap its URL as a message payload
    pub async fn video_message(&self, bytes: Vec<u8>, message_id: &str) -> SyncResult<MessageKind> {
        let filename = media_filename(MediaKind::Video, message_id);
        let url = self.upload_message_video(bytes, &filename).await?;
        Ok(MessageKind::Video(MediaItem::new(url)))
    }
}

impl std::fmt::Debug for MediaUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaUploader").finish_non_exhaustive()
    }
}
