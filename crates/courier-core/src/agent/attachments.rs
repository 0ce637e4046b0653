//! Inbound media loading.

use std::path::{Path, PathBuf};

use courier_types::engine::Attachment;
use tracing::{debug, warn};

/// Media type for an attachment path, by extension. Only types the engine
/// accepts as input blocks are recognised.
pub fn media_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Read every supported attachment. Unsupported or unreadable files are
/// logged and skipped.
pub async fn load_attachments(paths: &[PathBuf]) -> Vec<Attachment> {
    let mut attachments = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(media_type) = media_type_for(path) else {
            debug!(path = %path.display(), "unsupported attachment type skipped");
            continue;
        };
        match tokio::fs::read(path).await {
            Ok(data) => attachments.push(Attachment {
                media_type: media_type.to_string(),
                data,
            }),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to read attachment"),
        }
    }
    attachments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_types_by_extension() {
        assert_eq!(media_type_for(Path::new("a.PNG")), Some("image/png"));
        assert_eq!(media_type_for(Path::new("/tmp/b.jpeg")), Some("image/jpeg"));
        assert_eq!(media_type_for(Path::new("notes.txt")), None);
        assert_eq!(media_type_for(Path::new("noext")), None);
    }

    #[tokio::test]
    async fn loads_readable_images_and_skips_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("photo.png");
        std::fs::write(&image, [0x89, b'P', b'N', b'G']).unwrap();
        let text = dir.path().join("readme.txt");
        std::fs::write(&text, "hi").unwrap();
        let missing = dir.path().join("gone.jpg");

        let loaded = load_attachments(&[image, text, missing]).await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].media_type, "image/png");
        assert_eq!(loaded[0].data, vec![0x89, b'P', b'N', b'G']);
    }
}
