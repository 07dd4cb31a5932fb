use std::path::Path;

/// Keeps ASCII letters, digits and dots; everything else becomes `_`.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Writes a before-repair photo into `dir` and returns its public path under `/uploads/repairs`.
pub async fn save_repair_photo(
    dir: &Path,
    original_name: &str,
    bytes: &[u8],
    timestamp_millis: i64,
) -> std::io::Result<String> {
    tokio::fs::create_dir_all(dir).await?;
    let file_name = format!("{}_{}", timestamp_millis, sanitize_filename(original_name));
    tokio::fs::write(dir.join(&file_name), bytes).await?;
    Ok(format!("/uploads/repairs/{}", file_name))
}

/// Deletes a photo written by [`save_repair_photo`], given the public path it returned.
pub async fn remove_repair_photo(dir: &Path, public_path: &str) -> std::io::Result<()> {
    match public_path.rsplit('/').next().filter(|name| !name.is_empty()) {
        Some(name) => tokio::fs::remove_file(dir.join(name)).await,
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizing_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("cracked screen (1).jpg"), "cracked_screen__1_.jpg");
        assert_eq!(sanitize_filename("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_filename("photo.PNG"), "photo.PNG");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[tokio::test]
    async fn photo_is_written_under_the_upload_dir() {
        let dir = std::env::temp_dir().join(format!("fixdesk-upload-{}", uuid::Uuid::new_v4()));
        let path = save_repair_photo(&dir, "back glass.jpg", b"jpeg", 1_700_000_000_000)
            .await
            .unwrap();

        assert_eq!(path, "/uploads/repairs/1700000000000_back_glass.jpg");
        let written = tokio::fs::read(dir.join("1700000000000_back_glass.jpg")).await.unwrap();
        assert_eq!(written, b"jpeg");

        remove_repair_photo(&dir, &path).await.unwrap();
        assert!(!dir.join("1700000000000_back_glass.jpg").exists());
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
