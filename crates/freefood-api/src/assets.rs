use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow, ensure};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use freefood_db::assets::NewAsset;
use rand::Rng;
use tracing::{info, warn};

/// Raster formats accepted for post images.
const EXTENSIONS: &[&str] = &["png", "gif", "jpg", "jpeg"];

const SALT_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SALT_LEN: usize = 16;

/// Somewhere uploaded images can be written and then served from.
pub trait AssetStore: Send + Sync {
    /// Store `bytes` under `key`, returning the public URL of the object.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String>;

    fn base_url(&self) -> &str;
}

/// Writes objects as flat files in a directory served under `/assets`.
pub struct DiskStore {
    dir: PathBuf,
    base_url: String,
}

impl DiskStore {
    pub fn new(dir: PathBuf, public_url: &str) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating asset directory {}", dir.display()))?;
        info!("Asset storage directory: {}", dir.display());
        Ok(Self {
            dir,
            base_url: format!("{}/assets", public_url.trim_end_matches('/')),
        })
    }
}

impl AssetStore for DiskStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String> {
        let path = self.dir.join(key);
        std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
        Ok(format!("{}/{}", self.base_url, key))
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Keeps objects in memory. Used by tests.
pub struct MemoryStore {
    base_url: String,
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AssetStore for MemoryStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String> {
        self.objects
            .lock()
            .map_err(|e| anyhow!("asset store lock poisoned: {}", e))?
            .insert(key.to_string(), bytes.to_vec());
        Ok(format!("{}/{}", self.base_url, key))
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Turns `data:image/...;base64,` payloads into stored images.
#[derive(Clone)]
pub struct AssetUploader {
    store: Arc<dyn AssetStore>,
}

impl AssetUploader {
    pub fn new(store: Arc<dyn AssetStore>) -> Self {
        Self { store }
    }

    /// Upload an encoded image. Failures are logged and yield `None` so the
    /// post can still be created without an image.
    pub fn upload(&self, image_data: &str) -> Option<NewAsset> {
        match self.try_upload(image_data) {
            Ok(asset) => {
                info!("Stored image {} ({}x{})", asset.url, asset.width, asset.height);
                Some(asset)
            }
            Err(e) => {
                warn!("Error when uploading image: {:#}", e);
                None
            }
        }
    }

    fn try_upload(&self, image_data: &str) -> Result<NewAsset> {
        let (mime, payload) = split_data_url(image_data)?;
        let extension = extension_for(mime)?;

        let bytes = B64.decode(payload.trim()).context("decoding base64 payload")?;
        let (width, height) = image::io::Reader::new(Cursor::new(&bytes))
            .with_guessed_format()?
            .into_dimensions()
            .context("reading image dimensions")?;

        let salt = random_salt();
        let url = self.store.put(&format!("{}.{}", salt, extension), &bytes)?;

        Ok(NewAsset {
            base_url: Some(self.store.base_url().to_string()),
            salt,
            extension,
            width,
            height,
            created_at: chrono::Utc::now().to_rfc3339(),
            url,
        })
    }
}

fn split_data_url(data: &str) -> Result<(&str, &str)> {
    let rest = data
        .strip_prefix("data:")
        .ok_or_else(|| anyhow!("image is not a data URL"))?;
    rest.split_once(";base64,")
        .ok_or_else(|| anyhow!("data URL is not base64 encoded"))
}

fn extension_for(mime: &str) -> Result<String> {
    let subtype = mime
        .strip_prefix("image/")
        .ok_or_else(|| anyhow!("Unsupported file type: {}", mime))?
        .to_ascii_lowercase();
    let ext = if subtype == "jpeg" { "jpg".to_string() } else { subtype };
    ensure!(EXTENSIONS.contains(&ext.as_str()), "Unsupported file type: {}", ext);
    Ok(ext)
}

fn random_salt() -> String {
    let mut rng = rand::rng();
    (0..SALT_LEN)
        .map(|_| SALT_CHARS[rng.random_range(0..SALT_CHARS.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_data_url(width: u32, height: u32) -> String {
        let img = image::RgbImage::new(width, height);
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageOutputFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", B64.encode(&buf))
    }

    fn uploader() -> (AssetUploader, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new("http://cdn.test/"));
        (AssetUploader::new(store.clone()), store)
    }

    #[test]
    fn stores_png_with_dimensions() {
        let (uploader, store) = uploader();
        let asset = uploader.upload(&png_data_url(3, 2)).unwrap();

        assert_eq!((asset.width, asset.height), (3, 2));
        assert_eq!(asset.extension, "png");
        assert_eq!(asset.salt.len(), SALT_LEN);
        assert!(asset.salt.bytes().all(|b| SALT_CHARS.contains(&b)));
        assert_eq!(asset.url, format!("http://cdn.test/{}.png", asset.salt));
        assert!(store.get(&format!("{}.png", asset.salt)).is_some());
    }

    #[test]
    fn jpeg_mime_maps_to_jpg() {
        assert_eq!(extension_for("image/jpeg").unwrap(), "jpg");
        assert_eq!(extension_for("image/GIF").unwrap(), "gif");
    }

    #[test]
    fn rejects_types_outside_allow_list() {
        assert!(extension_for("image/webp").is_err());
        assert!(extension_for("application/pdf").is_err());

        let (uploader, store) = uploader();
        assert!(uploader.upload("data:image/bmp;base64,Qk0=").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn garbage_payload_is_swallowed() {
        let (uploader, store) = uploader();
        assert!(uploader.upload("not a data url").is_none());
        assert!(uploader.upload("data:image/png;base64,%%%").is_none());
        assert!(uploader.upload("data:image/png;base64,aGVsbG8=").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn disk_store_writes_files() {
        let dir = std::env::temp_dir().join(format!("freefood-assets-{}", random_salt()));
        let store = DiskStore::new(dir.clone(), "http://localhost:5000/").unwrap();

        let url = store.put("ABC.png", b"bytes").unwrap();
        assert_eq!(url, "http://localhost:5000/assets/ABC.png");
        assert_eq!(std::fs::read(dir.join("ABC.png")).unwrap(), b"bytes");

        std::fs::remove_dir_all(dir).unwrap();
    }
}
