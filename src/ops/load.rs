//! Fetch objects into memory and decode images

use crate::error::{CloudError, Result};
use crate::factory::ResolvedConnection;
use crate::protocol::StorageError;
use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;
use tracing::{debug, info};

/// HWC `f32` pixel buffer with values in `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub data: Vec<f32>,
}

impl ImageTensor {
    /// `[height, width, channels]`
    pub fn shape(&self) -> [usize; 3] {
        [
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        ]
    }

    fn offset(&self, y: u32, x: u32, c: u32) -> usize {
        let (y, x, c) = (y as usize, x as usize, c as usize);
        (y * self.width as usize + x) * self.channels as usize + c
    }

    /// Value at row `y`, column `x`, channel `c`
    pub fn at(&self, y: u32, x: u32, c: u32) -> f32 {
        self.data[self.offset(y, x, c)]
    }
}

/// An RGB image plus its mask (`1 - alpha`, zeros without alpha)
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedImage {
    pub image: ImageTensor,
    pub mask: ImageTensor,
}

/// Remote key for a load request
///
/// A leading `/` marks an absolute key: the slash is stripped and the
/// profile's path prefix is not applied.
pub fn object_key(conn: &ResolvedConnection, key: &str) -> String {
    match key.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => conn.full_key(key),
    }
}

/// Fetch a whole object into memory
pub async fn load_bytes(conn: &ResolvedConnection, key: &str) -> Result<Bytes> {
    let store = conn.store()?;
    let full_key = object_key(conn, key);

    let to_error = |source: StorageError| match source {
        StorageError::NotFound { bucket, key } => CloudError::NotFound { bucket, key },
        source => CloudError::Download {
            key: full_key.clone(),
            source,
        },
    };

    let body = store.get(&full_key).await.map_err(to_error)?;
    let mut buffer = BytesMut::with_capacity(body.head.size.unwrap_or(0) as usize);
    let mut stream = body.stream;
    while let Some(chunk) = stream.try_next().await.map_err(to_error)? {
        buffer.extend_from_slice(&chunk);
    }

    debug!("Fetched {} ({} bytes)", full_key, buffer.len());
    Ok(buffer.freeze())
}

/// Decode PNG, JPEG or WebP bytes, applying EXIF orientation
pub fn decode_image(key: &str, data: &[u8]) -> Result<LoadedImage> {
    let decode_error = |e: image::ImageError| CloudError::Decode {
        key: key.to_string(),
        message: e.to_string(),
    };

    let mut decoder = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| CloudError::Decode {
            key: key.to_string(),
            message: e.to_string(),
        })?
        .into_decoder()
        .map_err(decode_error)?;
    let orientation = decoder.orientation().map_err(decode_error)?;

    let mut img = DynamicImage::from_decoder(decoder).map_err(decode_error)?;
    img.apply_orientation(orientation);

    let (width, height) = (img.width(), img.height());
    let image = ImageTensor {
        width,
        height,
        channels: 3,
        data: img.to_rgb32f().into_raw(),
    };

    let mask_data = if img.color().has_alpha() {
        img.to_rgba32f()
            .pixels()
            .map(|p| 1.0 - p.0[3])
            .collect()
    } else {
        vec![0.0; width as usize * height as usize]
    };

    Ok(LoadedImage {
        image,
        mask: ImageTensor {
            width,
            height,
            channels: 1,
            data: mask_data,
        },
    })
}

/// Fetch and decode an image
pub async fn load_image(conn: &ResolvedConnection, key: &str) -> Result<LoadedImage> {
    let data = load_bytes(conn, key).await?;
    let loaded = decode_image(&object_key(conn, key), &data)?;
    info!(
        "Loaded image {} ({}x{})",
        object_key(conn, key),
        loaded.image.width,
        loaded.image.height
    );
    Ok(loaded)
}

/// Change token for `key`: the remote ETag, or empty on any failure
///
/// Lets the host re-run a load when the remote object changes.
pub async fn fingerprint(conn: &ResolvedConnection, key: &str) -> String {
    let Ok(store) = conn.store() else {
        return String::new();
    };
    match store.head(&object_key(conn, key)).await {
        Ok(head) => head.etag.unwrap_or_default(),
        Err(e) => {
            debug!("Fingerprint for {} unavailable: {}", key, e);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_offset_past_u32_range() {
        let tensor = ImageTensor {
            width: 50_000,
            height: 50_000,
            channels: 3,
            data: Vec::new(),
        };
        assert_eq!(tensor.offset(49_999, 49_999, 2), 7_499_999_999);
        assert_eq!(tensor.offset(1, 2, 0), 150_006);
    }

    #[test]
    fn test_decode_rgb_png_has_zero_mask() {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(2, 1, Rgb([255, 0, 51]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);

        let loaded = decode_image("a.png", &bytes).unwrap();
        assert_eq!(loaded.image.shape(), [2, 3, 3]);
        assert_eq!(loaded.image.at(1, 2, 0), 1.0);
        assert_eq!(loaded.image.at(1, 2, 1), 0.0);
        assert!((loaded.image.at(1, 2, 2) - 0.2).abs() < 1e-6);
        assert_eq!(loaded.mask.shape(), [2, 3, 1]);
        assert!(loaded.mask.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_decode_alpha_becomes_inverted_mask() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([10, 20, 30, 255]));
        img.put_pixel(1, 0, Rgba([10, 20, 30, 0]));
        let bytes = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);

        let loaded = decode_image("a.png", &bytes).unwrap();
        assert_eq!(loaded.image.channels, 3);
        assert_eq!(loaded.mask.data, vec![0.0, 1.0]);
    }

    #[test]
    fn test_decode_jpeg() {
        let img = RgbImage::from_pixel(8, 4, Rgb([128, 128, 128]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);
        let loaded = decode_image("a.jpg", &bytes).unwrap();
        assert_eq!(loaded.image.shape(), [4, 8, 3]);
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode_image("notes.txt", b"definitely not an image").unwrap_err();
        assert!(matches!(err, CloudError::Decode { ref key, .. } if key == "notes.txt"));
    }
}
