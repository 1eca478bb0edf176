use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, ImageFormat, ImageOutputFormat};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::FaceError;

// Same quality a browser canvas uses for `toDataURL('image/jpeg')`.
const JPEG_QUALITY: u8 = 92;

/// Role of a registered person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Guest,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Guest => "guest",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = FaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "guest" => Ok(Role::Guest),
            "admin" => Ok(Role::Admin),
            other => Err(FaceError::InvalidArgument(format!("unknown role '{}'", other))),
        }
    }
}

/// An encoded raster image (JPEG, PNG, ...), kept as the exact bytes it was
/// received or produced with.
///
/// Serialises as a `data:` URL so a persisted database looks the same as one
/// written by the browser dashboard.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage(Vec<u8>);

impl EncodedImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Container format sniffed from the magic bytes.
    pub fn format(&self) -> Option<ImageFormat> {
        image::guess_format(&self.0).ok()
    }

    pub fn mime(&self) -> &'static str {
        match self.format() {
            Some(ImageFormat::Jpeg) => "image/jpeg",
            Some(ImageFormat::Png) => "image/png",
            Some(ImageFormat::WebP) => "image/webp",
            Some(ImageFormat::Gif) => "image/gif",
            Some(ImageFormat::Bmp) => "image/bmp",
            _ => "application/octet-stream",
        }
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.0)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime(), self.to_base64())
    }

    /// Parse a `data:<mime>;base64,<payload>` URL or a bare base64 payload.
    pub fn from_data_url(s: &str) -> Result<Self, FaceError> {
        let s = s.trim();
        let payload = match s.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest.split_once(',').ok_or_else(|| {
                    FaceError::InvalidArgument("data URL has no payload".to_string())
                })?;
                if !header.ends_with(";base64") {
                    return Err(FaceError::InvalidArgument(
                        "only base64 data URLs are supported".to_string(),
                    ));
                }
                payload
            }
            None => s,
        };
        let bytes = general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| FaceError::InvalidArgument(format!("invalid base64 image: {}", e)))?;
        if bytes.is_empty() {
            return Err(FaceError::InvalidArgument("empty image".to_string()));
        }
        Ok(Self(bytes))
    }

    pub fn decode(&self) -> anyhow::Result<DynamicImage> {
        Ok(image::load_from_memory(&self.0)?)
    }

    /// Encode `img` as `format`. Formats we cannot write fall back to PNG.
    pub fn encode(img: &DynamicImage, format: ImageFormat) -> anyhow::Result<Self> {
        let output = match format {
            ImageFormat::Jpeg => ImageOutputFormat::Jpeg(JPEG_QUALITY),
            ImageFormat::Bmp => ImageOutputFormat::Bmp,
            _ => ImageOutputFormat::Png,
        };
        // JPEG has no alpha channel
        let rgb;
        let src = if matches!(output, ImageOutputFormat::Jpeg(_)) {
            rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            &rgb
        } else {
            img
        };
        let mut bytes = Vec::new();
        src.write_to(&mut Cursor::new(&mut bytes), output)?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedImage({}, {} bytes)", self.mime(), self.0.len())
    }
}

impl Serialize for EncodedImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_url())
    }
}

impl<'de> Deserialize<'de> for EncodedImage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        EncodedImage::from_data_url(&s).map_err(serde::de::Error::custom)
    }
}

/// A registered person.
///
/// `embeddings[i]` was produced from `images[i]`. Images that failed to embed
/// during registration are kept for display after the embedded ones, so
/// `embeddings` can be shorter than `images`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub images: Vec<EncodedImage>,
    #[serde(default)]
    pub embeddings: Vec<Vec<f32>>,
}

impl Identity {
    pub fn summary(&self) -> IdentitySummary {
        IdentitySummary {
            id: self.id.clone(),
            name: self.name.clone(),
            role: self.role,
            image_count: self.images.len(),
            embedding_count: self.embeddings.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentitySummary {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub image_count: usize,
    pub embedding_count: usize,
}

/// One face box returned by the detector. `x`/`y` are the box centre in
/// source-image pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "class", default)]
    pub class: String,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Detection {
    pub fn left(&self) -> f32 {
        self.x - self.width / 2.0
    }

    pub fn top(&self) -> f32 {
        self.y - self.height / 2.0
    }

    pub fn right(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height / 2.0
    }
}
