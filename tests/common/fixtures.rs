use homeface_backend::models::{Detection, EncodedImage};
use homeface_backend::pipeline::VideoFrame;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

pub const FRAME_SIZE: u32 = 64;

/// A gradient so crops of different regions differ.
pub fn test_image(w: u32, h: u32) -> DynamicImage {
    let img = RgbImage::from_fn(w, h, |x, y| Rgb([(x * 4 % 256) as u8, (y * 4 % 256) as u8, 128]));
    DynamicImage::ImageRgb8(img)
}

pub fn png(w: u32, h: u32) -> EncodedImage {
    EncodedImage::encode(&test_image(w, h), ImageFormat::Png).unwrap()
}

pub fn jpeg(w: u32, h: u32) -> EncodedImage {
    EncodedImage::encode(&test_image(w, h), ImageFormat::Jpeg).unwrap()
}

/// Bytes that no decoder accepts.
pub fn garbage() -> EncodedImage {
    EncodedImage::new(b"definitely not an image".to_vec())
}

pub fn frame() -> VideoFrame {
    VideoFrame::new(test_image(FRAME_SIZE, FRAME_SIZE))
}

pub fn face(x: f32, y: f32, size: f32, confidence: f32) -> Detection {
    Detection {
        class: "face".to_string(),
        confidence,
        x,
        y,
        width: size,
        height: size,
    }
}

pub fn centred_face(confidence: f32) -> Detection {
    let c = FRAME_SIZE as f32 / 2.0;
    face(c, c, 20.0, confidence)
}
