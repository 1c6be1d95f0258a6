use std::io::Cursor;

use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader, RgbImage};
use ndarray::{Array3, Array4};
use serde::{Deserialize, Serialize};

use crate::config::PreprocessingConfig;

pub const INPUT_CHANNELS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("Could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Decoded image has no pixels")]
    EmptyImage,
    #[error("Expected 3 colour channels, image has {0}")]
    ChannelCount(u8),
    #[error("Cannot reshape pixels into an input batch: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Resampling used to bring decoded images to the model input size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Bilinear with half-pixel centres: `src = (dst + 0.5) * scale - 0.5`,
    /// clamped at the borders, rounded half up.
    #[default]
    Linear,
    /// `src = floor(dst * scale)`, clamped to the last pixel.
    Nearest,
}

/// Channel layout of the batch handed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Bgr,
    Rgb,
}

/// What to do with decoded images that are not 3-channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelPolicy {
    /// Grayscale is replicated, alpha is dropped, 16-bit is scaled to 8-bit.
    #[default]
    Convert,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceptedFormat {
    Jpeg,
    Png,
}

impl AcceptedFormat {
    pub fn image_format(self) -> ImageFormat {
        match self {
            AcceptedFormat::Jpeg => ImageFormat::Jpeg,
            AcceptedFormat::Png => ImageFormat::Png,
        }
    }
}

/// A batch of one `(1, height, width, 3)` u8 image, ready for the model.
#[derive(Debug, Clone)]
pub struct InputBatch {
    pixels: Array4<u8>,
}

impl InputBatch {
    pub fn new(pixels: Array4<u8>) -> Result<Self, PreprocessError> {
        let shape = pixels.shape();
        if shape[0] != 1 || shape[3] != INPUT_CHANNELS {
            return Err(PreprocessError::Shape(ndarray::ShapeError::from_kind(
                ndarray::ErrorKind::IncompatibleShape,
            )));
        }
        Ok(Self { pixels })
    }

    pub fn zeros(width: u32, height: u32) -> Self {
        Self {
            pixels: Array4::zeros((1, height as usize, width as usize, INPUT_CHANNELS)),
        }
    }

    /// `[batch, height, width, channels]`
    pub fn shape(&self) -> [usize; 4] {
        let shape = self.pixels.shape();
        [shape[0], shape[1], shape[2], shape[3]]
    }

    #[cfg(test)]
    pub fn view(&self) -> ndarray::ArrayView4<'_, u8> {
        self.pixels.view()
    }

    /// Row-major `f32` copy of the pixels, unscaled (`0.0..=255.0`).
    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.pixels.iter().map(|&v| f32::from(v)).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    width: u32,
    height: u32,
    interpolation: Interpolation,
    channel_order: ChannelOrder,
    channel_policy: ChannelPolicy,
    accepted_formats: Vec<ImageFormat>,
}

impl Preprocessor {
    pub fn new(config: &PreprocessingConfig) -> Self {
        let [width, height] = config.size;
        Self {
            width,
            height,
            interpolation: config.interpolation,
            channel_order: config.channel_order,
            channel_policy: config.channel_policy,
            accepted_formats: config
                .accepted_formats
                .iter()
                .map(|format| format.image_format())
                .collect(),
        }
    }

    /// `(width, height)` of the model input.
    pub fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn process(&self, bytes: &[u8]) -> Result<InputBatch, PreprocessError> {
        let image = self.decode(bytes)?;
        let pixels = self.resize(&image);
        Self::reshape(pixels)
    }

    /// Decodes an allowed format and applies its EXIF orientation, so the
    /// pixels are upright the way a photo viewer shows them.
    pub fn decode(&self, bytes: &[u8]) -> Result<RgbImage, PreprocessError> {
        let format = image::guess_format(bytes)?;
        if !self.accepted_formats.contains(&format) {
            return Err(PreprocessError::UnsupportedFormat(format!("{:?}", format)));
        }

        let mut decoder = ImageReader::with_format(Cursor::new(bytes), format).into_decoder()?;
        let orientation = decoder.orientation()?;
        let mut image = DynamicImage::from_decoder(decoder)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(PreprocessError::EmptyImage);
        }
        image.apply_orientation(orientation);

        let color = image.color();
        log::debug!(
            "Decoded {:?} image {}x{} ({:?}, {:?})",
            format,
            image.width(),
            image.height(),
            color,
            orientation
        );

        let channels = color.channel_count();
        if self.channel_policy == ChannelPolicy::Reject && usize::from(channels) != INPUT_CHANNELS {
            return Err(PreprocessError::ChannelCount(channels));
        }
        Ok(image.into_rgb8())
    }

    /// Resamples to the model input size and applies the channel order.
    /// The result has shape `(height, width, 3)`.
    pub fn resize(&self, image: &RgbImage) -> Array3<u8> {
        let (src_w, src_h) = image.dimensions();
        let (xs, ys) = match self.interpolation {
            Interpolation::Linear => (
                linear_taps(src_w, self.width),
                linear_taps(src_h, self.height),
            ),
            Interpolation::Nearest => (
                nearest_taps(src_w, self.width),
                nearest_taps(src_h, self.height),
            ),
        };

        let channel_map: [usize; INPUT_CHANNELS] = match self.channel_order {
            ChannelOrder::Bgr => [2, 1, 0],
            ChannelOrder::Rgb => [0, 1, 2],
        };

        let mut out = Array3::<u8>::zeros((self.height as usize, self.width as usize, INPUT_CHANNELS));
        for (dy, ty) in ys.iter().enumerate() {
            for (dx, tx) in xs.iter().enumerate() {
                let p00 = image.get_pixel(tx.lo, ty.lo).0;
                let p01 = image.get_pixel(tx.hi, ty.lo).0;
                let p10 = image.get_pixel(tx.lo, ty.hi).0;
                let p11 = image.get_pixel(tx.hi, ty.hi).0;
                for (c, &src_c) in channel_map.iter().enumerate() {
                    let top = lerp(p00[src_c], p01[src_c], tx.frac);
                    let bottom = lerp(p10[src_c], p11[src_c], tx.frac);
                    let value = top + (bottom - top) * ty.frac;
                    out[[dy, dx, c]] = (value + 0.5).floor().clamp(0.0, 255.0) as u8;
                }
            }
        }
        out
    }

    /// Views `(height, width, 3)` pixels as a batch of one.
    pub fn reshape(pixels: Array3<u8>) -> Result<InputBatch, PreprocessError> {
        let (height, width, _) = pixels.dim();
        let batch = pixels.into_shape_with_order((1, height, width, INPUT_CHANNELS))?;
        InputBatch::new(batch)
    }
}

/// Source sample positions for one output coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Tap {
    lo: u32,
    hi: u32,
    frac: f64,
}

fn lerp(a: u8, b: u8, t: f64) -> f64 {
    let a = f64::from(a);
    a + (f64::from(b) - a) * t
}

fn linear_taps(src_len: u32, dst_len: u32) -> Vec<Tap> {
    let scale = f64::from(src_len) / f64::from(dst_len);
    let last = src_len - 1;
    (0..dst_len)
        .map(|d| {
            let f = (f64::from(d) + 0.5) * scale - 0.5;
            let lo = f.floor();
            if lo < 0.0 {
                return Tap { lo: 0, hi: 0, frac: 0.0 };
            }
            let lo = lo as u32;
            if lo >= last {
                return Tap { lo: last, hi: last, frac: 0.0 };
            }
            Tap { lo, hi: lo + 1, frac: f - f64::from(lo) }
        })
        .collect()
}

fn nearest_taps(src_len: u32, dst_len: u32) -> Vec<Tap> {
    let scale = f64::from(src_len) / f64::from(dst_len);
    (0..dst_len)
        .map(|d| {
            let s = ((f64::from(d) * scale).floor() as u32).min(src_len - 1);
            Tap { lo: s, hi: s, frac: 0.0 }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::testing::{encode, solid_rgb};
    use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbaImage};

    fn preprocessor() -> Preprocessor {
        Preprocessor::new(&PreprocessingConfig::default())
    }

    fn with(config: impl FnOnce(&mut PreprocessingConfig)) -> Preprocessor {
        let mut cfg = PreprocessingConfig::default();
        config(&mut cfg);
        Preprocessor::new(&cfg)
    }

    #[test]
    fn jpeg_and_png_become_a_single_256_batch() {
        for (format, w, h) in [
            (ImageFormat::Png, 640, 480),
            (ImageFormat::Jpeg, 300, 200),
            (ImageFormat::Png, 17, 911),
            (ImageFormat::Jpeg, 256, 256),
        ] {
            let bytes = encode(solid_rgb(w, h, [10, 120, 30]), format);
            let batch = preprocessor().process(&bytes).unwrap();
            assert_eq!(batch.shape(), [1, 256, 256, 3], "{:?} {}x{}", format, w, h);
            assert_eq!(batch.to_f32_vec().len(), 256 * 256 * 3);
        }
    }

    #[test]
    fn default_channel_order_is_bgr() {
        let bytes = encode(solid_rgb(256, 256, [200, 100, 50]), ImageFormat::Png);

        let bgr = preprocessor().process(&bytes).unwrap();
        assert_eq!(bgr.view()[[0, 10, 10, 0]], 50);
        assert_eq!(bgr.view()[[0, 10, 10, 1]], 100);
        assert_eq!(bgr.view()[[0, 10, 10, 2]], 200);

        let rgb = with(|c| c.channel_order = ChannelOrder::Rgb).process(&bytes).unwrap();
        assert_eq!(rgb.view()[[0, 10, 10, 0]], 200);
        assert_eq!(rgb.view()[[0, 10, 10, 2]], 50);
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let err = preprocessor()
            .process(b"definitely not an image, just some text")
            .unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)), "{:?}", err);
    }

    #[test]
    fn truncated_png_is_a_decode_error() {
        let bytes = encode(solid_rgb(64, 64, [1, 2, 3]), ImageFormat::Png);
        let err = preprocessor().process(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)), "{:?}", err);
    }

    #[test]
    fn formats_outside_the_allow_list_are_rejected() {
        let err = preprocessor().process(b"GIF89a\x01\x00\x01\x00").unwrap_err();
        assert!(matches!(err, PreprocessError::UnsupportedFormat(_)), "{:?}", err);

        let png = encode(solid_rgb(8, 8, [0, 0, 0]), ImageFormat::Png);
        let jpeg_only = with(|c| c.accepted_formats = vec![AcceptedFormat::Jpeg]);
        assert!(matches!(
            jpeg_only.process(&png),
            Err(PreprocessError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn grayscale_is_replicated_under_convert_policy() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 40, Luma([77])));
        let batch = preprocessor().process(&encode(gray, ImageFormat::Png)).unwrap();

        assert_eq!(batch.shape(), [1, 256, 256, 3]);
        assert!(batch.view().iter().all(|&v| v == 77));
    }

    #[test]
    fn grayscale_is_rejected_under_reject_policy() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 40, Luma([77])));
        let err = with(|c| c.channel_policy = ChannelPolicy::Reject)
            .process(&encode(gray, ImageFormat::Png))
            .unwrap_err();
        assert!(matches!(err, PreprocessError::ChannelCount(1)), "{:?}", err);
    }

    #[test]
    fn sixteen_bit_is_scaled_to_eight_bit() {
        let deep = DynamicImage::ImageLuma16(ImageBuffer::from_pixel(20, 20, Luma([0xFFFFu16])));
        let bytes = encode(deep, ImageFormat::Png);

        let batch = preprocessor().process(&bytes).unwrap();
        assert_eq!(batch.shape(), [1, 256, 256, 3]);
        assert!(batch.view().iter().all(|&v| v == 255));

        let err = with(|c| c.channel_policy = ChannelPolicy::Reject)
            .process(&bytes)
            .unwrap_err();
        assert!(matches!(err, PreprocessError::ChannelCount(1)), "{:?}", err);
    }

    /// Inserts an EXIF APP1 segment carrying only an Orientation tag right
    /// after the JPEG start-of-image marker.
    fn with_exif_orientation(jpeg: &[u8], orientation: u8) -> Vec<u8> {
        let mut exif = b"Exif\0\0".to_vec();
        // Big-endian TIFF header, first IFD at offset 8.
        exif.extend_from_slice(b"MM\0\x2a\0\0\0\x08");
        // One entry: tag 0x0112, type SHORT, count 1, value.
        exif.extend_from_slice(&[0x00, 0x01, 0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
        exif.extend_from_slice(&[0x00, orientation, 0x00, 0x00]);
        exif.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        let segment_len = (exif.len() + 2) as u16;
        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&segment_len.to_be_bytes());
        out.extend_from_slice(&exif);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn exif_orientation_is_applied() {
        let jpeg = encode(solid_rgb(40, 20, [30, 140, 60]), ImageFormat::Jpeg);
        assert_eq!(preprocessor().decode(&jpeg).unwrap().dimensions(), (40, 20));

        let rotated = with_exif_orientation(&jpeg, 6);
        assert_eq!(preprocessor().decode(&rotated).unwrap().dimensions(), (20, 40));

        let upright = with_exif_orientation(&jpeg, 1);
        assert_eq!(preprocessor().decode(&upright).unwrap().dimensions(), (40, 20));
    }

    #[test]
    fn alpha_is_dropped_or_rejected() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            32,
            32,
            image::Rgba([9, 8, 7, 0]),
        ));
        let bytes = encode(rgba, ImageFormat::Png);

        let batch = preprocessor().process(&bytes).unwrap();
        assert_eq!(batch.shape(), [1, 256, 256, 3]);
        assert_eq!(batch.view()[[0, 0, 0, 0]], 7);
        assert_eq!(batch.view()[[0, 0, 0, 2]], 9);

        let err = with(|c| c.channel_policy = ChannelPolicy::Reject)
            .process(&bytes)
            .unwrap_err();
        assert!(matches!(err, PreprocessError::ChannelCount(4)));
    }

    #[test]
    fn linear_upscale_uses_half_pixel_centres() {
        let mut src = RgbImage::new(2, 1);
        src.put_pixel(0, 0, Rgb([0, 0, 0]));
        src.put_pixel(1, 0, Rgb([100, 100, 100]));

        let pre = with(|c| {
            c.size = [4, 1];
            c.channel_order = ChannelOrder::Rgb;
        });
        let row: Vec<u8> = pre.resize(&src).slice(ndarray::s![0, .., 0]).to_vec();
        assert_eq!(row, vec![0, 25, 75, 100]);
    }

    #[test]
    fn linear_downscale_averages_neighbours() {
        let mut src = RgbImage::new(4, 1);
        for (x, v) in [0u8, 100, 200, 250].into_iter().enumerate() {
            src.put_pixel(x as u32, 0, Rgb([v, v, v]));
        }

        let pre = with(|c| c.size = [2, 1]);
        let row: Vec<u8> = pre.resize(&src).slice(ndarray::s![0, .., 1]).to_vec();
        assert_eq!(row, vec![50, 225]);
    }

    #[test]
    fn nearest_picks_floor_sample() {
        let mut src = RgbImage::new(4, 1);
        for (x, v) in [10u8, 20, 30, 40].into_iter().enumerate() {
            src.put_pixel(x as u32, 0, Rgb([v, v, v]));
        }

        let pre = with(|c| {
            c.size = [2, 1];
            c.interpolation = Interpolation::Nearest;
        });
        let row: Vec<u8> = pre.resize(&src).slice(ndarray::s![0, .., 0]).to_vec();
        assert_eq!(row, vec![10, 30]);
    }

    #[test]
    fn same_size_resize_is_identity() {
        let mut src = RgbImage::new(3, 2);
        for (i, px) in src.pixels_mut().enumerate() {
            *px = Rgb([i as u8 * 10, i as u8 * 20, i as u8 * 30]);
        }
        let pre = with(|c| {
            c.size = [3, 2];
            c.channel_order = ChannelOrder::Rgb;
        });
        let out = pre.resize(&src);
        for (x, y, px) in src.enumerate_pixels() {
            for c in 0..3 {
                assert_eq!(out[[y as usize, x as usize, c]], px[c]);
            }
        }
    }

    #[test]
    fn reshape_requires_three_channels() {
        let two_channel = Array3::<u8>::zeros((256, 256, 2));
        assert!(matches!(
            Preprocessor::reshape(two_channel),
            Err(PreprocessError::Shape(_))
        ));

        let ok = Preprocessor::reshape(Array3::<u8>::zeros((256, 256, 3))).unwrap();
        assert_eq!(ok.shape(), [1, 256, 256, 3]);
    }
}
