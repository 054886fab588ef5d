use crate::{Error, Result};
use image::imageops::FilterType;
use tracing::debug;

/// Side length of the square model input.
pub const INPUT_SIZE: u32 = 224;

/// Batch of one RGB image in NHWC layout, channels scaled to [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    pub shape: [usize; 4],
    pub data: Vec<f32>,
}

impl InputTensor {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

pub fn decode_image(bytes: &[u8]) -> Result<image::DynamicImage> {
    if bytes.is_empty() {
        return Err(Error::ImageDecode("the uploaded image is empty".to_string()));
    }
    image::load_from_memory(bytes).map_err(|e| Error::ImageDecode(e.to_string()))
}

/// Decodes, resizes to [`INPUT_SIZE`] squared and normalizes `x / 127.5 - 1`.
/// Aspect ratio is not preserved.
pub fn preprocess(bytes: &[u8]) -> Result<InputTensor> {
    let decoded = decode_image(bytes)?;
    debug!(
        "Decoded image {}x{}",
        decoded.width(),
        decoded.height()
    );

    let rgb = decoded.to_rgb8();
    let resized = image::imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

    let side = INPUT_SIZE as usize;
    let data: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|channel| f32::from(channel) / 127.5 - 1.0)
        .collect();

    Ok(InputTensor {
        shape: [1, side, side, 3],
        data,
    })
}
