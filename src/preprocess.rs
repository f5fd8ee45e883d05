use image::{imageops::FilterType, DynamicImage, ImageError};
use ndarray::Array4;

/// Side length of the square model input.
pub const INPUT_SIZE: u32 = 224;
pub const CHANNELS: usize = 3;

// Bicubic, the resize default of the toolchain the model was trained with.
const RESAMPLE_FILTER: FilterType = FilterType::CatmullRom;

/// Decodes raw upload bytes, guessing the format from the content.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    image::load_from_memory(bytes)
}

/// Maps a decoded image to the model input: NHWC `(1, 224, 224, 3)`, RGB,
/// values in `[0.0, 1.0]`.
///
/// Alpha is dropped and grayscale is expanded to RGB before resizing. The
/// resize is exact, so non-square images are stretched rather than cropped.
pub fn preprocess(image: &DynamicImage) -> Array4<f32> {
    let rgb = image.to_rgb8();
    let resized = image::imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, RESAMPLE_FILTER);

    let side = INPUT_SIZE as usize;
    Array4::from_shape_fn((1, side, side, CHANNELS), |(_, y, x, c)| {
        resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    })
}
