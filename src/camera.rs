//! The camera seam for the capture listener. A [`Camera`] produces one
//! JPEG-encoded frame per call; the V4L2 backend opens and releases the
//! device inside the call, so a wedged capture never holds the webcam
//! between signals. [`TestCamera`] renders a synthetic frame for machines
//! without one.

use std::error::Error;
use std::fmt::Display;

/// Errors from a camera backend.
#[derive(Debug)]
pub enum CameraError {
    /// Device IO failed (open, format negotiation, or frame read).
    Io(std::io::Error),
    /// JPEG encoding of a synthetic frame failed.
    Encode(image::ImageError),
    /// The device would not negotiate a JPEG-compressed stream.
    UnsupportedFormat(String),
}

impl Display for CameraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#?}", self)
    }
}

impl Error for CameraError {}

impl From<std::io::Error> for CameraError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<image::ImageError> for CameraError {
    fn from(value: image::ImageError) -> Self {
        Self::Encode(value)
    }
}

/// A source of single JPEG frames.
pub trait Camera {
    /// Captures exactly one frame and returns its JPEG bytes.
    fn read_jpeg_frame(&mut self) -> Result<Vec<u8>, CameraError>;
}

impl<T: Camera + ?Sized> Camera for Box<T> {
    fn read_jpeg_frame(&mut self) -> Result<Vec<u8>, CameraError> {
        (**self).read_jpeg_frame()
    }
}

/// A [`Camera`] that renders a gradient test card, tinted differently on
/// every frame so successive captures are distinguishable.
#[derive(Debug)]
pub struct TestCamera {
    width: u32,
    height: u32,
    frame_count: u8,
}

impl TestCamera {
    /// A 640x480 test source.
    pub fn new() -> Self {
        Self {
            width: 640,
            height: 480,
            frame_count: 0,
        }
    }
}

impl Default for TestCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera for TestCamera {
    fn read_jpeg_frame(&mut self) -> Result<Vec<u8>, CameraError> {
        use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

        let tint = self.frame_count;
        self.frame_count = self.frame_count.wrapping_add(1);

        let frame = RgbImage::from_fn(self.width, self.height, |x, y| {
            Rgb([
                (x * 255 / self.width.max(1)) as u8,
                (y * 255 / self.height.max(1)) as u8,
                tint.wrapping_mul(16),
            ])
        });

        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(frame)
            .write_to(&mut std::io::Cursor::new(&mut jpeg), ImageFormat::Jpeg)?;
        Ok(jpeg)
    }
}

/// V4L2 webcam backend, compiled with the `v4l2` feature.
#[cfg(feature = "v4l2")]
pub mod v4l2 {
    use super::{Camera, CameraError};

    use log::debug;
    use v4l::buffer::Type;
    use v4l::io::mmap::Stream;
    use v4l::io::traits::CaptureStream;
    use v4l::video::Capture;
    use v4l::{Device, FourCC};

    /// A webcam addressed by its V4L2 device index. The device node is
    /// opened per capture and released when the call returns.
    #[derive(Debug, Clone, Copy)]
    pub struct V4l2Camera {
        index: usize,
    }

    impl V4l2Camera {
        /// A camera on `/dev/video<index>`.
        pub fn new(index: usize) -> Self {
            Self { index }
        }
    }

    impl Camera for V4l2Camera {
        fn read_jpeg_frame(&mut self) -> Result<Vec<u8>, CameraError> {
            let device = Device::new(self.index)?;

            let mut format = device.format()?;
            format.fourcc = FourCC::new(b"MJPG");
            let format = device.set_format(&format)?;
            if &format.fourcc.repr != b"MJPG" {
                return Err(CameraError::UnsupportedFormat(format.fourcc.to_string()));
            }
            debug!(
                "capturing {}x{} {} frame from /dev/video{}",
                format.width, format.height, format.fourcc, self.index
            );

            let mut stream = Stream::with_buffers(&device, Type::VideoCapture, 1)?;
            let (buffer, metadata) = stream.next()?;
            Ok(buffer[..metadata.bytesused as usize].to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Frames from the test source start with the JPEG magic bytes.
    #[test]
    fn test_synthetic_frame_is_jpeg() {
        let mut camera = TestCamera::new();
        let frame = camera.read_jpeg_frame().unwrap();
        assert_eq!(&frame[..2], &[0xFF, 0xD8]);
        assert_eq!(&frame[frame.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_successive_frames_differ() {
        let mut camera = TestCamera::new();
        let first = camera.read_jpeg_frame().unwrap();
        let second = camera.read_jpeg_frame().unwrap();
        assert_ne!(first, second);
    }
}
