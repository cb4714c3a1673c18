use crate::extractor::{ColorLayoutExtractor, FeatureExtractor};
use crate::preprocess::{ImageTensor, PreprocessConfig, Preprocessor};
use image::DynamicImage;
use imgsim_core::{Error, ExtractorStamp, Result, Vector};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation for an in-flight embedding.
///
/// Checked between decode, normalize and extract.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// The one image → embedding path used by both index build and queries.
#[derive(Clone)]
pub struct Pipeline {
    preprocessor: Preprocessor,
    extractor: Arc<dyn FeatureExtractor>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stamp", &self.stamp().to_string())
            .finish()
    }
}

impl Pipeline {
    /// Pair a preprocessor with an extractor, rejecting tensors the extractor cannot take
    pub fn new(preprocessor: Preprocessor, extractor: Arc<dyn FeatureExtractor>) -> Result<Self> {
        let size = preprocessor.config().image_size as usize;
        let min = extractor.min_input_size();
        if size < min {
            return Err(Error::InvalidConfig(format!(
                "image size {} is below the {}px minimum of {}",
                size,
                min,
                extractor.descriptor().id()
            )));
        }
        Ok(Self {
            preprocessor,
            extractor,
        })
    }

    /// Default preprocessing with the built-in colour-layout extractor
    pub fn with_defaults() -> Result<Self> {
        Self::from_config(PreprocessConfig::default())
    }

    pub fn from_config(config: PreprocessConfig) -> Result<Self> {
        Self::new(
            Preprocessor::new(config)?,
            Arc::new(ColorLayoutExtractor::default()),
        )
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn stamp(&self) -> ExtractorStamp {
        let descriptor = self.extractor.descriptor();
        ExtractorStamp::new(descriptor.id(), descriptor.dim, self.preprocessor.fingerprint())
    }

    /// Run the extractor and hold it to its declared contract
    pub fn embed_tensor(&self, tensor: &ImageTensor) -> Result<Vector> {
        let vector = self.extractor.embed(tensor)?;
        let expected = self.extractor.descriptor().dim;
        if vector.dim() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: vector.dim(),
            });
        }
        if !vector.is_finite() {
            return Err(Error::Extraction("extractor produced non-finite values".into()));
        }
        Ok(vector)
    }

    pub fn embed_image(&self, image: &DynamicImage) -> Result<Vector> {
        self.embed_tensor(&self.preprocessor.normalize(image))
    }

    pub fn embed_bytes(&self, bytes: &[u8]) -> Result<Vector> {
        self.embed_bytes_cancellable(bytes, &CancellationFlag::new())
    }

    pub fn embed_bytes_cancellable(&self, bytes: &[u8], cancel: &CancellationFlag) -> Result<Vector> {
        cancel.check()?;
        let image = Preprocessor::decode(bytes)?;
        cancel.check()?;
        let tensor = self.preprocessor.normalize(&image);
        cancel.check()?;
        self.embed_tensor(&tensor)
    }

    pub fn embed_path(&self, path: &Path) -> Result<Vector> {
        let image = Preprocessor::decode_path(path)?;
        self.embed_image(&image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ExtractorDescriptor;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    struct BrokenExtractor {
        declared: usize,
        produced: Vec<f32>,
    }

    impl FeatureExtractor for BrokenExtractor {
        fn descriptor(&self) -> ExtractorDescriptor {
            ExtractorDescriptor {
                name: "broken".into(),
                version: 1,
                dim: self.declared,
            }
        }

        fn embed(&self, _tensor: &ImageTensor) -> Result<Vector> {
            Ok(Vector::new(self.produced.clone()))
        }
    }

    fn small_pipeline() -> Pipeline {
        Pipeline::from_config(PreprocessConfig {
            image_size: 16,
            ..Default::default()
        })
        .unwrap()
    }

    fn png(rgb: [u8; 3]) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 20, Rgb(rgb)));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_stamp_includes_extractor_and_preprocess() {
        let stamp = small_pipeline().stamp();
        assert_eq!(stamp.extractor, "color-layout/v1");
        assert_eq!(stamp.dim, 66);
        assert!(stamp.preprocess.contains("16x16"));
    }

    #[test]
    fn test_bytes_and_image_agree() {
        let pipeline = small_pipeline();
        let bytes = png([200, 30, 30]);
        let image = Preprocessor::decode(&bytes).unwrap();
        assert_eq!(pipeline.embed_bytes(&bytes).unwrap(), pipeline.embed_image(&image).unwrap());
    }

    #[test]
    fn test_unsupported_bytes() {
        let err = small_pipeline().embed_bytes(b"GIF89a-but-not-really").unwrap_err();
        assert!(matches!(err, Error::UnsupportedImage(_)));
    }

    #[test]
    fn test_cancelled_before_work() {
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let err = small_pipeline()
            .embed_bytes_cancellable(&png([1, 2, 3]), &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_image_size_below_grid_rejected() {
        for image_size in [2, 3] {
            let err = Pipeline::from_config(PreprocessConfig {
                image_size,
                ..Default::default()
            })
            .unwrap_err();
            assert!(matches!(err, Error::InvalidConfig(_)));
        }
        assert!(Pipeline::from_config(PreprocessConfig {
            image_size: 4,
            ..Default::default()
        })
        .is_ok());
    }

    #[test]
    fn test_extractor_contract_enforced() {
        let pre = Preprocessor::new(PreprocessConfig {
            image_size: 4,
            ..Default::default()
        })
        .unwrap();

        let short = Pipeline::new(
            pre.clone(),
            Arc::new(BrokenExtractor {
                declared: 3,
                produced: vec![1.0, 2.0],
            }),
        )
        .unwrap();
        assert!(matches!(
            short.embed_bytes(&png([0, 0, 0])),
            Err(Error::DimensionMismatch { expected: 3, actual: 2 })
        ));

        let nan = Pipeline::new(
            pre,
            Arc::new(BrokenExtractor {
                declared: 2,
                produced: vec![1.0, f32::NAN],
            }),
        )
        .unwrap();
        assert!(matches!(nan.embed_bytes(&png([0, 0, 0])), Err(Error::Extraction(_))));
    }
}
