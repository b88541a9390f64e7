//! 推論パイプライン
//!
//! `SourceImage` を分類器の入力形式に変換し、1回だけ推論してラベルを確定します。
//! リトライ・バッチ・結果のキャッシュは行わず、呼び出しごとに再計算します。

use std::sync::Arc;

use crate::classifier::ImageClassifier;
use crate::error::{ClassifierError, Result};
use crate::model::ResizeFilter;
use crate::pixel_buffer;
use crate::types::{PixelBufferSpec, PredictionResult, SourceImage};

pub struct InferencePipeline {
    /// 起動時に読み込んだ分類器（読み込み失敗時は `None`）
    classifier: Option<Arc<dyn ImageClassifier>>,
    resize_filter: ResizeFilter,
}

impl InferencePipeline {
    pub fn new(classifier: Option<Arc<dyn ImageClassifier>>) -> Self {
        Self {
            classifier,
            resize_filter: ResizeFilter::default(),
        }
    }

    pub fn with_resize_filter(mut self, filter: ResizeFilter) -> Self {
        self.resize_filter = filter;
        self
    }

    /// 分類器の読み込み結果からパイプラインを作る
    ///
    /// 読み込みに失敗した場合はログに残し、分類器なしで続行する（以降の推論は何もしない）
    pub fn from_load_result<C>(loaded: Result<C>) -> Self
    where
        C: ImageClassifier + 'static,
    {
        match loaded {
            Ok(classifier) => {
                log::info!("分類器を読み込みました: {}", classifier.name());
                Self::new(Some(Arc::new(classifier)))
            }
            Err(e) => {
                log::error!("分類器を読み込めませんでした。推論は無効になります: {}", e);
                Self::new(None)
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn input_spec(&self) -> Option<PixelBufferSpec> {
        self.classifier.as_ref().map(|c| c.input_spec())
    }

    pub fn classifier_name(&self) -> Option<&str> {
        self.classifier.as_deref().map(|c| c.name())
    }

    /// 1枚の画像を分類する
    ///
    /// ラベルが得られない場合は "Unknown" を返す。変換・推論の失敗はエラーとして返す
    pub fn predict(&self, image: &SourceImage) -> Result<PredictionResult> {
        let classifier = self.classifier.as_ref().ok_or(ClassifierError::ModelUnavailable)?;

        let spec = classifier.input_spec();
        let buffer = pixel_buffer::convert(image, spec, self.resize_filter)?;

        let output = classifier.prediction(&buffer)?;
        let result = PredictionResult::from_target(output.target);

        log::info!(
            "推論結果: {} ({}, {})",
            result.label(),
            image.origin,
            classifier.name()
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassifierOutput;
    use crate::pixel_buffer::NormalizedPixelBuffer;
    use image::{DynamicImage, RgbImage};

    struct FailingClassifier;

    impl ImageClassifier for FailingClassifier {
        fn input_spec(&self) -> PixelBufferSpec {
            PixelBufferSpec::argb(8, 8)
        }

        fn prediction(&self, _buffer: &NormalizedPixelBuffer) -> Result<ClassifierOutput> {
            Err(ClassifierError::Inference("backend exploded".to_string()))
        }
    }

    struct ZeroSizedClassifier;

    impl ImageClassifier for ZeroSizedClassifier {
        fn input_spec(&self) -> PixelBufferSpec {
            PixelBufferSpec::argb(0, 0)
        }

        fn prediction(&self, _buffer: &NormalizedPixelBuffer) -> Result<ClassifierOutput> {
            Ok(ClassifierOutput::label("never"))
        }
    }

    fn image() -> SourceImage {
        SourceImage::new(DynamicImage::ImageRgb8(RgbImage::new(3, 5)), "test")
    }

    #[test]
    fn test_without_classifier() {
        let pipeline = InferencePipeline::new(None);
        assert!(!pipeline.is_ready());
        assert!(matches!(pipeline.predict(&image()), Err(ClassifierError::ModelUnavailable)));
    }

    #[test]
    fn test_failed_load_disables_pipeline() {
        let pipeline =
            InferencePipeline::from_load_result::<FailingClassifier>(Err(ClassifierError::ModelLoad("missing".into())));
        assert!(!pipeline.is_ready());
        assert_eq!(pipeline.input_spec(), None);
    }

    #[test]
    fn test_inference_failure_is_returned() {
        let pipeline = InferencePipeline::new(Some(Arc::new(FailingClassifier)));
        assert!(matches!(pipeline.predict(&image()), Err(ClassifierError::Inference(_))));
    }

    #[test]
    fn test_conversion_failure_is_returned() {
        let pipeline = InferencePipeline::new(Some(Arc::new(ZeroSizedClassifier)));
        assert!(matches!(pipeline.predict(&image()), Err(ClassifierError::Conversion(_))));
    }
}
