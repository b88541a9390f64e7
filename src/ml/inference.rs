//! モデル推論機能

use anyhow::Context;
use burn::{
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{backend::Backend, ElementConversion, Tensor},
};
use burn_ndarray::{NdArray, NdArrayDevice};
use burn_wgpu::{Wgpu, WgpuDevice};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::classifier::{ClassifierOutput, ImageClassifier};
use crate::error::{ClassifierError, Result};
use crate::ml::{normalize_pixel_buffer, BreedClassifierNet, ModelConfig};
use crate::model::{load_model_with_metadata, save_model_with_metadata, DeviceType, InferenceConfig, ModelMetadata};
use crate::pixel_buffer::NormalizedPixelBuffer;
use crate::types::PixelBufferSpec;

/// 推論エンジン
///
/// 起動時に一度だけ読み込み、以降は読み取り専用で使います。
/// burnのモジュールは `Sync` ではないため、モデル本体は `Mutex` で保持します。
pub enum InferenceEngine {
    /// CPU (NdArray) バックエンド
    NdArray {
        model: Mutex<BreedClassifierNet<NdArray>>,
        device: NdArrayDevice,
        config: InferenceConfig,
    },
    /// GPU (WGPU) バックエンド
    Wgpu {
        model: Mutex<BreedClassifierNet<Wgpu>>,
        device: WgpuDevice,
        config: InferenceConfig,
    },
}

impl InferenceEngine {
    /// モデルを読み込んで推論エンジンを初期化
    pub fn load<P: AsRef<Path>>(model_path: P, device_type: DeviceType) -> Result<Self> {
        let model_path = model_path.as_ref();
        Self::try_load(model_path, device_type).map_err(|e| {
            ClassifierError::ModelLoad(format!("{}: {:#}", model_path.display(), e))
        })
    }

    fn try_load(model_path: &Path, device_type: DeviceType) -> anyhow::Result<Self> {
        let (metadata, model_binary) = load_model_with_metadata(model_path)?;
        let config = InferenceConfig::from_metadata(&metadata);

        let engine = match device_type {
            DeviceType::Cpu => {
                let device = NdArrayDevice::default();
                let model = restore_model::<NdArray>(&config, model_binary, &device)?;
                InferenceEngine::NdArray {
                    model: Mutex::new(model),
                    device,
                    config,
                }
            }
            DeviceType::Wgpu => {
                let device = WgpuDevice::default();
                let model = restore_model::<Wgpu>(&config, model_binary, &device)?;
                InferenceEngine::Wgpu {
                    model: Mutex::new(model),
                    device,
                    config,
                }
            }
        };

        log::info!(
            "推論エンジンを初期化しました: {} ({}, {}クラス, 入力 {}x{})",
            metadata.model_name,
            device_type,
            engine.config().num_classes(),
            engine.config().input_width,
            engine.config().input_height
        );

        Ok(engine)
    }

    /// InferenceConfigへの参照を取得
    pub fn config(&self) -> &InferenceConfig {
        match self {
            InferenceEngine::NdArray { config, .. } => config,
            InferenceEngine::Wgpu { config, .. } => config,
        }
    }

    pub fn device_type(&self) -> DeviceType {
        match self {
            InferenceEngine::NdArray { .. } => DeviceType::Cpu,
            InferenceEngine::Wgpu { .. } => DeviceType::Wgpu,
        }
    }

    /// 単一バッファを分類し、クラスインデックスを返す
    pub fn classify_index(&self, buffer: &NormalizedPixelBuffer) -> Result<usize> {
        let spec = self.input_spec();
        if !buffer.matches(spec) {
            return Err(ClassifierError::Conversion(format!(
                "入力バッファの形式が一致しません: {:?} (期待: {:?})",
                buffer.spec(),
                spec
            )));
        }

        match self {
            InferenceEngine::NdArray { model, device, .. } => classify_with(model, device, buffer),
            InferenceEngine::Wgpu { model, device, .. } => classify_with(model, device, buffer),
        }
    }
}

impl ImageClassifier for InferenceEngine {
    fn input_spec(&self) -> PixelBufferSpec {
        self.config().input_spec()
    }

    fn prediction(&self, buffer: &NormalizedPixelBuffer) -> Result<ClassifierOutput> {
        let class_idx = self.classify_index(buffer)?;
        let target = self.config().class_index_to_label(class_idx);
        if target.is_none() {
            log::warn!("クラスインデックス {} に対応するラベルがありません", class_idx);
        }
        Ok(ClassifierOutput { target })
    }

    fn name(&self) -> &str {
        match self {
            InferenceEngine::NdArray { .. } => "burn-ndarray",
            InferenceEngine::Wgpu { .. } => "burn-wgpu",
        }
    }
}

/// モデル構造を初期化し、保存済みの重みを復元
fn restore_model<B: Backend>(
    config: &InferenceConfig,
    model_binary: Vec<u8>,
    device: &B::Device,
) -> anyhow::Result<BreedClassifierNet<B>> {
    let model = model_config_for(config).try_init::<B>(device)?;

    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    let record = recorder
        .load(model_binary, device)
        .map_err(|e| anyhow::anyhow!("モデル重みの読み込みエラー: {:?}", e))?;

    Ok(model.load_record(record))
}

fn model_config_for(config: &InferenceConfig) -> ModelConfig {
    ModelConfig::new(config.num_classes())
        .with_input_width(config.input_width as usize)
        .with_input_height(config.input_height as usize)
}

fn classify_with<B: Backend>(
    model: &Mutex<BreedClassifierNet<B>>,
    device: &B::Device,
    buffer: &NormalizedPixelBuffer,
) -> Result<usize> {
    let height = buffer.height() as usize;
    let width = buffer.width() as usize;
    let image_data = normalize_pixel_buffer(buffer);

    // Tensorに変換 [1, 3, H, W]
    let tensor = Tensor::<B, 1>::from_floats(image_data.as_slice(), device).reshape([1, 3, height, width]);

    let model = model
        .lock()
        .map_err(|_| ClassifierError::Inference("モデルのロックが破損しています".to_string()))?;

    let predicted = model.predict(tensor);
    let class_idx = predicted.flatten::<1>(0, 1).into_scalar().elem::<i64>();

    usize::try_from(class_idx)
        .map_err(|_| ClassifierError::Inference(format!("不正なクラスインデックス: {}", class_idx)))
}

/// 学習前の重みでモデルファイルを書き出す（動作確認用）
pub fn export_untrained_bundle(
    output_path: &Path,
    class_labels: Vec<String>,
    input_width: u32,
    input_height: u32,
) -> anyhow::Result<PathBuf> {
    let device = NdArrayDevice::default();
    let model = ModelConfig::new(class_labels.len())
        .with_input_width(input_width as usize)
        .with_input_height(input_height as usize)
        .try_init::<NdArray>(&device)?;

    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    let model_binary = recorder
        .record(model.into_record(), ())
        .map_err(|e| anyhow::anyhow!("モデル重みの書き出しエラー: {:?}", e))?;

    let metadata = ModelMetadata::new("CatBreedClassifier", class_labels, input_width, input_height);
    save_model_with_metadata(output_path, &metadata, &model_binary)
        .context("Failed to write model bundle")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DEFAULT_SAMPLE_NAMES;

    fn breed_labels() -> Vec<String> {
        DEFAULT_SAMPLE_NAMES
            .iter()
            .map(|name| name.rsplit_once('_').map(|(breed, _)| breed).unwrap_or(name).to_string())
            .collect()
    }

    fn bundle(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("catbreed_engine_{}_{}", name, std::process::id()));
        export_untrained_bundle(&dir.join("model.tar.gz"), breed_labels(), 24, 24).unwrap()
    }

    #[test]
    fn test_load_and_predict_deterministically() {
        let path = bundle("predict");
        let engine = InferenceEngine::load(&path, DeviceType::Cpu).unwrap();
        assert_eq!(engine.device_type(), DeviceType::Cpu);
        assert_eq!(engine.input_spec(), PixelBufferSpec::argb(24, 24));

        let buffer = NormalizedPixelBuffer::allocate(engine.input_spec()).unwrap();
        let first = engine.prediction(&buffer).unwrap();
        let second = engine.prediction(&buffer).unwrap();

        let label = first.target.clone().unwrap();
        assert!(breed_labels().contains(&label));
        assert_eq!(first, second);

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_mismatched_buffer_is_rejected() {
        let path = bundle("mismatch");
        let engine = InferenceEngine::load(&path, DeviceType::Cpu).unwrap();
        let buffer = NormalizedPixelBuffer::allocate(PixelBufferSpec::argb(32, 32)).unwrap();
        assert!(matches!(engine.prediction(&buffer), Err(ClassifierError::Conversion(_))));

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_missing_bundle_is_model_load_error() {
        let result = InferenceEngine::load("no/such/model.tar.gz", DeviceType::Cpu);
        assert!(matches!(result, Err(ClassifierError::ModelLoad(_))));
    }
}
