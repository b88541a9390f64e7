//! 表示側の状態管理
//!
//! 選択中の画像・同梱画像の現在位置・最後に表示したラベルを保持します。
//! 取得・変換・推論の失敗はここで吸収し、ログに残してラベルを据え置きます。

use base64::Engine as _;
use image::ImageFormat;
use std::io::Cursor;
use std::path::Path;

use crate::acquirer::{read_file_bytes, BundledGallery, ImageAcquirer};
use crate::error::{ClassifierError, Result};
use crate::model::AppConfig;
use crate::pipeline::InferencePipeline;
use crate::types::{PredictionResult, SourceImage};

/// プレビュー表示の枠（アスペクト比を保って収める）
pub const PREVIEW_SIZE: u32 = 250;

/// ピッカーで選ばれた画像（デコードは推論・プレビュー時に行う）
#[derive(Debug, Clone)]
struct SelectedImage {
    bytes: Vec<u8>,
    origin: String,
}

pub struct ClassificationSession {
    pipeline: InferencePipeline,
    acquirer: ImageAcquirer,
    gallery: BundledGallery,
    selected: Option<SelectedImage>,
    label: String,
    last_prediction: Option<PredictionResult>,
}

impl ClassificationSession {
    pub fn new(pipeline: InferencePipeline, acquirer: ImageAcquirer, gallery: BundledGallery) -> Self {
        Self {
            pipeline,
            acquirer,
            gallery,
            selected: None,
            label: String::new(),
            last_prediction: None,
        }
    }

    /// 設定から取得側を組み立てる
    pub fn from_config(config: &AppConfig, pipeline: InferencePipeline) -> Self {
        Self::new(
            pipeline,
            ImageAcquirer::new(config.conversion.max_decoded_pixels),
            BundledGallery::from_settings(&config.gallery),
        )
    }

    /// 表示中のラベル（推論前は空文字）
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn last_prediction(&self) -> Option<&PredictionResult> {
        self.last_prediction.as_ref()
    }

    pub fn pipeline(&self) -> &InferencePipeline {
        &self.pipeline
    }

    pub fn gallery(&self) -> &BundledGallery {
        &self.gallery
    }

    pub fn has_selection(&self) -> bool {
        self.selected.is_some()
    }

    /// ピッカーから受け取ったバイト列を選択状態にする
    pub fn select_image_bytes(&mut self, bytes: Vec<u8>, origin: impl Into<String>) {
        let origin = origin.into();
        log::info!("画像を選択しました: {} ({} bytes)", origin, bytes.len());
        self.selected = Some(SelectedImage { bytes, origin });
    }

    /// ピッカーで選ばれたファイルを非同期に読み込んで選択状態にする
    pub async fn select_image_file(&mut self, path: &Path) -> Result<()> {
        let bytes = read_file_bytes(path).await?;
        self.select_image_bytes(bytes, path.display().to_string());
        Ok(())
    }

    /// 同梱画像を選択（ピッカーの選択は解除）
    pub fn select_bundled(&mut self, index: usize) -> Result<usize> {
        let index = self.gallery.select(index)?;
        self.selected = None;
        Ok(index)
    }

    pub fn show_next(&mut self) -> Result<usize> {
        let index = self.gallery.next()?;
        self.selected = None;
        Ok(index)
    }

    pub fn show_previous(&mut self) -> Result<usize> {
        let index = self.gallery.previous()?;
        self.selected = None;
        Ok(index)
    }

    /// 現在の入力画像を取得（選択画像が優先、なければ同梱画像）
    pub fn current_source(&self) -> Result<SourceImage> {
        match &self.selected {
            Some(selected) => self.acquirer.decode(&selected.bytes, &selected.origin),
            None => self.gallery.load_current(&self.acquirer),
        }
    }

    /// 推論して結果を返す（状態は変更しない）
    pub fn try_predict(&self) -> Result<PredictionResult> {
        let source = self.current_source()?;
        self.pipeline.predict(&source)
    }

    /// 推論してラベルを更新する
    ///
    /// 失敗した場合はログに残し、ラベルは前回の値のまま返す
    pub fn predict_selected(&mut self) -> &str {
        match self.try_predict() {
            Ok(result) => {
                self.label = result.label().to_string();
                self.last_prediction = Some(result);
            }
            Err(ClassifierError::ModelUnavailable) => {
                log::warn!("分類器が読み込まれていないため推論をスキップしました");
            }
            Err(e) => {
                log::warn!("推論を中止しました [{}]: {}", e.stage(), e);
            }
        }
        &self.label
    }

    /// 選択中の画像をPNGのdata URLで返す（250x250に収まるよう縮小）
    pub fn preview_data_url(&self) -> Option<String> {
        let source = match self.current_source() {
            Ok(source) => source,
            Err(e) => {
                log::debug!("プレビューを作成できません: {}", e);
                return None;
            }
        };

        let thumbnail = source.image.thumbnail(PREVIEW_SIZE, PREVIEW_SIZE);
        let mut png_data = Vec::new();
        if let Err(e) = thumbnail.write_to(&mut Cursor::new(&mut png_data), ImageFormat::Png) {
            log::warn!("プレビューのPNGエンコードに失敗: {}", e);
            return None;
        }

        let base64_data = base64::engine::general_purpose::STANDARD.encode(&png_data);
        Some(format!("data:image/png;base64,{}", base64_data))
    }
}
