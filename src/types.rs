use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

/// ラベルが得られなかったときに表示する値
pub const UNKNOWN_LABEL: &str = "Unknown";

/// デコード済みの入力画像（1回の推論要求の間だけ保持）
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub image: DynamicImage,
    /// 取得元（ファイルパス、同梱画像名など）
    pub origin: String,
}

impl SourceImage {
    pub fn new(image: DynamicImage, origin: impl Into<String>) -> Self {
        Self {
            image,
            origin: origin.into(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

// ピクセル形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 1ピクセル32bit、先頭がアルファ（A, R, G, B の順）
    Argb32,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Argb32 => 4,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelFormat::Argb32 => write!(f, "32ARGB"),
        }
    }
}

/// 分類器が要求する入力バッファの形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBufferSpec {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl PixelBufferSpec {
    pub fn argb(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Argb32,
        }
    }
}

/// 推論結果（生成後は不変）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredictionResult {
    label: String,
    /// 推論時刻（RFC3339、表示用）
    predicted_at: String,
}

impl PredictionResult {
    /// 分類器の出力からラベルを確定する。空・欠落は "Unknown" に置き換える
    pub fn from_target(target: Option<String>) -> Self {
        let label = match target {
            Some(label) if !label.trim().is_empty() => label,
            _ => UNKNOWN_LABEL.to_string(),
        };

        Self {
            label,
            predicted_at: chrono::Local::now().to_rfc3339(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn predicted_at(&self) -> &str {
        &self.predicted_at
    }

    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }
}
