//! モデルメタデータの定義
//!
//! tar.gz形式のモデルファイルに同梱される情報です。
//! 分類器の入力解像度とクラスラベルの並びを保持します。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// モデルメタデータ
///
/// tar.gz形式で保存される情報：
/// - metadata.json: このメタデータ（JSON形式）
/// - model.bin: モデルの重み（バイナリ）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMetadata {
    /// モデル名
    /// 例: "CatBreedClassifier"
    pub model_name: String,

    /// クラスラベル（出力インデックス順）
    /// 例: ["Abyssinian", "Bengal", "Birman", ...]
    pub class_labels: Vec<String>,

    /// モデル入力の幅（ピクセル）
    pub input_width: u32,

    /// モデル入力の高さ（ピクセル）
    pub input_height: u32,

    /// モデルの書き出し時刻（ISO8601形式）
    pub exported_at: String,
}

impl ModelMetadata {
    /// 新しいメタデータを作成
    pub fn new(
        model_name: impl Into<String>,
        class_labels: Vec<String>,
        input_width: u32,
        input_height: u32,
    ) -> Self {
        let exported_at = chrono::Local::now().to_rfc3339();

        Self {
            model_name: model_name.into(),
            class_labels,
            input_width,
            input_height,
            exported_at,
        }
    }

    /// メタデータをJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize metadata to JSON")
    }

    /// JSON文字列からメタデータを生成
    pub fn from_json_string(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize metadata from JSON")
    }
}
