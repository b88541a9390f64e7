//! モデルメタデータを使用した推論設定
//!
//! 保存されたモデルメタデータを読み込んで推論に必要な情報を取得します。

use crate::model::model_metadata::ModelMetadata;
use crate::types::PixelBufferSpec;

/// モデルメタデータから推論用情報を取得
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// クラスラベル（出力インデックス順）
    pub class_labels: Vec<String>,

    /// モデル入力解像度
    pub input_width: u32,
    pub input_height: u32,
}

impl InferenceConfig {
    /// メタデータからInferenceConfigを作成
    pub fn from_metadata(metadata: &ModelMetadata) -> Self {
        Self {
            class_labels: metadata.class_labels.clone(),
            input_width: metadata.input_width,
            input_height: metadata.input_height,
        }
    }

    /// クラス数を取得
    pub fn num_classes(&self) -> usize {
        self.class_labels.len()
    }

    /// 分類器が要求する入力バッファ形式
    pub fn input_spec(&self) -> PixelBufferSpec {
        PixelBufferSpec::argb(self.input_width, self.input_height)
    }

    /// クラスインデックスからラベルを取得
    ///
    /// 範囲外や空文字のラベルは `None`（表示側で "Unknown" になる）
    pub fn class_index_to_label(&self, index: usize) -> Option<String> {
        self.class_labels
            .get(index)
            .filter(|label| !label.trim().is_empty())
            .cloned()
    }
}
