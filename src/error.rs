//! 分類処理全体のエラー型
//!
//! 画像取得・変換・推論の各段階で発生する失敗を1つの列挙型にまとめます。
//! 呼び出し側は分岐ごとに判定でき、最終的な吸収は `ClassificationSession` が行います。

use serde::Serialize;

/// 分類処理の失敗種別
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// 選択されたバイト列・同梱画像を画像としてデコードできない
    #[error("画像取得エラー: {0}")]
    Acquisition(String),

    /// ピクセルバッファの確保・描画に失敗、または形式不一致
    #[error("ピクセルバッファ変換エラー: {0}")]
    Conversion(String),

    /// モデルファイルが存在しない・初期化できない
    #[error("モデル読み込みエラー: {0}")]
    ModelLoad(String),

    /// 分類器が読み込まれていない状態で推論が要求された
    #[error("分類器が読み込まれていません")]
    ModelUnavailable,

    /// 分類器の推論呼び出しが失敗
    #[error("推論エラー: {0}")]
    Inference(String),

    /// 同梱画像リストの範囲外への移動
    #[error("移動できません: {0}")]
    Navigation(String),
}

impl ClassifierError {
    /// ログ出力用の段階名
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Acquisition(_) => "acquisition",
            Self::Conversion(_) => "conversion",
            Self::ModelLoad(_) => "model-load",
            Self::ModelUnavailable => "model-unavailable",
            Self::Inference(_) => "inference",
            Self::Navigation(_) => "navigation",
        }
    }
}

/// Tauri IPC で返すため文字列としてシリアライズする
impl Serialize for ClassifierError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClassifierError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_as_message() {
        let json = serde_json::to_string(&ClassifierError::ModelUnavailable).unwrap();
        assert_eq!(json, "\"分類器が読み込まれていません\"");
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(ClassifierError::Conversion("x".into()).stage(), "conversion");
        assert_eq!(ClassifierError::Navigation("x".into()).stage(), "navigation");
    }
}
