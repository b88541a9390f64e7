//! 分類器の抽象
//!
//! 固定形式のピクセルバッファを受け取り、同期的にラベルを返す能力だけを定義します。
//! この trait を実装すればどのバックエンドでもパイプラインに差し込めます。

use crate::error::Result;
use crate::pixel_buffer::NormalizedPixelBuffer;
use crate::types::PixelBufferSpec;

/// 分類器の出力
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifierOutput {
    /// 最上位のクラスラベル（得られなかった場合は `None`）
    pub target: Option<String>,
}

impl ClassifierOutput {
    pub fn label(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
        }
    }
}

/// 同期的な画像分類器
///
/// 初期化後は読み取り専用で、複数回の呼び出しで状態は変化しない前提です。
pub trait ImageClassifier: Send + Sync {
    /// 分類器が要求する入力形式
    fn input_spec(&self) -> PixelBufferSpec;

    /// 1枚のバッファを分類する
    fn prediction(&self, buffer: &NormalizedPixelBuffer) -> Result<ClassifierOutput>;

    /// ログ表示用の名前
    fn name(&self) -> &str {
        "classifier"
    }
}
