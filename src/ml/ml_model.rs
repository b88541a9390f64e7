//! 機械学習モデルの共通定義
//!
//! 猫の品種分類用のCNNモデルと、ピクセルバッファからモデル入力への正規化を提供します。

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, Relu,
    },
    tensor::{backend::Backend, Int, Tensor},
};

use crate::pixel_buffer::NormalizedPixelBuffer;

/// デフォルトの入力画像サイズ（正方形）
pub const IMAGE_SIZE: usize = 64;

/// 全結合の中間層の次元
const HIDDEN_UNITS: usize = 128;

/// ImageNetの平均（RGB）
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNetの標準偏差（RGB）
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// モデル設定
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 分類クラス数
    pub num_classes: usize,
    /// 入力画像の幅
    #[config(default = 64)]
    pub input_width: usize,
    /// 入力画像の高さ
    #[config(default = 64)]
    pub input_height: usize,
}

/// 畳み込み3層を通した後の特徴マップの1辺
///
/// Conv (3x3, no padding): size -> size - 2
/// Pool (2x2, stride 2): size -> size / 2（切り捨て）
fn feature_map_side(size: usize) -> usize {
    let after_conv1 = size.saturating_sub(2);
    let after_pool1 = after_conv1 / 2;
    let after_conv2 = after_pool1.saturating_sub(2);
    let after_pool2 = after_conv2 / 2;
    after_pool2.saturating_sub(2)
}

impl ModelConfig {
    /// モデルを初期化
    ///
    /// 入力が小さすぎて特徴マップが残らない場合はエラー
    pub fn try_init<B: Backend>(&self, device: &B::Device) -> anyhow::Result<BreedClassifierNet<B>> {
        if self.num_classes == 0 {
            anyhow::bail!("クラス数が0です");
        }

        let feature_h = feature_map_side(self.input_height);
        let feature_w = feature_map_side(self.input_width);
        if feature_h == 0 || feature_w == 0 {
            anyhow::bail!(
                "入力サイズが小さすぎます: {}x{} (最小18x18が必要)",
                self.input_width,
                self.input_height
            );
        }

        // 特徴次元 d = 64チャネル * h * w
        let d = 64 * feature_h * feature_w;

        log::debug!(
            "[Model] 入力: {}x{}, 特徴マップ: 64 x {}x{}, FC: {} -> {} -> {}",
            self.input_width,
            self.input_height,
            feature_w,
            feature_h,
            d,
            HIDDEN_UNITS,
            self.num_classes
        );

        Ok(BreedClassifierNet {
            conv1: Conv2dConfig::new([3, 16], [3, 3]).with_stride([1, 1]).init(device),
            pool1: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            conv2: Conv2dConfig::new([16, 32], [3, 3]).with_stride([1, 1]).init(device),
            pool2: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            conv3: Conv2dConfig::new([32, 64], [3, 3]).with_stride([1, 1]).init(device),
            fc1: LinearConfig::new(d, HIDDEN_UNITS).init(device),
            fc2: LinearConfig::new(HIDDEN_UNITS, self.num_classes).init(device),
            activation: Relu::new(),
        })
    }
}

/// 猫の品種分類用CNNモデル
///
/// # アーキテクチャ
/// - Conv 3x3 + ReLU + MaxPool 2x2
/// - Conv 3x3 + ReLU + MaxPool 2x2
/// - Conv 3x3 + ReLU
/// - Flatten
/// - FC: d -> 128 + ReLU
/// - FC: 128 -> num_classes
#[derive(Module, Debug)]
pub struct BreedClassifierNet<B: Backend> {
    conv1: Conv2d<B>, // 3 -> 16
    pool1: MaxPool2d,
    conv2: Conv2d<B>, // 16 -> 32
    pool2: MaxPool2d,
    conv3: Conv2d<B>, // 32 -> 64

    fc1: Linear<B>,
    fc2: Linear<B>,

    activation: Relu,
}

impl<B: Backend> BreedClassifierNet<B> {
    /// 順伝播
    ///
    /// # 引数
    /// - `images`: バッチ画像 [batch_size, 3, height, width]
    ///
    /// # 戻り値
    /// - クラスごとのロジット [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, _, _, _] = images.dims();

        let x = self.conv1.forward(images);
        let x = self.activation.forward(x);
        let x = self.pool1.forward(x);

        let x = self.conv2.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool2.forward(x);

        let x = self.conv3.forward(x);
        let x = self.activation.forward(x);

        let [_, c, h, w] = x.dims();
        let x = x.reshape([batch_size, c * h * w]);

        let x = self.fc1.forward(x);
        let x = self.activation.forward(x);

        self.fc2.forward(x)
    }

    /// 予測クラスIDを返す [batch_size, 1]
    pub fn predict(&self, images: Tensor<B, 4>) -> Tensor<B, 2, Int> {
        self.forward(images).argmax(1)
    }
}

/// ARGBバッファをImageNetの平均と標準偏差で正規化
///
/// アルファは読み飛ばし、(C, H, W) の順で平坦化したRGBを返します。
pub fn normalize_pixel_buffer(buffer: &NormalizedPixelBuffer) -> Vec<f32> {
    let width = buffer.width() as usize;
    let height = buffer.height() as usize;
    let plane = width * height;
    let mut data = vec![0.0f32; 3 * plane];

    for (y, row) in buffer.rows().enumerate() {
        for (x, px) in row.chunks_exact(4).enumerate() {
            // px = [a, r, g, b]
            for channel in 0..3 {
                let value = px[channel + 1] as f32 / 255.0;
                data[channel * plane + y * width + x] =
                    (value - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel];
            }
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelBufferSpec;

    #[test]
    fn test_feature_map_side() {
        assert_eq!(feature_map_side(64), 12);
        assert_eq!(feature_map_side(24), 2);
        assert_eq!(feature_map_side(18), 1);
        assert_eq!(feature_map_side(17), 0);
    }

    #[test]
    fn test_too_small_input_is_rejected() {
        let config = ModelConfig::new(3).with_input_width(16).with_input_height(16);
        let device = Default::default();
        assert!(config.try_init::<burn_ndarray::NdArray>(&device).is_err());
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = ModelConfig::new(5)
            .with_input_width(24)
            .with_input_height(20)
            .try_init::<burn_ndarray::NdArray>(&device)
            .unwrap();
        let images = Tensor::<burn_ndarray::NdArray, 4>::zeros([2, 3, 20, 24], &device);
        assert_eq!(model.forward(images).dims(), [2, 5]);
    }

    #[test]
    fn test_normalize_zero_buffer() {
        let buffer = NormalizedPixelBuffer::allocate(PixelBufferSpec::argb(2, 2)).unwrap();
        let data = normalize_pixel_buffer(&buffer);
        assert_eq!(data.len(), 12);
        assert!((data[0] - (-0.485 / 0.229)).abs() < 1e-6);
        assert!((data[4] - (-0.456 / 0.224)).abs() < 1e-6);
        assert!((data[11] - (-0.406 / 0.225)).abs() < 1e-6);
    }
}
