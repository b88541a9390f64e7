//! 入力画像の取得
//!
//! 2つの経路で `SourceImage` を作ります。
//! - 画像ピッカーから渡されたバイト列（またはパス）をデコード
//! - 同梱サンプル画像のリストを現在位置で参照
//!
//! デコードできない入力は `ClassifierError::Acquisition` となり、後段の推論は行われません。

use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::{ClassifierError, Result};
use crate::model::GallerySettings;
use crate::types::SourceImage;

/// 同梱画像として探す拡張子
const ASSET_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// 画像デコーダ
#[derive(Debug, Clone, Copy)]
pub struct ImageAcquirer {
    max_decoded_pixels: u64,
}

impl ImageAcquirer {
    pub fn new(max_decoded_pixels: u64) -> Self {
        Self { max_decoded_pixels }
    }

    /// エンコード済みバイト列をデコードする
    ///
    /// ヘッダから寸法を先に読み、ピクセル数上限を超えるものは完全デコード前に拒否します。
    pub fn decode(&self, bytes: &[u8], origin: &str) -> Result<SourceImage> {
        if bytes.is_empty() {
            return Err(ClassifierError::Acquisition(format!("空のデータです: {}", origin)));
        }

        image::guess_format(bytes).map_err(|e| {
            ClassifierError::Acquisition(format!("対応していない画像形式です ({}): {}", origin, e))
        })?;

        let mut decoder = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ClassifierError::Acquisition(format!("画像形式を判定できません: {}", e)))?
            .into_decoder()
            .map_err(|e| ClassifierError::Acquisition(format!("画像ヘッダを読み取れません ({}): {}", origin, e)))?;

        let (width, height) = decoder.dimensions();
        self.validate_dimensions(width, height)?;

        // カメラ画像は EXIF の向き情報を反映して正立させる
        let orientation = decoder.orientation().unwrap_or_else(|e| {
            log::debug!("EXIFの向き情報を読み取れません ({}): {}", origin, e);
            Orientation::NoTransforms
        });

        let mut image = DynamicImage::from_decoder(decoder)
            .map_err(|e| ClassifierError::Acquisition(format!("画像のデコードに失敗 ({}): {}", origin, e)))?;
        image.apply_orientation(orientation);

        log::debug!("画像をデコードしました: {} ({}x{})", origin, width, height);

        Ok(SourceImage::new(image, origin))
    }

    /// ピッカーで選択されたファイルを非同期に読み込んでデコードする
    pub async fn read_selected(&self, path: &Path) -> Result<SourceImage> {
        let bytes = read_file_bytes(path).await?;
        self.decode(&bytes, &path.display().to_string())
    }

    fn validate_dimensions(&self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(ClassifierError::Acquisition(format!(
                "画像サイズが不正です: {}x{}",
                width, height
            )));
        }

        let pixels = width as u64 * height as u64;
        if pixels > self.max_decoded_pixels {
            return Err(ClassifierError::Acquisition(format!(
                "画像が大きすぎます: {} ピクセル（上限: {} ピクセル）",
                pixels, self.max_decoded_pixels
            )));
        }

        Ok(())
    }
}

/// ピッカーで選択されたファイルのバイト列を非同期に読み込む
pub async fn read_file_bytes(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| {
        ClassifierError::Acquisition(format!("ファイルの読み込みに失敗 ({}): {}", path.display(), e))
    })
}

/// 同梱サンプル画像のリストと現在位置
#[derive(Debug, Clone)]
pub struct BundledGallery {
    asset_dir: PathBuf,
    names: Vec<String>,
    current: usize,
}

impl BundledGallery {
    pub fn new(asset_dir: impl Into<PathBuf>, names: Vec<String>) -> Self {
        Self {
            asset_dir: asset_dir.into(),
            names,
            current: 0,
        }
    }

    pub fn from_settings(settings: &GallerySettings) -> Self {
        Self::new(&settings.asset_dir, settings.names.clone())
    }

    /// 10枚のデフォルトサンプルで作成
    pub fn with_default_samples(asset_dir: impl Into<PathBuf>) -> Self {
        let defaults = GallerySettings::default();
        Self::new(asset_dir, defaults.names)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_name(&self) -> Option<&str> {
        self.names.get(self.current).map(String::as_str)
    }

    /// 指定位置を選択（範囲外は位置を変えずにエラー）
    pub fn select(&mut self, index: usize) -> Result<usize> {
        if index >= self.names.len() {
            return Err(ClassifierError::Navigation(format!(
                "インデックス {} は範囲外です（画像数: {}）",
                index,
                self.names.len()
            )));
        }
        self.current = index;
        Ok(self.current)
    }

    /// 次の画像へ（最後の画像からは移動不可）
    pub fn next(&mut self) -> Result<usize> {
        if self.names.is_empty() || self.current + 1 >= self.names.len() {
            return Err(ClassifierError::Navigation("最後の画像です".to_string()));
        }
        self.current += 1;
        Ok(self.current)
    }

    /// 前の画像へ（先頭からは移動不可）
    pub fn previous(&mut self) -> Result<usize> {
        if self.names.is_empty() || self.current == 0 {
            return Err(ClassifierError::Navigation("最初の画像です".to_string()));
        }
        self.current -= 1;
        Ok(self.current)
    }

    /// 現在の画像ファイルのパスを解決
    pub fn current_path(&self) -> Result<PathBuf> {
        let name = self
            .current_name()
            .ok_or_else(|| ClassifierError::Acquisition("同梱画像がありません".to_string()))?;

        ASSET_EXTENSIONS
            .iter()
            .map(|ext| self.asset_dir.join(format!("{}.{}", name, ext)))
            .find(|path| path.is_file())
            .ok_or_else(|| {
                ClassifierError::Acquisition(format!(
                    "同梱画像が見つかりません: {} ({})",
                    name,
                    self.asset_dir.display()
                ))
            })
    }

    /// 現在の同梱画像を読み込んでデコード
    pub fn load_current(&self, acquirer: &ImageAcquirer) -> Result<SourceImage> {
        let path = self.current_path()?;
        let bytes = std::fs::read(&path).map_err(|e| {
            ClassifierError::Acquisition(format!("同梱画像の読み込みに失敗 ({}): {}", path.display(), e))
        })?;
        let name = self.current_name().unwrap_or_default();
        acquirer.decode(&bytes, name)
    }
}
