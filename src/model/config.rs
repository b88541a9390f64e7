//! アプリケーション設定管理モジュール
//!
//! 計算デバイス、モデルファイル、同梱サンプル画像、前処理の設定をJSON形式で保存・読み込みします。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 同梱サンプル画像の名前（表示順）
pub const DEFAULT_SAMPLE_NAMES: [&str; 10] = [
    "Persian_14",
    "Bengal_10",
    "Birman_7",
    "Bombay_4",
    "British_Shorthair_18",
    "Egyptian_Mau_1",
    "Abyssinian_6",
    "Ragdoll_5",
    "Siamese_17",
    "Sphynx_1",
];

/// 計算デバイスの種類
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeviceType {
    /// WGPU (GPU) バックエンド
    Wgpu,
    /// NdArray (CPU) バックエンド
    Cpu,
}

impl Default for DeviceType {
    fn default() -> Self {
        DeviceType::Cpu
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Wgpu => write!(f, "WGPU (GPU)"),
            DeviceType::Cpu => write!(f, "CPU (NdArray)"),
        }
    }
}

impl std::str::FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" | "ndarray" => Ok(DeviceType::Cpu),
            "wgpu" | "gpu" => Ok(DeviceType::Wgpu),
            other => Err(format!("不明なデバイス: {} (cpu / wgpu)", other)),
        }
    }
}

/// 拡大縮小フィルタ
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl Default for ResizeFilter {
    fn default() -> Self {
        ResizeFilter::Triangle
    }
}

impl ResizeFilter {
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        use image::imageops::FilterType;
        match self {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }

    pub fn to_fast_filter(self) -> fast_image_resize::FilterType {
        use fast_image_resize::FilterType;
        match self {
            ResizeFilter::Nearest => FilterType::Box,
            ResizeFilter::Triangle => FilterType::Bilinear,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Mitchell,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// モデル設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// 起動時に読み込むモデルファイル（tar.gz）のパス
    pub model_path: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_path: "models/cat_breed_classifier.tar.gz".to_string(),
        }
    }
}

/// 同梱サンプル画像の設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GallerySettings {
    /// 画像ファイルを置くディレクトリ
    pub asset_dir: String,
    /// 表示順の画像名（拡張子なし）
    pub names: Vec<String>,
}

impl Default for GallerySettings {
    fn default() -> Self {
        Self {
            asset_dir: "assets/samples".to_string(),
            names: DEFAULT_SAMPLE_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// 前処理（ピクセルバッファ変換）の設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionSettings {
    /// 拡大縮小フィルタ
    #[serde(default)]
    pub resize_filter: ResizeFilter,
    /// デコードを許可する最大ピクセル数（width * height）
    pub max_decoded_pixels: u64,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            resize_filter: ResizeFilter::default(),
            max_decoded_pixels: 64_000_000,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 計算デバイスの種類
    #[serde(default)]
    pub device_type: DeviceType,
    /// モデル設定
    #[serde(default)]
    pub model: ModelSettings,
    /// 同梱サンプル画像
    #[serde(default)]
    pub gallery: GallerySettings,
    /// 前処理設定
    #[serde(default)]
    pub conversion: ConversionSettings,
}

impl AppConfig {
    /// 設定ファイルのデフォルトパス
    pub fn default_path() -> PathBuf {
        // モデル・サンプル画像の相対パスと同じく作業ディレクトリ基準
        PathBuf::from("config.json")
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// デフォルトパスから設定を読み込む、存在しない場合はデフォルト設定を返す
    pub fn load_or_default() -> Self {
        Self::load_or_default_from(Self::default_path())
    }

    /// 指定パスから設定を読み込む、存在しない・壊れている場合はデフォルト設定を返す
    pub fn load_or_default_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("設定ファイルが存在しません。デフォルト設定を使用します");
            return Self::default();
        }

        match Self::load(path) {
            Ok(config) => {
                log::info!("設定ファイルを読み込みました: {}", path.display());
                config
            }
            Err(e) => {
                log::warn!(
                    "設定ファイルの読み込みに失敗しました ({}): {}。デフォルト設定を使用します",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 計算デバイスを設定
    pub fn set_device_type(&mut self, device_type: DeviceType) {
        self.device_type = device_type;
    }

    /// モデルパスを設定
    pub fn set_model_path(&mut self, path: String) {
        self.model.model_path = path;
    }

    /// 設定情報をログに出力
    pub fn describe(&self) {
        log::info!("=== アプリケーション設定 ===");
        log::info!("計算デバイス: {}", self.device_type);
        log::info!("モデルパス: {}", self.model.model_path);
        log::info!("サンプル画像ディレクトリ: {}", self.gallery.asset_dir);
        log::info!("サンプル画像数: {}", self.gallery.names.len());
        log::info!("拡大縮小フィルタ: {:?}", self.conversion.resize_filter);
        log::info!("最大デコードピクセル数: {}", self.conversion.max_decoded_pixels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.device_type, DeviceType::Cpu);
        assert_eq!(config.gallery.names.len(), 10);
        assert_eq!(config.gallery.names[0], "Persian_14");
        assert_eq!(config.conversion.resize_filter, ResizeFilter::Triangle);
    }

    #[test]
    fn test_serialize_deserialize() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config.device_type, deserialized.device_type);
        assert_eq!(config.model.model_path, deserialized.model.model_path);
        assert_eq!(config.gallery.names, deserialized.gallery.names);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"device_type":"Wgpu"}"#).unwrap();
        assert_eq!(config.device_type, DeviceType::Wgpu);
        assert_eq!(config.model.model_path, "models/cat_breed_classifier.tar.gz");
    }

    #[test]
    fn test_device_type_display() {
        assert_eq!(format!("{}", DeviceType::Wgpu), "WGPU (GPU)");
        assert_eq!(format!("{}", DeviceType::Cpu), "CPU (NdArray)");
    }

    #[test]
    fn test_device_type_parse() {
        assert_eq!("GPU".parse::<DeviceType>(), Ok(DeviceType::Wgpu));
        assert_eq!("cpu".parse::<DeviceType>(), Ok(DeviceType::Cpu));
        assert!("tpu".parse::<DeviceType>().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("catbreed_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");

        let mut config = AppConfig::default();
        config.set_device_type(DeviceType::Wgpu);
        config.set_model_path("models/other.tar.gz".to_string());
        config.conversion.resize_filter = ResizeFilter::Lanczos3;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.device_type, DeviceType::Wgpu);
        assert_eq!(loaded.model.model_path, "models/other.tar.gz");
        assert_eq!(loaded.conversion.resize_filter, ResizeFilter::Lanczos3);
        assert_eq!(loaded.gallery.names, config.gallery.names);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_default_path_is_relative_to_working_dir() {
        let path = AppConfig::default_path();
        assert!(path.is_relative());
        assert_eq!(path.parent(), Some(Path::new("")));
        assert!(Path::new(&ModelSettings::default().model_path).is_relative());
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let config = AppConfig::load_or_default_from("does/not/exist/config.json");
        assert_eq!(config.device_type, DeviceType::Cpu);
    }
}
