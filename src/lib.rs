// burn-wgpu のデバイス型で Send/Sync の判定が深くなるため
#![recursion_limit = "256"]

pub mod types;
pub mod error;
pub mod classifier;
pub mod acquirer;
pub mod pixel_buffer;
pub mod pipeline;
pub mod session;
pub mod model;
#[cfg(feature = "ml")]
pub mod ml;
#[cfg(feature = "app")]
mod commands;

pub use classifier::{ClassifierOutput, ImageClassifier};
pub use error::ClassifierError;
pub use pipeline::InferencePipeline;
pub use session::ClassificationSession;
pub use types::{PixelBufferSpec, PixelFormat, PredictionResult, SourceImage, UNKNOWN_LABEL};

use model::AppConfig;

/// 設定されたモデルを読み込んでパイプラインを作る
///
/// 読み込みに失敗しても分類器なしのパイプラインを返す（推論は何もしない）
pub fn load_pipeline(config: &AppConfig) -> InferencePipeline {
    #[cfg(feature = "ml")]
    let pipeline = InferencePipeline::from_load_result(ml::InferenceEngine::load(
        &config.model.model_path,
        config.device_type,
    ));

    #[cfg(not(feature = "ml"))]
    let pipeline = {
        log::warn!("機械学習機能が有効化されていません。推論は無効です");
        InferencePipeline::new(None)
    };

    pipeline.with_resize_filter(config.conversion.resize_filter)
}

#[cfg(feature = "app")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let config = AppConfig::load_or_default();
    config.describe();

    // モデルは起動時に一度だけ読み込む
    let pipeline = load_pipeline(&config);
    let session = ClassificationSession::from_config(&config, pipeline);

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .manage(commands::AppState::new(session))
        .invoke_handler(tauri::generate_handler![
            commands::select_image_file,
            commands::select_image_bytes,
            commands::list_bundled_images,
            commands::show_bundled_image,
            commands::show_next_image,
            commands::show_previous_image,
            commands::predict_breed,
            commands::get_class_label,
            commands::get_selected_preview,
            commands::get_model_status,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
