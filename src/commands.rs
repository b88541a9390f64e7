//! 猫の品種分類のTauriコマンド

use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tauri::State;

use crate::acquirer::read_file_bytes;
use crate::error::ClassifierError;
use crate::session::ClassificationSession;

pub struct AppState {
    session: Mutex<ClassificationSession>,
}

impl AppState {
    pub fn new(session: ClassificationSession) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }

    fn session(&self) -> MutexGuard<'_, ClassificationSession> {
        // パニックしたコマンドがあっても状態自体は読み続ける
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 同梱画像の一覧
#[derive(Debug, Clone, Serialize)]
pub struct BundledImages {
    pub names: Vec<String>,
    pub current_index: usize,
}

/// 分類器の状態
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub ready: bool,
    pub backend: Option<String>,
    pub input_width: Option<u32>,
    pub input_height: Option<u32>,
}

/// ピッカー（tauri-plugin-dialog）で選ばれたファイルを読み込む
#[tauri::command]
pub async fn select_image_file(path: String, state: State<'_, AppState>) -> Result<(), ClassifierError> {
    let bytes = read_file_bytes(&PathBuf::from(&path)).await?;
    state.session().select_image_bytes(bytes, path);
    Ok(())
}

/// フロントエンドから直接渡されたバイト列を選択する
#[tauri::command]
pub fn select_image_bytes(bytes: Vec<u8>, state: State<AppState>) {
    state.session().select_image_bytes(bytes, "picker");
}

#[tauri::command]
pub fn list_bundled_images(state: State<AppState>) -> BundledImages {
    let session = state.session();
    BundledImages {
        names: session.gallery().names().to_vec(),
        current_index: session.gallery().current_index(),
    }
}

#[tauri::command]
pub fn show_bundled_image(index: usize, state: State<AppState>) -> Result<usize, ClassifierError> {
    state.session().select_bundled(index)
}

#[tauri::command]
pub fn show_next_image(state: State<AppState>) -> Result<usize, ClassifierError> {
    state.session().show_next()
}

#[tauri::command]
pub fn show_previous_image(state: State<AppState>) -> Result<usize, ClassifierError> {
    state.session().show_previous()
}

/// 推論して表示ラベルを返す（失敗時は前回のラベルのまま）
#[tauri::command]
pub fn predict_breed(state: State<AppState>) -> String {
    state.session().predict_selected().to_string()
}

#[tauri::command]
pub fn get_class_label(state: State<AppState>) -> String {
    state.session().label().to_string()
}

/// 選択中の画像のプレビュー（data URL）
#[tauri::command]
pub fn get_selected_preview(state: State<AppState>) -> Option<String> {
    state.session().preview_data_url()
}

#[tauri::command]
pub fn get_model_status(state: State<AppState>) -> ModelStatus {
    let session = state.session();
    let pipeline = session.pipeline();
    let spec = pipeline.input_spec();
    ModelStatus {
        ready: pipeline.is_ready(),
        backend: pipeline.classifier_name().map(str::to_string),
        input_width: spec.map(|s| s.width),
        input_height: spec.map(|s| s.height),
    }
}
