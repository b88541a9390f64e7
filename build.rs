fn main() {
    // Tauriシェルを含むビルドのときだけ設定ファイルを処理する
    #[cfg(feature = "app")]
    tauri_build::build()
}
