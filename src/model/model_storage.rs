//! モデルとメタデータの永続化
//!
//! Tar.gz形式でモデルとメタデータを1ファイルに統合して保存・読み込みします。
//!
//! ファイル構成（tar.gz内部）:
//! - metadata.json   - メタデータ（クラスラベル、入力解像度など）
//! - model.bin       - モデルの重み（バイナリ）

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::{Archive, Builder};

use crate::model::model_metadata::ModelMetadata;

const METADATA_ENTRY: &str = "metadata.json";
const MODEL_ENTRY: &str = "model.bin";

/// メタデータと共にモデルをTar.gz形式で保存
///
/// 保存先のパスを返します（`.gz` で終わらない場合は `.tar.gz` を付与）。
pub fn save_model_with_metadata(
    output_path: &Path,
    metadata: &ModelMetadata,
    model_binary: &[u8],
) -> Result<PathBuf> {
    // output_pathがすでに.tar.gzで終わっている場合はそのまま、そうでなければ拡張子を追加
    let tar_gz_path = if output_path.extension().and_then(|s| s.to_str()) == Some("gz") {
        output_path.to_path_buf()
    } else {
        output_path.with_extension("tar.gz")
    };

    // 親ディレクトリが存在しない場合は作成
    if let Some(parent) = tar_gz_path.parent() {
        std::fs::create_dir_all(parent)
            .context(format!("Failed to create parent directory: {:?}", parent))?;
    }

    let tar_gz_file = File::create(&tar_gz_path)
        .context(format!("Failed to create tar.gz file: {:?}", tar_gz_path))?;

    let encoder = GzEncoder::new(tar_gz_file, Compression::default());
    let mut tar_builder = Builder::new(encoder);

    let json_str = metadata.to_json_string()?;
    append_entry(&mut tar_builder, METADATA_ENTRY, json_str.as_bytes())?;
    append_entry(&mut tar_builder, MODEL_ENTRY, model_binary)?;

    // gzipストリームまで確実に閉じる
    tar_builder
        .into_inner()
        .context("Failed to finalize tar archive")?
        .finish()
        .context("Failed to finalize gzip stream")?;

    log::info!(
        "モデルを保存しました: {} ({}クラス, {}x{})",
        tar_gz_path.display(),
        metadata.class_labels.len(),
        metadata.input_width,
        metadata.input_height
    );

    Ok(tar_gz_path)
}

fn append_entry<W: std::io::Write>(builder: &mut Builder<W>, name: &str, bytes: &[u8]) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_path(name)?;
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append(&header, bytes)
        .context(format!("Failed to add {} to tar", name))
}

fn open_archive(tar_gz_path: &Path) -> Result<Archive<GzDecoder<File>>> {
    let tar_gz_file = File::open(tar_gz_path)
        .context(format!("Failed to open tar.gz file: {:?}", tar_gz_path))?;
    Ok(Archive::new(GzDecoder::new(tar_gz_file)))
}

/// アーカイブ内の指定エントリを読み込む
fn read_entry(tar_gz_path: &Path, entry_name: &str) -> Result<Vec<u8>> {
    let mut archive = open_archive(tar_gz_path)?;

    for entry in archive.entries()? {
        let mut entry = entry?;
        if entry.path()?.to_str() == Some(entry_name) {
            let mut buffer = Vec::new();
            entry.read_to_end(&mut buffer)?;
            return Ok(buffer);
        }
    }

    Err(anyhow::anyhow!("{} not found in tar.gz archive", entry_name))
}

/// Tar.gzからモデルメタデータを読み込む
pub fn load_metadata(tar_gz_path: &Path) -> Result<ModelMetadata> {
    let bytes = read_entry(tar_gz_path, METADATA_ENTRY)?;
    let json_str = String::from_utf8(bytes).context("metadata.json is not valid UTF-8")?;
    ModelMetadata::from_json_string(&json_str)
}

/// Tar.gzからモデルバイナリを読み込む
pub fn load_model_binary(tar_gz_path: &Path) -> Result<Vec<u8>> {
    read_entry(tar_gz_path, MODEL_ENTRY)
}

/// メタデータとモデルバイナリを共に読み込む
pub fn load_model_with_metadata(tar_gz_path: &Path) -> Result<(ModelMetadata, Vec<u8>)> {
    let metadata = load_metadata(tar_gz_path)?;
    let model_binary = load_model_binary(tar_gz_path)?;
    Ok((metadata, model_binary))
}

/// メタデータをログに出力
pub fn describe_metadata(metadata: &ModelMetadata) {
    log::info!("=== モデルメタデータ ===");
    log::info!("モデル名: {}", metadata.model_name);
    log::info!("クラスラベル: {}", metadata.class_labels.join(", "));
    log::info!("入力サイズ: {}x{}", metadata.input_width, metadata.input_height);
    log::info!("書き出し日時: {}", metadata.exported_at);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("catbreed_storage_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_metadata() -> ModelMetadata {
        ModelMetadata::new("CatBreedClassifier", vec!["Bengal".into(), "Sphynx".into()], 32, 32)
    }

    #[test]
    fn test_save_and_load() {
        let dir = temp_dir("roundtrip");
        let path = save_model_with_metadata(&dir.join("model"), &sample_metadata(), &[1, 2, 3, 4]).unwrap();
        assert!(path.to_string_lossy().ends_with("model.tar.gz"));

        let (metadata, binary) = load_model_with_metadata(&path).unwrap();
        assert_eq!(metadata, sample_metadata_with(&metadata.exported_at));
        assert_eq!(binary, vec![1, 2, 3, 4]);

        assert_eq!(load_metadata(&path).unwrap().class_labels.len(), 2);
        assert_eq!(load_model_binary(&path).unwrap(), vec![1, 2, 3, 4]);

        std::fs::remove_dir_all(&dir).ok();
    }

    fn sample_metadata_with(exported_at: &str) -> ModelMetadata {
        ModelMetadata {
            exported_at: exported_at.to_string(),
            ..sample_metadata()
        }
    }

    #[test]
    fn test_missing_file() {
        let err = load_metadata(Path::new("no/such/model.tar.gz")).unwrap_err();
        assert!(err.to_string().contains("Failed to open tar.gz file"));
    }
}
