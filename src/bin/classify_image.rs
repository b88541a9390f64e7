//! テスト用: 指定したモデルで1枚の画像を分類し、ラベルを表示する簡易バイナリ
//!
//! classify_image <model.tar.gz> <image> [cpu|wgpu]
//! classify_image --init <model.tar.gz> [size]

#[cfg(feature = "ml")]
#[tokio::main]
async fn main() {
    use catbreed_lib::acquirer::ImageAcquirer;
    use catbreed_lib::ml::{export_untrained_bundle, InferenceEngine, IMAGE_SIZE};
    use catbreed_lib::model::{describe_metadata, load_metadata, ConversionSettings, DeviceType, DEFAULT_SAMPLE_NAMES};
    use catbreed_lib::InferencePipeline;
    use std::path::PathBuf;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() >= 3 && args[1] == "--init" {
        let output = PathBuf::from(&args[2]);
        let size: u32 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(IMAGE_SIZE as u32);
        let labels = DEFAULT_SAMPLE_NAMES
            .iter()
            .map(|name| name.rsplit_once('_').map(|(breed, _)| breed).unwrap_or(name).to_string())
            .collect();

        match export_untrained_bundle(&output, labels, size, size) {
            Ok(path) => println!("未学習モデルを書き出しました: {}", path.display()),
            Err(err) => {
                eprintln!("モデルの書き出しに失敗: {:#}", err);
                std::process::exit(1);
            }
        }
        return;
    }

    if args.len() < 3 {
        eprintln!("Usage: classify_image <model.tar.gz> <image> [cpu|wgpu]");
        eprintln!("       classify_image --init <model.tar.gz> [size]");
        std::process::exit(2);
    }

    let model_path = PathBuf::from(&args[1]);
    let image_path = PathBuf::from(&args[2]);
    let device_type = match args.get(3).map(|s| s.parse::<DeviceType>()) {
        Some(Ok(device_type)) => device_type,
        Some(Err(err)) => {
            eprintln!("{}", err);
            std::process::exit(2);
        }
        None => DeviceType::Cpu,
    };

    match load_metadata(&model_path) {
        Ok(metadata) => describe_metadata(&metadata),
        Err(err) => log::warn!("load_metadata error: {:#}", err),
    }

    let pipeline = InferencePipeline::from_load_result(InferenceEngine::load(&model_path, device_type));
    if !pipeline.is_ready() {
        std::process::exit(1);
    }

    let acquirer = ImageAcquirer::new(ConversionSettings::default().max_decoded_pixels);
    let result = acquirer
        .read_selected(&image_path)
        .await
        .and_then(|source| pipeline.predict(&source));

    match result {
        Ok(prediction) => println!("{}", prediction.label()),
        Err(err) => {
            eprintln!("分類に失敗 [{}]: {}", err.stage(), err);
            std::process::exit(1);
        }
    }
}

#[cfg(not(feature = "ml"))]
fn main() {
    println!("ML機能が有効化されていません");
}
