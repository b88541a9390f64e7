//! ピクセルバッファ変換
//!
//! 任意サイズの `SourceImage` を分類器が要求する固定サイズ・32bit ARGB のバッファに描画します。
//!
//! 1. 目標サイズ・形式のバッファを確保（行は64バイト境界に揃える）
//! 2. 縦軸を反転する座標変換（左上原点 → 左下原点の描画面）を通して、
//!    目標サイズいっぱいに拡大縮小して描画する。アスペクト比は保持しない
//!
//! 描画面は左下原点、メモリは描画面の上端の行から格納されるため、
//! 結果としてバッファの0行目は元画像の最上段になります。

use fast_image_resize as fr;
use image::{GenericImageView, ImageBuffer, Rgba, RgbaImage};

use crate::error::{ClassifierError, Result};
use crate::model::ResizeFilter;
use crate::types::{PixelBufferSpec, PixelFormat, SourceImage};

/// 1行のバイト数をこの境界に揃える
pub const ROW_ALIGNMENT: usize = 64;

/// 分類器入力用の固定形式バッファ
///
/// 推論1回ごとに確保され、共有されません。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPixelBuffer {
    width: u32,
    height: u32,
    bytes_per_row: usize,
    format: PixelFormat,
    data: Vec<u8>,
}

impl NormalizedPixelBuffer {
    /// ゼロ初期化されたバッファを確保
    pub fn allocate(spec: PixelBufferSpec) -> Result<Self> {
        if spec.width == 0 || spec.height == 0 {
            return Err(ClassifierError::Conversion(format!(
                "バッファサイズが不正です: {}x{}",
                spec.width, spec.height
            )));
        }

        let row_bytes = (spec.width as usize)
            .checked_mul(spec.format.bytes_per_pixel())
            .ok_or_else(|| ClassifierError::Conversion("行サイズがオーバーフローしました".to_string()))?;
        let bytes_per_row = row_bytes
            .checked_next_multiple_of(ROW_ALIGNMENT)
            .ok_or_else(|| ClassifierError::Conversion("行サイズがオーバーフローしました".to_string()))?;
        let total = bytes_per_row
            .checked_mul(spec.height as usize)
            .ok_or_else(|| ClassifierError::Conversion("バッファサイズがオーバーフローしました".to_string()))?;

        Ok(Self {
            width: spec.width,
            height: spec.height,
            bytes_per_row,
            format: spec.format,
            data: vec![0u8; total],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn spec(&self) -> PixelBufferSpec {
        PixelBufferSpec {
            width: self.width,
            height: self.height,
            format: self.format,
        }
    }

    /// 形式が一致し、内部のメモリ配置も整合しているか
    pub fn matches(&self, spec: PixelBufferSpec) -> bool {
        self.spec() == spec
            && self.bytes_per_row >= self.width as usize * self.format.bytes_per_pixel()
            && self.data.len() == self.bytes_per_row * self.height as usize
    }

    /// 指定座標のピクセル `[a, r, g, b]`（(0, 0) は左上）
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.bytes_per_row + x as usize * 4;
        let px = &self.data[offset..offset + 4];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// パディングを除いた各行
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let row_bytes = self.width as usize * self.format.bytes_per_pixel();
        self.data
            .chunks_exact(self.bytes_per_row)
            .map(move |row| &row[..row_bytes])
    }

    fn row_mut(&mut self, memory_row: usize) -> &mut [u8] {
        let start = memory_row * self.bytes_per_row;
        let row_bytes = self.width as usize * self.format.bytes_per_pixel();
        &mut self.data[start..start + row_bytes]
    }
}

/// 回転・せん断を含まない2Dアフィン変換（x' = sx*x + tx, y' = sy*y + ty）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub sx: f64,
    pub sy: f64,
    pub tx: f64,
    pub ty: f64,
}

impl AffineTransform {
    pub const IDENTITY: Self = Self {
        sx: 1.0,
        sy: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// 既存の変換の前に平行移動を挟む（描画コンテキストの translate と同じ順序）
    pub fn translated(self, tx: f64, ty: f64) -> Self {
        Self {
            tx: self.tx + self.sx * tx,
            ty: self.ty + self.sy * ty,
            ..self
        }
    }

    /// 既存の変換の前に拡大縮小を挟む（描画コンテキストの scale と同じ順序）
    pub fn scaled(self, sx: f64, sy: f64) -> Self {
        Self {
            sx: self.sx * sx,
            sy: self.sy * sy,
            ..self
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (self.sx * x + self.tx, self.sy * y + self.ty)
    }

    /// 左上原点の座標を高さ `height` の左下原点の描画面に写す
    pub fn flip_vertical(height: u32) -> Self {
        Self::IDENTITY.translated(0.0, height as f64).scaled(1.0, -1.0)
    }
}

/// 画像を分類器入力用バッファに変換する
///
/// 失敗時はバッファを返さない（不完全なバッファは作らない）。
pub fn convert(
    source: &SourceImage,
    spec: PixelBufferSpec,
    filter: ResizeFilter,
) -> Result<NormalizedPixelBuffer> {
    let mut buffer = NormalizedPixelBuffer::allocate(spec)?;

    let (src_width, src_height) = source.image.dimensions();
    if src_width == 0 || src_height == 0 {
        return Err(ClassifierError::Conversion(format!(
            "入力画像のサイズが不正です: {}x{}",
            src_width, src_height
        )));
    }

    let scaled = scale_to_fill(source, spec.width, spec.height, filter)?;
    render_flipped(&scaled, &mut buffer)?;

    if !buffer.matches(spec) {
        return Err(ClassifierError::Conversion(format!(
            "変換後のバッファが要求形式と一致しません: {:?}",
            buffer.spec()
        )));
    }

    log::debug!(
        "ピクセルバッファに変換: {} {}x{} -> {}x{} {}",
        source.origin,
        src_width,
        src_height,
        spec.width,
        spec.height,
        spec.format
    );

    Ok(buffer)
}

/// 目標サイズちょうどに拡大縮小（レターボックスなし）
fn scale_to_fill(source: &SourceImage, width: u32, height: u32, filter: ResizeFilter) -> Result<RgbaImage> {
    let rgba = source.image.to_rgba8();
    if rgba.dimensions() == (width, height) {
        return Ok(rgba);
    }

    match resize_with_fast_image_resize(&rgba, width, height, filter) {
        Ok(resized) => Ok(resized),
        Err(err) => {
            log::warn!("fast_image_resize による拡大縮小に失敗、image::imageops にフォールバック: {}", err);
            Ok(image::imageops::resize(&rgba, width, height, filter.to_image_filter()))
        }
    }
}

fn resize_with_fast_image_resize(
    src: &RgbaImage,
    target_width: u32,
    target_height: u32,
    filter: ResizeFilter,
) -> Result<RgbaImage> {
    let (src_width, src_height) = src.dimensions();
    let src_image = fr::images::Image::from_vec_u8(src_width, src_height, src.as_raw().clone(), fr::PixelType::U8x4)
        .map_err(|e| ClassifierError::Conversion(format!("元画像バッファの構築に失敗: {}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(filter.to_fast_filter()));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| ClassifierError::Conversion(format!("fast_image_resize 実行エラー: {}", e)))?;

    ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(target_width, target_height, dst_image.into_vec())
        .ok_or_else(|| ClassifierError::Conversion("拡大縮小後のバッファ長が不正です".to_string()))
}

/// 縦軸反転の変換を通してバッファのメモリに描画する
///
/// 半透明ピクセルはゼロ初期化された背景（不透明の黒）に合成し、先頭のアルファは 0xFF とする。
fn render_flipped(scaled: &RgbaImage, buffer: &mut NormalizedPixelBuffer) -> Result<()> {
    let height = buffer.height();
    let ctm = AffineTransform::flip_vertical(height);

    for (y, row) in scaled.rows().enumerate() {
        // ピクセル中心を描画面へ写し、描画面の行（下から数える）を求める
        let (_, surface_y) = ctm.apply(0.0, y as f64 + 0.5);
        let surface_row = surface_y.floor() as i64;
        // メモリは描画面の上端の行から並ぶ
        let memory_row = height as i64 - 1 - surface_row;
        if memory_row < 0 || memory_row >= height as i64 {
            return Err(ClassifierError::Conversion(format!(
                "描画先の行が範囲外です: {}",
                memory_row
            )));
        }

        let dst = buffer.row_mut(memory_row as usize);
        for (px, out) in row.zip(dst.chunks_exact_mut(4)) {
            let [r, g, b, a] = px.0;
            out[0] = 0xFF;
            out[1] = composite_over_black(r, a);
            out[2] = composite_over_black(g, a);
            out[3] = composite_over_black(b, a);
        }
    }

    Ok(())
}

fn composite_over_black(channel: u8, alpha: u8) -> u8 {
    ((channel as u16 * alpha as u16 + 127) / 255) as u8
}
