use catbreed_lib::model::ResizeFilter;
use catbreed_lib::pixel_buffer::{convert, ROW_ALIGNMENT};
use catbreed_lib::{PixelBufferSpec, SourceImage};
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use proptest::prelude::*;

fn filter_strategy() -> impl Strategy<Value = ResizeFilter> {
    prop_oneof![
        Just(ResizeFilter::Nearest),
        Just(ResizeFilter::Triangle),
        Just(ResizeFilter::CatmullRom),
        Just(ResizeFilter::Lanczos3),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// どんなサイズの画像でも、要求サイズ・形式ちょうどのバッファになる
    #[test]
    fn conversion_always_matches_spec(
        src_w in 1u32..96,
        src_h in 1u32..96,
        dst_w in 1u32..48,
        dst_h in 1u32..48,
        seed in any::<u8>(),
        filter in filter_strategy(),
    ) {
        let img = RgbaImage::from_fn(src_w, src_h, |x, y| {
            let v = (x as u8).wrapping_mul(31) ^ (y as u8).wrapping_mul(17) ^ seed;
            Rgba([v, v.wrapping_add(80), v.wrapping_mul(3), 255 - (v / 2)])
        });
        let source = SourceImage::new(DynamicImage::ImageRgba8(img), "prop");
        let spec = PixelBufferSpec::argb(dst_w, dst_h);

        let buffer = convert(&source, spec, filter).unwrap();

        prop_assert!(buffer.matches(spec));
        prop_assert_eq!(buffer.width(), dst_w);
        prop_assert_eq!(buffer.height(), dst_h);
        prop_assert_eq!(buffer.bytes_per_row() % ROW_ALIGNMENT, 0);
        prop_assert_eq!(buffer.rows().count(), dst_h as usize);
        for row in buffer.rows() {
            prop_assert_eq!(row.len(), dst_w as usize * 4);
            prop_assert!(row.chunks_exact(4).all(|px| px[0] == 0xFF));
        }
    }

    /// グレースケールなど色深度が異なる入力でも同じ形式になる
    #[test]
    fn grayscale_input_is_expanded(w in 1u32..40, h in 1u32..40, level in any::<u8>()) {
        let source = SourceImage::new(
            DynamicImage::ImageLuma8(GrayImage::from_pixel(w, h, Luma([level]))),
            "gray",
        );
        let spec = PixelBufferSpec::argb(w, h);
        let buffer = convert(&source, spec, ResizeFilter::Triangle).unwrap();

        prop_assert!(buffer.matches(spec));
        let [a, r, g, b] = buffer.pixel(0, 0).unwrap();
        prop_assert_eq!(a, 0xFF);
        prop_assert_eq!((r, g, b), (level, level, level));
    }

    /// 要求サイズが0のときはバッファを返さない
    #[test]
    fn zero_sized_spec_yields_no_buffer(w in 1u32..20, h in 1u32..20, zero_width in any::<bool>()) {
        let source = SourceImage::new(DynamicImage::ImageRgba8(RgbaImage::new(w, h)), "zero");
        let spec = if zero_width { PixelBufferSpec::argb(0, h) } else { PixelBufferSpec::argb(w, 0) };
        prop_assert!(convert(&source, spec, ResizeFilter::Nearest).is_err());
    }
}
