//! Integration tests for the format parsers and variant resolution.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use lutcraft_color::{
    apply, encode_binary, encode_tiled, parse_binary, parse_cube_text, parse_image,
    parse_leica_data, to_cube_text, FsAssetSource, LayoutRules, LutFormat, LutParser,
    MemoryAssetSource, ParseError, TileLayout,
};
use lutcraft_core::{LutCube, PixelBuffer};

/// Samples are multiples of 1/16, exact in both f32 and six-decimal text.
fn warm(n: usize) -> LutCube {
    let m = (n - 1) as f32;
    let q = |v: f32| (v * 16.0).round() / 16.0;
    LutCube::from_fn(n, |r, g, b| {
        [
            q((r as f32 / m * 1.1).min(1.0)),
            q(g as f32 / m),
            q(b as f32 / m * 0.8),
        ]
    })
    .unwrap()
}

fn png_bytes(cube: &LutCube, layout: TileLayout) -> Vec<u8> {
    let (w, h, rgba) = encode_tiled(cube, layout).unwrap();
    let img = image::RgbaImage::from_raw(w, h, rgba).unwrap();
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn leica_bytes(cube: &LutCube) -> Vec<u8> {
    cube.samples()
        .chunks_exact(3)
        .flat_map(|rgb| {
            [rgb[0], rgb[1], rgb[2], 1.0]
                .into_iter()
                .flat_map(|v| half::f16::from_f32(v).to_le_bytes())
        })
        .collect()
}

/// A scratch directory under the system temp dir, removed on drop.
struct ScratchDir(PathBuf);

impl ScratchDir {
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("lutcraft-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    fn write(&self, asset_id: &str, bytes: &[u8]) {
        let path = self.0.join(asset_id);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

#[test]
fn text_and_binary_encodings_transform_identically() {
    let cube = warm(17);
    let from_text = parse_cube_text(&to_cube_text(&cube, Some("Warm"))).unwrap();
    let from_binary = parse_binary(&encode_binary(&cube)).unwrap();
    assert_eq!(from_text, from_binary);

    let image = PixelBuffer::gradient(128, 64);
    assert_eq!(apply(&image, &from_text, 4), apply(&image, &from_binary, 4));
}

#[test]
fn text_domain_survives_conversion() {
    let text = "\
TITLE \"Log\"
# generated
LUT_3D_SIZE 2
DOMAIN_MIN 0 0 0
DOMAIN_MAX 2 2 2
0 0 0
1 0 0
0 1 0
1 1 0
0 0 1
1 0 1
0 1 1
1 1 1
";
    let cube = parse_cube_text(text).unwrap();
    assert_eq!(cube.domain_max(), [2.0; 3]);
    let again = parse_cube_text(&to_cube_text(&cube, None)).unwrap();
    assert_eq!(again, cube);
}

#[test]
fn image_lut_decodes_through_png() {
    // Eight levels quantize without loss.
    let n = 4;
    let cube = LutCube::from_fn(n, |r, g, b| {
        [r as f32 / 3.0, g as f32 / 3.0, b as f32 / 3.0]
    })
    .unwrap();
    for layout in [
        TileLayout::HorizontalStrip,
        TileLayout::VerticalStrip,
        TileLayout::Hald,
    ] {
        let decoded = parse_image(&png_bytes(&cube, layout), layout).unwrap();
        assert_eq!(decoded, cube, "layout {:?}", layout);
    }
}

#[test]
fn vendor_layout_rules_pick_the_tiling() {
    let cube = warm(4);
    let source = MemoryAssetSource::new();
    source.insert(
        "Acme/Film.png",
        png_bytes(&cube, TileLayout::VerticalStrip),
    );
    source.insert(
        "Other/Film.png",
        png_bytes(&cube, TileLayout::HorizontalStrip),
    );
    let layouts = LayoutRules {
        default: TileLayout::Auto,
        vendors: vec![("Acme/".to_string(), TileLayout::VerticalStrip)],
    };
    let parser = LutParser::new(Arc::new(source)).with_layouts(layouts);
    assert_eq!(parser.layouts().layout_for("Acme/Film"), TileLayout::VerticalStrip);

    let acme = parser.parse("Acme/Film").unwrap();
    let other = parser.parse("Other/Film").unwrap();
    assert_eq!(acme.size(), 4);
    assert_eq!(acme, other);
}

#[test]
fn leica_dump_parses_and_converts_to_text() {
    let cube = LutCube::identity(64).unwrap();
    let decoded = parse_leica_data(&leica_bytes(&cube)).unwrap();
    assert_eq!(decoded.size(), 64);
    // Half floats hold k/63 to within 2^-11.
    for (a, b) in decoded.samples().iter().zip(cube.samples()) {
        assert!((a - b).abs() < 5e-4);
    }
    let text = to_cube_text(&decoded, Some("Leica"));
    assert!(text.starts_with("TITLE \"Leica\"\nLUT_3D_SIZE 64\n"));
    assert_eq!(parse_cube_text(&text).unwrap().size(), 64);
}

#[test]
fn truncated_leica_dump_is_malformed() {
    let err = parse_leica_data(&[0u8; 1000]).unwrap_err();
    assert!(matches!(err, ParseError::Malformed(_)));
}

#[test]
fn filesystem_source_prefers_binary_then_text() {
    let dir = ScratchDir::new();
    let text_cube = warm(3);
    let bin_cube = LutCube::identity(3).unwrap();
    dir.write("Leica/Classic.cube", to_cube_text(&text_cube, None).as_bytes());
    dir.write("Leica/Classic.bin", &encode_binary(&bin_cube));
    dir.write("Leica/Warm.cube", to_cube_text(&text_cube, None).as_bytes());
    dir.write("Leica/Raw.data", &leica_bytes(&LutCube::identity(64).unwrap()));

    let parser = LutParser::new(Arc::new(FsAssetSource::new(&dir.0)));
    assert_eq!(
        parser.resolve("Leica/Classic").unwrap(),
        ("Leica/Classic.bin".to_string(), Some(LutFormat::Binary))
    );
    assert_eq!(parser.parse("Leica/Classic").unwrap(), bin_cube);
    assert_eq!(parser.parse("Leica/Warm").unwrap(), text_cube);
    assert_eq!(parser.parse("Leica/Classic.cube").unwrap(), text_cube);

    // Leica dumps are only read by explicit extension.
    assert!(matches!(parser.resolve("Leica/Raw"), Err(ParseError::NotFound(_))));
    assert_eq!(parser.parse("Leica/Raw.data").unwrap().size(), 64);
}

#[test]
fn filesystem_source_refuses_escaping_ids() {
    let dir = ScratchDir::new();
    dir.write("inside.cube", to_cube_text(&warm(2), None).as_bytes());
    let parser = LutParser::new(Arc::new(FsAssetSource::new(dir.0.join("sub"))));
    assert!(matches!(
        parser.parse("../inside.cube"),
        Err(ParseError::NotFound(_))
    ));
}

#[test]
fn malformed_assets_yield_no_cube() {
    let source = MemoryAssetSource::new();
    source.insert("Short.cube", b"LUT_3D_SIZE 2\n0 0 0\n1 1 1\n".to_vec());
    source.insert("OneD.cube", b"LUT_1D_SIZE 2\n0 0 0\n1 1 1\n".to_vec());
    source.insert("Bad.bin", b".MS-LUT \x01\x00\x00\x00".to_vec());
    let parser = LutParser::new(Arc::new(source));
    assert!(matches!(parser.parse("Short"), Err(ParseError::Malformed(_))));
    assert!(matches!(
        parser.parse("OneD"),
        Err(ParseError::UnsupportedVariant(_))
    ));
    assert!(matches!(parser.parse("Bad"), Err(ParseError::Malformed(_))));
    assert!(matches!(parser.parse("Missing"), Err(ParseError::NotFound(_))));
}
