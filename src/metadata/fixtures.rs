// metadata/fixtures.rs - 测试用图片构造

/// 构造带 `parameters` 文本块的 RGB PNG
pub fn png_bytes(parameters: Option<&str>, width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut encoder = ::png::Encoder::new(&mut buf, width, height);
        encoder.set_color(::png::ColorType::Rgb);
        encoder.set_depth(::png::BitDepth::Eight);
        if let Some(text) = parameters {
            encoder
                .add_text_chunk("parameters".to_string(), text.to_string())
                .unwrap();
        }
        let mut writer = encoder.write_header().unwrap();
        let data = vec![0u8; (width * height * 3) as usize];
        writer.write_image_data(&data).unwrap();
        writer.finish().unwrap();
    }
    buf
}

/// 构造 `parameters` 文本块位于 IDAT 之后的 RGB PNG
pub fn png_bytes_trailing_text(parameters: &str, width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut encoder = ::png::Encoder::new(&mut buf, width, height);
        encoder.set_color(::png::ColorType::Rgb);
        encoder.set_depth(::png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        let data = vec![0u8; (width * height * 3) as usize];
        writer.write_image_data(&data).unwrap();
        // tEXt: keyword NUL text
        let chunk = [b"parameters".as_slice(), &[0u8], parameters.as_bytes()].concat();
        writer.write_chunk(::png::chunk::tEXt, &chunk).unwrap();
        writer.finish().unwrap();
    }
    buf
}

/// 构造只含 VP8X 和 EXIF chunk 的 WebP（大端 TIFF，UserComment 为 UTF-16）
pub fn webp_bytes(parameters: Option<&str>, width: u32, height: u32) -> Vec<u8> {
    let mut body = b"WEBP".to_vec();

    let mut vp8x = vec![0x08, 0, 0, 0];
    vp8x.extend_from_slice(&(width - 1).to_le_bytes()[..3]);
    vp8x.extend_from_slice(&(height - 1).to_le_bytes()[..3]);
    push_chunk(&mut body, b"VP8X", &vp8x);

    if let Some(text) = parameters {
        push_chunk(&mut body, b"EXIF", &exif_with_user_comment(text));
    }

    let mut out = b"RIFF".to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

fn push_chunk(out: &mut Vec<u8>, id: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(id);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    if data.len() % 2 == 1 {
        out.push(0);
    }
}

/// IFD0 -> ExifIFD -> UserComment
fn exif_with_user_comment(text: &str) -> Vec<u8> {
    let mut comment = b"UNICODE\0".to_vec();
    comment.extend(text.encode_utf16().flat_map(|u| u.to_be_bytes()));

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM");
    tiff.extend_from_slice(&42u16.to_be_bytes());
    tiff.extend_from_slice(&8u32.to_be_bytes());

    // IFD0 @ 8: 一个条目，指向 Exif IFD @ 26
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x8769u16.to_be_bytes());
    tiff.extend_from_slice(&4u16.to_be_bytes());
    tiff.extend_from_slice(&1u32.to_be_bytes());
    tiff.extend_from_slice(&26u32.to_be_bytes());
    tiff.extend_from_slice(&0u32.to_be_bytes());

    // Exif IFD @ 26: UserComment，数据 @ 44
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x9286u16.to_be_bytes());
    tiff.extend_from_slice(&7u16.to_be_bytes());
    tiff.extend_from_slice(&(comment.len() as u32).to_be_bytes());
    tiff.extend_from_slice(&44u32.to_be_bytes());
    tiff.extend_from_slice(&0u32.to_be_bytes());

    tiff.extend_from_slice(&comment);
    tiff
}
