// metadata/png.rs - PNG 读取
//! 第一遍读取图片头得到尺寸，回到文件开头后第二遍读取文本块

use std::io::{BufRead, Seek, SeekFrom};

use super::{MetadataError, RawMetadata};

/// 生成工具写入参数时使用的文本块关键字
const PARAMETERS_KEYWORD: &str = "parameters";

pub fn read_png<R: BufRead + Seek>(mut r: R) -> Result<RawMetadata, MetadataError> {
    let (width, height) =
        image::ImageReader::with_format(&mut r, image::ImageFormat::Png).into_dimensions()?;

    r.seek(SeekFrom::Start(0))?;

    let mut reader = ::png::Decoder::new(r).read_info()?;
    let text = match find_parameters(reader.info())? {
        Some(text) => text,
        None => {
            // 参数块也可能写在图像数据之后
            reader.finish()?;
            find_parameters(reader.info())?.ok_or(MetadataError::NoParametersFound)?
        }
    };

    Ok(RawMetadata { text, width, height })
}

fn find_parameters(info: &::png::Info) -> Result<Option<String>, MetadataError> {
    if let Some(chunk) = info
        .uncompressed_latin1_text
        .iter()
        .find(|c| c.keyword == PARAMETERS_KEYWORD)
    {
        return Ok(Some(chunk.text.clone()));
    }
    if let Some(chunk) = info
        .compressed_latin1_text
        .iter()
        .find(|c| c.keyword == PARAMETERS_KEYWORD)
    {
        return Ok(Some(chunk.get_text()?));
    }
    if let Some(chunk) = info.utf8_text.iter().find(|c| c.keyword == PARAMETERS_KEYWORD) {
        return Ok(Some(chunk.get_text()?));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::fixtures;
    use std::io::Cursor;

    #[test]
    fn test_read_png() {
        let text = "a cat Steps: 20, Model: foo";
        let bytes = fixtures::png_bytes(Some(text), 7, 5);

        let raw = read_png(Cursor::new(bytes)).unwrap();
        assert_eq!(raw.text, text);
        assert_eq!(raw.width, 7);
        assert_eq!(raw.height, 5);
    }

    #[test]
    fn test_read_png_parameters_after_image_data() {
        let text = "a dog Steps: 30, Model: bar";
        let bytes = fixtures::png_bytes_trailing_text(text, 2, 2);

        let raw = read_png(Cursor::new(bytes)).unwrap();
        assert_eq!(raw.text, text);
        assert_eq!((raw.width, raw.height), (2, 2));
    }

    #[test]
    fn test_read_png_without_parameters() {
        let bytes = fixtures::png_bytes(None, 3, 3);
        assert!(matches!(
            read_png(Cursor::new(bytes)),
            Err(MetadataError::NoParametersFound)
        ));
    }

    #[test]
    fn test_read_truncated_png() {
        let mut bytes = fixtures::png_bytes(Some("a Steps: 1, "), 3, 3);
        bytes.truncate(20);
        assert!(read_png(Cursor::new(bytes)).is_err());
    }
}
