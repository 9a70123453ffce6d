// metadata/webp.rs - WebP (RIFF) 读取
//! 遍历顶层 chunk：VP8X 中取尺寸，EXIF 中取 UserComment

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use exif::{In, Tag, Value};

use super::{MetadataError, RawMetadata};

const EXIF_HEADER: &[u8] = b"Exif\0\0";

pub fn read_webp<R: Read + Seek>(mut r: R) -> Result<RawMetadata, MetadataError> {
    let mut header = [0u8; 12];
    r.read_exact(&mut header)
        .map_err(|e| MetadataError::FormatDecode(format!("missing RIFF header: {e}")))?;
    if &header[0..4] != b"RIFF" || &header[8..12] != b"WEBP" {
        return Err(MetadataError::FormatDecode("not a webp file".to_string()));
    }
    // RIFF 大小包含 "WEBP" 四个字节
    let mut remaining = u64::from(le_u32(&header[4..8])).saturating_sub(4);

    let (mut width, mut height) = (0, 0);
    let mut text = String::new();

    while remaining >= 8 {
        let Some((id, len)) = read_chunk_header(&mut r)? else {
            break;
        };
        if 8 + u64::from(len) > remaining {
            return Err(MetadataError::FormatDecode(format!(
                "chunk {} exceeds RIFF size: {len} bytes",
                String::from_utf8_lossy(&id)
            )));
        }
        let padded = u64::from(len) + u64::from(len & 1);
        remaining = remaining.saturating_sub(8 + padded);

        match &id {
            b"VP8X" => {
                let data = read_payload(&mut r, len)?;
                (width, height) = decode_canvas_size(&data)?;
            }
            b"EXIF" => {
                let data = read_payload(&mut r, len)?;
                if let Some(comment) = decode_exif_comment(data)? {
                    text = comment;
                }
            }
            _ => {
                r.seek(SeekFrom::Current(len as i64))?;
            }
        }
        if len & 1 == 1 {
            r.seek(SeekFrom::Current(1))?;
        }
    }

    Ok(RawMetadata { text, width, height })
}

fn le_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

/// 读取 chunk 头，文件正常结束时返回 None
fn read_chunk_header<R: Read>(r: &mut R) -> Result<Option<([u8; 4], u32)>, MetadataError> {
    let mut buf = [0u8; 8];
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(MetadataError::FormatDecode("truncated chunk header".to_string())),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    let id = [buf[0], buf[1], buf[2], buf[3]];
    Ok(Some((id, le_u32(&buf[4..8]))))
}

/// 按实际读到的字节增长缓冲区，长度字段本身不可信
fn read_payload<R: Read>(r: &mut R, len: u32) -> Result<Vec<u8>, MetadataError> {
    let mut data = Vec::new();
    r.by_ref().take(u64::from(len)).read_to_end(&mut data)?;
    if data.len() as u64 != u64::from(len) {
        return Err(MetadataError::FormatDecode(format!(
            "truncated chunk: expected {len} bytes, got {}",
            data.len()
        )));
    }
    Ok(data)
}

/// VP8X: 宽高各占 3 字节（小端，存储值为实际值减一）
fn decode_canvas_size(data: &[u8]) -> Result<(u32, u32), MetadataError> {
    let n = data.len();
    if n < 10 {
        return Err(MetadataError::FormatDecode(format!("VP8X chunk too short: {n} bytes")));
    }
    let width = u32::from_le_bytes([data[n - 6], data[n - 5], data[n - 4], 0]) + 1;
    let height = u32::from_le_bytes([data[n - 3], data[n - 2], data[n - 1], 0]) + 1;
    Ok((width, height))
}

fn decode_exif_comment(mut data: Vec<u8>) -> Result<Option<String>, MetadataError> {
    if data.starts_with(EXIF_HEADER) {
        data.drain(..EXIF_HEADER.len());
    }
    let big_endian = data.starts_with(b"MM");

    let exif = exif::Reader::new().read_raw(data)?;
    let Some(field) = exif.get_field(Tag::UserComment, In::PRIMARY) else {
        return Ok(None);
    };

    let comment = match &field.value {
        Value::Undefined(bytes, _) => decode_user_comment(bytes, big_endian),
        Value::Ascii(lines) => lines
            .iter()
            .map(|l| String::from_utf8_lossy(l).into_owned())
            .collect::<Vec<_>>()
            .join(" "),
        other => other.display_as(Tag::UserComment).to_string(),
    };
    Ok(Some(comment))
}

/// UserComment 前 8 字节为字符集标识
fn decode_user_comment(bytes: &[u8], big_endian: bool) -> String {
    let text = match bytes.split_at_checked(8) {
        Some((b"UNICODE\0", body)) => decode_utf16(body, big_endian),
        Some((b"ASCII\0\0\0", body)) | Some(([0, 0, 0, 0, 0, 0, 0, 0], body)) => {
            String::from_utf8_lossy(body).into_owned()
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };

    let text = text.strip_prefix("UNICODE").unwrap_or(&text);
    text.trim_end_matches('\0').to_string()
}

fn decode_utf16(body: &[u8], big_endian: bool) -> String {
    let (big_endian, body) = match body {
        [0xFE, 0xFF, rest @ ..] => (true, rest),
        [0xFF, 0xFE, rest @ ..] => (false, rest),
        _ => (big_endian, body),
    };
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|c| {
            if big_endian {
                u16::from_be_bytes([c[0], c[1]])
            } else {
                u16::from_le_bytes([c[0], c[1]])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}
