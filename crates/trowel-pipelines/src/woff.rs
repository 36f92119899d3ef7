//! WOFF and WOFF2 containers for sfnt fonts.
//!
//! Both formats keep the original font tables. WOFF compresses each table
//! with zlib; WOFF2 stores every table untransformed (glyf and loca use the
//! null transform) in a single brotli stream.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

const WOFF_SIGNATURE: u32 = 0x774F_4646;
const WOFF2_SIGNATURE: u32 = 0x774F_4632;
const TTCF: u32 = 0x7474_6366;

const SFNT_HEADER_LEN: usize = 12;
const SFNT_RECORD_LEN: usize = 16;
const WOFF_HEADER_LEN: usize = 44;
const WOFF_RECORD_LEN: usize = 20;
const WOFF2_HEADER_LEN: usize = 48;

/// Directory flag for a tag written out in full.
const ARBITRARY_TAG: u8 = 0x3F;
/// Transform version meaning "stored as is" for glyf and loca.
const NULL_GLYF_TRANSFORM: u8 = 3;

/// Errors from reading or re-wrapping a font.
#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("Not a valid font: {0}")]
    Parse(String),

    #[error("Unsupported font: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One table of an sfnt font.
#[derive(Debug, Clone, Copy)]
pub struct SfntTable<'a> {
    pub tag: [u8; 4],
    pub checksum: u32,
    pub data: &'a [u8],
}

/// The table directory of an sfnt font, sorted by tag.
#[derive(Debug, Clone)]
pub struct Sfnt<'a> {
    pub flavor: u32,
    pub tables: Vec<SfntTable<'a>>,
}

impl Sfnt<'_> {
    /// Size of the font once decoded back to sfnt.
    fn total_sfnt_size(&self) -> usize {
        SFNT_HEADER_LEN
            + SFNT_RECORD_LEN * self.tables.len()
            + self
                .tables
                .iter()
                .map(|t| padded(t.data.len()))
                .sum::<usize>()
    }
}

/// Validate a TrueType or OpenType font and read its table directory.
pub fn read_sfnt(data: &[u8]) -> Result<Sfnt<'_>, FontError> {
    let flavor = be_u32(data, 0)?;
    if flavor == TTCF {
        return Err(FontError::Unsupported("font collections".to_string()));
    }

    ttf_parser::Face::parse(data, 0).map_err(|e| FontError::Parse(e.to_string()))?;

    let num_tables = be_u16(data, 4)? as usize;
    let mut tables = Vec::with_capacity(num_tables);

    for i in 0..num_tables {
        let record = SFNT_HEADER_LEN + i * SFNT_RECORD_LEN;
        let tag = data
            .get(record..record + 4)
            .and_then(|t| <[u8; 4]>::try_from(t).ok())
            .ok_or_else(|| FontError::Parse("truncated table directory".to_string()))?;
        let checksum = be_u32(data, record + 4)?;
        let offset = be_u32(data, record + 8)? as usize;
        let length = be_u32(data, record + 12)? as usize;

        let table = offset
            .checked_add(length)
            .and_then(|end| data.get(offset..end))
            .ok_or_else(|| {
                FontError::Parse(format!(
                    "table '{}' lies outside the file",
                    String::from_utf8_lossy(&tag)
                ))
            })?;

        tables.push(SfntTable {
            tag,
            checksum,
            data: table,
        });
    }

    tables.sort_by_key(|t| t.tag);

    Ok(Sfnt { flavor, tables })
}

/// Wrap a font as WOFF 1.0.
pub fn to_woff(data: &[u8]) -> Result<Vec<u8>, FontError> {
    let sfnt = read_sfnt(data)?;
    let data_start = WOFF_HEADER_LEN + WOFF_RECORD_LEN * sfnt.tables.len();

    let mut directory = Vec::with_capacity(WOFF_RECORD_LEN * sfnt.tables.len());
    let mut body = Vec::new();

    for table in &sfnt.tables {
        let compressed = zlib(table.data)?;
        // Tables that do not shrink are stored raw.
        let stored: &[u8] = if compressed.len() < table.data.len() {
            &compressed
        } else {
            table.data
        };

        directory.extend_from_slice(&table.tag);
        push_u32(&mut directory, (data_start + body.len()) as u32);
        push_u32(&mut directory, stored.len() as u32);
        push_u32(&mut directory, table.data.len() as u32);
        push_u32(&mut directory, table.checksum);

        body.extend_from_slice(stored);
        pad(&mut body);
    }

    let mut out = Vec::with_capacity(data_start + body.len());
    push_u32(&mut out, WOFF_SIGNATURE);
    push_u32(&mut out, sfnt.flavor);
    push_u32(&mut out, (data_start + body.len()) as u32);
    push_u16(&mut out, sfnt.tables.len() as u16);
    push_u16(&mut out, 0);
    push_u32(&mut out, sfnt.total_sfnt_size() as u32);
    push_u16(&mut out, 1);
    push_u16(&mut out, 0);
    // No metadata or private data blocks.
    for _ in 0..5 {
        push_u32(&mut out, 0);
    }

    out.extend_from_slice(&directory);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Wrap a font as WOFF2.
pub fn to_woff2(data: &[u8]) -> Result<Vec<u8>, FontError> {
    let sfnt = read_sfnt(data)?;

    let mut directory = Vec::new();
    let mut stream = Vec::new();

    for table in &sfnt.tables {
        let transform = if &table.tag == b"glyf" || &table.tag == b"loca" {
            NULL_GLYF_TRANSFORM
        } else {
            0
        };

        directory.push(ARBITRARY_TAG | (transform << 6));
        directory.extend_from_slice(&table.tag);
        push_base128(&mut directory, table.data.len() as u32);
        stream.extend_from_slice(table.data);
    }

    let compressed = brotli_compress(&stream)?;

    let mut out = Vec::with_capacity(WOFF2_HEADER_LEN + directory.len() + compressed.len() + 3);
    push_u32(&mut out, WOFF2_SIGNATURE);
    push_u32(&mut out, sfnt.flavor);
    push_u32(&mut out, 0);
    push_u16(&mut out, sfnt.tables.len() as u16);
    push_u16(&mut out, 0);
    push_u32(&mut out, sfnt.total_sfnt_size() as u32);
    push_u32(&mut out, compressed.len() as u32);
    push_u16(&mut out, 1);
    push_u16(&mut out, 0);
    for _ in 0..5 {
        push_u32(&mut out, 0);
    }

    out.extend_from_slice(&directory);
    out.extend_from_slice(&compressed);
    pad(&mut out);

    let length = (out.len() as u32).to_be_bytes();
    out[8..12].copy_from_slice(&length);
    Ok(out)
}

fn zlib(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    encoder.finish()
}

fn brotli_compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut writer = brotli::CompressorWriter::new(Vec::new(), 4096, 11, 22);
    writer.write_all(data)?;
    Ok(writer.into_inner())
}

/// Append a WOFF2 UIntBase128: big-endian groups of seven bits, high bit set
/// on every byte but the last.
fn push_base128(out: &mut Vec<u8>, mut value: u32) {
    let mut groups = [0u8; 5];
    let mut len = 0;
    loop {
        groups[len] = (value & 0x7F) as u8;
        value >>= 7;
        len += 1;
        if value == 0 {
            break;
        }
    }

    for i in (0..len).rev() {
        let more = if i == 0 { 0 } else { 0x80 };
        out.push(groups[i] | more);
    }
}

fn be_u16(data: &[u8], offset: usize) -> Result<u16, FontError> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| FontError::Parse("truncated header".to_string()))
}

fn be_u32(data: &[u8], offset: usize) -> Result<u32, FontError> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| FontError::Parse("truncated header".to_string()))
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn padded(len: usize) -> usize {
    (len + 3) & !3
}

fn pad(out: &mut Vec<u8>) {
    out.resize(padded(out.len()), 0);
}
