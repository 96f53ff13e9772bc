use std::fmt;

// see https://www.w3.org/Graphics/GIF/spec-gif89a.txt

pub const SIGNATURE: &[u8; 3] = b"GIF";

pub const IMAGE_SEPARATOR: u8 = 0x2C;
pub const EXTENSION_INTRODUCER: u8 = 0x21;
pub const TRAILER: u8 = 0x3B;

pub const PLAIN_TEXT_LABEL: u8 = 0x01;
pub const GRAPHIC_CONTROL_LABEL: u8 = 0xF9;
pub const COMMENT_LABEL: u8 = 0xFE;
pub const APPLICATION_LABEL: u8 = 0xFF;

pub const MAX_SUB_BLOCK_SIZE: usize = 255;
pub const MAX_COLORS: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RGB {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl RGB {

    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        RGB {
            red,
            green,
            blue,
        }
    }
}

impl fmt::Display for RGB {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.red, self.green, self.blue)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColorTable {
    pub colors: Vec<RGB>,
}

impl ColorTable {

    pub fn new(colors: Vec<RGB>) -> Self {
        ColorTable {
            colors,
        }
    }

    /// Reads consecutive RGB triples. Trailing bytes that do not form a full triple are ignored.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self::new(data.chunks_exact(3)
            .map(|v| RGB::new(v[0], v[1], v[2]))
            .collect())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.size_in_bytes());

        for color in &self.colors {
            data.push(color.red);
            data.push(color.green);
            data.push(color.blue);
        }

        data
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.colors.len() * 3
    }

    /// Value of the 3-bit "size of color table" field: a table of `2^(n + 1)` entries has size field `n`.
    /// Returns `None` when the table cannot be stored in a GIF as is.
    pub fn size_field(&self) -> Option<u8> {
        let len = self.colors.len();
        if len < 2 || len > MAX_COLORS || !len.is_power_of_two() {
            return None;
        }

        Some(len.trailing_zeros() as u8 - 1)
    }
}

pub fn entries_for_size_field(size_field: u8) -> usize {
    1 << ((size_field & 0b111) + 1)
}

/// Number of bits needed to address `color_count` palette entries, never less than 1.
pub fn bits_for_colors(color_count: usize) -> u8 {
    let mut bits = 1;
    while (1usize << bits) < color_count {
        bits += 1;
    }
    bits
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Version {
    GIF87a,
    GIF89a,
}

impl Version {

    pub fn from_bytes(version: &[u8]) -> Option<Self> {
        match version {
            b"87a" => Some(Version::GIF87a),
            b"89a" => Some(Version::GIF89a),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> &'static [u8; 3] {
        match self {
            Version::GIF87a => b"87a",
            Version::GIF89a => b"89a",
        }
    }
}

/// Logical screen descriptor without the global color table itself.
#[derive(Clone, Debug, PartialEq)]
pub struct ScreenDescriptor {
    pub version: Version,

    pub width: u16,
    pub height: u16,

    pub color_resolution: u8, // 3 bits
    pub sorted: bool,
    pub background_color_index: u8,
    pub aspect_ratio: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImageDescriptor {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,

    pub interlaced: bool,
    pub sorted: bool,
    pub reserved: u8, // 2 bits, kept as is

    pub local_color_table: Option<ColorTable>,

    pub min_code_size: u8,
}

impl ImageDescriptor {

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordType {
    ImageDescription,
    Extension,
    Terminate,
    Unknown(u8),
}

impl RecordType {

    pub fn from_byte(byte: u8) -> Self {
        match byte {
            IMAGE_SEPARATOR => RecordType::ImageDescription,
            EXTENSION_INTRODUCER => RecordType::Extension,
            TRAILER => RecordType::Terminate,
            other => RecordType::Unknown(other),
        }
    }
}

pub fn extension_name(label: u8) -> &'static str {
    match label {
        PLAIN_TEXT_LABEL => "plain text",
        GRAPHIC_CONTROL_LABEL => "graphic control",
        COMMENT_LABEL => "comment",
        APPLICATION_LABEL => "application",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_field() {
        let table = |len: usize| ColorTable::new(vec![RGB::new(0, 0, 0); len]);

        assert_eq!(table(2).size_field(), Some(0));
        assert_eq!(table(4).size_field(), Some(1));
        assert_eq!(table(256).size_field(), Some(7));

        assert_eq!(table(0).size_field(), None);
        assert_eq!(table(1).size_field(), None);
        assert_eq!(table(6).size_field(), None);
        assert_eq!(table(512).size_field(), None);

        for size_field in 0..8 {
            assert_eq!(table(entries_for_size_field(size_field)).size_field(), Some(size_field));
        }
    }

    #[test]
    fn test_bits_for_colors() {
        assert_eq!(bits_for_colors(0), 1);
        assert_eq!(bits_for_colors(2), 1);
        assert_eq!(bits_for_colors(3), 2);
        assert_eq!(bits_for_colors(4), 2);
        assert_eq!(bits_for_colors(5), 3);
        assert_eq!(bits_for_colors(256), 8);
    }

    #[test]
    fn test_color_table_bytes() {
        let data = vec![0, 253, 255, 10, 10, 10, 1, 2, 3, 4, 5, 6];
        let table = ColorTable::from_bytes(&data);

        assert_eq!(table.len(), 4);
        assert_eq!(table.colors[0], RGB::new(0, 253, 255));
        assert_eq!(table.colors[3], RGB::new(4, 5, 6));
        assert_eq!(table.to_bytes(), data);
    }

    #[test]
    fn test_record_type_from_byte() {
        assert_eq!(RecordType::from_byte(0x2C), RecordType::ImageDescription);
        assert_eq!(RecordType::from_byte(0x21), RecordType::Extension);
        assert_eq!(RecordType::from_byte(0x3B), RecordType::Terminate);
        assert_eq!(RecordType::from_byte(0x00), RecordType::Unknown(0x00));
    }
}
