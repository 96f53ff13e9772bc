use std::cmp::{max, min};
use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use custom_error::custom_error;

use crate::common::{
    ColorTable, ImageDescriptor, ScreenDescriptor,
    EXTENSION_INTRODUCER, IMAGE_SEPARATOR, MAX_SUB_BLOCK_SIZE, SIGNATURE, TRAILER, bits_for_colors,
};
use crate::lzw;

custom_error! {pub GIFWriterError
    InvalidTable {description: String} = "Invalid color table: {description}",
    InvalidState {description: String} = "Invalid writer state: {description}",
    InvalidLine {description: String} = "Invalid line: {description}",
    InvalidBlock {description: String} = "Invalid block: {description}",
    Io {source: io::Error} = "I/O error: {source}"
}

/// Sequential writer of GIF records, the counterpart of `GIFReader`.
pub struct GIFWriter<W: Write> {
    output: W,
    screen_written: bool,
    global_color_count: Option<usize>,
    image: Option<PendingImage>,
    closed: bool,
}

// indices of the image that is being written, compressed once the last line arrives
struct PendingImage {
    width: usize,
    height: usize,
    lines_written: usize,
    min_code_size: u8,
    pixels: Vec<u8>,
}

impl<W: Write> GIFWriter<W> {

    pub fn new(output: W) -> Self {
        GIFWriter {
            output,
            screen_written: false,
            global_color_count: None,
            image: None,
            closed: false,
        }
    }

    /// Writes the header and the logical screen descriptor followed by the global color table, if any.
    pub fn write_screen_descriptor(&mut self, screen: &ScreenDescriptor, global_color_table: Option<&ColorTable>) -> Result<(), GIFWriterError> {
        self.ensure_open()?;
        if self.screen_written {
            return Err(GIFWriterError::InvalidState {
                description: "screen descriptor is already written".to_string(),
            });
        }

        let size_of_global_color_table = match global_color_table {
            Some(table) => Some(color_table_size_field(table)?),
            None => None,
        };

        let mut packed: u8 = 0;
        if let Some(size) = size_of_global_color_table {
            packed = packed | 0b10000000; // use global color table
            packed = packed | size;
        }
        packed = packed | ((screen.color_resolution & 0b111) << 4);
        if screen.sorted {
            packed = packed | 0b1000;
        }

        self.output.write_all(SIGNATURE)?;
        self.output.write_all(screen.version.as_bytes())?;
        self.output.write_u16::<LittleEndian>(screen.width)?;
        self.output.write_u16::<LittleEndian>(screen.height)?;
        self.output.write_u8(packed)?;
        self.output.write_u8(screen.background_color_index)?;
        self.output.write_u8(screen.aspect_ratio)?;

        if let Some(table) = global_color_table {
            self.output.write_all(&table.to_bytes())?;
        }

        self.screen_written = true;
        self.global_color_count = global_color_table.map(|v| v.len());

        Ok(())
    }

    /// Writes an image separator, the descriptor and its local color table. The image data follows
    /// through `write_line`, exactly `descriptor.height` lines of `descriptor.width` indices.
    pub fn write_image_descriptor(&mut self, descriptor: &ImageDescriptor) -> Result<(), GIFWriterError> {
        self.ensure_ready_for_record()?;

        let size_of_local_color_table = match &descriptor.local_color_table {
            Some(table) => Some(color_table_size_field(table)?),
            None => None,
        };

        let color_count = descriptor.local_color_table.as_ref()
            .map(|v| v.len())
            .or(self.global_color_count)
            .unwrap_or(0);
        let min_code_size = max(max(descriptor.min_code_size, bits_for_colors(color_count)), 2);
        lzw::check_min_code_size(min_code_size).map_err(|err| GIFWriterError::InvalidBlock {
            description: err.to_string(),
        })?;

        let mut packed: u8 = 0;
        if let Some(size) = size_of_local_color_table {
            packed = packed | 0b10000000;
            packed = packed | size;
        }
        if descriptor.interlaced {
            packed = packed | 0b01000000;
        }
        if descriptor.sorted {
            packed = packed | 0b00100000;
        }
        packed = packed | ((descriptor.reserved & 0b11) << 3);

        self.output.write_u8(IMAGE_SEPARATOR)?;
        self.output.write_u16::<LittleEndian>(descriptor.left)?;
        self.output.write_u16::<LittleEndian>(descriptor.top)?;
        self.output.write_u16::<LittleEndian>(descriptor.width)?;
        self.output.write_u16::<LittleEndian>(descriptor.height)?;
        self.output.write_u8(packed)?;

        if let Some(table) = &descriptor.local_color_table {
            self.output.write_all(&table.to_bytes())?;
        }

        self.image = Some(PendingImage {
            width: descriptor.width as usize,
            height: descriptor.height as usize,
            lines_written: 0,
            min_code_size,
            pixels: Vec::with_capacity(descriptor.pixel_count()),
        });

        if descriptor.height == 0 {
            self.write_image_data()?;
        }

        Ok(())
    }

    pub fn write_line(&mut self, line: &[u8]) -> Result<(), GIFWriterError> {
        self.ensure_open()?;

        let image = match self.image.as_mut() {
            Some(v) => v,
            None => return Err(GIFWriterError::InvalidState {
                description: "no image is being written".to_string(),
            })
        };

        if line.len() != image.width {
            return Err(GIFWriterError::InvalidLine {
                description: format!("line has {} entries, image is {} pixels wide", line.len(), image.width),
            });
        }

        let limit = 1usize << image.min_code_size;
        if let Some(index) = line.iter().find(|v| **v as usize >= limit) {
            return Err(GIFWriterError::InvalidLine {
                description: format!("index {} does not fit into code size {}", index, image.min_code_size),
            });
        }

        image.pixels.extend_from_slice(line);
        image.lines_written += 1;

        if image.lines_written == image.height {
            self.write_image_data()?;
        }

        Ok(())
    }

    pub fn write_extension_leader(&mut self, label: u8) -> Result<(), GIFWriterError> {
        self.ensure_ready_for_record()?;

        self.output.write_u8(EXTENSION_INTRODUCER)?;
        self.output.write_u8(label)?;

        Ok(())
    }

    pub fn write_extension_block(&mut self, block: &[u8]) -> Result<(), GIFWriterError> {
        self.ensure_ready_for_record()?;

        if block.is_empty() || block.len() > MAX_SUB_BLOCK_SIZE {
            return Err(GIFWriterError::InvalidBlock {
                description: format!("sub-block must have 1 to {} bytes, got {}", MAX_SUB_BLOCK_SIZE, block.len()),
            });
        }

        self.output.write_u8(block.len() as u8)?;
        self.output.write_all(block)?;

        Ok(())
    }

    pub fn write_extension_trailer(&mut self) -> Result<(), GIFWriterError> {
        self.ensure_ready_for_record()?;
        self.output.write_u8(0)?;
        Ok(())
    }

    /// Writes the trailer byte and flushes the output.
    pub fn write_terminator(&mut self) -> Result<(), GIFWriterError> {
        self.ensure_ready_for_record()?;
        self.output.write_u8(TRAILER)?;
        self.output.flush()?;
        Ok(())
    }

    /// Flushes the output and releases the writer. Fails if an image was left incomplete.
    pub fn close(&mut self) -> Result<(), GIFWriterError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.output.flush()?;

        match self.image.take() {
            Some(image) => Err(GIFWriterError::InvalidState {
                description: format!("closed after {} of {} lines of an image", image.lines_written, image.height),
            }),
            None => Ok(()),
        }
    }

    pub fn into_inner(self) -> W {
        self.output
    }

    fn write_image_data(&mut self) -> Result<(), GIFWriterError> {
        let image = match self.image.take() {
            Some(v) => v,
            None => return Ok(()),
        };

        let compressed_data = lzw::encode(&image.pixels, image.min_code_size).map_err(|err| GIFWriterError::InvalidLine {
            description: format!("failed to compress image data: {}", err),
        })?;

        trace!(
            "compressed {} indices into {} bytes with min code size {}",
            image.pixels.len(),
            compressed_data.len(),
            image.min_code_size
        );

        self.output.write_u8(image.min_code_size)?;
        self.output.write_all(&split_into_sub_blocks(&compressed_data))?;

        Ok(())
    }

    fn ensure_ready_for_record(&self) -> Result<(), GIFWriterError> {
        self.ensure_open()?;

        if !self.screen_written {
            return Err(GIFWriterError::InvalidState {
                description: "screen descriptor has to be written first".to_string(),
            });
        }

        if let Some(image) = &self.image {
            return Err(GIFWriterError::InvalidState {
                description: format!("image has {} of {} lines written", image.lines_written, image.height),
            });
        }

        Ok(())
    }

    fn ensure_open(&self) -> Result<(), GIFWriterError> {
        if self.closed {
            return Err(GIFWriterError::InvalidState {
                description: "writer is closed".to_string(),
            });
        }

        Ok(())
    }
}

fn color_table_size_field(table: &ColorTable) -> Result<u8, GIFWriterError> {
    table.size_field().ok_or_else(|| GIFWriterError::InvalidTable {
        description: format!("{} entries is not a power of two between 2 and 256", table.len()),
    })
}

// sub-blocks followed by the block terminator
fn split_into_sub_blocks(data: &[u8]) -> Vec<u8> {
    let mut data = data;
    let mut data_blocks: Vec<u8> = Vec::with_capacity(data.len() + data.len() / MAX_SUB_BLOCK_SIZE + 2);

    while data.len() > 0 {
        let sub_block_size = min(data.len(), MAX_SUB_BLOCK_SIZE);

        data_blocks.push(sub_block_size as u8);
        data_blocks.extend_from_slice(&data[..sub_block_size]);

        data = &data[sub_block_size..];
    }

    data_blocks.push(0);

    data_blocks
}

#[cfg(test)]
mod tests {
    use std::fs::read;
    use std::io::Cursor;

    use crate::common::{RecordType, Version, RGB, COMMENT_LABEL, GRAPHIC_CONTROL_LABEL, APPLICATION_LABEL};
    use crate::reader::GIFReader;

    use super::*;

    fn screen(width: u16, height: u16) -> ScreenDescriptor {
        ScreenDescriptor {
            version: Version::GIF89a,
            width,
            height,
            color_resolution: 7,
            sorted: false,
            background_color_index: 0,
            aspect_ratio: 0,
        }
    }

    fn table(len: usize) -> ColorTable {
        ColorTable::new((0..len).map(|i| RGB::new(i as u8, 255 - i as u8, 7)).collect())
    }

    fn image(width: u16, height: u16) -> ImageDescriptor {
        ImageDescriptor {
            left: 0,
            top: 0,
            width,
            height,
            interlaced: false,
            sorted: false,
            reserved: 0,
            local_color_table: None,
            min_code_size: 2,
        }
    }

    #[test]
    fn test_rewrite_sample() {
        let sample = read("assets/sample.gif").expect("failed to read test asset");
        let mut reader = GIFReader::new(Cursor::new(sample.clone())).expect("failed to read test image");
        let mut writer = GIFWriter::new(Vec::new());

        writer.write_screen_descriptor(reader.screen_descriptor(), reader.global_color_table())
            .expect("failed to write screen descriptor");

        loop {
            match reader.read_record_type().expect("failed to read record") {
                RecordType::ImageDescription => {
                    let descriptor = reader.read_image_descriptor().expect("failed to read image descriptor");
                    writer.write_image_descriptor(&descriptor).expect("failed to write image descriptor");

                    let mut line = vec![0u8; descriptor.width as usize];
                    for _ in 0..descriptor.height {
                        reader.read_line(&mut line).expect("failed to read line");
                        writer.write_line(&line).expect("failed to write line");
                    }
                },
                RecordType::Extension => {
                    let (label, mut block) = reader.read_extension().expect("failed to read extension");
                    writer.write_extension_leader(label).expect("failed to write extension");
                    while let Some(data) = block {
                        writer.write_extension_block(&data).expect("failed to write extension");
                        block = reader.read_extension_next().expect("failed to read extension");
                    }
                    writer.write_extension_trailer().expect("failed to write extension");
                },
                RecordType::Terminate => {
                    writer.write_terminator().expect("failed to write terminator");
                    break;
                },
                RecordType::Unknown(byte) => panic!("unexpected record {}", byte),
            }
        }

        writer.close().expect("failed to close writer");
        assert_eq!(writer.into_inner(), sample);
    }

    #[test]
    fn test_write_and_read_back() {
        let mut writer = GIFWriter::new(Vec::new());
        writer.write_screen_descriptor(&screen(3, 2), Some(&table(4))).expect("failed to write screen descriptor");

        writer.write_extension_leader(APPLICATION_LABEL).expect("failed to write extension");
        writer.write_extension_block(b"NETSCAPE2.0").expect("failed to write extension");
        writer.write_extension_block(&[1, 0, 0]).expect("failed to write extension");
        writer.write_extension_trailer().expect("failed to write extension");

        let mut descriptor = image(3, 2);
        descriptor.left = 1;
        descriptor.top = 2;
        descriptor.interlaced = true;
        descriptor.local_color_table = Some(table(8));
        writer.write_image_descriptor(&descriptor).expect("failed to write image descriptor");
        writer.write_line(&[0, 7, 3]).expect("failed to write line");
        writer.write_line(&[5, 5, 1]).expect("failed to write line");

        writer.write_extension_leader(COMMENT_LABEL).expect("failed to write extension");
        writer.write_extension_trailer().expect("failed to write extension");

        writer.write_terminator().expect("failed to write terminator");
        writer.close().expect("failed to close writer");

        let data = writer.into_inner();
        assert_eq!(&data[0..6], b"GIF89a");
        assert_eq!(*data.last().expect("empty output"), TRAILER);

        let mut reader = GIFReader::new(Cursor::new(data)).expect("failed to read written image");
        assert_eq!(reader.screen_descriptor(), &screen(3, 2));
        assert_eq!(reader.global_color_table(), Some(&table(4)));

        assert_eq!(reader.read_record_type().expect("failed to read record"), RecordType::Extension);
        assert_eq!(reader.read_extension().expect("failed to read extension"), (APPLICATION_LABEL, Some(b"NETSCAPE2.0".to_vec())));
        assert_eq!(reader.read_extension_next().expect("failed to read extension"), Some(vec![1, 0, 0]));
        assert_eq!(reader.read_extension_next().expect("failed to read extension"), None);

        assert_eq!(reader.read_record_type().expect("failed to read record"), RecordType::ImageDescription);
        let read_descriptor = reader.read_image_descriptor().expect("failed to read image descriptor");
        // 8 local colors need 3 bits
        assert_eq!(read_descriptor.min_code_size, 3);
        assert_eq!(ImageDescriptor { min_code_size: 2, ..read_descriptor }, descriptor);

        let mut line = vec![0u8; 3];
        reader.read_line(&mut line).expect("failed to read line");
        assert_eq!(line, vec![0, 7, 3]);
        reader.read_line(&mut line).expect("failed to read line");
        assert_eq!(line, vec![5, 5, 1]);

        assert_eq!(reader.read_record_type().expect("failed to read record"), RecordType::Extension);
        assert_eq!(reader.read_extension().expect("failed to read extension"), (COMMENT_LABEL, None));

        assert_eq!(reader.read_record_type().expect("failed to read record"), RecordType::Terminate);
    }

    #[test]
    fn test_large_image_is_split_into_sub_blocks() {
        let (width, height) = (320u16, 240u16);
        let mut writer = GIFWriter::new(Vec::new());
        writer.write_screen_descriptor(&screen(width, height), Some(&table(256))).expect("failed to write screen descriptor");

        let mut descriptor = image(width, height);
        descriptor.min_code_size = 8;
        writer.write_image_descriptor(&descriptor).expect("failed to write image descriptor");

        let lines: Vec<Vec<u8>> = (0..height as usize)
            .map(|y| (0..width as usize).map(|x| ((x * 7 + y * 13) % 256) as u8).collect())
            .collect();
        for line in &lines {
            writer.write_line(line).expect("failed to write line");
        }
        writer.write_terminator().expect("failed to write terminator");

        let mut reader = GIFReader::new(Cursor::new(writer.into_inner())).expect("failed to read written image");
        assert_eq!(reader.read_record_type().expect("failed to read record"), RecordType::ImageDescription);
        reader.read_image_descriptor().expect("failed to read image descriptor");

        let mut line = vec![0u8; width as usize];
        for expected in &lines {
            reader.read_line(&mut line).expect("failed to read line");
            assert_eq!(&line, expected);
        }
    }

    #[test]
    fn test_write_empty_image() {
        let mut writer = GIFWriter::new(Vec::new());
        writer.write_screen_descriptor(&screen(1, 1), Some(&table(2))).expect("failed to write screen descriptor");
        writer.write_image_descriptor(&image(0, 0)).expect("failed to write image descriptor");
        writer.write_terminator().expect("failed to write terminator");

        let mut reader = GIFReader::new(Cursor::new(writer.into_inner())).expect("failed to read written image");
        assert_eq!(reader.read_record_type().expect("failed to read record"), RecordType::ImageDescription);
        assert_eq!(reader.read_image_descriptor().expect("failed to read image descriptor").pixel_count(), 0);
        assert_eq!(reader.read_record_type().expect("failed to read record"), RecordType::Terminate);
    }

    #[test]
    fn test_invalid_usage() {
        let mut writer = GIFWriter::new(Vec::new());
        assert!(matches!(writer.write_extension_leader(GRAPHIC_CONTROL_LABEL), Err(GIFWriterError::InvalidState { .. })));
        assert!(matches!(writer.write_screen_descriptor(&screen(1, 1), Some(&table(3))), Err(GIFWriterError::InvalidTable { .. })));

        writer.write_screen_descriptor(&screen(2, 2), Some(&table(4))).expect("failed to write screen descriptor");
        assert!(matches!(writer.write_extension_block(&[]), Err(GIFWriterError::InvalidBlock { .. })));
        assert!(matches!(writer.write_extension_block(&[0u8; 256]), Err(GIFWriterError::InvalidBlock { .. })));
        assert!(matches!(writer.write_line(&[0, 0]), Err(GIFWriterError::InvalidState { .. })));

        writer.write_image_descriptor(&image(2, 2)).expect("failed to write image descriptor");
        assert!(matches!(writer.write_line(&[0, 0, 0]), Err(GIFWriterError::InvalidLine { .. })));
        assert!(matches!(writer.write_line(&[0, 4]), Err(GIFWriterError::InvalidLine { .. })));
        writer.write_line(&[0, 3]).expect("failed to write line");
        assert!(matches!(writer.write_terminator(), Err(GIFWriterError::InvalidState { .. })));
        assert!(matches!(writer.close(), Err(GIFWriterError::InvalidState { .. })));
        assert!(matches!(writer.write_line(&[0, 3]), Err(GIFWriterError::InvalidState { .. })));
    }

    #[test]
    fn test_split_into_sub_blocks() {
        assert_eq!(split_into_sub_blocks(&[]), vec![0]);
        assert_eq!(split_into_sub_blocks(&[1, 2]), vec![2, 1, 2, 0]);

        let blocks = split_into_sub_blocks(&[9u8; 300]);
        assert_eq!(blocks.len(), 1 + 255 + 1 + 45 + 1);
        assert_eq!(blocks[0], 255);
        assert_eq!(blocks[256], 45);
    }
}
