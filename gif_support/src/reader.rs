use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use custom_error::custom_error;

use crate::common::{
    ColorTable, ImageDescriptor, RecordType, ScreenDescriptor, Version,
    SIGNATURE, entries_for_size_field,
};
use crate::lzw;

// see https://www.fileformat.info/format/gif/egff.htm

custom_error! {pub GIFReaderError
    InvalidHeader {description: String} = "Invalid header: {description}",
    InvalidBlock {description: String} = "Invalid block: {description}",
    NotImplemented {description: String} = "Not implemented: {description}",
    Io {source: io::Error} = "I/O error: {source}"
}

/// Sequential reader over the records of a GIF stream.
///
/// The header, logical screen descriptor and global color table are read when the reader is created.
/// After that records are consumed one by one: `read_record_type` followed by the matching
/// `read_image_descriptor` + `read_line` calls, or `read_extension` + `read_extension_next` calls.
pub struct GIFReader<R: Read> {
    input: R,
    screen_descriptor: ScreenDescriptor,
    global_color_table: Option<ColorTable>,
    image: Option<ImageLines>,
    closed: bool,
}

// decoded indices of the image that is currently being read
struct ImageLines {
    width: usize,
    height: usize,
    lines_read: usize,
    pixels: Vec<u8>,
}

impl GIFReader<BufReader<File>> {

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GIFReaderError> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> GIFReader<R> {

    pub fn new(mut input: R) -> Result<Self, GIFReaderError> {
        let version = read_header(&mut input)?;
        let (screen_descriptor, global_color_table_size) = read_screen_descriptor(&mut input, version)?;

        let global_color_table = match global_color_table_size {
            Some(entries) => Some(read_color_table(&mut input, entries)?),
            None => None,
        };

        Ok(GIFReader {
            input,
            screen_descriptor,
            global_color_table,
            image: None,
            closed: false,
        })
    }

    pub fn screen_descriptor(&self) -> &ScreenDescriptor {
        &self.screen_descriptor
    }

    pub fn global_color_table(&self) -> Option<&ColorTable> {
        self.global_color_table.as_ref()
    }

    pub fn read_record_type(&mut self) -> Result<RecordType, GIFReaderError> {
        self.ensure_open()?;

        if let Some(image) = self.image.take() {
            debug!("skipping {} unread lines of the previous image", image.height - image.lines_read);
        }

        Ok(RecordType::from_byte(self.input.read_u8()?))
    }

    /// Reads the image descriptor that follows an image separator, including the local color table
    /// and the image data. Lines are then available through `read_line`.
    pub fn read_image_descriptor(&mut self) -> Result<ImageDescriptor, GIFReaderError> {
        self.ensure_open()?;

        let left = self.input.read_u16::<LittleEndian>()?;
        let top = self.input.read_u16::<LittleEndian>()?;
        let width = self.input.read_u16::<LittleEndian>()?;
        let height = self.input.read_u16::<LittleEndian>()?;

        let packed = self.input.read_u8()?;
        let has_local_color_table = (packed & 0b10000000) >> 7 == 1;
        let interlaced = (packed & 0b01000000) >> 6 == 1;
        let sorted = (packed & 0b00100000) >> 5 == 1;
        let reserved = (packed & 0b00011000) >> 3;
        let size_of_local_color_table = packed & 0b111;

        trace!("image {}x{} at ({}, {}), packed is {:08b}", width, height, left, top, packed);

        let local_color_table = if has_local_color_table {
            Some(read_color_table(&mut self.input, entries_for_size_field(size_of_local_color_table))?)
        } else {
            None
        };

        let min_code_size = self.input.read_u8()?;
        lzw::check_min_code_size(min_code_size).map_err(|err| GIFReaderError::InvalidBlock {
            description: format!("image data: {}", err),
        })?;

        let compressed_data = read_sub_blocks(&mut self.input)?;
        let mut pixels = lzw::decode(&compressed_data, min_code_size).map_err(|err| GIFReaderError::InvalidBlock {
            description: format!("failed to decode image data: {}", err),
        })?;

        let descriptor = ImageDescriptor {
            left,
            top,
            width,
            height,
            interlaced,
            sorted,
            reserved,
            local_color_table,
            min_code_size,
        };

        let expected = descriptor.pixel_count();
        if pixels.len() > expected {
            debug!("image data has {} extra indices, ignoring them", pixels.len() - expected);
            pixels.truncate(expected);
        }

        self.image = if height > 0 {
            Some(ImageLines {
                width: width as usize,
                height: height as usize,
                lines_read: 0,
                pixels,
            })
        } else {
            None
        };

        Ok(descriptor)
    }

    /// Fills `line` with the next line of palette indices of the current image, in stored
    /// (possibly interlaced) order. `line` must be exactly as long as the image is wide.
    pub fn read_line(&mut self, line: &mut [u8]) -> Result<(), GIFReaderError> {
        self.ensure_open()?;

        let image = match self.image.as_mut() {
            Some(v) => v,
            None => return Err(GIFReaderError::InvalidBlock {
                description: "no image lines left to read".to_string(),
            })
        };

        if line.len() != image.width {
            return Err(GIFReaderError::InvalidBlock {
                description: format!("line buffer has {} entries, image is {} pixels wide", line.len(), image.width),
            });
        }

        let offset = image.lines_read * image.width;
        let end = offset + image.width;
        if end > image.pixels.len() {
            return Err(GIFReaderError::InvalidBlock {
                description: format!("image data ended after {} of {} lines", image.lines_read, image.height),
            });
        }

        line.copy_from_slice(&image.pixels[offset..end]);
        image.lines_read += 1;

        if image.lines_read == image.height {
            self.image = None;
        }

        Ok(())
    }

    /// Reads an extension label and its first sub-block. `None` means the extension has no sub-blocks.
    pub fn read_extension(&mut self) -> Result<(u8, Option<Vec<u8>>), GIFReaderError> {
        self.ensure_open()?;

        let label = self.input.read_u8()?;
        let block = read_sub_block(&mut self.input)?;

        Ok((label, block))
    }

    /// Reads the next sub-block of the current extension, `None` once the block terminator is reached.
    pub fn read_extension_next(&mut self) -> Result<Option<Vec<u8>>, GIFReaderError> {
        self.ensure_open()?;
        read_sub_block(&mut self.input)
    }

    /// Releases the reader. Fails if the current image still had unread lines.
    pub fn close(&mut self) -> Result<(), GIFReaderError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        match self.image.take() {
            Some(image) => Err(GIFReaderError::InvalidBlock {
                description: format!("closed after {} of {} lines of an image", image.lines_read, image.height),
            }),
            None => Ok(()),
        }
    }

    fn ensure_open(&self) -> Result<(), GIFReaderError> {
        if self.closed {
            return Err(GIFReaderError::InvalidBlock {
                description: "reader is closed".to_string(),
            });
        }

        Ok(())
    }
}

fn read_header<R: Read>(input: &mut R) -> Result<Version, GIFReaderError> {
    let mut header = [0u8; 6];
    input.read_exact(&mut header).map_err(|err| GIFReaderError::InvalidHeader {
        description: format!("failed to read signature: {}", err),
    })?;

    if &header[0..3] != SIGNATURE {
        return Err(GIFReaderError::InvalidHeader {
            description: format!("Unexpected signature for GIF: {:x?}", &header[0..3]),
        });
    }

    match Version::from_bytes(&header[3..6]) {
        Some(version) => Ok(version),
        None => Err(GIFReaderError::NotImplemented {
            description: format!("Support for GIF version {:x?} not implemented", &header[3..6]),
        }),
    }
}

fn read_screen_descriptor<R: Read>(input: &mut R, version: Version) -> Result<(ScreenDescriptor, Option<usize>), GIFReaderError> {
    let width = input.read_u16::<LittleEndian>()?;
    let height = input.read_u16::<LittleEndian>()?;

    let packed = input.read_u8()?;

    let size_of_global_color_table = packed & 0b111;
    let color_table_sort_flag = (packed & 0b1000) >> 3;
    let color_resolution = (packed & 0b1110000) >> 4;
    let global_color_table = (packed & 0b10000000) >> 7 == 1;
    let number_of_global_color_table_entries = entries_for_size_field(size_of_global_color_table);

    trace!("packed is {:?}", packed);
    trace!("size of global color table: {}", size_of_global_color_table);
    trace!("color table sort flag: {}", color_table_sort_flag);
    trace!("color resolution: {}", color_resolution);
    trace!("global color table: {}", global_color_table);
    trace!("number of global color table entries: {}", number_of_global_color_table_entries);

    let background_color_index = input.read_u8()?;
    trace!("background color: {}", background_color_index);

    let aspect_ratio = input.read_u8()?;
    trace!("aspect ratio: {}", aspect_ratio);

    let screen_descriptor = ScreenDescriptor {
        version,
        width,
        height,
        color_resolution,
        sorted: color_table_sort_flag == 1,
        background_color_index,
        aspect_ratio,
    };

    Ok((screen_descriptor, if global_color_table { Some(number_of_global_color_table_entries) } else { None }))
}

fn read_color_table<R: Read>(input: &mut R, number_of_entries: usize) -> Result<ColorTable, GIFReaderError> {
    let mut data = vec![0u8; number_of_entries * 3];
    input.read_exact(&mut data).map_err(|err| GIFReaderError::InvalidBlock {
        description: format!("color table of {} entries is incomplete: {}", number_of_entries, err),
    })?;

    Ok(ColorTable::from_bytes(&data))
}

fn read_sub_block<R: Read>(input: &mut R) -> Result<Option<Vec<u8>>, GIFReaderError> {
    let size = input.read_u8()? as usize;
    if size == 0 {
        return Ok(None);
    }

    let mut block = vec![0u8; size];
    input.read_exact(&mut block)?;

    Ok(Some(block))
}

fn read_sub_blocks<R: Read>(input: &mut R) -> Result<Vec<u8>, GIFReaderError> {
    let mut data = Vec::new();

    while let Some(mut block) = read_sub_block(input)? {
        data.append(&mut block);
    }

    Ok(data)
}
