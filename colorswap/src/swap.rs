use std::io::{BufWriter, Read, Write};
use std::path::Path;

use log::Level;
use tempfile::NamedTempFile;

use gif_support::{ColorTable, GIFReader, GIFReaderError, GIFWriter, GIFWriterError, ImageDescriptor, RecordType, RGB};
use gif_support::common::extension_name;

use crate::config::SwapOptions;
use crate::error::ColorSwapError;
use crate::palette;

const STREAM_NAME: &str = "<stream>";

/// Reads the GIF at `options.input_path`, moves `options.target_color` to index 0 of its global color
/// table and writes the result to `options.output_path`.
///
/// The image is written to a temporary file next to the output, which replaces the output path only after
/// the whole image is written. A failed run leaves the output path untouched.
pub fn run(options: &SwapOptions) -> Result<(), ColorSwapError> {
    options.validate()?;

    debug!("target color is {}", options.target_color);
    debug!("input file is {}", options.input_path.display());
    debug!("output file is {}", options.output_path.display());

    let input_name = options.input_path.display().to_string();
    let reader = GIFReader::open(&options.input_path).map_err(|err| ColorSwapError::OpenInputFailed {
        path: input_name.clone(),
        description: err.to_string(),
    })?;

    let output_path = &options.output_path;
    let output_name = output_path.display().to_string();
    let output = process(reader, &input_name, options.target_color, || {
        let file = NamedTempFile::new_in(output_dir(output_path)).map_err(|err| ColorSwapError::OpenOutputFailed {
            path: output_name.clone(),
            description: err.to_string(),
        })?;
        debug!("writing to temporary file {}", file.path().display());

        Ok(GIFWriter::new(BufWriter::new(file)))
    })?;

    let file = output.into_inner().map_err(|err| ColorSwapError::PersistOutputFailed {
        path: output_name.clone(),
        description: err.to_string(),
    })?;
    file.persist(output_path).map_err(|err| ColorSwapError::PersistOutputFailed {
        path: output_name.clone(),
        description: err.to_string(),
    })?;

    info!("moved color {} of {} to index 0", options.target_color, input_name);

    Ok(())
}

/// Same as `run`, for a GIF held in memory or streamed. Returns `output` once the image is written.
pub fn swap_stream<R: Read, W: Write>(input: R, output: W, target_color: RGB) -> Result<W, ColorSwapError> {
    let reader = GIFReader::new(input).map_err(|err| ColorSwapError::OpenInputFailed {
        path: STREAM_NAME.to_string(),
        description: err.to_string(),
    })?;

    process(reader, STREAM_NAME, target_color, move || Ok(GIFWriter::new(output)))
}

fn output_dir(output_path: &Path) -> &Path {
    match output_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

fn process<R, W, F>(reader: GIFReader<R>, source_name: &str, target_color: RGB, open_output: F) -> Result<W, ColorSwapError>
where
    R: Read,
    W: Write,
    F: FnOnce() -> Result<GIFWriter<W>, ColorSwapError>,
{
    let mut session = Session::new(reader);

    let global_color_table = match session.reader.global_color_table() {
        Some(v) if v.is_empty() => return Err(ColorSwapError::EmptyColorTable {
            path: source_name.to_string(),
        }),
        Some(v) => v,
        None => return Err(ColorSwapError::NoColorTable {
            path: source_name.to_string(),
        }),
    };
    debug!("Colors: {}", global_color_table.len());

    let swap_index = palette::locate(global_color_table, target_color)?;
    debug!("color {} is at index {}", target_color, swap_index);

    let color_table: &ColorTable = session.color_table.insert(palette::swap(global_color_table, swap_index));

    let writer = session.writer.insert(open_output()?);

    writer.write_screen_descriptor(session.reader.screen_descriptor(), Some(color_table))
        .map_err(|err| ColorSwapError::WriteScreenDescFailed {
            description: err.to_string(),
        })?;

    // the table has at most 256 entries
    copy_records(&mut session.reader, writer, color_table, swap_index as u8)?;

    for (index, color) in color_table.colors.iter().enumerate() {
        debug!("colors[{}] = {}", index, color);
    }

    session.finish().ok_or_else(|| ColorSwapError::OpenOutputFailed {
        path: source_name.to_string(),
        description: "output was never opened".to_string(),
    })
}

fn copy_records<R: Read, W: Write>(
    reader: &mut GIFReader<R>,
    writer: &mut GIFWriter<W>,
    color_table: &ColorTable,
    swap_index: u8,
) -> Result<(), ColorSwapError> {
    let mut images = 0;
    let mut extensions = 0;

    loop {
        let record_type = reader.read_record_type().map_err(|err| ColorSwapError::RecordReadFailed {
            description: err.to_string(),
        })?;

        match record_type {
            RecordType::ImageDescription => {
                copy_image(reader, writer, color_table, swap_index, images)?;
                images += 1;
            },
            RecordType::Extension => {
                copy_extension(reader, writer)?;
                extensions += 1;
            },
            RecordType::Terminate => {
                writer.write_terminator().map_err(|err| ColorSwapError::WriteTerminatorFailed {
                    description: err.to_string(),
                })?;

                debug!("copied {} images and {} extensions", images, extensions);
                return Ok(());
            },
            RecordType::Unknown(byte) => warn!("skipping unknown record type {:#04x}", byte),
        }
    }
}

fn copy_image<R: Read, W: Write>(
    reader: &mut GIFReader<R>,
    writer: &mut GIFWriter<W>,
    color_table: &ColorTable,
    swap_index: u8,
    image: usize,
) -> Result<(), ColorSwapError> {
    let ImageDescriptor {
        left,
        top,
        width,
        height,
        interlaced,
        sorted,
        reserved,
        local_color_table,
        min_code_size,
    } = reader.read_image_descriptor().map_err(|err| ColorSwapError::ImageDescReadFailed {
        image,
        description: err.to_string(),
    })?;

    trace!("image {}: {}x{} at ({}, {})", image, width, height, left, top);
    if let Some(table) = &local_color_table {
        debug!("image {} has a local color table of {} entries, replacing it with the global one", image, table.len());
    }

    let descriptor = ImageDescriptor {
        left,
        top,
        width,
        height,
        interlaced,
        sorted,
        reserved,
        local_color_table: local_color_table.map(|_| color_table.clone()),
        min_code_size,
    };

    writer.write_image_descriptor(&descriptor).map_err(|err| ColorSwapError::ImageDescWriteFailed {
        image,
        description: err.to_string(),
    })?;

    let mut line = vec![0u8; width as usize];
    for y in 0..height as usize {
        reader.read_line(&mut line).map_err(|err| ColorSwapError::ScanlineReadFailed {
            image,
            line: y,
            description: err.to_string(),
        })?;

        palette::remap_line(&mut line, swap_index);

        writer.write_line(&line).map_err(|err| ColorSwapError::ScanlineWriteFailed {
            image,
            line: y,
            description: err.to_string(),
        })?;
    }

    Ok(())
}

fn copy_extension<R: Read, W: Write>(reader: &mut GIFReader<R>, writer: &mut GIFWriter<W>) -> Result<(), ColorSwapError> {
    let read_failed = |err: GIFReaderError| ColorSwapError::ExtensionReadFailed {
        description: err.to_string(),
    };
    let write_failed = |err: GIFWriterError| ColorSwapError::ExtensionWriteFailed {
        description: err.to_string(),
    };

    let (label, mut block) = reader.read_extension().map_err(read_failed)?;
    trace!("copying {} extension {:#04x}", extension_name(label), label);

    writer.write_extension_leader(label).map_err(write_failed)?;
    while let Some(data) = block {
        writer.write_extension_block(&data).map_err(write_failed)?;
        block = reader.read_extension_next().map_err(read_failed)?;
    }
    writer.write_extension_trailer().map_err(write_failed)?;

    Ok(())
}

// Owns everything that has to be released when processing stops, whichever way it stops.
// Teardown order is input, output, color table.
struct Session<R: Read, W: Write> {
    reader: GIFReader<R>,
    writer: Option<GIFWriter<W>>,
    color_table: Option<ColorTable>,
    completed: bool,
}

impl<R: Read, W: Write> Session<R, W> {

    fn new(reader: GIFReader<R>) -> Self {
        Session {
            reader,
            writer: None,
            color_table: None,
            completed: false,
        }
    }

    fn finish(mut self) -> Option<W> {
        self.completed = true;
        self.close_reader();

        self.writer.take().map(|mut writer| {
            close_writer(&mut writer, true);
            writer.into_inner()
        })
    }

    fn close_reader(&mut self) {
        if let Err(err) = self.reader.close() {
            let io_failure = matches!(err, GIFReaderError::Io { .. });
            log_close_failure(close_failure_level(self.completed, io_failure), format!("input: {}", err));
        }
    }
}

impl<R: Read, W: Write> Drop for Session<R, W> {

    fn drop(&mut self) {
        self.close_reader();

        if let Some(mut writer) = self.writer.take() {
            close_writer(&mut writer, self.completed);
        }

        if let Some(color_table) = self.color_table.take() {
            trace!("releasing color table of {} entries", color_table.len());
        }
    }
}

fn close_writer<W: Write>(writer: &mut GIFWriter<W>, completed: bool) {
    if let Err(err) = writer.close() {
        let io_failure = matches!(err, GIFWriterError::Io { .. });
        log_close_failure(close_failure_level(completed, io_failure), format!("output: {}", err));
    }
}

// an unfinished image is expected to fail closing once processing has already failed
fn close_failure_level(completed: bool, io_failure: bool) -> Level {
    if completed || io_failure {
        Level::Error
    } else {
        Level::Debug
    }
}

fn log_close_failure(level: Level, description: String) {
    log!(level, "{}", ColorSwapError::CloseFailed { description });
}
