#[macro_use]
extern crate log;
extern crate custom_error;

pub mod common;
pub mod lzw;
pub mod reader;
pub mod writer;

pub use common::{ColorTable, ImageDescriptor, RecordType, ScreenDescriptor, Version, RGB};
pub use reader::{GIFReader, GIFReaderError};
pub use writer::{GIFWriter, GIFWriterError};
