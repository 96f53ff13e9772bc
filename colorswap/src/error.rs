use custom_error::custom_error;

use gif_support::RGB;

custom_error! {pub ColorSwapError
    UsageError {description: String} = "Invalid arguments: {description}",
    OpenInputFailed {path: String, description: String} = "Failed to open {path}: {description}",
    NoColorTable {path: String} = "{path} has no global color table",
    EmptyColorTable {path: String} = "Global color table of {path} is empty",
    ColorNotFound {color: RGB} = "Color {color} is not present in the global color table",
    DuplicateColor {color: RGB, first: usize, second: usize} = "Color {color} is present in the global color table more than once (indices {first} and {second})",
    OpenOutputFailed {path: String, description: String} = "Failed to create {path}: {description}",
    WriteScreenDescFailed {description: String} = "Failed to write screen descriptor: {description}",
    RecordReadFailed {description: String} = "Failed to read record type: {description}",
    ImageDescReadFailed {image: usize, description: String} = "Failed to read descriptor of image {image}: {description}",
    ImageDescWriteFailed {image: usize, description: String} = "Failed to write descriptor of image {image}: {description}",
    ScanlineReadFailed {image: usize, line: usize, description: String} = "Failed to read line {line} of image {image}: {description}",
    ScanlineWriteFailed {image: usize, line: usize, description: String} = "Failed to write line {line} of image {image}: {description}",
    ExtensionReadFailed {description: String} = "Failed to read extension: {description}",
    ExtensionWriteFailed {description: String} = "Failed to write extension: {description}",
    WriteTerminatorFailed {description: String} = "Failed to write terminator: {description}",
    PersistOutputFailed {path: String, description: String} = "Failed to save {path}: {description}",
    CloseFailed {description: String} = "Failed to close: {description}"
}
