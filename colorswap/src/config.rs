use std::path::PathBuf;

use clap::Parser;
use gif_support::RGB;

use crate::error::ColorSwapError;

pub const DEFAULT_TARGET_COLOR: RGB = RGB { red: 0, green: 253, blue: 255 };

/// Moves the given color to index 0 of the global color table of a GIF image.
#[derive(Parser, Debug)]
#[clap(version, allow_negative_numbers = true)]
pub struct Cli {
    /// Red component of the color to move
    #[clap(value_parser, value_name = "RED")]
    pub red: i64,

    /// Green component of the color to move
    #[clap(value_parser, value_name = "GREEN")]
    pub green: i64,

    /// Blue component of the color to move
    #[clap(value_parser, value_name = "BLUE")]
    pub blue: i64,

    /// GIF file to read the image from
    #[clap(value_parser, value_name = "INPUT")]
    pub input: PathBuf,

    /// GIF file to write the result to
    #[clap(value_parser, value_name = "OUTPUT")]
    pub output: PathBuf,
}

impl Cli {

    /// Components outside of 0..=255 are truncated to their low byte.
    pub fn into_options(self) -> SwapOptions {
        SwapOptions::new(self.input, self.output)
            .with_target_color(RGB::new(self.red as u8, self.green as u8, self.blue as u8))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SwapOptions {
    pub target_color: RGB,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

impl SwapOptions {

    pub fn new<I: Into<PathBuf>, O: Into<PathBuf>>(input_path: I, output_path: O) -> Self {
        SwapOptions {
            target_color: DEFAULT_TARGET_COLOR,
            input_path: input_path.into(),
            output_path: output_path.into(),
        }
    }

    pub fn with_target_color(&self, target_color: RGB) -> Self {
        Self {
            target_color,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ColorSwapError> {
        if self.input_path.as_os_str().is_empty() || self.output_path.as_os_str().is_empty() {
            return Err(ColorSwapError::UsageError {
                description: "input and output files have to be specified".to_string(),
            });
        }

        // compared by file identity, an existing output may name the input through links or ".."
        let aliased = self.input_path == self.output_path
            || same_file::is_same_file(&self.input_path, &self.output_path).unwrap_or(false);
        if aliased {
            return Err(ColorSwapError::UsageError {
                description: format!("output file {} is the same as the input file", self.output_path.display()),
            });
        }

        Ok(())
    }
}
