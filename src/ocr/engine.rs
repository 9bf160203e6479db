use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::preprocess::RgbaImage;
use super::setup::{find_tessdata_dir, find_tesseract_executable};
use crate::meter::config::MeterConfig;

/// Turns a conditioned image into text.
///
/// Implementations may only return glyphs from `allowlist`, or fail with a
/// human-readable message.
pub trait TextRecognizer {
    fn recognize(&self, img: &RgbaImage, allowlist: &str) -> Result<String>;
}

/// Tesseract invoked as an external process.
pub struct TesseractEngine {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
}

impl TesseractEngine {
    pub fn new(executable: PathBuf, tessdata: Option<PathBuf>) -> Self {
        Self { executable, tessdata }
    }

    /// Resolves the executable and language data from the configuration.
    pub fn locate(config: &MeterConfig) -> Result<Self> {
        let executable = find_tesseract_executable(config.tesseract_path.as_deref())?;
        let tessdata = find_tessdata_dir(config.tessdata_dir.as_deref())?;

        crate::log(&format!(
            "Using tesseract {} (tessdata: {})",
            executable.display(),
            tessdata
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "built-in default".to_string())
        ));

        Ok(Self::new(executable, tessdata))
    }

    fn command(&self, input: &std::path::Path, allowlist: &str) -> Command {
        let mut command = Command::new(&self.executable);
        command.arg(input).arg("stdout");
        if let Some(tessdata) = &self.tessdata {
            command.arg("--tessdata-dir").arg(tessdata);
        }
        command
            .arg("-l")
            .arg("eng")
            .arg("--psm")
            .arg("7") // Treat the composite as a single text line
            .arg("-c")
            .arg(format!("tessedit_char_whitelist={}", allowlist));
        command
    }
}

impl TextRecognizer for TesseractEngine {
    fn recognize(&self, img: &RgbaImage, allowlist: &str) -> Result<String> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())
            .context("Failed to encode OCR input as PNG")?;

        let output = self
            .command(temp_input.path(), allowlist)
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_arguments() {
        let engine = TesseractEngine::new(
            PathBuf::from("tesseract"),
            Some(PathBuf::from("/data/tessdata")),
        );
        let command = engine.command(std::path::Path::new("in.png"), "0123");
        let args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();

        assert_eq!(args[0], "in.png");
        assert_eq!(args[1], "stdout");
        assert!(args.windows(2).any(|w| w[0] == "--tessdata-dir" && w[1] == "/data/tessdata"));
        assert!(args.windows(2).any(|w| w[0] == "--psm" && w[1] == "7"));
        assert_eq!(args.last().unwrap(), "tessedit_char_whitelist=0123");
    }

    #[test]
    fn test_missing_executable_is_an_error() {
        let engine = TesseractEngine::new(PathBuf::from("/nonexistent/tesseract-bin"), None);
        let img: RgbaImage = image::ImageBuffer::new(4, 4);
        assert!(engine.recognize(&img, "0123456789").is_err());
    }
}
