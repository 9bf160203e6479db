use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::log;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";
const ENG_TRAINEDDATA: &str = "eng.traineddata";

/// Well-known install locations checked when tesseract is not on PATH.
const COMMON_EXECUTABLE_PATHS: [&str; 5] = [
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];

/// Returns the per-user tessdata directory managed by this tool.
pub fn local_tessdata_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("watermeter-reader")
        .join("tessdata")
}

/// Finds the Tesseract executable: configured path, then PATH, then common locations.
pub fn find_tesseract_executable(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = configured {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
        return Err(anyhow!("Configured tesseract not found: {}", p.display()));
    }

    // Check PATH
    if let Ok(output) = std::process::Command::new("tesseract")
        .arg("--version")
        .output()
    {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    for path in &COMMON_EXECUTABLE_PATHS {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Finds the tessdata directory to pass to tesseract.
///
/// A configured directory is populated on demand. Otherwise the local data
/// directory and `TESSDATA_PREFIX` are checked; `None` means tesseract's
/// compiled-in default is used.
pub fn find_tessdata_dir(configured: Option<&str>) -> Result<Option<PathBuf>> {
    if let Some(dir) = configured {
        let dir = PathBuf::from(dir);
        ensure_tessdata(&dir)?;
        return Ok(Some(dir));
    }

    let local = local_tessdata_dir();
    if local.join(ENG_TRAINEDDATA).exists() {
        return Ok(Some(local));
    }

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let p = PathBuf::from(&prefix);
        if p.join(ENG_TRAINEDDATA).exists() {
            return Ok(Some(p));
        }
        let p = p.join("tessdata");
        if p.join(ENG_TRAINEDDATA).exists() {
            return Ok(Some(p));
        }
    }

    Ok(None)
}

/// Ensures `eng.traineddata` exists in `tessdata_dir`, downloading it if necessary.
pub fn ensure_tessdata(tessdata_dir: &Path) -> Result<PathBuf> {
    let eng_path = tessdata_dir.join(ENG_TRAINEDDATA);
    if eng_path.exists() {
        log(&format!("Tessdata found at: {}", tessdata_dir.display()));
        return Ok(eng_path);
    }

    fs::create_dir_all(tessdata_dir)
        .with_context(|| format!("Failed to create {}", tessdata_dir.display()))?;
    download_tessdata(&eng_path)?;
    Ok(eng_path)
}

/// Downloads English trained data
fn download_tessdata(eng_path: &Path) -> Result<()> {
    let eng_url = format!("{}/{}", TESSDATA_REPO, ENG_TRAINEDDATA);

    log(&format!("Downloading {}...", eng_url));

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&eng_url)
        .header("User-Agent", "watermeter-reader")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}: HTTP {}",
            ENG_TRAINEDDATA,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(eng_path)?;
    file.write_all(&bytes)?;

    log(&format!(
        "Downloaded {} ({} bytes)",
        ENG_TRAINEDDATA,
        bytes.len()
    ));

    Ok(())
}
