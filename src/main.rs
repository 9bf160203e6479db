//! Watermeter Reader
//!
//! Reads a utility meter from a single photograph: OCR over the digit wheels,
//! optional analog gauges for the fractional part, and a plausibility check
//! against the last accepted value before the new value is stored.

mod cache;
mod capture;
mod debug;
mod gauge;
mod meter;
mod ocr;
mod paths;
mod response;

use anyhow::{anyhow, Result};
use chrono::Local;
use std::any::Any;
use std::fs::OpenOptions;
use std::io::Write;
use std::panic::Location;
use std::path::{Path, PathBuf};

use cache::{LastValue, ValueCache};
use gauge::NeedleDecoder;
use meter::{MeterConfig, MeterReader, Reading};
use ocr::{RgbaImage, TesseractEngine};
use response::FinalResult;

/// Logs a message to stderr and the log file with timestamp.
///
/// Stdout is reserved for the reading itself.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    eprint!("{}", line);
    let log_path = paths::get_logs_dir().join("watermeter.log");
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

/// Command line options.
#[derive(Debug, Default, PartialEq)]
struct Options {
    config_path: Option<PathBuf>,
    json: bool,
    debug: bool,
    setup_tessdata: bool,
}

const USAGE: &str = "Usage: watermeter-reader [--config <path>] [--json] [--debug] [--setup-tessdata]";

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Options> {
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a path\n{}", USAGE))?;
                options.config_path = Some(PathBuf::from(path));
            }
            "--json" => options.json = true,
            "--debug" => options.debug = true,
            "--setup-tessdata" => options.setup_tessdata = true,
            other => return Err(anyhow!("Unknown argument: {}\n{}", other, USAGE)),
        }
    }

    Ok(options)
}

/// Formats a panic payload for the log.
fn describe_panic(payload: &(dyn Any + Send), location: Option<&Location<'_>>) -> String {
    let msg = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    };
    let location = if let Some(loc) = location {
        format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
    } else {
        String::new()
    };
    format!("[PANIC]{} {}", location, msg)
}

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        log(&describe_panic(panic_info.payload(), panic_info.location()));
    }));

    let options = parse_args(std::env::args().skip(1))?;

    // Ensure output directories exist
    paths::ensure_directories()?;

    if options.setup_tessdata {
        let path = ocr::setup::ensure_tessdata(&ocr::setup::local_tessdata_dir())?;
        println!("{}", path.display());
        return Ok(());
    }

    // A broken config is reported as is: there is no value to fall back to yet
    let config_path = options
        .config_path
        .clone()
        .unwrap_or_else(paths::get_config_path);
    let config = MeterConfig::load(&config_path)?;

    let cache = ValueCache::new(paths::get_cache_path());
    let last = cache.read_last_value()?;
    log(&format!(
        "Last value: {} ({:?}) from {}",
        last.value,
        last.updated_at,
        cache.path().display()
    ));

    let result = match run(&config, &cache, &last, &options) {
        Ok(result) => result,
        Err(e) => {
            log(&format!("Reading failed: {:#}", e));
            FinalResult::from_exception(&e, &last)
        }
    };

    log(&format!("Status: {:?}, value: {}", result.status, result.value));

    if options.json {
        println!("{}", result.to_json()?);
    } else {
        println!("{}", result.value);
    }

    Ok(())
}

/// One full reading: acquire, read, validate, persist.
fn run(
    config: &MeterConfig,
    cache: &ValueCache,
    last: &LastValue,
    options: &Options,
) -> Result<FinalResult> {
    let source = capture::load_source_image(&config.source_image, config.source_image_rotate)?;

    let snapshot = paths::get_debug_dir().join("watermeter.jpg");
    if let Err(e) = capture::save_source_image(&source, &snapshot) {
        log(&format!("Warning: {:#}", e));
    }

    let engine = TesseractEngine::locate(config)?;
    let decoder = NeedleDecoder::default();

    let reading = MeterReader::new(config, &engine, &decoder)
        .with_debug(options.debug)
        .compute_reading(&source, last.value)?;

    let debug_dir = options.debug.then(paths::get_debug_dir);
    conclude(&reading, &source, config, cache, last, debug_dir.as_deref())
}

/// Writes debug artifacts, stores a trusted reading and builds the envelope.
///
/// Debug output is best effort: a failed write is logged and the reading
/// goes on.
fn conclude(
    reading: &Reading,
    source: &RgbaImage,
    config: &MeterConfig,
    cache: &ValueCache,
    last: &LastValue,
    debug_dir: Option<&Path>,
) -> Result<FinalResult> {
    if let Some(dir) = debug_dir {
        if let Err(e) = debug::write_debug_images(dir, source, config, &reading.debug_images) {
            log(&format!("Warning: {:#}", e));
        }
    }

    if reading.is_trusted() {
        cache.write_last_value(reading.readout)?;
    } else {
        log("Reading not trusted, cached value left unchanged");
    }

    Ok(FinalResult::from_reading(reading, last, Local::now()))
}
