use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::{imageops, GrayImage, ImageFormat};
use tracing::{debug, info};

use crate::error::FetchError;

/// 3x3 sharpen kernel; `filter3x3` divides by the kernel sum (16).
const SHARPEN: [f32; 9] = [-2.0, -2.0, -2.0, -2.0, 32.0, -2.0, -2.0, -2.0, -2.0];

/// Turns the image behind a URL into text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<String, FetchError>;
}

/// Reads text out of an already preprocessed image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &GrayImage, language: &str) -> Result<String, FetchError>;
}

/// Runs the Tesseract CLI against a temporary PNG.
pub struct Tesseract {
    cmd: PathBuf,
}

impl Tesseract {
    pub fn new(cmd: impl AsRef<Path>) -> Self {
        Self {
            cmd: cmd.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl OcrEngine for Tesseract {
    async fn recognize(&self, image: &GrayImage, language: &str) -> Result<String, FetchError> {
        let file = tempfile::Builder::new()
            .prefix("ocr-")
            .suffix(".png")
            .tempfile()?;
        image.save_with_format(file.path(), ImageFormat::Png)?;

        let output = tokio::process::Command::new(&self.cmd)
            .arg(file.path())
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .output()
            .await?;

        if !output.status.success() {
            return Err(FetchError::Ocr(format!(
                "{} exited with {}: {}",
                self.cmd.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Download → greyscale → sharpen → OCR.
pub struct ImageTextExtractor<E> {
    http: reqwest::Client,
    engine: E,
    language: String,
}

impl<E: OcrEngine> ImageTextExtractor<E> {
    pub fn new(engine: E, language: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            engine,
            language: language.into(),
        }
    }
}

#[async_trait]
impl<E: OcrEngine> TextExtractor for ImageTextExtractor<E> {
    async fn extract(&self, url: &str) -> Result<String, FetchError> {
        info!("Downloading image from {}", url);
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let bytes = resp.bytes().await?;

        let image = preprocess(&bytes)?;
        debug!("Decoded {}x{} image from {}", image.width(), image.height(), url);

        let text = self.engine.recognize(&image, &self.language).await?;
        let text = text.trim().to_string();
        info!("Extracted {} chars of text from {}", text.len(), url);
        Ok(text)
    }
}

/// Decode any supported format, drop to 8-bit luma and sharpen for contrast.
pub fn preprocess(bytes: &[u8]) -> Result<GrayImage, FetchError> {
    let gray = image::load_from_memory(bytes)?.to_luma8();
    Ok(imageops::filter3x3(&gray, &SHARPEN))
}
