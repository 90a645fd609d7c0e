//! Document assembly
//!
//! Composes the surviving captures of one job into a single multi-page PDF.
//! Each page is the capture at its original timestamp position: decoded,
//! normalized to three-channel RGB, proportionally downsampled when a side
//! exceeds the page ceiling, then embedded as a DCTDecode image object.
//! Page geometry in points derives from the pixel size and the configured
//! DPI, so the resolution setting is carried by the document itself.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::Path;
use tracing::{debug, warn};
use video_snapshot_common::{CaptureArtifact, ProcessingError, Result};

/// Document assembly settings
#[derive(Debug, Clone)]
pub struct DocumentConfig {
    /// Resolution the page geometry is derived from
    pub dpi: u32,
    /// Pages wider or taller than this are downsampled proportionally
    pub max_page_dimension: u32,
    /// Quality of the re-encoded page images
    pub jpeg_quality: u8,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_page_dimension: 3000,
            jpeg_quality: 95,
        }
    }
}

/// One capture prepared for embedding
struct PreparedPage {
    jpeg: Vec<u8>,
    width: u32,
    height: u32,
}

/// Decode, normalize, bound and re-encode a single capture
fn prepare_page(path: &Path, config: &DocumentConfig) -> Result<PreparedPage> {
    let decoded = image::open(path)?;

    let max = config.max_page_dimension;
    let decoded = if decoded.width() > max || decoded.height() > max {
        decoded.resize(max, max, FilterType::Lanczos3)
    } else {
        decoded
    };

    let rgb = decoded.to_rgb8();
    let mut jpeg = Vec::with_capacity(rgb.as_raw().len() / 8);
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, config.jpeg_quality);
    encoder.encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        image::ExtendedColorType::Rgb8,
    )?;

    Ok(PreparedPage {
        jpeg,
        width: rgb.width(),
        height: rgb.height(),
    })
}

/// Assemble the ordered surviving captures into a PDF at `output_path`.
///
/// Returns `Ok(false)` when there is nothing to write — an empty artifact
/// sequence, or every capture unreadable. A single unreadable capture is
/// skipped with a warning rather than aborting the document.
pub fn assemble(
    artifacts: &[CaptureArtifact],
    output_path: &Path,
    config: &DocumentConfig,
) -> Result<bool> {
    if artifacts.is_empty() {
        return Ok(false);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let scale = 72.0 / config.dpi as f32;

    let mut kids: Vec<Object> = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let page = match prepare_page(&artifact.path, config) {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    "Skipping unreadable capture {}: {e}",
                    artifact.path.display()
                );
                continue;
            }
        };

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => page.width as i64,
                "Height" => page.height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            page.jpeg,
        ));

        let width_pt = page.width as f32 * scale;
        let height_pt = page.height as f32 * scale;

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        width_pt.into(),
                        0.into(),
                        0.into(),
                        height_pt.into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| ProcessingError::DocumentAssembly(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "MediaBox" => vec![
                0.into(),
                0.into(),
                width_pt.into(),
                height_pt.into(),
            ],
        });
        kids.push(page_id.into());
    }

    if kids.is_empty() {
        warn!("No readable captures; document not written");
        return Ok(false);
    }

    let page_count = kids.len();
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count as i64,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(output_path)
        .map_err(|e| ProcessingError::DocumentAssembly(e.to_string()))?;

    debug!(
        "Wrote {page_count}-page document to {}",
        output_path.display()
    );

    Ok(true)
}
