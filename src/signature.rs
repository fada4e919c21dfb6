use crate::canvas::Canvas;
use crate::types::{Pt, Rect};
use base64::Engine;
use certrender_report::ImageOutcome;
use image::GenericImageView;
use lopdf::{Document as LoDocument, ObjectId, Stream, dictionary};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    Fetch(String),
    UnsupportedSource(String),
    Decode(String),
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureError::Fetch(message) => write!(f, "fetch failed: {}", message),
            SignatureError::UnsupportedSource(source) => {
                write!(f, "unsupported image source: {}", source)
            }
            SignatureError::Decode(message) => write!(f, "decode failed: {}", message),
        }
    }
}

impl std::error::Error for SignatureError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Resolves an image reference into raw bytes. Implementations must not panic;
/// any failure is reported and the slot is left blank.
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, source: &str) -> Result<FetchedImage, SignatureError>;
}

/// Fetches `http(s)://` over a blocking agent and also accepts `data:` and
/// `file://` sources.
pub struct HttpImageFetcher {
    agent: ureq::Agent,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: config.into(),
        }
    }
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

impl ImageFetcher for HttpImageFetcher {
    fn fetch(&self, source: &str) -> Result<FetchedImage, SignatureError> {
        let source = source.trim();
        if source.starts_with("data:") {
            let (mime, bytes) = parse_data_uri(source)
                .ok_or_else(|| SignatureError::Decode("malformed data uri".to_string()))?;
            return Ok(FetchedImage {
                bytes,
                content_type: Some(mime),
            });
        }
        if let Some(path) = source.strip_prefix("file://") {
            let bytes =
                std::fs::read(path).map_err(|err| SignatureError::Fetch(err.to_string()))?;
            return Ok(FetchedImage {
                bytes,
                content_type: None,
            });
        }
        if !(source.starts_with("http://") || source.starts_with("https://")) {
            return Err(SignatureError::UnsupportedSource(source.to_string()));
        }
        let mut response = self
            .agent
            .get(source)
            .call()
            .map_err(|err| SignatureError::Fetch(err.to_string()))?;
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_ascii_lowercase());
        let bytes = response
            .body_mut()
            .read_to_vec()
            .map_err(|err| SignatureError::Fetch(err.to_string()))?;
        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}

fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let (header, payload) = uri.strip_prefix("data:")?.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|v| !v.is_empty())
        .unwrap_or("application/octet-stream")
        .to_ascii_lowercase();
    let data = if header.contains(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim().as_bytes())
            .ok()?
    } else {
        payload.as_bytes().to_vec()
    };
    Some((mime, data))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageEncoding {
    Dct,
    Raw,
}

/// Decoded raster ready to become an Image XObject.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    color_space: &'static str,
    encoding: ImageEncoding,
    data: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

impl ImageData {
    pub fn has_alpha(&self) -> bool {
        self.alpha.is_some()
    }

    pub(crate) fn add_to(&self, doc: &mut LoDocument) -> ObjectId {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => self.width as i64,
            "Height" => self.height as i64,
            "ColorSpace" => self.color_space,
            "BitsPerComponent" => 8,
        };
        if let Some(alpha) = &self.alpha {
            let mut smask = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => self.width as i64,
                    "Height" => self.height as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                alpha.clone(),
            );
            let _ = smask.compress();
            let smask_id = doc.add_object(smask);
            dict.set("SMask", smask_id);
        }
        let stream = match self.encoding {
            ImageEncoding::Dct => {
                dict.set("Filter", "DCTDecode");
                Stream::new(dict, self.data.clone()).with_compression(false)
            }
            ImageEncoding::Raw => {
                let mut stream = Stream::new(dict, self.data.clone());
                let _ = stream.compress();
                stream
            }
        };
        doc.add_object(stream)
    }
}

/// JPEG passes through untouched; everything else is re-encoded to RGB with
/// an optional soft mask.
pub fn decode_image_bytes(data: &[u8], mime: Option<&str>) -> Result<ImageData, SignatureError> {
    let format = match mime {
        Some(mime) if mime.contains("png") => Some(image::ImageFormat::Png),
        Some(mime) if mime.contains("jpeg") || mime.contains("jpg") => {
            Some(image::ImageFormat::Jpeg)
        }
        _ => image::guess_format(data).ok(),
    };
    let format = match format {
        Some(fmt @ (image::ImageFormat::Png | image::ImageFormat::Jpeg)) => fmt,
        Some(other) => {
            return Err(SignatureError::Decode(format!(
                "unsupported image format {:?}",
                other
            )));
        }
        None => return Err(SignatureError::Decode("unrecognized image data".to_string())),
    };
    let decoded = image::load_from_memory_with_format(data, format)
        .map_err(|err| SignatureError::Decode(err.to_string()))?;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(SignatureError::Decode("image has no pixels".to_string()));
    }

    // CMYK JPEGs are re-encoded: viewers disagree on Adobe's inverted
    // DCT CMYK, while the decoder already yields RGB.
    if format == image::ImageFormat::Jpeg && jpeg_components(data) != Some(4) {
        let color_space = match decoded.color() {
            image::ColorType::L8 | image::ColorType::La8 => "DeviceGray",
            _ => "DeviceRGB",
        };
        return Ok(ImageData {
            width,
            height,
            color_space,
            encoding: ImageEncoding::Dct,
            data: data.to_vec(),
            alpha: None,
        });
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    let mut has_alpha = false;
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        if a != 255 {
            has_alpha = true;
        }
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }
    Ok(ImageData {
        width,
        height,
        color_space: "DeviceRGB",
        encoding: ImageEncoding::Raw,
        data: rgb,
        alpha: has_alpha.then_some(alpha),
    })
}

/// Component count from the first start-of-frame segment.
fn jpeg_components(data: &[u8]) -> Option<u8> {
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            return data.get(pos + 9).copied();
        }
        if marker == 0xDA || len < 2 {
            return None;
        }
        pos += 2 + len;
    }
    None
}

/// Largest rect with the image's aspect ratio that fits `target`, centered.
pub fn fit_rect(target: Rect, width: u32, height: u32) -> Rect {
    if width == 0 || height == 0 || target.is_empty() {
        return Rect {
            width: Pt::ZERO,
            height: Pt::ZERO,
            ..target
        };
    }
    let box_w = target.width.to_f32();
    let box_h = target.height.to_f32();
    let scale = (box_w / width as f32).min(box_h / height as f32);
    let w = width as f32 * scale;
    let h = height as f32 * scale;
    Rect::new(
        target.x.to_f32() + (box_w - w) / 2.0,
        target.y.to_f32() + (box_h - h) / 2.0,
        w,
        h,
    )
}

/// Images registered for one render, keyed by their content-stream resource name.
#[derive(Debug, Default)]
pub struct ImageRegistry {
    images: BTreeMap<String, ImageData>,
}

impl ImageRegistry {
    pub fn register(&mut self, image: ImageData) -> String {
        let name = format!("CrImg{}", self.images.len() + 1);
        self.images.insert(name.clone(), image);
        name
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn into_map(self) -> BTreeMap<String, ImageData> {
        self.images
    }
}

pub struct Placement {
    pub outcome: ImageOutcome,
    pub detail: Option<String>,
}

impl Placement {
    fn failed(outcome: ImageOutcome, err: SignatureError) -> Self {
        Self {
            outcome,
            detail: Some(err.to_string()),
        }
    }
}

/// Places already-fetched bytes into `target` on the canvas's current page.
pub fn place_image_bytes(
    canvas: &mut Canvas,
    registry: &mut ImageRegistry,
    target: Rect,
    bytes: &[u8],
    mime: Option<&str>,
) -> Placement {
    match decode_image_bytes(bytes, mime) {
        Ok(image) => {
            let fitted = fit_rect(target, image.width, image.height);
            let name = registry.register(image);
            canvas.draw_image(fitted.x, fitted.y, fitted.width, fitted.height, name);
            Placement {
                outcome: ImageOutcome::Embedded,
                detail: None,
            }
        }
        Err(err) => Placement::failed(ImageOutcome::DecodeFailed, err),
    }
}

/// Fetches `source` and places it. Blank sources are `Absent`; every failure
/// leaves the area untouched.
pub fn embed_signature(
    canvas: &mut Canvas,
    registry: &mut ImageRegistry,
    fetcher: &dyn ImageFetcher,
    target: Rect,
    source: &str,
) -> Placement {
    if source.trim().is_empty() {
        return Placement {
            outcome: ImageOutcome::Absent,
            detail: None,
        };
    }
    match fetcher.fetch(source) {
        Ok(fetched) => place_image_bytes(
            canvas,
            registry,
            target,
            &fetched.bytes,
            fetched.content_type.as_deref(),
        ),
        Err(err) => Placement::failed(ImageOutcome::FetchFailed, err),
    }
}
