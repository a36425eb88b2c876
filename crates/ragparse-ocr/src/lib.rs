//! OCR engine for ragparse, built on ONNX Runtime with `PaddleOCR` models.
//!
//! Two-stage pipeline:
//! 1. **Detection** — locate text regions in the page image
//! 2. **Recognition** — decode the text inside each region (CTC)
//!
//! The engine is an *optional heavy capability*: linking this crate never
//! touches the model files. Models are loaded when [`OcrEngine::new`] runs,
//! and a missing installation surfaces as [`OcrError::ModelsMissing`] whose
//! message doubles as the install hint shown to operators.
//!
//! Model assets (`det_model.onnx`, `rec_model.onnx`, `charset.txt`) are
//! discovered via the `RAGPARSE_OCR_ASSETS` environment variable or the
//! crate's own `assets/` directory.

use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use imageproc::contours::find_contours;
use imageproc::morphology::dilate;
use ndarray::{Array3, Array4, ArrayView2, Axis};
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Detection output maps score pixels in [0, 1]; this is the binarization
/// threshold used to build the text mask.
const DET_MASK_THRESHOLD: f32 = 0.3;

/// Minimum mean score inside a candidate region for it to be kept.
const DET_REGION_THRESHOLD: f32 = 0.5;

/// Regions whose shorter side (in mask pixels) is below this are noise.
const DET_MIN_SIDE: f32 = 3.0;

/// Pixels of padding added around each detected region before cropping,
/// compensating for the tight contour fit of the binary mask.
const DET_REGION_PADDING: f32 = 4.0;

/// Recognition input height; width is dynamic per batch (PP-OCR convention).
const REC_INPUT_HEIGHT: usize = 48;

/// Number of regions recognized per inference batch.
const REC_BATCH: usize = 6;

/// Vertical tolerance (mask pixels) within which two regions count as the
/// same text row when sorting into reading order.
const ROW_TOLERANCE: f32 = 10.0;

/// Column-gap threshold for inserting a space during CTC decoding. Gaps
/// between characters inside a word run 5-7 columns; word boundaries 9+.
const WORD_GAP_COLUMNS: usize = 8;

/// ImageNet-style normalization used by the detection model.
const DET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const DET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// OCR-specific errors.
#[derive(thiserror::Error, Debug)]
pub enum OcrError {
    /// Model assets could not be located. The message is the install hint
    /// surfaced to operators.
    #[error(
        "OCR models not found (searched: {searched}). \
         Download the PaddleOCR ONNX models (det_model.onnx, rec_model.onnx, charset.txt) \
         and point RAGPARSE_OCR_ASSETS at their directory"
    )]
    ModelsMissing {
        /// Locations that were checked, for the error message.
        searched: String,
    },

    /// A model file exists but failed to load into an ONNX session.
    #[error("Failed to load OCR model: {0}")]
    ModelLoad(String),

    /// Inference (forward pass) failed.
    #[error("OCR inference failed: {0}")]
    Inference(String),

    /// Image preprocessing (resize/normalize) failed.
    #[error("OCR preprocessing failed: {0}")]
    Preprocess(String),
}

/// Axis-aligned text region detected in an image, in source-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
    /// Detection confidence in [0, 1].
    pub score: f32,
}

impl Region {
    /// Create a region.
    #[inline]
    #[must_use = "region is created but not used"]
    pub const fn new(x: f32, y: f32, width: f32, height: f32, score: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score,
        }
    }
}

/// One recognized line of text with its source region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    /// Recognized text.
    pub text: String,
    /// Where in the image it was found.
    pub region: Region,
    /// Recognition confidence in [0, 1].
    pub confidence: f32,
}

/// Result of running OCR over one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrOutput {
    /// Recognized lines in reading order. Repeated identical lines stay
    /// as separate entries; nothing here filters or merges.
    pub lines: Vec<TextLine>,
    /// Source image dimensions (width, height).
    pub image_size: (u32, u32),
}

impl OcrOutput {
    /// All recognized text joined with newlines.
    #[inline]
    #[must_use = "concatenated text is returned but not used"]
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// True when no text was detected.
    #[inline]
    #[must_use = "emptiness check result is returned but not used"]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// OCR engine holding the loaded detection/recognition sessions.
///
/// Safe to reuse across calls; no mutable state survives a call beyond the
/// sessions themselves. Loading the models is the expensive step, so hold
/// on to the engine when processing many pages.
pub struct OcrEngine {
    det: Session,
    rec: Session,
    charset: Vec<String>,
}

impl OcrEngine {
    /// Load the engine from the default assets directory.
    ///
    /// # Errors
    ///
    /// [`OcrError::ModelsMissing`] when the assets directory or any model
    /// file cannot be found; [`OcrError::ModelLoad`] when a file exists but
    /// is not a loadable model.
    pub fn new() -> Result<Self, OcrError> {
        let assets = find_assets_dir()?;
        Self::with_models(
            &assets.join("det_model.onnx"),
            &assets.join("rec_model.onnx"),
            &assets.join("charset.txt"),
        )
    }

    /// Load the engine from explicit model paths.
    ///
    /// # Errors
    ///
    /// Same conditions as [`OcrEngine::new`].
    pub fn with_models(
        detection_model: &Path,
        recognition_model: &Path,
        charset_file: &Path,
    ) -> Result<Self, OcrError> {
        for required in [detection_model, recognition_model, charset_file] {
            if !required.exists() {
                return Err(OcrError::ModelsMissing {
                    searched: required.display().to_string(),
                });
            }
        }

        let det = load_session(detection_model)?;
        let rec = load_session(recognition_model)?;
        let charset = load_charset(charset_file)?;

        log::debug!(
            "OCR engine loaded: {} charset entries",
            charset.len()
        );

        Ok(Self { det, rec, charset })
    }

    /// Run the full OCR pipeline (detection + recognition) on an image.
    ///
    /// # Errors
    ///
    /// Returns an error when preprocessing or inference fails.
    pub fn recognize(&mut self, image: &DynamicImage) -> Result<OcrOutput, OcrError> {
        let regions = self.detect(image)?;
        if regions.is_empty() {
            return Ok(OcrOutput {
                lines: Vec::new(),
                image_size: image.dimensions(),
            });
        }
        let lines = self.recognize_regions(image, &regions)?;
        Ok(OcrOutput {
            lines,
            image_size: image.dimensions(),
        })
    }

    /// Detection stage: find text regions, sorted into reading order.
    ///
    /// # Errors
    ///
    /// Returns an error when preprocessing or inference fails.
    #[allow(clippy::cast_precision_loss)] // image dims are small integers
    pub fn detect(&mut self, image: &DynamicImage) -> Result<Vec<Region>, OcrError> {
        let source_size = image.dimensions();
        let input = preprocess_detection(image)?;

        let tensor: TensorRef<f32> = TensorRef::from_array_view(&input)
            .map_err(|e| OcrError::Inference(e.to_string()))?;
        let score_map = {
            let outputs = self
                .det
                .run(inputs![tensor])
                .map_err(|e| OcrError::Inference(format!("detection: {e}")))?;
            let out = outputs[0]
                .try_extract_array::<f32>()
                .map_err(|e| OcrError::Inference(e.to_string()))?;
            // [1, 1, H, W] score map
            out.into_owned()
                .into_dimensionality::<ndarray::Ix4>()
                .map_err(|e| OcrError::Inference(e.to_string()))?
        };

        let map_2d = score_map
            .index_axis(Axis(0), 0)
            .index_axis_move(Axis(0), 0);
        Ok(regions_from_score_map(&map_2d.view(), source_size))
    }

    /// Recognition stage: decode text inside each region.
    ///
    /// Regions are batched by similar aspect ratio for efficiency, but the
    /// returned lines follow the input region order exactly.
    ///
    /// # Errors
    ///
    /// Returns an error when inference fails.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_sign_loss,
        clippy::cast_possible_truncation
    )] // region coords are small non-negative pixel values
    pub fn recognize_regions(
        &mut self,
        image: &DynamicImage,
        regions: &[Region],
    ) -> Result<Vec<TextLine>, OcrError> {
        if regions.is_empty() {
            return Ok(Vec::new());
        }

        let crops: Vec<DynamicImage> = regions
            .iter()
            .map(|r| {
                image.crop_imm(
                    r.x.max(0.0) as u32,
                    r.y.max(0.0) as u32,
                    r.width.max(1.0) as u32,
                    r.height.max(1.0) as u32,
                )
            })
            .collect();

        let aspect: Vec<f32> = crops
            .iter()
            .map(|c| {
                let (w, h) = c.dimensions();
                w as f32 / h as f32
            })
            .collect();

        // Process wide and narrow crops together so batch padding stays small.
        let mut order: Vec<usize> = (0..crops.len()).collect();
        order.sort_by(|&a, &b| aspect[a].total_cmp(&aspect[b]));

        let mut decoded = vec![(String::new(), 0.0f32); crops.len()];
        for chunk in order.chunks(REC_BATCH) {
            let max_ratio = chunk
                .iter()
                .map(|&i| aspect[i])
                .fold(1.0f32, f32::max);
            let batch_width = (REC_INPUT_HEIGHT as f32 * max_ratio) as usize;

            let mut batch =
                Array4::<f32>::zeros((chunk.len(), 3, REC_INPUT_HEIGHT, batch_width));
            for (slot, &i) in chunk.iter().enumerate() {
                let norm = preprocess_recognition(&crops[i], batch_width);
                batch.slice_mut(ndarray::s![slot, .., .., ..]).assign(&norm);
            }

            let tensor: TensorRef<f32> = TensorRef::from_array_view(&batch)
                .map_err(|e| OcrError::Inference(e.to_string()))?;
            let preds = {
                let outputs = self
                    .rec
                    .run(inputs![tensor])
                    .map_err(|e| OcrError::Inference(format!("recognition: {e}")))?;
                let out = outputs[0]
                    .try_extract_array::<f32>()
                    .map_err(|e| OcrError::Inference(e.to_string()))?;
                // [batch, time_steps, charset]
                out.into_owned()
                    .into_dimensionality::<ndarray::Ix3>()
                    .map_err(|e| OcrError::Inference(e.to_string()))?
            };

            for (slot, &i) in chunk.iter().enumerate() {
                let pred = preds.index_axis(Axis(0), slot);
                decoded[i] = ctc_decode(&pred, &self.charset);
            }
        }

        Ok(decoded
            .into_iter()
            .zip(regions.iter())
            .map(|((text, confidence), region)| TextLine {
                text,
                region: *region,
                confidence,
            })
            .collect())
    }
}

impl std::fmt::Debug for OcrEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrEngine")
            .field("charset_len", &self.charset.len())
            .finish_non_exhaustive()
    }
}

fn load_session(path: &Path) -> Result<Session, OcrError> {
    Session::builder()
        .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level1))
        .and_then(|b| b.with_intra_threads(4))
        .and_then(|b| b.commit_from_file(path))
        .map_err(|e| OcrError::ModelLoad(format!("{}: {e}", path.display())))
}

/// Locate the model assets directory.
///
/// Checked in order: `RAGPARSE_OCR_ASSETS`, `$CARGO_MANIFEST_DIR/assets`,
/// the workspace-relative `crates/ragparse-ocr/assets`.
fn find_assets_dir() -> Result<PathBuf, OcrError> {
    let mut searched = Vec::new();

    if let Ok(dir) = std::env::var("RAGPARSE_OCR_ASSETS") {
        let path = PathBuf::from(&dir);
        if path.is_dir() {
            return Ok(path);
        }
        searched.push(dir);
    } else {
        searched.push("RAGPARSE_OCR_ASSETS (unset)".to_string());
    }

    if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
        for candidate in [
            Path::new(&manifest_dir).join("assets"),
            Path::new(&manifest_dir).join("../ragparse-ocr/assets"),
        ] {
            if candidate.is_dir() {
                return Ok(candidate);
            }
            searched.push(candidate.display().to_string());
        }
    }

    let relative = Path::new("crates/ragparse-ocr/assets");
    if relative.is_dir() {
        return Ok(relative.to_path_buf());
    }
    searched.push(relative.display().to_string());

    Err(OcrError::ModelsMissing {
        searched: searched.join(", "),
    })
}

/// Load the CTC character dictionary.
///
/// Index 0 is the CTC blank token and the final entry is a literal space,
/// bracketing the characters read one-per-line from the file.
fn load_charset(path: &Path) -> Result<Vec<String>, OcrError> {
    use std::io::{BufRead, BufReader};

    let file = std::fs::File::open(path)
        .map_err(|e| OcrError::ModelLoad(format!("charset {}: {e}", path.display())))?;

    let mut charset = vec!["blank".to_string()];
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| OcrError::ModelLoad(e.to_string()))?;
        let entry = line.trim_end_matches(['\r', '\n']).to_string();
        if !entry.is_empty() {
            charset.push(entry);
        }
    }
    charset.push(" ".to_string());
    Ok(charset)
}

/// Resize to a multiple of 32 and normalize for the detection model.
///
/// Output shape: `[1, 3, H, W]`.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)] // dims and ratios are non-negative
fn preprocess_detection(image: &DynamicImage) -> Result<Array4<f32>, OcrError> {
    let (width, height) = image.dimensions();
    let longest = width.max(height) as f32;

    // Cap the longest side, stepping up for large pages the way PP-OCR does.
    let limit = if longest < 960.0 {
        960.0
    } else if longest < 1500.0 {
        1500.0
    } else {
        2000.0
    };
    let ratio = if longest > limit { limit / longest } else { 1.0 };

    let resize_w = (((width as f32 * ratio) / 32.0).round() as u32).max(1) * 32;
    let resize_h = (((height as f32 * ratio) / 32.0).round() as u32).max(1) * 32;

    let rgb = image
        .resize_exact(resize_w, resize_h, image::imageops::FilterType::CatmullRom)
        .to_rgb8();

    let mut array = Array3::<f32>::zeros((3, resize_h as usize, resize_w as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            array[[c, y as usize, x as usize]] =
                (f32::from(pixel[c]) / 255.0 - DET_MEAN[c]) / DET_STD[c];
        }
    }
    Ok(array.insert_axis(Axis(0)))
}

/// Resize a cropped region to the fixed recognition height, normalize to
/// [-1, 1], and right-pad to the batch width.
///
/// Output shape: `[3, 48, batch_width]`.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn preprocess_recognition(crop: &DynamicImage, batch_width: usize) -> Array3<f32> {
    let (w, h) = crop.dimensions();
    let ratio = w as f32 / h as f32;
    let target_w = ((REC_INPUT_HEIGHT as f32 * ratio).ceil() as usize)
        .clamp(1, batch_width);

    let rgb = crop
        .resize_exact(
            target_w as u32,
            REC_INPUT_HEIGHT as u32,
            image::imageops::FilterType::CatmullRom,
        )
        .to_rgb8();

    let mut array = Array3::<f32>::zeros((3, REC_INPUT_HEIGHT, batch_width));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            array[[c, y as usize, x as usize]] = (f32::from(pixel[c]) / 255.0 - 0.5) / 0.5;
        }
    }
    array
}

/// Turn the detection score map into regions in source-image coordinates.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn regions_from_score_map(score_map: &ArrayView2<'_, f32>, source: (u32, u32)) -> Vec<Region> {
    let (map_h, map_w) = (score_map.shape()[0], score_map.shape()[1]);
    let (src_w, src_h) = (source.0 as f32, source.1 as f32);

    let mut mask = GrayImage::new(map_w as u32, map_h as u32);
    for y in 0..map_h {
        for x in 0..map_w {
            let on = score_map[[y, x]] > DET_MASK_THRESHOLD;
            mask.put_pixel(x as u32, y as u32, Luma([if on { 255 } else { 0 }]));
        }
    }
    let mask = dilate(&mask, imageproc::distance_transform::Norm::L1, 1);

    let mut regions = Vec::new();
    for contour in find_contours::<u32>(&mask) {
        if contour.points.is_empty() {
            continue;
        }

        let min_x = contour.points.iter().map(|p| p.x).min().unwrap_or(0) as f32;
        let max_x = contour.points.iter().map(|p| p.x).max().unwrap_or(0) as f32;
        let min_y = contour.points.iter().map(|p| p.y).min().unwrap_or(0) as f32;
        let max_y = contour.points.iter().map(|p| p.y).max().unwrap_or(0) as f32;
        if (max_x - min_x).min(max_y - min_y) < DET_MIN_SIDE {
            continue;
        }

        let score = mean_score(score_map, min_x, max_x, min_y, max_y);
        if score < DET_REGION_THRESHOLD {
            continue;
        }

        // Pad, scale back to source pixels and clamp.
        let scale_x = src_w / map_w as f32;
        let scale_y = src_h / map_h as f32;
        let x0 = ((min_x - DET_REGION_PADDING) * scale_x).clamp(0.0, src_w - 1.0);
        let x1 = ((max_x + DET_REGION_PADDING) * scale_x).clamp(0.0, src_w - 1.0);
        let y0 = ((min_y - DET_REGION_PADDING) * scale_y).clamp(0.0, src_h - 1.0);
        let y1 = ((max_y + DET_REGION_PADDING) * scale_y).clamp(0.0, src_h - 1.0);
        if x1 - x0 <= DET_MIN_SIDE || y1 - y0 <= DET_MIN_SIDE {
            continue;
        }

        regions.push(Region::new(x0, y0, x1 - x0, y1 - y0, score));
    }

    sort_reading_order(regions)
}

#[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_truncation)]
fn mean_score(map: &ArrayView2<'_, f32>, min_x: f32, max_x: f32, min_y: f32, max_y: f32) -> f32 {
    let (h, w) = (map.shape()[0], map.shape()[1]);
    let x0 = (min_x.floor().max(0.0) as usize).min(w - 1);
    let x1 = (max_x.ceil().max(0.0) as usize).min(w - 1);
    let y0 = (min_y.floor().max(0.0) as usize).min(h - 1);
    let y1 = (max_y.ceil().max(0.0) as usize).min(h - 1);

    let mut sum = 0.0f32;
    let mut count = 0u32;
    for y in y0..=y1 {
        for x in x0..=x1 {
            sum += map[[y, x]];
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

/// Sort regions top-to-bottom, then left-to-right within a row.
///
/// Regions whose vertical offset is within [`ROW_TOLERANCE`] belong to the
/// same text row and are ordered by their left edge.
fn sort_reading_order(mut regions: Vec<Region>) -> Vec<Region> {
    regions.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));

    // Local swaps fix left/right order inside a row after the global sort.
    let n = regions.len();
    for i in 1..n {
        let mut j = i;
        while j > 0
            && (regions[j].y - regions[j - 1].y).abs() < ROW_TOLERANCE
            && regions[j].x < regions[j - 1].x
        {
            regions.swap(j, j - 1);
            j -= 1;
        }
    }
    regions
}

/// Greedy CTC decoding with column-gap word segmentation.
///
/// Collapses repeated predictions, drops the blank token (index 0), and
/// inserts a space wherever the column gap between surviving characters
/// exceeds [`WORD_GAP_COLUMNS`].
#[allow(clippy::cast_precision_loss)]
fn ctc_decode(preds: &ArrayView2<'_, f32>, charset: &[String]) -> (String, f32) {
    let steps = preds.shape()[0];

    let mut chars: Vec<&str> = Vec::new();
    let mut columns: Vec<usize> = Vec::new();
    let mut confidences: Vec<f32> = Vec::new();
    let mut previous = usize::MAX;

    for t in 0..steps {
        let row = preds.row(t);
        let (best, prob) = row
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map_or((0, 0.0), |(i, &p)| (i, p));

        let repeated = best == previous;
        previous = best;
        // blank token collapses runs; index 0 is always the blank
        if best == 0 || repeated || best >= charset.len() {
            continue;
        }
        chars.push(charset[best].as_str());
        columns.push(t);
        confidences.push(prob);
    }

    let mut text = String::new();
    for (idx, ch) in chars.iter().enumerate() {
        if idx > 0 && columns[idx] - columns[idx - 1] > WORD_GAP_COLUMNS {
            text.push(' ');
        }
        text.push_str(ch);
    }

    let confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f32>() / confidences.len() as f32
    };
    (text, confidence)
}
