use crate::models::Point;
use crate::services::templates::{Template, TemplateSet};
use image::{GrayImage, Luma};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::time::Instant;
use thiserror::Error;

/// Best position of one template inside one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredLocation {
    /// Similarity in `[0.0, 1.0]`
    pub score: f64,
    pub x: u32,
    pub y: u32,
}

/// The winning match of a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub template: String,
    pub score: f64,
    /// Top-left corner of the match inside the captured frame
    pub location: Point,
    pub width: u32,
    pub height: u32,
}

/// Result of scoring a whole set against one frame.
#[derive(Debug, Default, PartialEq)]
pub struct Scan {
    /// Best match at or above the threshold
    pub best: Option<MatchResult>,
    /// Templates left out for this frame only
    pub skipped: Vec<MatchError>,
}

/// Errors that make a template unusable against the current frame
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MatchError {
    #[error("Template {template} ({template_width}x{template_height}) is larger than the frame ({frame_width}x{frame_height})")]
    TemplateTooLarge {
        template: String,
        template_width: u32,
        template_height: u32,
        frame_width: u32,
        frame_height: u32,
    },

    #[error("Template {0} has no pixels")]
    EmptyTemplate(String),
}

/// Similarity measure used by the [`Matcher`].
///
/// Implementations may assume the template is non-empty and fits inside the
/// frame in both dimensions; the matcher checks this before calling.
pub trait Scorer: Send + Sync {
    fn best_location(&self, frame: &GrayImage, template: &GrayImage) -> ScoredLocation;
}

/// Templates whose shorter side is at least twice this are searched coarse-to-fine.
pub const MIN_COARSE_SIDE: u32 = 16;

/// Most halvings applied to the frame and the template.
pub const MAX_PYRAMID_LEVELS: usize = 3;

/// Peaks carried from the coarsest level down to full resolution.
const PEAK_CANDIDATES: usize = 8;

/// Coarse positions kept for peak selection, best first.
const PEAK_POOL: usize = PEAK_CANDIDATES * 64;

/// Coarse peaks closer than this, in coarse pixels, count as one.
const PEAK_SEPARATION: u32 = 2;

/// Search radius around a candidate at each finer level.
const REFINE_RADIUS: u32 = 3;

const UNSCORED: ScoredLocation = ScoredLocation {
    score: f64::NEG_INFINITY,
    x: 0,
    y: 0,
};

/// Zero-mean normalized cross-correlation.
///
/// Equivalent to OpenCV's `TM_CCOEFF_NORMED`, with negative correlations
/// clamped to zero. Window sums come from integral images; the
/// cross-correlation term is accumulated in integers so an exact copy of the
/// template scores 1.0.
///
/// Small templates are scored at every position, rows in parallel. Templates
/// of at least `2 * MIN_COARSE_SIDE` pixels are first scored on a 2x2
/// box-filtered pyramid; the best separated peaks of the coarsest level are
/// refined level by level and the final score is computed at full resolution.
/// Among equal scores the top-most, then left-most position wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZnccScorer;

impl Scorer for ZnccScorer {
    fn best_location(&self, frame: &GrayImage, template: &GrayImage) -> ScoredLocation {
        let templates = template_pyramid(template);
        if templates.is_empty() {
            return exhaustive(frame, template);
        }

        let mut frames: Vec<GrayImage> = Vec::with_capacity(templates.len());
        for _ in 0..templates.len() {
            let next = downsample(frames.last().unwrap_or(frame));
            frames.push(next);
        }

        let top = templates.len() - 1;
        let mut candidates = coarse_peaks(&frames[top], &templates[top]);

        // frames[i] and templates[i] are pyramid level i + 1
        for level in (0..templates.len()).rev() {
            let (frame_at, template_at) = match level {
                0 => (frame, template),
                _ => (&frames[level - 1], &templates[level - 1]),
            };
            candidates = refine(frame_at, template_at, &candidates);
        }

        candidates.into_iter().reduce(prefer).unwrap_or(ScoredLocation {
            score: 0.0,
            x: 0,
            y: 0,
        })
    }
}

/// Template statistics shared by every window.
struct TemplateStats<'a> {
    px: &'a [u8],
    width: u32,
    height: u32,
    n: i128,
    sum: i128,
    /// n^2 * variance of the template
    var: i128,
}

impl<'a> TemplateStats<'a> {
    fn new(template: &'a GrayImage) -> Self {
        let px = template.as_raw();
        let n = (template.width() as i128) * (template.height() as i128);
        let sum: i128 = px.iter().map(|&p| p as i128).sum();
        let sq: i128 = px.iter().map(|&p| (p as i128) * (p as i128)).sum();

        Self {
            px,
            width: template.width(),
            height: template.height(),
            n,
            sum,
            var: n * sq - sum * sum,
        }
    }

    fn is_flat(&self) -> bool {
        self.var == 0
    }
}

/// Score of the window at `(x, y)`.
fn score_at(
    frame: &GrayImage,
    integral: &IntegralImage,
    t: &TemplateStats<'_>,
    x: u32,
    y: u32,
) -> f64 {
    let (w_sum, w_sq) = integral.window(x, y, t.width, t.height);
    let w_sum = w_sum as i128;
    let w_var = t.n * (w_sq as i128) - w_sum * w_sum;

    if t.var == 0 || w_var == 0 {
        // Flat template or flat window: only an equally flat, equally bright window matches
        return if t.var == 0 && w_var == 0 && t.sum == w_sum {
            1.0
        } else {
            0.0
        };
    }

    let cross = cross_correlation(frame.as_raw(), frame.width(), t.px, t.width, t.height, x, y);
    let numerator = t.n * (cross as i128) - t.sum * w_sum;
    if numerator == t.var && t.var == w_var {
        1.0
    } else {
        let denominator = ((t.var as f64) * (w_var as f64)).sqrt();
        (numerator as f64 / denominator).clamp(0.0, 1.0)
    }
}

/// Higher score wins; ties go to the top-most, then left-most position.
fn prefer(a: ScoredLocation, b: ScoredLocation) -> ScoredLocation {
    if b.score > a.score || (b.score == a.score && (b.y, b.x) < (a.y, a.x)) {
        b
    } else {
        a
    }
}

/// Best-first ordering with the same tie-break as [`prefer`].
fn rank(a: &ScoredLocation, b: &ScoredLocation) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| (a.y, a.x).cmp(&(b.y, b.x)))
}

/// Score every position, one row per task.
fn exhaustive(frame: &GrayImage, template: &GrayImage) -> ScoredLocation {
    let stats = TemplateStats::new(template);
    let integral = IntegralImage::new(frame);
    let max_x = frame.width() - template.width();

    (0..=frame.height() - template.height())
        .into_par_iter()
        .map(|y| {
            (0..=max_x)
                .map(|x| ScoredLocation {
                    score: score_at(frame, &integral, &stats, x, y),
                    x,
                    y,
                })
                .fold(UNSCORED, prefer)
        })
        .reduce(|| UNSCORED, prefer)
}

/// Best separated positive peaks over every position of a coarse level.
fn coarse_peaks(frame: &GrayImage, template: &GrayImage) -> Vec<ScoredLocation> {
    let stats = TemplateStats::new(template);
    let integral = IntegralImage::new(frame);
    let max_x = frame.width() - template.width();
    let (stats, integral) = (&stats, &integral);

    let mut scored: Vec<ScoredLocation> = (0..=frame.height() - template.height())
        .into_par_iter()
        .flat_map_iter(move |y| {
            (0..=max_x).map(move |x| ScoredLocation {
                score: score_at(frame, integral, stats, x, y),
                x,
                y,
            })
        })
        .filter(|s| s.score > 0.0)
        .collect();

    if scored.len() > PEAK_POOL {
        scored.select_nth_unstable_by(PEAK_POOL, rank);
        scored.truncate(PEAK_POOL);
    }
    scored.sort_unstable_by(rank);

    let mut peaks: Vec<ScoredLocation> = Vec::with_capacity(PEAK_CANDIDATES);
    for candidate in scored {
        let separated = peaks.iter().all(|p| {
            p.x.abs_diff(candidate.x) > PEAK_SEPARATION
                || p.y.abs_diff(candidate.y) > PEAK_SEPARATION
        });
        if separated {
            peaks.push(candidate);
            if peaks.len() == PEAK_CANDIDATES {
                break;
            }
        }
    }
    peaks
}

/// Re-score each coarse candidate around its position on the next finer level.
fn refine(
    frame: &GrayImage,
    template: &GrayImage,
    coarse: &[ScoredLocation],
) -> Vec<ScoredLocation> {
    let stats = TemplateStats::new(template);
    let integral = IntegralImage::new(frame);
    let max_x = frame.width() - template.width();
    let max_y = frame.height() - template.height();

    coarse
        .par_iter()
        .map(|c| {
            let (cx, cy) = (c.x * 2, c.y * 2);
            let mut best = UNSCORED;
            for y in cy.saturating_sub(REFINE_RADIUS)..=(cy + REFINE_RADIUS).min(max_y) {
                for x in cx.saturating_sub(REFINE_RADIUS)..=(cx + REFINE_RADIUS).min(max_x) {
                    let score = score_at(frame, &integral, &stats, x, y);
                    best = prefer(best, ScoredLocation { score, x, y });
                }
            }
            best
        })
        .filter(|s| s.score.is_finite())
        .collect()
}

/// Successive half-size copies of `template`, smallest last.
///
/// Stops before a level would drop under [`MIN_COARSE_SIDE`] or lose all
/// contrast to the box filter.
fn template_pyramid(template: &GrayImage) -> Vec<GrayImage> {
    let mut levels: Vec<GrayImage> = Vec::new();

    while levels.len() < MAX_PYRAMID_LEVELS {
        let current = levels.last().unwrap_or(template);
        if current.width().min(current.height()) / 2 < MIN_COARSE_SIDE {
            break;
        }
        let next = downsample(current);
        if TemplateStats::new(&next).is_flat() {
            break;
        }
        levels.push(next);
    }

    levels
}

/// 2x2 box filter; an odd last row or column is dropped.
fn downsample(image: &GrayImage) -> GrayImage {
    GrayImage::from_fn(image.width() / 2, image.height() / 2, |x, y| {
        let (sx, sy) = (x * 2, y * 2);
        let sum: u32 = [(sx, sy), (sx + 1, sy), (sx, sy + 1), (sx + 1, sy + 1)]
            .iter()
            .map(|&(px, py)| image.get_pixel(px, py)[0] as u32)
            .sum();
        Luma([((sum + 2) / 4) as u8])
    })
}

/// Sum of `frame * template` over the window at `(x, y)`.
fn cross_correlation(
    frame: &[u8],
    frame_width: u32,
    template: &[u8],
    tw: u32,
    th: u32,
    x: u32,
    y: u32,
) -> u64 {
    let (fw, tw, x) = (frame_width as usize, tw as usize, x as usize);
    (0..th as usize)
        .map(|ty| {
            let start = (y as usize + ty) * fw + x;
            let frame_row = &frame[start..start + tw];
            let template_row = &template[ty * tw..(ty + 1) * tw];
            frame_row
                .iter()
                .zip(template_row)
                .map(|(&a, &b)| a as u64 * b as u64)
                .sum::<u64>()
        })
        .sum()
}

/// Summed-area tables of pixel values and squared pixel values.
struct IntegralImage {
    stride: usize,
    sum: Vec<u64>,
    sq_sum: Vec<u64>,
}

impl IntegralImage {
    fn new(image: &GrayImage) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0u64; stride * (h + 1)];
        let mut sq_sum = vec![0u64; stride * (h + 1)];
        let px = image.as_raw();

        for y in 0..h {
            let mut row_sum = 0u64;
            let mut row_sq = 0u64;
            for x in 0..w {
                let v = px[y * w + x] as u64;
                row_sum += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + (x + 1);
                sum[idx] = sum[idx - stride] + row_sum;
                sq_sum[idx] = sq_sum[idx - stride] + row_sq;
            }
        }

        Self {
            stride,
            sum,
            sq_sum,
        }
    }

    /// `(sum, sum of squares)` of the `w x h` window at `(x, y)`.
    fn window(&self, x: u32, y: u32, w: u32, h: u32) -> (u64, u64) {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        let at = |table: &[u64], x: usize, y: usize| table[y * self.stride + x];

        let rect = |table: &[u64]| {
            at(table, x1, y1) + at(table, x0, y0) - at(table, x0, y1) - at(table, x1, y0)
        };
        (rect(&self.sum), rect(&self.sq_sum))
    }
}

/// Finds the best template in a frame.
pub struct Matcher {
    scorer: Box<dyn Scorer>,
}

impl Matcher {
    /// Matcher using [`ZnccScorer`].
    pub fn new() -> Self {
        Self::with_scorer(ZnccScorer)
    }

    pub fn with_scorer(scorer: impl Scorer + 'static) -> Self {
        Self {
            scorer: Box::new(scorer),
        }
    }

    /// Score a single template against the frame.
    pub fn score_template(
        &self,
        frame: &GrayImage,
        template: &Template,
    ) -> Result<MatchResult, MatchError> {
        if template.width() == 0 || template.height() == 0 {
            return Err(MatchError::EmptyTemplate(template.name().to_string()));
        }
        if template.width() > frame.width() || template.height() > frame.height() {
            return Err(MatchError::TemplateTooLarge {
                template: template.name().to_string(),
                template_width: template.width(),
                template_height: template.height(),
                frame_width: frame.width(),
                frame_height: frame.height(),
            });
        }

        let best = self.scorer.best_location(frame, template.image());
        Ok(MatchResult {
            template: template.name().to_string(),
            score: best.score,
            location: Point::new(best.x as i32, best.y as i32),
            width: template.width(),
            height: template.height(),
        })
    }

    /// Score every template and keep the best one reaching `threshold`.
    ///
    /// The threshold is inclusive. When several templates share the top
    /// score, the one that comes first in the set wins. Templates that cannot
    /// be scored against this frame are returned in [`Scan::skipped`].
    pub fn scan(&self, frame: &GrayImage, templates: &TemplateSet, threshold: f64) -> Scan {
        let started = Instant::now();
        let mut best: Option<MatchResult> = None;
        let mut skipped = Vec::new();

        for template in templates.iter() {
            match self.score_template(frame, template) {
                Ok(result) => {
                    tracing::debug!(
                        "Template '{}' best score {:.3} at {}",
                        result.template,
                        result.score,
                        result.location
                    );
                    if best.as_ref().is_none_or(|b| result.score > b.score) {
                        best = Some(result);
                    }
                }
                Err(e) => skipped.push(e),
            }
        }

        tracing::trace!(
            "Scored {} templates in {:?}",
            templates.len(),
            started.elapsed()
        );

        Scan {
            best: best.filter(|b| b.score >= threshold),
            skipped,
        }
    }

    /// [`Matcher::scan`] without the skipped templates.
    pub fn find_best(
        &self,
        frame: &GrayImage,
        templates: &TemplateSet,
        threshold: f64,
    ) -> Option<MatchResult> {
        self.scan(frame, templates, threshold).best
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new()
    }
}
