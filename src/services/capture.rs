use crate::models::{Point, SearchArea};
use image::{DynamicImage, GrayImage, RgbaImage};
use thiserror::Error;

/// Errors raised while grabbing a frame
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No display available for capture")]
    NoDisplay,

    #[error("Search {area} lies outside the {screen_width}x{screen_height} screen")]
    OutsideScreen {
        area: SearchArea,
        screen_width: u32,
        screen_height: u32,
    },

    #[error("Screen capture failed: {0}")]
    Backend(#[from] xcap::XCapError),
}

/// Source of grayscale frames for the loop.
#[cfg_attr(test, mockall::automock)]
pub trait ScreenCapture: Send + Sync {
    /// Capture the given area. Region coordinates are absolute screen pixels.
    fn capture(&self, area: &SearchArea) -> Result<GrayImage, CaptureError>;
}

/// Captures the primary monitor with `xcap` and crops to the search region.
#[derive(Debug, Default)]
pub struct XcapCapture;

impl XcapCapture {
    pub fn new() -> Self {
        Self
    }
}

impl ScreenCapture for XcapCapture {
    fn capture(&self, area: &SearchArea) -> Result<GrayImage, CaptureError> {
        let monitors = xcap::Monitor::all()?;
        let monitor = pick_primary(monitors, |m| m.is_primary().unwrap_or(false))
            .ok_or(CaptureError::NoDisplay)?;
        let screen = monitor.capture_image()?;
        crop_to_area(screen, area)
    }
}

/// The monitor flagged as primary, else the first one listed.
pub fn pick_primary<M>(
    monitors: impl IntoIterator<Item = M>,
    is_primary: impl Fn(&M) -> bool,
) -> Option<M> {
    let mut first = None;
    for monitor in monitors {
        if is_primary(&monitor) {
            return Some(monitor);
        }
        first.get_or_insert(monitor);
    }
    first
}

/// Screen position of the frame's top-left pixel for `area`.
///
/// Regions hanging off the top or left edge are clipped by [`crop_to_area`],
/// so the frame starts at the clipped origin rather than the region origin.
pub fn frame_origin(area: &SearchArea) -> Point {
    let offset = area.offset();
    Point::new(offset.x.max(0), offset.y.max(0))
}

/// Crop a full-screen RGBA capture to `area` and convert it to grayscale.
///
/// A region that hangs over the screen edge is clipped to the visible part.
pub fn crop_to_area(screen: RgbaImage, area: &SearchArea) -> Result<GrayImage, CaptureError> {
    let (screen_width, screen_height) = screen.dimensions();

    let Some(region) = area.region() else {
        return Ok(DynamicImage::ImageRgba8(screen).to_luma8());
    };

    let left = region.x().max(0) as i64;
    let top = region.y().max(0) as i64;
    let right = (region.x() as i64 + region.width() as i64).min(screen_width as i64);
    let bottom = (region.y() as i64 + region.height() as i64).min(screen_height as i64);

    if right <= left || bottom <= top {
        return Err(CaptureError::OutsideScreen {
            area: *area,
            screen_width,
            screen_height,
        });
    }

    let cropped = image::imageops::crop_imm(
        &screen,
        left as u32,
        top as u32,
        (right - left) as u32,
        (bottom - top) as u32,
    )
    .to_image();

    Ok(DynamicImage::ImageRgba8(cropped).to_luma8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchRegion;
    use image::Rgba;

    #[test]
    fn test_pick_primary_prefers_flagged_monitor() {
        let monitors = [("left", false), ("main", true), ("right", false)];
        let picked = pick_primary(monitors, |m| m.1);
        assert_eq!(picked, Some(("main", true)));
    }

    #[test]
    fn test_pick_primary_falls_back_to_first() {
        assert_eq!(pick_primary(["a", "b"], |_| false), Some("a"));
        assert_eq!(pick_primary(Vec::<&str>::new(), |_| true), None);
    }

    fn screen() -> RgbaImage {
        RgbaImage::from_fn(200, 100, |x, y| {
            if x >= 50 && y >= 20 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        })
    }

    #[test]
    fn test_full_screen_keeps_dimensions() {
        let frame = crop_to_area(screen(), &SearchArea::FullScreen).unwrap();
        assert_eq!(frame.dimensions(), (200, 100));
    }

    #[test]
    fn test_region_crop() {
        let area = SearchArea::Region(SearchRegion::new(50, 20, 30, 10).unwrap());

        let frame = crop_to_area(screen(), &area).unwrap();

        assert_eq!(frame.dimensions(), (30, 10));
        assert!(frame.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_region_clipped_at_screen_edge() {
        let area = SearchArea::Region(SearchRegion::new(180, 90, 50, 50).unwrap());

        let frame = crop_to_area(screen(), &area).unwrap();

        assert_eq!(frame.dimensions(), (20, 10));
    }

    #[test]
    fn test_region_outside_screen() {
        let area = SearchArea::Region(SearchRegion::new(-100, -100, 50, 50).unwrap());

        let err = crop_to_area(screen(), &area).unwrap_err();

        assert!(matches!(err, CaptureError::OutsideScreen { .. }));
    }

    #[test]
    fn test_frame_origin_follows_clipping() {
        let inside = SearchArea::Region(SearchRegion::new(30, 40, 50, 50).unwrap());
        let off_left = SearchArea::Region(SearchRegion::new(-20, 10, 50, 50).unwrap());

        assert_eq!(frame_origin(&SearchArea::FullScreen), Point::ORIGIN);
        assert_eq!(frame_origin(&inside), Point::new(30, 40));
        assert_eq!(frame_origin(&off_left), Point::new(0, 10));
    }
}
