//! Integration tests for TemplateStore and Matcher working on real files
//!
//! These tests verify:
//! - Folder scanning, extension filtering and load order
//! - Colour images are matched in grayscale
//! - Threshold and tie-break behaviour on loaded sets
//! - Large templates on a full-HD frame are located exactly

use camino::{Utf8Path, Utf8PathBuf};
use image::{GrayImage, Luma, Rgb, RgbImage};
use image_clicker::models::Point;
use image_clicker::services::{LoadError, Matcher, TemplateStore};
use std::fs;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn create_image_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, dir)
}

fn icon(size: u32, seed: u32) -> RgbImage {
    RgbImage::from_fn(size, size, |x, y| {
        let v = (x * 29 + y * 53 + seed * 97 + (x ^ y) * 7) % 256;
        Rgb([v as u8, (255 - v) as u8, ((v * 3) % 256) as u8])
    })
}

fn save(dir: &Utf8Path, name: &str, image: &RgbImage) {
    image.save(dir.join(name)).unwrap();
}

fn screen_with(icon: &RgbImage, at: (i64, i64)) -> GrayImage {
    let mut screen = RgbImage::from_pixel(160, 120, Rgb([40, 60, 80]));
    image::imageops::replace(&mut screen, icon, at.0, at.1);
    image::DynamicImage::ImageRgb8(screen).to_luma8()
}

#[test]
fn test_folder_scan_order_and_filter() {
    let (_temp_dir, dir) = create_image_dir();
    save(&dir, "c_close.png", &icon(12, 1));
    save(&dir, "a_accept.PNG", &icon(12, 2));
    save(&dir, "b_banner.jpg", &icon(12, 3));
    fs::write(dir.join("notes.txt"), "not an image").unwrap();
    fs::create_dir(dir.join("nested.png")).unwrap();

    let store = TemplateStore::new();
    let count = store.reload(&dir).unwrap();

    assert_eq!(count, 3);
    let active = store.active();
    let names: Vec<&str> = active.names().collect();
    assert_eq!(names, vec!["a_accept.PNG", "b_banner.jpg", "c_close.png"]);
}

#[test]
fn test_missing_folder_is_not_fatal() {
    let (_temp_dir, dir) = create_image_dir();
    let store = TemplateStore::new();

    let result = store.reload(&dir.join("img"));

    assert!(matches!(result, Err(LoadError::FolderNotFound(_))));
    assert!(store.active().is_empty());
}

#[test]
fn test_loaded_template_found_on_screen() {
    let (_temp_dir, dir) = create_image_dir();
    let target = icon(24, 5);
    save(&dir, "target.png", &target);
    save(&dir, "other.png", &icon(24, 11));

    let store = TemplateStore::new();
    store.reload(&dir).unwrap();
    let frame = screen_with(&target, (70, 33));

    let found = Matcher::new()
        .find_best(&frame, &store.active(), 0.8)
        .expect("template should be found");

    assert_eq!(found.template, "target.png");
    assert_eq!(found.location, Point::new(70, 33));
    assert!(found.score > 0.999);
    assert_eq!((found.width, found.height), (24, 24));
}

#[test]
fn test_threshold_is_inclusive_and_respected() {
    let (_temp_dir, dir) = create_image_dir();
    let target = icon(16, 7);
    save(&dir, "target.png", &target);

    let store = TemplateStore::new();
    store.reload(&dir).unwrap();
    let frame = screen_with(&target, (5, 5));
    let matcher = Matcher::new();

    assert!(matcher.find_best(&frame, &store.active(), 1.0).is_some());

    let empty_screen = screen_with(&icon(1, 0), (0, 0));
    assert!(matcher.find_best(&empty_screen, &store.active(), 0.8).is_none());
}

#[test]
fn test_oversized_template_is_skipped() {
    let (_temp_dir, dir) = create_image_dir();
    let target = icon(16, 9);
    save(&dir, "huge.png", &icon(200, 1));
    save(&dir, "target.png", &target);

    let store = TemplateStore::new();
    store.reload(&dir).unwrap();
    let frame = screen_with(&target, (100, 60));

    let found = Matcher::new().find_best(&frame, &store.active(), 0.8).unwrap();

    assert_eq!(found.template, "target.png");
    assert_eq!(found.location, Point::new(100, 60));
}

#[test]
fn test_flat_template_matches_flat_area() {
    let (_temp_dir, dir) = create_image_dir();
    GrayImage::from_pixel(10, 10, Luma([0]))
        .save(dir.join("black.png"))
        .unwrap();

    let store = TemplateStore::new();
    store.reload(&dir).unwrap();

    let mut frame = GrayImage::from_pixel(50, 50, Luma([200]));
    image::imageops::replace(&mut frame, &GrayImage::from_pixel(10, 10, Luma([0])), 20, 15);

    let found = Matcher::new().find_best(&frame, &store.active(), 0.8).unwrap();
    assert_eq!(found.location, Point::new(20, 15));
    assert_eq!(found.score, 1.0);
}

#[test]
fn test_large_template_on_full_hd_frame() {
    let (_temp_dir, dir) = create_image_dir();
    let button = GrayImage::from_fn(64, 64, |x, y| {
        let (bx, by) = (x / 8, y / 8);
        Luma([((bx * 71 + by * 113 + bx * by * 29) % 180 + 40) as u8])
    });
    button.save(dir.join("button.png")).unwrap();

    let mut screen =
        GrayImage::from_fn(1920, 1080, |x, y| Luma([((x / 16 + y / 16) % 40 + 100) as u8]));
    image::imageops::replace(&mut screen, &button, 1237, 611);

    let store = TemplateStore::new();
    store.reload(&dir).unwrap();
    let started = Instant::now();
    let found = Matcher::new().find_best(&screen, &store.active(), 0.95).unwrap();

    assert_eq!(found.template, "button.png");
    assert_eq!(found.location, Point::new(1237, 611));
    assert_eq!(found.score, 1.0);
    assert!(started.elapsed() < Duration::from_secs(10));
}
