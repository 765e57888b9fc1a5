use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

use crate::stats::ChartPoint;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 400;
const MARGIN: u32 = 40;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([60, 60, 60]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const LINE: Rgb<u8> = Rgb([31, 119, 180]);

/// Render the cumulative series as a PNG line chart.
///
/// The x axis is linear in days from the first point, the y axis runs from
/// zero to the largest total.
pub fn render_chart(points: &[ChartPoint]) -> Result<Vec<u8>> {
    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);

    let left = MARGIN as i64;
    let right = (WIDTH - MARGIN) as i64;
    let top = MARGIN as i64;
    let bottom = (HEIGHT - MARGIN) as i64;

    for i in 1..=4 {
        let y = bottom - (bottom - top) * i / 4;
        draw_line(&mut img, (left, y), (right, y), GRID);
    }
    draw_line(&mut img, (left, top), (left, bottom), AXIS);
    draw_line(&mut img, (left, bottom), (right, bottom), AXIS);

    if let Some(first) = points.first() {
        let last_day = points.iter().map(|p| p.date).max().unwrap_or(first.date);
        let span_days = (last_day - first.date).num_days().max(1);
        let max_total = points.iter().map(|p| p.total).max().unwrap_or(0).max(1);

        let project = |p: &ChartPoint| {
            let x = left + (right - left) * (p.date - first.date).num_days() / span_days;
            let y = bottom - (bottom - top) * p.total / max_total;
            (x, y)
        };

        let mut previous = project(first);
        if points.len() == 1 {
            draw_line(&mut img, previous, (right, previous.1), LINE);
        }
        for point in &points[1..] {
            let next = project(point);
            draw_line(&mut img, previous, next, LINE);
            previous = next;
        }
    }

    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("encode chart png")?;
    Ok(bytes)
}

// Bresenham, clipped to the canvas
fn draw_line(img: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
            img.put_pixel(x as u32, y as u32, color);
        }
        if x == to.0 && y == to.1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}
