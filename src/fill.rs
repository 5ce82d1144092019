// ============================================================================
// FILL — stack-based flood fill with tolerance matching
// ============================================================================

use image::{Rgba, RgbaImage};

use crate::canvas::DirtyRect;

/// Default tolerance: merges anti-aliasing fringes one or two steps away
/// from the seed color without crossing real edges.
pub const DEFAULT_TOLERANCE: f32 = 2.0;

/// Per-channel squared-difference match: every channel must satisfy
/// `diff² ≤ tolerance²`.  Tolerance 0 is an exact byte match.
#[inline]
fn is_color_similar(a: &Rgba<u8>, b: &Rgba<u8>, tolerance_sq: f32) -> bool {
    for c in 0..4 {
        let diff = a[c] as f32 - b[c] as f32;
        if diff * diff > tolerance_sq {
            return false;
        }
    }
    true
}

/// 4-connected flood fill: replaces every pixel contiguous with the seed
/// whose color matches the seed color within `tolerance`.
///
/// Returns the exact bounding box of the pixels actually changed, or
/// [`DirtyRect::EMPTY`] when nothing changed: the seed was outside the
/// canvas, or the region already carries the fill color (the no-op guard —
/// refilling the same spot must not dirty anything).
///
/// Uses an explicit stack of packed `y·width + x` indices rather than
/// recursion, so a full-canvas fill cannot overflow the call stack, and the
/// whole fill completes within one event-handler invocation.
pub fn flood_fill(
    buffer: &mut RgbaImage,
    seed_x: i32,
    seed_y: i32,
    fill_color: Rgba<u8>,
    tolerance: f32,
) -> DirtyRect {
    let width = buffer.width();
    let height = buffer.height();
    if seed_x < 0 || seed_y < 0 || seed_x as u32 >= width || seed_y as u32 >= height {
        return DirtyRect::EMPTY;
    }
    let (seed_x, seed_y) = (seed_x as u32, seed_y as u32);

    let tolerance_sq = tolerance.max(0.0) * tolerance.max(0.0);
    let seed_color = *buffer.get_pixel(seed_x, seed_y);

    // No-op guard: the region is already the fill color.
    if is_color_similar(&seed_color, &fill_color, tolerance_sq) {
        return DirtyRect::EMPTY;
    }

    let wu = width as usize;
    let hu = height as usize;

    // The visited mask doubles as "already queued": each pixel is examined
    // at most once, so already-recolored pixels are never re-matched.
    let mut visited = vec![false; wu * hu];
    let mut stack: Vec<u32> = Vec::with_capacity(4096);

    let mut dirty = DirtyRect::EMPTY;

    let seed_idx = seed_y as usize * wu + seed_x as usize;
    visited[seed_idx] = true;
    stack.push(seed_idx as u32);

    while let Some(idx) = stack.pop() {
        let x = (idx as usize % wu) as u32;
        let y = (idx as usize / wu) as u32;

        let px = buffer.get_pixel_mut(x, y);
        if *px != fill_color {
            dirty.include(x, y);
        }
        *px = fill_color;

        // Push unvisited 4-neighbors that still match the seed color.
        let try_neighbor = |nx: u32, ny: u32, stack: &mut Vec<u32>, visited: &mut Vec<bool>, buffer: &RgbaImage| {
            let ni = ny as usize * wu + nx as usize;
            if !visited[ni] && is_color_similar(buffer.get_pixel(nx, ny), &seed_color, tolerance_sq) {
                visited[ni] = true;
                stack.push(ni as u32);
            }
        };
        if x > 0 {
            try_neighbor(x - 1, y, &mut stack, &mut visited, buffer);
        }
        if x + 1 < width {
            try_neighbor(x + 1, y, &mut stack, &mut visited, buffer);
        }
        if y > 0 {
            try_neighbor(x, y - 1, &mut stack, &mut visited, buffer);
        }
        if y + 1 < height {
            try_neighbor(x, y + 1, &mut stack, &mut visited, buffer);
        }
    }

    dirty
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    #[test]
    fn fills_uniform_region_with_exact_bounds() {
        let mut buf = RgbaImage::from_pixel(50, 50, WHITE);
        let dirty = flood_fill(&mut buf, 25, 25, BLACK, DEFAULT_TOLERANCE);
        assert!(buf.pixels().all(|p| *p == BLACK));
        assert_eq!(dirty, DirtyRect::from_bounds(0, 0, 49, 49));
    }

    #[test]
    fn refilling_same_color_is_a_byte_identical_noop() {
        let mut buf = RgbaImage::from_pixel(20, 20, BLACK);
        let before = buf.clone();
        let dirty = flood_fill(&mut buf, 10, 10, BLACK, DEFAULT_TOLERANCE);
        assert!(dirty.is_empty());
        assert_eq!(buf.as_raw(), before.as_raw());
    }

    #[test]
    fn out_of_canvas_seed_is_rejected() {
        let mut buf = RgbaImage::from_pixel(10, 10, WHITE);
        assert!(flood_fill(&mut buf, -1, 5, BLACK, 0.0).is_empty());
        assert!(flood_fill(&mut buf, 5, 10, BLACK, 0.0).is_empty());
        assert!(buf.pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn fill_stops_at_a_boundary() {
        // Vertical black line at x = 5 splits the canvas.
        let mut buf = RgbaImage::from_pixel(11, 11, WHITE);
        for y in 0..11 {
            buf.put_pixel(5, y, BLACK);
        }
        let red = Rgba([255, 0, 0, 255]);
        let dirty = flood_fill(&mut buf, 2, 5, red, 0.0);
        assert_eq!(*buf.get_pixel(0, 0), red);
        assert_eq!(*buf.get_pixel(4, 10), red);
        assert_eq!(*buf.get_pixel(5, 5), BLACK);
        assert_eq!(*buf.get_pixel(6, 5), WHITE);
        assert_eq!(dirty, DirtyRect::from_bounds(0, 0, 4, 10));
    }

    #[test]
    fn four_connectivity_does_not_leak_diagonally() {
        // Checkerboard corner contact must not connect.
        let mut buf = RgbaImage::from_pixel(4, 4, WHITE);
        buf.put_pixel(1, 1, BLACK);
        buf.put_pixel(2, 2, BLACK);
        buf.put_pixel(1, 2, WHITE);
        buf.put_pixel(2, 1, WHITE);
        let red = Rgba([255, 0, 0, 255]);
        flood_fill(&mut buf, 1, 1, red, 0.0);
        assert_eq!(*buf.get_pixel(1, 1), red);
        assert_eq!(*buf.get_pixel(2, 2), BLACK);
    }

    #[test]
    fn tolerance_merges_near_colors() {
        let mut buf = RgbaImage::from_pixel(6, 1, WHITE);
        buf.put_pixel(3, 0, Rgba([253, 253, 253, 255]));
        let red = Rgba([255, 0, 0, 255]);
        // Tolerance 0 stops at the off-white pixel…
        let mut exact = buf.clone();
        flood_fill(&mut exact, 0, 0, red, 0.0);
        assert_eq!(*exact.get_pixel(3, 0), Rgba([253, 253, 253, 255]));
        assert_eq!(*exact.get_pixel(4, 0), WHITE);
        // …tolerance 2 crosses it.
        flood_fill(&mut buf, 0, 0, red, 2.0);
        assert!(buf.pixels().all(|p| *p == red));
    }

    #[test]
    fn dirty_rect_is_exact_for_partial_fills() {
        let mut buf = RgbaImage::from_pixel(10, 10, WHITE);
        // A 3×3 pocket of gray in the middle, sealed by white elsewhere.
        for y in 4..7 {
            for x in 4..7 {
                buf.put_pixel(x, y, Rgba([100, 100, 100, 255]));
            }
        }
        let dirty = flood_fill(&mut buf, 5, 5, BLACK, 0.0);
        assert_eq!(dirty, DirtyRect::from_bounds(4, 4, 6, 6));
    }
}
