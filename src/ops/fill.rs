use image::Rgba;

use crate::canvas::{LayerKind, RasterSurface};

/// 4-connected flood fill on one mask layer.
///
/// Every pixel connected to `(seed_x, seed_y)` that has exactly the seed's
/// color is set to `target`. Returns how many pixels changed. Seeds outside
/// the image, or already holding `target`, change nothing.
///
/// Uses a DFS Vec-stack of flat pixel indices plus a visited bitmap, so large
/// regions never recurse.
pub fn flood_fill(
    surface: &mut RasterSurface,
    layer: LayerKind,
    seed_x: u32,
    seed_y: u32,
    target: Rgba<u8>,
) -> usize {
    let w = surface.width();
    let h = surface.height();
    if seed_x >= w || seed_y >= h {
        return 0;
    }
    let source = surface.get_pixel(layer, seed_x, seed_y);
    if source == target {
        return 0;
    }

    let wu = w as usize;
    let mut visited = vec![false; wu * h as usize];
    let mut stack: Vec<usize> = Vec::with_capacity(4096);
    let seed_idx = seed_y as usize * wu + seed_x as usize;
    visited[seed_idx] = true;
    stack.push(seed_idx);

    let mut changed = 0usize;
    while let Some(idx) = stack.pop() {
        let x = (idx % wu) as u32;
        let y = (idx / wu) as u32;
        if surface.set_pixel(layer, x, y, target) {
            changed += 1;
        }

        let mut visit = |nx: u32, ny: u32| {
            let ni = ny as usize * wu + nx as usize;
            if !visited[ni] && surface.get_pixel(layer, nx, ny) == source {
                visited[ni] = true;
                stack.push(ni);
            }
        };
        if x > 0 {
            visit(x - 1, y);
        }
        if x + 1 < w {
            visit(x + 1, y);
        }
        if y > 0 {
            visit(x, y - 1);
        }
        if y + 1 < h {
            visit(x, y + 1);
        }
    }
    changed
}
