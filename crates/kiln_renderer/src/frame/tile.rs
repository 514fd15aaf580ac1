//! Tile partitioning of a frame.
//!
//! The image is cut into square tiles that workers render independently.
//! Tiles are ordered from the image center outward, so a preview of a
//! running render fills in where the subject usually is first.

use kiln_math::Vec4;

use crate::renderer::HitIds;

/// A rectangular region of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Column of the tile's first pixel
    pub x: u32,
    /// Row of the tile's first pixel (row 0 is the bottom of the image)
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Position in render order
    pub index: usize,
}

impl Tile {
    pub fn new(x: u32, y: u32, width: u32, height: u32, index: usize) -> Self {
        Self { x, y, width, height, index }
    }

    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    /// Pixel coordinates of the tile, row-major.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.y..self.y + self.height).flat_map(move |y| (self.x..self.x + self.width).map(move |x| (x, y)))
    }
}

/// Tiles covering a `width` x `height` image, in spiral order from the
/// center.
pub fn generate_tiles(width: u32, height: u32, tile_size: u32) -> Vec<Tile> {
    let tile_size = tile_size.max(1);
    let mut tiles = Vec::new();

    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            let tw = tile_size.min(width - x);
            let th = tile_size.min(height - y);
            tiles.push(Tile::new(x, y, tw, th, tiles.len()));
            x += tile_size;
        }
        y += tile_size;
    }

    sort_spiral(&mut tiles, width, height);
    for (i, tile) in tiles.iter_mut().enumerate() {
        tile.index = i;
    }
    tiles
}

fn sort_spiral(tiles: &mut [Tile], width: u32, height: u32) {
    let center_x = width as f32 / 2.0;
    let center_y = height as f32 / 2.0;
    let distance = |t: &Tile| {
        let dx = t.x as f32 + t.width as f32 / 2.0 - center_x;
        let dy = t.y as f32 + t.height as f32 / 2.0 - center_y;
        dx * dx + dy * dy
    };
    // Stable, so equidistant tiles keep their scanline order.
    tiles.sort_by(|a, b| distance(a).total_cmp(&distance(b)));
}

/// The samples one render pass produced for a tile, row-major within the
/// tile.
#[derive(Debug, Clone)]
pub struct TileResult {
    pub tile: Tile,
    /// Mean color of this pass's samples per pixel.
    pub colors: Vec<Vec4>,
    /// Nearest depth of this pass's samples per pixel.
    pub depths: Vec<f32>,
    /// Ids of each pixel's first sample.
    pub ids: Vec<HitIds>,
}

impl TileResult {
    pub fn with_capacity(tile: Tile) -> Self {
        let n = tile.pixel_count();
        Self { tile, colors: Vec::with_capacity(n), depths: Vec::with_capacity(n), ids: Vec::with_capacity(n) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_tiles_exact_fit() {
        let tiles = generate_tiles(64, 64, 32);
        assert_eq!(tiles.len(), 4);
        let total: usize = tiles.iter().map(|t| t.pixel_count()).sum();
        assert_eq!(total, 64 * 64);
    }

    #[test]
    fn test_generate_tiles_partial_fit() {
        let tiles = generate_tiles(50, 20, 32);
        assert_eq!(tiles.len(), 2);
        let total: usize = tiles.iter().map(|t| t.pixel_count()).sum();
        assert_eq!(total, 50 * 20);
        assert!(tiles.iter().any(|t| t.width == 18 && t.height == 20));
    }

    #[test]
    fn test_spiral_order_starts_at_center() {
        let tiles = generate_tiles(96, 96, 32);
        assert_eq!(tiles.len(), 9);
        assert_eq!((tiles[0].x, tiles[0].y), (32, 32));
        for (i, tile) in tiles.iter().enumerate() {
            assert_eq!(tile.index, i);
        }
    }

    #[test]
    fn test_pixels_cover_tile() {
        let tile = Tile::new(4, 8, 3, 2, 0);
        let pixels: Vec<_> = tile.pixels().collect();
        assert_eq!(pixels, vec![(4, 8), (5, 8), (6, 8), (4, 9), (5, 9), (6, 9)]);
    }

    #[test]
    fn test_empty_image() {
        assert!(generate_tiles(0, 10, 8).is_empty());
        assert_eq!(generate_tiles(3, 3, 0).len(), 9);
    }
}
