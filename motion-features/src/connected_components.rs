//! 4-connected labeling of a boolean mask via union-find, used to turn a
//! motion mask into the `active_regions` bounding boxes the wire schema
//! wants, without reaching for a full CV library.

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        UnionFind {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

/// Axis-aligned bounding box and pixel area of one connected region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub bbox: [f64; 4],
    pub area_px: usize,
}

/// Labels 4-connected `true` runs in `mask` (row-major, `width * height`)
/// and returns one `Region` per component with `area_px > min_area`,
/// ordered by first appearance (top-to-bottom, left-to-right).
pub fn connected_components(mask: &[bool], width: usize, height: usize, min_area: usize) -> Vec<Region> {
    assert_eq!(mask.len(), width * height);
    let mut uf = UnionFind::new(mask.len());

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            if !mask[idx] {
                continue;
            }
            if x > 0 && mask[idx - 1] {
                uf.union(idx, idx - 1);
            }
            if y > 0 && mask[idx - width] {
                uf.union(idx, idx - width);
            }
        }
    }

    use std::collections::HashMap;
    let mut bounds: HashMap<usize, (usize, usize, usize, usize, usize)> = HashMap::new();
    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            if !mask[idx] {
                continue;
            }
            let root = uf.find(idx);
            let entry = bounds.entry(root).or_insert((x, y, x, y, 0));
            entry.0 = entry.0.min(x);
            entry.1 = entry.1.min(y);
            entry.2 = entry.2.max(x);
            entry.3 = entry.3.max(y);
            entry.4 += 1;
        }
    }

    let mut regions: Vec<(usize, Region)> = bounds
        .into_iter()
        .filter(|(_, (_, _, _, _, area))| *area > min_area)
        .map(|(root, (x0, y0, x1, y1, area))| {
            (
                root,
                Region {
                    bbox: [x0 as f64, y0 as f64, (x1 + 1) as f64, (y1 + 1) as f64],
                    area_px: area,
                },
            )
        })
        .collect();

    regions.sort_by_key(|(_, r)| (r.bbox[1] as i64, r.bbox[0] as i64));
    regions.into_iter().map(|(_, r)| r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from_rows(rows: &[&str]) -> (Vec<bool>, usize, usize) {
        let height = rows.len();
        let width = rows[0].len();
        let mut mask = vec![false; width * height];
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                mask[y * width + x] = c == 'x';
            }
        }
        (mask, width, height)
    }

    #[test]
    fn single_square_region_is_one_component() {
        let (mask, w, h) = mask_from_rows(&["....", ".xx.", ".xx.", "...."]);
        let regions = connected_components(&mask, w, h, 0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bbox, [1.0, 1.0, 3.0, 3.0]);
        assert_eq!(regions[0].area_px, 4);
    }

    #[test]
    fn disjoint_regions_are_separate_components() {
        let (mask, w, h) = mask_from_rows(&["x...x", ".....", "x...x"]);
        let regions = connected_components(&mask, w, h, 0);
        assert_eq!(regions.len(), 4);
    }

    #[test]
    fn tiny_regions_are_filtered_by_min_area() {
        let (mask, w, h) = mask_from_rows(&["x....", ".....", "..xx.", "..xx."]);
        let regions = connected_components(&mask, w, h, 1);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area_px, 4);
    }
}
