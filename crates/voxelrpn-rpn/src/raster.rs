//! Scanline fill of convex polygons on the birdview raster.

/// A filled convex polygon stored as one inclusive `[x0, x1]` span per row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolygonSpans {
    /// Row of the first span.
    first_row: i64,
    /// Inclusive column span per row, `None` for rows the polygon misses.
    spans: Vec<Option<(i64, i64)>>,
}

impl PolygonSpans {
    /// Fill the convex polygon `vertices` (`(col, row)` cells) on a
    /// `width x height` raster.
    ///
    /// Boundary cells are filled; anything outside the raster is clipped.
    pub fn fill_convex(vertices: &[[i64; 2]], width: usize, height: usize) -> Self {
        if vertices.is_empty() || width == 0 || height == 0 {
            return Self::default();
        }
        let (max_col, max_row) = (width as i64 - 1, height as i64 - 1);

        let row_lo = vertices.iter().map(|v| v[1]).min().unwrap_or(0).max(0);
        let row_hi = vertices.iter().map(|v| v[1]).max().unwrap_or(-1).min(max_row);
        if row_lo > row_hi {
            return Self::default();
        }

        let mut spans = Vec::with_capacity((row_hi - row_lo + 1) as usize);
        for row in row_lo..=row_hi {
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for (i, p) in vertices.iter().enumerate() {
                let q = &vertices[(i + 1) % vertices.len()];
                if row < p[1].min(q[1]) || row > p[1].max(q[1]) {
                    continue;
                }
                if p[1] == q[1] {
                    lo = lo.min(p[0].min(q[0]) as f64);
                    hi = hi.max(p[0].max(q[0]) as f64);
                } else {
                    let t = (row - p[1]) as f64 / (q[1] - p[1]) as f64;
                    let x = p[0] as f64 + t * (q[0] - p[0]) as f64;
                    lo = lo.min(x);
                    hi = hi.max(x);
                }
            }
            let span = if lo <= hi {
                let x0 = (lo.round() as i64).max(0);
                let x1 = (hi.round() as i64).min(max_col);
                (x0 <= x1).then_some((x0, x1))
            } else {
                None
            };
            spans.push(span);
        }

        Self {
            first_row: row_lo,
            spans,
        }
    }

    /// Inclusive span of `row`, if filled.
    pub fn span(&self, row: i64) -> Option<(i64, i64)> {
        let offset = row - self.first_row;
        if offset < 0 {
            return None;
        }
        self.spans.get(offset as usize).copied().flatten()
    }

    /// Number of filled cells.
    pub fn area(&self) -> usize {
        self.spans
            .iter()
            .flatten()
            .map(|(x0, x1)| (x1 - x0 + 1) as usize)
            .sum()
    }

    /// Number of cells filled in both `self` and `other`.
    pub fn intersection(&self, other: &PolygonSpans) -> usize {
        let mut share = 0;
        for (offset, span) in self.spans.iter().enumerate() {
            let Some((a0, a1)) = span else {
                continue;
            };
            let Some((b0, b1)) = other.span(self.first_row + offset as i64) else {
                continue;
            };
            let (lo, hi) = ((*a0).max(b0), (*a1).min(b1));
            if lo <= hi {
                share += (hi - lo + 1) as usize;
            }
        }
        share
    }
}
