use geo::{Coord, LineString, Polygon, Rect};

/// Builds the proximity cell of every seed: each point of cell `i` is at
/// least as close to `seeds[i]` as to any other seed.
///
/// Cells are bounded by a frame that covers `extent` and all seeds with a
/// generous margin, so clipping against a region inside `extent` never sees
/// the frame edges. Of several coincident seeds only the first gets a cell.
/// Returns `None` for a cell that collapsed or belongs to an earlier seed.
pub fn voronoi_cells(seeds: &[Coord<f64>], extent: Rect<f64>) -> Vec<Option<Polygon<f64>>> {
    let frame = frame_around(seeds, extent);

    seeds
        .iter()
        .enumerate()
        .map(|(i, &seed)| {
            let mut others: Vec<(f64, usize)> = seeds
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(j, &s)| (dist_sq(seed, s), j))
                .collect();
            others.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            if others.iter().any(|&(d2, j)| d2 == 0.0 && j < i) {
                return None;
            }

            let mut cell = frame.clone();
            for (d2, j) in others {
                if d2 == 0.0 {
                    continue;
                }
                // A bisector further than the farthest vertex cannot cut the cell
                let reach = cell
                    .iter()
                    .map(|&v| dist_sq(seed, v))
                    .fold(0.0f64, f64::max);
                if d2 > 4.0 * reach {
                    break;
                }
                cell = clip_to_bisector(&cell, seed, seeds[j]);
                if cell.len() < 3 {
                    break;
                }
            }

            if cell.len() < 3 {
                None
            } else {
                Some(Polygon::new(LineString::from(cell), vec![]))
            }
        })
        .collect()
}

fn frame_around(seeds: &[Coord<f64>], extent: Rect<f64>) -> Vec<Coord<f64>> {
    let (mut min_x, mut min_y) = (extent.min().x, extent.min().y);
    let (mut max_x, mut max_y) = (extent.max().x, extent.max().y);
    for s in seeds {
        min_x = min_x.min(s.x);
        min_y = min_y.min(s.y);
        max_x = max_x.max(s.x);
        max_y = max_y.max(s.y);
    }
    let span = (max_x - min_x).max(max_y - min_y);
    let pad = if span > 0.0 { span } else { 1.0 };

    vec![
        Coord { x: min_x - pad, y: min_y - pad },
        Coord { x: max_x + pad, y: min_y - pad },
        Coord { x: max_x + pad, y: max_y + pad },
        Coord { x: min_x - pad, y: max_y + pad },
    ]
}

/// Sutherland-Hodgman step: keeps the half-plane of points closer to `keep`
/// than to `other`.
fn clip_to_bisector(poly: &[Coord<f64>], keep: Coord<f64>, other: Coord<f64>) -> Vec<Coord<f64>> {
    let normal = Coord {
        x: other.x - keep.x,
        y: other.y - keep.y,
    };
    let mid = Coord {
        x: (keep.x + other.x) * 0.5,
        y: (keep.y + other.y) * 0.5,
    };
    let limit = dot(mid, normal);
    let inside = |p: Coord<f64>| dot(p, normal) <= limit;

    let mut out = Vec::with_capacity(poly.len() + 1);
    for (k, &cur) in poly.iter().enumerate() {
        let next = poly[(k + 1) % poly.len()];
        let (cur_in, next_in) = (inside(cur), inside(next));
        if cur_in {
            out.push(cur);
        }
        if cur_in != next_in {
            let denom = dot(next, normal) - dot(cur, normal);
            let t = (limit - dot(cur, normal)) / denom;
            out.push(Coord {
                x: cur.x + t * (next.x - cur.x),
                y: cur.y + t * (next.y - cur.y),
            });
        }
    }
    out
}

#[inline(always)]
fn dot(a: Coord<f64>, b: Coord<f64>) -> f64 {
    a.x * b.x + a.y * b.y
}

#[inline(always)]
fn dist_sq(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}
