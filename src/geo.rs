//! Planar helpers for the map: projection, point-in-polygon, circle rings
//! and triangulation of boundary polygons.

/// Metres per degree of latitude.
pub const METRES_PER_DEGREE: f64 = 111_320.0;

/// A `[longitude, latitude]` pair, GeoJSON order.
pub type LonLat = [f64; 2];

/// Equirectangular projection with longitude compressed by the cosine of
/// a reference latitude, so shapes near the reference keep their aspect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    cos_ref: f64,
}

impl Projection {
    pub fn new(reference_latitude: f64) -> Self {
        Projection {
            cos_ref: reference_latitude.to_radians().cos(),
        }
    }

    pub fn project(&self, [lon, lat]: LonLat) -> [f64; 2] {
        [lon * self.cos_ref, lat]
    }

    pub fn unproject(&self, [x, y]: [f64; 2]) -> LonLat {
        [x / self.cos_ref, y]
    }
}

/// Ring of `segments` points approximating a circle of `radius_m` metres.
pub fn circle_ring([lon, lat]: LonLat, radius_m: f64, segments: usize) -> Vec<LonLat> {
    let dlat = radius_m / METRES_PER_DEGREE;
    let dlon = dlat / lat.to_radians().cos().abs().max(1e-6);
    (0..segments)
        .map(|i| {
            let t = std::f64::consts::TAU * i as f64 / segments as f64;
            [lon + dlon * t.cos(), lat + dlat * t.sin()]
        })
        .collect()
}

/// Whether `point` lies inside the ellipse a circle of `radius_m` metres
/// at `center` covers on the map.
pub fn circle_contains(center: LonLat, radius_m: f64, point: LonLat) -> bool {
    if radius_m <= 0.0 {
        return false;
    }
    let dlat = radius_m / METRES_PER_DEGREE;
    let dlon = dlat / center[1].to_radians().cos().abs().max(1e-6);
    let nx = (point[0] - center[0]) / dlon;
    let ny = (point[1] - center[1]) / dlat;
    nx * nx + ny * ny <= 1.0
}

/// Even-odd point-in-polygon test against a single ring.
pub fn ring_contains(ring: &[LonLat], [x, y]: LonLat) -> bool {
    let mut inside = false;
    let mut j = ring.len().wrapping_sub(1);
    for i in 0..ring.len() {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn signed_area(ring: &[LonLat]) -> f64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let [x0, y0] = ring[i];
            let [x1, y1] = ring[(i + 1) % n];
            x0 * y1 - x1 * y0
        })
        .sum::<f64>()
        / 2.0
}

fn cross(o: LonLat, a: LonLat, b: LonLat) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

fn in_triangle(p: LonLat, a: LonLat, b: LonLat, c: LonLat) -> bool {
    cross(a, b, p) >= 0.0 && cross(b, c, p) >= 0.0 && cross(c, a, p) >= 0.0
}

/// Ear-clipping triangulation of a simple ring.  A closing point equal to
/// the first one is ignored.  Degenerate leftovers are dropped rather than
/// looping forever.
pub fn triangulate(ring: &[LonLat]) -> Vec<[LonLat; 3]> {
    let mut pts: Vec<LonLat> = ring.to_vec();
    if pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }
    if pts.len() < 3 {
        return Vec::new();
    }
    if signed_area(&pts) < 0.0 {
        pts.reverse();
    }

    let mut idx: Vec<usize> = (0..pts.len()).collect();
    let mut triangles = Vec::with_capacity(pts.len() - 2);
    let mut guard = 0;

    while idx.len() > 3 && guard < idx.len() {
        let n = idx.len();
        let mut clipped = false;
        for i in 0..n {
            let (ia, ib, ic) = (idx[(i + n - 1) % n], idx[i], idx[(i + 1) % n]);
            let (a, b, c) = (pts[ia], pts[ib], pts[ic]);
            if cross(a, b, c) <= 0.0 {
                continue;
            }
            let blocked = idx
                .iter()
                .filter(|&&k| k != ia && k != ib && k != ic)
                .any(|&k| in_triangle(pts[k], a, b, c));
            if !blocked {
                triangles.push([a, b, c]);
                idx.remove(i);
                clipped = true;
                break;
            }
        }
        if clipped {
            guard = 0;
        } else {
            guard += 1;
            // Collinear or self-touching vertex: drop it and carry on.
            idx.remove(0);
        }
    }
    if idx.len() == 3 {
        let (a, b, c) = (pts[idx[0]], pts[idx[1]], pts[idx[2]]);
        if cross(a, b, c).abs() > 0.0 {
            triangles.push([a, b, c]);
        }
    }
    triangles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(tris: &[[LonLat; 3]]) -> f64 {
        tris.iter().map(|[a, b, c]| cross(*a, *b, *c).abs() / 2.0).sum()
    }

    #[test]
    fn square_splits_into_two_triangles() {
        let ring = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]];
        let tris = triangulate(&ring);
        assert_eq!(tris.len(), 2);
        assert!((area(&tris) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn concave_ring_keeps_its_area() {
        // An "L" shape, clockwise.
        let ring = [
            [0.0, 0.0],
            [0.0, 2.0],
            [1.0, 2.0],
            [1.0, 1.0],
            [2.0, 1.0],
            [2.0, 0.0],
        ];
        let tris = triangulate(&ring);
        assert_eq!(tris.len(), 4);
        assert!((area(&tris) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn ring_contains_respects_concavity() {
        let ring = [
            [0.0, 0.0],
            [2.0, 0.0],
            [2.0, 1.0],
            [1.0, 1.0],
            [1.0, 2.0],
            [0.0, 2.0],
        ];
        assert!(ring_contains(&ring, [0.5, 1.5]));
        assert!(!ring_contains(&ring, [1.5, 1.5]));
    }

    #[test]
    fn circles_widen_in_longitude_away_from_the_equator() {
        let center = [-90.0, 60.0];
        let ring = circle_ring(center, METRES_PER_DEGREE, 4);
        assert!((ring[0][0] - (-88.0)).abs() < 1e-9);
        assert!((ring[1][1] - 61.0).abs() < 1e-9);
        assert!(circle_contains(center, METRES_PER_DEGREE, [-88.5, 60.0]));
        assert!(!circle_contains(center, METRES_PER_DEGREE, [-90.0, 61.5]));
        assert!(!circle_contains(center, 0.0, center));
    }

    #[test]
    fn projection_round_trips() {
        let p = Projection::new(60.0);
        let xy = p.project([-90.0, 38.0]);
        assert!((xy[0] + 45.0).abs() < 1e-9);
        let back = p.unproject(xy);
        assert!((back[0] + 90.0).abs() < 1e-9);
    }
}
