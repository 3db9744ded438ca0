//! Planar geometry predicates
//!
//! Just enough computational geometry for extent post-filtering: an
//! envelope pre-check, segment crossing with orientation tests, and
//! even-odd point-in-polygon. Coordinates are taken as-is; no reprojection.

use crate::domain::feature::Position;
use crate::domain::Geometry;

type Xy = (f64, f64);
type Ring = Vec<Xy>;

/// True when the two geometries share at least one point
///
/// Boundaries count: a line touching a polygon edge intersects it.
pub fn intersects(a: &Geometry, b: &Geometry) -> bool {
    let (Some(env_a), Some(env_b)) = (a.envelope(), b.envelope()) else {
        return false;
    };
    if !env_a.intersects(&env_b) {
        return false;
    }

    let parts_a = Parts::of(a);
    let parts_b = Parts::of(b);

    // Any touching or crossing edges
    for sa in parts_a.segments() {
        for sb in parts_b.segments() {
            if segments_intersect(sa, sb) {
                return true;
            }
        }
    }

    // One geometry lying entirely inside a polygon of the other
    parts_a.vertices().any(|p| parts_b.polygon_contains(p))
        || parts_b.vertices().any(|p| parts_a.polygon_contains(p))
}

/// Geometry flattened into points, open paths and polygons
struct Parts {
    points: Vec<Xy>,
    paths: Vec<Ring>,
    polygons: Vec<Vec<Ring>>,
}

impl Parts {
    fn of(geometry: &Geometry) -> Self {
        let mut parts = Parts {
            points: Vec::new(),
            paths: Vec::new(),
            polygons: Vec::new(),
        };
        match geometry {
            Geometry::Point(p) => parts.points.extend(xy(p)),
            Geometry::MultiPoint(ps) => parts.points.extend(ps.iter().filter_map(xy)),
            Geometry::LineString(line) => parts.paths.push(ring(line)),
            Geometry::MultiLineString(lines) => parts.paths.extend(lines.iter().map(|l| ring(l))),
            Geometry::Polygon(rings) => parts.polygons.push(rings.iter().map(|r| ring(r)).collect()),
            Geometry::MultiPolygon(polys) => parts.polygons.extend(
                polys
                    .iter()
                    .map(|rings| rings.iter().map(|r| ring(r)).collect()),
            ),
        }
        parts
    }

    /// Every edge; points become zero-length segments
    fn segments(&self) -> impl Iterator<Item = (Xy, Xy)> + '_ {
        let points = self.points.iter().map(|p| (*p, *p));
        let paths = self.paths.iter().flat_map(|path| edges(path));
        let rings = self
            .polygons
            .iter()
            .flatten()
            .flat_map(|ring| edges(ring));
        points.chain(paths).chain(rings)
    }

    fn vertices(&self) -> impl Iterator<Item = Xy> + '_ {
        self.points
            .iter()
            .copied()
            .chain(self.paths.iter().flatten().copied())
            .chain(self.polygons.iter().flatten().flatten().copied())
    }

    fn polygon_contains(&self, p: Xy) -> bool {
        self.polygons.iter().any(|rings| {
            let mut rings = rings.iter();
            match rings.next() {
                Some(exterior) => {
                    ring_contains(exterior, p) && !rings.any(|hole| ring_contains(hole, p))
                }
                None => false,
            }
        })
    }
}

fn xy(p: &Position) -> Option<Xy> {
    (p.len() >= 2).then(|| (p[0], p[1]))
}

fn ring(positions: &[Position]) -> Ring {
    positions.iter().filter_map(xy).collect()
}

fn edges(path: &[Xy]) -> impl Iterator<Item = (Xy, Xy)> + '_ {
    let single = (path.len() == 1).then(|| (path[0], path[0]));
    path.windows(2).map(|w| (w[0], w[1])).chain(single)
}

/// Even-odd ray casting; points on the boundary may fall either way
fn ring_contains(ring: &[Xy], p: Xy) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > p.1) != (yj > p.1) && p.0 < (xj - xi) * (p.1 - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn orientation(a: Xy, b: Xy, c: Xy) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn on_segment(a: Xy, b: Xy, p: Xy) -> bool {
    p.0 >= a.0.min(b.0) && p.0 <= a.0.max(b.0) && p.1 >= a.1.min(b.1) && p.1 <= a.1.max(b.1)
}

fn segments_intersect((p1, p2): (Xy, Xy), (q1, q2): (Xy, Xy)) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}
