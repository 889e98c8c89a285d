use crate::core::models::mesh::TriangleMesh;
use nalgebra::Point3;
use std::collections::HashMap;
use tracing::debug;

type EdgeKey = (usize, usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point3<f64>>,
    pub is_closed: bool,
}

impl Contour {
    /// Segments of the contour, including the closing segment of closed contours.
    pub fn segments(&self) -> impl Iterator<Item = (&Point3<f64>, &Point3<f64>)> + '_ {
        let closing = self
            .is_closed
            .then(|| self.points.last().zip(self.points.first()))
            .flatten();
        self.points
            .windows(2)
            .map(|w| (&w[0], &w[1]))
            .chain(closing)
    }

    /// Signed area of the contour projected onto the xy-plane (shoelace formula).
    pub fn signed_area(&self) -> f64 {
        self.segments()
            .map(|(a, b)| a.x * b.y - b.x * a.y)
            .sum::<f64>()
            / 2.0
    }
}

fn edge_key(a: usize, b: usize) -> EdgeKey {
    (a.min(b), a.max(b))
}

/// Cuts `mesh` with the plane `z = plane_z`.
///
/// Each triangle straddling the plane contributes one segment whose endpoints lie on two
/// of its edges. Segments are chained through the mesh edges they share, so chaining is
/// exact for watertight meshes. Vertices lying exactly on the plane count as above it.
pub fn cross_section(mesh: &TriangleMesh, plane_z: f64) -> Vec<Contour> {
    let vertices = mesh.vertices();
    let side = |idx: usize| vertices[idx].z - plane_z >= 0.0;

    let mut crossing_points: HashMap<EdgeKey, Point3<f64>> = HashMap::new();
    let mut segments: Vec<[EdgeKey; 2]> = Vec::new();

    for face in mesh.faces() {
        let above = face.map(side);
        if above.iter().all(|&a| a) || above.iter().all(|&a| !a) {
            continue;
        }
        let mut ends = [(0, 0); 2];
        let mut found = 0;
        for e in 0..3 {
            let (a, b) = (face[e], face[(e + 1) % 3]);
            if above[e] == above[(e + 1) % 3] {
                continue;
            }
            let key = edge_key(a, b);
            crossing_points.entry(key).or_insert_with(|| {
                let (pa, pb) = (vertices[key.0], vertices[key.1]);
                let (sa, sb) = (pa.z - plane_z, pb.z - plane_z);
                let t = sa / (sa - sb);
                pa + (pb - pa) * t
            });
            ends[found] = key;
            found += 1;
        }
        segments.push(ends);
    }

    chain_segments(&segments, &crossing_points)
}

fn chain_segments(
    segments: &[[EdgeKey; 2]],
    points: &HashMap<EdgeKey, Point3<f64>>,
) -> Vec<Contour> {
    let mut incident: HashMap<EdgeKey, Vec<usize>> = HashMap::new();
    for (seg_idx, ends) in segments.iter().enumerate() {
        for key in ends {
            incident.entry(*key).or_default().push(seg_idx);
        }
    }

    let mut visited = vec![false; segments.len()];
    let mut contours = Vec::new();

    // Open chains must be walked from one of their ends, so dangling ends go first.
    let dangling_starts = segments.iter().enumerate().flat_map(|(seg_idx, ends)| {
        ends.iter()
            .filter(|key| incident[*key].len() == 1)
            .map(move |key| (seg_idx, *key))
    });
    let loop_starts = segments
        .iter()
        .enumerate()
        .map(|(seg_idx, ends)| (seg_idx, ends[0]));
    let starts: Vec<(usize, EdgeKey)> = dangling_starts.chain(loop_starts).collect();

    for (seg_idx, start_key) in starts {
        if visited[seg_idx] {
            continue;
        }
        let mut contour_keys = vec![start_key];
        let mut current_seg = seg_idx;
        let mut current_key = start_key;
        let is_closed = loop {
            visited[current_seg] = true;
            let [a, b] = segments[current_seg];
            let next_key = if a == current_key { b } else { a };
            if next_key == start_key {
                break true;
            }
            contour_keys.push(next_key);
            let next_seg = incident[&next_key]
                .iter()
                .copied()
                .find(|&s| !visited[s]);
            match next_seg {
                Some(s) => {
                    current_seg = s;
                    current_key = next_key;
                }
                None => break false,
            }
        };

        if !is_closed {
            debug!(
                points = contour_keys.len(),
                "Cross-section produced an open contour; the mesh is not watertight."
            );
        }
        contours.push(Contour {
            points: contour_keys.iter().map(|key| points[key]).collect(),
            is_closed,
        });
    }
    contours
}
