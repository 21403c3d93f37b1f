//! Maximally stable extremal regions.
//!
//! The component tree of the image is built with a union-find pass over the
//! pixels sorted by intensity (4-connectivity). Every node is a connected
//! region that exists unchanged between its own level and its parent's level.
//! A node is stable when its growth rate over `delta` gray levels is a local
//! minimum along the tree and below `max_variation`; near-duplicate nested
//! regions are thinned by `min_diversity`.

use crate::processors::geometry::Rect;
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// MSER parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MserParams {
    /// Intensity step used to measure region growth.
    pub delta: u8,
    /// Smallest region area in pixels.
    pub min_area: usize,
    /// Largest region area in pixels.
    pub max_area: usize,
    /// Largest accepted relative growth over `delta` levels.
    pub max_variation: f32,
    /// Nested stable regions closer in area than this ratio are collapsed.
    pub min_diversity: f32,
}

impl Default for MserParams {
    fn default() -> Self {
        Self {
            delta: 5,
            min_area: 60,
            max_area: 14400,
            max_variation: 0.25,
            min_diversity: 0.2,
        }
    }
}

crate::impl_config_validator!(MserParams {
    delta: min(1),
    min_area: min(1),
    max_variation: positive,
    min_diversity: range(0.0, 1.0),
});

/// A detected region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MserRegion {
    /// Bounding rectangle of the region pixels.
    pub bbox: Rect,
    /// Number of pixels.
    pub area: usize,
    /// Gray level at which the region appears.
    pub level: u8,
}

#[derive(Debug, Clone)]
struct Node {
    level: u8,
    area: usize,
    parent: Option<usize>,
    merged_into: Option<usize>,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl Node {
    fn new(level: u8, x: u32, y: u32) -> Self {
        Self {
            level,
            area: 1,
            parent: None,
            merged_into: None,
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn add_pixel(&mut self, x: u32, y: u32) {
        self.area += 1;
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    fn absorb(&mut self, other: &Node) {
        self.area += other.area;
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    fn bbox(&self) -> Rect {
        Rect::from_edges(
            self.min_x as i32,
            self.min_y as i32,
            self.max_x as i32 + 1,
            self.max_y as i32 + 1,
        )
    }
}

struct DisjointSet {
    parent: Vec<u32>,
    size: Vec<u32>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n as u32).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            let grandparent = self.parent[self.parent[x as usize] as usize];
            self.parent[x as usize] = grandparent;
            x = grandparent;
        }
        x
    }

    /// Joins two roots and returns the surviving root.
    fn union_roots(&mut self, a: u32, b: u32) -> u32 {
        let (big, small) = if self.size[a as usize] >= self.size[b as usize] {
            (a, b)
        } else {
            (b, a)
        };
        self.parent[small as usize] = big;
        self.size[big as usize] += self.size[small as usize];
        big
    }
}

/// Builds the component tree of dark-to-bright flooding.
fn build_component_tree(image: &GrayImage) -> Vec<Node> {
    let (width, height) = image.dimensions();
    let n = (width as usize) * (height as usize);
    let raw = image.as_raw();

    // Counting sort by intensity.
    let mut histogram = [0usize; 256];
    for &v in raw.iter() {
        histogram[v as usize] += 1;
    }
    let mut offsets = [0usize; 256];
    for level in 1..256 {
        offsets[level] = offsets[level - 1] + histogram[level - 1];
    }
    let mut order = vec![0u32; n];
    for (i, &v) in raw.iter().enumerate() {
        order[offsets[v as usize]] = i as u32;
        offsets[v as usize] += 1;
    }

    let mut sets = DisjointSet::new(n);
    let mut active = vec![false; n];
    let mut component = vec![usize::MAX; n];
    let mut nodes: Vec<Node> = Vec::new();

    for &p in &order {
        let idx = p as usize;
        let level = raw[idx];
        let x = p % width;
        let y = p / width;
        active[idx] = true;

        let mut current: Option<usize> = None;
        let mut root = p;

        let neighbors = [
            (x > 0).then(|| p - 1),
            (x + 1 < width).then(|| p + 1),
            (y > 0).then(|| p - width),
            (y + 1 < height).then(|| p + width),
        ];

        for q in neighbors.into_iter().flatten() {
            if !active[q as usize] {
                continue;
            }
            let q_root = sets.find(q);
            if q_root == root {
                continue;
            }
            let q_node = component[q_root as usize];

            let node = match current {
                None if nodes[q_node].level == level => {
                    nodes[q_node].add_pixel(x, y);
                    q_node
                }
                None => {
                    let mut fresh = Node::new(level, x, y);
                    fresh.absorb(&nodes[q_node]);
                    nodes.push(fresh);
                    let id = nodes.len() - 1;
                    nodes[q_node].parent = Some(id);
                    id
                }
                Some(node) if nodes[q_node].level < level => {
                    let child = nodes[q_node].clone();
                    nodes[node].absorb(&child);
                    nodes[q_node].parent = Some(node);
                    node
                }
                Some(node) => {
                    let twin = nodes[q_node].clone();
                    nodes[node].absorb(&twin);
                    nodes[q_node].merged_into = Some(node);
                    node
                }
            };

            root = sets.union_roots(root, q_root);
            component[root as usize] = node;
            current = Some(node);
        }

        if current.is_none() {
            nodes.push(Node::new(level, x, y));
            component[root as usize] = nodes.len() - 1;
        }
    }

    // Resolve parents that point at nodes later merged into a sibling.
    let resolve = |nodes: &[Node], mut id: usize| {
        while let Some(next) = nodes[id].merged_into {
            id = next;
        }
        id
    };
    for id in 0..nodes.len() {
        if let Some(parent) = nodes[id].parent {
            let resolved = resolve(&nodes, parent);
            nodes[id].parent = Some(resolved);
        }
    }

    nodes
}

/// Growth of `id` over `delta` levels: `(|R(g + delta)| - |R(g)|) / |R(g)|`.
fn variation(nodes: &[Node], id: usize, delta: u8) -> f32 {
    let target = nodes[id].level as u16 + delta as u16;
    let mut top = id;
    while let Some(parent) = nodes[top].parent {
        if nodes[parent].level as u16 > target {
            break;
        }
        top = parent;
    }
    (nodes[top].area - nodes[id].area) as f32 / nodes[id].area as f32
}

/// Detects dark-on-bright maximally stable regions.
///
/// Run on an inverted image to find bright-on-dark regions.
pub fn detect_regions(image: &GrayImage, params: &MserParams) -> Vec<MserRegion> {
    if image.width() == 0 || image.height() == 0 {
        return Vec::new();
    }

    let nodes = build_component_tree(image);
    let live: Vec<usize> = (0..nodes.len())
        .filter(|&id| nodes[id].merged_into.is_none())
        .collect();

    let mut variations = vec![f32::INFINITY; nodes.len()];
    for &id in &live {
        variations[id] = variation(&nodes, id, params.delta);
    }

    // A node is a local minimum when no neighbor in the tree grows slower.
    // The root spans the whole image and is never reported.
    let mut stable = vec![false; nodes.len()];
    for &id in &live {
        let area = nodes[id].area;
        stable[id] = area >= params.min_area
            && area <= params.max_area
            && variations[id] < params.max_variation
            && nodes[id]
                .parent
                .is_some_and(|parent| variations[id] <= variations[parent]);
    }
    for &id in &live {
        match nodes[id].parent {
            Some(parent) if variations[parent] > variations[id] => stable[parent] = false,
            _ => {}
        }
    }

    let mut keep = stable.clone();
    for &id in &live {
        if !stable[id] {
            continue;
        }
        let mut ancestor = nodes[id].parent;
        while let Some(a) = ancestor {
            if stable[a] {
                let diversity = (nodes[a].area - nodes[id].area) as f32 / nodes[a].area as f32;
                if diversity < params.min_diversity {
                    if variations[id] <= variations[a] {
                        keep[a] = false;
                    } else {
                        keep[id] = false;
                    }
                }
                break;
            }
            ancestor = nodes[a].parent;
        }
    }

    live.into_iter()
        .filter(|&id| keep[id])
        .map(|id| MserRegion {
            bbox: nodes[id].bbox(),
            area: nodes[id].area,
            level: nodes[id].level,
        })
        .collect()
}

/// Detects regions of both polarities.
pub fn detect_regions_both(image: &GrayImage, params: &MserParams) -> Vec<MserRegion> {
    let mut inverted = image.clone();
    image::imageops::invert(&mut inverted);

    let mut regions = detect_regions(image, params);
    regions.extend(detect_regions(&inverted, params));
    regions
}
