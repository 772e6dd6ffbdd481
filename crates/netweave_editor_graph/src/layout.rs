// SPDX-License-Identifier: MIT OR Apache-2.0
//! Layered auto layout along the data flow.

use std::collections::VecDeque;

/// Vertical distance between layers
pub const LAYER_SPACING: f32 = 150.0;
/// Horizontal distance between nodes of one layer
pub const NODE_SPACING: f32 = 200.0;

/// Layer of each node: the length of the longest path reaching it.
///
/// Nodes on a cycle end up one layer below everything else.
pub fn layers(count: usize, edges: &[(usize, usize)]) -> Vec<usize> {
    let mut adj = vec![Vec::new(); count];
    let mut in_degree = vec![0usize; count];
    for &(from, to) in edges {
        if from < count && to < count && from != to {
            adj[from].push(to);
            in_degree[to] += 1;
        }
    }

    let mut layer = vec![0usize; count];
    let mut placed = vec![false; count];
    let mut queue: VecDeque<usize> = (0..count).filter(|i| in_degree[*i] == 0).collect();
    while let Some(node) = queue.pop_front() {
        placed[node] = true;
        for &next in &adj[node] {
            layer[next] = layer[next].max(layer[node] + 1);
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    let below = layer
        .iter()
        .zip(&placed)
        .filter(|(_, p)| **p)
        .map(|(l, _)| l + 1)
        .max()
        .unwrap_or(0);
    for (l, p) in layer.iter_mut().zip(&placed) {
        if !*p {
            *l = below;
        }
    }
    layer
}

/// New positions for nodes at `positions` joined by `edges`.
///
/// Layers are stacked downwards from the top-left corner of the current
/// bounding box and centred on the widest layer. Within a layer nodes keep
/// their left-to-right order.
pub fn layered_positions(positions: &[[f32; 2]], edges: &[(usize, usize)]) -> Vec<[f32; 2]> {
    if positions.is_empty() {
        return Vec::new();
    }
    let layer = layers(positions.len(), edges);
    let origin = positions.iter().fold([f32::INFINITY; 2], |acc, p| {
        [acc[0].min(p[0]), acc[1].min(p[1])]
    });

    let depth = layer.iter().max().map_or(0, |l| l + 1);
    let mut rows: Vec<Vec<usize>> = vec![Vec::new(); depth];
    for (node, l) in layer.iter().enumerate() {
        rows[*l].push(node);
    }
    let widest = rows.iter().map(Vec::len).max().unwrap_or(0);

    let mut out = positions.to_vec();
    for (l, row) in rows.iter_mut().enumerate() {
        row.sort_by(|a, b| positions[*a][0].total_cmp(&positions[*b][0]));
        let indent = (widest - row.len()) as f32 * NODE_SPACING / 2.0;
        for (i, node) in row.iter().enumerate() {
            out[*node] = [
                origin[0] + indent + i as f32 * NODE_SPACING,
                origin[1] + l as f32 * LAYER_SPACING,
            ];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_path_decides_layer() {
        // 0 -> 1 -> 2 and a shortcut 0 -> 2
        assert_eq!(layers(3, &[(0, 1), (1, 2), (0, 2)]), vec![0, 1, 2]);
        assert_eq!(layers(2, &[]), vec![0, 0]);
    }

    #[test]
    fn test_cycle_goes_below() {
        // 0 -> 1, and 2 <-> 3 form a cycle
        assert_eq!(layers(4, &[(0, 1), (2, 3), (3, 2)]), vec![0, 1, 2, 2]);
    }

    #[test]
    fn test_diamond_is_centred() {
        let positions = [[50.0, 10.0], [300.0, 0.0], [100.0, 0.0], [0.0, 500.0]];
        let edges = [(0, 1), (0, 2), (1, 3), (2, 3)];
        let out = layered_positions(&positions, &edges);
        assert_eq!(out[0], [100.0, 0.0]);
        // 2 was left of 1 and stays so
        assert_eq!(out[2], [0.0, LAYER_SPACING]);
        assert_eq!(out[1], [NODE_SPACING, LAYER_SPACING]);
        assert_eq!(out[3], [100.0, 2.0 * LAYER_SPACING]);
    }
}
