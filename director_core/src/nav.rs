//! Navigation query surface. The graph is owned elsewhere; this core only
//! asks it questions through [`NavQuery`].

use std::sync::Arc;

use bevy::{math::Vec3, prelude::Resource};

/// Opaque graph node handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NavNodeId(pub u32);

/// Result of an open-area search.
#[derive(Debug, Clone, Copy)]
pub struct OpenArea {
    pub node: NavNodeId,
    pub position: Vec3,
    /// Reachable-node count within the search horizon.
    pub area_score: u32,
}

/// Synchronous, side-effect-free queries against the navigation graph and
/// world geometry.
pub trait NavQuery: Send + Sync {
    fn node_count(&self) -> u32;
    fn node_position(&self, node: NavNodeId) -> Option<Vec3>;
    fn neighbors(&self, node: NavNodeId) -> Vec<NavNodeId>;
    /// Closest node to `position`, if any lies within `radius`.
    fn nearest_node(&self, position: Vec3, radius: f32) -> Option<NavNodeId>;
    /// True when walkable ground exists within `vertical_extent` of the point.
    fn has_ground(&self, position: Vec3, vertical_extent: f32) -> bool;
    /// True when a hull of the given radius fits at the point.
    fn hull_fits(&self, position: Vec3, hull_radius: f32) -> bool;
    /// True when nothing solid blocks the segment between the two points.
    fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool;
}

/// Shared handle to whatever navigation service the host wired in.
#[derive(Resource, Clone)]
pub struct NavService(Arc<dyn NavQuery>);

impl NavService {
    pub fn new(query: Arc<dyn NavQuery>) -> Self {
        Self(query)
    }

    pub fn query(&self) -> &dyn NavQuery {
        self.0.as_ref()
    }
}

/// Flat grid navmesh: one node per open cell, 4-connected, solid cells
/// occlude line of sight. Used by tests and the headless runner.
pub struct GridNavMesh {
    width: u32,
    height: u32,
    cell_size: f32,
    blocked: Vec<bool>,
}

impl GridNavMesh {
    pub fn new(width: u32, height: u32, cell_size: f32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            cell_size: cell_size.max(0.1),
            blocked: vec![false; (width.max(1) * height.max(1)) as usize],
        }
    }

    /// Parse a map sketch: `#` solid, anything else open. Rows may be ragged;
    /// short rows pad with open cells.
    pub fn from_ascii(rows: &[&str], cell_size: f32) -> Self {
        let height = rows.len().max(1) as u32;
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(1).max(1) as u32;
        let mut mesh = Self::new(width, height, cell_size);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                if ch == '#' {
                    mesh.set_blocked(x as u32, y as u32, true);
                }
            }
        }
        mesh
    }

    /// Bordered arena with a central pillar block.
    pub fn arena(width: u32, height: u32, cell_size: f32) -> Self {
        let mut mesh = Self::new(width, height, cell_size);
        for x in 0..width {
            mesh.set_blocked(x, 0, true);
            mesh.set_blocked(x, height.saturating_sub(1), true);
        }
        for y in 0..height {
            mesh.set_blocked(0, y, true);
            mesh.set_blocked(width.saturating_sub(1), y, true);
        }
        let (cx, cy) = (width / 2, height / 2);
        for dx in 0..(width / 8).max(1) {
            for dy in 0..(height / 8).max(1) {
                mesh.set_blocked(cx + dx, cy + dy, true);
            }
        }
        mesh
    }

    pub fn set_blocked(&mut self, x: u32, y: u32, blocked: bool) {
        if x < self.width && y < self.height {
            self.blocked[(y * self.width + x) as usize] = blocked;
        }
    }

    fn cell_open(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return false;
        }
        !self.blocked[(y as u32 * self.width + x as u32) as usize]
    }

    fn cell_of(&self, position: Vec3) -> (i64, i64) {
        (
            (position.x / self.cell_size).floor() as i64,
            (position.z / self.cell_size).floor() as i64,
        )
    }

    fn center_of(&self, x: u32, y: u32) -> Vec3 {
        Vec3::new(
            (x as f32 + 0.5) * self.cell_size,
            0.0,
            (y as f32 + 0.5) * self.cell_size,
        )
    }
}

impl NavQuery for GridNavMesh {
    fn node_count(&self) -> u32 {
        self.width * self.height
    }

    fn node_position(&self, node: NavNodeId) -> Option<Vec3> {
        let x = node.0 % self.width;
        let y = node.0 / self.width;
        if y >= self.height || self.blocked[node.0 as usize] {
            return None;
        }
        Some(self.center_of(x, y))
    }

    fn neighbors(&self, node: NavNodeId) -> Vec<NavNodeId> {
        let x = (node.0 % self.width) as i64;
        let y = (node.0 / self.width) as i64;
        [(1, 0), (-1, 0), (0, 1), (0, -1)]
            .into_iter()
            .filter(|(dx, dy)| self.cell_open(x + dx, y + dy))
            .map(|(dx, dy)| NavNodeId(((y + dy) as u32 * self.width) + (x + dx) as u32))
            .collect()
    }

    fn nearest_node(&self, position: Vec3, radius: f32) -> Option<NavNodeId> {
        let (cx, cy) = self.cell_of(position);
        let span = (radius / self.cell_size).ceil() as i64;
        let mut best: Option<(f32, NavNodeId)> = None;
        for y in (cy - span)..=(cy + span) {
            for x in (cx - span)..=(cx + span) {
                if !self.cell_open(x, y) {
                    continue;
                }
                let center = self.center_of(x as u32, y as u32);
                let dist = center.distance(position);
                if dist > radius {
                    continue;
                }
                if best.map(|(d, _)| dist < d).unwrap_or(true) {
                    best = Some((dist, NavNodeId(y as u32 * self.width + x as u32)));
                }
            }
        }
        best.map(|(_, node)| node)
    }

    fn has_ground(&self, position: Vec3, _vertical_extent: f32) -> bool {
        let (x, y) = self.cell_of(position);
        self.cell_open(x, y)
    }

    fn hull_fits(&self, position: Vec3, hull_radius: f32) -> bool {
        let (cx, cy) = self.cell_of(position);
        let span = (hull_radius / self.cell_size).ceil() as i64;
        for y in (cy - span)..=(cy + span) {
            for x in (cx - span)..=(cx + span) {
                let center = Vec3::new(
                    (x as f32 + 0.5) * self.cell_size,
                    0.0,
                    (y as f32 + 0.5) * self.cell_size,
                );
                if center.distance(position) <= hull_radius && !self.cell_open(x, y) {
                    return false;
                }
            }
        }
        self.cell_open(cx, cy)
    }

    fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool {
        let (x0, y0) = self.cell_of(from);
        let (x1, y1) = self.cell_of(to);
        let (mut x, mut y) = (x0, y0);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            if !self.cell_open(x, y) {
                return false;
            }
            if x == x1 && y == y1 {
                return true;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_room() -> GridNavMesh {
        GridNavMesh::from_ascii(
            &[
                "##########",
                "#........#",
                "#........#",
                "#...##...#",
                "#...##...#",
                "#........#",
                "#........#",
                "##########",
            ],
            1.0,
        )
    }

    #[test]
    fn nearest_node_skips_solid_cells() {
        let mesh = open_room();
        let node = mesh.nearest_node(Vec3::new(4.5, 0.0, 3.5), 3.0);
        let pos = mesh.node_position(node.unwrap()).unwrap();
        assert!(mesh.has_ground(pos, 1.0));
    }

    #[test]
    fn neighbors_are_open_and_adjacent() {
        let mesh = open_room();
        let node = mesh.nearest_node(Vec3::new(1.5, 0.0, 1.5), 1.0).unwrap();
        let origin = mesh.node_position(node).unwrap();
        for neighbor in mesh.neighbors(node) {
            let pos = mesh.node_position(neighbor).unwrap();
            assert!((pos.distance(origin) - 1.0).abs() < 0.01);
        }
    }

    #[test]
    fn pillar_blocks_line_of_sight() {
        let mesh = open_room();
        let left = Vec3::new(1.5, 0.0, 3.5);
        let right = Vec3::new(8.5, 0.0, 3.5);
        assert!(!mesh.line_of_sight(left, right));

        let high = Vec3::new(8.5, 0.0, 1.5);
        assert!(mesh.line_of_sight(Vec3::new(1.5, 0.0, 1.5), high));
    }

    #[test]
    fn wide_hull_rejected_near_walls() {
        let mesh = open_room();
        let near_wall = Vec3::new(1.5, 0.0, 1.5);
        assert!(mesh.hull_fits(near_wall, 0.4));
        assert!(!mesh.hull_fits(near_wall, 1.5));
    }
}
