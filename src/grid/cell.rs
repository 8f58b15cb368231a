use std::fmt;

/// Persistent identity of a star. Assigned once, kept across cell migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StarId(pub u32);

impl fmt::Display for StarId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "star#{}", self.0)
    }
}

/// Which of its cell's four edges a star crossed during the last integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct CrossingFlags(u8);

impl CrossingFlags {
    pub const LO_X: CrossingFlags = CrossingFlags(1 << 0);
    pub const HI_X: CrossingFlags = CrossingFlags(1 << 1);
    pub const LO_Y: CrossingFlags = CrossingFlags(1 << 2);
    pub const HI_Y: CrossingFlags = CrossingFlags(1 << 3);

    pub const fn empty() -> Self {
        CrossingFlags(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: CrossingFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: CrossingFlags) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for CrossingFlags {
    type Output = CrossingFlags;

    fn bitor(self, rhs: CrossingFlags) -> CrossingFlags {
        CrossingFlags(self.0 | rhs.0)
    }
}

/// Per-star status: the crossing flags of the current step and the star's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarStatus {
    pub crossing: CrossingFlags,
    pub id: StarId,
}

impl StarStatus {
    pub fn new(id: StarId) -> Self {
        Self { crossing: CrossingFlags::empty(), id }
    }
}

/// An axis-aligned square region: `x[0]..=x[1]` by `y[0]..=y[1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBounds {
    pub x: [f32; 2],
    pub y: [f32; 2],
}

impl CellBounds {
    pub fn center(&self) -> (f32, f32) {
        ((self.x[0] + self.x[1]) / 2.0, (self.y[0] + self.y[1]) / 2.0)
    }

    /// True if `(px, py)` lies inside the bounds widened by `eps` on every side.
    pub fn contains(&self, px: f32, py: f32, eps: f32) -> bool {
        px >= self.x[0] - eps && px <= self.x[1] + eps && py >= self.y[0] - eps && py <= self.y[1] + eps
    }

    /// The edges that a star moving to `(qx, qy)` has crossed.
    pub fn crossing_of(&self, qx: f32, qy: f32) -> CrossingFlags {
        let mut flags = CrossingFlags::empty();
        if qx < self.x[0] {
            flags.insert(CrossingFlags::LO_X);
        }
        if qx > self.x[1] {
            flags.insert(CrossingFlags::HI_X);
        }
        if qy < self.y[0] {
            flags.insert(CrossingFlags::LO_Y);
        }
        if qy > self.y[1] {
            flags.insert(CrossingFlags::HI_Y);
        }
        flags
    }
}

/// A star copied out of its cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StarRecord {
    pub px: f32,
    pub py: f32,
    pub vx: f32,
    pub vy: f32,
    pub id: StarId,
}

/// One grid cell: fixed bounds and the stars currently inside it, stored as
/// parallel arrays so force loops stream over positions.
#[derive(Debug, Clone)]
pub struct Cell {
    pub bounds: CellBounds,
    pub px: Vec<f32>,
    pub py: Vec<f32>,
    pub vx: Vec<f32>,
    pub vy: Vec<f32>,
    pub status: Vec<StarStatus>,
    center_of_mass: (f32, f32),
    extent: CellBounds,
}

impl Cell {
    pub fn new(bounds: CellBounds, capacity: usize) -> Self {
        let center = bounds.center();
        Self {
            bounds,
            px: Vec::with_capacity(capacity),
            py: Vec::with_capacity(capacity),
            vx: Vec::with_capacity(capacity),
            vy: Vec::with_capacity(capacity),
            status: Vec::with_capacity(capacity),
            center_of_mass: center,
            extent: CellBounds { x: [center.0; 2], y: [center.1; 2] },
        }
    }

    pub fn len(&self) -> usize {
        self.px.len()
    }

    pub fn is_empty(&self) -> bool {
        self.px.is_empty()
    }

    /// Appends a star and returns its index. Capacity is enforced by the grid.
    pub(crate) fn push(&mut self, px: f32, py: f32, vx: f32, vy: f32, id: StarId) -> usize {
        self.px.push(px);
        self.py.push(py);
        self.vx.push(vx);
        self.vy.push(vy);
        self.status.push(StarStatus::new(id));
        self.px.len() - 1
    }

    /// Removes star `i` by moving the last star into its slot.
    pub(crate) fn swap_remove(&mut self, i: usize) -> StarRecord {
        StarRecord {
            px: self.px.swap_remove(i),
            py: self.py.swap_remove(i),
            vx: self.vx.swap_remove(i),
            vy: self.vy.swap_remove(i),
            id: self.status.swap_remove(i).id,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.px.clear();
        self.py.clear();
        self.vx.clear();
        self.vy.clear();
        self.status.clear();
    }

    pub fn star(&self, i: usize) -> Option<StarRecord> {
        Some(StarRecord {
            px: *self.px.get(i)?,
            py: *self.py.get(i)?,
            vx: *self.vx.get(i)?,
            vy: *self.vy.get(i)?,
            id: self.status.get(i)?.id,
        })
    }

    /// Mean star position, or the middle of the cell when it is empty.
    pub fn mean_position(&self) -> (f32, f32) {
        let cnt = self.len();
        if cnt == 0 {
            return self.bounds.center();
        }
        let sx: f32 = self.px.iter().sum();
        let sy: f32 = self.py.iter().sum();
        let scl = 1.0 / cnt as f32;
        (sx * scl, sy * scl)
    }

    /// Cached center of mass, as of the last [`Cell::update_center_of_mass`].
    pub fn center_of_mass(&self) -> (f32, f32) {
        self.center_of_mass
    }

    /// Smallest box around the stars, as of the last update. Collapses to the
    /// center of mass for an empty cell.
    pub fn extent(&self) -> CellBounds {
        self.extent
    }

    pub fn update_center_of_mass(&mut self) {
        self.center_of_mass = self.mean_position();
        let (cx, cy) = self.center_of_mass;
        let mut extent = CellBounds { x: [cx; 2], y: [cy; 2] };
        if let (Some(&x0), Some(&y0)) = (self.px.first(), self.py.first()) {
            extent = CellBounds { x: [x0; 2], y: [y0; 2] };
            for (&x, &y) in self.px.iter().zip(&self.py) {
                extent.x[0] = extent.x[0].min(x);
                extent.x[1] = extent.x[1].max(x);
                extent.y[0] = extent.y[0].min(y);
                extent.y[1] = extent.y[1].max(y);
            }
        }
        self.extent = extent;
    }

    pub fn has_crossings(&self) -> bool {
        self.status.iter().any(|s| !s.crossing.is_empty())
    }
}
