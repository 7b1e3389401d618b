use crate::cell::TileCell;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("local tile ({x}, {z}) is outside a {size}x{size} grid")]
    OutOfBounds { x: usize, z: usize, size: usize },
}

/// Square grid of tile slots, row-major by `z`. A `None` slot holds a cell that
/// failed validation; the mesher skips it and neighbors treat it as empty.
///
/// The size is fixed at construction; resizing means building a new grid.
#[derive(Clone, Debug, PartialEq)]
pub struct TileGrid {
    size: usize,
    cells: Vec<Option<TileCell>>,
}

impl TileGrid {
    /// Grid of `size * size` empty slots.
    pub fn empty(size: usize) -> Self {
        Self {
            size,
            cells: vec![None; size * size],
        }
    }

    /// Builds a grid from row-major slots, padding or truncating to `size * size`.
    pub fn from_slots(size: usize, slots: Vec<Option<TileCell>>) -> Self {
        let mut cells = slots;
        let expect = size * size;
        if cells.len() != expect {
            cells.resize(expect, None);
        }
        Self { size, cells }
    }

    /// Grid where every slot holds a clone of `cell`.
    pub fn filled(size: usize, cell: TileCell) -> Self {
        Self {
            size,
            cells: vec![Some(cell); size * size],
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn idx(&self, x: usize, z: usize) -> usize {
        z * self.size + x
    }

    #[inline]
    pub fn contains_local(&self, x: i32, z: i32) -> bool {
        x >= 0 && z >= 0 && (x as usize) < self.size && (z as usize) < self.size
    }

    #[inline]
    pub fn get(&self, x: usize, z: usize) -> Option<&TileCell> {
        if x >= self.size || z >= self.size {
            return None;
        }
        self.cells[self.idx(x, z)].as_ref()
    }

    /// Signed lookup; anything outside the grid is `None`.
    #[inline]
    pub fn get_signed(&self, x: i32, z: i32) -> Option<&TileCell> {
        if !self.contains_local(x, z) {
            return None;
        }
        self.get(x as usize, z as usize)
    }

    /// Replaces one slot wholesale and returns the previous cell.
    pub fn replace(&mut self, x: usize, z: usize, cell: TileCell) -> Result<Option<TileCell>, GridError> {
        if x >= self.size || z >= self.size {
            return Err(GridError::OutOfBounds {
                x,
                z,
                size: self.size,
            });
        }
        let i = self.idx(x, z);
        Ok(self.cells[i].replace(cell))
    }

    /// Iterates `(x, z, slot)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, Option<&TileCell>)> + '_ {
        let size = self.size;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, c)| (i % size, i / size, c.as_ref()))
    }

    #[inline]
    pub fn valid_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}
