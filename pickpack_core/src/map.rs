use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::Position;

/// Represents errors that can occur within the grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Coordinates ({x}, {y}) are out of bounds for grid size ({width}, {height})")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
}

/// A generic 2D grid structure.
///
/// Stores elements of type `T` in a flat vector using row-major order and
/// is addressed by [`Position`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid with the specified dimensions, filled with default values.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn new(width: usize, height: usize) -> Self
    where
        T: Default + Clone,
    {
        let size = width.checked_mul(height).expect("Grid size overflow");
        Grid {
            width,
            height,
            cells: vec![T::default(); size],
        }
    }

    /// Creates a new grid whose cells are produced by `f(position)`.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn from_generator<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(Position) -> T,
    {
        let size = width.checked_mul(height).expect("Grid size overflow");
        let mut cells = Vec::with_capacity(size);
        for y in 0..height {
            for x in 0..width {
                cells.push(f(Position { x, y }));
            }
        }
        Grid {
            width,
            height,
            cells,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn index_of(&self, pos: Position) -> Option<usize> {
        if self.contains(pos) {
            Some(pos.y * self.width + pos.x)
        } else {
            None
        }
    }

    /// Checks if the position lies within the grid boundaries.
    #[inline]
    pub fn contains(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    /// Returns `None` if the position is out of bounds.
    pub fn get(&self, pos: Position) -> Option<&T> {
        self.index_of(pos).map(|index| &self.cells[index])
    }

    /// Returns `None` if the position is out of bounds.
    pub fn get_mut(&mut self, pos: Position) -> Option<&mut T> {
        self.index_of(pos).map(|index| &mut self.cells[index])
    }

    /// Sets the value of the cell at the given position.
    pub fn set(&mut self, pos: Position, value: T) -> Result<(), GridError> {
        let index = self.index_of(pos).ok_or(GridError::OutOfBounds {
            x: pos.x,
            y: pos.y,
            width: self.width,
            height: self.height,
        })?;
        self.cells[index] = value;
        Ok(())
    }

    /// Returns an iterator that yields `(position, &T)` in row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = (Position, &T)> {
        let width = self.width;
        self.cells.iter().enumerate().map(move |(index, cell)| {
            (
                Position {
                    x: index % width,
                    y: index / width,
                },
                cell,
            )
        })
    }

    /// Iterates one row of the grid, left to right.
    pub fn row(&self, y: usize) -> impl Iterator<Item = &T> {
        let start = (y * self.width).min(self.cells.len());
        let end = ((y + 1) * self.width).min(self.cells.len());
        self.cells[start..end].iter()
    }
}

impl<T> Index<Position> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, pos: Position) -> &Self::Output {
        match self.index_of(pos) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                pos.x, pos.y, self.width, self.height
            ),
        }
    }
}

impl<T> IndexMut<Position> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, pos: Position) -> &mut Self::Output {
        let (width, height) = (self.width, self.height);
        match self.index_of(pos) {
            Some(idx) => &mut self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                pos.x, pos.y, width, height
            ),
        }
    }
}

/// Static terrain of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tile {
    #[default]
    Empty,
    Wall,
}

/// The fixed terrain layer of a world.
///
/// Walls are placed while the world is being set up; gameplay never changes
/// the terrain, which lets cloned worlds share it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticMap {
    tiles: Grid<Tile>,
}

impl StaticMap {
    /// An all-empty map.
    pub fn new(width: usize, height: usize) -> Self {
        StaticMap {
            tiles: Grid::new(width, height),
        }
    }

    pub fn width(&self) -> usize {
        self.tiles.width()
    }

    pub fn height(&self) -> usize {
        self.tiles.height()
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.tiles.contains(pos)
    }

    /// The tile at `pos`, or `None` outside the map.
    pub fn tile_at(&self, pos: Position) -> Option<Tile> {
        self.tiles.get(pos).copied()
    }

    /// In bounds and not a wall.
    pub fn is_open(&self, pos: Position) -> bool {
        self.tile_at(pos) == Some(Tile::Empty)
    }

    pub fn set_tile(&mut self, pos: Position, tile: Tile) -> Result<(), GridError> {
        self.tiles.set(pos, tile)
    }

    pub fn tiles(&self) -> &Grid<Tile> {
        &self.tiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_map_is_empty() {
        let map = StaticMap::new(3, 2);
        assert_eq!(map.width(), 3);
        assert_eq!(map.height(), 2);
        assert!(map.tiles().enumerate().all(|(_, tile)| *tile == Tile::Empty));
        assert_eq!(map.tile_at(Position::new(3, 0)), None);
    }

    #[test]
    fn set_tile_out_of_bounds_is_an_error() {
        let mut map = StaticMap::new(2, 2);
        map.set_tile(Position::new(1, 1), Tile::Wall).unwrap();
        assert!(!map.is_open(Position::new(1, 1)));
        assert_eq!(
            map.set_tile(Position::new(2, 0), Tile::Wall),
            Err(GridError::OutOfBounds {
                x: 2,
                y: 0,
                width: 2,
                height: 2
            })
        );
    }

    #[test]
    fn enumerate_is_row_major() {
        let grid = Grid::from_generator(2, 2, |pos| pos.x + 10 * pos.y);
        let cells: Vec<_> = grid.enumerate().map(|(pos, v)| (pos, *v)).collect();
        assert_eq!(cells[1], (Position::new(1, 0), 1));
        assert_eq!(cells[2], (Position::new(0, 1), 10));
        assert_eq!(grid.row(1).copied().collect::<Vec<_>>(), vec![10, 11]);
    }
}
