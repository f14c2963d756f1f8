//! Ring-buffered terrain grid

use crate::cell::Cell;
use crate::slice::fill_row;
use glam::Vec3;
use rubble_core::{Result, RubbleError, SimRng, WorkerPool};
use rubble_instance::InstanceBufferManager;
use serde::Serialize;

/// Rows recomputed per parallel job
const ROWS_PER_JOB: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerrainConfig {
    pub cols: usize,
    pub rows: usize,
    /// Rows scrolled per second
    pub scroll_speed: f32,
    /// Radians per second of the idle height animation
    pub phase_speed: f32,
    pub seed: u32,
    /// Fixed height for every cell instead of the random profile
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flat_height: Option<f32>,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            cols: 30,
            rows: 100,
            scroll_speed: 3.0,
            phase_speed: 1.0,
            seed: 0x2211_2003,
            flat_height: None,
        }
    }
}

/// Read-only view of the grid used by collision queries.
///
/// Holds the ring state as it was when the view was taken, so a view and the
/// cell indices it hands out stay consistent with each other.
#[derive(Clone, Copy)]
pub struct TerrainView<'a> {
    cells: &'a [Cell],
    cols: usize,
    rows: usize,
    ring_offset: usize,
    scroll_phase: f32,
}

impl<'a> TerrainView<'a> {
    pub fn cell_index_for_position(&self, pos: Vec3) -> Option<usize> {
        cell_index(pos, self.cols, self.rows, self.ring_offset, self.scroll_phase)
    }

    pub fn cell(&self, index: usize) -> Option<&'a Cell> {
        self.cells.get(index)
    }

    pub fn scroll_phase(&self) -> f32 {
        self.scroll_phase
    }
}

/// Scrolling grid of `cols x rows` cells stored as a ring of rows.
///
/// Logical row 0 is nearest the viewer. Advancing the ring overwrites the
/// oldest physical row, which becomes logical row `rows - 1`.
pub struct TerrainGrid {
    config: TerrainConfig,
    cells: Vec<Cell>,
    /// Total rows injected so far; also the serial of the newest row
    injected: u64,
    scroll_phase: f32,
    pending_pulses: Vec<usize>,
    rng: SimRng,
}

impl TerrainGrid {
    /// Build the grid and fill every row, so no cell is ever read unwritten
    pub fn new(config: TerrainConfig) -> Result<Self> {
        if config.cols == 0 || config.rows == 0 {
            return Err(RubbleError::InvalidConfig(format!(
                "terrain grid {}x{} has no cells",
                config.cols, config.rows
            )));
        }

        let Some(cell_count) = config.cols.checked_mul(config.rows) else {
            return Err(RubbleError::InvalidConfig(format!(
                "terrain grid {}x{} is too large",
                config.cols, config.rows
            )));
        };

        let mut grid = Self {
            cells: vec![Cell::default(); cell_count],
            injected: 0,
            scroll_phase: 0.0,
            pending_pulses: Vec::new(),
            rng: SimRng::new(config.seed),
            config,
        };
        for _ in 0..grid.config.rows {
            grid.inject_row();
        }
        log::info!(
            "[terrain] {}x{} grid ready ({} cells)",
            grid.config.cols,
            grid.config.rows,
            grid.cells.len()
        );
        Ok(grid)
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn cols(&self) -> usize {
        self.config.cols
    }

    pub fn rows(&self) -> usize {
        self.config.rows
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Physical row currently shown as logical row 0
    pub fn ring_offset(&self) -> usize {
        (self.injected % self.config.rows as u64) as usize
    }

    /// Fractional scroll in `[0, 1)` rows
    pub fn scroll_phase(&self) -> f32 {
        self.scroll_phase
    }

    pub fn rows_injected(&self) -> u64 {
        self.injected
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn cell_mut(&mut self, index: usize) -> Option<&mut Cell> {
        self.cells.get_mut(index)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn view(&self) -> TerrainView<'_> {
        TerrainView {
            cells: &self.cells,
            cols: self.config.cols,
            rows: self.config.rows,
            ring_offset: self.ring_offset(),
            scroll_phase: self.scroll_phase,
        }
    }

    pub fn cell_index_for_position(&self, pos: Vec3) -> Option<usize> {
        cell_index(
            pos,
            self.config.cols,
            self.config.rows,
            self.ring_offset(),
            self.scroll_phase,
        )
    }

    /// Advance the ring by one row and generate the new far row
    pub fn inject_row(&mut self) {
        self.injected += 1;
        let rows = self.config.rows as u64;
        let physical = ((self.injected + rows - 1) % rows) as usize;
        let cols = self.config.cols;
        let row = &mut self.cells[physical * cols..(physical + 1) * cols];
        fill_row(row, self.injected, &mut self.rng, self.config.flat_height);
    }

    /// Queue a magnet pulse on every cell crossed moving from `prev` to `new`.
    /// Applied by the next [`TerrainGrid::update`].
    pub fn request_magnet_pulse(&mut self, prev: Vec3, new: Vec3) {
        let (cols, rows) = (self.config.cols, self.config.rows);
        let ring_offset = self.ring_offset();
        let offset = 0.5 + self.scroll_phase;
        let mut last = None;
        walk_cells(
            (prev.x, prev.z + offset),
            (new.x, new.z + offset),
            (cols, rows),
            |col, row| {
                let index = ((ring_offset + row) % rows) * cols + col;
                if last != Some(index) {
                    self.pending_pulses.push(index);
                    last = Some(index);
                }
            },
        );
    }

    pub fn pending_pulses(&self) -> &[usize] {
        &self.pending_pulses
    }

    /// Scroll, apply queued pulses, then recompute every cell and write its
    /// instance at the cell's storage index.
    pub fn update(&mut self, dt: f32, instances: &mut InstanceBufferManager, pool: &WorkerPool) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        self.scroll_phase += dt * self.config.scroll_speed;
        while self.scroll_phase >= 1.0 {
            self.inject_row();
            self.scroll_phase -= 1.0;
        }

        for index in std::mem::take(&mut self.pending_pulses) {
            if let Some(cell) = self.cells.get_mut(index) {
                cell.magnet = 1.0;
            }
        }

        let cols = self.config.cols;
        let rows = self.config.rows;
        let ring_offset = self.ring_offset();
        let scroll_phase = self.scroll_phase;
        let phase_speed = self.config.phase_speed;
        let depth = move |index: usize| {
            let logical = (index / cols + rows - ring_offset) % rows;
            logical as f32 - scroll_phase
        };

        let (jobs, rest) = instances.zip_chunks_mut(&mut self.cells, ROWS_PER_JOB * cols);
        pool.run_chunks(jobs, |(cells, mut chunk)| {
            let base = chunk.base();
            for (local, cell) in cells.iter_mut().enumerate() {
                let record = cell.animate(dt, phase_speed, depth(base + local));
                chunk.write(local, &record);
            }
        });

        // Cells past the instance capacity still animate so collision stays live
        if !rest.is_empty() {
            let first = rows * cols - rest.len();
            for (i, cell) in rest.iter_mut().enumerate() {
                cell.animate(dt, phase_speed, depth(first + i));
            }
        }
    }
}

/// Visit every grid cell the segment `a -> b` enters, in order, using a
/// voxel traversal in grid space (x = column, y = row coordinate).
///
/// Cells follow the truncating lookup of [`cell_index`]: the strip
/// `(-1, 0)` belongs to column/row 0.
fn walk_cells(
    a: (f32, f32),
    b: (f32, f32),
    size: (usize, usize),
    mut visit: impl FnMut(usize, usize),
) {
    let (ax, ay) = a;
    let (dx, dy) = (b.0 - ax, b.1 - ay);
    if !(ax.is_finite() && ay.is_finite() && dx.is_finite() && dy.is_finite()) {
        return;
    }
    let (cols, rows) = (size.0 as f32, size.1 as f32);

    // Clip to [-1, cols] x [-1, rows] so the traversal length is bounded by the grid
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    for (start, delta, max) in [(ax, dx, cols), (ay, dy, rows)] {
        if delta == 0.0 {
            if start < -1.0 || start > max {
                return;
            }
            continue;
        }
        let (mut enter, mut exit) = ((-1.0 - start) / delta, (max - start) / delta);
        if enter > exit {
            std::mem::swap(&mut enter, &mut exit);
        }
        t0 = t0.max(enter);
        t1 = t1.min(exit);
    }
    if t0 > t1 {
        return;
    }

    let (sx, sy) = (ax + dx * t0, ay + dy * t0);
    let (ex, ey) = (ax + dx * t1, ay + dy * t1);
    let (mut cx, mut cy) = (sx.floor() as i64, sy.floor() as i64);
    let (end_x, end_y) = (ex.floor() as i64, ey.floor() as i64);

    let axis = |start: f32, delta: f32, cell: i64| -> (i64, f32, f32) {
        if delta > 0.0 {
            (1, ((cell + 1) as f32 - start) / delta, 1.0 / delta)
        } else if delta < 0.0 {
            (-1, (start - cell as f32) / -delta, -1.0 / delta)
        } else {
            (0, f32::INFINITY, f32::INFINITY)
        }
    };
    let (step_x, mut next_x, delta_x) = axis(sx, ex - sx, cx);
    let (step_y, mut next_y, delta_y) = axis(sy, ey - sy, cy);

    let emit = |cx: i64, cy: i64, visit: &mut dyn FnMut(usize, usize)| {
        let (col, row) = (cx.max(0) as usize, cy.max(0) as usize);
        if cx >= -1 && cy >= -1 && col < size.0 && row < size.1 {
            visit(col, row);
        }
    };

    emit(cx, cy, &mut visit);
    for _ in 0..size.0 + size.1 + 4 {
        if (cx, cy) == (end_x, end_y) || next_x.min(next_y) > 1.0 + 1e-5 {
            break;
        }
        if next_x < next_y {
            cx += step_x;
            next_x += delta_x;
        } else if next_y < next_x {
            cy += step_y;
            next_y += delta_y;
        } else {
            // exactly through a corner
            cx += step_x;
            cy += step_y;
            next_x += delta_x;
            next_y += delta_y;
        }
        emit(cx, cy, &mut visit);
    }
}

fn cell_index(
    pos: Vec3,
    cols: usize,
    rows: usize,
    ring_offset: usize,
    scroll_phase: f32,
) -> Option<usize> {
    let col = pos.x.trunc();
    let row = (pos.z + 0.5 + scroll_phase).trunc();
    // also rejects NaN
    if !(col >= 0.0 && row >= 0.0) {
        return None;
    }
    let (col, row) = (col as usize, row as usize);
    if col >= cols || row >= rows {
        return None;
    }
    Some(((ring_offset + row) % rows) * cols + col)
}
