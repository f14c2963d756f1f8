//! Procedural generation of a freshly injected terrain row

use crate::cell::Cell;
use rubble_core::{hsv_to_rgb, SimRng};

/// Height of the wall on the left edge
const EDGE_SPIKE: f32 = 40.0;
/// Chance that an interior cell is a bright highlight
const HIGHLIGHT_CHANCE: f32 = 0.2;

/// Overwrite `row` with the cells of injection number `serial`.
///
/// With `flat` set every cell gets that height instead of the random profile.
pub(crate) fn fill_row(row: &mut [Cell], serial: u64, rng: &mut SimRng, flat: Option<f32>) {
    let cols = row.len();
    for (col, cell) in row.iter_mut().enumerate() {
        let height = match flat {
            Some(h) => h,
            None if col == 0 => EDGE_SPIKE,
            None => {
                let r = rng.next_f32();
                1.0 + r + 20.0 * (r + 1.0) / (col as f32 + 1.0)
            }
        };

        let band = (serial + col as u64) as f32;
        let mut saturation = 0.8 + 0.2 * (band / 12.0).sin();
        let mut value = 0.3;
        if col > 0 && col + 1 < cols && rng.chance(HIGHLIGHT_CHANCE) {
            saturation = 1.0;
            value = 1.0;
        }
        let rgb = hsv_to_rgb((band / 400.0) % 1.0, saturation, value);

        *cell = Cell {
            x: col as f32 + 0.5,
            h_initial: height,
            height,
            phase: col as f32 / 2.0,
            color: rgb.extend(1.0),
            serial,
            ..Default::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_edge_is_a_wall_and_interior_decays() {
        let mut row = vec![Cell::default(); 30];
        let mut rng = SimRng::new(7);
        fill_row(&mut row, 5, &mut rng, None);

        assert_eq!(row[0].h_initial, EDGE_SPIKE);
        for (col, cell) in row.iter().enumerate().skip(1) {
            let max = 2.0 + 40.0 / (col as f32 + 1.0);
            let min = 1.0 + 20.0 / (col as f32 + 1.0);
            assert!(cell.h_initial >= min && cell.h_initial <= max, "col {col}");
        }
        assert!(row.iter().all(|c| c.serial == 5 && c.weight == 0));
        assert_eq!(row[3].x, 3.5);
        assert_eq!(row[3].phase, 1.5);
        assert_eq!(row[3].color.w, 1.0);
    }

    #[test]
    fn flat_rows_ignore_the_profile() {
        let mut row = vec![Cell::default(); 4];
        let mut rng = SimRng::new(1);
        fill_row(&mut row, 1, &mut rng, Some(0.0));
        assert!(row.iter().all(|c| c.h_initial == 0.0 && c.height == 0.0));
    }

    #[test]
    fn edge_columns_are_never_highlighted() {
        let mut rng = SimRng::new(3);
        let mut row = vec![Cell::default(); 3];
        for serial in 1..200 {
            fill_row(&mut row, serial, &mut rng, None);
            // value 0.3 keeps every channel at or below 0.3
            assert!(row[0].color.truncate().max_element() <= 0.3 + 1e-6);
            assert!(row[2].color.truncate().max_element() <= 0.3 + 1e-6);
        }
    }
}
