/*
Copyright 2022 Jakub Lewandowski

This file is part of Surface Currents Merger (SCM).

Surface Currents Merger (SCM) is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

Surface Currents Merger (SCM) is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with Surface Currents Merger (SCM). If not, see https://www.gnu.org/licenses/.
*/

//! Module merging interpolated sources into one field.
//!
//! Sources are merged in priority order: the first source
//! fills the empty field and every next one can only write
//! to cells that are still gaps.

use super::configuration::GapRule;
use super::interpolation::{Velocity, VelocityField};
use crate::constants::FILL_VALUE;
use crate::Float;
use ndarray::{Array2, Zip};

#[derive(Clone, PartialEq, Debug)]
pub struct MergedField {
    cells: VelocityField,
    gap_rule: GapRule,
}

impl MergedField {
    /// Creates the field with all cells being gaps.
    pub fn new(shape: (usize, usize), gap_rule: GapRule) -> Self {
        MergedField {
            cells: Array2::from_elem(shape, None),
            gap_rule,
        }
    }

    fn is_gap(gap_rule: GapRule, cell: &Option<Velocity>) -> bool {
        match gap_rule {
            GapRule::Missing => cell.is_none(),
            GapRule::Zero => cell.map_or(true, |velocity| velocity.u == 0.0),
        }
    }

    /// Copies the source field into gaps and returns
    /// the number of cells that became covered.
    ///
    /// With the legacy zero rule a gap is overwritten by the source
    /// even where the source does not cover it, so both components
    /// of a cell with zero `u` end up as the fill value.
    pub fn fill_gaps(&mut self, field: &VelocityField) -> usize {
        let gap_rule = self.gap_rule;
        let mut filled = 0;

        Zip::from(&mut self.cells)
            .and(field)
            .for_each(|cell, incoming| {
                if MergedField::is_gap(gap_rule, cell) {
                    if incoming.is_some() {
                        filled += 1;
                    }
                    *cell = *incoming;
                }
            });

        filled
    }

    /// Number of cells that are not gaps.
    pub fn coverage(&self) -> usize {
        self.cells
            .iter()
            .filter(|cell| !MergedField::is_gap(self.gap_rule, cell))
            .count()
    }

    /// East and north components with gaps and
    /// non-finite values set to the fill value.
    pub fn components(&self) -> (Array2<Float>, Array2<Float>) {
        let component = |select: fn(&Velocity) -> Float| {
            self.cells.map(|cell| match cell {
                Some(velocity) if select(velocity).is_finite() => select(velocity),
                _ => FILL_VALUE,
            })
        };

        (component(|velocity| velocity.u), component(|velocity| velocity.v))
    }
}

#[cfg(test)]
mod tests {
    use super::MergedField;
    use crate::pipeline::configuration::GapRule;
    use crate::pipeline::interpolation::{Velocity, VelocityField};
    use ndarray::{array, Array2};

    fn velocity(u: f64, v: f64) -> Option<Velocity> {
        Some(Velocity { u, v })
    }

    #[test]
    fn priority_order() {
        let a: VelocityField = array![[velocity(1.0, 1.0), None], [None, velocity(0.0, 0.5)]];
        let b: VelocityField = Array2::from_elem((2, 2), velocity(2.0, 2.0));

        let mut merged = MergedField::new((2, 2), GapRule::Missing);

        assert_eq!(merged.fill_gaps(&a), 2);
        assert_eq!(merged.fill_gaps(&b), 2);
        assert_eq!(merged.coverage(), 4);

        let (u, v) = merged.components();

        // true zero velocity from the first source is kept
        assert_eq!(u, array![[1.0, 2.0], [2.0, 0.0]]);
        assert_eq!(v, array![[1.0, 2.0], [2.0, 0.5]]);
    }

    #[test]
    fn legacy_zero_rule() {
        let a: VelocityField = array![[velocity(1.0, 1.0), None], [None, velocity(0.0, 0.5)]];
        let b: VelocityField = array![
            [velocity(2.0, 2.0), velocity(2.0, 2.0)],
            [None, velocity(3.0, 3.0)]
        ];

        let mut merged = MergedField::new((2, 2), GapRule::Zero);

        merged.fill_gaps(&a);
        assert_eq!(merged.coverage(), 1);

        assert_eq!(merged.fill_gaps(&b), 2);

        let (u, v) = merged.components();

        assert_eq!(u, array![[1.0, 2.0], [0.0, 3.0]]);
        assert_eq!(v, array![[1.0, 2.0], [0.0, 3.0]]);
    }

    #[test]
    fn uncovered_is_fill_value() {
        let mut merged = MergedField::new((1, 2), GapRule::Missing);
        merged.fill_gaps(&array![[velocity(f64::NAN, 1.0), None]]);

        let (u, v) = merged.components();

        assert_eq!(u, array![[0.0, 0.0]]);
        assert_eq!(v, array![[1.0, 0.0]]);
    }
}
