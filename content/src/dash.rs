// tessera/content/src/dash.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Transforms a stroke into a dashed stroke. Runs before stroke-to-fill.

use crate::outline::{Contour, ContourIterFlags, Outline, PushSegmentFlags};
use std::mem;
use tessera_geometry::util::EPSILON;

pub struct OutlineDash<'a> {
    input: &'a Outline,
    output: Outline,
    state: DashState<'a>,
}

impl<'a> OutlineDash<'a> {
    #[inline]
    pub fn new(input: &'a Outline, dashes: &'a [f32], offset: f32) -> OutlineDash<'a> {
        OutlineDash { input, output: Outline::new(), state: DashState::new(dashes, offset) }
    }

    /// Performs the dashing operation.
    pub fn dash(&mut self) {
        if self.state.degenerate {
            warn!("ignoring degenerate dash array");
            for contour in self.input.contours() {
                self.output.push_contour((*contour).clone());
            }
            return;
        }

        for contour in self.input.contours() {
            ContourDash::new(contour, &mut self.output, &mut self.state).dash()
        }
    }

    /// Returns the resulting dashed outline.
    pub fn into_outline(mut self) -> Outline {
        if self.state.is_on() {
            self.output.push_contour(self.state.output);
        }
        self.output
    }
}

struct ContourDash<'a, 'b, 'c> {
    input: &'a Contour,
    output: &'b mut Outline,
    state: &'c mut DashState<'a>,
}

impl<'a, 'b, 'c> ContourDash<'a, 'b, 'c> {
    fn new(input: &'a Contour, output: &'b mut Outline, state: &'c mut DashState<'a>)
           -> ContourDash<'a, 'b, 'c> {
        ContourDash { input, output, state }
    }

    fn dash(&mut self) {
        let mut iterator = self.input.iter(ContourIterFlags::empty());
        let mut queued_segment = None;
        loop {
            if queued_segment.is_none() {
                match iterator.next() {
                    Some(segment) => queued_segment = Some(segment),
                    None => break,
                }
            }

            let mut current_segment = queued_segment.take().unwrap();
            let mut distance = self.state.distance_left;

            let t = current_segment.time_for_distance(distance);
            if t < 1.0 {
                let (before, after) = current_segment.split(t);
                current_segment = before;
                queued_segment = Some(after);
            } else {
                distance = current_segment.arc_length();
            }

            if self.state.is_on() {
                let mut flags = PushSegmentFlags::UPDATE_BOUNDS;
                if self.state.output.is_empty() {
                    flags.insert(PushSegmentFlags::INCLUDE_FROM_POINT);
                }
                self.state.output.push_segment(&current_segment, flags);
            }

            self.state.distance_left -= distance;
            if self.state.distance_left < EPSILON {
                if self.state.is_on() {
                    self.output
                        .push_contour(mem::replace(&mut self.state.output, Contour::new()));
                }

                self.state.current_dash_index += 1;
                if self.state.current_dash_index == self.state.dashes.len() {
                    self.state.current_dash_index = 0;
                }

                self.state.distance_left = self.state.dashes[self.state.current_dash_index];
            }
        }
    }
}

struct DashState<'a> {
    output: Contour,
    dashes: &'a [f32],
    current_dash_index: usize,
    distance_left: f32,
    degenerate: bool,
}

impl<'a> DashState<'a> {
    fn new(dashes: &'a [f32], mut offset: f32) -> DashState<'a> {
        let total: f32 = dashes.iter().cloned().sum();
        if dashes.is_empty() || total < EPSILON {
            return DashState {
                output: Contour::new(),
                dashes,
                current_dash_index: 0,
                distance_left: 0.0,
                degenerate: true,
            };
        }

        offset %= total;
        if offset < 0.0 {
            offset += total;
        }

        let mut current_dash_index = 0;
        while current_dash_index < dashes.len() {
            let dash = dashes[current_dash_index];
            if offset < dash {
                break;
            }
            offset -= dash;
            current_dash_index += 1;
        }

        DashState {
            output: Contour::new(),
            dashes,
            current_dash_index,
            distance_left: dashes[current_dash_index] - offset,
            degenerate: false,
        }
    }

    /// Odd dash indices are gaps.
    #[inline]
    fn is_on(&self) -> bool {
        self.current_dash_index % 2 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::OutlineDash;
    use crate::outline::{Contour, ContourIterFlags, Outline};
    use tessera_geometry::vector::vec2f;

    fn line_outline(length: f32) -> Outline {
        let mut contour = Contour::new();
        contour.push_endpoint(vec2f(0.0, 0.0));
        contour.push_endpoint(vec2f(length, 0.0));
        let mut outline = Outline::new();
        outline.push_contour(contour);
        outline
    }

    fn total_dashed_length(outline: &Outline) -> f32 {
        outline.contours()
               .iter()
               .flat_map(|contour| contour.iter(ContourIterFlags::empty()))
               .map(|segment| segment.arc_length())
               .sum()
    }

    #[test]
    fn test_even_dashing() {
        let outline = line_outline(100.0);
        let mut dash = OutlineDash::new(&outline, &[10.0, 10.0], 0.0);
        dash.dash();
        let dashed = dash.into_outline();

        assert_eq!(dashed.contours().len(), 5);
        let on_length = total_dashed_length(&dashed);
        assert!((on_length - 50.0).abs() < 0.1, "on length {}", on_length);
    }

    #[test]
    fn test_dash_offset_starts_in_gap() {
        let outline = line_outline(100.0);
        let mut dash = OutlineDash::new(&outline, &[10.0, 10.0], 10.0);
        dash.dash();
        let dashed = dash.into_outline();

        // Starting in a gap shifts the pattern by one dash.
        let first = dashed.contours()[0].first_position().unwrap();
        assert!((first.x - 10.0).abs() < 0.1, "first dash starts at {}", first.x);
    }

    #[test]
    fn test_degenerate_dash_array_passes_through() {
        let outline = line_outline(42.0);
        let mut dash = OutlineDash::new(&outline, &[0.0, 0.0], 0.0);
        dash.dash();
        let dashed = dash.into_outline();
        assert_eq!(dashed.contours().len(), 1);
        assert!((total_dashed_length(&dashed) - 42.0).abs() < 0.01);
    }
}
