//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - profile samples: `o`, joined by `_` steps
//! - fitted curve: `-` line
//! - fitted range `z`: `|` column

use crate::plot::PlotData;

/// Render a plot as text.
pub fn render_ascii_plot(plot: &PlotData, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (x_min, x_max) = plot.x_bounds().unwrap_or((0.0, 1.0));
    let (y_min, y_max) = plot.y_bounds();

    let mut grid = vec![vec![' '; width]; height];

    // Curve first so samples can overlay it.
    draw_curve(&mut grid, &plot.curve, x_min, x_max, y_min, y_max);

    for &(x, y) in &plot.data {
        if !(x.is_finite() && y.is_finite()) {
            continue;
        }
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        grid[row][col] = 'o';
    }

    for (left, right, y) in plot.step_segments() {
        if !(left.is_finite() && right.is_finite() && y.is_finite()) {
            continue;
        }
        let row = map_y(y, y_min, y_max, height);
        let c0 = map_x(left, x_min, x_max, width);
        let c1 = map_x(right, x_min, x_max, width);
        for cell in &mut grid[row][c0.min(c1)..=c0.max(c1)] {
            if *cell == ' ' {
                *cell = '_';
            }
        }
    }

    if let Some(z) = plot.z.filter(|z| *z >= x_min && *z <= x_max) {
        let col = map_x(z, x_min, x_max, width);
        for row in grid.iter_mut() {
            if row[col] == ' ' {
                row[col] = '|';
            }
        }
    }

    let mut out = String::new();
    out.push_str(&format!("Plot: x=[{x_min:.3}, {x_max:.3}] mm | y=[{y_min:.2}, {y_max:.2}]"));
    if let Some(z) = plot.z {
        out.push_str(&format!(" | z={z:.3} mm"));
    }
    out.push('\n');

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], x_min: f64, x_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(x, y) in curve {
        if !(x.is_finite() && y.is_finite()) {
            // Break the line at holes (e.g. Hill overflow).
            prev = None;
            continue;
        }
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        match prev {
            Some((c0, r0)) if (c0, r0) != (col, row) => draw_line(grid, c0, r0, col, row, '-'),
            Some(_) => {}
            None => grid[row][col] = '-',
        }
        prev = Some((col, row));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_golden_snapshot_small() {
        let plot = PlotData {
            title: "golden".to_string(),
            data: vec![(0.0, 1.0), (1.0, 1.0), (2.0, 0.5), (3.0, 0.0)],
            curve: vec![(0.0, 1.0), (3.0, 0.0)],
            z: Some(1.5),
        };

        let txt = render_ascii_plot(&plot, 13, 5);
        let expected = concat!(
            "Plot: x=[0.000, 3.000] mm | y=[0.00, 1.10] | z=1.500 mm\n",
            "o-__o__      \n",
            "  --- |      \n",
            "     ---o__  \n",
            "      | ---  \n",
            "      |   _-o\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn z_outside_the_profile_is_not_drawn() {
        let plot = PlotData {
            title: String::new(),
            data: vec![(0.0, 1.0), (3.0, 0.0)],
            curve: vec![],
            z: Some(50.0),
        };
        let txt = render_ascii_plot(&plot, 10, 5);
        assert!(!txt.lines().skip(1).any(|l| l.contains('|')));
        assert!(txt.starts_with("Plot: x=[0.000, 3.000] mm"));
    }

    #[test]
    fn descending_positions_still_render() {
        let plot = PlotData {
            title: String::new(),
            data: vec![(4.0, 1.0), (2.0, 0.5), (0.0, 0.0)],
            curve: vec![],
            z: None,
        };
        let txt = render_ascii_plot(&plot, 10, 5);
        let body: String = txt.lines().skip(1).collect();
        assert_eq!(body.matches('o').count(), 3);
        assert!(body.contains('_'));
    }
}
