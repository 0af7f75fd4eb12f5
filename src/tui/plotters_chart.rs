//! Plotters-powered falloff chart widget for Ratatui.
//!
//! We render Plotters output into the Ratatui buffer using `plotters-ratatui-backend`.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// A lightweight, render-only chart description.
///
/// All series and bounds are computed outside the render call.
pub struct FalloffChart<'a> {
    /// Raw profile as a step polyline.
    pub steps: &'a [(f64, f64)],
    /// Fitted curve over the window.
    pub curve: &'a [(f64, f64)],
    /// Fitted range.
    pub z: Option<f64>,
    /// Window bounds, drawn as dim vertical lines.
    pub window: Option<(f64, f64)>,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
}

impl<'a> Widget for FalloffChart<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Plotters may fail to lay out a chart in a tiny area.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let [x0, x1] = self.x_bounds;
        let [y0, y1] = self.y_bounds;
        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            // Mesh lines only add noise at terminal resolution.
            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_labels(5)
                .y_labels(5)
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(WHITE)
                .bold_line_style(WHITE)
                .draw()?;

            let window_color = RGBColor(90, 90, 90);
            let data_color = WHITE;
            let curve_color = RGBColor(255, 60, 60);
            let z_color = RGBColor(255, 0, 255);

            if let Some((start, stop)) = self.window {
                for x in [start, stop] {
                    chart.draw_series(LineSeries::new([(x, y0), (x, y1)], &window_color))?;
                }
            }

            chart.draw_series(LineSeries::new(self.steps.iter().copied(), &data_color))?;
            chart.draw_series(LineSeries::new(
                self.curve.iter().copied().filter(|(x, y)| x.is_finite() && y.is_finite()),
                &curve_color,
            ))?;

            if let Some(z) = self.z {
                chart.draw_series(LineSeries::new([(z, y0), (z, y1)], &z_color))?;
            }

            Ok(())
        });

        widget.render(area, buf);
    }
}
