//! SVG report plot (plotters).
//!
//! Layout follows the usual falloff figure: black step profile, red fitted
//! curve, magenta vertical line at `z`, intensity axis from 0 to 1.1.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::error::AppError;
use crate::plot::{PlotData, X_LABEL, Y_LABEL};

/// Default SVG size in pixels.
pub const SVG_SIZE: (u32, u32) = (960, 600);

/// Write the plot to an SVG file.
pub fn write_svg(path: &Path, plot: &PlotData, size: (u32, u32)) -> Result<(), AppError> {
    {
        let root = SVGBackend::new(path, size).into_drawing_area();
        draw_chart(&root, plot)?;
        root.present().map_err(|e| svg_error(path, e))?;
    }
    log::info!("wrote {}", path.display());
    Ok(())
}

/// Render the plot to an SVG document in memory.
pub fn render_svg(plot: &PlotData, size: (u32, u32)) -> Result<String, AppError> {
    let mut out = String::new();
    {
        let root = SVGBackend::with_string(&mut out, size).into_drawing_area();
        draw_chart(&root, plot)?;
        root.present()
            .map_err(|e| AppError::new(4, format!("Failed to render SVG: {e:?}")))?;
    }
    Ok(out)
}

fn svg_error(path: &Path, e: impl std::fmt::Debug) -> AppError {
    AppError::new(2, format!("Failed to write SVG '{}': {e:?}", path.display()))
}

fn draw_chart<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, plot: &PlotData) -> Result<(), AppError>
where
    DB::ErrorType: 'static,
{
    let draw_err = |e: DrawingAreaErrorKind<DB::ErrorType>| AppError::new(4, format!("Plot rendering failed: {e:?}"));

    let Some((x0, x1)) = plot.x_bounds() else {
        return Err(AppError::new(3, "Nothing to plot: profile has no finite positions."));
    };
    let (y0, y1) = plot.y_bounds();

    root.fill(&WHITE).map_err(draw_err)?;

    let mut chart = ChartBuilder::on(root)
        .caption(&plot.title, ("sans-serif", 20).into_font())
        .margin(20)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, y0..y1)
        .map_err(draw_err)?;

    chart
        .configure_mesh()
        .x_desc(X_LABEL)
        .y_desc(Y_LABEL)
        .x_label_style(("sans-serif", 14))
        .y_label_style(("sans-serif", 14))
        .axis_desc_style(("sans-serif", 16))
        .draw()
        .map_err(draw_err)?;

    let steps: Vec<(f64, f64)> = plot
        .step_segments()
        .into_iter()
        .filter(|(l, r, y)| l.is_finite() && r.is_finite() && y.is_finite())
        .flat_map(|(l, r, y)| [(l, y), (r, y)])
        .collect();
    chart
        .draw_series(LineSeries::new(steps, BLACK.stroke_width(1)))
        .map_err(draw_err)?
        .label("data")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK));

    if !plot.curve.is_empty() {
        let curve = plot
            .curve
            .iter()
            .copied()
            .filter(|(x, y)| x.is_finite() && y.is_finite());
        chart
            .draw_series(LineSeries::new(curve, RED.stroke_width(2)))
            .map_err(draw_err)?
            .label("fit")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
    }

    if let Some(z) = plot.z {
        chart
            .draw_series(LineSeries::new([(z, y0), (z, y1)], MAGENTA.stroke_width(1)))
            .map_err(draw_err)?
            .label(format!("z = {z:.2} mm"))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], MAGENTA));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .position(SeriesLabelPosition::UpperRight)
        .draw()
        .map_err(draw_err)?;

    Ok(())
}
