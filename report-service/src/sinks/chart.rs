use std::path::Path;

use once_cell::sync::OnceCell;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use report_client::domain::ConsumptionTable;

use crate::pipeline::PipelineError;

pub const CHART_TITLE: &str = "Energy Consumption by Location";
pub const X_AXIS_LABEL: &str = "Location";
pub const Y_AXIS_LABEL: &str = "Consumption (kWh)";
pub const CHART_SIZE: (u32, u32) = (1000, 600);

const SKY_BLUE: RGBColor = RGBColor(135, 206, 235);
const FONT_FAMILY: &str = "sans-serif";
const FONT_BYTES: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

static BACKEND_READY: OnceCell<()> = OnceCell::new();

/// Register the bundled font with the plotting backend.
///
/// The font table is the only process-wide plotting state; it is filled once
/// and never mutated afterwards. Safe to call repeatedly.
pub fn init_backend() -> Result<(), PipelineError> {
    BACKEND_READY
        .get_or_try_init(|| {
            register_font(FONT_FAMILY, FontStyle::Normal, FONT_BYTES)
                .map_err(|_| PipelineError::Render("bundled chart font is not a valid font".to_string()))
        })
        .map(|_| ())
}

/// Bar chart of consumption per table row.
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    size: (u32, u32),
}

impl ChartRenderer {
    pub fn new() -> Result<Self, PipelineError> {
        init_backend()?;
        Ok(Self { size: CHART_SIZE })
    }

    /// Draw one bar per record, in table order, and write a PNG to `output`.
    ///
    /// Every call owns its drawing area; nothing is shared between calls.
    pub fn render(&self, table: &ConsumptionTable, output: &Path) -> Result<(), PipelineError> {
        if table.is_empty() {
            return Err(PipelineError::EmptyTable);
        }

        self.draw(table, output).map_err(|e| {
            PipelineError::Render(format!("failed to render chart {}: {e}", output.display()))
        })?;

        tracing::debug!(path = %output.display(), bars = table.len(), "chart rendered");
        Ok(())
    }

    fn draw(&self, table: &ConsumptionTable, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let records = table.records();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();

        let (lo, hi) = records.iter().fold((0.0_f64, 0.0_f64), |(lo, hi), r| {
            (lo.min(r.consumption_kwh), hi.max(r.consumption_kwh))
        });
        let y_max = if hi > 0.0 { hi * 1.1 } else { 1.0 };
        let y_min = if lo < 0.0 { lo * 1.1 } else { 0.0 };

        let root = BitMapBackend::new(output, self.size).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(CHART_TITLE, (FONT_FAMILY, 28))
            .margin(20)
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d((0..records.len()).into_segmented(), y_min..y_max)?;

        let label_for = |v: &SegmentValue<usize>| match v {
            SegmentValue::CenterOf(i) => names.get(*i).map(|n| n.to_string()).unwrap_or_default(),
            _ => String::new(),
        };

        // Gridlines on the value axis only.
        chart
            .configure_mesh()
            .disable_x_mesh()
            .bold_line_style(BLACK.mix(0.2))
            .light_line_style(BLACK.mix(0.05))
            .x_labels(records.len())
            .x_label_formatter(&label_for)
            .x_desc(X_AXIS_LABEL)
            .y_desc(Y_AXIS_LABEL)
            .axis_desc_style((FONT_FAMILY, 18))
            .draw()?;

        chart.draw_series(
            Histogram::vertical(&chart)
                .style(SKY_BLUE.filled())
                .margin(8)
                .data(records.iter().enumerate().map(|(i, r)| (i, r.consumption_kwh))),
        )?;

        root.present()?;
        Ok(())
    }
}
