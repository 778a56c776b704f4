use std::{
    fs::File,
    io::BufWriter,
    path::Path,
};

use printpdf::{image_crate, BuiltinFont, Image, ImageTransform, Mm, PdfDocument, Pt};
use report_client::domain::AnalysisResult;

use crate::pipeline::PipelineError;

// Layout in PDF points on a US Letter page, origin bottom-left.
const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const LEFT: f32 = 100.0;
const TITLE_Y: f32 = 750.0;
const SOURCE_Y: f32 = 728.0;
const STATS_Y: f32 = 700.0;
const SUGGESTIONS_HEADING_Y: f32 = 600.0;
const SUGGESTIONS_Y: f32 = 580.0;
const SUGGESTION_INDENT: f32 = 120.0;
const LINE_STEP: f32 = 20.0;
const CHART_ORIGIN: (f32, f32) = (100.0, 300.0);
const CHART_BOX: (f32, f32) = (400.0, 250.0);

fn pt(v: f32) -> Mm {
    Mm::from(Pt(v))
}

fn render_err(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Render(e.to_string())
}

/// One-page PDF: title, statistics, suggestions and the embedded chart.
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    title: String,
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self::new("Energy Consumption Report")
    }
}

impl ReportRenderer {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    /// Compose the document at `output`.
    ///
    /// The chart must already exist at `chart_path`; a missing chart is a
    /// `NotFound` error, never a report without an image.
    pub fn render(
        &self,
        analysis: &AnalysisResult,
        chart_path: &Path,
        source_file_name: &str,
        output: &Path,
    ) -> Result<(), PipelineError> {
        if !chart_path.is_file() {
            return Err(PipelineError::NotFound(format!(
                "chart {} must be rendered before the report",
                chart_path.display()
            )));
        }
        let chart = image_crate::open(chart_path)
            .map_err(|e| render_err(format!("failed to decode chart {}: {e}", chart_path.display())))?;

        let (doc, page, layer) =
            PdfDocument::new(self.title.as_str(), pt(PAGE_WIDTH), pt(PAGE_HEIGHT), "report");
        let layer = doc.get_page(page).get_layer(layer);
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(render_err)?;
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(render_err)?;

        layer.use_text(self.title.as_str(), 16.0, pt(LEFT), pt(TITLE_Y), &bold);
        layer.use_text(
            format!("Source file: {source_file_name}"),
            10.0,
            pt(LEFT),
            pt(SOURCE_Y),
            &regular,
        );

        let stats = [
            format!("Total consumption: {} kWh", analysis.total_kwh),
            format!("Average consumption: {:.2} kWh", analysis.mean_kwh),
            format!("Highest consumption: {} kWh", analysis.max_kwh),
            format!("Lowest consumption: {} kWh", analysis.min_kwh),
        ];
        for (i, line) in stats.iter().enumerate() {
            let y = STATS_Y - LINE_STEP * i as f32;
            layer.use_text(line.as_str(), 12.0, pt(LEFT), pt(y), &regular);
        }

        layer.use_text("Suggestions:", 12.0, pt(LEFT), pt(SUGGESTIONS_HEADING_Y), &bold);
        for (i, suggestion) in analysis.suggestions.iter().enumerate() {
            let y = SUGGESTIONS_Y - LINE_STEP * i as f32;
            layer.use_text(format!("- {suggestion}"), 12.0, pt(SUGGESTION_INDENT), pt(y), &regular);
        }

        // At 72 dpi one pixel is one point, so scale maps pixels onto the box.
        let (px_w, px_h) = (chart.width() as f32, chart.height() as f32);
        Image::from_dynamic_image(&chart).add_to_layer(
            layer.clone(),
            ImageTransform {
                translate_x: Some(pt(CHART_ORIGIN.0)),
                translate_y: Some(pt(CHART_ORIGIN.1)),
                scale_x: Some(CHART_BOX.0 / px_w),
                scale_y: Some(CHART_BOX.1 / px_h),
                dpi: Some(72.0),
                ..Default::default()
            },
        );

        let file = File::create(output)
            .map_err(|e| render_err(format!("failed to create report {}: {e}", output.display())))?;
        doc.save(&mut BufWriter::new(file))
            .map_err(|e| render_err(format!("failed to write report {}: {e}", output.display())))?;

        tracing::debug!(path = %output.display(), "report written");
        Ok(())
    }
}
