//! Frame-fit compositor: scales the audience's reported viewport down into
//! the presenter's preview pane so the preview is a faithful miniature of
//! the real output, whatever the two window sizes are.

use shared::protocol::ViewportReport;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaneSize {
    pub width: f64,
    pub height: f64,
}

impl PaneSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// A scaled stand-in for the audience viewport, centered in the preview
/// pane. The transformed asset renders inside this rectangle with the same
/// zoom/rotation/pan the audience surface uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameFit {
    pub scale: f64,
    /// Offset of the frame's top-left corner within the preview pane.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

pub struct FrameFitCompositor {
    latest: Option<ViewportReport>,
}

impl FrameFitCompositor {
    pub fn new() -> Self {
        Self { latest: None }
    }

    /// Records an audience viewport report. Reports with non-positive
    /// dimensions are ignored and the last valid report is retained.
    pub fn observe_report(&mut self, report: ViewportReport) {
        if report.is_valid() {
            self.latest = Some(report);
        }
    }

    pub fn last_report(&self) -> Option<ViewportReport> {
        self.latest
    }

    /// Computes the scaled, centered frame for the given preview pane.
    /// Returns `None` until a valid report has arrived: rendering nothing is
    /// better than guessing an aspect ratio and misleading the presenter.
    pub fn fit(&self, pane: PaneSize) -> Option<FrameFit> {
        let report = self.latest?;
        if pane.width <= 0.0 || pane.height <= 0.0 {
            return None;
        }

        let viewport_width = f64::from(report.width);
        let viewport_height = f64::from(report.height);
        let scale = (pane.width / viewport_width).min(pane.height / viewport_height);
        let width = viewport_width * scale;
        let height = viewport_height * scale;
        Some(FrameFit {
            scale,
            x: (pane.width - width) / 2.0,
            y: (pane.height - height) / 2.0,
            width,
            height,
        })
    }
}

impl Default for FrameFitCompositor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn nothing_is_rendered_before_the_first_report() {
        let compositor = FrameFitCompositor::new();
        assert_eq!(compositor.fit(PaneSize::new(800.0, 600.0)), None);
    }

    #[test]
    fn wide_viewport_is_letterboxed_and_vertically_centered() {
        let mut compositor = FrameFitCompositor::new();
        compositor.observe_report(ViewportReport::new(1920, 1080));

        let fit = compositor
            .fit(PaneSize::new(800.0, 600.0))
            .expect("fit after report");
        assert!((fit.scale - 800.0 / 1920.0).abs() < EPS);
        assert!((fit.width - 800.0).abs() < EPS);
        assert!((fit.height - 450.0).abs() < EPS);
        assert!((fit.x - 0.0).abs() < EPS);
        assert!((fit.y - 75.0).abs() < EPS);
    }

    #[test]
    fn tall_viewport_is_pillarboxed_and_horizontally_centered() {
        let mut compositor = FrameFitCompositor::new();
        compositor.observe_report(ViewportReport::new(1080, 1920));

        let fit = compositor
            .fit(PaneSize::new(800.0, 600.0))
            .expect("fit after report");
        assert!((fit.scale - 600.0 / 1920.0).abs() < EPS);
        assert!((fit.height - 600.0).abs() < EPS);
        assert!((fit.width - 337.5).abs() < EPS);
        assert!((fit.y - 0.0).abs() < EPS);
        assert!((fit.x - (800.0 - 337.5) / 2.0).abs() < EPS);
    }

    #[test]
    fn degenerate_reports_are_ignored_and_prior_report_retained() {
        let mut compositor = FrameFitCompositor::new();
        compositor.observe_report(ViewportReport::new(1920, 1080));
        compositor.observe_report(ViewportReport::new(0, 1080));
        compositor.observe_report(ViewportReport::new(1920, 0));

        assert_eq!(
            compositor.last_report(),
            Some(ViewportReport::new(1920, 1080))
        );
        assert!(compositor.fit(PaneSize::new(800.0, 600.0)).is_some());
    }
}
