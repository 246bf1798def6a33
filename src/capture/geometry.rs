use crate::common::config::CardSettings;
use crate::sys::backend::ResolutionBudget;
use crate::sys::geometry::Rect;

/// Size of one switcher card and of the preview canvas drawn into it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CardGeometry {
    settings: CardSettings,
}

impl CardGeometry {
    pub fn new(settings: CardSettings) -> Self { Self { settings } }

    /// Height of the preview area below the label bar.
    pub fn body_height(&self) -> f64 { (self.settings.height - self.settings.label_bar).max(1.0) }

    /// Card width follows the window's aspect ratio within the configured range.
    pub fn card_width(&self, bounds: &Rect) -> f64 {
        (self.body_height() * bounds.aspect_ratio())
            .clamp(self.settings.min_width, self.settings.max_width)
    }

    /// Width over height of the preview area for a window.
    pub fn body_ratio(&self, bounds: &Rect) -> f64 { self.card_width(bounds) / self.body_height() }

    /// Pixel size of the composited preview for a window.
    pub fn canvas_size(&self, bounds: &Rect, scale: f64) -> (u32, u32) {
        (
            to_pixels(self.card_width(bounds) * scale),
            to_pixels(self.body_height() * scale),
        )
    }
}

impl Default for CardGeometry {
    fn default() -> Self { Self::new(CardSettings::default()) }
}

/// Backend resolution for a window: its own size, shrunk so the longer edge
/// fits `max_dimension`, then multiplied by `scale`. Never upscales.
pub fn resolution_budget(bounds: &Rect, max_dimension: f64, scale: f64) -> ResolutionBudget {
    let w = bounds.width.max(1.0);
    let h = bounds.height.max(1.0);
    let fit = (max_dimension / w).min(max_dimension / h).min(1.0);
    ResolutionBudget {
        width: to_pixels(w * fit * scale),
        height: to_pixels(h * fit * scale),
    }
}

fn to_pixels(value: f64) -> u32 { value.floor().max(1.0) as u32 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_width_is_clamped() {
        let g = CardGeometry::default();
        assert_eq!(g.body_height(), 132.0);
        assert_eq!(g.card_width(&Rect::new(0.0, 0.0, 2640.0, 1320.0)), 264.0);
        assert_eq!(g.card_width(&Rect::new(0.0, 0.0, 300.0, 1200.0)), 140.0);
        assert_eq!(g.card_width(&Rect::new(0.0, 0.0, 3000.0, 600.0)), 320.0);
    }

    #[test]
    fn canvas_is_doubled_body() {
        let g = CardGeometry::default();
        assert_eq!(g.canvas_size(&Rect::new(0.0, 0.0, 3000.0, 600.0), 2.0), (640, 264));
        assert_eq!(g.canvas_size(&Rect::new(0.0, 0.0, 10.0, 1000.0), 2.0), (280, 264));
    }

    #[test]
    fn budget_caps_longest_edge_and_never_upscales() {
        let big = resolution_budget(&Rect::new(0.0, 0.0, 1120.0, 700.0), 560.0, 2.0);
        assert_eq!(big, ResolutionBudget { width: 1120, height: 700 });

        let tall = resolution_budget(&Rect::new(0.0, 0.0, 400.0, 1400.0), 560.0, 2.0);
        assert_eq!(tall, ResolutionBudget { width: 320, height: 1120 });

        let small = resolution_budget(&Rect::new(0.0, 0.0, 300.0, 200.0), 560.0, 2.0);
        assert_eq!(small, ResolutionBudget { width: 600, height: 400 });
    }
}
