use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    widgets::{Block, Widget},
};

pub const BAR_WIDTH_FACTOR: f32 = 2.5;
pub const BAR_GAP: f32 = 1.0;

const EIGHTHS: [&str; 8] = ["▁", "▂", "▃", "▄", "▅", "▆", "▇", "█"];

/// A filled rectangle in render units, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Lay out one bar per bin, left to right, anchored to the bottom edge.
/// Bars that would start past `width` are dropped, the last one is clipped.
pub fn layout_bars(bins: &[u8], width: f32, height: f32) -> Vec<BarRect> {
    if bins.is_empty() || width <= 0.0 || height <= 0.0 {
        return Vec::new();
    }

    let bar_width = width / bins.len() as f32 * BAR_WIDTH_FACTOR;
    let mut rects = Vec::new();
    let mut x = 0.0;
    for &value in bins {
        if x >= width {
            break;
        }
        let bar_height = value as f32 / 255.0 * height;
        rects.push(BarRect {
            x,
            y: height - bar_height,
            width: bar_width.min(width - x),
            height: bar_height,
        });
        x += bar_width + BAR_GAP;
    }
    rects
}

/// Spectrum widget: one terminal column is one horizontal unit, one eighth
/// of a row is one vertical unit.
pub struct SpectrumBars<'a> {
    bins: &'a [u8],
    block: Option<Block<'a>>,
    style: Style,
}

impl<'a> SpectrumBars<'a> {
    pub fn new(bins: &'a [u8]) -> Self {
        Self {
            bins,
            block: None,
            style: Style::default(),
        }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }
}

impl Widget for SpectrumBars<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner = match self.block {
            Some(block) => {
                let inner = block.inner(area);
                block.render(area, buf);
                inner
            }
            None => area,
        };
        if inner.width == 0 || inner.height == 0 {
            return;
        }

        let units_high = inner.height as f32 * 8.0;
        for bar in layout_bars(self.bins, inner.width as f32, units_high) {
            let eighths = bar.height.round() as u32;
            if eighths == 0 {
                continue;
            }
            let first_col = bar.x.round() as u16;
            let last_col = ((bar.x + bar.width).round() as u16).max(first_col + 1);

            for col in first_col..last_col.min(inner.width) {
                let mut remaining = eighths;
                for row in (0..inner.height).rev() {
                    if remaining == 0 {
                        break;
                    }
                    let fill = remaining.min(8);
                    remaining -= fill;
                    if let Some(cell) = buf.cell_mut((inner.x + col, inner.y + row)) {
                        cell.set_symbol(EIGHTHS[fill as usize - 1]).set_style(self.style);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_geometry() {
        let bars = layout_bars(&[255, 0, 51, 102], 100.0, 50.0);
        // (100 / 4) * 2.5 = 62.5 wide, so only two bars start inside the area
        assert_eq!(bars.len(), 2);
        assert_eq!(
            bars[0],
            BarRect {
                x: 0.0,
                y: 0.0,
                width: 62.5,
                height: 50.0
            }
        );
        assert_eq!(bars[1].x, 63.5);
        assert_eq!(bars[1].width, 36.5);
        assert_eq!(bars[1].height, 0.0);
        assert_eq!(bars[1].y, 50.0);
    }

    #[test]
    fn test_height_is_proportional() {
        let bins = vec![51u8; 128];
        let bars = layout_bars(&bins, 1280.0, 100.0);
        assert!(bars.iter().all(|b| (b.height - 20.0).abs() < 1e-4));
        assert!(bars.iter().all(|b| b.x < 1280.0));
        assert!(bars.windows(2).all(|w| (w[1].x - w[0].x - 26.0).abs() < 1e-3));
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(layout_bars(&[], 10.0, 10.0).is_empty());
        assert!(layout_bars(&[10], 0.0, 10.0).is_empty());
        assert!(layout_bars(&[10], 10.0, 0.0).is_empty());
    }

    #[test]
    fn test_widget_draws_from_the_bottom() {
        let area = Rect::new(0, 0, 4, 2);
        let mut buf = Buffer::empty(area);
        // one bin, full width bar, full height
        SpectrumBars::new(&[255]).render(area, &mut buf);

        for col in 0..4 {
            assert_eq!(buf[(col, 0)].symbol(), "█");
            assert_eq!(buf[(col, 1)].symbol(), "█");
        }

        let mut buf = Buffer::empty(area);
        // 12 of 16 eighths: a full bottom row and a half top row
        SpectrumBars::new(&[191]).render(area, &mut buf);
        assert_eq!(buf[(0, 1)].symbol(), "█");
        assert_eq!(buf[(0, 0)].symbol(), "▄");
    }

    #[test]
    fn test_silence_leaves_buffer_blank() {
        let area = Rect::new(0, 0, 8, 3);
        let mut buf = Buffer::empty(area);
        SpectrumBars::new(&[0; 16]).render(area, &mut buf);
        assert_eq!(buf, Buffer::empty(area));
    }
}
