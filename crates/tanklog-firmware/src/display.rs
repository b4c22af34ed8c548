//! SSD1306 OLED as the display sink.

use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use log::warn;
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::Ssd1306;

use tanklog_core::display::DisplaySink;

/// 128x64 panel in buffered graphics mode; the frame is composed in RAM and
/// pushed once per [`show`](DisplaySink::show).
pub struct Oled<DI> {
    display: Ssd1306<DI, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>,
}

impl<DI: WriteOnlyDataCommand> Oled<DI> {
    pub fn new(interface: DI) -> Self {
        let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        display.init().expect("display initialization failed");
        Self { display }
    }
}

impl<DI: WriteOnlyDataCommand> DisplaySink for Oled<DI> {
    fn clear(&mut self) {
        self.display.clear(BinaryColor::Off).ok();
    }

    fn text(&mut self, s: &str, x: i32, y: i32) {
        let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        if Text::with_baseline(s, Point::new(x, y), style, Baseline::Top)
            .draw(&mut self.display)
            .is_err()
        {
            warn!("failed to draw display text");
        }
    }

    fn show(&mut self) {
        if self.display.flush().is_err() {
            warn!("failed to flush display frame");
        }
    }
}
