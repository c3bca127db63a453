use qrcode::{Color, QrCode};

/// Modules of light border required around the symbol for phones to scan it.
const QUIET_ZONE: usize = 4;

/// Renders a QR payload as Unicode half blocks, two module rows per text line,
/// so it can be scanned straight out of a terminal or a log viewer.
pub fn render_qr(data: &str) -> Option<String> {
    let code = QrCode::new(data.as_bytes()).ok()?;
    let colors = code.to_colors();
    let width = code.width();
    let total = width + QUIET_ZONE * 2;

    let color_at = |x: usize, y: usize| -> Color {
        if x < QUIET_ZONE
            || y < QUIET_ZONE
            || x >= QUIET_ZONE + width
            || y >= QUIET_ZONE + width
        {
            Color::Light
        } else {
            colors[(y - QUIET_ZONE) * width + (x - QUIET_ZONE)]
        }
    };

    let mut out = String::with_capacity((total + 1) * total.div_ceil(2) * 3);
    for y in (0..total).step_by(2) {
        for x in 0..total {
            let top = color_at(x, y);
            let bottom = if y + 1 < total {
                color_at(x, y + 1)
            } else {
                Color::Light
            };

            out.push(match (top, bottom) {
                (Color::Light, Color::Light) => ' ',
                (Color::Dark, Color::Dark) => '█',
                (Color::Dark, Color::Light) => '▀',
                (Color::Light, Color::Dark) => '▄',
            });
        }
        out.push('\n');
    }

    Some(out)
}
