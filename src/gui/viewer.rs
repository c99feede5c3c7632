//! Document viewer panel
//!
//! Paints the loaded image and the retained overlay elements on top of it.
//! Elements are projected in original image pixel space; this panel only
//! scales them to the displayed rect, so window resizes never trigger a
//! re-render of the overlay model.

use egui::{Color32, CursorIcon, FontId, Rounding, Sense, Stroke, Vec2};

use crate::live::LiveUpdateController;

use super::app::Document;

const CHIP_FONT: f32 = 11.0;
const CHIP_BG: Color32 = Color32::from_rgba_premultiplied(20, 20, 24, 220);
const CHIP_FLASH_BG: Color32 = Color32::from_rgba_premultiplied(18, 92, 44, 230);

pub fn viewer_ui(
    ui: &mut egui::Ui,
    controller: &mut LiveUpdateController,
    document: &Document,
    show_chips: bool,
) {
    let available = ui.available_size();
    let image_size = Vec2::new(document.size[0] as f32, document.size[1] as f32);
    let scale = (available.x / image_size.x)
        .min(available.y / image_size.y)
        .min(1.0);
    let display_size = image_size * scale;

    let (rect, _response) = ui.allocate_exact_size(display_size, Sense::hover());
    let painter = ui.painter_at(rect);

    painter.image(
        document.texture.id(),
        rect,
        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
        Color32::WHITE,
    );

    // Paint retained elements; collect the activation before mutating.
    let mut clicked: Option<(usize, String)> = None;

    for element in controller.overlay().elements() {
        let screen = egui::Rect::from_min_max(
            rect.min + Vec2::new(element.rect.x1 * scale, element.rect.y1 * scale),
            rect.min + Vec2::new(element.rect.x2 * scale, element.rect.y2 * scale),
        );

        painter.rect_filled(screen, Rounding::same(2.0), element.fill);
        painter.rect_stroke(screen, Rounding::same(2.0), Stroke::new(1.5, element.stroke));

        if show_chips {
            let flashing = controller.overlay().copy_flash(element.index);
            let text = if flashing { "Copied!" } else { element.chip.as_str() };
            draw_chip(&painter, screen, text, flashing);
        }

        if let Some(copy_text) = &element.copy_text {
            let id = ui.id().with("annotation").with(element.index);
            let response = ui
                .interact(screen, id, Sense::click())
                .on_hover_cursor(CursorIcon::PointingHand);
            if response.clicked() {
                clicked = Some((element.index, copy_text.clone()));
            }
        }
    }

    if let Some((index, text)) = clicked {
        ui.ctx().copy_text(text);
        controller.overlay_mut().mark_copied(index);
    }
}

fn draw_chip(painter: &egui::Painter, region: egui::Rect, text: &str, flashing: bool) {
    if text.is_empty() {
        return;
    }

    let galley = painter.layout_no_wrap(
        text.to_string(),
        FontId::proportional(CHIP_FONT),
        Color32::WHITE,
    );

    let padding = Vec2::new(4.0, 2.0);
    let pos = region.left_top() + Vec2::new(1.0, 1.0);
    let bg = egui::Rect::from_min_size(pos, galley.size() + padding * 2.0);
    let fill = if flashing { CHIP_FLASH_BG } else { CHIP_BG };

    painter.rect_filled(bg, Rounding::same(2.0), fill);
    painter.galley(pos + padding, galley, Color32::WHITE);
}
