use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;
use tokio::fs;
use crate::detection::utils::bounding_box::BoundingBox;
use crate::utils::config::Config;
use common::utils::log_entry::io::IOEntry;

///Draws the detections over a copy of the uploaded image.
pub async fn annotate(image: &RgbImage, bounding_boxes: &[BoundingBox]) -> Result<RgbImage, String> {
    let config = Config::now().await;
    let font_path = Path::new(&config.font_path);
    let font_data = fs::read(font_path).await
        .map_err(|err| String::from(IOEntry::ReadFileError(font_path.display(), err)))?;
    let font = FontVec::try_from_vec(font_data)
        .map_err(|_| "Annotator: Unable to parse font data.".to_string())?;
    Ok(draw_bounding_boxes(image, bounding_boxes, &config, &font))
}

pub fn draw_bounding_boxes(image: &RgbImage, bounding_boxes: &[BoundingBox], config: &Config, font: &FontVec) -> RgbImage {
    let border_color = Rgb(config.border_color);
    let text_color = Rgb(config.text_color);
    let mut annotated = image.clone();
    for bounding_box in bounding_boxes {
        let box_width = bounding_box.xmax.saturating_sub(bounding_box.xmin).max(1);
        let box_height = bounding_box.ymax.saturating_sub(bounding_box.ymin).max(1);
        let base_rectangle = Rect::at(bounding_box.xmin as i32, bounding_box.ymin as i32).of_size(box_width, box_height);
        for i in 0..config.border_width {
            let offset_rect = Rect::at(base_rectangle.left() - i as i32, base_rectangle.top() - i as i32)
                .of_size(base_rectangle.width() + 2 * i, base_rectangle.height() + 2 * i);
            draw_hollow_rect_mut(&mut annotated, offset_rect, border_color);
        }
        let scale = PxScale::from(config.font_size);
        let label = format!("{name}: {confidence:.2}%", name = bounding_box.name, confidence = bounding_box.confidence * 100.0);
        let position_x = bounding_box.xmin as i32;
        let position_y = (bounding_box.ymax + config.border_width + 10) as i32;
        draw_text_mut(&mut annotated, text_color, position_x, position_y, scale, font, &label);
    }
    annotated
}
