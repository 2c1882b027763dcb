use image::{imageops, RgbImage};
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use crate::detection::detection_model::Detector;
use crate::detection::utils::bounding_box::BoundingBox;
use crate::detection::utils::confidence::ConfidenceThreshold;

const INPUT_SIZE: u32 = 640;
const IOU_THRESHOLD: f32 = 0.45;
const PAD_VALUE: f32 = 114.0 / 255.0;

#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    //letterbox coordinates
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
    class: usize,
}

pub struct YoloDetector {
    session: Session,
    input_name: String,
    output_name: String,
    class_names: Vec<String>,
}

impl YoloDetector {
    pub fn load(model_filepath: &str, class_names: &[String]) -> Result<Self, String> {
        let path = Path::new(model_filepath);
        if !path.exists() {
            return Err(format!("Model file {model_filepath} does not exist"));
        }
        let session = Session::builder()
            .map_err(|err| format!("Unable to create session builder.\nReason: {err}"))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|err| format!("Unable to set optimization level.\nReason: {err}"))?
            .commit_from_file(path)
            .map_err(|err| format!("Unable to load model file.\nReason: {err}"))?;
        let input_name = session.inputs.first().map(|input| input.name.clone())
            .ok_or_else(|| "Model has no input tensor".to_string())?;
        let output_name = session.outputs.first().map(|output| output.name.clone())
            .ok_or_else(|| "Model has no output tensor".to_string())?;
        Ok(Self {
            session,
            input_name,
            output_name,
            class_names: class_names.to_vec(),
        })
    }

    fn letterbox_geometry(width: u32, height: u32) -> (f32, u32, u32, u32, u32) {
        let scale = (INPUT_SIZE as f32 / width as f32).min(INPUT_SIZE as f32 / height as f32);
        let scaled_width = ((width as f32 * scale).round() as u32).clamp(1, INPUT_SIZE);
        let scaled_height = ((height as f32 * scale).round() as u32).clamp(1, INPUT_SIZE);
        let pad_x = (INPUT_SIZE - scaled_width) / 2;
        let pad_y = (INPUT_SIZE - scaled_height) / 2;
        (scale, pad_x, pad_y, scaled_width, scaled_height)
    }

    fn letterbox(image: &RgbImage) -> (Array4<f32>, f32, u32, u32) {
        let (width, height) = image.dimensions();
        let (scale, pad_x, pad_y, scaled_width, scaled_height) = Self::letterbox_geometry(width, height);
        let resized = imageops::resize(image, scaled_width, scaled_height, imageops::FilterType::Triangle);
        let mut input = Array4::<f32>::from_elem((1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize), PAD_VALUE);
        for (x, y, pixel) in resized.enumerate_pixels() {
            let column = (x + pad_x) as usize;
            let row = (y + pad_y) as usize;
            for channel in 0..3 {
                input[[0, channel, row, column]] = pixel.0[channel] as f32 / 255.0;
            }
        }
        (input, scale, pad_x, pad_y)
    }

    //Ultralytics export layout: [1, 4 + classes, anchors] with xywh rows first.
    fn decode_candidates(data: &[f32], attributes: usize, anchors: usize, threshold: f32) -> Vec<Candidate> {
        let class_count = attributes - 4;
        let mut candidates = Vec::new();
        for anchor in 0..anchors {
            let mut best_class = 0_usize;
            let mut best_score = 0_f32;
            for class in 0..class_count {
                let score = data[(4 + class) * anchors + anchor];
                if score > best_score {
                    best_score = score;
                    best_class = class;
                }
            }
            if best_score < threshold {
                continue;
            }
            let center_x = data[anchor];
            let center_y = data[anchors + anchor];
            let box_width = data[2 * anchors + anchor];
            let box_height = data[3 * anchors + anchor];
            candidates.push(Candidate {
                x1: center_x - box_width / 2.0,
                y1: center_y - box_height / 2.0,
                x2: center_x + box_width / 2.0,
                y2: center_y + box_height / 2.0,
                score: best_score,
                class: best_class,
            });
        }
        candidates
    }

    fn intersection_over_union(a: &Candidate, b: &Candidate) -> f32 {
        let intersection_width = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
        let intersection_height = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
        let intersection = intersection_width * intersection_height;
        let area_a = (a.x2 - a.x1).max(0.0) * (a.y2 - a.y1).max(0.0);
        let area_b = (b.x2 - b.x1).max(0.0) * (b.y2 - b.y1).max(0.0);
        let union = area_a + area_b - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }

    fn non_maximum_suppression(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let mut keep: Vec<Candidate> = Vec::new();
        for candidate in candidates {
            let suppressed = keep.iter().any(|kept| {
                kept.class == candidate.class && Self::intersection_over_union(kept, &candidate) > IOU_THRESHOLD
            });
            if !suppressed {
                keep.push(candidate);
            }
        }
        keep
    }

    fn to_bounding_box(&self, candidate: &Candidate, scale: f32, pad_x: u32, pad_y: u32, width: u32, height: u32) -> BoundingBox {
        let unpad_x = |value: f32| ((value - pad_x as f32) / scale).clamp(0.0, (width - 1) as f32) as u32;
        let unpad_y = |value: f32| ((value - pad_y as f32) / scale).clamp(0.0, (height - 1) as f32) as u32;
        let name = self.class_names.get(candidate.class).cloned()
            .unwrap_or_else(|| format!("class {}", candidate.class));
        BoundingBox {
            xmin: unpad_x(candidate.x1),
            xmax: unpad_x(candidate.x2),
            ymin: unpad_y(candidate.y1),
            ymax: unpad_y(candidate.y2),
            name,
            confidence: candidate.score as f64,
        }
    }
}

impl Detector for YoloDetector {
    fn predict(&mut self, image: &RgbImage, threshold: ConfidenceThreshold) -> Result<Vec<BoundingBox>, String> {
        let (width, height) = image.dimensions();
        let (input, scale, pad_x, pad_y) = Self::letterbox(image);
        let input = input.as_standard_layout();
        let tensor = TensorRef::from_array_view(&input)
            .map_err(|err| format!("Unable to create input tensor.\nReason: {err}"))?;
        let outputs = self.session.run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|err| format!("Inference failed.\nReason: {err}"))?;
        let output = outputs.get(self.output_name.as_str())
            .ok_or_else(|| format!("Output tensor {} is missing", self.output_name))?;
        let (shape, data) = output.try_extract_tensor::<f32>()
            .map_err(|err| format!("Unable to extract output tensor.\nReason: {err}"))?;
        let dimensions: Vec<usize> = shape.iter().map(|dimension| *dimension as usize).collect();
        let (attributes, anchors) = match dimensions.as_slice() {
            [1, attributes, anchors] if *attributes > 4 => (*attributes, *anchors),
            _ => return Err(format!("Unexpected output shape {dimensions:?}")),
        };
        let candidates = Self::decode_candidates(data, attributes, anchors, threshold.fraction());
        drop(outputs);
        let keep = Self::non_maximum_suppression(candidates);
        let bounding_boxes = keep.iter()
            .map(|candidate| self.to_bounding_box(candidate, scale, pad_x, pad_y, width, height))
            .collect();
        Ok(bounding_boxes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x1: f32, y1: f32, x2: f32, y2: f32, score: f32, class: usize) -> Candidate {
        Candidate { x1, y1, x2, y2, score, class }
    }

    #[test]
    fn letterbox_geometry_preserves_aspect_ratio() {
        let (scale, pad_x, pad_y, scaled_width, scaled_height) = YoloDetector::letterbox_geometry(1280, 640);
        assert_eq!(scale, 0.5);
        assert_eq!((scaled_width, scaled_height), (640, 320));
        assert_eq!((pad_x, pad_y), (0, 160));
    }

    #[test]
    fn letterbox_geometry_never_upscales_beyond_input_size() {
        let (_, pad_x, pad_y, scaled_width, scaled_height) = YoloDetector::letterbox_geometry(640, 640);
        assert_eq!((scaled_width, scaled_height), (640, 640));
        assert_eq!((pad_x, pad_y), (0, 0));
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = candidate(0.0, 0.0, 10.0, 10.0, 0.9, 0);
        assert_eq!(YoloDetector::intersection_over_union(&a, &a), 1.0);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = candidate(0.0, 0.0, 10.0, 10.0, 0.9, 0);
        let b = candidate(20.0, 20.0, 30.0, 30.0, 0.8, 0);
        assert_eq!(YoloDetector::intersection_over_union(&a, &b), 0.0);
    }

    #[test]
    fn suppression_keeps_the_highest_scoring_overlap() {
        let candidates = vec![
            candidate(0.0, 0.0, 10.0, 10.0, 0.7, 0),
            candidate(1.0, 1.0, 11.0, 11.0, 0.9, 0),
            candidate(50.0, 50.0, 60.0, 60.0, 0.8, 0),
        ];
        let keep = YoloDetector::non_maximum_suppression(candidates);
        assert_eq!(keep.len(), 2);
        assert_eq!(keep[0].score, 0.9);
        assert_eq!(keep[1].score, 0.8);
    }

    #[test]
    fn suppression_is_class_aware() {
        let candidates = vec![
            candidate(0.0, 0.0, 10.0, 10.0, 0.9, 0),
            candidate(0.0, 0.0, 10.0, 10.0, 0.8, 1),
        ];
        let keep = YoloDetector::non_maximum_suppression(candidates);
        assert_eq!(keep.len(), 2);
    }

    #[test]
    fn decode_filters_below_the_threshold() {
        //two anchors, one class: xywh rows then one score row
        let data = vec![
            320.0, 100.0, //center-x
            320.0, 100.0, //center-y
            64.0, 20.0, //width
            64.0, 20.0, //height
            0.9, 0.4, //class score
        ];
        let candidates = YoloDetector::decode_candidates(&data, 5, 2, 0.6);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].score, 0.9);
        assert_eq!(candidates[0].x1, 288.0);
        assert_eq!(candidates[0].x2, 352.0);
    }

    #[test]
    fn decode_keeps_everything_at_a_looser_threshold() {
        let data = vec![
            320.0, 100.0,
            320.0, 100.0,
            64.0, 20.0,
            64.0, 20.0,
            0.9, 0.4,
        ];
        let strict = YoloDetector::decode_candidates(&data, 5, 2, 0.6).len();
        let loose = YoloDetector::decode_candidates(&data, 5, 2, 0.25).len();
        assert!(loose >= strict);
        assert_eq!(loose, 2);
    }
}
