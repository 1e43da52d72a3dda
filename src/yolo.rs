use std::cmp::Ordering;
use std::sync::Arc;

use ndarray::prelude::*;
use onnx_model::*;
use opencv::{
    core::{self, Mat},
    dnn,
    prelude::*,
};

use crate::bbox::{BBox, Ltrb};
use crate::config::DetectionConfig;
use crate::detection::RawDetection;
use crate::detector::Detector;
use crate::error::Error;
use crate::sampler::SampledFrame;
use crate::tracker::IouTracker;

const MODEL_DYNAMIC_INPUT_DIMENSION: i64 = -1;
const DEFAULT_INPUT_SIZE: (usize, usize) = (640, 640);

pub struct YoloDetectorConfig {
    /// Class indices to keep, `None` keeps everything.
    pub classes: Option<Vec<i32>>,
    /// Whether the model emits box coordinates in 0..1 instead of input pixels.
    pub normalized_coords: bool,
}

impl Default for YoloDetectorConfig {
    fn default() -> Self {
        Self {
            classes: None,
            normalized_coords: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub bbox: BBox<Ltrb>,
    pub confidence: f32,
    pub class: i32,
}

/// YOLO object detector on top of an ONNX model. Stateless per frame, so one
/// instance can be shared between scans.
pub struct YoloDetector {
    model: OnnxInferenceModel,
    config: YoloDetectorConfig,
    input_size: (usize, usize),
}

impl YoloDetector {
    pub fn new(
        model_src: &str,
        config: YoloDetectorConfig,
        device: InferenceDevice,
    ) -> Result<Self, Error> {
        let model = OnnxInferenceModel::new(model_src, device)?;

        let mut detector = Self {
            model,
            config,
            input_size: DEFAULT_INPUT_SIZE,
        };

        if let Some((w, h)) = detector.get_model_input_size() {
            detector.input_size = (w as usize, h as usize);
        }

        Ok(detector)
    }

    /// Loads the model on CUDA when present, CPU otherwise.
    pub fn load(model_src: &str, config: YoloDetectorConfig) -> Result<Self, Error> {
        let device = onnx_model::get_cuda_if_available(None);

        Self::new(model_src, config, device)
    }

    pub fn get_model_input_size(&self) -> Option<(u32, u32)> {
        let mut input_dims = self.model.get_input_infos().first()?.shape.dims.clone();
        let input_height = input_dims.pop()?;
        let input_width = input_dims.pop()?;

        if input_height == MODEL_DYNAMIC_INPUT_DIMENSION
            && input_width == MODEL_DYNAMIC_INPUT_DIMENSION
        {
            None
        } else {
            Some((input_width as u32, input_height as u32))
        }
    }

    pub fn preprocess(&self, frame: &Mat) -> Result<Array4<f32>, Error> {
        let (w, h) = self.input_size;

        let blob = dnn::blob_from_image(
            frame,
            1.0 / 255.0,
            core::Size::new(w as _, h as _),
            core::Scalar::new(0., 0., 0., 0.),
            true,
            false,
            core::CV_32F,
        )
        .map_err(Error::detection)?;

        let core = blob.try_into_typed::<f32>().map_err(Error::detection)?;
        let view = aview1(core.data_typed().map_err(Error::detection)?)
            .into_shape([1, 3, h, w])
            .map_err(Error::detection)?;

        Ok(view.to_owned())
    }

    /// Detects objects on a single BGR frame.
    pub fn detect_frame(
        &self,
        frame: &Mat,
        config: &DetectionConfig,
    ) -> Result<Vec<Candidate>, Error> {
        let input = self.preprocess(frame)?;
        let mut batches = self.detect(input.view(), frame.cols(), frame.rows(), config)?;

        Ok(batches.pop().unwrap_or_default())
    }

    pub fn detect(
        &self,
        frames: ArrayView4<'_, f32>,
        fw: i32,
        fh: i32,
        config: &DetectionConfig,
    ) -> Result<Vec<Vec<Candidate>>, Error> {
        let in_shape = frames.shape();
        let (in_w, in_h) = (in_shape[3], in_shape[2]);

        let predictions = self
            .model
            .run(&[frames.into_dyn()])?
            .pop()
            .ok_or_else(|| Error::detection("model produced no output"))?;

        let shape = predictions.shape();
        if shape.len() != 3 {
            return Err(Error::DetectionFailure(format!(
                "unexpected model output shape {:?}",
                shape
            )));
        }

        let shape = [shape[0], shape[1], shape[2]];
        let arr = predictions.into_shape(shape).map_err(Error::detection)?;

        Ok(self.postprocess(arr.view(), in_w, in_h, fw, fh, config))
    }

    fn postprocess(
        &self,
        view: ArrayView3<'_, f32>,
        in_w: usize,
        in_h: usize,
        frame_width: i32,
        frame_height: i32,
        config: &DetectionConfig,
    ) -> Vec<Vec<Candidate>> {
        // [batch, 4 + classes, preds] exports are turned into [batch, preds, 4 + classes]
        let view = if view.shape()[1] < view.shape()[2] {
            view.permuted_axes([0, 2, 1])
        } else {
            view
        };

        let shape = view.shape();
        let (nbatches, npreds, pred_size) = (shape[0], shape[1], shape[2]);
        let nclasses = pred_size.saturating_sub(4);

        let (sx, sy) = if self.config.normalized_coords {
            (frame_width as f32, frame_height as f32)
        } else {
            (
                frame_width as f32 / in_w as f32,
                frame_height as f32 / in_h as f32,
            )
        };

        let mut results: Vec<Vec<Candidate>> = (0..nbatches).map(|_| vec![]).collect();

        for (batch, results) in results.iter_mut().enumerate() {
            // candidates grouped by class index
            let mut bboxes: Vec<Vec<Candidate>> = (0..nclasses).map(|_| vec![]).collect();

            for index in 0..npreds {
                let pred = view.slice(s![batch, index, ..]);

                let bbox = BBox::xywh(pred[0] * sx, pred[1] * sy, pred[2] * sx, pred[3] * sy);

                let mut class_index = -1;
                let mut confidence = 0.0;

                for (idx, val) in pred.iter().skip(4).copied().enumerate() {
                    if val > confidence {
                        class_index = idx as i32;
                        confidence = val;
                    }
                }

                if class_index < 0 || confidence <= config.confidence_threshold {
                    continue;
                }

                if let Some(classes) = &self.config.classes {
                    if !classes.contains(&class_index) {
                        continue;
                    }
                }

                bboxes[class_index as usize].push(Candidate {
                    bbox: bbox.as_ltrb(),
                    confidence,
                    class: class_index,
                });
            }

            for dets in bboxes.into_iter().filter(|d| !d.is_empty()) {
                results.extend(non_maximum_suppression(dets, config.overlap_threshold));
            }
        }

        results
    }
}

/// Greedy per-class suppression: highest confidence first, dropping anything
/// that overlaps a kept box by more than `iou_threshold`.
fn non_maximum_suppression(mut dets: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    dets.sort_unstable_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut keep: Vec<Candidate> = Vec::with_capacity(dets.len());
    for det in dets {
        if keep.iter().all(|k| k.bbox.iou(&det.bbox) <= iou_threshold) {
            keep.push(det);
        }
    }

    keep
}

/// Shared YOLO model plus per-scan tracking state. Build a fresh one for
/// every video.
pub struct YoloTracker {
    detector: Arc<YoloDetector>,
    tracker: IouTracker,
}

impl YoloTracker {
    pub fn new(detector: Arc<YoloDetector>) -> Self {
        Self {
            detector,
            tracker: IouTracker::default(),
        }
    }
}

impl Detector<Mat> for YoloTracker {
    fn detect(
        &mut self,
        frame: &SampledFrame<Mat>,
        config: &DetectionConfig,
    ) -> Result<Vec<RawDetection>, Error> {
        let found = self.detector.detect_frame(&frame.image, config)?;

        let ids = if config.persist_tracking {
            let boxes: Vec<_> = found.iter().map(|c| c.bbox).collect();
            Some(self.tracker.update(&boxes))
        } else {
            None
        };

        Ok(found
            .iter()
            .enumerate()
            .map(|(idx, c)| {
                RawDetection::new(
                    c.bbox.into(),
                    c.confidence,
                    ids.as_ref().map(|ids| ids[idx]),
                )
            })
            .collect())
    }
}
