//! Detections recorded to disk, one line per frame: `<ordinal>: <json array>`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::config::DetectionConfig;
use crate::detection::RawDetection;
use crate::detector::Detector;
use crate::error::Error;
use crate::sampler::SampledFrame;

/// Plays back a detections file instead of running a model. Frames missing
/// from the file have no detections; recorded detections at or below the
/// confidence threshold are dropped, as the model would have.
#[derive(Debug, Clone, Default)]
pub struct ReplayDetector {
    frames: BTreeMap<usize, Vec<RawDetection>>,
}

impl ReplayDetector {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|err| {
            Error::DetectionFailure(format!("cannot open {}: {}", path.display(), err))
        })?;

        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        let mut frames = BTreeMap::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(Error::detection)?;
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            let (ordinal, dets) = parse_line(line)
                .map_err(|msg| Error::DetectionFailure(format!("line {}: {}", idx + 1, msg)))?;

            frames.insert(ordinal, dets);
        }

        Ok(Self { frames })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

fn parse_line(line: &str) -> Result<(usize, Vec<RawDetection>), String> {
    let idx = line.find(':').ok_or("expected `:`")?;
    let (ordinal, vector) = line.split_at(idx);

    let ordinal = ordinal
        .trim()
        .parse::<usize>()
        .map_err(|err| format!("parse frame ordinal failed: {}", err))?;

    let dets = serde_json::from_str(&vector[1..])
        .map_err(|err| format!("parse json failed: {}", err))?;

    Ok((ordinal, dets))
}

impl<F> Detector<F> for ReplayDetector {
    fn detect(
        &mut self,
        frame: &SampledFrame<F>,
        config: &DetectionConfig,
    ) -> Result<Vec<RawDetection>, Error> {
        let Some(dets) = self.frames.get(&frame.ordinal) else {
            return Ok(Vec::new());
        };

        Ok(dets
            .iter()
            .filter(|d| d.confidence > config.confidence_threshold)
            .copied()
            .collect())
    }
}

/// Wraps a detector and writes everything it returns in the replay format.
pub struct Recording<D, W> {
    inner: D,
    out: W,
}

impl<D, W: Write> Recording<D, W> {
    pub fn new(inner: D, out: W) -> Self {
        Self { inner, out }
    }

    /// Pushes buffered lines out. Call after the scan; dropping a buffered
    /// writer swallows its last error.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> (D, W) {
        (self.inner, self.out)
    }
}

impl<F, D: Detector<F>, W: Write> Detector<F> for Recording<D, W> {
    fn detect(
        &mut self,
        frame: &SampledFrame<F>,
        config: &DetectionConfig,
    ) -> Result<Vec<RawDetection>, Error> {
        let dets = self.inner.detect(frame, config)?;

        writeln!(self.out, "{}: {}", frame.ordinal, serde_json::to_string(&dets)?)
            .map_err(Error::detection)?;

        Ok(dets)
    }
}
