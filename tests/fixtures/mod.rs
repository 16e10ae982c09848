//! Test fixtures: images, coordinates and a scripted predictor.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use geo_consensus::models::location::GeoPoint;
use geo_consensus::services::image::DecodedImage;
use geo_consensus::services::predictor::{
    ModelInfo, PredictionError, Predictor, PredictorOutput,
};
use tokio::sync::Semaphore;

pub const PARIS: [f64; 2] = [48.8566, 2.3522];
pub const LONDON: [f64; 2] = [51.5074, -0.1278];
pub const NEW_YORK: [f64; 2] = [40.7128, -74.006];

/// A small valid PNG as a browser would send it.
pub fn png_data_uri() -> String {
    let img = image::RgbImage::from_fn(16, 16, |x, y| image::Rgb([(x * 16) as u8, (y * 16) as u8, 128]));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Png)
        .expect("encode test png");
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(buffer.into_inner())
    )
}

/// Predictor returning the same rows on every call.
///
/// With a gate, each call waits for one permit, so a test can hold a job in
/// `running` until it releases it.
pub struct StubPredictor {
    rows: Vec<[f64; 2]>,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
}

impl StubPredictor {
    pub fn returning(rows: &[[f64; 2]]) -> Arc<Self> {
        Arc::new(Self {
            rows: rows.to_vec(),
            gate: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn gated(rows: &[[f64; 2]], gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            rows: rows.to_vec(),
            gate: Some(gate),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Predictor for StubPredictor {
    async fn predict(
        &self,
        _model: &ModelInfo,
        _image: &DecodedImage,
        _batch_size: usize,
    ) -> Result<PredictorOutput, PredictionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| PredictionError::Model(e.to_string()))?
                .forget();
        }
        Ok(PredictorOutput::Flat(
            self.rows
                .iter()
                .map(|&[lat, lon]| GeoPoint { lat, lon })
                .collect(),
        ))
    }
}

/// Predictor that always fails.
pub struct BrokenPredictor;

#[async_trait]
impl Predictor for BrokenPredictor {
    async fn predict(
        &self,
        _model: &ModelInfo,
        _image: &DecodedImage,
        _batch_size: usize,
    ) -> Result<PredictorOutput, PredictionError> {
        Err(PredictionError::Model("CUDA out of memory".to_string()))
    }
}

/// Predictor whose task panics mid-analysis.
pub struct PanickingPredictor;

#[async_trait]
impl Predictor for PanickingPredictor {
    async fn predict(
        &self,
        _model: &ModelInfo,
        _image: &DecodedImage,
        _batch_size: usize,
    ) -> Result<PredictorOutput, PredictionError> {
        panic!("model blew up");
    }
}
