//! Parallel execution of the spatial join.
//!
//! Point-in-polygon containment is a pure function of one subject and one
//! region, so per-subject work can fan out across worker threads without
//! synchronization beyond result collection. Determinism of output order is
//! a correctness requirement, not an optimization detail: chunks are indexed
//! by subject range and re-assembled in canonical order before ids are
//! assigned, so the parallel join is row-for-row identical to the
//! sequential [`crate::join::spatial_join`].

mod observer;

use std::sync::Arc;
use std::time::Instant;

use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::error::SchemaError;
use crate::join::PreparedSpatialJoin;
use crate::types::{Feature, FeatureSet};

pub use observer::{
    ExecutionEvent, ExecutionMetrics, ExecutionMetricsSnapshot, ExecutionObserver,
    StdErrExecutionObserver,
};

/// Configuration for the [`ExecutionEngine`].
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Number of worker threads used by the engine.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Number of subjects per chunk.
    pub chunk_size: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        let n = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self {
            num_threads: Some(n),
            chunk_size: 4_096,
        }
    }
}

/// A configurable engine running the spatial join on a rayon pool.
pub struct ExecutionEngine {
    pool: ThreadPool,
    opts: ExecutionOptions,
    observer: Option<Arc<dyn ExecutionObserver>>,
    metrics: Arc<ExecutionMetrics>,
}

impl ExecutionEngine {
    /// Create a new engine with the given options.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size == 0` or `num_threads == Some(0)`.
    pub fn new(opts: ExecutionOptions) -> Self {
        assert!(opts.chunk_size > 0, "chunk_size must be > 0");
        if let Some(n) = opts.num_threads {
            assert!(n > 0, "num_threads must be > 0 when set");
        }

        let n_threads = opts
            .num_threads
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
            .max(1);

        let pool = ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build()
            .expect("failed to build rayon thread pool");

        Self {
            pool,
            opts: opts.clone(),
            observer: None,
            metrics: Arc::new(ExecutionMetrics::new()),
        }
    }

    /// Attach an observer for execution events (metrics/logging).
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a handle to real-time execution metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Runs the spatial join across the thread pool.
    ///
    /// Semantics and output are identical to [`crate::join::spatial_join`];
    /// only the evaluation of the containment predicate is parallelized.
    pub fn spatial_join(
        &self,
        subjects: &FeatureSet,
        subject_fields: &[&str],
        regions: &FeatureSet,
        region_fields: &[&str],
    ) -> Result<FeatureSet, SchemaError> {
        let plan = PreparedSpatialJoin::new(subjects, subject_fields, regions, region_fields)?;

        let start = Instant::now();
        self.metrics.begin_run();
        self.emit(ExecutionEvent::JoinStarted);

        let ranges = chunk_ranges(subjects.feature_count(), self.opts.chunk_size);
        let plan_ref = &plan;
        let per_chunk: Vec<Vec<_>> = self.pool.install(|| {
            ranges
                .into_par_iter()
                .map(|range| {
                    self.metrics.on_chunk_start();
                    self.emit(ExecutionEvent::ChunkStarted {
                        start_subject: range.start,
                        subject_count: range.end - range.start,
                    });

                    let mut out = Vec::new();
                    for subject in &subjects.features[range] {
                        self.metrics.on_subject_processed();
                        out.extend(plan_ref.rows_for(subject));
                    }

                    self.metrics.on_rows_emitted(out.len());
                    self.emit(ExecutionEvent::ChunkFinished {
                        output_rows: out.len(),
                    });
                    self.metrics.on_chunk_end();
                    out
                })
                .collect()
        });

        let mut features = Vec::new();
        for (geometry, attributes) in per_chunk.into_iter().flatten() {
            features.push(Feature::new(features.len() as i64, geometry, attributes));
        }
        let out = plan.into_feature_set(features);

        self.metrics.end_run(start.elapsed());
        self.emit(ExecutionEvent::JoinFinished {
            elapsed: start.elapsed(),
            metrics: self.metrics.snapshot(),
        });

        Ok(out)
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

fn chunk_ranges(count: usize, chunk_size: usize) -> Vec<std::ops::Range<usize>> {
    if count == 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(count.div_ceil(chunk_size));
    let mut start = 0usize;
    while start < count {
        let end = (start + chunk_size).min(count);
        out.push(start..end);
        start = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{ExecutionEngine, ExecutionOptions};
    use crate::join::spatial_join;
    use crate::types::{Feature, FeatureSet, Field, FieldType, Geometry, Schema, Value};
    use geo::{LineString, Point, Polygon};

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (x0, y0),
                (x0 + size, y0),
                (x0 + size, y0 + size),
                (x0, y0 + size),
                (x0, y0),
            ]),
            vec![],
        )
    }

    fn regions() -> FeatureSet {
        let schema = Schema::new(vec![Field::new("region_id", FieldType::Integer)]);
        let features = vec![
            Feature::new(
                1,
                Some(Geometry::Polygon(square(0.0, 0.0, 50.0))),
                vec![Value::Integer(1)],
            ),
            Feature::new(
                2,
                Some(Geometry::Polygon(square(50.0, 0.0, 50.0))),
                vec![Value::Integer(2)],
            ),
        ];
        FeatureSet::new(schema, None, features)
    }

    fn subjects(n: usize) -> FeatureSet {
        let schema = Schema::new(vec![Field::new("n", FieldType::Integer)]);
        let features = (0..n)
            .map(|i| {
                let x = (i % 120) as f64;
                Feature::new(
                    i as i64,
                    Some(Geometry::Point(Point::new(x, 25.0))),
                    vec![Value::Integer(i as i64)],
                )
            })
            .collect();
        FeatureSet::new(schema, None, features)
    }

    #[test]
    fn parallel_join_equals_sequential_join() {
        let regions = regions();
        let subjects = subjects(500);

        let sequential = spatial_join(&subjects, &["n"], &regions, &["region_id"]).unwrap();
        let engine = ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(4),
            chunk_size: 7,
        });
        let parallel = engine
            .spatial_join(&subjects, &["n"], &regions, &["region_id"])
            .unwrap();

        assert_eq!(parallel, sequential);
    }

    #[test]
    fn metrics_are_available_after_run() {
        let regions = regions();
        let subjects = subjects(100);
        let engine = ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(2),
            chunk_size: 10,
        });
        let metrics = engine.metrics();

        let out = engine
            .spatial_join(&subjects, &["n"], &regions, &["region_id"])
            .unwrap();

        let snap = metrics.snapshot();
        assert_eq!(snap.subjects_processed, 100);
        assert_eq!(snap.rows_emitted, out.feature_count() as u64);
        assert_eq!(snap.chunks_started, 10);
        assert_eq!(snap.chunks_finished, 10);
        assert!(snap.elapsed.is_some());
    }
}
