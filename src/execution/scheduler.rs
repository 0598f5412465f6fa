//! Execution scheduler - groups stages into batches

use crate::core::{Pipeline, StageKind, StageState};

/// A group of stages that run together
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Batch {
    /// One stage on its own
    Single(StageKind),
    /// Stages run concurrently; all must finish before the next batch
    Parallel(Vec<StageKind>),
}

impl Batch {
    pub fn stages(&self) -> Vec<StageKind> {
        match self {
            Batch::Single(kind) => vec![*kind],
            Batch::Parallel(kinds) => kinds.clone(),
        }
    }
}

/// Scheduler for determining the order stages run in
#[derive(Debug, Default)]
pub struct ExecutionScheduler;

impl ExecutionScheduler {
    pub fn new() -> Self {
        Self
    }

    /// Split the pipeline's stages into ordered batches
    ///
    /// The security scans form one parallel batch; a lone scan is a single.
    pub fn batches(&self, pipeline: &Pipeline) -> Vec<Batch> {
        let mut batches = Vec::new();
        let mut scans = Vec::new();

        for kind in pipeline.execution_order() {
            if kind.is_security_scan() {
                scans.push(kind);
                continue;
            }
            Self::flush_scans(&mut scans, &mut batches);
            batches.push(Batch::Single(kind));
        }
        Self::flush_scans(&mut scans, &mut batches);

        batches
    }

    fn flush_scans(scans: &mut Vec<StageKind>, batches: &mut Vec<Batch>) {
        match scans.len() {
            0 => {}
            1 => batches.push(Batch::Single(scans[0])),
            _ => batches.push(Batch::Parallel(std::mem::take(scans))),
        }
        scans.clear();
    }

    /// Next batch whose stages are all still pending
    pub fn next_batch(&self, pipeline: &Pipeline) -> Option<Batch> {
        self.batches(pipeline).into_iter().find(|batch| {
            batch.stages().iter().all(|kind| {
                pipeline
                    .stage(*kind)
                    .is_some_and(|s| matches!(s.state, StageState::Pending))
            })
        })
    }
}
