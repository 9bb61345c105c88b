// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Records exchanged between the executor, the pipeline and observers.
//!
//! Everything here is plain data: created once, never mutated after it has
//! been handed to an observer.

mod evaluation;
mod result;
mod sample;
mod stage;
mod work;

pub use evaluation::{EvaluationContext, EvaluationOutcome, ExclusionEvent, MetricConfig};
pub use result::{BackendOutcome, BackendResult};
pub use sample::Sample;
pub use stage::{StageKind, StageOutput, StageRecord, StageStart};
pub use work::{BackendId, Embedding, InferenceRequest, ResponseShape, WorkUnit};
