//! The shared shape of a pipeline stage.
//!
//! A stage splits one call into three phases that all work on a caller-owned
//! [`CallContext`]:
//!
//! ```text
//! ┌─────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ pre_process │───▶│ run_inference│───▶│ post_process │
//! │ image→input │    │ input→output │    │ output→result│
//! └─────────────┘    └──────────────┘    └──────────────┘
//! ```
//!
//! [`Stage::infer`] drives the three phases and records their durations in
//! `ctx.timings`.

use crate::core::config::TaskKind;
use crate::core::context::{CallContext, StageTimings};
use crate::core::errors::OcrResult;
use crate::core::inference::ModelSession;
use std::fmt::Debug;
use std::time::Instant;
use tracing::{debug, warn};

pub trait Stage: Send + Sync + Debug {
    fn task(&self) -> TaskKind;

    fn session(&self) -> &ModelSession;

    /// Turns the context's image or crops into `ctx.input`.
    fn pre_process(&self, ctx: &mut CallContext) -> OcrResult<()>;

    /// Runs the engine on `ctx.input` and stores the result in `ctx.output`.
    fn run_inference(&self, ctx: &mut CallContext) -> OcrResult<()> {
        let input = ctx.take_input()?;
        let engine = self.session().ensure_ready()?;
        ctx.output = Some(engine.infer(&input)?);
        Ok(())
    }

    /// Decodes `ctx.output` into the stage's results.
    fn post_process(&self, ctx: &mut CallContext) -> OcrResult<()>;

    /// Runs all three phases.
    ///
    /// Returns `Ok(false)` when pre-processing failed with a recoverable error
    /// such as an unreadable image; nothing else runs in that case.
    fn infer(&self, ctx: &mut CallContext) -> OcrResult<bool> {
        ctx.timings = StageTimings::default();

        let start = Instant::now();
        let pre = self.pre_process(ctx);
        ctx.timings.pre = start.elapsed();
        match pre {
            Ok(()) => {}
            Err(e) if e.is_recoverable() => {
                warn!(task = %self.task(), error = %e, "stage input unavailable, skipping");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        let start = Instant::now();
        self.run_inference(ctx)?;
        ctx.timings.infer = start.elapsed();

        let start = Instant::now();
        self.post_process(ctx)?;
        ctx.timings.post = start.elapsed();

        debug!(
            task = %self.task(),
            pre_ms = ctx.timings.pre.as_secs_f64() * 1e3,
            infer_ms = ctx.timings.infer.as_secs_f64() * 1e3,
            post_ms = ctx.timings.post.as_secs_f64() * 1e3,
            "stage finished"
        );
        Ok(true)
    }
}
