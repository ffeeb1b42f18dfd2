//! Time subsystem.
//!
//! Provides testable timing utilities without coupling to the runtime:
//! - `FrameClock`: one per window, `tick()` once per presented frame
//! - `DeferredTimer`: a single cancellable one-shot continuation, used by
//!   cooperative schedulers that hand their next deadline to the runtime

mod deferred;
mod frame_clock;

pub use deferred::DeferredTimer;
pub use frame_clock::{FrameClock, FrameTime};
