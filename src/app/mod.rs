//! Client orchestration: aggregate state, submission pipeline, sync refresh
//!
//! `AppContext` owns the cross-cutting state (current result, processing
//! flag, history, stats) and keeps it consistent with server truth by
//! re-fetching after every successful mutating call.

mod context;
mod state;

pub use context::{
    has_supported_extension, ActionError, AppContext, SubmitError, SUPPORTED_UPLOAD_EXTENSIONS,
};
pub use state::SessionAggregateState;
