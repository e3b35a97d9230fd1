//! Approval gating for regeneration
//!
//! Turns an obsolescence verdict into an authorization to regenerate. Policy
//! lives in `ApprovalGate`; reviewer I/O lives behind `ReviewDecider`.

mod gate;
mod reviewer;

pub use gate::{format_approval_summary, ApprovalGate, AUTO_APPROVAL_NOTE};
pub use reviewer::{
    parse_modifications, ConsoleReviewer, PolicyReviewer, ReviewDecider, ReviewResponse,
};
