//! dc-dispatch: rate-limited outbound requests and cancellable fetch bindings.
//!
//! Every analysis request leaves through one [`RequestDispatcher`], which
//! bounds how many requests run at once and paces admissions once the queue
//! backs up. A [`FetchBinding`] sits on top of it and keeps exactly one
//! logical request per consumer, discarding results that were cancelled or
//! superseded.

pub mod binding;
pub mod dispatcher;

pub use binding::{
    BindingError, BindingErrorKind, FetchBinding, FetchError, FetchState, Resource,
};
pub use dispatcher::{DispatcherConfig, RequestDispatcher};
