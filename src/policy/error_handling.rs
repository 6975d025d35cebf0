use crate::policy::PolicyOption;

/// `cache-failures`: whether a failed fetch is remembered in the failure cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheFailures {
    Yes,
    No,
}
impl PolicyOption for CacheFailures {
    const OPTIONS: &'static [(&'static str, CacheFailures)] = &[
        ("YES", CacheFailures::Yes),
        ("NO", CacheFailures::No),
    ];
}

/// `propagate-errors`: what a fetch failure means for the resolution as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagateErrors {
    /// abort resolution and report the failure
    Stop,
    /// try the remaining connectors, report the failure if nothing can be served
    Queue,
    /// try the remaining connectors, never report the failure
    Ignore,
}
impl PolicyOption for PropagateErrors {
    const OPTIONS: &'static [(&'static str, PropagateErrors)] = &[
        ("STOP", PropagateErrors::Stop),
        ("QUEUE", PropagateErrors::Queue),
        ("IGNORE", PropagateErrors::Ignore),
    ];
}

/// `propagate-errors-on-update`: whether `propagate-errors` applies when a local copy exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagateErrorsOnUpdate {
    Always,
    /// only propagate if there is no local copy
    NotPresent,
}
impl PolicyOption for PropagateErrorsOnUpdate {
    const OPTIONS: &'static [(&'static str, PropagateErrorsOnUpdate)] = &[
        ("ALWAYS", PropagateErrorsOnUpdate::Always),
        ("NOT_PRESENT", PropagateErrorsOnUpdate::NotPresent),
    ];
}

/// The effective reaction to a single failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorHandling {
    Stop,
    Queue,
    Ignore,
}

pub fn error_handling(propagate: PropagateErrors, on_update: PropagateErrorsOnUpdate, local_copy_exists: bool) -> ErrorHandling {
    if local_copy_exists && on_update == PropagateErrorsOnUpdate::NotPresent {
        return ErrorHandling::Ignore;
    }
    match propagate {
        PropagateErrors::Stop => ErrorHandling::Stop,
        PropagateErrors::Queue => ErrorHandling::Queue,
        PropagateErrors::Ignore => ErrorHandling::Ignore,
    }
}
