//! Hook for the host's network layer
//!
//! The host calls [`RequestFilter::on_before_request`] for every outgoing
//! request and cancels it when told to.

use std::sync::Arc;

use crate::engine::BlocklistEngine;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestDecision {
    pub cancel: bool,
}

pub trait RequestFilter: Send + Sync {
    fn on_before_request(&self, url: &str) -> RequestDecision;
}

impl RequestFilter for BlocklistEngine {
    #[inline]
    fn on_before_request(&self, url: &str) -> RequestDecision {
        RequestDecision {
            cancel: self.evaluate(url).is_blocked(),
        }
    }
}

impl<T: RequestFilter + ?Sized> RequestFilter for Arc<T> {
    #[inline]
    fn on_before_request(&self, url: &str) -> RequestDecision {
        (**self).on_before_request(url)
    }
}
