use crate::detection::domain::tracking_request::{TrackingLevel, TrackingRequest};
use crate::shared::region::DetectedRegion;

/// Which kind of work the next frame needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Regime {
    /// No active requests: run full detection.
    Searching,
    /// At least one request: run the tracker.
    Tracking,
}

/// Ordered set of active tracking requests.
///
/// Owned by exactly one writer (the frame processor), so every transition
/// happens on the processing thread.
#[derive(Debug, Default)]
pub struct TrackingState {
    requests: Vec<TrackingRequest>,
    next_id: u64,
}

impl TrackingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn regime(&self) -> Regime {
        if self.requests.is_empty() {
            Regime::Searching
        } else {
            Regime::Tracking
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn requests(&self) -> &[TrackingRequest] {
        &self.requests
    }

    pub fn requests_mut(&mut self) -> &mut [TrackingRequest] {
        &mut self.requests
    }

    /// Replaces the state with one fresh request per detected region.
    pub fn seed(&mut self, regions: &[DetectedRegion], level: TrackingLevel) {
        let mut requests = Vec::with_capacity(regions.len());
        for region in regions {
            requests.push(TrackingRequest::new(self.next_id, region.clone(), level));
            self.next_id += 1;
        }
        self.requests = requests;
    }

    /// Applies the latest tracker results and returns the number of
    /// surviving requests.
    ///
    /// - already-final requests are dropped;
    /// - results at or above `threshold` become the new input;
    /// - weaker (or missing) results flag the request final, which keeps it
    ///   for exactly one more pass.
    pub fn advance(&mut self, threshold: f64) -> usize {
        let previous = std::mem::take(&mut self.requests);
        self.requests = previous
            .into_iter()
            .filter_map(|mut request| {
                if request.is_last_frame {
                    return None;
                }
                match &request.result {
                    Some(result) if result.confidence >= threshold => {
                        request.input = result.clone();
                    }
                    _ => request.is_last_frame = true,
                }
                Some(request)
            })
            .collect();
        self.requests.len()
    }

    /// Most recent request that is still active (not final).
    pub fn last_active(&self) -> Option<&TrackingRequest> {
        self.requests.iter().rev().find(|r| !r.is_last_frame)
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }
}
