use std::collections::VecDeque;

use crate::processor::{AssetProcessor, InProcessProcessor, ProcessEnv};
use crate::request::{TransformRequest, TransformResult};

/// FIFO queue of transform requests drained through an [`AssetProcessor`]
/// with at most `max_in_flight` requests running at once.
pub struct Dispatcher {
    queue: VecDeque<TransformRequest>,
    in_flight: usize,
    max_in_flight: usize,
    processor: Box<dyn AssetProcessor>,
}

impl Dispatcher {
    pub fn new(max_in_flight: usize, processor: Box<dyn AssetProcessor>) -> Self {
        Self {
            queue: VecDeque::new(),
            in_flight: 0,
            max_in_flight: max_in_flight.max(1),
            processor,
        }
    }

    pub fn set_processor(&mut self, processor: Box<dyn AssetProcessor>) {
        self.processor = processor;
    }

    pub fn set_max_in_flight(&mut self, max_in_flight: usize) {
        self.max_in_flight = max_in_flight.max(1);
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn enqueue(&mut self, request: TransformRequest) {
        self.queue.push_back(request);
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Nothing queued and nothing running.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.in_flight == 0
    }

    /// Start queued requests until the in-flight limit is reached.
    /// Returns how many were started.
    pub fn consume_queue(&mut self, env: &ProcessEnv<'_>) -> usize {
        let mut started = 0;
        while self.in_flight < self.max_in_flight {
            let Some(request) = self.queue.pop_front() else {
                break;
            };
            self.in_flight += 1;
            started += 1;
            self.processor.start(request, env);
        }
        started
    }

    /// Results finished since the last poll. Each must be passed to
    /// [`finish`](Self::finish) once applied.
    pub fn poll_completed(&mut self) -> Vec<TransformResult> {
        self.processor.poll_completed()
    }

    /// Account for one finished request.
    ///
    /// # Panics
    ///
    /// Panics if no request is in flight.
    pub fn finish(&mut self) {
        assert!(self.in_flight > 0, "completed more requests than were started");
        self.in_flight -= 1;
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(1, Box::new(InProcessProcessor::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flavor::Flavor;
    use crate::hierarchy::TransformerHierarchy;
    use crate::layout::ProjectLayout;
    use kiln_vfs::{FileTime, Vfs};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records started requests and completes them only when told to.
    #[derive(Clone, Default)]
    struct Deferred {
        started: Arc<Mutex<Vec<TransformRequest>>>,
        ready: Arc<Mutex<Vec<TransformResult>>>,
    }

    impl Deferred {
        fn complete_all(&self) {
            let started = std::mem::take(&mut *self.started.lock());
            self.ready
                .lock()
                .extend(started.iter().map(|r| TransformResult::failure(r, "done")));
        }
    }

    impl AssetProcessor for Deferred {
        fn start(&mut self, request: TransformRequest, _env: &ProcessEnv<'_>) {
            self.started.lock().push(request);
        }

        fn poll_completed(&mut self) -> Vec<TransformResult> {
            std::mem::take(&mut *self.ready.lock())
        }
    }

    fn request(name: &str) -> TransformRequest {
        TransformRequest {
            resource_name: name.into(),
            flavor: Flavor::any(),
            input_file: format!("data/{name}"),
            output_file: format!("temp/t/{name}"),
            temp_path: "temp/t".into(),
            input_modification_time: FileTime::default(),
        }
    }

    #[test]
    fn respects_limit_and_fifo_order() {
        let vfs = Vfs::new();
        let layout = ProjectLayout::default();
        let hierarchy = TransformerHierarchy::new();
        let env = ProcessEnv {
            vfs: &vfs,
            layout: &layout,
            hierarchy: &hierarchy,
        };

        let deferred = Deferred::default();
        let mut dispatcher = Dispatcher::new(2, Box::new(deferred.clone()));
        for name in ["a", "b", "c"] {
            dispatcher.enqueue(request(name));
        }

        assert_eq!(dispatcher.consume_queue(&env), 2);
        assert_eq!(dispatcher.consume_queue(&env), 0);
        assert_eq!(dispatcher.in_flight(), 2);
        let names: Vec<String> = deferred
            .started
            .lock()
            .iter()
            .map(|r| r.resource_name.clone())
            .collect();
        assert_eq!(names, ["a", "b"]);

        deferred.complete_all();
        for _ in dispatcher.poll_completed() {
            dispatcher.finish();
        }
        assert_eq!(dispatcher.consume_queue(&env), 1);
        assert_eq!(deferred.started.lock()[0].resource_name, "c");
        assert!(!dispatcher.is_idle());
    }

    #[test]
    fn zero_limit_is_clamped() {
        let dispatcher = Dispatcher::new(0, Box::new(InProcessProcessor::new()));
        assert_eq!(dispatcher.max_in_flight(), 1);
    }

    #[test]
    #[should_panic(expected = "completed more requests")]
    fn finish_underflow_panics() {
        Dispatcher::default().finish();
    }
}
