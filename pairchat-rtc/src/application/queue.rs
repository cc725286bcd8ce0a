use crate::infrastructure::message::{IceCandidate, OutboundSignal};
use std::collections::VecDeque;

/// Signals produced while the engine handles one input
///
/// The engine drains it into the channel once the handler returns, so a
/// handler never re-enters the channel while it is still mutating state.
#[derive(Debug)]
pub struct SignalQueue {
    pending: Vec<OutboundSignal>,
    limit: usize,
}

impl SignalQueue {
    pub fn new(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            limit,
        }
    }

    pub fn push(&mut self, signal: OutboundSignal) -> Result<(), QueueError> {
        if self.pending.len() >= self.limit {
            return Err(QueueError::Full {
                limit: self.limit,
                dropped: signal.name(),
            });
        }
        self.pending.push(signal);
        Ok(())
    }

    /// Everything queued since the last drain, oldest first
    pub fn drain(&mut self) -> Vec<OutboundSignal> {
        std::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum QueueError {
    #[error("{limit} signals already queued, dropping {dropped}")]
    Full { limit: usize, dropped: &'static str },
}

impl Default for SignalQueue {
    /// Far more than a single input ever produces
    fn default() -> Self {
        Self::new(256)
    }
}

/// Remote candidates received before they can be applied
///
/// Bounded; when full the oldest candidate is dropped.
#[derive(Debug)]
pub struct CandidateBuffer {
    candidates: VecDeque<IceCandidate>,
    limit: usize,
    dropped: usize,
}

impl CandidateBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            candidates: VecDeque::new(),
            limit,
            dropped: 0,
        }
    }

    /// Buffer a candidate, returning the one evicted to make room
    pub fn push(&mut self, candidate: IceCandidate) -> Option<IceCandidate> {
        if self.limit == 0 {
            self.dropped += 1;
            return Some(candidate);
        }

        let evicted = if self.candidates.len() >= self.limit {
            self.dropped += 1;
            self.candidates.pop_front()
        } else {
            None
        };
        self.candidates.push_back(candidate);
        evicted
    }

    pub fn drain(&mut self) -> Vec<IceCandidate> {
        self.candidates.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
        self.dropped = 0;
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Candidates lost to the bound since the last clear
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(n: u32) -> IceCandidate {
        IceCandidate::new(format!("candidate:{}", n), None, Some(0))
    }

    #[test]
    fn test_drain_keeps_order_and_empties() {
        let mut queue = SignalQueue::default();
        queue.push(OutboundSignal::EnterPool).unwrap();
        queue.push(OutboundSignal::LeaveRoom).unwrap();
        queue.push(OutboundSignal::LeavePool).unwrap();

        assert_eq!(
            queue.drain(),
            vec![
                OutboundSignal::EnterPool,
                OutboundSignal::LeaveRoom,
                OutboundSignal::LeavePool
            ]
        );
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_full_queue_rejects_signal() {
        let mut queue = SignalQueue::new(1);
        queue.push(OutboundSignal::EnterPool).unwrap();

        let result = queue.push(OutboundSignal::LeavePool);
        assert_eq!(
            result,
            Err(QueueError::Full {
                limit: 1,
                dropped: "LeavePool"
            })
        );
        assert_eq!(queue.drain(), vec![OutboundSignal::EnterPool]);
    }

    #[test]
    fn test_buffer_drops_oldest() {
        let mut buffer = CandidateBuffer::new(2);
        assert!(buffer.push(candidate(1)).is_none());
        assert!(buffer.push(candidate(2)).is_none());

        let evicted = buffer.push(candidate(3));
        assert_eq!(evicted, Some(candidate(1)));
        assert_eq!(buffer.dropped(), 1);
        assert_eq!(buffer.drain(), vec![candidate(2), candidate(3)]);
    }

    #[test]
    fn test_zero_limit_keeps_nothing() {
        let mut buffer = CandidateBuffer::new(0);
        assert_eq!(buffer.push(candidate(1)), Some(candidate(1)));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_clear_resets_drop_count() {
        let mut buffer = CandidateBuffer::new(1);
        buffer.push(candidate(1));
        buffer.push(candidate(2));
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.dropped(), 0);
    }
}
