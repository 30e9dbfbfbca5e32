// Event channel - bounded lock-free hand-off from detection to indicator
//
// A single SPSC ring buffer (rtrb) carries detection events from the
// high-priority detection task to the low-priority indicator task.
//
// Semantics:
// - Capacity is fixed at creation (5 slots by default)
// - Producer never blocks longer than the caller's timeout; when the ring
//   stays full the event is handed back to the caller and dropped
// - Consumer polls without blocking; no peek, no iteration
// - Strict FIFO between the single producer and the single consumer

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use rtrb::{Consumer, Producer, PushError, RingBuffer};

/// Default number of queued events
pub const EVENT_CHANNEL_CAPACITY: usize = 5;

/// Back-off between push attempts while the ring is full
const SEND_RETRY_INTERVAL: Duration = Duration::from_micros(100);

/// Event kinds carried from detection to the status indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DetectionEvent {
    /// Green flash; reserved, never produced by the trigger policy
    RaiseWarn,
    /// Red flash; produced on a confident keyword detection
    RaiseAlert,
}

/// Why an event could not be enqueued. The event is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// Channel stayed full for the whole timeout
    Full(DetectionEvent),
    /// Receiving side has been dropped
    Disconnected(DetectionEvent),
}

impl SendError {
    pub fn into_event(self) -> DetectionEvent {
        match self {
            SendError::Full(event) | SendError::Disconnected(event) => event,
        }
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Full(event) => write!(f, "event channel full, dropped {:?}", event),
            SendError::Disconnected(event) => {
                write!(f, "event channel disconnected, dropped {:?}", event)
            }
        }
    }
}

impl std::error::Error for SendError {}

/// Producer half, owned by the detection task
pub struct EventSender {
    producer: Producer<DetectionEvent>,
}

/// Consumer half, owned by the indicator task
pub struct EventReceiver {
    consumer: Consumer<DetectionEvent>,
}

/// Create a bounded event channel
///
/// # Arguments
/// * `capacity` - Number of slots; values below 1 are raised to 1
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (producer, consumer) = RingBuffer::new(capacity.max(1));
    (EventSender { producer }, EventReceiver { consumer })
}

impl EventSender {
    /// Enqueue without waiting
    pub fn try_send(&mut self, event: DetectionEvent) -> Result<(), SendError> {
        if self.producer.is_abandoned() {
            return Err(SendError::Disconnected(event));
        }
        self.producer
            .push(event)
            .map_err(|PushError::Full(event)| SendError::Full(event))
    }

    /// Enqueue, waiting at most `timeout` for a free slot
    ///
    /// A zero timeout makes exactly one attempt. A timeout too large to
    /// represent as a deadline waits until a slot frees or the consumer
    /// disconnects.
    pub fn send_timeout(&mut self, event: DetectionEvent, timeout: Duration) -> Result<(), SendError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut event = event;
        loop {
            match self.try_send(event) {
                Ok(()) => return Ok(()),
                Err(SendError::Full(returned)) => {
                    let remaining = match deadline {
                        Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                        None => SEND_RETRY_INTERVAL,
                    };
                    if remaining.is_zero() {
                        return Err(SendError::Full(returned));
                    }
                    event = returned;
                    thread::sleep(SEND_RETRY_INTERVAL.min(remaining));
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Free slots right now
    pub fn free_slots(&self) -> usize {
        self.producer.slots()
    }

    pub fn capacity(&self) -> usize {
        self.producer.buffer().capacity()
    }
}

impl EventReceiver {
    /// Dequeue the oldest event, if any
    pub fn try_recv(&mut self) -> Option<DetectionEvent> {
        self.consumer.pop().ok()
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.consumer.slots()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    #[test]
    fn test_fifo_order() {
        let (mut tx, mut rx) = event_channel(EVENT_CHANNEL_CAPACITY);
        tx.try_send(DetectionEvent::RaiseAlert).unwrap();
        tx.try_send(DetectionEvent::RaiseWarn).unwrap();
        tx.try_send(DetectionEvent::RaiseAlert).unwrap();

        assert_eq!(rx.len(), 3);
        assert_eq!(rx.try_recv(), Some(DetectionEvent::RaiseAlert));
        assert_eq!(rx.try_recv(), Some(DetectionEvent::RaiseWarn));
        assert_eq!(rx.try_recv(), Some(DetectionEvent::RaiseAlert));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_full_channel_drops_newest_and_keeps_oldest() {
        let (mut tx, mut rx) = event_channel(EVENT_CHANNEL_CAPACITY);
        let sent = [
            DetectionEvent::RaiseAlert,
            DetectionEvent::RaiseWarn,
            DetectionEvent::RaiseAlert,
            DetectionEvent::RaiseWarn,
            DetectionEvent::RaiseAlert,
        ];
        for event in sent {
            tx.try_send(event).unwrap();
        }
        assert_eq!(tx.free_slots(), 0);

        let err = tx
            .send_timeout(DetectionEvent::RaiseWarn, Duration::from_millis(2))
            .unwrap_err();
        assert_eq!(err, SendError::Full(DetectionEvent::RaiseWarn));
        assert_eq!(err.into_event(), DetectionEvent::RaiseWarn);
        assert_eq!(
            tx.try_send(DetectionEvent::RaiseAlert),
            Err(SendError::Full(DetectionEvent::RaiseAlert))
        );

        let mut received = Vec::new();
        while let Some(event) = rx.try_recv() {
            received.push(event);
        }
        assert_eq!(received, sent.to_vec());
    }

    #[test]
    fn test_send_timeout_is_bounded() {
        let (mut tx, _rx) = event_channel(1);
        tx.try_send(DetectionEvent::RaiseAlert).unwrap();

        let started = Instant::now();
        assert!(tx
            .send_timeout(DetectionEvent::RaiseAlert, Duration::from_millis(2))
            .is_err());
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn test_send_succeeds_once_consumer_frees_a_slot() {
        let (mut tx, mut rx) = event_channel(1);
        tx.try_send(DetectionEvent::RaiseAlert).unwrap();

        let sent = Arc::new(Barrier::new(2));
        let consumer_sent = Arc::clone(&sent);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            let first = rx.try_recv();
            // Hold the receiver until the producer's retry has landed
            consumer_sent.wait();
            (first, rx.try_recv())
        });

        let result = tx.send_timeout(DetectionEvent::RaiseWarn, Duration::from_secs(2));
        sent.wait();
        assert_eq!(result, Ok(()));
        assert_eq!(
            handle.join().unwrap(),
            (
                Some(DetectionEvent::RaiseAlert),
                Some(DetectionEvent::RaiseWarn)
            )
        );
    }

    #[test]
    fn test_unrepresentable_timeout_still_reports_disconnect() {
        let (mut tx, rx) = event_channel(1);
        tx.try_send(DetectionEvent::RaiseAlert).unwrap();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            drop(rx);
        });
        assert_eq!(
            tx.send_timeout(DetectionEvent::RaiseWarn, Duration::MAX),
            Err(SendError::Disconnected(DetectionEvent::RaiseWarn))
        );
        handle.join().unwrap();
    }

    #[test]
    fn test_dropped_receiver_disconnects() {
        let (mut tx, rx) = event_channel(2);
        drop(rx);
        assert_eq!(
            tx.try_send(DetectionEvent::RaiseAlert),
            Err(SendError::Disconnected(DetectionEvent::RaiseAlert))
        );
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let (tx, rx) = event_channel(0);
        assert_eq!(tx.capacity(), 1);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_send() {
        fn assert_send<T: Send>() {}
        // Each half moves to its own task; neither is shared
        assert_send::<EventSender>();
        assert_send::<EventReceiver>();
    }
}
