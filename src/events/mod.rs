use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::debug;
use uuid::Uuid;

use crate::models::event::BusEvent;

pub fn trip_topic(trip_id: Uuid) -> String {
    format!("trip:{trip_id}")
}

pub fn user_topic(user_id: Uuid) -> String {
    format!("user:{user_id}")
}

type TopicTable = DashMap<String, broadcast::Sender<BusEvent>>;

#[derive(Clone)]
pub struct EventBus {
    topics: Arc<TopicTable>,
    buffer_size: usize,
}

impl EventBus {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Returns the number of subscribers the event was handed to.
    pub fn publish(&self, topic: &str, event: BusEvent) -> usize {
        let Some(tx) = self.topics.get(topic) else {
            return 0;
        };

        tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self, topic: &str) -> Subscription {
        let rx = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer_size).0)
            .subscribe();

        Subscription {
            topic: topic.to_string(),
            stream: Some(BroadcastStream::new(rx)),
            topics: self.topics.clone(),
        }
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map_or(0, |tx| tx.receiver_count())
    }
}

pub struct Subscription {
    topic: String,
    stream: Option<BroadcastStream<BusEvent>>,
    topics: Arc<TopicTable>,
}

impl Stream for Subscription {
    type Item = BusEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<BusEvent>> {
        let this = self.get_mut();
        loop {
            let Some(stream) = this.stream.as_mut() else {
                return Poll::Ready(None);
            };

            match ready!(Pin::new(stream).poll_next(cx)) {
                Some(Ok(event)) => return Poll::Ready(Some(event)),
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    debug!(topic = %this.topic, skipped, "subscriber lagged; dropping missed events");
                }
                None => return Poll::Ready(None),
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Release the receiver before checking whether the topic is now empty.
        self.stream.take();
        self.topics
            .remove_if(&self.topic, |_, tx| tx.receiver_count() == 0);
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use uuid::Uuid;

    use super::{trip_topic, EventBus};
    use crate::models::event::{BusEvent, TripUpdate};
    use crate::models::trip::TripStatus;

    fn update(status: TripStatus) -> BusEvent {
        BusEvent::TripUpdate(TripUpdate::status(Uuid::from_u128(1), status))
    }

    #[tokio::test]
    async fn delivers_to_every_subscriber_of_topic() {
        let bus = EventBus::new(16);
        let topic = trip_topic(Uuid::from_u128(1));
        let mut first = bus.subscribe(&topic);
        let mut second = bus.subscribe(&topic);

        assert_eq!(bus.publish(&topic, update(TripStatus::Assigned)), 2);

        assert_eq!(first.next().await, Some(update(TripStatus::Assigned)));
        assert_eq!(second.next().await, Some(update(TripStatus::Assigned)));
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let bus = EventBus::new(16);
        let mut a = bus.subscribe("trip:a");
        let _b = bus.subscribe("trip:b");

        bus.publish("trip:b", update(TripStatus::Cancelled));
        bus.publish("trip:a", update(TripStatus::Assigned));

        assert_eq!(a.next().await, Some(update(TripStatus::Assigned)));
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish("trip:x", update(TripStatus::Assigned)), 0);
        assert_eq!(bus.topic_count(), 0);
    }

    #[tokio::test]
    async fn late_subscriber_gets_no_replay() {
        let bus = EventBus::new(16);
        let _early = bus.subscribe("trip:x");
        bus.publish("trip:x", update(TripStatus::Assigned));

        let mut late = bus.subscribe("trip:x");
        bus.publish("trip:x", update(TripStatus::Enroute));

        assert_eq!(late.next().await, Some(update(TripStatus::Enroute)));
    }

    #[test]
    fn dropping_last_subscription_removes_topic() {
        let bus = EventBus::new(16);
        let first = bus.subscribe("trip:x");
        let second = bus.subscribe("trip:x");
        assert_eq!(bus.subscriber_count("trip:x"), 2);

        drop(first);
        assert_eq!(bus.subscriber_count("trip:x"), 1);
        assert_eq!(bus.topic_count(), 1);

        drop(second);
        assert_eq!(bus.topic_count(), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_never_blocks_publisher() {
        let bus = EventBus::new(2);
        let mut slow = bus.subscribe("trip:x");

        for _ in 0..10 {
            bus.publish("trip:x", update(TripStatus::Enroute));
        }
        bus.publish("trip:x", update(TripStatus::Completed));

        // Lagged events are skipped; the newest ones are still delivered.
        assert_eq!(slow.next().await, Some(update(TripStatus::Enroute)));
        assert_eq!(slow.next().await, Some(update(TripStatus::Completed)));
    }
}
