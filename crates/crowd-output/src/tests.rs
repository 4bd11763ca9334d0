//! Unit tests for crowd-output.

#[cfg(test)]
mod helpers {
    use std::time::Duration;

    use async_trait::async_trait;

    use crowd_agent::{AgentSnapshot, EventPhase, KindTag};
    use crowd_core::AgentId;

    use crate::{Frame, OutputError, OutputResult, Subscriber};

    pub fn snap(id: u64, kind: KindTag, phase: Option<EventPhase>) -> AgentSnapshot {
        AgentSnapshot {
            id:    AgentId(id),
            lat:   23.18,
            lon:   75.77,
            kind,
            phase,
            speed: 0.0005,
            stop:  false,
        }
    }

    pub fn frame_of(n: u64) -> Vec<AgentSnapshot> {
        (0..n).map(|i| snap(i, KindTag::Generic, None)).collect()
    }

    /// Rejects every frame.
    pub struct Broken;

    #[async_trait]
    impl Subscriber for Broken {
        async fn deliver(&mut self, _frame: &Frame) -> OutputResult<()> {
            Err(OutputError::Closed)
        }
    }

    /// Never finishes a delivery in time.
    pub struct Stalled;

    #[async_trait]
    impl Subscriber for Stalled {
        async fn deliver(&mut self, _frame: &Frame) -> OutputResult<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod frame {
    use crowd_agent::{EventPhase, KindTag};

    use super::helpers::snap;
    use crate::Frame;

    #[test]
    fn json_is_an_array_of_projections() {
        let frame = Frame::encode(7, vec![snap(1, KindTag::Event, Some(EventPhase::Dwelling))]).unwrap();
        assert_eq!(frame.seq, 7);
        assert_eq!(frame.len(), 1);
        let v: serde_json::Value = serde_json::from_str(&frame.json).unwrap();
        let a = &v.as_array().unwrap()[0];
        assert_eq!(a["id"], 1);
        assert_eq!(a["type"], "event");
        assert_eq!(a["phase"], "dwelling");
        assert_eq!(a["stop"], false);
    }
}

#[cfg(test)]
mod channel {
    use crate::{ChannelSubscriber, Frame, OutputError, Subscriber};

    use super::helpers::frame_of;

    #[tokio::test]
    async fn forwards_json_until_full() {
        let (mut sub, mut rx) = ChannelSubscriber::new(1);
        let frame = Frame::encode(0, frame_of(2)).unwrap();
        sub.deliver(&frame).await.unwrap();
        assert!(matches!(sub.deliver(&frame).await, Err(OutputError::Full)));
        assert_eq!(&*rx.recv().await.unwrap(), &*frame.json);
    }

    #[tokio::test]
    async fn closed_receiver_fails() {
        let (mut sub, rx) = ChannelSubscriber::new(4);
        drop(rx);
        let frame = Frame::encode(0, frame_of(1)).unwrap();
        assert!(matches!(sub.deliver(&frame).await, Err(OutputError::Closed)));
    }
}

#[cfg(test)]
mod publisher {
    use std::time::Duration;

    use crowd_sim::SimObserver;

    use super::helpers::{frame_of, Broken, Stalled};
    use crate::{ChannelSubscriber, Publisher};

    #[tokio::test]
    async fn no_subscribers_skips_the_frame() {
        let mut publisher = Publisher::new(Duration::from_secs(1));
        assert!(!publisher.wants_frame());
        let stats = publisher.publish(frame_of(3)).await;
        assert!(stats.skipped);
        assert_eq!(publisher.frames(), 0);
    }

    #[tokio::test]
    async fn failing_subscriber_is_dropped_and_others_keep_receiving() {
        let mut publisher = Publisher::new(Duration::from_secs(1));
        let handle = publisher.handle();
        let (healthy, mut rx) = ChannelSubscriber::new(8);
        handle.subscribe(healthy);
        handle.subscribe(Broken);
        assert_eq!(handle.subscriber_count(), 2);

        let first = publisher.publish(frame_of(2)).await;
        assert_eq!((first.delivered, first.dropped, first.agents), (1, 1, 2));
        assert_eq!(handle.subscriber_count(), 1);

        let second = publisher.publish(frame_of(3)).await;
        assert_eq!((second.delivered, second.dropped), (1, 0));

        assert!(rx.recv().await.unwrap().starts_with('['));
        let latest: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(latest.as_array().unwrap().len(), 3);
        assert_eq!(publisher.frames(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_subscriber_times_out() {
        let mut publisher = Publisher::new(Duration::from_secs(1));
        let handle = publisher.handle();
        let (healthy, mut rx) = ChannelSubscriber::new(8);
        handle.subscribe(Stalled);
        handle.subscribe(healthy);

        let stats = publisher.publish(frame_of(1)).await;
        assert_eq!((stats.delivered, stats.dropped), (1, 1));
        assert_eq!(handle.subscriber_count(), 1);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn unsubscribe_removes_and_reports() {
        let publisher = Publisher::new(Duration::from_secs(1));
        let handle = publisher.handle();
        let (sub, _rx) = ChannelSubscriber::new(1);
        let id = handle.subscribe(sub);
        assert!(publisher.wants_frame());
        assert!(handle.unsubscribe(id));
        assert!(!handle.unsubscribe(id));
        assert!(!publisher.wants_frame());
    }
}

#[cfg(test)]
mod csv_tests {
    use std::io::Write;
    use std::sync::mpsc;
    use std::time::Duration;

    use tempfile::TempDir;

    use crowd_agent::{EventPhase, KindTag};
    use crowd_sim::SimObserver;

    use super::helpers::snap;
    use crate::csv::{QUEUE_FRAMES, SNAPSHOT_FILE};
    use crate::{ChannelSubscriber, CsvRecorder, Publisher};

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    #[test]
    fn header_written_on_create() {
        let dir = tmp();
        let _rec = CsvRecorder::new(dir.path()).unwrap();
        let mut rdr = ::csv::Reader::from_path(dir.path().join(SNAPSHOT_FILE)).unwrap();
        let headers: Vec<_> = rdr.headers().unwrap().iter().map(str::to_owned).collect();
        assert_eq!(headers, ["frame", "id", "lat", "lon", "type", "phase", "speed", "stop"]);
    }

    #[tokio::test]
    async fn records_every_frame_through_the_publisher() {
        let dir = tmp();
        let mut publisher = Publisher::new(Duration::from_secs(1));
        publisher.handle().subscribe(CsvRecorder::new(dir.path()).unwrap());

        publisher.on_frame(vec![snap(1, KindTag::Random, None), snap(2, KindTag::Event, Some(EventPhase::ToDest))]).await;
        publisher.on_frame(vec![snap(1, KindTag::Random, None)]).await;
        publisher.on_shutdown().await;

        let mut rdr = ::csv::Reader::from_path(dir.path().join(SNAPSHOT_FILE)).unwrap();
        let rows: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][0], "0"); // frame
        assert_eq!(&rows[0][4], "random");
        assert_eq!(&rows[0][5], "");
        assert_eq!(&rows[1][1], "2");
        assert_eq!(&rows[1][5], "to_dest");
        assert_eq!(&rows[2][0], "1");
    }

    /// Blocks every write after the header until the gate's sender is gone.
    struct Gated {
        gate:   mpsc::Receiver<()>,
        writes: usize,
    }

    impl Write for Gated {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.writes > 0 {
                let _ = self.gate.recv();
            }
            self.writes += 1;
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_disk_does_not_hold_up_other_subscribers() {
        let (open, gate) = mpsc::channel();
        let recorder = CsvRecorder::from_writer(Gated { gate, writes: 0 }).unwrap();

        let mut publisher = Publisher::new(Duration::from_secs(1));
        let handle = publisher.handle();
        handle.subscribe(recorder);
        let (live, mut rx) = ChannelSubscriber::new(64);
        handle.subscribe(live);

        // Frames queue up while the writer is stuck; once the queue is full
        // the recorder times out and is dropped.
        let mut dropped_at = None;
        for n in 0..QUEUE_FRAMES + 3 {
            let stats = publisher.publish(vec![snap(n as u64, KindTag::Random, None)]).await;
            assert!(stats.delivered >= 1);
            if stats.dropped == 1 {
                dropped_at = Some(n);
                break;
            }
        }
        let dropped_at = dropped_at.expect("recorder was never dropped");
        assert!(dropped_at >= QUEUE_FRAMES - 1);
        assert_eq!(handle.subscriber_count(), 1);

        for _ in 0..=dropped_at {
            assert!(rx.try_recv().is_ok());
        }
        drop(open);
    }
}
