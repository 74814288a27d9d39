//! Progress reporting.
//!
//! The engine reports steps, per-item increments and free-form output text
//! (tool output, error listings) to a caller-supplied [`ProgressSink`].
//! [`ChannelProgress`] forwards everything over a tokio channel so a UI task
//! can render it without blocking the engine.

use tokio::sync::mpsc;

/// Receiver of engine progress.
pub trait ProgressSink: Send + Sync {
    /// Title of the whole operation.
    fn set_title(&self, _title: &str) {}

    /// Start a named step with `total` expected increments.
    fn set_step(&self, text: &str, total: usize);

    /// Advance the current step, optionally naming the item just started.
    fn increase_step(&self, label: Option<&str>);

    /// Show or hide the progress display.
    fn set_visible(&self, _visible: bool) {}

    /// Append output text (tool output, error reports).
    fn output(&self, text: &str);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn set_step(&self, _text: &str, _total: usize) {}

    fn increase_step(&self, _label: Option<&str>) {}

    fn output(&self, _text: &str) {}
}

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Title(String),
    Step { text: String, total: usize },
    Increase(Option<String>),
    Visible(bool),
    Output(String),
}

/// Sink forwarding events over an unbounded channel.
///
/// Unbounded so reporting never blocks a checkpoint; events are small and a
/// batch emits a bounded number of them.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    /// Create a sink and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: ProgressEvent) {
        // Receiver gone means nobody is watching
        let _ = self.tx.send(event);
    }
}

impl ProgressSink for ChannelProgress {
    fn set_title(&self, title: &str) {
        self.send(ProgressEvent::Title(title.to_string()));
    }

    fn set_step(&self, text: &str, total: usize) {
        self.send(ProgressEvent::Step {
            text: text.to_string(),
            total,
        });
    }

    fn increase_step(&self, label: Option<&str>) {
        self.send(ProgressEvent::Increase(label.map(str::to_string)));
    }

    fn set_visible(&self, visible: bool) {
        self.send(ProgressEvent::Visible(visible));
    }

    fn output(&self, text: &str) {
        self.send(ProgressEvent::Output(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_progress_forwards_events() {
        let (sink, mut rx) = ChannelProgress::new();
        sink.set_step("Reading tags ...", 2);
        sink.increase_step(Some("/a"));
        sink.output("done\n");
        drop(sink);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                ProgressEvent::Step {
                    text: "Reading tags ...".into(),
                    total: 2
                },
                ProgressEvent::Increase(Some("/a".into())),
                ProgressEvent::Output("done\n".into()),
            ]
        );
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (sink, rx) = ChannelProgress::new();
        drop(rx);
        sink.output("ignored");
    }
}
