use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Layer, Registry};

/// Collects the debug rendering of every emitted event.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{event:?}"));
    }
}

#[tokio::test]
async fn failed_run_is_traced() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = Registry::default().with(EventCollector {
        events: events.clone(),
    });
    let _guard = tracing::subscriber::set_default(subscriber);

    use clap::Parser;
    use glci_promote::{run, Cli};

    let cli = Cli::try_parse_from([
        "glci-promote",
        "--committish",
        "abcdef123456",
        "--gardenlinux-epoch",
        "1443",
        "--cicd-cfg-file",
        "/definitely/not/here/cicd.yaml",
    ])
    .unwrap();

    assert!(run(cli).await.is_err());

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("Starting promotion")),
        "Expected a 'Starting promotion' event, got: {event_msgs:?}"
    );
    assert!(
        event_msgs.iter().any(|msg| msg.contains("Failed to read config file")),
        "Expected the config read failure to be traced, got: {event_msgs:?}"
    );
}
