#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use priority_ai::{AiConfig, AiSession, CommsRegistry, EntityId, InMemoryHost, ShipState};

pub const ME: EntityId = EntityId(1);

/// A host holding one trader in flight, and a session with an empty
/// communications table.
pub fn world() -> (InMemoryHost, AiSession) {
    let mut host = InMemoryHost::new();
    host.add_ship(ShipState::new(ME, "trader"));
    let session = AiSession::with_registry(AiConfig::default(), CommsRegistry::new());
    (host, session)
}

/// Log sink shared between a test and its subscriber.
#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    pub fn text(&self) -> String {
        let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut bytes) = self.0.lock() {
            bytes.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with `filter` applied and returns whatever was logged.
pub fn capture_logs(filter: &str, f: impl FnOnce()) -> String {
    let sink = Captured::default();
    let writer = sink.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    sink.text()
}
