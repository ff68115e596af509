use bytesize::ByteSize;
use tracing::warn;

use crate::events::Event;

/// Aggregates sink events and produces user-facing output.
///
/// Conflicts are reported immediately; non-error action lines are queued
/// and only flushed by the orchestrator once the whole preview came back
/// clean, so a conflicted run shows the errors and nothing else. In JSON
/// mode every event is emitted to stdout as one JSON line, in order.
pub struct Reporter {
    events: Vec<Event>,
    queue: Vec<String>,
    json_mode: bool,
}

impl Reporter {
    pub fn new(json_mode: bool) -> Self {
        Self {
            events: Vec::new(),
            queue: Vec::new(),
            json_mode,
        }
    }

    pub fn record(&mut self, event: Event) {
        if self.json_mode {
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{}", line);
            }
        } else {
            match &event {
                Event::Error { path, description } => {
                    warn!("ERROR! {} {}.", path.display(), description.describe());
                }
                Event::Create { path, size } => self
                    .queue
                    .push(format!("CREATE {} ({})", path.display(), ByteSize(*size))),
                Event::Update { path, size } => self
                    .queue
                    .push(format!("UPDATE {} ({})", path.display(), ByteSize(*size))),
                Event::Delete { path } => {
                    self.queue.push(format!("DELETE {}", path.display()));
                }
                Event::Rename { from, to } => self
                    .queue
                    .push(format!("RENAME {} => {}", from.display(), to.display())),
            }
        }
        self.events.push(event);
    }

    /// Print the queued non-error action lines.
    pub fn flush(&mut self) {
        for line in self.queue.drain(..) {
            println!("{}", line);
        }
    }

    /// Every event recorded so far, in order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn had_error(&self) -> bool {
        self.events.iter().any(Event::is_error)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
