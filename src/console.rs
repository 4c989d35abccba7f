use std::io::Write;

use event::Metric;
use framework::{Accumulator, Error};
use parking_lot::Mutex;

/// Writes every metric as one line to the wrapped writer, errors are
/// logged.
pub struct ConsoleAccumulator<W> {
    writer: Mutex<W>,
}

impl ConsoleAccumulator<std::io::Stdout> {
    pub fn stdout() -> Self {
        ConsoleAccumulator::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleAccumulator<W> {
    pub fn new(writer: W) -> Self {
        ConsoleAccumulator {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send + 'static> Accumulator for ConsoleAccumulator<W> {
    fn add_metric(&self, metric: Metric) {
        let mut writer = self.writer.lock();
        if let Err(err) = writeln!(writer, "{metric}").and_then(|_| writer.flush()) {
            error!(message = "write metric failed", %err);
        }
    }

    fn add_error(&self, err: Error) {
        warn!(message = "gather failed", %err);
    }
}
