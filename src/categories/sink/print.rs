//! Print block
//!
//! Writes one `"<time> <value>"` line per step, where time is the step index
//! times the container's step size.

use std::io::{self, Stdout, Write};

use tracing::warn;

use crate::categories::BlockCategory;
use crate::core::block::{Block, StepContext, StepOutcome};

/// Sink that writes each input value with its simulated time.
pub struct Print<W: Write + Send = Stdout> {
    out: W,
    failed: bool,
}

impl Print<Stdout> {
    /// Print to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl Default for Print<Stdout> {
    fn default() -> Self {
        Self::stdout()
    }
}

impl<W: Write + Send> Print<W> {
    pub fn new(out: W) -> Self {
        Self { out, failed: false }
    }

    /// The underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Block for Print<W> {
    fn inputs(&self) -> usize {
        1
    }

    fn outputs(&self) -> usize {
        0
    }

    fn step(&mut self, ctx: &StepContext, inputs: &[f64], _outputs: &mut [f64]) -> StepOutcome {
        if let Err(err) = writeln!(self.out, "{} {}", ctx.time(), inputs[0]) {
            // Report once; a broken pipe would otherwise log every step.
            if !self.failed {
                warn!(error = %err, "print block failed to write");
                self.failed = true;
            }
        }
        StepOutcome::Continue
    }

    fn name(&self) -> &str {
        "Print"
    }

    fn category(&self) -> BlockCategory {
        BlockCategory::Sink
    }

    fn on_stop(&mut self) {
        if let Err(err) = self.out.flush() {
            warn!(error = %err, "print block failed to flush");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_writes_time_and_value() {
        let mut print = Print::new(Vec::new());
        let mut ctx = StepContext::new(0.5);
        for value in [1.0, -2.0, 0.25] {
            print.step(&ctx, &[value], &mut []);
            ctx.tick += 1;
        }
        print.on_stop();

        let text = String::from_utf8(print.into_inner()).unwrap();
        assert_eq!(text, "0 1\n0.5 -2\n1 0.25\n");
    }

    #[test]
    fn test_print_name_ignores_writer_type() {
        assert_eq!(Print::new(Vec::new()).name(), "Print");
        assert_eq!(Print::stdout().category(), BlockCategory::Sink);
    }
}
