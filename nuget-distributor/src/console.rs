//! Console narration for interactive runs.

use nuget_distributor_core::report::{PipelineEvent, ProgressReporter};

/// Prints each [`PipelineEvent`] as one line: failures to stderr, everything
/// else to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn report(&self, event: &PipelineEvent) {
        if event.is_failure() {
            eprintln!("{event}");
        } else {
            println!("{event}");
        }
    }
}
