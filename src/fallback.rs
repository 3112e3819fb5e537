//! Two-stage sink chaining a primary appender to a secondary on failure
//! (spec.md §4.5). Grounded in `appender/fallback.go` of the original
//! source; error aggregation is our analogue of `go.uber.org/multierr`.

use crate::entry::LogEntry;
use crate::error::{AppenderError, AppenderResult};
use crate::Appender;

/// Tries `primary` first; on failure, tries `secondary`. Does not reorder:
/// the secondary only ever sees a message after the primary's attempt for
/// it has failed.
pub struct Fallback {
    primary: Box<dyn Appender>,
    secondary: Box<dyn Appender>,
}

impl Fallback {
    /// Build a `Fallback` chaining `primary` to `secondary`.
    pub fn new(primary: Box<dyn Appender>, secondary: Box<dyn Appender>) -> Self {
        Fallback { primary, secondary }
    }
}

impl Appender for Fallback {
    fn write(&self, payload: &[u8], entry: &LogEntry) -> AppenderResult<usize> {
        match self.primary.write(payload, entry) {
            Ok(n) => Ok(n),
            Err(primary_err) => match self.secondary.write(payload, entry) {
                Ok(n) => Ok(n),
                Err(secondary_err) => Err(AppenderError::aggregate(vec![primary_err, secondary_err])),
            },
        }
    }

    fn sync(&self) -> AppenderResult<()> {
        let primary = self.primary.sync();
        let secondary = self.secondary.sync();
        match (primary, secondary) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(a), Ok(())) => Err(a),
            (Ok(()), Err(b)) => Err(b),
            (Err(a), Err(b)) => Err(AppenderError::aggregate(vec![a, b])),
        }
    }

    fn is_synchronized(&self) -> bool {
        self.primary.is_synchronized() && self.secondary.is_synchronized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discard::Discard;
    use crate::sink::ByteSink;
    use crate::writer::Writer;
    use std::sync::Mutex;

    fn entry() -> LogEntry {
        LogEntry::new(slog::Level::Info, "test", "hi")
    }

    struct Failing;
    impl Appender for Failing {
        fn write(&self, _payload: &[u8], _entry: &LogEntry) -> AppenderResult<usize> {
            Err(AppenderError::FailEnabled)
        }
        fn sync(&self) -> AppenderResult<()> {
            Err(AppenderError::FailEnabled)
        }
        fn is_synchronized(&self) -> bool {
            true
        }
    }

    #[test]
    fn primary_success_skips_secondary() {
        let fb = Fallback::new(Box::new(Discard), Box::new(Failing));
        assert_eq!(fb.write(b"x", &entry()).unwrap(), 1);
    }

    #[test]
    fn primary_failure_falls_through_to_secondary() {
        let buf = Mutex::new(Vec::new());
        let fb = Fallback::new(Box::new(Failing), Box::new(Writer::new(buf)));
        let n = fb.write(b"x", &entry()).unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn both_failing_aggregates_errors() {
        let fb = Fallback::new(Box::new(Failing), Box::new(Failing));
        match fb.write(b"x", &entry()) {
            Err(AppenderError::Aggregate(errs)) => assert_eq!(errs.len(), 2),
            other => panic!("expected aggregate error, got {:?}", other),
        }
    }
}
