use std::error::Error;
use std::fmt;

/// Renders an error and its sources on one line, separated by `: `.
///
/// The alternate `Debug` formatting of most error types is too noisy for
/// log fields; this keeps the whole chain readable in a single log line.
pub struct CompactError<'e, E>(&'e E);

impl<E> fmt::Display for CompactError<'_, E>
where
    E: Error,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(cause) = source {
            write!(f, ": {cause}")?;
            source = cause.source();
        }
        Ok(())
    }
}

pub trait FmtCompact {
    type Report<'e>: fmt::Display
    where
        Self: 'e;

    fn fmt_compact(&self) -> Self::Report<'_>;
}

impl<E> FmtCompact for E
where
    E: Error,
{
    type Report<'e>
        = CompactError<'e, E>
    where
        E: 'e;

    fn fmt_compact(&self) -> Self::Report<'_> {
        CompactError(self)
    }
}
