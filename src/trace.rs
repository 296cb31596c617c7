// Structural trace events, compiled out unless the `tracing` feature is on.
macro_rules! trace {
    ($($tt:tt)*) => {
        #[cfg(feature = "tracing")]
        {
            tracing::trace!($($tt)*)
        }
    };
}

pub(crate) use trace;
