/// Timestamped logging macro.
/// Prepends `HH:MM:SS.mmm` local time to every message written to stderr.
macro_rules! tlog {
    ($($arg:tt)*) => {{
        eprintln!(
            "{} {}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            format_args!($($arg)*)
        );
    }};
}
