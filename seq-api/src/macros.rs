/// Logging macro with explicit level selection.
///
/// Forwards to [`tracing`] macros. During tests it prints to `stdout`,
/// preserving the log level for context, so failures show the request trail.
///
/// # Examples
/// ```
/// use seq_api::seq_log;
/// # fn main() {
/// seq_log!(debug, "following link {}", "Items");
/// seq_log!(warn, "slow response from {}", "localhost");
/// # }
/// ```
#[macro_export]
macro_rules! seq_log {
    ($level:ident, $($arg:tt)*) => {
        #[cfg(not(test))]
        tracing::$level!($($arg)*);
        #[cfg(test)]
        println!("[{}] {}", stringify!($level), format_args!($($arg)*));
    };
}
