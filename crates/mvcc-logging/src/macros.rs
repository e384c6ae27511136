//! ---
//! mvcc_section: "03-logging"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Structured logging context and lifecycle events."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
/// Emit an informational log enriched with run context.
#[macro_export]
macro_rules! sim_info {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::INFO,
            dialect = ctx.dialect.unwrap_or(""),
            test = ctx.test.unwrap_or(""),
            transaction = ctx.transaction.unwrap_or(""),
            session = ctx.session,
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::INFO,
            dialect = ctx.dialect.unwrap_or(""),
            test = ctx.test.unwrap_or(""),
            transaction = ctx.transaction.unwrap_or(""),
            session = ctx.session,
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit a debug log enriched with run context.
#[macro_export]
macro_rules! sim_debug {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::DEBUG,
            dialect = ctx.dialect.unwrap_or(""),
            test = ctx.test.unwrap_or(""),
            transaction = ctx.transaction.unwrap_or(""),
            session = ctx.session,
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::DEBUG,
            dialect = ctx.dialect.unwrap_or(""),
            test = ctx.test.unwrap_or(""),
            transaction = ctx.transaction.unwrap_or(""),
            session = ctx.session,
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit a warning log enriched with run context.
#[macro_export]
macro_rules! sim_warn {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::WARN,
            dialect = ctx.dialect.unwrap_or(""),
            test = ctx.test.unwrap_or(""),
            transaction = ctx.transaction.unwrap_or(""),
            session = ctx.session,
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::WARN,
            dialect = ctx.dialect.unwrap_or(""),
            test = ctx.test.unwrap_or(""),
            transaction = ctx.transaction.unwrap_or(""),
            session = ctx.session,
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an error log enriched with run context.
#[macro_export]
macro_rules! sim_error {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::ERROR,
            dialect = ctx.dialect.unwrap_or(""),
            test = ctx.test.unwrap_or(""),
            transaction = ctx.transaction.unwrap_or(""),
            session = ctx.session,
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::ERROR,
            dialect = ctx.dialect.unwrap_or(""),
            test = ctx.test.unwrap_or(""),
            transaction = ctx.transaction.unwrap_or(""),
            session = ctx.session,
            message = %format_args!($($arg)+)
        );
    }};
}
