//! # nahfunk-observability
//!
//! Structured Logging fuer den Nahfunk-Client via tracing-subscriber
//! (Text oder JSON, Filter per `NF_LOG_LEVEL`).

pub mod logging;

pub use logging::{
    log_format_gueltig, log_level_gueltig, logging_initialisieren, LogFormat, LoggingError,
};
