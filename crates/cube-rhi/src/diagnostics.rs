//! Driver diagnostic message sinks.
//!
//! Validation layers report problems through an asynchronous callback. This
//! module models that callback as an injected capability: a [`DiagnosticSink`]
//! is handed to [`Instance::new`](crate::instance::Instance::new) and receives
//! every driver message. Sinks observe; they never alter control flow, even
//! for messages the driver classifies as errors.

use ash::vk;
use tracing::{error, info, warn};

/// Severity of a driver diagnostic message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    Verbose,
    Info,
    Warning,
    Error,
}

impl DiagnosticSeverity {
    /// Maps Vulkan severity flags to a severity level.
    pub fn from_vk(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Self {
        if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            DiagnosticSeverity::Error
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            DiagnosticSeverity::Warning
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            DiagnosticSeverity::Info
        } else {
            DiagnosticSeverity::Verbose
        }
    }
}

/// Category of a driver diagnostic message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticKind {
    General,
    Validation,
    Performance,
}

impl DiagnosticKind {
    /// Maps Vulkan message type flags to a category.
    pub fn from_vk(kind: vk::DebugUtilsMessageTypeFlagsEXT) -> Self {
        if kind.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
            DiagnosticKind::Validation
        } else if kind.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
            DiagnosticKind::Performance
        } else {
            DiagnosticKind::General
        }
    }

    /// Returns a human-readable name for the category.
    pub fn name(self) -> &'static str {
        match self {
            DiagnosticKind::General => "General",
            DiagnosticKind::Validation => "Validation",
            DiagnosticKind::Performance => "Performance",
        }
    }
}

/// A sink for driver diagnostic messages.
///
/// Implementations must be safe to call from driver threads and must not
/// abort or panic: the recording of a message is purely observational.
pub trait DiagnosticSink: Send + Sync {
    /// Records a single driver message.
    fn record(&self, severity: DiagnosticSeverity, kind: DiagnosticKind, message: &str);
}

/// Default sink that writes every driver message through `tracing`.
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, severity: DiagnosticSeverity, kind: DiagnosticKind, message: &str) {
        match severity {
            DiagnosticSeverity::Error => error!("[Vulkan {}] {}", kind.name(), message),
            DiagnosticSeverity::Warning => warn!("[Vulkan {}] {}", kind.name(), message),
            DiagnosticSeverity::Info => info!("[Vulkan {}] {}", kind.name(), message),
            DiagnosticSeverity::Verbose => info!("[Vulkan {} Verbose] {}", kind.name(), message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        assert_eq!(
            DiagnosticSeverity::from_vk(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR),
            DiagnosticSeverity::Error
        );
        assert_eq!(
            DiagnosticSeverity::from_vk(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING),
            DiagnosticSeverity::Warning
        );
        assert_eq!(
            DiagnosticSeverity::from_vk(vk::DebugUtilsMessageSeverityFlagsEXT::INFO),
            DiagnosticSeverity::Info
        );
        assert_eq!(
            DiagnosticSeverity::from_vk(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE),
            DiagnosticSeverity::Verbose
        );
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            DiagnosticKind::from_vk(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION),
            DiagnosticKind::Validation
        );
        assert_eq!(
            DiagnosticKind::from_vk(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE),
            DiagnosticKind::Performance
        );
        assert_eq!(
            DiagnosticKind::from_vk(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL),
            DiagnosticKind::General
        );
    }

    #[test]
    fn test_tracing_sink_records_without_panicking() {
        let sink = TracingSink;
        sink.record(
            DiagnosticSeverity::Error,
            DiagnosticKind::Validation,
            "synthetic message",
        );
    }

    #[test]
    fn test_sink_is_object_safe() {
        let sink: Box<dyn DiagnosticSink> = Box::new(TracingSink);
        sink.record(DiagnosticSeverity::Info, DiagnosticKind::General, "boxed");
    }
}
