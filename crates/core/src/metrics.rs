//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Ticket lifecycle (opens, closes, close conflicts)
//! - Transcript retrieval (messages fetched, truncations)
//! - Attachment archival (uploads, skips, bytes)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Lifecycle Metrics
// =============================================================================

/// Ticket open attempts total by result.
pub static TICKETS_OPENED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("helpdesk_tickets_opened_total", "Total ticket open attempts"),
        &["result"], // "opened", "rejected", "failed"
    )
    .unwrap()
});

/// Tickets closed total.
pub static TICKETS_CLOSED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("helpdesk_tickets_closed_total", "Total tickets closed").unwrap()
});

/// Close requests rejected because a close was already in flight.
pub static CLOSE_CONFLICTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "helpdesk_close_conflicts_total",
        "Total close requests rejected by the in-flight guard",
    )
    .unwrap()
});

/// Close duration in seconds.
pub static CLOSE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "helpdesk_close_duration_seconds",
            "Duration of ticket close processing",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

// =============================================================================
// Transcript Metrics
// =============================================================================

/// Messages collected per transcript.
pub static TRANSCRIPT_MESSAGES: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "helpdesk_transcript_messages",
            "Number of messages collected per transcript",
        )
        .buckets(vec![10.0, 50.0, 100.0, 500.0, 1000.0, 10000.0, 100000.0]),
    )
    .unwrap()
});

/// Transcripts cut off at the message hard cap.
pub static TRANSCRIPT_TRUNCATIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "helpdesk_transcript_truncations_total",
        "Total transcripts truncated at the message cap",
    )
    .unwrap()
});

// =============================================================================
// Archival Metrics
// =============================================================================

/// Attachments archived total.
pub static ATTACHMENTS_ARCHIVED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "helpdesk_attachments_archived_total",
        "Total attachments archived to the transcript channel",
    )
    .unwrap()
});

/// Attachments skipped total by reason.
pub static ATTACHMENTS_SKIPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "helpdesk_attachments_skipped_total",
            "Total attachments skipped during archival",
        ),
        &["reason"], // "size_cap", "download_failed"
    )
    .unwrap()
});

/// Bytes uploaded to the transcript channel.
pub static ARCHIVE_BYTES_UPLOADED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "helpdesk_archive_bytes_uploaded_total",
        "Total archive bytes uploaded",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Lifecycle
        Box::new(TICKETS_OPENED.clone()),
        Box::new(TICKETS_CLOSED.clone()),
        Box::new(CLOSE_CONFLICTS.clone()),
        Box::new(CLOSE_DURATION.clone()),
        // Transcripts
        Box::new(TRANSCRIPT_MESSAGES.clone()),
        Box::new(TRANSCRIPT_TRUNCATIONS.clone()),
        // Archival
        Box::new(ATTACHMENTS_ARCHIVED.clone()),
        Box::new(ATTACHMENTS_SKIPPED.clone()),
        Box::new(ARCHIVE_BYTES_UPLOADED.clone()),
    ]
}
