//! Attachment packing and re-upload.
//!
//! Attachments collected from a closing ticket are packed first-fit into
//! groups bounded by [`MAX_ARCHIVE_BYTES`], downloaded, and re-uploaded to
//! the transcript channel. Single-file groups are uploaded as-is; larger
//! groups are bundled into a zip. A global cap of
//! [`MAX_TOTAL_ATTACHMENT_BYTES`] bounds the whole ticket; anything past it
//! is dropped with a log line.

use std::io::{Cursor, Write};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::chat::{Attachment, ChannelId, TransferService};
use crate::metrics;
use crate::ticket::Ticket;

/// Upper bound on the uncompressed payload of a single uploaded archive.
pub const MAX_ARCHIVE_BYTES: u64 = 40_000_000;

/// Upper bound on total attachment bytes archived per ticket.
pub const MAX_TOTAL_ATTACHMENT_BYTES: u64 = 500_000_000;

/// A set of attachments destined for one upload.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AttachmentGroup {
    pub attachments: Vec<Attachment>,
    pub size_bytes: u64,
}

/// Pack attachments into upload groups, first-fit by declared size.
///
/// Each attachment lands in the first group it fits without pushing that
/// group past [`MAX_ARCHIVE_BYTES`]; otherwise it opens a new group, even if
/// it alone exceeds the per-archive bound. Attachments past the global cap
/// are dropped entirely.
pub fn pack_attachments(attachments: &[Attachment]) -> Vec<AttachmentGroup> {
    let mut groups: Vec<AttachmentGroup> = Vec::new();
    let mut total: u64 = 0;

    'outer: for attachment in attachments {
        total += attachment.size_bytes;
        if total > MAX_TOTAL_ATTACHMENT_BYTES {
            warn!(
                filename = %attachment.filename,
                size = attachment.size_bytes,
                "dropping attachment, ticket exceeds the total archive cap"
            );
            metrics::ATTACHMENTS_SKIPPED
                .with_label_values(&["size_cap"])
                .inc();
            continue;
        }

        for group in groups.iter_mut() {
            if group.size_bytes + attachment.size_bytes <= MAX_ARCHIVE_BYTES {
                group.size_bytes += attachment.size_bytes;
                group.attachments.push(attachment.clone());
                continue 'outer;
            }
        }

        groups.push(AttachmentGroup {
            size_bytes: attachment.size_bytes,
            attachments: vec![attachment.clone()],
        });
    }

    groups
}

/// Outcome counters for one archival run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub uploads: usize,
    pub files_archived: usize,
    pub files_failed: usize,
}

pub struct AttachmentArchiver {
    transfer: Arc<dyn TransferService>,
}

impl AttachmentArchiver {
    pub fn new(transfer: Arc<dyn TransferService>) -> Self {
        Self { transfer }
    }

    /// Download a ticket's attachments and re-upload them to `destination`.
    ///
    /// Failures never abort the run: an attachment that cannot be fetched is
    /// skipped, a group that cannot be uploaded is logged and the next group
    /// proceeds.
    pub async fn archive(
        &self,
        ticket: &Ticket,
        destination: ChannelId,
        attachments: &[Attachment],
    ) -> ArchiveSummary {
        let groups = pack_attachments(attachments);
        let mut summary = ArchiveSummary::default();

        for group in &groups {
            let downloads = join_all(
                group
                    .attachments
                    .iter()
                    .map(|a| self.download_one(a)),
            )
            .await;

            let files: Vec<(&Attachment, Vec<u8>)> = group
                .attachments
                .iter()
                .zip(downloads)
                .filter_map(|(a, data)| data.map(|d| (a, d)))
                .collect();

            summary.files_failed += group.attachments.len() - files.len();
            if files.is_empty() {
                continue;
            }

            let (filename, payload) = if group.attachments.len() == 1 {
                let (attachment, data) = &files[0];
                (
                    format!(
                        "attachments-{}-{}-{}",
                        ticket.local_id, ticket.title, attachment.filename
                    ),
                    data.clone(),
                )
            } else {
                let payload = match build_zip(&files) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(error = %e, "failed to build attachment archive, skipping group");
                        summary.files_failed += files.len();
                        continue;
                    }
                };
                (
                    format!("attachments-{}-{}.zip", ticket.local_id, ticket.title),
                    payload,
                )
            };

            let payload_len = payload.len() as u64;
            match self
                .transfer
                .upload_file(destination, &filename, payload, None)
                .await
            {
                Ok(()) => {
                    debug!(%filename, files = files.len(), "uploaded attachment archive");
                    summary.uploads += 1;
                    summary.files_archived += files.len();
                    metrics::ATTACHMENTS_ARCHIVED.inc_by(files.len() as u64);
                    metrics::ARCHIVE_BYTES_UPLOADED.inc_by(payload_len);
                }
                Err(e) => {
                    warn!(%filename, error = %e, "failed to upload attachment archive");
                    summary.files_failed += files.len();
                }
            }
        }

        summary
    }

    async fn download_one(&self, attachment: &Attachment) -> Option<Vec<u8>> {
        match self.transfer.download(&attachment.url).await {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(filename = %attachment.filename, error = %e, "attachment download failed");
                metrics::ATTACHMENTS_SKIPPED
                    .with_label_values(&["download_failed"])
                    .inc();
                None
            }
        }
    }
}

fn build_zip(files: &[(&Attachment, Vec<u8>)]) -> Result<Vec<u8>, zip::result::ZipError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (attachment, data) in files {
        writer.start_file(attachment.filename.as_str(), options)?;
        writer.write_all(data)?;
    }

    Ok(writer.finish()?.into_inner())
}
