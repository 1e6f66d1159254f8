//! Simulates a host copying a UF2 file onto the drive.

use crate::uf2_file;
use anyhow::{bail, Context};
use uf2_bootloader_common::{Flash, GhostFat, WriteOutcome, WriteState};

/// How often a single sector write is retried while the flash is busy.
pub const MAX_RETRIES: u32 = 16;

/// Summary of one simulated copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub accepted: u32,
    pub rejected: u32,
    /// Writes that had to be repeated because the flash was busy.
    pub retries: u32,
    /// Whether every block of the upload has been seen.
    pub complete: bool,
}

/// Writes the sectors of `uf2` to the data region of `drive`.
///
/// Hosts write a copied file into free clusters, so the sector numbers are
/// arbitrary; the drive only looks at the sector content.
pub fn copy_to_drive<F: Flash, const N: usize, const M: u32>(
    drive: &mut GhostFat<'_, F>,
    uf2: &[u8],
    state: &mut WriteState<N, M>,
) -> anyhow::Result<UploadReport> {
    let first_sector = drive.geometry().data_start();
    let mut report = UploadReport::default();

    for (index, sector) in uf2_file::sectors(uf2)
        .context("refusing to copy a malformed UF2 file")?
        .enumerate()
    {
        let sector_no = first_sector + index as u32;
        let mut attempts = 0;
        loop {
            match drive.write_block(sector_no, sector, state) {
                WriteOutcome::Accepted => report.accepted += 1,
                WriteOutcome::Rejected => report.rejected += 1,
                WriteOutcome::RetryLater => {
                    attempts += 1;
                    report.retries += 1;
                    if attempts > MAX_RETRIES {
                        bail!("flash stayed busy while writing sector {}", sector_no);
                    }
                    log::debug!("Sector {} deferred, retrying", sector_no);
                    continue;
                }
            }
            break;
        }
    }

    report.complete = state.is_complete();
    log::info!(
        "Copied {} sectors: {} accepted, {} rejected, {} retries",
        report.accepted + report.rejected,
        report.accepted,
        report.rejected,
        report.retries
    );
    Ok(report)
}
