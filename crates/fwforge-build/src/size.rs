use std::path::Path;

use fwforge_core::board::BoardDescriptor;
use fwforge_core::command::CommandLine;
use fwforge_core::toolchain::Toolchain;
use tracing::info;

use crate::builder::{BuildError, BuildResult};

/// Board memory budget in bytes; `None` means unchecked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryLimits {
    pub flash: Option<u64>,
    pub ram: Option<u64>,
}

impl MemoryLimits {
    pub fn from_board(board: &BoardDescriptor) -> Self {
        Self {
            flash: board.maximum_size(),
            ram: board.maximum_ram_size(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SizeReport {
    pub program: u64,
    pub data: u64,
}

pub fn size_print_command(toolchain: &Toolchain, program: &Path) -> CommandLine {
    CommandLine::new(&toolchain.size, format!("Calculating size {}", program.display()))
        .args(toolchain.size_print_args())
        .arg(program.to_string_lossy())
}

pub fn size_check_command(toolchain: &Toolchain, program: &Path) -> CommandLine {
    CommandLine::new(&toolchain.size, format!("Checking size {}", program.display()))
        .args(toolchain.size_check_args())
        .arg(program.to_string_lossy())
}

/// Sum section sizes from System V (`-A -d`) output.
pub fn parse_section_sizes(output: &str, toolchain: &Toolchain) -> SizeReport {
    let mut report = SizeReport::default();
    for line in output.lines() {
        let mut fields = line.split_whitespace();
        let (Some(name), Some(size)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Ok(size) = size.parse::<u64>() else {
            continue;
        };
        if toolchain.program_sections.iter().any(|section| section == name) {
            report.program += size;
        }
        if toolchain.data_sections.iter().any(|section| section == name) {
            report.data += size;
        }
    }
    report
}

/// Log usage and fail when either region exceeds its limit.
pub fn check_size(report: SizeReport, limits: MemoryLimits) -> BuildResult<()> {
    log_usage("RAM", report.data, limits.ram);
    log_usage("Flash", report.program, limits.flash);
    if let Some(limit) = limits.ram {
        if report.data > limit {
            return Err(BuildError::SizeLimitExceeded {
                region: "RAM",
                used: report.data,
                limit,
            });
        }
    }
    if let Some(limit) = limits.flash {
        if report.program > limit {
            return Err(BuildError::SizeLimitExceeded {
                region: "Flash",
                used: report.program,
                limit,
            });
        }
    }
    Ok(())
}

fn log_usage(region: &str, used: u64, limit: Option<u64>) {
    match limit {
        Some(limit) if limit > 0 => info!(
            "{:<6} {:>6.1}% (used {} bytes from {} bytes)",
            format!("{}:", region),
            used as f64 * 100.0 / limit as f64,
            used,
            limit
        ),
        _ => info!("{:<6} used {} bytes", format!("{}:", region), used),
    }
}
