//! Page to physical-sheet accounting for print-size confirmation.

use serde::Serialize;

/// Sheet count above which a job needs explicit confirmation. `0` disables the check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfirmationThreshold(u32);

impl ConfirmationThreshold {
    pub const DISABLED: Self = Self(0);

    pub const fn new(sheets: u32) -> Self {
        Self(sheets)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_enabled(self) -> bool {
        self.0 > 0
    }
}

/// Page count of a rendered artifact and the sheets it will consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageEstimate {
    pub page_count: u32,
    pub is_duplex: bool,
    pub physical_sheets: u32,
}

impl PageEstimate {
    pub fn new(page_count: u32, is_duplex: bool) -> Self {
        Self {
            page_count,
            is_duplex,
            physical_sheets: physical_sheets(page_count, is_duplex),
        }
    }

    pub fn requires_confirmation(&self, threshold: ConfirmationThreshold) -> bool {
        should_confirm(self.physical_sheets, threshold)
    }
}

/// Sheets of paper needed for `page_count` pages; duplex halves it, rounding up.
pub const fn physical_sheets(page_count: u32, duplex: bool) -> u32 {
    if duplex {
        page_count.div_ceil(2)
    } else {
        page_count
    }
}

/// `true` when the job is strictly larger than an enabled threshold.
pub const fn should_confirm(physical_sheets: u32, threshold: ConfirmationThreshold) -> bool {
    threshold.is_enabled() && physical_sheets > threshold.get()
}
