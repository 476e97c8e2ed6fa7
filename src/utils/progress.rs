use crate::core::ProgressFn;

/// 百分比进度跟踪器
///
/// Turns byte counts into a 0-100 percentage and only forwards values that
/// are strictly greater than the last one reported.
pub struct PercentTracker {
    total_bytes: u64,
    transferred_bytes: u64,
    last_reported: Option<u8>,
    callback: ProgressFn,
}

impl PercentTracker {
    pub fn new(total_bytes: u64, callback: ProgressFn) -> Self {
        Self {
            total_bytes,
            transferred_bytes: 0,
            last_reported: None,
            callback,
        }
    }

    /// Report 0% before any byte is sent
    pub fn start(&mut self) {
        self.report(0);
    }

    pub fn add_bytes(&mut self, bytes: u64) {
        self.transferred_bytes = self.transferred_bytes.saturating_add(bytes);
        self.report(self.percentage());
    }

    /// The whole body has been handed to the transport
    pub fn finish(&mut self) {
        self.report(100);
    }

    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes
    }

    pub fn percentage(&self) -> u8 {
        if self.total_bytes == 0 {
            return 0;
        }

        let transferred = self.transferred_bytes.min(self.total_bytes) as u128;
        let total = self.total_bytes as u128;
        // 四舍五入
        ((transferred * 100 + total / 2) / total) as u8
    }

    fn report(&mut self, percent: u8) {
        if self.last_reported.is_some_and(|last| percent <= last) {
            return;
        }

        self.last_reported = Some(percent);
        (self.callback)(percent);
    }
}

/// 格式化字节数
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const UNIT_SIZE: f64 = 1024.0;

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= UNIT_SIZE && unit_index < UNITS.len() - 1 {
        size /= UNIT_SIZE;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}
