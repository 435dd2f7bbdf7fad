//! Shared constants: event ids, bank tags, clock conversions, wire-format
//! field codes, and default queue settings.

/// Head (gamma frontend) singles event id.
pub const HEAD_EVENT: u16 = 1;
/// Head scaler event id.
pub const HEAD_SCALER: u16 = 2;
/// Tail (heavy-ion frontend) singles event id.
pub const TAIL_EVENT: u16 = 3;
/// Tail scaler event id.
pub const TAIL_SCALER: u16 = 4;
/// Emitted coincidence event id.
pub const COINC_EVENT: u16 = 5;
/// Emitted head-scaler passthrough id.
pub const HEAD_SCALER_OUT: u16 = 6;
/// Emitted tail-scaler passthrough id.
pub const TAIL_SCALER_OUT: u16 = 7;

/// Head frontend index in per-frontend arrays.
pub const HEAD_INDEX: usize = 0;
/// Tail frontend index in per-frontend arrays.
pub const TAIL_INDEX: usize = 1;
/// Number of frontends.
pub const NUM_FRONTENDS: usize = 2;

// Default bank tags. All of these can be overridden from the variable store.
pub const HEAD_ADC_BANK: [u8; 4] = *b"VADC";
pub const HEAD_TDC_BANK: [u8; 4] = *b"VTDC";
pub const HEAD_FPGA_BANK: [u8; 4] = *b"VTRG";
pub const TAIL_ADC_BANKS: [[u8; 4]; 2] = [*b"TLQ0", *b"TLQ1"];
pub const TAIL_TDC_BANK: [u8; 4] = *b"TLT0";
pub const TAIL_FPGA_BANK: [u8; 4] = *b"TLTR";
pub const SCALER_COUNT_BANK: [u8; 4] = *b"SCLR";
pub const SCALER_HEADER_BANK: [u8; 4] = *b"SCHD";

/// Bank element type code for u16 data.
pub const TYPE_U16: u16 = 4;
/// Bank element type code for u32 data.
pub const TYPE_U32: u16 = 6;

/// Stream record header size in bytes.
pub const EVENT_HEADER_SIZE: usize = 16;
/// Payload container header size in bytes (banks_size + flags).
pub const PAYLOAD_HEADER_SIZE: usize = 8;
/// Bank header size in bytes (tag + dtype + nwords).
pub const BANK_HEADER_SIZE: usize = 8;

/// Trigger timestamp clock frequency in ticks per second.
///
/// Trigger times on the wire are 64-bit tick counts at this frequency.
pub const CLOCK_HZ: u64 = 1_000_000_000;

/// Convert a tick count to microseconds.
pub fn ticks_to_us(ticks: u64) -> f64 {
    ticks as f64 * 1.0e6 / CLOCK_HZ as f64
}

/// Convert a signed tick difference to microseconds.
pub fn tick_diff_to_us(ticks: i64) -> f64 {
    ticks as f64 * 1.0e6 / CLOCK_HZ as f64
}

/// Convert microseconds to a tick count (saturating at zero).
pub fn us_to_ticks(us: f64) -> u64 {
    let ticks = us * CLOCK_HZ as f64 / 1.0e6;
    if ticks <= 0.0 {
        0
    } else {
        ticks as u64
    }
}

/// Convert seconds to a tick count (saturating at zero).
pub fn sec_to_ticks(sec: f64) -> u64 {
    us_to_ticks(sec * 1.0e6)
}

/// Default coincidence window: 10 microseconds.
pub const DEFAULT_COINC_WINDOW_US: f64 = 10.0;
/// Default maximum buffered time span: one second.
pub const DEFAULT_MAX_BUFFERED_SEC: f64 = 1.0;
/// Default queue flush deadline in seconds.
pub const DEFAULT_FLUSH_TIMEOUT_SEC: f64 = 30.0;
/// Default hard bound on buffered events before the exhaustion path runs.
pub const DEFAULT_MAX_QUEUED_EVENTS: usize = 1 << 24;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_conversions() {
        assert_eq!(us_to_ticks(10.0), 10_000);
        assert_eq!(sec_to_ticks(1.0), CLOCK_HZ);
        assert_eq!(ticks_to_us(10_000), 10.0);
        assert_eq!(tick_diff_to_us(-1_000), -1.0);
        assert_eq!(us_to_ticks(-5.0), 0);
    }
}
