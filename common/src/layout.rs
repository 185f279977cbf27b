//! Tracepoint record layouts
//!
//! Byte offsets of the fields read from raw tracepoint records. The
//! `sock:inet_sock_set_state` record changes shape across kernels: before
//! 5.6 `protocol` is a single byte, which pulls every later field back by
//! one, and some kernels prepend an extra 8-byte header to every record.

/// Size of the optional extra record header
pub const CTX_EXTRA_HEADER: usize = 8;

/// First argument of a `syscalls:sys_enter_*` record (after the common
/// header and `__syscall_nr`)
pub const SYSCALL_ARG0_OFFSET: usize = 16;

/// Return value of a `syscalls:sys_exit_*` record
pub const SYSCALL_RET_OFFSET: usize = 16;

/// Field offsets of a `sock:inet_sock_set_state` record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChangeLayout {
    pub skaddr: usize,
    pub oldstate: usize,
    pub newstate: usize,
    pub sport: usize,
    pub dport: usize,
    pub protocol: usize,
    /// `protocol` is a `u8` rather than a `u16`
    pub protocol_u8: bool,
    pub saddr_v6: usize,
    pub daddr_v6: usize,
}

impl StateChangeLayout {
    /// Layout for kernels 5.6 and later without the extra header
    pub const CURRENT: Self = Self::new(false, false);

    #[inline(always)]
    pub const fn new(extra_padding: bool, protocol_u8: bool) -> Self {
        let base = if extra_padding { CTX_EXTRA_HEADER } else { 0 };
        let shift = if protocol_u8 { 1 } else { 0 };

        Self {
            skaddr: base + 8,
            oldstate: base + 16,
            newstate: base + 20,
            sport: base + 24,
            dport: base + 26,
            // family is at 28
            protocol: base + 30,
            protocol_u8,
            // saddr[4] and daddr[4] sit between protocol and the v6 addresses
            saddr_v6: base + 40 - shift,
            daddr_v6: base + 56 - shift,
        }
    }

    /// One past the last byte read
    pub const fn record_len(&self) -> usize {
        self.daddr_v6 + 16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_layout() {
        let layout = StateChangeLayout::CURRENT;

        assert_eq!(layout.skaddr, 8);
        assert_eq!(layout.oldstate, 16);
        assert_eq!(layout.newstate, 20);
        assert_eq!(layout.sport, 24);
        assert_eq!(layout.dport, 26);
        assert_eq!(layout.protocol, 30);
        assert!(!layout.protocol_u8);
        assert_eq!(layout.saddr_v6, 40);
        assert_eq!(layout.daddr_v6, 56);
        assert_eq!(layout.record_len(), 72);
    }

    #[test]
    fn test_narrow_protocol_shifts_addresses_only() {
        let current = StateChangeLayout::CURRENT;
        let layout = StateChangeLayout::new(false, true);

        assert!(layout.protocol_u8);
        assert_eq!(layout.skaddr, current.skaddr);
        assert_eq!(layout.oldstate, current.oldstate);
        assert_eq!(layout.newstate, current.newstate);
        assert_eq!(layout.sport, current.sport);
        assert_eq!(layout.dport, current.dport);
        assert_eq!(layout.protocol, 30);
        assert_eq!(layout.saddr_v6, 39);
        assert_eq!(layout.daddr_v6, 55);
    }

    #[test]
    fn test_extra_header_moves_every_field() {
        let current = StateChangeLayout::CURRENT;
        let layout = StateChangeLayout::new(true, false);

        assert_eq!(layout.skaddr, current.skaddr + CTX_EXTRA_HEADER);
        assert_eq!(layout.oldstate, 24);
        assert_eq!(layout.newstate, 28);
        assert_eq!(layout.sport, 32);
        assert_eq!(layout.dport, 34);
        assert_eq!(layout.protocol, 38);
        assert_eq!(layout.saddr_v6, 48);
        assert_eq!(layout.daddr_v6, 64);
    }

    #[test]
    fn test_extra_header_with_narrow_protocol() {
        let layout = StateChangeLayout::new(true, true);

        assert_eq!(layout.skaddr, 16);
        assert_eq!(layout.protocol, 38);
        assert_eq!(layout.saddr_v6, 47);
        assert_eq!(layout.daddr_v6, 63);
        assert_eq!(layout.record_len(), 79);
    }
}
