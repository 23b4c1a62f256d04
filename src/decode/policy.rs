//! Ingestion buffer sizing
//!
//! Bounds total native memory when many channels stream at once while
//! leaving headroom for low-count, high-resolution walls.

const MIB: usize = 1024 * 1024;

/// Engine source-buffer size for one session, given how many sessions are
/// live process-wide and whether this one pulls the secondary (low-res)
/// stream. Pure function.
///
/// Tiers: up to 4 sessions get 5 MiB each, up to 16 get 3 MiB, anything
/// beyond gets 1 MiB. Secondary streams halve the tier result.
pub fn ingest_buffer_size(active_sessions: usize, is_secondary: bool) -> usize {
    let tier = if active_sessions <= 4 {
        5 * MIB
    } else if active_sessions <= 16 {
        3 * MIB
    } else {
        MIB
    };
    if is_secondary { tier / 2 } else { tier }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_table() {
        // (active sessions, secondary, expected bytes)
        let cases = [
            (1, false, 5 * MIB),
            (4, false, 5 * MIB),
            (5, false, 3 * MIB),
            (16, false, 3 * MIB),
            (17, false, MIB),
            (100, false, MIB),
            (1, true, 5 * MIB / 2),
            (4, true, 5 * MIB / 2),
            (5, true, 3 * MIB / 2),
            (16, true, 3 * MIB / 2),
            (17, true, MIB / 2),
            (100, true, MIB / 2),
        ];
        for (count, secondary, expected) in cases {
            assert_eq!(
                ingest_buffer_size(count, secondary),
                expected,
                "count={count} secondary={secondary}"
            );
        }
    }

    #[test]
    fn boundaries_are_exact() {
        assert_ne!(ingest_buffer_size(4, false), ingest_buffer_size(5, false));
        assert_ne!(ingest_buffer_size(16, false), ingest_buffer_size(17, false));
    }
}
