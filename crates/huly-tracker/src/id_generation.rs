//! Document id generation.
//!
//! Ids follow the platform's object-id layout: 24 lowercase hex characters
//! made of
//!
//! - 8 chars: seconds since the Unix epoch (ids sort by creation time)
//! - 10 chars: SHA-256 of the process id and start time, fixed for the process
//! - 6 chars: a process-wide counter
//!
//! Within one process ids never collide until the counter wraps (16M ids in
//! the same second). Across processes the per-process tag keeps them apart.
//!
//! # Example
//!
//! ```
//! use huly_tracker::id_generation::generate_id;
//!
//! let a = generate_id();
//! let b = generate_id();
//! assert_eq!(a.len(), 24);
//! assert_ne!(a, b);
//! ```

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};

const COUNTER_MASK: u32 = 0x00ff_ffff;

/// Number of palette slots the platform renders label colors from.
pub const LABEL_PALETTE_SIZE: u32 = 20;

static COUNTER: AtomicU32 = AtomicU32::new(0);
static PROCESS_TAG: OnceLock<String> = OnceLock::new();

/// Generate a new document id.
#[must_use]
pub fn generate_id() -> String {
    let seconds = u32::try_from(Utc::now().timestamp().max(0) & 0xffff_ffff).unwrap_or(u32::MAX);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK;
    format!("{seconds:08x}{}{count:06x}", process_tag())
}

/// Deterministic palette index for a label name.
///
/// The same name always maps to the same color, so labels created
/// implicitly by different server instances look alike.
#[must_use]
pub fn label_color(name: &str) -> u32 {
    let digest = Sha256::digest(name.to_lowercase().as_bytes());
    u32::from(digest[0]) % LABEL_PALETTE_SIZE
}

fn process_tag() -> &'static str {
    PROCESS_TAG.get_or_init(|| {
        let mut hasher = Sha256::new();
        hasher.update(std::process::id().to_le_bytes());
        hasher.update(
            Utc::now()
                .timestamp_nanos_opt()
                .unwrap_or_default()
                .to_le_bytes(),
        );
        let digest = hasher.finalize();

        digest[..5].iter().fold(String::with_capacity(10), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        })
    })
}

/// Whether `id` has the layout produced by [`generate_id`].
#[must_use]
pub fn is_generated_id(id: &str) -> bool {
    id.len() == 24 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_have_object_id_layout() {
        let id = generate_id();
        assert!(is_generated_id(&id), "unexpected layout: {id}");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let ids: HashSet<String> = (0..10_000).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_ids_share_process_tag() {
        let a = generate_id();
        let b = generate_id();
        assert_eq!(a[8..18], b[8..18]);
    }

    #[test]
    fn test_process_tag_is_stable_hex() {
        let tag = process_tag();
        assert_eq!(tag.len(), 10);
        assert!(tag.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
        assert_eq!(process_tag(), tag);
    }

    #[test]
    fn test_label_color_is_stable_and_in_palette() {
        let color = label_color("bug");
        assert_eq!(color, label_color("Bug"));
        assert!(color < LABEL_PALETTE_SIZE);
    }

    #[test]
    fn test_is_generated_id_rejects_platform_refs() {
        assert!(!is_generated_id("tracker:class:Issue"));
        assert!(!is_generated_id(""));
    }
}
