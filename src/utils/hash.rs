//! Content fingerprints.
//!
//! Packages are fingerprinted with SHA-1 over the exact fragment bytes, in
//! declaration order. The lowercase hex digest doubles as the `?r=` cache
//! busting revision.
//!
//! # Usage
//!
//! ```ignore
//! use crate::utils::hash::Fingerprinter;
//!
//! let mut fp = Fingerprinter::new();
//! fp.update("var a=1;");
//! fp.update("var b=2;");
//! let rev = fp.finish(); // -> 40 lowercase hex chars
//! ```

use sha1::{Digest, Sha1};

/// Incremental SHA-1 over a sequence of fragments.
#[derive(Default)]
pub struct Fingerprinter {
    hasher: Sha1,
}

impl Fingerprinter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn update<T: AsRef<[u8]> + ?Sized>(&mut self, data: &T) {
        self.hasher.update(data.as_ref());
    }

    /// Finish and return the lowercase hex digest.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// One-shot fingerprint of a single buffer.
pub fn fingerprint<T: AsRef<[u8]> + ?Sized>(data: &T) -> String {
    let mut fp = Fingerprinter::new();
    fp.update(data);
    fp.finish()
}
