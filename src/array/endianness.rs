use derive_more::Display;

/// The byte order of stored elements, either `big` or `little`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub enum Endianness {
    /// Little endian.
    #[display("little")]
    Little,

    /// Big endian.
    #[display("big")]
    Big,
}

impl Endianness {
    /// Return true if the endianness matches the endianness of the CPU.
    #[must_use]
    pub fn is_native(self) -> bool {
        self == NATIVE_ENDIAN
    }
}

/// The endianness of the CPU.
pub const NATIVE_ENDIAN: Endianness = if cfg!(target_endian = "big") {
    Endianness::Big
} else {
    Endianness::Little
};

/// Reverse the byte order of every `unit` byte word of `bytes`.
pub(crate) fn reverse_words(bytes: &mut [u8], unit: usize) {
    if unit > 1 {
        for word in bytes.chunks_exact_mut(unit) {
            word.reverse();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endianness_reverse_words() {
        let mut bytes = [1u8, 2, 3, 4, 5, 6];
        reverse_words(&mut bytes, 2);
        assert_eq!(bytes, [2, 1, 4, 3, 6, 5]);
        reverse_words(&mut bytes, 1);
        assert_eq!(bytes, [2, 1, 4, 3, 6, 5]);
        assert_eq!(Endianness::Big.to_string(), "big");
        assert!(Endianness::Little.is_native() != Endianness::Big.is_native());
    }
}
