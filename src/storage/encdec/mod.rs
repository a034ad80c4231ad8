pub mod decode;
pub mod encode;

use std::ops::Range;

pub use decode::{DecodingError, DecodingResult};

pub trait Encode {
    fn encode(&self) -> Vec<u8>;
}

pub trait Decode
where
    Self: Sized,
{
    fn decode(bytes: &[u8]) -> DecodingResult<Self>;

    /// `decode` but ignoring, and not returning, any remaining bytes
    fn decode_all(bytes: &[u8]) -> Result<Self, DecodingError> {
        Self::decode(bytes).map(|x| x.0)
    }

    /// `decode` which fails if the input is not consumed entirely
    fn decode_exact(bytes: &[u8]) -> Result<Self, DecodingError> {
        match Self::decode(bytes)? {
            (value, []) => Ok(value),
            (_, rest) => Err(DecodingError::TrailingBytes(rest.len())),
        }
    }
}

#[derive(Default, Clone)]
pub struct EncodeBuilder {
    output: Vec<u8>,
}

impl EncodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append<T: Encode>(mut self, data: &T) -> Self {
        self.output.extend(data.encode());
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.output
    }
}

/// Unsigned integer with more efficient serialisation while maintaining lexicographic ordering
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
struct VarUInt(pub u128);

macro_rules! impl_to_varuint {
    ($type:ty) => {
        impl From<$type> for VarUInt {
            fn from(val: $type) -> Self {
                VarUInt(val as u128)
            }
        }
    };
}

impl_to_varuint!(usize);
impl_to_varuint!(u8);
impl_to_varuint!(u16);
impl_to_varuint!(u32);
impl_to_varuint!(u64);
impl_to_varuint!(u128);

macro_rules! impl_try_from_varuint {
    ($type:ty) => {
        impl TryFrom<VarUInt> for $type {
            type Error = DecodingError;

            fn try_from(val: VarUInt) -> Result<$type, Self::Error> {
                let inner_val = val.0;
                inner_val
                    .try_into()
                    .map_err(|_| DecodingError::VarUIntCasting(inner_val))
            }
        }
    };
}

impl_try_from_varuint!(usize);
impl_try_from_varuint!(u8);
impl_try_from_varuint!(u16);
impl_try_from_varuint!(u32);
impl_try_from_varuint!(u64);
impl_try_from_varuint!(u128);

/// Decodes a hex string (with or without a `0x` prefix) into bytes, naming `field` on failure.
pub fn decode_hex(field: impl FnOnce() -> String, value: &str) -> Result<Vec<u8>, DecodingError> {
    let stripped = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);

    hex::decode(stripped).map_err(|e| DecodingError::InvalidHex {
        field: field(),
        reason: e.to_string(),
    })
}

/// As [`decode_hex`], additionally requiring exactly `N` bytes.
pub fn decode_hex_fixed<const N: usize>(
    field: impl Fn() -> String,
    value: &str,
) -> Result<[u8; N], DecodingError> {
    let bytes = decode_hex(&field, value)?;
    let actual = bytes.len();

    bytes.try_into().map_err(|_| DecodingError::InvalidWidth {
        field: field(),
        expected: N,
        actual,
    })
}

pub fn prefix_key_range(prefix: &[u8]) -> Range<Vec<u8>> {
    let start = prefix.to_vec();
    let mut end = prefix.to_vec();

    // Work backwards to handle the case where the last byte(s) are 255
    for i in (0..end.len()).rev() {
        if end[i] != 255 {
            end[i] += 1;
            end.truncate(i + 1);
            return start..end;
        }
    }

    // If all bytes are 255, the range is unbounded at the upper end
    start..vec![]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varuint_encoding_preserves_order() {
        let values: [u64; 6] = [0, 1, 255, 256, 65_535, u64::MAX];

        let encoded: Vec<_> = values.iter().map(|v| v.encode()).collect();

        for pair in encoded.windows(2) {
            assert!(pair[0] < pair[1]);
        }

        assert_eq!(0u64.encode(), vec![0]);
        assert_eq!(256u32.encode(), vec![2, 1, 0]);
    }

    #[test]
    fn varuint_rejects_oversized_length() {
        let bytes = [17u8; 18];
        assert!(u128::decode(&bytes).is_err());
    }

    #[test]
    fn vec_length_beyond_input_is_an_error() {
        // claims 200 elements but only carries one
        let bytes = [1u8, 200, 7];
        assert!(Vec::<u8>::decode(&bytes).is_err());
    }

    #[test]
    fn option_and_tuple_roundtrip() {
        let value: (Option<u32>, Option<[u8; 2]>) = (Some(42), None);
        let bytes = value.encode();

        assert_eq!(<(Option<u32>, Option<[u8; 2]>)>::decode_exact(&bytes), Ok(value));
    }

    #[test]
    fn decode_exact_reports_trailing_bytes() {
        let mut bytes = 7u32.encode();
        bytes.push(0xAA);

        assert_eq!(
            u32::decode_exact(&bytes),
            Err(DecodingError::TrailingBytes(1))
        );
        assert_eq!(u32::decode_all(&bytes), Ok(7));
    }

    #[test]
    fn hex_helpers_name_the_field() {
        assert_eq!(decode_hex(|| "a".into(), "0xdead"), Ok(vec![0xde, 0xad]));

        match decode_hex(|| "vin[2].script_sig".into(), "zz") {
            Err(DecodingError::InvalidHex { field, .. }) => assert_eq!(field, "vin[2].script_sig"),
            other => panic!("unexpected {other:?}"),
        }

        match decode_hex_fixed::<4>(|| "topic".into(), "0x0102") {
            Err(DecodingError::InvalidWidth {
                expected, actual, ..
            }) => assert_eq!((expected, actual), (4, 2)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn prefix_range_handles_trailing_max_bytes() {
        assert_eq!(prefix_key_range(&[1, 2]), vec![1, 2]..vec![1, 3]);
        assert_eq!(prefix_key_range(&[1, 255]), vec![1, 255]..vec![2]);
        assert_eq!(prefix_key_range(&[255]), vec![255]..vec![]);
    }
}
