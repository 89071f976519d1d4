//! The inventory vector peers announce objects by.

use std::{fmt, str::FromStr};

use nested_enum_utils::common_fields;
use postcard::experimental::max_size::MaxSize;
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, SeqAccess},
    ser::SerializeTuple,
};
use snafu::{Backtrace, Snafu};

/// Length of an inventory vector in bytes.
pub const INV_VECT_LEN: usize = 32;

/// Identifies an object announced on the network.
///
/// The queue never looks inside it, it only needs equality and hashing.
#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Hash)]
pub struct InvVect([u8; INV_VECT_LEN]);

impl fmt::Debug for InvVect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InvVect").field(&DD(self.to_hex())).finish()
    }
}

struct DD<T: fmt::Display>(T);

impl<T: fmt::Display> fmt::Debug for DD<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl InvVect {
    /// Create an `InvVect` from its raw bytes representation.
    pub const fn from_bytes(bytes: [u8; INV_VECT_LEN]) -> Self {
        Self(bytes)
    }

    /// Bytes of the inventory vector.
    pub fn as_bytes(&self) -> &[u8; INV_VECT_LEN] {
        &self.0
    }

    /// Convert the inventory vector to a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for InvVect {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; INV_VECT_LEN]> for InvVect {
    fn from(value: [u8; INV_VECT_LEN]) -> Self {
        Self(value)
    }
}

impl From<&[u8; INV_VECT_LEN]> for InvVect {
    fn from(value: &[u8; INV_VECT_LEN]) -> Self {
        Self(*value)
    }
}

impl From<InvVect> for [u8; INV_VECT_LEN] {
    fn from(value: InvVect) -> Self {
        value.0
    }
}

impl fmt::Display for InvVect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut res = [0u8; INV_VECT_LEN * 2];
        hex::encode_to_slice(self.0, &mut res).map_err(|_| fmt::Error)?;
        f.write_str(std::str::from_utf8(&res).map_err(|_| fmt::Error)?)
    }
}

/// Error parsing an [`InvVect`] from a string.
#[common_fields({
    backtrace: Option<Backtrace>,
    #[snafu(implicit)]
    span_trace: n0_snafu::SpanTrace,
})]
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum ParseError {
    /// The string is neither 64 hex nor 52 base32 characters long.
    #[snafu(display("invalid length {len}, expected 64 hex or 52 base32 characters"))]
    Length { len: usize },
    /// The string has hex length but contains invalid characters.
    #[snafu(transparent)]
    Hex { source: hex::FromHexError },
    /// The string has base32 length but contains invalid characters.
    #[snafu(transparent)]
    Base32 { source: data_encoding::DecodeError },
}

impl FromStr for InvVect {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sb = s.as_bytes();
        let mut bytes = [0u8; INV_VECT_LEN];
        match sb.len() {
            64 => {
                hex::decode_to_slice(sb, &mut bytes)?;
            }
            52 => {
                // data_encoding has no lowercase BASE32_NOPAD
                let upper = s.to_ascii_uppercase();
                data_encoding::BASE32_NOPAD
                    .decode_mut(upper.as_bytes(), &mut bytes)
                    .map_err(|e| e.error)?;
            }
            len => return Err(LengthSnafu { len }.build()),
        }
        Ok(Self(bytes))
    }
}

impl Serialize for InvVect {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(self.to_string().as_str())
        } else {
            // Fixed-length structures, including arrays, are supported in Serde as tuples
            // See: https://serde.rs/impl-serialize.html#serializing-a-tuple
            let mut s = serializer.serialize_tuple(INV_VECT_LEN)?;
            for item in &self.0 {
                s.serialize_element(item)?;
            }
            s.end()
        }
    }
}

impl<'de> Deserialize<'de> for InvVect {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(de::Error::custom)
        } else {
            deserializer.deserialize_tuple(INV_VECT_LEN, InvVectVisitor)
        }
    }
}

struct InvVectVisitor;

impl<'de> de::Visitor<'de> for InvVectVisitor {
    type Value = InvVect;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "an array of 32 bytes containing an inventory vector")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut arr = [0u8; INV_VECT_LEN];
        for (i, byte) in arr.iter_mut().enumerate() {
            *byte = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(i, &self))?;
        }
        Ok(InvVect(arr))
    }
}

impl MaxSize for InvVect {
    const POSTCARD_MAX_SIZE: usize = INV_VECT_LEN;
}

#[cfg(test)]
mod tests {
    use serde_test::{Configure, Token, assert_tokens};

    use super::*;
    use crate::InvQueue;

    const A: &str = "000048198e83b24ccfb332e0b5b3788244e3c324ddaf0f9f6cdd67962a673992";
    const B: &str = "1111f020493cb3374894433c03c7e5f671ac39fa7443d25217e61b693074927d";

    #[test]
    fn test_display_parse_roundtrip() {
        for i in 0..100u8 {
            let inv = InvVect::from([i; 32]);
            let text = inv.to_string();
            assert_eq!(text.len(), 64);
            assert_eq!(text, inv.to_hex());
            assert_eq!(text.parse::<InvVect>().unwrap(), inv);
        }
    }

    #[test]
    fn test_parse_hex() {
        let a: InvVect = A.parse().unwrap();
        assert_eq!(a.as_bytes()[..4], [0x00, 0x00, 0x48, 0x19]);
        assert_eq!(a.to_string(), A);
        assert_eq!(A.to_uppercase().parse::<InvVect>().unwrap(), a);
        assert_eq!(format!("{a:?}"), format!("InvVect({A})"));
    }

    #[test]
    fn test_parse_base32() {
        let a: InvVect = A.parse().unwrap();
        let encoded = data_encoding::BASE32_NOPAD.encode(a.as_bytes());
        assert_eq!(encoded.len(), 52);
        assert_eq!(encoded.parse::<InvVect>().unwrap(), a);
        assert_eq!(encoded.to_ascii_lowercase().parse::<InvVect>().unwrap(), a);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "abcd".parse::<InvVect>(),
            Err(ParseError::Length { len: 4, .. })
        ));
        assert!(matches!(
            "".parse::<InvVect>(),
            Err(ParseError::Length { len: 0, .. })
        ));
        let bad_hex = "zz".repeat(32);
        assert!(matches!(
            bad_hex.parse::<InvVect>(),
            Err(ParseError::Hex { .. })
        ));
        let bad_base32 = "1".repeat(52);
        assert!(matches!(
            bad_base32.parse::<InvVect>(),
            Err(ParseError::Base32 { .. })
        ));
    }

    #[test]
    fn test_inv_vect_serde() {
        let inv: InvVect = B.parse().unwrap();

        // compact encodings see a 32 tuple
        let mut tokens = Vec::new();
        tokens.push(Token::Tuple { len: 32 });
        for byte in inv.as_bytes() {
            tokens.push(Token::U8(*byte));
        }
        tokens.push(Token::TupleEnd);
        assert_eq!(tokens.len(), 34);
        assert_tokens(&inv.compact(), &tokens);

        assert_tokens(&inv.readable(), &[Token::String(B)]);
    }

    #[test]
    fn test_inv_vect_postcard() {
        let inv = InvVect::from([0xab; 32]);
        let ser = postcard::to_stdvec(&inv).unwrap();
        assert_eq!(ser, vec![0xab; 32]);
        assert_eq!(ser.len(), InvVect::POSTCARD_MAX_SIZE);
        let de: InvVect = postcard::from_bytes(&ser).unwrap();
        assert_eq!(inv, de);

        assert!(postcard::from_bytes::<InvVect>(&ser[..31]).is_err());
    }

    #[test]
    fn test_inv_vect_json() {
        let inv: InvVect = A.parse().unwrap();
        let ser = serde_json::to_string(&inv).unwrap();
        // 64 hex chars + 2 quotes
        assert_eq!(ser.len(), 66);
        let de: InvVect = serde_json::from_str(&ser).unwrap();
        assert_eq!(inv, de);
    }

    #[test]
    fn test_equal_strings_are_duplicates() {
        // two values parsed from the same string are the same inventory vector
        let a: InvVect = A.parse().unwrap();
        let b: InvVect = A.parse().unwrap();
        let mut queue = InvQueue::new();
        assert!(queue.push_back(a));
        assert!(!queue.push_back(b));
        assert!(!queue.push_front(b));
        assert_eq!(queue.len(), 1);
        assert!(queue.contains(&b));
        assert!(queue.remove(&b));
        assert!(!queue.contains(&a));
        assert!(queue.check_integrity().is_healthy());
    }
}
