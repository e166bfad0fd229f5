//! Module containing serialization helpers.

use ethnum::U256;
use serde::{
    de::{self, Deserializer},
    ser::Serializer,
    Deserialize, Serialize,
};
use std::{
    borrow::Cow,
    fmt::{self, Debug, Display, Formatter},
    ops::Deref,
    str::FromStr,
};

/// Dynamic byte array serialization methods.
pub mod bytes {
    use serde::{
        de::{self, Deserializer},
        ser::Serializer,
        Deserialize as _,
    };
    use std::borrow::Cow;

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Cow::<str>::deserialize(deserializer)?;
        let s = s
            .strip_prefix("0x")
            .ok_or_else(|| de::Error::custom("hex data missing '0x' prefix"))?;
        hex::decode(s).map_err(de::Error::custom)
    }
}

/// Hex encoded byte data.
#[derive(Clone, Default, Eq, PartialEq)]
pub struct Bytes(pub Vec<u8>);

impl Debug for Bytes {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl Serialize for Bytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        bytes::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        bytes::deserialize(deserializer).map(Self)
    }
}

/// An Ethereum JSON RPC quantity: a `0x`-prefixed hexadecimal integer without
/// leading zeros.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct Quantity(pub U256);

impl Quantity {
    /// Returns the quantity as a `u64` if it fits.
    pub fn to_u64(self) -> Option<u64> {
        (self.0 <= U256::from(u64::MAX)).then(|| self.0.as_u64())
    }

    /// Returns the quantity as a `u128` if it fits.
    pub fn to_u128(self) -> Option<u128> {
        (self.0 <= U256::from(u128::MAX)).then(|| self.0.as_u128())
    }
}

impl From<u64> for Quantity {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl Serialize for Quantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{:x}", self.0))
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Cow::<str>::deserialize(deserializer)?;
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| de::Error::custom("quantity missing '0x' prefix"))?;
        if digits.is_empty() {
            return Err(de::Error::custom("empty quantity"));
        }
        U256::from_str_radix(digits, 16)
            .map(Self)
            .map_err(de::Error::custom)
    }
}

/// Wrapper type serializing values through their `Display` and `FromStr`
/// implementations.
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq)]
pub struct Str<T>(pub T);

impl<T> Deref for Str<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> Debug for Str<T>
where
    T: Display,
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<T> Serialize for Str<T>
where
    T: Display,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&self.0)
    }
}

impl<'de, T> Deserialize<'de> for Str<T>
where
    T: FromStr,
    T::Err: Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Cow::<str>::deserialize(deserializer)?;
        s.parse().map(Self).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, Address};
    use serde_json::json;

    #[test]
    fn quantities() {
        assert_eq!(serde_json::to_value(Quantity::from(0)).unwrap(), json!("0x0"));
        assert_eq!(
            serde_json::to_value(Quantity::from(31337)).unwrap(),
            json!("0x7a69")
        );
        assert_eq!(
            serde_json::from_value::<Quantity>(json!("0x7a69")).unwrap(),
            Quantity::from(31337)
        );
        assert!(serde_json::from_value::<Quantity>(json!("0x")).is_err());
        assert!(serde_json::from_value::<Quantity>(json!("7a69")).is_err());
    }

    #[test]
    fn quantity_narrowing() {
        assert_eq!(Quantity::from(u64::MAX).to_u64(), Some(u64::MAX));
        assert_eq!(Quantity(U256::from(u64::MAX) + U256::ONE).to_u64(), None);
        assert_eq!(Quantity(U256::MAX).to_u128(), None);
    }

    #[test]
    fn byte_data() {
        assert_eq!(
            serde_json::to_value(Bytes(vec![1, 3, 3, 7])).unwrap(),
            json!("0x01030307")
        );
        assert_eq!(
            serde_json::from_value::<Bytes>(json!("0x")).unwrap(),
            Bytes(vec![])
        );
        assert!(serde_json::from_value::<Bytes>(json!("01")).is_err());
    }

    #[test]
    fn display_strings() {
        let account = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        assert_eq!(
            serde_json::to_value(Str(account)).unwrap(),
            json!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
        );
        assert_eq!(
            serde_json::from_value::<Str<Address>>(json!(
                "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
            ))
            .unwrap()
            .0,
            account,
        );
    }
}
