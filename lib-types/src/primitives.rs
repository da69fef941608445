//! Canonical Primitive Types for the Launchpad Engine
//!
//! These types are the building blocks for every reserve, order and fee
//! record. They are designed to be:
//! - Fixed-size where the chain gives us a fixed-size identifier
//! - Lossless across JSON (256-bit values travel as decimal strings)
//! - Cheap to copy and compare

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uint::construct_uint;
use uuid::Uuid;

use crate::errors::PrimitiveError;

construct_uint! {
    /// Fixed-width 256-bit integer used for reserve math.
    pub struct U256(4);
}

// ============================================================================
// TYPE ALIASES
// ============================================================================

/// Block number on the settlement chain
pub type BlockNumber = u64;

/// Basis points (10000 = 100%)
///
/// u32 rather than u16: true price impact on a large buy can exceed 65535 bps.
pub type Bps = u32;

/// Basis-point denominator
pub const BPS_DENOMINATOR: Bps = 10_000;

/// Fixed-point decimals for both token and ETH amounts
pub const DECIMALS: usize = 18;

// ============================================================================
// AMOUNT
// ============================================================================

/// Unsigned 256-bit fixed-point amount (18 decimals)
///
/// Serializes as a decimal string of base units so that JSON consumers never
/// see a precision-losing number.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(U256);

impl Amount {
    /// Zero amount
    pub fn zero() -> Self {
        Self(U256::zero())
    }

    /// Wrap a raw 256-bit base-unit value
    pub const fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    /// Amount from base units (wei)
    pub fn from_base_units(units: u128) -> Self {
        Self(U256::from(units))
    }

    /// Amount from whole units, scaled by 10^18
    pub fn from_whole(whole: u64) -> Self {
        Self(U256::from(whole) * U256::exp10(DECIMALS))
    }

    /// One whole unit (10^18 base units)
    pub fn one() -> Self {
        Self(U256::exp10(DECIMALS))
    }

    /// Underlying 256-bit value
    pub const fn raw(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn checked_mul(self, other: Amount) -> Option<Amount> {
        self.0.checked_mul(other.0).map(Amount)
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    /// `self × num / den`, rounded down. `None` on overflow or zero divisor.
    pub fn mul_div_floor(self, num: Amount, den: Amount) -> Option<Amount> {
        if den.is_zero() {
            return None;
        }
        let product = self.0.checked_mul(num.0)?;
        Some(Amount(product / den.0))
    }

    /// `self × num / den`, rounded up. `None` on overflow or zero divisor.
    pub fn mul_div_ceil(self, num: Amount, den: Amount) -> Option<Amount> {
        if den.is_zero() {
            return None;
        }
        let product = self.0.checked_mul(num.0)?;
        let quotient = product / den.0;
        if (product % den.0).is_zero() {
            Some(Amount(quotient))
        } else {
            quotient.checked_add(U256::one()).map(Amount)
        }
    }

    /// Apply a basis-point rate, rounded down
    pub fn apply_bps(self, bps: Bps) -> Option<Amount> {
        self.mul_div_floor(
            Amount(U256::from(bps)),
            Amount(U256::from(BPS_DENOMINATOR)),
        )
    }

    /// Lossy conversion to f64 in base units
    pub fn to_f64(&self) -> f64 {
        let U256(limbs) = self.0;
        limbs
            .iter()
            .enumerate()
            .map(|(i, limb)| (*limb as f64) * 2f64.powi(64 * i as i32))
            .sum()
    }

    /// Lossy conversion to f64 in whole units (for ranking and display only)
    pub fn to_whole_f64(&self) -> f64 {
        self.to_f64() / 1e18
    }

    /// Parse a whole-unit decimal such as `1.5` into base units
    pub fn from_decimal_str(s: &str) -> Result<Self, PrimitiveError> {
        let invalid = || PrimitiveError::InvalidAmount(s.to_string());
        let trimmed = s.trim();
        let (int_part, frac_part) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        if frac_part.len() > DECIMALS
            || (int_part.is_empty() && frac_part.is_empty())
            || !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        let digits = format!("{}{:0<width$}", int_part, frac_part, width = DECIMALS);
        U256::from_dec_str(&digits).map(Amount).map_err(|_| invalid())
    }

    /// Human-readable decimal form, e.g. `25806451.612903225806451613`
    pub fn to_decimal_string(&self) -> String {
        let digits = self.0.to_string();
        if digits.len() <= DECIMALS {
            let frac = format!("{:0>width$}", digits, width = DECIMALS);
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                "0".to_string()
            } else {
                format!("0.{}", frac)
            }
        } else {
            let (int_part, frac_part) = digits.split_at(digits.len() - DECIMALS);
            let frac = frac_part.trim_end_matches('0');
            if frac.is_empty() {
                int_part.to_string()
            } else {
                format!("{}.{}", int_part, frac)
            }
        }
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_dec_str(s.trim())
            .map(Amount)
            .map_err(|_| PrimitiveError::InvalidAmount(s.to_string()))
    }
}

impl From<u64> for Amount {
    fn from(units: u64) -> Self {
        Self(U256::from(units))
    }
}

impl From<U256> for Amount {
    fn from(raw: U256) -> Self {
        Self(raw)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal string or unsigned integer of base units")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        Ok(Amount::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        u64::try_from(v)
            .map(Amount::from)
            .map_err(|_| E::custom("amount cannot be negative"))
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(AmountVisitor)
        } else {
            deserializer.deserialize_str(AmountVisitor)
        }
    }
}

// ============================================================================
// CHAIN AND TOKEN IDENTIFIERS
// ============================================================================

/// Settlement chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ChainId {
    RiseChain = 0,
    MegaEth = 1,
}

impl ChainId {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ChainId::RiseChain),
            1 => Some(ChainId::MegaEth),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ChainId::RiseChain => "risechain",
            ChainId::MegaEth => "megaeth",
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChainId {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "risechain" => Ok(ChainId::RiseChain),
            "megaeth" => Ok(ChainId::MegaEth),
            other => Err(PrimitiveError::UnknownChain(other.to_string())),
        }
    }
}

/// Token identifier: settlement chain + 20-byte contract address
///
/// Text form is `chain:0x<40 hex>`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenId {
    pub chain: ChainId,
    pub address: [u8; 20],
}

impl TokenId {
    pub const fn new(chain: ChainId, address: [u8; 20]) -> Self {
        Self { chain, address }
    }

    /// Parse a `0x`-prefixed (or bare) 40-character hex address
    pub fn from_hex(chain: ChainId, address: &str) -> Result<Self, PrimitiveError> {
        let stripped = address.strip_prefix("0x").unwrap_or(address);
        let bytes = hex::decode(stripped)
            .map_err(|_| PrimitiveError::InvalidAddress(address.to_string()))?;
        let address: [u8; 20] = bytes
            .try_into()
            .map_err(|_| PrimitiveError::InvalidAddress(address.to_string()))?;
        Ok(Self { chain, address })
    }

    /// `0x`-prefixed lowercase hex address
    pub fn address_hex(&self) -> String {
        format!("0x{}", hex::encode(self.address))
    }

    /// Fixed 21-byte storage key: chain byte followed by the address
    pub fn storage_key(&self) -> [u8; 21] {
        let mut key = [0u8; 21];
        key[0] = self.chain.as_u8();
        key[1..].copy_from_slice(&self.address);
        key
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({}:{})", self.chain, hex::encode(&self.address[..6]))
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.address_hex())
    }
}

impl FromStr for TokenId {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chain, address) = s
            .split_once(':')
            .ok_or_else(|| PrimitiveError::InvalidTokenId(s.to_string()))?;
        TokenId::from_hex(chain.parse()?, address)
    }
}

impl Serialize for TokenId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TokenId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// ============================================================================
// ORDER AND USER IDENTIFIERS
// ============================================================================

/// Order identifier (UUID v4)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub Uuid);

impl OrderId {
    /// Fresh random order id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrderId({})", self.0)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(OrderId)
            .map_err(|_| PrimitiveError::InvalidOrderId(s.to_string()))
    }
}

/// Platform user identifier, issued by the account service
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
