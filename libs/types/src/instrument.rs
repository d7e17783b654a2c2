//! Instrument catalog model
//!
//! The four instrument kinds share a common quote header and carry
//! kind-specific payloads as an internally tagged variant; the
//! discriminant doubles as the wire `securityType` tag. The delta
//! engine and filter evaluator never match on the variant; they use
//! the flat `field_map` view, and `apply_field` is its inverse
//! (field-wise assignment), used by delta application and admin merge.
//!
//! Trade telemetry fields (`lastTradePrice/Size/Time`) are absent
//! until the first simulated trade; ticks without a trade never write
//! them, so they can never appear in a delta for a non-trade tick.

use crate::errors::{FeedError, FieldError};
use crate::field::{FieldMap, FieldValue};
use crate::ids::InstrumentId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Instrument kind discriminant.
///
/// Serialized as its bare tag ("Bond", "Swap", "Future", "Option"),
/// the same spelling the wire `securityType` field uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityType {
    Bond,
    Swap,
    Future,
    Option,
}

impl SecurityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityType::Bond => "Bond",
            SecurityType::Swap => "Swap",
            SecurityType::Future => "Future",
            SecurityType::Option => "Option",
        }
    }
}

/// Lifecycle status of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstrumentStatus {
    Active,
    Suspended,
    Matured,
}

impl InstrumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentStatus::Active => "ACTIVE",
            InstrumentStatus::Suspended => "SUSPENDED",
            InstrumentStatus::Matured => "MATURED",
        }
    }
}

/// Issuer sector, one of the categorical attributes driving
/// correlation affinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sector {
    Government,
    Agency,
    Corporate,
    Municipal,
    Financial,
    Energy,
}

impl Sector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Government => "GOVERNMENT",
            Sector::Agency => "AGENCY",
            Sector::Corporate => "CORPORATE",
            Sector::Municipal => "MUNICIPAL",
            Sector::Financial => "FINANCIAL",
            Sector::Energy => "ENERGY",
        }
    }
}

/// Credit rating bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Rating {
    Aaa,
    Aa,
    A,
    Bbb,
    Bb,
    B,
    #[serde(rename = "NR")]
    NotRated,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Aaa => "AAA",
            Rating::Aa => "AA",
            Rating::A => "A",
            Rating::Bbb => "BBB",
            Rating::Bb => "BB",
            Rating::B => "B",
            Rating::NotRated => "NR",
        }
    }
}

/// Settlement currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
        }
    }
}

/// Call/put flag for options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionStyle {
    Call,
    Put,
}

impl OptionStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionStyle::Call => "CALL",
            OptionStyle::Put => "PUT",
        }
    }

    /// Intrinsic value against an underlying mark: max(0, S−K) for
    /// calls, max(0, K−S) for puts.
    pub fn intrinsic(&self, underlying: f64, strike: f64) -> f64 {
        match self {
            OptionStyle::Call => (underlying - strike).max(0.0),
            OptionStyle::Put => (strike - underlying).max(0.0),
        }
    }

    /// Valid delta range: 0..1 for calls, −1..0 for puts.
    pub fn delta_bounds(&self) -> (f64, f64) {
        match self {
            OptionStyle::Call => (0.0, 1.0),
            OptionStyle::Put => (-1.0, 0.0),
        }
    }
}

/// Bond-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BondFields {
    /// Clean price per 100 face
    pub price: f64,
    /// Yield to maturity (percent)
    #[serde(rename = "yield")]
    pub yield_to_maturity: f64,
    /// Annual coupon (percent)
    pub coupon: f64,
    /// Modified duration (years)
    pub duration: f64,
    pub convexity: f64,
    /// Spread to benchmark curve (basis points)
    pub spread_to_benchmark: f64,
    /// Maturity date, epoch-ms
    pub maturity_date: i64,
}

/// Interest-rate-swap-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapFields {
    /// Par swap rate (percent)
    pub swap_rate: f64,
    pub tenor_years: f64,
    pub notional: f64,
    pub fixed_dv01: f64,
    pub floating_dv01: f64,
}

/// Futures-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FutureFields {
    pub price: f64,
    /// 100 − price convention
    pub implied_rate: f64,
    pub open_interest: f64,
    /// Delivery month code, e.g. "SEP25"
    pub contract_month: String,
    /// Expiry date, epoch-ms
    pub expiry_date: i64,
}

/// Option-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionFields {
    pub premium: f64,
    pub strike: f64,
    pub implied_volatility: f64,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub intrinsic_value: f64,
    pub time_value: f64,
    #[serde(rename = "optionType")]
    pub style: OptionStyle,
    /// Underlying instrument for intrinsic and premium dynamics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underlying_id: Option<InstrumentId>,
    /// Expiry date, epoch-ms
    pub expiry_date: i64,
}

/// Kind-specific payload, internally tagged by `securityType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "securityType")]
pub enum Kind {
    Bond(BondFields),
    Swap(SwapFields),
    Future(FutureFields),
    Option(OptionFields),
}

/// An instrument record: common quote header plus kind payload.
///
/// Two copies exist per instrument in the store: `current` (under
/// mutation by the tick generator) and `published` (the last state an
/// emitted delta reflected). The struct itself is a plain value type;
/// snapshots are clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub id: InstrumentId,
    pub description: String,
    pub currency: Currency,
    pub sector: Sector,
    pub rating: Rating,
    pub status: InstrumentStatus,
    pub bid_price: f64,
    pub ask_price: f64,
    /// Cumulative traded volume for the session
    pub volume: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_trade_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_trade_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_trade_time: Option<i64>,
    /// Epoch-ms of the last mutation; monotonically advancing
    pub last_update: i64,
    #[serde(flatten)]
    pub kind: Kind,
}

impl Instrument {
    /// The kind discriminant.
    pub fn security_type(&self) -> SecurityType {
        match &self.kind {
            Kind::Bond(_) => SecurityType::Bond,
            Kind::Swap(_) => SecurityType::Swap,
            Kind::Future(_) => SecurityType::Future,
            Kind::Option(_) => SecurityType::Option,
        }
    }

    /// Kind-specific reference price: bond/future price, swap rate,
    /// option premium.
    pub fn mark_price(&self) -> f64 {
        match &self.kind {
            Kind::Bond(b) => b.price,
            Kind::Swap(s) => s.swap_rate,
            Kind::Future(f) => f.price,
            Kind::Option(o) => o.premium,
        }
    }

    /// Latest trade price, falling back to the mark when the
    /// instrument has not traded yet.
    pub fn trade_mark(&self) -> f64 {
        self.last_trade_price.unwrap_or_else(|| self.mark_price())
    }

    /// Advance `lastUpdate` monotonically: at least one millisecond
    /// past the previous value even if the clock stalls.
    pub fn touch(&mut self, now_ms: i64) {
        self.last_update = now_ms.max(self.last_update + 1);
    }

    /// Build the flat field-name → value view.
    ///
    /// Keys are the camelCase wire names. Optional trade fields are
    /// present only once a trade has occurred.
    pub fn field_map(&self) -> FieldMap {
        let mut map = FieldMap::new();
        map.insert("id", FieldValue::Text(self.id.as_str().to_string()));
        map.insert(
            "securityType",
            FieldValue::Text(self.security_type().as_str().to_string()),
        );
        map.insert("description", FieldValue::Text(self.description.clone()));
        map.insert(
            "currency",
            FieldValue::Text(self.currency.as_str().to_string()),
        );
        map.insert("sector", FieldValue::Text(self.sector.as_str().to_string()));
        map.insert("rating", FieldValue::Text(self.rating.as_str().to_string()));
        map.insert("status", FieldValue::Text(self.status.as_str().to_string()));
        map.insert("bidPrice", FieldValue::Number(self.bid_price));
        map.insert("askPrice", FieldValue::Number(self.ask_price));
        map.insert("volume", FieldValue::Number(self.volume));
        if let Some(p) = self.last_trade_price {
            map.insert("lastTradePrice", FieldValue::Number(p));
        }
        if let Some(s) = self.last_trade_size {
            map.insert("lastTradeSize", FieldValue::Number(s));
        }
        if let Some(t) = self.last_trade_time {
            map.insert("lastTradeTime", FieldValue::Timestamp(t));
        }
        map.insert("lastUpdate", FieldValue::Timestamp(self.last_update));

        match &self.kind {
            Kind::Bond(b) => {
                map.insert("price", FieldValue::Number(b.price));
                map.insert("yield", FieldValue::Number(b.yield_to_maturity));
                map.insert("coupon", FieldValue::Number(b.coupon));
                map.insert("duration", FieldValue::Number(b.duration));
                map.insert("convexity", FieldValue::Number(b.convexity));
                map.insert(
                    "spreadToBenchmark",
                    FieldValue::Number(b.spread_to_benchmark),
                );
                map.insert("maturityDate", FieldValue::Timestamp(b.maturity_date));
            }
            Kind::Swap(s) => {
                map.insert("swapRate", FieldValue::Number(s.swap_rate));
                map.insert("tenorYears", FieldValue::Number(s.tenor_years));
                map.insert("notional", FieldValue::Number(s.notional));
                map.insert("fixedDv01", FieldValue::Number(s.fixed_dv01));
                map.insert("floatingDv01", FieldValue::Number(s.floating_dv01));
            }
            Kind::Future(f) => {
                map.insert("price", FieldValue::Number(f.price));
                map.insert("impliedRate", FieldValue::Number(f.implied_rate));
                map.insert("openInterest", FieldValue::Number(f.open_interest));
                map.insert(
                    "contractMonth",
                    FieldValue::Text(f.contract_month.clone()),
                );
                map.insert("expiryDate", FieldValue::Timestamp(f.expiry_date));
            }
            Kind::Option(o) => {
                map.insert("premium", FieldValue::Number(o.premium));
                map.insert("strike", FieldValue::Number(o.strike));
                map.insert("impliedVolatility", FieldValue::Number(o.implied_volatility));
                map.insert("delta", FieldValue::Number(o.delta));
                map.insert("gamma", FieldValue::Number(o.gamma));
                map.insert("theta", FieldValue::Number(o.theta));
                map.insert("vega", FieldValue::Number(o.vega));
                map.insert("intrinsicValue", FieldValue::Number(o.intrinsic_value));
                map.insert("timeValue", FieldValue::Number(o.time_value));
                map.insert("optionType", FieldValue::Text(o.style.as_str().to_string()));
                if let Some(u) = &o.underlying_id {
                    map.insert("underlyingId", FieldValue::Text(u.as_str().to_string()));
                }
                map.insert("expiryDate", FieldValue::Timestamp(o.expiry_date));
            }
        }

        map
    }

    /// Field-wise assignment: set a single field by wire name.
    ///
    /// Inverse of `field_map`: applying every entry of an emitted
    /// delta reproduces the state the delta was computed from. Unknown
    /// names (including kind fields of a different kind) and type
    /// mismatches are rejected; `id` and `securityType` are immutable.
    pub fn apply_field(&mut self, name: &str, value: &FieldValue) -> Result<(), FieldError> {
        match name {
            "id" | "securityType" => {
                return Err(FieldError::ImmutableField {
                    field: name.to_string(),
                })
            }
            "description" => self.description = text(name, value)?,
            "currency" => self.currency = parse_tag(name, &text(name, value)?)?,
            "sector" => self.sector = parse_tag(name, &text(name, value)?)?,
            "rating" => self.rating = parse_tag(name, &text(name, value)?)?,
            "status" => self.status = parse_tag(name, &text(name, value)?)?,
            "bidPrice" => self.bid_price = num(name, value)?,
            "askPrice" => self.ask_price = num(name, value)?,
            "volume" => self.volume = num(name, value)?,
            "lastTradePrice" => self.last_trade_price = Some(num(name, value)?),
            "lastTradeSize" => self.last_trade_size = Some(num(name, value)?),
            "lastTradeTime" => self.last_trade_time = Some(millis(name, value)?),
            "lastUpdate" => self.last_update = millis(name, value)?,
            _ => return self.apply_kind_field(name, value),
        }
        Ok(())
    }

    fn apply_kind_field(&mut self, name: &str, value: &FieldValue) -> Result<(), FieldError> {
        let unknown = || FieldError::UnknownField {
            field: name.to_string(),
        };
        match &mut self.kind {
            Kind::Bond(b) => match name {
                "price" => b.price = num(name, value)?,
                "yield" => b.yield_to_maturity = num(name, value)?,
                "coupon" => b.coupon = num(name, value)?,
                "duration" => b.duration = num(name, value)?,
                "convexity" => b.convexity = num(name, value)?,
                "spreadToBenchmark" => b.spread_to_benchmark = num(name, value)?,
                "maturityDate" => b.maturity_date = millis(name, value)?,
                _ => return Err(unknown()),
            },
            Kind::Swap(s) => match name {
                "swapRate" => s.swap_rate = num(name, value)?,
                "tenorYears" => s.tenor_years = num(name, value)?,
                "notional" => s.notional = num(name, value)?,
                "fixedDv01" => s.fixed_dv01 = num(name, value)?,
                "floatingDv01" => s.floating_dv01 = num(name, value)?,
                _ => return Err(unknown()),
            },
            Kind::Future(f) => match name {
                "price" => f.price = num(name, value)?,
                "impliedRate" => f.implied_rate = num(name, value)?,
                "openInterest" => f.open_interest = num(name, value)?,
                "contractMonth" => f.contract_month = text(name, value)?,
                "expiryDate" => f.expiry_date = millis(name, value)?,
                _ => return Err(unknown()),
            },
            Kind::Option(o) => match name {
                "premium" => o.premium = num(name, value)?,
                "strike" => o.strike = num(name, value)?,
                "impliedVolatility" => o.implied_volatility = num(name, value)?,
                "delta" => o.delta = num(name, value)?,
                "gamma" => o.gamma = num(name, value)?,
                "theta" => o.theta = num(name, value)?,
                "vega" => o.vega = num(name, value)?,
                "intrinsicValue" => o.intrinsic_value = num(name, value)?,
                "timeValue" => o.time_value = num(name, value)?,
                "optionType" => o.style = parse_tag(name, &text(name, value)?)?,
                "underlyingId" => o.underlying_id = Some(InstrumentId::new(text(name, value)?)),
                "expiryDate" => o.expiry_date = millis(name, value)?,
                _ => return Err(unknown()),
            },
        }
        Ok(())
    }

    /// Validate the structural invariants. Run at insert time; the
    /// tick generator preserves them by construction.
    pub fn validate(&self) -> Result<(), FeedError> {
        let invalid = |message: String| FeedError::InvalidArgument { message };

        if self.id.is_empty() {
            return Err(invalid("instrument id must not be empty".to_string()));
        }
        if self.bid_price < 0.0 || self.ask_price < 0.0 {
            return Err(invalid(format!(
                "{}: quoted prices must be non-negative",
                self.id
            )));
        }
        if self.volume < 0.0
            || self.last_trade_price.is_some_and(|p| p < 0.0)
            || self.last_trade_size.is_some_and(|s| s < 0.0)
        {
            return Err(invalid(format!(
                "{}: trade telemetry must be non-negative",
                self.id
            )));
        }

        match &self.kind {
            Kind::Bond(b) => {
                if b.price < 0.0 {
                    return Err(invalid(format!("{}: bond price must be >= 0", self.id)));
                }
            }
            Kind::Swap(s) => {
                if s.notional < 0.0 {
                    return Err(invalid(format!("{}: notional must be >= 0", self.id)));
                }
            }
            Kind::Future(f) => {
                if f.price < 0.0 || f.open_interest < 0.0 {
                    return Err(invalid(format!(
                        "{}: future price and open interest must be >= 0",
                        self.id
                    )));
                }
            }
            Kind::Option(o) => {
                if o.premium <= 0.0 {
                    return Err(invalid(format!("{}: premium must be > 0", self.id)));
                }
                if o.implied_volatility <= 0.0 {
                    return Err(invalid(format!(
                        "{}: implied volatility must be > 0",
                        self.id
                    )));
                }
                if o.strike <= 0.0 {
                    return Err(invalid(format!("{}: strike must be > 0", self.id)));
                }
                let (lo, hi) = o.style.delta_bounds();
                if o.delta < lo || o.delta > hi {
                    return Err(invalid(format!(
                        "{}: {} delta {} outside [{}, {}]",
                        self.id,
                        o.style.as_str(),
                        o.delta,
                        lo,
                        hi
                    )));
                }
                if o.intrinsic_value < 0.0 || o.time_value < 0.0 {
                    return Err(invalid(format!(
                        "{}: intrinsic and time value must be >= 0",
                        self.id
                    )));
                }
            }
        }

        Ok(())
    }
}

fn num(field: &str, value: &FieldValue) -> Result<f64, FieldError> {
    match value {
        FieldValue::Number(n) => Ok(*n),
        _ => Err(FieldError::TypeMismatch {
            field: field.to_string(),
            expected: "number",
        }),
    }
}

fn text(field: &str, value: &FieldValue) -> Result<String, FieldError> {
    match value {
        FieldValue::Text(s) => Ok(s.clone()),
        _ => Err(FieldError::TypeMismatch {
            field: field.to_string(),
            expected: "string",
        }),
    }
}

/// Timestamp fields accept both the typed form and plain JSON numbers
/// (the admin merge path has no way to distinguish them).
fn millis(field: &str, value: &FieldValue) -> Result<i64, FieldError> {
    match value {
        FieldValue::Timestamp(t) => Ok(*t),
        FieldValue::Number(n) => Ok(*n as i64),
        _ => Err(FieldError::TypeMismatch {
            field: field.to_string(),
            expected: "timestamp",
        }),
    }
}

/// Parse an enumeration field from its wire tag via serde, so the
/// accepted spellings stay in one place.
fn parse_tag<T: DeserializeOwned>(field: &str, tag: &str) -> Result<T, FieldError> {
    serde_json::from_value(serde_json::Value::String(tag.to_string())).map_err(|_| {
        FieldError::InvalidEnum {
            field: field.to_string(),
            value: tag.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bond() -> Instrument {
        Instrument {
            id: InstrumentId::new("US10Y"),
            description: "US Treasury 10Y".to_string(),
            currency: Currency::Usd,
            sector: Sector::Government,
            rating: Rating::Aaa,
            status: InstrumentStatus::Active,
            bid_price: 98.2,
            ask_price: 98.3,
            volume: 0.0,
            last_trade_price: None,
            last_trade_size: None,
            last_trade_time: None,
            last_update: 1_708_123_456_789,
            kind: Kind::Bond(BondFields {
                price: 98.25,
                yield_to_maturity: 4.25,
                coupon: 4.0,
                duration: 8.5,
                convexity: 82.0,
                spread_to_benchmark: 0.0,
                maturity_date: 2_026_000_000_000,
            }),
        }
    }

    fn sample_option() -> Instrument {
        Instrument {
            id: InstrumentId::new("ZN-C-112"),
            description: "Call on ZN".to_string(),
            currency: Currency::Usd,
            sector: Sector::Government,
            rating: Rating::NotRated,
            status: InstrumentStatus::Active,
            bid_price: 1.4,
            ask_price: 1.6,
            volume: 0.0,
            last_trade_price: None,
            last_trade_size: None,
            last_trade_time: None,
            last_update: 1_708_123_456_789,
            kind: Kind::Option(OptionFields {
                premium: 1.5,
                strike: 112.0,
                implied_volatility: 0.08,
                delta: 0.45,
                gamma: 0.12,
                theta: -0.02,
                vega: 0.15,
                intrinsic_value: 0.0,
                time_value: 1.5,
                style: OptionStyle::Call,
                underlying_id: Some(InstrumentId::new("ZN-U25")),
                expiry_date: 2_030_000_000_000,
            }),
        }
    }

    #[test]
    fn test_security_type_from_kind() {
        assert_eq!(sample_bond().security_type(), SecurityType::Bond);
        assert_eq!(sample_option().security_type(), SecurityType::Option);
    }

    #[test]
    fn test_serialization_tags_and_casing() {
        let json = serde_json::to_value(sample_bond()).unwrap();
        assert_eq!(json["securityType"], "Bond");
        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["rating"], "AAA");
        assert_eq!(json["bidPrice"], 98.2);
        assert_eq!(json["yield"], 4.25);
        // Untriggered trade telemetry stays off the wire
        assert!(json.get("lastTradePrice").is_none());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let bond = sample_bond();
        let json = serde_json::to_string(&bond).unwrap();
        let back: Instrument = serde_json::from_str(&json).unwrap();
        assert_eq!(bond, back);
    }

    #[test]
    fn test_field_map_contains_kind_fields() {
        let map = sample_bond().field_map();
        assert_eq!(
            map.get("securityType"),
            Some(&FieldValue::Text("Bond".to_string()))
        );
        assert_eq!(map.get("yield"), Some(&FieldValue::Number(4.25)));
        assert!(map.get("swapRate").is_none());
        assert!(map.get("lastTradePrice").is_none());
    }

    #[test]
    fn test_field_map_apply_field_roundtrip() {
        let mut target = sample_bond();
        let mut source = sample_bond();
        source.bid_price = 97.9;
        source.last_trade_price = Some(98.1);
        source.last_trade_time = Some(1_708_123_460_000);
        if let Kind::Bond(b) = &mut source.kind {
            b.price = 97.95;
            b.yield_to_maturity = 4.31;
        }
        source.touch(1_708_123_460_000);

        for (name, value) in source.field_map() {
            if name == "id" || name == "securityType" {
                continue;
            }
            target.apply_field(name, &value).unwrap();
        }
        assert_eq!(target, source);
    }

    #[test]
    fn test_apply_field_unknown_and_mismatch() {
        let mut bond = sample_bond();
        let err = bond
            .apply_field("swapRate", &FieldValue::Number(4.0))
            .unwrap_err();
        assert!(matches!(err, FieldError::UnknownField { .. }));

        let err = bond
            .apply_field("bidPrice", &FieldValue::Text("high".to_string()))
            .unwrap_err();
        assert!(matches!(err, FieldError::TypeMismatch { .. }));

        let err = bond
            .apply_field("id", &FieldValue::Text("US30Y".to_string()))
            .unwrap_err();
        assert!(matches!(err, FieldError::ImmutableField { .. }));
    }

    #[test]
    fn test_apply_field_parses_enum_tags() {
        let mut bond = sample_bond();
        bond.apply_field("status", &FieldValue::Text("SUSPENDED".to_string()))
            .unwrap();
        assert_eq!(bond.status, InstrumentStatus::Suspended);

        let err = bond
            .apply_field("status", &FieldValue::Text("BOGUS".to_string()))
            .unwrap_err();
        assert!(matches!(err, FieldError::InvalidEnum { .. }));
    }

    #[test]
    fn test_touch_is_monotonic() {
        let mut bond = sample_bond();
        let before = bond.last_update;
        bond.touch(before - 5_000);
        assert_eq!(bond.last_update, before + 1);
        bond.touch(before + 10_000);
        assert_eq!(bond.last_update, before + 10_000);
    }

    #[test]
    fn test_intrinsic_by_style() {
        assert_eq!(OptionStyle::Call.intrinsic(112.5, 112.0), 0.5);
        assert_eq!(OptionStyle::Call.intrinsic(111.0, 112.0), 0.0);
        assert_eq!(OptionStyle::Put.intrinsic(111.0, 112.0), 1.0);
        assert_eq!(OptionStyle::Put.intrinsic(113.0, 112.0), 0.0);
    }

    #[test]
    fn test_validate_rejects_bad_option() {
        let mut opt = sample_option();
        if let Kind::Option(o) = &mut opt.kind {
            o.premium = 0.0;
        }
        assert!(opt.validate().is_err());

        let mut opt = sample_option();
        if let Kind::Option(o) = &mut opt.kind {
            o.delta = -0.2; // call delta below zero
        }
        assert!(opt.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_samples() {
        assert!(sample_bond().validate().is_ok());
        assert!(sample_option().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_price() {
        let mut bond = sample_bond();
        bond.bid_price = -1.0;
        assert!(bond.validate().is_err());
    }
}
