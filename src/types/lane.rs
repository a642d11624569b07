//! Settlement lanes and speed normalization.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The settlement authorization mechanism used to move tokens without a
/// prior on-chain approval transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Lane {
    /// Pre-approved allowance via the Permit2 contract. The default lane,
    /// since it requires no token-specific support.
    Permit2,
    /// EIP-2612 permit.
    Eip2612,
    /// EIP-3009 transfer-authorization.
    Eip3009,
    /// The sender pays their own gas; no sponsorship.
    SelfPay,
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Permit2 => "PERMIT2",
            Self::Eip2612 => "EIP2612",
            Self::Eip3009 => "EIP3009",
            Self::SelfPay => "SELF_PAY",
        };
        f.write_str(s)
    }
}

/// Whether the sponsor or the sender pays for gas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementMode {
    /// Gas is sponsored in exchange for a token-denominated fee.
    #[default]
    Sponsored,
    /// The sender pays their own gas. Zero fee, no paymaster involved.
    SelfPay,
}

/// Per-token lane allow-lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaneLists {
    /// Tokens supporting EIP-3009 transfer-authorization.
    #[serde(default)]
    pub eip3009: HashSet<Address>,
    /// Tokens supporting EIP-2612 permits.
    #[serde(default)]
    pub eip2612: HashSet<Address>,
}

/// A caller-supplied speed value; accepted as a number or a string for
/// compatibility with older clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpeedInput {
    /// Numeric speed code.
    Num(u64),
    /// Textual speed code, e.g. `"1"`.
    Text(String),
}

impl SpeedInput {
    fn as_code(&self) -> u64 {
        match self {
            Self::Num(n) => *n,
            Self::Text(s) => s.trim().parse().unwrap_or(0),
        }
    }
}

/// The canonical form of a speed/fee-mode pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalSpeed {
    /// Numeric speed code: 0 for eco, 1 for instant. Receipts and the
    /// on-chain fee mode encoding key off this value.
    pub speed: u8,
    /// Textual fee mode. Unrecognized inputs pass through unchanged.
    pub fee_mode: String,
}

/// Maps a human speed/fee-mode input to its canonical form.
///
/// A non-empty textual fee-mode takes priority over a numeric speed.
/// Unrecognized fee-mode values pass through as-is but still pin the numeric
/// speed to 0, so downstream consumers always see a well-defined code.
/// Absent both inputs, the result is eco.
pub fn normalize_speed(fee_mode: Option<&str>, speed: Option<&SpeedInput>) -> CanonicalSpeed {
    if let Some(mode) = fee_mode.map(str::trim).filter(|m| !m.is_empty()) {
        return match mode {
            "eco" => CanonicalSpeed { speed: 0, fee_mode: "eco".into() },
            "instant" => CanonicalSpeed { speed: 1, fee_mode: "instant".into() },
            other => CanonicalSpeed { speed: 0, fee_mode: other.into() },
        };
    }

    match speed.map(SpeedInput::as_code) {
        Some(1) => CanonicalSpeed { speed: 1, fee_mode: "instant".into() },
        _ => CanonicalSpeed { speed: 0, fee_mode: "eco".into() },
    }
}

/// Classifies a token into a settlement lane from the configured
/// allow-lists.
///
/// The EIP-3009 list wins over the EIP-2612 list; anything unlisted settles
/// via Permit2. Self-pay bypasses lane classification entirely.
pub fn select_lane(mode: SettlementMode, token: Address, lists: &LaneLists) -> Lane {
    if mode == SettlementMode::SelfPay {
        return Lane::SelfPay;
    }
    if lists.eip3009.contains(&token) {
        Lane::Eip3009
    } else if lists.eip2612.contains(&token) {
        Lane::Eip2612
    } else {
        Lane::Permit2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn fee_mode_takes_priority() {
        let speed = SpeedInput::Num(1);
        let out = normalize_speed(Some("eco"), Some(&speed));
        assert_eq!(out, CanonicalSpeed { speed: 0, fee_mode: "eco".into() });

        let out = normalize_speed(Some("instant"), None);
        assert_eq!(out, CanonicalSpeed { speed: 1, fee_mode: "instant".into() });
    }

    #[test]
    fn empty_fee_mode_falls_back_to_speed() {
        let speed = SpeedInput::Text("1".into());
        let out = normalize_speed(Some(""), Some(&speed));
        assert_eq!(out, CanonicalSpeed { speed: 1, fee_mode: "instant".into() });
    }

    #[test]
    fn unknown_fee_mode_passes_through_with_eco_speed() {
        let speed = SpeedInput::Num(1);
        let out = normalize_speed(Some("turbo"), Some(&speed));
        assert_eq!(out, CanonicalSpeed { speed: 0, fee_mode: "turbo".into() });
    }

    #[test]
    fn absent_inputs_default_to_eco() {
        let out = normalize_speed(None, None);
        assert_eq!(out, CanonicalSpeed { speed: 0, fee_mode: "eco".into() });
    }

    #[test]
    fn unparseable_speed_defaults_to_eco() {
        let speed = SpeedInput::Text("fast".into());
        let out = normalize_speed(None, Some(&speed));
        assert_eq!(out.speed, 0);
    }

    #[test]
    fn eip3009_list_wins_over_eip2612() {
        let token = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
        let lists = LaneLists {
            eip3009: [token].into_iter().collect(),
            eip2612: [token].into_iter().collect(),
        };
        assert_eq!(select_lane(SettlementMode::Sponsored, token, &lists), Lane::Eip3009);
    }

    #[test]
    fn unlisted_token_settles_via_permit2() {
        let token = address!("1111111111111111111111111111111111111111");
        assert_eq!(
            select_lane(SettlementMode::Sponsored, token, &LaneLists::default()),
            Lane::Permit2
        );
    }

    #[test]
    fn self_pay_ignores_allow_lists() {
        let token = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
        let lists = LaneLists { eip3009: [token].into_iter().collect(), ..Default::default() };
        assert_eq!(select_lane(SettlementMode::SelfPay, token, &lists), Lane::SelfPay);
    }
}
