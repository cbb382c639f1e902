use std::sync::LazyLock;

use alloy::primitives::{hex, keccak256, U256};
use rust_decimal::Decimal;

use crate::errors::DecodeError;
use crate::rpc::ChainLog;

pub const CAMPAIGN_CREATED_SIGNATURE: &str =
    "CampaignCreated(address,address,address,string,string)";
pub const TOKENS_PURCHASED_SIGNATURE: &str = "TokensPurchased(address,uint256,uint256)";
pub const TOKENS_SOLD_SIGNATURE: &str = "TokensSold(address,uint256,uint256)";

pub static CAMPAIGN_CREATED_TOPIC: LazyLock<String> =
    LazyLock::new(|| event_topic(CAMPAIGN_CREATED_SIGNATURE));
pub static TOKENS_PURCHASED_TOPIC: LazyLock<String> =
    LazyLock::new(|| event_topic(TOKENS_PURCHASED_SIGNATURE));
pub static TOKENS_SOLD_TOPIC: LazyLock<String> =
    LazyLock::new(|| event_topic(TOKENS_SOLD_SIGNATURE));

/// Largest mantissa a `Decimal` can hold (2^96 - 1).
const MAX_DECIMAL_MANTISSA: u128 = 79_228_162_514_264_337_593_543_950_335;
const MAX_DECIMAL_SCALE: u32 = 28;

/// topic0 of an event signature, `0x`-prefixed lowercase hex.
pub fn event_topic(signature: &str) -> String {
    hex::encode_prefixed(keccak256(signature.as_bytes()))
}

/// The closed set of events the indexer understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    /// `CampaignCreated(address indexed campaign, address indexed token,
    /// address indexed creator, string name, string symbol)`
    CampaignCreated {
        campaign: String,
        token: String,
        creator: String,
        name: String,
        symbol: String,
    },
    /// `TokensPurchased(address indexed buyer, uint256 amountOut, uint256 cost)`
    Buy {
        wallet: String,
        token_amount_out: U256,
        quote_cost: U256,
    },
    /// `TokensSold(address indexed seller, uint256 amountIn, uint256 payout)`
    Sell {
        wallet: String,
        token_amount_in: U256,
        quote_payout: U256,
    },
}

/// Decode a log into a [`DomainEvent`] by its topic0.
pub fn decode_event(log: &ChainLog) -> Result<DomainEvent, DecodeError> {
    let topic0 = log.topic0().ok_or(DecodeError::MissingTopic)?;

    if topic0 == CAMPAIGN_CREATED_TOPIC.as_str() {
        expect_topics(log, 4)?;
        let data = decode_data(&log.data)?;
        return Ok(DomainEvent::CampaignCreated {
            campaign: topic_address(&log.topics[1])?,
            token: topic_address(&log.topics[2])?,
            creator: topic_address(&log.topics[3])?,
            name: read_string(&data, 0, "name")?,
            symbol: read_string(&data, 1, "symbol")?,
        });
    }

    if topic0 == TOKENS_PURCHASED_TOPIC.as_str() {
        expect_topics(log, 2)?;
        let data = decode_data(&log.data)?;
        return Ok(DomainEvent::Buy {
            wallet: topic_address(&log.topics[1])?,
            token_amount_out: read_uint(&data, 0)?,
            quote_cost: read_uint(&data, 1)?,
        });
    }

    if topic0 == TOKENS_SOLD_TOPIC.as_str() {
        expect_topics(log, 2)?;
        let data = decode_data(&log.data)?;
        return Ok(DomainEvent::Sell {
            wallet: topic_address(&log.topics[1])?,
            token_amount_in: read_uint(&data, 0)?,
            quote_payout: read_uint(&data, 1)?,
        });
    }

    Err(DecodeError::UnknownTopic(topic0.to_string()))
}

fn expect_topics(log: &ChainLog, expected: usize) -> Result<(), DecodeError> {
    if log.topics.len() != expected {
        return Err(DecodeError::TopicCount {
            expected,
            actual: log.topics.len(),
        });
    }
    Ok(())
}

fn decode_data(data: &str) -> Result<Vec<u8>, DecodeError> {
    hex::decode(data).map_err(|_| DecodeError::InvalidHex { field: "data" })
}

/// Extract a 20-byte address from a 32-byte zero-padded topic.
fn topic_address(topic: &str) -> Result<String, DecodeError> {
    let hex_part = topic.strip_prefix("0x").unwrap_or(topic);
    if hex_part.len() != 64 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DecodeError::InvalidHex { field: "topic" });
    }
    Ok(format!("0x{}", &hex_part[24..]).to_lowercase())
}

/// The 32-byte word at `byte_offset`, if the data reaches that far.
fn word_at(data: &[u8], byte_offset: usize) -> Result<&[u8], DecodeError> {
    byte_offset
        .checked_add(32)
        .and_then(|end| data.get(byte_offset..end))
        .ok_or(DecodeError::DataTooShort {
            needed: byte_offset.saturating_add(32),
            actual: data.len(),
        })
}

fn read_uint(data: &[u8], index: usize) -> Result<U256, DecodeError> {
    Ok(U256::from_be_slice(word_at(data, index.saturating_mul(32))?))
}

/// Read a word that must fit a usize (offsets and lengths).
fn read_usize_at(
    data: &[u8],
    byte_offset: usize,
    field: &'static str,
) -> Result<usize, DecodeError> {
    let bytes = word_at(data, byte_offset)?;
    if bytes[..24].iter().any(|b| *b != 0) {
        return Err(DecodeError::InvalidString { field });
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&bytes[24..]);
    usize::try_from(u64::from_be_bytes(tail)).map_err(|_| DecodeError::InvalidString { field })
}

/// Read a dynamic `string` whose offset lives in head word `index`.
fn read_string(data: &[u8], index: usize, field: &'static str) -> Result<String, DecodeError> {
    let offset = read_usize_at(data, index * 32, field)?;
    let len = read_usize_at(data, offset, field)?;
    let end = offset
        .checked_add(32)
        .and_then(|start| start.checked_add(len))
        .ok_or(DecodeError::InvalidString { field })?;
    let start = end - len;
    let bytes = data.get(start..end).ok_or(DecodeError::DataTooShort {
        needed: end,
        actual: data.len(),
    })?;
    String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidString { field })
}

/// Scale a raw uint256 amount by `decimals`.
///
/// Digits beyond what a `Decimal` can represent are truncated from the
/// fractional end; an integer part that does not fit is an error.
pub fn to_decimal(raw: U256, decimals: u32) -> Result<Decimal, DecodeError> {
    let max_mantissa = U256::from(MAX_DECIMAL_MANTISSA);
    let ten = U256::from(10u64);
    let mut value = raw;
    let mut scale = decimals;

    while value > max_mantissa || scale > MAX_DECIMAL_SCALE {
        if scale == 0 {
            return Err(DecodeError::AmountOverflow {
                raw: raw.to_string(),
                decimals,
            });
        }
        value /= ten;
        scale -= 1;
    }

    Decimal::try_from_i128_with_scale(value.to::<u128>() as i128, scale).map_err(|_| {
        DecodeError::AmountOverflow {
            raw: raw.to_string(),
            decimals,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad_address(addr: &str) -> String {
        format!("0x{:0>64}", addr.trim_start_matches("0x"))
    }

    fn encode_words(words: &[U256]) -> String {
        let mut out = String::from("0x");
        for w in words {
            out.push_str(&hex::encode(w.to_be_bytes::<32>()));
        }
        out
    }

    fn log_with(topics: Vec<String>, data: String) -> ChainLog {
        ChainLog {
            address: "0xcampaign".into(),
            topics,
            data,
            block_number: 10,
            log_index: 0,
            tx_hash: "0xabc".into(),
            block_timestamp: None,
            removed: false,
        }
    }

    #[test]
    fn test_event_topic_is_keccak() {
        // keccak256("Transfer(address,address,uint256)")
        assert_eq!(
            event_topic("Transfer(address,address,uint256)"),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn test_decode_buy() {
        let wallet = "0x00000000000000000000000000000000000000aa";
        let log = log_with(
            vec![TOKENS_PURCHASED_TOPIC.clone(), pad_address(wallet)],
            encode_words(&[U256::from(1_000u64), U256::from(25u64)]),
        );
        let event = decode_event(&log).unwrap();
        assert_eq!(
            event,
            DomainEvent::Buy {
                wallet: wallet.into(),
                token_amount_out: U256::from(1_000u64),
                quote_cost: U256::from(25u64),
            }
        );
    }

    #[test]
    fn test_decode_sell_short_data() {
        let log = log_with(
            vec![TOKENS_SOLD_TOPIC.clone(), pad_address("0xbb")],
            encode_words(&[U256::from(1u64)]),
        );
        assert!(matches!(
            decode_event(&log),
            Err(DecodeError::DataTooShort { .. })
        ));
    }

    #[test]
    fn test_decode_campaign_created() {
        // (string "Moon", string "MOON"): two offsets, then two length+data tails
        let mut data = String::from("0x");
        for w in [U256::from(64u64), U256::from(128u64), U256::from(4u64)] {
            data.push_str(&hex::encode(w.to_be_bytes::<32>()));
        }
        data.push_str(&format!("{:0<64}", hex::encode("Moon")));
        data.push_str(&hex::encode(U256::from(4u64).to_be_bytes::<32>()));
        data.push_str(&format!("{:0<64}", hex::encode("MOON")));

        let log = log_with(
            vec![
                CAMPAIGN_CREATED_TOPIC.clone(),
                pad_address("0x01"),
                pad_address("0x02"),
                pad_address("0x03"),
            ],
            data,
        );

        match decode_event(&log).unwrap() {
            DomainEvent::CampaignCreated {
                campaign,
                token,
                creator,
                name,
                symbol,
            } => {
                assert_eq!(campaign, "0x0000000000000000000000000000000000000001");
                assert_eq!(token, "0x0000000000000000000000000000000000000002");
                assert_eq!(creator, "0x0000000000000000000000000000000000000003");
                assert_eq!(name, "Moon");
                assert_eq!(symbol, "MOON");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_huge_string_offset_is_decode_error() {
        let mut data = String::from("0x");
        for w in [U256::from(u64::MAX - 8), U256::from(64u64), U256::ZERO] {
            data.push_str(&hex::encode(w.to_be_bytes::<32>()));
        }
        let log = log_with(
            vec![
                CAMPAIGN_CREATED_TOPIC.clone(),
                pad_address("0x01"),
                pad_address("0x02"),
                pad_address("0x03"),
            ],
            data,
        );
        assert!(matches!(
            decode_event(&log),
            Err(DecodeError::DataTooShort { .. })
        ));
    }

    #[test]
    fn test_huge_string_length_is_decode_error() {
        let mut data = String::from("0x");
        for w in [U256::from(64u64), U256::from(64u64), U256::from(u64::MAX - 8)] {
            data.push_str(&hex::encode(w.to_be_bytes::<32>()));
        }
        let log = log_with(
            vec![
                CAMPAIGN_CREATED_TOPIC.clone(),
                pad_address("0x01"),
                pad_address("0x02"),
                pad_address("0x03"),
            ],
            data,
        );
        assert!(decode_event(&log).is_err());
    }

    #[test]
    fn test_unknown_topic() {
        let log = log_with(vec!["0x1234".into()], "0x".into());
        assert!(matches!(
            decode_event(&log),
            Err(DecodeError::UnknownTopic(_))
        ));
    }

    #[test]
    fn test_wrong_topic_count() {
        let log = log_with(vec![TOKENS_PURCHASED_TOPIC.clone()], "0x".into());
        assert_eq!(
            decode_event(&log),
            Err(DecodeError::TopicCount {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_to_decimal() {
        let one_and_half = U256::from(1_500_000_000_000_000_000u128);
        assert_eq!(to_decimal(one_and_half, 18).unwrap(), Decimal::new(15, 1));
        assert_eq!(to_decimal(U256::ZERO, 18).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_to_decimal_truncates_precision_for_large_values() {
        // 10^30 wei = 10^12 tokens: fits only after dropping fractional digits
        let raw = U256::from(10u64).pow(U256::from(30u64));
        assert_eq!(to_decimal(raw, 18).unwrap(), Decimal::from(1_000_000_000_000u64));
    }

    #[test]
    fn test_to_decimal_overflow() {
        assert!(to_decimal(U256::MAX, 0).is_err());
    }
}
