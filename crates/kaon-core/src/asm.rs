// kaon-core/src/asm.rs

//! Parser for script disassembly carrying EVM calls and creates.
//!
//! Four shapes exist on chain:
//!
//! ```text
//! call:          <ver> <gasLimit> <gasPrice> <data> <to> OP_CALL
//! call+sender:   <type> <from> <scriptSig> OP_SENDER <ver> <gasLimit> <gasPrice> <data> <to> OP_CALL
//! create:        <ver> <gasLimit> <gasPrice> <data> OP_CREATE
//! create+sender: <type> <from> <scriptSig> OP_SENDER <ver> <gasLimit> <gasPrice> <data> OP_CREATE
//! ```

use crate::{CoreError, CoreResult};
use std::fmt;

pub const OP_CALL: &str = "OP_CALL";
pub const OP_CREATE: &str = "OP_CREATE";
pub const OP_SENDER: &str = "OP_SENDER";
pub const OP_SPEND: &str = "OP_SPEND";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptGrammar {
    Call,
    CallSender,
    Create,
    CreateSender,
}

impl fmt::Display for ScriptGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScriptGrammar::Call => "OP_CALL",
            ScriptGrammar::CallSender => "call_sender",
            ScriptGrammar::Create => "OP_CREATE",
            ScriptGrammar::CreateSender => "create_sender",
        };
        f.write_str(name)
    }
}

/// Contract metadata recovered from a transaction output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractInfo {
    /// Sender key id, hex without `0x`, only present on OP_SENDER scripts
    pub from: Option<String>,
    /// Contract address, hex without `0x`, absent for creates
    pub to: Option<String>,
    pub gas_limit: u64,
    pub gas_price: u64,
    /// Call data or init code, hex without `0x`
    pub user_input: String,
}

/// Split a disassembly into tokens
pub fn tokenize(asm: &str) -> Vec<&str> {
    asm.split_whitespace().collect()
}

/// Parse an OP_CALL output, sender form first
pub fn parse_call(parts: &[&str]) -> CoreResult<ContractInfo> {
    parse_call_sender(parts).or_else(|_| parse_plain_call(parts))
}

/// Parse an OP_CREATE output, sender form first
pub fn parse_create(parts: &[&str]) -> CoreResult<ContractInfo> {
    parse_create_sender(parts).or_else(|_| parse_plain_create(parts))
}

pub fn parse_plain_call(parts: &[&str]) -> CoreResult<ContractInfo> {
    expect_shape(ScriptGrammar::Call, parts, 6, "6")?;
    expect_op(ScriptGrammar::Call, parts[5], OP_CALL)?;

    let (gas_limit, gas_price) = parse_gas_fields(ScriptGrammar::Call, parts[1], parts[2])?;
    Ok(ContractInfo {
        from: None,
        to: Some(parts[4].to_string()),
        gas_limit,
        gas_price,
        user_input: parts[3].to_string(),
    })
}

pub fn parse_call_sender(parts: &[&str]) -> CoreResult<ContractInfo> {
    expect_shape(ScriptGrammar::CallSender, parts, 10, "10")?;
    expect_op(ScriptGrammar::CallSender, parts[3], OP_SENDER)?;
    expect_op(ScriptGrammar::CallSender, parts[9], OP_CALL)?;

    let (gas_limit, gas_price) = parse_gas_fields(ScriptGrammar::CallSender, parts[5], parts[6])?;
    Ok(ContractInfo {
        from: Some(parts[1].to_string()),
        to: Some(parts[8].to_string()),
        gas_limit,
        gas_price,
        user_input: parts[7].to_string(),
    })
}

pub fn parse_plain_create(parts: &[&str]) -> CoreResult<ContractInfo> {
    if parts.len() < 5 {
        return Err(CoreError::ScriptShape {
            grammar: ScriptGrammar::Create,
            expected: "at least 5",
            got: parts.len(),
        });
    }
    expect_op(ScriptGrammar::Create, parts[parts.len() - 1], OP_CREATE)?;

    let (gas_limit, gas_price) = parse_gas_fields(ScriptGrammar::Create, parts[1], parts[2])?;
    Ok(ContractInfo {
        from: None,
        to: None,
        gas_limit,
        gas_price,
        user_input: parts[3].to_string(),
    })
}

pub fn parse_create_sender(parts: &[&str]) -> CoreResult<ContractInfo> {
    expect_shape(ScriptGrammar::CreateSender, parts, 9, "9")?;
    expect_op(ScriptGrammar::CreateSender, parts[3], OP_SENDER)?;
    expect_op(ScriptGrammar::CreateSender, parts[8], OP_CREATE)?;

    let (gas_limit, gas_price) = parse_gas_fields(ScriptGrammar::CreateSender, parts[5], parts[6])?;
    Ok(ContractInfo {
        from: Some(parts[1].to_string()),
        to: None,
        gas_limit,
        gas_price,
        user_input: parts[7].to_string(),
    })
}

/// Key id of a pay-to-pubkey-hash script:
/// `OP_DUP OP_HASH160 <keyid> OP_EQUALVERIFY OP_CHECKSIG`
pub fn parse_p2pkh_receiver<'a>(parts: &[&'a str]) -> CoreResult<&'a str> {
    if parts.len() != 5 {
        return Err(CoreError::ScriptShape {
            grammar: ScriptGrammar::Call,
            expected: "5 (pay to pubkey hash)",
            got: parts.len(),
        });
    }
    Ok(parts[2])
}

/// Gas limit and price are decimal on current nodes, but some outputs carry
/// them as little-endian hex. Either both parse as decimal or both are
/// re-read as byte-reversed hex.
pub fn parse_gas_fields(grammar: ScriptGrammar, gas_limit: &str, gas_price: &str) -> CoreResult<(u64, u64)> {
    if let (Ok(limit), Ok(price)) = (gas_limit.parse::<u64>(), gas_price.parse::<u64>()) {
        return Ok((limit, price));
    }

    let limit = reversed_hex_to_u64(gas_limit).ok_or_else(|| CoreError::ScriptField {
        grammar,
        reason: format!("unparsable gas limit {:?}", gas_limit),
    })?;
    let price = reversed_hex_to_u64(gas_price).ok_or_else(|| CoreError::ScriptField {
        grammar,
        reason: format!("unparsable gas price {:?}", gas_price),
    })?;
    Ok((limit, price))
}

/// Reverse byte pairs (`90d00300` -> `0003d090`) and read as hex
pub fn reversed_hex_to_u64(s: &str) -> Option<u64> {
    if s.is_empty() || s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    let reversed: String = s
        .as_bytes()
        .chunks(2)
        .rev()
        .map(|pair| std::str::from_utf8(pair).unwrap_or_default())
        .collect();
    u64::from_str_radix(&reversed, 16).ok()
}

fn expect_shape(grammar: ScriptGrammar, parts: &[&str], n: usize, expected: &'static str) -> CoreResult<()> {
    if parts.len() != n {
        return Err(CoreError::ScriptShape { grammar, expected, got: parts.len() });
    }
    Ok(())
}

fn expect_op(grammar: ScriptGrammar, token: &str, op: &str) -> CoreResult<()> {
    if token != op {
        return Err(CoreError::ScriptField {
            grammar,
            reason: format!("expected {} but found {}", op, token),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALL: &str = "4 25548 40 8588b2c50000000000000000000000000000000000000000000000000000000000000000 57946bb437560b13275c32a468c6fd1e0c2cdd48 OP_CALL";
    const CALL_SENDER: &str = "1 81e872329e767a0487de7e970992b13b644f1f4f 6b483045022100b83ef90bc808569fb00e29a0f6209d32c1795207c95a554c091401ac8fa8ab920220694b7ec801efd2facea2026d12e8eb5de7689c637f539a620f24c6da8fff235f0121021104b7672c2e08fe321f1bfaffc3768c2777adeedb857b4313ed9d2f15fc8ce4 OP_SENDER 4 55000 40 a9059cbb000000000000000000000000710e94d7f8a5d7a1e5be52bd783370d6e3008a2a0000000000000000000000000000000000000000000000000000000005f5e100 af1ae4e29253ba755c723bca25e883b8deb777b8 OP_CALL";

    #[test]
    fn test_plain_call() {
        let info = parse_call(&tokenize(CALL)).unwrap();
        assert_eq!(info.gas_limit, 0x63cc);
        assert_eq!(info.gas_price, 40);
        assert_eq!(info.to.as_deref(), Some("57946bb437560b13275c32a468c6fd1e0c2cdd48"));
        assert!(info.from.is_none());
    }

    #[test]
    fn test_call_with_sender() {
        let info = parse_call(&tokenize(CALL_SENDER)).unwrap();
        assert_eq!(info.from.as_deref(), Some("81e872329e767a0487de7e970992b13b644f1f4f"));
        assert_eq!(info.to.as_deref(), Some("af1ae4e29253ba755c723bca25e883b8deb777b8"));
        assert_eq!(info.gas_limit, 0xd6d8);
        assert!(info.user_input.starts_with("a9059cbb"));
    }

    #[test]
    fn test_reversed_gas_fields() {
        let asm = "4 90d0030000000000 2800000000000000 a9059cbb00 f2703e93f87b846a7aacec1247beaec1c583daa4 OP_CALL";
        let info = parse_call(&tokenize(asm)).unwrap();
        assert_eq!(info.gas_limit, 0x3d090);
        assert_eq!(info.gas_price, 0x28);
    }

    #[test]
    fn test_plain_create() {
        let asm = "4 2500000 40 6080604052 OP_CREATE";
        let info = parse_create(&tokenize(asm)).unwrap();
        assert_eq!(info.gas_limit, 2_500_000);
        assert_eq!(info.user_input, "6080604052");
        assert!(info.to.is_none());
    }

    #[test]
    fn test_create_with_sender() {
        let asm = "1 1ce507204a6fc8fd6aa7e54d1481d30acb0dbead 6a47 OP_SENDER 4 6721975 100 6060 OP_CREATE";
        let info = parse_create(&tokenize(asm)).unwrap();
        assert_eq!(info.from.as_deref(), Some("1ce507204a6fc8fd6aa7e54d1481d30acb0dbead"));
        assert_eq!(info.gas_limit, 6_721_975);
        assert_eq!(info.gas_price, 100);
    }

    #[test]
    fn test_shape_errors() {
        let err = parse_plain_call(&tokenize("4 1 OP_CALL")).unwrap_err();
        assert_eq!(err.to_string(), "invalid OP_CALL script: expected 6 parts, got 3");

        let err = parse_call(&tokenize("4 zz yy 00 ab OP_CALL")).unwrap_err();
        assert!(err.to_string().contains("gas limit"));
    }

    #[test]
    fn test_p2pkh_receiver() {
        let parts = tokenize("OP_DUP OP_HASH160 ce7137386121f7531f716d2d4ff36805bc65b3ec OP_EQUALVERIFY OP_CHECKSIG");
        assert_eq!(parse_p2pkh_receiver(&parts).unwrap(), "ce7137386121f7531f716d2d4ff36805bc65b3ec");
    }
}
