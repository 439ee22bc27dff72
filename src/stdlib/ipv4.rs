//! `ipv4.*` builtins: address arithmetic for link planning scripts.
//!
//! Addresses are handled as `u32` host-order integers; masks are accepted
//! both as dotted quads and as prefix lengths. Every function maps over
//! the elements of its first argument.

use crate::error::RuntimeError;
use crate::interpreter::{EvalContext, Scalar};
use crate::stdlib::{require_args, text_arg};

fn bad_arg(function: &str, message: String) -> RuntimeError {
    RuntimeError::InvalidArgument {
        function: function.to_string(),
        message,
    }
}

fn parse_ip(function: &str, text: &str) -> Result<u32, RuntimeError> {
    let mut address: u32 = 0;
    let mut octets = 0;
    for part in text.trim().split('.') {
        let octet: u32 = part
            .parse()
            .ok()
            .filter(|octet| *octet <= 255)
            .ok_or_else(|| bad_arg(function, format!("invalid address '{text}'")))?;
        address = (address << 8) | octet;
        octets += 1;
    }
    if octets != 4 {
        return Err(bad_arg(function, format!("invalid address '{text}'")));
    }
    Ok(address)
}

fn format_ip(address: u32) -> String {
    format!(
        "{}.{}.{}.{}",
        address >> 24,
        (address >> 16) & 0xff,
        (address >> 8) & 0xff,
        address & 0xff
    )
}

fn pfxlen_to_mask(function: &str, pfxlen: u32) -> Result<u32, RuntimeError> {
    if pfxlen > 32 {
        return Err(bad_arg(function, format!("invalid prefix length {pfxlen}")));
    }
    if pfxlen == 0 {
        return Ok(0);
    }
    Ok(u32::MAX << (32 - pfxlen))
}

/// A mask argument: `255.255.255.0` and `24` both work.
fn parse_mask(function: &str, text: &str) -> Result<u32, RuntimeError> {
    if text.contains('.') {
        return parse_ip(function, text);
    }
    let pfxlen = text
        .trim()
        .parse()
        .map_err(|_| bad_arg(function, format!("invalid mask '{text}'")))?;
    pfxlen_to_mask(function, pfxlen)
}

fn map_addresses(
    function: &str,
    items: &[Scalar],
    apply: impl Fn(u32) -> u32,
) -> Result<Vec<Scalar>, RuntimeError> {
    items
        .iter()
        .map(|item| {
            let address = parse_ip(function, &item.to_text())?;
            Ok(Scalar::Text(format_ip(apply(address))))
        })
        .collect()
}

pub fn mask(_ctx: &mut EvalContext, args: Vec<Vec<Scalar>>) -> Result<Vec<Scalar>, RuntimeError> {
    require_args("ipv4.mask", &args, 2)?;
    let mask = parse_mask("ipv4.mask", &text_arg(&args, 1))?;
    map_addresses("ipv4.mask", &args[0], |address| address & mask)
}

pub fn network(
    _ctx: &mut EvalContext,
    args: Vec<Vec<Scalar>>,
) -> Result<Vec<Scalar>, RuntimeError> {
    require_args("ipv4.network", &args, 2)?;
    let mask = parse_mask("ipv4.network", &text_arg(&args, 1))?;
    map_addresses("ipv4.network", &args[0], |address| address & mask)
}

pub fn broadcast(
    _ctx: &mut EvalContext,
    args: Vec<Vec<Scalar>>,
) -> Result<Vec<Scalar>, RuntimeError> {
    require_args("ipv4.broadcast", &args, 2)?;
    let mask = parse_mask("ipv4.broadcast", &text_arg(&args, 1))?;
    map_addresses("ipv4.broadcast", &args[0], |address| address | !mask)
}

pub fn in_network(
    _ctx: &mut EvalContext,
    args: Vec<Vec<Scalar>>,
) -> Result<Vec<Scalar>, RuntimeError> {
    require_args("ipv4.in_network", &args, 3)?;
    let network = parse_ip("ipv4.in_network", &text_arg(&args, 1))?;
    let mask = parse_mask("ipv4.in_network", &text_arg(&args, 2))?;
    let inside = args[0].iter().try_fold(true, |inside, item| {
        let address = parse_ip("ipv4.in_network", &item.to_text())?;
        Ok::<_, RuntimeError>(inside && (address & mask) == (network & mask))
    })?;
    Ok(vec![Scalar::Bool(inside)])
}

pub fn pfxlen2mask(
    _ctx: &mut EvalContext,
    args: Vec<Vec<Scalar>>,
) -> Result<Vec<Scalar>, RuntimeError> {
    require_args("ipv4.pfxlen2mask", &args, 1)?;
    args[0]
        .iter()
        .map(|item| {
            let pfxlen = item.as_int().map_err(|_| {
                bad_arg("ipv4.pfxlen2mask", format!("invalid prefix length '{item}'"))
            })?;
            let pfxlen = u32::try_from(pfxlen).map_err(|_| {
                bad_arg("ipv4.pfxlen2mask", format!("invalid prefix length {pfxlen}"))
            })?;
            Ok(Scalar::Text(format_ip(pfxlen_to_mask(
                "ipv4.pfxlen2mask",
                pfxlen,
            )?)))
        })
        .collect()
}

pub fn mask2pfxlen(
    _ctx: &mut EvalContext,
    args: Vec<Vec<Scalar>>,
) -> Result<Vec<Scalar>, RuntimeError> {
    require_args("ipv4.mask2pfxlen", &args, 1)?;
    args[0]
        .iter()
        .map(|item| {
            let mask = parse_ip("ipv4.mask2pfxlen", &item.to_text())?;
            Ok(Scalar::Int(i64::from(mask.count_ones())))
        })
        .collect()
}

/// The peer address on a point-to-point /30 link: hosts .1 and .2 of the
/// subnet point at each other. Network and broadcast addresses have no
/// peer.
pub fn remote_ip(
    _ctx: &mut EvalContext,
    args: Vec<Vec<Scalar>>,
) -> Result<Vec<Scalar>, RuntimeError> {
    require_args("ipv4.remote_ip", &args, 1)?;
    args[0]
        .iter()
        .map(|item| {
            let address = parse_ip("ipv4.remote_ip", &item.to_text())?;
            let peer = match address & 3 {
                1 => address + 1,
                2 => address - 1,
                _ => {
                    return Err(bad_arg(
                        "ipv4.remote_ip",
                        format!("{} is not a /30 host address", format_ip(address)),
                    ))
                }
            };
            Ok(Scalar::Text(format_ip(peer)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Scope;

    fn ctx() -> EvalContext<'static> {
        EvalContext::new(Scope::new(), None)
    }

    fn text(value: &str) -> Vec<Scalar> {
        vec![Scalar::Text(value.to_string())]
    }

    #[test]
    fn network_accepts_dotted_and_prefix_masks() {
        let dotted = network(&mut ctx(), vec![text("10.1.2.3"), text("255.255.255.0")]).unwrap();
        assert_eq!(dotted, text("10.1.2.0"));
        let prefix = network(&mut ctx(), vec![text("10.1.2.3"), text("24")]).unwrap();
        assert_eq!(prefix, text("10.1.2.0"));
    }

    #[test]
    fn broadcast_fills_the_host_bits() {
        let out = broadcast(&mut ctx(), vec![text("192.168.1.10"), text("28")]).unwrap();
        assert_eq!(out, text("192.168.1.15"));
    }

    #[test]
    fn prefix_and_mask_conversions_round_trip() {
        let mask = pfxlen2mask(&mut ctx(), vec![vec![Scalar::Int(26)]]).unwrap();
        assert_eq!(mask, text("255.255.255.192"));
        let len = mask2pfxlen(&mut ctx(), vec![text("255.255.255.192")]).unwrap();
        assert_eq!(len, vec![Scalar::Int(26)]);
    }

    #[test]
    fn remote_ip_pairs_the_two_hosts_of_a_slash_30() {
        assert_eq!(
            remote_ip(&mut ctx(), vec![text("10.0.0.1")]).unwrap(),
            text("10.0.0.2")
        );
        assert_eq!(
            remote_ip(&mut ctx(), vec![text("10.0.0.2")]).unwrap(),
            text("10.0.0.1")
        );
        assert!(remote_ip(&mut ctx(), vec![text("10.0.0.4")]).is_err());
    }

    #[test]
    fn malformed_addresses_are_rejected() {
        assert!(parse_ip("test", "10.0.0").is_err());
        assert!(parse_ip("test", "10.0.0.256").is_err());
        assert!(parse_ip("test", "fish").is_err());
    }

    #[test]
    fn in_network_checks_every_element() {
        let out = in_network(
            &mut ctx(),
            vec![
                vec![
                    Scalar::Text("10.0.1.5".to_string()),
                    Scalar::Text("10.0.1.200".to_string()),
                ],
                text("10.0.1.0"),
                text("24"),
            ],
        )
        .unwrap();
        assert_eq!(out, vec![Scalar::Bool(true)]);
    }
}
