//! Fixed AT commands, argument encoders, and reply parsers.
//!
//! All functions are pure. The driver renders templates with the encoders
//! here, runs the transaction, and feeds the classified response and
//! notification lines back into the parsers.
//!
//! # Reply shapes
//!
//! - `AT+CGSN=1` -> notification `+CGSN: 357347090012345`
//! - `AT+CIMI` -> response line `242016000012345`
//! - `AT+CEREG?` -> notification `+CEREG: <n>,<stat>[,...]`
//! - socket creation -> response line `<socket>` or notification `+USOCR: <socket>`
//! - `AT+NSORF` -> response line `<socket>,"<ip>",<port>,<length>,"<hex>",<remaining>`

use atlab_core::{Error, Result, SendFlag, SocketHandle};

// ---------------------------------------------------------------
// Fixed commands and tags
// ---------------------------------------------------------------

/// Liveness probe.
pub const PING: &str = "AT";

/// Request the IMEI as a tagged reply.
pub const IMEI_QUERY: &str = "AT+CGSN=1";

/// Tag of the IMEI reply.
pub const IMEI_TAG: &str = "+CGSN";

/// Request the IMSI.
pub const IMSI_QUERY: &str = "AT+CIMI";

/// EPS registration status tag.
pub const REGISTRATION_TAG: &str = "+CEREG";

/// Tag carrying a new socket handle on SARA-R4.
pub const SOCKET_CREATED_TAG: &str = "+USOCR";

/// Registration status meaning "registered, home network".
pub const REGISTERED_HOME: u32 = 1;

// ---------------------------------------------------------------
// Argument encoders
// ---------------------------------------------------------------

/// Render a 3GPP timer octet as eight binary digits (`223` -> `11011111`).
pub fn timer_bits(value: u8) -> String {
    format!("{value:08b}")
}

/// Render a send flag as `0x` plus three lowercase hex digits (`0x200`).
pub fn flag_hex(flag: SendFlag) -> String {
    format!("0x{:03x}", flag.bits())
}

/// Render a payload as uppercase hex (`hi` -> `6869`).
pub fn payload_hex(payload: &[u8]) -> String {
    hex::encode_upper(payload)
}

/// PSM enable flag as the module expects it.
pub fn enabled_flag(enabled: bool) -> u8 {
    u8::from(enabled)
}

// ---------------------------------------------------------------
// Reply parsers
// ---------------------------------------------------------------

fn parse_number<T: std::str::FromStr>(what: &str, raw: &str) -> Result<T> {
    let token = raw.trim().trim_matches('"');
    token
        .parse::<T>()
        .map_err(|_| Error::Parse(format!("{what}: expected a number, got {raw:?}")))
}

/// Parse the IMEI from the `+CGSN: 3573...` notification.
///
/// Other notifications arriving alongside are skipped; without the tag the
/// result is [`Error::TagNotFound`].
pub fn parse_imei(notifications: &[String]) -> Result<u64> {
    let line = notifications
        .iter()
        .find(|l| l.starts_with(IMEI_TAG))
        .ok_or_else(|| Error::TagNotFound(IMEI_TAG.into()))?;
    let (_, value) = line
        .split_once(": ")
        .ok_or_else(|| Error::Parse(format!("identity: no value in {line:?}")))?;
    parse_number("identity", value)
}

/// Parse an identity number from the first response line.
pub fn parse_identity_line(response: &[String]) -> Result<u64> {
    let line = response
        .first()
        .ok_or_else(|| Error::Parse("identity: empty response".into()))?;
    parse_number("identity", line)
}

/// Extract the `<stat>` field from the first `+CEREG` notification.
///
/// Returns [`Error::TagNotFound`] when no notification carries the tag.
pub fn parse_registration_status(notifications: &[String]) -> Result<u32> {
    let line = notifications
        .iter()
        .find(|l| l.starts_with(REGISTRATION_TAG))
        .ok_or_else(|| Error::TagNotFound(REGISTRATION_TAG.into()))?;
    let field = line
        .split(',')
        .nth(1)
        .ok_or_else(|| Error::Parse(format!("registration: no status field in {line:?}")))?;
    parse_number("registration", field)
}

/// Extract a socket handle from a creation reply.
///
/// The first response line wins; otherwise the first notification carrying
/// the `+USOCR` tag.
pub fn parse_socket_handle(response: &[String], notifications: &[String]) -> Result<SocketHandle> {
    if let Some(line) = response.first() {
        return parse_number("socket", line).map(SocketHandle::new);
    }
    if let Some(rest) = notifications
        .iter()
        .find_map(|l| l.strip_prefix(SOCKET_CREATED_TAG))
    {
        let rest = rest.trim_start_matches(':');
        return parse_number("socket", rest).map(SocketHandle::new);
    }
    Err(Error::Parse("socket: no handle in reply".into()))
}

/// A datagram read back from the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedDatagram {
    pub socket: u32,
    pub ip: String,
    pub port: u16,
    pub payload: Vec<u8>,
    /// Bytes still buffered in the module for this socket.
    pub remaining: usize,
}

/// Parse one `+NSORF`-style line:
/// `<socket>,"<ip>",<port>,<length>,"<hex>",<remaining>`.
pub fn parse_received_datagram(line: &str) -> Result<ReceivedDatagram> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 6 {
        return Err(Error::Parse(format!(
            "datagram: expected 6 fields, got {} in {line:?}",
            fields.len()
        )));
    }
    let length: usize = parse_number("datagram length", fields[3])?;
    let payload = hex::decode(fields[4].trim_matches('"'))
        .map_err(|e| Error::Parse(format!("datagram: bad hex payload ({e})")))?;
    if payload.len() != length {
        return Err(Error::Parse(format!(
            "datagram: length {length} but payload has {} bytes",
            payload.len()
        )));
    }
    Ok(ReceivedDatagram {
        socket: parse_number("datagram socket", fields[0])?,
        ip: fields[1].trim_matches('"').to_string(),
        port: parse_number("datagram port", fields[2])?,
        payload,
        remaining: parse_number("datagram remaining", fields[5])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn timer_bits_are_eight_wide() {
        assert_eq!(timer_bits(223), "11011111");
        assert_eq!(timer_bits(1), "00000001");
        assert_eq!(timer_bits(0), "00000000");
        assert_eq!(timer_bits(255), "11111111");
    }

    #[test]
    fn flag_hex_is_zero_padded() {
        assert_eq!(flag_hex(SendFlag::None), "0x000");
        assert_eq!(flag_hex(SendFlag::ReleaseAfterNextMessage), "0x200");
        assert_eq!(flag_hex(SendFlag::ReleaseAfterNextReply), "0x400");
    }

    #[test]
    fn payload_hex_uppercase() {
        assert_eq!(payload_hex(b"hi"), "6869");
        assert_eq!(payload_hex(&[0xab, 0x0f]), "AB0F");
        assert_eq!(payload_hex(b""), "");
    }

    #[test]
    fn identity_from_notification() {
        let n = lines(&["+CGSN: 357347090012345"]);
        assert_eq!(parse_imei(&n).unwrap(), 357_347_090_012_345);
    }

    #[test]
    fn imei_skips_unrelated_notification() {
        let n = lines(&["+CSCON: 1", "+CGSN: 357347090012345"]);
        assert_eq!(parse_imei(&n).unwrap(), 357_347_090_012_345);
    }

    #[test]
    fn imei_tag_absent() {
        let err = parse_imei(&lines(&["+CSCON: 1"])).unwrap_err();
        assert!(matches!(err, Error::TagNotFound(ref t) if t == "+CGSN"));
        assert!(matches!(parse_imei(&[]), Err(Error::TagNotFound(_))));
    }

    #[test]
    fn identity_from_response_line() {
        let r = lines(&["242016000012345"]);
        assert_eq!(parse_identity_line(&r).unwrap(), 242_016_000_012_345);
    }

    #[test]
    fn identity_missing_or_garbled() {
        assert!(matches!(
            parse_imei(&lines(&["+CGSN"])),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            parse_identity_line(&lines(&["SIM not inserted"])),
            Err(Error::Parse(_))
        ));
        assert!(matches!(parse_identity_line(&[]), Err(Error::Parse(_))));
    }

    #[test]
    fn registration_status_with_quoted_field() {
        let n = lines(&["+CEREG: 1,\"1\""]);
        assert_eq!(parse_registration_status(&n).unwrap(), 1);
    }

    #[test]
    fn registration_status_skips_other_tags() {
        let n = lines(&["+NPSMR: 0", "+CEREG: 0,2,\"1A2B\",\"01C2D3E4\",9"]);
        assert_eq!(parse_registration_status(&n).unwrap(), 2);
    }

    #[test]
    fn registration_tag_not_found_is_distinct() {
        let err = parse_registration_status(&lines(&["+CSCON: 1"])).unwrap_err();
        assert!(matches!(err, Error::TagNotFound(ref t) if t == "+CEREG"));
        assert_eq!(err.to_string(), "+CEREG response not found");
    }

    #[test]
    fn registration_without_status_field() {
        let err = parse_registration_status(&lines(&["+CEREG: 1"])).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn socket_from_response_line() {
        let h = parse_socket_handle(&lines(&["3"]), &[]).unwrap();
        assert_eq!(h.raw(), 3);
    }

    #[test]
    fn socket_from_usocr_notification() {
        let h = parse_socket_handle(&[], &lines(&["+USOCR: 3"])).unwrap();
        assert_eq!(h.raw(), 3);
    }

    #[test]
    fn socket_response_line_takes_precedence() {
        let h = parse_socket_handle(&lines(&["3"]), &lines(&["+USOCR: 5"])).unwrap();
        assert_eq!(h.raw(), 3);
    }

    #[test]
    fn socket_notification_after_unrelated_one() {
        let h = parse_socket_handle(&[], &lines(&["+CSCON: 1", "+USOCR: 3"])).unwrap();
        assert_eq!(h.raw(), 3);
    }

    #[test]
    fn socket_missing_is_parse_error() {
        assert!(matches!(
            parse_socket_handle(&[], &lines(&["+CEREG: 1,1"])),
            Err(Error::Parse(_))
        ));
        assert!(matches!(parse_socket_handle(&[], &[]), Err(Error::Parse(_))));
    }

    #[test]
    fn received_datagram_decodes_payload() {
        let d = parse_received_datagram(r#"0,"10.0.0.1",1234,2,"6869",0"#).unwrap();
        assert_eq!(d.socket, 0);
        assert_eq!(d.ip, "10.0.0.1");
        assert_eq!(d.port, 1234);
        assert_eq!(d.payload, b"hi");
        assert_eq!(d.remaining, 0);
    }

    #[test]
    fn received_datagram_length_mismatch() {
        let err = parse_received_datagram(r#"0,"10.0.0.1",1234,3,"6869",0"#).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn received_datagram_malformed() {
        assert!(parse_received_datagram("0,7").is_err());
        assert!(parse_received_datagram(r#"0,"10.0.0.1",1234,1,"ZZ",0"#).is_err());
    }
}
