/*!
 * Request Framing and Reply Encoding
 *
 * Requests arrive either as RESP arrays of bulk strings or as inline text
 * lines. Both produce an argument vector whose entries carry their own
 * length, so binary payloads (embedded NULs, CR, LF) survive intact.
 * Replies are RESP encoded.
 */

use anyhow::*;
use bytes::{Buf, Bytes, BytesMut};

use crate::error::Error as CmdError;

/// Argument vector of one request; `argv[0]` is the command token
pub type Argv = Vec<Bytes>;

/// Most arguments accepted in one request
pub const MAX_ARGS: i64 = 1024;
/// Longest single bulk argument
pub const MAX_BULK: i64 = 512 * 1024;
/// Most bytes a pending (incomplete) request may buffer
pub const MAX_REQUEST: usize = 1024 * 1024;

/// Parse a single request from the front of `data`
///
/// # Returns
/// * `Ok(Some((consumed_bytes, argv)))` - a complete request; `argv` is
///   empty for a blank inline line
/// * `Ok(None)` - incomplete data, need more bytes
/// * `Err(...)` - framing error
pub fn parse_one(data: &[u8]) -> Result<Option<(usize, Argv)>> {
    if data.is_empty() {
        return Ok(None);
    }

    if data[0] != b'*' {
        return Ok(parse_inline(data));
    }

    // Read the number of array elements
    let (i, n) = read_decimal_line(&data[1..])?;
    if i == 0 {
        return Ok(None);
    }
    let mut cursor = 1 + i;

    if n <= 0 {
        bail!("empty array");
    }
    if n > MAX_ARGS {
        bail!("too many arguments");
    }

    let mut items: Argv = Vec::with_capacity((n as usize).min(16));

    for _ in 0..n {
        if cursor >= data.len() {
            return Ok(None);
        }

        if data[cursor] != b'$' {
            bail!("expected bulk");
        }

        let (i2, len) = read_decimal_line(&data[cursor + 1..])?;
        if i2 == 0 {
            return Ok(None);
        }
        if !(0..=MAX_BULK).contains(&len) {
            bail!("invalid bulk length");
        }
        cursor += 1 + i2;

        // Payload plus trailing CRLF
        let need = len as usize + 2;
        if cursor + need > data.len() {
            return Ok(None);
        }
        if &data[cursor + len as usize..cursor + need] != b"\r\n" {
            bail!("expected CRLF after bulk");
        }

        items.push(Bytes::copy_from_slice(&data[cursor..cursor + len as usize]));
        cursor += need;
    }

    Ok(Some((cursor, items)))
}

/// Inline form: one line of whitespace separated tokens
fn parse_inline(data: &[u8]) -> Option<(usize, Argv)> {
    let end = data.iter().position(|&b| b == b'\n')?;
    let line = &data[..end];
    let argv = line
        .split(|b| b.is_ascii_whitespace())
        .filter(|tok| !tok.is_empty())
        .map(Bytes::copy_from_slice)
        .collect();
    Some((end + 1, argv))
}

/// Parse every complete request buffered in `buf`
///
/// Consumed bytes are removed from the buffer; a trailing partial request
/// is left in place for the next read.
///
/// # Arguments
/// * `buf` - Connection read buffer
/// * `out` - Vector receiving the parsed argument vectors
///
/// # Returns
/// * `Err(...)` on a framing error, or when the pending partial request
///   exceeds `MAX_REQUEST` bytes; requests parsed before it stay in `out`
pub fn parse_many(buf: &mut BytesMut, out: &mut Vec<Argv>) -> Result<()> {
    loop {
        let (consumed, argv) = match parse_one(&buf[..])? {
            Some(x) => x,
            None => break,
        };

        buf.advance(consumed);
        if !argv.is_empty() {
            out.push(argv);
        }
    }
    if buf.len() > MAX_REQUEST {
        bail!("request too large");
    }
    Ok(())
}

/// Read a decimal number followed by \r\n
///
/// # Returns
/// * `(bytes_consumed, parsed_number)`, or `(0, 0)` when incomplete
fn read_decimal_line(s: &[u8]) -> Result<(usize, i64)> {
    let mut i = 0;
    let mut num: i64 = 0;
    let mut sign: i64 = 1;

    if i < s.len() && s[i] == b'-' {
        sign = -1;
        i += 1;
    }

    let start = i;
    while i < s.len() && s[i].is_ascii_digit() {
        num = num
            .checked_mul(10)
            .and_then(|n| n.checked_add((s[i] - b'0') as i64))
            .ok_or_else(|| anyhow!("length overflow"))?;
        i += 1;
    }

    if i + 1 < s.len() {
        if i == start {
            bail!("expected digits");
        }
        if s[i] == b'\r' && s[i + 1] == b'\n' {
            return Ok((i + 2, num * sign));
        }
        bail!("expected CRLF");
    }

    // Incomplete
    Ok((0, 0))
}

//
// Reply encoders
//

/// Write a simple string reply (+OK\r\n)
pub fn write_simple(s: &str, out: &mut BytesMut) {
    out.reserve(s.len() + 3);
    out.extend_from_slice(b"+");
    out.extend_from_slice(s.as_bytes());
    out.extend_from_slice(b"\r\n");
}

/// Write an error reply (-CODE message\r\n)
pub fn write_error(err: &CmdError, out: &mut BytesMut) {
    let line = format!("-{} {}\r\n", err.code(), err);
    out.extend_from_slice(line.as_bytes());
}

/// Write a framing error reply
pub fn write_protocol_error(err: &anyhow::Error, out: &mut BytesMut) {
    let line = format!("-PROTOCOL {}\r\n", err);
    out.extend_from_slice(line.as_bytes());
}

/// Write a bulk string reply ($<len>\r\n<data>\r\n)
pub fn write_bulk(b: &[u8], out: &mut BytesMut) {
    let len_str = b.len().to_string();
    out.reserve(1 + len_str.len() + 2 + b.len() + 2);
    out.extend_from_slice(b"$");
    out.extend_from_slice(len_str.as_bytes());
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(b);
    out.extend_from_slice(b"\r\n");
}

/// Write an integer reply (:<number>\r\n)
pub fn write_integer(i: i64, out: &mut BytesMut) {
    out.extend_from_slice(format!(":{}\r\n", i).as_bytes());
}

/// Write an array header (*<count>\r\n); the items follow separately
pub fn write_array_len(n: usize, out: &mut BytesMut) {
    out.extend_from_slice(format!("*{}\r\n", n).as_bytes());
}

/// Encode a request as a RESP array, used by clients and tests
pub fn encode_request(args: &[&[u8]]) -> BytesMut {
    let mut out = BytesMut::new();
    write_array_len(args.len(), &mut out);
    for a in args {
        write_bulk(a, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_bulk_waits_for_more() {
        assert!(parse_one(b"*2\r\n$3\r\nGET\r\n$5\r\nhel").unwrap().is_none());
        assert!(parse_one(b"*2\r").unwrap().is_none());
    }

    #[test]
    fn bulk_keeps_binary_payload() {
        let (n, argv) = parse_one(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$4\r\na\0\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(n, 30);
        assert_eq!(&argv[2][..], b"a\0\r\n");
    }

    #[test]
    fn inline_splits_on_whitespace() {
        let (n, argv) = parse_one(b"SET  vendor\tAcme\r\nGET").unwrap().unwrap();
        assert_eq!(n, 18);
        assert_eq!(argv, vec![
            Bytes::from_static(b"SET"),
            Bytes::from_static(b"vendor"),
            Bytes::from_static(b"Acme"),
        ]);
    }

    #[test]
    fn rejects_bad_framing() {
        assert!(parse_one(b"*1\r\n+PING\r\n").is_err());
        assert!(parse_one(b"*1\r\n$4\r\nPINGxx").is_err());
        assert!(parse_one(b"*x\r\n").is_err());
        assert!(parse_one(b"*0\r\n").is_err());
    }

    #[test]
    fn rejects_oversized_counts() {
        assert!(parse_one(b"*999999999999999999\r\n$3\r\nGET\r\n").is_err());
        assert!(parse_one(b"*1025\r\n").is_err());
        assert!(parse_one(b"*1\r\n$999999999\r\n").is_err());
        // A large but allowed count only waits for more data
        assert!(parse_one(b"*1024\r\n$3\r\nGET\r\n").unwrap().is_none());
    }

    #[test]
    fn unbounded_partial_request_is_rejected() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"GET k\r\n");
        buf.extend_from_slice(&vec![b'x'; MAX_REQUEST + 1]);
        let mut out = Vec::new();
        assert!(parse_many(&mut buf, &mut out).is_err());
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn error_reply_carries_code() {
        let mut out = BytesMut::new();
        write_error(&CmdError::ReadOnly, &mut out);
        assert_eq!(&out[..], b"-READONLY dictionary is read-only\r\n");
    }
}
