//! Content-Length framing for JSON-RPC messages.
//!
//! Wire format:
//! Content-Length: <length>\r\n\r\n<content>
//!
//! `<length>` counts bytes of the UTF-8 body, not characters.

use crate::lsp::error::{LspError, Result};
use serde::Serialize;

pub const CONTENT_LENGTH: &str = "Content-Length";

/// Serialize `payload` and prefix it with its `Content-Length` header.
pub fn encode<T>(payload: &T) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(payload).map_err(LspError::Encoding)?;
    let header = format!("{}: {}\r\n\r\n", CONTENT_LENGTH, body.len());

    let mut framed = Vec::with_capacity(header.len() + body.len());
    framed.extend_from_slice(header.as_bytes());
    framed.extend_from_slice(&body);
    Ok(framed)
}

/// Parse a message body. The body must be a JSON object.
pub fn decode(body: &[u8]) -> Result<serde_json::Value> {
    let text = std::str::from_utf8(body)
        .map_err(|e| LspError::decode(format!("body is not valid UTF-8: {e}"), body))?;
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| LspError::decode(format!("body is not valid JSON: {e}"), body))?;

    if !value.is_object() {
        return Err(LspError::decode("body is not a JSON object", body));
    }
    Ok(value)
}

/// Extract `Content-Length` from raw header lines. Name match is case-insensitive.
pub fn content_length<S: AsRef<str>>(header_lines: &[S]) -> Result<usize> {
    for line in header_lines {
        let line = line.as_ref().trim_end_matches(['\r', '\n']);
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
            continue;
        }
        let value = value.trim();
        return value.parse::<usize>().map_err(|_| {
            LspError::decode(
                format!("invalid Content-Length: {value:?}"),
                raw_header(header_lines),
            )
        });
    }

    Err(LspError::decode(
        "Content-Length header not found",
        raw_header(header_lines),
    ))
}

fn raw_header<S: AsRef<str>>(header_lines: &[S]) -> Vec<u8> {
    header_lines
        .iter()
        .flat_map(|line| line.as_ref().as_bytes().iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn split_frame(framed: &[u8]) -> (String, &[u8]) {
        let end = framed
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("header terminator");
        let header = String::from_utf8(framed[..end].to_vec()).unwrap();
        (header, &framed[end + 4..])
    }

    #[test]
    fn test_encode_declares_byte_length() {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": "textDocument/didOpen",
            "params": {"text": "puts \"héllo ✓ 世界\""}
        });
        let framed = encode(&payload).unwrap();
        let (header, body) = split_frame(&framed);

        let declared = content_length(&[header.as_str()]).unwrap();
        assert_eq!(declared, body.len());
        assert!(body.len() > serde_json::to_string(&payload).unwrap().chars().count());
        assert_eq!(decode(body).unwrap(), payload);
    }

    #[test]
    fn test_decode_inverts_encode_for_each_message_shape() {
        let cases = [
            (
                "request",
                json!({"jsonrpc": "2.0", "id": 2, "method": "textDocument/documentSymbol",
                       "params": {"textDocument": {"uri": "file:///work/tcl-lsp.tcl"}}}),
            ),
            ("notification without params", json!({"jsonrpc": "2.0", "method": "exit"})),
            (
                "result response",
                json!({"jsonrpc": "2.0", "id": 3, "result": [{"uri": "file:///a.tcl",
                       "range": {"start": {"line": 3, "character": 2}, "end": {"line": 3, "character": 7}}}]}),
            ),
            ("null result response", json!({"jsonrpc": "2.0", "id": 4, "result": null})),
            (
                "error response",
                json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32601, "message": "méthode inconnue"}}),
            ),
        ];

        for (name, payload) in cases {
            let framed = encode(&payload).unwrap();
            let (header, body) = split_frame(&framed);
            assert_eq!(content_length(&[header.as_str()]).unwrap(), body.len(), "{name}");
            assert_eq!(decode(body).unwrap(), payload, "{name}");
        }
    }

    #[test]
    fn test_encode_header_is_bit_exact() {
        let framed = encode(&json!({"jsonrpc": "2.0", "method": "exit"})).unwrap();
        let body = br#"{"jsonrpc":"2.0","method":"exit"}"#;
        let mut expected = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
        expected.extend_from_slice(body);
        assert_eq!(framed, expected);
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        let err = decode(b"{\"jsonrpc\":").unwrap_err();
        assert!(err.is_decode());
        assert_eq!(err.raw(), Some(&b"{\"jsonrpc\":"[..]));
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(decode(b"[1,2,3]").unwrap_err().is_decode());
        assert!(decode(b"\"text\"").unwrap_err().is_decode());
    }

    #[test]
    fn test_content_length_is_case_insensitive() {
        let lines = [
            "Content-Type: application/vscode-jsonrpc; charset=utf-8\r\n",
            "content-length:  42 \r\n",
        ];
        assert_eq!(content_length(&lines).unwrap(), 42);
        assert_eq!(content_length(&["CONTENT-LENGTH: 7\n"]).unwrap(), 7);
    }

    #[test]
    fn test_content_length_missing_or_malformed() {
        let missing = content_length(&["Content-Type: text/plain\r\n"]).unwrap_err();
        assert!(missing.is_decode());

        assert!(content_length(&["Content-Length: abc\r\n"]).unwrap_err().is_decode());
        assert!(content_length(&["Content-Length: -5\r\n"]).unwrap_err().is_decode());
    }
}
