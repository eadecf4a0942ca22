//! Blocking client for the query protocol.
//!
//! One connection per query: send the 48-byte request, read fixed-size
//! rows until the server closes the connection. A close on a row boundary
//! is the normal end of results; a close mid-row is an error.

use crate::error::Result;
use crate::record::ResultRow;
use crate::wire::{self, Request};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

/// Run one query against a server and collect every result row.
pub fn fetch<A: ToSocketAddrs>(addr: A, request: &Request) -> Result<Vec<ResultRow>> {
    let mut stream = TcpStream::connect(addr)?;
    stream.write_all(&request.encode())?;

    let mut rows = Vec::new();
    let mut buf = vec![0u8; wire::row_size(request.groups)];
    while read_row(&mut stream, &mut buf)? {
        rows.push(wire::decode_row(&buf, request.groups, request.order));
    }
    Ok(rows)
}

/// Fill `buf` with the next row. `Ok(false)` means the connection closed
/// cleanly on a row boundary.
fn read_row(stream: &mut TcpStream, buf: &mut [u8]) -> Result<bool> {
    let mut got = 0;
    while got < buf.len() {
        let n = stream.read(&mut buf[got..])?;
        if n == 0 {
            if got == 0 {
                return Ok(false);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("connection closed {got} bytes into a row"),
            )
            .into());
        }
        got += n;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AttrGroups, LightAttrs, ResultRow};
    use std::net::TcpListener;

    fn canned_server(rows: Vec<ResultRow>) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut request = [0u8; wire::REQUEST_SIZE];
            socket.read_exact(&mut request).unwrap();
            let request = Request::decode(&request).unwrap();
            let mut out = Vec::new();
            for row in &rows {
                wire::encode_row(row, request.groups, request.order, &mut out);
            }
            socket.write_all(&out).unwrap();
        });
        addr
    }

    fn row(offset: u32, mag: f64) -> ResultRow {
        ResultRow {
            offset,
            ra: 12.0,
            dec: -30.0,
            primary_mag: mag,
            light: Some(LightAttrs {
                parallax: Some(4.5),
                ..LightAttrs::default()
            }),
            heavy: None,
        }
    }

    #[test]
    fn test_fetch_reads_until_close() {
        let addr = canned_server(vec![row(0, 3.0), row(1, 4.0)]);
        let request = Request::new(AttrGroups::LIGHT, 99.0, 0.0, 360.0, -90.0, 90.0);
        let rows = fetch(addr, &request).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].offset, 0);
        assert_eq!(rows[1].primary_mag, 4.0);
        assert_eq!(rows[0].light.unwrap().parallax, Some(4.5));
        assert_eq!(rows[0].light.unwrap().pmra, None);
    }

    #[test]
    fn test_fetch_empty_result() {
        let addr = canned_server(Vec::new());
        let request = Request::new(AttrGroups::NONE, 1.0, 0.0, 1.0, 0.0, 1.0);
        let rows = fetch(addr, &request).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_truncated_row_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut request = [0u8; wire::REQUEST_SIZE];
            socket.read_exact(&mut request).unwrap();
            // Half a base row, then close.
            socket.write_all(&[0u8; 14]).unwrap();
        });

        let request = Request::new(AttrGroups::NONE, 99.0, 0.0, 360.0, -90.0, 90.0);
        assert!(fetch(addr, &request).is_err());
    }
}
