// Length-delimited framing for persisted event streams.
//
// A stream file is a sequence of frames: a 4-byte big-endian length, then
// that many bytes of JSON-serialized `WorkerEvent`. Hosts use it to save a
// run's output and to feed a saved catalog back in as an agglutination pool.
//
// `write_frame`/`read_frame` handle raw payloads; `write_event`/`read_event`
// add the JSON step. `read_event` distinguishes a clean end of stream (EOF
// exactly at a frame boundary, `Ok(None)`) from truncation (`UnexpectedEof`).
//
// `MAX_FRAME_SIZE` (16 MB) guards against unbounded allocation from a
// corrupt length prefix. A full batch of records is a few tens of KB.

use std::io::{self, Read, Write};

use crate::message::WorkerEvent;

/// Largest frame accepted on read or write.
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Write one frame. Does not flush; callers batching many frames through a
/// `BufWriter` flush once at the end.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|&len| len <= MAX_FRAME_SIZE)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "frame too large: {} bytes (max {MAX_FRAME_SIZE})",
                    payload.len()
                ),
            )
        })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)
}

/// Read one frame. Returns `Ok(None)` if the stream ends cleanly before the
/// length prefix.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        match reader.read(&mut len_buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended inside a frame length prefix",
                ));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {len} bytes (max {MAX_FRAME_SIZE})"),
        ));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    Ok(Some(payload))
}

/// Serialize and frame one event.
pub fn write_event<W: Write>(writer: &mut W, event: &WorkerEvent) -> io::Result<()> {
    let json = serde_json::to_vec(event)?;
    write_frame(writer, &json)
}

/// Read and deserialize one event, or `None` at a clean end of stream.
pub fn read_event<R: Read>(reader: &mut R) -> io::Result<Option<WorkerEvent>> {
    match read_frame(reader)? {
        Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frames_survive_a_roundtrip_in_sequence() {
        let payloads: Vec<&[u8]> = vec![b"first", b"", b"third"];
        let mut buf = Vec::new();
        for payload in &payloads {
            write_frame(&mut buf, payload).unwrap();
        }

        let mut cursor = Cursor::new(&buf);
        for expected in &payloads {
            let recovered = read_frame(&mut cursor).unwrap().unwrap();
            assert_eq!(recovered, *expected);
        }
        assert!(read_frame(&mut cursor).unwrap().is_none(), "clean EOF after last frame");
    }

    #[test]
    fn rejects_oversized_write() {
        let big = vec![0u8; MAX_FRAME_SIZE as usize + 1];
        let mut buf = Vec::new();
        let err = write_frame(&mut buf, &big).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(buf.is_empty(), "nothing is written for a rejected frame");
    }

    #[test]
    fn rejects_oversized_read() {
        let fake_len = (MAX_FRAME_SIZE + 1).to_be_bytes();
        let mut cursor = Cursor::new(fake_len.to_vec());
        let err = read_frame(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn truncated_prefix_is_an_error() {
        // Two bytes of a four-byte prefix.
        let mut cursor = Cursor::new(vec![0u8, 1]);
        let err = read_frame(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"complete payload").unwrap();
        buf.truncate(buf.len() - 3);
        let mut cursor = Cursor::new(buf);
        let err = read_frame(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn malformed_event_json_is_invalid_data() {
        let mut buf = Vec::new();
        write_frame(&mut buf, br#"{"type":"nonsense"}"#).unwrap();
        let err = read_event(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
