use std::io::{ErrorKind, Read};

/// Outcome of a frame read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRead {
    /// The buffer holds exactly one complete frame.
    Complete,
    /// The stream is exhausted. A partially absorbed frame is never surfaced
    /// as data, only as end of stream.
    EndOfStream,
}

/// Blocking exact-size reader over the raw video byte stream.
///
/// Frame boundaries are purely a byte-count convention matching the probed
/// dimensions: each call accumulates bytes until the buffer is full or the
/// stream ends. No read-ahead and no cross-call buffering; a call resumes
/// wherever the stream position was left.
pub struct FrameReader<R> {
    stream: R,
}

impl<R: Read> FrameReader<R> {
    pub fn new(stream: R) -> Self {
        Self { stream }
    }

    /// Fill `buf` with exactly one frame, or report end of stream.
    ///
    /// A zero-length or failed read is EOF no matter how many bytes were
    /// already absorbed this call. There are no retries: the stream is
    /// expected to terminate deterministically, not flakily.
    pub fn read_frame(&mut self, buf: &mut [u8]) -> FrameRead {
        let mut total = 0;
        while total < buf.len() {
            match self.stream.read(&mut buf[total..]) {
                Ok(0) => return FrameRead::EndOfStream,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(_) => return FrameRead::EndOfStream,
            }
        }
        FrameRead::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that hands out at most `chunk` bytes per read call.
    struct Trickle {
        data: Cursor<Vec<u8>>,
        chunk: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = buf.len().min(self.chunk);
            self.data.read(&mut buf[..n])
        }
    }

    #[test]
    fn reads_exact_frames_in_sequence() {
        let mut data = vec![1u8; 8];
        data.extend(vec![2u8; 8]);
        let mut reader = FrameReader::new(Cursor::new(data));
        let mut buf = [0u8; 8];

        assert_eq!(reader.read_frame(&mut buf), FrameRead::Complete);
        assert_eq!(buf, [1u8; 8]);
        assert_eq!(reader.read_frame(&mut buf), FrameRead::Complete);
        assert_eq!(buf, [2u8; 8]);
        assert_eq!(reader.read_frame(&mut buf), FrameRead::EndOfStream);
    }

    #[test]
    fn accumulates_across_short_reads() {
        let mut reader = FrameReader::new(Trickle {
            data: Cursor::new((0..12u8).collect()),
            chunk: 3,
        });
        let mut buf = [0u8; 12];

        assert_eq!(reader.read_frame(&mut buf), FrameRead::Complete);
        assert_eq!(buf, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn partial_frame_is_eof_not_data() {
        // 8-byte frames, but only 5 bytes in the stream
        let mut reader = FrameReader::new(Cursor::new(vec![7u8; 5]));
        let mut buf = [0u8; 8];

        assert_eq!(reader.read_frame(&mut buf), FrameRead::EndOfStream);
    }

    #[test]
    fn empty_stream_is_eof() {
        let mut reader = FrameReader::new(Cursor::new(Vec::new()));
        let mut buf = [0u8; 4];

        assert_eq!(reader.read_frame(&mut buf), FrameRead::EndOfStream);
    }
}
